use gp1_render::apis::vulkan::VulkanBackend;
use gp1_render::resources::{
    Material, Sampler, ShaderProgram, ShaderStage, Texture2D, TextureFormat, Uniform, UniformBuffer,
    UniformBufferLayout, UniformType,
};
use gp1_render::{HasRendererData, Renderer, RendererSettings, SharedHandle};
use nalgebra::{Matrix4, Vector3};

mod common;

fn renderer() -> Renderer {
    common::init_tracing();
    Renderer::with_settings(Box::new(VulkanBackend::new()), RendererSettings::builder().build())
}

fn lighting_layout() -> UniformBufferLayout {
    UniformBufferLayout::new(
        "Lighting",
        [("color", UniformType::FVec3), ("intensity", UniformType::Float)],
    )
}

#[test]
fn uniforms_keep_their_values_across_layout_changes() {
    let renderer = renderer();
    let buffer = renderer.create_uniform_buffer().unwrap();

    buffer.update_uniforms(
        &renderer,
        &[("color", UniformType::FVec3), ("intensity", UniformType::Float)],
    );
    let color = buffer.uniform("color").unwrap();
    color
        .typed::<Vector3<f32>>()
        .unwrap()
        .set(Vector3::new(1.0, 0.5, 0.25));
    buffer.clear_dirty();
    assert!(!buffer.is_dirty());

    buffer.update_uniforms(
        &renderer,
        &[
            ("color", UniformType::FVec3),
            ("intensity", UniformType::Int),
            ("color", UniformType::Float),
        ],
    );
    assert!(buffer.is_dirty());
    assert_eq!(buffer.buffer().len(), 2);

    let kept = buffer.uniform("color").unwrap();
    assert!(SharedHandle::ptr_eq(&kept, &color));
    assert_eq!(
        kept.typed::<Vector3<f32>>().unwrap().get(),
        Vector3::new(1.0, 0.5, 0.25)
    );

    let intensity = buffer.uniform("intensity").unwrap();
    assert_eq!(intensity.uniform_type(), UniformType::Int);
    assert!(intensity.typed::<f32>().is_none());
    assert_eq!(intensity.typed::<i32>().unwrap().get(), 0);

    buffer.update_uniforms::<&str>(&renderer, &[]);
    assert!(buffer.buffer().is_empty());
    drop(color);
    drop(kept);
    drop(intensity);
    assert_eq!(renderer.len::<dyn Uniform>(), 0);
}

#[test]
fn materials_follow_their_shader_program() {
    let renderer = renderer();
    let program = renderer.create_shader_program().unwrap();
    program.set_source(ShaderStage::Vertex, "void main() {}");
    program.set_source(ShaderStage::Fragment, "void main() {}");
    program.set_uniform_buffers(&renderer, vec![lighting_layout()]);

    let material = renderer.create_material().unwrap();
    material.set_shader_program(&renderer, program.clone());

    assert!(SharedHandle::ptr_eq(&material.shader_program().unwrap(), &program));
    assert_eq!(
        program.program().material_ids(),
        vec![material.renderer_data().id().unwrap()]
    );

    let lighting = material.uniform_buffer("Lighting").unwrap();
    let intensity = material.uniform("Lighting", "intensity").unwrap();
    intensity.typed::<f32>().unwrap().set(2.0);

    program.set_uniform_buffers(
        &renderer,
        vec![
            UniformBufferLayout::new(
                "Lighting",
                [("intensity", UniformType::Float), ("ambient", UniformType::FVec3)],
            ),
            UniformBufferLayout::new("Object", [("model", UniformType::FMat4)]),
        ],
    );

    let same = material.uniform_buffer("Lighting").unwrap();
    assert!(SharedHandle::ptr_eq(&same, &lighting));
    assert!(material.uniform("Lighting", "color").is_none());
    assert_eq!(
        material
            .uniform("Lighting", "intensity")
            .unwrap()
            .typed::<f32>()
            .unwrap()
            .get(),
        2.0
    );
    let model = material.uniform("Object", "model").unwrap();
    assert_eq!(model.typed::<Matrix4<f32>>().unwrap().get(), Matrix4::zeros());

    program.set_uniform_buffers(&renderer, Vec::new());
    assert!(material.material().uniform_buffers().is_empty());
}

#[test]
fn switching_programs_moves_the_material() {
    let renderer = renderer();
    let first = renderer.create_shader_program().unwrap();
    let second = renderer.create_shader_program().unwrap();
    first.set_uniform_buffers(&renderer, vec![lighting_layout()]);
    second.set_uniform_buffers(
        &renderer,
        vec![UniformBufferLayout::new("Fog", [("density", UniformType::Float)])],
    );

    let material = renderer.create_material().unwrap();
    material.set_shader_program(&renderer, first.clone());
    material.set_shader_program(&renderer, second.clone());

    assert!(first.program().material_ids().is_empty());
    assert_eq!(second.program().material_ids().len(), 1);
    assert!(material.uniform_buffer("Lighting").is_none());
    assert!(material.uniform("Fog", "density").is_some());
}

#[test]
fn dropped_materials_are_pruned_from_programs() {
    let renderer = renderer();
    let program = renderer.create_shader_program().unwrap();
    program.set_uniform_buffers(&renderer, vec![lighting_layout()]);

    let kept = renderer.create_material().unwrap();
    let dropped = renderer.create_material().unwrap();
    kept.set_shader_program(&renderer, program.clone());
    dropped.set_shader_program(&renderer, program.clone());
    assert_eq!(program.program().material_ids().len(), 2);

    drop(dropped);
    program.set_uniform_buffers(&renderer, vec![lighting_layout()]);
    assert_eq!(
        program.program().material_ids(),
        vec![kept.renderer_data().id().unwrap()]
    );
}

#[test]
fn duplicate_blocks_use_the_first_layout() {
    let renderer = renderer();
    let program = renderer.create_shader_program().unwrap();
    let material = renderer.create_material().unwrap();
    material.set_shader_program(&renderer, program.clone());

    program.set_uniform_buffers(
        &renderer,
        vec![
            UniformBufferLayout::new("Lighting", [("color", UniformType::FVec3)]),
            UniformBufferLayout::new("Lighting", [("color", UniformType::Float)]),
        ],
    );

    assert_eq!(material.material().uniform_buffers().len(), 1);
    assert_eq!(
        material.uniform("Lighting", "color").unwrap().uniform_type(),
        UniformType::FVec3
    );
}

#[test]
fn samplers_hold_textures() {
    let renderer = renderer();
    let texture = renderer.create_texture_2d().unwrap();
    texture.set_image(2, 2, TextureFormat::Rgba8, vec![255; 16]);
    assert!(texture.texture().is_complete());

    let uniform = renderer.create_uniform(UniformType::Texture2D).unwrap();
    assert!(uniform.std140_bytes().is_none());

    let cell = uniform.typed::<Sampler<dyn Texture2D>>().unwrap();
    cell.set(Sampler(Some(texture.clone())));
    let bound = cell.get().0.unwrap();
    assert!(SharedHandle::ptr_eq(&bound, &texture));
}

#[test]
fn every_uniform_type_can_be_created() {
    let renderer = renderer();
    let uniforms: Vec<_> = UniformType::ALL
        .into_iter()
        .map(|ty| renderer.create_uniform(ty).unwrap())
        .collect();

    for (uniform, ty) in uniforms.iter().zip(UniformType::ALL) {
        assert_eq!(uniform.uniform_type(), ty);
        assert_eq!(uniform.std140_bytes().map(|bytes| bytes.len()), ty.std140().map(|(_, size)| size));
    }
    assert_eq!(renderer.len::<dyn Uniform>(), UniformType::ALL.len());
}
