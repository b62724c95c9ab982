#![cfg(feature = "opengl")]

use gp1_render::apis::opengl::{
    CAMERA_OFFSETS, GlBackend, GlShaderProgram, GlStaticMesh, GlTexture, GlUniformBuffer, MIN_GL_VERSION,
    OBJECT_BUFFER, TRANSFORM_UNIFORM,
};
use gp1_render::resources::{
    CAMERA_BUFFER, DebugRenderer, ShaderProgram, ShaderStage, TextureFormat, UniformBuffer,
    UniformBufferLayout, UniformType, Vertex,
};
use gp1_render::{
    BackendError, Camera, Drawable, Renderer, RendererError, RendererSettings, Resource, SharedHandle,
};
use more_asserts::assert_gt;
use nalgebra::{Matrix4, Point3, Vector3};
use std::any::Any;

mod common;

fn gl_renderer() -> Renderer {
    common::init_tracing();
    Renderer::with_settings(
        Box::new(GlBackend::with_version((4, 6))),
        RendererSettings::builder().build(),
    )
}

fn backend(renderer: &Renderer) -> &GlBackend {
    renderer.backend_as::<GlBackend>().unwrap()
}

fn downcast<T: Any>(value: &dyn Any) -> &T {
    value.downcast_ref::<T>().unwrap()
}

fn gl_buffer(buffer: &SharedHandle<dyn UniformBuffer>) -> &GlUniformBuffer {
    downcast::<GlUniformBuffer>(&**buffer)
}

fn read_matrix(bytes: &[u8], offset: usize) -> [f32; 16] {
    bytemuck::pod_read_unaligned(&bytes[offset..offset + 64])
}

fn triangle() -> Vec<Vertex> {
    vec![
        Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
        Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
        Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
    ]
}

fn linked_program(renderer: &Renderer) -> SharedHandle<dyn ShaderProgram> {
    let program = renderer.create_shader_program().unwrap();
    program.set_source(ShaderStage::Vertex, "void main() { gl_Position = vec4(0.0); }");
    program.set_source(ShaderStage::Fragment, "void main() {}");
    program.set_uniform_buffers(
        renderer,
        vec![UniformBufferLayout::new(
            OBJECT_BUFFER,
            [(TRANSFORM_UNIFORM, UniformType::FMat4)],
        )],
    );
    program
}

#[test]
fn old_contexts_fail_to_initialize() {
    let renderer = Renderer::with_settings(
        Box::new(GlBackend::with_version((4, 1))),
        RendererSettings::builder().build(),
    );
    assert!(!renderer.is_compatible());

    let err = renderer.init().unwrap_err();
    assert!(matches!(
        err,
        RendererError::BackendInit {
            backend: "opengl",
            source: BackendError::ContextVersion {
                found: (4, 1),
                required: MIN_GL_VERSION,
            },
        }
    ));
    assert!(!renderer.is_initialized());

    // 3.9 must not pass just because its minor version is high
    assert!(!Renderer::new(Box::new(GlBackend::with_version((3, 9)))).is_compatible());
    assert!(Renderer::new(Box::new(GlBackend::with_version((5, 0)))).is_compatible());
}

#[test]
fn camera_block_is_written_at_fixed_offsets() {
    let renderer = gl_renderer();
    renderer.init().unwrap();

    let reserved = renderer.reserved_uniform_buffers().unwrap();
    let camera_buffer = reserved.uniform_buffer(CAMERA_BUFFER).unwrap();
    let camera_gl = gl_buffer(&camera_buffer);
    assert_eq!(camera_gl.binding(), Some(0));
    assert_eq!(
        camera_gl.layout(),
        CAMERA_OFFSETS
            .iter()
            .map(|(name, offset)| (name.to_string(), *offset))
            .collect::<Vec<_>>()
    );

    let camera = Camera::builder()
        .projection(Matrix4::new_scaling(2.0))
        .view(Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)))
        .build();

    renderer.begin_frame();
    renderer.render(&camera, &[]);
    renderer.end_frame();

    let mirror = camera_gl.mirror();
    assert_eq!(mirror.len(), 192);
    assert_eq!(read_matrix(&mirror, 0), <[f32; 16]>::try_from(camera.projection_view().as_slice()).unwrap());
    assert_eq!(read_matrix(&mirror, 64), <[f32; 16]>::try_from(camera.projection.as_slice()).unwrap());
    assert_eq!(read_matrix(&mirror, 128), <[f32; 16]>::try_from(camera.view.as_slice()).unwrap());

    let stats = backend(&renderer).last_frame();
    assert_eq!(stats.buffer_binds, 1);
    assert_eq!(stats.draw_calls, 0);
}

#[test]
fn shrinking_a_block_rebuilds_its_mirror() {
    let renderer = gl_renderer();
    let buffer = renderer.create_uniform_buffer().unwrap();
    buffer.update_uniforms(
        &renderer,
        &[("model", UniformType::FMat4), ("fade", UniformType::Float)],
    );
    buffer
        .uniform("model")
        .unwrap()
        .typed::<Matrix4<f32>>()
        .unwrap()
        .set(Matrix4::new_scaling(3.0));
    buffer.uniform("fade").unwrap().typed::<f32>().unwrap().set(0.5);

    renderer.begin_frame();
    renderer.end_frame();
    assert_eq!(gl_buffer(&buffer).mirror().len(), 68);

    buffer.update_uniforms(&renderer, &[("fade", UniformType::Float)]);
    renderer.begin_frame();
    renderer.end_frame();

    let mirror = gl_buffer(&buffer).mirror();
    assert_eq!(&*mirror, bytemuck::bytes_of(&0.5f32));
}

#[test]
fn drawables_are_counted_and_transformed() {
    let renderer = gl_renderer();
    renderer.init().unwrap();

    let mesh = renderer.create_static_mesh().unwrap();
    mesh.set(triangle(), vec![0, 1, 2]);

    let program = linked_program(&renderer);
    let material = renderer.create_material().unwrap();
    material.set_shader_program(&renderer, program.clone());

    let bare = renderer.create_material().unwrap();

    renderer.begin_frame();
    assert!(downcast::<GlShaderProgram>(&*program).is_linked());

    let transform = Matrix4::new_translation(&Vector3::new(5.0, 0.0, -1.0));
    let drawables = [
        Drawable::new(mesh.clone(), material.clone()).with_transform(transform),
        Drawable::new(mesh.clone(), bare.clone()),
    ];
    renderer.render(&Camera::default(), &drawables);
    renderer.end_frame();

    let stats = backend(&renderer).last_frame();
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.indices, 3);
    assert_eq!(stats.material_binds, 1);
    assert_eq!(stats.buffer_binds, 2);
    assert_eq!(stats.skipped, 1);

    let object = material.uniform_buffer(OBJECT_BUFFER).unwrap();
    let object_gl = gl_buffer(&object);
    assert_eq!(object_gl.binding(), Some(1));
    assert_eq!(read_matrix(&object_gl.mirror(), 0), <[f32; 16]>::try_from(transform.as_slice()).unwrap());
}

#[test]
fn meshes_with_invalid_indices_keep_their_last_upload() {
    let renderer = gl_renderer();
    let mesh = renderer.create_static_mesh().unwrap();

    mesh.set(triangle(), vec![0, 1, 2]);
    renderer.begin_frame();
    renderer.end_frame();
    assert_eq!(downcast::<GlStaticMesh>(&*mesh).uploaded_index_count(), Some(3));

    mesh.set_indices(vec![0, 1, 7]);
    renderer.begin_frame();
    renderer.end_frame();
    assert_eq!(downcast::<GlStaticMesh>(&*mesh).uploaded_index_count(), Some(3));
    assert!(!mesh.is_dirty());
}

#[test]
fn programs_link_only_complete_stage_sets() {
    let renderer = gl_renderer();
    let partial = renderer.create_shader_program().unwrap();
    partial.set_source(ShaderStage::Vertex, "void main() {}");
    let compute = renderer.create_shader_program().unwrap();
    compute.set_source(ShaderStage::Compute, "void main() {}");

    renderer.begin_frame();
    renderer.end_frame();

    let is_linked = |program: &SharedHandle<dyn ShaderProgram>| downcast::<GlShaderProgram>(&**program).is_linked();
    assert!(!is_linked(&partial));
    assert!(is_linked(&compute));
}

#[test]
fn textures_upload_once_their_data_is_complete() {
    let renderer = gl_renderer();
    let texture = renderer.create_texture_2d().unwrap();

    texture.set_image(4, 4, TextureFormat::Rgba8, vec![0; 15]);
    renderer.begin_frame();
    renderer.end_frame();
    assert_eq!(downcast::<GlTexture>(&*texture).uploaded_extent(), None);

    texture.set_image(4, 4, TextureFormat::Rgba8, vec![0; 64]);
    renderer.begin_frame();
    renderer.end_frame();
    assert_eq!(downcast::<GlTexture>(&*texture).uploaded_extent(), Some([4, 4, 1]));
    assert_gt!(backend(&renderer).context().uploaded_bytes(), 63);
}

#[test]
fn debug_lines_live_for_their_frames() {
    let renderer = gl_renderer();
    renderer.init().unwrap();
    let debug = renderer.debug_renderer().unwrap();

    debug.line(Point3::origin(), Point3::new(1.0, 0.0, 0.0), [1.0, 0.0, 0.0, 1.0]);
    debug.queue().point_for(Point3::new(0.0, 2.0, 0.0), [0.0, 1.0, 0.0, 1.0], 2);

    let frame = || {
        renderer.begin_frame();
        renderer.render(&Camera::default(), &[]);
        renderer.end_frame();
        backend(&renderer).last_frame().debug_vertices
    };

    assert_eq!(frame(), 3);
    assert_eq!(frame(), 1);
    assert_eq!(frame(), 0);
}

#[test]
fn disabled_debug_renderer_is_not_created() {
    let renderer = Renderer::with_settings(
        Box::new(GlBackend::with_version((4, 6))),
        RendererSettings::builder().debug_renderer(false).build(),
    );
    renderer.init().unwrap();
    assert!(renderer.debug_renderer().is_none());
    assert!(renderer.reserved_uniform_buffers().is_some());
}

#[test]
fn objects_are_released_with_their_resources() {
    let renderer = gl_renderer();
    let live = || backend(&renderer).context().live_objects();
    assert_eq!(live(), 0);

    let mesh = renderer.create_static_mesh().unwrap();
    let texture = renderer.create_texture_3d().unwrap();
    assert_eq!(live(), 2);

    drop(mesh);
    assert_eq!(live(), 1);
    drop(texture);
    assert_eq!(live(), 0);

    renderer.init().unwrap();
    assert_eq!(live(), 2);
    renderer.deinit();
    assert_eq!(live(), 0);
}

#[test]
fn resources_outlive_the_renderer() {
    let renderer = gl_renderer();
    let mesh = renderer.create_static_mesh().unwrap();
    let material = renderer.create_material().unwrap();
    let program = linked_program(&renderer);
    material.set_shader_program(&renderer, program.clone());
    drop(renderer);

    mesh.set(triangle(), vec![0, 1, 2]);
    mesh.update();

    assert_eq!(downcast::<GlStaticMesh>(&*mesh).uploaded_index_count(), None);
    assert!(material.uniform(OBJECT_BUFFER, TRANSFORM_UNIFORM).is_some());

    drop(program);
    drop(material);
    drop(mesh);
}
