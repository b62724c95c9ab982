//! Picks a renderer, builds a textured quad and runs a few frames.
//!
//! Run with `RUST_LOG=trace` to see every upload, and with
//! `--renderer opengl --gl-version 4.1` to watch initialization fail.

use gp1_render::apis::opengl::{GlBackend, OBJECT_BUFFER, TRANSFORM_UNIFORM};
use gp1_render::resources::{Material, ShaderStage, TextureFormat, UniformBufferLayout, UniformType, Vertex};
use gp1_render::{Camera, Drawable, Renderers};
use gp1_utils::EngineArgs;
use nalgebra::{Matrix4, Point3, Vector3, Vector4};
use std::error::Error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const VERTEX_SHADER: &str = r#"
#version 430
layout(std140, binding = 0) uniform Camera { mat4 projectionViewMatrix; mat4 projectionMatrix; mat4 viewMatrix; };
layout(std140, binding = 1) uniform Object { mat4 transformationMatrix; };
layout(location = 0) in vec3 position;
void main() { gl_Position = projectionViewMatrix * transformationMatrix * vec4(position, 1.0); }
"#;

const FRAGMENT_SHADER: &str = r#"
#version 430
layout(binding = 2) uniform Tint { vec4 tint; };
out vec4 color;
void main() { color = tint; }
"#;

fn quad() -> (Vec<Vertex>, Vec<u32>) {
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex::new([-0.5, -0.5, 0.0], normal, [0.0, 0.0]),
        Vertex::new([0.5, -0.5, 0.0], normal, [1.0, 0.0]),
        Vertex::new([0.5, 0.5, 0.0], normal, [1.0, 1.0]),
        Vertex::new([-0.5, 0.5, 0.0], normal, [0.0, 1.0]),
    ];
    (vertices, vec![0, 1, 2, 2, 3, 0])
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let renderers = Renderers::builtin();
    let renderer = renderers.select(EngineArgs::get())?;
    renderer.init()?;

    let mesh = renderer
        .create_static_mesh()
        .ok_or("the renderer cannot create meshes")?;
    let (vertices, indices) = quad();
    mesh.set(vertices, indices);

    let program = renderer
        .create_shader_program()
        .ok_or("the renderer cannot create shader programs")?;
    program.set_source(ShaderStage::Vertex, VERTEX_SHADER);
    program.set_source(ShaderStage::Fragment, FRAGMENT_SHADER);
    program.set_uniform_buffers(
        &renderer,
        vec![
            UniformBufferLayout::new(OBJECT_BUFFER, [(TRANSFORM_UNIFORM, UniformType::FMat4)]),
            UniformBufferLayout::new("Tint", [("tint", UniformType::FVec4)]),
        ],
    );

    let material = renderer
        .create_material()
        .ok_or("the renderer cannot create materials")?;
    material.set_shader_program(&renderer, program.clone());
    material
        .material()
        .modify_render_state(|state| state.depth_test = true);
    if let Some(tint) = material.uniform("Tint", "tint")
        && let Some(cell) = tint.typed::<Vector4<f32>>()
    {
        cell.set(Vector4::new(1.0, 0.4, 0.1, 1.0));
    }

    let texture = renderer.create_texture_2d();
    if let Some(texture) = &texture {
        texture.set_image(2, 2, TextureFormat::Rgba8, vec![255; 16]);
    }

    let camera = Camera::perspective(16.0 / 9.0, std::f32::consts::FRAC_PI_3, 0.1, 100.0);
    for frame in 0..3u8 {
        let angle = f32::from(frame) * 0.5;
        let transform = Matrix4::new_translation(&Vector3::new(0.0, 0.0, -3.0))
            * Matrix4::from_euler_angles(0.0, angle, 0.0);
        let drawables = [Drawable::new(mesh.clone(), material.clone()).with_transform(transform)];

        if let Some(debug) = renderer.debug_renderer() {
            debug.aabb(Point3::new(-0.5, -0.5, -3.0), Point3::new(0.5, 0.5, -3.0), [0.0, 1.0, 0.0, 1.0]);
        }

        renderer.begin_frame();
        renderer.render(&camera, &drawables);
        renderer.end_frame();

        if let Some(gl) = renderer.backend_as::<GlBackend>() {
            info!("Frame {frame}: {:?}", gl.last_frame());
        }
    }

    info!(
        "{} renderer ran {} frames with {} live resources",
        renderer.name(),
        renderer.frame_index(),
        renderer.registry().len()
    );

    drop(texture);
    drop(material);
    drop(program);
    drop(mesh);
    Ok(())
}
