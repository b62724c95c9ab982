use crate::resources::{Material, StaticMesh};
use bon::Builder;
use gp1_pointers::SharedHandle;
use nalgebra::{Matrix4, Perspective3};

/// The view a frame is rendered from.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct Camera {
    #[builder(default = Matrix4::identity())]
    pub projection: Matrix4<f32>,
    #[builder(default = Matrix4::identity())]
    pub view: Matrix4<f32>,
    #[builder(default = [0.0, 0.0, 0.0, 1.0])]
    pub clear_color: [f32; 4],
}

impl Default for Camera {
    fn default() -> Self {
        Camera::builder().build()
    }
}

impl Camera {
    /// A camera with a perspective projection. `fov_y` is in radians.
    pub fn perspective(aspect: f32, fov_y: f32, near: f32, far: f32) -> Self {
        Camera::builder()
            .projection(Perspective3::new(aspect, fov_y, near, far).to_homogeneous())
            .build()
    }

    pub fn projection_view(&self) -> Matrix4<f32> {
        self.projection * self.view
    }
}

/// A mesh drawn with a material at a transform.
#[derive(Clone)]
pub struct Drawable {
    pub mesh: SharedHandle<dyn StaticMesh>,
    pub material: SharedHandle<dyn Material>,
    pub transform: Matrix4<f32>,
}

impl Drawable {
    pub fn new(mesh: SharedHandle<dyn StaticMesh>, material: SharedHandle<dyn Material>) -> Self {
        Self {
            mesh,
            material,
            transform: Matrix4::identity(),
        }
    }

    pub fn with_transform(mut self, transform: Matrix4<f32>) -> Self {
        self.transform = transform;
        self
    }
}
