use gp1_render::resources::{StaticMesh, StaticMeshData, UniformType};
use gp1_render::{
    Backend, Camera, Drawable, HasRendererData, Renderer, RendererData, RendererError, RendererSettings,
    Resource, SharedHandle,
};
use std::cell::{Cell, RefCell};

mod common;

thread_local! {
    static UPDATES: RefCell<Vec<u32>> = const { RefCell::new(Vec::new()) };
    static MESH_DROPS: Cell<u32> = const { Cell::new(0) };
}

fn take_updates() -> Vec<u32> {
    UPDATES.with(RefCell::take)
}

fn reset_mesh_drops() {
    MESH_DROPS.with(|slot| slot.set(0));
}

fn mesh_drops() -> u32 {
    MESH_DROPS.with(Cell::get)
}

#[derive(HasRendererData)]
struct TestMesh {
    data: RendererData,
    mesh: StaticMeshData,
    tag: u32,
    updatable: bool,
}

impl Resource for TestMesh {
    fn update(&self) {
        UPDATES.with(|updates| updates.borrow_mut().push(self.tag));
    }

    fn is_updatable(&self) -> bool {
        self.updatable
    }
}

impl StaticMesh for TestMesh {
    fn mesh(&self) -> &StaticMeshData {
        &self.mesh
    }
}

impl Drop for TestMesh {
    fn drop(&mut self) {
        MESH_DROPS.with(|slot| slot.set(slot.get() + 1));
    }
}

/// Produces meshes tagged 1, 2, 3, ... and nothing else.
#[derive(Default)]
struct TestBackend {
    next_tag: Cell<u32>,
    updatable: RefCell<Vec<u32>>,
    frames: Cell<u32>,
}

impl TestBackend {
    fn make_updatable(&self, tags: &[u32]) {
        self.updatable.borrow_mut().extend_from_slice(tags);
    }
}

impl Backend for TestBackend {
    fn name(&self) -> &'static str {
        "test"
    }

    fn is_compatible(&self) -> bool {
        true
    }

    fn begin_frame(&self, _renderer: &Renderer) {
        self.frames.set(self.frames.get() + 1);
    }

    fn render(&self, _renderer: &Renderer, _camera: &Camera, _drawables: &[Drawable]) {}

    fn create_static_mesh(&self) -> Option<SharedHandle<dyn StaticMesh>> {
        let tag = self.next_tag.get() + 1;
        self.next_tag.set(tag);

        let mesh = SharedHandle::new(TestMesh {
            data: RendererData::new(),
            mesh: StaticMeshData::new(),
            tag,
            updatable: self.updatable.borrow().contains(&tag),
        });
        Some(SharedHandle::map(&mesh, |mesh| mesh as &(dyn StaticMesh + 'static)))
    }
}

fn test_renderer() -> Renderer {
    common::init_tracing();
    Renderer::with_settings(Box::<TestBackend>::default(), RendererSettings::builder().build())
}

fn frame(renderer: &Renderer) {
    renderer.begin_frame();
    renderer.render(&Camera::default(), &[]);
    renderer.end_frame();
}

#[test]
fn three_meshes_one_updatable() {
    reset_mesh_drops();
    take_updates();

    let renderer = test_renderer();
    renderer
        .backend_as::<TestBackend>()
        .unwrap()
        .make_updatable(&[2]);

    let first = renderer.create_static_mesh().unwrap();
    let second = renderer.create_static_mesh().unwrap();
    let third = renderer.create_static_mesh().unwrap();

    assert_eq!(renderer.len::<dyn StaticMesh>(), 3);
    assert_eq!(renderer.updatable_len(), 1);

    frame(&renderer);
    assert_eq!(take_updates(), vec![2]);
    assert_eq!(renderer.frame_index(), 1);

    drop(second);
    assert_eq!(mesh_drops(), 1);
    assert_eq!(renderer.len::<dyn StaticMesh>(), 2);
    assert_eq!(renderer.updatable_len(), 0);

    frame(&renderer);
    assert!(take_updates().is_empty());

    drop(renderer);
    assert!(!first.renderer_data().is_registered());
    drop(first);
    drop(third);
    assert_eq!(mesh_drops(), 3);
    assert!(take_updates().is_empty());
}

#[test]
fn drops_during_a_registry_borrow_are_pruned_later() {
    reset_mesh_drops();
    take_updates();
    let renderer = test_renderer();
    renderer
        .backend_as::<TestBackend>()
        .unwrap()
        .make_updatable(&[1]);

    let mesh = renderer.create_static_mesh().unwrap();
    let id = mesh.renderer_data().id().unwrap();

    let guard = renderer.registry();
    drop(mesh);
    assert_eq!(mesh_drops(), 1);
    assert!(guard.contains(id));
    drop(guard);

    assert_eq!(renderer.updatable_len(), 1);
    frame(&renderer);
    assert!(!renderer.contains(id));
    assert_eq!(renderer.len::<dyn StaticMesh>(), 0);
    assert_eq!(renderer.updatable_len(), 0);
    assert!(take_updates().is_empty());
}

#[test]
fn removal_during_a_registry_borrow_keeps_the_registration() {
    let renderer = test_renderer();
    let mesh = renderer.create_static_mesh().unwrap();
    let id = mesh.renderer_data().id().unwrap();

    let guard = renderer.registry();
    assert!(!renderer.remove_renderer_data(&*mesh));
    drop(guard);

    assert_eq!(mesh.renderer_data().id(), Some(id));
    assert!(renderer.remove_renderer_data(&*mesh));
    assert!(!renderer.contains(id));
}

#[test]
fn updates_run_in_registration_order() {
    take_updates();

    let renderer = test_renderer();
    renderer
        .backend_as::<TestBackend>()
        .unwrap()
        .make_updatable(&[1, 2, 3, 4]);

    let meshes: Vec<_> = (0..4)
        .map(|_| renderer.create_static_mesh().unwrap())
        .collect();

    frame(&renderer);
    assert_eq!(take_updates(), vec![1, 2, 3, 4]);

    let mut meshes = meshes.into_iter();
    let first = meshes.next().unwrap();
    drop(meshes.next());
    let rest: Vec<_> = meshes.collect();

    frame(&renderer);
    assert_eq!(take_updates(), vec![1, 3, 4]);
    assert_eq!(renderer.backend_as::<TestBackend>().unwrap().frames.get(), 2);

    drop(first);
    drop(rest);
    assert_eq!(renderer.updatable_len(), 0);
}

#[test]
fn registration_tracks_ids() {
    let renderer = test_renderer();
    let mesh = renderer.create_static_mesh().unwrap();

    let id = mesh.renderer_data().id().unwrap();
    assert!(renderer.contains(id));
    assert!(mesh.renderer_data().is_registered());

    let found = renderer.find::<dyn StaticMesh>(id).unwrap();
    assert!(SharedHandle::ptr_eq(&found, &mesh));
    drop(found);

    let this = mesh.renderer_data().this().unwrap();
    assert!(SharedHandle::owner_eq(&this, &mesh));
    drop(this);

    assert_eq!(renderer.resources::<dyn StaticMesh>().len(), 1);

    drop(mesh);
    assert!(!renderer.contains(id));
    assert!(renderer.registry().is_empty());
}

#[test]
fn explicit_removal_is_idempotent() {
    let renderer = test_renderer();
    let mesh = renderer.create_static_mesh().unwrap();
    let other = renderer.create_static_mesh().unwrap();

    assert!(renderer.remove_renderer_data(&*mesh));
    assert_eq!(renderer.len::<dyn StaticMesh>(), 1);
    assert!(mesh.renderer_data().id().is_none());

    assert!(!renderer.remove_renderer_data(&*mesh));
    drop(mesh);
    assert_eq!(renderer.len::<dyn StaticMesh>(), 1);
    assert!(renderer.contains(other.renderer_data().id().unwrap()));
}

#[test]
fn declined_creation_registers_nothing() {
    let renderer = test_renderer();

    assert!(renderer.create_material().is_none());
    assert!(renderer.create_uniform(UniformType::FVec3).is_none());
    assert!(renderer.create_texture_cube_map().is_none());
    assert!(renderer.registry().is_empty());
}

#[test]
fn unregistered_resources_drop_quietly() {
    reset_mesh_drops();

    let mesh = TestMesh {
        data: RendererData::new(),
        mesh: StaticMeshData::new(),
        tag: 0,
        updatable: true,
    };
    assert!(!mesh.renderer_data().is_registered());
    assert!(mesh.renderer_data().this().is_none());
    drop(mesh);

    assert_eq!(mesh_drops(), 1);
}

#[test]
fn extension_slot_holds_any_value() {
    let renderer = test_renderer();
    let mesh = renderer.create_static_mesh().unwrap();
    let data = mesh.renderer_data();

    assert!(data.next::<u32>().is_none());
    assert!(data.set_next(7u32).is_none());
    assert_eq!(data.next::<u32>().as_deref(), Some(&7));
    assert!(data.next::<String>().is_none());

    let previous = data.set_next(String::from("gl"));
    assert_eq!(previous.and_then(|p| p.downcast::<u32>().ok()).as_deref(), Some(&7));
    assert!(data.take_next().is_some());
    assert!(data.next::<String>().is_none());
}

#[test]
fn init_and_deinit() {
    let renderer = test_renderer();
    assert!(!renderer.is_initialized());

    renderer.init().unwrap();
    assert!(renderer.is_initialized());
    assert!(renderer.reserved_uniform_buffers().is_none());
    assert!(renderer.debug_renderer().is_none());

    let err = renderer.init().unwrap_err();
    assert!(matches!(err, RendererError::AlreadyInitialized { backend: "test" }));

    renderer.deinit();
    assert!(!renderer.is_initialized());
    renderer.deinit();
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "begin_frame was called before the previous frame ended")]
fn begin_frame_twice_panics() {
    let renderer = test_renderer();
    renderer.begin_frame();
    renderer.begin_frame();
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "render was called outside of begin_frame and end_frame")]
fn render_outside_frame_panics() {
    let renderer = test_renderer();
    renderer.render(&Camera::default(), &[]);
}
