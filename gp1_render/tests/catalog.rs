use gp1_render::{Backend, Camera, Drawable, Renderer, RendererEntry, RendererError, Renderers, SharedHandle};
use gp1_utils::EngineArgs;
use std::cell::Cell;

thread_local! {
    static CREATED: Cell<u32> = const { Cell::new(0) };
}

fn created() -> u32 {
    CREATED.with(Cell::get)
}

fn reset_created() {
    CREATED.with(|created| created.set(0));
}

struct FakeBackend {
    name: &'static str,
    compatible: bool,
}

impl FakeBackend {
    fn new(name: &'static str, compatible: bool) -> Self {
        CREATED.with(|created| created.set(created.get() + 1));
        Self { name, compatible }
    }
}

impl Backend for FakeBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_compatible(&self) -> bool {
        self.compatible
    }

    fn render(&self, _renderer: &Renderer, _camera: &Camera, _drawables: &[Drawable]) {}
}

fn catalog() -> Renderers {
    Renderers::new([
        RendererEntry::new("slow", 0, || FakeBackend::new("slow", true)),
        RendererEntry::new("broken", 5, || FakeBackend::new("broken", false)),
        RendererEntry::new("fast", 3, || FakeBackend::new("fast", true)),
        RendererEntry::new("fast2", 3, || FakeBackend::new("fast2", true)),
    ])
}

fn forced(name: &str) -> EngineArgs {
    EngineArgs {
        renderer: Some(Some(name.to_owned())),
        ..Default::default()
    }
}

#[test]
fn best_renderer_skips_incompatible_entries() {
    let renderers = catalog();
    let best = renderers.get_best_renderer().unwrap();

    assert_eq!(best.name(), "fast");
    assert_eq!(renderers.get_name(&best), Some("fast"));
    assert!(renderers.entries()[1].cached().is_none());
}

#[test]
fn renderers_are_cached_while_alive() {
    reset_created();
    let renderers = catalog();

    let first = renderers.get_renderer("slow").unwrap();
    let second = renderers.get_renderer("slow").unwrap();
    assert!(SharedHandle::ptr_eq(&first, &second));
    assert_eq!(created(), 1);

    drop(first);
    drop(second);
    assert!(renderers.entries()[0].cached().is_none());

    let third = renderers.get_renderer("slow").unwrap();
    assert_eq!(created(), 2);
    assert_eq!(third.name(), "slow");
}

#[test]
fn incompatible_renderers_are_never_cached() {
    reset_created();
    let renderers = catalog();

    assert!(renderers.get_renderer("broken").is_none());
    assert!(renderers.get_renderer("broken").is_none());
    assert_eq!(created(), 2);
    assert!(renderers.get_renderer("missing").is_none());
}

#[test]
fn destroyed_renderers_stay_usable_but_uncached() {
    reset_created();
    let renderers = catalog();
    let renderer = renderers.get_renderer("fast").unwrap();

    assert!(renderers.destroy_renderer(&renderer));
    assert!(!renderers.destroy_renderer(&renderer));
    assert_eq!(renderers.get_name(&renderer), None);

    let fresh = renderers.get_renderer("fast").unwrap();
    assert!(!SharedHandle::ptr_eq(&fresh, &renderer));
    assert_eq!(created(), 2);

    renderer.begin_frame();
    renderer.end_frame();
    assert_eq!(renderer.frame_index(), 1);
}

#[test]
fn registering_a_name_again_replaces_the_entry() {
    let mut renderers = catalog();
    renderers.register(RendererEntry::new("slow", 9, || FakeBackend::new("slow", true)));

    assert_eq!(renderers.names(), vec!["slow", "broken", "fast", "fast2"]);
    assert_eq!(renderers.entries()[0].priority(), 9);
    assert_eq!(renderers.get_best_renderer().unwrap().name(), "slow");
}

#[test]
fn select_honours_the_forced_renderer() {
    let renderers = catalog();

    let renderer = renderers.select(&EngineArgs::default()).unwrap();
    assert_eq!(renderer.name(), "fast");

    let renderer = renderers.select(&forced("slow")).unwrap();
    assert_eq!(renderer.name(), "slow");

    let err = renderers.select(&forced("metal")).unwrap_err();
    assert!(matches!(
        err,
        RendererError::UnknownRenderer { ref name, ref available }
            if name == "metal" && available.len() == 4
    ));

    let err = renderers.select(&forced("broken")).unwrap_err();
    assert!(matches!(err, RendererError::IncompatibleRenderer { ref name } if name == "broken"));
}

#[test]
fn empty_catalog_has_no_renderer() {
    let renderers = Renderers::default();
    assert!(renderers.get_best_renderer().is_none());

    let err = renderers.select(&EngineArgs::default()).unwrap_err();
    assert!(matches!(err, RendererError::NoCompatibleRenderer));
}

#[test]
fn builtin_catalog_lists_compiled_backends() {
    let renderers = Renderers::builtin();
    let names = renderers.names();

    #[cfg(feature = "opengl")]
    assert!(names.contains(&"opengl"));
    #[cfg(feature = "vulkan")]
    {
        assert!(names.contains(&"vulkan"));
        assert!(renderers.get_renderer("vulkan").is_none());
    }
    #[cfg(feature = "opengl")]
    assert_eq!(renderers.get_best_renderer().unwrap().name(), "opengl");
}

#[test]
fn installed_catalog_is_thread_local() {
    assert!(Renderers::install(catalog()).is_none());
    assert_eq!(Renderers::with_installed(|renderers| renderers.names().len()), Some(4));

    let elsewhere = std::thread::spawn(|| Renderers::installed().is_none())
        .join()
        .unwrap();
    assert!(elsewhere);

    let previous = Renderers::install(Renderers::default());
    assert_eq!(previous.map(|previous| previous.names().len()), Some(4));
    assert!(Renderers::uninstall().is_some());
    assert!(Renderers::installed().is_none());
}
