use argh::FromArgs;
use std::sync::LazyLock;

fn renderer_name(name: &str) -> Result<Option<String>, String> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    Ok(Some(name.to_ascii_lowercase()))
}

fn context_version(version: &str) -> Result<Option<(u32, u32)>, String> {
    let mut split = version.split('.');
    let major: Option<u32> = split.next().and_then(|x| x.trim().parse().ok());
    let minor: Option<u32> = split.next().and_then(|y| y.trim().parse().ok());

    let version = match (major, minor) {
        (Some(major), Some(minor)) => (major, minor),
        (Some(major), None) => (major, 0),
        _ => return Ok(None),
    };

    Ok(Some(version))
}

/// Engine arguments
#[derive(Default, FromArgs)]
pub struct EngineArgs {
    #[argh(switch, hidden_help)]
    pub no_debug_renderer: bool,

    #[argh(option, hidden_help)]
    pub debug_line_frames: Option<u32>,

    #[argh(option, hidden_help, from_str_fn(renderer_name))]
    pub renderer: Option<Option<String>>,
    #[argh(option, hidden_help, from_str_fn(context_version))]
    pub gl_version: Option<Option<(u32, u32)>>,
}

impl EngineArgs {
    fn init() -> Option<EngineArgs> {
        let mut args = std::env::args();
        let cmd_name = args.next()?;
        let args: Vec<String> = args.collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        EngineArgs::from_args(&[&cmd_name], &args).ok()
    }

    pub fn get() -> &'static EngineArgs {
        static INSTANCE: LazyLock<EngineArgs> =
            LazyLock::new(|| EngineArgs::init().unwrap_or_default());
        &INSTANCE
    }

    /// Backend requested with `--renderer`, lowercased.
    pub fn forced_renderer(&self) -> Option<&str> {
        self.renderer.as_ref()?.as_deref()
    }

    /// Context version reported by the OpenGL backend, `--gl-version`.
    pub fn gl_version(&self) -> Option<(u32, u32)> {
        self.gl_version.flatten()
    }

    /// How many frames a debug line stays queued if not given explicitly.
    pub fn debug_line_frames(&self) -> u32 {
        self.debug_line_frames.unwrap_or(1).max(1)
    }
}
