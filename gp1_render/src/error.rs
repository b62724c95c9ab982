use crate::backend::BackendError;
use snafu::Snafu;

pub type Result<T, E = RendererError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(context(suffix(Err)), visibility(pub(crate)))]
pub enum RendererError {
    #[snafu(display("The {backend} renderer failed to initialize: {source}"))]
    BackendInit {
        backend: &'static str,
        source: BackendError,
    },

    #[snafu(display("The {backend} renderer was already initialized"))]
    AlreadyInitialized { backend: &'static str },

    #[snafu(display("No renderer named {name:?} is known. Available: {available:?}"))]
    UnknownRenderer { name: String, available: Vec<String> },

    #[snafu(display("The {name} renderer is not supported on this system"))]
    IncompatibleRenderer { name: String },

    #[snafu(display("None of the available renderers is supported on this system"))]
    NoCompatibleRenderer,

    #[snafu(display(
        "Cannot reserve uniform buffer {name:?}, all {max} reserved slots are taken"
    ))]
    ReservedSlotsFull { name: String, max: usize },
}
