// One error type for the whole crate.
// Every variant states *where* things went wrong.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String),

    #[error("Window update error: {0}")]
    WindowUpdate(String),

    #[error("Camera init error: {0}")]
    CameraInit(String),

    #[error("Camera frame error: {0}")]
    CameraFrame(String),

    /// The host refused media access outright (no device, or capture disabled).
    #[error("Media not allowed: {0}")]
    MediaNotAllowed(String),

    #[error("Compose error: {0}")]
    Compose(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
