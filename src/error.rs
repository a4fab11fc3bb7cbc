use thiserror::Error;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The server answered a request with an error reply.
    #[error("X request failed with protocol error {0}")]
    Transport(u8),
    #[error("lost connection to the X server: {0}")]
    Connection(#[from] ConnectionError),
    #[error("region tree is corrupt: {0}")]
    TreeCorrupt(&'static str),
    #[error("too many regions")]
    ArenaFull,
    #[error("no keycode produces keysym {0:#x}")]
    UnknownKeysym(u32),
    #[error("startup failed: {0}")]
    StartupFailed(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the reactor has to stop after seeing this error.
    ///
    /// A single misbehaving client produces `Transport` errors; everything
    /// else means the connection or our own state can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Transport(_) | Error::Config(_))
    }
}

impl From<ConnectError> for Error {
    fn from(e: ConnectError) -> Self {
        Error::StartupFailed(format!("cannot connect to the X server: {e}"))
    }
}

impl From<ReplyError> for Error {
    fn from(e: ReplyError) -> Self {
        match e {
            ReplyError::ConnectionError(e) => Error::Connection(e),
            ReplyError::X11Error(e) => Error::Transport(e.error_code),
        }
    }
}

impl From<ReplyOrIdError> for Error {
    fn from(e: ReplyOrIdError) -> Self {
        match e {
            ReplyOrIdError::ConnectionError(e) => Error::Connection(e),
            ReplyOrIdError::X11Error(e) => Error::Transport(e.error_code),
            ReplyOrIdError::IdsExhausted => {
                Error::StartupFailed("X resource ids exhausted".to_string())
            }
        }
    }
}
