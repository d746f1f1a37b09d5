use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("image has no target regions defined")]
    NoTargets,
    #[error("tap ({x}, {y}) is outside the normalized [0, 1] range")]
    CoordinateOutOfRange { x: f64, y: f64 },
    #[error("target region {0} is outside the normalized [0, 1] range")]
    InvalidRect(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
