//! Error types for iSpy.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IspyError {
    #[error("Unknown diagnostic module: {0}")]
    UnknownModule(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl IspyError {
    /// Stable numeric code, used as the CLI exit status
    pub fn code(&self) -> i32 {
        match self {
            IspyError::UnknownModule(_) => 10,
            IspyError::UnknownDevice(_) => 11,
            IspyError::Provider(_) => 20,
            IspyError::Config(_) => 30,
            IspyError::Io(_) => 40,
            IspyError::Json(_) => 41,
            IspyError::Toml(_) => 42,
        }
    }
}

pub type Result<T> = std::result::Result<T, IspyError>;
