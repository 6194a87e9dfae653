use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials file {path}: {reason}")]
    Credentials { path: PathBuf, reason: String },
}
