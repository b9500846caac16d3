use apkvm_axml::{ArscError, AxmlError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApkError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("manifest: {0}")]
    Manifest(#[from] AxmlError),

    #[error("resources: {0}")]
    Resources(#[from] ArscError),
}
