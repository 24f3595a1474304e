use std::io;
use thiserror::Error;

use crate::error::ShellError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Shell(#[from] ShellError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
