use std::fmt::Debug;

use thiserror::Error;
use tokio::{sync::mpsc, task::JoinError};

/// Possible errors from the scheduler.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Join(#[from] JoinError),

    #[error("channel send error: {0}")]
    Send(String),
}

impl<T: Debug> From<mpsc::error::SendError<T>> for Error {
    fn from(err: mpsc::error::SendError<T>) -> Self {
        Self::Send(format!("{:?}", err))
    }
}
