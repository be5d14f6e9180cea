use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown display style {0:?}; expected block or background")]
    UnknownStyle(String),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}
