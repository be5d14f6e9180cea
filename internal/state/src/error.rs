use nom::error::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot decode tag index near {location:?}: {kind:?}")]
    Decode { location: String, kind: ErrorKind },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot move tag index into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("tag index is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl Error {
    pub(crate) fn decode(input: &str, kind: ErrorKind) -> Self {
        Self::Decode {
            location: input.chars().take(32).collect(),
            kind,
        }
    }

    /// True if the error means there simply was no saved index yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
