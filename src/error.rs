//! Error types and Result alias for Castor

use thiserror::Error;

/// Broad classification of an error, usable with [`Error::code`] when the
/// caller only cares about the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Store format violation: bad magic, bad version, reference outside the
    /// mapping, malformed node or leaf
    Corrupt,
    /// Requested entity does not exist (id out of range, missing file)
    NotFound,
    /// Operating system I/O failure
    Io,
    /// Invalid arguments or invalid call sequence
    Usage,
    /// A hash run does not fit on a single index page
    TooManyCollisions,
    /// Input data could not be parsed (RDF syntax, query syntax)
    Parse,
}

/// Error type for all fallible Castor operations.
///
/// Corruption is distinct from "not found": lookup misses inside a healthy
/// store return sentinel id 0 and are not errors at all.
#[derive(Debug, Error)]
pub enum Error {
    #[error("corrupt store: {0}")]
    Corrupt(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("usage: {0}")]
    Usage(String),
    #[error("too many hash collisions on one index page")]
    TooManyCollisions,
    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Shorthand for a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Error::Corrupt(message.into())
    }

    /// Shorthand for a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    /// Shorthand for a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// The error class.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Corrupt(_) => ErrorCode::Corrupt,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::Io(_) => ErrorCode::Io,
            Error::Usage(_) => ErrorCode::Usage,
            Error::TooManyCollisions => ErrorCode::TooManyCollisions,
            Error::Parse(_) => ErrorCode::Parse,
        }
    }
}

/// Result type alias for Castor operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_preserved() {
        assert_eq!(Error::corrupt("bad magic").code(), ErrorCode::Corrupt);
        assert_eq!(Error::usage("no db").code(), ErrorCode::Usage);
    }

    #[test]
    fn io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.code(), ErrorCode::Io);
    }
}
