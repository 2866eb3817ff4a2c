//! Error types for RoflDB.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in RoflDB.
///
/// Build-side errors (`UnsortedInput`, `MultiValueNotSupported`, the size
/// limits) are raised before the serializer hands out any bytes. Every
/// read-side problem is reported as `Corrupt`.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Keys given to a sorted packer were not strictly increasing.
    #[error("unsorted input: {current:?} does not follow {previous:?}")]
    UnsortedInput { previous: Vec<u8>, current: Vec<u8> },

    /// Range query given a symbol outside `<`, `<=`, `>`, `>=`, `==`, `!=`.
    #[error("unsupported operator '{0}', expected one of < <= > >= == !=")]
    UnsupportedOperator(String),

    /// A leaf key carries a value list the file format cannot hold.
    ///
    /// The file stores exactly one value per key.
    #[error("key {key:?} holds {count} values, the file format stores exactly one")]
    MultiValueNotSupported { key: Vec<u8>, count: usize },

    /// The buffer is not a well-formed RoflDB file.
    #[error("corrupt file: {0}")]
    Corrupt(String),

    /// Branching factor below the supported minimum.
    #[error("invalid branching factor {0}")]
    InvalidBranchingFactor(usize),

    /// Key longer than a slot can encode.
    #[error("key of {0} bytes is too large")]
    KeyTooLarge(usize),

    /// Value longer than a heap entry can encode.
    #[error("value of {0} bytes is too large")]
    ValueTooLarge(usize),

    /// Tree section (or a single node record) outgrew its length field.
    #[error("tree section of {0} bytes exceeds the 32-bit offset range")]
    TreeTooLarge(usize),
}

impl Error {
    /// Build a `Corrupt` error from anything displayable.
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Error::Corrupt(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedOperator("=>".to_string());
        assert_eq!(
            format!("{}", err),
            "unsupported operator '=>', expected one of < <= > >= == !="
        );

        let err = Error::corrupt("bad magic");
        assert_eq!(format!("{}", err), "corrupt file: bad magic");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = Error::from(io_err);
        assert!(err.source().is_some());
        assert!(Error::InvalidBranchingFactor(1).source().is_none());
    }

    #[test]
    fn test_result_type_alias() {
        fn might_fail() -> Result<u32> {
            Ok(42)
        }

        assert_eq!(might_fail().unwrap(), 42);
    }
}
