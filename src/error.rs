//! Error type shared by all dictionary operations.

use thiserror::Error;

/// Non-fatal failures reported by [`Dict`](crate::Dict).
///
/// Callers decide whether a variant is an error in their context: a
/// "set if absent" path treats `DuplicateKey` as the expected outcome.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictError {
    #[error("key already exists")]
    DuplicateKey,
    #[error("key not found")]
    KeyNotFound,
    #[error("a rehash is already in progress")]
    AlreadyRehashing,
    #[error("resizing is disabled by the resize policy")]
    ResizeDisabled,
    #[error("requested size {requested} is smaller than the {len} stored entries")]
    InvalidSize { requested: usize, len: usize },
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}

#[cfg(test)]
mod tests {
    use super::DictError;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(DictError::DuplicateKey.to_string(), "key already exists");
        assert_eq!(
            DictError::InvalidSize {
                requested: 2,
                len: 9
            }
            .to_string(),
            "requested size 2 is smaller than the 9 stored entries"
        );
        assert_eq!(
            DictError::InvalidState("no table").to_string(),
            "invalid state: no table"
        );
    }
}
