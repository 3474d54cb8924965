use thiserror::Error;

/// The document could not be opened or its structure is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("cannot read document: {0}")]
    Io(String),
    #[error("malformed document structure: {0}")]
    Structure(String),
    #[error("text extraction failed: {0}")]
    Text(String),
}

/// A content hash that is not 64 hexadecimal characters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashValidationError {
    #[error("expected 64 hex characters, got {0}")]
    Length(usize),
    #[error("non-hex character {ch:?} at position {position}")]
    NonHex { ch: char, position: usize },
}
