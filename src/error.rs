// Error types for filter compilation, decompilation and BER decoding.

use crate::filter_kind::FilterKind;

/// Errors raised while compiling RFC 4515 text. Each carries the offending part of the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("filter must be enclosed in parentheses: {fragment:?}")]
    Unparenthesized { fragment: String },

    /// A backslash not followed by two hex digits.
    #[error("malformed escape sequence in {fragment:?}")]
    MalformedEscape { fragment: String },

    #[error("unbalanced parentheses in {fragment:?}")]
    UnbalancedParens { fragment: String },

    /// `&` or `|` without any sub-filter.
    #[error("empty filter list in {fragment:?}")]
    EmptyFilterList { fragment: String },

    /// `!` with zero or more than one sub-filter.
    #[error("not filter needs exactly one operand: {fragment:?}")]
    MissingOperand { fragment: String },

    #[error("no recognized operator in {fragment:?}")]
    UnknownOperator { fragment: String },

    #[error("unexpected character {found:?} in {fragment:?}")]
    UnexpectedCharacter { found: char, fragment: String },

    #[error("missing attribute description in {fragment:?}")]
    EmptyAttribute { fragment: String },

    /// Two adjacent `*` in a substrings value.
    #[error("empty substring between wildcards in {fragment:?}")]
    EmptySubstring { fragment: String },

    #[error("unsupported filter kind {} in {fragment:?}", .kind.name())]
    UnsupportedFilterKind { kind: FilterKind, fragment: String },

    #[error("extra input after filter: {fragment:?}")]
    TrailingInput { fragment: String },

    #[error("filter nesting exceeds maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },
}

/// Errors raised while rendering a packet tree back to text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown filter tag 0x{identifier:02x}")]
    UnknownTag { identifier: u8 },

    #[error("malformed {} filter: {reason}", .kind.name())]
    MalformedNode { kind: FilterKind, reason: String },

    #[error("unsupported filter kind {}", .kind.name())]
    UnsupportedFilterKind { kind: FilterKind },

    #[error("filter nesting exceeds maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },
}

impl DecodeError {
    pub(crate) fn malformed(kind: FilterKind, reason: impl Into<String>) -> Self {
        DecodeError::MalformedNode {
            kind,
            reason: reason.into(),
        }
    }
}

/// Errors raised by the BER reader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BerError {
    #[error("BER truncated: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("indefinite length not supported")]
    IndefiniteLength,

    #[error("length too large: {octets} bytes")]
    LengthTooLarge { octets: usize },

    #[error("high tag numbers not supported (identifier 0x{identifier:02x})")]
    HighTagNumber { identifier: u8 },

    #[error("expected tag 0x{expected:02x}, got 0x{found:02x}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("{count} trailing bytes after element")]
    TrailingBytes { count: usize },

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("BER nesting exceeds maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Ber(#[from] BerError),
}
