// Filter CHOICE tags (RFC 4511 section 4.5.1) and their textual operators.

use crate::error::DecodeError;

/// One value per alternative of the `Filter` CHOICE. The discriminant is the context tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    And = 0,
    Or = 1,
    Not = 2,
    EqualityMatch = 3,
    Substrings = 4,
    GreaterOrEqual = 5,
    LessOrEqual = 6,
    Present = 7,
    ApproxMatch = 8,
    ExtensibleMatch = 9,
}

/// Diagnostic names indexed by tag number.
pub static FILTER_NAMES: [&str; 10] = [
    "And",
    "Or",
    "Not",
    "Equality Match",
    "Substrings",
    "Greater Or Equal",
    "Less Or Equal",
    "Present",
    "Approx Match",
    "Extensible Match",
];

impl FilterKind {
    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        let kind = match tag {
            0 => FilterKind::And,
            1 => FilterKind::Or,
            2 => FilterKind::Not,
            3 => FilterKind::EqualityMatch,
            4 => FilterKind::Substrings,
            5 => FilterKind::GreaterOrEqual,
            6 => FilterKind::LessOrEqual,
            7 => FilterKind::Present,
            8 => FilterKind::ApproxMatch,
            9 => FilterKind::ExtensibleMatch,
            _ => {
                return Err(DecodeError::UnknownTag {
                    identifier: 0x80 | tag,
                })
            }
        };
        Ok(kind)
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Used in diagnostics only, never in rendered filters.
    pub fn name(self) -> &'static str {
        FILTER_NAMES[self as usize]
    }

    /// Present is the only primitive alternative; its value is the attribute description.
    pub fn is_constructed(self) -> bool {
        !matches!(self, FilterKind::Present)
    }

    /// Text that follows `(` (boolean kinds) or the attribute description (item kinds).
    pub fn operator(self) -> &'static str {
        match self {
            FilterKind::And => "&",
            FilterKind::Or => "|",
            FilterKind::Not => "!",
            FilterKind::EqualityMatch | FilterKind::Substrings => "=",
            FilterKind::GreaterOrEqual => ">=",
            FilterKind::LessOrEqual => "<=",
            FilterKind::Present => "=*",
            FilterKind::ApproxMatch => "~=",
            FilterKind::ExtensibleMatch => ":=",
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Alternatives of the substring CHOICE inside a SubstringFilter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstringKind {
    Initial = 0,
    Any = 1,
    Final = 2,
}

impl SubstringKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SubstringKind::Initial),
            1 => Some(SubstringKind::Any),
            2 => Some(SubstringKind::Final),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            SubstringKind::Initial => "Substrings Initial",
            SubstringKind::Any => "Substrings Any",
            SubstringKind::Final => "Substrings Final",
        }
    }
}
