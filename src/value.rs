use smol_str::SmolStr;

use crate::error::Position;

// ─── FieldValue ─────────────────────────────────────────────────────────────

/// The typed value slot of a field.
///
/// `Deferred` holds a cross-reference parsed from text whose target record
/// may not exist yet; it keeps the original text and source position so a
/// failed resolution can be reported where it was written.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(u64),
    Text(SmolStr),
    Frequency(f64),
    /// 1-based slot into another record type's records; 0 means unset.
    Ref(usize),
    Deferred {
        text: SmolStr,
        pos: Position,
    },
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Int(0)
    }
}

impl FieldValue {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            FieldValue::Deferred { text, .. } => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_frequency(&self) -> Option<f64> {
        match self {
            FieldValue::Frequency(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_ref_index(&self) -> Option<usize> {
        match self {
            FieldValue::Ref(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, FieldValue::Deferred { .. })
    }
}

// ─── From impls ─────────────────────────────────────────────────────────────

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Frequency(f)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(SmolStr::from(s))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(SmolStr::from(s))
    }
}
