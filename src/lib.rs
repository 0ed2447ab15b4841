//! Access to fixed-size binary codeplug images for two-way-radio devices.
//!
//! A codeplug is exposed as a structured, mutable collection of typed
//! records and fields with round-trip fidelity to the binary layout, a
//! human-editable text serialization, and an undo/redo-capable change log.
//! The per-device layout tables are supplied by the caller as [`Layout`]
//! metadata.

pub mod change;
pub mod codeplug;
pub mod error;
pub mod layout;
pub mod record;
pub mod registry;
pub mod text;
pub mod validate;
pub mod value;

mod deserialization;
mod serialization;


pub use change::{Change, ChangeListener};
pub use codeplug::{Codeplug, Variant};
pub use error::{Error, Position};
pub use layout::{FieldKind, FieldLayout, FieldType, Layout, RecordLayout, RecordType};
pub use record::{Field, Record};
pub use registry::Registry;
pub use validate::{FREQUENCY_RANGES, FrequencyRange};
pub use value::FieldValue;
