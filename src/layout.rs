use smol_str::SmolStr;

// ─── Container framing ──────────────────────────────────────────────────────

pub const FILE_SIZE_RDT: usize = 262_709;
pub const FILE_SIZE_BIN: usize = 262_144;
pub const FILE_OFFSET_RDT: usize = 0;
pub const FILE_OFFSET_BIN: usize = 549;

/// Byte written into a vacant record slot. A slot whose bytes are all
/// `EMPTY_FILL` holds no record.
pub const EMPTY_FILL: u8 = 0xff;

// ─── Well-known type names ──────────────────────────────────────────────────
//
// The layout table is supplied per codeplug variant, but the frequency
// binding logic needs to find these by name when they are present.

pub const RT_RDT_HEADER: &str = "RdtHeader";
pub const RT_CHANNEL_INFORMATION: &str = "ChannelInformation";
pub const FT_LOW_FREQUENCY: &str = "LowFrequency";
pub const FT_HIGH_FREQUENCY: &str = "HighFrequency";
pub const FT_RX_FREQUENCY: &str = "RxFrequency";

// ─── Type ids ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordType(SmolStr);

impl RecordType {
    pub fn new(name: &str) -> Self {
        RecordType(SmolStr::new(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldType(SmolStr);

impl FieldType {
    pub fn new(name: &str) -> Self {
        FieldType(SmolStr::new(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

// ─── Field layout ───────────────────────────────────────────────────────────

/// Wire encoding and validation rule for one field type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Fixed-size ASCII, zero padded.
    Ascii { len: usize },
    /// Fixed-size UTF-16LE, zero padded. `len` counts code units.
    Ucs2 { len: usize },
    /// Little-endian unsigned integer of `width` bytes, valid in min..=max.
    Int { width: usize, min: u64, max: u64 },
    /// Four bytes of packed BCD, little-endian; eight digits, MHz = digits/1e5.
    Frequency,
    /// Two-byte little-endian 1-based slot in `target`'s records; 0 = unset.
    Ref { target: RecordType },
}

impl FieldKind {
    /// Encoded size of one instance in bytes.
    pub fn size(&self) -> usize {
        match self {
            FieldKind::Ascii { len } => *len,
            FieldKind::Ucs2 { len } => 2 * len,
            FieldKind::Int { width, .. } => *width,
            FieldKind::Frequency => 4,
            FieldKind::Ref { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub ftype: FieldType,
    /// Byte offset of instance 0 within the record.
    pub offset: usize,
    /// Maximum instance count; instance `i` sits at `offset + size*i`.
    pub max: usize,
    pub kind: FieldKind,
}

impl FieldLayout {
    pub fn new(name: &str, offset: usize, kind: FieldKind) -> Self {
        FieldLayout {
            ftype: FieldType::new(name),
            offset,
            max: 1,
            kind,
        }
    }

    pub fn with_max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }
}

// ─── Record layout ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    pub rtype: RecordType,
    /// Byte offset of slot 0 within the buffer.
    pub offset: usize,
    /// Per-instance size; slot `i` sits at `offset + size*i`.
    pub size: usize,
    /// Maximum instance count; 0 is treated as 1 at load time.
    pub max: usize,
    pub fields: Vec<FieldLayout>,
    /// Field type holding the record's display name, when it has one.
    pub name_field: Option<FieldType>,
}

impl RecordLayout {
    pub fn new(name: &str, offset: usize, size: usize, max: usize) -> Self {
        RecordLayout {
            rtype: RecordType::new(name),
            offset,
            size,
            max,
            fields: Vec::new(),
            name_field: None,
        }
    }

    pub fn field(mut self, fl: FieldLayout) -> Self {
        self.fields.push(fl);
        self
    }

    pub fn name_field(mut self, name: &str) -> Self {
        self.name_field = Some(FieldType::new(name));
        self
    }

    pub fn field_layout(&self, ftype: &FieldType) -> Option<&FieldLayout> {
        self.fields.iter().find(|fl| &fl.ftype == ftype)
    }
}

/// The per-variant layout table, supplied once and immutable at runtime.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub records: Vec<RecordLayout>,
}

impl Layout {
    pub fn new(records: Vec<RecordLayout>) -> Self {
        Layout { records }
    }
}
