use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::change::{Change, ChangeListener, ChangeLog};
use crate::deserialization;
use crate::error::Error;
use crate::layout::{
    FILE_OFFSET_BIN, FILE_OFFSET_RDT, FILE_SIZE_BIN, FILE_SIZE_RDT, FieldType, Layout, RecordType,
    RT_RDT_HEADER,
};
use crate::record::{Field, Record, RecordSlab};
use crate::serialization;
use crate::value::FieldValue;

// ─── Variant ────────────────────────────────────────────────────────────────

/// On-disk container shape, distinguished only by total file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    None,
    Rdt,
    Bin,
}

impl Variant {
    pub fn file_size(self) -> usize {
        match self {
            Variant::Rdt => FILE_SIZE_RDT,
            Variant::Bin => FILE_SIZE_BIN,
            Variant::None => 0,
        }
    }

    /// Offset of the variant's payload inside the full-size buffer.
    pub fn payload_offset(self) -> usize {
        match self {
            Variant::Rdt => FILE_OFFSET_RDT,
            Variant::Bin => FILE_OFFSET_BIN,
            Variant::None => 0,
        }
    }

    fn from_size(size: usize) -> Option<Variant> {
        match size {
            FILE_SIZE_RDT => Some(Variant::Rdt),
            FILE_SIZE_BIN => Some(Variant::Bin),
            _ => None,
        }
    }
}

// ─── Codeplug ───────────────────────────────────────────────────────────────

/// The aggregate root: a codeplug file held as a structured record tree.
///
/// The byte buffer always reflects the last loaded or saved state; record
/// mutations are only flushed into a private copy for digest and save
/// computation, never into the authoritative buffer.
#[derive(Debug)]
pub struct Codeplug {
    pub(crate) path: PathBuf,
    pub(crate) variant: Variant,
    pub(crate) bytes: Vec<u8>,
    pub(crate) hash: [u8; 32],
    pub(crate) slabs: BTreeMap<RecordType, RecordSlab>,
    pub(crate) changed: bool,
    pub(crate) low_frequency: f64,
    pub(crate) high_frequency: f64,
    pub(crate) id: String,
    pub(crate) log: ChangeLog,
}

impl Codeplug {
    // ════════════════════════════════════════════════════════════════════════
    // Construction
    // ════════════════════════════════════════════════════════════════════════

    /// Open the codeplug file at `path`. The variant is sniffed from the
    /// exact file size; any other size is a format error.
    pub fn open(path: impl AsRef<Path>, layout: &Layout) -> Result<Self, Error> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)?;
        let Some(variant) = Variant::from_size(metadata.len() as usize) else {
            return Err(Error::Format(path.display().to_string()));
        };

        let mut bytes = vec![0u8; FILE_SIZE_RDT];
        let mut file = fs::File::open(path)?;
        let off = variant.payload_offset();
        file.read_exact(&mut bytes[off..off + variant.file_size()])?;

        let mut cp = Codeplug::from_parts(path.to_path_buf(), variant, bytes, layout);
        cp.revert()?;
        debug!(path = %cp.path.display(), variant = ?cp.variant, "opened codeplug");
        Ok(cp)
    }

    /// Build a codeplug from an in-memory image. The buffer length selects
    /// the variant exactly as a file's size would.
    pub fn from_bytes(bytes: Vec<u8>, layout: &Layout) -> Result<Self, Error> {
        let Some(variant) = Variant::from_size(bytes.len()) else {
            return Err(Error::Format(format!("{}-byte buffer", bytes.len())));
        };
        let mut full = vec![0u8; FILE_SIZE_RDT];
        let off = variant.payload_offset();
        full[off..off + variant.file_size()].copy_from_slice(&bytes);

        let mut cp = Codeplug::from_parts(PathBuf::new(), variant, full, layout);
        cp.revert()?;
        Ok(cp)
    }

    fn from_parts(path: PathBuf, variant: Variant, bytes: Vec<u8>, layout: &Layout) -> Self {
        let mut slabs = BTreeMap::new();
        for rl in &layout.records {
            slabs.insert(rl.rtype.clone(), RecordSlab::new(rl.clone()));
        }
        Codeplug {
            path,
            variant,
            bytes,
            hash: [0; 32],
            slabs,
            changed: false,
            low_frequency: 0.0,
            high_frequency: 0.0,
            id: random_id(),
            log: ChangeLog::new(),
        }
    }

    /// Revert to the state of the most recent open or save: reload the
    /// record tree from the authoritative buffer, revalidate, rebaseline the
    /// digest, and reset the change history.
    pub fn revert(&mut self) -> Result<(), Error> {
        let bytes = std::mem::take(&mut self.bytes);
        deserialization::load(&bytes, &mut self.slabs);
        self.bytes = bytes;
        self.low_frequency = 0.0;
        self.high_frequency = 0.0;

        self.valid()?;

        self.changed = false;
        self.hash = digest(&self.bytes);
        self.log.reset();
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Saving and change detection
    // ════════════════════════════════════════════════════════════════════════

    pub fn save(&mut self) -> Result<(), Error> {
        let path = self.path.clone();
        self.save_as(path)
    }

    /// Save into `path` and make it the codeplug's file: the encoded bytes
    /// become the authoritative buffer and the new dirty baseline.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.valid()?;
        let bytes = self.encoded_bytes();
        self.write_atomic(path.as_ref(), &bytes)?;

        self.path = path.as_ref().to_path_buf();
        self.bytes = bytes;
        self.hash = digest(&self.bytes);
        self.changed = false;
        self.log.reset();
        debug!(path = %self.path.display(), "saved codeplug");
        Ok(())
    }

    /// Write the current state into `path` without changing any codeplug
    /// state. Suitable for autosave.
    pub fn save_to_file(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.valid()?;
        let bytes = self.encoded_bytes();
        self.write_atomic(path.as_ref(), &bytes)
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), Error> {
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };
        let off = self.variant.payload_offset();
        tmp.write_all(&bytes[off..off + self.variant.file_size()])?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Encode the record tree into a private copy of the buffer; the
    /// authoritative buffer is never touched here.
    pub(crate) fn encoded_bytes(&self) -> Vec<u8> {
        let mut copy = self.bytes.clone();
        serialization::store(&self.slabs, &mut copy);
        copy
    }

    /// Digest of the current (possibly modified) state, without side
    /// effects. Usable for external change detection.
    pub fn current_hash(&self) -> [u8; 32] {
        if !self.changed {
            return self.hash;
        }
        digest(&self.encoded_bytes())
    }

    /// True when the state differs from the most recent open or save.
    pub fn changed(&self) -> bool {
        self.changed && self.current_hash() != self.hash
    }

    // ════════════════════════════════════════════════════════════════════════
    // Accessors
    // ════════════════════════════════════════════════════════════════════════

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// All record types in name order, excluding the header type.
    pub fn record_types(&self) -> Vec<RecordType> {
        self.slabs
            .keys()
            .filter(|rt| rt.as_str() != RT_RDT_HEADER)
            .cloned()
            .collect()
    }

    pub fn records(&self, rtype: &RecordType) -> &[Record] {
        self.slabs
            .get(rtype)
            .map(|s| s.records.as_slice())
            .unwrap_or(&[])
    }

    /// The first record of the given type.
    pub fn record(&self, rtype: &RecordType) -> Option<&Record> {
        self.records(rtype).first()
    }

    pub fn max_records(&self, rtype: &RecordType) -> usize {
        self.slabs.get(rtype).map(|s| s.max()).unwrap_or(0)
    }

    pub(crate) fn slab(&self, rtype: &RecordType) -> Option<&RecordSlab> {
        self.slabs.get(rtype)
    }

    /// A fresh, empty record of the given type positioned for appending.
    pub fn new_record(&self, rtype: &RecordType) -> Option<Record> {
        let slab = self.slabs.get(rtype)?;
        Some(Record::new(rtype.clone(), slab.records.len()))
    }

    /// The display text of a field, resolving cross-references to the name
    /// of the record they point at.
    pub fn field_text(&self, rtype: &RecordType, field: &Field) -> String {
        match &field.value {
            FieldValue::Int(n) => n.to_string(),
            FieldValue::Text(s) => s.to_string(),
            FieldValue::Frequency(f) => format!("{}", f),
            FieldValue::Deferred { text, .. } => text.to_string(),
            FieldValue::Ref(n) => self.ref_text(rtype, &field.ftype, *n),
        }
    }

    fn ref_text(&self, rtype: &RecordType, ftype: &FieldType, n: usize) -> String {
        if n == 0 {
            return String::new();
        }
        let target = self
            .slab(rtype)
            .and_then(|s| s.layout.field_layout(ftype))
            .and_then(|fl| match &fl.kind {
                crate::layout::FieldKind::Ref { target } => Some(target.clone()),
                _ => None,
            });
        match target {
            Some(target) => {
                let slab = self.slab(&target);
                slab.and_then(|s| s.records.get(n - 1).and_then(|r| s.name_of(r)))
                    .map(str::to_string)
                    .unwrap_or_else(|| n.to_string())
            }
            None => n.to_string(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Mutation
    // ════════════════════════════════════════════════════════════════════════

    pub fn set_listener(&mut self, listener: Box<dyn ChangeListener>) {
        self.log.set_listener(listener);
    }

    /// Insert the record at its requested index; later siblings shift up and
    /// every sibling is renumbered. A name colliding with an existing
    /// sibling name is mechanically made unique first.
    pub fn insert_record(&mut self, record: Record) -> Result<usize, Error> {
        let slab = self
            .slabs
            .get_mut(&record.rtype)
            .ok_or_else(|| Error::Consistency(format!("no such record type: {}", record.rtype)))?;
        if slab.records.len() >= slab.max() {
            return Err(Error::CapacityExceeded);
        }
        let mut record = record;
        slab.unique_name(&mut record);
        let at = slab.splice_in(record);
        let snapshot = slab.records[at].clone();

        self.changed = true;
        self.log.record(Change::InsertRecord { record: snapshot });
        Ok(at)
    }

    /// Remove the record at `index`. An out-of-range index is an internal
    /// consistency bug, not a user error.
    pub fn remove_record(&mut self, rtype: &RecordType, index: usize) -> Result<Record, Error> {
        let slab = self
            .slabs
            .get_mut(rtype)
            .ok_or_else(|| Error::Consistency(format!("no such record type: {}", rtype)))?;
        if index >= slab.records.len() {
            return Err(Error::Consistency(format!(
                "remove of missing {} record {}",
                rtype, index
            )));
        }
        let removed = slab.splice_out(index);

        self.changed = true;
        self.log.record(Change::RemoveRecord {
            record: removed.clone(),
        });
        Ok(removed)
    }

    /// Move the record at `from` so it ends up at `to`. The destination is
    /// decremented when it lies past the source, preserving the intended
    /// final position after the intervening shift.
    pub fn move_record(&mut self, rtype: &RecordType, from: usize, to: usize) -> Result<(), Error> {
        let slab = self
            .slabs
            .get_mut(rtype)
            .ok_or_else(|| Error::Consistency(format!("no such record type: {}", rtype)))?;
        if from >= slab.records.len() {
            return Err(Error::Consistency(format!(
                "move of missing {} record {}",
                rtype, from
            )));
        }
        if to > slab.records.len() {
            return Err(Error::Consistency(format!(
                "move of {} record {} to out-of-range position {}",
                rtype, from, to
            )));
        }
        let dest = if from < to { to - 1 } else { to };
        let mut r = slab.splice_out(from);
        r.index = dest;
        let at = slab.splice_in(r);

        self.changed = true;
        self.log.record(Change::MoveRecord {
            rtype: rtype.clone(),
            from,
            to: at,
        });
        Ok(())
    }

    /// Replace one field instance's value.
    pub fn set_field(
        &mut self,
        rtype: &RecordType,
        record: usize,
        ftype: &FieldType,
        field: usize,
        value: FieldValue,
    ) -> Result<(), Error> {
        let slab = self
            .slabs
            .get_mut(rtype)
            .ok_or_else(|| Error::Consistency(format!("no such record type: {}", rtype)))?;
        let r = slab.records.get_mut(record).ok_or_else(|| {
            Error::Consistency(format!("edit of missing {} record {}", rtype, record))
        })?;
        let f = r.field_mut(ftype, field).ok_or_else(|| {
            Error::Consistency(format!("edit of missing field {}[{}]", ftype, field))
        })?;
        let old = std::mem::replace(&mut f.value, value.clone());
        slab.invalidate_names();

        self.changed = true;
        self.log.record(Change::EditField {
            rtype: rtype.clone(),
            record,
            ftype: ftype.clone(),
            field,
            old,
            new: value,
        });
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Undo / redo
    // ════════════════════════════════════════════════════════════════════════

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    /// Invert the change at the current position. Returns false at the
    /// sentinel.
    pub fn undo(&mut self) -> bool {
        let Some(change) = self.log.step_back() else {
            return false;
        };
        self.apply_inverse(&change);
        self.changed = true;
        self.log.publish(&change);
        true
    }

    /// Reapply the change past the current position.
    pub fn redo(&mut self) -> bool {
        let Some(change) = self.log.step_forward() else {
            return false;
        };
        self.apply(&change);
        self.changed = true;
        self.log.publish(&change);
        true
    }

    fn apply(&mut self, change: &Change) {
        match change {
            Change::None => {}
            Change::InsertRecord { record } => {
                if let Some(slab) = self.slabs.get_mut(&record.rtype) {
                    slab.splice_in(record.clone());
                }
            }
            Change::RemoveRecord { record } => {
                if let Some(slab) = self.slabs.get_mut(&record.rtype) {
                    slab.splice_out(record.index);
                }
            }
            Change::MoveRecord { rtype, from, to } => {
                if let Some(slab) = self.slabs.get_mut(rtype) {
                    let mut r = slab.splice_out(*from);
                    r.index = *to;
                    slab.splice_in(r);
                }
            }
            Change::EditField {
                rtype,
                record,
                ftype,
                field,
                new,
                ..
            } => {
                if let Some(slab) = self.slabs.get_mut(rtype) {
                    if let Some(r) = slab.records.get_mut(*record) {
                        r.set_field(ftype, *field, new.clone());
                    }
                    slab.invalidate_names();
                }
            }
        }
    }

    fn apply_inverse(&mut self, change: &Change) {
        match change {
            Change::None => {}
            Change::InsertRecord { record } => {
                if let Some(slab) = self.slabs.get_mut(&record.rtype) {
                    slab.splice_out(record.index);
                }
            }
            Change::RemoveRecord { record } => {
                if let Some(slab) = self.slabs.get_mut(&record.rtype) {
                    slab.splice_in(record.clone());
                }
            }
            Change::MoveRecord { rtype, from, to } => {
                if let Some(slab) = self.slabs.get_mut(rtype) {
                    let mut r = slab.splice_out(*to);
                    r.index = *from;
                    slab.splice_in(r);
                }
            }
            Change::EditField {
                rtype,
                record,
                ftype,
                field,
                old,
                ..
            } => {
                if let Some(slab) = self.slabs.get_mut(rtype) {
                    if let Some(r) = slab.records.get_mut(*record) {
                        r.set_field(ftype, *field, old.clone());
                    }
                    slab.invalidate_names();
                }
            }
        }
    }
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}
