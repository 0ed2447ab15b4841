use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::codeplug::Codeplug;
use crate::deserialization;
use crate::error::{Error, Position};
use crate::layout::{FieldKind, FieldType, RecordType};
use crate::record::Record;
use crate::text::reader::Reader;
use crate::value::FieldValue;

// ─── Grammar -> records ─────────────────────────────────────────────────────
//
// record := NAME ('[' INT ']')? ':' field*
// field  := NAME ('[' INT ']')? ':' value
//
// A new record begins only when a name token starts at column 0; every
// name:value pair at a non-zero column belongs to the current record.

impl Codeplug {
    /// Parse text into fresh records. Nothing is inserted into the codeplug;
    /// cross-reference fields come back as deferred values carrying their
    /// source position. A field's `[n]` bracket selects its instance slot;
    /// the slot must be within the layout maximum and not yet occupied.
    pub fn parse_records(&self, text: &str) -> Result<Vec<Record>, Error> {
        let mut rdr = Reader::new(text);
        let mut records = Vec::new();

        let mut name_to_rt: FxHashMap<SmolStr, RecordType> = FxHashMap::default();
        let mut name_to_ft: FxHashMap<RecordType, FxHashMap<SmolStr, FieldType>> =
            FxHashMap::default();
        for rtype in self.record_types() {
            name_to_rt.insert(SmolStr::new(rtype.as_str()), rtype.clone());
            let mut fields = FxHashMap::default();
            if let Some(slab) = self.slab(&rtype) {
                for fl in &slab.layout.fields {
                    fields.insert(SmolStr::new(fl.ftype.as_str()), fl.ftype.clone());
                }
            }
            name_to_ft.insert(rtype, fields);
        }

        loop {
            if rdr.peek().is_none() {
                break;
            }
            let pos = rdr.pos();
            let Some((name, index)) = parse_name(&mut rdr, "record")? else {
                break;
            };
            let Some(rtype) = name_to_rt.get(name.as_str()).cloned() else {
                return Err(Error::grammar(pos, format!("unknown record type: {}", name)));
            };
            let mut r = Record::new(rtype.clone(), index);
            let fields = &name_to_ft[&rtype];

            loop {
                if rdr.pos().column == 0 || rdr.peek().is_none() {
                    break;
                }
                let fpos = rdr.pos();
                let Some((fname, findex)) = parse_name(&mut rdr, "field")? else {
                    break;
                };
                let Some(ftype) = fields.get(fname.as_str()).cloned() else {
                    return Err(Error::grammar(fpos, format!("bad field name: {}", fname)));
                };
                let vpos = rdr.pos();
                let text = parse_value(&mut rdr)?;
                let value = self.field_value_from_text(&rtype, &ftype, &text, vpos)?;

                let max = self
                    .slab(&rtype)
                    .and_then(|s| s.layout.field_layout(&ftype))
                    .map(|fl| fl.max.max(1))
                    .unwrap_or(1);
                if findex >= max {
                    return Err(Error::grammar(
                        fpos,
                        format!("too many {} fields", ftype),
                    ));
                }
                if !r.place_field(ftype.clone(), findex, value) {
                    return Err(Error::grammar(
                        fpos,
                        format!("duplicate {} field", ftype),
                    ));
                }
            }

            records.push(r);
        }

        Ok(records)
    }

    /// Convert a parsed value string into a typed field value. Cross
    /// references cannot be resolved until every record is present, so they
    /// become deferred values.
    fn field_value_from_text(
        &self,
        rtype: &RecordType,
        ftype: &FieldType,
        text: &str,
        pos: Position,
    ) -> Result<FieldValue, Error> {
        let kind = self
            .slab(rtype)
            .and_then(|s| s.layout.field_layout(ftype))
            .map(|fl| fl.kind.clone())
            .ok_or_else(|| {
                Error::Consistency(format!("no layout for field {} of {}", ftype, rtype))
            })?;
        match kind {
            FieldKind::Ascii { .. } | FieldKind::Ucs2 { .. } => {
                Ok(FieldValue::Text(SmolStr::new(text)))
            }
            FieldKind::Int { .. } => text
                .parse::<u64>()
                .map(FieldValue::Int)
                .map_err(|_| Error::grammar(pos, format!("no {}: {}", ftype, text))),
            FieldKind::Frequency => text
                .parse::<f64>()
                .map(FieldValue::Frequency)
                .map_err(|_| Error::grammar(pos, format!("no {}: {}", ftype, text))),
            FieldKind::Ref { .. } => Ok(FieldValue::Deferred {
                text: SmolStr::new(text),
                pos,
            }),
        }
    }

    // ── Import ──────────────────────────────────────────────────────────────

    pub fn import_from(&mut self, path: impl AsRef<Path>) -> Result<(), Error> {
        let text = fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "importing codeplug text");
        self.import_str(&text)
    }

    /// Transactional import: on any parse, deferred-resolution, or
    /// emptiness failure the pre-import state is reloaded from a snapshot
    /// and the error surfaced; only full success replaces the records,
    /// resets the change history, and marks the codeplug dirty.
    pub fn import_str(&mut self, text: &str) -> Result<(), Error> {
        let snapshot = self.encoded_bytes();

        for rtype in self.record_types() {
            if let Some(slab) = self.slabs.get_mut(&rtype) {
                slab.records.clear();
                slab.invalidate_names();
            }
        }

        match self.import_records(text) {
            Ok(()) => {
                self.log.reset();
                self.changed = true;
                Ok(())
            }
            Err(e) => {
                deserialization::load(&snapshot, &mut self.slabs);
                Err(e)
            }
        }
    }

    fn import_records(&mut self, text: &str) -> Result<(), Error> {
        let records = self.parse_records(text)?;

        for mut r in records {
            let slab = self
                .slabs
                .get_mut(&r.rtype)
                .ok_or_else(|| Error::Consistency(format!("no such record type: {}", r.rtype)))?;
            if slab.records.len() >= slab.max() {
                return Err(Error::CapacityExceeded);
            }
            r.index = slab.records.len();
            slab.unique_name(&mut r);
            slab.splice_in(r);
        }

        self.resolve_deferred()?;

        for slab in self.slabs.values() {
            if slab.records.is_empty() {
                return Err(Error::Validation(format!(
                    "no {} records found",
                    slab.rtype()
                )));
            }
        }
        Ok(())
    }
}

// ─── Productions ────────────────────────────────────────────────────────────

/// NAME ('[' INT ']')? ':' followed by any whitespace. Returns the name and
/// the 0-based index (`[n]` is 1-based on the wire). `Ok(None)` is a clean
/// end of input.
fn parse_name(rdr: &mut Reader, what: &str) -> Result<Option<(String, usize)>, Error> {
    let pos = rdr.pos();
    let name = rdr.read_while(|c| c.is_alphanumeric());
    if name.is_empty() || !name.chars().next().is_some_and(char::is_alphabetic) {
        if rdr.peek().is_none() && name.is_empty() {
            return Ok(None);
        }
        return Err(Error::grammar(pos, format!("bad {} name", what)));
    }

    let mut index = 0usize;
    let pos = rdr.pos();
    match rdr.read() {
        Some(':') => {}
        Some('[') => {
            let ipos = rdr.pos();
            let digits = rdr.read_while(|c| c.is_ascii_digit());
            let n: usize = digits
                .parse()
                .map_err(|_| Error::grammar(ipos, format!("bad {} index", what)))?;
            if n == 0 {
                return Err(Error::grammar(ipos, format!("bad {} index", what)));
            }
            index = n - 1;
            let cpos = rdr.pos();
            if rdr.read() != Some(']') {
                return Err(Error::grammar(cpos, format!("bad {} index", what)));
            }
            let cpos = rdr.pos();
            if rdr.read() != Some(':') {
                return Err(Error::grammar(cpos, format!("bad {} name", what)));
            }
        }
        None => return Ok(None),
        Some(_) => return Err(Error::grammar(pos, format!("bad {} index", what))),
    }
    rdr.skip_whitespace();

    Ok(Some((name, index)))
}

/// QUOTED or BARE. A quoted value ends at an unescaped `"`; a bare value
/// ends at whitespace, and an unescaped `"` inside it is a grammar error.
/// The escapes \" \\ \n \t \r are decoded.
fn parse_value(rdr: &mut Reader) -> Result<String, Error> {
    let pos = rdr.pos();
    match rdr.read() {
        None => Err(Error::grammar(pos, "missing value")),
        Some('"') => {
            let mut s = String::new();
            loop {
                let Some(c) = rdr.read() else {
                    return Err(Error::grammar(pos, "unterminated quoted value"));
                };
                match c {
                    '\\' => {
                        let Some(e) = rdr.read() else {
                            return Err(Error::grammar(pos, "unterminated quoted value"));
                        };
                        s.push(unescape(e));
                    }
                    '"' => break,
                    other => s.push(other),
                }
            }
            rdr.skip_whitespace();
            Ok(s)
        }
        Some(_) => {
            rdr.unread();
            let mut s = String::new();
            loop {
                let cpos = rdr.pos();
                let Some(c) = rdr.read() else {
                    break;
                };
                match c {
                    '\\' => {
                        let Some(e) = rdr.read() else {
                            break;
                        };
                        s.push(unescape(e));
                    }
                    '"' => {
                        return Err(Error::grammar(
                            cpos,
                            "bare '\"' not allowed in field value",
                        ));
                    }
                    c if c.is_whitespace() => {
                        rdr.unread();
                        break;
                    }
                    other => s.push(other),
                }
            }
            rdr.skip_whitespace();
            Ok(s)
        }
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        other => other,
    }
}
