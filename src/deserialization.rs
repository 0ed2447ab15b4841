use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::layout::{EMPTY_FILL, FieldKind, FieldLayout, RecordLayout, RecordType};
use crate::record::{Record, RecordSlab};
use crate::value::FieldValue;

// ─── Decode: buffer -> record tree ──────────────────────────────────────────

/// Load every slab's records from the buffer. Slot `i` of a type sits at
/// `offset + size*i`; an all-`EMPTY_FILL` slice is a vacant slot. Records
/// are renumbered to stay compact even when vacant slots interleave.
pub fn load(bytes: &[u8], slabs: &mut BTreeMap<RecordType, RecordSlab>) {
    for slab in slabs.values_mut() {
        slab.records.clear();
        slab.invalidate_names();

        let layout = slab.layout.clone();
        for slot in 0..slab.max() {
            let off = layout.offset + layout.size * slot;
            let slice = &bytes[off..off + layout.size];
            if slice.iter().all(|&b| b == EMPTY_FILL) {
                continue;
            }
            let index = slab.records.len();
            slab.records.push(decode_record(&layout, index, slice));
        }
    }
}

fn decode_record(layout: &RecordLayout, index: usize, bytes: &[u8]) -> Record {
    let mut r = Record::new(layout.rtype.clone(), index);
    for fl in &layout.fields {
        for fi in 0..fl.max.max(1) {
            let off = fl.offset + fl.kind.size() * fi;
            let value = decode_field(fl, &bytes[off..off + fl.kind.size()]);
            if fl.max > 1 && value_is_vacant(&value) {
                break;
            }
            r.push_field(fl.ftype.clone(), value);
        }
    }
    r
}

/// A vacant instance of a multi-instance field: an unset reference or an
/// empty string. Single-instance fields are always materialized.
fn value_is_vacant(value: &FieldValue) -> bool {
    match value {
        FieldValue::Ref(0) => true,
        FieldValue::Text(s) => s.is_empty(),
        _ => false,
    }
}

fn decode_field(fl: &FieldLayout, bytes: &[u8]) -> FieldValue {
    match &fl.kind {
        FieldKind::Ascii { len } => {
            let end = bytes[..*len]
                .iter()
                .position(|&b| b == 0 || b == EMPTY_FILL)
                .unwrap_or(*len);
            FieldValue::Text(SmolStr::new(String::from_utf8_lossy(&bytes[..end])))
        }
        FieldKind::Ucs2 { len } => {
            let mut units = Vec::with_capacity(*len);
            for i in 0..*len {
                let u = u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);
                if u == 0 {
                    break;
                }
                units.push(u);
            }
            FieldValue::Text(SmolStr::new(String::from_utf16_lossy(&units)))
        }
        FieldKind::Int { width, .. } => {
            let mut n = 0u64;
            for (i, &b) in bytes[..*width].iter().enumerate() {
                n |= (b as u64) << (8 * i);
            }
            FieldValue::Int(n)
        }
        FieldKind::Frequency => FieldValue::Frequency(decode_bcd_frequency(bytes)),
        FieldKind::Ref { .. } => {
            FieldValue::Ref(u16::from_le_bytes([bytes[0], bytes[1]]) as usize)
        }
    }
}

/// Eight packed BCD digits, least significant byte first; MHz = digits/1e5.
fn decode_bcd_frequency(bytes: &[u8]) -> f64 {
    let mut digits = 0u64;
    for &b in bytes[..4].iter().rev() {
        let hi = (b >> 4) as u64;
        let lo = (b & 0x0f) as u64;
        if hi > 9 || lo > 9 {
            return 0.0;
        }
        digits = digits * 100 + hi * 10 + lo;
    }
    digits as f64 / 1e5
}
