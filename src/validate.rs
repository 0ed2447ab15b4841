use smol_str::SmolStr;

use crate::codeplug::Codeplug;
use crate::error::{Error, Position};
use crate::layout::{
    FT_HIGH_FREQUENCY, FT_LOW_FREQUENCY, FT_RX_FREQUENCY, FieldKind, FieldLayout, FieldType,
    RT_CHANNEL_INFORMATION, RT_RDT_HEADER, RecordType,
};
use crate::record::{Field, Record, RecordSlab};
use crate::value::FieldValue;

// ─── Frequency bands ────────────────────────────────────────────────────────

/// An inclusive range of frequencies in MHz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyRange {
    pub low: f64,
    pub high: f64,
}

/// Known device bands in priority order. The last entry overlaps the two
/// before it; when only it matches, the device's true band is unknowable
/// from channel data alone and the documented two-step disambiguation in
/// `check_frequency` applies.
pub const FREQUENCY_RANGES: [FrequencyRange; 5] = [
    FrequencyRange {
        low: 136.0,
        high: 174.0,
    },
    FrequencyRange {
        low: 350.0,
        high: 400.0,
    },
    FrequencyRange {
        low: 400.0,
        high: 480.0,
    },
    FrequencyRange {
        low: 450.0,
        high: 520.0,
    },
    FrequencyRange {
        low: 450.0,
        high: 480.0,
    },
];

/// Check `freq` against the bound range. A miss while the ambiguous band is
/// bound retries the two specific bands it aliases before failing, rebinding
/// the range on a hit.
fn check_frequency(range: &mut (f64, f64), freq: f64) -> bool {
    if freq >= range.0 && freq <= range.1 {
        return true;
    }
    let last = FREQUENCY_RANGES[FREQUENCY_RANGES.len() - 1];
    if range.0 != last.low || range.1 != last.high {
        return false;
    }
    for r in &FREQUENCY_RANGES[2..=3] {
        if freq >= r.low && freq <= r.high {
            *range = (r.low, r.high);
            return true;
        }
    }
    false
}

fn freq_of(f: &Field) -> Option<f64> {
    match &f.value {
        FieldValue::Frequency(x) => Some(*x),
        FieldValue::Text(s) => s.parse().ok(),
        _ => None,
    }
}

// ─── Validation pass ────────────────────────────────────────────────────────

impl Codeplug {
    /// Validate every field of every record plus all deferred fields,
    /// collecting every problem into one report rather than stopping at the
    /// first.
    pub fn valid(&mut self) -> Result<(), Error> {
        self.ensure_frequency_range();
        let mut range = (self.low_frequency, self.high_frequency);

        let mut report = String::new();
        for slab in self.slabs.values() {
            for r in &slab.records {
                for fl in &slab.layout.fields {
                    for f in r.fields(&fl.ftype) {
                        if let Err(msg) = self.field_valid(slab, fl, f, &mut range) {
                            report.push_str(&format!(
                                "{} {}: {}\n",
                                record_label(slab, r),
                                fl.ftype,
                                msg
                            ));
                        }
                    }
                }
            }
        }
        (self.low_frequency, self.high_frequency) = range;

        if report.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(report))
        }
    }

    fn field_valid(
        &self,
        slab: &RecordSlab,
        fl: &FieldLayout,
        f: &Field,
        range: &mut (f64, f64),
    ) -> Result<(), String> {
        match (&fl.kind, &f.value) {
            (FieldKind::Ascii { len }, FieldValue::Text(s)) => {
                if s.len() > *len {
                    return Err(format!("name too long: {}", s));
                }
                if s.is_empty() && slab.layout.name_field.as_ref() == Some(&fl.ftype) {
                    return Err("empty name".to_string());
                }
                Ok(())
            }
            (FieldKind::Ucs2 { len }, FieldValue::Text(s)) => {
                if s.encode_utf16().count() > *len {
                    return Err(format!("name too long: {}", s));
                }
                if s.is_empty() && slab.layout.name_field.as_ref() == Some(&fl.ftype) {
                    return Err("empty name".to_string());
                }
                Ok(())
            }
            (FieldKind::Int { min, max, .. }, FieldValue::Int(n)) => {
                if n < min || n > max {
                    return Err(format!("value {} not in {}..={}", n, min, max));
                }
                Ok(())
            }
            (FieldKind::Frequency, FieldValue::Frequency(x)) => {
                if !check_frequency(range, *x) {
                    return Err(format!("frequency out of range {}", x));
                }
                Ok(())
            }
            (FieldKind::Ref { .. }, FieldValue::Ref(0)) => Ok(()),
            (FieldKind::Ref { target }, FieldValue::Ref(n)) => {
                if *n > self.records(target).len() {
                    return Err(format!("invalid {} reference {}", target, n));
                }
                Ok(())
            }
            (_, FieldValue::Deferred { text, .. }) => Err(format!("no {}: {}", fl.ftype, text)),
            _ => Err("unexpected value kind".to_string()),
        }
    }

    /// Resolve every deferred cross-reference against the now-complete
    /// record set, failing with the field's original text and source
    /// position when the named record does not exist.
    pub(crate) fn resolve_deferred(&mut self) -> Result<(), Error> {
        struct Pending {
            rtype: RecordType,
            record: usize,
            ftype: FieldType,
            field: usize,
            text: SmolStr,
            pos: Position,
            target: RecordType,
        }

        let mut pending = Vec::new();
        for slab in self.slabs.values() {
            for r in &slab.records {
                for fl in &slab.layout.fields {
                    let FieldKind::Ref { target } = &fl.kind else {
                        continue;
                    };
                    for f in r.fields(&fl.ftype) {
                        if let FieldValue::Deferred { text, pos } = &f.value {
                            pending.push(Pending {
                                rtype: slab.rtype().clone(),
                                record: r.index,
                                ftype: fl.ftype.clone(),
                                field: f.index,
                                text: text.clone(),
                                pos: *pos,
                                target: target.clone(),
                            });
                        }
                    }
                }
            }
        }

        for p in pending {
            let resolved = self.slab(&p.target).and_then(|slab| {
                slab.records
                    .iter()
                    .position(|r| slab.name_of(r) == Some(p.text.as_str()))
            });
            let Some(slot) = resolved else {
                return Err(Error::grammar(p.pos, format!("no {}: {}", p.ftype, p.text)));
            };
            if let Some(slab) = self.slabs.get_mut(&p.rtype) {
                if let Some(r) = slab.records.get_mut(p.record) {
                    r.set_field(&p.ftype, p.field, FieldValue::Ref(slot + 1));
                }
            }
        }
        Ok(())
    }

    // ── Frequency binding ───────────────────────────────────────────────────

    /// Bind the valid frequency range: declared header bounds when present,
    /// otherwise inferred from channel receive frequencies.
    fn ensure_frequency_range(&mut self) {
        if self.low_frequency != 0.0 {
            return;
        }

        let header = RecordType::new(RT_RDT_HEADER);
        if let Some(r) = self.record(&header) {
            let low = r
                .field(&FieldType::new(FT_LOW_FREQUENCY))
                .and_then(freq_of);
            let high = r
                .field(&FieldType::new(FT_HIGH_FREQUENCY))
                .and_then(freq_of);
            if let (Some(low), Some(high)) = (low, high) {
                if low != 0.0 {
                    self.low_frequency = low;
                    self.high_frequency = high;
                    return;
                }
            }
        }

        let (low, high) = self.infer_frequency_range();
        self.low_frequency = low;
        self.high_frequency = high;
    }

    /// Guess the device band from channel receive frequencies: scan the band
    /// table from the most specific entry upward and take the first
    /// non-ambiguous band holding a real recorded value. When every recorded
    /// frequency only matches the ambiguous entry, that entry stands.
    pub fn infer_frequency_range(&self) -> (f64, f64) {
        let mut rang = FrequencyRange {
            low: 0.0,
            high: 0.0,
        };
        let channel = RecordType::new(RT_CHANNEL_INFORMATION);
        let rx = FieldType::new(FT_RX_FREQUENCY);

        for r in self.records(&channel) {
            let Some(freq) = r.field(&rx).and_then(freq_of) else {
                continue;
            };
            let mut index = None;
            for i in (0..FREQUENCY_RANGES.len()).rev() {
                rang = FREQUENCY_RANGES[i];
                if freq >= rang.low && freq <= rang.high {
                    index = Some(i);
                    break;
                }
            }
            match index {
                None => continue,
                Some(i) if i != FREQUENCY_RANGES.len() - 1 => return (rang.low, rang.high),
                Some(_) => {}
            }
        }

        (rang.low, rang.high)
    }

    /// Check a target frequency against the codeplug's bound range.
    pub fn frequency_valid(&mut self, freq: f64) -> Result<(), Error> {
        self.ensure_frequency_range();
        let mut range = (self.low_frequency, self.high_frequency);
        let ok = check_frequency(&mut range, freq);
        (self.low_frequency, self.high_frequency) = range;
        if ok {
            Ok(())
        } else {
            Err(Error::Validation(format!("frequency out of range {}", freq)))
        }
    }
}

fn record_label(slab: &RecordSlab, r: &Record) -> String {
    if slab.max() > 1 {
        format!("{}[{}]", slab.rtype(), r.index + 1)
    } else {
        slab.rtype().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_band_rebinds_to_specific_band() {
        let mut range = (450.0, 480.0);
        assert!(check_frequency(&mut range, 460.0));
        assert_eq!(range, (450.0, 480.0));

        // 500 MHz only fits 450-520; the range rebinds.
        assert!(check_frequency(&mut range, 500.0));
        assert_eq!(range, (450.0, 520.0));
    }

    #[test]
    fn ambiguous_band_rejects_vhf_probe() {
        let mut range = (450.0, 480.0);
        assert!(!check_frequency(&mut range, 145.5));
    }

    #[test]
    fn non_ambiguous_band_does_not_rebind() {
        let mut range = (136.0, 174.0);
        assert!(!check_frequency(&mut range, 460.0));
        assert_eq!(range, (136.0, 174.0));
    }
}
