use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::codeplug::Codeplug;
use crate::error::Error;
use crate::record::Record;

// ─── Records -> text ────────────────────────────────────────────────────────

impl Codeplug {
    /// Export every record of every type, in type-name order then instance
    /// order, with a blank line between records.
    pub fn export_to(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let file = fs::File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        self.write_records(&mut w)?;
        w.flush()?;
        debug!(path = %path.as_ref().display(), "exported codeplug text");
        Ok(())
    }

    pub fn write_records(&self, w: &mut impl Write) -> io::Result<()> {
        for (i, rtype) in self.record_types().iter().enumerate() {
            for (j, r) in self.records(rtype).iter().enumerate() {
                if i != 0 || j != 0 {
                    writeln!(w)?;
                }
                self.write_record(w, r)?;
            }
        }
        Ok(())
    }

    /// The multi-line form: `Type[i]:` then one tab-indented field per line.
    /// Bracket indices appear only when the type's maximum exceeds one.
    pub fn write_record(&self, w: &mut impl Write, r: &Record) -> io::Result<()> {
        let Some(slab) = self.slab(&r.rtype) else {
            return Ok(());
        };
        writeln!(w, "{}{}:", r.rtype, bracket(slab.max(), r.index))?;
        for fl in &slab.layout.fields {
            for f in r.fields(&fl.ftype) {
                let value = quote_string(&self.field_text(&r.rtype, f));
                writeln!(
                    w,
                    "\t{}{}: {}",
                    fl.ftype,
                    bracket(fl.max, f.index),
                    value
                )?;
            }
        }
        Ok(())
    }

    /// The single-line form: the whole record as space-separated pairs.
    pub fn write_record_line(&self, w: &mut impl Write, r: &Record) -> io::Result<()> {
        let Some(slab) = self.slab(&r.rtype) else {
            return Ok(());
        };
        write!(w, "{}{}:", r.rtype, bracket(slab.max(), r.index))?;
        for fl in &slab.layout.fields {
            for f in r.fields(&fl.ftype) {
                let value = quote_string(&self.field_text(&r.rtype, f));
                write!(w, " {}{}:{}", fl.ftype, bracket(fl.max, f.index), value)?;
            }
        }
        writeln!(w)
    }
}

fn bracket(max: usize, index: usize) -> String {
    if max > 1 {
        format!("[{}]", index + 1)
    } else {
        String::new()
    }
}

/// Quote a value when it is empty or contains whitespace, escaping
/// `"` `\` and the three whitespace controls.
pub fn quote_string(s: &str) -> String {
    let quote = s.chars().any(char::is_whitespace);
    if !quote && !s.is_empty() {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
