use std::collections::BTreeMap;

use smol_str::SmolStr;

use crate::layout::{FieldType, RecordLayout, RecordType};
use crate::value::FieldValue;

// ─── Field ──────────────────────────────────────────────────────────────────

/// One instance of a field type within a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub ftype: FieldType,
    /// 0-based instance index within its field type.
    pub index: usize,
    pub value: FieldValue,
}

impl Field {
    pub fn new(ftype: FieldType, index: usize, value: FieldValue) -> Self {
        Field {
            ftype,
            index,
            value,
        }
    }
}

// ─── Record ─────────────────────────────────────────────────────────────────

/// One instance of a record type. The slot index stays compact and
/// contiguous; the owning slab renumbers after every structural change.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub rtype: RecordType,
    pub index: usize,
    fields: BTreeMap<FieldType, Vec<Field>>,
}

impl Record {
    pub fn new(rtype: RecordType, index: usize) -> Self {
        Record {
            rtype,
            index,
            fields: BTreeMap::new(),
        }
    }

    pub fn fields(&self, ftype: &FieldType) -> &[Field] {
        self.fields.get(ftype).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field(&self, ftype: &FieldType) -> Option<&Field> {
        self.fields(ftype).first()
    }

    /// Look up a field instance by its instance index, which need not match
    /// its position when instances are sparse.
    pub fn field_mut(&mut self, ftype: &FieldType, index: usize) -> Option<&mut Field> {
        self.fields
            .get_mut(ftype)?
            .iter_mut()
            .find(|f| f.index == index)
    }

    /// Append a field instance. The instance index is assigned from the
    /// current count; the caller checks the layout maximum.
    pub fn push_field(&mut self, ftype: FieldType, value: FieldValue) -> &mut Field {
        let list = self.fields.entry(ftype.clone()).or_default();
        let index = list.len();
        list.push(Field::new(ftype, index, value));
        list.last_mut().unwrap()
    }

    /// Insert a field instance at an explicit instance index, keeping the
    /// list ordered by index. Returns false when that index is already
    /// occupied.
    pub fn place_field(&mut self, ftype: FieldType, index: usize, value: FieldValue) -> bool {
        let list = self.fields.entry(ftype.clone()).or_default();
        let at = match list.binary_search_by_key(&index, |f| f.index) {
            Ok(_) => return false,
            Err(at) => at,
        };
        list.insert(at, Field::new(ftype, index, value));
        true
    }

    pub fn set_field(&mut self, ftype: &FieldType, index: usize, value: FieldValue) -> bool {
        match self.field_mut(ftype, index) {
            Some(f) => {
                f.value = value;
                true
            }
            None => false,
        }
    }

    pub fn field_count(&self, ftype: &FieldType) -> usize {
        self.fields(ftype).len()
    }
}

// ─── RecordSlab ─────────────────────────────────────────────────────────────

/// Per-type descriptor: the layout plus the ordered live records of that
/// type and a name-list cache invalidated on any structural change.
#[derive(Debug, Clone)]
pub struct RecordSlab {
    pub layout: RecordLayout,
    pub records: Vec<Record>,
    cached_names: Option<Vec<SmolStr>>,
}

impl RecordSlab {
    pub fn new(layout: RecordLayout) -> Self {
        RecordSlab {
            layout,
            records: Vec::new(),
            cached_names: None,
        }
    }

    pub fn rtype(&self) -> &RecordType {
        &self.layout.rtype
    }

    pub fn max(&self) -> usize {
        self.layout.max.max(1)
    }

    pub fn name_of<'a>(&self, r: &'a Record) -> Option<&'a str> {
        let ftype = self.layout.name_field.as_ref()?;
        r.field(ftype)?.value.as_str()
    }

    pub fn invalidate_names(&mut self) {
        self.cached_names = None;
    }

    pub fn list_names(&mut self) -> &[SmolStr] {
        if self.cached_names.is_none() {
            let names = self
                .records
                .iter()
                .filter_map(|r| self.name_of(r).map(SmolStr::new))
                .collect();
            self.cached_names = Some(names);
        }
        self.cached_names.as_deref().unwrap_or(&[])
    }

    fn renumber(&mut self) {
        for (i, r) in self.records.iter_mut().enumerate() {
            r.index = i;
        }
    }

    /// Splice a record in at its requested index (clamped to the current
    /// count), then renumber. Capacity and name uniquing are handled by the
    /// owning codeplug before this is called.
    pub fn splice_in(&mut self, mut r: Record) -> usize {
        let at = r.index.min(self.records.len());
        r.index = at;
        self.records.insert(at, r);
        self.renumber();
        self.invalidate_names();
        at
    }

    pub fn splice_out(&mut self, index: usize) -> Record {
        let r = self.records.remove(index);
        self.renumber();
        self.invalidate_names();
        r
    }

    /// Rewrite the record's name until it collides with no sibling name.
    /// `Foo` becomes `Foo 2`, `Foo 2` becomes `Foo 3`, and so on;
    /// deterministic for a given starting name and sibling set.
    pub fn unique_name(&mut self, r: &mut Record) {
        let Some(ftype) = self.layout.name_field.clone() else {
            return;
        };
        let Some(name) = r.field(&ftype).and_then(|f| f.value.as_str()) else {
            return;
        };
        let mut name = name.to_string();
        loop {
            if !self.list_names().iter().any(|n| n.as_str() == name) {
                break;
            }
            name = bump_name(&name);
        }
        r.set_field(&ftype, 0, FieldValue::Text(SmolStr::new(&name)));
    }
}

fn bump_name(name: &str) -> String {
    if let Some(space) = name.rfind(' ') {
        let (base, tail) = name.split_at(space + 1);
        if let Ok(n) = tail.parse::<u64>() {
            return format!("{}{}", base, n + 1);
        }
    }
    format!("{} 2", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{FieldKind, FieldLayout};

    fn slab() -> RecordSlab {
        let layout = RecordLayout::new("Contacts", 0, 16, 4)
            .field(FieldLayout::new(
                "Name",
                0,
                FieldKind::Ascii { len: 16 },
            ))
            .name_field("Name");
        RecordSlab::new(layout)
    }

    fn named(rtype: &RecordType, index: usize, name: &str) -> Record {
        let mut r = Record::new(rtype.clone(), index);
        r.push_field(FieldType::new("Name"), FieldValue::from(name));
        r
    }

    #[test]
    fn splice_keeps_indices_contiguous() {
        let mut s = slab();
        let rt = s.rtype().clone();
        s.splice_in(named(&rt, 0, "a"));
        s.splice_in(named(&rt, 0, "b"));
        s.splice_in(named(&rt, 1, "c"));
        let indices: Vec<usize> = s.records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        s.splice_out(1);
        let indices: Vec<usize> = s.records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn unique_name_bumps_trailing_integer() {
        let mut s = slab();
        let rt = s.rtype().clone();
        s.splice_in(named(&rt, 0, "Foo"));
        s.splice_in(named(&rt, 1, "Foo 2"));

        let mut r = named(&rt, 2, "Foo");
        s.unique_name(&mut r);
        assert_eq!(s.name_of(&r), Some("Foo 3"));
    }

    #[test]
    fn unique_name_leaves_fresh_names_alone() {
        let mut s = slab();
        let rt = s.rtype().clone();
        s.splice_in(named(&rt, 0, "Foo"));

        let mut r = named(&rt, 1, "Bar");
        s.unique_name(&mut r);
        assert_eq!(s.name_of(&r), Some("Bar"));
    }
}
