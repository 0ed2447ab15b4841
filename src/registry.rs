use std::path::Path;

use crate::codeplug::Codeplug;
use crate::error::Error;
use crate::layout::Layout;

// ─── Registry ───────────────────────────────────────────────────────────────

/// Explicitly owned collection of open codeplugs, addressed by each
/// codeplug's process-unique id. Held by whatever layer manages
/// application-level codeplug lifetime; nothing in the crate is global.
#[derive(Debug, Default)]
pub struct Registry {
    codeplugs: Vec<Codeplug>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Open a codeplug file and take ownership of it. Returns its id.
    pub fn open(&mut self, path: impl AsRef<Path>, layout: &Layout) -> Result<String, Error> {
        let cp = Codeplug::open(path, layout)?;
        Ok(self.insert(cp))
    }

    /// Take ownership of an already-built codeplug. Returns its id.
    pub fn insert(&mut self, cp: Codeplug) -> String {
        let id = cp.id().to_string();
        self.codeplugs.push(cp);
        id
    }

    pub fn get(&self, id: &str) -> Option<&Codeplug> {
        self.codeplugs.iter().find(|cp| cp.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Codeplug> {
        self.codeplugs.iter_mut().find(|cp| cp.id() == id)
    }

    /// Release a codeplug, returning it to the caller.
    pub fn free(&mut self, id: &str) -> Option<Codeplug> {
        let at = self.codeplugs.iter().position(|cp| cp.id() == id)?;
        Some(self.codeplugs.remove(at))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Codeplug> {
        self.codeplugs.iter()
    }

    pub fn len(&self) -> usize {
        self.codeplugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codeplugs.is_empty()
    }
}
