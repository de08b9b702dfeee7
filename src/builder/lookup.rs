//! Early-id lookup cache.
//!
//! While ingesting RDF, every distinct string and value gets a provisional
//! "early" id. The cache is a fixed-size table indexed by hash; a collision
//! simply overwrites the slot, so the same element may receive several early
//! ids. That is fine: the dictionary build phase deduplicates and maps every
//! early id to the final dense id.

use crate::builder::tempfile::TempFile;
use crate::error::Result;

/// Fixed table size (prime)
const SIZE: usize = 1_009_433;

/// An element that can live in the cache and spool itself to a temp file.
pub trait LookupEntry: Clone + PartialEq {
    fn hash(&self) -> u32;

    /// Write the serialized element (without the id) to the file.
    fn write(&self, file: &mut TempFile) -> Result<()>;
}

pub struct Lookup<T: LookupEntry> {
    slots: Vec<Option<(T, u64)>>,
    next: u64,
}

impl<T: LookupEntry> Lookup<T> {
    pub fn new() -> Lookup<T> {
        Lookup {
            slots: vec![None; SIZE],
            next: 1,
        }
    }

    /// Find or assign the early id of an element, appending the
    /// `(element, id)` mapping to `file` for fresh assignments.
    pub fn lookup(&mut self, file: &mut TempFile, e: &T) -> Result<u64> {
        let slot = e.hash() as usize % SIZE;
        if let Some((entry, id)) = &self.slots[slot] {
            if entry == e {
                return Ok(*id);
            }
        }
        let id = self.next;
        self.next += 1;
        e.write(file)?;
        file.write_varint(id)?;
        self.slots[slot] = Some((e.clone(), id));
        Ok(id)
    }
}

impl<T: LookupEntry> Default for Lookup<T> {
    fn default() -> Self {
        Lookup::new()
    }
}
