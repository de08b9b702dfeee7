//! Bottom-up B+-tree packing.
//!
//! Leaves are produced first, in key order: call `begin_leaf`, fill the page
//! through the writer, then `end_leaf` with the greatest key written. Once
//! all leaves are out, `construct_tree` builds the inner levels and returns
//! the root page.

use crate::builder::pagewriter::PageWriter;
use crate::error::Result;
use crate::store::btree::{BTreeFlags, NODE_HEADER_SIZE};
use crate::types::{Pgno, TripleKey};

/// Key that can be written into inner nodes.
pub trait BuildKey: Copy + Default {
    const SIZE: usize;

    fn write(&self, w: &mut PageWriter) -> Result<()>;
}

impl BuildKey for u32 {
    const SIZE: usize = 4;

    fn write(&self, w: &mut PageWriter) -> Result<()> {
        w.write_int(*self)
    }
}

impl BuildKey for [u32; 2] {
    const SIZE: usize = 8;

    fn write(&self, w: &mut PageWriter) -> Result<()> {
        w.write_int(self[0])?;
        w.write_int(self[1])
    }
}

impl BuildKey for TripleKey {
    const SIZE: usize = 12;

    fn write(&self, w: &mut PageWriter) -> Result<()> {
        for c in self.0 {
            w.write_int(c)?;
        }
        Ok(())
    }
}

pub struct BTreeBuilder<K: BuildKey> {
    /// (greatest key, page) per finished node of the current level
    boundaries: Vec<(K, Pgno)>,
    leaves: u32,
    last_leaf: Pgno,
}

impl<K: BuildKey> BTreeBuilder<K> {
    /// The writer must be at the start of a page.
    pub fn new(w: &PageWriter) -> BTreeBuilder<K> {
        assert_eq!(w.offset(), 0);
        BTreeBuilder {
            boundaries: Vec::new(),
            leaves: 0,
            last_leaf: 0,
        }
    }

    /// Start a new leaf, flushing the previous one with its header flags.
    pub fn begin_leaf(&mut self, w: &mut PageWriter) -> Result<()> {
        if self.leaves > 0 {
            let mut flags = BTreeFlags::empty();
            if self.leaves == 1 {
                flags |= BTreeFlags::FIRST_LEAF;
            }
            w.write_int_at(flags.bits(), 0);
            w.flush()?;
        }
        w.skip(NODE_HEADER_SIZE);
        self.leaves += 1;
        Ok(())
    }

    /// End the current leaf; `last` is the greatest key it holds.
    pub fn end_leaf(&mut self, w: &PageWriter, last: K) {
        self.boundaries.push((last, w.page()));
        self.last_leaf = w.page();
    }

    /// Page number of the last ended leaf.
    pub fn last_leaf(&self) -> Pgno {
        self.last_leaf
    }

    /// Flush the final leaf and build the inner levels bottom-up. Returns the
    /// root page. With no leaves at all, emits a single empty inner node.
    pub fn construct_tree(&mut self, w: &mut PageWriter) -> Result<Pgno> {
        if self.leaves > 0 {
            let mut flags = BTreeFlags::LAST_LEAF;
            if self.leaves == 1 {
                flags |= BTreeFlags::FIRST_LEAF;
            }
            w.write_int_at(flags.bits(), 0);
            w.flush()?;
        }

        let mut first = true;
        while first || self.boundaries.len() > 1 {
            first = false;
            w.skip(NODE_HEADER_SIZE);
            let boundaries = std::mem::take(&mut self.boundaries);
            let mut new_boundaries: Vec<(K, Pgno)> = Vec::new();
            let mut count: u32 = 0;
            let mut last = K::default();
            for &(key, child) in &boundaries {
                if K::SIZE + 4 > w.remaining() {
                    new_boundaries.push((last, w.page()));
                    w.write_int_at(BTreeFlags::INNER_NODE.bits() | count, 0);
                    w.flush()?;
                    count = 0;
                    w.skip(NODE_HEADER_SIZE);
                }
                key.write(w)?;
                w.write_int(child)?;
                count += 1;
                last = key;
            }
            new_boundaries.push((last, w.page()));
            w.write_int_at(BTreeFlags::INNER_NODE.bits() | count, 0);
            w.flush()?;
            self.boundaries = new_boundaries;
        }

        Ok(w.page() - 1)
    }
}
