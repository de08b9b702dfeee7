//! Disk-backed B+-tree descent.
//!
//! Nodes carry a single big-endian header word: flag bits in the top byte and
//! the entry count (inner nodes only) in the low 24 bits. Page 0 is the store
//! header and never a node, so 0 doubles as "no page". Inner entries are
//! `(key, child_page)` pairs sorted by key, where the key is the greatest key
//! stored in the child's subtree.

use bitflags::bitflags;

use crate::store::cursor::{Cursor, PageReader};
use crate::types::{Pgno, TripleKey};

bitflags! {
    /// Node header flags, stored in the top bits of the header word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BTreeFlags: u32 {
        const INNER_NODE = 1 << 31;
        const FIRST_LEAF = 1 << 30;
        const LAST_LEAF = 1 << 29;
    }
}

/// Size of the node header in bytes
pub const NODE_HEADER_SIZE: usize = 4;

/// Mask extracting the inner-node entry count from the header word
pub const NODE_COUNT_MASK: u32 = 0x00ff_ffff;

/// Key stored in B+-tree inner nodes.
pub trait BTreeKey: Copy + Ord {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode a key, advancing the cursor.
    fn read(cur: &mut Cursor<'_>) -> Self;
}

impl BTreeKey for u32 {
    const SIZE: usize = 4;

    fn read(cur: &mut Cursor<'_>) -> Self {
        cur.read_int()
    }
}

impl BTreeKey for [u32; 2] {
    const SIZE: usize = 8;

    fn read(cur: &mut Cursor<'_>) -> Self {
        [cur.read_int(), cur.read_int()]
    }
}

impl BTreeKey for TripleKey {
    const SIZE: usize = 12;

    fn read(cur: &mut Cursor<'_>) -> Self {
        TripleKey([cur.read_int(), cur.read_int(), cur.read_int()])
    }
}

/// A B+-tree rooted at a fixed page of a read-only store.
#[derive(Debug, Clone, Copy)]
pub struct BTree<K: BTreeKey> {
    root: Pgno,
    _marker: std::marker::PhantomData<K>,
}

impl<K: BTreeKey> BTree<K> {
    pub fn new(root: Pgno) -> Self {
        BTree {
            root,
            _marker: std::marker::PhantomData,
        }
    }

    /// Descend to the first leaf that may contain keys >= `key`, or `None`
    /// when `key` is greater than every key in the tree.
    pub fn lookup_leaf(&self, db: &PageReader, key: K) -> Option<Pgno> {
        let mut page = self.root;
        loop {
            let mut cur = db.page(page);
            let header = cur.read_int();
            if header & BTreeFlags::INNER_NODE.bits() == 0 {
                return Some(page);
            }
            let count = (header & NODE_COUNT_MASK) as usize;
            let entry = K::SIZE + 4;
            let base = cur;
            // first entry whose key >= the search key
            let mut left = 0usize;
            let mut right = count;
            while left < right {
                let middle = (left + right) / 2;
                let mut mcur = base;
                mcur.skip(middle * entry);
                if K::read(&mut mcur) < key {
                    left = middle + 1;
                } else {
                    right = middle;
                }
            }
            if left == count {
                return None;
            }
            let mut ccur = base;
            ccur.skip(left * entry + K::SIZE);
            page = ccur.read_int();
        }
    }
}

/// B+-tree over 32-bit hashes whose leaves hold fixed-size entries prefixed
/// by a count word. Entries with equal hash are stored consecutively; lookup
/// positions on the first entry of the run.
#[derive(Debug, Clone, Copy)]
pub struct HashTree {
    tree: BTree<u32>,
    entry_size: usize,
}

impl HashTree {
    pub fn new(root: Pgno, entry_size: usize) -> Self {
        HashTree {
            tree: BTree::new(root),
            entry_size,
        }
    }

    /// Locate the collision run of `hash`. Returns a cursor positioned on the
    /// first matching entry and the number of entries left on the leaf
    /// (including the run); `None` when the hash is absent.
    pub fn lookup<'a>(&self, db: &'a PageReader, hash: u32) -> Option<(Cursor<'a>, usize)> {
        let leaf = self.tree.lookup_leaf(db, hash)?;
        let mut cur = db.page(leaf);
        cur.read_int(); // node header
        let count = cur.read_int() as usize;
        let base = cur;
        let at = |i: usize| {
            let mut c = base;
            c.skip(i * self.entry_size);
            c.peek_int(0)
        };
        let mut left = 0usize;
        let mut right = count;
        while left < right {
            let middle = (left + right) / 2;
            match at(middle).cmp(&hash) {
                std::cmp::Ordering::Less => left = middle + 1,
                std::cmp::Ordering::Greater => right = middle,
                std::cmp::Ordering::Equal => {
                    // back up to the first entry of the run
                    let mut first = middle;
                    while first > 0 && at(first - 1) == hash {
                        first -= 1;
                    }
                    let mut c = base;
                    c.skip(first * self.entry_size);
                    return Some((c, count - first));
                }
            }
        }
        None
    }
}
