//! Core identifier and triple types shared by the store, the solver and the
//! builder.

/// Value identifier. Valid ids are dense in `1..=value_count`; 0 means
/// "unknown / not in the dictionary".
pub type ValueId = u32;

/// String identifier. Valid ids are dense in `1..=string_count`; 0 means
/// "unknown".
pub type StringId = u32;

/// Page number inside a store file (page 0 is the header)
pub type Pgno = u32;

/// Fixed page size of a store file
pub const PAGE_SIZE: usize = 16384;

/// Number of triple components
pub const COMPONENTS: usize = 3;

/// An RDF triple of value ids, in subject/predicate/object order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Triple(pub [ValueId; COMPONENTS]);

impl Triple {
    pub fn new(subject: ValueId, predicate: ValueId, object: ValueId) -> Self {
        Triple([subject, predicate, object])
    }

    pub fn subject(&self) -> ValueId {
        self.0[0]
    }

    pub fn predicate(&self) -> ValueId {
        self.0[1]
    }

    pub fn object(&self) -> ValueId {
        self.0[2]
    }
}

/// One of the six component orders used as sort keys for the triple indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum TripleOrder {
    Spo = 0,
    Sop = 1,
    Pso = 2,
    Pos = 3,
    Osp = 4,
    Ops = 5,
}

/// All orders, in header layout order.
pub const TRIPLE_ORDERS: [TripleOrder; 6] = [
    TripleOrder::Spo,
    TripleOrder::Sop,
    TripleOrder::Pso,
    TripleOrder::Pos,
    TripleOrder::Osp,
    TripleOrder::Ops,
];

impl TripleOrder {
    /// Component permutation: `perm()[i]` is the index into (s, p, o) of the
    /// i-th key component.
    pub fn perm(&self) -> [usize; COMPONENTS] {
        match self {
            TripleOrder::Spo => [0, 1, 2],
            TripleOrder::Sop => [0, 2, 1],
            TripleOrder::Pso => [1, 0, 2],
            TripleOrder::Pos => [1, 2, 0],
            TripleOrder::Osp => [2, 0, 1],
            TripleOrder::Ops => [2, 1, 0],
        }
    }

    /// Reorder an spo-triple into this order's key.
    pub fn to_key(&self, t: Triple) -> TripleKey {
        let p = self.perm();
        TripleKey([t.0[p[0]], t.0[p[1]], t.0[p[2]]])
    }

    /// Map a key of this order back to an spo-triple.
    pub fn from_key(&self, k: TripleKey) -> Triple {
        let p = self.perm();
        let mut t = Triple::default();
        t.0[p[0]] = k.0[0];
        t.0[p[1]] = k.0[1];
        t.0[p[2]] = k.0[2];
        t
    }

    /// Orders that also carry a fully aggregated tree, keyed by their first
    /// component (subject, predicate and object respectively).
    pub fn has_fully_aggregated(&self) -> bool {
        matches!(self, TripleOrder::Spo | TripleOrder::Pso | TripleOrder::Osp)
    }
}

/// A triple reordered into the key space of one [`TripleOrder`]. Keys compare
/// lexicographically on their components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TripleKey(pub [ValueId; COMPONENTS]);

/// An inclusive range of value ids, denoting an equivalence class or a union
/// of adjacent classes. The range may be empty (`from == to + 1`), in which
/// case `from - 1` is the greatest lower bound and `to + 1` the least upper
/// bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange {
    pub from: ValueId,
    pub to: ValueId,
}

impl ValueRange {
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    pub fn contains(&self, id: ValueId) -> bool {
        id >= self.from && id <= self.to
    }
}
