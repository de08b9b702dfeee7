//! Store builder: turns raw RDF triples into a packed read-only store.
//!
//! The pipeline follows the two-pass early-id scheme: terms are assigned
//! provisional ids while streaming the input, then the dictionaries are
//! external-sorted, deduplicated and renumbered densely, and finally every
//! early id inside values and triples is rewritten through sorted
//! (early id -> id) maps. All intermediate data lives in temp files next to
//! the output, so the build is bounded by disk, not memory.

pub mod btreebuilder;
pub mod lookup;
pub mod ntriples;
pub mod pagewriter;
pub mod sort;
pub mod tempfile;

use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::debug;

use crate::builder::btreebuilder::BTreeBuilder;
use crate::builder::lookup::{Lookup, LookupEntry};
use crate::builder::pagewriter::{len_delta, PageWriter};
use crate::builder::sort::sort;
use crate::builder::tempfile::{varint_len, TempFile};
use crate::error::{Error, Result};
use crate::model::{
    interpret, Category, Interpretation, NumCategory, Value, CATEGORY_COUNT, XSD_BOOLEAN,
    XSD_DATETIME, XSD_DECIMAL, XSD_DOUBLE, XSD_INTEGER, XSD_STRING,
};
use crate::store::cursor::Cursor;
use crate::store::{MAGIC, VALUE_RECORD_SIZE, VERSION};
use crate::types::{Pgno, Triple, TripleKey, TripleOrder, PAGE_SIZE, TRIPLE_ORDERS};
use crate::util::hash;

// ----------------------------------------------------------------------
// Raw ingestion records
// ----------------------------------------------------------------------

/// A string heading for the heap: serialized as (length, hash, bytes).
#[derive(Clone, PartialEq, Eq)]
struct HeapString(Vec<u8>);

impl LookupEntry for HeapString {
    fn hash(&self) -> u32 {
        hash::hash_bytes(&self.0)
    }

    fn write(&self, file: &mut TempFile) -> Result<()> {
        file.write_varint(self.0.len() as u64)?;
        file.write_int(hash::hash_bytes(&self.0))?;
        file.write_bytes(&self.0)
    }
}

/// A value carrying early ids: the lexical and tag fields are early string
/// ids, the datatype an early value id.
#[derive(Clone, PartialEq, Eq)]
struct RawValue {
    category: Category,
    numcat: Option<NumCategory>,
    lexical: u64,
    datatype: u64,
    tag: u64,
}

impl LookupEntry for RawValue {
    fn hash(&self) -> u32 {
        let mut h = hash::hash_bytes(&[self.category as u8, self.numcat.map_or(0, |n| n as u8)]);
        h = hash::hash_bytes_with(h, &self.lexical.to_le_bytes());
        h = hash::hash_bytes_with(h, &self.datatype.to_le_bytes());
        hash::hash_bytes_with(h, &self.tag.to_le_bytes())
    }

    fn write(&self, file: &mut TempFile) -> Result<()> {
        write_value_record(file, self)
    }
}

fn write_value_record(file: &mut TempFile, v: &RawValue) -> Result<()> {
    file.write_byte(v.category as u8)?;
    file.write_byte(v.numcat.map_or(0, |n| n as u8))?;
    file.write_varint(v.lexical)?;
    file.write_varint(v.datatype)?;
    file.write_varint(v.tag)
}

fn read_value_record(cur: &mut Cursor<'_>) -> RawValue {
    let category = Category::from_u8(cur.read_byte()).expect("valid category in temp file");
    let numcat = NumCategory::from_u8(cur.read_byte());
    RawValue {
        category,
        numcat,
        lexical: cur.read_varint(),
        datatype: cur.read_varint(),
        tag: cur.read_varint(),
    }
}

fn skip_value_record(cur: &mut Cursor<'_>) {
    cur.skip(2);
    cur.skip_varint();
    cur.skip_varint();
    cur.skip_varint();
}

fn skip_string_record(cur: &mut Cursor<'_>) {
    let len = cur.read_varint() as usize;
    cur.skip(4 + len);
}

fn skip_triple(cur: &mut Cursor<'_>) {
    cur.skip_varint();
    cur.skip_varint();
    cur.skip_varint();
}

// ----------------------------------------------------------------------
// String resolution during the build
// ----------------------------------------------------------------------

/// Resolves final string ids against the in-progress heap image.
struct StringResolver<'a> {
    table: &'a Mmap,
    offsets: &'a Mmap,
}

impl<'a> StringResolver<'a> {
    fn get(&self, id: u64) -> &'a [u8] {
        debug_assert!(id > 0);
        let mut ocur = Cursor::new(self.offsets);
        ocur.skip((id as usize - 1) * 8);
        let offset = ocur.read_long() as usize;
        let mut cur = Cursor::new(self.table);
        cur.skip(offset);
        let len = cur.read_varint() as usize;
        cur.skip(4); // stored hash
        cur.read_bytes(len)
    }

    fn get_str(&self, id: u64) -> String {
        String::from_utf8_lossy(self.get(id)).into_owned()
    }
}

/// Rebuild a full [`Value`] from a build record, interpreting its lexical.
fn materialize(rec: &RawValue, resolver: &StringResolver<'_>) -> Value {
    let lexical = resolver.get_str(rec.lexical);
    let mut language = String::new();
    let mut datatype = String::new();
    match rec.category {
        Category::PlainLanguage => language = resolver.get_str(rec.tag),
        c if c >= Category::TypedString => datatype = resolver.get_str(rec.tag),
        _ => {}
    }
    let interp = interpret(&lexical, rec.category, rec.numcat);
    Value {
        id: 0,
        category: rec.category,
        numcat: rec.numcat,
        lexical,
        language,
        datatype,
        interp,
        lexical_id: rec.lexical as u32,
        datatype_id: rec.datatype as u32,
        tag_id: rec.tag as u32,
    }
}

/// The interpreted word of the fixed value record.
fn interp_bits(value: &Value) -> u64 {
    match &value.interp {
        Interpretation::Boolean(b) => *b as u64,
        Interpretation::Integer(i) => *i as u64,
        Interpretation::Floating(f) => f.to_bits(),
        Interpretation::DateTime(ms) => *ms as u64,
        _ => 0,
    }
}

/// Streaming walk over a sorted (early id -> id) map.
struct MapWalk<'a> {
    cur: Cursor<'a>,
    from: u64,
    to: u64,
}

impl<'a> MapWalk<'a> {
    fn new(map: &'a Mmap) -> MapWalk<'a> {
        MapWalk {
            cur: Cursor::new(map),
            from: 0,
            to: 0,
        }
    }

    /// Final id of `early`; the keys must be fed in ascending order.
    fn resolve(&mut self, early: u64) -> u64 {
        while self.from < early {
            self.from = self.cur.read_varint();
            self.to = self.cur.read_varint();
        }
        debug_assert!(self.from == early || early == 0);
        if early == 0 {
            0
        } else {
            self.to
        }
    }
}

// ----------------------------------------------------------------------
// Builder front end
// ----------------------------------------------------------------------

/// Accumulates raw triples and produces the store image.
pub struct StoreBuilder {
    db_path: PathBuf,
    raw_triples: TempFile,
    raw_strings: TempFile,
    raw_values: TempFile,
    strings: Lookup<HeapString>,
    values: Lookup<RawValue>,
    ingested: u64,
}

impl StoreBuilder {
    /// Start building a store at `db_path`. The well-known XSD datatype IRIs
    /// are interned up front so every typed literal can reference them.
    pub fn create(db_path: impl AsRef<Path>) -> Result<StoreBuilder> {
        let db_path = db_path.as_ref().to_path_buf();
        let mut b = StoreBuilder {
            raw_triples: TempFile::new(&db_path)?,
            raw_strings: TempFile::new(&db_path)?,
            raw_values: TempFile::new(&db_path)?,
            strings: Lookup::new(),
            values: Lookup::new(),
            ingested: 0,
            db_path,
        };
        for iri in [
            XSD_STRING,
            XSD_BOOLEAN,
            XSD_INTEGER,
            XSD_DOUBLE,
            XSD_DECIMAL,
            XSD_DATETIME,
        ] {
            b.add_iri(iri)?;
        }
        Ok(b)
    }

    /// Intern an IRI both as a value and as a heap string. Returns the early
    /// value id and early string id.
    fn add_iri(&mut self, iri: &str) -> Result<(u64, u64)> {
        let lexical = self
            .strings
            .lookup(&mut self.raw_strings, &HeapString(iri.as_bytes().to_vec()))?;
        let raw = RawValue {
            category: Category::Iri,
            numcat: None,
            lexical,
            datatype: 0,
            tag: 0,
        };
        let id = self.values.lookup(&mut self.raw_values, &raw)?;
        Ok((id, lexical))
    }

    /// Intern one RDF term, returning its early value id.
    fn add_value(&mut self, value: &Value) -> Result<u64> {
        let mut raw = RawValue {
            category: value.category,
            numcat: value.numcat,
            lexical: 0,
            datatype: 0,
            tag: 0,
        };
        match value.category {
            Category::PlainLanguage => {
                raw.tag = self.strings.lookup(
                    &mut self.raw_strings,
                    &HeapString(value.language.as_bytes().to_vec()),
                )?;
            }
            c if c >= Category::TypedString => {
                let (datatype, tag) = self.add_iri(&value.datatype)?;
                raw.datatype = datatype;
                raw.tag = tag;
            }
            _ => {}
        }
        raw.lexical = self.strings.lookup(
            &mut self.raw_strings,
            &HeapString(value.lexical.as_bytes().to_vec()),
        )?;
        self.values.lookup(&mut self.raw_values, &raw)
    }

    /// Add one triple of RDF terms.
    pub fn add_triple(&mut self, subject: &Value, predicate: &Value, object: &Value) -> Result<()> {
        let s = self.add_value(subject)?;
        let p = self.add_value(predicate)?;
        let o = self.add_value(object)?;
        self.raw_triples.write_varint(s)?;
        self.raw_triples.write_varint(p)?;
        self.raw_triples.write_varint(o)?;
        self.ingested += 1;
        Ok(())
    }

    /// Run the full pipeline and write the store file.
    pub fn finish(mut self) -> Result<()> {
        self.raw_triples.close()?;
        self.raw_strings.close()?;
        self.raw_values.close()?;
        debug!(triples = self.ingested, "ingestion complete");

        let base = self.db_path.clone();

        debug!("building strings");
        let (mut strings_table, strings_early_map, mut strings_map, mut strings_hashes, count) =
            build_strings(self.raw_strings, &base)?;

        debug!("resolving string ids in values");
        let resolved_values = resolve_string_ids(self.raw_values, strings_early_map, &base)?;

        debug!("building values");
        let (mut values_table, values_early_map, mut values_hashes, mut values_eq, categories) =
            build_values(resolved_values, &mut strings_table, &mut strings_map, &base)?;

        debug!("resolving value ids in triples");
        let mut triples = resolve_ids(self.raw_triples, values_early_map, &base)?;

        let mut w = PageWriter::create(&self.db_path)?;
        w.flush()?; // reserve page 0 for the header

        let mut meta = StoreMeta {
            categories,
            strings_count: count,
            ..Default::default()
        };

        debug!("storing triples");
        store_triples(&mut w, &mut meta, &mut triples, &base)?;
        triples.discard()?;

        debug!("storing strings");
        store_strings(
            &mut w,
            &mut meta,
            strings_table,
            strings_map,
            &mut strings_hashes,
        )?;
        strings_hashes.discard()?;

        debug!("storing values");
        store_values(&mut w, &mut meta, &mut values_table, &mut values_hashes, &mut values_eq)?;
        values_table.discard()?;
        values_hashes.discard()?;
        values_eq.discard()?;

        debug!("storing header");
        store_header(&mut w, &meta)?;
        w.close()?;
        Ok(())
    }
}

/// Section pointers collected while packing, written to page 0 at the end.
#[derive(Default)]
struct StoreMeta {
    triples_count: u32,
    raw_table: Pgno,
    orders: [(Pgno, Pgno, Pgno, Pgno); 6],
    fully_aggregated: [Pgno; 3],
    strings_count: u32,
    strings_begin: Pgno,
    strings_mapping: Pgno,
    strings_index: Pgno,
    values_begin: Pgno,
    values_index: Pgno,
    values_eq_classes: Pgno,
    categories: [u32; CATEGORY_COUNT + 1],
}

// ----------------------------------------------------------------------
// Dictionary building
// ----------------------------------------------------------------------

/// Sort and deduplicate the raw strings, producing the heap image, the
/// id->offset table, the (early id -> id) map and the (hash, offset) pairs.
fn build_strings(
    mut raw: TempFile,
    base: &Path,
) -> Result<(TempFile, TempFile, TempFile, TempFile, u32)> {
    let mut sorted = TempFile::new(base)?;
    sort(
        &mut raw,
        &mut sorted,
        |cur| {
            skip_string_record(cur);
            cur.skip_varint();
        },
        |mut a, mut b| {
            let la = a.read_varint() as usize;
            a.skip(4);
            let lb = b.read_varint() as usize;
            b.skip(4);
            a.read_bytes(la).cmp(b.read_bytes(lb))
        },
        false,
    )?;
    raw.discard()?;

    let mut table = TempFile::new(base)?;
    let mut offsets = TempFile::new(base)?;
    let mut raw_early = TempFile::new(base)?;
    let mut raw_hashes = TempFile::new(base)?;

    let map = sorted.map()?;
    let mut cur = Cursor::new(&map);
    let mut last: Option<Vec<u8>> = None;
    let mut next_id: u64 = 0;
    let mut offset: u64 = 0;
    while !cur.at_end() {
        let len = cur.read_varint() as usize;
        let h = cur.read_int();
        let bytes = cur.read_bytes(len);
        let early = cur.read_varint();
        if last.as_deref() != Some(bytes) {
            next_id += 1;
            offsets.write_long(offset)?;
            raw_hashes.write_int(h)?;
            raw_hashes.write_long(offset)?;
            table.write_varint(len as u64)?;
            table.write_int(h)?;
            table.write_bytes(bytes)?;
            offset += (varint_len(len as u64) + 4 + len) as u64;
            last = Some(bytes.to_vec());
        }
        raw_early.write_varint(early)?;
        raw_early.write_varint(next_id)?;
    }
    let count = next_id as u32;
    drop(map);
    sorted.discard()?;

    let mut early_map = TempFile::new(base)?;
    sort(
        &mut raw_early,
        &mut early_map,
        |cur| {
            cur.skip_varint();
            cur.skip_varint();
        },
        |mut a, mut b| a.read_varint().cmp(&b.read_varint()),
        false,
    )?;
    raw_early.discard()?;

    let mut hashes = TempFile::new(base)?;
    sort(
        &mut raw_hashes,
        &mut hashes,
        |cur| cur.skip(12),
        |mut a, mut b| a.read_int().cmp(&b.read_int()),
        false,
    )?;
    raw_hashes.discard()?;

    Ok((table, early_map, offsets, hashes, count))
}

/// Replace the early string ids inside raw values by final string ids, in
/// two sort-and-walk passes (lexical, then tag).
fn resolve_string_ids(
    mut raw: TempFile,
    mut string_map: TempFile,
    base: &Path,
) -> Result<TempFile> {
    let map = string_map.map()?;

    // pass 1: lexical
    let mut by_lexical = TempFile::new(base)?;
    sort(
        &mut raw,
        &mut by_lexical,
        |cur| {
            skip_value_record(cur);
            cur.skip_varint();
        },
        |mut a, mut b| {
            let ra = read_value_record(&mut a);
            let rb = read_value_record(&mut b);
            ra.lexical.cmp(&rb.lexical)
        },
        false,
    )?;
    raw.discard()?;

    let mut lexical_done = TempFile::new(base)?;
    {
        let data = by_lexical.map()?;
        let mut cur = Cursor::new(&data);
        let mut walk = MapWalk::new(&map);
        while !cur.at_end() {
            let mut rec = read_value_record(&mut cur);
            let early = cur.read_varint();
            rec.lexical = walk.resolve(rec.lexical);
            write_value_record(&mut lexical_done, &rec)?;
            lexical_done.write_varint(early)?;
        }
    }
    by_lexical.discard()?;

    // pass 2: tag
    let mut by_tag = TempFile::new(base)?;
    sort(
        &mut lexical_done,
        &mut by_tag,
        |cur| {
            skip_value_record(cur);
            cur.skip_varint();
        },
        |mut a, mut b| {
            let ra = read_value_record(&mut a);
            let rb = read_value_record(&mut b);
            ra.tag.cmp(&rb.tag)
        },
        false,
    )?;
    lexical_done.discard()?;

    let mut resolved = TempFile::new(base)?;
    {
        let data = by_tag.map()?;
        let mut cur = Cursor::new(&data);
        let mut walk = MapWalk::new(&map);
        while !cur.at_end() {
            let mut rec = read_value_record(&mut cur);
            let early = cur.read_varint();
            rec.tag = walk.resolve(rec.tag);
            write_value_record(&mut resolved, &rec)?;
            resolved.write_varint(early)?;
        }
    }
    by_tag.discard()?;
    drop(map);
    string_map.discard()?;

    Ok(resolved)
}

/// Sort the values in SPARQL order, deduplicate, assign dense ids, record
/// equivalence-class boundaries and category starts, resolve datatype ids
/// and emit the fixed-size dictionary records plus the (hash, id) pairs.
fn build_values(
    mut resolved: TempFile,
    strings_table: &mut TempFile,
    strings_offsets: &mut TempFile,
    base: &Path,
) -> Result<(TempFile, TempFile, TempFile, TempFile, [u32; CATEGORY_COUNT + 1])> {
    let table = strings_table.map()?;
    let offsets = strings_offsets.map()?;
    let resolver = StringResolver {
        table: &table,
        offsets: &offsets,
    };

    // sort in SPARQL order, interpreting through the heap
    let mut sorted = TempFile::new(base)?;
    sort(
        &mut resolved,
        &mut sorted,
        |cur| {
            skip_value_record(cur);
            cur.skip_varint();
        },
        |mut a, mut b| {
            let ra = read_value_record(&mut a);
            let rb = read_value_record(&mut b);
            materialize(&ra, &resolver).total_cmp(&materialize(&rb, &resolver))
        },
        false,
    )?;
    resolved.discard()?;

    // deduplicate and assign ids
    let mut by_datatype_input = TempFile::new(base)?;
    let mut raw_map = TempFile::new(base)?;
    let mut eq = TempFile::new(base)?;
    let mut categories = [0u32; CATEGORY_COUNT + 1];
    let mut next_id: u32 = 0;
    {
        let data = sorted.map()?;
        let mut cur = Cursor::new(&data);
        let mut eq_buf: u32 = 0;
        let mut eq_shift: u32 = 0;
        let mut last: Option<(RawValue, Value)> = None;
        while !cur.at_end() {
            let rec = read_value_record(&mut cur);
            let early = cur.read_varint();
            let duplicate = last.as_ref().map_or(false, |(l, _)| {
                l.category == rec.category
                    && l.numcat == rec.numcat
                    && l.lexical == rec.lexical
                    && l.tag == rec.tag
            });
            if !duplicate {
                let value = materialize(&rec, &resolver);
                next_id += 1;
                // record for the datatype resolution pass
                by_datatype_input.write_varint(rec.datatype)?;
                by_datatype_input.write_byte(rec.category as u8)?;
                by_datatype_input.write_byte(rec.numcat.map_or(0, |n| n as u8))?;
                by_datatype_input.write_varint(rec.lexical)?;
                by_datatype_input.write_varint(rec.tag)?;
                by_datatype_input.write_varint(next_id as u64)?;

                // SPARQL equality decides class boundaries; this includes
                // the cross-category case of a plain literal next to its
                // xsd:string twin, which must share one class
                let new_class = match &last {
                    None => true,
                    Some((_, lv)) => lv.compare(&value) != Some(std::cmp::Ordering::Equal),
                };
                eq_buf |= (new_class as u32) << eq_shift;
                eq_shift += 1;
                if eq_shift == 32 {
                    eq.write_int(eq_buf)?;
                    eq_buf = 0;
                    eq_shift = 0;
                }
                let changed_category =
                    last.as_ref().map_or(true, |(l, _)| l.category != rec.category);
                if changed_category {
                    categories[rec.category as usize] = next_id;
                }
                last = Some((rec, value));
            }
            raw_map.write_varint(early)?;
            raw_map.write_varint(next_id as u64)?;
        }
        // terminating class boundary
        eq_buf |= 1 << eq_shift;
        eq.write_int(eq_buf)?;
    }
    sorted.discard()?;

    categories[CATEGORY_COUNT] = next_id + 1;
    for cat in (0..CATEGORY_COUNT).rev() {
        if categories[cat] == 0 {
            categories[cat] = categories[cat + 1];
        }
    }

    // sort the early map
    let mut early_map = TempFile::new(base)?;
    sort(
        &mut raw_map,
        &mut early_map,
        |cur| {
            cur.skip_varint();
            cur.skip_varint();
        },
        |mut a, mut b| a.read_varint().cmp(&b.read_varint()),
        false,
    )?;
    raw_map.discard()?;

    // sort values by datatype early id and resolve it
    let mut by_datatype = TempFile::new(base)?;
    sort(
        &mut by_datatype_input,
        &mut by_datatype,
        |cur| {
            cur.skip_varint();
            cur.skip(2);
            cur.skip_varint();
            cur.skip_varint();
            cur.skip_varint();
        },
        |mut a, mut b| a.read_varint().cmp(&b.read_varint()),
        false,
    )?;
    by_datatype_input.discard()?;

    let mut final_unsorted = TempFile::new(base)?;
    let mut raw_hashes = TempFile::new(base)?;
    {
        let emap = early_map.map()?;
        let data = by_datatype.map()?;
        let mut cur = Cursor::new(&data);
        let mut walk = MapWalk::new(&emap);
        while !cur.at_end() {
            let datatype_early = cur.read_varint();
            let category = Category::from_u8(cur.read_byte()).expect("valid category");
            let numcat = NumCategory::from_u8(cur.read_byte());
            let lexical = cur.read_varint();
            let tag = cur.read_varint();
            let id = cur.read_varint() as u32;
            let datatype = walk.resolve(datatype_early) as u32;

            let rec = RawValue {
                category,
                numcat,
                lexical,
                datatype: datatype as u64,
                tag,
            };
            let value = materialize(&rec, &resolver);

            let interp_valid = !matches!(value.interp, Interpretation::None);
            final_unsorted.write_varint(id as u64)?;
            final_unsorted.write_byte(category as u8)?;
            final_unsorted.write_byte(numcat.map_or(0, |n| n as u8))?;
            final_unsorted.write_byte(interp_valid as u8)?;
            final_unsorted.write_byte(0)?;
            final_unsorted.write_int(lexical as u32)?;
            final_unsorted.write_int(datatype)?;
            final_unsorted.write_int(tag as u32)?;
            final_unsorted.write_long(interp_bits(&value))?;

            raw_hashes.write_int(value.hash())?;
            raw_hashes.write_int(id)?;
        }
    }
    by_datatype.discard()?;

    // restore id order for the dictionary image
    let mut values_table = TempFile::new(base)?;
    sort(
        &mut final_unsorted,
        &mut values_table,
        |cur| {
            cur.skip_varint();
            cur.skip(VALUE_RECORD_SIZE);
        },
        |mut a, mut b| a.read_varint().cmp(&b.read_varint()),
        false,
    )?;
    final_unsorted.discard()?;

    // sort hashes
    let mut hashes = TempFile::new(base)?;
    sort(
        &mut raw_hashes,
        &mut hashes,
        |cur| cur.skip(8),
        |mut a, mut b| a.read_int().cmp(&b.read_int()),
        false,
    )?;
    raw_hashes.discard()?;

    Ok((values_table, early_map, hashes, eq, categories))
}

// ----------------------------------------------------------------------
// Triple id resolution
// ----------------------------------------------------------------------

/// Rewrite one triple component from early to final ids: sort by the first
/// component, resolve it, and rotate the components so three passes resolve
/// all of them.
fn resolve_component(mut input: TempFile, map: &Mmap, base: &Path) -> Result<TempFile> {
    let mut sorted = TempFile::new(base)?;
    sort(
        &mut input,
        &mut sorted,
        skip_triple,
        |mut a, mut b| a.read_varint().cmp(&b.read_varint()),
        false,
    )?;
    input.discard()?;

    let mut out = TempFile::new(base)?;
    {
        let data = sorted.map()?;
        let mut cur = Cursor::new(&data);
        let mut walk = MapWalk::new(map);
        while !cur.at_end() {
            let a = cur.read_varint();
            let b = cur.read_varint();
            let c = cur.read_varint();
            let resolved = walk.resolve(a);
            debug_assert!(resolved > 0);
            out.write_varint(b)?;
            out.write_varint(c)?;
            out.write_varint(resolved)?;
        }
    }
    sorted.discard()?;
    Ok(out)
}

/// Resolve all three components and produce the canonical duplicate-free
/// triples, sorted in SPO order.
fn resolve_ids(raw: TempFile, mut early_map: TempFile, base: &Path) -> Result<TempFile> {
    let map = early_map.map()?;
    let subjects = resolve_component(raw, &map, base)?;
    let predicates = resolve_component(subjects, &map, base)?;
    let mut objects = resolve_component(predicates, &map, base)?;
    drop(map);
    early_map.discard()?;

    let mut triples = TempFile::new(base)?;
    sort(
        &mut objects,
        &mut triples,
        skip_triple,
        |mut a, mut b| {
            let ta = [a.read_varint(), a.read_varint(), a.read_varint()];
            let tb = [b.read_varint(), b.read_varint(), b.read_varint()];
            ta.cmp(&tb)
        },
        true,
    )?;
    objects.discard()?;
    Ok(triples)
}

// ----------------------------------------------------------------------
// Packing triples
// ----------------------------------------------------------------------

fn read_triple(cur: &mut Cursor<'_>) -> Triple {
    Triple::new(
        cur.read_varint() as u32,
        cur.read_varint() as u32,
        cur.read_varint() as u32,
    )
}

/// Store the raw unsorted id table.
fn store_raw_table(w: &mut PageWriter, meta: &mut StoreMeta, data: &Mmap) -> Result<()> {
    meta.raw_table = w.page();
    let mut cur = Cursor::new(data);
    let mut count: u32 = 0;
    while !cur.at_end() {
        let t = read_triple(&mut cur);
        for c in t.0 {
            if w.remaining() == 0 {
                w.flush()?;
            }
            w.write_int(c)?;
        }
        count += 1;
    }
    if w.offset() > 0 {
        w.flush()?;
    }
    meta.triples_count = count;
    Ok(())
}

/// Pack the full-triples leaves of one order and build its tree.
fn store_full_triples(
    w: &mut PageWriter,
    order: TripleOrder,
    data: &Mmap,
) -> Result<(Pgno, Pgno, Pgno)> {
    let begin = w.page();
    let mut tb = BTreeBuilder::<TripleKey>::new(w);
    let mut last = TripleKey([0, 0, 0]);
    let mut any = false;

    let mut cur = Cursor::new(data);
    while !cur.at_end() {
        let t = order.to_key(read_triple(&mut cur));

        let len = if t.0[0] == last.0[0] {
            if t.0[1] == last.0[1] {
                debug_assert!(t.0[2] > last.0[2]);
                let gap = t.0[2] - last.0[2];
                if gap < 128 {
                    1
                } else {
                    1 + len_delta(gap - 128)
                }
            } else {
                1 + len_delta(t.0[1] - last.0[1]) + len_delta(t.0[2] - 1)
            }
        } else {
            1 + len_delta(t.0[0] - last.0[0])
                + len_delta(t.0[1] - 1)
                + len_delta(t.0[2] - 1)
        };

        if !any || len > w.remaining() {
            if any {
                tb.end_leaf(w, last);
            }
            tb.begin_leaf(w)?;
            for c in t.0 {
                w.write_int(c)?;
            }
        } else if t.0[0] == last.0[0] {
            if t.0[1] == last.0[1] {
                let gap = t.0[2] - last.0[2];
                if gap < 128 {
                    w.write_byte(gap as u8)?;
                } else {
                    let delta = gap - 128;
                    w.write_byte((0x80 + len_delta(delta)) as u8)?;
                    w.write_delta(delta)?;
                }
            } else {
                let delta = t.0[1] - last.0[1];
                w.write_byte((0x80 + len_delta(delta) * 5 + len_delta(t.0[2] - 1)) as u8)?;
                w.write_delta(delta)?;
                w.write_delta(t.0[2] - 1)?;
            }
        } else {
            let delta = t.0[0] - last.0[0];
            w.write_byte(
                (0x80 + len_delta(delta) * 25
                    + len_delta(t.0[1] - 1) * 5
                    + len_delta(t.0[2] - 1)) as u8,
            )?;
            w.write_delta(delta)?;
            w.write_delta(t.0[1] - 1)?;
            w.write_delta(t.0[2] - 1)?;
        }

        last = t;
        any = true;
    }
    if any {
        tb.end_leaf(w, last);
    }
    let end = tb.last_leaf();
    let root = tb.construct_tree(w)?;
    Ok((begin, end, root))
}

/// Pack the aggregated tree of one order: (first two components, group
/// count).
fn store_aggregated_triples(w: &mut PageWriter, order: TripleOrder, data: &Mmap) -> Result<Pgno> {
    let mut tb = BTreeBuilder::<[u32; 2]>::new(w);
    let mut last: [u32; 2] = [0, 0];
    let mut any = false;

    let mut groups: Vec<([u32; 2], u32)> = Vec::new();
    {
        let mut cur = Cursor::new(data);
        let mut current: Option<([u32; 2], u32)> = None;
        while !cur.at_end() {
            let k = order.to_key(read_triple(&mut cur));
            let prefix = [k.0[0], k.0[1]];
            match &mut current {
                Some((p, n)) if *p == prefix => *n += 1,
                _ => {
                    if let Some(g) = current.take() {
                        groups.push(g);
                    }
                    current = Some((prefix, 1));
                }
            }
        }
        if let Some(g) = current {
            groups.push(g);
        }
    }

    for (t, count) in groups {
        let len = if t[0] == last[0] {
            if t[1] - last[1] < 32 && count < 5 {
                1
            } else {
                1 + len_delta(t[1] - last[1] - 1) + len_delta(count - 1)
            }
        } else {
            1 + len_delta(t[0] - last[0]) + len_delta(t[1] - 1) + len_delta(count - 1)
        };

        if !any || len > w.remaining() {
            if any {
                tb.end_leaf(w, last);
            }
            tb.begin_leaf(w)?;
            w.write_int(t[0])?;
            w.write_int(t[1])?;
            w.write_int(count)?;
        } else if t[0] == last[0] {
            if t[1] - last[1] < 32 && count < 5 {
                w.write_byte((((count - 1) << 5) | (t[1] - last[1])) as u8)?;
            } else {
                let delta = t[1] - last[1] - 1;
                w.write_byte((0x80 + len_delta(delta) * 5 + len_delta(count - 1)) as u8)?;
                w.write_delta(delta)?;
                w.write_delta(count - 1)?;
            }
        } else {
            let delta = t[0] - last[0];
            w.write_byte(
                (0x80 + len_delta(delta) * 25
                    + len_delta(t[1] - 1) * 5
                    + len_delta(count - 1)) as u8,
            )?;
            w.write_delta(delta)?;
            w.write_delta(t[1] - 1)?;
            w.write_delta(count - 1)?;
        }

        last = t;
        any = true;
    }
    if any {
        tb.end_leaf(w, last);
    }
    tb.construct_tree(w)
}

/// Pack the fully aggregated tree: (first component, group count).
fn store_fully_aggregated_triples(
    w: &mut PageWriter,
    order: TripleOrder,
    data: &Mmap,
) -> Result<Pgno> {
    let mut tb = BTreeBuilder::<u32>::new(w);
    let mut last: u32 = 0;
    let mut any = false;

    let mut groups: Vec<(u32, u32)> = Vec::new();
    {
        let mut cur = Cursor::new(data);
        let mut current: Option<(u32, u32)> = None;
        while !cur.at_end() {
            let k = order.to_key(read_triple(&mut cur));
            match &mut current {
                Some((c, n)) if *c == k.0[0] => *n += 1,
                _ => {
                    if let Some(g) = current.take() {
                        groups.push(g);
                    }
                    current = Some((k.0[0], 1));
                }
            }
        }
        if let Some(g) = current {
            groups.push(g);
        }
    }

    for (c, count) in groups {
        let len = if c - last < 16 && count < 9 {
            1
        } else {
            1 + len_delta(c - last - 1) + len_delta(count - 1)
        };

        if !any || len > w.remaining() {
            if any {
                tb.end_leaf(w, last);
            }
            tb.begin_leaf(w)?;
            w.write_int(c)?;
            w.write_int(count)?;
        } else if c - last < 16 && count < 9 {
            w.write_byte((((count - 1) << 4) | (c - last)) as u8)?;
        } else {
            let delta = c - last - 1;
            w.write_byte((0x80 + len_delta(delta) * 5 + len_delta(count - 1)) as u8)?;
            w.write_delta(delta)?;
            w.write_delta(count - 1)?;
        }

        last = c;
        any = true;
    }
    if any {
        tb.end_leaf(w, last);
    }
    tb.construct_tree(w)
}

/// Pack one order's leaves, tree and aggregated companions.
fn pack_order(
    w: &mut PageWriter,
    meta: &mut StoreMeta,
    order: TripleOrder,
    data: &Mmap,
) -> Result<()> {
    let (begin, end, root) = store_full_triples(w, order, data)?;
    let aggregated = store_aggregated_triples(w, order, data)?;
    meta.orders[order as usize] = (begin, end, root, aggregated);
    if order.has_fully_aggregated() {
        let component = order.perm()[0];
        meta.fully_aggregated[component] = store_fully_aggregated_triples(w, order, data)?;
    }
    Ok(())
}

/// Store the raw table and all six order indexes.
fn store_triples(
    w: &mut PageWriter,
    meta: &mut StoreMeta,
    triples: &mut TempFile,
    base: &Path,
) -> Result<()> {
    let spo = triples.map()?;
    store_raw_table(w, meta, &spo)?;

    for order in TRIPLE_ORDERS {
        if order == TripleOrder::Spo {
            // the input is already in SPO order
            pack_order(w, meta, order, &spo)?;
            continue;
        }
        let mut input = TempFile::new(base)?;
        input.write_bytes(&spo)?;
        let mut sorted = TempFile::new(base)?;
        sort(
            &mut input,
            &mut sorted,
            skip_triple,
            |mut a, mut b| {
                let ta = order.to_key(read_triple(&mut a));
                let tb = order.to_key(read_triple(&mut b));
                ta.cmp(&tb)
            },
            false,
        )?;
        input.discard()?;
        {
            let data = sorted.map()?;
            pack_order(w, meta, order, &data)?;
        }
        sorted.discard()?;
    }
    Ok(())
}

// ----------------------------------------------------------------------
// Packing dictionaries
// ----------------------------------------------------------------------

/// Generic hash-tree packing: leaves hold a count subheader followed by
/// fixed-size (hash, payload) entries; runs of equal hashes never split
/// across pages.
fn store_hash_tree(
    w: &mut PageWriter,
    data: &Mmap,
    entry_size: usize,
    payload_size: usize,
) -> Result<Pgno> {
    const SUBHEADER_SIZE: usize = 4;

    let mut tb = BTreeBuilder::<u32>::new(w);
    tb.begin_leaf(w)?;
    let count_offset = w.offset();
    w.skip(SUBHEADER_SIZE);
    let header_size = w.offset();

    let mut cur = Cursor::new(data);
    let mut count: u32 = 0;
    let mut last: u32 = 0;
    let mut run: Vec<Vec<u8>> = Vec::new();
    while !cur.at_end() {
        let h = cur.read_int();
        run.clear();
        run.push(cur.read_bytes(payload_size).to_vec());
        while !cur.at_end() && cur.peek_int(0) == h {
            cur.skip(4);
            run.push(cur.read_bytes(payload_size).to_vec());
        }

        if entry_size * run.len() > w.remaining() {
            if header_size + entry_size * run.len() > PAGE_SIZE {
                return Err(Error::TooManyCollisions);
            }
            w.write_int_at(count, count_offset);
            tb.end_leaf(w, last);
            tb.begin_leaf(w)?;
            w.skip(SUBHEADER_SIZE);
            count = 0;
        }

        for payload in &run {
            w.write_int(h)?;
            w.write_bytes(payload)?;
            count += 1;
        }
        last = h;
    }

    w.write_int_at(count, count_offset);
    tb.end_leaf(w, last);
    tb.construct_tree(w)
}

fn store_strings(
    w: &mut PageWriter,
    meta: &mut StoreMeta,
    mut table: TempFile,
    mut offsets: TempFile,
    hashes: &mut TempFile,
) -> Result<()> {
    meta.strings_begin = w.page();
    {
        let data = table.map()?;
        w.direct_write(&data)?;
    }
    table.discard()?;

    meta.strings_mapping = w.page();
    {
        let data = offsets.map()?;
        w.direct_write(&data)?;
    }
    offsets.discard()?;

    let data = hashes.map()?;
    meta.strings_index = store_hash_tree(w, &data, 12, 8)?;
    Ok(())
}

fn store_values(
    w: &mut PageWriter,
    meta: &mut StoreMeta,
    table: &mut TempFile,
    hashes: &mut TempFile,
    eq: &mut TempFile,
) -> Result<()> {
    // strip the leading sort ids off the dictionary records
    meta.values_begin = w.page();
    {
        let data = table.map()?;
        let mut cur = Cursor::new(&data);
        let mut image: Vec<u8> = Vec::with_capacity(data.len());
        while !cur.at_end() {
            cur.skip_varint();
            image.extend_from_slice(cur.read_bytes(VALUE_RECORD_SIZE));
        }
        w.direct_write(&image)?;
    }

    meta.values_eq_classes = w.page();
    {
        let data = eq.map()?;
        w.direct_write(&data)?;
    }

    let data = hashes.map()?;
    meta.values_index = store_hash_tree(w, &data, 8, 4)?;
    Ok(())
}

fn store_header(w: &mut PageWriter, meta: &StoreMeta) -> Result<()> {
    w.seek(0)?;
    w.write_bytes(MAGIC)?;
    w.write_int(VERSION)?;

    w.write_int(meta.triples_count)?;
    w.write_int(meta.raw_table)?;

    for (begin, end, root, aggregated) in meta.orders {
        w.write_int(begin)?;
        w.write_int(end)?;
        w.write_int(root)?;
        w.write_int(aggregated)?;
    }
    for page in meta.fully_aggregated {
        w.write_int(page)?;
    }

    w.write_int(meta.strings_count)?;
    w.write_int(meta.strings_begin)?;
    w.write_int(meta.strings_mapping)?;
    w.write_int(meta.strings_index)?;

    w.write_int(meta.values_begin)?;
    w.write_int(meta.values_index)?;
    w.write_int(meta.values_eq_classes)?;
    for start in meta.categories {
        w.write_int(start)?;
    }

    w.flush()
}
