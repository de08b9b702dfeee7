//! External merge sort over temporary files.
//!
//! Records are variable-length byte ranges delimited by a `skip` function
//! and ordered by a byte-level comparator. Input that fits the memory
//! budget is sorted in one pass; larger inputs are cut into sorted runs
//! spooled to an intermediate file and merged through a heap.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use memmap2::Mmap;

use crate::builder::tempfile::TempFile;
use crate::error::Result;
use crate::store::cursor::Cursor;

/// In-memory budget for one sorted run
const MEM_LIMIT: usize = 256 << 20;

/// A record as a byte range of the input map.
#[derive(Clone, Copy)]
struct Range {
    from: usize,
    to: usize,
}

/// Sort the records of `input` into `output`.
///
/// * `skip` advances a cursor over exactly one record.
/// * `compare` orders two records given cursors at their starts.
/// * `eliminate_duplicates` drops records that are byte-identical to their
///   predecessor.
pub fn sort(
    input: &mut TempFile,
    output: &mut TempFile,
    skip: impl Fn(&mut Cursor<'_>),
    compare: impl Fn(Cursor<'_>, Cursor<'_>) -> Ordering,
    eliminate_duplicates: bool,
) -> Result<()> {
    let map = input.map()?;
    let len = map.len();

    let mut intermediate = TempFile::new(output.base())?;
    let mut runs: Vec<(usize, usize)> = Vec::new();

    let mut pos = 0usize;
    while pos < len {
        // collect one run worth of records
        let begin = pos;
        let mut items: Vec<Range> = Vec::new();
        while pos < len {
            let mut cur = Cursor::new(&map);
            cur.skip(pos);
            let start = cur.offset();
            skip(&mut cur);
            items.push(Range {
                from: start,
                to: cur.offset(),
            });
            pos = cur.offset();
            if pos - begin + items.len() * std::mem::size_of::<Range>() > MEM_LIMIT {
                break;
            }
        }

        items.sort_by(|a, b| {
            compare(cursor_at(&map, a.from), cursor_at(&map, b.from))
        });

        if pos >= len && runs.is_empty() {
            // everything fit in one run
            spool(output, &map, &items, eliminate_duplicates)?;
            output.close()?;
            intermediate.discard()?;
            return Ok(());
        }

        let run_begin = run_len(&runs);
        let written = spool(&mut intermediate, &map, &items, eliminate_duplicates)?;
        runs.push((run_begin, run_begin + written));
    }

    // merge the runs
    let imap = intermediate.map()?;
    let mut heap: BinaryHeap<RunHead<'_>> = BinaryHeap::new();
    for &(from, to) in &runs {
        if from < to {
            heap.push(RunHead {
                map: &imap,
                pos: from,
                end: to,
                compare: &compare,
            });
        }
    }
    let mut last: Option<(usize, usize)> = None;
    while let Some(mut head) = heap.pop() {
        let mut cur = cursor_at(&imap, head.pos);
        skip(&mut cur);
        let record = (head.pos, cur.offset());
        let duplicate = eliminate_duplicates
            && last.map_or(false, |(f, t)| {
                imap[f..t] == imap[record.0..record.1]
            });
        if !duplicate {
            output.write_bytes(&imap[record.0..record.1])?;
        }
        last = Some(record);
        head.pos = record.1;
        if head.pos < head.end {
            heap.push(head);
        }
    }
    output.close()?;
    intermediate.discard()?;
    Ok(())
}

fn cursor_at<'a>(map: &'a Mmap, pos: usize) -> Cursor<'a> {
    let mut cur = Cursor::new(map);
    cur.skip(pos);
    cur
}

fn run_len(runs: &[(usize, usize)]) -> usize {
    runs.last().map_or(0, |&(_, to)| to)
}

fn spool(
    out: &mut TempFile,
    map: &Mmap,
    items: &[Range],
    eliminate_duplicates: bool,
) -> Result<usize> {
    let mut written = 0usize;
    let mut last: Option<Range> = None;
    for &r in items {
        let duplicate = eliminate_duplicates
            && last.map_or(false, |l| map[l.from..l.to] == map[r.from..r.to]);
        if !duplicate {
            out.write_bytes(&map[r.from..r.to])?;
            written += r.to - r.from;
        }
        last = Some(r);
    }
    Ok(written)
}

/// Head of a sorted run inside the merge heap. Ordered so the heap pops the
/// smallest record first.
struct RunHead<'a> {
    map: &'a Mmap,
    pos: usize,
    end: usize,
    compare: &'a dyn for<'c> Fn(Cursor<'c>, Cursor<'c>) -> Ordering,
}

impl<'a> PartialEq for RunHead<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<'a> Eq for RunHead<'a> {}

impl<'a> PartialOrd for RunHead<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> Ord for RunHead<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        (self.compare)(cursor_at(self.map, self.pos), cursor_at(other.map, other.pos))
            .reverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_varint_records() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("db");
        let mut input = TempFile::new(&base).unwrap();
        for v in [300u64, 5, 5, 1000, 2] {
            input.write_varint(v).unwrap();
        }
        let mut output = TempFile::new(&base).unwrap();
        sort(
            &mut input,
            &mut output,
            |cur| cur.skip_varint(),
            |mut a, mut b| a.read_varint().cmp(&b.read_varint()),
            true,
        )
        .unwrap();
        let map = output.map().unwrap();
        let mut cur = Cursor::new(&map);
        let mut got = Vec::new();
        while !cur.at_end() {
            got.push(cur.read_varint());
        }
        assert_eq!(got, vec![2, 5, 300, 1000]);
    }
}
