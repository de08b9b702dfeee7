//! Buffered temporary files used by the build pipeline.
//!
//! Every intermediate dataset lives in a `<db>.<n>.tmp` file next to the
//! output store. Files are written once, closed, then memory-mapped for
//! sorting or sequential reading, and finally discarded.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::Mmap;

use crate::error::Result;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Longest possible varint encoding of a u64
pub const MAX_VARINT_SIZE: usize = 10;

/// Append a varint (7-bit groups, least-significant first) to a buffer.
pub fn push_varint(buf: &mut Vec<u8>, mut v: u64) {
    loop {
        let group = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            buf.push(group);
            return;
        }
        buf.push(group | 0x80);
    }
}

/// Encoded size of a varint.
pub fn varint_len(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

/// A write-once temporary file.
pub struct TempFile {
    base: PathBuf,
    path: PathBuf,
    out: Option<BufWriter<File>>,
}

impl TempFile {
    /// Create a fresh temp file next to `base`.
    pub fn new(base: &Path) -> Result<TempFile> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let mut name = base.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".{}.tmp", id));
        let path = base.with_file_name(name);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(TempFile {
            base: base.to_path_buf(),
            path,
            out: Some(BufWriter::new(file)),
        })
    }

    /// The base path this file was derived from (for creating siblings).
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> &mut BufWriter<File> {
        self.out.as_mut().expect("temp file already closed")
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer().write_all(bytes)?;
        Ok(())
    }

    pub fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    /// 32-bit big-endian
    pub fn write_int(&mut self, v: u32) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    /// 64-bit big-endian
    pub fn write_long(&mut self, v: u64) -> Result<()> {
        self.write_bytes(&v.to_be_bytes())
    }

    pub fn write_varint(&mut self, v: u64) -> Result<()> {
        let mut buf = Vec::with_capacity(MAX_VARINT_SIZE);
        push_varint(&mut buf, v);
        self.write_bytes(&buf)
    }

    /// Flush buffered output and close the file for writing.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut out) = self.out.take() {
            out.flush()?;
        }
        Ok(())
    }

    /// Map the (closed) file for reading.
    pub fn map(&mut self) -> Result<Mmap> {
        self.close()?;
        let file = File::open(&self.path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(map)
    }

    /// Remove the file from disk.
    pub fn discard(mut self) -> Result<()> {
        self.close()?;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::cursor::Cursor;

    #[test]
    fn varint_encoding() {
        let mut buf = Vec::new();
        push_varint(&mut buf, 0);
        push_varint(&mut buf, 127);
        push_varint(&mut buf, 300);
        assert_eq!(buf, vec![0x00, 0x7f, 0xac, 0x02]);
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(u64::MAX), 10);
    }

    #[test]
    fn write_then_map_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("db");
        let mut f = TempFile::new(&base).unwrap();
        f.write_varint(300).unwrap();
        f.write_int(0xdeadbeef).unwrap();
        f.write_long(42).unwrap();
        let map = f.map().unwrap();
        let mut cur = Cursor::new(&map);
        assert_eq!(cur.read_varint(), 300);
        assert_eq!(cur.read_int(), 0xdeadbeef);
        assert_eq!(cur.read_long(), 42);
        f.discard().unwrap();
    }
}
