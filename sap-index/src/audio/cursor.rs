//! Memory-mapped byte cursor
//!
//! Exposes one file's bytes as a random-access, cursor-advancing sequence.
//! The cursor owns the mapping: `close()` releases it (idempotently) and drop
//! releases it if `close()` was never called. Every accessor is bounds-checked
//! against the mapped length; a closed cursor behaves like an empty buffer.
//!
//! Out-of-range positioning clamps instead of failing. Out-of-range reads are
//! reported as short reads (`None` / truncated slices) that the caller must
//! check.

use super::ParseError;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Single-reader cursor over a read-only file mapping
#[derive(Debug)]
pub struct MappedCursor {
    path: PathBuf,
    mmap: Option<Mmap>,
    cursor: usize,
}

impl MappedCursor {
    /// Map `path` read-only and place the cursor at byte 0
    ///
    /// Missing, unreadable, and empty files are rejected with `ParseError::Io`.
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let file = File::open(path).map_err(|e| ParseError::io(path, e))?;
        let len = file.metadata().map_err(|e| ParseError::io(path, e))?.len();
        if len == 0 {
            return Err(ParseError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "file is empty"),
            ));
        }

        // Safety: read-only mapping; all access goes through the bounds-checked
        // accessors below and the mapping never outlives `self`.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ParseError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            mmap: Some(mmap),
            cursor: 0,
        })
    }

    /// Release the mapping. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.mmap.take().is_some() {
            tracing::trace!(path = %self.path.display(), "Unmapped file");
        }
        self.cursor = 0;
    }

    pub fn is_open(&self) -> bool {
        self.mmap.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mapped length in bytes (0 once closed)
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current cursor offset
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.len() - self.cursor
    }

    /// Move the cursor by `delta` bytes, clamped to `[0, len - 1]`
    pub fn seek(&mut self, delta: i64) -> usize {
        let target = (self.cursor as i64).saturating_add(delta);
        self.cursor = if target <= 0 {
            0
        } else {
            usize::try_from(target).unwrap_or(usize::MAX).min(self.last_index())
        };
        self.cursor
    }

    /// Move the cursor to `offset`, clamped to `[0, len - 1]`
    pub fn goto(&mut self, offset: usize) -> usize {
        self.cursor = offset.min(self.last_index());
        self.cursor
    }

    /// Read one byte and advance; `None` at end of buffer
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = self.bytes().get(self.cursor).copied()?;
        self.cursor += 1;
        Some(byte)
    }

    /// Read up to `n` bytes and advance past them
    ///
    /// The returned slice is shorter than `n` when the buffer ends first.
    pub fn read_bytes(&mut self, n: usize) -> &[u8] {
        let start = self.cursor;
        let end = start.saturating_add(n).min(self.len());
        self.cursor = end;
        &self.bytes()[start..end]
    }

    /// Read `n` bytes as text (lossy UTF-8) and advance
    ///
    /// Returns `None`, cursor unmoved, when fewer than `n` bytes remain.
    pub fn read_string(&mut self, n: usize) -> Option<String> {
        if n > self.remaining() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.bytes()[self.cursor..self.cursor + n]).into_owned();
        self.cursor += n;
        Some(text)
    }

    /// Compare `literal` against the bytes at the cursor
    ///
    /// Advances past the literal only on a match. On a mismatch the cursor is
    /// left where it was so the caller can try another literal.
    pub fn matches(&mut self, literal: &[u8]) -> bool {
        let end = match self.cursor.checked_add(literal.len()) {
            Some(end) if end <= self.len() => end,
            _ => return false,
        };
        if &self.bytes()[self.cursor..end] != literal {
            return false;
        }
        self.cursor = end;
        true
    }

    /// Random access without moving the cursor
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes().get(offset).copied()
    }

    /// Read a little-endian u16; `None`, cursor unmoved, when short
    pub fn read_u16_le(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Read a little-endian u32; `None`, cursor unmoved, when short
    pub fn read_u32_le(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.cursor.checked_add(N)?;
        let array: [u8; N] = self.bytes().get(self.cursor..end)?.try_into().ok()?;
        self.cursor = end;
        Some(array)
    }

    fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    fn last_index(&self) -> usize {
        self.len().saturating_sub(1)
    }
}
