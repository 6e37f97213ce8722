//! Shared byte buffer with zero-copy sub-range views.
//!
//! A [Buffer] is a handle to a reference-counted allocation plus a byte range.
//! Cloning a handle or taking a [Buffer::slice] never copies: every view of the
//! same allocation observes writes made through any other view.

use std::cell::RefCell;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

#[derive(Clone)]
pub struct Buffer {
    bytes: Rc<RefCell<Vec<u8>>>,
    start: usize,
    end: usize,
}

impl Buffer {
    /// Allocates `len` zero bytes.
    pub fn alloc(len: usize) -> Self {
        Buffer::from_vec(vec![0; len])
    }

    /// Takes ownership of `bytes` without copying.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let end = bytes.len();
        Buffer {
            bytes: Rc::new(RefCell::new(bytes)),
            start: 0,
            end,
        }
    }

    /// Copies `bytes` into a new allocation.
    pub fn copy_from(bytes: &[u8]) -> Self {
        Buffer::from_vec(bytes.to_vec())
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns a view of `range` relative to this view. The range is clamped to the view.
    pub fn slice(&self, range: Range<usize>) -> Buffer {
        let len = self.len();
        let start = range.start.min(len);
        let end = range.end.clamp(start, len);
        Buffer {
            bytes: Rc::clone(&self.bytes),
            start: self.start + start,
            end: self.start + end,
        }
    }

    /// Copies the viewed bytes into a new, unshared allocation.
    pub fn deep_clone(&self) -> Buffer {
        Buffer::copy_from(&self.to_vec())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.read(|bytes| bytes.to_vec())
    }

    /// Runs `f` with shared access to the viewed bytes.
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let bytes = self.bytes.borrow();
        f(&bytes[self.start..self.end])
    }

    /// Runs `f` with exclusive access to the viewed bytes.
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut bytes = self.bytes.borrow_mut();
        f(&mut bytes[self.start..self.end])
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.read(|bytes| bytes.get(index).copied())
    }

    /// Overwrites the viewed bytes with `src`, which must have the same length.
    pub fn copy_from_slice(&self, src: &[u8]) {
        self.write(|bytes| bytes.copy_from_slice(src));
    }

    /// Reverses the byte order of every `width`-byte element in place.
    /// Trailing bytes that do not form a whole element are left untouched.
    pub fn swap(&self, width: usize) {
        if width < 2 {
            return;
        }

        self.write(|bytes| {
            for chunk in bytes.chunks_exact_mut(width) {
                chunk.reverse();
            }
        });
    }

    pub fn swap16(&self) {
        self.swap(2);
    }

    pub fn swap32(&self) {
        self.swap(4);
    }

    pub fn swap64(&self) {
        self.swap(8);
    }

    /// True when both views share the same allocation and range.
    pub fn same_view(&self, other: &Buffer) -> bool {
        Rc::ptr_eq(&self.bytes, &other.bytes) && self.start == other.start && self.end == other.end
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.read(|a| other.read(|b| a == b))
    }
}

impl PartialEq<[u8]> for Buffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.read(|a| a == other)
    }
}

impl PartialEq<&[u8]> for Buffer {
    fn eq(&self, other: &&[u8]) -> bool {
        self.read(|a| a == *other)
    }
}

impl<const N: usize> PartialEq<[u8; N]> for Buffer {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.read(|a| a == other)
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(bytes: Vec<u8>) -> Self {
        Buffer::from_vec(bytes)
    }
}

impl From<&[u8]> for Buffer {
    fn from(bytes: &[u8]) -> Self {
        Buffer::copy_from(bytes)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Buffer")?;
        self.read(|bytes| {
            bytes
                .iter()
                .try_for_each(|byte| write!(f, " {:02x}", byte))
        })?;
        write!(f, ">")
    }
}
