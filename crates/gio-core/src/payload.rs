use std::os::raw::c_void;

use crate::error::{GioError, Result, ValidationError};

/// Width in bytes of one payload element (a 4-byte integer).
pub const ELEMENT_WIDTH: usize = std::mem::size_of::<i32>();

/// Fill value for buffers that are about to be read into.
pub const SENTINEL: i32 = -1;

/// Fixed-size buffer of 4-byte integers, all set to one value.
///
/// Writers fill it with their rank (or sub-rank); readers start from
/// [`SENTINEL`] and check the result with [`Payload::validate`].
///
/// Buffers built with [`Payload::generate_bytes`] may end in a partial
/// element; its bytes are the leading bytes of the fill value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    data: Vec<i32>,
    size: usize,
}

impl Payload {
    /// Allocate `size` bytes and set every element to `value`.
    ///
    /// `size` must be a positive multiple of [`ELEMENT_WIDTH`]; the buffer is
    /// never truncated or padded to fit.
    pub fn generate(size: usize, value: i32) -> Result<Self> {
        if size == 0 || size % ELEMENT_WIDTH != 0 {
            return Err(GioError::config(format!(
                "payload size {size} is not a positive multiple of {ELEMENT_WIDTH} bytes"
            )));
        }

        Self::allocate(size, value)
    }

    /// Allocate exactly `size` bytes of `value`, for byte-addressed private
    /// files. A trailing partial element holds the leading bytes of `value`.
    pub fn generate_bytes(size: usize, value: i32) -> Result<Self> {
        if size == 0 {
            return Err(GioError::config("payload size must be positive"));
        }
        Self::allocate(size, value)
    }

    fn allocate(size: usize, value: i32) -> Result<Self> {
        let count = size.div_ceil(ELEMENT_WIDTH);
        let mut data = Vec::new();
        data.try_reserve_exact(count)
            .map_err(|e| GioError::Resource(format!("cannot allocate {size} bytes: {e}")))?;
        data.resize(count, value);
        Ok(Self { data, size })
    }

    /// Allocate a read buffer pre-filled with [`SENTINEL`].
    pub fn sentinel(size: usize) -> Result<Self> {
        Self::generate(size, SENTINEL)
    }

    /// Byte-sized counterpart of [`sentinel`](Self::sentinel).
    pub fn sentinel_bytes(size: usize) -> Result<Self> {
        Self::generate_bytes(size, SENTINEL)
    }

    /// Number of elements, counting a trailing partial one.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size in bytes.
    pub fn byte_len(&self) -> usize {
        self.size
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: i32 has no padding and u8 has alignment 1; the view covers
        // exactly the initialized elements.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr() as *const u8, self.byte_len()) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.byte_len();
        // SAFETY: as above; every bit pattern is a valid i32.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut u8, len) }
    }

    pub fn as_ptr(&self) -> *const c_void {
        self.data.as_ptr() as *const c_void
    }

    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.data.as_mut_ptr() as *mut c_void
    }

    /// Check that every element equals `expected`, reporting the first
    /// mismatch. Only the in-range bytes of a trailing partial element are
    /// compared.
    pub fn validate(&self, expected: i32) -> std::result::Result<(), ValidationError> {
        let whole = self.size / ELEMENT_WIDTH;
        if let Some(index) = self.data[..whole].iter().position(|&v| v != expected) {
            return Err(ValidationError {
                index,
                expected,
                actual: self.data[index],
            });
        }

        let tail = self.size % ELEMENT_WIDTH;
        if tail != 0 {
            let actual = self.data[whole];
            if actual.to_ne_bytes()[..tail] != expected.to_ne_bytes()[..tail] {
                return Err(ValidationError {
                    index: whole,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}
