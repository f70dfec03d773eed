//! Byte views of scalar buffers for the exchange paths.
//!
//! Exchange payloads are flat arrays of `Pod` scalars in native byte order;
//! both ends of a cumulate run the same binary, so no reordering is needed.

use bytemuck::Pod;

use crate::vector_error::VectorError;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

/// Byte length of `n` values of `T`.
#[inline]
pub const fn byte_len<T>(n: usize) -> usize {
    n * std::mem::size_of::<T>()
}

/// Check that a receive from `neighbor` delivered exactly `expected` bytes.
pub fn expect_exact_len(neighbor: usize, got: usize, expected: usize) -> Result<(), VectorError> {
    if got == expected {
        Ok(())
    } else {
        Err(VectorError::BufferSizeMismatch {
            neighbor,
            expected,
            got,
        })
    }
}

/// Copy received bytes into a typed staging buffer after a length check.
pub fn copy_into<T: Pod>(neighbor: usize, raw: &[u8], dst: &mut [T]) -> Result<(), VectorError> {
    expect_exact_len(neighbor, raw.len(), byte_len::<T>(dst.len()))?;
    cast_slice_mut(dst).copy_from_slice(raw);
    Ok(())
}
