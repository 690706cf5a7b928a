//! Variable-width element codec for row-major byte buffers.
//!
//! Elements are little-endian unsigned integers of 1, 2, 4, or 8 bytes,
//! addressed as `(row * tensor_width + col) * element_width`. The default
//! comparison path is unsigned with modulo reduction; signedness never
//! changes the byte layout.

use crate::error::{Result, TilecheckError};
use crate::types::{ElementType, TensorShape};

fn offset(row: u32, col: u32, shape: TensorShape, elem: ElementType) -> Result<usize> {
    if row >= shape.height() || col >= shape.width() {
        return Err(TilecheckError::OutOfRange { row, col, tensor: shape });
    }
    Ok((row as usize * shape.width() as usize + col as usize) * elem.width())
}

fn check_len(buf: &[u8], shape: TensorShape, elem: ElementType) -> Result<()> {
    let expected = shape.byte_len(elem);
    if buf.len() != expected {
        return Err(TilecheckError::BufferLength { actual: buf.len(), expected });
    }
    Ok(())
}

/// Decode the element at `(row, col)` as a little-endian unsigned integer.
pub fn decode(buf: &[u8], row: u32, col: u32, shape: TensorShape, elem: ElementType) -> Result<u64> {
    check_len(buf, shape, elem)?;
    let base = offset(row, col, shape, elem)?;
    let mut value = 0u64;
    for (i, &byte) in buf[base..base + elem.width()].iter().enumerate() {
        value |= (byte as u64) << (8 * i);
    }
    Ok(value)
}

/// Encode `value` at `(row, col)`, little-endian, reduced modulo the
/// element width. Used when constructing synthetic inputs deterministically.
pub fn encode(
    buf: &mut [u8],
    row: u32,
    col: u32,
    shape: TensorShape,
    elem: ElementType,
    value: u64,
) -> Result<()> {
    check_len(buf, shape, elem)?;
    let base = offset(row, col, shape, elem)?;
    let value = value & elem.mask();
    for i in 0..elem.width() {
        buf[base + i] = ((value >> (8 * i)) & 0xff) as u8;
    }
    Ok(())
}
