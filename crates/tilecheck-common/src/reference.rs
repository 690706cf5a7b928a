//! Tile-independent reference model.
//!
//! Computes the expected output buffer for a test case from the input
//! alone. The result depends only on the input bytes, shape, element type,
//! and compute mode; tile shape must never influence it.

use crate::codec::{decode, encode};
use crate::error::Result;
use crate::types::{ComputeMode, CopyTransform, ElementType, TensorShape};

/// Compute the expected output for `input`.
///
/// CROSS sums each cell with its in-bounds 4-neighbors (no wraparound, no
/// zero-padding) and reduces modulo `2^(8*width)`. COPY applies the
/// per-program transform cell by cell. Bit-deterministic for a given input.
pub fn expected(
    input: &[u8],
    shape: TensorShape,
    elem: ElementType,
    mode: ComputeMode,
    transform: CopyTransform,
) -> Result<Vec<u8>> {
    let mut out = vec![0u8; shape.byte_len(elem)];

    for row in 0..shape.height() {
        for col in 0..shape.width() {
            let own = decode(input, row, col, shape, elem)?;
            let value = match mode {
                ComputeMode::Cross => {
                    let mut sum = own;
                    if col > 0 {
                        sum = sum.wrapping_add(decode(input, row, col - 1, shape, elem)?);
                    }
                    if row > 0 {
                        sum = sum.wrapping_add(decode(input, row - 1, col, shape, elem)?);
                    }
                    if col + 1 < shape.width() {
                        sum = sum.wrapping_add(decode(input, row, col + 1, shape, elem)?);
                    }
                    if row + 1 < shape.height() {
                        sum = sum.wrapping_add(decode(input, row + 1, col, shape, elem)?);
                    }
                    sum & elem.mask()
                }
                ComputeMode::Copy => transform.apply(own, elem),
            };
            encode(&mut out, row, col, shape, elem, value)?;
        }
    }

    Ok(out)
}
