//! Element-wise result comparison.

use tilecheck_common::{codec, Mismatch, Result, TestCase};

/// Compare a kernel's output against the reference buffer, element by
/// element in row-major order.
///
/// Stops at the first divergence and returns a [`Mismatch`] carrying the
/// coordinates, both values, and the full case context.
pub fn compare(actual: &[u8], expected: &[u8], case: &TestCase) -> Result<()> {
    for row in 0..case.tensor.height() {
        for col in 0..case.tensor.width() {
            let got = codec::decode(actual, row, col, case.tensor, case.elem)?;
            let want = codec::decode(expected, row, col, case.tensor, case.elem)?;
            if got != want {
                return Err(Mismatch {
                    program: case.program.clone(),
                    col,
                    row,
                    actual: got,
                    expected: want,
                    tensor: case.tensor,
                    tile: case.tile,
                    elem: case.elem,
                    mode: case.mode,
                }
                .into());
            }
        }
    }
    Ok(())
}
