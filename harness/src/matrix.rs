//! Test matrix generation.
//!
//! Enumerates {element type, compute mode, tensor shape, tile shape}
//! combinations for one program. Degenerate tiles (1x1 and the full
//! tensor) are always present; the remaining dimensions are sampled from
//! a seeded generator, so the matrix is a pure function of the seed and
//! stays tractable without exhaustive enumeration.

use crate::config::RunConfig;
use crate::program::ProgramSpec;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tilecheck_common::{ElementType, Result, TensorShape, TestCase, TileShape};

/// Sampling bounds for the matrix.
#[derive(Debug, Clone, Copy)]
pub struct MatrixLimits {
    /// Tensor widths/heights sampled per axis (without replacement).
    pub dims_per_axis: usize,
    /// Extra tile sizes sampled per axis, on top of the degenerate two.
    pub tiles_per_axis: usize,
    /// Upper bound for sampled tensor dimensions.
    pub max_dim: u32,
    /// Tiles may exceed their dimension by up to this much.
    pub tile_slack: u32,
}

impl Default for MatrixLimits {
    fn default() -> Self {
        Self { dims_per_axis: 3, tiles_per_axis: 1, max_dim: 124, tile_slack: 29 }
    }
}

impl From<&RunConfig> for MatrixLimits {
    fn from(config: &RunConfig) -> Self {
        Self {
            dims_per_axis: config.dims_per_axis.max(1),
            tiles_per_axis: config.tiles_per_axis,
            ..Default::default()
        }
    }
}

/// Sample `count` distinct dimensions from `[1, max_dim]`.
fn sample_dims(rng: &mut StdRng, limits: &MatrixLimits) -> Vec<u32> {
    let pool = limits.max_dim as usize;
    let count = limits.dims_per_axis.clamp(1, pool);
    index::sample(rng, pool, count).iter().map(|i| i as u32 + 1).collect()
}

/// Tile sizes for one dimension: always 1 and the full dimension, plus
/// sampled sizes from `[1, dim + slack]` so tiles can exceed the tensor.
fn tile_sizes(rng: &mut StdRng, dim: u32, limits: &MatrixLimits) -> Vec<u32> {
    let mut sizes = vec![1, dim];
    let upper = dim + limits.tile_slack;
    for _ in 0..limits.tiles_per_axis {
        sizes.push(rng.gen_range(1..=upper));
    }
    sizes
}

/// Generate the finite test matrix for `program`.
///
/// Restartable: equal seeds produce identical matrices. Cases are ordered
/// so that equal codegen signatures are contiguous, keeping the artifact
/// cache effective.
pub fn generate(
    program: &ProgramSpec,
    seed: u64,
    limits: &MatrixLimits,
    strided: bool,
) -> Result<Vec<TestCase>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cases = Vec::new();

    for elem in ElementType::ALL {
        for &mode in &program.modes {
            let widths = sample_dims(&mut rng, limits);
            let heights = sample_dims(&mut rng, limits);
            for &width in &widths {
                for &height in &heights {
                    let tensor = TensorShape::new(width, height)?;
                    let tile_widths = tile_sizes(&mut rng, width, limits);
                    let tile_heights = tile_sizes(&mut rng, height, limits);
                    for &tile_w in &tile_widths {
                        for &tile_h in &tile_heights {
                            cases.push(TestCase {
                                program: program.name.clone(),
                                elem,
                                mode,
                                tensor,
                                tile: TileShape::new(tile_w, tile_h)?,
                                strided,
                            });
                        }
                    }
                }
            }
        }
    }

    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use tilecheck_common::ComputeMode;

    fn spec(arg: &str) -> ProgramSpec {
        ProgramSpec::from_arg(arg, BackendKind::Native)
    }

    #[test]
    fn same_seed_reproduces_the_matrix() {
        let program = spec("cross.c");
        let limits = MatrixLimits::default();
        let a = generate(&program, 11, &limits, false).unwrap();
        let b = generate(&program, 11, &limits, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_change_the_sampling() {
        let program = spec("cross.c");
        let limits = MatrixLimits::default();
        let a = generate(&program, 1, &limits, false).unwrap();
        let b = generate(&program, 2, &limits, false).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn every_tensor_shape_gets_degenerate_tiles() {
        let program = spec("cross.c");
        let cases = generate(&program, 3, &MatrixLimits::default(), false).unwrap();
        let shapes: std::collections::HashSet<_> =
            cases.iter().map(|c| (c.elem, c.tensor)).collect();
        for (elem, tensor) in shapes {
            let with_shape =
                |p: &dyn Fn(&TestCase) -> bool| cases.iter().any(|c| c.elem == elem && c.tensor == tensor && p(c));
            assert!(with_shape(&|c| c.tile.width() == 1 && c.tile.height() == 1));
            assert!(with_shape(&|c| c.tile.width() == tensor.width()
                && c.tile.height() == tensor.height()));
        }
    }

    #[test]
    fn dimensions_stay_within_bounds() {
        let program = spec("cross.c");
        let limits = MatrixLimits::default();
        let cases = generate(&program, 5, &limits, false).unwrap();
        for case in &cases {
            assert!(case.tensor.width() >= 1 && case.tensor.width() <= limits.max_dim);
            assert!(case.tensor.height() >= 1 && case.tensor.height() <= limits.max_dim);
            assert!(case.tile.width() >= 1);
            assert!(case.tile.width() <= case.tensor.width() + limits.tile_slack);
            assert!(case.tile.height() <= case.tensor.height() + limits.tile_slack);
        }
    }

    #[test]
    fn all_eight_element_types_are_covered() {
        let program = spec("cross.c");
        let cases = generate(&program, 7, &MatrixLimits::default(), false).unwrap();
        let elems: std::collections::HashSet<_> = cases.iter().map(|c| c.elem).collect();
        assert_eq!(elems.len(), 8);
    }

    #[test]
    fn modes_follow_the_program_capability() {
        let cross_only = generate(&spec("cross.c"), 1, &MatrixLimits::default(), false).unwrap();
        assert!(cross_only.iter().all(|c| c.mode == ComputeMode::Cross));

        let both = generate(&spec("cross.cpp"), 1, &MatrixLimits::default(), false).unwrap();
        assert!(both.iter().any(|c| c.mode == ComputeMode::Cross));
        assert!(both.iter().any(|c| c.mode == ComputeMode::Copy));

        let copy_only =
            generate(&spec("duplex_simple_buffering.cpp"), 1, &MatrixLimits::default(), false)
                .unwrap();
        assert!(copy_only.iter().all(|c| c.mode == ComputeMode::Copy));
    }

    #[test]
    fn case_count_stays_tractable() {
        let program = spec("cross.cpp");
        let limits = MatrixLimits::default();
        let cases = generate(&program, 9, &limits, false).unwrap();
        // 8 types x 2 modes x dims^2 tensor shapes x (tiles+2)^2 tiles.
        let per_shape = (limits.tiles_per_axis + 2).pow(2);
        let expected = 8 * 2 * limits.dims_per_axis.pow(2) * per_shape;
        assert_eq!(cases.len(), expected);
        assert!(cases.len() < 5000);
    }

    #[test]
    fn equal_signatures_are_contiguous() {
        let program = spec("cross.cpp");
        let cases = generate(&program, 13, &MatrixLimits::default(), false).unwrap();
        let sigs: Vec<_> = cases.iter().map(|c| program.signature(c)).collect();
        let mut seen = std::collections::HashSet::new();
        let mut last = None;
        for sig in sigs {
            if last.as_ref() != Some(&sig) {
                assert!(seen.insert(sig.clone()), "signature {sig} recurred after a gap");
                last = Some(sig);
            }
        }
    }

    #[test]
    fn strided_flag_propagates_to_every_case() {
        let program = spec("cross.c");
        let cases = generate(&program, 2, &MatrixLimits::default(), true).unwrap();
        assert!(cases.iter().all(|c| c.strided));
    }
}
