//! Shape and layout algebra used by the lowering rules.
//!
//! These are pure functions which turn graph-level shape information
//! (arbitrary rank, signed axes) into the fixed-rank, loop-friendly
//! parameters stored in instruction records.

use std::error::Error;
use std::fmt;
use std::iter::repeat;

use smallvec::SmallVec;

/// The fixed rank of shape arrays in instruction records.
///
/// The runtime interpreter iterates exactly this many axes. Shapes with a
/// lower rank are left-padded with unit dimensions.
pub const CANONICAL_RANK: usize = 4;

/// Shape of a tensor in the graph.
pub type Shape = SmallVec<[usize; 4]>;

/// Shape with [`CANONICAL_RANK`] dimensions, as stored in instruction records.
pub type RuntimeShape = [u32; CANONICAL_RANK];

/// Errors computing derived shapes or layout parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapeError {
    /// An axis is outside the range `[-ndim, ndim)`.
    AxisOutOfRange { axis: isize, ndim: usize },

    /// A shape has more dimensions than a fixed-rank array can hold.
    RankTooLarge { rank: usize, max: usize },

    /// A permutation does not contain each axis exactly once.
    InvalidPermutation,

    /// A dimension or derived size does not fit in the record field.
    DimensionOverflow,

    /// A zero-sized axis makes a derived loop size zero.
    ZeroSizedAxis { axis: usize },
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AxisOutOfRange { axis, ndim } => {
                write!(f, "axis {} is out of range for rank {}", axis, ndim)
            }
            Self::RankTooLarge { rank, max } => {
                write!(f, "rank {} exceeds maximum rank {}", rank, max)
            }
            Self::InvalidPermutation => write!(f, "invalid permutation"),
            Self::DimensionOverflow => write!(f, "size overflows record field"),
            Self::ZeroSizedAxis { axis } => write!(f, "axis {} has size zero", axis),
        }
    }
}

impl Error for ShapeError {}

/// Resolve an axis given as a value in `[-ndim, ndim)` to the zero-based
/// dimension of a tensor with `ndim` dimensions.
///
/// Negative axis values count backwards from the last dimension.
pub fn resolve_axis(ndim: usize, axis: isize) -> Result<usize, ShapeError> {
    let rank = ndim as isize;
    if axis < -rank || axis >= rank {
        return Err(ShapeError::AxisOutOfRange { axis, ndim });
    }
    let resolved = if axis >= 0 { axis } else { rank + axis };
    Ok(resolved as usize)
}

/// Resolve a set of axes using [`resolve_axis`].
///
/// The result is sorted and duplicate entries are removed.
pub fn resolve_axes(ndim: usize, axes: &[isize]) -> Result<SmallVec<[usize; 4]>, ShapeError> {
    let mut resolved = axes
        .iter()
        .map(|&axis| resolve_axis(ndim, axis))
        .collect::<Result<SmallVec<[usize; 4]>, _>>()?;
    resolved.sort_unstable();
    resolved.dedup();
    Ok(resolved)
}

/// Return true if `perm` contains each of `0..ndim` exactly once.
pub fn is_valid_permutation(ndim: usize, perm: &[usize]) -> bool {
    perm.len() == ndim && (0..ndim).all(|axis| perm.iter().filter(|&&p| p == axis).count() == 1)
}

/// Return the total number of elements in a tensor of a given shape.
pub fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Return an error naming the first zero-sized dimension in `dims`, whose
/// first entry is axis `first_axis` of the full shape.
fn check_nonzero(dims: &[usize], first_axis: usize) -> Result<(), ShapeError> {
    match dims.iter().position(|&size| size == 0) {
        Some(pos) => Err(ShapeError::ZeroSizedAxis {
            axis: first_axis + pos,
        }),
        None => Ok(()),
    }
}

/// Split the output of a concatenation along `axis` into the
/// `(inner_size, outer_size)` loop parameters used by the interpreter.
///
/// `inner_size` is the product of the dimensions after `axis`, in bytes.
/// `outer_size` is the product of the dimensions before `axis`. For each of
/// `outer_size` iterations, input `i` contributes `inner_size * dims[i]`
/// contiguous bytes, where `dims[i]` is the size of input `i` along `axis`.
///
/// Dimensions other than `axis` must be non-zero. The concatenation axis
/// itself may be empty.
pub fn concat_partition(
    shape: &[usize],
    element_width: usize,
    axis: usize,
) -> Result<(u64, u64), ShapeError> {
    if axis >= shape.len() {
        return Err(ShapeError::AxisOutOfRange {
            axis: axis as isize,
            ndim: shape.len(),
        });
    }

    check_nonzero(&shape[..axis], 0)?;
    check_nonzero(&shape[axis + 1..], axis + 1)?;

    let checked_product = |init: u64, dims: &[usize]| {
        dims.iter().try_fold(init, |acc, &dim| acc.checked_mul(dim as u64))
    };
    let inner_size = checked_product(element_width as u64, &shape[axis + 1..])
        .ok_or(ShapeError::DimensionOverflow)?;
    let outer_size = checked_product(1, &shape[..axis]).ok_or(ShapeError::DimensionOverflow)?;

    Ok((inner_size, outer_size))
}

/// Return the shape of the result of reducing `shape` over `axes`.
///
/// With `keep_dims` the reduced dimensions become 1 and the rank is
/// unchanged. Without it the reduced dimensions are removed, and a result
/// with no dimensions left becomes `[1]`.
pub fn reduced_shape(shape: &[usize], axes: &[usize], keep_dims: bool) -> Result<Shape, ShapeError> {
    if let Some(&axis) = axes.iter().find(|&&axis| axis >= shape.len()) {
        return Err(ShapeError::AxisOutOfRange {
            axis: axis as isize,
            ndim: shape.len(),
        });
    }

    let mut reduced: Shape = shape
        .iter()
        .enumerate()
        .filter_map(|(dim, &size)| match (axes.contains(&dim), keep_dims) {
            (false, _) => Some(size),
            (true, true) => Some(1),
            (true, false) => None,
        })
        .collect();

    if reduced.is_empty() {
        reduced.push(1);
    }
    Ok(reduced)
}

/// Extend a shape and a permutation of its axes to `target_rank` dimensions.
///
/// Unit dimensions are prepended to the shape and identity positions to the
/// permutation. Entries of the original permutation are shifted by the
/// number of inserted axes, so the original axes keep their relative order.
pub fn extend_rank(
    shape: &[usize],
    perm: &[usize],
    target_rank: usize,
) -> Result<(Shape, SmallVec<[usize; 4]>), ShapeError> {
    if shape.len() > target_rank {
        return Err(ShapeError::RankTooLarge {
            rank: shape.len(),
            max: target_rank,
        });
    }
    if !is_valid_permutation(shape.len(), perm) {
        return Err(ShapeError::InvalidPermutation);
    }

    let pad = target_rank - shape.len();
    let ext_shape = repeat(1).take(pad).chain(shape.iter().copied()).collect();
    let ext_perm = (0..pad).chain(perm.iter().map(|&p| p + pad)).collect();

    Ok((ext_shape, ext_perm))
}

/// Convert a shape to a fixed-rank record field, left-padding with 1s.
pub fn to_runtime_shape(shape: &[usize]) -> Result<RuntimeShape, ShapeError> {
    if shape.len() > CANONICAL_RANK {
        return Err(ShapeError::RankTooLarge {
            rank: shape.len(),
            max: CANONICAL_RANK,
        });
    }

    let mut runtime_shape = [1; CANONICAL_RANK];
    let pad = CANONICAL_RANK - shape.len();
    for (dst, &size) in runtime_shape[pad..].iter_mut().zip(shape) {
        *dst = u32::try_from(size).map_err(|_| ShapeError::DimensionOverflow)?;
    }
    Ok(runtime_shape)
}

/// Given the shapes of two inputs to a binary operation, return the shape
/// that results from broadcasting them following NumPy rules, or `None` if
/// the shapes are not compatible.
///
/// The shorter shape is left-padded with 1s, then dimensions are matched
/// from the right. Dimensions are compatible if they are equal or one of them
/// is 1.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Option<Shape> {
    let a_pad = b.len().saturating_sub(a.len());
    let b_pad = a.len().saturating_sub(b.len());

    let a_iter = a.iter().copied().rev().chain(repeat(1).take(a_pad));
    let b_iter = b.iter().copied().rev().chain(repeat(1).take(b_pad));

    let mut result = Shape::with_capacity(a.len().max(b.len()));
    for (a, b) in a_iter.zip(b_iter) {
        match (a, b) {
            _ if a == b => result.push(a),
            (1, b) => result.push(b),
            (a, 1) => result.push(a),
            _ => return None,
        }
    }
    result.reverse();

    Some(result)
}

/// Split a softmax input into `(outer_size, inner_size)`, where the leading
/// dimension is the independent axis and the remaining dimensions are
/// flattened into the normalized axis. Every dimension must be non-zero.
pub fn softmax_partition(shape: &[usize]) -> Result<(usize, usize), ShapeError> {
    let Some(&outer_size) = shape.first() else {
        return Err(ShapeError::AxisOutOfRange { axis: 0, ndim: 0 });
    };
    check_nonzero(shape, 0)?;
    Ok((outer_size, num_elements(shape) / outer_size))
}
