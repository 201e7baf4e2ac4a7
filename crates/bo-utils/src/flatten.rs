use bo_core::{Shape, Tensor};

use crate::errors::UtilError;

/// Collapse everything but the last dimension.
pub const DEFAULT_OUTPUT_DIMS: i64 = 2;

/// Restores leading dimensions collapsed by [`flatten_leading_dims`].
///
/// Holds the original leading-dims prefix and its product. Any tensor whose
/// first dimension equals that product can be unflattened; its trailing
/// dimensions are kept as they are, so per-row outputs of a different width
/// than the original input unflatten too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unflatten {
    leading_dims: Vec<u32>,
    flat_leading_dim: u32,
}

impl Unflatten {
    #[must_use]
    pub fn leading_dims(&self) -> &[u32] {
        &self.leading_dims
    }

    #[must_use]
    pub fn flat_leading_dim(&self) -> u32 {
        self.flat_leading_dim
    }

    pub fn apply(&self, flat: &Tensor) -> Result<Tensor, UtilError> {
        let actual = flat.leading_dim();
        if actual != Some(self.flat_leading_dim) {
            return Err(UtilError::LeadingDimMismatch {
                expected: self.flat_leading_dim,
                actual,
            });
        }

        let dims = self
            .leading_dims
            .iter()
            .chain(&flat.shape.dims[1..])
            .map(|dim| i64::from(*dim))
            .collect::<Vec<_>>();
        tracing::trace!(
            stage = "unflatten",
            from = %flat.shape,
            to = ?dims,
            "restoring leading dims"
        );
        Ok(flat.reshape(&dims)?)
    }
}

/// Reshapes `tensor` to rank `output_dims` by merging its leading dimensions,
/// keeping the last `output_dims - 1` dimensions as they are.
///
/// Requires `1 <= output_dims <= rank`. Returns the flattened tensor together
/// with the [`Unflatten`] that reverses it.
pub fn flatten_leading_dims(
    tensor: &Tensor,
    output_dims: i64,
) -> Result<(Tensor, Unflatten), UtilError> {
    let rank = tensor.rank();
    let kept = usize::try_from(output_dims)
        .ok()
        .filter(|dims| (1..=rank).contains(dims))
        .map(|dims| dims - 1)
        .ok_or(UtilError::InvalidOutputDims { output_dims, rank })?;

    let (leading, trailing) = tensor.shape.dims.split_at(rank - kept);
    let flat_leading_dim = leading
        .iter()
        .try_fold(1_u32, |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| bo_core::TensorError::ShapeOverflow {
            shape: Shape::new(leading),
        })?;

    // -1 cannot be inferred when a trailing dim is zero.
    let leading_spec = if trailing.contains(&0) {
        i64::from(flat_leading_dim)
    } else {
        -1
    };
    let flat_dims = std::iter::once(leading_spec)
        .chain(trailing.iter().copied().map(i64::from))
        .collect::<Vec<_>>();
    let flat = tensor.reshape(&flat_dims)?;
    tracing::debug!(
        stage = "flatten",
        from = %tensor.shape,
        to = %flat.shape,
        output_dims,
        "flattened leading dims"
    );

    Ok((
        flat,
        Unflatten {
            leading_dims: leading.to_vec(),
            flat_leading_dim,
        },
    ))
}
