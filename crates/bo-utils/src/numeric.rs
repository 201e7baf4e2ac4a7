use bo_core::{DType, Tensor};

use crate::errors::UtilError;

/// Smallest value [`ensure_positive`] lets through for float32 tensors.
pub const F32_POSITIVE_FLOOR: f64 = 1e-15;
/// Smallest value [`ensure_positive`] lets through for float64 tensors.
pub const F64_POSITIVE_FLOOR: f64 = 1e-30;

/// Elementwise `max(x, floor)` with a dtype-dependent floor, keeping the dtype.
/// NaN stays NaN.
pub fn ensure_positive(tensor: &Tensor) -> Result<Tensor, UtilError> {
    let floor = match tensor.dtype {
        DType::F32 => F32_POSITIVE_FLOOR,
        DType::F64 => F64_POSITIVE_FLOOR,
        dtype => {
            return Err(UtilError::UnsupportedDType {
                operation: "ensure_positive",
                dtype,
            });
        }
    };
    Ok(tensor.map_f64(|x| if x.is_nan() || x >= floor { x } else { floor })?)
}
