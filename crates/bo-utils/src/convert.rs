//! Conversion of tensors into host-side `ndarray` arrays.

use bo_core::{DType, Tensor};
use ndarray::{ArrayD, IxDyn};

use crate::errors::UtilError;

/// Values that can be read back as a host `f64` array. Arrays already on the
/// host convert to a copy of themselves.
pub trait ToNdarray {
    fn to_ndarray(&self) -> Result<ArrayD<f64>, UtilError>;
}

impl ToNdarray for Tensor {
    fn to_ndarray(&self) -> Result<ArrayD<f64>, UtilError> {
        let values = self.to_f64_vec().ok_or(UtilError::UnsupportedDType {
            operation: "to_ndarray",
            dtype: self.dtype,
        })?;
        from_shape_vec(self, values)
    }
}

impl ToNdarray for ArrayD<f64> {
    fn to_ndarray(&self) -> Result<ArrayD<f64>, UtilError> {
        Ok(self.clone())
    }
}

/// Integer counterpart of [`ToNdarray::to_ndarray`], exact for int64 tensors.
pub fn to_ndarray_i64(tensor: &Tensor) -> Result<ArrayD<i64>, UtilError> {
    if tensor.dtype != DType::I64 {
        return Err(UtilError::UnsupportedDType {
            operation: "to_ndarray_i64",
            dtype: tensor.dtype,
        });
    }
    let values = tensor.to_i64_vec().ok_or(UtilError::UnsupportedDType {
        operation: "to_ndarray_i64",
        dtype: tensor.dtype,
    })?;
    from_shape_vec(tensor, values)
}

fn from_shape_vec<T>(tensor: &Tensor, values: Vec<T>) -> Result<ArrayD<T>, UtilError> {
    let dims = tensor
        .shape
        .dims
        .iter()
        .map(|dim| *dim as usize)
        .collect::<Vec<_>>();
    ArrayD::from_shape_vec(IxDyn(&dims), values).map_err(|err| UtilError::HostConversion {
        detail: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{ToNdarray, to_ndarray_i64};
    use crate::errors::UtilError;
    use bo_core::{DType, Literal, Shape, Tensor};
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn scalar_tensor_becomes_zero_dim_array() {
        let host = to_ndarray_i64(&Tensor::scalar_i64(0)).unwrap();
        assert_eq!(host.ndim(), 0);
        assert_eq!(host, ArrayD::from_elem(IxDyn(&[]), 0_i64));
    }

    #[test]
    fn reshaped_range_keeps_row_major_layout() {
        let t = Tensor::range_i64(12).reshape(&[3, -1]).unwrap();
        let expected = ArrayD::from_shape_vec(IxDyn(&[3, 4]), (0..12_i64).collect()).unwrap();
        assert_eq!(to_ndarray_i64(&t).unwrap(), expected);

        let as_f64 = t.to_ndarray().unwrap();
        assert_eq!(as_f64.shape(), &[3, 4]);
        assert_eq!(as_f64[IxDyn(&[2, 1])], 9.0);
    }

    #[test]
    fn host_arrays_convert_to_themselves() {
        let host = ArrayD::from_shape_vec(IxDyn(&[3, 4]), (0..12).map(f64::from).collect())
            .unwrap();
        assert_eq!(host.to_ndarray().unwrap(), host);
    }

    #[test]
    fn bool_tensor_has_no_f64_view() {
        let t = Tensor::new(DType::Bool, Shape::vector(1), vec![Literal::Bool(true)]).unwrap();
        let err = t.to_ndarray().expect_err("bool is not numeric");
        assert!(matches!(err, UtilError::UnsupportedDType { dtype: DType::Bool, .. }));
    }

    #[test]
    fn float_tensor_rejected_by_integer_view() {
        let err = to_ndarray_i64(&Tensor::scalar_f64(1.0)).expect_err("f64 is not int64");
        assert!(matches!(err, UtilError::UnsupportedDType { dtype: DType::F64, .. }));
    }
}
