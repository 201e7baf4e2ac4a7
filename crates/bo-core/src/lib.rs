#![forbid(unsafe_code)]

//! Tensor value model used by the utility layer: a dtype, a shape and a
//! row-major element buffer.

#[cfg(test)]
pub mod proptest_strategies;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    I64,
    Bool,
}

impl DType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::I64 => "int64",
            Self::Bool => "bool",
        }
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub dims: Vec<u32>,
}

impl Shape {
    #[must_use]
    pub fn new(dims: impl Into<Vec<u32>>) -> Self {
        Self { dims: dims.into() }
    }

    #[must_use]
    pub fn scalar() -> Self {
        Self { dims: Vec::new() }
    }

    #[must_use]
    pub fn vector(len: u32) -> Self {
        Self { dims: vec![len] }
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[must_use]
    pub fn element_count(&self) -> Option<u64> {
        self.dims
            .iter()
            .try_fold(1_u64, |acc, dim| acc.checked_mul(u64::from(*dim)))
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Literal {
    I64(i64),
    Bool(bool),
    F32Bits(u32),
    F64Bits(u64),
}

impl Literal {
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Self::F32Bits(value.to_bits())
    }

    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Self::F64Bits(value.to_bits())
    }

    /// Builds a literal of `dtype` from an `f64`, truncating for integers.
    #[must_use]
    pub fn cast_from_f64(dtype: DType, value: f64) -> Self {
        match dtype {
            DType::F32 => Self::from_f32(value as f32),
            DType::F64 => Self::from_f64(value),
            DType::I64 => Self::I64(value as i64),
            DType::Bool => Self::Bool(value != 0.0),
        }
    }

    #[must_use]
    pub fn dtype(self) -> DType {
        match self {
            Self::I64(_) => DType::I64,
            Self::Bool(_) => DType::Bool,
            Self::F32Bits(_) => DType::F32,
            Self::F64Bits(_) => DType::F64,
        }
    }

    #[must_use]
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::F64Bits(bits) => Some(f64::from_bits(bits)),
            Self::F32Bits(bits) => Some(f64::from(f32::from_bits(bits))),
            Self::I64(value) => Some(value as f64),
            Self::Bool(_) => None,
        }
    }

    #[must_use]
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::I64(value) => Some(value),
            Self::Bool(_) | Self::F32Bits(_) | Self::F64Bits(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tensor {
    pub dtype: DType,
    pub shape: Shape,
    pub elements: Vec<Literal>,
}

impl Tensor {
    pub fn new(dtype: DType, shape: Shape, elements: Vec<Literal>) -> Result<Self, TensorError> {
        let expected_count = shape.element_count().ok_or(TensorError::ShapeOverflow {
            shape: shape.clone(),
        })?;

        if expected_count != elements.len() as u64 {
            return Err(TensorError::ElementCountMismatch {
                shape,
                expected_count,
                actual_count: elements.len(),
            });
        }

        if let Some(odd) = elements.iter().find(|lit| lit.dtype() != dtype) {
            return Err(TensorError::DTypeMismatch {
                expected: dtype,
                actual: odd.dtype(),
            });
        }

        Ok(Self {
            dtype,
            shape,
            elements,
        })
    }

    #[must_use]
    pub fn scalar_f32(value: f32) -> Self {
        Self {
            dtype: DType::F32,
            shape: Shape::scalar(),
            elements: vec![Literal::from_f32(value)],
        }
    }

    #[must_use]
    pub fn scalar_f64(value: f64) -> Self {
        Self {
            dtype: DType::F64,
            shape: Shape::scalar(),
            elements: vec![Literal::from_f64(value)],
        }
    }

    #[must_use]
    pub fn scalar_i64(value: i64) -> Self {
        Self {
            dtype: DType::I64,
            shape: Shape::scalar(),
            elements: vec![Literal::I64(value)],
        }
    }

    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        let elements = values.iter().copied().map(Literal::from_f32).collect();
        Self::new(DType::F32, shape, elements)
    }

    pub fn from_f64(shape: Shape, values: &[f64]) -> Result<Self, TensorError> {
        let elements = values.iter().copied().map(Literal::from_f64).collect();
        Self::new(DType::F64, shape, elements)
    }

    pub fn from_i64(shape: Shape, values: &[i64]) -> Result<Self, TensorError> {
        let elements = values.iter().copied().map(Literal::I64).collect();
        Self::new(DType::I64, shape, elements)
    }

    /// `[0, 1, .., n - 1]` as an int64 vector.
    #[must_use]
    pub fn range_i64(n: u32) -> Self {
        Self {
            dtype: DType::I64,
            shape: Shape::vector(n),
            elements: (0..i64::from(n)).map(Literal::I64).collect(),
        }
    }

    pub fn filled(dtype: DType, shape: Shape, value: f64) -> Result<Self, TensorError> {
        let count = shape
            .element_count()
            .and_then(|count| usize::try_from(count).ok())
            .ok_or(TensorError::ShapeOverflow {
                shape: shape.clone(),
            })?;
        let elements = vec![Literal::cast_from_f64(dtype, value); count];
        Self::new(dtype, shape, elements)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    #[must_use]
    pub fn leading_dim(&self) -> Option<u32> {
        self.shape.dims.first().copied()
    }

    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        self.elements.iter().copied().map(Literal::as_f64).collect()
    }

    pub fn to_i64_vec(&self) -> Option<Vec<i64>> {
        self.elements.iter().copied().map(Literal::as_i64).collect()
    }

    /// Row-major reshape. A single `-1` entry is inferred from the element
    /// count.
    pub fn reshape(&self, new_shape: &[i64]) -> Result<Self, TensorError> {
        let elem_count = self.elements.len() as u64;
        let mut inferred_axis: Option<usize> = None;
        let mut known_product = 1_u64;
        let mut dims = Vec::with_capacity(new_shape.len());

        for (idx, d) in new_shape.iter().enumerate() {
            if *d == -1 {
                if inferred_axis.is_some() {
                    return Err(TensorError::InvalidReshape {
                        from: self.shape.clone(),
                        requested: new_shape.to_vec(),
                        detail: "only one -1 inferred axis allowed".to_owned(),
                    });
                }
                inferred_axis = Some(idx);
                dims.push(0_u32);
            } else {
                let du = u32::try_from(*d).map_err(|_| TensorError::InvalidReshape {
                    from: self.shape.clone(),
                    requested: new_shape.to_vec(),
                    detail: format!("invalid dim {d}"),
                })?;
                known_product =
                    known_product
                        .checked_mul(u64::from(du))
                        .ok_or(TensorError::ShapeOverflow {
                            shape: Shape { dims: dims.clone() },
                        })?;
                dims.push(du);
            }
        }

        if let Some(axis) = inferred_axis {
            if known_product == 0 || elem_count % known_product != 0 {
                return Err(TensorError::InvalidReshape {
                    from: self.shape.clone(),
                    requested: new_shape.to_vec(),
                    detail: format!(
                        "cannot infer -1 axis: {elem_count} elements not divisible by {known_product}"
                    ),
                });
            }
            dims[axis] =
                u32::try_from(elem_count / known_product).map_err(|_| TensorError::ShapeOverflow {
                    shape: self.shape.clone(),
                })?;
        } else if known_product != elem_count {
            return Err(TensorError::InvalidReshape {
                from: self.shape.clone(),
                requested: new_shape.to_vec(),
                detail: format!("element count {elem_count} does not match {known_product}"),
            });
        }

        Ok(Self {
            dtype: self.dtype,
            shape: Shape { dims },
            elements: self.elements.clone(),
        })
    }

    /// Elementwise binary combination of two tensors of identical shape and dtype.
    pub fn zip_with<F>(&self, other: &Self, mut f: F) -> Result<Self, TensorError>
    where
        F: FnMut(Literal, Literal) -> Literal,
    {
        if self.shape != other.shape {
            return Err(TensorError::ShapeMismatch {
                left: self.shape.clone(),
                right: other.shape.clone(),
            });
        }
        if self.dtype != other.dtype {
            return Err(TensorError::DTypeMismatch {
                expected: self.dtype,
                actual: other.dtype,
            });
        }
        let elements = self
            .elements
            .iter()
            .zip(&other.elements)
            .map(|(lhs, rhs)| f(*lhs, *rhs))
            .collect();
        Self::new(self.dtype, self.shape.clone(), elements)
    }

    pub fn add(&self, other: &Self) -> Result<Self, TensorError> {
        self.zip_with(other, |lhs, rhs| match (lhs, rhs) {
            (Literal::I64(a), Literal::I64(b)) => Literal::I64(a.wrapping_add(b)),
            (Literal::F32Bits(a), Literal::F32Bits(b)) => {
                Literal::from_f32(f32::from_bits(a) + f32::from_bits(b))
            }
            (Literal::F64Bits(a), Literal::F64Bits(b)) => {
                Literal::from_f64(f64::from_bits(a) + f64::from_bits(b))
            }
            (Literal::Bool(a), Literal::Bool(b)) => Literal::Bool(a || b),
            (lhs, _) => lhs,
        })
    }

    /// Elementwise map over a float tensor. The result keeps the input dtype;
    /// float32 values round-trip through `f64`.
    pub fn map_f64<F>(&self, mut f: F) -> Result<Self, TensorError>
    where
        F: FnMut(f64) -> f64,
    {
        if !self.dtype.is_float() {
            return Err(TensorError::UnsupportedDType { dtype: self.dtype });
        }
        let dtype = self.dtype;
        let elements = self
            .elements
            .iter()
            .map(|lit| match *lit {
                Literal::F32Bits(bits) => {
                    Literal::from_f32(f(f64::from(f32::from_bits(bits))) as f32)
                }
                Literal::F64Bits(bits) => Literal::from_f64(f(f64::from_bits(bits))),
                other => other,
            })
            .collect();
        Self::new(dtype, self.shape.clone(), elements)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    ShapeOverflow {
        shape: Shape,
    },
    ElementCountMismatch {
        shape: Shape,
        expected_count: u64,
        actual_count: usize,
    },
    DTypeMismatch {
        expected: DType,
        actual: DType,
    },
    ShapeMismatch {
        left: Shape,
        right: Shape,
    },
    InvalidReshape {
        from: Shape,
        requested: Vec<i64>,
        detail: String,
    },
    UnsupportedDType {
        dtype: DType,
    },
}

impl std::fmt::Display for TensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShapeOverflow { shape } => {
                write!(f, "shape element count overflowed: {shape}")
            }
            Self::ElementCountMismatch {
                shape,
                expected_count,
                actual_count,
            } => {
                write!(
                    f,
                    "tensor element count mismatch for shape {shape}: expected {expected_count}, got {actual_count}"
                )
            }
            Self::DTypeMismatch { expected, actual } => {
                write!(
                    f,
                    "dtype mismatch: expected {}, got {}",
                    expected.as_str(),
                    actual.as_str()
                )
            }
            Self::ShapeMismatch { left, right } => {
                write!(f, "shape mismatch: {left} vs {right}")
            }
            Self::InvalidReshape {
                from,
                requested,
                detail,
            } => {
                write!(f, "cannot reshape {from} into {requested:?}: {detail}")
            }
            Self::UnsupportedDType { dtype } => {
                write!(f, "operation does not support dtype {}", dtype.as_str())
            }
        }
    }
}

impl std::error::Error for TensorError {}

#[cfg(test)]
mod tests {
    use super::{DType, Literal, Shape, Tensor, TensorError};
    use bo_test_utils::{TestMode, property_test_case_count, run_logged_test, test_id};
    use proptest::prelude::*;
    use proptest::test_runner::{Config as ProptestConfig, TestCaseError, TestRunner};

    const SUITE_ID: &str = "bo-core";

    #[test]
    fn shape_element_count_and_rank() {
        let shape = Shape::new([2, 3, 4, 5]);
        assert_eq!(shape.rank(), 4);
        assert_eq!(shape.element_count(), Some(120));
        assert_eq!(Shape::scalar().element_count(), Some(1));
        assert_eq!(Shape::new([u32::MAX, u32::MAX, u32::MAX]).element_count(), None);
    }

    #[test]
    fn new_rejects_element_count_mismatch() {
        let err = Tensor::from_f64(Shape::new([2, 2]), &[1.0, 2.0, 3.0])
            .expect_err("three elements cannot fill [2, 2]");
        assert_eq!(
            err,
            TensorError::ElementCountMismatch {
                shape: Shape::new([2, 2]),
                expected_count: 4,
                actual_count: 3,
            }
        );
    }

    #[test]
    fn new_rejects_mixed_literal_dtypes() {
        let err = Tensor::new(
            DType::F64,
            Shape::vector(2),
            vec![Literal::from_f64(1.0), Literal::I64(2)],
        )
        .expect_err("int literal in float tensor");
        assert_eq!(
            err,
            TensorError::DTypeMismatch {
                expected: DType::F64,
                actual: DType::I64,
            }
        );
    }

    #[test]
    fn reshape_infers_wildcard_axis() {
        let t = Tensor::range_i64(12);
        let r = t.reshape(&[3, -1]).expect("reshape should succeed");
        assert_eq!(r.shape, Shape::new([3, 4]));
        assert_eq!(r.to_i64_vec(), t.to_i64_vec());
    }

    #[test]
    fn reshape_rejects_two_wildcards() {
        let t = Tensor::range_i64(12);
        let err = t.reshape(&[-1, -1]).expect_err("two wildcards");
        assert!(matches!(err, TensorError::InvalidReshape { .. }));
    }

    #[test]
    fn reshape_rejects_count_mismatch_and_negative_dims() {
        let t = Tensor::range_i64(12);
        assert!(matches!(
            t.reshape(&[5, 2]),
            Err(TensorError::InvalidReshape { .. })
        ));
        assert!(matches!(
            t.reshape(&[-2, 6]),
            Err(TensorError::InvalidReshape { .. })
        ));
        assert!(matches!(
            t.reshape(&[5, -1]),
            Err(TensorError::InvalidReshape { .. })
        ));
    }

    #[test]
    fn reshape_wildcard_on_empty_tensor_with_zero_known_dim_fails() {
        let t = Tensor::from_f64(Shape::new([0, 3]), &[]).expect("empty tensor");
        assert!(t.reshape(&[0, -1]).is_err());
        let ok = t.reshape(&[-1, 3]).expect("[-1, 3] is inferable");
        assert_eq!(ok.shape, Shape::new([0, 3]));
    }

    #[test]
    fn add_combines_elementwise() {
        let a = Tensor::from_f32(Shape::vector(2), &[1.0, 2.0]).unwrap();
        let b = Tensor::from_f32(Shape::vector(2), &[0.5, 0.25]).unwrap();
        let sum = a.add(&b).expect("add should succeed");
        assert_eq!(sum, Tensor::from_f32(Shape::vector(2), &[1.5, 2.25]).unwrap());
    }

    #[test]
    fn add_rejects_shape_and_dtype_mismatch() {
        let a = Tensor::from_f64(Shape::vector(2), &[1.0, 2.0]).unwrap();
        let b = Tensor::from_f64(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(a.add(&b), Err(TensorError::ShapeMismatch { .. })));
        let c = Tensor::from_i64(Shape::vector(2), &[1, 2]).unwrap();
        assert!(matches!(a.add(&c), Err(TensorError::DTypeMismatch { .. })));
    }

    #[test]
    fn map_f64_preserves_float32_dtype() {
        let t = Tensor::from_f32(Shape::vector(3), &[-1.0, 0.0, 2.0]).unwrap();
        let doubled = t.map_f64(|x| x * 2.0).expect("float map");
        assert_eq!(doubled.dtype, DType::F32);
        assert_eq!(doubled.to_f64_vec(), Some(vec![-2.0, 0.0, 4.0]));
    }

    #[test]
    fn map_f64_rejects_integer_tensor() {
        let err = Tensor::range_i64(3)
            .map_f64(|x| x)
            .expect_err("int tensors are not mapped");
        assert_eq!(err, TensorError::UnsupportedDType { dtype: DType::I64 });
    }

    #[test]
    fn filled_uses_requested_dtype() {
        let t = Tensor::filled(DType::F32, Shape::new([2, 3]), 1.0).unwrap();
        assert_eq!(t.len(), 6);
        assert!(t.elements.iter().all(|lit| *lit == Literal::from_f32(1.0)));
    }

    #[test]
    fn error_display_names_shapes() {
        let err = TensorError::ShapeMismatch {
            left: Shape::new([2]),
            right: Shape::new([3]),
        };
        assert_eq!(err.to_string(), "shape mismatch: [2] vs [3]");
    }

    #[test]
    fn prop_reshape_to_flat_and_back_keeps_elements() {
        run_logged_test(
            SUITE_ID,
            &test_id(module_path!(), "prop_reshape_to_flat_and_back_keeps_elements"),
            &("reshape-flat", property_test_case_count()),
            TestMode::Property,
            || {
                let mut runner =
                    TestRunner::new(ProptestConfig::with_cases(property_test_case_count()));
                runner
                    .run(&super::proptest_strategies::arb_f64_tensor(), |tensor| {
                        let flat = tensor
                            .reshape(&[-1])
                            .map_err(|err| TestCaseError::fail(err.to_string()))?;
                        prop_assert_eq!(flat.rank(), 1);
                        let dims: Vec<i64> =
                            tensor.shape.dims.iter().map(|d| i64::from(*d)).collect();
                        let back = flat
                            .reshape(&dims)
                            .map_err(|err| TestCaseError::fail(err.to_string()))?;
                        prop_assert_eq!(back, tensor);
                        Ok(())
                    })
                    .map_err(|err| err.to_string())
            },
        );
    }

    #[test]
    fn prop_tensor_serde_json_is_lossless() {
        run_logged_test(
            SUITE_ID,
            &test_id(module_path!(), "prop_tensor_serde_json_is_lossless"),
            &("tensor-serde", property_test_case_count()),
            TestMode::Property,
            || {
                let mut runner =
                    TestRunner::new(ProptestConfig::with_cases(property_test_case_count()));
                runner
                    .run(&super::proptest_strategies::arb_f64_tensor(), |tensor| {
                        let encoded = serde_json::to_string(&tensor)
                            .map_err(|err| TestCaseError::fail(err.to_string()))?;
                        let decoded: Tensor = serde_json::from_str(&encoded)
                            .map_err(|err| TestCaseError::fail(err.to_string()))?;
                        prop_assert_eq!(decoded, tensor);
                        Ok(())
                    })
                    .map_err(|err| err.to_string())
            },
        );
    }
}
