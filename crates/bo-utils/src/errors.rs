use bo_core::{DType, Shape, TensorError};

/// Coarse classification of [`UtilError`]: a failed tag lookup versus any
/// rejected input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lookup,
    Validation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtilError {
    /// None of the candidate tags is a key of the mapping.
    TagNotFound { tags: Vec<String> },
    /// `output_dims` outside `1..=rank`.
    InvalidOutputDims { output_dims: i64, rank: usize },
    /// An unflatten input whose leading dimension differs from the flattened one.
    /// `actual` is `None` for a rank-0 input.
    LeadingDimMismatch { expected: u32, actual: Option<u32> },
    SignatureMismatch { detail: String },
    UnsupportedDType { operation: &'static str, dtype: DType },
    HostConversion { detail: String },
    Tensor(TensorError),
}

impl UtilError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TagNotFound { .. } => ErrorKind::Lookup,
            Self::InvalidOutputDims { .. }
            | Self::LeadingDimMismatch { .. }
            | Self::SignatureMismatch { .. }
            | Self::UnsupportedDType { .. }
            | Self::HostConversion { .. }
            | Self::Tensor(_) => ErrorKind::Validation,
        }
    }

    pub(crate) fn signature(detail: impl Into<String>) -> Self {
        Self::SignatureMismatch {
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for UtilError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TagNotFound { tags } => {
                write!(f, "none of the tags '{}' found in mapping", candidate_list(tags))
            }
            Self::InvalidOutputDims { output_dims, rank } => {
                write!(
                    f,
                    "output_dims must be between 1 and the tensor rank {rank}, got {output_dims}"
                )
            }
            Self::LeadingDimMismatch { expected, actual } => match actual {
                Some(actual) => write!(
                    f,
                    "unflatten expects a leading dimension of {expected}, got {actual}"
                ),
                None => write!(
                    f,
                    "unflatten expects a leading dimension of {expected}, got a scalar"
                ),
            },
            Self::SignatureMismatch { detail } => {
                write!(f, "arguments do not match the input signature: {detail}")
            }
            Self::UnsupportedDType { operation, dtype } => {
                write!(f, "{operation} does not support dtype {}", dtype.as_str())
            }
            Self::HostConversion { detail } => {
                write!(f, "host array conversion failed: {detail}")
            }
            Self::Tensor(err) => write!(f, "tensor error: {err}"),
        }
    }
}

impl std::error::Error for UtilError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tensor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TensorError> for UtilError {
    fn from(err: TensorError) -> Self {
        Self::Tensor(err)
    }
}

/// Renders candidates as one parenthesised tuple, `('a',)` or `('a', 'b')`.
fn candidate_list(tags: &[String]) -> String {
    let joined = tags
        .iter()
        .map(|tag| format!("'{tag}'"))
        .collect::<Vec<_>>()
        .join(", ");
    if tags.len() == 1 {
        format!("({joined},)")
    } else {
        format!("({joined})")
    }
}

pub(crate) fn shape_mismatch_detail(
    index: usize,
    expected: &[Option<u32>],
    actual: &Shape,
) -> String {
    let expected = expected
        .iter()
        .map(|dim| dim.map_or_else(|| "None".to_owned(), |d| d.to_string()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("argument {index} has shape {actual}, expected [{expected}]")
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, UtilError};
    use bo_core::{Shape, TensorError};

    #[test]
    fn tag_not_found_lists_every_candidate() {
        let err = UtilError::TagNotFound {
            tags: vec!["far".to_owned(), "qux".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "none of the tags '('far', 'qux')' found in mapping"
        );
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn single_candidate_renders_as_one_element_tuple() {
        let err = UtilError::TagNotFound {
            tags: vec!["baz".to_owned()],
        };
        assert_eq!(err.to_string(), "none of the tags '('baz',)' found in mapping");
    }

    #[test]
    fn shape_errors_are_validation_failures() {
        let invalid = UtilError::InvalidOutputDims {
            output_dims: 0,
            rank: 4,
        };
        assert_eq!(invalid.kind(), ErrorKind::Validation);
        assert!(invalid.to_string().contains("got 0"));

        let mismatch = UtilError::LeadingDimMismatch {
            expected: 24,
            actual: Some(2),
        };
        assert_eq!(mismatch.kind(), ErrorKind::Validation);
        assert!(mismatch.to_string().contains("24"));
    }

    #[test]
    fn tensor_errors_convert_and_keep_source() {
        let err: UtilError = TensorError::ShapeOverflow {
            shape: Shape::new([1]),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(std::error::Error::source(&err).is_some());
    }
}
