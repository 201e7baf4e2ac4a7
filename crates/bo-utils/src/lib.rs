#![forbid(unsafe_code)]

//! Helpers shared across the Bayesian-optimization stack: resolving output
//! tags, flattening batch dimensions, timing, optional compilation, and small
//! tensor conveniences.

pub mod convert;
pub mod errors;
pub mod flatten;
pub mod jit;
pub mod numeric;
pub mod tag;
pub mod timer;

use bo_core::Tensor;

pub use convert::{ToNdarray, to_ndarray_i64};
pub use errors::{ErrorKind, UtilError};
pub use flatten::{DEFAULT_OUTPUT_DIMS, Unflatten, flatten_leading_dims};
pub use jit::{JitFunction, JitOptions, TensorSpec, jit};
pub use numeric::ensure_positive;
pub use tag::{LocalizedTag, OBJECTIVE, Tag, TagMapping, get_value_for_tag};
pub use timer::Timer;

#[must_use]
pub fn shapes_equal(this: &Tensor, that: &Tensor) -> bool {
    this.shape == that.shape
}
