//! Optional compilation wrapper for tensor functions.
//!
//! A compiled wrapper traces once per distinct argument signature and reuses
//! the trace afterwards; an uncompiled one calls straight through. Both return
//! exactly what the wrapped function returns.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{Mutex, PoisonError};

use bo_core::{DType, Tensor, TensorError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{UtilError, shape_mismatch_detail};

/// Environment switch forcing every wrapper onto the pass-through path.
pub const DISABLE_JIT_ENV: &str = "BO_DISABLE_JIT";

/// Expected dtype and shape of one argument. `None` dims accept any size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Vec<Option<u32>>,
}

impl TensorSpec {
    #[must_use]
    pub fn new(dtype: DType, shape: &[Option<u32>]) -> Self {
        Self {
            dtype,
            shape: shape.to_vec(),
        }
    }

    #[must_use]
    pub fn scalar(dtype: DType) -> Self {
        Self {
            dtype,
            shape: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_compatible_with(&self, tensor: &Tensor) -> bool {
        self.dtype == tensor.dtype
            && self.shape.len() == tensor.rank()
            && self
                .shape
                .iter()
                .zip(&tensor.shape.dims)
                .all(|(expected, actual)| expected.is_none_or(|dim| dim == *actual))
    }

    fn canonical(&self) -> String {
        let dims = self
            .shape
            .iter()
            .map(|dim| dim.map_or_else(|| "?".to_owned(), |d| d.to_string()))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}[{dims}]", self.dtype.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitOptions {
    pub autograph: bool,
    pub input_signature: Option<Vec<TensorSpec>>,
}

impl Default for JitOptions {
    fn default() -> Self {
        Self {
            autograph: true,
            input_signature: None,
        }
    }
}

#[must_use]
pub fn jit_disabled_by_env() -> bool {
    std::env::var(DISABLE_JIT_ENV).is_ok_and(|raw| !raw.is_empty() && raw != "0")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub signature: String,
    pub calls: u64,
}

pub struct JitFunction<F> {
    f: F,
    compiled: bool,
    options: JitOptions,
    traces: Mutex<BTreeMap<String, TraceRecord>>,
}

/// Wraps `f`, compiling it when `apply` is true and [`DISABLE_JIT_ENV`] is
/// not set.
#[must_use]
pub fn jit<F>(apply: bool, f: F) -> JitFunction<F>
where
    F: Fn(&[Tensor]) -> Result<Tensor, TensorError>,
{
    let compiled = apply && !jit_disabled_by_env();
    if apply && !compiled {
        tracing::debug!(stage = "jit", env = DISABLE_JIT_ENV, "compilation disabled");
    }
    JitFunction::new(compiled, f)
}

impl<F> JitFunction<F>
where
    F: Fn(&[Tensor]) -> Result<Tensor, TensorError>,
{
    /// Wraps `f` with compilation fixed to `compiled`; [`DISABLE_JIT_ENV`] is
    /// not consulted.
    #[must_use]
    pub fn new(compiled: bool, f: F) -> Self {
        Self {
            f,
            compiled,
            options: JitOptions::default(),
            traces: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: JitOptions) -> Self {
        self.options = options;
        self
    }

    /// Recorded in the trace key only; it does not change what gets traced.
    #[must_use]
    pub fn with_autograph(mut self, autograph: bool) -> Self {
        self.options.autograph = autograph;
        self
    }

    #[must_use]
    pub fn with_input_signature(mut self, signature: Vec<TensorSpec>) -> Self {
        self.options.input_signature = Some(signature);
        self
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    #[must_use]
    pub fn options(&self) -> &JitOptions {
        &self.options
    }

    /// Number of distinct signatures traced so far. Always 0 when not compiled.
    #[must_use]
    pub fn trace_count(&self) -> usize {
        self.traces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn traces(&self) -> Vec<TraceRecord> {
        self.traces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn call(&self, args: &[Tensor]) -> Result<Tensor, UtilError> {
        if !self.compiled {
            return Ok((self.f)(args)?);
        }

        if let Some(signature) = &self.options.input_signature {
            check_signature(signature, args)?;
        }

        let key = self.cache_key(args);
        {
            let mut traces = self.traces.lock().unwrap_or_else(PoisonError::into_inner);
            let record = traces.entry(key.digest_hex).or_insert_with(|| {
                tracing::debug!(stage = "jit", signature = %key.signature, "tracing new signature");
                TraceRecord {
                    signature: key.signature,
                    calls: 0,
                }
            });
            record.calls += 1;
        }

        Ok((self.f)(args)?)
    }

    fn cache_key(&self, args: &[Tensor]) -> CacheKey {
        // A declared signature pins the trace: every conforming call reuses it.
        let signature = match &self.options.input_signature {
            Some(specs) => specs.iter().map(TensorSpec::canonical).collect::<Vec<_>>(),
            None => args
                .iter()
                .map(|arg| format!("{}{}", arg.dtype.as_str(), arg.shape))
                .collect(),
        }
        .join(";");
        let payload = format!("autograph={}|args={signature}", self.options.autograph);
        let digest = Sha256::digest(payload.as_bytes());
        CacheKey {
            digest_hex: bytes_to_hex(&digest),
            signature,
        }
    }
}

impl<F> std::fmt::Debug for JitFunction<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitFunction")
            .field("compiled", &self.compiled)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

struct CacheKey {
    digest_hex: String,
    signature: String,
}

fn check_signature(signature: &[TensorSpec], args: &[Tensor]) -> Result<(), UtilError> {
    if signature.len() != args.len() {
        return Err(UtilError::signature(format!(
            "expected {} arguments, got {}",
            signature.len(),
            args.len()
        )));
    }
    for (index, (spec, arg)) in signature.iter().zip(args).enumerate() {
        if spec.dtype != arg.dtype {
            return Err(UtilError::signature(format!(
                "argument {index} has dtype {}, expected {}",
                arg.dtype.as_str(),
                spec.dtype.as_str()
            )));
        }
        if !spec.is_compatible_with(arg) {
            return Err(UtilError::signature(shape_mismatch_detail(
                index,
                &spec.shape,
                &arg.shape,
            )));
        }
    }
    Ok(())
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
