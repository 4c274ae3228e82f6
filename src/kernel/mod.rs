//! Typed binding of compiled kernel entry points.
//!
//! A [`Module`](crate::compiler::Module) is an untyped bag of symbols;
//! nothing may be called through it until a binding step has (a) resolved
//! the entry point by its deterministic name and (b) compared the
//! signature string the generator embedded next to it against the calling
//! convention the binding expects. Each wrapper keeps its module handle
//! alive, so a bound kernel can outlive the cache entry it came from.
//!
//! Bound calls are synchronous, re-entrant and allocation free: all
//! output goes to the caller-provided buffers.

use std::ffi::CStr;
use std::os::raw::{c_char, c_uint, c_ulonglong};

use crate::codegen;
use crate::compiler::Module;
use crate::error::{NeurogenError, Result};
use crate::model::KernelArrays;
use crate::spec::{AlignedVec, Real};

type ModelFn<T> = unsafe extern "C" fn(c_uint, *const T, *const T, *const T, *mut T, *mut T, *mut T);
type PreSumFn<T> = unsafe extern "C" fn(T, T, T) -> T;
type PostSumFn<T> = unsafe extern "C" fn(T) -> T;
type NetworkFn<T> = unsafe extern "C" fn(
    c_uint,
    *mut T,
    *mut T,
    *const T,
    *const T,
    *const T,
    *mut T,
    *mut T,
    *mut T,
    T,
);
type FillFn<T> = unsafe extern "C" fn(c_ulonglong, c_ulonglong, c_ulonglong, *mut T);

/// Read the embedded `<name>_sig` string and compare it with the
/// expected calling convention.
fn check_signature(module: &Module, kernel: &str, expected: &str) -> Result<()> {
    let sig_symbol = format!("{}_sig", kernel);
    let found = unsafe {
        let sym = module
            .library()
            .get::<c_char>(sig_symbol.as_bytes())
            .map_err(|_| NeurogenError::SymbolNotFound(sig_symbol.clone()))?;
        CStr::from_ptr(&*sym as *const c_char)
            .to_string_lossy()
            .into_owned()
    };
    if found != expected {
        return Err(NeurogenError::SignatureMismatch {
            name: kernel.to_string(),
            expected: expected.to_string(),
            found,
        });
    }
    Ok(())
}

/// Resolve a raw entry point after its signature has been checked.
unsafe fn resolve<F: Copy>(module: &Module, kernel: &str) -> Result<F> {
    let sym = module
        .library()
        .get::<F>(kernel.as_bytes())
        .map_err(|_| NeurogenError::SymbolNotFound(kernel.to_string()))?;
    Ok(*sym)
}

fn node_count(n: usize) -> Result<c_uint> {
    c_uint::try_from(n)
        .map_err(|_| NeurogenError::configuration(format!("{} nodes exceed the kernel ABI", n)))
}

/// Bound per-node model update kernel.
#[derive(Debug)]
pub struct ModelKernel<T: Real> {
    _module: Module,
    f: ModelFn<T>,
    name: String,
}

impl<T: Real> ModelKernel<T> {
    pub fn bind(module: &Module, name: &str) -> Result<Self> {
        check_signature(module, name, &codegen::model_sig(T::KIND))?;
        let f = unsafe { resolve::<ModelFn<T>>(module, name)? };
        Ok(ModelKernel {
            _module: module.clone(),
            f,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate drift, diffusion and observables in place.
    pub fn call(&self, arrays: &mut KernelArrays<T>) -> Result<()> {
        let n = node_count(arrays.n_node)?;
        unsafe {
            (self.f)(
                n,
                arrays.state.as_ptr(),
                arrays.input.as_ptr(),
                arrays.param.as_ptr(),
                arrays.drift.as_mut_ptr(),
                arrays.diffusion.as_mut_ptr(),
                arrays.obs.as_mut_ptr(),
            )
        };
        Ok(())
    }
}

/// Bound pre-sum/post-sum coupling pair.
pub struct CouplingKernel<T: Real> {
    _module: Module,
    pre: PreSumFn<T>,
    post: PostSumFn<T>,
}

impl<T: Real> CouplingKernel<T> {
    pub fn bind(module: &Module, pre_name: &str, post_name: &str) -> Result<Self> {
        check_signature(module, pre_name, &codegen::pre_sum_sig(T::KIND))?;
        check_signature(module, post_name, &codegen::post_sum_sig(T::KIND))?;
        let pre = unsafe { resolve::<PreSumFn<T>>(module, pre_name)? };
        let post = unsafe { resolve::<PostSumFn<T>>(module, post_name)? };
        Ok(CouplingKernel {
            _module: module.clone(),
            pre,
            post,
        })
    }

    /// Weighted per-edge contribution.
    pub fn pre_sum(&self, x_i: T, x_j: T, w: T) -> T {
        unsafe { (self.pre)(x_i, x_j, w) }
    }

    /// Map the accumulated reduction onto the coupling input.
    pub fn post_sum(&self, acc: T) -> T {
        unsafe { (self.post)(acc) }
    }
}

/// Bound dense-network step kernel.
pub struct NetworkKernel<T: Real> {
    _module: Module,
    f: NetworkFn<T>,
    name: String,
}

impl<T: Real> NetworkKernel<T> {
    pub fn bind(module: &Module, name: &str) -> Result<Self> {
        check_signature(module, name, &codegen::network_sig(T::KIND))?;
        let f = unsafe { resolve::<NetworkFn<T>>(module, name)? };
        Ok(NetworkKernel {
            _module: module.clone(),
            f,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advance the network one step of size `dt` in place.
    pub fn step(
        &self,
        arrays: &mut KernelArrays<T>,
        weights: &AlignedVec<T>,
        dt: T,
    ) -> Result<()> {
        let n = arrays.n_node;
        if weights.len() != n * n {
            return Err(NeurogenError::configuration(format!(
                "weight buffer holds {} elements, expected {}",
                weights.len(),
                n * n
            )));
        }
        let n = node_count(n)?;
        unsafe {
            (self.f)(
                n,
                arrays.state.as_mut_ptr(),
                arrays.input.as_mut_ptr(),
                arrays.param.as_ptr(),
                weights.as_ptr(),
                arrays.noise.as_ptr(),
                arrays.drift.as_mut_ptr(),
                arrays.diffusion.as_mut_ptr(),
                arrays.obs.as_mut_ptr(),
                dt,
            )
        };
        Ok(())
    }
}

/// Bound counter-based fill kernel.
pub struct FillKernel<T: Real> {
    _module: Module,
    f: FillFn<T>,
}

impl<T: Real> FillKernel<T> {
    pub fn bind(module: &Module, name: &str) -> Result<Self> {
        check_signature(module, name, &codegen::fill_sig(T::KIND))?;
        let f = unsafe { resolve::<FillFn<T>>(module, name)? };
        Ok(FillKernel {
            _module: module.clone(),
            f,
        })
    }

    /// Fill `out` deterministically from `(key, counter)`.
    pub fn fill(&self, counter: u64, key: u64, out: &mut [T]) {
        if out.is_empty() {
            return;
        }
        unsafe { (self.f)(out.len() as c_ulonglong, counter, key, out.as_mut_ptr()) };
    }
}
