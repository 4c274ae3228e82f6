//! Counter-based random number engine.
//!
//! [`CounterRng`] owns a compiled Philox fill kernel. Every output
//! element is a pure function of the engine's key and a counter value;
//! there is no sequential generator state, so large fills are chunked
//! across the rayon pool with each chunk given its own counter range,
//! and the result is bit-identical to a single sequential fill.

use rayon::prelude::*;

use crate::codegen::{RngKernelGenerator, BLOCK};
use crate::compiler::Compiler;
use crate::error::Result;
use crate::kernel::FillKernel;
use crate::spec::{Real, Spec};

/// Elements handed to one kernel invocation during a parallel fill.
/// Must stay a multiple of [`BLOCK`] so chunk boundaries coincide with
/// counter increments.
const PAR_CHUNK: usize = 1 << 16;

/// A stateless-by-construction normal generator backed by a compiled
/// counter-based kernel.
pub struct CounterRng<T: Real> {
    kernel: FillKernel<T>,
    key: u64,
    counter: u64,
}

impl<T: Real> CounterRng<T> {
    /// Generate, compile and bind the fill kernel for `spec`.
    pub fn build(compiler: &Compiler, spec: &Spec, key: u64) -> Result<Self> {
        if T::KIND != spec.real() {
            return Err(crate::error::NeurogenError::configuration(format!(
                "output element type {} does not match spec real width {}",
                T::KIND.ctype(),
                spec.real().ctype()
            )));
        }
        let source = RngKernelGenerator::generate(spec)?;
        let name = format!("philox_normal_{}", spec.cache_tag());
        let module = compiler.compile(&name, &source)?;
        let kernel = FillKernel::bind(&module, RngKernelGenerator::kernel_name())?;
        Ok(CounterRng {
            kernel,
            key,
            counter: 0,
        })
    }

    /// Algorithm name and parameters, for downstream validation
    /// harnesses to target.
    pub fn algorithm(&self) -> &'static str {
        RngKernelGenerator::ALGORITHM
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    /// Counter consumed by the next [`CounterRng::fill`].
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Fill `out` with standard-normal values and advance the internal
    /// counter past the consumed range.
    pub fn fill(&mut self, out: &mut [T]) {
        self.fill_at(self.counter, out);
        self.counter += out.len().div_ceil(BLOCK) as u64;
    }

    /// Fill `out` from an explicit starting counter without touching the
    /// internal one. Deterministic: the same `(key, counter, len)`
    /// always produces the same values, regardless of how the fill is
    /// chunked across threads.
    pub fn fill_at(&self, counter: u64, out: &mut [T]) {
        out.par_chunks_mut(PAR_CHUNK)
            .enumerate()
            .for_each(|(chunk, slice)| {
                let offset = (chunk * PAR_CHUNK / BLOCK) as u64;
                self.kernel.fill(counter + offset, self.key, slice);
            });
    }
}
