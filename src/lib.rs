//! `neurogen` turns symbolic neural-mass model descriptors into
//! compiled, vectorized native kernels.
//!
//! A model is declared once as symbolic state/parameter/drift/diffusion
//! expressions; a code generator lowers it with a [`spec::Spec`] into C
//! source, the [`compiler::Compiler`] builds and caches the artifact,
//! and [`kernel`] bindings expose the entry points over flat aligned
//! buffers. The same pipeline serves the counter-based
//! [`rng::CounterRng`] engine.
//!
//! ```no_run
//! use neurogen::prelude::*;
//!
//! let model = neurogen::model::library::linear();
//! let spec = Spec::default();
//! let generator = ModelKernelGenerator::new(&model);
//! let source = generator.generate(&spec)?;
//!
//! let compiler = Compiler::new()?;
//! let module = compiler.compile(model.name(), &source)?;
//! let kernel = ModelKernel::<f32>::bind(&module, &generator.kernel_name())?;
//!
//! let mut arrays = model.prep_arrays::<f32>(1024, &spec)?;
//! kernel.call(&mut arrays)?;
//! # Ok::<(), neurogen::NeurogenError>(())
//! ```

pub mod codegen;
pub mod compiler;
pub mod coupling;
pub mod error;
pub mod expr;
pub mod kernel;
pub mod model;
pub mod network;
pub mod rng;
pub mod scheme;
pub mod spec;

pub use crate::codegen::{
    CouplingKernelGenerator, ModelKernelGenerator, NetworkKernelGenerator, RngKernelGenerator,
};
pub use crate::compiler::{Artifact, Compiler, Module};
pub use crate::coupling::Coupling;
pub use crate::error::NeurogenError;
pub use crate::expr::{sym, Expr};
pub use crate::kernel::{CouplingKernel, FillKernel, ModelKernel, NetworkKernel};
pub use crate::model::{KernelArrays, Model, ModelBuilder, Param};
pub use crate::network::DenseNetwork;
pub use crate::rng::CounterRng;
pub use crate::scheme::{euler_maruyama_logp, ReferenceStepper};
pub use crate::spec::{AlignedVec, Real, RealKind, Spec};

pub mod prelude {
    pub use crate::codegen::{
        CouplingKernelGenerator, ModelKernelGenerator, NetworkKernelGenerator,
    };
    pub use crate::compiler::{Compiler, Module};
    pub use crate::coupling::Coupling;
    pub use crate::error::NeurogenError;
    pub use crate::expr::{sym, Expr};
    pub use crate::kernel::{CouplingKernel, ModelKernel, NetworkKernel};
    pub use crate::model::{KernelArrays, Model, Param};
    pub use crate::network::DenseNetwork;
    pub use crate::rng::CounterRng;
    pub use crate::scheme::euler_maruyama_logp;
    pub use crate::spec::{RealKind, Spec};
}
