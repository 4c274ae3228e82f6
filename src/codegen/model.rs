//! Per-node model update kernel generation.

use std::fmt::Write;

use crate::codegen::{check_not_reserved, emit_sig, lower, model_sig, sanitize_ident};
use crate::error::Result;
use crate::model::Model;
use crate::spec::Spec;

/// Generates the per-node update kernel for a model: one pass over all
/// nodes evaluating drift, diffusion and observables from the state,
/// coupling-input and parameter buffers.
pub struct ModelKernelGenerator<'a> {
    model: &'a Model,
}

impl<'a> ModelKernelGenerator<'a> {
    pub fn new(model: &'a Model) -> Self {
        ModelKernelGenerator { model }
    }

    /// Entry point name, derived from the model name only.
    pub fn kernel_name(&self) -> String {
        format!("{}_kernel", sanitize_ident(self.model.name()))
    }

    /// Lower the model into kernel source for `spec`.
    pub fn generate(&self, spec: &Spec) -> Result<String> {
        check_symbols(self.model)?;

        let t = spec.real().ctype();
        let lanes = spec.lanes();
        let name = self.kernel_name();

        let mut src = String::new();
        writeln!(src, "/* per-node update kernel for model '{}' */", self.model.name()).unwrap();
        src.push_str("#include <math.h>\n\n");
        emit_sig(&mut src, &name, &model_sig(spec.real()));

        writeln!(src, "void {}(const unsigned int n_node,", name).unwrap();
        let pad = " ".repeat(6 + name.len());
        writeln!(src, "{}const {} *restrict state,", pad, t).unwrap();
        writeln!(src, "{}const {} *restrict input,", pad, t).unwrap();
        writeln!(src, "{}const {} *restrict param,", pad, t).unwrap();
        writeln!(src, "{}{} *restrict drift,", pad, t).unwrap();
        writeln!(src, "{}{} *restrict diffusion,", pad, t).unwrap();
        writeln!(src, "{}{} *restrict obs)", pad, t).unwrap();
        src.push_str("{\n");

        // Full vectors first, scalar remainder after.
        writeln!(
            src,
            "    const unsigned int n_blk = n_node - (n_node % {}u);",
            lanes
        )
        .unwrap();
        writeln!(
            src,
            "    for (unsigned int i_blk = 0; i_blk < n_blk; i_blk += {}u)",
            lanes
        )
        .unwrap();
        src.push_str("    {\n");
        src.push_str("#pragma omp simd\n");
        writeln!(
            src,
            "        for (unsigned int i_lane = 0; i_lane < {}u; i_lane++)",
            lanes
        )
        .unwrap();
        src.push_str("        {\n");
        src.push_str("            const unsigned int i_node = i_blk + i_lane;\n");
        emit_update_body(self.model, spec, "            ", &mut src)?;
        src.push_str("        }\n");
        src.push_str("    }\n");
        src.push_str("    for (unsigned int i_node = n_blk; i_node < n_node; i_node++)\n");
        src.push_str("    {\n");
        emit_update_body(self.model, spec, "        ", &mut src)?;
        src.push_str("    }\n");
        src.push_str("}\n");
        Ok(src)
    }
}

pub(crate) fn check_symbols(model: &Model) -> Result<()> {
    let context = format!("model '{}'", model.name());
    for name in model
        .state()
        .iter()
        .chain(model.inputs().iter())
        .map(|s| s.as_str())
        .chain(model.params().iter().map(|p| p.name.as_str()))
    {
        check_not_reserved(name, &context)?;
    }
    Ok(())
}

/// Emit the loads and drift/diffusion/observable stores for one node
/// (`i_node` in scope). Shared with the network step generator, which
/// appends the state advance after it.
pub(crate) fn emit_update_body(
    model: &Model,
    spec: &Spec,
    indent: &str,
    src: &mut String,
) -> Result<()> {
    let t = spec.real().ctype();
    let real = spec.real();

    for (v, name) in model.state().iter().enumerate() {
        writeln!(
            src,
            "{}const {} {} = state[{}u * n_node + i_node];",
            indent, t, name, v
        )
        .unwrap();
    }
    for (k, name) in model.inputs().iter().enumerate() {
        writeln!(
            src,
            "{}const {} {} = input[{}u * n_node + i_node];",
            indent, t, name, k
        )
        .unwrap();
    }
    for (k, p) in model.params().iter().enumerate() {
        writeln!(
            src,
            "{}const {} {} = param[{}u * n_node + i_node];",
            indent, t, p.name, k
        )
        .unwrap();
    }

    // Every declared symbol is now a local of the same name.
    let resolve = |name: &str| -> Option<String> {
        let declared = model.state().iter().any(|s| s == name)
            || model.inputs().iter().any(|s| s == name)
            || model.params().iter().any(|p| p.name == name);
        declared.then(|| name.to_string())
    };

    for (v, expr) in model.drift().iter().enumerate() {
        writeln!(
            src,
            "{}drift[{}u * n_node + i_node] = {};",
            indent,
            v,
            lower(expr, real, &resolve)?
        )
        .unwrap();
    }
    for (v, expr) in model.diffusion().iter().enumerate() {
        writeln!(
            src,
            "{}diffusion[{}u * n_node + i_node] = {};",
            indent,
            v,
            lower(expr, real, &resolve)?
        )
        .unwrap();
    }
    for (k, (_, expr)) in model.observables().iter().enumerate() {
        writeln!(
            src,
            "{}obs[{}u * n_node + i_node] = {};",
            indent,
            k,
            lower(expr, real, &resolve)?
        )
        .unwrap();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{sym, Expr};
    use crate::model::library;
    use crate::spec::{RealKind, Spec};

    #[test]
    fn generation_is_deterministic() {
        let model = library::oscillator2d();
        let gen = ModelKernelGenerator::new(&model);
        let spec = Spec::default();
        assert_eq!(gen.generate(&spec).unwrap(), gen.generate(&spec).unwrap());
    }

    #[test]
    fn source_differs_across_vector_widths() {
        let model = library::linear();
        let gen = ModelKernelGenerator::new(&model);
        let a = gen.generate(&Spec::new(RealKind::F32, 4, 64).unwrap()).unwrap();
        let b = gen.generate(&Spec::new(RealKind::F32, 8, 64).unwrap()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn source_carries_name_signature_and_simd_pragma() {
        let model = library::linear();
        let gen = ModelKernelGenerator::new(&model);
        let src = gen.generate(&Spec::default()).unwrap();
        assert!(src.contains("void linear_kernel(const unsigned int n_node,"));
        assert!(src.contains("const char linear_kernel_sig[]"));
        assert!(src.contains("#pragma omp simd"));
        assert!(src.contains("drift[0u * n_node + i_node]"));
    }

    #[test]
    fn double_precision_uses_double_and_bare_libm() {
        let model = library::jansen_rit();
        let gen = ModelKernelGenerator::new(&model);
        let src = gen
            .generate(&Spec::new(RealKind::F64, 4, 64).unwrap())
            .unwrap();
        assert!(src.contains("const double *restrict state"));
        assert!(src.contains("exp("));
        assert!(!src.contains("expf("));
    }

    #[test]
    fn reserved_symbol_names_fail_generation() {
        let model = crate::model::Model::builder("clash")
            .state("acc")
            .drift(sym("acc"))
            .diffusion(Expr::Const(0.0))
            .build()
            .unwrap();
        let gen = ModelKernelGenerator::new(&model);
        assert!(gen.generate(&Spec::default()).is_err());
    }
}
