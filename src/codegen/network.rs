//! Dense-network step kernel generation.
//!
//! The step kernel interleaves the coupling reduction with the model
//! update: a first pass aggregates every destination's coupling input
//! from the pre-step state, a second pass evaluates the model and
//! advances the state one Euler-Maruyama step. Both passes are
//! data-parallel over nodes; nothing reads a value the same invocation
//! has already overwritten.

use std::fmt::Write;

use crate::codegen::coupling::check_symbols as check_coupling_symbols;
use crate::codegen::model::{check_symbols as check_model_symbols, emit_update_body};
use crate::codegen::{emit_sig, format_literal, lower, network_sig, sanitize_ident};
use crate::coupling::{ACC, PRE_DST, PRE_SRC};
use crate::error::Result;
use crate::network::DenseNetwork;
use crate::spec::Spec;

/// Generates the dense-network step kernel for a model/coupling pair.
pub struct NetworkKernelGenerator<'a> {
    net: &'a DenseNetwork,
}

impl<'a> NetworkKernelGenerator<'a> {
    pub fn new(net: &'a DenseNetwork) -> Self {
        NetworkKernelGenerator { net }
    }

    pub fn kernel_name(&self) -> String {
        format!(
            "{}_{}_step",
            sanitize_ident(self.net.model().name()),
            sanitize_ident(self.net.coupling().name())
        )
    }

    pub fn generate(&self, spec: &Spec) -> Result<String> {
        let model = self.net.model();
        let cfun = self.net.coupling();
        check_model_symbols(model)?;
        check_coupling_symbols(cfun)?;

        let t = spec.real().ctype();
        let real = spec.real();
        let sx = real.fn_suffix();
        let name = self.kernel_name();
        let cvar = cfun.cvar();

        let resolve_cparam = |sym: &str| -> Option<String> {
            cfun.params()
                .iter()
                .find(|p| p.name == sym)
                .and_then(|p| format_literal(p.value, real).ok())
        };
        let resolve_pre = |sym: &str| -> Option<String> {
            if sym == PRE_DST || sym == PRE_SRC {
                return Some(sym.to_string());
            }
            resolve_cparam(sym)
        };
        let resolve_post = |sym: &str| -> Option<String> {
            if sym == ACC {
                return Some(sym.to_string());
            }
            resolve_cparam(sym)
        };

        let mut src = String::new();
        writeln!(
            src,
            "/* dense network step: model '{}', coupling '{}' */",
            model.name(),
            cfun.name()
        )
        .unwrap();
        src.push_str("#include <math.h>\n\n");
        emit_sig(&mut src, &name, &network_sig(real));

        writeln!(src, "void {}(const unsigned int n_node,", name).unwrap();
        let pad = " ".repeat(6 + name.len());
        writeln!(src, "{}{} *restrict state,", pad, t).unwrap();
        writeln!(src, "{}{} *restrict input,", pad, t).unwrap();
        writeln!(src, "{}const {} *restrict param,", pad, t).unwrap();
        writeln!(src, "{}const {} *restrict weights,", pad, t).unwrap();
        writeln!(src, "{}const {} *restrict noise,", pad, t).unwrap();
        writeln!(src, "{}{} *restrict drift,", pad, t).unwrap();
        writeln!(src, "{}{} *restrict diffusion,", pad, t).unwrap();
        writeln!(src, "{}{} *restrict obs,", pad, t).unwrap();
        writeln!(src, "{}const {} dt)", pad, t).unwrap();
        src.push_str("{\n");
        writeln!(src, "    const {} sqrt_dt = sqrt{}(dt);", t, sx).unwrap();

        // Coupling pass.
        src.push_str("    for (unsigned int i_node = 0; i_node < n_node; i_node++)\n");
        src.push_str("    {\n");
        writeln!(
            src,
            "        const {} x_i = state[{}u * n_node + i_node];",
            t, cvar
        )
        .unwrap();
        writeln!(src, "        {} acc = {};", t, format_literal(0.0, real)?).unwrap();
        src.push_str("#pragma omp simd reduction(+:acc)\n");
        src.push_str("        for (unsigned int j_node = 0; j_node < n_node; j_node++)\n");
        src.push_str("        {\n");
        writeln!(
            src,
            "            const {} x_j = state[{}u * n_node + j_node];",
            t, cvar
        )
        .unwrap();
        src.push_str("            const ");
        writeln!(src, "{} w = weights[i_node * n_node + j_node];", t).unwrap();
        writeln!(
            src,
            "            acc += w * {};",
            lower(cfun.pre(), real, &resolve_pre)?
        )
        .unwrap();
        src.push_str("        }\n");
        writeln!(
            src,
            "        const {} c_in = {};",
            t,
            lower(cfun.post(), real, &resolve_post)?
        )
        .unwrap();
        for k in 0..model.n_input() {
            writeln!(src, "        input[{}u * n_node + i_node] = c_in;", k).unwrap();
        }
        src.push_str("    }\n");

        // Update pass: model evaluation, then the state advance.
        src.push_str("#pragma omp simd\n");
        src.push_str("    for (unsigned int i_node = 0; i_node < n_node; i_node++)\n");
        src.push_str("    {\n");
        emit_update_body(model, spec, "        ", &mut src)?;
        for v in 0..model.n_svar() {
            writeln!(
                src,
                "        state[{v}u * n_node + i_node] = {sym} + dt * drift[{v}u * n_node + i_node] + sqrt_dt * diffusion[{v}u * n_node + i_node] * noise[{v}u * n_node + i_node];",
                v = v,
                sym = model.state()[v]
            )
            .unwrap();
        }
        src.push_str("    }\n");
        src.push_str("}\n");
        Ok(src)
    }
}
