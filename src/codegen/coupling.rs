//! Coupling kernel generation: the scalar pre-sum / post-sum pair.

use std::fmt::Write;

use crate::codegen::{
    check_not_reserved, emit_sig, format_literal, lower, post_sum_sig, pre_sum_sig, sanitize_ident,
};
use crate::coupling::{Coupling, ACC, PRE_DST, PRE_SRC};
use crate::error::Result;
use crate::spec::Spec;

/// Generates the two scalar entry points of a coupling function:
/// `pre_sum(x_i, x_j, w)` returning the weighted per-edge contribution
/// and `post_sum(acc)` mapping the reduction onto the coupling input.
pub struct CouplingKernelGenerator<'a> {
    cfun: &'a Coupling,
}

impl<'a> CouplingKernelGenerator<'a> {
    pub fn new(cfun: &'a Coupling) -> Self {
        CouplingKernelGenerator { cfun }
    }

    pub fn kernel_name_pre_sum(&self) -> String {
        format!("{}_pre_sum", sanitize_ident(self.cfun.name()))
    }

    pub fn kernel_name_post_sum(&self) -> String {
        format!("{}_post_sum", sanitize_ident(self.cfun.name()))
    }

    pub fn generate(&self, spec: &Spec) -> Result<String> {
        check_symbols(self.cfun)?;

        let t = spec.real().ctype();
        let real = spec.real();
        // Parameters are baked in as literals.
        let resolve = |name: &str| -> Option<String> {
            self.cfun
                .params()
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| format_literal(p.value, real).ok())
        };
        let resolve_pre = |name: &str| -> Option<String> {
            if name == PRE_DST || name == PRE_SRC {
                return Some(name.to_string());
            }
            resolve(name)
        };
        let resolve_post = |name: &str| -> Option<String> {
            if name == ACC {
                return Some(name.to_string());
            }
            resolve(name)
        };

        let mut src = String::new();
        writeln!(src, "/* coupling kernels for '{}' */", self.cfun.name()).unwrap();
        src.push_str("#include <math.h>\n\n");

        let pre = self.kernel_name_pre_sum();
        emit_sig(&mut src, &pre, &pre_sum_sig(real));
        writeln!(
            src,
            "{t} {name}(const {t} x_i, const {t} x_j, const {t} w)",
            t = t,
            name = pre
        )
        .unwrap();
        src.push_str("{\n");
        writeln!(
            src,
            "    return w * {};",
            lower(self.cfun.pre(), real, &resolve_pre)?
        )
        .unwrap();
        src.push_str("}\n\n");

        let post = self.kernel_name_post_sum();
        emit_sig(&mut src, &post, &post_sum_sig(real));
        writeln!(src, "{t} {name}(const {t} acc)", t = t, name = post).unwrap();
        src.push_str("{\n");
        writeln!(
            src,
            "    return {};",
            lower(self.cfun.post(), real, &resolve_post)?
        )
        .unwrap();
        src.push_str("}\n");
        Ok(src)
    }
}

pub(crate) fn check_symbols(cfun: &Coupling) -> Result<()> {
    let context = format!("coupling '{}'", cfun.name());
    for p in cfun.params() {
        check_not_reserved(&p.name, &context)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling;
    use crate::spec::Spec;

    #[test]
    fn generates_both_entry_points() {
        let cfun = coupling::sigmoidal(0.005, 6.0, 0.56, 1.0);
        let gen = CouplingKernelGenerator::new(&cfun);
        let src = gen.generate(&Spec::default()).unwrap();
        assert!(src.contains("float sigmoidal_pre_sum(const float x_i, const float x_j, const float w)"));
        assert!(src.contains("float sigmoidal_post_sum(const float acc)"));
        assert!(src.contains("const char sigmoidal_pre_sum_sig[]"));
        // parameters are baked as literals
        assert!(src.contains("0.005f"));
    }

    #[test]
    fn generation_is_deterministic() {
        let cfun = coupling::kuramoto(0.5);
        let gen = CouplingKernelGenerator::new(&cfun);
        let spec = Spec::default();
        assert_eq!(gen.generate(&spec).unwrap(), gen.generate(&spec).unwrap());
    }
}
