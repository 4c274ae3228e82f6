//! Kernel source generation.
//!
//! One generator per kernel family lowers a descriptor plus a [`Spec`]
//! into C99 source text. Lowering is a fixed-order structural recursion:
//! identical descriptor + spec input always yields byte-identical source,
//! which is what makes the compiler cache key meaningful.
//!
//! Every generated entry point is accompanied by an exported
//! `const char <name>_sig[]` string; the binding layer compares it
//! against the calling convention it expects before any call is made.

mod coupling;
mod lower;
mod model;
mod network;
mod rng;

pub use coupling::CouplingKernelGenerator;
pub use model::ModelKernelGenerator;
pub use network::NetworkKernelGenerator;
pub use rng::{RngKernelGenerator, BLOCK};

pub(crate) use lower::lower;

use crate::error::{NeurogenError, Result};
use crate::spec::RealKind;

/// Identifiers the generators claim for loop counters, buffer arguments
/// and scratch locals. Descriptor symbols may not shadow them.
pub(crate) const RESERVED: &[&str] = &[
    "n_node", "state", "input", "param", "drift", "diffusion", "obs", "weights", "noise", "dt",
    "sqrt_dt", "acc", "x_i", "x_j", "w", "c_in", "i_blk", "i_lane", "i_node", "j_node", "n_blk",
];

/// Turn a descriptor name into a C identifier, deterministically.
pub(crate) fn sanitize_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.chars().next().unwrap().is_ascii_digit() {
        out.insert(0, '_');
    }
    out
}

pub(crate) fn check_not_reserved(symbol: &str, context: &str) -> Result<()> {
    if RESERVED.contains(&symbol) {
        return Err(NeurogenError::codegen(format!(
            "symbol '{}' in {} collides with a generated identifier",
            symbol, context
        )));
    }
    Ok(())
}

/// Emit a floating literal valid for the spec's C type.
pub(crate) fn format_literal(value: f64, real: RealKind) -> Result<String> {
    if !value.is_finite() {
        return Err(NeurogenError::codegen(format!(
            "cannot lower non-finite constant {}",
            value
        )));
    }
    let mut s = format!("{}", value);
    if !s.contains('.') && !s.contains('e') {
        s.push_str(".0");
    }
    s.push_str(real.literal_suffix());
    Ok(s)
}

// Canonical signature strings shared by the generators (which embed
// them) and the binding layer (which checks them).

pub(crate) fn model_sig(real: RealKind) -> String {
    let t = real.ctype();
    format!(
        "void(unsigned int, const {t}*, const {t}*, const {t}*, {t}*, {t}*, {t}*)",
        t = t
    )
}

pub(crate) fn pre_sum_sig(real: RealKind) -> String {
    let t = real.ctype();
    format!("{t}({t}, {t}, {t})", t = t)
}

pub(crate) fn post_sum_sig(real: RealKind) -> String {
    let t = real.ctype();
    format!("{t}({t})", t = t)
}

pub(crate) fn network_sig(real: RealKind) -> String {
    let t = real.ctype();
    format!(
        "void(unsigned int, {t}*, {t}*, const {t}*, const {t}*, const {t}*, {t}*, {t}*, {t}*, {t})",
        t = t
    )
}

pub(crate) fn fill_sig(real: RealKind) -> String {
    format!(
        "void(unsigned long long, unsigned long long, unsigned long long, {}*)",
        real.ctype()
    )
}

/// Emit the exported signature constant for a kernel.
pub(crate) fn emit_sig(src: &mut String, kernel: &str, sig: &str) {
    src.push_str(&format!("const char {}_sig[] = \"{}\";\n\n", kernel, sig));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_is_deterministic_and_c_safe() {
        assert_eq!(sanitize_ident("Jansen-Rit 95"), "jansen_rit_95");
        assert_eq!(sanitize_ident("2d"), "_2d");
    }

    #[test]
    fn literals_keep_a_decimal_point() {
        assert_eq!(format_literal(-1.0, RealKind::F32).unwrap(), "-1.0f");
        assert_eq!(format_literal(0.25, RealKind::F64).unwrap(), "0.25");
        assert_eq!(format_literal(135.0, RealKind::F32).unwrap(), "135.0f");
        assert!(format_literal(f64::NAN, RealKind::F32).is_err());
    }
}
