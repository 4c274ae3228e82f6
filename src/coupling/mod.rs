//! Coupling function descriptors.
//!
//! A [`Coupling`] is a pair of expressions: a per-edge `pre` term over the
//! destination state `x_i` and source state `x_j`, and a per-node `post`
//! term over the accumulated sum `acc`. The network generator composes
//! them as `input[i] = post(sum_j w[i,j] * pre(x_i, x_j))`.
//!
//! Coupling parameters are baked into generated source as constants;
//! unlike model parameters they are not runtime data.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{NeurogenError, Result};
use crate::expr::{sym, Expr};
use crate::model::Param;

/// Destination-state symbol available to `pre` expressions.
pub const PRE_DST: &str = "x_i";
/// Source-state symbol available to `pre` expressions.
pub const PRE_SRC: &str = "x_j";
/// Reduction symbol available to `post` expressions.
pub const ACC: &str = "acc";

/// Immutable descriptor of a coupling function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupling {
    name: String,
    pre: Expr,
    post: Expr,
    params: Vec<Param>,
    cvar: usize,
}

impl Coupling {
    /// Validate and construct a coupling descriptor.
    ///
    /// `cvar` is the index of the state variable the coupling reads on
    /// both ends of an edge; it is checked against the owning model when
    /// a network is assembled.
    pub fn new(
        name: impl Into<String>,
        pre: Expr,
        post: Expr,
        params: Vec<Param>,
        cvar: usize,
    ) -> Result<Self> {
        let name = name.into();
        let mut seen = BTreeSet::new();
        for p in &params {
            if [PRE_DST, PRE_SRC, ACC].contains(&p.name.as_str()) || !seen.insert(&p.name) {
                return Err(NeurogenError::codegen(format!(
                    "coupling '{}' parameter '{}' collides with a reserved or duplicate name",
                    name, p.name
                )));
            }
        }

        let param_names: BTreeSet<&str> = params.iter().map(|p| p.name.as_str()).collect();
        for name_sym in pre.free_symbols() {
            if name_sym != PRE_DST && name_sym != PRE_SRC && !param_names.contains(name_sym.as_str())
            {
                return Err(NeurogenError::undefined_symbol(
                    name_sym,
                    format!("pre-sum of coupling '{}'", name),
                ));
            }
        }
        for name_sym in post.free_symbols() {
            if name_sym != ACC && !param_names.contains(name_sym.as_str()) {
                return Err(NeurogenError::undefined_symbol(
                    name_sym,
                    format!("post-sum of coupling '{}'", name),
                ));
            }
        }

        Ok(Coupling {
            name,
            pre,
            post,
            params,
            cvar,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pre(&self) -> &Expr {
        &self.pre
    }

    pub fn post(&self) -> &Expr {
        &self.post
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Index of the coupled state variable.
    pub fn cvar(&self) -> usize {
        self.cvar
    }
}

/// Linear coupling: `pre = x_j`, `post = a acc`.
pub fn linear(a: f64) -> Coupling {
    Coupling::new(
        "linear",
        sym(PRE_SRC),
        sym("a") * sym(ACC),
        vec![Param::new("a", a)],
        0,
    )
    .expect("linear coupling descriptor is valid")
}

/// Difference coupling: `pre = x_j - x_i`, `post = a acc`.
pub fn diff(a: f64) -> Coupling {
    Coupling::new(
        "diff",
        sym(PRE_SRC) - sym(PRE_DST),
        sym("a") * sym(ACC),
        vec![Param::new("a", a)],
        0,
    )
    .expect("diff coupling descriptor is valid")
}

/// Sigmoidal coupling used with Jansen-Rit style models.
pub fn sigmoidal(cmax: f64, midpoint: f64, r: f64, a: f64) -> Coupling {
    Coupling::new(
        "sigmoidal",
        sym("cmax") / (1.0 + (sym("r") * (sym("midpoint") - sym(PRE_SRC))).exp()),
        sym("a") * sym(ACC),
        vec![
            Param::new("cmax", cmax),
            Param::new("midpoint", midpoint),
            Param::new("r", r),
            Param::new("a", a),
        ],
        0,
    )
    .expect("sigmoidal coupling descriptor is valid")
}

/// Kuramoto phase coupling: `pre = sin(x_j - x_i)`, `post = a acc`.
pub fn kuramoto(a: f64) -> Coupling {
    Coupling::new(
        "kuramoto",
        (sym(PRE_SRC) - sym(PRE_DST)).sin(),
        sym("a") * sym(ACC),
        vec![Param::new("a", a)],
        0,
    )
    .expect("kuramoto coupling descriptor is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_couplings_validate() {
        for cfun in [linear(0.1), diff(0.1), sigmoidal(0.005, 6.0, 0.56, 1.0), kuramoto(0.5)] {
            assert_eq!(cfun.cvar(), 0);
        }
    }

    #[test]
    fn pre_sum_vocabulary_is_checked() {
        let err = Coupling::new("bad", sym("x_k"), sym(ACC), vec![], 0).unwrap_err();
        assert!(matches!(err, NeurogenError::UndefinedSymbol { .. }));
    }

    #[test]
    fn post_sum_vocabulary_is_checked() {
        let err = Coupling::new("bad", sym(PRE_SRC), sym("x_j"), vec![], 0).unwrap_err();
        assert!(matches!(err, NeurogenError::UndefinedSymbol { .. }));
    }

    #[test]
    fn reserved_parameter_names_are_rejected() {
        let err = Coupling::new(
            "bad",
            sym(PRE_SRC),
            sym(ACC),
            vec![Param::new("acc", 1.0)],
            0,
        )
        .unwrap_err();
        assert!(matches!(err, NeurogenError::CodeGen(_)));
    }
}
