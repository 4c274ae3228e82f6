//! Catalog of ready-made model descriptors.
//!
//! Default parameter values follow the usual literature choices; callers
//! can rebuild any of these with [`Model::builder`] to change them.

use crate::expr::{sym, Expr};
use crate::model::Model;

/// One-dimensional linear model, `dx = lambda x + c`.
///
/// The simplest descriptor that exercises every kernel family; `lambda`
/// below zero gives a stable node.
pub fn linear() -> Model {
    Model::builder("linear")
        .state("x")
        .param("lambda", -1.0)
        .param("sigma", 1e-3)
        .input("c")
        .drift(sym("lambda") * sym("x") + sym("c"))
        .diffusion(sym("sigma"))
        .observable("x", sym("x"))
        .build()
        .expect("linear model descriptor is valid")
}

/// Generic planar oscillator with cubic nonlinearity.
pub fn oscillator2d() -> Model {
    let v = sym("V");
    let w = sym("W");
    Model::builder("oscillator2d")
        .state("V")
        .state("W")
        .param("tau", 1.0)
        .param("I", 0.0)
        .param("a", -2.0)
        .param("b", -10.0)
        .param("c", 0.0)
        .param("d", 0.02)
        .param("e", 3.0)
        .param("f", 1.0)
        .param("g", 0.0)
        .param("alpha", 1.0)
        .param("beta", 1.0)
        .param("gamma", 1.0)
        .param("sigma", 1e-3)
        .input("c_0")
        .drift(
            sym("d")
                * sym("tau")
                * (sym("alpha") * w.clone() - sym("f") * v.clone().pow(3.0)
                    + sym("e") * v.clone().pow(2.0)
                    + sym("g") * v.clone()
                    + sym("gamma") * sym("I")
                    + sym("gamma") * sym("c_0")),
        )
        .drift(
            sym("d")
                * (sym("a") + sym("b") * v.clone() + sym("c") * v.clone().pow(2.0)
                    - sym("beta") * w.clone())
                / sym("tau"),
        )
        .diffusion(sym("sigma"))
        .diffusion(sym("sigma"))
        .observable("V", v)
        .build()
        .expect("oscillator2d model descriptor is valid")
}

/// Phase oscillator, `dtheta = omega + c`.
pub fn kuramoto() -> Model {
    Model::builder("kuramoto")
        .state("theta")
        .param("omega", 1.0)
        .input("c")
        .drift(sym("omega") + sym("c"))
        .diffusion(Expr::Const(0.0))
        .observable("sin_theta", sym("theta").sin())
        .build()
        .expect("kuramoto model descriptor is valid")
}

/// Firing-rate sigmoid used by [`jansen_rit`].
fn sigm(v: Expr) -> Expr {
    2.0 * sym("nu_max") / (1.0 + (sym("r") * (sym("v0") - v)).exp())
}

/// Jansen-Rit cortical column model (six states, one noisy state).
///
/// States `y0..y2` are postsynaptic potentials, `y3..y5` their
/// derivatives. The observable is the pyramidal membrane potential
/// `y1 - y2`.
pub fn jansen_rit() -> Model {
    let a = sym("a");
    let b = sym("b");
    let big_a = sym("A");
    let big_b = sym("B");
    let j = sym("J");
    Model::builder("jansen_rit")
        .state("y0")
        .state("y1")
        .state("y2")
        .state("y3")
        .state("y4")
        .state("y5")
        .param("A", 3.25)
        .param("B", 22.0)
        .param("a", 0.1)
        .param("b", 0.05)
        .param("v0", 5.52)
        .param("nu_max", 0.0025)
        .param("r", 0.56)
        .param("J", 135.0)
        .param("a_1", 1.0)
        .param("a_2", 0.8)
        .param("a_3", 0.25)
        .param("a_4", 0.25)
        .param("mu", 0.22)
        .param("sigma", 1e-3)
        .input("c_pop")
        .drift(sym("y3"))
        .drift(sym("y4"))
        .drift(sym("y5"))
        .drift(
            big_a.clone() * a.clone() * sigm(sym("y1") - sym("y2"))
                - 2.0 * a.clone() * sym("y3")
                - a.clone().pow(2.0) * sym("y0"),
        )
        .drift(
            big_a * a.clone()
                * (sym("mu") + sym("a_2") * j.clone() * sigm(sym("a_1") * j.clone() * sym("y0"))
                    + sym("c_pop"))
                - 2.0 * a.clone() * sym("y4")
                - a.pow(2.0) * sym("y1"),
        )
        .drift(
            big_b * b.clone() * (sym("a_4") * j.clone() * sigm(sym("a_3") * j * sym("y0")))
                - 2.0 * b.clone() * sym("y5")
                - b.pow(2.0) * sym("y2"),
        )
        .diffusion(Expr::Const(0.0))
        .diffusion(Expr::Const(0.0))
        .diffusion(Expr::Const(0.0))
        .diffusion(Expr::Const(0.0))
        .diffusion(sym("sigma"))
        .diffusion(Expr::Const(0.0))
        .observable("eeg", sym("y1") - sym("y2"))
        .build()
        .expect("jansen_rit model descriptor is valid")
}
