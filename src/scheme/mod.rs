//! Time-stepping schemes: symbolic log-density construction and a
//! host-side reference integrator.
//!
//! [`euler_maruyama_logp`] is model-inspection machinery for sensitivity
//! work; it never touches the compiler. [`ReferenceStepper`] mirrors the
//! generated dense-network step kernel in plain Rust and serves as the
//! oracle when validating compiled kernels.

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::coupling::{ACC, PRE_DST, PRE_SRC};
use crate::error::{NeurogenError, Result};
use crate::expr::{sym, Expr};
use crate::network::DenseNetwork;

/// `log(2 pi) / 2`, the Gaussian normalization constant.
const HALF_LN_2PI: f64 = 0.918_938_533_204_672_7;

/// Build the per-step Euler-Maruyama log-density of a state sequence.
///
/// For each state symbol `x` with drift `f` and diffusion `g`, the term
/// is the Gaussian log-likelihood of the next-state symbol `x_next`
/// centered at `x + f dt` with scale `g sqrt(dt)`; the result is the sum
/// over all state variables. The step symbol is `dt`.
///
/// The returned scalar supports [`crate::model::Model::partial`] for
/// gradient construction.
pub fn euler_maruyama_logp(state: &[Expr], drift: &[Expr], diffusion: &[Expr]) -> Result<Expr> {
    if state.len() != drift.len() || state.len() != diffusion.len() {
        return Err(NeurogenError::codegen(format!(
            "log-density needs equal sequence lengths, got {} state / {} drift / {} diffusion",
            state.len(),
            drift.len(),
            diffusion.len()
        )));
    }
    if state.is_empty() {
        return Err(NeurogenError::codegen(
            "log-density of an empty state sequence",
        ));
    }

    let dt = sym("dt");
    let mut terms = Vec::with_capacity(state.len());
    for ((x, f), g) in state.iter().zip(drift).zip(diffusion) {
        let name = match x {
            Expr::Sym(name) => name.clone(),
            other => {
                return Err(NeurogenError::codegen(format!(
                    "state sequence entry '{}' is not a symbol",
                    other
                )))
            }
        };
        let x_next = sym(format!("{}_next", name));
        let mu = x.clone() + f.clone() * dt.clone();
        let sd = g.clone() * dt.clone().sqrt();
        let resid = x_next - mu;
        let term = -(resid.clone() * resid) / (2.0 * sd.clone().pow(2.0))
            - sd.log()
            - Expr::Const(HALF_LN_2PI);
        terms.push(term);
    }

    let mut logp = terms.remove(0);
    for term in terms {
        logp = logp + term;
    }
    Ok(logp)
}

/// Plain-Rust Euler-Maruyama integrator over a dense network.
///
/// State is var-major, `state[v * n_node + i]`, matching the generated
/// kernel layout. Given the same noise draws it computes exactly what
/// the generated step kernel computes (up to floating width).
pub struct ReferenceStepper<'a> {
    net: &'a DenseNetwork,
    dt: f64,
}

impl<'a> ReferenceStepper<'a> {
    pub fn new(net: &'a DenseNetwork, dt: f64) -> Self {
        ReferenceStepper { net, dt }
    }

    /// Advance one step with caller-supplied standard-normal draws
    /// (`noise[v * n_node + i]`).
    pub fn step(&self, state: &mut DVector<f64>, noise: &DVector<f64>) -> Result<()> {
        let model = self.net.model();
        let cfun = self.net.coupling();
        let n = self.net.n_node();
        let n_svar = model.n_svar();
        if state.len() != n_svar * n || noise.len() != n_svar * n {
            return Err(NeurogenError::configuration(format!(
                "state/noise length must be {} ({} vars x {} nodes)",
                n_svar * n,
                n_svar,
                n
            )));
        }

        let param_of = |name: &str| -> Option<f64> {
            model
                .params()
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.value)
        };
        let cparam_of = |name: &str| -> Option<f64> {
            cfun.params()
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.value)
        };

        // Coupling reduction over the pre-step state.
        let cvar = cfun.cvar();
        let weights = self.net.weights();
        let mut coupling_in = vec![0.0f64; n];
        for i in 0..n {
            let x_i = state[cvar * n + i];
            let mut acc = 0.0;
            for j in 0..n {
                let x_j = state[cvar * n + j];
                let pre = cfun.pre().eval(&|name| match name {
                    _ if name == PRE_DST => Some(x_i),
                    _ if name == PRE_SRC => Some(x_j),
                    _ => cparam_of(name),
                })?;
                acc += weights[[i, j]] * pre;
            }
            coupling_in[i] = cfun.post().eval(&|name| {
                if name == ACC {
                    Some(acc)
                } else {
                    cparam_of(name)
                }
            })?;
        }

        // Model update from the pre-step state, then the advance.
        let sqrt_dt = self.dt.sqrt();
        let mut next = state.clone();
        for i in 0..n {
            let lookup = |name: &str| -> Option<f64> {
                if let Some(v) = model.state().iter().position(|s| s == name) {
                    return Some(state[v * n + i]);
                }
                if model.inputs().iter().any(|s| s == name) {
                    return Some(coupling_in[i]);
                }
                param_of(name)
            };
            for v in 0..n_svar {
                let f = model.drift()[v].eval(&lookup)?;
                let g = model.diffusion()[v].eval(&lookup)?;
                next[v * n + i] =
                    state[v * n + i] + self.dt * f + sqrt_dt * g * noise[v * n + i];
            }
        }
        state.copy_from(&next);
        Ok(())
    }

    /// Advance one step, drawing the noise internally.
    pub fn step_stochastic(&self, state: &mut DVector<f64>, rng: &mut impl Rng) -> Result<()> {
        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| NeurogenError::configuration(format!("noise distribution: {}", e)))?;
        let noise = DVector::from_fn(state.len(), |_, _| normal.sample(rng));
        self.step(state, &noise)
    }
}
