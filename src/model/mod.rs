//! Symbolic model descriptors.
//!
//! A [`Model`] holds the state variables, parameters, coupling inputs and
//! drift/diffusion/observable expressions of a (possibly stochastic) ODE
//! system. Descriptors are validated once at construction through
//! [`ModelBuilder`] and immutable afterwards; everything downstream
//! (differentiation, buffer preparation, code generation) reads them.

pub mod library;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{NeurogenError, Result};
use crate::expr::Expr;
use crate::spec::{AlignedVec, Real, Spec};

/// A named parameter with its default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: f64,
}

impl Param {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Param {
            name: name.into(),
            value,
        }
    }
}

/// Immutable descriptor of a neural-mass model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    name: String,
    state: Vec<String>,
    params: Vec<Param>,
    inputs: Vec<String>,
    drift: Vec<Expr>,
    diffusion: Vec<Expr>,
    observables: Vec<(String, Expr)>,
}

/// Builder collecting the pieces of a [`Model`]; all invariants are
/// checked in [`ModelBuilder::build`].
#[derive(Debug, Default)]
pub struct ModelBuilder {
    name: String,
    state: Vec<String>,
    params: Vec<Param>,
    inputs: Vec<String>,
    drift: Vec<Expr>,
    diffusion: Vec<Expr>,
    observables: Vec<(String, Expr)>,
}

impl ModelBuilder {
    pub fn state(mut self, name: impl Into<String>) -> Self {
        self.state.push(name.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.push(Param::new(name, value));
        self
    }

    /// Declare a coupling input symbol. Network kernels feed the
    /// aggregated coupling value through it.
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    /// Append the drift expression for the next state variable, in
    /// declaration order.
    pub fn drift(mut self, expr: Expr) -> Self {
        self.drift.push(expr);
        self
    }

    /// Append the diffusion (noise scale) expression for the next state
    /// variable, in declaration order.
    pub fn diffusion(mut self, expr: Expr) -> Self {
        self.diffusion.push(expr);
        self
    }

    pub fn observable(mut self, name: impl Into<String>, expr: Expr) -> Self {
        self.observables.push((name.into(), expr));
        self
    }

    pub fn build(self) -> Result<Model> {
        if self.state.is_empty() {
            return Err(NeurogenError::codegen(format!(
                "model '{}' declares no state variables",
                self.name
            )));
        }
        if self.drift.len() != self.state.len() {
            return Err(NeurogenError::codegen(format!(
                "model '{}' has {} drift expressions for {} state variables",
                self.name,
                self.drift.len(),
                self.state.len()
            )));
        }
        if self.diffusion.len() != self.state.len() {
            return Err(NeurogenError::codegen(format!(
                "model '{}' has {} diffusion expressions for {} state variables",
                self.name,
                self.diffusion.len(),
                self.state.len()
            )));
        }

        let mut seen = BTreeSet::new();
        for name in self
            .state
            .iter()
            .chain(self.params.iter().map(|p| &p.name))
            .chain(self.inputs.iter())
        {
            if !seen.insert(name.as_str()) {
                return Err(NeurogenError::codegen(format!(
                    "model '{}' declares '{}' more than once",
                    self.name, name
                )));
            }
        }

        let model = Model {
            name: self.name,
            state: self.state,
            params: self.params,
            inputs: self.inputs,
            drift: self.drift,
            diffusion: self.diffusion,
            observables: self.observables,
        };

        for (i, expr) in model.drift.iter().enumerate() {
            model.check_vocabulary(expr, &format!("drift of '{}'", model.state[i]))?;
        }
        for (i, expr) in model.diffusion.iter().enumerate() {
            model.check_vocabulary(expr, &format!("diffusion of '{}'", model.state[i]))?;
        }
        for (name, expr) in &model.observables {
            model.check_vocabulary(expr, &format!("observable '{}'", name))?;
        }

        Ok(model)
    }
}

impl Model {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a descriptor from its JSON form, running the same
    /// validation as [`ModelBuilder::build`].
    pub fn from_json(json: &str) -> Result<Model> {
        let raw: Model = serde_json::from_str(json)?;
        let mut builder = Model::builder(raw.name);
        for s in raw.state {
            builder = builder.state(s);
        }
        for p in raw.params {
            builder = builder.param(p.name, p.value);
        }
        for i in raw.inputs {
            builder = builder.input(i);
        }
        for d in raw.drift {
            builder = builder.drift(d);
        }
        for d in raw.diffusion {
            builder = builder.diffusion(d);
        }
        for (n, e) in raw.observables {
            builder = builder.observable(n, e);
        }
        builder.build()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &[String] {
        &self.state
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn drift(&self) -> &[Expr] {
        &self.drift
    }

    pub fn diffusion(&self) -> &[Expr] {
        &self.diffusion
    }

    pub fn observables(&self) -> &[(String, Expr)] {
        &self.observables
    }

    pub fn n_svar(&self) -> usize {
        self.state.len()
    }

    pub fn n_param(&self) -> usize {
        self.params.len()
    }

    pub fn n_input(&self) -> usize {
        self.inputs.len()
    }

    pub fn n_obs(&self) -> usize {
        self.observables.len()
    }

    pub fn default_param_values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value).collect()
    }

    /// Symbols a model expression may reference: state, parameters and
    /// coupling inputs.
    fn vocabulary(&self) -> BTreeSet<String> {
        let mut vocab: BTreeSet<String> = self.state.iter().cloned().collect();
        vocab.extend(self.params.iter().map(|p| p.name.clone()));
        vocab.extend(self.inputs.iter().cloned());
        vocab
    }

    /// Vocabulary extended with the scheme-reserved step symbol `dt` and
    /// the derived next-state symbols `<state>_next`, as produced by the
    /// log-density construction.
    fn scheme_vocabulary(&self) -> BTreeSet<String> {
        let mut vocab = self.vocabulary();
        vocab.insert("dt".to_string());
        vocab.extend(self.state.iter().map(|s| format!("{}_next", s)));
        vocab
    }

    fn check_against(
        &self,
        expr: &Expr,
        vocab: &BTreeSet<String>,
        context: &str,
    ) -> Result<()> {
        for name in expr.free_symbols() {
            if !vocab.contains(&name) {
                return Err(NeurogenError::undefined_symbol(
                    name,
                    format!("{} (model '{}')", context, self.name),
                ));
            }
        }
        Ok(())
    }

    fn check_vocabulary(&self, expr: &Expr, context: &str) -> Result<()> {
        self.check_against(expr, &self.vocabulary(), context)
    }

    /// Exact analytic partials of `expr` with respect to every state
    /// variable, in state order.
    pub fn partial(&self, expr: &Expr) -> Result<Vec<Expr>> {
        self.check_against(expr, &self.scheme_vocabulary(), "partial")?;
        Ok(self.state.iter().map(|s| expr.diff(s)).collect())
    }

    /// Allocate the aligned buffer bundle a generated kernel expects for
    /// `n_node` nodes. Parameter buffers are pre-filled with the model's
    /// default values, everything else is zeroed.
    pub fn prep_arrays<T: Real>(&self, n_node: usize, spec: &Spec) -> Result<KernelArrays<T>> {
        if T::KIND != spec.real() {
            return Err(NeurogenError::configuration(format!(
                "buffer element type {} does not match spec real width {}",
                T::KIND.ctype(),
                spec.real().ctype()
            )));
        }
        if n_node == 0 {
            return Err(NeurogenError::configuration(
                "cannot prepare arrays for zero nodes",
            ));
        }
        let align = spec.align();
        let mut param = AlignedVec::zeroed(self.n_param() * n_node, align)?;
        for (k, p) in self.params.iter().enumerate() {
            let row = &mut param[k * n_node..(k + 1) * n_node];
            row.fill(T::from_f64(p.value));
        }
        Ok(KernelArrays {
            n_node,
            state: AlignedVec::zeroed(self.n_svar() * n_node, align)?,
            input: AlignedVec::zeroed(self.n_input() * n_node, align)?,
            param,
            drift: AlignedVec::zeroed(self.n_svar() * n_node, align)?,
            diffusion: AlignedVec::zeroed(self.n_svar() * n_node, align)?,
            obs: AlignedVec::zeroed(self.n_obs() * n_node, align)?,
            noise: AlignedVec::zeroed(self.n_svar() * n_node, align)?,
        })
    }
}

/// The flat, contiguous-per-variable buffer bundle matching the
/// generated kernel calling convention. Element `[v, i]` of a buffer
/// lives at `v * n_node + i`.
#[derive(Debug)]
pub struct KernelArrays<T> {
    pub n_node: usize,
    pub state: AlignedVec<T>,
    pub input: AlignedVec<T>,
    pub param: AlignedVec<T>,
    pub drift: AlignedVec<T>,
    pub diffusion: AlignedVec<T>,
    pub obs: AlignedVec<T>,
    /// Standard-normal draws consumed by network step kernels.
    pub noise: AlignedVec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::sym;
    use crate::spec::RealKind;

    fn decay() -> Model {
        Model::builder("decay")
            .state("x")
            .param("lambda", -1.0)
            .input("c")
            .drift(sym("lambda") * sym("x") + sym("c"))
            .diffusion(Expr::Const(0.0))
            .observable("x", sym("x"))
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_undeclared_symbol_in_drift() {
        let err = Model::builder("bad")
            .state("x")
            .drift(sym("x") * sym("nope"))
            .diffusion(Expr::Const(0.0))
            .build()
            .unwrap_err();
        match err {
            NeurogenError::UndefinedSymbol { name, .. } => assert_eq!(name, "nope"),
            other => panic!("expected UndefinedSymbol, got {:?}", other),
        }
    }

    #[test]
    fn rejects_drift_count_mismatch() {
        let err = Model::builder("bad")
            .state("x")
            .state("y")
            .drift(sym("x"))
            .diffusion(Expr::Const(0.0))
            .diffusion(Expr::Const(0.0))
            .build()
            .unwrap_err();
        assert!(matches!(err, NeurogenError::CodeGen(_)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Model::builder("bad")
            .state("x")
            .param("x", 1.0)
            .drift(sym("x"))
            .diffusion(Expr::Const(0.0))
            .build()
            .unwrap_err();
        assert!(matches!(err, NeurogenError::CodeGen(_)));
    }

    #[test]
    fn partial_is_in_state_order() {
        let model = Model::builder("planar")
            .state("x")
            .state("y")
            .param("a", 2.0)
            .drift(sym("a") * sym("y"))
            .drift(-1.0 * sym("x"))
            .diffusion(Expr::Const(0.0))
            .diffusion(Expr::Const(0.0))
            .build()
            .unwrap();
        let partials = model.partial(&(sym("x") * sym("y"))).unwrap();
        assert_eq!(partials.len(), 2);
        assert_eq!(partials[0], sym("y"));
        assert_eq!(partials[1], sym("x"));
    }

    #[test]
    fn partial_rejects_foreign_symbols() {
        let model = decay();
        assert!(model.partial(&sym("q")).is_err());
        // scheme-reserved symbols are in vocabulary
        assert!(model.partial(&(sym("x_next") - sym("x"))).is_ok());
    }

    #[test]
    fn prep_arrays_sizes_and_defaults() {
        let model = decay();
        let spec = Spec::default();
        let arrays = model.prep_arrays::<f32>(100, &spec).unwrap();
        assert_eq!(arrays.state.len(), 100);
        assert_eq!(arrays.input.len(), 100);
        assert_eq!(arrays.param.len(), 100);
        assert_eq!(arrays.obs.len(), 100);
        assert!(arrays.param.iter().all(|v| *v == -1.0));
        assert_eq!(arrays.state.as_ptr() as usize % spec.align(), 0);
    }

    #[test]
    fn prep_arrays_checks_real_width() {
        let model = decay();
        let spec = Spec::new(RealKind::F32, 8, 64).unwrap();
        assert!(model.prep_arrays::<f64>(10, &spec).is_err());
    }

    #[test]
    fn json_round_trip_preserves_descriptor() {
        let model = decay();
        let json = model.to_json().unwrap();
        let back = Model::from_json(&json).unwrap();
        assert_eq!(back.name(), "decay");
        assert_eq!(back.state(), model.state());
        assert_eq!(back.drift(), model.drift());
    }

    #[test]
    fn from_json_validates() {
        let json = r#"{
            "name": "bad",
            "state": ["x"],
            "params": [],
            "inputs": [],
            "drift": [{"Sym": "q"}],
            "diffusion": [{"Const": 0.0}],
            "observables": []
        }"#;
        assert!(matches!(
            Model::from_json(json),
            Err(NeurogenError::UndefinedSymbol { .. })
        ));
    }
}
