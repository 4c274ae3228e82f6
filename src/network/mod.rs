//! Dense network descriptors.

use ndarray::Array2;

use crate::coupling::Coupling;
use crate::error::{NeurogenError, Result};
use crate::model::Model;
use crate::spec::{AlignedVec, Real, Spec};

/// A model, a coupling function and a dense weight matrix.
///
/// `weights[[i, j]]` is the weight of the edge from source node `j` into
/// destination node `i`.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    model: Model,
    coupling: Coupling,
    weights: Array2<f64>,
}

impl DenseNetwork {
    pub fn new(model: Model, coupling: Coupling, weights: Array2<f64>) -> Result<Self> {
        if weights.nrows() != weights.ncols() {
            return Err(NeurogenError::codegen(format!(
                "weight matrix must be square, got {}x{}",
                weights.nrows(),
                weights.ncols()
            )));
        }
        if weights.nrows() == 0 {
            return Err(NeurogenError::codegen("network has no nodes"));
        }
        if coupling.cvar() >= model.n_svar() {
            return Err(NeurogenError::codegen(format!(
                "coupling '{}' reads state variable {} but model '{}' has only {}",
                coupling.name(),
                coupling.cvar(),
                model.name(),
                model.n_svar()
            )));
        }
        if model.n_input() == 0 {
            return Err(NeurogenError::codegen(format!(
                "model '{}' declares no coupling input",
                model.name()
            )));
        }
        Ok(DenseNetwork {
            model,
            coupling,
            weights,
        })
    }

    pub fn n_node(&self) -> usize {
        self.weights.nrows()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn coupling(&self) -> &Coupling {
        &self.coupling
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    /// Flatten the weight matrix into an aligned row-major buffer
    /// (`weights[i * n_node + j]`) in the spec's element type, ready to
    /// pass to the generated step kernel.
    pub fn prep_weights<T: Real>(&self, spec: &Spec) -> Result<AlignedVec<T>> {
        if T::KIND != spec.real() {
            return Err(NeurogenError::configuration(format!(
                "weight element type {} does not match spec real width {}",
                T::KIND.ctype(),
                spec.real().ctype()
            )));
        }
        let n = self.n_node();
        let mut buf = AlignedVec::zeroed(n * n, spec.align())?;
        for i in 0..n {
            for j in 0..n {
                buf[i * n + j] = T::from_f64(self.weights[[i, j]]);
            }
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling;
    use crate::model::library;
    use crate::spec::Spec;

    #[test]
    fn rejects_non_square_weights() {
        let err = DenseNetwork::new(
            library::linear(),
            coupling::linear(0.1),
            Array2::zeros((2, 3)),
        )
        .unwrap_err();
        assert!(matches!(err, NeurogenError::CodeGen(_)));
    }

    #[test]
    fn rejects_out_of_range_cvar() {
        let cfun = Coupling::new(
            "high",
            crate::expr::sym(coupling::PRE_SRC),
            crate::expr::sym(coupling::ACC),
            vec![],
            3,
        )
        .unwrap();
        let err =
            DenseNetwork::new(library::linear(), cfun, Array2::zeros((2, 2))).unwrap_err();
        assert!(matches!(err, NeurogenError::CodeGen(_)));
    }

    #[test]
    fn prep_weights_flattens_row_major() {
        let mut w = Array2::zeros((2, 2));
        w[[0, 1]] = 0.5;
        w[[1, 0]] = 0.25;
        let net = DenseNetwork::new(library::linear(), coupling::linear(1.0), w).unwrap();
        let buf = net.prep_weights::<f32>(&Spec::default()).unwrap();
        assert_eq!(&buf[..], &[0.0, 0.5, 0.25, 0.0]);
    }
}
