//! Generate, compile and step a small coupled oscillator network.
//!
//! Run with `cargo run --example oscillator`.

use ndarray::Array2;
use neurogen::prelude::*;
use neurogen::codegen::RngKernelGenerator;
use neurogen::model::library;
use neurogen::network::DenseNetwork;
use neurogen::{coupling, CounterRng, NetworkKernel};

fn main() -> Result<(), NeurogenError> {
    let spec = Spec::default();
    let compiler = Compiler::new()?;

    let n = 64;
    let mut weights = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            if i != j {
                weights[[i, j]] = 1.0 / (n as f64 - 1.0);
            }
        }
    }
    let net = DenseNetwork::new(library::oscillator2d(), coupling::diff(0.01), weights)?;

    let gen = NetworkKernelGenerator::new(&net);
    let source = gen.generate(&spec)?;
    println!("generated {} bytes of kernel source", source.len());

    let module = compiler.compile("oscillator_net", &source)?;
    let step = NetworkKernel::<f32>::bind(&module, &gen.kernel_name())?;

    let mut arrays = net.model().prep_arrays::<f32>(n, &spec)?;
    for (i, v) in arrays.state.iter_mut().enumerate() {
        *v = (i as f32 * 0.37).sin() * 0.1;
    }
    let weights = net.prep_weights::<f32>(&spec)?;

    let mut rng = CounterRng::<f32>::build(&compiler, &spec, 0xFEED)?;
    println!("noise source: {}", RngKernelGenerator::ALGORITHM);

    let dt = 0.05f32;
    for step_idx in 0..200 {
        rng.fill(&mut arrays.noise);
        step.step(&mut arrays, &weights, dt)?;
        if step_idx % 50 == 0 {
            let v_mean =
                arrays.state[..n].iter().sum::<f32>() / n as f32;
            println!("step {:4}: mean V = {:+.5}", step_idx, v_mean);
        }
    }
    Ok(())
}
