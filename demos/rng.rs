//! Fill a large buffer from the compiled counter-based generator and
//! print summary statistics.
//!
//! Run with `cargo run --example rng`.

use neurogen::prelude::*;

fn main() -> Result<(), NeurogenError> {
    let spec = Spec::default();
    let compiler = Compiler::new()?;
    let mut rng = CounterRng::<f32>::build(&compiler, &spec, 2026)?;

    let n = 1 << 20;
    let mut values = vec![0.0f32; n];
    rng.fill(&mut values);

    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n as f64;
    let var = values
        .iter()
        .map(|v| {
            let d = *v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n as f64;

    println!("algorithm: {}", rng.algorithm());
    println!("n = {}", n);
    println!("mean = {:+.6}", mean);
    println!("std  = {:.6}", var.sqrt());
    Ok(())
}
