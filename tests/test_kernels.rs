//! End-to-end kernel behavior: generate, compile, bind, invoke.
//! Skipped (with a note) when the host has no C toolchain.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::DVector;
use ndarray::Array2;
use neurogen::codegen::{CouplingKernelGenerator, ModelKernelGenerator, NetworkKernelGenerator};
use neurogen::compiler::Compiler;
use neurogen::coupling;
use neurogen::expr::{sym, Expr};
use neurogen::kernel::{CouplingKernel, ModelKernel, NetworkKernel};
use neurogen::model::{library, Model};
use neurogen::network::DenseNetwork;
use neurogen::scheme::ReferenceStepper;
use neurogen::spec::Spec;

fn compiler() -> Option<Compiler> {
    match Compiler::with_workdir(std::env::temp_dir().join("neurogen_tests")) {
        Ok(c) => Some(c),
        Err(_) => {
            eprintln!("skipping: no C toolchain available");
            None
        }
    }
}

fn build_model_kernel(
    compiler: &Compiler,
    model: &Model,
    spec: &Spec,
) -> (ModelKernel<f32>, String) {
    let gen = ModelKernelGenerator::new(model);
    let source = gen.generate(spec).unwrap();
    let module = compiler.compile(model.name(), &source).unwrap();
    let kernel = ModelKernel::<f32>::bind(&module, &gen.kernel_name()).unwrap();
    (kernel, gen.kernel_name())
}

#[test]
fn identity_model_round_trip() {
    let Some(compiler) = compiler() else { return };
    let spec = Spec::default();
    let model = Model::builder("identity")
        .state("x")
        .drift(Expr::Const(0.0))
        .diffusion(Expr::Const(0.0))
        .observable("x", sym("x"))
        .build()
        .unwrap();
    let (kernel, _) = build_model_kernel(&compiler, &model, &spec);

    let n = 1024;
    let mut arrays = model.prep_arrays::<f32>(n, &spec).unwrap();
    for (i, v) in arrays.state.iter_mut().enumerate() {
        *v = i as f32 * 0.5;
    }
    arrays.drift.fill(7.0);
    arrays.diffusion.fill(7.0);

    kernel.call(&mut arrays).unwrap();

    for (i, v) in arrays.state.iter().enumerate() {
        assert_eq!(*v, i as f32 * 0.5);
    }
    assert!(arrays.drift.iter().all(|v| *v == 0.0));
    assert!(arrays.diffusion.iter().all(|v| *v == 0.0));
    // observable mirrors the state
    for (o, s) in arrays.obs.iter().zip(arrays.state.iter()) {
        assert_eq!(o, s);
    }
}

#[test]
fn linear_model_kernel_matches_expression() {
    let Some(compiler) = compiler() else { return };
    let spec = Spec::default();
    let model = library::linear();
    let (kernel, _) = build_model_kernel(&compiler, &model, &spec);

    // deliberately not a multiple of the vector width
    let n = 1000;
    let mut arrays = model.prep_arrays::<f32>(n, &spec).unwrap();
    for i in 0..n {
        arrays.state[i] = (i as f32).sin();
        arrays.input[i] = 0.25;
    }
    kernel.call(&mut arrays).unwrap();

    let lambda = -1.0f32;
    for i in 0..n {
        let expected = lambda * arrays.state[i] + 0.25;
        assert_relative_eq!(arrays.drift[i], expected, max_relative = 1e-6, epsilon = 1e-6);
        assert_abs_diff_eq!(arrays.diffusion[i], 1e-3, epsilon = 1e-9);
    }
}

#[test]
fn jansen_rit_kernel_runs() {
    let Some(compiler) = compiler() else { return };
    let spec = Spec::default();
    let model = library::jansen_rit();
    let (kernel, _) = build_model_kernel(&compiler, &model, &spec);

    let n = 64;
    let mut arrays = model.prep_arrays::<f32>(n, &spec).unwrap();
    kernel.call(&mut arrays).unwrap();
    assert!(arrays.drift.iter().all(|v| v.is_finite()));
    assert!(arrays.obs.iter().all(|v| v.is_finite()));
}

#[test]
fn coupling_kernels_evaluate_pre_and_post() {
    let Some(compiler) = compiler() else { return };
    let spec = Spec::default();
    let cfun = coupling::linear(0.5);
    let gen = CouplingKernelGenerator::new(&cfun);
    let source = gen.generate(&spec).unwrap();
    let module = compiler.compile(cfun.name(), &source).unwrap();
    let kernel = CouplingKernel::<f32>::bind(
        &module,
        &gen.kernel_name_pre_sum(),
        &gen.kernel_name_post_sum(),
    )
    .unwrap();

    // linear coupling: pre = x_j, post = a acc
    assert_relative_eq!(kernel.pre_sum(9.0, 3.0, 2.0), 6.0, max_relative = 1e-6);
    assert_relative_eq!(kernel.post_sum(4.0), 2.0, max_relative = 1e-6);
}

#[test]
fn kuramoto_coupling_kernel_matches_descriptor() {
    let Some(compiler) = compiler() else { return };
    let spec = Spec::default();
    let cfun = coupling::kuramoto(1.0);
    let gen = CouplingKernelGenerator::new(&cfun);
    let source = gen.generate(&spec).unwrap();
    let module = compiler.compile(cfun.name(), &source).unwrap();
    let kernel = CouplingKernel::<f32>::bind(
        &module,
        &gen.kernel_name_pre_sum(),
        &gen.kernel_name_post_sum(),
    )
    .unwrap();

    let (x_i, x_j, w) = (0.3f32, 1.1f32, 0.7f32);
    assert_relative_eq!(
        kernel.pre_sum(x_i, x_j, w),
        w * (x_j - x_i).sin(),
        max_relative = 1e-5
    );
}

#[test]
fn zero_weight_coupling_is_a_no_op() {
    let Some(compiler) = compiler() else { return };
    let spec = Spec::default();
    let model = library::linear();
    let net = DenseNetwork::new(model.clone(), coupling::linear(0.1), Array2::zeros((2, 2)))
        .unwrap();

    let net_gen = NetworkKernelGenerator::new(&net);
    let net_src = net_gen.generate(&spec).unwrap();
    let net_module = compiler.compile("linear_net", &net_src).unwrap();
    let step = NetworkKernel::<f32>::bind(&net_module, &net_gen.kernel_name()).unwrap();

    let dt = 0.0625f32;
    let mut arrays = net.model().prep_arrays::<f32>(2, &spec).unwrap();
    arrays.state[0] = 1.0;
    arrays.state[1] = 2.0;
    let weights = net.prep_weights::<f32>(&spec).unwrap();
    step.step(&mut arrays, &weights, dt).unwrap();

    // what a single-node (uncoupled) kernel run plus an Euler advance
    // would produce
    let (kernel, _) = build_model_kernel(&compiler, &model, &spec);
    let mut single = model.prep_arrays::<f32>(2, &spec).unwrap();
    single.state[0] = 1.0;
    single.state[1] = 2.0;
    kernel.call(&mut single).unwrap();

    for i in 0..2 {
        let expected = single.state[i] + dt * single.drift[i];
        assert_relative_eq!(arrays.state[i], expected, max_relative = 1e-6);
    }
}

#[test]
fn network_step_matches_reference_stepper() {
    let Some(compiler) = compiler() else { return };
    let spec = Spec::default();
    let mut w = Array2::zeros((3, 3));
    w[[0, 1]] = 1.0;
    w[[1, 0]] = 2.0;
    w[[2, 0]] = 0.5;
    w[[1, 2]] = 0.25;
    let net = DenseNetwork::new(library::linear(), coupling::diff(0.5), w).unwrap();

    let gen = NetworkKernelGenerator::new(&net);
    let source = gen.generate(&spec).unwrap();
    let module = compiler.compile("linear_diff_net", &source).unwrap();
    let step = NetworkKernel::<f32>::bind(&module, &gen.kernel_name()).unwrap();

    let dt = 0.01f32;
    let init = [0.9f32, -0.4, 0.2];
    let mut arrays = net.model().prep_arrays::<f32>(3, &spec).unwrap();
    arrays.state.copy_from_slice(&init);
    let weights = net.prep_weights::<f32>(&spec).unwrap();
    step.step(&mut arrays, &weights, dt).unwrap();

    let stepper = ReferenceStepper::new(&net, dt as f64);
    let mut state = DVector::from_iterator(3, init.iter().map(|v| *v as f64));
    let noise = DVector::zeros(3);
    stepper.step(&mut state, &noise).unwrap();

    for i in 0..3 {
        assert_relative_eq!(
            arrays.state[i] as f64,
            state[i],
            max_relative = 1e-5,
            epsilon = 1e-6
        );
    }
}
