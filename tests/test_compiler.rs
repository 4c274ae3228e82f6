//! Toolchain, cache and binding behavior. These tests need a C compiler
//! on the host; they skip (with a note) when none is found.

use std::sync::Arc;

use neurogen::codegen::ModelKernelGenerator;
use neurogen::compiler::Compiler;
use neurogen::kernel::ModelKernel;
use neurogen::model::library;
use neurogen::spec::{RealKind, Spec};
use neurogen::NeurogenError;

fn compiler() -> Option<Compiler> {
    match Compiler::with_workdir(std::env::temp_dir().join("neurogen_tests")) {
        Ok(c) => Some(c),
        Err(_) => {
            eprintln!("skipping: no C toolchain available");
            None
        }
    }
}

#[test]
fn identical_source_compiles_once() {
    let Some(compiler) = compiler() else { return };
    let model = library::linear();
    let gen = ModelKernelGenerator::new(&model);
    let source = gen.generate(&Spec::default()).unwrap();

    let first = compiler.compile(model.name(), &source).unwrap();
    let second = compiler.compile(model.name(), &source).unwrap();
    assert_eq!(compiler.toolchain_invocations(), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn different_vector_width_is_a_different_artifact() {
    let Some(compiler) = compiler() else { return };
    let model = library::linear();
    let gen = ModelKernelGenerator::new(&model);

    let wide = gen.generate(&Spec::new(RealKind::F32, 8, 64).unwrap()).unwrap();
    let narrow = gen.generate(&Spec::new(RealKind::F32, 4, 64).unwrap()).unwrap();
    let a = compiler.compile(model.name(), &wide).unwrap();
    let b = compiler.compile(model.name(), &narrow).unwrap();
    assert_eq!(compiler.toolchain_invocations(), 2);
    assert_ne!(a.key(), b.key());
}

#[test]
fn concurrent_compilation_of_one_key_invokes_toolchain_once() {
    let Some(compiler) = compiler() else { return };
    let model = library::oscillator2d();
    let gen = ModelKernelGenerator::new(&model);
    let source = gen.generate(&Spec::default()).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                compiler.compile(model.name(), &source).unwrap();
            });
        }
    });
    assert_eq!(compiler.toolchain_invocations(), 1);
}

#[test]
fn toolchain_diagnostics_are_preserved() {
    let Some(compiler) = compiler() else { return };
    let err = compiler
        .compile("broken", "void broken(void) { return 1 }\n")
        .unwrap_err();
    match err {
        NeurogenError::Compilation { diagnostic } => {
            assert!(!diagnostic.is_empty());
            assert!(diagnostic.contains("error"));
        }
        other => panic!("expected Compilation, got {:?}", other),
    }
}

#[test]
fn failed_compiles_are_cached_too() {
    let Some(compiler) = compiler() else { return };
    let bad = "void broken(void) { return 1 }\n";
    let first = compiler.compile("broken", bad).unwrap_err();
    let second = compiler.compile("broken", bad).unwrap_err();
    assert_eq!(compiler.toolchain_invocations(), 1);
    assert_eq!(first.to_string(), second.to_string());
}

#[test]
fn asm_retention_is_optional_inspection() {
    let Some(compiler) = compiler() else { return };
    let compiler = compiler.gen_asm(true);
    let model = library::linear();
    let gen = ModelKernelGenerator::new(&model);
    let source = gen.generate(&Spec::default()).unwrap();

    let module = compiler.compile(model.name(), &source).unwrap();
    let asm = module.asm().expect("assembly listing retained");
    assert!(asm.contains("linear_kernel"));
}

#[test]
fn binding_missing_symbol_fails() {
    let Some(compiler) = compiler() else { return };
    let model = library::linear();
    let gen = ModelKernelGenerator::new(&model);
    let source = gen.generate(&Spec::default()).unwrap();
    let module = compiler.compile(model.name(), &source).unwrap();

    let err = ModelKernel::<f32>::bind(&module, "no_such_kernel").unwrap_err();
    assert!(matches!(err, NeurogenError::SymbolNotFound(_)));
}

#[test]
fn binding_with_wrong_width_fails_signature_check() {
    let Some(compiler) = compiler() else { return };
    let model = library::linear();
    let gen = ModelKernelGenerator::new(&model);
    let source = gen.generate(&Spec::default()).unwrap();
    let module = compiler.compile(model.name(), &source).unwrap();

    // module was generated for f32; an f64 binding must be rejected
    let err = ModelKernel::<f64>::bind(&module, &gen.kernel_name()).unwrap_err();
    assert!(matches!(err, NeurogenError::SignatureMismatch { .. }));
}
