//! Toolchain invocation and artifact caching.
//!
//! [`Compiler`] turns generated source into a loaded dynamic module by
//! shelling out to the system C toolchain. Artifacts are content
//! addressed: the cache key hashes the source text, the flag set and the
//! target architecture, and at most one toolchain invocation happens per
//! distinct key, even under concurrent callers. A failed compile is
//! cached too; retrying identical input reproduces the identical
//! diagnostic without re-running the toolchain.

use std::collections::hash_map::DefaultHasher;
use std::env;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use libloading::Library;
use rand::Rng;
use rand_distr::Alphanumeric;

use crate::error::{NeurogenError, Result};

/// A loaded, immutable compilation artifact. Shared by every caller
/// whose source hashed to the same key; dropping the last handle unloads
/// the library.
#[derive(Debug)]
pub struct Artifact {
    name: String,
    key: u64,
    path: PathBuf,
    library: Library,
    asm: Option<String>,
}

impl Artifact {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Content hash the artifact is cached under.
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Assembly listing, retained when the compiler was built with
    /// [`Compiler::gen_asm`].
    pub fn asm(&self) -> Option<&str> {
        self.asm.as_deref()
    }

    pub(crate) fn library(&self) -> &Library {
        &self.library
    }
}

/// Shared handle to a loaded artifact.
pub type Module = Arc<Artifact>;

type CompileOutcome = std::result::Result<Module, String>;

/// Compiler service with a process-scoped artifact cache.
pub struct Compiler {
    cc: String,
    workdir: PathBuf,
    flags: Vec<String>,
    gen_asm: bool,
    cache: DashMap<u64, Arc<OnceLock<CompileOutcome>>>,
    invocations: AtomicUsize,
}

impl Compiler {
    /// Probe the toolchain and use a per-process scratch directory under
    /// the system temp dir.
    pub fn new() -> Result<Self> {
        Self::with_workdir(env::temp_dir().join("neurogen"))
    }

    pub fn with_workdir(workdir: PathBuf) -> Result<Self> {
        let cc = find_cc()?;
        fs::create_dir_all(&workdir)?;
        Ok(Compiler {
            cc,
            workdir,
            flags: default_flags(),
            gen_asm: false,
            cache: DashMap::new(),
            invocations: AtomicUsize::new(0),
        })
    }

    /// Retain the assembly listing of every subsequent compilation.
    /// Inspection only; kernel behavior is unaffected.
    pub fn gen_asm(mut self, enabled: bool) -> Self {
        self.gen_asm = enabled;
        self
    }

    /// Number of actual toolchain invocations so far (cache misses).
    pub fn toolchain_invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Compile `source` into a loaded module, or return the cached
    /// module for identical source.
    pub fn compile(&self, name: &str, source: &str) -> Result<Module> {
        let key = self.cache_key(source);
        let cell = self.cache.entry(key).or_default().clone();
        // get_or_init blocks concurrent callers of the same key until the
        // first invocation completes; other keys proceed independently.
        let outcome = cell.get_or_init(|| self.invoke(name, source, key));
        match outcome {
            Ok(module) => Ok(Arc::clone(module)),
            Err(diagnostic) => Err(NeurogenError::Compilation {
                diagnostic: diagnostic.clone(),
            }),
        }
    }

    fn cache_key(&self, source: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        self.flags.hash(&mut hasher);
        env::consts::ARCH.hash(&mut hasher);
        hasher.finish()
    }

    fn invoke(&self, name: &str, source: &str, key: u64) -> CompileOutcome {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        let stem = self.workdir.join(format!("{}_{:016x}", name, key));
        let out_path = stem.with_extension(dylib_extension());

        // Scratch names are unique per invocation so concurrent builds of
        // the same content never read a half-written file; only the
        // finished object is renamed to its content-addressed path.
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(5)
            .map(char::from)
            .collect();
        let src_path = stem.with_extension(format!("{}.c", suffix));
        let tmp_path = stem.with_extension(format!("{}.{}", suffix, dylib_extension()));
        fs::write(&src_path, source).map_err(|e| format!("writing {:?}: {}", src_path, e))?;

        let output = Command::new(&self.cc)
            .args(&self.flags)
            .arg(&src_path)
            .arg("-o")
            .arg(&tmp_path)
            .arg("-lm")
            .output()
            .map_err(|e| format!("invoking '{}': {}", self.cc, e))?;
        if !output.status.success() {
            // Diagnostic text is surfaced verbatim.
            return Err(String::from_utf8_lossy(&output.stderr).into_owned());
        }
        fs::rename(&tmp_path, &out_path).map_err(|e| format!("publishing artifact: {}", e))?;

        let asm = if self.gen_asm {
            self.emit_asm(&src_path, &stem)
        } else {
            None
        };

        let library = unsafe { Library::new(&out_path) }
            .map_err(|e| format!("loading compiled artifact {:?}: {}", out_path, e))?;

        Ok(Arc::new(Artifact {
            name: name.to_string(),
            key,
            path: out_path,
            library,
            asm,
        }))
    }

    fn emit_asm(&self, src_path: &PathBuf, stem: &PathBuf) -> Option<String> {
        let asm_path = stem.with_extension("s");
        let flags = self
            .flags
            .iter()
            .filter(|f| f.as_str() != "-shared" && f.as_str() != "-fPIC");
        let output = Command::new(&self.cc)
            .args(flags)
            .arg("-S")
            .arg(src_path)
            .arg("-o")
            .arg(&asm_path)
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        fs::read_to_string(&asm_path).ok()
    }
}

fn default_flags() -> Vec<String> {
    let mut flags: Vec<String> = ["-std=c11", "-O3", "-fopenmp-simd", "-fPIC", "-shared"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    // Host-tuned codegen where the driver reliably supports it.
    if cfg!(target_arch = "x86_64") {
        flags.push("-march=native".to_string());
    }
    flags
}

fn dylib_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Finds a working C compiler, checking `$CC` first and falling back to
/// the common driver names.
fn find_cc() -> Result<String> {
    let mut candidates: Vec<String> = Vec::new();
    if let Ok(cc) = env::var("CC") {
        if !cc.is_empty() {
            candidates.push(cc);
        }
    }
    candidates.extend(["cc", "gcc", "clang"].iter().map(|s| s.to_string()));

    for candidate in &candidates {
        if let Ok(output) = Command::new(candidate).arg("--version").output() {
            if output.status.success() {
                return Ok(candidate.clone());
            }
        }
    }
    Err(NeurogenError::configuration(format!(
        "no C toolchain found (tried {})",
        candidates.join(", ")
    )))
}
