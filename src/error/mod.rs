use thiserror::Error;

/// Errors raised by descriptor validation, code generation, compilation
/// and kernel binding.
#[derive(Debug, Error)]
pub enum NeurogenError {
    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Invalid spec or buffer configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),

    // ─────────────────────────────────────────────────────────────────────────
    // Descriptor Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Expression references a symbol outside the declared vocabulary
    #[error("undefined symbol '{name}' in {context}")]
    UndefinedSymbol { name: String, context: String },

    /// Descriptor cannot be lowered to kernel source
    #[error("code generation failed: {0}")]
    CodeGen(String),

    /// Failed to parse a descriptor definition
    #[error("failed to parse descriptor: {0}")]
    Parse(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────────────────
    // Toolchain Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Toolchain failure; the diagnostic text is preserved verbatim
    #[error("compilation failed:\n{diagnostic}")]
    Compilation { diagnostic: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────────────────
    // Binding Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Entry point absent from the loaded module
    #[error("symbol '{0}' not found in compiled module")]
    SymbolNotFound(String),

    /// Entry point present but its calling convention does not match
    #[error("kernel '{name}' signature mismatch: expected '{expected}', found '{found}'")]
    SignatureMismatch {
        name: String,
        expected: String,
        found: String,
    },
}

impl NeurogenError {
    /// Create an undefined symbol error
    pub fn undefined_symbol(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UndefinedSymbol {
            name: name.into(),
            context: context.into(),
        }
    }

    /// Create a code generation error
    pub fn codegen(message: impl Into<String>) -> Self {
        Self::CodeGen(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, NeurogenError>;
