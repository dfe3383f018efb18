//! Symbolic core for the sigcomp signal engine
//!
//! Expression trees for time-domain signals and transfer functions, plus
//! the machinery the transform engine is built on:
//! - Compact coefficient representation (rational + float fallback)
//! - A fixed symbol table for the signals vocabulary
//! - Staged normalization pipeline
//! - Bytecode compilation for real and complex sampling
//! - Dense polynomials with root finding

mod coeff;
mod compiler;
mod expr;
mod normalize;
mod poly;
mod symbol;

pub use coeff::Coefficient;
pub use compiler::{
    compile, compile_with_vars, BytecodeCompiler, BytecodeOp, CompiledExpr, Scalar,
};
pub use expr::{Constant, Indexing, SymExpr, SymExprKind, DIRAC_DELTA, HEAVISIDE};
pub use normalize::{NormPass, StagedNormalizer};
pub use poly::Polynomial;
pub use symbol::{Function, SignalRole, Symbol, SymbolEntry, SymbolTable};

/// Error type for symbolic operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum SymbolicError {
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("root finding failed: {0}")]
    RootFinding(String),
}

pub type Result<T> = std::result::Result<T, SymbolicError>;
