// ABOUTME: Error taxonomy for the call-graph engine: fatal vs. recoverable per the design's
// ABOUTME: error-handling chapter. Recoverable variants are logged and swallowed by the stage that raises them.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodeGraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid or missing configuration. Fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source file failed to parse. Recovered: the file contributes zero entities.
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// A symbol's declaration could not be reached (import cycle exhausted, missing module, …).
    /// Recovered: the call site stays unresolved and flows to the next stage.
    #[error("Symbol resolution error: {0}")]
    SymbolResolution(String),

    /// A function's recorded range disagrees with what the AST reports for its name token.
    /// Recovered: falls back to the tolerant range-matching policy in the registry.
    #[error("Function range mismatch in {file} at {line}:{column}: {message}")]
    RangeMismatch {
        file: String,
        line: u32,
        column: u32,
        message: String,
    },

    /// Cycle detected while walking an `extends`/`implements` chain. Recovered: broken at
    /// first revisit, analysis continues with the partial chain.
    #[error("Type graph cycle detected starting at {0}")]
    TypeGraphCycle(String),

    /// Persistence failure. Fatal to the current snapshot: the transaction is aborted.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Schema migration failed. Fatal; surfaced to the operator.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A loaded snapshot references a function id that does not exist in that snapshot.
    /// Fatal for the affected query.
    #[error("Integrity error: dangling reference {0}")]
    Integrity(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl CodeGraphError {
    /// Recoverable errors are caught by the stage that raised them and folded into the
    /// run's `unresolved`/`skipped` counters; the pipeline keeps going. Everything else
    /// aborts the snapshot.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CodeGraphError::Parse { .. }
                | CodeGraphError::SymbolResolution(_)
                | CodeGraphError::RangeMismatch { .. }
                | CodeGraphError::TypeGraphCycle(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CodeGraphError>;
