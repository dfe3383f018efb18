use sigcomp_parser::ParseError;
use sigcomp_symbolic::SymbolicError;

/// Failure of one engine operation. Both kinds carry the offending input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Malformed or unsupported input text
    #[error("invalid input '{input}': {message}")]
    Input { message: String, input: String },

    /// The symbolic or numeric computation could not proceed
    #[error("cannot compute result for '{input}': {message}")]
    Computation { message: String, input: String },
}

impl EngineError {
    pub fn input(message: impl Into<String>, input: &str) -> Self {
        EngineError::Input {
            message: message.into(),
            input: input.to_string(),
        }
    }

    pub fn computation(message: impl Into<String>, input: &str) -> Self {
        EngineError::Computation {
            message: message.into(),
            input: input.to_string(),
        }
    }

    pub fn from_parse(err: ParseError, input: &str) -> Self {
        Self::input(err.to_string(), input)
    }

    /// True for errors a caller should report as bad input rather than as
    /// an internal failure
    pub fn is_input_error(&self) -> bool {
        matches!(self, EngineError::Input { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            EngineError::Input { message, .. } | EngineError::Computation { message, .. } => {
                message
            }
        }
    }

    pub fn input_text(&self) -> &str {
        match self {
            EngineError::Input { input, .. } | EngineError::Computation { input, .. } => input,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error raised inside an algorithm, before the operation attaches the
/// input text
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Fault {
    Input(String),
    Computation(String),
}

impl Fault {
    pub(crate) fn at(self, input: &str) -> EngineError {
        match self {
            Fault::Input(message) => EngineError::input(message, input),
            Fault::Computation(message) => EngineError::computation(message, input),
        }
    }
}

impl From<SymbolicError> for Fault {
    fn from(err: SymbolicError) -> Self {
        Fault::Computation(err.to_string())
    }
}

pub(crate) type FaultResult<T> = std::result::Result<T, Fault>;
