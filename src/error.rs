//! Error types for pict-core.

use thiserror::Error;

use crate::model::ValueType;

/// Result type alias using pict-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, rendering, or generating a model.
#[derive(Error, Debug)]
pub enum Error {
    /// Model construction violated a contract.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The engine binary could not be located.
    #[error("PICT engine not found (searched: {searched}; architecture: {arch})")]
    EngineNotFound { searched: String, arch: String },

    /// Temp file or process I/O failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine reported an error or exited abnormally.
    #[error("PICT engine error: {message}")]
    Engine { message: String },

    /// An engine warning escalated by the warning policy.
    #[error("PICT engine warning: {message}")]
    EngineWarning { message: String },

    /// Engine output could not be mapped back onto the model.
    #[error("Result integrity error for parameter '{parameter}' (token '{token}'): {message}")]
    ResultIntegrity {
        parameter: String,
        token: String,
        message: String,
    },

    /// Cache storage error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Timeout during operation
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a result integrity error.
    pub fn integrity(
        parameter: impl Into<String>,
        token: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ResultIntegrity {
            parameter: parameter.into(),
            token: token.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Whether this error came from model construction.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Contract violations raised while constructing model entities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A value or operand type disagrees with the established type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    /// The operation is not defined for the given type.
    #[error("'{operation}' is not supported for {value_type} values")]
    Unsupported {
        operation: String,
        value_type: ValueType,
    },

    /// An alias carried aliases of its own.
    #[error("aliases cannot have aliases of their own")]
    NestedAlias,

    /// An IF rule used as an operand of another constraint.
    #[error("IF rules must be top-level; they cannot be combined or negated")]
    NestedRule,

    /// An alias disagrees with its owner on type or negativity.
    #[error("alias must share the owner's type and negativity")]
    AliasMismatch,

    /// Complex objects cannot act as aliases.
    #[error("complex objects cannot be used as aliases")]
    ComplexAlias,

    /// A negative value was negated again.
    #[error("value '{0}' is already negative")]
    DoubleNegation(String),

    /// Weights start at 1.
    #[error("weight must be at least 1, got {0}")]
    InvalidWeight(u32),

    /// IN / NOT IN with no values.
    #[error("value set for '{0}' cannot be empty")]
    EmptyValueSet(String),

    /// The parameter has no values yet, so its type is unknown.
    #[error("parameter '{0}' has no values")]
    EmptyParameter(String),

    /// A parameter compared against itself.
    #[error("parameter '{0}' cannot be compared with itself")]
    SelfComparison(String),

    /// Sub-model order outside `2..=parameter count`.
    #[error("sub-model order {order} must be between 2 and {parameter_count}")]
    InvalidOrder { order: usize, parameter_count: usize },

    /// Two parameters share a name.
    #[error("duplicate parameter name '{0}'")]
    DuplicateParameter(String),

    /// Parameter name contains reserved characters or is empty.
    #[error("invalid parameter name '{0}'")]
    InvalidName(String),

    /// An encoded token would be ambiguous when re-parsed.
    #[error("token '{token}' contains reserved characters: {reason}")]
    InvalidTokenCharacters { token: String, reason: String },

    /// Two different values of one parameter encode to the same token.
    #[error("parameter '{parameter}' has more than one value encoding to '{token}'")]
    AmbiguousToken { parameter: String, token: String },

    /// A constraint references a complex value the model never declared.
    #[error("value '{0}' is not declared by any parameter")]
    UnknownValue(String),

    /// A name does not refer to any model parameter.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
}
