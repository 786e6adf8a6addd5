//! Error types for the flow engine

use thiserror::Error;

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur in the flow engine
///
/// These are the hard failures of direct API calls. Conversion failures on
/// connections and failures inside tool routines are absorbed into tool and
/// connection state instead of being returned.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Tool is not part of the graph
    #[error("Unrecognized tool: {0}")]
    UnknownTool(String),

    /// Tool type is not registered
    #[error("Unknown tool type: {0}")]
    UnknownToolType(String),

    /// Tool name is already used by another tool
    #[error("Tool name already in use: {0}")]
    NameTaken(String),

    /// Input does not exist on the tool
    #[error("Unknown input: {tool}.{input}")]
    UnknownInput { tool: String, input: String },

    /// Output does not exist on the tool
    #[error("Unknown output: {tool}.{output}")]
    UnknownOutput { tool: String, output: String },

    /// Port reference points at a different tool
    #[error("Input {input} does not belong to tool {tool}")]
    WrongTool { tool: String, input: String },

    /// Tried to assign a value to a connected input
    #[error("Input {tool}.{input} is bound to {source_tool}.{source_output}")]
    InputConnected {
        tool: String,
        input: String,
        source_tool: String,
        source_output: String,
    },

    /// Tried to propagate or disconnect an unconnected input
    #[error("Input {tool}.{input} is unbound")]
    InputNotConnected { tool: String, input: String },

    /// Assigned value has the wrong kind
    #[error("Tried to set {tool}.{input} to a {found}, but expected a {expected}")]
    TypeMismatch {
        tool: String,
        input: String,
        expected: String,
        found: String,
    },

    /// Assigned value has the right kind but fails the port's constraints
    #[error("Invalid value for {tool}.{input}: {source}")]
    InvalidValue {
        tool: String,
        input: String,
        #[source]
        source: ConversionError,
    },

    /// Missing required input in a tool routine
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Invalid input type in a tool routine
    #[error("Invalid input type for '{port}': expected {expected}")]
    InvalidInputType { port: String, expected: String },

    /// Tool routine failed
    #[error("{0}")]
    ExecutionFailed(String),

    /// Value conversion failed
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Document failed schema validation
    #[error("Document failed validation: {0}")]
    Schema(String),

    /// Document could not be decoded
    #[error("Invalid document encoding: {0}")]
    Encoding(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }
}

/// Errors produced when a value cannot be coerced to a target kind
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("Not a number: {0}")]
    NotANumber(String),

    #[error("Invalid enum value: {0}")]
    InvalidEnumValue(String),

    #[error("{value} < minimum {min}")]
    BelowMinimum { value: f64, min: f64 },

    #[error("{value} > maximum {max}")]
    AboveMaximum { value: f64, max: f64 },

    #[error("Empty array has no first element")]
    EmptyArray,

    #[error("Empty byte sequence has no first byte")]
    EmptyBytes,

    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("{0} is not a finite number")]
    NotFinite(f64),

    #[error("{0} does not fit in a byte")]
    ByteOutOfRange(f64),

    #[error("Expected {expected}, found {found}")]
    KindMismatch { expected: String, found: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_messages_render_integers() {
        let err = ConversionError::BelowMinimum {
            value: 3.0,
            min: 5.0,
        };
        assert_eq!(err.to_string(), "3 < minimum 5");
    }

    #[test]
    fn test_invalid_value_wraps_conversion() {
        let err = FlowError::InvalidValue {
            tool: "Calc".to_string(),
            input: "mode".to_string(),
            source: ConversionError::InvalidEnumValue("bogus".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for Calc.mode: Invalid enum value: bogus"
        );
    }
}
