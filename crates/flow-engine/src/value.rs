//! Value and type model
//!
//! Port values are a closed tagged union. Every conversion between kinds is
//! a one-directional best-effort coercion that either produces a value of the
//! target kind or fails with a [`ConversionError`].
//!
//! Enum values are plain strings; the option set lives on the port type
//! ([`PortType::Enum`]) and is checked by [`convert_to_input_type`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// The kind tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "bytes")]
    Bytes,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "number[]")]
    NumberArray,
    #[serde(rename = "boolean[]")]
    BooleanArray,
}

impl ValueKind {
    /// All kinds, scalars first
    pub const ALL: [ValueKind; 7] = [
        ValueKind::String,
        ValueKind::Number,
        ValueKind::Boolean,
        ValueKind::Bytes,
        ValueKind::StringArray,
        ValueKind::NumberArray,
        ValueKind::BooleanArray,
    ];

    /// Name used in messages and type selector inputs
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::Bytes => "bytes",
            ValueKind::StringArray => "string[]",
            ValueKind::NumberArray => "number[]",
            ValueKind::BooleanArray => "boolean[]",
        }
    }

    /// Parse a kind from its name
    pub fn from_name(name: &str) -> Option<ValueKind> {
        ValueKind::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether this is one of the array kinds
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            ValueKind::StringArray | ValueKind::NumberArray | ValueKind::BooleanArray
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A port value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Boolean(bool),
    Number(f64),
    Bytes(Vec<u8>),
    StringArray(Vec<String>),
    NumberArray(Vec<f64>),
    BooleanArray(Vec<bool>),
}

impl Value {
    /// The kind tag of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::StringArray(_) => ValueKind::StringArray,
            Value::NumberArray(_) => ValueKind::NumberArray,
            Value::BooleanArray(_) => ValueKind::BooleanArray,
        }
    }

    /// The zero value of a kind
    pub fn default_for(kind: ValueKind) -> Value {
        match kind {
            ValueKind::String => Value::String(String::new()),
            ValueKind::Boolean => Value::Boolean(false),
            ValueKind::Number => Value::Number(0.0),
            ValueKind::Bytes => Value::Bytes(Vec::new()),
            ValueKind::StringArray => Value::StringArray(Vec::new()),
            ValueKind::NumberArray => Value::NumberArray(Vec::new()),
            ValueKind::BooleanArray => Value::BooleanArray(Vec::new()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Number of elements for arrays and bytes
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Bytes(b) => Some(b.len()),
            Value::StringArray(a) => Some(a.len()),
            Value::NumberArray(a) => Some(a.len()),
            Value::BooleanArray(a) => Some(a.len()),
            _ => None,
        }
    }

    /// Split an array into scalar values
    fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::StringArray(a) => Some(a.iter().cloned().map(Value::String).collect()),
            Value::NumberArray(a) => Some(a.iter().copied().map(Value::Number).collect()),
            Value::BooleanArray(a) => Some(a.iter().copied().map(Value::Boolean).collect()),
            _ => None,
        }
    }

    /// Element 0 of an array, used when narrowing to a scalar
    fn first_element(&self) -> Option<Result<Value, ConversionError>> {
        self.elements()
            .map(|elements| elements.into_iter().next().ok_or(ConversionError::EmptyArray))
    }

    /// Encode for the serialized document
    ///
    /// Bytes use the tagged `{"type": "Buffer", "data": [...]}` form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::json!(s),
            Value::Boolean(b) => serde_json::json!(b),
            Value::Number(n) => number_to_json(*n),
            Value::Bytes(b) => serde_json::json!({ "type": "Buffer", "data": b }),
            Value::StringArray(a) => serde_json::json!(a),
            Value::NumberArray(a) => {
                serde_json::Value::Array(a.iter().map(|n| number_to_json(*n)).collect())
            }
            Value::BooleanArray(a) => serde_json::json!(a),
        }
    }

    /// Decode a document value as the given kind
    pub fn from_json(json: &serde_json::Value, kind: ValueKind) -> Result<Value, ConversionError> {
        let mismatch = || ConversionError::KindMismatch {
            expected: kind.name().to_string(),
            found: json_type_name(json).to_string(),
        };
        match kind {
            ValueKind::String => json.as_str().map(|s| Value::String(s.to_string())).ok_or_else(mismatch),
            ValueKind::Boolean => json.as_bool().map(Value::Boolean).ok_or_else(mismatch),
            ValueKind::Number => json.as_f64().map(Value::Number).ok_or_else(mismatch),
            ValueKind::Bytes => {
                let tagged = json
                    .get("type")
                    .and_then(|t| t.as_str())
                    .is_some_and(|t| t == "Buffer");
                let data = json.get("data").and_then(|d| d.as_array()).filter(|_| tagged);
                let data = data.ok_or_else(mismatch)?;
                data.iter()
                    .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()).ok_or_else(mismatch))
                    .collect::<Result<Vec<u8>, _>>()
                    .map(Value::Bytes)
            }
            ValueKind::StringArray => {
                let items = json.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|i| i.as_str().map(str::to_string).ok_or_else(mismatch))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::StringArray)
            }
            ValueKind::NumberArray => {
                let items = json.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|i| i.as_f64().ok_or_else(mismatch))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::NumberArray)
            }
            ValueKind::BooleanArray => {
                let items = json.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|i| i.as_bool().ok_or_else(mismatch))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::BooleanArray)
            }
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::json!(n as i64)
    } else {
        serde_json::json!(n)
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Render a number in base-10, without a fractional part when integral
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::StringArray(a) => write!(f, "[{}]", a.join(", ")),
            Value::NumberArray(a) => {
                let parts: Vec<String> = a.iter().map(|n| format_number(*n)).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::BooleanArray(a) => {
                let parts: Vec<String> = a.iter().map(|b| b.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(a: Vec<String>) -> Self {
        Value::StringArray(a)
    }
}

impl From<Vec<f64>> for Value {
    fn from(a: Vec<f64>) -> Self {
        Value::NumberArray(a)
    }
}

impl From<Vec<bool>> for Value {
    fn from(a: Vec<bool>) -> Self {
        Value::BooleanArray(a)
    }
}

/// Declared type of a port, including kind-specific constraints
#[derive(Debug, Clone, PartialEq)]
pub enum PortType {
    String,
    /// Optional `[enabled, disabled]` labels for UI toggles
    Boolean { labels: Option<[String; 2]> },
    Number { min: Option<f64>, max: Option<f64> },
    /// A string restricted to `options`
    Enum { options: Vec<String> },
    Bytes,
    StringArray,
    NumberArray,
    BooleanArray,
}

impl PortType {
    /// Unconstrained port type for a value kind
    pub fn of_kind(kind: ValueKind) -> PortType {
        match kind {
            ValueKind::String => PortType::String,
            ValueKind::Boolean => PortType::Boolean { labels: None },
            ValueKind::Number => PortType::Number { min: None, max: None },
            ValueKind::Bytes => PortType::Bytes,
            ValueKind::StringArray => PortType::StringArray,
            ValueKind::NumberArray => PortType::NumberArray,
            ValueKind::BooleanArray => PortType::BooleanArray,
        }
    }

    /// Enum port type from borrowed options
    pub fn enumeration(options: &[&str]) -> PortType {
        PortType::Enum {
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    /// Kind of the values this port holds
    pub fn value_kind(&self) -> ValueKind {
        match self {
            PortType::String | PortType::Enum { .. } => ValueKind::String,
            PortType::Boolean { .. } => ValueKind::Boolean,
            PortType::Number { .. } => ValueKind::Number,
            PortType::Bytes => ValueKind::Bytes,
            PortType::StringArray => ValueKind::StringArray,
            PortType::NumberArray => ValueKind::NumberArray,
            PortType::BooleanArray => ValueKind::BooleanArray,
        }
    }

    /// Type name shown in messages (`enum` for enums)
    pub fn name(&self) -> &'static str {
        match self {
            PortType::Enum { .. } => "enum",
            other => other.value_kind().name(),
        }
    }

    /// Check a value of the right kind against the port's constraints
    pub fn check(&self, value: &Value) -> Result<(), ConversionError> {
        match (self, value) {
            (PortType::Enum { options }, Value::String(s)) => {
                if options.iter().any(|o| o == s) {
                    Ok(())
                } else {
                    Err(ConversionError::InvalidEnumValue(s.clone()))
                }
            }
            (PortType::Number { min, max }, Value::Number(n)) => check_bounds(*n, *min, *max),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reject NaN and infinities, which a document cannot carry
pub(crate) fn check_finite(value: &Value) -> Result<(), ConversionError> {
    let numbers: &[f64] = match value {
        Value::Number(n) => std::slice::from_ref(n),
        Value::NumberArray(items) => items,
        _ => &[],
    };
    match numbers.iter().find(|n| !n.is_finite()) {
        Some(n) => Err(ConversionError::NotFinite(*n)),
        None => Ok(()),
    }
}

fn check_bounds(n: f64, min: Option<f64>, max: Option<f64>) -> Result<(), ConversionError> {
    if let Some(min) = min.filter(|min| n < *min) {
        return Err(ConversionError::BelowMinimum { value: n, min });
    }
    if let Some(max) = max.filter(|max| n > *max) {
        return Err(ConversionError::AboveMaximum { value: n, max });
    }
    Ok(())
}

pub fn convert_to_string(value: &Value) -> Result<String, ConversionError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Boolean(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => Ok(format_number(*n)),
        Value::Bytes(b) => {
            String::from_utf8(b.clone()).map_err(|e| ConversionError::InvalidUtf8(e.to_string()))
        }
        array => convert_to_string(&narrow(array)?),
    }
}

pub fn convert_to_boolean(value: &Value) -> Result<bool, ConversionError> {
    match value {
        Value::String(s) => {
            let lower = s.to_lowercase();
            Ok(lower == "true" || lower == "yes")
        }
        Value::Boolean(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Bytes(_) => convert_to_number(value).map(|n| n != 0.0),
        array => convert_to_boolean(&narrow(array)?),
    }
}

pub fn convert_to_number(value: &Value) -> Result<f64, ConversionError> {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|n| n as f64)
            .map_err(|_| ConversionError::NotANumber(s.clone())),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Ok(*n),
        Value::Bytes(b) => b.first().map(|b| *b as f64).ok_or(ConversionError::EmptyBytes),
        array => convert_to_number(&narrow(array)?),
    }
}

pub fn convert_to_bytes(value: &Value) -> Result<Vec<u8>, ConversionError> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Boolean(b) => Ok(vec![u8::from(*b)]),
        Value::Number(n) => number_to_byte(*n).map(|b| vec![b]),
        Value::Bytes(b) => Ok(b.clone()),
        Value::NumberArray(a) => a.iter().map(|n| number_to_byte(*n)).collect(),
        array => convert_to_bytes(&narrow(array)?),
    }
}

pub fn convert_to_string_array(value: &Value) -> Result<Vec<String>, ConversionError> {
    match value.elements() {
        Some(elements) => elements.iter().map(convert_to_string).collect(),
        None => convert_to_string(value).map(|s| vec![s]),
    }
}

pub fn convert_to_number_array(value: &Value) -> Result<Vec<f64>, ConversionError> {
    match (value, value.elements()) {
        (Value::Bytes(b), _) => Ok(b.iter().map(|b| *b as f64).collect()),
        (_, Some(elements)) => elements.iter().map(convert_to_number).collect(),
        (_, None) => convert_to_number(value).map(|n| vec![n]),
    }
}

pub fn convert_to_boolean_array(value: &Value) -> Result<Vec<bool>, ConversionError> {
    match (value, value.elements()) {
        (Value::Bytes(b), _) => Ok(b.iter().map(|b| *b != 0).collect()),
        (_, Some(elements)) => elements.iter().map(convert_to_boolean).collect(),
        (_, None) => convert_to_boolean(value).map(|b| vec![b]),
    }
}

fn narrow(array: &Value) -> Result<Value, ConversionError> {
    match array.first_element() {
        Some(first) => first,
        None => Err(ConversionError::KindMismatch {
            expected: "array".to_string(),
            found: array.kind().name().to_string(),
        }),
    }
}

fn number_to_byte(n: f64) -> Result<u8, ConversionError> {
    if n.fract() == 0.0 && (0.0..=255.0).contains(&n) {
        Ok(n as u8)
    } else {
        Err(ConversionError::ByteOutOfRange(n))
    }
}

/// Convert a value to the given kind without port constraints
pub fn convert_to_kind(value: &Value, kind: ValueKind) -> Result<Value, ConversionError> {
    if value.kind() == kind {
        return Ok(value.clone());
    }
    Ok(match kind {
        ValueKind::String => Value::String(convert_to_string(value)?),
        ValueKind::Boolean => Value::Boolean(convert_to_boolean(value)?),
        ValueKind::Number => Value::Number(convert_to_number(value)?),
        ValueKind::Bytes => Value::Bytes(convert_to_bytes(value)?),
        ValueKind::StringArray => Value::StringArray(convert_to_string_array(value)?),
        ValueKind::NumberArray => Value::NumberArray(convert_to_number_array(value)?),
        ValueKind::BooleanArray => Value::BooleanArray(convert_to_boolean_array(value)?),
    })
}

/// Convert a value so it can be stored in a port of type `ty`
///
/// Validates enum membership and numeric bounds after the kind conversion.
pub fn convert_to_input_type(value: &Value, ty: &PortType) -> Result<Value, ConversionError> {
    let converted = convert_to_kind(value, ty.value_kind())?;
    ty.check(&converted)?;
    Ok(converted)
}
