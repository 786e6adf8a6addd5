//! Ports and connections
//!
//! Every tool owns an arena of input and output ports keyed by a stable name.
//! Ports are declared once and never removed; a tool that changes shape only
//! changes which ports are in its *active* subset. A hidden input keeps its
//! connection, so the connection comes back when the port is shown again.
//!
//! Ports are identified across the graph by their owning [`ToolId`] plus
//! their name ([`InputRef`], [`OutputRef`]).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::value::{convert_to_input_type, PortType, Value, ValueKind};

static NEXT_TOOL_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a tool instance, unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolId(u64);

impl ToolId {
    /// Allocate a fresh identifier
    pub fn next() -> Self {
        Self(NEXT_TOOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to an input port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputRef {
    pub tool: ToolId,
    pub name: String,
}

impl InputRef {
    pub fn new(tool: ToolId, name: impl Into<String>) -> Self {
        Self {
            tool,
            name: name.into(),
        }
    }
}

/// Reference to an output port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub tool: ToolId,
    pub name: String,
}

impl OutputRef {
    pub fn new(tool: ToolId, name: impl Into<String>) -> Self {
        Self {
            tool,
            name: name.into(),
        }
    }
}

/// Reference to either side of a tool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortRef {
    Input(InputRef),
    Output(OutputRef),
}

impl PortRef {
    pub fn tool(&self) -> ToolId {
        match self {
            PortRef::Input(input) => input.tool,
            PortRef::Output(output) => output.tool,
        }
    }
}

impl From<InputRef> for PortRef {
    fn from(input: InputRef) -> Self {
        PortRef::Input(input)
    }
}

impl From<OutputRef> for PortRef {
    fn from(output: OutputRef) -> Self {
        PortRef::Output(output)
    }
}

/// Fields shared by inputs and outputs
#[derive(Debug, Clone)]
pub struct Port {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) tool: ToolId,
    pub(crate) ty: PortType,
    pub(crate) value: Value,
    pub(crate) watch: bool,
}

impl Port {
    fn new(tool: ToolId, name: &str, description: &str, ty: PortType, value: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            tool,
            ty,
            value,
            watch: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Owning tool
    pub fn tool(&self) -> ToolId {
        self.tool
    }

    pub fn ty(&self) -> &PortType {
        &self.ty
    }

    pub fn kind(&self) -> ValueKind {
        self.ty.value_kind()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether the UI shows this port's value in the watch panel
    pub fn is_watched(&self) -> bool {
        self.watch
    }
}

/// Link from a source output to the input that holds it
#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) output: OutputRef,
    pub(crate) up_to_date: bool,
    pub(crate) error: Option<String>,
    pub(crate) source_kind: Option<ValueKind>,
}

impl Connection {
    pub(crate) fn new(output: OutputRef) -> Self {
        Self {
            output,
            up_to_date: false,
            error: None,
            source_kind: None,
        }
    }

    /// Source output
    pub fn output(&self) -> &OutputRef {
        &self.output
    }

    /// Whether the input's value reflects the source's current value
    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Kind of the source output at the last propagation attempt
    pub fn source_kind(&self) -> Option<ValueKind> {
        self.source_kind
    }
}

/// An input port: a port plus its optional connection
#[derive(Debug, Clone)]
pub struct Input {
    pub(crate) port: Port,
    pub(crate) connection: Option<Connection>,
}

impl Input {
    pub fn port(&self) -> &Port {
        &self.port
    }

    pub fn name(&self) -> &str {
        &self.port.name
    }

    pub fn value(&self) -> &Value {
        &self.port.value
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Error on the connection, if any
    pub fn connection_error(&self) -> Option<&str> {
        self.connection.as_ref().and_then(|c| c.error())
    }

    pub fn to_ref(&self) -> InputRef {
        InputRef::new(self.port.tool, self.port.name.clone())
    }
}

/// An output port
#[derive(Debug, Clone)]
pub struct Output {
    pub(crate) port: Port,
}

impl Output {
    pub fn port(&self) -> &Port {
        &self.port
    }

    pub fn name(&self) -> &str {
        &self.port.name
    }

    pub fn value(&self) -> &Value {
        &self.port.value
    }

    pub fn to_ref(&self) -> OutputRef {
        OutputRef::new(self.port.tool, self.port.name.clone())
    }
}

/// Port arena owned by a tool
///
/// Ports are appended in declaration order and looked up by name. The active
/// lists hold indices into the arenas in display order.
#[derive(Debug, Clone)]
pub struct ToolPorts {
    tool: ToolId,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    active_inputs: Vec<usize>,
    active_outputs: Vec<usize>,
}

impl ToolPorts {
    pub fn new(tool: ToolId) -> Self {
        Self {
            tool,
            inputs: Vec::new(),
            outputs: Vec::new(),
            active_inputs: Vec::new(),
            active_outputs: Vec::new(),
        }
    }

    pub fn tool(&self) -> ToolId {
        self.tool
    }

    /// Declare an input, or return the existing one of the same name
    pub fn declare_input(
        &mut self,
        name: &str,
        description: &str,
        ty: PortType,
        default: Value,
    ) -> InputRef {
        if self.input_index(name).is_none() {
            let port = Port::new(self.tool, name, description, ty, default);
            self.inputs.push(Input {
                port,
                connection: None,
            });
            self.active_inputs.push(self.inputs.len() - 1);
        }
        InputRef::new(self.tool, name)
    }

    /// Declare an output, or return the existing one of the same name
    pub fn declare_output(
        &mut self,
        name: &str,
        description: &str,
        ty: PortType,
        default: Value,
    ) -> OutputRef {
        if self.output_index(name).is_none() {
            let port = Port::new(self.tool, name, description, ty, default);
            self.outputs.push(Output { port });
            self.active_outputs.push(self.outputs.len() - 1);
        }
        OutputRef::new(self.tool, name)
    }

    pub fn string_input(&mut self, name: &str, description: &str, default: &str) -> InputRef {
        self.declare_input(name, description, PortType::String, Value::from(default))
    }

    pub fn boolean_input(
        &mut self,
        name: &str,
        description: &str,
        default: bool,
        labels: Option<[&str; 2]>,
    ) -> InputRef {
        let labels = labels.map(|[on, off]| [on.to_string(), off.to_string()]);
        self.declare_input(name, description, PortType::Boolean { labels }, Value::Boolean(default))
    }

    pub fn number_input(
        &mut self,
        name: &str,
        description: &str,
        default: f64,
        min: Option<f64>,
        max: Option<f64>,
    ) -> InputRef {
        self.declare_input(name, description, PortType::Number { min, max }, Value::Number(default))
    }

    pub fn enum_input(
        &mut self,
        name: &str,
        description: &str,
        default: &str,
        options: &[&str],
    ) -> InputRef {
        self.declare_input(name, description, PortType::enumeration(options), Value::from(default))
    }

    pub fn bytes_input(&mut self, name: &str, description: &str) -> InputRef {
        self.declare_input(name, description, PortType::Bytes, Value::Bytes(Vec::new()))
    }

    pub fn string_array_input(&mut self, name: &str, description: &str) -> InputRef {
        self.declare_input(name, description, PortType::StringArray, Value::StringArray(Vec::new()))
    }

    pub fn number_array_input(&mut self, name: &str, description: &str) -> InputRef {
        self.declare_input(name, description, PortType::NumberArray, Value::NumberArray(Vec::new()))
    }

    pub fn boolean_array_input(&mut self, name: &str, description: &str) -> InputRef {
        self.declare_input(name, description, PortType::BooleanArray, Value::BooleanArray(Vec::new()))
    }

    pub fn string_output(&mut self, name: &str, description: &str) -> OutputRef {
        self.declare_output(name, description, PortType::String, Value::String(String::new()))
    }

    pub fn boolean_output(
        &mut self,
        name: &str,
        description: &str,
        labels: Option<[&str; 2]>,
    ) -> OutputRef {
        let labels = labels.map(|[on, off]| [on.to_string(), off.to_string()]);
        self.declare_output(name, description, PortType::Boolean { labels }, Value::Boolean(false))
    }

    pub fn number_output(&mut self, name: &str, description: &str) -> OutputRef {
        let ty = PortType::Number {
            min: None,
            max: None,
        };
        self.declare_output(name, description, ty, Value::Number(0.0))
    }

    pub fn enum_output(
        &mut self,
        name: &str,
        description: &str,
        default: &str,
        options: &[&str],
    ) -> OutputRef {
        self.declare_output(name, description, PortType::enumeration(options), Value::from(default))
    }

    pub fn bytes_output(&mut self, name: &str, description: &str) -> OutputRef {
        self.declare_output(name, description, PortType::Bytes, Value::Bytes(Vec::new()))
    }

    pub fn string_array_output(&mut self, name: &str, description: &str) -> OutputRef {
        self.declare_output(name, description, PortType::StringArray, Value::StringArray(Vec::new()))
    }

    pub fn number_array_output(&mut self, name: &str, description: &str) -> OutputRef {
        self.declare_output(name, description, PortType::NumberArray, Value::NumberArray(Vec::new()))
    }

    pub fn boolean_array_output(&mut self, name: &str, description: &str) -> OutputRef {
        self.declare_output(name, description, PortType::BooleanArray, Value::BooleanArray(Vec::new()))
    }

    fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.port.name == name)
    }

    fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.port.name == name)
    }

    /// Look up an input, active or hidden
    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.port.name == name)
    }

    pub(crate) fn input_mut(&mut self, name: &str) -> Option<&mut Input> {
        self.inputs.iter_mut().find(|i| i.port.name == name)
    }

    /// Look up an output, active or hidden
    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.port.name == name)
    }

    pub(crate) fn output_mut(&mut self, name: &str) -> Option<&mut Output> {
        self.outputs.iter_mut().find(|o| o.port.name == name)
    }

    /// Every declared input in declaration order
    pub fn all_inputs(&self) -> &[Input] {
        &self.inputs
    }

    /// Every declared output in declaration order
    pub fn all_outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub(crate) fn all_inputs_mut(&mut self) -> impl Iterator<Item = &mut Input> {
        self.inputs.iter_mut()
    }

    /// Active inputs in display order
    pub fn inputs(&self) -> impl Iterator<Item = &Input> {
        self.active_inputs.iter().map(move |i| &self.inputs[*i])
    }

    /// Active outputs in display order
    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.active_outputs.iter().map(move |i| &self.outputs[*i])
    }

    pub fn is_input_active(&self, name: &str) -> bool {
        self.input_index(name)
            .is_some_and(|index| self.active_inputs.contains(&index))
    }

    pub fn is_output_active(&self, name: &str) -> bool {
        self.output_index(name)
            .is_some_and(|index| self.active_outputs.contains(&index))
    }

    /// Replace the active input list
    ///
    /// Names that were never declared are skipped.
    pub fn set_active_inputs(&mut self, names: &[&str]) {
        let mut active = Vec::with_capacity(names.len());
        for name in names {
            match self.input_index(name) {
                Some(index) if !active.contains(&index) => active.push(index),
                Some(_) => {}
                None => log::warn!("Cannot activate undeclared input '{}' on tool {}", name, self.tool),
            }
        }
        self.active_inputs = active;
    }

    /// Replace the active output list
    ///
    /// Names that were never declared are skipped.
    pub fn set_active_outputs(&mut self, names: &[&str]) {
        let mut active = Vec::with_capacity(names.len());
        for name in names {
            match self.output_index(name) {
                Some(index) if !active.contains(&index) => active.push(index),
                Some(_) => {}
                None => log::warn!("Cannot activate undeclared output '{}' on tool {}", name, self.tool),
            }
        }
        self.active_outputs = active;
    }

    /// Change an input's type, converting its value or resetting it
    pub fn retype_input(&mut self, name: &str, ty: PortType) -> bool {
        match self.input_mut(name) {
            Some(input) => {
                retype(&mut input.port, ty);
                true
            }
            None => false,
        }
    }

    /// Change an output's type, converting its value or resetting it
    pub fn retype_output(&mut self, name: &str, ty: PortType) -> bool {
        match self.output_mut(name) {
            Some(output) => {
                retype(&mut output.port, ty);
                true
            }
            None => false,
        }
    }

    pub fn describe_input(&mut self, name: &str, description: &str) -> bool {
        match self.input_mut(name) {
            Some(input) => {
                input.port.description = description.to_string();
                true
            }
            None => false,
        }
    }

    pub fn describe_output(&mut self, name: &str, description: &str) -> bool {
        match self.output_mut(name) {
            Some(output) => {
                output.port.description = description.to_string();
                true
            }
            None => false,
        }
    }
}

fn retype(port: &mut Port, ty: PortType) {
    port.value = convert_to_input_type(&port.value, &ty)
        .unwrap_or_else(|_| Value::default_for(ty.value_kind()));
    port.ty = ty;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaring_twice_reuses_port() {
        let mut ports = ToolPorts::new(ToolId::next());
        ports.number_input("a", "First", 1.0, None, None);
        ports.number_input("a", "Again", 5.0, None, None);

        assert_eq!(ports.all_inputs().len(), 1);
        let a = ports.input("a").unwrap();
        assert_eq!(a.port().description(), "First");
        assert_eq!(a.value(), &Value::Number(1.0));
    }

    #[test]
    fn test_hidden_input_keeps_connection() {
        let source = ToolId::next();
        let mut ports = ToolPorts::new(ToolId::next());
        ports.string_input("expr", "Expression", "");
        ports.number_input("x", "$x", 0.0, None, None);
        ports.input_mut("x").unwrap().connection = Some(Connection::new(OutputRef::new(source, "out")));

        ports.set_active_inputs(&["expr"]);
        assert!(!ports.is_input_active("x"));
        assert_eq!(ports.inputs().count(), 1);
        assert!(ports.input("x").unwrap().is_connected());

        ports.set_active_inputs(&["expr", "x"]);
        let names: Vec<&str> = ports.inputs().map(|i| i.name()).collect();
        assert_eq!(names, vec!["expr", "x"]);
        assert_eq!(ports.input("x").unwrap().connection().unwrap().output().tool, source);
    }

    #[test]
    fn test_set_active_skips_unknown_names() {
        let mut ports = ToolPorts::new(ToolId::next());
        ports.bytes_output("out", "Output");
        ports.set_active_outputs(&["missing", "out", "out"]);
        assert_eq!(ports.outputs().count(), 1);
    }

    #[test]
    fn test_retype_converts_or_resets() {
        let mut ports = ToolPorts::new(ToolId::next());
        ports.number_input("inp", "Input", 12.0, None, None);

        assert!(ports.retype_input("inp", PortType::String));
        assert_eq!(ports.input("inp").unwrap().value(), &Value::from("12"));

        assert!(ports.retype_input("inp", PortType::Boolean { labels: None }));
        assert_eq!(ports.input("inp").unwrap().value(), &Value::Boolean(false));

        ports.string_output("out", "Output");
        assert!(ports.retype_output("out", PortType::enumeration(&["a", "b"])));
        assert_eq!(ports.output("out").unwrap().value(), &Value::from(""));
        assert!(!ports.retype_output("nope", PortType::Bytes));
    }
}
