//! Tool instances and their execution contract
//!
//! A [`Tool`] owns its ports, its state and a shared [`ToolBehavior`] that
//! declares the ports, reacts to input changes and implements the async
//! routine. Running is split in three steps so the graph never holds its lock
//! across an `.await`:
//!
//! 1. [`Tool::begin_run`] checks for unresolved inputs and snapshots the
//!    active inputs into a [`PreparedRun`]
//! 2. [`PreparedRun::execute`] runs the routine on the snapshot
//! 3. [`Tool::finish_run`] commits the outputs, but only while the tool is
//!    still `running`

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::SerializedTool;
use crate::error::{FlowError, Result};
use crate::port::{InputRef, Output, OutputRef, ToolId, ToolPorts};
use crate::value::{check_finite, Value, ValueKind};

/// Lifecycle state of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolState {
    Stale,
    Running,
    Good,
    BadInputs,
    Failed,
    Cycle,
}

impl ToolState {
    /// Whether the state carries an error worth reporting
    pub fn is_error(&self) -> bool {
        matches!(self, ToolState::BadInputs | ToolState::Failed | ToolState::Cycle)
    }
}

impl fmt::Display for ToolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolState::Stale => "stale",
            ToolState::Running => "running",
            ToolState::Good => "good",
            ToolState::BadInputs => "bad-inputs",
            ToolState::Failed => "failed",
            ToolState::Cycle => "cycle",
        };
        f.write_str(s)
    }
}

/// Canvas position of a tool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self { x: 10.0, y: 10.0 }
    }
}

/// Per-kind behavior of a tool
///
/// Implementations are stateless; everything a tool needs to remember lives
/// in its ports.
#[async_trait]
pub trait ToolBehavior: Send + Sync {
    /// Declare the tool's ports
    fn declare(&self, ports: &mut ToolPorts);

    /// Called after an input was assigned or propagated
    ///
    /// Hooks may retype, relabel, show or hide ports, assign other inputs and
    /// request re-propagation of connected inputs. Hooks cannot fail; errors
    /// from nested assignments are logged.
    fn on_input_set(&self, _tool: &mut Tool, _input: &str, _old: &Value) {}

    /// Called before a connected input converts a value from a source whose
    /// kind differs from the last one seen
    fn on_source_kind(&self, _tool: &mut Tool, _input: &str, _kind: ValueKind) {}

    /// Inputs that must be assigned before the others when loading
    fn deserialize_order(&self) -> &[&'static str] {
        &[]
    }

    /// Compute outputs from a snapshot of the active inputs
    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs>;
}

/// Snapshot of a tool's active input values
#[derive(Debug, Clone, Default)]
pub struct ToolInputs {
    tool: String,
    values: HashMap<String, Value>,
}

impl ToolInputs {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            values: HashMap::new(),
        }
    }

    /// Builder-style insert, mostly for tests
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Name of the tool being run
    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn require(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| FlowError::MissingInput(name.to_string()))
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        kind: ValueKind,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T> {
        extract(self.require(name)?).ok_or_else(|| FlowError::InvalidInputType {
            port: name.to_string(),
            expected: kind.name().to_string(),
        })
    }

    pub fn string(&self, name: &str) -> Result<&str> {
        self.typed(name, ValueKind::String, Value::as_str)
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        self.typed(name, ValueKind::Boolean, Value::as_bool)
    }

    pub fn number(&self, name: &str) -> Result<f64> {
        self.typed(name, ValueKind::Number, Value::as_number)
    }

    pub fn bytes(&self, name: &str) -> Result<&[u8]> {
        self.typed(name, ValueKind::Bytes, Value::as_bytes)
    }

    pub fn string_array(&self, name: &str) -> Result<&[String]> {
        self.typed(name, ValueKind::StringArray, |v| match v {
            Value::StringArray(a) => Some(a.as_slice()),
            _ => None,
        })
    }

    pub fn number_array(&self, name: &str) -> Result<&[f64]> {
        self.typed(name, ValueKind::NumberArray, |v| match v {
            Value::NumberArray(a) => Some(a.as_slice()),
            _ => None,
        })
    }

    pub fn boolean_array(&self, name: &str) -> Result<&[bool]> {
        self.typed(name, ValueKind::BooleanArray, |v| match v {
            Value::BooleanArray(a) => Some(a.as_slice()),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// Output values produced by a run
///
/// Outputs that are not set keep their previous value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutputs {
    values: HashMap<String, Value>,
}

impl ToolOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A run that has been started but not yet executed
pub struct PreparedRun {
    tool: ToolId,
    behavior: Arc<dyn ToolBehavior>,
    inputs: ToolInputs,
}

impl PreparedRun {
    pub fn tool(&self) -> ToolId {
        self.tool
    }

    /// Execute the routine on the input snapshot
    pub async fn execute(self) -> (ToolId, Result<ToolOutputs>) {
        let result = self.behavior.run(&self.inputs).await;
        (self.tool, result)
    }
}

/// A tool instance in a graph
pub struct Tool {
    id: ToolId,
    type_name: String,
    name: String,
    location: Option<Point>,
    state: ToolState,
    error: Option<String>,
    ports: ToolPorts,
    behavior: Arc<dyn ToolBehavior>,
    pending_propagations: Vec<String>,
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Tool {
    /// Create a tool and let its behavior declare the ports
    pub fn new(
        type_name: impl Into<String>,
        name: impl Into<String>,
        behavior: Arc<dyn ToolBehavior>,
    ) -> Self {
        let id = ToolId::next();
        let mut ports = ToolPorts::new(id);
        behavior.declare(&mut ports);
        Self {
            id,
            type_name: type_name.into(),
            name: name.into(),
            location: Some(Point::default()),
            state: ToolState::Stale,
            error: None,
            ports,
            behavior,
            pending_propagations: Vec::new(),
        }
    }

    pub fn id(&self) -> ToolId {
        self.id
    }

    /// Name of the definition this tool was created from
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn location(&self) -> Option<Point> {
        self.location
    }

    pub fn set_location(&mut self, location: Option<Point>) {
        self.location = location;
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ToolState) {
        self.state = state;
    }

    /// Leave the tool unresolved for this pass
    pub(crate) fn mark_cycle(&mut self) {
        self.state = ToolState::Cycle;
        self.error = None;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn ports(&self) -> &ToolPorts {
        &self.ports
    }

    /// Mutable port access for input hooks
    pub fn ports_mut(&mut self) -> &mut ToolPorts {
        &mut self.ports
    }

    pub fn input_ref(&self, name: &str) -> InputRef {
        InputRef::new(self.id, name)
    }

    pub fn output_ref(&self, name: &str) -> OutputRef {
        OutputRef::new(self.id, name)
    }

    pub fn deserialize_order(&self) -> &[&'static str] {
        self.behavior.deserialize_order()
    }

    fn check_owner(&self, input: &InputRef) -> Result<()> {
        if input.tool != self.id {
            return Err(FlowError::WrongTool {
                tool: self.name.clone(),
                input: input.name.clone(),
            });
        }
        if self.ports.input(&input.name).is_none() {
            return Err(FlowError::UnknownInput {
                tool: self.name.clone(),
                input: input.name.clone(),
            });
        }
        Ok(())
    }

    /// Assign a value to an unconnected input
    pub fn set_input_value(&mut self, input: &InputRef, value: Value) -> Result<()> {
        self.check_owner(input)?;
        let tool_name = self.name.clone();
        let Some(port) = self.ports.input_mut(&input.name) else {
            return Err(FlowError::UnknownInput {
                tool: tool_name,
                input: input.name.clone(),
            });
        };
        if let Some(connection) = &port.connection {
            return Err(FlowError::InputConnected {
                tool: tool_name,
                input: input.name.clone(),
                source_tool: connection.output.tool.to_string(),
                source_output: connection.output.name.clone(),
            });
        }
        if value.kind() != port.port.kind() {
            return Err(FlowError::TypeMismatch {
                tool: tool_name,
                input: input.name.clone(),
                expected: port.port.kind().name().to_string(),
                found: value.kind().name().to_string(),
            });
        }
        check_finite(&value)
            .and_then(|()| port.port.ty.check(&value))
            .map_err(|source| FlowError::InvalidValue {
                tool: tool_name.clone(),
                input: input.name.clone(),
                source,
            })?;

        log::debug!("{}.{} = {}", tool_name, input.name, value);
        let old = std::mem::replace(&mut port.port.value, value);
        self.state = ToolState::Stale;
        self.notify_input_set(&input.name, &old);
        Ok(())
    }

    /// Pull the value of a connected input from its source output
    ///
    /// Conversion failures are recorded on the connection and are not
    /// returned as errors.
    pub fn propagate_input_value(
        &mut self,
        input: &InputRef,
        source_tool: &str,
        source: &Output,
    ) -> Result<()> {
        self.check_owner(input)?;
        let kind = source.port().kind();
        let seen = self
            .ports
            .input(&input.name)
            .and_then(|i| i.connection())
            .map(|c| c.source_kind());
        if let Some(seen) = seen {
            if seen != Some(kind) {
                let behavior = Arc::clone(&self.behavior);
                behavior.on_source_kind(self, &input.name, kind);
            }
        }

        let tool_name = self.name.clone();
        let Some(port) = self.ports.input_mut(&input.name) else {
            return Err(FlowError::UnknownInput {
                tool: tool_name,
                input: input.name.clone(),
            });
        };
        let ty = port.port.ty.clone();
        let Some(connection) = port.connection.as_mut() else {
            return Err(FlowError::InputNotConnected {
                tool: tool_name,
                input: input.name.clone(),
            });
        };
        connection.source_kind = Some(kind);

        match crate::value::convert_to_input_type(source.value(), &ty) {
            Ok(value) => {
                connection.up_to_date = true;
                connection.error = None;
                let old = std::mem::replace(&mut port.port.value, value);
                self.state = ToolState::Stale;
                self.notify_input_set(&input.name, &old);
            }
            Err(e) => {
                let message = format!(
                    "Unable to convert {} {}.{} to {} {}.{}: {}",
                    source.port().ty().name(),
                    source_tool,
                    source.name(),
                    ty.name(),
                    tool_name,
                    input.name,
                    e
                );
                log::debug!("{}", message);
                connection.up_to_date = false;
                connection.error = Some(message);
            }
        }
        Ok(())
    }

    fn notify_input_set(&mut self, input: &str, old: &Value) {
        let behavior = Arc::clone(&self.behavior);
        behavior.on_input_set(self, input, old);
    }

    /// Ask the graph to re-propagate a connected input
    ///
    /// Does nothing when the input is not connected.
    pub fn request_propagation(&mut self, input: &str) {
        let connected = self.ports.input(input).is_some_and(|i| i.is_connected());
        if connected && !self.pending_propagations.iter().any(|p| p == input) {
            self.pending_propagations.push(input.to_string());
        }
    }

    pub(crate) fn take_pending_propagations(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_propagations)
    }

    /// Active inputs whose connection carries an error
    pub fn bad_inputs(&self) -> Vec<&str> {
        self.ports
            .inputs()
            .filter(|i| i.connection_error().is_some())
            .map(|i| i.name())
            .collect()
    }

    /// Move to `running` and snapshot the inputs
    ///
    /// Returns `None` and moves to `bad-inputs` when an active input has an
    /// unresolved connection error.
    pub fn begin_run(&mut self) -> Option<PreparedRun> {
        let bad = self.bad_inputs();
        if !bad.is_empty() {
            let noun = if bad.len() == 1 { "input" } else { "inputs" };
            let message = format!("Unresolved {}: {}", noun, bad.join(", "));
            self.state = ToolState::BadInputs;
            self.error = Some(message);
            return None;
        }

        let mut inputs = ToolInputs::new(self.name.clone());
        for input in self.ports.inputs() {
            inputs
                .values
                .insert(input.name().to_string(), input.value().clone());
        }
        self.state = ToolState::Running;
        self.error = None;
        Some(PreparedRun {
            tool: self.id,
            behavior: Arc::clone(&self.behavior),
            inputs,
        })
    }

    /// Commit the result of a run
    ///
    /// Returns false, discarding the result, when the tool is no longer
    /// `running`.
    pub fn finish_run(&mut self, result: Result<ToolOutputs>) -> bool {
        if self.state != ToolState::Running {
            log::debug!("Discarding result of {} in state {}", self.name, self.state);
            return false;
        }
        match result.and_then(|outputs| self.check_outputs(outputs)) {
            Ok(outputs) => {
                for (name, value) in outputs.values {
                    if let Some(output) = self.ports.output_mut(&name) {
                        output.port.value = value;
                    }
                }
                self.state = ToolState::Good;
                self.error = None;
            }
            Err(e) => {
                let message = e.to_string();
                log::debug!("{} failed: {}", self.name, message);
                self.state = ToolState::Failed;
                self.error = (!message.is_empty()).then_some(message);
            }
        }
        true
    }

    fn check_outputs(&self, outputs: ToolOutputs) -> Result<ToolOutputs> {
        for (name, value) in &outputs.values {
            let Some(output) = self.ports.output(name) else {
                return Err(FlowError::UnknownOutput {
                    tool: self.name.clone(),
                    output: name.clone(),
                });
            };
            let port = output.port();
            if value.kind() != port.kind() {
                return Err(FlowError::failed(format!(
                    "Output {} produced a {}, but expected a {}",
                    name,
                    value.kind(),
                    port.kind()
                )));
            }
            port.ty().check(value).map_err(|e| {
                FlowError::failed(format!("Output {} produced an invalid value: {}", name, e))
            })?;
        }
        Ok(outputs)
    }

    /// Run the tool in place
    pub async fn run(&mut self) {
        if let Some(run) = self.begin_run() {
            let (_, result) = run.execute().await;
            self.finish_run(result);
        }
    }

    /// Serialize this tool for a document
    ///
    /// `resolve` maps connected source tools to their names; connections to
    /// unresolvable tools are omitted.
    pub fn serialize(&self, resolve: impl Fn(ToolId) -> Option<String>) -> SerializedTool {
        let mut inputs = BTreeMap::new();
        let mut connections = BTreeMap::new();
        for input in self.ports.inputs() {
            match input.connection() {
                Some(connection) => {
                    if let Some(source) = resolve(connection.output.tool) {
                        connections.insert(
                            input.name().to_string(),
                            (source, connection.output.name.clone()),
                        );
                    }
                }
                None => {
                    inputs.insert(input.name().to_string(), input.value().to_json());
                }
            }
        }
        SerializedTool {
            type_name: self.type_name.clone(),
            name: self.name.clone(),
            loc: self.location,
            inputs,
            connections,
        }
    }
}
