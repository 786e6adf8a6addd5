//! Tool manager
//!
//! Owns the tools of one graph and the connections between them. Every
//! mutation bumps the graph generation, records which tools changed and
//! schedules an update pass (see [`crate::update`]). Only the pass for the
//! newest generation runs to completion; older passes notice the newer
//! generation at their next check and stop.
//!
//! Graph state lives behind a single mutex that is never held across an
//! `.await`. Passes are spawned on the current Tokio runtime when there is
//! one, and deferred until [`ToolManager::settled`] otherwise.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::document::{Document, DocumentFormat, DOCUMENT_VERSION};
use crate::error::{FlowError, Result};
use crate::events::{EventSink, GraphEvent, NullEventSink};
use crate::port::{Connection, InputRef, Output, OutputRef, PortRef, ToolId};
use crate::registry::{ToolDef, ToolRegistry};
use crate::tool::{Point, Tool, ToolState};
use crate::update;
use crate::value::Value;

/// Default bound on re-propagation rounds triggered by input hooks
pub const DEFAULT_MAX_PROPAGATION_ROUNDS: usize = 32;

/// Engine tunables
#[derive(Clone)]
pub struct ManagerConfig {
    /// Receiver of pass progress events
    pub events: Arc<dyn EventSink>,
    /// Bound on hook-requested re-propagation rounds per operation
    pub max_propagation_rounds: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            events: Arc::new(NullEventSink),
            max_propagation_rounds: DEFAULT_MAX_PROPAGATION_ROUNDS,
        }
    }
}

impl ManagerConfig {
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}

/// Tools that need recomputing
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Changes {
    All,
    Tools(HashSet<ToolId>),
}

impl Changes {
    pub(crate) fn tools(ids: impl IntoIterator<Item = ToolId>) -> Self {
        Changes::Tools(ids.into_iter().collect())
    }

    fn merge(self, other: Changes) -> Changes {
        match (self, other) {
            (Changes::Tools(mut a), Changes::Tools(b)) => {
                a.extend(b);
                Changes::Tools(a)
            }
            _ => Changes::All,
        }
    }
}

/// An error-bearing tool, as listed by [`ToolManager::iter_errors`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolErrorReport {
    pub tool: String,
    /// Input whose connection carries the error
    pub input: Option<String>,
    pub message: String,
}

/// A port listed by [`ToolManager::iter_watches`]
#[derive(Debug, Clone, PartialEq)]
pub struct Watch {
    pub port: PortRef,
    pub tool_name: String,
    pub port_name: String,
    pub value: Value,
}

/// Graph state guarded by the manager's lock
pub struct Graph {
    pub(crate) tools: Vec<Tool>,
    selected: Option<ToolId>,
    pub(crate) generation: u64,
    pub(crate) pending: Option<Changes>,
    viewport: Option<serde_json::Value>,
    lock_auto_layout: Option<bool>,
}

impl Graph {
    fn new() -> Self {
        Self {
            tools: Vec::new(),
            selected: None,
            generation: 0,
            pending: None,
            viewport: None,
            lock_auto_layout: None,
        }
    }

    /// Tools in insertion order
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn tool(&self, id: ToolId) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id() == id)
    }

    pub(crate) fn tool_mut(&mut self, id: ToolId) -> Option<&mut Tool> {
        self.tools.iter_mut().find(|t| t.id() == id)
    }

    pub fn tool_by_name(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn selected(&self) -> Option<ToolId> {
        self.selected
    }

    pub fn viewport(&self) -> Option<&serde_json::Value> {
        self.viewport.as_ref()
    }

    pub fn lock_auto_layout(&self) -> Option<bool> {
        self.lock_auto_layout
    }

    /// Generation of the newest scheduled pass
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn require_tool(&self, id: ToolId) -> Result<&Tool> {
        self.tool(id)
            .ok_or_else(|| FlowError::UnknownTool(id.to_string()))
    }

    fn require_tool_mut(&mut self, id: ToolId) -> Result<&mut Tool> {
        self.tool_mut(id)
            .ok_or_else(|| FlowError::UnknownTool(id.to_string()))
    }

    fn tool_name(&self, id: ToolId) -> String {
        self.tool(id)
            .map_or_else(|| id.to_string(), |t| t.name().to_string())
    }

    /// First free name of the form `base`, `base #2`, `base #3`, ...
    fn unique_name(&self, base: &str) -> String {
        let names: HashSet<&str> = self.tools.iter().map(|t| t.name()).collect();
        if !names.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|i| format!("{} #{}", base, i))
            .find(|name| !names.contains(name.as_str()))
            .unwrap_or_else(|| base.to_string())
    }

    /// Source output of a connected input, cloned with its tool's name
    pub(crate) fn source_of(&self, input: &InputRef) -> Option<(String, Output)> {
        let connection = self.tool(input.tool)?.ports().input(&input.name)?.connection()?;
        let source = self.tool(connection.output().tool)?;
        let output = source.ports().output(&connection.output().name)?;
        Some((source.name().to_string(), output.clone()))
    }

    /// Re-propagate one connected input from its current source
    ///
    /// A missing source turns into a connection error.
    pub(crate) fn propagate(&mut self, input: &InputRef) -> Result<()> {
        match self.source_of(input) {
            Some((source_name, output)) => {
                self.require_tool_mut(input.tool)?
                    .propagate_input_value(input, &source_name, &output)
            }
            None => {
                let (source_tool, source_output) = {
                    let tool = self.require_tool(input.tool)?;
                    let port = tool.ports().input(&input.name).ok_or_else(|| {
                        FlowError::UnknownInput {
                            tool: tool.name().to_string(),
                            input: input.name.clone(),
                        }
                    })?;
                    let connection =
                        port.connection()
                            .ok_or_else(|| FlowError::InputNotConnected {
                                tool: tool.name().to_string(),
                                input: input.name.clone(),
                            })?;
                    (connection.output().tool, connection.output().name.clone())
                };
                let message = format!(
                    "Connected output {}.{} no longer exists",
                    self.tool_name(source_tool),
                    source_output
                );
                self.set_connection_error(input, message);
                Ok(())
            }
        }
    }

    pub(crate) fn set_connection_error(&mut self, input: &InputRef, message: String) {
        let connection = self
            .tool_mut(input.tool)
            .and_then(|t| t.ports_mut().input_mut(&input.name))
            .and_then(|i| i.connection.as_mut());
        if let Some(connection) = connection {
            connection.up_to_date = false;
            connection.error = Some(message);
        }
    }

    /// Serve re-propagation requests made by input hooks
    ///
    /// Returns the tools whose inputs were touched. Requests are served in
    /// rounds, since serving one may trigger more; rounds beyond `limit` are
    /// dropped with a warning.
    pub(crate) fn drain_propagations(&mut self, limit: usize) -> HashSet<ToolId> {
        let mut touched = HashSet::new();
        for _ in 0..limit {
            let requests: Vec<InputRef> = self
                .tools
                .iter_mut()
                .flat_map(|tool| {
                    let id = tool.id();
                    tool.take_pending_propagations()
                        .into_iter()
                        .map(move |name| InputRef::new(id, name))
                })
                .collect();
            if requests.is_empty() {
                return touched;
            }
            for input in requests {
                if let Err(e) = self.propagate(&input) {
                    log::warn!("Requested propagation of {} failed: {}", input.name, e);
                }
                touched.insert(input.tool);
            }
        }
        let dropped: usize = self
            .tools
            .iter_mut()
            .map(|t| t.take_pending_propagations().len())
            .sum();
        if dropped > 0 {
            log::warn!(
                "Dropped {} propagation requests after {} rounds",
                dropped,
                limit
            );
        }
        touched
    }

    fn check_input(&self, input: &InputRef) -> Result<&Tool> {
        let tool = self.require_tool(input.tool)?;
        if tool.ports().input(&input.name).is_none() {
            return Err(FlowError::UnknownInput {
                tool: tool.name().to_string(),
                input: input.name.clone(),
            });
        }
        Ok(tool)
    }

    fn check_output(&self, output: &OutputRef) -> Result<&Tool> {
        let tool = self.require_tool(output.tool)?;
        if tool.ports().output(&output.name).is_none() {
            return Err(FlowError::UnknownOutput {
                tool: tool.name().to_string(),
                output: output.name.clone(),
            });
        }
        Ok(tool)
    }

    /// Watched ports, then unconnected unwatched outputs if requested
    fn watches(&self, include_dangling_outputs: bool) -> Vec<Watch> {
        let mut watches = Vec::new();
        let mut connected: HashSet<OutputRef> = HashSet::new();
        for tool in &self.tools {
            for input in tool.ports().inputs() {
                if input.port().is_watched() {
                    watches.push(Watch {
                        port: PortRef::Input(input.to_ref()),
                        tool_name: tool.name().to_string(),
                        port_name: input.name().to_string(),
                        value: input.value().clone(),
                    });
                }
                if let Some(connection) = input.connection() {
                    connected.insert(connection.output().clone());
                }
            }
            for output in tool.ports().outputs() {
                if output.port().is_watched() {
                    watches.push(Watch {
                        port: PortRef::Output(output.to_ref()),
                        tool_name: tool.name().to_string(),
                        port_name: output.name().to_string(),
                        value: output.value().clone(),
                    });
                }
            }
        }
        if include_dangling_outputs {
            for tool in &self.tools {
                for output in tool.ports().outputs() {
                    if !output.port().is_watched() && !connected.contains(&output.to_ref()) {
                        watches.push(Watch {
                            port: PortRef::Output(output.to_ref()),
                            tool_name: tool.name().to_string(),
                            port_name: output.name().to_string(),
                            value: output.value().clone(),
                        });
                    }
                }
            }
        }
        watches
    }
}

pub(crate) struct ManagerInner {
    pub(crate) graph: Mutex<Graph>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    deferred: Mutex<Vec<u64>>,
    pub(crate) config: ManagerConfig,
}

impl ManagerInner {
    pub(crate) fn emit(&self, events: Vec<GraphEvent>) {
        for event in events {
            if let Err(e) = self.config.events.send(event) {
                log::warn!("Failed to send graph event: {}", e);
            }
        }
    }
}

/// Owner of a tool graph
///
/// Cloning is cheap and yields a handle to the same graph.
#[derive(Clone)]
pub struct ToolManager {
    inner: Arc<ManagerInner>,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolManager {
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                graph: Mutex::new(Graph::new()),
                tasks: Mutex::new(Vec::new()),
                deferred: Mutex::new(Vec::new()),
                config,
            }),
        }
    }

    /// Read the graph under the lock
    pub fn read<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&self.inner.graph.lock())
    }

    /// Id of the tool with the given name
    pub fn find(&self, name: &str) -> Option<ToolId> {
        self.read(|g| g.tool_by_name(name).map(|t| t.id()))
    }

    pub fn state(&self, id: ToolId) -> Option<ToolState> {
        self.read(|g| g.tool(id).map(|t| t.state()))
    }

    /// Current value of an input
    pub fn input_value(&self, input: &InputRef) -> Option<Value> {
        self.read(|g| {
            g.tool(input.tool)
                .and_then(|t| t.ports().input(&input.name))
                .map(|i| i.value().clone())
        })
    }

    /// Current value of an output
    pub fn output_value(&self, output: &OutputRef) -> Option<Value> {
        self.read(|g| {
            g.tool(output.tool)
                .and_then(|t| t.ports().output(&output.name))
                .map(|o| o.value().clone())
        })
    }

    /// Record changes and schedule a pass for them
    fn schedule(&self, graph: &mut Graph, changes: Changes) -> u64 {
        graph.pending = Some(match graph.pending.take() {
            Some(pending) => pending.merge(changes),
            None => changes,
        });
        graph.generation += 1;
        let generation = graph.generation;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                let task = handle.spawn(update::run_pass(inner, generation));
                let mut tasks = self.inner.tasks.lock();
                tasks.retain(|t| !t.is_finished());
                tasks.push(task);
            }
            Err(_) => self.inner.deferred.lock().push(generation),
        }
        generation
    }

    /// Schedule a pass over every tool
    pub fn update_all(&self) {
        let mut graph = self.inner.graph.lock();
        self.schedule(&mut graph, Changes::All);
    }

    /// Schedule a pass over the given tools
    pub fn update(&self, tools: &[ToolId]) {
        let mut graph = self.inner.graph.lock();
        self.schedule(&mut graph, Changes::tools(tools.iter().copied()));
    }

    /// Wait until every scheduled pass has finished
    pub async fn settled(&self) {
        loop {
            let deferred = std::mem::take(&mut *self.inner.deferred.lock());
            let tasks = std::mem::take(&mut *self.inner.tasks.lock());
            if deferred.is_empty() && tasks.is_empty() {
                return;
            }
            for generation in deferred {
                update::run_pass(Arc::clone(&self.inner), generation).await;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    log::error!("Update pass panicked: {}", e);
                }
            }
        }
    }

    /// Add a tool, naming it after `base_name` or the definition
    ///
    /// A taken name gets ` #2`, ` #3`, ... appended.
    pub fn add_tool(&self, def: &ToolDef, base_name: Option<&str>) -> ToolId {
        let mut graph = self.inner.graph.lock();
        let name = graph.unique_name(base_name.unwrap_or(&def.name));
        let tool = def.gen(&name);
        let id = tool.id();
        log::debug!("Adding tool {} ({})", name, def.name);
        graph.tools.push(tool);
        self.schedule(&mut graph, Changes::tools([id]));
        id
    }

    /// Remove a tool and sever every connection sourced from it
    pub fn remove_tool(&self, id: ToolId) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        let index = graph
            .tools
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| FlowError::UnknownTool(id.to_string()))?;
        let removed = graph.tools.remove(index);
        log::debug!("Removing tool {}", removed.name());

        let mut changed = HashSet::new();
        for tool in &mut graph.tools {
            let tool_id = tool.id();
            for input in tool.ports_mut().all_inputs_mut() {
                if input.connection.as_ref().is_some_and(|c| c.output.tool == id) {
                    input.connection = None;
                    changed.insert(tool_id);
                }
            }
        }
        if graph.selected == Some(id) {
            graph.selected = None;
        }
        if !changed.is_empty() {
            self.schedule(&mut graph, Changes::Tools(changed));
        }
        Ok(())
    }

    /// Connect an output to an input, replacing any existing connection
    pub fn connect(&self, input: &InputRef, output: &OutputRef) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        graph.check_input(input)?;
        graph.check_output(output)?;

        let tool = graph.require_tool_mut(input.tool)?;
        if let Some(port) = tool.ports_mut().input_mut(&input.name) {
            port.connection = Some(Connection::new(output.clone()));
        }
        graph.propagate(input)?;
        let mut changed = graph.drain_propagations(self.inner.config.max_propagation_rounds);
        changed.insert(input.tool);
        self.schedule(&mut graph, Changes::Tools(changed));
        Ok(())
    }

    /// Remove the connection of an input
    ///
    /// Only schedules a pass when the connection was not up to date, since
    /// removing it may break a cycle.
    pub fn disconnect(&self, input: &InputRef) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        let tool = graph.require_tool_mut(input.tool)?;
        let tool_name = tool.name().to_string();
        let port = tool
            .ports_mut()
            .input_mut(&input.name)
            .ok_or_else(|| FlowError::UnknownInput {
                tool: tool_name.clone(),
                input: input.name.clone(),
            })?;
        let connection = port.connection.take().ok_or_else(|| FlowError::InputNotConnected {
            tool: tool_name,
            input: input.name.clone(),
        })?;
        if !connection.up_to_date {
            self.schedule(&mut graph, Changes::tools([input.tool]));
        }
        Ok(())
    }

    /// Assign a value to an unconnected input
    pub fn set_input_val(&self, input: &InputRef, value: Value) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        let tool = graph.check_input(input)?;
        if let Some(connection) = tool.ports().input(&input.name).and_then(|i| i.connection()) {
            return Err(FlowError::InputConnected {
                tool: tool.name().to_string(),
                input: input.name.clone(),
                source_tool: graph.tool_name(connection.output().tool),
                source_output: connection.output().name.clone(),
            });
        }
        graph.require_tool_mut(input.tool)?.set_input_value(input, value)?;
        let mut changed = graph.drain_propagations(self.inner.config.max_propagation_rounds);
        changed.insert(input.tool);
        self.schedule(&mut graph, Changes::Tools(changed));
        Ok(())
    }

    /// Re-pull a connected input from its source
    pub fn propagate_input_val(&self, input: &InputRef) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        let tool = graph.check_input(input)?;
        if !tool.ports().input(&input.name).is_some_and(|i| i.is_connected()) {
            return Err(FlowError::InputNotConnected {
                tool: tool.name().to_string(),
                input: input.name.clone(),
            });
        }
        graph.propagate(input)?;
        let mut changed = graph.drain_propagations(self.inner.config.max_propagation_rounds);
        changed.insert(input.tool);
        self.schedule(&mut graph, Changes::Tools(changed));
        Ok(())
    }

    pub fn rename_tool(&self, id: ToolId, name: &str) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        if graph.tools.iter().any(|t| t.id() != id && t.name() == name) {
            return Err(FlowError::NameTaken(name.to_string()));
        }
        graph.require_tool_mut(id)?.set_name(name);
        Ok(())
    }

    pub fn set_location(&self, id: ToolId, location: Option<Point>) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        graph.require_tool_mut(id)?.set_location(location);
        Ok(())
    }

    pub fn select(&self, id: Option<ToolId>) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        if let Some(id) = id {
            graph.require_tool(id)?;
        }
        graph.selected = id;
        Ok(())
    }

    pub fn set_watch(&self, port: &PortRef, watch: bool) -> Result<()> {
        let mut graph = self.inner.graph.lock();
        match port {
            PortRef::Input(input) => {
                graph.check_input(input)?;
                if let Some(i) = graph
                    .tool_mut(input.tool)
                    .and_then(|t| t.ports_mut().input_mut(&input.name))
                {
                    i.port.watch = watch;
                }
            }
            PortRef::Output(output) => {
                graph.check_output(output)?;
                if let Some(o) = graph
                    .tool_mut(output.tool)
                    .and_then(|t| t.ports_mut().output_mut(&output.name))
                {
                    o.port.watch = watch;
                }
            }
        }
        Ok(())
    }

    pub fn set_viewport(&self, viewport: Option<serde_json::Value>) {
        self.inner.graph.lock().viewport = viewport;
    }

    pub fn set_lock_auto_layout(&self, lock: Option<bool>) {
        self.inner.graph.lock().lock_auto_layout = lock;
    }

    /// Every tool in an error-bearing state, with messages
    pub fn iter_errors(&self) -> Vec<ToolErrorReport> {
        self.read(|graph| {
            let mut errors = Vec::new();
            for tool in graph.tools() {
                match tool.state() {
                    ToolState::Good | ToolState::Running | ToolState::Stale => {}
                    ToolState::Cycle => errors.push(ToolErrorReport {
                        tool: tool.name().to_string(),
                        input: None,
                        message: "Part of a circular dependency".to_string(),
                    }),
                    ToolState::Failed => errors.push(ToolErrorReport {
                        tool: tool.name().to_string(),
                        input: None,
                        message: tool
                            .error()
                            .unwrap_or("Unspecified run failure")
                            .to_string(),
                    }),
                    ToolState::BadInputs => {
                        for input in tool.ports().inputs() {
                            if let Some(error) = input.connection_error() {
                                errors.push(ToolErrorReport {
                                    tool: tool.name().to_string(),
                                    input: Some(input.name().to_string()),
                                    message: error.to_string(),
                                });
                            }
                        }
                    }
                }
            }
            errors
        })
    }

    /// Watched ports, plus unconnected outputs when requested
    pub fn iter_watches(&self, include_dangling_outputs: bool) -> Vec<Watch> {
        self.read(|graph| graph.watches(include_dangling_outputs))
    }

    /// Build the document for the current graph
    pub fn document(&self) -> Document {
        self.read(|graph| {
            let names: HashMap<ToolId, String> = graph
                .tools()
                .iter()
                .map(|t| (t.id(), t.name().to_string()))
                .collect();
            let tools = graph
                .tools()
                .iter()
                .map(|t| t.serialize(|id| names.get(&id).cloned()))
                .collect();
            let watches = graph
                .watches(false)
                .into_iter()
                .map(|w| (w.tool_name, w.port_name))
                .collect();
            Document {
                version: DOCUMENT_VERSION,
                tools,
                viewport: graph.viewport.clone(),
                lock_auto_layout: graph.lock_auto_layout,
                watches,
            }
        })
    }

    /// Serialize the graph in the given format
    pub fn serialize(&self, format: DocumentFormat) -> Result<String> {
        self.document().encode(format)
    }

    /// Replace the graph with a serialized one
    ///
    /// The live graph is untouched if any part of the document fails to load.
    pub fn deserialize(&self, data: &str, registry: &ToolRegistry) -> Result<()> {
        let document = Document::decode(data)?;
        self.load_document(document, registry)
    }

    /// Replace the graph with a decoded document
    pub fn load_document(&self, document: Document, registry: &ToolRegistry) -> Result<()> {
        let tools = instantiate(&document, registry)?;
        log::debug!("Loaded {} tools", tools.len());

        let mut graph = self.inner.graph.lock();
        graph.tools = tools;
        graph.selected = None;
        graph.viewport = document.viewport;
        graph.lock_auto_layout = document.lock_auto_layout;
        restore_watches(&mut graph, &document.watches);
        self.schedule(&mut graph, Changes::All);
        Ok(())
    }
}

/// Create every tool of a document, then wire the connections
fn instantiate(document: &Document, registry: &ToolRegistry) -> Result<Vec<Tool>> {
    let mut tools: Vec<Tool> = Vec::with_capacity(document.tools.len());
    for serialized in &document.tools {
        if tools.iter().any(|t| t.name() == serialized.name) {
            return Err(FlowError::NameTaken(serialized.name.clone()));
        }
        let def = registry
            .get(&serialized.type_name)
            .ok_or_else(|| FlowError::UnknownToolType(serialized.type_name.clone()))?;
        let mut tool = def.gen(&serialized.name);
        tool.set_location(serialized.loc);
        apply_inputs(&mut tool, &serialized.inputs)?;
        tools.push(tool);
    }

    let ids: HashMap<&str, ToolId> = tools.iter().map(|t| (t.name(), t.id())).collect();
    let mut wiring = Vec::new();
    for serialized in &document.tools {
        for (input, (source_tool, source_output)) in &serialized.connections {
            let source = *ids.get(source_tool.as_str()).ok_or_else(|| {
                FlowError::UnknownTool(format!(
                    "{} (connected to {}.{})",
                    source_tool, serialized.name, input
                ))
            })?;
            let source_has_output = tools
                .iter()
                .find(|t| t.id() == source)
                .is_some_and(|t| t.ports().output(source_output).is_some());
            if !source_has_output {
                return Err(FlowError::UnknownOutput {
                    tool: source_tool.clone(),
                    output: source_output.clone(),
                });
            }
            wiring.push((
                serialized.name.as_str(),
                input.as_str(),
                OutputRef::new(source, source_output.clone()),
            ));
        }
    }
    for (tool_name, input, output) in wiring {
        let tool = tools
            .iter_mut()
            .find(|t| t.name() == tool_name)
            .ok_or_else(|| FlowError::UnknownTool(tool_name.to_string()))?;
        let port = tool
            .ports_mut()
            .input_mut(input)
            .ok_or_else(|| FlowError::UnknownInput {
                tool: tool_name.to_string(),
                input: input.to_string(),
            })?;
        port.connection = Some(Connection::new(output));
    }
    Ok(tools)
}

/// Assign serialized input values, declared order first
fn apply_inputs(
    tool: &mut Tool,
    inputs: &std::collections::BTreeMap<String, serde_json::Value>,
) -> Result<()> {
    let mut remaining: Vec<&str> = inputs.keys().map(String::as_str).collect();
    let mut order: Vec<String> = tool
        .deserialize_order()
        .iter()
        .filter(|name| inputs.contains_key(**name))
        .map(|name| name.to_string())
        .collect();

    loop {
        let next = match order.first() {
            Some(_) => order.remove(0),
            None => {
                // Declaration order, re-read since hooks may declare ports
                let declared = tool
                    .ports()
                    .all_inputs()
                    .iter()
                    .map(|i| i.name())
                    .find(|name| remaining.contains(name));
                match declared {
                    Some(name) => name.to_string(),
                    None => break,
                }
            }
        };
        remaining.retain(|name| *name != next);
        let Some(json) = inputs.get(&next) else {
            continue;
        };
        let kind = tool
            .ports()
            .input(&next)
            .map(|i| i.port().kind())
            .ok_or_else(|| FlowError::UnknownInput {
                tool: tool.name().to_string(),
                input: next.clone(),
            })?;
        let value = Value::from_json(json, kind).map_err(|source| FlowError::InvalidValue {
            tool: tool.name().to_string(),
            input: next.clone(),
            source,
        })?;
        tool.set_input_value(&tool.input_ref(&next), value)?;
    }

    match remaining.first() {
        Some(name) => Err(FlowError::UnknownInput {
            tool: tool.name().to_string(),
            input: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Restore watch flags, preferring an input over a same-named output
fn restore_watches(graph: &mut Graph, watches: &[(String, String)]) {
    for (tool_name, port_name) in watches {
        let Some(tool) = graph.tools.iter_mut().find(|t| t.name() == tool_name) else {
            log::warn!("Ignoring watch on unknown tool {}", tool_name);
            continue;
        };
        let ports = tool.ports_mut();
        if let Some(input) = ports.input_mut(port_name) {
            input.port.watch = true;
        } else if let Some(output) = ports.output_mut(port_name) {
            output.port.watch = true;
        } else {
            log::warn!("Ignoring watch on unknown port {}.{}", tool_name, port_name);
        }
    }
}
