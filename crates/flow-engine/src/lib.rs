//! Flow Engine - Incremental dataflow graphs of small tools
//!
//! A graph is a set of named tools. Each tool declares typed input and
//! output ports; an input either holds a literal value or is connected to
//! another tool's output. Changing a value or a connection recomputes only
//! the affected tools, running independent tools concurrently.
//!
//! - Values convert between port types when they cross a connection
//! - Tools may reshape their ports when an input changes
//! - Cycles are detected and reported instead of looping
//! - Graphs serialize to a versioned JSON document
//!
//! # Architecture
//!
//! - `ToolManager`: owns the graph and schedules update passes
//! - `ToolRegistry`: tool definitions, collected at link time via `inventory`
//! - `EventSink`: progress events for embedders
//!
//! # Example
//!
//! ```ignore
//! use flow_engine::{InputRef, ToolManager, ToolRegistry, Value};
//!
//! let registry = ToolRegistry::with_builtins();
//! let manager = ToolManager::new();
//! let calc = manager.add_tool(registry.get("Calc").unwrap(), None);
//! manager.set_input_val(&InputRef::new(calc, "expr"), Value::from("1 + 2"))?;
//! manager.settled().await;
//! ```

pub mod document;
pub mod error;
pub mod events;
pub mod manager;
pub mod port;
pub mod registry;
pub mod reversible;
pub mod settings;
pub mod tool;
mod update;
pub mod value;

#[cfg(test)]
mod test_support;

// Re-export key types
pub use document::{Document, DocumentFormat, SerializedTool, DOCUMENT_VERSION};
pub use error::{ConversionError, FlowError, Result};
pub use events::{ChannelEventSink, EventError, EventSink, GraphEvent, NullEventSink, VecEventSink};
pub use manager::{Graph, ManagerConfig, ToolErrorReport, ToolManager, Watch};
pub use port::{Connection, Input, InputRef, Output, OutputRef, Port, PortRef, ToolId, ToolPorts};
pub use registry::{DefinitionFn, GroupInfo, ToolDef, ToolGroup, ToolRegistry};
pub use reversible::{Reversible, ReversibleTool};
pub use settings::{Settings, SettingsError};
pub use tool::{Point, PreparedRun, Tool, ToolBehavior, ToolInputs, ToolOutputs, ToolState};
pub use value::{
    convert_to_boolean, convert_to_boolean_array, convert_to_bytes, convert_to_input_type,
    convert_to_kind, convert_to_number, convert_to_number_array, convert_to_string,
    convert_to_string_array, PortType, Value, ValueKind,
};

// Re-exported for tool libraries
pub use async_trait::async_trait;
pub use inventory;
