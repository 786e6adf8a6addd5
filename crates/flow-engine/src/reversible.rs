//! Reversible tools
//!
//! A reversible tool has an `in` port, a boolean `dir` toggle and an `out`
//! port. When `dir` is true the forward routine maps the plain side to the
//! transformed side; when false the backward routine maps it back, and the
//! data ports swap descriptions (and types, when the two sides differ).

use async_trait::async_trait;

use crate::error::Result;
use crate::port::ToolPorts;
use crate::tool::{Tool, ToolBehavior, ToolInputs, ToolOutputs};
use crate::value::{PortType, Value};

pub const PORT_IN: &str = "in";
pub const PORT_DIR: &str = "dir";
pub const PORT_OUT: &str = "out";

/// A pair of inverse routines
#[async_trait]
pub trait Reversible: Send + Sync {
    /// Labels of the direction toggle as `[forward, backward]`
    fn labels(&self) -> [&'static str; 2];

    /// Descriptions of the plain and transformed sides
    fn descriptions(&self) -> [&'static str; 2] {
        ["Plaintext", "Ciphertext"]
    }

    /// Type of the plain side
    fn plain_type(&self) -> PortType {
        PortType::String
    }

    /// Type of the transformed side
    fn transformed_type(&self) -> PortType {
        PortType::String
    }

    /// Ports declared between `dir` and `out`
    fn declare_extra(&self, _ports: &mut ToolPorts) {}

    async fn forward(&self, input: &Value, inputs: &ToolInputs) -> Result<Value>;

    async fn backward(&self, input: &Value, inputs: &ToolInputs) -> Result<Value>;
}

/// Adapts a [`Reversible`] into a [`ToolBehavior`]
pub struct ReversibleTool<R>(pub R);

impl<R: Reversible> ReversibleTool<R> {
    fn apply_direction(&self, ports: &mut ToolPorts, forward: bool) {
        let [plain, transformed] = self.0.descriptions();
        let (plain_ty, transformed_ty) = (self.0.plain_type(), self.0.transformed_type());
        let (in_desc, out_desc, in_ty, out_ty) = if forward {
            (plain, transformed, plain_ty, transformed_ty)
        } else {
            (transformed, plain, transformed_ty, plain_ty)
        };
        ports.describe_input(PORT_IN, in_desc);
        ports.describe_output(PORT_OUT, out_desc);
        if ports.input(PORT_IN).map(|i| i.port().ty()) != Some(&in_ty) {
            ports.retype_input(PORT_IN, in_ty);
        }
        if ports.output(PORT_OUT).map(|o| o.port().ty()) != Some(&out_ty) {
            ports.retype_output(PORT_OUT, out_ty);
        }
    }
}

#[async_trait]
impl<R: Reversible> ToolBehavior for ReversibleTool<R> {
    fn declare(&self, ports: &mut ToolPorts) {
        let plain = self.0.plain_type();
        let transformed = self.0.transformed_type();
        let plain_default = Value::default_for(plain.value_kind());
        let transformed_default = Value::default_for(transformed.value_kind());

        ports.declare_input(PORT_IN, "", plain, plain_default);
        ports.boolean_input(PORT_DIR, "Direction", true, Some(self.0.labels()));
        self.0.declare_extra(ports);
        ports.declare_output(PORT_OUT, "", transformed, transformed_default);
        self.apply_direction(ports, true);
    }

    fn on_input_set(&self, tool: &mut Tool, input: &str, old: &Value) {
        if input != PORT_DIR {
            return;
        }
        let Some(forward) = tool.ports().input(PORT_DIR).and_then(|i| i.value().as_bool()) else {
            return;
        };
        if old.as_bool() == Some(forward) {
            return;
        }
        self.apply_direction(tool.ports_mut(), forward);
        tool.request_propagation(PORT_IN);
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let input = inputs.require(PORT_IN)?;
        let out = if inputs.boolean(PORT_DIR)? {
            self.0.forward(input, inputs).await?
        } else {
            self.0.backward(input, inputs).await?
        };
        Ok(ToolOutputs::new().with(PORT_OUT, out))
    }
}
