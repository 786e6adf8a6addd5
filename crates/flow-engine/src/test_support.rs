//! Small tools shared by the engine's tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FlowError, Result};
use crate::port::ToolPorts;
use crate::registry::{ToolDef, ToolRegistry};
use crate::tool::{tests::AddBehavior, Tool, ToolBehavior, ToolInputs, ToolOutputs};
use crate::value::Value;

/// Emits its `value` input on `out`
pub(crate) struct Constant;

#[async_trait]
impl ToolBehavior for Constant {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.number_input("value", "Value", 0.0, None, None);
        ports.number_output("out", "Value");
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        Ok(ToolOutputs::new().with("out", inputs.number("value")?))
    }
}

/// Emits its string `s` input on `out`
pub(crate) struct Text;

#[async_trait]
impl ToolBehavior for Text {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.string_input("s", "String", "");
        ports.string_output("out", "String");
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        Ok(ToolOutputs::new().with("out", inputs.string("s")?))
    }
}

/// Counts its runs and passes `inp` through after `ms` milliseconds
pub(crate) struct Counted {
    pub(crate) runs: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolBehavior for Counted {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.number_input("inp", "Input", 0.0, None, None);
        ports.number_input("ms", "Delay", 0.0, Some(0.0), None);
        ports.number_output("out", "Output");
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let ms = inputs.number("ms")?;
        if ms > 0.0 {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
        }
        Ok(ToolOutputs::new().with("out", inputs.number("inp")?))
    }
}

/// Sums number inputs named by the comma-separated `vars` input
///
/// The `outs` input names the active outputs, each of which gets the sum.
pub(crate) struct Dynamic;

fn names(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_str())
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ToolBehavior for Dynamic {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.string_input("vars", "Variables", "");
        ports.string_input("outs", "Outputs", "sum");
        ports.number_output("sum", "Sum");
    }

    fn on_input_set(&self, tool: &mut Tool, input: &str, _old: &Value) {
        let ports = tool.ports_mut();
        match input {
            "vars" => {
                let vars = names(ports.input("vars").map(|i| i.value()));
                for var in &vars {
                    ports.number_input(var, var, 0.0, None, None);
                }
                let mut active = vec!["vars", "outs"];
                active.extend(vars.iter().map(String::as_str));
                ports.set_active_inputs(&active);
            }
            "outs" => {
                let outs = names(ports.input("outs").map(|i| i.value()));
                for out in &outs {
                    ports.number_output(out, out);
                }
                let active: Vec<&str> = outs.iter().map(String::as_str).collect();
                ports.set_active_outputs(&active);
            }
            _ => {}
        }
    }

    fn deserialize_order(&self) -> &[&'static str] {
        &["vars", "outs"]
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let mut sum = 0.0;
        for var in names(inputs.get("vars")) {
            sum += inputs.number(&var)?;
        }
        let mut outputs = ToolOutputs::new();
        for out in names(inputs.get("outs")) {
            outputs.set(&out, sum);
        }
        Ok(outputs)
    }
}

/// Always fails
pub(crate) struct Broken;

#[async_trait]
impl ToolBehavior for Broken {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.number_input("inp", "Input", 0.0, None, None);
        ports.number_output("out", "Output");
    }

    async fn run(&self, _inputs: &ToolInputs) -> Result<ToolOutputs> {
        Err(FlowError::failed("Broken on purpose"))
    }
}

pub(crate) fn def(name: &str, behavior: Arc<dyn ToolBehavior>) -> ToolDef {
    ToolDef::new(name, name, behavior).in_group("Test")
}

/// Registry with every test tool; `Counted` shares `runs`
pub(crate) fn registry(runs: Arc<AtomicUsize>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(def("Add", Arc::new(AddBehavior)));
    registry.register(def("Constant", Arc::new(Constant)));
    registry.register(def("Text", Arc::new(Text)));
    registry.register(def("Counted", Arc::new(Counted { runs })));
    registry.register(def("Dynamic", Arc::new(Dynamic)));
    registry.register(def("Broken", Arc::new(Broken)));
    registry
}
