//! Lipsum Tool
//!
//! Emits a fixed block of placeholder text.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{Result, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts};

const LOREM_IPSUM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. Sed nec porta augue, at vestibulum mauris. Curabitur dapibus auctor eros, sed auctor justo suscipit eget. Pellentesque tellus dolor, vehicula ut urna ut, viverra ultrices lectus. Praesent convallis diam quis augue consequat, eu volutpat justo posuere. Donec eu ligula arcu. Morbi in neque in nulla placerat rutrum. Vestibulum eu mauris vel tortor finibus molestie quis quis dolor. Donec bibendum, tellus eget aliquet posuere, diam diam egestas augue, vel vehicula mauris magna nec nisl. Aenean ipsum ex, interdum eget risus nec, commodo dictum nisl. Quisque maximus, metus quis blandit pulvinar, massa nisi pretium libero, sed gravida turpis ligula non arcu. Ut fringilla tempus elementum. Donec sed dapibus nisl. Phasellus maximus, magna tincidunt efficitur sollicitudin, lorem odio aliquet tellus, in elementum tortor lectus ac nisi. Integer id libero fringilla, vestibulum sem et, ultricies augue. Pellentesque lacinia non neque non consequat.";

pub struct LipsumTool;

impl LipsumTool {
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Lipsum", "Emit static lorem ipsum text", Arc::new(LipsumTool))
            .in_group("Test")
    }
}

inventory::submit!(flow_engine::DefinitionFn(LipsumTool::definition));

#[async_trait]
impl ToolBehavior for LipsumTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.string_output(Self::PORT_OUT, "Output");
    }

    async fn run(&self, _inputs: &ToolInputs) -> Result<ToolOutputs> {
        Ok(ToolOutputs::new().with(Self::PORT_OUT, LOREM_IPSUM))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::ToolState;

    #[tokio::test]
    async fn test_emits_text() {
        let mut tool = LipsumTool::definition().gen("Lipsum");
        assert_eq!(tool.ports().inputs().count(), 0);
        tool.run().await;

        assert_eq!(tool.state(), ToolState::Good);
        let out = tool.ports().output(LipsumTool::PORT_OUT).unwrap().value();
        assert!(out.as_str().unwrap().starts_with("Lorem ipsum"));
    }
}
