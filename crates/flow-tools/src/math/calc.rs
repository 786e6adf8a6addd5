//! Calc Tool
//!
//! Evaluates an arithmetic expression. Every `$name` in the expression gets
//! a number input of that name; inputs for names that disappear are hidden,
//! not removed, so their values and connections return with the name.

use std::sync::Arc;

use async_trait::async_trait;
use flow_engine::{
    FlowError, Result, Tool, ToolBehavior, ToolDef, ToolInputs, ToolOutputs, ToolPorts, Value,
};

use super::expr;

pub struct CalcTool;

impl CalcTool {
    pub const PORT_EXPR: &'static str = "expr";
    pub const PORT_OUT: &'static str = "out";

    pub fn definition() -> ToolDef {
        ToolDef::new("Calc", "Calculate a mathematical expression", Arc::new(CalcTool))
            .in_group("Math")
    }

    fn variables(tool: &Tool) -> Vec<String> {
        tool.ports()
            .input(Self::PORT_EXPR)
            .and_then(|i| i.value().as_str())
            .map(expr::variables)
            .unwrap_or_default()
            .into_iter()
            .filter(|name| name != Self::PORT_EXPR)
            .collect()
    }
}

inventory::submit!(flow_engine::DefinitionFn(CalcTool::definition));

#[async_trait]
impl ToolBehavior for CalcTool {
    fn declare(&self, ports: &mut ToolPorts) {
        ports.string_input(Self::PORT_EXPR, "Expression", "");
        ports.number_output(Self::PORT_OUT, "Output");
    }

    fn on_input_set(&self, tool: &mut Tool, input: &str, _old: &Value) {
        if input != Self::PORT_EXPR {
            return;
        }
        let vars = Self::variables(tool);
        let ports = tool.ports_mut();
        for var in &vars {
            ports.number_input(var, &format!("${}", var), 0.0, None, None);
        }
        let mut active = vec![Self::PORT_EXPR];
        active.extend(vars.iter().map(String::as_str));
        ports.set_active_inputs(&active);
    }

    fn deserialize_order(&self) -> &[&'static str] {
        &[Self::PORT_EXPR]
    }

    async fn run(&self, inputs: &ToolInputs) -> Result<ToolOutputs> {
        let src = inputs.string(Self::PORT_EXPR)?;
        log::debug!("CalcTool: evaluating '{}'", src);

        let value = expr::evaluate(src, |name| {
            if name == Self::PORT_EXPR {
                return None;
            }
            inputs.get(name).and_then(Value::as_number)
        })
        .map_err(|e| FlowError::failed(e.to_string()))?;

        Ok(ToolOutputs::new().with(Self::PORT_OUT, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_engine::{InputRef, OutputRef, ToolManager, ToolState};

    fn active_inputs(tool: &Tool) -> Vec<String> {
        tool.ports().inputs().map(|i| i.name().to_string()).collect()
    }

    #[test]
    fn test_definition() {
        let def = CalcTool::definition();
        assert_eq!(def.name, "Calc");
        assert_eq!(def.group, "Math");

        let tool = def.gen("Calc");
        assert_eq!(active_inputs(&tool), vec!["expr"]);
    }

    #[tokio::test]
    async fn test_variables_become_inputs() {
        let mut tool = CalcTool::definition().gen("Calc");
        tool.set_input_value(&tool.input_ref(CalcTool::PORT_EXPR), Value::from("$a + $b * 2"))
            .unwrap();
        assert_eq!(active_inputs(&tool), vec!["expr", "a", "b"]);
        assert_eq!(tool.ports().input("a").unwrap().port().description(), "$a");

        tool.set_input_value(&tool.input_ref("a"), Value::Number(1.0)).unwrap();
        tool.set_input_value(&tool.input_ref("b"), Value::Number(4.0)).unwrap();
        tool.run().await;
        assert_eq!(tool.state(), ToolState::Good);
        assert_eq!(
            tool.ports().output(CalcTool::PORT_OUT).unwrap().value(),
            &Value::Number(9.0)
        );
    }

    #[tokio::test]
    async fn test_dropped_variable_is_hidden_not_removed() {
        let mut tool = CalcTool::definition().gen("Calc");
        let expr = tool.input_ref(CalcTool::PORT_EXPR);
        tool.set_input_value(&expr, Value::from("$a - $b")).unwrap();
        tool.set_input_value(&tool.input_ref("a"), Value::Number(7.0)).unwrap();

        tool.set_input_value(&expr, Value::from("$b")).unwrap();
        assert_eq!(active_inputs(&tool), vec!["expr", "b"]);
        assert_eq!(tool.ports().all_inputs().len(), 3);

        tool.set_input_value(&expr, Value::from("$b - $a")).unwrap();
        assert_eq!(active_inputs(&tool), vec!["expr", "b", "a"]);
        tool.run().await;
        assert_eq!(
            tool.ports().output(CalcTool::PORT_OUT).unwrap().value(),
            &Value::Number(-7.0)
        );
    }

    #[tokio::test]
    async fn test_invalid_expression_fails() {
        let mut tool = CalcTool::definition().gen("Calc");
        tool.set_input_value(&tool.input_ref(CalcTool::PORT_EXPR), Value::from("1 +"))
            .unwrap();
        tool.run().await;
        assert_eq!(tool.state(), ToolState::Failed);
        assert_eq!(tool.error(), Some("Unexpected end of expression"));
    }

    #[tokio::test]
    async fn test_chained_calculations() {
        let manager = ToolManager::new();
        let def = CalcTool::definition();
        let first = manager.add_tool(&def, None);
        let second = manager.add_tool(&def, None);

        manager
            .set_input_val(&InputRef::new(first, "expr"), Value::from("2 * 3"))
            .unwrap();
        manager
            .set_input_val(&InputRef::new(second, "expr"), Value::from("$x + 1"))
            .unwrap();
        manager
            .connect(&InputRef::new(second, "x"), &OutputRef::new(first, "out"))
            .unwrap();
        manager.settled().await;

        assert_eq!(manager.state(second), Some(ToolState::Good));
        assert_eq!(
            manager.output_value(&OutputRef::new(second, "out")),
            Some(Value::Number(7.0))
        );

        manager
            .set_input_val(&InputRef::new(first, "expr"), Value::from("10"))
            .unwrap();
        manager.settled().await;
        assert_eq!(
            manager.output_value(&OutputRef::new(second, "out")),
            Some(Value::Number(11.0))
        );
    }
}
