//! Tools a specialist agent runs in-process.
//!
//! [`LocalToolProtocol`] exposes the [`Calculator`](calculator::Calculator) and the
//! [clock](clock::ClockReading) through [`ToolProtocol`], so an
//! [`LlmCompletion`](crate::executor::LlmCompletion) can dispatch the model's tool calls to them
//! through a [`ToolRegistry`](crate::tool_protocol::ToolRegistry).
//!
//! ```rust
//! use agentrelay::tool_protocol::ToolProtocol;
//! use agentrelay::tools::{LocalToolProtocol, CALCULATE};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let tools = LocalToolProtocol::new().with_calculator();
//! let result = tools
//!     .execute(CALCULATE, json!({"expression": "12 * 34"}))
//!     .await
//!     .unwrap();
//! assert_eq!(result.output["text"], "12 * 34 = 408");
//! # }
//! ```

pub mod calculator;
pub mod clock;

use crate::agentrelay::tool_protocol::{
    ToolError, ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};
use async_trait::async_trait;
use calculator::{format_number, Calculator};
use clock::ClockReading;
use serde::Deserialize;
use std::error::Error;

pub const CALCULATE: &str = "calculate";
pub const GET_CURRENT_TIME: &str = "get_current_time";

#[derive(Deserialize)]
struct CalculateParams {
    expression: String,
}

/// In-process tools, each enabled explicitly.
#[derive(Debug, Clone, Default)]
pub struct LocalToolProtocol {
    calculator: Option<Calculator>,
    clock: bool,
}

impl LocalToolProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_calculator(mut self) -> Self {
        self.calculator = Some(Calculator::new());
        self
    }

    pub fn with_clock(mut self) -> Self {
        self.clock = true;
        self
    }

    fn metadata(&self) -> Vec<ToolMetadata> {
        let mut tools = Vec::new();
        if self.calculator.is_some() {
            tools.push(
                ToolMetadata::new(CALCULATE, "Evaluate an arithmetic expression").with_parameter(
                    ToolParameter::new("expression", ToolParameterType::String)
                        .with_description("Expression to evaluate, e.g. 1 + 2 * 3")
                        .required(),
                ),
            );
        }
        if self.clock {
            tools.push(ToolMetadata::new(
                GET_CURRENT_TIME,
                "Get the current local date and time",
            ));
        }
        tools
    }

    fn calculate(
        &self,
        calculator: &Calculator,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let params: CalculateParams = serde_json::from_value(parameters)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;
        let expression = params.expression.trim();
        Ok(match calculator.evaluate(expression) {
            Ok(value) => ToolResult::success(serde_json::json!({
                "expression": expression,
                "result": value,
                "text": format!("{} = {}", expression, format_number(value)),
            })),
            Err(e) => ToolResult::failure(e.to_string()),
        })
    }
}

#[async_trait]
impl ToolProtocol for LocalToolProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        match (tool_name, &self.calculator) {
            (CALCULATE, Some(calculator)) => self.calculate(calculator, parameters),
            (GET_CURRENT_TIME, _) if self.clock => {
                Ok(ToolResult::success(serde_json::to_value(ClockReading::now())?))
            }
            (other, _) => Err(Box::new(ToolError::NotFound(other.to_string()))),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(self.metadata())
    }

    async fn get_tool_metadata(
        &self,
        tool_name: &str,
    ) -> Result<ToolMetadata, Box<dyn Error + Send + Sync>> {
        self.metadata()
            .into_iter()
            .find(|t| t.name == tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()).into())
    }

    fn protocol_name(&self) -> &str {
        "local"
    }
}
