//! Calculator 工具：四则运算，要求模型把所有算术交给工具完成

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::Tool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Deserialize)]
struct CalculatorArgs {
    operation: Operation,
    a: f64,
    b: f64,
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform basic mathematical operations (add, subtract, multiply, divide) to ensure accuracy."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"],
                    "description": "The operation to perform"
                },
                "a": { "type": "number", "description": "The first number" },
                "b": { "type": "number", "description": "The second number" }
            },
            "required": ["operation", "a", "b"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: CalculatorArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid calculator args: {e}"))?;
        let result = match args.operation {
            Operation::Add => args.a + args.b,
            Operation::Subtract => args.a - args.b,
            Operation::Multiply => args.a * args.b,
            Operation::Divide => {
                if args.b == 0.0 {
                    return Err("Cannot divide by zero".to_string());
                }
                args.a / args.b
            }
        };
        Ok(json!({ "result": result }))
    }
}
