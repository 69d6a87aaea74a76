//! 工具箱：计算器、模拟理财工具、注册表与 Tool Call 解析

pub mod calculator;
pub mod finance;
pub mod registry;
pub mod schema;

pub use calculator::CalculatorTool;
pub use finance::{AddTransactionTool, GetInvestmentOptionsTool, GetUserBalanceTool, MockLedger};
pub use registry::{Tool, ToolRegistry};
pub use schema::{parse_tool_call, tool_call_schema_json, ToolCall};

/// 默认工具集：calculator；enable_finance_tools 时追加三个模拟理财工具
pub fn default_registry(enable_finance_tools: bool) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(CalculatorTool);
    if enable_finance_tools {
        let ledger = MockLedger::new();
        tools.register(GetUserBalanceTool::new(ledger.clone()));
        tools.register(AddTransactionTool::new(ledger));
        tools.register(GetInvestmentOptionsTool);
    }
    tools
}
