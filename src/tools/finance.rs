//! 模拟理财工具：余额查询、记账、投资选项
//!
//! 三个工具共享同一个 MockLedger（内存状态，进程重启后复位），仅用于演示与本地联调。

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::tools::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expense,
    Income,
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerTransaction {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub date: String,
}

#[derive(Debug)]
struct LedgerState {
    balance: f64,
    transactions: Vec<LedgerTransaction>,
}

/// 内存账本：初始余额 1500.00 BRL，含两笔种子交易
#[derive(Debug, Clone)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl Default for MockLedger {
    fn default() -> Self {
        let seed = vec![
            LedgerTransaction {
                id: 1,
                kind: TransactionKind::Expense,
                amount: 50.0,
                category: "Food".into(),
                description: String::new(),
                date: "2023-10-26".into(),
            },
            LedgerTransaction {
                id: 2,
                kind: TransactionKind::Income,
                amount: 3000.0,
                category: "Salary".into(),
                description: String::new(),
                date: "2023-10-01".into(),
            },
        ];
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                balance: 1500.0,
                transactions: seed,
            })),
        }
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> Result<f64, String> {
        self.state
            .lock()
            .map(|s| s.balance)
            .map_err(|_| "ledger lock poisoned".to_string())
    }

    fn record(
        &self,
        kind: TransactionKind,
        amount: f64,
        category: String,
        description: String,
    ) -> Result<(u64, f64), String> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| "ledger lock poisoned".to_string())?;
        let id = state.transactions.len() as u64 + 1;
        match kind {
            TransactionKind::Expense => state.balance -= amount,
            TransactionKind::Income => state.balance += amount,
        }
        state.transactions.push(LedgerTransaction {
            id,
            kind,
            amount,
            category,
            description,
            date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
        });
        Ok((id, state.balance))
    }
}

/// getUserBalance：查询当前余额
pub struct GetUserBalanceTool {
    ledger: MockLedger,
}

impl GetUserBalanceTool {
    pub fn new(ledger: MockLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for GetUserBalanceTool {
    fn name(&self) -> &str {
        "getUserBalance"
    }

    fn description(&self) -> &str {
        "Get the current balance of the user's account. Use this whenever the user asks about their money or affordability."
    }

    async fn execute(&self, _args: Value) -> Result<Value, String> {
        Ok(json!({ "balance": self.ledger.balance()?, "currency": "BRL" }))
    }
}

#[derive(Debug, Deserialize)]
struct AddTransactionArgs {
    #[serde(rename = "type")]
    kind: TransactionKind,
    amount: f64,
    category: String,
    #[serde(default)]
    description: Option<String>,
}

/// addTransaction：记录一笔支出或收入并更新余额
pub struct AddTransactionTool {
    ledger: MockLedger,
}

impl AddTransactionTool {
    pub fn new(ledger: MockLedger) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for AddTransactionTool {
    fn name(&self) -> &str {
        "addTransaction"
    }

    fn description(&self) -> &str {
        "Record a new expense or income transaction. Use this when the user says they spent or received money."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "type": { "type": "string", "enum": ["expense", "income"], "description": "The type of transaction." },
                "amount": { "type": "number", "description": "The monetary amount." },
                "category": { "type": "string", "description": "The category (e.g., Food, Transport, Salary)." },
                "description": { "type": "string", "description": "Optional description of the transaction." }
            },
            "required": ["type", "amount", "category"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let args: AddTransactionArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid transaction args: {e}"))?;
        let (id, balance) = self.ledger.record(
            args.kind,
            args.amount,
            args.category,
            args.description.unwrap_or_default(),
        )?;
        Ok(json!({
            "status": "success",
            "message": "Transaction recorded successfully.",
            "newBalance": balance,
            "transactionId": id
        }))
    }
}

/// getInvestmentOptions：按风险偏好返回投资选项；未知偏好按保守处理
pub struct GetInvestmentOptionsTool;

#[async_trait]
impl Tool for GetInvestmentOptionsTool {
    fn name(&self) -> &str {
        "getInvestmentOptions"
    }

    fn description(&self) -> &str {
        "Get a list of available investment options based on risk profile."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "riskProfile": {
                    "type": "string",
                    "enum": ["conservative", "moderate", "aggressive"],
                    "description": "The user risk profile."
                }
            },
            "required": ["riskProfile"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let profile = args
            .get("riskProfile")
            .and_then(|v| v.as_str())
            .unwrap_or("conservative");
        let options = match profile {
            "moderate" => json!([
                { "name": "Fundo Multimercado", "return": "12-15% a.a", "risk": "Medium" },
                { "name": "FIIs (Fundos Imobiliários)", "return": "Variable + Dividends", "risk": "Medium" }
            ]),
            "aggressive" => json!([
                { "name": "Ações (Stock Market)", "return": "Variable", "risk": "High" },
                { "name": "Crypto (Bitcoin)", "return": "High Volatility", "risk": "Very High" }
            ]),
            _ => json!([
                { "name": "Tesouro Selic", "return": "10.75% a.a", "risk": "Low" },
                { "name": "CDB Liquidez Diária", "return": "100% CDI", "risk": "Low" }
            ]),
        };
        Ok(json!({ "options": options }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transactions_update_shared_balance() {
        let ledger = MockLedger::new();
        let balance_tool = GetUserBalanceTool::new(ledger.clone());
        let add_tool = AddTransactionTool::new(ledger.clone());

        let out = balance_tool.execute(json!({})).await.unwrap();
        assert_eq!(out["balance"].as_f64(), Some(1500.0));
        assert_eq!(out["currency"], "BRL");

        let out = add_tool
            .execute(json!({"type": "expense", "amount": 200.0, "category": "Transport"}))
            .await
            .unwrap();
        assert_eq!(out["newBalance"].as_f64(), Some(1300.0));
        assert_eq!(out["transactionId"], 3);

        let out = add_tool
            .execute(json!({"type": "income", "amount": 100, "category": "Gift", "description": "bday"}))
            .await
            .unwrap();
        assert_eq!(out["newBalance"].as_f64(), Some(1400.0));
        assert_eq!(ledger.balance().unwrap(), 1400.0);
    }

    #[tokio::test]
    async fn test_invalid_transaction_type() {
        let add_tool = AddTransactionTool::new(MockLedger::new());
        let err = add_tool
            .execute(json!({"type": "transfer", "amount": 1, "category": "x"}))
            .await
            .unwrap_err();
        assert!(err.contains("Invalid transaction args"));
    }

    #[tokio::test]
    async fn test_investment_options_fall_back_to_conservative() {
        let tool = GetInvestmentOptionsTool;
        let out = tool.execute(json!({"riskProfile": "aggressive"})).await.unwrap();
        assert_eq!(out["options"][0]["risk"], "High");
        let out = tool.execute(json!({"riskProfile": "yolo"})).await.unwrap();
        assert_eq!(out["options"][0]["name"], "Tesouro Selic");
    }
}
