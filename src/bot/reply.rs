//! Reply cards sent back to the chat.

use crate::ledger::Entry;
use crate::store::{Balance, CategoryTotal};

/// An outbound answer to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Document {
        bytes: Vec<u8>,
        file_name: String,
        caption: String,
    },
}

pub fn help_text() -> String {
    [
        "Expense Tracker Bot",
        "",
        "Examples:",
        "- 500 groceries",
        "- paid 200 medical",
        "- received salary 30000",
        "- grandfather gave 1000",
        "- 250 uber cash on 3rd feb",
        "- balance",
        "- last 2 months summary",
        "- last 1 month family summary",
        "- export 3",
    ]
    .join("\n")
}

pub fn saved_card(entry: &Entry) -> String {
    format!(
        "Saved\n\n\
         Money: {}\n\
         Category: {}\n\
         Reason: {}\n\
         Type: {}\n\
         Family: {}\n\
         Payment: {}\n\
         Date: {}",
        entry.amount,
        entry.category,
        entry.reason.as_deref().unwrap_or("N/A"),
        entry.kind,
        if entry.is_family { "Yes" } else { "No" },
        entry.payment_mode,
        entry.date_iso(),
    )
}

pub fn balance_card(balance: &Balance) -> String {
    format!(
        "Balance\n\nIncome: {}\nExpense: {}\nNet: {}",
        balance.income,
        balance.expense,
        balance.net()
    )
}

pub fn summary_card(months: u32, totals: &[CategoryTotal]) -> String {
    let body = if totals.is_empty() {
        "No data".to_string()
    } else {
        totals
            .iter()
            .map(|t| format!("- {}: {}", t.category, t.total))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!("Summary ({months} months)\n\n{body}")
}

pub fn error_card(message: &str) -> String {
    format!("Error\n\n{message}")
}
