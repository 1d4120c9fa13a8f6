//! Rule-based classifier turning a money statement into an [`Entry`].
//!
//! Deterministic keyword and number matching only. Keywords match as
//! case-insensitive substrings, so `grandfather` also carries `father`.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;

use crate::error::ClassifyError;
use crate::ledger::dates::DateResolver;
use crate::ledger::model::{Entry, EntryKind, PaymentMode};

/// Income nouns. Declared order decides the income category.
pub const INCOME_KEYWORDS: &[&str] = &["salary", "refund", "freelance", "income"];

/// Verbs that signal money coming in.
pub const RECEIVE_VERBS: &[&str] = &["received", "got", "credited", "gave"];

/// Verbs that signal money going out. Any of these forces `expense`.
pub const EXPENSE_VERBS: &[&str] = &["spent", "paid", "bought", "purchase"];

/// Relationship words that mark an entry as family spending.
pub const FAMILY_KEYWORDS: &[&str] = &[
    "family",
    "father",
    "mother",
    "dad",
    "mom",
    "grandfather",
    "grandmother",
];

/// Expense categories in priority order: when a text matches keywords from
/// several groups, the earliest group wins.
pub const EXPENSE_CATEGORY_PRIORITY: &[(&str, &[&str])] = &[
    (
        "groceries",
        &[
            "groceries",
            "vegetables",
            "ration",
            "milk",
            "bread",
            "eggs",
            "dairy",
            "provisions",
        ],
    ),
    ("bills", &["electricity", "water", "internet", "rent", "bill"]),
    ("medical", &["doctor", "hospital", "medicine", "medical"]),
    ("travel", &["uber", "ola", "bus", "train", "flight"]),
    ("food", &["food", "lunch", "dinner", "zomato", "swiggy"]),
    ("shopping", &["amazon", "flipkart", "shopping"]),
];

/// Categories that count as family spending even without a family keyword.
pub const FAMILY_CATEGORIES: &[&str] = &["groceries", "bills", "medical", "shopping"];

/// Fallback category for expenses with no keyword match.
pub const GENERAL_CATEGORY: &str = "general";

/// Fallback category for income with no income noun.
pub const INCOME_CATEGORY: &str = "income";

static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)[0-9]+(?-u:\b)").expect("amount pattern is valid"));

static CASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bcash\b").expect("cash pattern is valid"));

static UPI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bupi\b").expect("upi pattern is valid"));

/// Converts free text into a typed ledger entry.
#[derive(Debug, Clone, Default)]
pub struct TextClassifier {
    dates: DateResolver,
}

impl TextClassifier {
    pub fn new() -> Self {
        Self {
            dates: DateResolver::new(),
        }
    }

    /// Classify `text`, dating undated entries with today's UTC date.
    pub fn classify(&self, text: &str) -> Result<Entry, ClassifyError> {
        self.classify_on(text, Utc::now().date_naive())
    }

    /// Classify `text` relative to `today`.
    ///
    /// Explicit dates resolve in `today`'s year; undated text gets `today`.
    pub fn classify_on(&self, text: &str, today: NaiveDate) -> Result<Entry, ClassifyError> {
        let lower = text.to_lowercase();

        let amount_match = AMOUNT.find(text).ok_or(ClassifyError::NoAmountFound)?;
        let amount = parse_amount(amount_match.as_str())?;

        let has_income_signal = contains_any(&lower, INCOME_KEYWORDS)
            || contains_any(&lower, RECEIVE_VERBS);
        let has_expense_signal = contains_any(&lower, EXPENSE_VERBS);

        let kind = if has_income_signal && !has_expense_signal {
            EntryKind::Income
        } else {
            EntryKind::Expense
        };

        let category = match kind {
            EntryKind::Income => INCOME_KEYWORDS
                .iter()
                .find(|k| lower.contains(*k))
                .copied()
                .unwrap_or(INCOME_CATEGORY),
            EntryKind::Expense => expense_category(&lower),
        };

        let is_family =
            contains_any(&lower, FAMILY_KEYWORDS) || FAMILY_CATEGORIES.contains(&category);

        // First occurrence of the digits, which may sit inside an earlier word.
        let reason = text.replacen(amount_match.as_str(), "", 1);
        let reason = reason.trim();

        let date = self
            .dates
            .resolve(text, today.year())
            .unwrap_or(today);

        Ok(Entry {
            kind,
            amount,
            category: category.to_string(),
            reason: (!reason.is_empty()).then(|| reason.to_string()),
            date,
            is_family,
            payment_mode: payment_mode(text),
        })
    }
}

/// The first category group in priority order with a keyword in `lower`.
pub fn expense_category(lower: &str) -> &'static str {
    EXPENSE_CATEGORY_PRIORITY
        .iter()
        .find(|(_, keywords)| contains_any(lower, keywords))
        .map(|(name, _)| *name)
        .unwrap_or(GENERAL_CATEGORY)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn parse_amount(token: &str) -> Result<u64, ClassifyError> {
    match token.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ClassifyError::InvalidAmount {
            token: token.to_string(),
        }),
    }
}

fn payment_mode(text: &str) -> PaymentMode {
    if CASH.is_match(text) {
        PaymentMode::Cash
    } else if UPI.is_match(text) {
        PaymentMode::Upi
    } else {
        PaymentMode::default()
    }
}
