//! Chat command recognition.
//!
//! Anything that is not a recognised command is a ledger statement.

use std::sync::LazyLock;

use regex::Regex;

static EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^export(?:\s+([0-9]+))?$").expect("export pattern is valid")
});

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("number pattern is valid"));

/// What an inbound chat message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`, `hi`, `help`.
    Help,
    /// `balance`.
    Balance,
    /// Any text mentioning `summary`.
    Summary { months: u32, family_only: bool },
    /// `export` or `export N`. `None` exports everything.
    Export { months: Option<u32> },
    /// Free text to classify and store.
    Record(String),
}

impl Command {
    /// Recognise a command. Matching is case-insensitive on trimmed text.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/start" | "hi" | "help" => return Command::Help,
            "balance" => return Command::Balance,
            _ => {}
        }

        if let Some(caps) = EXPORT.captures(&lower) {
            return Command::Export {
                months: caps.get(1).map(|m| clamp_months(m.as_str())),
            };
        }

        if lower.contains("summary") {
            let months = FIRST_NUMBER
                .find(&lower)
                .map(|m| clamp_months(m.as_str()))
                .unwrap_or(1);
            return Command::Summary {
                months,
                family_only: lower.contains("family"),
            };
        }

        Command::Record(trimmed.to_string())
    }
}

/// At least one month; absurdly large counts saturate.
fn clamp_months(digits: &str) -> u32 {
    digits.parse::<u32>().unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_aliases() {
        for text in ["/start", "hi", "help", "  HELP  ", "Hi"] {
            assert_eq!(Command::parse(text), Command::Help, "{text:?}");
        }
    }

    #[test]
    fn balance_is_exact() {
        assert_eq!(Command::parse("Balance"), Command::Balance);
        assert!(matches!(Command::parse("balance 500"), Command::Record(_)));
    }

    #[test]
    fn summary_months_and_family() {
        assert_eq!(
            Command::parse("last 2 months summary"),
            Command::Summary { months: 2, family_only: false }
        );
        assert_eq!(
            Command::parse("last 1 month family summary"),
            Command::Summary { months: 1, family_only: true }
        );
        assert_eq!(
            Command::parse("summary"),
            Command::Summary { months: 1, family_only: false }
        );
        assert_eq!(
            Command::parse("summary for 0 months"),
            Command::Summary { months: 1, family_only: false }
        );
    }

    #[test]
    fn export_with_and_without_months() {
        assert_eq!(Command::parse("export"), Command::Export { months: None });
        assert_eq!(Command::parse("Export 3"), Command::Export { months: Some(3) });
        assert_eq!(
            Command::parse("export 99999999999"),
            Command::Export { months: Some(u32::MAX) }
        );
    }

    #[test]
    fn everything_else_is_recorded_trimmed() {
        assert_eq!(
            Command::parse("  500 groceries "),
            Command::Record("500 groceries".into())
        );
        assert_eq!(
            Command::parse("export 500 goods"),
            Command::Record("export 500 goods".into())
        );
        assert_eq!(Command::parse("hi there"), Command::Record("hi there".into()));
    }
}
