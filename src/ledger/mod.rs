//! Ledger core: text classification and date extraction.

pub mod classifier;
pub mod dates;
pub mod model;

pub use classifier::TextClassifier;
pub use dates::DateResolver;
pub use model::{Entry, EntryKind, PaymentMode};
