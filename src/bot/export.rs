//! CSV export of stored entries.

use serde::Serialize;

use crate::error::Error;
use crate::store::StoredEntry;

#[derive(Serialize)]
struct CsvRow<'a> {
    date: String,
    #[serde(rename = "type")]
    kind: &'a str,
    amount: u64,
    category: &'a str,
    reason: &'a str,
    family: bool,
    payment_mode: &'a str,
    created_at: &'a str,
}

/// Render entries as CSV with a header row.
pub fn entries_to_csv(entries: &[StoredEntry]) -> Result<Vec<u8>, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for stored in entries {
        let entry = &stored.entry;
        writer.serialize(CsvRow {
            date: entry.date_iso(),
            kind: entry.kind.as_str(),
            amount: entry.amount,
            category: &entry.category,
            reason: entry.reason.as_deref().unwrap_or(""),
            family: entry.is_family,
            payment_mode: entry.payment_mode.as_str(),
            created_at: &stored.created_at,
        })?;
    }
    // serialize() only emits the header alongside the first record.
    if entries.is_empty() {
        writer.write_record(HEADER)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Export(e.into_error().into()))
}

const HEADER: [&str; 8] = [
    "date",
    "type",
    "amount",
    "category",
    "reason",
    "family",
    "payment_mode",
    "created_at",
];
