//! Table output formatting using the `tabled` crate

use super::OutputConfig;
use tabled::{
    builder::Builder,
    settings::{style::Style, Width},
};

const MAX_TABLE_WIDTH: usize = 120;

/// Table output formatter
pub struct TableOutput;

impl TableOutput {
    /// Create a table from rows of strings
    pub fn from_rows(headers: &[&str], rows: &[Vec<String>], config: &OutputConfig) -> String {
        if rows.is_empty() {
            return "(no results)".to_string();
        }

        let mut builder = Builder::default();
        builder.push_record(headers.iter().copied());

        for row in rows {
            builder.push_record(row.iter().map(|s| s.as_str()));
        }

        let mut table = builder.build();

        if config.compact {
            table.with(Style::blank());
        } else {
            table.with(Style::rounded());
        }

        // Long type strings wrap instead of pushing the table off screen
        table.with(Width::wrap(MAX_TABLE_WIDTH));

        table.to_string()
    }
}
