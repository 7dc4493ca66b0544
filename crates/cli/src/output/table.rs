//! Table formatting utilities

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};

pub struct TableFormatter;

impl TableFormatter {
    /// Empty table with the CLI's styling
    pub fn new() -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }

    pub fn simple(headers: Vec<&str>, rows: Vec<Vec<String>>) -> String {
        let mut table = Self::new();
        table.set_header(headers);
        for row in rows {
            table.add_row(row);
        }
        table.to_string()
    }

    pub fn key_value<K: ToString>(items: Vec<(K, String)>) -> String {
        let mut table = Self::new();
        for (key, value) in items {
            table.add_row(vec![key.to_string(), value]);
        }
        table.to_string()
    }
}
