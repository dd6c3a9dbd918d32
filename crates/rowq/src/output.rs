//! Output formatting for the rowq CLI.
//!
//! [`OutputWriter`] renders command results either as `tabled` tables or as pretty JSON.

use serde::Serialize;
use tabled::{Table, Tabled};

pub enum OutputWriter {
    /// Display results in a human-readable table
    Table(TableOutputWriter),
    /// Display results as JSON
    Json(JsonOutputWriter),
}

impl OutputWriter {
    /// Pick a writer from the `--format` flag. Anything but `json` is a table.
    pub fn from_format(format: &str) -> Self {
        match format.to_lowercase().as_str() {
            "json" => OutputWriter::Json(JsonOutputWriter),
            _ => OutputWriter::Table(TableOutputWriter),
        }
    }

    pub fn write_list<T: Serialize + Tabled>(
        &self,
        items: &[T],
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        match self {
            OutputWriter::Table(writer) => writer.write_list(items, out),
            OutputWriter::Json(writer) => writer.write_list(items, out),
        }
    }

    pub fn write_item<T: Serialize + Tabled>(
        &self,
        item: &T,
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        match self {
            OutputWriter::Table(writer) => writer.write_list(std::slice::from_ref(item), out),
            OutputWriter::Json(writer) => writer.write_item(item, out),
        }
    }
}

/// Writer for formatting output as human-readable tables
pub struct TableOutputWriter;

impl TableOutputWriter {
    pub fn write_list<T: Tabled>(
        &self,
        items: &[T],
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", Table::new(items))?;
        Ok(())
    }
}

/// Writer for formatting output as JSON
pub struct JsonOutputWriter;

impl JsonOutputWriter {
    pub fn write_list<T: Serialize>(
        &self,
        items: &[T],
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", serde_json::to_string_pretty(items)?)?;
        Ok(())
    }

    pub fn write_item<T: Serialize>(
        &self,
        item: &T,
        out: &mut dyn std::io::Write,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", serde_json::to_string_pretty(item)?)?;
        Ok(())
    }
}
