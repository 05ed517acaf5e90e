//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a serializable value in a machine format; false for table/plain
fn print_structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> bool {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
            true
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(value).unwrap_or_default());
            true
        }
        OutputFormat::Table | OutputFormat::Plain => false,
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if print_structured(items, format) {
        return;
    }

    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{}: {}", header, value);
                }
            }
        }
        _ => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
    }
}

/// Print a value as JSON/YAML, or fall back to a table of rows
pub fn print_report<T: Serialize, R: TableDisplay>(value: &T, rows: &[R], format: OutputFormat) {
    if print_structured(value, format) {
        return;
    }
    print_rows(rows, format);
}

fn print_rows<R: TableDisplay>(rows: &[R], format: OutputFormat) {
    match format {
        OutputFormat::Plain => {
            for row in rows {
                println!("{}", row.row().join("  "));
            }
        }
        _ => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(R::headers());
            for row in rows {
                table.add_row(row.row());
            }
            println!("{table}");
        }
    }
}

/// Pass/fail marker for table cells
pub fn status(passed: bool) -> String {
    if passed {
        "PASS".green().bold().to_string()
    } else {
        "FAIL".red().bold().to_string()
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
