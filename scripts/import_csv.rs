//! CSV import for the inventory store.
//!
//! Reads a spreadsheet export and writes one document per row into the
//! records tree, each under a fresh id. Headers are trimmed; cells that
//! parse as numbers are stored as numbers so later comparisons and the
//! CSV export round-trip cleanly.
//!
//! Run: cargo run --bin import_csv -- --csv "ICT Inventory.csv"

use clap::Parser;
use serde_json::Value;

use ict_inventory::models::Record;
use ict_inventory::storage::Storage;

#[derive(Parser, Debug)]
#[command(name = "import_csv", about = "Load a CSV export into the inventory store")]
struct Options {
    /// CSV file to import
    #[arg(long, default_value = "ICT Inventory.csv")]
    csv: String,

    /// Directory for the sled store
    #[arg(long, env = "INVENTORY_DATA", default_value = "inventory_data")]
    data_dir: String,
}

/// Numeric-looking cells become numbers, everything else stays a string.
fn parse_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(trimmed.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = Options::parse();

    let storage = Storage::open(&options.data_dir)?;
    let mut reader = csv::Reader::from_path(&options.csv)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut imported = 0usize;
    for result in reader.records() {
        let row = result?;
        let mut record = Record::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            record.insert(header.clone(), parse_cell(cell));
        }
        storage.insert_record(record)?;
        imported += 1;
    }

    println!(
        "✅ Imported {imported} records from {} into {} ({} total)",
        options.csv,
        options.data_dir,
        storage.record_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_cells_become_numbers() {
        assert_eq!(parse_cell("42"), Value::from(42));
        assert_eq!(parse_cell(" 3.5 "), Value::from(3.5));
        assert_eq!(parse_cell("PC-42"), Value::String("PC-42".into()));
        assert_eq!(parse_cell(""), Value::String("".into()));
    }
}
