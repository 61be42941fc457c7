//! Schema validation of uploaded CSV data.
//!
//! A dataset is accepted only if it parses as CSV with a header row, carries
//! the `Type`, `Flowrate`, `Pressure` and `Temperature` columns, and every
//! value in the numeric columns is a finite number. Acceptance is
//! all-or-nothing: the first problem rejects the whole file and nothing is
//! stored.
//!
//! An optional equipment name column is detected by header alias; its
//! presence is recorded on the table so that downstream filtering knows
//! whether name predicates are supported.

use crate::error::EquistatError;
use crate::models::Column;

/// Column headers accepted as the equipment name column, in priority order.
///
/// The first alias present in the header row wins, regardless of the order
/// the columns appear in the file.
pub const NAME_ALIASES: [&str; 3] = ["Equipment", "Equipment Name", "Name"];

/// One validated row of an equipment dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct EquipmentRecord {
    pub equipment_type: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
    /// `None` when the dataset has no name column or the cell is empty.
    pub name: Option<String>,
}

/// A validated equipment table.
///
/// Holds at least one row, and every numeric field is finite. Construct via
/// [validate].
#[derive(Clone, Debug, PartialEq)]
pub struct EquipmentTable {
    /// Rows in file order.
    pub records: Vec<EquipmentRecord>,
    /// Whether a name column was detected.
    pub name_supported: bool,
}

/// Validate raw CSV bytes into an [EquipmentTable].
///
/// Headers and fields are whitespace-trimmed. Row numbers in errors are
/// 1-based over data rows; the header row is not counted.
pub fn validate(data: &[u8]) -> Result<EquipmentTable, EquistatError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(data);
    let headers = reader.headers()?.clone();

    // Required columns, checked in the order missing-column errors report
    // them.
    let type_index = find_column(&headers, Column::Type)?;
    let flowrate_index = find_column(&headers, Column::Flowrate)?;
    let pressure_index = find_column(&headers, Column::Pressure)?;
    let temperature_index = find_column(&headers, Column::Temperature)?;

    let name_index = NAME_ALIASES
        .iter()
        .find_map(|alias| headers.iter().position(|header| header == *alias));

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let row = i + 1;
        let equipment_type = record.get(type_index).unwrap_or_default().to_string();
        let flowrate = parse_numeric(&record, flowrate_index, Column::Flowrate, row)?;
        let pressure = parse_numeric(&record, pressure_index, Column::Pressure, row)?;
        let temperature = parse_numeric(&record, temperature_index, Column::Temperature, row)?;
        let name = name_index.and_then(|index| {
            let value = record.get(index).unwrap_or_default();
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        });
        records.push(EquipmentRecord {
            equipment_type,
            flowrate,
            pressure,
            temperature,
            name,
        });
    }

    if records.is_empty() {
        return Err(EquistatError::EmptyDataset {
            operation: "accept",
        });
    }

    Ok(EquipmentTable {
        records,
        name_supported: name_index.is_some(),
    })
}

/// Return the index of a required column, or the error naming it.
fn find_column(headers: &csv::StringRecord, column: Column) -> Result<usize, EquistatError> {
    let header = column.to_string();
    headers
        .iter()
        .position(|h| h == header)
        .ok_or(EquistatError::MissingColumn { column })
}

/// Parse one numeric cell.
///
/// `NaN` and infinities parse as f64 but are rejected here, so aggregation
/// and range metadata never see a non-finite value.
fn parse_numeric(
    record: &csv::StringRecord,
    index: usize,
    column: Column,
    row: usize,
) -> Result<f64, EquistatError> {
    let raw = record.get(index).unwrap_or_default();
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(EquistatError::NonNumericValue { column, row }),
    }
}
