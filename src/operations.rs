//! Aggregation and filtering over validated equipment tables.
//!
//! Both entry points are pure functions: they never mutate the table, so
//! repeated calls with the same inputs return the same results.

use hashbrown::HashMap;

use crate::error::EquistatError;
use crate::models::{
    FilterField, FilterQuery, FilterRecord, FilterResult, Range, SummaryStatistics,
};
use crate::table::{EquipmentRecord, EquipmentTable};

/// Round to two decimal places, half away from zero.
///
/// The single rounding rule for all reported averages.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute summary statistics over a table.
pub fn summarize(table: &EquipmentTable) -> Result<SummaryStatistics, EquistatError> {
    if table.records.is_empty() {
        return Err(EquistatError::EmptyDataset {
            operation: "summarize",
        });
    }

    let mut flowrate_sum = 0.0;
    let mut pressure_sum = 0.0;
    let mut temperature_sum = 0.0;
    let mut distribution: HashMap<String, i64> = HashMap::new();
    for record in &table.records {
        flowrate_sum += record.flowrate;
        pressure_sum += record.pressure;
        temperature_sum += record.temperature;
        *distribution
            .entry_ref(record.equipment_type.as_str())
            .or_insert(0) += 1;
    }

    let count = table.records.len();
    let denominator = count as f64;
    Ok(SummaryStatistics {
        total_equipment: i64::try_from(count)?,
        average_flowrate: round2(flowrate_sum / denominator),
        average_pressure: round2(pressure_sum / denominator),
        average_temperature: round2(temperature_sum / denominator),
        equipment_type_distribution: distribution,
    })
}

/// Apply filter predicates to a table and assemble the filtered view.
///
/// Predicates are conjunctive and applied in a fixed order: type, name,
/// pressure bounds, temperature bounds. The metadata fields (available
/// types and value ranges) always describe the unfiltered table, so a
/// client can rebuild its filter controls from any response.
pub fn filter(table: &EquipmentTable, query: &FilterQuery) -> Result<FilterResult, EquistatError> {
    if table.records.is_empty() {
        return Err(EquistatError::EmptyDataset {
            operation: "filter",
        });
    }

    let mut rows: Vec<&EquipmentRecord> = table.records.iter().collect();

    if let Some(equipment_type) = &query.equipment_type {
        // Exact match, no case folding.
        rows.retain(|record| record.equipment_type == *equipment_type);
    }

    if let Some(name) = &query.name {
        if !table.name_supported {
            return Err(EquistatError::UnsupportedFilter);
        }
        let needle = name.to_lowercase();
        // Rows without a name never match, but are not an error.
        rows.retain(|record| {
            record
                .name
                .as_ref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        });
    }

    let pressure = Bounds::parse(
        FilterField::PressureMin,
        &query.pressure_min,
        FilterField::PressureMax,
        &query.pressure_max,
    )?;
    rows.retain(|record| pressure.contains(record.pressure));

    let temperature = Bounds::parse(
        FilterField::TemperatureMin,
        &query.temperature_min,
        FilterField::TemperatureMax,
        &query.temperature_max,
    )?;
    rows.retain(|record| temperature.contains(record.temperature));

    let mut available_types: Vec<String> = table
        .records
        .iter()
        .map(|record| record.equipment_type.clone())
        .collect();
    available_types.sort();
    available_types.dedup();

    let records: Vec<FilterRecord> = rows
        .iter()
        .map(|record| FilterRecord {
            equipment_type: record.equipment_type.clone(),
            flowrate: record.flowrate,
            pressure: record.pressure,
            temperature: record.temperature,
            name: table.name_supported.then(|| record.name.clone()),
        })
        .collect();

    Ok(FilterResult {
        total: i64::try_from(records.len())?,
        records,
        available_types,
        pressure_range: column_range(table, |record| record.pressure),
        temperature_range: column_range(table, |record| record.temperature),
        name_supported: table.name_supported,
    })
}

/// Inclusive numeric bounds parsed from raw query values.
struct Bounds {
    min: Option<f64>,
    max: Option<f64>,
}

impl Bounds {
    fn parse(
        min_field: FilterField,
        min: &Option<String>,
        max_field: FilterField,
        max: &Option<String>,
    ) -> Result<Self, EquistatError> {
        Ok(Bounds {
            min: parse_bound(min_field, min)?,
            max: parse_bound(max_field, max)?,
        })
    }

    /// An unset bound does not constrain. `min > max` is permitted and
    /// simply matches nothing.
    fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Parse one bound, rejecting anything that is not a finite number.
fn parse_bound(field: FilterField, raw: &Option<String>) -> Result<Option<f64>, EquistatError> {
    match raw {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Err(EquistatError::InvalidFilterValue {
                field,
                value: raw.clone(),
            }),
        },
    }
}

/// Min/max of one column over the whole table.
fn column_range<F>(table: &EquipmentTable, value: F) -> Range
where
    F: Fn(&EquipmentRecord) -> f64,
{
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for record in &table.records {
        let v = value(record);
        min = min.min(v);
        max = max.max(v);
    }
    Range { min, max }
}
