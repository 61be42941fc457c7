//! Request and response data models.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

/// Columns that every equipment dataset must provide.
///
/// The display form is the literal CSV header.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Column {
    Type,
    Flowrate,
    Pressure,
    Temperature,
}

/// Bound fields accepted by the record filter.
///
/// The display form is the query string parameter name.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum FilterField {
    PressureMin,
    PressureMax,
    TemperatureMin,
    TemperatureMax,
}

/// Optional, conjunctive filter predicates for the records endpoint.
///
/// Numeric bounds arrive as raw query string values and are parsed by the
/// filter, so a bad value can be reported against the field it came from.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct FilterQuery {
    /// Exact match against the `Type` column.
    #[serde(rename = "type")]
    pub equipment_type: Option<String>,
    /// Case-insensitive substring match against the dataset's name column.
    pub name: Option<String>,
    /// Inclusive lower bound on `Pressure`.
    pub pressure_min: Option<String>,
    /// Inclusive upper bound on `Pressure`.
    pub pressure_max: Option<String>,
    /// Inclusive lower bound on `Temperature`.
    pub temperature_min: Option<String>,
    /// Inclusive upper bound on `Temperature`.
    pub temperature_max: Option<String>,
}

/// Inclusive min/max of a numeric column.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// One row of a filtered view.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterRecord {
    #[serde(rename = "type")]
    pub equipment_type: String,
    pub flowrate: f64,
    pub pressure: f64,
    pub temperature: f64,
    /// Omitted entirely when the dataset has no name column; `null` when the
    /// column exists but the row has no value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
}

/// Filtered records plus metadata describing the *unfiltered* table, so that
/// a client can populate its filter controls from any response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterResult {
    /// Rows matching every supplied predicate, in dataset order.
    pub records: Vec<FilterRecord>,
    /// Number of matching rows.
    pub total: i64,
    /// Sorted distinct `Type` values of the whole table.
    pub available_types: Vec<String>,
    /// Min/max `Pressure` across the whole table.
    pub pressure_range: Range,
    /// Min/max `Temperature` across the whole table.
    pub temperature_range: Range,
    /// Whether the dataset has a name column.
    pub name_supported: bool,
}

/// Summary statistics over a validated table.
///
/// Averages are arithmetic means rounded to two decimal places, half away
/// from zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryStatistics {
    /// Number of rows in the table.
    pub total_equipment: i64,
    pub average_flowrate: f64,
    pub average_pressure: f64,
    pub average_temperature: f64,
    /// Row count per distinct `Type` value, exact string equality.
    pub equipment_type_distribution: HashMap<String, i64>,
}

/// Request data for the registration endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Request data for the login endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// Response data for the registration and login endpoints.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub message: String,
}

/// Dataset owner as embedded in dataset responses.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OwnerInfo {
    pub id: Uuid,
    pub username: String,
}

/// Response data describing a stored dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub id: Uuid,
    /// File name supplied with the upload.
    pub filename: String,
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded_at: OffsetDateTime,
    pub size_bytes: u64,
    pub owner: OwnerInfo,
}

/// Response data describing a registered user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}
