// [libs/infra/store/src/rows.rs]
/*!
 * =================================================================
 * APARATO: ROW MAPPING HELPERS (V1.1)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: TRANSFORMACIÓN SQLITE -> DOMINIO SIN PÉRDIDA
 * =================================================================
 */

use crate::errors::StoreError;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Row, Value};
use uuid::Uuid;

fn fetch_value(data_row: &Row, column_index: i32) -> Result<Value, StoreError> {
    data_row
        .get_value(column_index)
        .map_err(|extraction_fault| StoreError::MappingError(extraction_fault.to_string()))
}

pub(crate) fn required_text(data_row: &Row, column_index: i32) -> Result<String, StoreError> {
    match fetch_value(data_row, column_index)? {
        Value::Text(text_value) => Ok(text_value),
        other => Err(StoreError::MappingError(format!(
            "column {} expected TEXT, found {:?}",
            column_index, other
        ))),
    }
}

pub(crate) fn optional_text(
    data_row: &Row,
    column_index: i32,
) -> Result<Option<String>, StoreError> {
    match fetch_value(data_row, column_index)? {
        Value::Null => Ok(None),
        Value::Text(text_value) => Ok(Some(text_value)),
        other => Err(StoreError::MappingError(format!(
            "column {} expected TEXT|NULL, found {:?}",
            column_index, other
        ))),
    }
}

pub(crate) fn required_real(data_row: &Row, column_index: i32) -> Result<f64, StoreError> {
    match fetch_value(data_row, column_index)? {
        Value::Real(real_value) => Ok(real_value),
        Value::Integer(integer_value) => Ok(integer_value as f64),
        other => Err(StoreError::MappingError(format!(
            "column {} expected REAL, found {:?}",
            column_index, other
        ))),
    }
}

pub(crate) fn optional_real(
    data_row: &Row,
    column_index: i32,
) -> Result<Option<f64>, StoreError> {
    match fetch_value(data_row, column_index)? {
        Value::Null => Ok(None),
        Value::Real(real_value) => Ok(Some(real_value)),
        Value::Integer(integer_value) => Ok(Some(integer_value as f64)),
        other => Err(StoreError::MappingError(format!(
            "column {} expected REAL|NULL, found {:?}",
            column_index, other
        ))),
    }
}

pub(crate) fn required_integer(data_row: &Row, column_index: i32) -> Result<i64, StoreError> {
    match fetch_value(data_row, column_index)? {
        Value::Integer(integer_value) => Ok(integer_value),
        other => Err(StoreError::MappingError(format!(
            "column {} expected INTEGER, found {:?}",
            column_index, other
        ))),
    }
}

pub(crate) fn required_flag(data_row: &Row, column_index: i32) -> Result<bool, StoreError> {
    Ok(required_integer(data_row, column_index)? != 0)
}

pub(crate) fn parse_identifier(raw_identifier: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw_identifier).map_err(|parse_fault| {
        StoreError::MappingError(format!("UUID_VIOLATION '{}': {}", raw_identifier, parse_fault))
    })
}

pub(crate) fn optional_identifier(
    data_row: &Row,
    column_index: i32,
) -> Result<Option<Uuid>, StoreError> {
    optional_text(data_row, column_index)?
        .map(|raw_identifier| parse_identifier(&raw_identifier))
        .transpose()
}

/// Proyección explícita de opcionales a valores SQL anulables.
pub(crate) fn nullable_text(optional_text_value: Option<String>) -> Value {
    match optional_text_value {
        Some(text_value) => Value::Text(text_value),
        None => Value::Null,
    }
}

pub(crate) fn nullable_real(optional_real_value: Option<f64>) -> Value {
    match optional_real_value {
        Some(real_value) => Value::Real(real_value),
        None => Value::Null,
    }
}

/// Acepta RFC3339 (escrituras del núcleo) y el formato espacial de
/// CURRENT_TIMESTAMP como contingencia.
pub(crate) fn parse_instant(raw_instant: &str) -> Result<DateTime<Utc>, StoreError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw_instant) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw_instant, "%Y-%m-%d %H:%M:%S")
        .map(|naive_instant| DateTime::<Utc>::from_naive_utc_and_offset(naive_instant, Utc))
        .map_err(|parse_fault| {
            StoreError::MappingError(format!(
                "TIMESTAMP_VIOLATION '{}': {}",
                raw_instant, parse_fault
            ))
        })
}
