//! Decode Postgres rows into JSON objects, column by column.
//!
//! Timestamps are rendered in UTC with millisecond precision
//! (`2017-02-22T00:00:00.000Z`). NUMERIC columns become JSON numbers.

use crate::store::Row;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row as _};

pub fn row_to_json(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.name())))
        .collect()
}

/// Try the column against each type the disaster schema uses; NULL and anything else become `null`.
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(d)) = row.try_get::<Option<Decimal>, _>(name) {
        return decimal_value(d);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        return float_value(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        return float_value(f64::from(n));
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(ts)) = row.try_get::<Option<DateTime<Utc>>, _>(name) {
        return timestamp_value(ts);
    }
    // `timestamp without time zone` columns hold UTC instants in this schema.
    if let Ok(Some(ts)) = row.try_get::<Option<NaiveDateTime>, _>(name) {
        return timestamp_value(ts.and_utc());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

fn timestamp_value(ts: DateTime<Utc>) -> Value {
    Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Integral decimals stay integers; others go through f64, falling back to the exact text.
fn decimal_value(d: Decimal) -> Value {
    if d.fract().is_zero() {
        if let Some(n) = d.to_i64() {
            return Value::Number(n.into());
        }
    }
    d.to_f64()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

fn float_value(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    #[test]
    fn timestamps_render_in_utc_with_millis() {
        let ts = Utc.with_ymd_and_hms(2017, 2, 22, 0, 0, 0).unwrap();
        assert_eq!(timestamp_value(ts), Value::String("2017-02-22T00:00:00.000Z".into()));
    }

    #[test]
    fn numeric_values_become_json_numbers() {
        assert_eq!(decimal_value(Decimal::from_str("20").unwrap()), serde_json::json!(20));
        assert_eq!(decimal_value(Decimal::from_str("20.5").unwrap()), serde_json::json!(20.5));
        assert_eq!(decimal_value(Decimal::from_str("-3.00").unwrap()), serde_json::json!(-3));
    }

    #[test]
    fn non_finite_floats_are_null() {
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
    }
}
