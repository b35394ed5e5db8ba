//! TOML decoder.

use crate::error::ConfigError;
use crate::format::Formatter;
use crate::value::Value;

pub struct Toml;

impl Formatter for Toml {
    fn parse(&self, raw: &[u8]) -> Result<Value, ConfigError> {
        let text = std::str::from_utf8(raw).map_err(|e| ConfigError::decode("toml", e))?;
        let table: toml::Table = toml::from_str(text).map_err(|e| ConfigError::decode("toml", e))?;
        Ok(convert_table(table))
    }
}

fn convert_table(table: toml::Table) -> Value {
    Value::Map(
        table
            .into_iter()
            .map(|(key, value)| (key, convert(value)))
            .collect(),
    )
}

fn convert(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i as f64),
        toml::Value::Float(f) => Value::Number(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        // TOML has no null; datetimes carry through as their text form.
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(convert).collect()),
        toml::Value::Table(table) => convert_table(table),
    }
}
