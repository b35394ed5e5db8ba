//! Line-based `KEY=VALUE` decoder, as produced by environment scrapes and
//! dotenv-style payloads. Every value decodes as a string.

use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::format::Formatter;
use crate::value::Value;

pub struct Env;

impl Formatter for Env {
    fn parse(&self, raw: &[u8]) -> Result<Value, ConfigError> {
        let text = std::str::from_utf8(raw).map_err(|e| ConfigError::decode("env", e))?;
        let mut fields = BTreeMap::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            // The first '=' splits key from value; values may contain '='.
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::decode(
                    "env",
                    format!("line {line:?} has no '=' separator"),
                ));
            };
            if key.is_empty() {
                return Err(ConfigError::decode("env", format!("line {line:?} has an empty key")));
            }
            fields.insert(key.to_string(), Value::String(value.to_string()));
        }
        Ok(Value::Map(fields))
    }
}
