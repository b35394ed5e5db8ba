//! JSON decoder.

use crate::error::ConfigError;
use crate::format::Formatter;
use crate::value::Value;

pub struct Json;

impl Formatter for Json {
    fn parse(&self, raw: &[u8]) -> Result<Value, ConfigError> {
        let json: serde_json::Value =
            serde_json::from_slice(raw).map_err(|e| ConfigError::decode("json", e))?;
        if !json.is_object() {
            return Err(ConfigError::decode("json", "document is not an object"));
        }
        Ok(Value::from(json))
    }
}
