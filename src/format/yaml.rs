//! YAML decoder.

use serde_yaml::Value as Yml;

use crate::error::ConfigError;
use crate::format::Formatter;
use crate::value::Value;

pub struct Yaml;

impl Formatter for Yaml {
    fn parse(&self, raw: &[u8]) -> Result<Value, ConfigError> {
        let doc: Yml = serde_yaml::from_slice(raw).map_err(|e| ConfigError::decode("yaml", e))?;
        match convert(doc)? {
            tree @ Value::Map(_) => Ok(tree),
            _ => Err(ConfigError::decode("yaml", "document is not a mapping")),
        }
    }
}

fn convert(doc: Yml) -> Result<Value, ConfigError> {
    Ok(match doc {
        Yml::Null => Value::Null,
        Yml::Bool(b) => Value::Bool(b),
        Yml::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Yml::String(s) => Value::String(s),
        Yml::Sequence(items) => {
            Value::List(items.into_iter().map(convert).collect::<Result<_, _>>()?)
        }
        Yml::Mapping(fields) => {
            let mut map = std::collections::BTreeMap::new();
            for (key, value) in fields {
                let Yml::String(key) = key else {
                    return Err(ConfigError::decode("yaml", "mapping key is not a string"));
                };
                map.insert(key, convert(value)?);
            }
            Value::Map(map)
        }
        Yml::Tagged(tagged) => {
            return Err(ConfigError::decode(
                "yaml",
                format!("unsupported tag {}", tagged.tag),
            ));
        }
    })
}
