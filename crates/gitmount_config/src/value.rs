//! Configuration values.

/// A node of a loaded configuration tree.
///
/// Maps keep their file order; host-affinity ties are broken by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    /// A leaf value.
    Scalar(String),
    /// An ordered list.
    List(Vec<ConfigValue>),
    /// An ordered mapping.
    Map(Vec<(String, ConfigValue)>),
}

impl ConfigValue {
    /// Creates a scalar.
    pub fn scalar(s: impl Into<String>) -> Self {
        ConfigValue::Scalar(s.into())
    }

    /// Creates a map from pairs.
    pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, ConfigValue)>) -> Self {
        ConfigValue::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Looks up `key` in a map; `None` for scalars and lists.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Returns the scalar text, if this is a scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a JSON document. `null` members are dropped.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        use serde_json::Value;
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(ConfigValue::Scalar(b.to_string())),
            Value::Number(n) => Some(ConfigValue::Scalar(n.to_string())),
            Value::String(s) => Some(ConfigValue::Scalar(s)),
            Value::Array(items) => Some(ConfigValue::List(
                items.into_iter().filter_map(Self::from_json).collect(),
            )),
            Value::Object(members) => Some(ConfigValue::Map(
                members
                    .into_iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k, v)))
                    .collect(),
            )),
        }
    }
}
