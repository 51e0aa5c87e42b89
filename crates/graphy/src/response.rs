use async_graphql_value::{ConstValue, Name};
use serde::ser::{SerializeMap, SerializeSeq};

use crate::GraphqlError;

/// Output of an executed selection, object keys in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseValue {
    #[default]
    Null,
    Const(ConstValue),
    List(Vec<ResponseValue>),
    Object(Vec<(Name, ResponseValue)>),
}

impl ResponseValue {
    pub fn object() -> Self {
        ResponseValue::Object(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ResponseValue::Null | ResponseValue::Const(ConstValue::Null))
    }

    /// Value of an object key.
    pub fn get(&self, key: &str) -> Option<&ResponseValue> {
        match self {
            ResponseValue::Object(fields) => fields.iter().find(|(name, _)| name.as_str() == key).map(|(_, value)| value),
            _ => None,
        }
    }
}

impl serde::Serialize for ResponseValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ResponseValue::Null => serializer.serialize_none(),
            ResponseValue::Const(value) => value.serialize(serializer),
            ResponseValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ResponseValue::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key.as_str(), value)?;
                }
                map.end()
            }
        }
    }
}

/// Result of an operation, or of one subscription event.
///
/// `data` is always present, `errors` only when something failed.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Response {
    pub data: ResponseValue,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub errors: Vec<GraphqlError>,
}

impl Response {
    pub fn new(data: ResponseValue, errors: Vec<GraphqlError>) -> Self {
        Response { data, errors }
    }

    /// A response that failed before anything was executed.
    pub fn from_error(error: impl Into<GraphqlError>) -> Self {
        Response {
            data: ResponseValue::object(),
            errors: vec![error.into()],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
