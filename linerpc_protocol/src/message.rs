use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// One request read off a connection.
///
/// `params` and `id` are kept as raw JSON: the id is echoed back untouched,
/// and the params are only given a shape once the target method is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl Call {
    pub fn new<A: Serialize + ?Sized>(method: &str, args: &A, id: Value) -> Result<Self> {
        Ok(Call {
            method: method.to_owned(),
            params: Value::Array(vec![serde_json::to_value(args)?]),
            id,
        })
    }

    pub fn service_and_method(&self) -> Option<(&str, &str)> {
        split_method(&self.method)
    }
}

/// Splits `Service.Method` at the last dot.
pub fn split_method(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    Some((&name[..dot], &name[dot + 1..]))
}

/// The answer to one [`Call`].
///
/// Exactly one of `result` and `error` is set; the other goes on the wire as
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Reply {
    pub fn success(id: Value, result: Value) -> Self {
        Reply {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, message: impl Into<String>) -> Self {
        Reply {
            id,
            result: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Converts the reply into the typed result it carries.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        if let Some(err) = self.error {
            return Err(Error::Server(err));
        }
        let value = self.result.unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}

/// Decodes the single positional parameter of a call into `T`.
///
/// The array must hold exactly one element. An empty array is not read as
/// zero-valued args and extra elements are not ignored; both are rejected.
pub fn decode_params<T: DeserializeOwned>(params: &Value) -> Result<T> {
    let items = match params {
        Value::Array(items) => items,
        Value::Null => return Err(Error::InvalidParams("missing params".to_owned())),
        _ => return Err(Error::InvalidParams("params must be an array".to_owned())),
    };
    if items.len() != 1 {
        return Err(Error::InvalidParams(format!(
            "expected 1 positional param, got {}",
            items.len()
        )));
    }
    T::deserialize(&items[0]).map_err(|err| Error::InvalidParams(err.to_string()))
}

pub fn encode_result<T: Serialize>(result: &T) -> Result<Value> {
    Ok(serde_json::to_value(result)?)
}
