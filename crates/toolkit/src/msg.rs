//! JSON messages understood by the counter contract.

use crate::errors::ContractError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateMsg {
    pub count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    Increment {},
    Reset { count: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    // GetCount returns the current count as a json-encoded number
    GetCount {},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCountResponse {
    pub count: i32,
}

/// Decodes a raw contract query answer.
///
/// Contracts report failures in-band as an object with an `err` (or `error`) key, so the body
/// is checked for such a marker before it is decoded into `T`.
pub fn parse_query_response<T: DeserializeOwned>(raw: &str) -> Result<T, ContractError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())
        .map_err(|e| ContractError::MalformedResponse(format!("{e}: {raw}")))?;

    if let Some(object) = value.as_object() {
        if object.contains_key("err") || object.contains_key("error") {
            return Err(ContractError::QueryErrorMarker(value.to_string()));
        }
    }

    serde_json::from_value(value)
        .map_err(|e| ContractError::MalformedResponse(format!("{e}: {raw}")))
}
