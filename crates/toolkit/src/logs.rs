//! Model of a transaction as reported by the node once it has been included in a block, and
//! the helpers that pull deployment results out of its emitted events.

use crate::errors::DeployError;
use crate::CodeId;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Events emitted by a single message of a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLog {
    #[serde(default)]
    pub msg_index: u32,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// One `(event type, key, value)` row of a flattened transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    pub txhash: String,
    #[serde(default, deserialize_with = "u64_from_str_or_number")]
    pub height: u64,
    /// Result code, zero on success.
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default)]
    pub logs: Vec<TxLog>,
    #[serde(default, deserialize_with = "u64_from_str_or_number")]
    pub gas_wanted: u64,
    #[serde(default, deserialize_with = "u64_from_str_or_number")]
    pub gas_used: u64,
    /// Block-level events. Newer nodes leave `logs` empty and only fill this.
    #[serde(default)]
    pub events: Vec<Event>,
}

impl TxResponse {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Flattens the per-message logs into rows, falling back to block-level events when the
    /// node reported no per-message logs.
    pub fn array_log(&self) -> Vec<LogEntry> {
        if self.logs.is_empty() {
            return flatten(&self.events);
        }

        self.logs
            .iter()
            .flat_map(|log| flatten(&log.events))
            .collect()
    }

    fn events(&self) -> impl Iterator<Item = &Event> {
        self.logs
            .iter()
            .flat_map(|log| log.events.iter())
            .chain(self.events.iter())
    }
}

fn flatten(events: &[Event]) -> Vec<LogEntry> {
    events
        .iter()
        .flat_map(|event| {
            event.attributes.iter().map(move |attribute| LogEntry {
                kind: event.kind.clone(),
                key: attribute.key.clone(),
                value: attribute.value.clone(),
            })
        })
        .collect()
}

/// Finds the code identifier the chain assigned to freshly uploaded bytecode.
pub fn extract_code_id(tx: &TxResponse) -> Result<CodeId, DeployError> {
    let value = tx
        .events()
        .flat_map(|event| event.attributes.iter())
        .find(|attribute| attribute.key == "code_id")
        .map(|attribute| attribute.value.as_str())
        .ok_or(DeployError::MissingCodeId)?;

    value.parse()
}

/// Finds the address of a freshly instantiated contract.
pub fn extract_contract_address(tx: &TxResponse) -> Result<String, DeployError> {
    tx.array_log()
        .into_iter()
        .find(|entry| entry.kind == "message" && entry.key == "contract_address")
        .map(|entry| entry.value)
        .filter(|address| !address.is_empty())
        .ok_or(DeployError::MissingContractAddress)
}

fn u64_from_str_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE_CODE_TX: &str = r#"{
        "height": "42",
        "txhash": "A1B2",
        "code": 0,
        "raw_log": "",
        "logs": [{
            "msg_index": 0,
            "events": [
                {"type": "message", "attributes": [
                    {"key": "action", "value": "/secret.compute.v1beta1.MsgStoreCode"},
                    {"key": "code_id", "value": "7"}
                ]}
            ]
        }],
        "gas_wanted": "5000000",
        "gas_used": "1377652"
    }"#;

    const INSTANTIATE_TX: &str = r#"{
        "height": "43",
        "txhash": "C3D4",
        "code": 0,
        "logs": [{
            "msg_index": 0,
            "events": [
                {"type": "wasm", "attributes": [
                    {"key": "contract_address", "value": "secret1wrong"}
                ]},
                {"type": "message", "attributes": [
                    {"key": "module", "value": "compute"},
                    {"key": "contract_address", "value": "secret1contract"}
                ]}
            ]
        }],
        "gas_wanted": 1000000,
        "gas_used": 61234
    }"#;

    #[test]
    fn parses_node_tx_response() {
        let tx: TxResponse = serde_json::from_str(STORE_CODE_TX).unwrap();
        assert!(tx.is_success());
        assert_eq!(tx.height, 42);
        assert_eq!(tx.gas_wanted, 5_000_000);
        assert_eq!(tx.gas_used, 1_377_652);
        assert_eq!(extract_code_id(&tx).unwrap(), CodeId(7));
    }

    #[test]
    fn contract_address_comes_from_message_log() {
        let tx: TxResponse = serde_json::from_str(INSTANTIATE_TX).unwrap();
        assert_eq!(tx.gas_used, 61_234);
        assert_eq!(extract_contract_address(&tx).unwrap(), "secret1contract");
    }

    #[test]
    fn missing_code_id_is_an_error() {
        let tx: TxResponse = serde_json::from_str(INSTANTIATE_TX).unwrap();
        assert_eq!(extract_code_id(&tx), Err(DeployError::MissingCodeId));
    }

    #[test]
    fn malformed_code_id_is_an_error() {
        let tx = TxResponse {
            events: vec![Event {
                kind: "message".into(),
                attributes: vec![Attribute {
                    key: "code_id".into(),
                    value: "seven".into(),
                }],
            }],
            ..Default::default()
        };
        assert_eq!(
            extract_code_id(&tx),
            Err(DeployError::InvalidCodeId("seven".into()))
        );
    }

    #[test]
    fn missing_contract_address_is_an_error() {
        let tx: TxResponse = serde_json::from_str(STORE_CODE_TX).unwrap();
        assert_eq!(
            extract_contract_address(&tx),
            Err(DeployError::MissingContractAddress)
        );
    }

    #[test]
    fn block_events_are_used_without_logs() {
        let tx = TxResponse {
            events: vec![Event {
                kind: "message".into(),
                attributes: vec![Attribute {
                    key: "contract_address".into(),
                    value: "secret1fromevents".into(),
                }],
            }],
            ..Default::default()
        };
        assert_eq!(extract_contract_address(&tx).unwrap(), "secret1fromevents");
        assert_eq!(tx.array_log().len(), 1);
    }

    #[test]
    fn array_log_rows_follow_event_order() {
        let tx: TxResponse = serde_json::from_str(INSTANTIATE_TX).unwrap();
        let rows: Vec<_> = tx
            .array_log()
            .into_iter()
            .map(|entry| format!("{}.{}={}", entry.kind, entry.key, entry.value))
            .collect();

        assert_eq!(
            rows,
            [
                "wasm.contract_address=secret1wrong",
                "message.module=compute",
                "message.contract_address=secret1contract",
            ]
        );
    }
}
