pub mod errors;
pub mod logs;
pub mod msg;

use errors::DeployError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Numeric handle the chain assigns to uploaded bytecode. Contract instances are created from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CodeId(pub u64);

impl fmt::Display for CodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CodeId {
    type Err = DeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(CodeId)
            .map_err(|_| DeployError::InvalidCodeId(s.to_string()))
    }
}

/// Identifies a deployed contract instance.
///
/// Both the content hash of its code and its address are required to talk to it, so a
/// reference can only be built once deployment has resolved both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractRef {
    pub code_hash: String,
    pub address: String,
}

impl ContractRef {
    pub fn new(
        code_hash: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Self, DeployError> {
        let code_hash = code_hash.into();
        let address = address.into();

        if code_hash.trim().is_empty() || address.trim().is_empty() {
            return Err(DeployError::IncompleteContractRef { code_hash, address });
        }

        Ok(Self { code_hash, address })
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code hash {})", self.address, self.code_hash)
    }
}

/// An amount of a single denomination. Nodes encode the amount as a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(
        serialize_with = "u128_to_str",
        deserialize_with = "u128_from_str"
    )]
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

fn u128_to_str<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&amount.to_string())
}

fn u128_from_str<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Content hash of contract bytecode, as the chain computes it: lowercase hex sha256.
pub fn wasm_checksum(wasm: &[u8]) -> String {
    hex::encode(Sha256::digest(wasm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_id_parsing() {
        assert_eq!("12".parse::<CodeId>().unwrap(), CodeId(12));
        assert_eq!(
            "".parse::<CodeId>(),
            Err(DeployError::InvalidCodeId(String::new()))
        );
        assert_eq!(
            "-1".parse::<CodeId>(),
            Err(DeployError::InvalidCodeId("-1".into()))
        );
    }

    #[test]
    fn contract_ref_requires_hash_and_address() {
        assert!(ContractRef::new("abcd", "secret1xyz").is_ok());
        assert!(matches!(
            ContractRef::new("", "secret1xyz"),
            Err(DeployError::IncompleteContractRef { .. })
        ));
        assert!(matches!(
            ContractRef::new("abcd", " "),
            Err(DeployError::IncompleteContractRef { .. })
        ));
    }

    #[test]
    fn coin_amount_is_a_decimal_string() {
        let coin: Coin = serde_json::from_str(r#"{"denom":"uscrt","amount":"100000000"}"#).unwrap();
        assert_eq!(coin, Coin::new(100_000_000, "uscrt"));
        assert_eq!(
            serde_json::to_string(&coin).unwrap(),
            r#"{"denom":"uscrt","amount":"100000000"}"#
        );
    }

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            wasm_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
