use crate::CodeId;

/// A failure while uploading or instantiating a contract.
/// Every variant is fatal: the deployer never hands out a partial contract reference.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    #[error("failed to upload contract (code {code}): {raw_log}")]
    UploadFailed { code: u32, raw_log: String },

    #[error("upload response carries no `code_id` attribute")]
    MissingCodeId,

    #[error("invalid code id: {0:?}")]
    InvalidCodeId(String),

    #[error("failed to get code hash for code id {0}")]
    MissingCodeHash(CodeId),

    #[error("failed to instantiate the contract (code {code}): {raw_log}")]
    InstantiateFailed { code: u32, raw_log: String },

    #[error("instantiate response carries no `message` log with a `contract_address` key")]
    MissingContractAddress,

    #[error("contract reference is incomplete: code hash {code_hash:?}, address {address:?}")]
    IncompleteContractRef { code_hash: String, address: String },
}

/// A failure while talking to an already deployed contract.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("query failed with the following err: {0}")]
    QueryErrorMarker(String),

    #[error("transaction failed (code {code}): {raw_log}")]
    ExecuteFailed { code: u32, raw_log: String },

    #[error("code hash mismatch: expected {expected}, chain reports {actual}")]
    CodeHashMismatch { expected: String, actual: String },

    #[error("malformed contract response: {0}")]
    MalformedResponse(String),
}
