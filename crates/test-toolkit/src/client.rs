use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use toolkit::errors::ContractError;
use toolkit::logs::TxResponse;
use toolkit::{CodeId, Coin, ContractRef};
use url::Url;

/// A wallet identity created for a single run. It is never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Name of the key in the signer's keyring.
    pub name: String,
    pub address: String,
}

/// Where the node lives and how to reach it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST (LCD) endpoint used for balances, code hashes and transaction lookups.
    pub lcd_url: Url,
    /// RPC endpoint the signing CLI broadcasts to.
    pub node_url: String,
    pub chain_id: String,
    pub secretd_bin: PathBuf,
    /// Run the signing CLI inside this container through `docker exec`.
    pub docker_container: Option<String>,
    pub gas_prices: String,
    /// Upper bound for a single CLI invocation.
    pub command_timeout: Duration,
    pub tx_timeout: Duration,
    pub tx_poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            lcd_url: Url::parse("http://localhost:1317").expect("static url is valid"),
            node_url: "tcp://localhost:26657".to_string(),
            chain_id: "secretdev-1".to_string(),
            secretd_bin: PathBuf::from("secretd"),
            docker_container: None,
            gas_prices: "0.25uscrt".to_string(),
            command_timeout: Duration::from_secs(120),
            tx_timeout: Duration::from_secs(60),
            tx_poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` did not finish within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("transaction {txhash} was not included within {timeout:?}")]
    TxTimeout { txhash: String, timeout: Duration },

    #[error("no contract at address {0}")]
    UnknownContract(String),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Everything the tests need from a network client. Signing, encryption and transport are
/// the implementor's business.
///
/// Transactions resolve only once the node reports them included in a block; a non-zero
/// `code` in the returned [`TxResponse`] means the chain rejected them.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the identity this client signs with.
    fn address(&self) -> &str;

    /// Balance of `denom` for this client's address, `None` if the node did not report one.
    async fn balance(&self, denom: &str) -> Result<Option<Coin>, ClientError>;

    async fn store_code(&self, wasm: &[u8], gas_limit: u64) -> Result<TxResponse, ClientError>;

    async fn code_hash_by_code_id(&self, code_id: CodeId) -> Result<Option<String>, ClientError>;

    async fn instantiate(
        &self,
        code_id: CodeId,
        code_hash: &str,
        init_msg: &serde_json::Value,
        label: &str,
        gas_limit: u64,
    ) -> Result<TxResponse, ClientError>;

    /// Read-only call. Returns the contract's raw JSON answer.
    async fn query_contract(
        &self,
        contract: &ContractRef,
        query: &serde_json::Value,
    ) -> Result<String, ClientError>;

    async fn execute_contract(
        &self,
        contract: &ContractRef,
        msg: &serde_json::Value,
        gas_limit: u64,
    ) -> Result<TxResponse, ClientError>;
}

/// Fails unless `actual` designates the same code as the one `contract` was deployed from.
pub(crate) fn check_code_hash(contract: &ContractRef, actual: &str) -> Result<(), ContractError> {
    let normalize = |hash: &str| hash.trim().trim_start_matches("0x").to_ascii_lowercase();

    if normalize(&contract.code_hash) != normalize(actual) {
        return Err(ContractError::CodeHashMismatch {
            expected: contract.code_hash.clone(),
            actual: actual.to_string(),
        });
    }

    Ok(())
}
