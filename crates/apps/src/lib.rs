use clap::Args;
use std::path::PathBuf;
use std::time::Duration;
use test_toolkit::faucet::FundingPolicy;
use test_toolkit::ClientConfig;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Node, faucet and funding options shared by every binary.
#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// Node REST (LCD) endpoint URL
    #[arg(long, env = "SECRET_LCD_URL", default_value = "http://localhost:1317")]
    pub lcd_url: Url,

    /// Node RPC endpoint used to broadcast transactions
    #[arg(long, env = "SECRET_NODE_URL", default_value = "tcp://localhost:26657")]
    pub node_url: String,

    /// Chain identifier
    #[arg(long, env = "SECRET_CHAIN_ID", default_value = "secretdev-1")]
    pub chain_id: String,

    /// Path to the `secretd` binary
    #[arg(long, env = "SECRETD_BIN", default_value = "secretd")]
    pub secretd_bin: PathBuf,

    /// Run `secretd` inside this docker container
    #[arg(long, env = "SECRETD_CONTAINER")]
    pub docker_container: Option<String>,

    /// Gas prices attached to every transaction
    #[arg(long, default_value = "0.25uscrt")]
    pub gas_prices: String,

    /// Seconds to wait for a transaction to be included in a block
    #[arg(long, default_value_t = 60)]
    pub tx_timeout_secs: u64,

    /// Seconds a single `secretd` invocation may run before it is killed
    #[arg(long, default_value_t = 120)]
    pub command_timeout_secs: u64,

    /// Faucet base URL
    #[arg(long, env = "FAUCET_URL", default_value = "http://localhost:5000")]
    pub faucet_url: Url,

    /// Balance to reach before deploying
    #[arg(long, env = "TARGET_BALANCE", default_value_t = 100_000_000)]
    pub target_balance: u128,

    /// Denomination of the target balance
    #[arg(long, default_value = "uscrt")]
    pub denom: String,

    /// Give up funding after this many faucet requests (retries forever if unset)
    #[arg(long)]
    pub faucet_max_attempts: Option<u32>,

    /// Milliseconds to wait between faucet requests
    #[arg(long, default_value_t = 0)]
    pub faucet_retry_delay_ms: u64,

    /// Compiled contract bytecode
    #[arg(long, env = "CONTRACT_PATH", default_value = "contract.wasm")]
    pub contract_path: PathBuf,
}

impl NetworkArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            lcd_url: self.lcd_url.clone(),
            node_url: self.node_url.clone(),
            chain_id: self.chain_id.clone(),
            secretd_bin: self.secretd_bin.clone(),
            docker_container: self.docker_container.clone(),
            gas_prices: self.gas_prices.clone(),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            tx_timeout: Duration::from_secs(self.tx_timeout_secs),
            ..Default::default()
        }
    }

    pub fn funding_policy(&self) -> FundingPolicy {
        FundingPolicy {
            target: self.target_balance,
            denom: self.denom.clone(),
            max_attempts: self.faucet_max_attempts,
            retry_delay: Duration::from_millis(self.faucet_retry_delay_ms),
        }
    }
}

/// Initialize tracing. In order to view logs, run `RUST_LOG=info cargo run`
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
