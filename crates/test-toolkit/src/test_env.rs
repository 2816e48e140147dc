//! Bootstrap of a run: create an identity and client, fund it, deploy the contract.

use crate::client::{ChainClient, ClientConfig};
use crate::deploy::initialize_contract;
use crate::faucet::{fill_up_from_faucet, Faucet, FundingPolicy};
use crate::secretd::SecretdClient;
use anyhow::{Context, Result};
use std::path::Path;
use toolkit::msg::InstantiateMsg;
use toolkit::ContractRef;

/// A funded client together with the contract it deployed.
pub struct TestEnv<C> {
    pub client: C,
    pub contract: ContractRef,
}

/// Creates a fresh random identity and a client bound to it.
pub async fn initialize_client(config: ClientConfig) -> Result<SecretdClient> {
    let client = SecretdClient::new_random(config.clone())
        .await
        .with_context(|| format!("failed to create a wallet for {}", config.chain_id))?;

    log::info!(
        "Initialized client with wallet address: {} (key {}, chain {}, {})",
        client.address(),
        client.identity().name,
        config.chain_id,
        config.lcd_url
    );
    Ok(client)
}

/// Funds `client` and deploys the contract at `contract_path` with `init_msg`.
pub async fn initialize_and_upload_contract<C, F>(
    client: C,
    faucet: &F,
    policy: &FundingPolicy,
    contract_path: &Path,
    init_msg: &InstantiateMsg,
) -> Result<TestEnv<C>>
where
    C: ChainClient,
    F: Faucet + ?Sized,
{
    fill_up_from_faucet(&client, faucet, policy)
        .await
        .context("failed to fund the test account")?;

    let contract = initialize_contract(&client, contract_path, init_msg)
        .await
        .context("failed to deploy the contract")?;

    Ok(TestEnv { client, contract })
}
