//! Shared fixture for the end-to-end test crate.
//!
//! * Requires a running localsecret node (REST on :1317, RPC on :26657, faucet on :5000) and
//!   the `secretd` binary in `$PATH`, or `SECRETD_CONTAINER` naming the node's container.
//! * Expects the compiled contract at `CONTRACT_PATH` (default `contract.wasm`).
//! * Every test gets its own funded account and a fresh contract instance.

use rstest::*;
use std::path::PathBuf;
use test_toolkit::faucet::{FundingPolicy, HttpFaucet};
use test_toolkit::secretd::SecretdClient;
use test_toolkit::suite::INIT_MSG;
use test_toolkit::test_env::{initialize_and_upload_contract, initialize_client, TestEnv};
use test_toolkit::ClientConfig;
use url::Url;

pub fn client_config() -> ClientConfig {
    ClientConfig {
        docker_container: std::env::var("SECRETD_CONTAINER").ok(),
        ..Default::default()
    }
}

pub fn contract_path() -> PathBuf {
    std::env::var("CONTRACT_PATH")
        .unwrap_or_else(|_| "contract.wasm".to_string())
        .into()
}

pub fn faucet() -> HttpFaucet {
    HttpFaucet::new(Url::parse("http://localhost:5000").unwrap())
}

#[fixture]
pub async fn test_env() -> TestEnv<SecretdClient> {
    let client = initialize_client(client_config())
        .await
        .expect("Failed to create a client");

    initialize_and_upload_contract(
        client,
        &faucet(),
        &FundingPolicy::default(),
        &contract_path(),
        &INIT_MSG,
    )
    .await
    .expect("Failed to fund the account and deploy the contract")
}
