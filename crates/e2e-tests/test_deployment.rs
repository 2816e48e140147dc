//! End-to-end smoke test: the contract really lives on chain.

mod fixtures;

use crate::fixtures::{client_config, contract_path, faucet, test_env};
use rstest::rstest;
use test_toolkit::counter::query_count;
use test_toolkit::deploy::initialize_contract;
use test_toolkit::faucet::{fill_up_from_faucet, get_balance, FundingPolicy};
use test_toolkit::secretd::SecretdClient;
use test_toolkit::suite::INIT_MSG;
use test_toolkit::test_env::{initialize_client, TestEnv};

#[rstest]
#[tokio::test]
#[ignore = "requires a running localsecret node"]
async fn contract_was_deployed(#[future] test_env: TestEnv<SecretdClient>) {
    let TestEnv { client, contract } = test_env.await;

    let count = query_count(&client, &contract)
        .await
        .expect("query against the deployed contract failed");
    assert_eq!(count, INIT_MSG.count);
}

#[rstest]
#[tokio::test]
#[ignore = "requires a running localsecret node"]
async fn account_is_funded_to_target() {
    let client = initialize_client(client_config()).await.unwrap();
    let policy = FundingPolicy::default();

    let balance = fill_up_from_faucet(&client, &faucet(), &policy).await.unwrap();
    assert!(balance >= policy.target);
    assert_eq!(get_balance(&client, &policy.denom).await.unwrap(), balance);
}

/// Two deployments from the same account must not clash on their labels.
#[rstest]
#[tokio::test]
#[ignore = "requires a running localsecret node"]
async fn repeated_deployments_succeed() {
    let client = initialize_client(client_config()).await.unwrap();
    fill_up_from_faucet(&client, &faucet(), &FundingPolicy::default())
        .await
        .unwrap();

    let first = initialize_contract(&client, &contract_path(), &INIT_MSG)
        .await
        .expect("first deployment failed");
    let second = initialize_contract(&client, &contract_path(), &INIT_MSG)
        .await
        .expect("second deployment failed");

    assert_eq!(first.code_hash, second.code_hash);
    assert_ne!(first.address, second.address);
}
