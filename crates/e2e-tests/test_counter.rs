//! The counter contract behaves as expected once deployed.

mod fixtures;

use crate::fixtures::test_env;
use rstest::rstest;
use test_toolkit::counter::{increment_tx, query_count};
use test_toolkit::runner::run_tests;
use test_toolkit::secretd::SecretdClient;
use test_toolkit::suite::{all_tests, INIT_MSG, STRESS_LOAD};
use test_toolkit::test_env::TestEnv;
use test_toolkit::ChainClient;
use toolkit::ContractRef;

#[rstest]
#[tokio::test]
#[ignore = "requires a running localsecret node"]
async fn full_suite(#[future] test_env: TestEnv<SecretdClient>) {
    let TestEnv { client, contract } = test_env.await;
    run_tests(&all_tests(), &client, &contract)
        .await
        .expect("integration tests failed");
}

#[rstest]
#[tokio::test]
#[ignore = "requires a running localsecret node"]
async fn increments_from_initial_count(#[future] test_env: TestEnv<SecretdClient>) {
    let TestEnv { client, contract } = test_env.await;

    assert_eq!(query_count(&client, &contract).await.unwrap(), INIT_MSG.count);
    for _ in 0..STRESS_LOAD {
        increment_tx(&client, &contract).await.unwrap();
    }
    assert_eq!(
        query_count(&client, &contract).await.unwrap(),
        INIT_MSG.count + STRESS_LOAD
    );
}

#[rstest]
#[case::wrong_hash(true)]
#[case::wrong_address(false)]
#[tokio::test]
#[ignore = "requires a running localsecret node"]
async fn query_against_wrong_reference_fails(
    #[future] test_env: TestEnv<SecretdClient>,
    #[case] wrong_hash: bool,
) {
    let TestEnv { client, contract } = test_env.await;

    let wrong = if wrong_hash {
        ContractRef::new("00".repeat(32), contract.address.clone()).unwrap()
    } else {
        ContractRef::new(contract.code_hash.clone(), client.address()).unwrap()
    };

    assert!(query_count(&client, &wrong).await.is_err());
}
