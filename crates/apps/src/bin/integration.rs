use anyhow::Result;
use apps::{init_tracing, NetworkArgs};
use clap::Parser;
use dotenv::dotenv;
use test_toolkit::faucet::HttpFaucet;
use test_toolkit::runner::run_tests;
use test_toolkit::suite::{all_tests, INIT_MSG};
use test_toolkit::test_env::{initialize_and_upload_contract, initialize_client, TestEnv};

/// Deploys the counter contract to a local node and runs the integration tests against it.
#[derive(Parser)]
struct CliArgs {
    #[command(flatten)]
    network: NetworkArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let args = CliArgs::try_parse()?;

    let client = initialize_client(args.network.client_config()).await?;
    let faucet = HttpFaucet::new(args.network.faucet_url.clone());

    let TestEnv { client, contract } = initialize_and_upload_contract(
        client,
        &faucet,
        &args.network.funding_policy(),
        &args.network.contract_path,
        &INIT_MSG,
    )
    .await?;

    run_tests(&all_tests(), &client, &contract).await
}
