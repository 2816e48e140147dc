use anyhow::{ensure, Result};
use apps::{init_tracing, NetworkArgs};
use clap::Parser;
use dotenv::dotenv;
use test_toolkit::counter::{increment_tx, query_count};
use test_toolkit::faucet::HttpFaucet;
use test_toolkit::test_env::{initialize_and_upload_contract, initialize_client, TestEnv};
use toolkit::msg::InstantiateMsg;

/// Deploys the counter contract, bumps it once and prints where it lives.
#[derive(Parser)]
struct CliArgs {
    #[command(flatten)]
    network: NetworkArgs,

    /// Initial value of the counter
    #[arg(long, default_value_t = 0)]
    count: i32,
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
        &InstantiateMsg { count: args.count },
    )
    .await?;

    increment_tx(&client, &contract).await?;

    let count = query_count(&client, &contract).await?;
    ensure!(
        count == args.count + 1,
        "expected count {} after one increment, got {count}",
        args.count + 1
    );

    println!("code hash: {}", contract.code_hash);
    println!("address: {}", contract.address);

    Ok(())
}
