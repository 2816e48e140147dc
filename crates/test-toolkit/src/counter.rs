//! Typed calls into the counter contract.

use crate::client::ChainClient;
use anyhow::{Context, Result};
use serde::Serialize;
use toolkit::errors::ContractError;
use toolkit::logs::TxResponse;
use toolkit::msg::{parse_query_response, ExecuteMsg, GetCountResponse, QueryMsg};
use toolkit::ContractRef;

pub const EXECUTE_GAS_LIMIT: u64 = 200_000;

pub async fn query_count<C>(client: &C, contract: &ContractRef) -> Result<i32>
where
    C: ChainClient + ?Sized,
{
    let query = serde_json::to_value(QueryMsg::GetCount {})?;
    let raw = client
        .query_contract(contract, &query)
        .await
        .with_context(|| format!("failed to query {contract}"))?;

    let res: GetCountResponse = parse_query_response(&raw)?;
    Ok(res.count)
}

pub async fn increment_tx<C>(client: &C, contract: &ContractRef) -> Result<TxResponse>
where
    C: ChainClient + ?Sized,
{
    let tx = execute(client, contract, &ExecuteMsg::Increment {}, EXECUTE_GAS_LIMIT).await?;
    log::info!("Increment TX used {} gas", tx.gas_used);
    Ok(tx)
}

pub async fn reset_tx<C>(client: &C, contract: &ContractRef, count: i32) -> Result<TxResponse>
where
    C: ChainClient + ?Sized,
{
    let tx = execute(client, contract, &ExecuteMsg::Reset { count }, EXECUTE_GAS_LIMIT).await?;
    log::info!("Reset TX used {} gas", tx.gas_used);
    Ok(tx)
}

/// Sends `msg` to the contract and waits for it to be included. Fails unless the chain
/// executed it successfully.
pub async fn execute<C, M>(
    client: &C,
    contract: &ContractRef,
    msg: &M,
    gas_limit: u64,
) -> Result<TxResponse>
where
    C: ChainClient + ?Sized,
    M: Serialize + ?Sized,
{
    let msg = serde_json::to_value(msg)?;
    let tx = client
        .execute_contract(contract, &msg, gas_limit)
        .await
        .with_context(|| format!("failed to execute {msg} on {contract}"))?;

    if !tx.is_success() {
        return Err(ContractError::ExecuteFailed {
            code: tx.code,
            raw_log: tx.raw_log,
        }
        .into());
    }

    Ok(tx)
}
