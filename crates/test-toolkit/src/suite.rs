//! The integration tests run against every fresh deployment of the counter contract.

use crate::client::ChainClient;
use crate::counter::{increment_tx, query_count, reset_tx, EXECUTE_GAS_LIMIT};
use crate::runner::TestCase;
use anyhow::{ensure, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use toolkit::msg::InstantiateMsg;
use toolkit::ContractRef;

/// Configuration the contract is instantiated with.
pub const INIT_MSG: InstantiateMsg = InstantiateMsg { count: 4 };

/// Number of increments sent by [`test_increment_stress`].
pub const STRESS_LOAD: i32 = 10;

pub fn test_count_on_initialization<'a, C>(
    client: &'a C,
    contract: &'a ContractRef,
) -> BoxFuture<'a, Result<()>>
where
    C: ChainClient + ?Sized,
{
    async move {
        let on_initialization_counter = query_count(client, contract).await?;
        ensure!(
            on_initialization_counter == INIT_MSG.count,
            "The counter on initialization expected to be {} instead of {on_initialization_counter}",
            INIT_MSG.count
        );
        Ok(())
    }
    .boxed()
}

pub fn test_increment_stress<'a, C>(
    client: &'a C,
    contract: &'a ContractRef,
) -> BoxFuture<'a, Result<()>>
where
    C: ChainClient + ?Sized,
{
    async move {
        let on_start_counter = query_count(client, contract).await?;

        for _ in 0..STRESS_LOAD {
            increment_tx(client, contract).await?;
        }

        let after_stress_counter = query_count(client, contract).await?;
        ensure!(
            after_stress_counter - on_start_counter == STRESS_LOAD,
            "After running stress test the counter expected to be {} instead of {after_stress_counter}",
            on_start_counter + STRESS_LOAD
        );
        Ok(())
    }
    .boxed()
}

/// Gas use can't be predicted exactly, but it must be reported and stay within the ceiling.
pub fn test_gas_limits<'a, C>(client: &'a C, contract: &'a ContractRef) -> BoxFuture<'a, Result<()>>
where
    C: ChainClient + ?Sized,
{
    async move {
        let tx = increment_tx(client, contract).await?;
        ensure!(tx.gas_used > 0, "increment reported no gas use");
        ensure!(
            tx.gas_used <= EXECUTE_GAS_LIMIT,
            "increment used {} gas, above the {EXECUTE_GAS_LIMIT} limit",
            tx.gas_used
        );
        Ok(())
    }
    .boxed()
}

pub fn test_reset<'a, C>(client: &'a C, contract: &'a ContractRef) -> BoxFuture<'a, Result<()>>
where
    C: ChainClient + ?Sized,
{
    async move {
        reset_tx(client, contract, 0).await?;
        let count = query_count(client, contract).await?;
        ensure!(count == 0, "The counter after reset expected to be 0 instead of {count}");
        Ok(())
    }
    .boxed()
}

/// The built-in tests, in the order they have to run.
pub fn all_tests<C>() -> Vec<TestCase<C>>
where
    C: ChainClient + ?Sized,
{
    vec![
        TestCase::new("test_count_on_initialization", test_count_on_initialization::<C>),
        TestCase::new("test_increment_stress", test_increment_stress::<C>),
        TestCase::new("test_gas_limits", test_gas_limits::<C>),
        TestCase::new("test_reset", test_reset::<C>),
    ]
}
