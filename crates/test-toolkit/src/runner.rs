use crate::client::ChainClient;
use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use toolkit::ContractRef;

/// A test against a deployed contract. Tests report failure by returning an error.
pub type TestFn<C> = for<'a> fn(&'a C, &'a ContractRef) -> BoxFuture<'a, Result<()>>;

pub struct TestCase<C: ?Sized> {
    pub name: &'static str,
    pub run: TestFn<C>,
}

impl<C: ?Sized> TestCase<C> {
    pub const fn new(name: &'static str, run: TestFn<C>) -> Self {
        Self { name, run }
    }
}

impl<C: ?Sized> Clone for TestCase<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for TestCase<C> {}

pub async fn run_test_function<C>(
    test: &TestCase<C>,
    client: &C,
    contract: &ContractRef,
) -> Result<()>
where
    C: ChainClient + ?Sized,
{
    println!("Testing {}", test.name);
    (test.run)(client, contract)
        .await
        .with_context(|| format!("[FAILURE] {}", test.name))?;
    println!("[SUCCESS] {}", test.name);
    Ok(())
}

/// Runs `tests` one after the other, stopping at the first failure.
pub async fn run_tests<C>(tests: &[TestCase<C>], client: &C, contract: &ContractRef) -> Result<()>
where
    C: ChainClient + ?Sized,
{
    for test in tests {
        run_test_function(test, client, contract).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::{increment_tx, query_count};
    use crate::deploy::deploy_contract;
    use crate::mock::MockChain;
    use anyhow::ensure;
    use futures_util::FutureExt;
    use toolkit::msg::InstantiateMsg;

    fn bump<'a>(client: &'a MockChain, contract: &'a ContractRef) -> BoxFuture<'a, Result<()>> {
        async move {
            increment_tx(client, contract).await?;
            Ok(())
        }
        .boxed()
    }

    fn fail_above_five<'a>(
        client: &'a MockChain,
        contract: &'a ContractRef,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let count = query_count(client, contract).await?;
            ensure!(count <= 5, "count {count} is above five");
            Ok(())
        }
        .boxed()
    }

    async fn deployed() -> (MockChain, ContractRef) {
        let chain = MockChain::new();
        chain.set_balance(chain.address(), 100_000_000);
        let contract = deploy_contract(&chain, b"\0asm", &InstantiateMsg { count: 4 })
            .await
            .unwrap();
        (chain, contract)
    }

    #[tokio::test]
    async fn runs_tests_in_order() {
        let (chain, contract) = deployed().await;
        let tests = [
            TestCase::new("bump", bump),
            TestCase::new("fail_above_five", fail_above_five),
        ];

        run_tests(&tests, &chain, &contract).await.unwrap();
        assert_eq!(query_count(&chain, &contract).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn first_failure_aborts_the_run() {
        let (chain, contract) = deployed().await;
        let tests = [
            TestCase::new("bump", bump),
            TestCase::new("bump", bump),
            TestCase::new("fail_above_five", fail_above_five),
            TestCase::new("bump", bump),
        ];

        let err = run_tests(&tests, &chain, &contract).await.unwrap_err();
        assert_eq!(err.to_string(), "[FAILURE] fail_above_five");
        assert_eq!(query_count(&chain, &contract).await.unwrap(), 6);
    }
}
