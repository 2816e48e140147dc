use crate::client::{ChainClient, ClientError};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Something that credits test accounts with spendable tokens.
#[async_trait]
pub trait Faucet: Send + Sync {
    async fn request_funds(&self, address: &str) -> Result<(), ClientError>;
}

/// Faucet reachable over HTTP at `<base>/faucet?address=<addr>`. The response body is ignored.
pub struct HttpFaucet {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpFaucet {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn faucet_url(&self, address: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.join("faucet")?;
        url.query_pairs_mut().append_pair("address", address);
        Ok(url)
    }
}

#[async_trait]
impl Faucet for HttpFaucet {
    async fn request_funds(&self, address: &str) -> Result<(), ClientError> {
        let url = self.faucet_url(address)?;
        let response = self.http.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(ClientError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

/// How much to fund an account with and how hard to try.
#[derive(Debug, Clone)]
pub struct FundingPolicy {
    pub target: u128,
    pub denom: String,
    /// Faucet requests to make before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Pause between faucet requests. Zero retries immediately.
    pub retry_delay: Duration,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self {
            target: 100_000_000,
            denom: "uscrt".to_string(),
            max_attempts: None,
            retry_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FundingError {
    #[error("failed to get {denom} balance for address: {address}")]
    MissingBalance { address: String, denom: String },

    #[error("balance still {balance} < {target} after {attempts} faucet requests")]
    Exhausted {
        attempts: u32,
        balance: u128,
        target: u128,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

pub async fn get_balance<C>(client: &C, denom: &str) -> Result<u128, FundingError>
where
    C: ChainClient + ?Sized,
{
    client
        .balance(denom)
        .await?
        .filter(|coin| coin.denom == denom)
        .map(|coin| coin.amount)
        .ok_or_else(|| FundingError::MissingBalance {
            address: client.address().to_string(),
            denom: denom.to_string(),
        })
}

/// Requests funds until the client's balance reaches `policy.target`, returning the final
/// balance.
///
/// Faucet failures are logged and retried: the faucet may be rate-limited or still starting
/// up. Balance lookups are not retried.
pub async fn fill_up_from_faucet<C, F>(
    client: &C,
    faucet: &F,
    policy: &FundingPolicy,
) -> Result<u128, FundingError>
where
    C: ChainClient + ?Sized,
    F: Faucet + ?Sized,
{
    let mut balance = get_balance(client, &policy.denom).await?;
    let mut attempts = 0u32;

    while balance < policy.target {
        if let Some(max_attempts) = policy.max_attempts {
            if attempts >= max_attempts {
                return Err(FundingError::Exhausted {
                    attempts,
                    balance,
                    target: policy.target,
                });
            }
        }

        if attempts > 0 && !policy.retry_delay.is_zero() {
            tokio::time::sleep(policy.retry_delay).await;
        }
        attempts += 1;

        if let Err(e) = faucet.request_funds(client.address()).await {
            log::error!("failed to get tokens from faucet: {e}");
        }
        balance = get_balance(client, &policy.denom).await?;
    }

    log::info!("got tokens from faucet: {balance}{}", policy.denom);
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChain;

    fn policy(target: u128) -> FundingPolicy {
        FundingPolicy {
            target,
            ..Default::default()
        }
    }

    #[test]
    fn faucet_url_carries_the_address() {
        let faucet = HttpFaucet::new(Url::parse("http://localhost:5000").unwrap());
        assert_eq!(
            faucet.faucet_url("secret1abc").unwrap().as_str(),
            "http://localhost:5000/faucet?address=secret1abc"
        );
    }

    #[tokio::test]
    async fn funds_until_target_is_reached() {
        let chain = MockChain::new();
        let faucet = chain.faucet(30_000_000);

        let balance = fill_up_from_faucet(&chain, &faucet, &policy(100_000_000))
            .await
            .unwrap();

        assert_eq!(balance, 120_000_000);
        assert_eq!(faucet.requests(), 4);
    }

    #[tokio::test]
    async fn faucet_failures_are_swallowed() {
        let chain = MockChain::new();
        let faucet = chain.faucet(50_000_000).failing_first(7);

        let balance = fill_up_from_faucet(&chain, &faucet, &policy(100_000_000))
            .await
            .unwrap();

        assert!(balance >= 100_000_000);
        assert_eq!(faucet.requests(), 9);
    }

    #[tokio::test]
    async fn funded_account_skips_the_faucet() {
        let chain = MockChain::new();
        chain.set_balance(chain.address(), 100_000_000);
        let faucet = chain.faucet(1);

        let balance = fill_up_from_faucet(&chain, &faucet, &policy(100_000_000))
            .await
            .unwrap();

        assert_eq!(balance, 100_000_000);
        assert_eq!(faucet.requests(), 0);
    }

    #[tokio::test]
    async fn capped_policy_gives_up() {
        let chain = MockChain::new();
        let faucet = chain.faucet(50_000_000).failing_first(u32::MAX);
        let policy = FundingPolicy {
            max_attempts: Some(3),
            retry_delay: Duration::from_millis(1),
            ..policy(100_000_000)
        };

        let err = fill_up_from_faucet(&chain, &faucet, &policy)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FundingError::Exhausted {
                attempts: 3,
                balance: 0,
                ..
            }
        ));
        assert_eq!(faucet.requests(), 3);
    }

    #[tokio::test]
    async fn undefined_balance_is_fatal() {
        let chain = MockChain::new();
        chain.hide_balances();
        let faucet = chain.faucet(1);

        let err = fill_up_from_faucet(&chain, &faucet, &policy(1))
            .await
            .unwrap_err();

        assert!(matches!(err, FundingError::MissingBalance { .. }));
    }
}
