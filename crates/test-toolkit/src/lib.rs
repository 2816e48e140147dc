//! Building blocks for end-to-end tests of the counter contract on a Secret Network node:
//! client bootstrap, faucet funding, deployment, contract calls and a sequential test runner.

pub mod client;
pub mod counter;
pub mod deploy;
pub mod faucet;
pub mod mock;
pub mod runner;
pub mod secretd;
pub mod suite;
pub mod test_env;

pub use client::{ChainClient, ClientConfig, ClientError, Identity};
