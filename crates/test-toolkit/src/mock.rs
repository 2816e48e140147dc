//! In-memory chain that hosts the counter contract.
//!
//! It follows the same rules the orchestration relies on against a real node: uploads are
//! content addressed, labels are unique, fees are charged up front at 0.25 per unit of gas,
//! transactions that run out of gas fail without touching state, and only the instantiator may
//! reset the counter. Clones and [`MockChain::as_account`] share the same chain.

use crate::client::{check_code_hash, ChainClient, ClientError};
use crate::faucet::Faucet;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use toolkit::logs::{Attribute, Event, TxLog, TxResponse};
use toolkit::msg::{ExecuteMsg, GetCountResponse, InstantiateMsg, QueryMsg};
use toolkit::{wasm_checksum, CodeId, Coin, ContractRef};

const DENOM: &str = "uscrt";
const STORE_BASE_GAS: u64 = 1_000_000;
const INSTANTIATE_GAS: u64 = 60_000;
const EXECUTE_GAS: u64 = 45_000;

const CODE_INSUFFICIENT_FEE: u32 = 13;
const CODE_OUT_OF_GAS: u32 = 11;
const CODE_COMPUTE: u32 = 2;
const CODE_CONTRACT: u32 = 3;

/// Ways to make the chain misbehave.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockFaults {
    pub reject_uploads: bool,
    /// Upload succeeds but the `code_id` attribute is missing from its events.
    pub drop_upload_code_id: bool,
    pub forget_code_hashes: bool,
    pub reject_instantiations: bool,
    /// Instantiation succeeds but `contract_address` is only reported under a `wasm` event.
    pub hide_contract_address: bool,
}

struct Instance {
    code_hash: String,
    owner: String,
    count: i32,
}

#[derive(Default)]
struct ChainState {
    height: u64,
    codes: BTreeMap<u64, String>,
    contracts: BTreeMap<String, Instance>,
    labels: HashSet<String>,
    balances: HashMap<String, u128>,
    hide_balances: bool,
    faults: MockFaults,
}

impl ChainState {
    /// Charges the fee for `gas_limit`, or returns the rejection to hand back.
    fn charge(&mut self, sender: &str, gas_limit: u64) -> Result<(), TxResponse> {
        let fee = u128::from(gas_limit / 4);
        let balance = self.balances.entry(sender.to_string()).or_default();

        if *balance < fee {
            let raw_log =
                format!("insufficient fees; got: {balance}{DENOM} required: {fee}{DENOM}");
            return Err(self.receipt(CODE_INSUFFICIENT_FEE, raw_log, gas_limit, 0, vec![]));
        }

        *balance -= fee;
        Ok(())
    }

    fn receipt(
        &mut self,
        code: u32,
        raw_log: String,
        gas_wanted: u64,
        gas_used: u64,
        events: Vec<Event>,
    ) -> TxResponse {
        self.height += 1;
        let logs = if code == 0 {
            vec![TxLog {
                msg_index: 0,
                events,
            }]
        } else {
            vec![]
        };

        TxResponse {
            txhash: format!("{:064X}", self.height),
            height: self.height,
            code,
            raw_log,
            logs,
            gas_wanted,
            gas_used,
            events: vec![],
        }
    }

    fn failure(
        &mut self,
        code: u32,
        raw_log: impl Into<String>,
        gas_limit: u64,
        gas_used: u64,
    ) -> TxResponse {
        self.receipt(code, raw_log.into(), gas_limit, gas_used.min(gas_limit), vec![])
    }

    fn out_of_gas(&mut self, gas_limit: u64, gas_used: u64) -> Option<TxResponse> {
        (gas_used > gas_limit).then(|| {
            let raw_log = format!("out of gas; gasWanted: {gas_limit}, gasUsed: {gas_used}");
            self.failure(CODE_OUT_OF_GAS, raw_log, gas_limit, gas_used)
        })
    }
}

fn event(kind: &str, attributes: &[(&str, &str)]) -> Event {
    Event {
        kind: kind.to_string(),
        attributes: attributes
            .iter()
            .map(|(key, value)| Attribute {
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}

fn random_address() -> String {
    format!("secret1{}", hex::encode(rand::random::<[u8; 19]>()))
}

#[derive(Clone)]
pub struct MockChain {
    sender: String,
    state: Arc<Mutex<ChainState>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// A fresh chain with a single, unfunded account.
    pub fn new() -> Self {
        Self {
            sender: random_address(),
            state: Arc::new(Mutex::new(ChainState::default())),
        }
    }

    /// A client for another account on the same chain.
    pub fn as_account(&self, address: impl Into<String>) -> Self {
        Self {
            sender: address.into(),
            state: self.state.clone(),
        }
    }

    /// A faucet crediting `grant` per request to accounts of this chain.
    pub fn faucet(&self, grant: u128) -> MockFaucet {
        MockFaucet {
            state: self.state.clone(),
            grant,
            failures_left: AtomicU32::new(0),
            requests: AtomicU32::new(0),
        }
    }

    pub fn set_balance(&self, address: &str, amount: u128) {
        self.state().balances.insert(address.to_string(), amount);
    }

    /// Makes balance lookups come back without a balance.
    pub fn hide_balances(&self) {
        self.state().hide_balances = true;
    }

    pub fn set_faults(&self, faults: MockFaults) {
        self.state().faults = faults;
    }

    pub fn contract_count(&self) -> usize {
        self.state().contracts.len()
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn address(&self) -> &str {
        &self.sender
    }

    async fn balance(&self, denom: &str) -> Result<Option<Coin>, ClientError> {
        let state = self.state();
        if state.hide_balances {
            return Ok(None);
        }

        let amount = if denom == DENOM {
            state.balances.get(&self.sender).copied().unwrap_or_default()
        } else {
            0
        };
        Ok(Some(Coin::new(amount, denom)))
    }

    async fn store_code(&self, wasm: &[u8], gas_limit: u64) -> Result<TxResponse, ClientError> {
        let mut state = self.state();
        if let Err(rejected) = state.charge(&self.sender, gas_limit) {
            return Ok(rejected);
        }

        let gas_used = STORE_BASE_GAS + wasm.len() as u64;
        if let Some(failed) = state.out_of_gas(gas_limit, gas_used) {
            return Ok(failed);
        }
        if state.faults.reject_uploads {
            return Ok(state.failure(CODE_COMPUTE, "invalid wasm bytecode", gas_limit, gas_used));
        }

        let code_id = state.codes.len() as u64 + 1;
        state.codes.insert(code_id, wasm_checksum(wasm));

        let code_id = code_id.to_string();
        let mut attributes = vec![
            ("action", "/secret.compute.v1beta1.MsgStoreCode"),
            ("module", "compute"),
            ("sender", self.sender.as_str()),
        ];
        if !state.faults.drop_upload_code_id {
            attributes.push(("code_id", code_id.as_str()));
        }
        let events = vec![event("message", &attributes)];

        Ok(state.receipt(0, String::new(), gas_limit, gas_used, events))
    }

    async fn code_hash_by_code_id(&self, code_id: CodeId) -> Result<Option<String>, ClientError> {
        let state = self.state();
        if state.faults.forget_code_hashes {
            return Ok(None);
        }
        Ok(state.codes.get(&code_id.0).cloned())
    }

    async fn instantiate(
        &self,
        code_id: CodeId,
        code_hash: &str,
        init_msg: &serde_json::Value,
        label: &str,
        gas_limit: u64,
    ) -> Result<TxResponse, ClientError> {
        let mut state = self.state();
        if let Err(rejected) = state.charge(&self.sender, gas_limit) {
            return Ok(rejected);
        }
        if let Some(failed) = state.out_of_gas(gas_limit, INSTANTIATE_GAS) {
            return Ok(failed);
        }

        let Some(stored_hash) = state.codes.get(&code_id.0).cloned() else {
            let raw_log = format!("code {code_id} not found");
            return Ok(state.failure(CODE_COMPUTE, raw_log, gas_limit, INSTANTIATE_GAS));
        };
        if !stored_hash.eq_ignore_ascii_case(code_hash.trim_start_matches("0x")) {
            let raw_log = "code hash mismatch";
            return Ok(state.failure(CODE_COMPUTE, raw_log, gas_limit, INSTANTIATE_GAS));
        }
        if state.labels.contains(label) {
            let raw_log = format!("label already exists: {label}");
            return Ok(state.failure(CODE_COMPUTE, raw_log, gas_limit, INSTANTIATE_GAS));
        }
        if state.faults.reject_instantiations {
            let raw_log = "instantiate failed";
            return Ok(state.failure(CODE_CONTRACT, raw_log, gas_limit, INSTANTIATE_GAS));
        }
        let msg: InstantiateMsg = match serde_json::from_value(init_msg.clone()) {
            Ok(msg) => msg,
            Err(e) => {
                let raw_log = format!("Error parsing into type InstantiateMsg: {e}");
                return Ok(state.failure(CODE_CONTRACT, raw_log, gas_limit, INSTANTIATE_GAS));
            }
        };

        let address = format!("secret1{:038x}", state.contracts.len() + 1);
        state.labels.insert(label.to_string());
        state.contracts.insert(
            address.clone(),
            Instance {
                code_hash: stored_hash,
                owner: self.sender.clone(),
                count: msg.count,
            },
        );

        let address_event = if state.faults.hide_contract_address {
            "wasm"
        } else {
            "message"
        };
        let events = vec![
            event(
                "message",
                &[
                    ("action", "/secret.compute.v1beta1.MsgInstantiateContract"),
                    ("module", "compute"),
                ],
            ),
            event(address_event, &[("contract_address", address.as_str())]),
        ];

        Ok(state.receipt(0, String::new(), gas_limit, INSTANTIATE_GAS, events))
    }

    async fn query_contract(
        &self,
        contract: &ContractRef,
        query: &serde_json::Value,
    ) -> Result<String, ClientError> {
        let state = self.state();
        let instance = state
            .contracts
            .get(&contract.address)
            .ok_or_else(|| ClientError::UnknownContract(contract.address.clone()))?;
        check_code_hash(contract, &instance.code_hash)?;

        let answer = match serde_json::from_value::<QueryMsg>(query.clone()) {
            Ok(QueryMsg::GetCount {}) => serde_json::to_value(GetCountResponse {
                count: instance.count,
            })?,
            Err(e) => json!({ "err": format!("Error parsing into type QueryMsg: {e}") }),
        };

        Ok(answer.to_string())
    }

    async fn execute_contract(
        &self,
        contract: &ContractRef,
        msg: &serde_json::Value,
        gas_limit: u64,
    ) -> Result<TxResponse, ClientError> {
        let mut state = self.state();
        let instance = state
            .contracts
            .get(&contract.address)
            .ok_or_else(|| ClientError::UnknownContract(contract.address.clone()))?;
        check_code_hash(contract, &instance.code_hash)?;

        if let Err(rejected) = state.charge(&self.sender, gas_limit) {
            return Ok(rejected);
        }
        if let Some(failed) = state.out_of_gas(gas_limit, EXECUTE_GAS) {
            return Ok(failed);
        }

        let msg: ExecuteMsg = match serde_json::from_value(msg.clone()) {
            Ok(msg) => msg,
            Err(e) => {
                let raw_log = format!("Error parsing into type ExecuteMsg: {e}");
                return Ok(state.failure(CODE_CONTRACT, raw_log, gas_limit, EXECUTE_GAS));
            }
        };

        let Some(instance) = state.contracts.get_mut(&contract.address) else {
            return Err(ClientError::UnknownContract(contract.address.clone()));
        };
        let action = match msg {
            ExecuteMsg::Increment {} => match instance.count.checked_add(1) {
                Some(count) => {
                    instance.count = count;
                    "increment"
                }
                None => return Ok(state.failure(CODE_CONTRACT, "Overflow", gas_limit, EXECUTE_GAS)),
            },
            ExecuteMsg::Reset { count } => {
                if instance.owner != self.sender {
                    return Ok(state.failure(CODE_CONTRACT, "Unauthorized", gas_limit, EXECUTE_GAS));
                }
                instance.count = count;
                "reset"
            }
        };

        let events = vec![
            event(
                "message",
                &[
                    ("action", "/secret.compute.v1beta1.MsgExecuteContract"),
                    ("module", "compute"),
                ],
            ),
            event(
                "wasm",
                &[
                    ("contract_address", contract.address.as_str()),
                    ("action", action),
                ],
            ),
        ];

        Ok(state.receipt(0, String::new(), gas_limit, EXECUTE_GAS, events))
    }
}

pub struct MockFaucet {
    state: Arc<Mutex<ChainState>>,
    grant: u128,
    failures_left: AtomicU32,
    requests: AtomicU32,
}

impl MockFaucet {
    /// Fails the first `failures` requests.
    pub fn failing_first(self, failures: u32) -> Self {
        self.failures_left.store(failures, Ordering::SeqCst);
        self
    }

    /// Requests received so far, failed ones included.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Faucet for MockFaucet {
    async fn request_funds(&self, address: &str) -> Result<(), ClientError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::HttpStatus {
                url: format!("mock://faucet?address={address}"),
                status: 503,
            });
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state.balances.entry(address.to_string()).or_default() += self.grant;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded() -> MockChain {
        let chain = MockChain::new();
        chain.set_balance(chain.address(), 100_000_000);
        chain
    }

    #[tokio::test]
    async fn upload_is_content_addressed() {
        let chain = funded();
        let tx = chain.store_code(b"\0asm", 5_000_000).await.unwrap();
        assert!(tx.is_success());

        let hash = chain.code_hash_by_code_id(CodeId(1)).await.unwrap();
        assert_eq!(hash, Some(wasm_checksum(b"\0asm")));
        assert_eq!(chain.code_hash_by_code_id(CodeId(2)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn fees_are_charged_up_front() {
        let chain = MockChain::new();
        chain.set_balance(chain.address(), 1_000);

        let tx = chain.store_code(b"\0asm", 5_000_000).await.unwrap();
        assert_eq!(tx.code, CODE_INSUFFICIENT_FEE);

        let chain = funded();
        chain.store_code(b"\0asm", 5_000_000).await.unwrap();
        let balance = chain.balance(DENOM).await.unwrap().unwrap();
        assert_eq!(balance.amount, 100_000_000 - 1_250_000);
    }

    #[tokio::test]
    async fn low_gas_limit_runs_out_of_gas() {
        let chain = funded();
        let tx = chain.store_code(b"\0asm", 10_000).await.unwrap();
        assert_eq!(tx.code, CODE_OUT_OF_GAS);
        assert_eq!(tx.gas_used, 10_000);
        assert_eq!(chain.code_hash_by_code_id(CodeId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn faucet_failures_count_as_requests() {
        let chain = MockChain::new();
        let faucet = chain.faucet(10).failing_first(1);

        assert!(faucet.request_funds(chain.address()).await.is_err());
        assert!(faucet.request_funds(chain.address()).await.is_ok());
        assert_eq!(faucet.requests(), 2);
        assert_eq!(chain.balance(DENOM).await.unwrap().unwrap().amount, 10);
    }
}
