//! [`ChainClient`] backed by a node's REST endpoint plus the `secretd` command line, which
//! owns the keyring and takes care of signing and contract-message encryption.

use crate::client::{check_code_hash, ChainClient, ClientConfig, ClientError, Identity};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Write;
use std::time::Duration;
use tokio::process::Command;
use toolkit::logs::TxResponse;
use toolkit::{CodeId, Coin, ContractRef};
use url::Url;

const KEYRING_BACKEND: &str = "test";

#[derive(Deserialize)]
struct KeyOutput {
    address: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: Option<Coin>,
}

#[derive(Deserialize)]
struct CodeHashResponse {
    #[serde(default)]
    code_hash: Option<String>,
}

#[derive(Deserialize)]
struct GetTxResponse {
    tx_response: TxResponse,
}

/// Keyring holding the run's key. The key goes away with the client.
enum Keyring {
    /// Private directory on this host, removed on drop.
    Local(tempfile::TempDir),
    /// Default keyring inside this container. The key is deleted with `keys delete` on drop.
    Container(String),
}

impl Keyring {
    fn flags(&self) -> Vec<String> {
        let mut flags = vec!["--keyring-backend".to_string(), KEYRING_BACKEND.to_string()];
        if let Keyring::Local(dir) = self {
            flags.push("--keyring-dir".to_string());
            flags.push(dir.path().to_string_lossy().into_owned());
        }
        flags
    }
}

pub struct SecretdClient {
    config: ClientConfig,
    http: reqwest::Client,
    identity: Identity,
    keyring: Keyring,
}

impl SecretdClient {
    /// Creates a fresh random key in a throwaway keyring and binds a client to it.
    pub async fn new_random(config: ClientConfig) -> Result<Self, ClientError> {
        let keyring = match &config.docker_container {
            Some(container) => Keyring::Container(container.clone()),
            None => Keyring::Local(
                tempfile::Builder::new()
                    .prefix("e2e-keyring-")
                    .tempdir()
                    .map_err(|source| ClientError::Io {
                        path: std::env::temp_dir(),
                        source,
                    })?,
            ),
        };

        // Built before the key exists so a failure past this point still cleans up.
        let mut client = Self {
            config,
            http: reqwest::Client::new(),
            identity: Identity {
                name: format!("e2e-{}", hex::encode(rand::random::<[u8; 6]>())),
                address: String::new(),
            },
            keyring,
        };

        let mut args = vec!["keys".to_string(), "add".to_string(), client.identity.name.clone()];
        args.extend(client.keyring.flags());
        args.extend(["--output".to_string(), "json".to_string()]);
        let output = client.cli(&args).await?;

        // Older releases print the new key to stderr.
        let raw = if output.stdout.trim().is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        let key: KeyOutput = serde_json::from_str(raw.trim())?;
        client.identity.address = key.address;

        Ok(client)
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn cli(&self, args: &[String]) -> Result<CommandOutput, ClientError> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run(command(&self.config, &args), self.config.command_timeout).await
    }

    fn tx_flags(&self, gas_limit: u64) -> Vec<String> {
        let mut flags = vec![
            "--from".to_string(),
            self.identity.name.clone(),
            "--gas".to_string(),
            gas_limit.to_string(),
            "--gas-prices".to_string(),
            self.config.gas_prices.clone(),
            "--chain-id".to_string(),
            self.config.chain_id.clone(),
            "--node".to_string(),
            self.config.node_url.clone(),
            "--broadcast-mode".to_string(),
            "sync".to_string(),
            "--output".to_string(),
            "json".to_string(),
            "-y".to_string(),
        ];
        flags.extend(self.keyring.flags());
        flags
    }

    /// Command that deletes the run's key from a container keyring.
    fn key_cleanup(&self) -> Option<std::process::Command> {
        let Keyring::Container(container) = &self.keyring else {
            return None;
        };

        let mut cmd = std::process::Command::new("docker");
        cmd.args(["exec", container.as_str()])
            .arg(&self.config.secretd_bin)
            .args(["keys", "delete", self.identity.name.as_str(), "-y"])
            .args(["--keyring-backend", KEYRING_BACKEND]);
        Some(cmd)
    }

    /// Broadcasts a transaction and waits for its inclusion. Transactions the node refuses
    /// up front are returned as-is with their non-zero code.
    async fn broadcast(
        &self,
        mut args: Vec<String>,
        gas_limit: u64,
    ) -> Result<TxResponse, ClientError> {
        args.extend(self.tx_flags(gas_limit));

        let output = self.cli(&args).await?;
        let submitted: TxResponse = serde_json::from_str(output.stdout.trim())?;

        if !submitted.is_success() {
            log::warn!(
                "transaction {} rejected before inclusion: {}",
                submitted.txhash,
                submitted.raw_log
            );
            return Ok(submitted);
        }

        log::debug!("submitted transaction {}", submitted.txhash);
        self.wait_for_tx(&submitted.txhash).await
    }

    async fn wait_for_tx(&self, txhash: &str) -> Result<TxResponse, ClientError> {
        match tokio::time::timeout(self.config.tx_timeout, self.poll_tx(txhash)).await {
            Ok(res) => {
                let tx = res?;
                log::debug!("transaction {} included at height {}", tx.txhash, tx.height);
                Ok(tx)
            }
            Err(_) => Err(ClientError::TxTimeout {
                txhash: txhash.to_string(),
                timeout: self.config.tx_timeout,
            }),
        }
    }

    async fn poll_tx(&self, txhash: &str) -> Result<TxResponse, ClientError> {
        let url = self
            .config
            .lcd_url
            .join(&format!("cosmos/tx/v1beta1/txs/{txhash}"))?;

        loop {
            if let Some(found) = self.lcd_get::<GetTxResponse>(url.clone()).await? {
                return Ok(found.tx_response);
            }
            tokio::time::sleep(self.config.tx_poll_interval).await;
        }
    }

    /// GET against the REST endpoint. Not-found answers map to `None`, any other failure
    /// status is an error.
    async fn lcd_get<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ClientError> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response.json().await?));
        }

        // The SDK reports some lookups of missing entries as 400 or 500.
        let missing = status == StatusCode::NOT_FOUND
            || response
                .text()
                .await?
                .to_ascii_lowercase()
                .contains("not found");
        if missing {
            log::debug!("{url} answered with {status}");
            return Ok(None);
        }

        Err(ClientError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }

    async fn code_hash_by_contract_address(&self, address: &str) -> Result<String, ClientError> {
        let url = self
            .config
            .lcd_url
            .join(&format!("compute/v1beta1/code_hash/by_contract_address/{address}"))?;

        self.lcd_get::<CodeHashResponse>(url)
            .await?
            .and_then(|res| res.code_hash)
            .filter(|hash| !hash.is_empty())
            .ok_or_else(|| ClientError::UnknownContract(address.to_string()))
    }

    async fn ensure_contract(&self, contract: &ContractRef) -> Result<(), ClientError> {
        let actual = self.code_hash_by_contract_address(&contract.address).await?;
        check_code_hash(contract, &actual)?;
        Ok(())
    }

    /// Makes `wasm` readable by the CLI and returns the path to hand it.
    async fn stage_wasm(
        &self,
        wasm: &[u8],
    ) -> Result<(tempfile::NamedTempFile, String), ClientError> {
        let mut file = tempfile::Builder::new()
            .suffix(".wasm")
            .tempfile()
            .map_err(|source| ClientError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        file.write_all(wasm).map_err(|source| ClientError::Io {
            path: file.path().to_path_buf(),
            source,
        })?;

        let local_path = file.path().to_string_lossy().into_owned();
        let Some(container) = &self.config.docker_container else {
            return Ok((file, local_path));
        };

        let file_name = file
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "contract.wasm".to_string());
        let remote_path = format!("/tmp/{file_name}");

        let mut copy = Command::new("docker");
        copy.args(["cp", &local_path, &format!("{container}:{remote_path}")])
            .kill_on_drop(true);
        run(copy, self.config.command_timeout).await?;

        Ok((file, remote_path))
    }
}

impl Drop for SecretdClient {
    fn drop(&mut self) {
        let Some(mut cleanup) = self.key_cleanup() else {
            return;
        };

        match cleanup.output() {
            Ok(output) if output.status.success() => {
                log::debug!("deleted key {}", self.identity.name)
            }
            Ok(output) => log::warn!(
                "failed to delete key {}: {}",
                self.identity.name,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(err) => log::warn!("failed to delete key {}: {err}", self.identity.name),
        }
    }
}

#[async_trait]
impl ChainClient for SecretdClient {
    fn address(&self) -> &str {
        &self.identity.address
    }

    async fn balance(&self, denom: &str) -> Result<Option<Coin>, ClientError> {
        let mut url = self.config.lcd_url.join(&format!(
            "cosmos/bank/v1beta1/balances/{}/by_denom",
            self.identity.address
        ))?;
        url.query_pairs_mut().append_pair("denom", denom);

        let response = self.http.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let res: BalanceResponse = response.json().await?;
        Ok(res.balance)
    }

    async fn store_code(&self, wasm: &[u8], gas_limit: u64) -> Result<TxResponse, ClientError> {
        // The temp file has to outlive the broadcast.
        let (_staged, path) = self.stage_wasm(wasm).await?;
        let args = vec!["tx".into(), "compute".into(), "store".into(), path];
        self.broadcast(args, gas_limit).await
    }

    async fn code_hash_by_code_id(&self, code_id: CodeId) -> Result<Option<String>, ClientError> {
        let url = self
            .config
            .lcd_url
            .join(&format!("compute/v1beta1/code_hash/by_code_id/{code_id}"))?;

        Ok(self
            .lcd_get::<CodeHashResponse>(url)
            .await?
            .and_then(|res| res.code_hash)
            .filter(|hash| !hash.is_empty()))
    }

    async fn instantiate(
        &self,
        code_id: CodeId,
        code_hash: &str,
        init_msg: &serde_json::Value,
        label: &str,
        gas_limit: u64,
    ) -> Result<TxResponse, ClientError> {
        let args = vec![
            "tx".into(),
            "compute".into(),
            "instantiate".into(),
            code_id.to_string(),
            init_msg.to_string(),
            "--label".into(),
            label.to_string(),
            "--code-hash".into(),
            code_hash.to_string(),
        ];
        self.broadcast(args, gas_limit).await
    }

    async fn query_contract(
        &self,
        contract: &ContractRef,
        query: &serde_json::Value,
    ) -> Result<String, ClientError> {
        self.ensure_contract(contract).await?;

        let args = vec![
            "query".into(),
            "compute".into(),
            "query".into(),
            contract.address.clone(),
            query.to_string(),
            "--node".into(),
            self.config.node_url.clone(),
        ];
        let output = self.cli(&args).await?;

        Ok(output.stdout)
    }

    async fn execute_contract(
        &self,
        contract: &ContractRef,
        msg: &serde_json::Value,
        gas_limit: u64,
    ) -> Result<TxResponse, ClientError> {
        self.ensure_contract(contract).await?;

        let args = vec![
            "tx".into(),
            "compute".into(),
            "execute".into(),
            contract.address.clone(),
            msg.to_string(),
            "--code-hash".into(),
            contract.code_hash.clone(),
        ];
        self.broadcast(args, gas_limit).await
    }
}

struct CommandOutput {
    stdout: String,
    stderr: String,
}

/// Builds a `secretd` invocation, wrapped in `docker exec` when a container is configured.
fn command(config: &ClientConfig, args: &[&str]) -> Command {
    let mut cmd = match &config.docker_container {
        Some(container) => {
            let mut cmd = Command::new("docker");
            cmd.args(["exec", container.as_str()]).arg(&config.secretd_bin);
            cmd
        }
        None => Command::new(&config.secretd_bin),
    };
    cmd.args(args).kill_on_drop(true);
    cmd
}

async fn run(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, ClientError> {
    let rendered = render(cmd.as_std());
    log::debug!("running {rendered}");

    let finished = tokio::time::timeout(timeout, cmd.output()).await;
    let output = match finished {
        Ok(output) => output.map_err(|source| ClientError::Spawn {
            program: cmd.as_std().get_program().to_string_lossy().into_owned(),
            source,
        })?,
        Err(_) => {
            return Err(ClientError::CommandTimeout {
                command: rendered,
                timeout,
            })
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(ClientError::CommandFailed {
            command: rendered,
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(CommandOutput { stdout, stderr })
}

fn render(cmd: &std::process::Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
