use crate::client::ChainClient;
use anyhow::{Context, Result};
use std::path::Path;
use toolkit::errors::DeployError;
use toolkit::logs::{extract_code_id, extract_contract_address};
use toolkit::msg::InstantiateMsg;
use toolkit::{wasm_checksum, ContractRef};

pub const UPLOAD_GAS_LIMIT: u64 = 5_000_000;
pub const INSTANTIATE_GAS_LIMIT: u64 = 1_000_000;

/// Prefix of every contract label. A random suffix keeps repeated runs from colliding.
pub const LABEL_PREFIX: &str = "My contract";

pub fn unique_label(prefix: &str) -> String {
    format!("{prefix}{}", rand::random::<u32>())
}

/// Reads the compiled contract from `contract_path`, then uploads and instantiates it.
pub async fn initialize_contract<C>(
    client: &C,
    contract_path: &Path,
    init_msg: &InstantiateMsg,
) -> Result<ContractRef>
where
    C: ChainClient + ?Sized,
{
    let wasm = tokio::fs::read(contract_path)
        .await
        .with_context(|| format!("failed to read contract from {}", contract_path.display()))?;

    deploy_contract(client, &wasm, init_msg).await
}

/// Uploads `wasm`, resolves its content hash and instantiates it with `init_msg`.
///
/// Every step must fully succeed; there is no partially deployed result.
pub async fn deploy_contract<C>(
    client: &C,
    wasm: &[u8],
    init_msg: &InstantiateMsg,
) -> Result<ContractRef>
where
    C: ChainClient + ?Sized,
{
    log::info!("Uploading contract ({} bytes)", wasm.len());

    let upload = client
        .store_code(wasm, UPLOAD_GAS_LIMIT)
        .await
        .context("failed to broadcast contract upload")?;

    if !upload.is_success() {
        log::error!("Failed to get code id: {}", upload.raw_log);
        return Err(DeployError::UploadFailed {
            code: upload.code,
            raw_log: upload.raw_log,
        }
        .into());
    }

    let code_id = extract_code_id(&upload)?;
    log::info!("Contract codeId: {code_id}");

    let code_hash = client
        .code_hash_by_code_id(code_id)
        .await
        .with_context(|| format!("failed to look up code hash of code id {code_id}"))?
        .ok_or(DeployError::MissingCodeHash(code_id))?;
    log::info!("Contract hash: {code_hash}");

    let local_hash = wasm_checksum(wasm);
    if !local_hash.eq_ignore_ascii_case(&code_hash) {
        log::warn!("chain reports code hash {code_hash}, local bytecode hashes to {local_hash}");
    }

    let label = unique_label(LABEL_PREFIX);
    let init_msg = serde_json::to_value(init_msg)?;

    let instantiation = client
        .instantiate(code_id, &code_hash, &init_msg, &label, INSTANTIATE_GAS_LIMIT)
        .await
        .context("failed to broadcast contract instantiation")?;

    if !instantiation.is_success() {
        return Err(DeployError::InstantiateFailed {
            code: instantiation.code,
            raw_log: instantiation.raw_log,
        }
        .into());
    }

    let address = extract_contract_address(&instantiation)?;
    log::info!("Contract address: {address}");

    Ok(ContractRef::new(code_hash, address)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::query_count;
    use crate::mock::{MockChain, MockFaults};

    const WASM: &[u8] = b"\0asm\x01\0\0\0counter";

    fn funded() -> MockChain {
        let chain = MockChain::new();
        chain.set_balance(chain.address(), 100_000_000);
        chain
    }

    fn deploy_error(err: anyhow::Error) -> DeployError {
        err.downcast::<DeployError>().expect("a deploy error")
    }

    #[tokio::test]
    async fn deploys_and_resolves_hash_and_address() {
        let chain = funded();

        let contract = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap();

        assert_eq!(contract.code_hash, wasm_checksum(WASM));
        assert!(contract.address.starts_with("secret1"));
        assert_eq!(query_count(&chain, &contract).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn repeated_deployments_do_not_collide() {
        let chain = funded();

        let first = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap();
        let second = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap();

        assert_ne!(first.address, second.address);
        assert_eq!(chain.contract_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_label_is_rejected_by_the_chain() {
        let chain = funded();
        chain.store_code(WASM, UPLOAD_GAS_LIMIT).await.unwrap();
        let code_id = toolkit::CodeId(1);
        let hash = wasm_checksum(WASM);
        let msg = serde_json::json!({ "count": 1 });

        let first = chain
            .instantiate(code_id, &hash, &msg, "fixed", INSTANTIATE_GAS_LIMIT)
            .await
            .unwrap();
        let second = chain
            .instantiate(code_id, &hash, &msg, "fixed", INSTANTIATE_GAS_LIMIT)
            .await
            .unwrap();

        assert!(first.is_success());
        assert!(!second.is_success());
    }

    #[test]
    fn labels_are_uniquified() {
        let label = unique_label(LABEL_PREFIX);
        assert!(label.starts_with(LABEL_PREFIX));
        assert!(label[LABEL_PREFIX.len()..].parse::<u32>().is_ok());
    }

    #[tokio::test]
    async fn rejected_upload_is_fatal() {
        let chain = funded();
        chain.set_faults(MockFaults {
            reject_uploads: true,
            ..Default::default()
        });

        let err = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap_err();
        assert!(matches!(deploy_error(err), DeployError::UploadFailed { code: 2, .. }));
    }

    #[tokio::test]
    async fn unfunded_upload_is_fatal() {
        let chain = MockChain::new();

        let err = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap_err();
        assert!(matches!(deploy_error(err), DeployError::UploadFailed { .. }));
    }

    #[tokio::test]
    async fn missing_code_id_is_fatal() {
        let chain = funded();
        chain.set_faults(MockFaults {
            drop_upload_code_id: true,
            ..Default::default()
        });

        let err = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap_err();
        assert_eq!(deploy_error(err), DeployError::MissingCodeId);
        assert_eq!(chain.contract_count(), 0);
    }

    #[tokio::test]
    async fn missing_code_hash_is_fatal() {
        let chain = funded();
        chain.set_faults(MockFaults {
            forget_code_hashes: true,
            ..Default::default()
        });

        let err = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap_err();
        assert_eq!(deploy_error(err), DeployError::MissingCodeHash(toolkit::CodeId(1)));
    }

    #[tokio::test]
    async fn failed_instantiation_is_fatal() {
        let chain = funded();
        chain.set_faults(MockFaults {
            reject_instantiations: true,
            ..Default::default()
        });

        let err = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap_err();
        assert!(matches!(
            deploy_error(err),
            DeployError::InstantiateFailed { code: 3, .. }
        ));
    }

    #[tokio::test]
    async fn address_outside_message_log_is_fatal() {
        let chain = funded();
        chain.set_faults(MockFaults {
            hide_contract_address: true,
            ..Default::default()
        });

        let err = deploy_contract(&chain, WASM, &InstantiateMsg { count: 4 })
            .await
            .unwrap_err();
        assert_eq!(deploy_error(err), DeployError::MissingContractAddress);
    }

    #[tokio::test]
    async fn unreadable_contract_file_is_fatal() {
        let chain = funded();
        let err = initialize_contract(
            &chain,
            Path::new("/nonexistent/contract.wasm"),
            &InstantiateMsg { count: 4 },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed to read contract"));
    }

    #[tokio::test]
    async fn reads_contract_from_disk() {
        let chain = funded();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, WASM).unwrap();

        let contract = initialize_contract(&chain, file.path(), &InstantiateMsg { count: 9 })
            .await
            .unwrap();
        assert_eq!(query_count(&chain, &contract).await.unwrap(), 9);
    }
}
