use anyhow::{bail, Result};
use async_trait::async_trait;
use chaos_dashboard::{
    contract::{TokenWriter, TransactionReceipt},
    mint::{prepare_mint, submit_mint, MintError},
};
use primitive_types::U256;
use std::sync::Mutex;

const TREASURY: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";
const RECIPIENT: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

#[derive(Default)]
struct RecordingWriter {
    wrong_chain: bool,
    reject: bool,
    calls: Mutex<Vec<(String, String, U256)>>,
}

#[async_trait]
impl TokenWriter for RecordingWriter {
    async fn verify_chain(&self) -> Result<()> {
        if self.wrong_chain {
            bail!("Chain mismatch! Expected chain id 43114 while node is on 1");
        }
        Ok(())
    }

    async fn mint_to(&self, from: &str, to: &str, amount: U256) -> Result<TransactionReceipt> {
        self.calls
            .lock()
            .unwrap()
            .push((from.to_owned(), to.to_owned(), amount));
        if self.reject {
            bail!("user rejected the request");
        }
        Ok(TransactionReceipt {
            transaction_hash: "0xfeed".to_owned(),
            block_number: Some("0x10".to_owned()),
            status: Some("0x1".to_owned()),
        })
    }
}

#[tokio::test]
async fn test_treasury_mint_reaches_writer() {
    let writer = RecordingWriter::default();
    let mint = prepare_mint(Some(TREASURY), TREASURY, RECIPIENT, "250.5").unwrap();
    let receipt = submit_mint(&writer, &mint).await.unwrap();
    assert_eq!(receipt.transaction_hash, "0xfeed");

    let calls = writer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, TREASURY);
    assert_eq!(calls[0].1, RECIPIENT);
    assert_eq!(calls[0].2, U256::exp10(17) * U256::from(2505u64));
}

#[tokio::test]
async fn test_writer_failure_is_generic() {
    let writer = RecordingWriter {
        reject: true,
        ..Default::default()
    };
    let mint = prepare_mint(Some(TREASURY), TREASURY, RECIPIENT, "1").unwrap();
    let err = submit_mint(&writer, &mint).await.unwrap_err();
    assert_eq!(err, MintError::TransactionFailed);
    assert_eq!(err.to_string(), "Transaction failed. Please try again.");
}

#[tokio::test]
async fn test_wrong_chain_is_generic_and_never_mints() {
    let writer = RecordingWriter {
        wrong_chain: true,
        ..Default::default()
    };
    let mint = prepare_mint(Some(TREASURY), TREASURY, RECIPIENT, "1").unwrap();
    let err = submit_mint(&writer, &mint).await.unwrap_err();
    assert_eq!(err.to_string(), "Transaction failed. Please try again.");
    assert!(writer.calls.lock().unwrap().is_empty());
}

#[test]
fn test_rejected_forms_never_prepare() {
    let cases = [
        (None, RECIPIENT, "1", "Connect your wallet to access token operations"),
        (Some(RECIPIENT), RECIPIENT, "1", "Access restricted to treasury address only"),
        (Some(TREASURY), "0x1234", "1", "Invalid address format"),
        (Some(TREASURY), RECIPIENT, "0", "Amount must be between 0 and 1,000,000"),
        (Some(TREASURY), RECIPIENT, "1000001", "Amount must be between 0 and 1,000,000"),
        (Some(TREASURY), RECIPIENT, "0.0000000000000000001", "Amount must be between 0 and 1,000,000"),
    ];

    for (account, to, amount, message) in cases {
        let err = prepare_mint(account, TREASURY, to, amount).unwrap_err();
        assert_eq!(err.to_string(), message);
    }
}
