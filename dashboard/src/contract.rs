//! Typed handle on the Chaos Coin ERC-20 contract.
//!
//! Reads go through `eth_call`. The only write, `mintTo`, is handed to
//! the node with `eth_sendTransaction`: the node signs and broadcasts,
//! this side only waits for the receipt.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chaos_common::{config::TOKEN_DECIMALS, security::validate_address};
use log::{debug, info};
use primitive_types::U256;
use serde::Deserialize;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep, Instant};

use crate::rpc_client::RpcClient;

pub const TOTAL_SUPPLY_SIGNATURE: &str = "totalSupply()";
pub const BALANCE_OF_SIGNATURE: &str = "balanceOf(address)";
pub const MINT_TO_SIGNATURE: &str = "mintTo(address,uint256)";

/// First four bytes of the Keccak-256 of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

// 32 bytes word holding a left padded address
fn encode_address(address: &str) -> Result<String> {
    if !validate_address(address) {
        bail!("Invalid address {}", address);
    }
    Ok(format!("{:0>64}", address[2..].to_lowercase()))
}

// LowerHex of U256 ignores the width flag, pad by hand
fn encode_uint(value: U256) -> String {
    format!("{:0>64}", format!("{:x}", value))
}

/// Build the hex calldata of a call: selector followed by the encoded words
pub fn encode_call(signature: &str, words: &[String]) -> String {
    let mut data = format!("0x{}", hex::encode(selector(signature)));
    for word in words {
        data.push_str(word);
    }
    data
}

/// Decode a single uint256 return value
pub fn decode_uint(value: &Value) -> Result<U256> {
    let text = value
        .as_str()
        .ok_or_else(|| anyhow!("Expected hex string, got {}", value))?;
    let digits = text.strip_prefix("0x").unwrap_or(text);
    if digits.is_empty() {
        // empty return data: no contract at this address
        bail!("Empty return data");
    }
    if digits.len() > 64 {
        bail!("Return data longer than one word");
    }
    U256::from_str_radix(digits, 16).map_err(|e| anyhow!("Invalid uint256 {}: {:?}", text, e))
}

/// Parse a decimal token amount ("12.5") into base units.
///
/// Digits beyond the token decimals are truncated. Exponents, signs and
/// anything that is not a plain decimal number are rejected.
pub fn parse_token_amount(text: &str) -> Option<U256> {
    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let decimals = TOKEN_DECIMALS as usize;
    let mut digits = String::with_capacity(whole.len() + decimals);
    digits.push_str(whole);
    let kept: String = fraction.chars().take(decimals).collect();
    digits.push_str(&kept);
    for _ in kept.len()..decimals {
        digits.push('0');
    }

    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Some(U256::zero());
    }
    U256::from_dec_str(digits).ok()
}

/// Render base units as a decimal token amount without trailing zeros
pub fn format_token_amount(value: U256) -> String {
    let unit = U256::exp10(TOKEN_DECIMALS as usize);
    let whole = value / unit;
    let fraction = value % unit;
    if fraction.is_zero() {
        return whole.to_string();
    }

    let fraction = format!("{:0>width$}", fraction.to_string(), width = TOKEN_DECIMALS as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Lossy conversion for display and USD math
pub fn token_amount_to_f64(value: U256) -> f64 {
    format_token_amount(value).parse().unwrap_or(0.0)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TransactionReceipt {
    /// Pre-byzantium receipts have no status, treat them as success
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() != Some("0x0")
    }
}

/// How long to wait for a mined receipt
#[derive(Debug, Clone, Copy)]
pub struct ReceiptWait {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ReceiptWait {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Write side of the token, kept behind a trait so the mint flow can be
/// exercised without a node
#[async_trait]
pub trait TokenWriter: Send + Sync {
    /// Fail if the node is on another chain than the configured one
    async fn verify_chain(&self) -> Result<()>;

    async fn mint_to(&self, from: &str, to: &str, amount: U256) -> Result<TransactionReceipt>;
}

pub struct TokenContract {
    rpc: Arc<RpcClient>,
    address: String,
    chain_id: u64,
    receipt_wait: ReceiptWait,
}

impl TokenContract {
    pub fn new(rpc: Arc<RpcClient>, address: &str, chain_id: u64) -> Result<Self> {
        if !validate_address(address) {
            bail!("Invalid token contract address {}", address);
        }

        Ok(Self {
            rpc,
            address: address.to_owned(),
            chain_id,
            receipt_wait: ReceiptWait::default(),
        })
    }

    pub fn with_receipt_wait(mut self, receipt_wait: ReceiptWait) -> Self {
        self.receipt_wait = receipt_wait;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn call(&self, data: String) -> Result<Value> {
        self.rpc
            .request(
                "eth_call",
                json!([{ "to": self.address, "data": data }, "latest"]),
            )
            .await
    }

    pub async fn total_supply(&self) -> Result<U256> {
        let result = self.call(encode_call(TOTAL_SUPPLY_SIGNATURE, &[])).await?;
        decode_uint(&result).context("Invalid totalSupply answer")
    }

    pub async fn balance_of(&self, owner: &str) -> Result<U256> {
        let data = encode_call(BALANCE_OF_SIGNATURE, &[encode_address(owner)?]);
        let result = self.call(data).await?;
        decode_uint(&result).context("Invalid balanceOf answer")
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        let deadline = Instant::now() + self.receipt_wait.timeout;
        loop {
            let receipt = self
                .rpc
                .request_optional("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return serde_json::from_value(receipt).context("Invalid transaction receipt");
            }

            if Instant::now() >= deadline {
                bail!(
                    "No receipt for {} after {:?}",
                    tx_hash,
                    self.receipt_wait.timeout
                );
            }
            sleep(self.receipt_wait.poll_interval).await;
        }
    }
}

#[async_trait]
impl TokenWriter for TokenContract {
    async fn verify_chain(&self) -> Result<()> {
        let remote = self.rpc.chain_id().await?;
        if remote != self.chain_id {
            bail!(
                "Chain mismatch! Expected chain id {} while node is on {}",
                self.chain_id,
                remote
            );
        }
        Ok(())
    }

    async fn mint_to(&self, from: &str, to: &str, amount: U256) -> Result<TransactionReceipt> {
        let data = encode_call(MINT_TO_SIGNATURE, &[encode_address(to)?, encode_uint(amount)]);
        let tx = json!([{
            "from": from,
            "to": self.address,
            "data": data,
            "chainId": format!("0x{:x}", self.chain_id),
        }]);

        let result = self.rpc.request("eth_sendTransaction", tx).await?;
        let tx_hash = result
            .as_str()
            .ok_or_else(|| anyhow!("Expected transaction hash string"))?
            .to_owned();
        if log::log_enabled!(log::Level::Info) {
            info!("Transaction sent: {}", tx_hash);
        }

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if !receipt.succeeded() {
            bail!("Transaction {} reverted", receipt.transaction_hash);
        }

        if log::log_enabled!(log::Level::Info) {
            info!("Transaction confirmed: {}", receipt.transaction_hash);
        }
        if let Some(block) = receipt.block_number.as_ref() {
            debug!("Mined in block {}", block);
        }
        Ok(receipt)
    }
}

impl std::fmt::Debug for TokenContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenContract")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(selector(TOTAL_SUPPLY_SIGNATURE)), "18160ddd");
        assert_eq!(hex::encode(selector(BALANCE_OF_SIGNATURE)), "70a08231");
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn test_encode_balance_of_call() {
        let owner = "0x52908400098527886E0F7030069857D2E4169EE7";
        let data = encode_call(BALANCE_OF_SIGNATURE, &[encode_address(owner).unwrap()]);
        assert_eq!(
            data,
            "0x70a0823100000000000000000000000052908400098527886e0f7030069857d2e4169ee7"
        );
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(encode_address("0x1234").is_err());
    }

    #[test]
    fn test_encode_uint_word() {
        let word = encode_uint(U256::from(255u64));
        assert_eq!(word.len(), 64);
        assert!(word.ends_with("ff"));
        assert!(word.starts_with("000"));
    }

    #[test]
    fn test_decode_uint() {
        let one_token = format!("0x{}", encode_uint(U256::exp10(18)));
        assert_eq!(decode_uint(&json!(one_token)).unwrap(), U256::exp10(18));
        assert_eq!(decode_uint(&json!("0x0")).unwrap(), U256::zero());
        assert!(decode_uint(&json!("0x")).is_err());
        assert!(decode_uint(&json!(12)).is_err());
    }

    #[test]
    fn test_parse_token_amount() {
        assert_eq!(parse_token_amount("1"), Some(U256::exp10(18)));
        assert_eq!(parse_token_amount("0.5"), Some(U256::exp10(17) * U256::from(5u64)));
        assert_eq!(parse_token_amount(".25"), Some(U256::exp10(16) * U256::from(25u64)));
        assert_eq!(
            parse_token_amount("1000000"),
            Some(U256::exp10(18) * U256::from(1_000_000u64))
        );
        // extra precision is cut
        assert_eq!(
            parse_token_amount("0.0000000000000000019"),
            Some(U256::one())
        );
        assert_eq!(parse_token_amount("0"), Some(U256::zero()));
        assert_eq!(parse_token_amount(""), None);
        assert_eq!(parse_token_amount("."), None);
        assert_eq!(parse_token_amount("-1"), None);
        assert_eq!(parse_token_amount("1e3"), None);
        assert_eq!(parse_token_amount("1.2.3"), None);
    }

    #[test]
    fn test_format_token_amount() {
        assert_eq!(format_token_amount(U256::zero()), "0");
        assert_eq!(format_token_amount(U256::exp10(18) * U256::from(42u64)), "42");
        assert_eq!(format_token_amount(U256::exp10(17) * U256::from(15u64)), "1.5");
        assert_eq!(format_token_amount(U256::one()), "0.000000000000000001");
        assert_eq!(token_amount_to_f64(U256::exp10(17) * U256::from(25u64)), 2.5);
    }

    #[test]
    fn test_receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": "0xabc",
            "blockNumber": "0x10",
            "status": "0x0"
        }))
        .unwrap();
        assert!(!receipt.succeeded());

        let receipt: TransactionReceipt =
            serde_json::from_value(json!({ "transactionHash": "0xabc", "status": "0x1" })).unwrap();
        assert!(receipt.succeeded());
    }
}
