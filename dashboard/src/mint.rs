//! Admin mint flow: validate the form, then hand the transaction to the
//! token writer.
//!
//! Validation errors carry the exact message shown next to the form.
//! Every submission failure (wrong chain, rejected by the wallet, reverted,
//! node error) collapses into one generic message; details only go to the log.

use chaos_common::{
    auth::is_admin,
    security::{validate_address, validate_amount},
};
use log::error;
use primitive_types::U256;
use thiserror::Error;

use crate::contract::{parse_token_amount, TokenWriter, TransactionReceipt};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MintError {
    #[error("Connect your wallet to access token operations")]
    NotConnected,
    #[error("Access restricted to treasury address only")]
    Unauthorized,
    #[error("Invalid address format")]
    InvalidAddress,
    #[error("Amount must be between 0 and 1,000,000")]
    InvalidAmount,
    #[error("Transaction failed. Please try again.")]
    TransactionFailed,
}

/// Validated mint request, ready to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedMint {
    pub from: String,
    pub to: String,
    pub amount: U256,
}

/// Run the same checks as the mint form, in the same order
pub fn prepare_mint(
    account: Option<&str>,
    treasury: &str,
    to: &str,
    amount: &str,
) -> Result<PreparedMint, MintError> {
    let from = account.ok_or(MintError::NotConnected)?;
    if !is_admin(Some(from), treasury) {
        return Err(MintError::Unauthorized);
    }

    if !validate_address(to) {
        return Err(MintError::InvalidAddress);
    }

    let value: f64 = amount.trim().parse().unwrap_or(f64::NAN);
    if !validate_amount(value) {
        return Err(MintError::InvalidAmount);
    }
    // digits past 18 decimals are dropped, so a tiny amount can still be zero
    let amount = parse_token_amount(amount)
        .filter(|amount| !amount.is_zero())
        .ok_or(MintError::InvalidAmount)?;

    Ok(PreparedMint {
        from: from.to_owned(),
        to: to.to_owned(),
        amount,
    })
}

pub async fn submit_mint<W: TokenWriter + ?Sized>(
    writer: &W,
    mint: &PreparedMint,
) -> Result<TransactionReceipt, MintError> {
    let result = match writer.verify_chain().await {
        Ok(()) => writer.mint_to(&mint.from, &mint.to, mint.amount).await,
        Err(e) => Err(e),
    };
    result.map_err(|e| {
        error!("Transaction error: {:#}", e);
        MintError::TransactionFailed
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREASURY: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";
    const TARGET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn test_prepare_mint_order_of_checks() {
        assert_eq!(
            prepare_mint(None, TREASURY, "bad", "0"),
            Err(MintError::NotConnected)
        );
        assert_eq!(
            prepare_mint(Some(TARGET), TREASURY, TARGET, "1"),
            Err(MintError::Unauthorized)
        );
        assert_eq!(
            prepare_mint(Some(TREASURY), TREASURY, "0x123", "0"),
            Err(MintError::InvalidAddress)
        );
        for amount in [
            "0",
            "-5",
            "1000000.5",
            "abc",
            "",
            "1e3",
            "0.0000000000000000001",
        ] {
            assert_eq!(
                prepare_mint(Some(TREASURY), TREASURY, TARGET, amount),
                Err(MintError::InvalidAmount),
                "amount {:?}",
                amount
            );
        }
    }

    #[test]
    fn test_prepare_mint_converts_to_base_units() {
        let mint = prepare_mint(Some(&TREASURY.to_lowercase()), TREASURY, TARGET, "1000000").unwrap();
        assert_eq!(mint.amount, U256::exp10(18) * U256::from(1_000_000u64));
        assert_eq!(mint.to, TARGET);

        let mint = prepare_mint(Some(TREASURY), TREASURY, TARGET, "0.01").unwrap();
        assert_eq!(mint.amount, U256::exp10(16));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(MintError::InvalidAddress.to_string(), "Invalid address format");
        assert_eq!(
            MintError::TransactionFailed.to_string(),
            "Transaction failed. Please try again."
        );
    }
}
