use anyhow::Result;
use chaos_common::security::validate_address;
use log::{debug, info};
use thiserror::Error;

use crate::rpc_client::RpcClient;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid account address '{0}'")]
    InvalidAddress(String),
}

/// Source of the active account.
///
/// Views only ever read the address; connecting and signing are the
/// wallet provider's business.
pub trait WalletConnector: Send + Sync {
    fn active_account(&self) -> Option<&str>;

    fn connect(&mut self, address: &str) -> Result<(), WalletError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool {
        self.active_account().is_some()
    }
}

/// Account chosen for the current session: given on the command line or
/// picked from the accounts the node can sign for.
#[derive(Debug, Clone, Default)]
pub struct SessionWallet {
    account: Option<String>,
}

impl SessionWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(address: &str) -> Result<Self, WalletError> {
        let mut wallet = Self::new();
        wallet.connect(address)?;
        Ok(wallet)
    }

    /// Use the first account unlocked on the node, if any
    pub async fn connect_from_node(&mut self, rpc: &RpcClient) -> Result<Option<&str>> {
        let accounts = rpc.accounts().await?;
        match accounts.into_iter().next() {
            Some(account) => {
                self.connect(&account)?;
                Ok(self.active_account())
            }
            None => {
                debug!("Node has no unlocked account");
                Ok(None)
            }
        }
    }
}

impl WalletConnector for SessionWallet {
    fn active_account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    fn connect(&mut self, address: &str) -> Result<(), WalletError> {
        if !validate_address(address) {
            return Err(WalletError::InvalidAddress(address.to_owned()));
        }

        if log::log_enabled!(log::Level::Info) {
            info!("Connected account {}", address);
        }
        self.account = Some(address.to_owned());
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.account.take().is_some() {
            info!("Account disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_disconnect() {
        let mut wallet = SessionWallet::new();
        assert!(!wallet.is_connected());

        assert!(wallet.connect("0xnope").is_err());
        assert!(wallet.active_account().is_none());

        wallet
            .connect("0x52908400098527886E0F7030069857D2E4169EE7")
            .unwrap();
        assert_eq!(
            wallet.active_account(),
            Some("0x52908400098527886E0F7030069857D2E4169EE7")
        );

        wallet.disconnect();
        assert!(!wallet.is_connected());
    }
}
