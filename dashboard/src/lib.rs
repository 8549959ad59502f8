//! Chaos Coin dashboard.
//!
//! Network facing side of the client: the read-only market APIs and
//! their pollers, the Avalanche JSON-RPC client with the token contract
//! binding, the admin mint flow and the text views used by the
//! `chaos-dashboard` binary.

pub mod config;
pub mod contract;
pub mod market_api;
pub mod mint;
pub mod poller;
pub mod rpc_client;
pub mod views;
pub mod wallet;
pub mod widgets;

pub use config::{ConfigValidator, ValidatedConfig};
pub use contract::{TokenContract, TokenWriter};
pub use market_api::{MarketApi, MarketApiConfig};
pub use mint::{prepare_mint, submit_mint, MintError, PreparedMint};
pub use poller::{FailurePolicy, PollSchedule, PollState, SnapshotPoller, SnapshotSource};
pub use rpc_client::RpcClient;
pub use wallet::{SessionWallet, WalletConnector};
