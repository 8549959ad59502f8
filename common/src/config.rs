pub const VERSION: &str = env!("BUILD_VERSION");

// Token metadata
pub const TOKEN_SYMBOL: &str = "CHAOS";
pub const TOKEN_DECIMALS: u32 = 18;
pub const TOKEN_STANDARD: &str = "ERC-20";

// Avalanche C-Chain
pub const CHAIN_ID: u64 = 43114;
pub const CHAIN_NAME: &str = "avalanche";
pub const NETWORK_DISPLAY_NAME: &str = "Avalanche C-Chain";

// Upper bound accepted by the mint form, in whole tokens
pub const MAX_MINT_AMOUNT: f64 = 1_000_000.0;

// Single storage key holding the whole JSON post list
pub const POSTS_STORAGE_KEY: &str = "chaoscoin_posts";
// Every post is published under the project account
pub const OFFICIAL_AUTHOR: &str = "Chaos Coin Official";
// Same limit as the post editor
pub const MAX_POST_LENGTH: usize = 280;

// Price shown before the first successful fetch
pub const FALLBACK_PRICE_USD: f64 = 0.001;

// Market movers: how many entries on each side of the ranking
pub const MOVERS_PER_SIDE: usize = 5;
// News aggregation limits
pub const NEWS_FETCH_LIMIT: usize = 20;
pub const NEWS_DISPLAY_LIMIT: usize = 10;
// The home dashboard shows a shorter digest
pub const HOME_NEWS_LIMIT: usize = 5;
pub const HOME_MOVERS_LIMIT: usize = 3;
pub const NEWS_DESCRIPTION_LENGTH: usize = 150;

// Poll intervals in seconds
pub const DASHBOARD_POLL_INTERVAL_SECS: u64 = 60;
pub const PRICE_POLL_INTERVAL_SECS: u64 = 30;

// Rate limiter defaults
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 10;
pub const RATE_LIMIT_WINDOW_MILLIS: u64 = 60_000;
