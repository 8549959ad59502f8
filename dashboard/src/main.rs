use anyhow::{bail, Context, Result};
use chaos_common::{
    config::{
        HOME_MOVERS_LIMIT, HOME_NEWS_LIMIT, MOVERS_PER_SIDE, NEWS_DISPLAY_LIMIT, NEWS_FETCH_LIMIT,
        VERSION,
    },
    feed::{FileStorage, PollDraft, PostFeed},
    logger::{setup_logger, LogLevel, LoggerConfig, DEFAULT_LOGS_DATETIME_FORMAT},
    market::{MarketMovers, PriceSnapshot},
};
use chaos_dashboard::{
    config::{defaults, ConfigValidator, ValidatedConfig},
    contract::{format_token_amount, token_amount_to_f64, TokenContract},
    market_api::{MarketApi, MarketApiConfig},
    mint::{prepare_mint, submit_mint},
    poller::{
        FailurePolicy, MarketMoversSource, NewsFeedSource, PollSchedule, PollState,
        SnapshotPoller, SnapshotSource, TokenBalanceSource, TokenPriceSource,
    },
    rpc_client::RpcClient,
    views,
    wallet::{SessionWallet, WalletConnector},
    widgets::DEFAULT_CHECKOUT_ID,
};
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info, warn};
use std::{path::Path, sync::Arc};
use tokio::{select, signal::ctrl_c};

/// Chaos Coin dashboard
#[derive(Parser)]
#[command(name = "chaos-dashboard")]
#[command(about = "Chaos Coin dashboard: price, market movers, news, social feed and token admin")]
#[command(version = VERSION)]
struct Cli {
    #[command(flatten)]
    config: CliConfig,

    /// Print the first snapshot and exit instead of polling
    #[arg(long, global = true)]
    once: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Debug)]
struct CliConfig {
    /// Set log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Disable the log file
    #[arg(long)]
    disable_file_logging: bool,

    /// Disable the usage of colors in log
    #[arg(long)]
    disable_log_color: bool,

    /// Log filename
    #[arg(long, default_value_t = String::from(defaults::FILENAME_LOG))]
    filename_log: String,

    /// Logs directory
    #[arg(long, default_value_t = String::from(defaults::LOGS_PATH))]
    logs_path: String,

    /// Storage directory for the post feed
    #[arg(long, default_value_t = String::from(defaults::STORAGE_PATH))]
    storage_path: String,

    /// Avalanche C-Chain RPC endpoint
    #[arg(long, env = "CHAOS_RPC_ADDRESS", default_value_t = String::from(defaults::RPC_ADDRESS))]
    rpc_address: String,

    /// Expected chain id of the RPC endpoint
    #[arg(long, default_value_t = chaos_common::config::CHAIN_ID)]
    chain_id: u64,

    /// Token contract address
    #[arg(long, env = "CHAOS_COIN_ADDRESS")]
    token_address: Option<String>,

    /// Treasury address, the only administrator
    #[arg(long, env = "TREASURY_ADDRESS")]
    treasury_address: Option<String>,

    /// Connected account
    #[arg(short, long, env = "CHAOS_ACCOUNT")]
    account: Option<String>,

    /// Use the first account unlocked on the node when no account is given
    #[arg(long)]
    node_account: bool,

    /// thirdweb client id for the checkout widget
    #[arg(long, env = "THIRDWEB_CLIENT_ID")]
    thirdweb_client_id: Option<String>,

    /// thirdweb checkout id
    #[arg(long, default_value_t = String::from(DEFAULT_CHECKOUT_ID))]
    checkout_id: String,

    /// rss2json API key
    #[arg(long, env = "RSS2JSON_API_KEY")]
    rss2json_api_key: Option<String>,

    /// Advanced: Request timeout in seconds
    #[arg(long, default_value_t = defaults::REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    /// Advanced: Connection timeout in seconds
    #[arg(long, default_value_t = defaults::CONNECTION_TIMEOUT_SECS)]
    connection_timeout_secs: u64,

    /// Advanced: How long to wait for a mint receipt, in seconds
    #[arg(long, default_value_t = defaults::RECEIPT_TIMEOUT_SECS)]
    receipt_timeout_secs: u64,

    /// Price refresh interval in seconds
    #[arg(long, default_value_t = chaos_common::config::PRICE_POLL_INTERVAL_SECS)]
    price_poll_secs: u64,

    /// Dashboard refresh interval in seconds
    #[arg(long, default_value_t = chaos_common::config::DASHBOARD_POLL_INTERVAL_SECS)]
    dashboard_poll_secs: u64,

    /// Enable strict configuration validation
    #[arg(long)]
    strict_validation: bool,

    /// Disable auto-fix of configuration issues
    #[arg(long)]
    no_auto_fix: bool,

    /// JSON File to load the configuration from
    #[arg(long)]
    config_file: Option<String>,

    /// Generate the template at the `config_file` path
    #[arg(long)]
    generate_config_template: bool,
}

impl CliConfig {
    /// Convert CLI configuration to ValidatedConfig
    fn to_validated_config(self) -> ValidatedConfig {
        ValidatedConfig {
            log_level: self.log_level,
            disable_file_logging: self.disable_file_logging,
            disable_log_color: self.disable_log_color,
            filename_log: self.filename_log,
            logs_path: self.logs_path,
            storage_path: self.storage_path,
            rpc_address: self.rpc_address,
            chain_id: self.chain_id,
            token_address: self.token_address,
            treasury_address: self.treasury_address,
            account: self.account,
            thirdweb_client_id: self.thirdweb_client_id,
            checkout_id: self.checkout_id,
            rss2json_api_key: self.rss2json_api_key,
            request_timeout_secs: self.request_timeout_secs,
            connection_timeout_secs: self.connection_timeout_secs,
            receipt_timeout_secs: self.receipt_timeout_secs,
            price_poll_secs: self.price_poll_secs,
            dashboard_poll_secs: self.dashboard_poll_secs,
            auto_fix_config: !self.no_auto_fix,
            strict_validation: self.strict_validation,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Token price, market movers and news, refreshed every minute
    Home,
    /// Token price and the balance of the connected account
    Price,
    /// Latest crypto headlines, loaded once
    News,
    /// Top gainers and losers of the day
    Movers,
    /// Social feed
    Feed {
        #[command(subcommand)]
        action: FeedCommand,
    },
    /// Admin panel: access check and contract stats
    Admin,
    /// Balance of the connected account, or of another address
    Balance {
        address: Option<String>,
    },
    /// Mint tokens from the treasury account
    Mint {
        /// Recipient address
        to: String,
        /// Amount in whole tokens
        amount: String,
    },
    /// Buy, swap, explorer and community links
    Widgets,
}

#[derive(Subcommand)]
enum FeedCommand {
    /// Show the feed, pinned posts first
    List,
    /// Publish a post (treasury only)
    Create {
        content: String,
        /// Attach a poll with this question
        #[arg(long)]
        poll_question: Option<String>,
        /// Poll option, repeat for each option
        #[arg(long = "poll-option")]
        poll_options: Vec<String>,
    },
    /// Pin or unpin a post (treasury only)
    Pin { id: String },
    /// Delete a post (treasury only)
    Delete { id: String },
    /// Like a post
    Like { id: String },
    /// Vote for a poll option, counted from 0
    Vote { id: String, option: usize },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = cli.config;

    // Handle config template generation
    if let Some(path) = cli_config.config_file.as_ref() {
        if cli_config.generate_config_template {
            if Path::new(path).exists() {
                eprintln!("Config file already exists at {path}");
                eprintln!("Use a different path or remove the existing file");
                return Ok(());
            }

            ValidatedConfig::generate_template(path)?;
            println!("Configuration template generated at {path}");
            println!("Edit the file and run the application with --config-file {path}");
            return Ok(());
        }
    }

    let node_account = cli_config.node_account;

    // Load and validate configuration
    let (config, messages) = if let Some(config_path) = &cli_config.config_file {
        ValidatedConfig::from_file(
            config_path,
            cli_config.strict_validation,
            !cli_config.no_auto_fix,
        )?
    } else {
        let mut config = cli_config.to_validated_config();
        let validator = ConfigValidator::new(config.strict_validation, config.auto_fix_config);
        let messages = validator.validate(&mut config)?;
        (config, messages)
    };

    setup_logger(LoggerConfig {
        level: config.log_level,
        dir_path: &config.logs_path,
        filename_log: &config.filename_log,
        disable_file_logging: config.disable_file_logging,
        disable_colors: config.disable_log_color,
        module_logs: vec![
            ("reqwest".to_string(), LogLevel::Warn),
            ("hyper".to_string(), LogLevel::Warn),
        ],
        logs_datetime_format: DEFAULT_LOGS_DATETIME_FORMAT,
    })?;

    if log::log_enabled!(log::Level::Info) {
        info!("Chaos Coin dashboard v{} starting...", VERSION);
    }
    ConfigValidator::report(&messages);

    let rpc = Arc::new(RpcClient::with_config(
        &config.rpc_address,
        config.to_rpc_client_config(),
    )?);

    let mut wallet = match config.account.as_deref() {
        Some(account) => SessionWallet::with_account(account)?,
        None => SessionWallet::new(),
    };
    if node_account && !wallet.is_connected() {
        if let Err(e) = wallet.connect_from_node(&rpc).await {
            warn!("Cannot read accounts from the node: {:#}", e);
        }
    }

    let app = App {
        config,
        rpc,
        wallet,
        once: cli.once,
    };

    match cli.command.unwrap_or(Commands::Home) {
        Commands::Home => app.home().await,
        Commands::Price => app.price().await,
        Commands::News => app.news().await,
        Commands::Movers => app.movers().await,
        Commands::Feed { action } => app.feed(action).await,
        Commands::Admin => app.admin().await,
        Commands::Balance { address } => app.balance(address).await,
        Commands::Mint { to, amount } => app.mint(&to, &amount).await,
        Commands::Widgets => app.widgets(),
    }
}

struct App {
    config: ValidatedConfig,
    rpc: Arc<RpcClient>,
    wallet: SessionWallet,
    once: bool,
}

impl App {
    fn market_api(&self) -> Result<Arc<MarketApi>> {
        let config: MarketApiConfig = self.config.to_market_api_config();
        Ok(Arc::new(MarketApi::new(config)?))
    }

    fn contract(&self) -> Result<Arc<TokenContract>> {
        let contract = TokenContract::new(
            Arc::clone(&self.rpc),
            self.config.token_address()?,
            self.config.chain_id,
        )?
        .with_receipt_wait(self.config.to_receipt_wait());
        Ok(Arc::new(contract))
    }

    fn price_poller(
        &self,
        api: Arc<MarketApi>,
        schedule: PollSchedule,
    ) -> Result<SnapshotPoller<TokenPriceSource>> {
        Ok(SnapshotPoller::new(
            TokenPriceSource::new(api, self.config.token_address()?),
            schedule,
            FailurePolicy::RetainPrevious,
            PriceSnapshot::default(),
        ))
    }

    async fn home(&self) -> Result<()> {
        let api = self.market_api()?;
        let schedule = self.config.dashboard_schedule();
        let price = self.price_poller(Arc::clone(&api), schedule)?;
        let movers = SnapshotPoller::new(
            MarketMoversSource::new(Arc::clone(&api)),
            schedule,
            FailurePolicy::Fallback(MarketMovers::default()),
            MarketMovers::default(),
        );
        let news = SnapshotPoller::new(
            NewsFeedSource::new(api, NEWS_FETCH_LIMIT),
            schedule,
            FailurePolicy::Fallback(Vec::new()),
            Vec::new(),
        );

        let mut price_rx = price.subscribe();
        let mut movers_rx = movers.subscribe();
        let mut news_rx = news.subscribe();
        price.start().await?;
        movers.start().await?;
        news.start().await?;

        loop {
            select! {
                _ = ctrl_c() => {
                    info!("Stopping dashboard");
                    break;
                }
                res = price_rx.changed() => if res.is_err() { break },
                res = movers_rx.changed() => if res.is_err() { break },
                res = news_rx.changed() => if res.is_err() { break },
            }

            let (p, m, n) = (price.current(), movers.current(), news.current());
            // wait for the first round of all three before drawing
            if !(p.loaded && m.loaded && n.loaded) {
                continue;
            }
            println!(
                "{}\n\n{}\n\n{}\n",
                views::render_price(&p),
                views::render_movers(&m, HOME_MOVERS_LIMIT),
                views::render_news(&n, HOME_NEWS_LIMIT)
            );
            if self.once {
                break;
            }
        }

        for result in [price.stop().await, movers.stop().await, news.stop().await] {
            if let Err(e) = result {
                debug!("{}", e);
            }
        }
        Ok(())
    }

    async fn price(&self) -> Result<()> {
        let api = self.market_api()?;
        let schedule = self.config.price_schedule();
        let price = self.price_poller(api, schedule)?;

        let balance = match self.wallet.active_account() {
            Some(account) => Some(SnapshotPoller::new(
                TokenBalanceSource::new(self.contract()?, account),
                schedule,
                FailurePolicy::RetainPrevious,
                0.0,
            )),
            None => None,
        };

        let mut price_rx = price.subscribe();
        price.start().await?;
        let mut balance_rx = match balance.as_ref() {
            Some(poller) => {
                let rx = poller.subscribe();
                poller.start().await?;
                Some(rx)
            }
            None => None,
        };

        loop {
            select! {
                _ = ctrl_c() => {
                    info!("Stopping price view");
                    break;
                }
                res = price_rx.changed() => if res.is_err() { break },
                Some(res) = async {
                    match balance_rx.as_mut() {
                        Some(rx) => Some(rx.changed().await),
                        None => None,
                    }
                } => if res.is_err() { break },
            }

            let p = price.current();
            let b: Option<PollState<f64>> = balance.as_ref().map(|poller| poller.current());
            if !p.loaded || b.as_ref().is_some_and(|b| !b.loaded) {
                continue;
            }

            println!("{}", views::render_price(&p));
            println!("{}\n", views::render_balance(b.map(|b| b.value), &p.value));
            if self.once {
                break;
            }
        }

        if let Some(poller) = balance.as_ref() {
            let _ = poller.stop().await;
        }
        let _ = price.stop().await;
        Ok(())
    }

    async fn news(&self) -> Result<()> {
        let poller = SnapshotPoller::new(
            NewsFeedSource::new(self.market_api()?, NEWS_DISPLAY_LIMIT),
            PollSchedule::Once,
            FailurePolicy::Fallback(Vec::new()),
            Vec::new(),
        );
        self.follow(&poller, |state| views::render_news(state, NEWS_DISPLAY_LIMIT))
            .await
    }

    async fn movers(&self) -> Result<()> {
        let poller = SnapshotPoller::new(
            MarketMoversSource::new(self.market_api()?),
            self.config.dashboard_schedule(),
            FailurePolicy::Fallback(MarketMovers::default()),
            MarketMovers::default(),
        );
        self.follow(&poller, |state| views::render_movers(state, MOVERS_PER_SIDE))
            .await
    }

    // Print every snapshot of a single poller until interrupted
    async fn follow<S, F>(&self, poller: &SnapshotPoller<S>, render: F) -> Result<()>
    where
        S: SnapshotSource,
        F: Fn(&PollState<S::Snapshot>) -> String,
    {
        let mut rx = poller.subscribe();
        poller.start().await?;

        loop {
            select! {
                _ = ctrl_c() => {
                    info!("Stopping {} view", poller.name());
                    break;
                }
                res = rx.changed() => {
                    if res.is_err() {
                        break;
                    }
                    let state = rx.borrow_and_update().clone();
                    println!("{}\n", render(&state));
                    if self.once || poller.schedule() == PollSchedule::Once {
                        break;
                    }
                }
            }
        }

        let _ = poller.stop().await;
        Ok(())
    }

    async fn feed(&self, action: FeedCommand) -> Result<()> {
        let treasury = self.config.treasury_address()?;
        let storage = FileStorage::new(&self.config.storage_path);
        let mut feed = PostFeed::load(storage, treasury).await;
        let actor = self.wallet.active_account();

        match action {
            FeedCommand::List => {}
            FeedCommand::Create {
                content,
                poll_question,
                poll_options,
            } => {
                let poll = poll_question.map(|question| PollDraft {
                    question,
                    options: poll_options,
                });
                let post = feed.create(actor, &content, poll).await?;
                println!("Post {} published", post.id);
            }
            FeedCommand::Pin { id } => feed.toggle_pin(actor, &id).await?,
            FeedCommand::Delete { id } => feed.delete(actor, &id).await?,
            FeedCommand::Like { id } => feed.like(&id).await?,
            FeedCommand::Vote { id, option } => feed.vote(&id, option).await?,
        }

        println!("{}", views::render_feed(&feed.sorted()));
        Ok(())
    }

    async fn admin(&self) -> Result<()> {
        let treasury = self.config.treasury_address()?;
        let token = self.config.token_address()?;
        let account = self.wallet.active_account();

        let total_supply = if chaos_common::auth::is_admin(account, treasury) {
            let contract = self.contract()?;
            match contract.total_supply().await {
                Ok(supply) => Some(token_amount_to_f64(supply)),
                Err(e) => {
                    error!("Cannot read total supply: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        println!(
            "{}",
            views::render_admin_panel(account, treasury, token, total_supply)
        );
        Ok(())
    }

    async fn balance(&self, address: Option<String>) -> Result<()> {
        let owner = match address.as_deref().or(self.wallet.active_account()) {
            Some(owner) => owner.to_owned(),
            None => {
                println!("{}", views::render_balance(None, &PriceSnapshot::default()));
                return Ok(());
            }
        };

        let contract = self.contract()?;
        let api = self.market_api()?;
        let (balance, price) = tokio::join!(
            contract.balance_of(&owner),
            api.fetch_token_price(contract.address())
        );
        let balance = balance.context("Cannot read token balance")?;
        let price = price.unwrap_or_else(|e| {
            warn!("Error fetching token price: {:#}", e);
            PriceSnapshot::default()
        });

        debug!("Raw balance of {}: {}", owner, format_token_amount(balance));
        println!(
            "{}",
            views::render_balance(Some(token_amount_to_f64(balance)), &price)
        );
        Ok(())
    }

    async fn mint(&self, to: &str, amount: &str) -> Result<()> {
        let treasury = self.config.treasury_address()?;
        let prepared = match prepare_mint(self.wallet.active_account(), treasury, to, amount) {
            Ok(prepared) => prepared,
            Err(e) => bail!("{}", e),
        };

        let contract = self.contract()?;
        match submit_mint(&*contract, &prepared).await {
            Ok(receipt) => {
                println!(
                    "Minted {} tokens to {}: {}",
                    format_token_amount(prepared.amount),
                    prepared.to,
                    receipt.transaction_hash
                );
                Ok(())
            }
            Err(e) => bail!("{}", e),
        }
    }

    fn widgets(&self) -> Result<()> {
        let token = self.config.token_address()?;
        let client_id = match self.config.thirdweb_client_id.as_deref() {
            Some(client_id) => client_id,
            None => {
                warn!("No thirdweb client id configured, checkout link will not work");
                ""
            }
        };
        println!(
            "{}",
            views::render_widgets(token, client_id, &self.config.checkout_id)
        );
        Ok(())
    }
}
