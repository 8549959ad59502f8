//! Plain text rendering of the dashboard panels.
//!
//! Views only read snapshots. They never fetch and never mutate.

use chaos_common::{
    auth::AccessLevel,
    config::{NETWORK_DISPLAY_NAME, TOKEN_STANDARD, TOKEN_SYMBOL},
    feed::Post,
    market::{CoinSummary, MarketMovers, NewsItem, PriceSnapshot},
};

use crate::{
    poller::PollState,
    widgets::{
        checkout_url, explorer_token_url, short_address, swap_url, uniswap_token_url,
        COMMUNITY_LINKS,
    },
};

const LOADING: &str = "Loading...";

/// Format a number with `,` thousand separators and fixed decimals
pub fn format_number(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

fn signed_percent(value: f64, decimals: usize) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{}{:.*}%", sign, decimals, value)
}

pub fn render_price(state: &PollState<PriceSnapshot>) -> String {
    if !state.loaded {
        return format!("{} price: {}", TOKEN_SYMBOL, LOADING);
    }

    let price = &state.value;
    let mut lines = vec![
        format!("{} price:  ${:.6}", TOKEN_SYMBOL, price.price),
        format!("24h change:   {}", signed_percent(price.change_24h, 2)),
        format!("24h volume:   ${}", format_number(price.volume_24h, 2)),
    ];
    if state.failures > 0 {
        lines.push(format!(
            "(last update failed {} time(s), showing previous value)",
            state.failures
        ));
    }
    lines.join("\n")
}

/// Balance panel. `balance` is `None` while no account is connected.
pub fn render_balance(balance: Option<f64>, price: &PriceSnapshot) -> String {
    let Some(balance) = balance else {
        return format!("Connect your wallet to view your {} balance", TOKEN_SYMBOL);
    };

    [
        "Your Balance".to_owned(),
        format!("{} Tokens:  {}", TOKEN_SYMBOL, format_number(balance, 2)),
        format!("USD Value:      ${}", format_number(price.usd_value(balance), 2)),
        format!("Current Price:  ${:.6}", price.price),
    ]
    .join("\n")
}

fn render_coin(coin: &CoinSummary) -> String {
    let change = coin
        .price_change_percentage_24h
        .map(|change| signed_percent(change, 1))
        .unwrap_or_else(|| "n/a".to_owned());
    let price = coin
        .current_price
        .map(|price| format!("${}", format_number(price, 2)))
        .unwrap_or_else(|| "n/a".to_owned());
    format!(
        "  {:<8} {:<24} {:>14} {:>8}",
        coin.symbol.to_uppercase(),
        coin.name,
        price,
        change
    )
}

/// Gainers and losers, at most `limit` on each side
pub fn render_movers(state: &PollState<MarketMovers>, limit: usize) -> String {
    if !state.loaded {
        return format!("Market movers: {}", LOADING);
    }
    if state.value.is_empty() {
        return "Market movers unavailable".to_owned();
    }

    let mut lines = vec!["Top Gainers".to_owned()];
    lines.extend(state.value.gainers.iter().take(limit).map(render_coin));
    lines.push("Top Losers".to_owned());
    lines.extend(state.value.losers.iter().take(limit).map(render_coin));
    lines.join("\n")
}

pub fn render_news(state: &PollState<Vec<NewsItem>>, limit: usize) -> String {
    if !state.loaded {
        return format!("Crypto news: {}", LOADING);
    }
    if state.value.is_empty() {
        return "No news available".to_owned();
    }

    let mut lines = Vec::new();
    for item in state.value.iter().take(limit) {
        let date = item
            .published_at()
            .map(|date| date.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| item.pub_date.clone());
        lines.push(format!("[{}] {} ({})", item.source, item.title, date));
        lines.push(format!("    {}", item.description));
        lines.push(format!("    {}", item.link));
    }
    lines.join("\n")
}

fn render_post(post: &Post) -> Vec<String> {
    let mut lines = vec![format!(
        "{}#{} {} - {}",
        if post.pinned { "[pinned] " } else { "" },
        post.id,
        post.author,
        post.timestamp.format("%Y-%m-%d %H:%M:%S")
    )];
    lines.push(format!("  {}", post.content));

    if let Some(media) = &post.media {
        lines.push(format!("  {}: {}", media.kind, media.url));
    }

    if let Some(poll) = &post.poll {
        lines.push(format!("  Poll: {}", poll.question));
        for (i, option) in poll.options.iter().enumerate() {
            lines.push(format!(
                "    {}. {} - {} votes ({:.1}%)",
                i,
                option.text,
                option.votes,
                poll.percentage(i)
            ));
        }
        lines.push(format!("    {} votes total", poll.total_votes()));
    }

    lines.push(format!("  likes: {}  reposts: {}", post.likes, post.reposts));
    lines
}

/// Posts in display order, as returned by `PostFeed::sorted`
pub fn render_feed(posts: &[&Post]) -> String {
    if posts.is_empty() {
        return "No posts yet".to_owned();
    }

    posts
        .iter()
        .map(|post| render_post(post).join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Admin panel header. `total_supply` is in whole tokens, `None` when it
/// could not be read.
pub fn render_admin_panel(
    account: Option<&str>,
    treasury: &str,
    token: &str,
    total_supply: Option<f64>,
) -> String {
    match (AccessLevel::of(account, treasury), account) {
        (AccessLevel::Admin, Some(account)) => {
            let supply = total_supply
                .map(|supply| format!("{} {}", format_number(supply, 2), TOKEN_SYMBOL))
                .unwrap_or_else(|| "unavailable".to_owned());
            [
                "Admin Panel".to_owned(),
                format!("Welcome, Administrator ({})", account),
                format!("Total Supply:      {}", supply),
                format!("Contract Address:  {}", short_address(token)),
                format!("Network:           {}", NETWORK_DISPLAY_NAME),
                format!("Standard:          {}", TOKEN_STANDARD),
            ]
            .join("\n")
        }
        (AccessLevel::Viewer, Some(account)) => [
            "Access Denied".to_owned(),
            "You do not have permission to access this page".to_owned(),
            format!("Your Address:      {}", account),
            format!("Required Address:  {}", treasury),
        ]
        .join("\n"),
        _ => [
            "Admin Panel",
            "Connect your wallet to access admin features",
            "Admin access restricted to treasury address only",
        ]
        .join("\n"),
    }
}

pub fn render_widgets(token: &str, client_id: &str, checkout_id: &str) -> String {
    let mut lines = vec![
        format!("Buy with card:  {}", checkout_url(client_id, checkout_id)),
        format!("Swap AVAX:      {}", swap_url(token)),
        format!("Explorer:       {}", explorer_token_url(token)),
        format!("Uniswap:        {}", uniswap_token_url(token)),
        "Community:".to_owned(),
    ];
    lines.extend(
        COMMUNITY_LINKS
            .iter()
            .map(|(name, url)| format!("  {:<10} {}", name, url)),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_common::feed::{Poll, PollOption};
    use chrono::TimeZone;

    const TREASURY: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";
    const VIEWER: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    fn loaded<T>(value: T) -> PollState<T> {
        PollState {
            value,
            loaded: true,
            failures: 0,
            updated_at: None,
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(1000.0, 0), "1,000");
        assert_eq!(format_number(-1250.5, 2), "-1,250.50");
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_render_price() {
        let mut state = loaded(PriceSnapshot {
            price: 0.0042,
            change_24h: 3.456,
            volume_24h: 12500.0,
        });
        let text = render_price(&state);
        assert!(text.contains("$0.004200"));
        assert!(text.contains("+3.46%"));
        assert!(text.contains("$12,500.00"));

        state.failures = 3;
        assert!(render_price(&state).contains("$0.004200"));

        state.loaded = false;
        assert!(render_price(&state).contains(LOADING));
    }

    #[test]
    fn test_render_balance() {
        let price = PriceSnapshot::default();
        assert!(render_balance(None, &price).starts_with("Connect your wallet"));
        let text = render_balance(Some(1500.0), &price);
        assert!(text.contains("1,500.00"));
        assert!(text.contains("$1.50"));
    }

    #[test]
    fn test_render_admin_panel() {
        let text = render_admin_panel(Some(VIEWER), TREASURY, VIEWER, None);
        assert!(text.starts_with("Access Denied"));
        assert!(text.contains(VIEWER));
        assert!(text.contains(TREASURY));

        let text = render_admin_panel(None, TREASURY, VIEWER, None);
        assert!(text.contains("Connect your wallet"));

        let text = render_admin_panel(Some(&TREASURY.to_lowercase()), TREASURY, VIEWER, Some(1_000_000.0));
        assert!(text.contains("1,000,000.00 CHAOS"));
        assert!(text.contains("0x5290...9EE7"));
    }

    #[test]
    fn test_render_feed() {
        let post = Post {
            id: "1700000000000".into(),
            content: "gm &lt;3".into(),
            author: "Chaos Coin Official".into(),
            timestamp: chrono::Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            likes: 2,
            reposts: 0,
            pinned: true,
            media: None,
            poll: Some(Poll {
                question: "Moon?".into(),
                options: vec![
                    PollOption { text: "yes".into(), votes: 3 },
                    PollOption { text: "no".into(), votes: 1 },
                ],
            }),
        };
        let text = render_feed(&[&post]);
        assert!(text.starts_with("[pinned] #1700000000000"));
        assert!(text.contains("yes - 3 votes (75.0%)"));
        assert!(text.contains("4 votes total"));
        assert_eq!(render_feed(&[]), "No posts yet");
    }

    #[test]
    fn test_render_news_and_movers_empty() {
        assert_eq!(render_news(&loaded(Vec::new()), 10), "No news available");
        assert_eq!(render_movers(&loaded(MarketMovers::default()), 5), "Market movers unavailable");
    }

    #[test]
    fn test_render_limits() {
        let coin = |i: usize| CoinSummary {
            id: format!("coin-{}", i),
            symbol: format!("c{}", i),
            name: format!("Coin {}", i),
            image: None,
            current_price: Some(1.0),
            market_cap: None,
            price_change_percentage_24h: Some(i as f64),
        };
        let movers = loaded(MarketMovers {
            gainers: (0..5).map(coin).collect(),
            losers: (5..10).map(coin).collect(),
        });
        let text = render_movers(&movers, 3);
        assert!(text.contains("Coin 2") && !text.contains("Coin 3"));
        assert!(text.contains("Coin 7") && !text.contains("Coin 8"));
        assert!(render_movers(&movers, 5).contains("Coin 9"));

        let item = |i: usize| NewsItem {
            title: format!("headline {}", i),
            description: String::new(),
            link: format!("https://example.com/{}", i),
            pub_date: "2024-01-10 21:00:00".into(),
            source: "CoinDesk".into(),
            thumbnail: None,
        };
        let news = loaded((0..8).map(item).collect::<Vec<_>>());
        let text = render_news(&news, 5);
        assert!(text.contains("headline 4") && !text.contains("headline 5"));
    }
}
