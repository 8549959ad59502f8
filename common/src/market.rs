//! Market data snapshots shown by the dashboard views.
//!
//! Every snapshot is replaced wholesale on each successful poll, no
//! history is kept.

use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{FALLBACK_PRICE_USD, MOVERS_PER_SIDE, NEWS_DESCRIPTION_LENGTH};

lazy_static! {
    static ref HTML_TAG_REGEX: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Latest token price as reported by the DEX aggregator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
}

impl Default for PriceSnapshot {
    fn default() -> Self {
        Self {
            price: FALLBACK_PRICE_USD,
            change_24h: 0.0,
            volume_24h: 0.0,
        }
    }
}

impl PriceSnapshot {
    /// USD value of a token amount at this price
    pub fn usd_value(&self, tokens: f64) -> f64 {
        tokens * self.price
    }
}

/// One coin of the global market ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMovers {
    pub gainers: Vec<CoinSummary>,
    pub losers: Vec<CoinSummary>,
}

impl MarketMovers {
    /// Split a ranking sorted by 24h change: the head are the gainers,
    /// the tail reversed are the losers (worst first).
    pub fn from_ranking(ranking: Vec<CoinSummary>) -> Self {
        let gainers = ranking.iter().take(MOVERS_PER_SIDE).cloned().collect();
        let start = ranking.len().saturating_sub(MOVERS_PER_SIDE);
        let losers = ranking[start..].iter().rev().cloned().collect();
        Self { gainers, losers }
    }

    pub fn is_empty(&self) -> bool {
        self.gainers.is_empty() && self.losers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub pub_date: String,
    pub source: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl NewsItem {
    /// Publication date, `None` when the feed sent something unreadable
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        parse_pub_date(&self.pub_date)
    }
}

// Feeds are inconsistent: rss2json sends "YYYY-MM-DD HH:MM:SS" in UTC,
// raw RSS uses RFC 2822 and some sources RFC 3339
pub fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

pub fn strip_html_tags(value: &str) -> String {
    HTML_TAG_REGEX.replace_all(value, "").into_owned()
}

/// Plain text teaser of a feed description: tags removed, cut to 150
/// characters and always followed by an ellipsis.
pub fn summarize_description(description: Option<&str>) -> String {
    let text = description.map(strip_html_tags).unwrap_or_default();
    let mut summary: String = text.chars().take(NEWS_DESCRIPTION_LENGTH).collect();
    summary.push_str("...");
    summary
}

/// Newest first, undated items last, at most `limit` entries
pub fn latest_news(mut items: Vec<NewsItem>, limit: usize) -> Vec<NewsItem> {
    items.sort_by_key(|item| std::cmp::Reverse(item.published_at()));
    items.truncate(limit);
    items
}
