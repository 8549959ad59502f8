use anyhow::{anyhow, Context, Result};
use chaos_common::{
    config::{FALLBACK_PRICE_USD, NEWS_FETCH_LIMIT},
    market::{latest_news, summarize_description, CoinSummary, MarketMovers, NewsItem, PriceSnapshot},
};
use log::{debug, error, warn};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub const DEXSCREENER_URL: &str = "https://api.dexscreener.com/latest/dex/tokens/";
pub const COINGECKO_MARKETS_URL: &str = "https://api.coingecko.com/api/v3/coins/markets";
pub const RSS2JSON_URL: &str = "https://api.rss2json.com/v1/api.json";
// Items requested per feed
const RSS_ITEMS_PER_SOURCE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsSource {
    pub name: String,
    pub url: String,
}

impl NewsSource {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_owned(),
            url: url.to_owned(),
        }
    }
}

pub fn default_news_sources() -> Vec<NewsSource> {
    vec![
        NewsSource::new("CoinTelegraph", "https://cointelegraph.com/rss"),
        NewsSource::new("CoinDesk", "https://www.coindesk.com/arc/outboundfeeds/rss/"),
    ]
}

#[derive(Debug, Clone)]
pub struct MarketApiConfig {
    pub dexscreener_url: String,
    pub coingecko_url: String,
    pub rss2json_url: String,
    pub rss2json_api_key: Option<String>,
    pub news_sources: Vec<NewsSource>,
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
}

impl Default for MarketApiConfig {
    fn default() -> Self {
        Self {
            dexscreener_url: DEXSCREENER_URL.to_owned(),
            coingecko_url: COINGECKO_MARKETS_URL.to_owned(),
            rss2json_url: RSS2JSON_URL.to_owned(),
            rss2json_api_key: None,
            news_sources: default_news_sources(),
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

// DexScreener answer, only the fields we read
#[derive(Debug, Deserialize)]
struct DexTokenResponse {
    #[serde(default)]
    pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DexPair {
    #[serde(default)]
    price_usd: Option<Value>,
    #[serde(default)]
    price_change: Option<DexWindow>,
    #[serde(default)]
    volume: Option<DexWindow>,
}

#[derive(Debug, Deserialize)]
struct DexWindow {
    #[serde(default)]
    h24: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RssResponse {
    #[serde(default)]
    items: Option<Vec<RssItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RssItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    link: String,
    #[serde(default)]
    pub_date: String,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    enclosure: Option<RssEnclosure>,
}

#[derive(Debug, Deserialize)]
struct RssEnclosure {
    #[serde(default)]
    link: Option<String>,
}

// Prices come either as JSON numbers or as decimal strings.
// Unreadable, non finite and zero values are all treated as missing.
fn parse_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (number.is_finite() && number != 0.0).then_some(number)
}

/// Turn a DexScreener token answer into a price snapshot.
///
/// Fails when the token has no trading pair at all.
pub fn decode_price(value: Value) -> Result<PriceSnapshot> {
    let response: DexTokenResponse =
        serde_json::from_value(value).context("Invalid DexScreener answer")?;
    let pair = response
        .pairs
        .and_then(|pairs| pairs.into_iter().next())
        .ok_or_else(|| anyhow!("No trading pair for token"))?;

    Ok(PriceSnapshot {
        price: parse_number(pair.price_usd.as_ref()).unwrap_or(FALLBACK_PRICE_USD),
        change_24h: parse_number(pair.price_change.as_ref().and_then(|w| w.h24.as_ref()))
            .unwrap_or(0.0),
        volume_24h: parse_number(pair.volume.as_ref().and_then(|w| w.h24.as_ref())).unwrap_or(0.0),
    })
}

/// Turn a CoinGecko market ranking into gainers and losers
pub fn decode_movers(value: Value) -> Result<MarketMovers> {
    let ranking: Vec<CoinSummary> =
        serde_json::from_value(value).context("Invalid CoinGecko answer")?;
    Ok(MarketMovers::from_ranking(ranking))
}

/// Turn one rss2json feed into news items tagged with the source name
pub fn decode_news(source: &str, value: Value) -> Result<Vec<NewsItem>> {
    let response: RssResponse = serde_json::from_value(value).context("Invalid rss2json answer")?;
    let items = response
        .items
        .unwrap_or_default()
        .into_iter()
        .map(|item| NewsItem {
            title: item.title,
            description: summarize_description(item.description.as_deref()),
            link: item.link,
            pub_date: item.pub_date,
            source: source.to_owned(),
            thumbnail: item
                .thumbnail
                .filter(|t| !t.is_empty())
                .or_else(|| item.enclosure.and_then(|e| e.link)),
        })
        .collect();
    Ok(items)
}

/// Client for the three read-only market APIs
pub struct MarketApi {
    client: Client,
    config: MarketApiConfig,
}

impl MarketApi {
    pub fn new(config: MarketApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MarketApiConfig {
        &self.config
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        if log::log_enabled!(log::Level::Debug) {
            debug!("GET {}", url);
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url.host_str().unwrap_or("?")))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error {} from {}",
                response.status().as_u16(),
                url.host_str().unwrap_or("?")
            ));
        }

        response
            .json()
            .await
            .context("Failed to parse JSON response")
    }

    pub fn price_url(&self, token: &str) -> Result<Url> {
        let base = Url::parse(&self.config.dexscreener_url)?;
        Ok(base.join(token)?)
    }

    pub fn movers_url(&self) -> Result<Url> {
        let url = Url::parse_with_params(
            &self.config.coingecko_url,
            &[
                ("vs_currency", "usd"),
                ("order", "percent_change_24h_desc"),
                ("per_page", "10"),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
            ],
        )?;
        Ok(url)
    }

    pub fn news_url(&self, source: &NewsSource) -> Result<Url> {
        let mut url = Url::parse(&self.config.rss2json_url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("rss_url", &source.url);
            if let Some(key) = self.config.rss2json_api_key.as_deref() {
                query.append_pair("api_key", key);
            }
            query.append_pair("count", &RSS_ITEMS_PER_SOURCE.to_string());
        }
        Ok(url)
    }

    /// Latest token price. Errors are left to the caller, which keeps
    /// its previous snapshot.
    pub async fn fetch_token_price(&self, token: &str) -> Result<PriceSnapshot> {
        let value = self.get_json(self.price_url(token)?).await?;
        decode_price(value)
    }

    pub async fn fetch_market_movers(&self) -> Result<MarketMovers> {
        let value = self.get_json(self.movers_url()?).await?;
        decode_movers(value)
    }

    async fn fetch_news_source(&self, source: &NewsSource) -> Result<Vec<NewsItem>> {
        let value = self.get_json(self.news_url(source)?).await?;
        decode_news(&source.name, value)
    }

    /// Aggregate every news source. A failing source is logged and
    /// skipped, so this never fails as a whole.
    pub async fn fetch_crypto_news(&self) -> Vec<NewsItem> {
        let results = futures::future::join_all(
            self.config
                .news_sources
                .iter()
                .map(|source| self.fetch_news_source(source)),
        )
        .await;

        let mut all_news = Vec::new();
        for (source, result) in self.config.news_sources.iter().zip(results) {
            match result {
                Ok(items) => all_news.extend(items),
                Err(e) => {
                    if log::log_enabled!(log::Level::Error) {
                        error!("Error fetching news from {}: {:#}", source.name, e);
                    }
                }
            }
        }

        if all_news.is_empty() {
            warn!("No news available from any source");
        }
        latest_news(all_news, NEWS_FETCH_LIMIT)
    }
}
