//! Client side input checks run before anything is stored or submitted.
//!
//! These are circuit breakers for honest users, not a trust boundary:
//! the token contract still enforces its own bounds on chain.

use lazy_static::lazy_static;
use regex::Regex;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::config::{MAX_MINT_AMOUNT, RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW_MILLIS};

lazy_static! {
    static ref ADDRESS_REGEX: Regex = Regex::new(r"^0x[a-fA-F0-9]{40}$").unwrap();
}

/// Returns true only for `0x` followed by exactly 40 hexadecimal characters.
pub fn validate_address(address: &str) -> bool {
    ADDRESS_REGEX.is_match(address)
}

/// Returns true when `0 < amount <= 1,000,000`. NaN is rejected.
pub fn validate_amount(amount: f64) -> bool {
    amount > 0.0 && amount <= MAX_MINT_AMOUNT
}

/// Rejects a price moving by half of its previous value or more.
///
/// A zero previous price has nothing to compare against and is accepted.
pub fn validate_price_data(new_price: f64, old_price: f64) -> bool {
    if old_price == 0.0 {
        return true;
    }

    let change = ((new_price - old_price) / old_price).abs();
    change < 0.5
}

/// Escape characters that would let stored text be read as markup.
///
/// `&` is left untouched so already escaped text is not double encoded.
pub fn sanitize_content(content: &str) -> String {
    let mut escaped = String::with_capacity(content.len());
    for c in content.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '/' => escaped.push_str("&#x2F;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    last_reset: Instant,
}

/// Fixed window request counter keyed by an arbitrary string.
///
/// Each instance owns its counters; callers that want a shared limit
/// share the instance.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    entries: HashMap<String, RateLimitEntry>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            RATE_LIMIT_MAX_REQUESTS,
            Duration::from_millis(RATE_LIMIT_WINDOW_MILLIS),
        )
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            entries: HashMap::new(),
        }
    }

    /// Count a request for `key`, returns false once the window is exhausted
    pub fn check(&mut self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&mut self, key: &str, now: Instant) -> bool {
        if let Some(entry) = self.entries.get_mut(key) {
            if now.saturating_duration_since(entry.last_reset) <= self.window {
                if entry.count >= self.max_requests {
                    return false;
                }
                entry.count += 1;
                return true;
            }
        }

        // first request for this key, or its window expired
        self.entries.insert(
            key.to_owned(),
            RateLimitEntry {
                count: 1,
                last_reset: now,
            },
        );
        true
    }

    /// Forget every counter
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_address() {
        assert!(validate_address("0x52908400098527886E0F7030069857D2E4169EE7"));
        assert!(validate_address("0xde709f2102306220921060314715629080e2fb77"));

        // wrong length
        assert!(!validate_address("0x52908400098527886E0F7030069857D2E4169EE"));
        assert!(!validate_address("0x52908400098527886E0F7030069857D2E4169EE77"));
        // missing or uppercase prefix
        assert!(!validate_address("52908400098527886E0F7030069857D2E4169EE7"));
        assert!(!validate_address("0X52908400098527886E0F7030069857D2E4169EE7"));
        // non hex character
        assert!(!validate_address("0x52908400098527886E0F7030069857D2E4169EEG"));
        // trailing newline must not sneak through
        assert!(!validate_address("0x52908400098527886E0F7030069857D2E4169EE7\n"));
        assert!(!validate_address(""));
    }

    #[test]
    fn test_validate_amount_bounds() {
        assert!(!validate_amount(0.0));
        assert!(!validate_amount(-1.0));
        assert!(!validate_amount(f64::NAN));
        assert!(!validate_amount(1_000_000.01));
        assert!(validate_amount(0.01));
        assert!(validate_amount(1_000_000.0));
    }

    #[test]
    fn test_sanitize_content() {
        assert_eq!(sanitize_content("<script>"), "&lt;script&gt;");
        assert_eq!(
            sanitize_content(r#"<a href="x">it's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;it&#x27;s&lt;&#x2F;a&gt;"
        );
        assert_eq!(sanitize_content("gm & wagmi"), "gm & wagmi");
    }

    #[test]
    fn test_validate_price_data() {
        assert!(validate_price_data(5.0, 0.0));
        assert!(validate_price_data(1.2, 1.0));
        assert!(validate_price_data(0.6, 1.0));
        assert!(!validate_price_data(1.5, 1.0));
        assert!(!validate_price_data(0.5, 1.0));
        assert!(!validate_price_data(3.0, 1.0));
    }

    #[test]
    fn test_rate_limiter_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at("mint", start));
        assert!(limiter.check_at("mint", start + Duration::from_secs(1)));
        assert!(!limiter.check_at("mint", start + Duration::from_secs(2)));
        // other keys are independent
        assert!(limiter.check_at("post", start + Duration::from_secs(2)));
        // still inside the window at exactly 60s
        assert!(!limiter.check_at("mint", start + Duration::from_secs(60)));
        // window expired, counter starts over
        assert!(limiter.check_at("mint", start + Duration::from_secs(61)));
        assert!(limiter.check_at("mint", start + Duration::from_secs(62)));
        assert!(!limiter.check_at("mint", start + Duration::from_secs(63)));

        limiter.reset();
        assert!(limiter.check_at("mint", start + Duration::from_secs(63)));
    }
}
