//! Third party widget and explorer links for the token.

use chaos_common::config::CHAIN_NAME;

pub const THIRDWEB_CHECKOUT_URL: &str = "https://embed.thirdweb.com/checkout";
pub const DEFAULT_CHECKOUT_ID: &str = "d62cbbba-24b1-4ac0-b048-7781605867e4";
pub const UNISWAP_APP_URL: &str = "https://app.uniswap.org";
pub const SNOWTRACE_URL: &str = "https://snowtrace.io";
// Wrapped AVAX, the input side of the swap widget
pub const WAVAX_ADDRESS: &str = "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7";

pub const COMMUNITY_LINKS: [(&str, &str); 5] = [
    (
        "Discord",
        "https://discord.com/channels/1398769618088231042/1398769618692345918",
    ),
    ("Twitter", "https://twitter.com/ChaosCoin_"),
    ("Telegram", "https://t.me/chaoscoin"),
    ("Instagram", "https://www.instagram.com/Chaos_Coin_/"),
    ("TikTok", "https://www.tiktok.com/@ChaosCoin_"),
];

/// Embedded card checkout
pub fn checkout_url(client_id: &str, checkout_id: &str) -> String {
    format!(
        "{}?clientId={}&checkoutId={}&theme=dark",
        THIRDWEB_CHECKOUT_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(checkout_id)
    )
}

/// Swap one AVAX into the token
pub fn swap_url(token: &str) -> String {
    format!(
        "{}/#/swap?exactField=input&exactAmount=1&inputCurrency={}&outputCurrency={}&chain={}",
        UNISWAP_APP_URL, WAVAX_ADDRESS, token, CHAIN_NAME
    )
}

pub fn explorer_token_url(token: &str) -> String {
    format!("{}/token/{}", SNOWTRACE_URL, token)
}

pub fn uniswap_token_url(token: &str) -> String {
    format!("{}/#/tokens/{}/{}", UNISWAP_APP_URL, CHAIN_NAME, token)
}

/// `0x1234...abcd`, or the address unchanged when it is too short to cut
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_owned();
    }

    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

    #[test]
    fn test_widget_urls() {
        assert_eq!(
            checkout_url("abc123", DEFAULT_CHECKOUT_ID),
            "https://embed.thirdweb.com/checkout?clientId=abc123&checkoutId=d62cbbba-24b1-4ac0-b048-7781605867e4&theme=dark"
        );
        assert_eq!(
            swap_url(TOKEN),
            "https://app.uniswap.org/#/swap?exactField=input&exactAmount=1&inputCurrency=0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7&outputCurrency=0x52908400098527886E0F7030069857D2E4169EE7&chain=avalanche"
        );
        assert_eq!(
            explorer_token_url(TOKEN),
            "https://snowtrace.io/token/0x52908400098527886E0F7030069857D2E4169EE7"
        );
        assert_eq!(
            uniswap_token_url(TOKEN),
            "https://app.uniswap.org/#/tokens/avalanche/0x52908400098527886E0F7030069857D2E4169EE7"
        );
    }

    #[test]
    fn test_short_address() {
        assert_eq!(short_address(TOKEN), "0x5290...9EE7");
        assert_eq!(short_address("0x12"), "0x12");
        assert_eq!(short_address(""), "");
    }
}
