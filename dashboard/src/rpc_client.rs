use anyhow::{anyhow, Context, Result};
use log::{debug, trace};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Timeouts applied to every JSON-RPC call
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// JSON-RPC request structure
#[derive(Debug, serde::Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: Value,
}

/// JSON-RPC response structure
#[derive(Debug, serde::Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, serde::Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Minimal Ethereum JSON-RPC client over HTTP.
///
/// Key management, signing and broadcasting stay on the node side:
/// this client only forwards calls and decodes the answers.
pub struct RpcClient {
    client: Client,
    endpoint: Url,
    config: RpcClientConfig,
}

impl RpcClient {
    /// Create a new RPC client with default configuration
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_config(endpoint, RpcClientConfig::default())
    }

    /// Create a new RPC client with custom configuration
    pub fn with_config(endpoint: &str, config: RpcClientConfig) -> Result<Self> {
        let endpoint = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Url::parse(endpoint)?
        } else {
            Url::parse(&format!("http://{}", endpoint))?
        };

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    async fn send(&self, method: &str, params: Value) -> Result<JsonRpcResponse> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: rand::random::<u32>(),
            method,
            params,
        };

        if log::log_enabled!(log::Level::Debug) {
            debug!("JSON-RPC request to {}: {}", self.endpoint, method);
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Request timeout after {:?}", self.config.request_timeout)
                } else if e.is_connect() {
                    anyhow!("Connection failed: {}", e)
                } else {
                    anyhow!("Network error: {}", e)
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error {}: {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown error")
            ));
        }

        let response: JsonRpcResponse = response
            .json()
            .await
            .context("Failed to parse JSON-RPC response")?;

        if let Some(error) = response.error {
            return Err(anyhow!("RPC error {}: {}", error.code, error.message));
        }

        Ok(response)
    }

    /// Call a method whose result must be present
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let response = self.send(method, params).await?;
        match response.result {
            Some(Value::Null) | None => Err(anyhow!("No result in response to {}", method)),
            Some(result) => Ok(result),
        }
    }

    /// Call a method where `null` is a legitimate answer (pending receipts)
    pub async fn request_optional(&self, method: &str, params: Value) -> Result<Option<Value>> {
        let response = self.send(method, params).await?;
        let result = response.result.filter(|value| !value.is_null());
        trace!("{} answered {:?}", method, result);
        Ok(result)
    }

    /// Chain id reported by the node
    pub async fn chain_id(&self) -> Result<u64> {
        let result = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&result)
    }

    /// Accounts the node can sign for
    pub async fn accounts(&self) -> Result<Vec<String>> {
        let result = self.request("eth_accounts", json!([])).await?;
        serde_json::from_value(result).context("Invalid eth_accounts answer")
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn config(&self) -> &RpcClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Decode a `0x` prefixed hex quantity into a u64
pub fn parse_quantity(value: &Value) -> Result<u64> {
    let text = value
        .as_str()
        .ok_or_else(|| anyhow!("Expected hex quantity, got {}", value))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("Quantity without 0x prefix: {}", text))?;
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid quantity {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_scheme_defaults_to_http() {
        let client = RpcClient::new("127.0.0.1:9650/ext/bc/C/rpc").unwrap();
        assert_eq!(client.endpoint().scheme(), "http");
        assert_eq!(client.endpoint().path(), "/ext/bc/C/rpc");

        let client = RpcClient::new("https://api.avax.network/ext/bc/C/rpc").unwrap();
        assert_eq!(client.endpoint().scheme(), "https");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0xa86a")).unwrap(), 43114);
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
        assert!(parse_quantity(&json!("a86a")).is_err());
        assert!(parse_quantity(&json!(43114)).is_err());
    }
}
