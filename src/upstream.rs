use std::time::Duration;

use async_trait::async_trait;
use hyper::{Body, Client, Request, Uri};
use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::header::{ACCEPT, CONTENT_LENGTH};
use serde_json::Value;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::ConfigurationError;
use crate::misc::mask_identifier;
use crate::validation::ClientId;

pub const CLIENT_ID_HEADER: &str = "ga-client-id";

// identifiers are tiny; anything bigger is not a response we understand
const MAX_RESPONSE_LEN: usize = 64 * 1024;

define_error!(UpstreamError; Timeout="upstream timed out", Unreachable="upstream unreachable", Status="upstream returned an error status", Malformed="upstream response is malformed");

/// Somewhere a plaintext identifier for the current requester can be fetched from.
#[async_trait]
pub trait IdentifierSource: Send + Sync {
    /// `Ok(None)` when the source answered but knows no identifier.
    async fn fetch_identifier(&self, client_id: Option<&ClientId>) -> Result<Option<String>, UpstreamError>;
}

pub struct HttpIdentifierSource {
    client: Client<HttpConnector>,
    uri: Uri,
    timeout: Duration,
}

impl HttpIdentifierSource {
    pub fn new(url: &str, timeout: Duration) -> Result<HttpIdentifierSource, ConfigurationError> {
        let uri: Uri = url.parse().or(Err(ConfigurationError::InvalidUrl("MSISDN_API_URL")))?;
        if uri.scheme_str() != Some("http") {
            // no TLS connector is built in; https sources need a fronting proxy
            return Err(ConfigurationError::InvalidUrl("MSISDN_API_URL"));
        }
        Ok(HttpIdentifierSource {
            client: Client::new(),
            uri,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Option<HttpIdentifierSource>, ConfigurationError> {
        config.upstream_url.as_deref()
            .map(|url| HttpIdentifierSource::new(url, config.upstream_timeout))
            .transpose()
    }

    async fn fetch_body(&self, client_id: Option<&ClientId>) -> Result<Vec<u8>, UpstreamError> {
        let mut request = Request::get(self.uri.clone())
            .header(ACCEPT, "application/json");
        if let Some(client_id) = client_id {
            request = request.header(CLIENT_ID_HEADER, client_id.as_str());
        }
        let request = request.body(Body::empty())
            .or(Err(UpstreamError::Malformed))?;

        let response = self.client.request(request).await
            .map_err(|e| {
                warn!("Upstream request error: {}", e);
                UpstreamError::Unreachable
            })?;
        if !response.status().is_success() {
            warn!("Upstream returned {}", response.status());
            return Err(UpstreamError::Status);
        }
        let declared_len = response.headers().get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        if let Some(len) = declared_len.filter(|&len| len > MAX_RESPONSE_LEN as u64) {
            warn!("Upstream announced a {} byte response", len);
            return Err(UpstreamError::Malformed);
        }
        read_limited(response.into_body(), MAX_RESPONSE_LEN).await
    }
}

// collects `body` but gives up as soon as it grows past `limit`
async fn read_limited(mut body: Body, limit: usize) -> Result<Vec<u8>, UpstreamError> {
    let mut collected = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.or(Err(UpstreamError::Unreachable))?;
        if collected.len() + chunk.len() > limit {
            warn!("Upstream response exceeds {} bytes", limit);
            return Err(UpstreamError::Malformed);
        }
        collected.extend_from_slice(&chunk);
    }
    Ok(collected)
}

#[async_trait]
impl IdentifierSource for HttpIdentifierSource {
    async fn fetch_identifier(&self, client_id: Option<&ClientId>) -> Result<Option<String>, UpstreamError> {
        let body = timeout(self.timeout, self.fetch_body(client_id)).await
            .map_err(|_| {
                warn!("Upstream did not answer within {:?}", self.timeout);
                UpstreamError::Timeout
            })??;
        let identifier = parse_identifier(&body)?;
        match &identifier {
            Some(identifier) => debug!("Upstream identifier {}", mask_identifier(identifier)),
            None => debug!("Upstream knows no identifier"),
        }
        Ok(identifier)
    }
}

// `{"data": ...}` is preferred over `{"msisdn": ...}`
fn parse_identifier(body: &[u8]) -> Result<Option<String>, UpstreamError> {
    let body: Value = serde_json::from_slice(body).or(Err(UpstreamError::Malformed))?;
    let body = body.as_object().ok_or(UpstreamError::Malformed)?;
    let identifier = ["data", "msisdn"].iter()
        .filter_map(|name| match body.get(*name) {
            Some(Value::String(value)) if !value.trim().is_empty() => Some(value.trim().to_owned()),
            Some(Value::Number(value)) => Some(value.to_string()),
            _ => None,
        })
        .next();
    Ok(identifier)
}
