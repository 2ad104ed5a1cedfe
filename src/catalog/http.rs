//! reqwest-backed transport

use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr};

use super::{HttpResponse, Transport, TransportPool};
use crate::constants::{catalog, http as status};
use crate::error::FetchError;

/// TLS HTTP client, optionally pinned to IPv4
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(force_ipv4: bool) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(catalog::USER_AGENT)
            .timeout(catalog::REQUEST_TIMEOUT)
            .use_rustls_tls();
        if force_ipv4 {
            // Binding an IPv4 local address rules out IPv6 peers
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::fatal(format!("request to {url} failed: {e}")))
    }
}

impl Transport for HttpTransport {
    async fn fetch_json(&self, url: &str) -> Result<HttpResponse<serde_json::Value>, FetchError> {
        let response = self.get(url).await?;
        let code = response.status().as_u16();
        let body = if code == status::OK {
            response
                .json()
                .await
                .map_err(|e| FetchError::fatal(format!("invalid JSON from {url}: {e}")))?
        } else {
            serde_json::Value::Null
        };
        Ok(HttpResponse { status: code, body })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<HttpResponse<Vec<u8>>, FetchError> {
        let response = self.get(url).await?;
        let code = response.status().as_u16();
        let body = if code == status::OK {
            response
                .bytes()
                .await
                .map_err(|e| FetchError::fatal(format!("failed to read body from {url}: {e}")))?
                .to_vec()
        } else {
            Vec::new()
        };
        Ok(HttpResponse { status: code, body })
    }
}

/// Both client flavours, picked by the persisted `force_ipv4` flag
#[derive(Debug, Clone)]
pub struct HttpTransports {
    dual_stack: HttpTransport,
    ipv4: HttpTransport,
}

impl HttpTransports {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dual_stack: HttpTransport::new(false)?,
            ipv4: HttpTransport::new(true)?,
        })
    }
}

impl TransportPool for HttpTransports {
    type Transport = HttpTransport;

    fn select(&self, force_ipv4: bool) -> &HttpTransport {
        if force_ipv4 { &self.ipv4 } else { &self.dual_stack }
    }
}
