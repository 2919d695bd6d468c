//! REST access to the Guilded API.
//!
//! Everything that needs the network goes through the [`Api`] trait so the
//! capture engine can be driven by an in-memory dataset in tests.

use crate::config::ExportConfig;
use crate::error::ApiError;
use crate::utils::fix_cdn_urls;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 guilded-chat-export";

/// One GET against an API endpoint, returning its decoded JSON body.
pub trait Api {
    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ApiError>;
}

impl<A: Api + ?Sized> Api for &A {
    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        (**self).get(endpoint, params)
    }
}

/// Blocking HTTP implementation authenticated with the `hmac_signed_session` cookie.
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let cookie = format!("hmac_signed_session={token}; authenticated=true");
        let cookie = HeaderValue::from_str(&cookie).map_err(|e| ApiError::Decode {
            endpoint: "session cookie".to_string(),
            message: e.to_string(),
        })?;
        headers.insert(COOKIE, cookie);
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ExportConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, &config.token, config.request_timeout)
    }
}

impl Api for HttpApi {
    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint, ?params, "GET");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .map_err(|source| ApiError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let mut body: Value = response.json().map_err(|e| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        fix_cdn_urls(&mut body);
        Ok(body)
    }
}
