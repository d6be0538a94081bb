// SPDX-FileCopyrightText: 2026 autodm Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Instagram Graph API.
//!
//! Every call carries a per-request timeout and the account's access token as
//! a bearer `Authorization` header, never in the URL. There are no retries:
//! the first failure is returned as [`AutodmError::Messaging`] with the
//! upstream status and message.

use std::time::Duration;

use autodm_core::AutodmError;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::ApiErrorResponse;

/// Shared Graph API transport. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl GraphClient {
    pub fn new(
        base_url: &str,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, AutodmError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(20)
            .build()
            .map_err(|e| AutodmError::Messaging {
                status: None,
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            read_timeout,
            write_timeout,
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, AutodmError> {
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), params).map_err(|e| {
            AutodmError::Messaging {
                status: None,
                message: format!("invalid Graph API URL: {e}"),
            }
        })
    }

    /// GET `path` with read timeout.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
        params: &[(&str, &str)],
    ) -> Result<T, AutodmError> {
        let url = self.url(path, params)?;
        let request = self
            .client
            .request(Method::GET, url)
            .bearer_auth(access_token)
            .timeout(self.read_timeout);
        self.execute(path, request).await
    }

    /// POST a JSON body to `path` with write timeout.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
        body: &B,
    ) -> Result<T, AutodmError> {
        let url = self.url(path, &[])?;
        let request = self
            .client
            .request(Method::POST, url)
            .bearer_auth(access_token)
            .timeout(self.write_timeout)
            .json(body);
        self.execute(path, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AutodmError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(path, status = %status, "graph api response");

        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| AutodmError::Messaging {
            status: Some(status.as_u16()),
            message: format!("unexpected Graph API response: {e}"),
        })
    }
}

/// Maps a transport failure. The URL is stripped so request details never
/// reach stored failure reasons or logs.
fn transport_error(e: reqwest::Error) -> AutodmError {
    let e = e.without_url();
    let message = if e.is_timeout() {
        "Graph API request timed out".to_string()
    } else {
        format!("Graph API request failed: {e}")
    };
    AutodmError::Messaging {
        status: e.status().map(|s| s.as_u16()),
        message,
    }
}

/// Builds the error for a non-2xx response, preferring the platform's own message.
fn api_error(status: StatusCode, body: &str) -> AutodmError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(err) => err.error.message,
        Err(_) if body.trim().is_empty() => format!("Graph API returned {status}"),
        Err(_) => format!("Graph API returned {status}: {body}"),
    };
    AutodmError::Messaging {
        status: Some(status.as_u16()),
        message,
    }
}
