// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Fileproof

//! IPFS HTTP API client.
//!
//! Talks to a Kubo-compatible node over its RPC API. Only `add` and
//! `version` are used; pinning policy is the node's concern.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::config;

#[derive(Debug, thiserror::Error)]
pub enum IpfsError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("IPFS request failed: {0}")]
    Request(String),

    #[error("IPFS node returned {status}: {body}")]
    NodeError { status: u16, body: String },

    #[error("Unexpected IPFS response: {0}")]
    BadResponse(String),
}

/// Response of `/api/v0/add`.
#[derive(Debug, Clone, Deserialize)]
pub struct IpfsAddResult {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Size")]
    pub size: String,
}

/// Client for an IPFS node's HTTP RPC API.
pub struct IpfsClient {
    client: reqwest::Client,
    api_url: String,
}

impl IpfsClient {
    pub fn new(api_url: &str) -> Result<Self, IpfsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config::IPFS_TIMEOUT_SECS))
            .build()
            .map_err(|e| IpfsError::Client(e.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Add content to the node, returning its CID.
    pub async fn add(&self, file_name: &str, content: Vec<u8>) -> Result<IpfsAddResult, IpfsError> {
        let part = Part::bytes(content).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/v0/add", self.api_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| IpfsError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IpfsError::NodeError {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<IpfsAddResult>()
            .await
            .map_err(|e| IpfsError::BadResponse(e.to_string()))
    }

    /// Probe the node; used by the readiness check.
    pub async fn version(&self) -> Result<String, IpfsError> {
        #[derive(Deserialize)]
        struct Version {
            #[serde(rename = "Version")]
            version: String,
        }

        let response = self
            .client
            .post(format!("{}/api/v0/version", self.api_url))
            .send()
            .await
            .map_err(|e| IpfsError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IpfsError::NodeError {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .json::<Version>()
            .await
            .map_err(|e| IpfsError::BadResponse(e.to_string()))?
            .version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let client = IpfsClient::new("http://localhost:5001/").unwrap();
        assert_eq!(client.api_url(), "http://localhost:5001");
    }

    #[test]
    fn add_result_parses_kubo_response() {
        let json = r#"{"Name":"report.pdf","Hash":"QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG","Size":"12345"}"#;
        let result: IpfsAddResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.name, "report.pdf");
        assert!(result.hash.starts_with("Qm"));
        assert_eq!(result.size, "12345");
    }

    #[tokio::test]
    async fn unreachable_node_is_a_request_error() {
        // Port 1 is never an IPFS node
        let client = IpfsClient::new("http://127.0.0.1:1").unwrap();
        let err = client.add("a.txt", b"hello".to_vec()).await.unwrap_err();
        assert!(matches!(err, IpfsError::Request(_)));
    }
}
