use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::health::ETCD_TIMEOUT;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery service unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("discovery service returned status {0}")]
    Status(StatusCode),

    #[error("discovery service returned an unexpected document: {0}")]
    BadResponse(String),

    #[error("discovery service returned an invalid cluster size {0:?}")]
    InvalidSize(String),
}

/// Read access to the shared discovery rendezvous.
#[async_trait]
pub trait Discovery {
    /// The raw `name=peerURL` tokens registered under the discovery prefix.
    async fn roster(&self) -> Result<Vec<String>, DiscoveryError>;

    /// The target cluster size stored at `_config/size`.
    async fn target_size(&self) -> Result<u32, DiscoveryError>;
}

#[derive(Debug, Deserialize)]
struct KeysDocument {
    node: KeyNode,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct KeyNode {
    key: String,
    value: Option<String>,
    nodes: Vec<KeyNode>,
}

#[derive(Debug, Clone)]
pub struct HttpDiscovery {
    base: String,
    client: reqwest::Client,
}

impl HttpDiscovery {
    pub fn new(url: &str) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder().timeout(ETCD_TIMEOUT).build()?;
        Ok(Self {
            base: url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    async fn fetch(&self, path: &str) -> Result<KeysDocument, DiscoveryError> {
        let url = format!("{}{}", self.base, path);
        let response = self.client.get(&url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(DiscoveryError::Status(response.status()));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    async fn roster(&self) -> Result<Vec<String>, DiscoveryError> {
        let document = self.fetch("/").await?;
        let mut values = Vec::with_capacity(document.node.nodes.len());
        for node in document.node.nodes {
            match node.value {
                Some(value) => values.push(value),
                None => debug!(key = %node.key, "skipping discovery entry without a value"),
            }
        }
        Ok(values)
    }

    async fn target_size(&self) -> Result<u32, DiscoveryError> {
        let document = self.fetch("/_config/size").await?;
        let value = document
            .node
            .value
            .ok_or_else(|| DiscoveryError::BadResponse("missing size value".to_owned()))?;
        value
            .trim()
            .parse()
            .map_err(|_| DiscoveryError::InvalidSize(value))
    }
}
