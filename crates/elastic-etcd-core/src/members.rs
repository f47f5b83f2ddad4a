use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::member::Member;

#[derive(Debug, Error)]
pub enum MembersError {
    #[error("members api request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("members api returned status {0}")]
    Status(StatusCode),

    #[error("no client urls to query")]
    NoEndpoints,

    #[error("members api request timed out")]
    Timeout,
}

/// The membership surface of a running cluster.
#[async_trait]
pub trait MembersApi {
    async fn list(&self) -> Result<Vec<Member>, MembersError>;

    /// Registers a new member under the given peer url, returning the
    /// reserved entry.
    async fn add(&self, peer_url: &str) -> Result<Member, MembersError>;

    async fn remove(&self, id: &str) -> Result<(), MembersError>;

    /// The member currently believed to be the leader, if any.
    async fn leader(&self) -> Result<Option<Member>, MembersError>;
}

#[derive(Debug, Deserialize)]
struct MemberList {
    members: Vec<Member>,
}

#[derive(Debug, Serialize)]
struct MemberAdd {
    #[serde(rename = "peerURLs")]
    peer_urls: Vec<String>,
}

/// Client for the http members api.
///
/// Requests are tried against each endpoint in turn and the first one to
/// answer wins.
#[derive(Debug, Clone)]
pub struct HttpMembersApi {
    endpoints: Vec<String>,
    client: reqwest::Client,
}

impl HttpMembersApi {
    pub fn new(
        endpoints: Vec<String>,
        header_timeout: Duration,
    ) -> Result<Self, MembersError> {
        let client = reqwest::Client::builder().timeout(header_timeout).build()?;
        Ok(Self { endpoints, client })
    }

    fn urls(&self, path: &str) -> impl Iterator<Item = String> + '_ {
        let path = path.to_owned();
        self.endpoints
            .iter()
            .map(move |endpoint| format!("{}{}", endpoint.trim_end_matches('/'), path))
    }
}

#[async_trait]
impl MembersApi for HttpMembersApi {
    async fn list(&self) -> Result<Vec<Member>, MembersError> {
        let mut last_error = MembersError::NoEndpoints;
        for url in self.urls("/v2/members") {
            let result = async {
                let response = self.client.get(&url).send().await?;
                if response.status() != StatusCode::OK {
                    return Err(MembersError::Status(response.status()));
                }
                let list: MemberList = response.json().await?;
                Ok(list.members)
            }
            .await;
            match result {
                Ok(members) => return Ok(members),
                Err(error) => {
                    debug!(%error, %url, "listing members failed on endpoint");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    async fn add(&self, peer_url: &str) -> Result<Member, MembersError> {
        let body = MemberAdd {
            peer_urls: vec![peer_url.to_owned()],
        };
        let mut last_error = MembersError::NoEndpoints;
        for url in self.urls("/v2/members") {
            let result = async {
                let response = self.client.post(&url).json(&body).send().await?;
                if !response.status().is_success() {
                    return Err(MembersError::Status(response.status()));
                }
                let member: Member = response.json().await?;
                Ok(member)
            }
            .await;
            match result {
                Ok(member) => return Ok(member),
                Err(error) => {
                    debug!(%error, %url, "adding member failed on endpoint");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    async fn remove(&self, id: &str) -> Result<(), MembersError> {
        let mut last_error = MembersError::NoEndpoints;
        for url in self.urls(&format!("/v2/members/{id}")) {
            let result = async {
                let response = self.client.delete(&url).send().await?;
                if !response.status().is_success() {
                    return Err(MembersError::Status(response.status()));
                }
                Ok(())
            }
            .await;
            match result {
                Ok(()) => return Ok(()),
                Err(error) => {
                    debug!(%error, %url, "removing member failed on endpoint");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }

    async fn leader(&self) -> Result<Option<Member>, MembersError> {
        let mut last_error = MembersError::NoEndpoints;
        for url in self.urls("/v2/members/leader") {
            let result = async {
                let response = self.client.get(&url).send().await?;
                match response.status() {
                    StatusCode::OK => {
                        let member: Member = response.json().await?;
                        Ok(Some(member))
                    }
                    StatusCode::NOT_FOUND => Ok(None),
                    status => Err(MembersError::Status(status)),
                }
            }
            .await;
            match result {
                Ok(leader) => return Ok(leader),
                Err(error) => {
                    debug!(%error, %url, "leader lookup failed on endpoint");
                    last_error = error;
                }
            }
        }
        Err(last_error)
    }
}
