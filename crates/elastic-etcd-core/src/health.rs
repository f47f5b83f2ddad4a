use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::member::Member;
use crate::members::{HttpMembersApi, MembersApi, MembersError};

/// Deadline for deciding whether a member answers on its peer urls.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall deadline for operations against a running cluster.
pub const ETCD_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request header deadline for short-lived members api clients.
pub const HEADER_TIMEOUT_PER_REQUEST: Duration = Duration::from_secs(5);

/// Well-known health endpoint of the consensus transport.
pub const PROBING_PREFIX: &str = "/raft/probing";

/// Read-only health checks against a single member.
///
/// A member is healthy in a cluster iff it is alive and active.
#[async_trait]
pub trait Prober {
    /// Whether any peer url answers on the probing endpoint.
    async fn alive(&self, member: &Member) -> bool;

    /// Whether the member believes a leader exists.
    async fn active(&self, member: &Member) -> Result<bool, MembersError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProber;

impl HttpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn alive(&self, member: &Member) -> bool {
        debug!(name = %member.name, peer_urls = ?member.peer_urls, "testing liveness");
        let check = async {
            for url in &member.peer_urls {
                let url = format!("{}{}", url.trim_end_matches('/'), PROBING_PREFIX);
                match reqwest::get(&url).await {
                    Ok(response) if response.status() == StatusCode::OK => return true,
                    Ok(response) => {
                        debug!(%url, status = %response.status(), "liveness probe refused")
                    }
                    Err(error) => debug!(%url, %error, "liveness probe failed"),
                }
            }
            false
        };
        timeout(LIVENESS_TIMEOUT, check).await.unwrap_or(false)
    }

    async fn active(&self, member: &Member) -> Result<bool, MembersError> {
        let api = HttpMembersApi::new(member.client_urls.clone(), HEADER_TIMEOUT_PER_REQUEST)?;
        debug!(name = %member.name, "asking member for the current leader");
        let leader = timeout(ETCD_TIMEOUT, api.leader())
            .await
            .map_err(|_| MembersError::Timeout)??;
        Ok(leader.is_some())
    }
}

/// Convenience for call sites that only need the combined verdict.
pub(crate) async fn healthy<P: Prober + Sync + ?Sized>(prober: &P, member: &Member) -> bool {
    if !prober.alive(member).await {
        return false;
    }
    match prober.active(member).await {
        Ok(active) => active,
        Err(error) => {
            warn!(%error, name = %member.name, "failed to ask member for a leader");
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;

    /// Health verdicts keyed by member name.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct StaticProber {
        pub alive: HashSet<String>,
        pub active: HashSet<String>,
    }

    impl StaticProber {
        /// Marks the given members alive and active.
        pub fn healthy<const N: usize>(names: [&str; N]) -> Self {
            let names: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
            Self {
                alive: names.clone(),
                active: names,
            }
        }
    }

    #[async_trait]
    impl Prober for StaticProber {
        async fn alive(&self, member: &Member) -> bool {
            self.alive.contains(&member.name)
        }

        async fn active(&self, member: &Member) -> Result<bool, MembersError> {
            Ok(self.active.contains(&member.name))
        }
    }

    #[tokio::test]
    async fn healthy_needs_both_verdicts() {
        let member = Member {
            name: "node1".to_owned(),
            ..Default::default()
        };

        assert!(healthy(&StaticProber::healthy(["node1"]), &member).await);

        let alive_only = StaticProber {
            alive: ["node1".to_owned()].into(),
            active: HashSet::new(),
        };
        assert!(!healthy(&alive_only, &member).await);

        assert!(!healthy(&StaticProber::default(), &member).await);
    }
}
