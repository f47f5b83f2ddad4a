use std::fmt::Display;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::adder::{MemberAdder, Strategy};
use crate::discovery::{Discovery, HttpDiscovery};
use crate::error::{Error, Result};
use crate::health::{HttpProber, Prober};
use crate::heuristic::{classify, ClusterHealth};
use crate::node::DiscoveryNode;

/// Target size used when the cluster may grow without bound.
pub const UNLIMITED_CLUSTER_SIZE: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    New,
    Existing,
}

impl Default for ClusterState {
    fn default() -> Self {
        ClusterState::New
    }
}

impl FromStr for ClusterState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "new" {
            Ok(Self::New)
        } else if s == "existing" {
            Ok(Self::Existing)
        } else {
            Err("no match".to_owned())
        }
    }
}

impl Display for ClusterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::New => "new",
                Self::Existing => "existing",
            }
        )
    }
}

/// The decided configuration, turned into etcd flags or env vars by the
/// caller.
///
/// A bootstrapping node carries only the discovery url; a node joining a
/// running cluster carries an initial cluster starting with its own named
/// url instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtcdConfig {
    pub name: String,
    pub initial_cluster: Vec<String>,
    pub initial_cluster_state: ClusterState,
    pub advertise_peer_urls: String,
    pub discovery: Option<String>,
}

/// Inputs of the join decision.
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub discovery_url: String,
    pub name: String,
    /// Comma-separated peer urls this node will advertise.
    pub initial_advertise_peer_urls: String,
    /// True for a brand-new node without any on-disk state.
    pub fresh: bool,
    pub client_port: u16,
    /// `None` reads the target size from the discovery service, 0 means
    /// unlimited.
    pub cluster_size: Option<u32>,
    pub strategy: Strategy,
}

/// Decides how this node joins the cluster behind the discovery url.
pub async fn join(request: JoinRequest) -> Result<EtcdConfig> {
    let discovery = HttpDiscovery::new(&request.discovery_url)?;
    join_with(&discovery, &HttpProber::new(), request).await
}

/// [`join`] against caller-supplied discovery and prober implementations.
pub async fn join_with<D, P>(discovery: &D, prober: &P, request: JoinRequest) -> Result<EtcdConfig>
where
    D: Discovery + Sync,
    P: Prober + Clone + Send + Sync,
{
    let JoinRequest {
        discovery_url,
        name,
        initial_advertise_peer_urls,
        fresh,
        client_port,
        cluster_size,
        strategy,
    } = request;

    let mut nodes = Vec::new();
    for token in discovery.roster().await? {
        match DiscoveryNode::parse(&token, client_port) {
            Ok(node) => nodes.push(node),
            Err(error) => {
                warn!(%error, %token, "invalid peer url in discovery service")
            }
        }
    }

    let target_size = match cluster_size {
        None => {
            let size = discovery.target_size().await? as usize;
            debug!(size, "got a target cluster size from the discovery service");
            size
        }
        Some(0) => UNLIMITED_CLUSTER_SIZE,
        Some(size) => size as usize,
    };

    match classify(prober, target_size, &nodes).await {
        ClusterHealth::Absent => {
            info!("trying to launch a new cluster");
            Ok(EtcdConfig {
                name,
                initial_cluster: Vec::new(),
                initial_cluster_state: ClusterState::New,
                advertise_peer_urls: initial_advertise_peer_urls,
                discovery: Some(discovery_url),
            })
        }
        ClusterHealth::Dormant => {
            if fresh {
                return Err(Error::ClusterDownNotJoinable);
            }
            info!("no healthy node found, trying to resume the dormant cluster");
            Ok(EtcdConfig {
                name,
                initial_cluster: Vec::new(),
                initial_cluster_state: ClusterState::Existing,
                advertise_peer_urls: initial_advertise_peer_urls,
                discovery: None,
            })
        }
        ClusterHealth::Running(active) => {
            let active_named_urls: Vec<String> = active
                .iter()
                .flat_map(|node| node.named_peer_urls())
                .collect();
            let advertised_urls: Vec<String> = initial_advertise_peer_urls
                .split(',')
                .map(|url| url.to_owned())
                .collect();
            let advertised_named_urls: Vec<String> = advertised_urls
                .iter()
                .map(|url| format!("{name}={url}"))
                .collect();

            let mut initial_named_urls = vec![advertised_named_urls[0].clone()];
            if strategy != Strategy::Prepared && fresh {
                info!(%strategy, "existing cluster found, trying to join");
                let adder =
                    MemberAdder::new(&active, strategy, client_port, target_size, prober.clone())?;
                let initial_urls = adder.add(&name, &advertised_urls).await.map_err(|source| {
                    Error::JoinFailed {
                        name: name.clone(),
                        peer_urls: initial_advertise_peer_urls.clone(),
                        source: Box::new(source),
                    }
                })?;
                initial_named_urls = initial_urls
                    .into_iter()
                    .map(|url| format!("{name}={url}"))
                    .collect();
            } else {
                info!("existing cluster found, joining without adding this instance as a member");
            }

            let mut initial_cluster = initial_named_urls;
            initial_cluster.extend(active_named_urls);
            Ok(EtcdConfig {
                name,
                initial_cluster,
                initial_cluster_state: ClusterState::Existing,
                advertise_peer_urls: initial_advertise_peer_urls,
                discovery: None,
            })
        }
    }
}
