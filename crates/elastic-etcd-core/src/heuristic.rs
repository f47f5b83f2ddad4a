use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::health::Prober;
use crate::join::UNLIMITED_CLUSTER_SIZE;
use crate::node::DiscoveryNode;

/// Verdict over the discovery roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterHealth {
    /// No cluster exists behind the roster; bootstrap a new one.
    Absent,
    /// A full roster without a single healthy member. Only the previous
    /// members can bring it back.
    Dormant,
    /// At least the given members are alive and active in a cluster.
    Running(Vec<DiscoveryNode>),
}

/// Classifies the cluster behind the roster by probing every node
/// concurrently.
///
/// The quorum of the target size decides whether the roster can possibly
/// back a cluster at all; a full roster counts as a cluster even when
/// nothing answers. An unlimited target size has no quorum floor, only the
/// probe results decide.
pub async fn classify<P: Prober + Sync>(
    prober: &P,
    size: usize,
    nodes: &[DiscoveryNode],
) -> ClusterHealth {
    let quorum = if size == UNLIMITED_CLUSTER_SIZE {
        0
    } else {
        size / 2 + 1
    };

    if nodes.is_empty() {
        debug!("no nodes found in the discovery service, assuming a new cluster");
        return ClusterHealth::Absent;
    }

    let probes = nodes.iter().map(|node| async move {
        let member = node.as_member();
        if !prober.alive(&member).await {
            info!(node = %node.named_peer_urls().join(","), "node looks dead");
            return None;
        }
        match prober.active(&member).await {
            Ok(true) => {
                info!(
                    node = %node.named_peer_urls().join(","),
                    "node looks alive and active in a cluster"
                );
                Some(node.clone())
            }
            Ok(false) => {
                info!(node = %node.named_peer_urls().join(","), "node is not in a healthy cluster");
                None
            }
            Err(error) => {
                warn!(%error, node = %node.named_peer_urls().join(","), "node is not in a healthy cluster");
                None
            }
        }
    });
    let active: Vec<_> = join_all(probes).await.into_iter().flatten().collect();

    if nodes.len() < quorum {
        debug!(
            nodes = nodes.len(),
            quorum, "fewer nodes in the discovery service than a quorum, assuming a new cluster"
        );
        return ClusterHealth::Absent;
    }

    if nodes.len() == size {
        debug!("cluster is full, assuming an existing cluster");
        return if active.is_empty() {
            ClusterHealth::Dormant
        } else {
            ClusterHealth::Running(active)
        };
    }

    if !active.is_empty() {
        return ClusterHealth::Running(active);
    }

    ClusterHealth::Absent
}
