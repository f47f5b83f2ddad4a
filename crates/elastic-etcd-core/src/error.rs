use crate::discovery::DiscoveryError;
use crate::members::MembersError;

pub type Result<O> = std::result::Result<O, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Members(#[from] MembersError),

    #[error("cluster is down, a new node cannot join it")]
    ClusterDownNotJoinable,

    #[error("cluster is full and has no dead member to replace")]
    ClusterFullNoDead,

    #[error("no prepared member entry matches our peer urls")]
    NoPreparedSlot,

    #[error(
        "cannot add another member to the {members} member cluster (with {healthy} up) \
         because it puts the future quorum {future_quorum} at risk"
    )]
    QuorumAtRisk {
        members: usize,
        healthy: usize,
        future_quorum: usize,
    },

    #[error("unable to add node {name:?} with peer urls {peer_urls:?} to the cluster")]
    JoinFailed {
        name: String,
        peer_urls: String,
        #[source]
        source: Box<Error>,
    },
}
