pub mod adder;
pub mod discovery;
pub mod error;
pub mod health;
pub mod heuristic;
pub mod join;
pub mod member;
pub mod members;
pub mod node;

pub use adder::{MemberAdder, Strategy};
pub use discovery::{Discovery, DiscoveryError, HttpDiscovery};
pub use error::{Error, Result};
pub use health::{
    HttpProber, Prober, ETCD_TIMEOUT, HEADER_TIMEOUT_PER_REQUEST, LIVENESS_TIMEOUT, PROBING_PREFIX,
};
pub use heuristic::{classify, ClusterHealth};
pub use join::{join, join_with, ClusterState, EtcdConfig, JoinRequest, UNLIMITED_CLUSTER_SIZE};
pub use member::Member;
pub use members::{HttpMembersApi, MembersApi, MembersError};
pub use node::{DiscoveryNode, ParseError};
