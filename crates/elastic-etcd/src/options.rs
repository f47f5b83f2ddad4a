use clap::Parser;
use elastic_etcd_core::Strategy;

use crate::output::Format;

#[derive(Debug, Parser)]
#[clap(
    name = "elastic-etcd",
    about = "Decide how to join an etcd cluster and emit the matching configuration"
)]
pub struct Options {
    /// Discovery url the cluster rendezvouses on.
    #[clap(long, env = "ELASTIC_ETCD_DISCOVERY_URL")]
    pub discovery_url: String,

    /// Name of this node, unique within the cluster.
    #[clap(long, env = "ELASTIC_ETCD_NAME")]
    pub name: String,

    #[clap(
        long,
        env = "ELASTIC_ETCD_INITIAL_ADVERTISE_PEER_URLS",
        default_value = "http://localhost:2380"
    )]
    pub initial_advertise_peer_urls: String,

    /// This node starts without any on-disk state.
    #[clap(long, env = "ELASTIC_ETCD_FRESH")]
    pub fresh: bool,

    /// Client port assumed uniform across all peers.
    #[clap(long, env = "ELASTIC_ETCD_CLIENT_PORT", default_value = "2379")]
    pub client_port: u16,

    /// Target cluster size; read from the discovery service when omitted,
    /// 0 means unlimited.
    #[clap(long, env = "ELASTIC_ETCD_CLUSTER_SIZE")]
    pub cluster_size: Option<u32>,

    #[clap(long, env = "ELASTIC_ETCD_JOIN_STRATEGY", default_value = "replace")]
    pub join_strategy: Strategy,

    /// Emission dialect for the resulting configuration.
    #[clap(long, default_value = "env")]
    pub output: Format,

    #[clap(long)]
    pub log_filter: Option<String>,

    #[clap(long)]
    pub no_colour: bool,
}
