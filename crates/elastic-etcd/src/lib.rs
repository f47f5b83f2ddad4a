use anyhow::Context;
use elastic_etcd_core::JoinRequest;
use tracing::info;

mod options;
mod output;

pub use options::Options;
pub use output::{render, Format};

/// Runs the join decision and returns the rendered configuration block.
pub async fn run(options: Options) -> anyhow::Result<String> {
    let request = JoinRequest {
        discovery_url: options.discovery_url,
        name: options.name,
        initial_advertise_peer_urls: options.initial_advertise_peer_urls,
        fresh: options.fresh,
        client_port: options.client_port,
        cluster_size: options.cluster_size,
        strategy: options.join_strategy,
    };

    let config = elastic_etcd_core::join(request)
        .await
        .context("deciding how to join the cluster")?;
    info!(?config, "decided join configuration");

    Ok(output::render(&config, options.output))
}
