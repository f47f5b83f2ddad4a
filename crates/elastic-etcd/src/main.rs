use clap::Parser;
use tracing::metadata::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // always use full backtraces so we can debug things
    std::env::set_var("RUST_BACKTRACE", "full");

    let options = elastic_etcd::Options::parse();

    let log_filter = if let Some(log_filter) = &options.log_filter {
        EnvFilter::from(log_filter)
    } else {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
    };

    // stdout carries the emitted configuration, keep the log on stderr
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(!options.no_colour)
                .with_writer(std::io::stderr),
        )
        .with(log_filter)
        .init();

    let rendered = elastic_etcd::run(options).await?;
    println!("{rendered}");

    Ok(())
}
