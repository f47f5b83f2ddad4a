use std::fmt::Display;
use std::str::FromStr;

use elastic_etcd_core::EtcdConfig;

/// How the decided configuration is handed to the etcd daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// A single line of `--flag=value` pairs.
    Flags,
    /// A systemd dropin fragment.
    Dropin,
    /// One `ETCD_*` environment variable per line.
    Env,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flags" => Ok(Self::Flags),
            "dropin" => Ok(Self::Dropin),
            "env" => Ok(Self::Env),
            _ => Err(format!("unknown output format {s:?}")),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Flags => "flags",
            Self::Dropin => "dropin",
            Self::Env => "env",
        };
        write!(f, "{}", s)
    }
}

fn pairs(config: &EtcdConfig) -> Vec<(&'static str, String)> {
    let mut pairs = vec![("name", config.name.clone())];
    if !config.initial_cluster.is_empty() {
        pairs.push(("initial-cluster", config.initial_cluster.join(",")));
    }
    pairs.push((
        "initial-cluster-state",
        config.initial_cluster_state.to_string(),
    ));
    pairs.push((
        "initial-advertise-peer-urls",
        config.advertise_peer_urls.clone(),
    ));
    if let Some(discovery) = &config.discovery {
        pairs.push(("discovery", discovery.clone()));
    }
    pairs
}

fn env_key(key: &str) -> String {
    format!("ETCD_{}", key.replace('-', "_").to_uppercase())
}

pub fn render(config: &EtcdConfig, format: Format) -> String {
    let pairs = pairs(config);
    match format {
        Format::Flags => pairs
            .iter()
            .map(|(key, value)| format!("--{key}={value}"))
            .collect::<Vec<_>>()
            .join(" "),
        Format::Env => pairs
            .iter()
            .map(|(key, value)| format!("{}={}", env_key(key), value))
            .collect::<Vec<_>>()
            .join("\n"),
        Format::Dropin => {
            let mut out = String::from("[Service]\n");
            for (key, value) in &pairs {
                out.push_str(&format!("Environment=\"{}={}\"\n", env_key(key), value));
            }
            out
        }
    }
}
