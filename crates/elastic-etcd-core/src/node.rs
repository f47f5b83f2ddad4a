use thiserror::Error;
use url::Url;

use crate::member::Member;

/// A roster entry from the discovery service.
///
/// The discovery service only knows peer urls, but health probing needs
/// client urls. They are derived by swapping in the configured client port,
/// assumed uniform across peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryNode {
    pub name: String,
    pub peer_urls: Vec<String>,
    pub client_urls: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing an equals separating name and url")]
    MissingEquals,

    #[error("missing a name")]
    MissingName,

    #[error("failed to parse url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("found an unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("cannot derive a client url from {0:?}")]
    NoClientUrl(String),
}

impl DiscoveryNode {
    /// Parses a `name=peerURL[,peerURL...]` token.
    pub fn parse(token: &str, client_port: u16) -> Result<Self, ParseError> {
        let (name, urls) = match token.split_once('=') {
            Some((name, urls)) => (name, urls),
            None => return Err(ParseError::MissingEquals),
        };
        if name.is_empty() {
            return Err(ParseError::MissingName);
        }

        let mut peer_urls = Vec::new();
        let mut client_urls = Vec::new();
        for raw in urls.split(',') {
            let mut url = Url::parse(raw)?;
            match url.scheme() {
                "http" | "https" => {}
                scheme => return Err(ParseError::UnsupportedScheme(scheme.to_owned())),
            }

            url.set_port(Some(client_port))
                .map_err(|()| ParseError::NoClientUrl(raw.to_owned()))?;
            let mut client_url = url.to_string();
            // Url renders the root path, the raw token usually carries none
            if url.path() == "/" && !raw.ends_with('/') {
                client_url.pop();
            }

            peer_urls.push(raw.to_owned());
            client_urls.push(client_url);
        }

        Ok(Self {
            name: name.to_owned(),
            peer_urls,
            client_urls,
        })
    }

    /// Renders every peer url in the canonical `name=peerURL` form.
    pub fn named_peer_urls(&self) -> Vec<String> {
        self.peer_urls
            .iter()
            .map(|url| format!("{}={}", self.name, url))
            .collect()
    }

    /// The member shape the health prober understands.
    pub fn as_member(&self) -> Member {
        Member {
            id: String::new(),
            name: self.name.clone(),
            peer_urls: self.peer_urls.clone(),
            client_urls: self.client_urls.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_derives_client_urls() {
        let node = DiscoveryNode::parse("node1=http://10.0.0.1:2380", 2379).unwrap();
        assert_eq!(node.name, "node1");
        assert_eq!(node.peer_urls, vec!["http://10.0.0.1:2380".to_owned()]);
        assert_eq!(node.client_urls, vec!["http://10.0.0.1:2379".to_owned()]);
    }

    #[test]
    fn parse_preserves_scheme_and_path() {
        let node = DiscoveryNode::parse("node1=https://peer.example:2380/etcd", 2379).unwrap();
        assert_eq!(
            node.client_urls,
            vec!["https://peer.example:2379/etcd".to_owned()]
        );
    }

    #[test]
    fn parse_accepts_multiple_peer_urls() {
        let node =
            DiscoveryNode::parse("node1=http://a:2380,http://b:2380", 2379).unwrap();
        assert_eq!(
            node.peer_urls,
            vec!["http://a:2380".to_owned(), "http://b:2380".to_owned()]
        );
        assert_eq!(
            node.named_peer_urls(),
            vec![
                "node1=http://a:2380".to_owned(),
                "node1=http://b:2380".to_owned()
            ]
        );
    }

    #[test]
    fn parse_rejects_missing_equals() {
        assert!(matches!(
            DiscoveryNode::parse("node1", 2379),
            Err(ParseError::MissingEquals)
        ));
    }

    #[test]
    fn parse_rejects_empty_name() {
        assert!(matches!(
            DiscoveryNode::parse("=http://a:2380", 2379),
            Err(ParseError::MissingName)
        ));
    }

    #[test]
    fn parse_rejects_bad_urls() {
        assert!(matches!(
            DiscoveryNode::parse("node1=not a url", 2379),
            Err(ParseError::InvalidUrl(_))
        ));
        assert!(matches!(
            DiscoveryNode::parse("node1=unix:///run/etcd.sock", 2379),
            Err(ParseError::UnsupportedScheme(_))
        ));
    }
}
