use serde::{Deserialize, Serialize};

/// A cluster member as the members api reports it.
///
/// An empty name marks an unstarted member: the entry is reserved but no
/// daemon has claimed it yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Member {
    pub id: String,
    pub name: String,
    #[serde(rename = "peerURLs")]
    pub peer_urls: Vec<String>,
    #[serde(rename = "clientURLs")]
    pub client_urls: Vec<String>,
}

impl Member {
    pub fn is_started(&self) -> bool {
        !self.name.is_empty()
    }

    /// Whether every peer url of this member appears in `urls`.
    ///
    /// Containment rather than equality, so a re-run with additional
    /// advertised urls still recognises a prior reservation.
    pub fn peer_urls_within(&self, urls: &[String]) -> bool {
        self.peer_urls.iter().all(|url| urls.contains(url))
    }
}
