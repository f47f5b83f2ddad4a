use std::fmt::Display;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::health::{Prober, ETCD_TIMEOUT};
use crate::member::Member;
use crate::members::{HttpMembersApi, MembersApi};
use crate::node::DiscoveryNode;

/// How to make room for the new member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// An admin prepares member entries up front; never mutate membership.
    Prepared,
    /// Only add, never remove old members.
    Add,
    /// Defensively remove a single dead member when the cluster is full.
    Replace,
    /// Aggressively remove every dead member before adding.
    Prune,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "prepared" => Ok(Self::Prepared),
            "add" => Ok(Self::Add),
            "replace" => Ok(Self::Replace),
            "prune" => Ok(Self::Prune),
            _ => Err(format!("unknown join strategy {s:?}")),
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Prepared => "prepared",
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Prune => "prune",
        };
        write!(f, "{}", s)
    }
}

/// Mutates the live membership to make the new node joinable.
///
/// All mutations are gated by the quorum guard: a member is only ever added
/// when the cluster keeps its future quorum even if the new member never
/// starts.
#[derive(Debug)]
pub struct MemberAdder<M, P> {
    mapi: M,
    prober: P,
    strategy: Strategy,
    client_port: u16,
    target_size: usize,
}

impl<P> MemberAdder<HttpMembersApi, P> {
    /// Builds an adder whose members api client is bound to the union of the
    /// active nodes' client urls.
    pub fn new(
        active_nodes: &[DiscoveryNode],
        strategy: Strategy,
        client_port: u16,
        target_size: usize,
        prober: P,
    ) -> Result<Self> {
        let endpoints = active_nodes
            .iter()
            .flat_map(|node| node.client_urls.iter().cloned())
            .collect();
        let mapi = HttpMembersApi::new(endpoints, ETCD_TIMEOUT)?;
        Ok(Self {
            mapi,
            prober,
            strategy,
            client_port,
            target_size,
        })
    }
}

impl<M, P> MemberAdder<M, P>
where
    M: MembersApi + Send + Sync,
    P: Prober + Send + Sync,
{
    pub fn with_api(
        mapi: M,
        strategy: Strategy,
        client_port: u16,
        target_size: usize,
        prober: P,
    ) -> Self {
        Self {
            mapi,
            prober,
            strategy,
            client_port,
            target_size,
        }
    }

    /// Makes the membership accept a new node named `name` with the given
    /// peer urls, returning the peer urls the node should claim.
    pub async fn add(&self, name: &str, peer_urls: &[String]) -> Result<Vec<String>> {
        debug!(%name, "getting cluster members");
        let members = self.mapi.list().await?;

        if let Some(unstarted) = find_unstarted_member(&members, peer_urls) {
            info!(
                id = %unstarted.id,
                peer_urls = ?unstarted.peer_urls,
                "found a matching unstarted member entry, no need to add"
            );
            self.protect_quorum().await?;
            return Ok(unstarted.peer_urls.clone());
        }

        match self.strategy {
            Strategy::Prepared => return Err(Error::NoPreparedSlot),
            Strategy::Add => {}
            Strategy::Replace => {
                let removed = self.remove_dead_member(&members).await?;
                if removed.is_none() {
                    info!("did not find a dead member to remove");
                    if members.len() >= self.target_size {
                        return Err(Error::ClusterFullNoDead);
                    }
                    info!(
                        members = members.len(),
                        target = self.target_size,
                        "cluster not full, going ahead with the add"
                    );
                }
            }
            Strategy::Prune => {
                let mut remaining = members.clone();
                loop {
                    match self.remove_dead_member(&remaining).await {
                        Ok(Some(removed)) => {
                            remaining.retain(|member| member.id != removed.id)
                        }
                        Ok(None) => break,
                        Err(error) => {
                            warn!(%error, "stopping dead member pruning");
                            break;
                        }
                    }
                }
            }
        }

        self.protect_quorum().await?;

        // Only the first peer url is registered; the initial-cluster entry
        // chosen later computes the member identity and has to match it.
        debug!(peer_url = %peer_urls[0], "trying to add member");
        self.mapi.add(&peer_urls[0]).await?;
        info!(peer_url = %peer_urls[0], "added member");

        Ok(vec![peer_urls[0].clone()])
    }

    /// Removes the first member that cannot be shown to be alive and active.
    ///
    /// A member with no peer urls at all is picked immediately. A member with
    /// an unparseable peer url is skipped: what cannot be probed is not
    /// removed.
    async fn remove_dead_member(&self, members: &[Member]) -> Result<Option<Member>> {
        let mut selected = None;
        'members: for member in members {
            if member.peer_urls.is_empty() {
                selected = Some(member);
                break;
            }
            for url in &member.peer_urls {
                let token = format!("{}={}", member.name, url);
                let node = match DiscoveryNode::parse(&token, self.client_port) {
                    Ok(node) => node,
                    Err(error) => {
                        warn!(%error, %url, name = %member.name, "invalid peer url in member");
                        continue 'members;
                    }
                };
                let probe = node.as_member();
                if self.prober.alive(&probe).await {
                    match self.prober.active(&probe).await {
                        Ok(true) => {
                            debug!(
                                member = %node.named_peer_urls().join(","),
                                "member found to be alive and active"
                            );
                            continue 'members;
                        }
                        Ok(false) => {}
                        Err(error) => {
                            warn!(%error, name = %member.name, "error checking member health");
                            continue 'members;
                        }
                    }
                }
            }
            selected = Some(member);
            break;
        }

        let selected = match selected {
            Some(selected) => selected,
            None => return Ok(None),
        };

        info!(
            name = %selected.name,
            peer_urls = ?selected.peer_urls,
            "trying to remove dead member"
        );
        self.mapi.remove(&selected.id).await?;
        info!(name = %selected.name, "removed dead member");
        Ok(Some(selected.clone()))
    }

    /// Refuses to add when a failed start of the new member could stall
    /// consensus: the current healthy members must reach the quorum of the
    /// grown cluster on their own.
    async fn protect_quorum(&self) -> Result<()> {
        let members = self.mapi.list().await?;
        let mut started = 0;
        let mut healthy = 0;
        for member in &members {
            if member.is_started() {
                started += 1;
            }
            if crate::health::healthy(&self.prober, member).await {
                healthy += 1;
            }
        }
        let future_quorum = (started + 1) / 2 + 1;
        if healthy < future_quorum {
            return Err(Error::QuorumAtRisk {
                members: started,
                healthy,
                future_quorum,
            });
        }
        info!(
            healthy,
            future_quorum,
            "future quorum holds even if the new member does not start up"
        );
        Ok(())
    }
}

fn find_unstarted_member<'a>(members: &'a [Member], urls: &[String]) -> Option<&'a Member> {
    members
        .iter()
        .find(|member| !member.is_started() && member.peer_urls_within(urls))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::health::tests::StaticProber;
    use crate::members::tests::RecordingApi;
    use crate::UNLIMITED_CLUSTER_SIZE;

    fn started(name: &str) -> Member {
        Member {
            id: format!("id-{name}"),
            name: name.to_owned(),
            peer_urls: vec![format!("http://{name}:2380")],
            client_urls: vec![format!("http://{name}:2379")],
        }
    }

    fn unstarted(id: &str, peer_urls: &[&str]) -> Member {
        Member {
            id: id.to_owned(),
            peer_urls: peer_urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        }
    }

    fn adder(
        api: &RecordingApi,
        strategy: Strategy,
        target_size: usize,
        prober: StaticProber,
    ) -> MemberAdder<RecordingApi, StaticProber> {
        MemberAdder::with_api(api.clone(), strategy, 2379, target_size, prober)
    }

    #[test(tokio::test)]
    async fn recycles_an_unstarted_slot_without_mutating() {
        let api = RecordingApi::with_members(vec![
            started("a"),
            started("b"),
            unstarted("slot", &["http://self:2380"]),
        ]);
        let adder = adder(&api, Strategy::Prepared, 3, StaticProber::healthy(["a", "b"]));

        let urls = adder
            .add("self", &["http://self:2380".to_owned(), "http://self2:2380".to_owned()])
            .await
            .unwrap();

        assert_eq!(urls, vec!["http://self:2380".to_owned()]);
        assert_eq!(api.mutations(), Vec::<String>::new());
    }

    #[test(tokio::test)]
    async fn prepared_without_a_slot_fails_without_mutating() {
        let api = RecordingApi::with_members(vec![started("a"), started("b")]);
        let adder = adder(&api, Strategy::Prepared, 3, StaticProber::healthy(["a", "b"]));

        let result = adder.add("self", &["http://self:2380".to_owned()]).await;

        assert!(matches!(result, Err(Error::NoPreparedSlot)));
        assert_eq!(api.mutations(), Vec::<String>::new());
    }

    #[test(tokio::test)]
    async fn add_strategy_never_removes() {
        let api = RecordingApi::with_members(vec![started("a"), started("b")]);
        let adder = adder(&api, Strategy::Add, 3, StaticProber::healthy(["a", "b"]));

        let urls = adder.add("self", &["http://self:2380".to_owned()]).await.unwrap();

        assert_eq!(urls, vec!["http://self:2380".to_owned()]);
        assert_eq!(api.mutations(), vec!["add:http://self:2380".to_owned()]);
    }

    #[test(tokio::test)]
    async fn replace_removes_a_single_dead_member() {
        let api = RecordingApi::with_members(vec![started("a"), started("b"), started("c")]);
        let adder = adder(&api, Strategy::Replace, 3, StaticProber::healthy(["a", "b"]));

        let urls = adder.add("self", &["http://self:2380".to_owned()]).await.unwrap();

        assert_eq!(urls, vec!["http://self:2380".to_owned()]);
        assert_eq!(
            api.mutations(),
            vec!["remove:id-c".to_owned(), "add:http://self:2380".to_owned()]
        );
    }

    #[test(tokio::test)]
    async fn replace_fails_on_a_full_cluster_without_dead_members() {
        let api = RecordingApi::with_members(vec![started("a"), started("b"), started("c")]);
        let adder = adder(
            &api,
            Strategy::Replace,
            3,
            StaticProber::healthy(["a", "b", "c"]),
        );

        let result = adder.add("self", &["http://self:2380".to_owned()]).await;

        assert!(matches!(result, Err(Error::ClusterFullNoDead)));
        assert_eq!(api.mutations(), Vec::<String>::new());
    }

    #[test(tokio::test)]
    async fn replace_adds_when_the_cluster_has_room() {
        let api = RecordingApi::with_members(vec![started("a"), started("b")]);
        let adder = adder(&api, Strategy::Replace, 3, StaticProber::healthy(["a", "b"]));

        adder.add("self", &["http://self:2380".to_owned()]).await.unwrap();

        assert_eq!(api.mutations(), vec!["add:http://self:2380".to_owned()]);
    }

    #[test(tokio::test)]
    async fn unlimited_target_size_never_reports_a_full_cluster() {
        let api = RecordingApi::with_members(vec![started("a"), started("b"), started("c")]);
        let adder = adder(
            &api,
            Strategy::Replace,
            UNLIMITED_CLUSTER_SIZE,
            StaticProber::healthy(["a", "b", "c"]),
        );

        adder.add("self", &["http://self:2380".to_owned()]).await.unwrap();

        assert_eq!(api.mutations(), vec!["add:http://self:2380".to_owned()]);
    }

    #[test(tokio::test)]
    async fn prune_removes_distinct_dead_members_until_none_remain() {
        let api = RecordingApi::with_members(vec![
            started("a"),
            started("b"),
            started("c"),
            started("d"),
            started("e"),
        ]);
        let adder = adder(
            &api,
            Strategy::Prune,
            5,
            StaticProber::healthy(["a", "b", "c"]),
        );

        adder.add("self", &["http://self:2380".to_owned()]).await.unwrap();

        let mutations = api.mutations();
        assert_eq!(
            mutations,
            vec![
                "remove:id-d".to_owned(),
                "remove:id-e".to_owned(),
                "add:http://self:2380".to_owned()
            ]
        );
    }

    #[test(tokio::test)]
    async fn members_without_peer_urls_are_removed_first() {
        let api = RecordingApi::with_members(vec![
            started("a"),
            started("b"),
            Member {
                id: "ghost".to_owned(),
                name: "ghost-member".to_owned(),
                ..Default::default()
            },
            started("c"),
        ]);
        let adder = adder(
            &api,
            Strategy::Replace,
            4,
            StaticProber::healthy(["a", "b", "c"]),
        );

        adder.add("self", &["http://self:2380".to_owned()]).await.unwrap();

        assert_eq!(
            api.mutations(),
            vec!["remove:ghost".to_owned(), "add:http://self:2380".to_owned()]
        );
    }

    #[test(tokio::test)]
    async fn refuses_to_add_when_the_future_quorum_is_at_risk() {
        let api = RecordingApi::with_members(vec![started("a"), started("b"), started("c")]);
        let adder = adder(&api, Strategy::Add, 3, StaticProber::healthy(["a"]));

        let result = adder.add("self", &["http://self:2380".to_owned()]).await;

        // m=3 started, h=1 healthy, future quorum (3+1)/2+1 = 3
        assert!(matches!(
            result,
            Err(Error::QuorumAtRisk {
                members: 3,
                healthy: 1,
                future_quorum: 3
            })
        ));
        assert_eq!(api.mutations(), Vec::<String>::new());
    }

    #[test(tokio::test)]
    async fn rerunning_against_a_prior_reservation_is_a_no_op() {
        let api = RecordingApi::with_members(vec![started("a"), started("b")]);
        let adder = adder(&api, Strategy::Add, 3, StaticProber::healthy(["a", "b"]));
        let urls = vec!["http://self:2380".to_owned()];

        adder.add("self", &urls).await.unwrap();
        let first_mutations = api.mutations();

        // the daemon never started, so the entry is still unstarted
        adder.add("self", &urls).await.unwrap();

        assert_eq!(api.mutations(), first_mutations);
    }
}
