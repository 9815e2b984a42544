// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use rand::RngExt;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::SeedableRng;
use rolegraph_store::{
    EdgeKind, EdgeStore, Lifecycle, MemberId, Pair, RoleId, RoleTestExt, Timestamp, Transaction,
    assert_all_stores,
};
use tokio::sync::broadcast::error::TryRecvError;

use crate::deferral;
use crate::events::{EdgeEvent, EdgeRef};
use crate::graph::{GraphStore, RoleGraph, RoleGraphBuilder};
use crate::query::Query;
use crate::test_utils::{Fault, FaultyStore, setup_logging};
use crate::{ClosureReport, RoleGraphError};

async fn create_roles<S, const N: usize>(graph: &RoleGraph<S>, slugs: [&str; N]) -> [RoleId; N]
where
    S: GraphStore,
{
    let mut ids = Vec::with_capacity(N);
    for slug in slugs {
        let role = graph.create_role(&slug.to_uppercase(), slug).await.unwrap();
        ids.push(role.id);
    }
    ids.try_into().unwrap()
}

fn pairs<const N: usize>(list: [Pair; N]) -> BTreeSet<Pair> {
    BTreeSet::from(list)
}

/// Pairs reachable over one or more active direct edges, found by walking the graph.
fn reachable_pairs(direct: &BTreeSet<Pair>) -> BTreeSet<Pair> {
    let mut graph: DiGraphMap<RoleId, ()> = DiGraphMap::new();
    for (parent, child) in direct {
        graph.add_edge(*parent, *child, ());
    }

    let mut result = BTreeSet::new();
    for start in graph.nodes() {
        for successor in graph.neighbors(start) {
            let mut dfs = Dfs::new(&graph, successor);
            while let Some(node) = dfs.next(&graph) {
                if node != start {
                    result.insert((start, node));
                }
            }
        }
    }
    result
}

#[tokio::test]
async fn chain_scenarios() {
    setup_logging();

    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b, c, d] = create_roles(&graph, ["a", "b", "c", "d"]).await;

        assert!(graph.soft_create(a, b).await.unwrap());
        assert!(graph.soft_create(b, c).await.unwrap());
        let closure = graph.closure().await.unwrap();
        assert_eq!(closure.direct, pairs([(a, b), (b, c)]));
        assert_eq!(closure.indirect, pairs([(a, c)]));

        assert!(graph.soft_create(c, d).await.unwrap());
        let closure = graph.closure().await.unwrap();
        assert_eq!(closure.direct, pairs([(a, b), (b, c), (c, d)]));
        assert_eq!(closure.indirect, pairs([(a, c), (b, d), (a, d)]));

        assert!(graph.soft_delete(b, c).await.unwrap());
        let closure = graph.closure().await.unwrap();
        assert_eq!(closure.direct, pairs([(a, b), (c, d)]));
        assert!(closure.indirect.is_empty());

        // The derived edges are kept as soft-deleted rows.
        for (parent, child) in [(a, c), (b, d), (a, d)] {
            let edge = graph
                .edge(parent, child, EdgeKind::Indirect)
                .await
                .unwrap()
                .unwrap();
            assert!(!edge.is_active());
        }

        // Nothing left to do.
        assert_eq!(graph.recompute().await.unwrap(), ClosureReport::default());
    });
}

#[tokio::test]
async fn recompute_is_idempotent() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b, c] = create_roles(&graph, ["a", "b", "c"]).await;

        // Write direct edges without going through the graph, as a bulk import would do.
        let permit = store.begin().await.unwrap();
        store
            .insert_or_undelete_many(&[(a, b), (b, c)], EdgeKind::Direct, Timestamp::now())
            .await
            .unwrap();
        store.commit(permit).await.unwrap();
        assert!(graph.closure().await.unwrap().indirect.is_empty());

        let report = graph.recompute().await.unwrap();
        assert_eq!(report.created, vec![(a, c)]);
        assert!(report.removed.is_empty());

        assert!(graph.recompute().await.unwrap().is_empty());
        assert!(graph.recompute().await.unwrap().is_empty());
    });
}

#[tokio::test]
async fn creating_twice_is_a_no_op() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b] = create_roles(&graph, ["a", "b"]).await;
        let mut events = graph.subscribe();

        assert!(graph.soft_create(a, b).await.unwrap());
        let created = graph
            .edge(a, b, EdgeKind::Direct)
            .await
            .unwrap()
            .unwrap()
            .created;
        let recomputations = graph.recomputations();

        assert!(!graph.soft_create(a, b).await.unwrap());
        assert_eq!(
            graph
                .edge(a, b, EdgeKind::Direct)
                .await
                .unwrap()
                .unwrap()
                .created,
            created
        );
        assert_eq!(graph.recomputations(), recomputations);

        assert_eq!(
            events.try_recv().unwrap(),
            EdgeEvent::Created(EdgeRef::new(a, b))
        );
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    });
}

#[tokio::test]
async fn soft_delete_keeps_history() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b] = create_roles(&graph, ["a", "b"]).await;
        let mut events = graph.subscribe();

        // Nothing to delete yet.
        assert!(!graph.soft_delete(a, b).await.unwrap());

        graph.soft_create(a, b).await.unwrap();
        assert!(graph.is_ancestor(a, b).await.unwrap());

        assert!(graph.soft_delete(a, b).await.unwrap());
        assert!(!graph.soft_delete(a, b).await.unwrap());

        let edge = graph
            .edge(a, b, EdgeKind::Direct)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(edge.lifecycle, Lifecycle::Deleted(_)));
        assert!(!graph.is_ancestor(a, b).await.unwrap());
        assert!(
            !graph
                .ancestors(&[b], Query::new())
                .await
                .unwrap()
                .contains(&a)
        );

        assert_eq!(
            events.try_recv().unwrap(),
            EdgeEvent::Created(EdgeRef::new(a, b))
        );
        assert_eq!(
            events.try_recv().unwrap(),
            EdgeEvent::Deleted(EdgeRef::new(a, b))
        );
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    });
}

#[tokio::test]
async fn undelete_resets_creation_time() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b] = create_roles(&graph, ["a", "b"]).await;

        graph.soft_create(a, b).await.unwrap();
        let first = graph
            .edge(a, b, EdgeKind::Direct)
            .await
            .unwrap()
            .unwrap();

        graph.soft_delete(a, b).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let mut events = graph.subscribe();
        assert!(graph.soft_create(a, b).await.unwrap());
        assert_eq!(
            events.try_recv().unwrap(),
            EdgeEvent::Created(EdgeRef::new(a, b))
        );

        let second = graph
            .edge(a, b, EdgeKind::Direct)
            .await
            .unwrap()
            .unwrap();
        assert!(second.is_active());
        assert!(second.created > first.created);
        assert!(graph.is_descendant(b, a).await.unwrap());
    });
}

#[tokio::test]
async fn no_redundant_indirect_edges() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b, c] = create_roles(&graph, ["a", "b", "c"]).await;

        graph.soft_create(a, b).await.unwrap();
        graph.soft_create(b, c).await.unwrap();
        assert_eq!(graph.closure().await.unwrap().indirect, pairs([(a, c)]));

        // A direct shortcut replaces the indirect edge.
        graph.soft_create(a, c).await.unwrap();
        let closure = graph.closure().await.unwrap();
        assert_eq!(closure.direct, pairs([(a, b), (b, c), (a, c)]));
        assert!(closure.indirect.is_empty());
        assert_eq!(graph.annotate_direct(&[c], a).await.unwrap(), Some(true));

        // Removing the shortcut brings the indirect edge back.
        graph.soft_delete(a, c).await.unwrap();
        let closure = graph.closure().await.unwrap();
        assert_eq!(closure.indirect, pairs([(a, c)]));
        assert!(
            graph
                .edge(a, c, EdgeKind::Indirect)
                .await
                .unwrap()
                .unwrap()
                .is_active()
        );
        assert_eq!(graph.annotate_direct(&[c], a).await.unwrap(), Some(false));
    });
}

#[tokio::test]
async fn cycles() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let roles = create_roles(&graph, ["r0", "r1", "r2", "r3", "r4", "r5"]).await;

        for (index, role) in roles.iter().enumerate() {
            let next = roles[(index + 1) % roles.len()];
            graph.soft_create(*role, next).await.unwrap();
        }

        let all: BTreeSet<RoleId> = roles.iter().copied().collect();
        for role in roles {
            let descendants = graph
                .descendants(&[role], Query::new().include_self(true))
                .await
                .unwrap();
            assert_eq!(descendants, all);

            let ancestors = graph.ancestors(&[role], Query::new()).await.unwrap();
            assert_eq!(ancestors.len(), 5);

            // Roles never become their own ancestor.
            assert!(!graph.is_ancestor(role, role).await.unwrap());
        }

        let closure = graph.closure().await.unwrap();
        assert_eq!(closure.direct.len(), 6);
        assert_eq!(closure.indirect.len(), 6 * 5 - 6);
    });
}

#[tokio::test]
async fn deferred_changes_recompute_once() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b, c] = create_roles(&graph, ["a", "b", "c"]).await;
        let before = graph.recomputations();

        graph
            .deferred(async {
                assert!(deferral::is_deferring());
                graph.soft_create(a, b).await?;
                graph.soft_create(b, c).await?;
                assert_eq!(graph.recomputations(), before);

                // Direct edges are written right away, the closure is stale.
                let closure = graph.closure().await?;
                assert_eq!(closure.direct, pairs([(a, b), (b, c)]));
                assert!(closure.indirect.is_empty());
                Ok(())
            })
            .await
            .unwrap();

        assert!(!deferral::is_deferring());
        assert_eq!(graph.recomputations(), before + 1);
        assert_eq!(graph.closure().await.unwrap().indirect, pairs([(a, c)]));

        // Scopes without effective changes do not recompute.
        graph
            .deferred(async {
                graph.soft_create(a, b).await?;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(graph.recomputations(), before + 1);
    });
}

#[tokio::test]
async fn nested_deferral_scopes() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b, c, d] = create_roles(&graph, ["a", "b", "c", "d"]).await;
        let before = graph.recomputations();

        graph
            .deferred(async {
                graph.soft_create(a, b).await?;
                graph
                    .deferred(async {
                        graph.soft_create(b, c).await?;
                        Ok(())
                    })
                    .await?;

                // Leaving the inner scope keeps the outer one deferring.
                assert!(deferral::is_deferring());
                assert_eq!(graph.recomputations(), before);

                graph.soft_create(c, d).await?;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(graph.recomputations(), before + 1);
        assert_eq!(
            graph.closure().await.unwrap().indirect,
            pairs([(a, c), (b, d), (a, d)])
        );
    });
}

#[tokio::test]
async fn failed_deferral_still_updates_closure() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b, c] = create_roles(&graph, ["a", "b", "c"]).await;

        let result: Result<(), _> = graph
            .deferred(async {
                graph.soft_create(a, b).await?;
                graph.soft_create(b, c).await?;
                graph.soft_create(c, RoleId(404)).await?;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(RoleGraphError::MissingRole(RoleId(404)))));

        assert_eq!(graph.closure().await.unwrap().indirect, pairs([(a, c)]));
    });
}

#[tokio::test]
async fn missing_roles_and_slugs() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a] = create_roles(&graph, ["a"]).await;

        assert!(matches!(
            graph.soft_create(a, RoleId(404)).await,
            Err(RoleGraphError::MissingRole(RoleId(404)))
        ));
        assert!(matches!(
            graph.soft_delete(RoleId(405), a).await,
            Err(RoleGraphError::MissingRole(RoleId(405)))
        ));
        assert!(matches!(
            graph.add_member(RoleId(404), MemberId(1)).await,
            Err(RoleGraphError::MissingRole(RoleId(404)))
        ));
        assert!(graph.closure().await.unwrap().direct.is_empty());

        assert!(matches!(
            graph.create_role("Another A", "a").await,
            Err(RoleGraphError::DuplicateSlug(slug)) if slug == "a"
        ));

        let role = graph.role_by_slug("a").await.unwrap().unwrap();
        assert_eq!(role.id, a);
        assert_eq!(role.name, "A");
        assert_eq!(graph.role(a).await.unwrap(), Some(role));
    });
}

#[tokio::test]
async fn parent_and_child_helpers() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [admins, editors, authors] =
            create_roles(&graph, ["admins", "editors", "authors"]).await;

        graph.add_child(admins, editors).await.unwrap();
        graph.add_parent(authors, editors).await.unwrap();
        assert_eq!(
            graph.closure().await.unwrap().direct,
            pairs([(admins, editors), (editors, authors)])
        );

        let ancestors = graph
            .ancestors_annotated(&[authors], Query::new())
            .await
            .unwrap();
        assert_eq!(ancestors, BTreeMap::from([(admins, false), (editors, true)]));

        let descendants = graph
            .descendants_annotated(&[admins], Query::new().include_self(true))
            .await
            .unwrap();
        assert_eq!(
            descendants,
            BTreeMap::from([(admins, true), (editors, true), (authors, false)])
        );

        assert_eq!(
            graph
                .descendants(&[admins], Query::new().direct_only())
                .await
                .unwrap(),
            BTreeSet::from([editors])
        );
        assert_eq!(
            graph
                .ancestors(&[authors], Query::new().indirect_only())
                .await
                .unwrap(),
            BTreeSet::from([admins])
        );
        assert_eq!(graph.annotate_direct(&[authors], authors).await.unwrap(), None);

        graph.remove_parent(authors, editors).await.unwrap();
        graph.remove_child(admins, editors).await.unwrap();
        let closure = graph.closure().await.unwrap();
        assert!(closure.direct.is_empty());
        assert!(closure.indirect.is_empty());
    });
}

#[tokio::test]
async fn memberships() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [admins, editors, authors, guests] =
            create_roles(&graph, ["admins", "editors", "authors", "guests"]).await;
        graph.add_child(admins, editors).await.unwrap();
        graph.add_child(editors, authors).await.unwrap();

        let (alice, bob, carol) = (MemberId(1), MemberId(2), MemberId(3));
        assert!(graph.add_member(authors, alice).await.unwrap());
        assert!(!graph.add_member(authors, alice).await.unwrap());
        assert!(graph.add_member(admins, bob).await.unwrap());
        assert!(graph.add_member(guests, carol).await.unwrap());

        assert_eq!(
            graph.roles_for_member(alice).await.unwrap(),
            BTreeSet::from([admins, editors, authors])
        );
        assert_eq!(
            graph.roles_for_member(bob).await.unwrap(),
            BTreeSet::from([admins])
        );
        assert!(
            graph
                .roles_for_member(MemberId(99))
                .await
                .unwrap()
                .is_empty()
        );

        assert_eq!(
            graph.all_members(admins).await.unwrap(),
            BTreeMap::from([(alice, false), (bob, true)])
        );
        assert_eq!(
            graph.all_members(editors).await.unwrap(),
            BTreeMap::from([(alice, false)])
        );
        assert_eq!(
            graph.all_members(guests).await.unwrap(),
            BTreeMap::from([(carol, true)])
        );

        // Inherited memberships end with the edge.
        graph.remove_child(editors, authors).await.unwrap();
        assert_eq!(
            graph.all_members(admins).await.unwrap(),
            BTreeMap::from([(bob, true)])
        );

        assert!(graph.remove_member(guests, carol).await.unwrap());
        assert!(!graph.remove_member(guests, carol).await.unwrap());
        assert!(graph.all_members(guests).await.unwrap().is_empty());
    });
}

#[tokio::test]
async fn delete_role_updates_closure() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b, c] = create_roles(&graph, ["a", "b", "c"]).await;
        graph.soft_create(a, b).await.unwrap();
        graph.soft_create(b, c).await.unwrap();
        graph.add_member(c, MemberId(1)).await.unwrap();

        assert!(graph.delete_role(b).await.unwrap());
        assert!(!graph.delete_role(b).await.unwrap());

        let closure = graph.closure().await.unwrap();
        assert!(closure.direct.is_empty());
        assert!(closure.indirect.is_empty());
        assert!(!graph.is_ancestor(a, c).await.unwrap());
        assert!(graph.role(b).await.unwrap().is_none());
        assert!(matches!(
            graph.soft_create(a, b).await,
            Err(RoleGraphError::MissingRole(_))
        ));

        // Memberships of other roles are untouched.
        assert_eq!(
            graph.roles_for_member(MemberId(1)).await.unwrap(),
            BTreeSet::from([c])
        );
    });
}

#[tokio::test]
async fn cleanup_orphans() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b, c] = create_roles(&graph, ["a", "b", "c"]).await;
        graph.soft_create(a, b).await.unwrap();
        graph.soft_create(b, c).await.unwrap();
        graph.add_member(b, MemberId(1)).await.unwrap();

        // Role is removed behind the graph's back.
        let permit = store.begin().await.unwrap();
        assert!(store.delete_role_without_cascade(b).await);
        store.commit(permit).await.unwrap();

        // Two direct edges and one membership.
        assert_eq!(graph.cleanup_orphans().await.unwrap(), 3);
        assert_eq!(graph.cleanup_orphans().await.unwrap(), 0);

        // Cleaning up does not touch the closure, the indirect edge goes with the repair run.
        assert_eq!(graph.closure().await.unwrap().indirect, pairs([(a, c)]));
        let report = graph.recompute().await.unwrap();
        assert_eq!(report.removed, vec![(a, c)]);
        assert!(graph.closure().await.unwrap().indirect.is_empty());
    });
}

#[tokio::test]
async fn new_roles_do_not_inherit_dangling_edges() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b] = create_roles(&graph, ["a", "b"]).await;
        graph.soft_create(a, b).await.unwrap();

        let permit = store.begin().await.unwrap();
        assert!(store.delete_role_without_cascade(b).await);
        store.commit(permit).await.unwrap();

        let fresh = graph.create_role("Fresh", "fresh").await.unwrap();
        assert_ne!(fresh.id, b);
        assert!(
            graph
                .ancestors(&[fresh.id], Query::new())
                .await
                .unwrap()
                .is_empty()
        );

        // The dangling edge is still found as an orphan.
        assert_eq!(graph.cleanup_orphans().await.unwrap(), 1);
    });
}

#[tokio::test]
async fn self_loops_are_no_ancestry() {
    assert_all_stores!(|store| async {
        let graph = RoleGraph::new(store.clone());
        let [a, b] = create_roles(&graph, ["a", "b"]).await;

        assert!(graph.soft_create(a, a).await.unwrap());
        graph.soft_create(a, b).await.unwrap();

        assert!(!graph.is_ancestor(a, a).await.unwrap());
        assert!(!graph.is_descendant(a, a).await.unwrap());
        assert!(graph.is_ancestor(a, b).await.unwrap());
        assert!(graph.closure().await.unwrap().indirect.is_empty());
    });
}

#[tokio::test]
async fn storage_failure_rolls_back() {
    let store = FaultyStore::new();
    let graph = RoleGraph::new(store.clone());
    let [a, b, c, d] = create_roles(&graph, ["a", "b", "c", "d"]).await;
    graph.soft_create(a, b).await.unwrap();
    graph.soft_create(b, c).await.unwrap();
    let before = graph.closure().await.unwrap();
    let mut events = graph.subscribe();

    store.set_fault(Fault::FailBatches);
    assert!(matches!(
        graph.soft_create(c, d).await,
        Err(RoleGraphError::Storage(_))
    ));

    // The direct edge was rolled back together with the closure update.
    assert!(graph.edge(c, d, EdgeKind::Direct).await.unwrap().is_none());
    assert_eq!(graph.closure().await.unwrap(), before);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

    store.set_fault(Fault::Healthy);
    assert!(graph.soft_create(c, d).await.unwrap());
    assert_eq!(
        graph.closure().await.unwrap().indirect,
        pairs([(a, c), (b, d), (a, d)])
    );
}

#[tokio::test]
async fn verification_detects_broken_store() {
    let store = FaultyStore::new();
    let graph = RoleGraph::new(store.clone());
    let [a, b, c] = create_roles(&graph, ["a", "b", "c"]).await;
    graph.soft_create(a, b).await.unwrap();
    graph.soft_create(b, c).await.unwrap();

    store.set_fault(Fault::IgnoreSoftDeletes);
    let result = graph.soft_delete(b, c).await;
    assert!(matches!(
        result,
        Err(RoleGraphError::InvariantViolation { pairs }) if pairs == vec![(a, c)]
    ));
    assert_eq!(
        graph.closure().await.unwrap().direct,
        pairs([(a, b), (b, c)])
    );

    // Without verification the stale edge goes unnoticed until the store works again.
    let unverified = RoleGraphBuilder::new(store.clone())
        .verify_closure(false)
        .build();
    assert!(unverified.soft_delete(b, c).await.unwrap());
    assert_eq!(
        unverified.closure().await.unwrap().indirect,
        pairs([(a, c)])
    );

    store.set_fault(Fault::Healthy);
    let report = graph.recompute().await.unwrap();
    assert_eq!(report.removed, vec![(a, c)]);
}

#[tokio::test]
async fn racing_inserts_give_up() {
    let store = FaultyStore::new();
    let graph = RoleGraph::new(store.clone());
    let [a, b] = create_roles(&graph, ["a", "b"]).await;

    store.set_fault(Fault::RejectInserts);
    assert!(matches!(
        graph.soft_create(a, b).await,
        Err(RoleGraphError::ConstraintViolation { parent, child }) if parent == a && child == b
    ));

    store.set_fault(Fault::Healthy);
    assert!(graph.soft_create(a, b).await.unwrap());
}

#[tokio::test]
async fn zero_event_capacity() {
    let graph = RoleGraphBuilder::new(FaultyStore::new())
        .event_capacity(0)
        .build();
    assert_eq!(graph.config().event_capacity, 0);

    let mut events = graph.subscribe();
    let [a, b] = create_roles(&graph, ["a", "b"]).await;
    graph.soft_create(a, b).await.unwrap();
    assert!(events.try_recv().is_ok());
}

#[tokio::test]
async fn random_mutations_match_reachability() {
    setup_logging();

    assert_all_stores!(|store| async {
        let mut rng = ChaCha20Rng::from_seed([7; 32]);
        let graph = RoleGraph::new(store.clone());
        let roles =
            create_roles(&graph, ["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7"]).await;

        let mut expected_direct = BTreeSet::new();
        for round in 0..40 {
            let parent = roles[rng.random_range(0..roles.len())];
            let child = roles[rng.random_range(0..roles.len())];
            if parent == child {
                continue;
            }

            let create = rng.random_range(0..3) > 0;
            let mutate = async {
                if create {
                    graph.soft_create(parent, child).await
                } else {
                    graph.soft_delete(parent, child).await
                }
            };

            // Every few rounds the change happens inside a deferral scope.
            if round % 4 == 0 {
                graph.deferred(mutate).await.unwrap();
            } else {
                mutate.await.unwrap();
            }

            if create {
                expected_direct.insert((parent, child));
            } else {
                expected_direct.remove(&(parent, child));
            }

            let closure = graph.closure().await.unwrap();
            assert_eq!(closure.direct, expected_direct);

            let expected_indirect: BTreeSet<Pair> = reachable_pairs(&expected_direct)
                .difference(&expected_direct)
                .copied()
                .collect();
            assert_eq!(closure.indirect, expected_indirect);

            for (parent, child) in &expected_indirect {
                assert!(graph.is_ancestor(*parent, *child).await.unwrap());
            }
        }

        let all_indirect: HashSet<Pair> = graph
            .closure()
            .await
            .unwrap()
            .indirect
            .into_iter()
            .collect();
        assert!(all_indirect.iter().all(|pair| !expected_direct.contains(pair)));
    });
}
