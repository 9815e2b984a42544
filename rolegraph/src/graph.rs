// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rolegraph_store::{
    Edge, EdgeKind, EdgeStore, MemberStore, Pair, RoleId, RoleStore, Timestamp, Transaction,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::closure::{Closure, ClosureDiff, ClosureReport};
use crate::config::Config;
use crate::deferral;
use crate::error::RoleGraphError;
use crate::events::EdgeEvent;

/// Storage backend of a role graph.
///
/// Implemented for every type providing roles, edges and memberships with one shared
/// transaction.
pub trait GraphStore: RoleStore + EdgeStore + MemberStore {}

impl<T> GraphStore for T where T: RoleStore + EdgeStore + MemberStore {}

pub type GraphResult<T, S> = Result<T, RoleGraphError<<S as Transaction>::Error>>;

pub struct RoleGraphBuilder<S> {
    store: S,
    config: Config,
}

impl<S> RoleGraphBuilder<S>
where
    S: GraphStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: Config::default(),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn verify_closure(mut self, verify: bool) -> Self {
        self.config.verify_closure = verify;
        self
    }

    pub fn build(self) -> RoleGraph<S> {
        let (events, _) = broadcast::channel(self.config.event_capacity.max(1));
        RoleGraph {
            store: self.store,
            config: Arc::new(self.config),
            events,
            recomputations: Arc::default(),
        }
    }
}

/// Role hierarchy with an incrementally maintained transitive closure.
///
/// Direct edges are created and soft-deleted through the lifecycle methods (`soft_create`,
/// `soft_delete`, ..). Every effective change reconciles the materialized indirect edges within
/// the same transaction, unless the calling task is inside a deferral scope (see `deferred`).
///
/// Cloned instances share the same store, configuration and event channel.
#[derive(Debug)]
pub struct RoleGraph<S> {
    pub(crate) store: S,
    pub(crate) config: Arc<Config>,
    pub(crate) events: broadcast::Sender<EdgeEvent>,
    recomputations: Arc<AtomicUsize>,
}

impl<S> Clone for RoleGraph<S>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            events: self.events.clone(),
            recomputations: self.recomputations.clone(),
        }
    }
}

impl<S> RoleGraph<S>
where
    S: GraphStore,
{
    pub fn new(store: S) -> Self {
        RoleGraphBuilder::new(store).build()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to events about created and deleted direct edges.
    pub fn subscribe(&self) -> broadcast::Receiver<EdgeEvent> {
        self.events.subscribe()
    }

    /// Number of closure reconciliations this graph (and its clones) ran so far.
    pub fn recomputations(&self) -> usize {
        self.recomputations.load(Ordering::Relaxed)
    }

    /// Recompute the transitive closure from scratch and apply the minimal set of changes to the
    /// stored indirect edges.
    ///
    /// This can be called at any time, for example to repair the closure after direct edges were
    /// written to the store without going through this graph. Running it twice without any change
    /// in between results in an empty report the second time.
    pub async fn recompute(&self) -> GraphResult<ClosureReport, S> {
        self.atomically(async || self.reconcile().await).await
    }

    /// Run the future inside a deferral scope.
    ///
    /// Lifecycle operations awaited within the future do not update the closure. When the
    /// outermost scope is left and any of them requested an update, `recompute` runs exactly once.
    ///
    /// The update also runs when the future fails, the changes committed before the failure would
    /// otherwise leave a stale closure behind. The error of the future is returned in that case.
    pub async fn deferred<F, R>(&self, future: F) -> GraphResult<R, S>
    where
        F: Future<Output = GraphResult<R, S>>,
    {
        let (result, due) = deferral::scope(future).await;
        if !due {
            return result;
        }

        let report = self.recompute().await;
        match (result, report) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(repair_err)) => {
                warn!("could not update closure after failed deferred changes: {repair_err}");
                Err(err)
            }
        }
    }

    /// Snapshot of all active direct and indirect edges.
    pub async fn closure(&self) -> GraphResult<Closure, S> {
        self.atomically(async || {
            let direct = self.active_edges(EdgeKind::Direct).await?;
            let indirect = self.active_edges(EdgeKind::Indirect).await?;
            Ok(Closure {
                direct: direct.into_iter().collect(),
                indirect: indirect.into_iter().collect(),
            })
        })
        .await
    }

    /// Get the edge row for the given triple, including soft-deleted ones.
    pub async fn edge(
        &self,
        parent: RoleId,
        child: RoleId,
        kind: EdgeKind,
    ) -> GraphResult<Option<Edge>, S> {
        self.atomically(async || {
            self.store
                .get_edge(parent, child, kind)
                .await
                .map_err(RoleGraphError::Storage)
        })
        .await
    }

    /// Run the given function inside a transaction.
    ///
    /// The transaction is committed when the function succeeds and rolled back otherwise. The
    /// function must not start another transaction.
    pub(crate) async fn atomically<F, R>(&self, f: F) -> GraphResult<R, S>
    where
        F: AsyncFnOnce() -> GraphResult<R, S>,
    {
        let permit = self.store.begin().await.map_err(RoleGraphError::Storage)?;

        match f().await {
            Ok(value) => {
                self.store
                    .commit(permit)
                    .await
                    .map_err(RoleGraphError::Storage)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback(permit).await {
                    warn!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    /// Note that the closure is out of date after a direct edge changed.
    ///
    /// Updates the closure right away within the current transaction, unless the task is
    /// deferring.
    pub(crate) async fn notify(&self) -> GraphResult<(), S> {
        if deferral::request_recompute() {
            debug!("closure update deferred");
            return Ok(());
        }
        self.reconcile().await?;
        Ok(())
    }

    /// Send an event to all subscribers. Needs to be called after the transaction was committed.
    pub(crate) fn emit(&self, event: EdgeEvent) {
        // Sending only fails when nobody is subscribed.
        let _ = self.events.send(event);
    }

    async fn active_edges(&self, kind: EdgeKind) -> GraphResult<HashSet<Pair>, S> {
        self.store
            .active_edges(kind)
            .await
            .map_err(RoleGraphError::Storage)
    }

    /// Reconcile the stored indirect edges within the current transaction.
    async fn reconcile(&self) -> GraphResult<ClosureReport, S> {
        let direct = self.active_edges(EdgeKind::Direct).await?;
        let indirect = self.active_edges(EdgeKind::Indirect).await?;
        let diff = ClosureDiff::compute(&direct, &indirect);

        if !diff.is_empty() {
            // All changes of one batch share the same timestamp.
            let now = Timestamp::now();
            self.store
                .soft_delete_many(&diff.obsolete, EdgeKind::Indirect, now)
                .await
                .map_err(RoleGraphError::Storage)?;
            self.store
                .insert_or_undelete_many(&diff.new, EdgeKind::Indirect, now)
                .await
                .map_err(RoleGraphError::Storage)?;
        }

        if self.config.verify_closure {
            let applied = self.active_edges(EdgeKind::Indirect).await?;
            let mut pairs: Vec<Pair> = applied
                .symmetric_difference(&diff.target)
                .chain(applied.intersection(&direct))
                .copied()
                .collect();
            if !pairs.is_empty() {
                pairs.sort();
                pairs.dedup();
                warn!(
                    "closure verification failed, {} mismatching pairs",
                    pairs.len()
                );
                return Err(RoleGraphError::InvariantViolation { pairs });
            }
        }

        self.recomputations.fetch_add(1, Ordering::Relaxed);
        debug!(
            created = diff.new.len(),
            removed = diff.obsolete.len(),
            direct = direct.len(),
            "reconciled closure"
        );

        Ok(diff.into())
    }
}
