//! ChannelDeploys: the exclusivity rule over a [`DeployStore`].
//!
//! A channel holds at most one active deployment. Starting one on an
//! empty channel installs it; starting one while the same operator is
//! already deploying supersedes their record; starting one while someone
//! else is deploying is rejected and hands back their record.
//!
//! `start` and `finish` run under the channel's mutex from
//! [`ChannelLocks`], so two callers can never both observe an empty slot
//! and both install, and a same-operator restart never exposes the empty
//! state in between.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::StateResult;
use crate::locks::ChannelLocks;
use crate::store::DeployStore;
use crate::types::{Deployment, StartOutcome};

/// Per-channel deployment coordinator.
#[derive(Clone)]
pub struct ChannelDeploys {
    store: Arc<dyn DeployStore>,
    locks: ChannelLocks,
}

impl ChannelDeploys {
    pub fn new(store: Arc<dyn DeployStore>) -> Self {
        Self {
            store,
            locks: ChannelLocks::new(),
        }
    }

    /// The deployment currently active on `channel`, if any.
    pub fn current(&self, channel: &str) -> StateResult<Option<Deployment>> {
        self.store.get(channel)
    }

    /// Try to make `proposed` the active deployment on `channel`.
    ///
    /// On success the returned record carries the start time stamped at
    /// install. On conflict the other operator's record is returned as
    /// stored.
    pub fn start(&self, channel: &str, proposed: Deployment) -> StateResult<StartOutcome> {
        self.locks
            .with_channel(channel, || self.start_locked(channel, proposed))
    }

    fn start_locked(&self, channel: &str, mut proposed: Deployment) -> StateResult<StartOutcome> {
        // At most two passes: a same-operator record is removed on the
        // first, and nothing can reinstall it while the lock is held.
        while let Some(current) = self.store.get(channel)? {
            if !current.operator.same_identity(&proposed.operator) {
                debug!(
                    %channel,
                    holder = %current.operator.id,
                    requester = %proposed.operator.id,
                    "deployment rejected, channel busy"
                );
                return Ok(StartOutcome::Conflict(current));
            }

            debug!(%channel, operator = %current.operator.id, "superseding own deployment");
            self.store.delete(channel)?;
        }

        proposed.started_at = Some(Utc::now());
        self.store.set(channel, &proposed)?;
        info!(
            %channel,
            operator = %proposed.operator.id,
            subject = %proposed.subject,
            "deployment started"
        );
        Ok(StartOutcome::Started(proposed))
    }

    /// End the deployment on `channel`, returning it if there was one.
    pub fn finish(&self, channel: &str) -> StateResult<Option<Deployment>> {
        self.locks.with_channel(channel, || {
            let removed = self.store.delete(channel)?;
            if let Some(d) = &removed {
                info!(%channel, operator = %d.operator.id, subject = %d.subject, "deployment finished");
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::RedbStore;
    use crate::types::Operator;
    use chrono::Duration;
    use std::sync::Barrier;
    use std::thread;

    fn alice(subject: &str) -> Deployment {
        Deployment::new(Operator::new("1", "Alice"), subject)
    }

    fn bob(subject: &str) -> Deployment {
        Deployment::new(Operator::new("2", "Bob"), subject)
    }

    fn deploys() -> ChannelDeploys {
        ChannelDeploys::new(Arc::new(MemoryStore::new()))
    }

    fn assert_recent(d: &Deployment) {
        let started_at = d.started_at.expect("start time stamped");
        let drift = (Utc::now() - started_at).abs();
        assert!(drift < Duration::seconds(1), "start time drifted {drift}");
    }

    #[test]
    fn unknown_channel_has_no_deployment() {
        assert!(deploys().current("never-written").unwrap().is_none());
    }

    #[test]
    fn start_on_empty_channel_installs_and_stamps() {
        let deploys = deploys();

        let outcome = deploys.start("ops", alice("deploy v2")).unwrap();
        assert!(outcome.is_accepted());
        assert_recent(outcome.deployment());

        let current = deploys.current("ops").unwrap().unwrap();
        assert_eq!(&current, outcome.deployment());
        assert_eq!(current.operator, Operator::new("1", "Alice"));
        assert_eq!(current.subject, "deploy v2");
    }

    #[test]
    fn caller_supplied_start_time_is_overwritten() {
        let deploys = deploys();
        let mut proposed = alice("deploy v2");
        proposed.started_at = Some(Utc::now() - Duration::days(1));

        let outcome = deploys.start("ops", proposed).unwrap();
        assert_recent(outcome.deployment());
    }

    #[test]
    fn other_operator_is_rejected_with_existing_record() {
        let deploys = deploys();
        let installed = deploys
            .start("ops", alice("deploy v2"))
            .unwrap()
            .into_deployment();

        let outcome = deploys.start("ops", bob("deploy v3")).unwrap();

        assert_eq!(outcome, StartOutcome::Conflict(installed.clone()));
        assert_eq!(deploys.current("ops").unwrap(), Some(installed));
    }

    #[test]
    fn same_operator_supersedes_own_deployment() {
        let deploys = deploys();
        let first = deploys
            .start("ops", alice("deploy v2"))
            .unwrap()
            .into_deployment();

        let outcome = deploys.start("ops", alice("deploy v2 retry")).unwrap();
        assert!(outcome.is_accepted());

        let current = deploys.current("ops").unwrap().unwrap();
        assert_eq!(current.subject, "deploy v2 retry");
        assert!(current.started_at >= first.started_at);
        assert_recent(&current);
    }

    #[test]
    fn same_id_with_new_display_name_still_supersedes() {
        let deploys = deploys();
        deploys.start("ops", alice("deploy v2")).unwrap();

        let renamed = Deployment::new(Operator::new("1", "Alice L."), "deploy v2");
        assert!(deploys.start("ops", renamed).unwrap().is_accepted());
        assert_eq!(
            deploys.current("ops").unwrap().unwrap().operator.name,
            "Alice L."
        );
    }

    #[test]
    fn finish_removes_and_returns_record() {
        let deploys = deploys();
        let installed = deploys
            .start("ops", alice("deploy v2"))
            .unwrap()
            .into_deployment();

        assert_eq!(deploys.finish("ops").unwrap(), Some(installed));
        assert!(deploys.current("ops").unwrap().is_none());
        assert!(deploys.finish("ops").unwrap().is_none());
    }

    #[test]
    fn finish_frees_channel_for_other_operator() {
        let deploys = deploys();
        deploys.start("ops", alice("deploy v2")).unwrap();
        deploys.finish("ops").unwrap();

        assert!(deploys.start("ops", bob("deploy v3")).unwrap().is_accepted());
    }

    #[test]
    fn channels_are_isolated() {
        let deploys = deploys();
        deploys.start("c1", alice("deploy api")).unwrap();

        assert!(deploys.current("c2").unwrap().is_none());
        assert!(deploys.start("c2", bob("deploy web")).unwrap().is_accepted());

        deploys.finish("c2").unwrap();
        assert_eq!(
            deploys.current("c1").unwrap().unwrap().subject,
            "deploy api"
        );
    }

    #[test]
    fn full_scenario_on_redb() {
        let store = RedbStore::open_in_memory().unwrap();
        let deploys = ChannelDeploys::new(Arc::new(store));

        let outcome = deploys.start("ops", alice("deploy v2")).unwrap();
        assert!(outcome.is_accepted());
        let current = deploys.current("ops").unwrap().unwrap();
        assert_eq!(current.operator.name, "Alice");
        assert_eq!(current.subject, "deploy v2");

        let outcome = deploys.start("ops", bob("deploy v3")).unwrap();
        assert!(!outcome.is_accepted());
        assert_eq!(outcome.deployment().operator.name, "Alice");
        assert_eq!(outcome.deployment().subject, "deploy v2");

        let outcome = deploys.start("ops", alice("deploy v2 retry")).unwrap();
        assert!(outcome.is_accepted());
        let current = deploys.current("ops").unwrap().unwrap();
        assert_eq!(current.operator.name, "Alice");
        assert_eq!(current.subject, "deploy v2 retry");

        let finished = deploys.finish("ops").unwrap();
        assert_eq!(finished, Some(current));
        assert!(deploys.current("ops").unwrap().is_none());
    }

    #[test]
    fn concurrent_starts_admit_exactly_one_operator() {
        const CALLERS: usize = 16;
        let deploys = deploys();
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|i| {
                let deploys = deploys.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let proposed =
                        Deployment::new(Operator::new(format!("U{i}"), format!("user{i}")), "race");
                    barrier.wait();
                    deploys.start("ops", proposed).unwrap()
                })
            })
            .collect();

        let outcomes: Vec<StartOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<&Deployment> = outcomes
            .iter()
            .filter(|o| o.is_accepted())
            .map(StartOutcome::deployment)
            .collect();
        assert_eq!(winners.len(), 1);

        let current = deploys.current("ops").unwrap().unwrap();
        assert_eq!(&current, winners[0]);
        // Every loser was shown the winner's record.
        for outcome in outcomes.iter().filter(|o| !o.is_accepted()) {
            assert_eq!(outcome.deployment(), &current);
        }
    }

    #[test]
    fn own_restarts_never_let_another_operator_in() {
        const ROUNDS: usize = 50;
        const ATTEMPTS: usize = 50;

        for _ in 0..ROUNDS {
            let deploys = deploys();
            deploys.start("ops", alice("deploy v2")).unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let restarts = {
                let deploys = deploys.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for i in 0..ATTEMPTS {
                        let outcome = deploys
                            .start("ops", alice(&format!("deploy v2 retry {i}")))
                            .unwrap();
                        assert!(outcome.is_accepted(), "own restart rejected");
                    }
                })
            };

            let intruder = {
                let deploys = deploys.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    (0..ATTEMPTS)
                        .filter(|_| {
                            let outcome = deploys.start("ops", bob("deploy v3")).unwrap();
                            if !outcome.is_accepted() {
                                assert_eq!(outcome.deployment().operator.id, "1");
                            }
                            outcome.is_accepted()
                        })
                        .count()
                })
            };

            restarts.join().unwrap();
            assert_eq!(intruder.join().unwrap(), 0, "other operator got in mid-restart");

            let current = deploys.current("ops").unwrap().unwrap();
            assert_eq!(current.operator, Operator::new("1", "Alice"));
            assert_eq!(current.subject, format!("deploy v2 retry {}", ATTEMPTS - 1));
        }
    }

    #[test]
    fn lock_registry_drains_after_commands() {
        let deploys = deploys();
        deploys.start("ops", alice("deploy v2")).unwrap();
        deploys.start("ops", bob("deploy v3")).unwrap();
        deploys.finish("ops").unwrap();
        deploys.finish("never-started").unwrap();

        assert!(deploys.locks.is_empty());
    }
}
