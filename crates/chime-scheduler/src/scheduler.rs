// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The alarm scheduler: persistence, wake tasks, and retry settlement.
//!
//! Every alarm is written to SQLite before its wake task is armed, and every
//! mutation of the in-memory alarm map happens under a single async mutex that
//! is held across that write. A wake task sleeps until the scheduled time,
//! marks its record `Started`, runs the actor's handler outside the lock, and
//! then settles the record: run a queued alarm, honor a delete, schedule a
//! retry, or remove the alarm for good.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chime_config::ChimeConfig;
use chime_core::{
    ActorKey, AlarmHandler, AlarmStatus, ChimeError, Clock, SystemClock, Timer, Timestamp,
    TokioTimer,
};
use chime_storage::{Database, StoredAlarm, queries};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::alarm::{RetryState, ScheduledAlarm};
use crate::policy::RetryPolicy;
use crate::registry::NamespaceRegistry;

/// Durable per-actor alarm scheduler.
///
/// Cheap to clone; clones share the same alarms. Wake tasks hold only a weak
/// reference, so dropping the last clone stops delivery.
#[derive(Clone)]
pub struct AlarmScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    db: Database,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn Timer>,
    policy: RetryPolicy,
    state: Mutex<State>,
}

struct State {
    alarms: HashMap<ActorKey, ScheduledAlarm>,
    namespaces: NamespaceRegistry,
    rng: StdRng,
    last_generation: u64,
    shut_down: bool,
}

impl State {
    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    fn ensure_running(&self) -> Result<(), ChimeError> {
        if self.shut_down {
            return Err(ChimeError::Internal(
                "alarm scheduler has been shut down".to_string(),
            ));
        }
        Ok(())
    }
}

/// How an invocation asks to be settled.
#[derive(Debug, Clone, Copy)]
struct Verdict {
    retry: bool,
    counts_against_limit: bool,
}

/// Configures and opens an [`AlarmScheduler`].
///
/// Namespaces registered here are known before persisted alarms are loaded,
/// so overdue alarms can be delivered as soon as the scheduler opens.
pub struct AlarmSchedulerBuilder {
    db: Database,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn Timer>,
    policy: RetryPolicy,
    namespaces: NamespaceRegistry,
    seed: Option<u64>,
}

impl AlarmSchedulerBuilder {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            timer: Arc::new(TokioTimer),
            policy: RetryPolicy::default(),
            namespaces: NamespaceRegistry::new(),
            seed: None,
        }
    }

    /// Open the configured database and take the retry policy from `config`.
    pub async fn from_config(config: &ChimeConfig) -> Result<Self, ChimeError> {
        let db = Database::open(&config.storage.database_path).await?;
        Ok(Self::new(db).policy(RetryPolicy::from(&config.scheduler)))
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Seed the jitter RNG. Entropy-seeded otherwise.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Register the actor resolver for a namespace.
    pub fn namespace<F>(mut self, unique_key: impl Into<String>, resolver: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn AlarmHandler> + Send + Sync + 'static,
    {
        self.namespaces.register(unique_key, Arc::new(resolver));
        self
    }

    /// Build the scheduler and arm every persisted alarm.
    ///
    /// Alarms whose time has already passed fire immediately.
    pub async fn open(self) -> Result<AlarmScheduler, ChimeError> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let scheduler = AlarmScheduler {
            inner: Arc::new(Inner {
                db: self.db,
                clock: self.clock,
                timer: self.timer,
                policy: self.policy,
                state: Mutex::new(State {
                    alarms: HashMap::new(),
                    namespaces: self.namespaces,
                    rng,
                    last_generation: 0,
                    shut_down: false,
                }),
            }),
        };
        scheduler.load_alarms_from_db().await?;
        Ok(scheduler)
    }
}

impl AlarmScheduler {
    pub fn builder(db: Database) -> AlarmSchedulerBuilder {
        AlarmSchedulerBuilder::new(db)
    }

    async fn load_alarms_from_db(&self) -> Result<(), ChimeError> {
        let stored = queries::alarms::list_alarms(&self.inner.db).await?;
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let count = stored.len();
        for StoredAlarm {
            actor,
            scheduled_time,
        } in stored
        {
            if !state.namespaces.contains(&actor.unique_key) {
                warn!(
                    unique_key = %actor.unique_key,
                    actor_id = %actor.actor_id,
                    "loaded alarm for an unregistered namespace"
                );
            }
            let alarm = self.inner.schedule_alarm(state, actor.clone(), scheduled_time);
            state.alarms.insert(actor, alarm);
        }
        info!(count, "alarms loaded");
        Ok(())
    }

    /// Register (or replace) the actor resolver for a namespace.
    ///
    /// Must happen before any alarm of that namespace fires; an alarm that
    /// fires for an unknown namespace is dropped from memory.
    pub async fn register_namespace<F>(&self, unique_key: impl Into<String>, resolver: F)
    where
        F: Fn(&str) -> Arc<dyn AlarmHandler> + Send + Sync + 'static,
    {
        let unique_key = unique_key.into();
        debug!(unique_key = %unique_key, "namespace registered");
        self.inner
            .state
            .lock()
            .await
            .namespaces
            .register(unique_key, Arc::new(resolver));
    }

    /// The actor's next alarm, if any.
    ///
    /// While the handler runs, this is the alarm queued behind it.
    pub async fn get_alarm(&self, actor: &ActorKey) -> Option<Timestamp> {
        let state = self.inner.state.lock().await;
        state.alarms.get(actor).and_then(ScheduledAlarm::next_alarm)
    }

    /// Persist `scheduled_time` as the actor's alarm, then arm it.
    ///
    /// Replaces any waiting alarm or pending retry. If the handler is running,
    /// the new time is queued and armed once it settles. Returns whether the
    /// persisted row changed.
    pub async fn set_alarm(
        &self,
        actor: &ActorKey,
        scheduled_time: Timestamp,
    ) -> Result<bool, ChimeError> {
        let mut guard = self.inner.state.lock().await;
        guard.ensure_running()?;
        let changed = queries::alarms::upsert_alarm(&self.inner.db, actor, scheduled_time).await?;
        let state = &mut *guard;

        let started = state
            .alarms
            .get(actor)
            .map(|alarm| alarm.status == AlarmStatus::Started);
        match started {
            Some(true) => {
                if let Some(alarm) = state.alarms.get_mut(actor) {
                    alarm.queued_alarm = Some(scheduled_time);
                    alarm.deleted = false;
                }
                debug!(%actor, %scheduled_time, "alarm queued behind running handler");
            }
            _ => {
                if let Some(mut previous) = state.alarms.remove(actor) {
                    previous.cancel();
                }
                if !state.namespaces.contains(&actor.unique_key) {
                    warn!(%actor, "alarm set for an unregistered namespace");
                }
                let alarm = self.inner.schedule_alarm(state, actor.clone(), scheduled_time);
                state.alarms.insert(actor.clone(), alarm);
            }
        }
        Ok(changed)
    }

    /// Remove the actor's persisted alarm and cancel it.
    ///
    /// A running handler is left to finish, but nothing is rescheduled after
    /// it. Returns whether a row was removed.
    pub async fn delete_alarm(&self, actor: &ActorKey) -> Result<bool, ChimeError> {
        let mut guard = self.inner.state.lock().await;
        guard.ensure_running()?;
        let changed = queries::alarms::delete_alarm(&self.inner.db, actor).await?;
        let state = &mut *guard;

        let started = state
            .alarms
            .get(actor)
            .map(|alarm| alarm.status == AlarmStatus::Started);
        match started {
            Some(true) => {
                if let Some(alarm) = state.alarms.get_mut(actor) {
                    alarm.queued_alarm = None;
                    alarm.deleted = true;
                }
            }
            Some(false) => {
                if let Some(mut alarm) = state.alarms.remove(actor) {
                    alarm.cancel();
                }
            }
            None => {}
        }
        debug!(%actor, changed, "alarm deleted");
        Ok(changed)
    }

    /// Number of actors with an in-memory alarm record.
    pub async fn alarm_count(&self) -> usize {
        self.inner.state.lock().await.alarms.len()
    }

    /// Snapshot of an actor's alarm and retry counters.
    pub async fn retry_state(&self, actor: &ActorKey) -> Option<RetryState> {
        let state = self.inner.state.lock().await;
        state.alarms.get(actor).map(ScheduledAlarm::retry_state)
    }

    /// Stop delivering alarms and checkpoint the database.
    ///
    /// Waiting alarms and pending retries are cancelled but stay persisted,
    /// so the next scheduler to open the database picks them up. Handlers
    /// already running are allowed to finish. Their outcome is still
    /// persisted but nothing is rescheduled after them. Further
    /// `set_alarm`/`delete_alarm` calls fail.
    pub async fn shutdown(&self) -> Result<(), ChimeError> {
        let cancelled = {
            let mut state = self.inner.state.lock().await;
            state.shut_down = true;
            let mut cancelled = 0usize;
            for alarm in state.alarms.values_mut() {
                if alarm.status != AlarmStatus::Started {
                    alarm.cancel();
                    cancelled += 1;
                }
            }
            cancelled
        };
        self.inner.db.checkpoint().await?;
        info!(cancelled, "alarm scheduler shut down");
        Ok(())
    }
}

impl Inner {
    /// Build a fresh `Waiting` record for `actor` and spawn its wake task.
    fn schedule_alarm(
        self: &Arc<Self>,
        state: &mut State,
        actor: ActorKey,
        scheduled_time: Timestamp,
    ) -> ScheduledAlarm {
        let delay = delay_until(self.clock.now(), scheduled_time);
        let generation = state.next_generation();
        let span = info_span!(
            "alarm",
            unique_key = %actor.unique_key,
            actor_id = %actor.actor_id,
        );
        debug!(
            parent: &span,
            %scheduled_time,
            delay_ms = delay.as_millis() as u64,
            "alarm armed"
        );
        let task = self.spawn_wake_task(&span, actor.clone(), generation, scheduled_time, delay);
        ScheduledAlarm::new(scheduled_time, generation, task, span)
    }

    fn spawn_wake_task(
        self: &Arc<Self>,
        span: &Span,
        actor: ActorKey,
        generation: u64,
        scheduled_time: Timestamp,
        delay: Duration,
    ) -> JoinHandle<()> {
        let inner = Arc::downgrade(self);
        let clock = Arc::clone(&self.clock);
        let timer = Arc::clone(&self.timer);
        tokio::spawn(
            async move {
                wait_until(clock.as_ref(), timer.as_ref(), scheduled_time, delay).await;
                match inner.upgrade() {
                    Some(inner) => inner.fire(actor, generation, scheduled_time).await,
                    None => debug!("scheduler dropped before alarm fired"),
                }
            }
            .instrument(span.clone()),
        )
    }

    /// Run the handler for a due alarm and settle the outcome.
    async fn fire(self: Arc<Self>, actor: ActorKey, generation: u64, scheduled_time: Timestamp) {
        let (resolver, retry_count) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let Some(alarm) = state
                .alarms
                .get_mut(&actor)
                .filter(|alarm| alarm.generation == generation)
            else {
                debug!("alarm superseded before it fired");
                return;
            };
            match state.namespaces.resolver(&actor.unique_key) {
                Ok(resolver) => {
                    alarm.status = AlarmStatus::Started;
                    (resolver, alarm.counted_retry)
                }
                Err(e) => {
                    error!(error = %e, "cannot deliver alarm; it stays persisted");
                    state.alarms.remove(&actor);
                    return;
                }
            }
        };

        debug!(retry = retry_count, "running alarm");
        let handler = resolver(&actor.actor_id);
        let verdict = match handler.run_alarm(scheduled_time, retry_count).await {
            Ok(result) => {
                if result.should_retry() {
                    debug!(
                        outcome = %result.outcome,
                        counts_against_limit = result.retry_counts_against_limit,
                        "alarm handler failed"
                    );
                }
                Verdict {
                    retry: result.should_retry(),
                    counts_against_limit: result.retry_counts_against_limit,
                }
            }
            Err(e) => {
                warn!(error = %e, "alarm invocation failed; retrying without counting it");
                Verdict {
                    retry: true,
                    counts_against_limit: false,
                }
            }
        };

        let mut guard = self.state.lock().await;
        if let Err(e) = self.settle(&mut guard, &actor, generation, verdict).await {
            error!(error = %e, "failed to settle alarm");
        }
    }

    /// Decide what follows a finished invocation. Called with the state lock held.
    async fn settle(
        self: &Arc<Self>,
        state: &mut State,
        actor: &ActorKey,
        generation: u64,
        verdict: Verdict,
    ) -> Result<(), ChimeError> {
        let Some(alarm) = state
            .alarms
            .get_mut(actor)
            .filter(|alarm| alarm.generation == generation)
        else {
            return Ok(());
        };

        if let Some(queued) = alarm.queued_alarm.take() {
            if state.shut_down {
                // The queued time is already persisted; the next start arms it.
                state.alarms.remove(actor);
                return Ok(());
            }
            debug!(%queued, "arming queued alarm");
            let replacement = self.schedule_alarm(state, actor.clone(), queued);
            state.alarms.insert(actor.clone(), replacement);
            return Ok(());
        }

        if alarm.deleted {
            state.alarms.remove(actor);
            return Ok(());
        }

        alarm.status = AlarmStatus::Finished;
        if !verdict.retry {
            state.alarms.remove(actor);
            queries::alarms::delete_alarm(&self.db, actor).await?;
            debug!("alarm complete");
            return Ok(());
        }

        match alarm.plan_retry(verdict.counts_against_limit, &self.policy, &mut state.rng) {
            Some(_) if state.shut_down => {
                alarm.task = None;
                debug!("scheduler shut down; retry left for the next start");
            }
            Some(delay) => {
                state.last_generation += 1;
                alarm.generation = state.last_generation;
                info!(
                    retry = alarm.retry,
                    counted_retry = alarm.counted_retry,
                    delay_ms = delay.as_millis() as u64,
                    "alarm failed; retry scheduled"
                );
                alarm.task = Some(self.spawn_wake_task(
                    &alarm.span,
                    actor.clone(),
                    alarm.generation,
                    alarm.scheduled_time,
                    delay,
                ));
            }
            None => {
                warn!(
                    counted_retry = alarm.counted_retry,
                    "alarm retry limit reached; dropping alarm"
                );
                state.alarms.remove(actor);
                queries::alarms::delete_alarm(&self.db, actor).await?;
            }
        }
        Ok(())
    }
}

/// Time from `now` until `scheduled_time`; zero if already due.
fn delay_until(now: Timestamp, scheduled_time: Timestamp) -> Duration {
    (scheduled_time - now).to_std().unwrap_or(Duration::ZERO)
}

/// Sleep on `timer` until `clock` reads at least `scheduled_time`.
///
/// The timer and the clock can drift apart, so a timer that fires early is
/// followed by another sleep for whatever remains.
async fn wait_until(clock: &dyn Clock, timer: &dyn Timer, scheduled_time: Timestamp, delay: Duration) {
    let mut delay = delay;
    loop {
        timer.after_delay(delay).await;
        let now = clock.now();
        if now >= scheduled_time {
            return;
        }
        delay = delay_until(now, scheduled_time);
        debug!(
            remaining_ms = delay.as_millis() as u64,
            "timer fired before clock reached alarm time"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_core::timestamp_from_nanos;
    use chime_test_utils::{MockClock, ScriptedNamespace, Step};
    use chrono::TimeDelta;
    use tracing_test::traced_test;

    const NS: &str = "tenant-a";

    fn zero_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        }
    }

    async fn open(clock: Arc<MockClock>, script: &ScriptedNamespace) -> (AlarmScheduler, Database) {
        let db = Database::open_in_memory().await.unwrap();
        let scheduler = AlarmScheduler::builder(db.clone())
            .clock(clock)
            .policy(zero_jitter())
            .rng_seed(7)
            .namespace(NS, script.resolver())
            .open()
            .await
            .unwrap();
        (scheduler, db)
    }

    #[test]
    fn delay_until_past_is_zero() {
        let now = timestamp_from_nanos(10_000_000_000);
        assert_eq!(delay_until(now, now - TimeDelta::seconds(5)), Duration::ZERO);
        assert_eq!(
            delay_until(now, now + TimeDelta::milliseconds(1500)),
            Duration::from_millis(1500)
        );
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn retry_limit_drops_alarm_with_warning() {
        let clock = Arc::new(MockClock::at_unix_seconds(1_000));
        let script = ScriptedNamespace::new(clock.clone());
        script.push_repeated(Step::Fail { counts: true }, 20).await;
        let (scheduler, db) = open(clock.clone(), &script).await;
        let actor = ActorKey::new(NS, "a");

        scheduler.set_alarm(&actor, clock.now()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(scheduler.get_alarm(&actor).await, None);
        assert_eq!(queries::alarms::get_alarm(&db, &actor).await.unwrap(), None);
        // First attempt plus one per allowed retry.
        assert_eq!(script.invocations().await.len(), 7);
        assert!(logs_contain("alarm retry limit reached"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn unregistered_namespace_keeps_row() {
        let clock = Arc::new(MockClock::at_unix_seconds(1_000));
        let script = ScriptedNamespace::new(clock.clone());
        let (scheduler, db) = open(clock.clone(), &script).await;
        let actor = ActorKey::new("unknown-namespace", "a");
        let when = clock.now() + TimeDelta::seconds(1);

        scheduler.set_alarm(&actor, when).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(scheduler.get_alarm(&actor).await, None);
        assert_eq!(
            queries::alarms::get_alarm(&db, &actor).await.unwrap(),
            Some(when)
        );
        assert!(script.invocations().await.is_empty());
        assert!(logs_contain("cannot deliver alarm"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_keeps_rows_and_rejects_writes() {
        let clock = Arc::new(MockClock::at_unix_seconds(1_000));
        let script = ScriptedNamespace::new(clock.clone());
        let (scheduler, db) = open(clock.clone(), &script).await;
        let actor = ActorKey::new(NS, "a");
        let when = clock.now() + TimeDelta::seconds(60);

        scheduler.set_alarm(&actor, when).await.unwrap();
        scheduler.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert!(script.invocations().await.is_empty());
        assert_eq!(
            queries::alarms::get_alarm(&db, &actor).await.unwrap(),
            Some(when)
        );
        assert!(matches!(
            scheduler.set_alarm(&actor, when).await,
            Err(ChimeError::Internal(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn handler_finishing_after_shutdown_clears_row() {
        let clock = Arc::new(MockClock::at_unix_seconds(1_000));
        let script = ScriptedNamespace::holding(clock.clone(), Duration::from_secs(5));
        let (scheduler, db) = open(clock.clone(), &script).await;
        let actor = ActorKey::new(NS, "a");

        scheduler.set_alarm(&actor, clock.now()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(script.invocations().await.len(), 1);
        assert_eq!(queries::alarms::get_alarm(&db, &actor).await.unwrap(), None);
        assert_eq!(scheduler.alarm_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_after_shutdown_keeps_row_without_retrying() {
        let clock = Arc::new(MockClock::at_unix_seconds(1_000));
        let script = ScriptedNamespace::holding(clock.clone(), Duration::from_secs(5));
        script.push(Step::Fail { counts: true }).await;
        let (scheduler, db) = open(clock.clone(), &script).await;
        let actor = ActorKey::new(NS, "a");
        let when = clock.now();

        scheduler.set_alarm(&actor, when).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        scheduler.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(script.invocations().await.len(), 1);
        assert_eq!(
            queries::alarms::get_alarm(&db, &actor).await.unwrap(),
            Some(when)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn infrastructure_errors_do_not_count() {
        let clock = Arc::new(MockClock::at_unix_seconds(1_000));
        let script = ScriptedNamespace::new(clock.clone());
        script.push_repeated(Step::Error, 3).await;
        let (scheduler, _db) = open(clock.clone(), &script).await;
        let actor = ActorKey::new(NS, "a");

        scheduler.set_alarm(&actor, clock.now()).await.unwrap();
        // Attempts at 0s, 2s and 6s; the fourth is due at 14s.
        tokio::time::sleep(Duration::from_millis(13_500)).await;

        let state = scheduler.retry_state(&actor).await.unwrap();
        assert_eq!(state.retry, 3);
        assert_eq!(state.counted_retry, 0);
        let retry_counts: Vec<u32> = script
            .invocations()
            .await
            .iter()
            .map(|i| i.retry_count)
            .collect();
        assert_eq!(retry_counts, vec![0, 0, 0]);
    }
}
