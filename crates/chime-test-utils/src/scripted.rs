// SPDX-FileCopyrightText: 2026 Chime Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted alarm handlers for deterministic scheduler tests.
//!
//! A [`ScriptedNamespace`] hands out one handler per actor. All of them pop
//! their outcomes from a shared FIFO script and append to a shared call log.
//! When the script is empty, handlers succeed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chime_core::{AlarmHandler, AlarmResult, ChimeError, Clock, EventOutcome, Timestamp};
use tokio::sync::Mutex;

/// The outcome of one scripted invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Succeed,
    /// Application failure that asks for a retry.
    Fail { counts: bool },
    /// Failure that asks not to be retried.
    GiveUp,
    /// The invocation itself errored.
    Error,
}

/// One recorded handler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub actor_id: String,
    pub scheduled_time: Timestamp,
    pub retry_count: u32,
    /// Clock reading when the handler started.
    pub observed_at: Timestamp,
    pub step: Step,
}

struct Shared {
    clock: Arc<dyn Clock>,
    hold: Duration,
    script: Mutex<VecDeque<Step>>,
    invocations: Mutex<Vec<Invocation>>,
    running: Mutex<HashMap<String, usize>>,
    max_concurrent: AtomicUsize,
}

/// Handlers for every actor in one namespace.
#[derive(Clone)]
pub struct ScriptedNamespace {
    shared: Arc<Shared>,
}

impl ScriptedNamespace {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::holding(clock, Duration::ZERO)
    }

    /// Handlers that stay busy for `hold` of tokio time before returning.
    pub fn holding(clock: Arc<dyn Clock>, hold: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                clock,
                hold,
                script: Mutex::new(VecDeque::new()),
                invocations: Mutex::new(Vec::new()),
                running: Mutex::new(HashMap::new()),
                max_concurrent: AtomicUsize::new(0),
            }),
        }
    }

    /// Append one step to the script.
    pub async fn push(&self, step: Step) {
        self.shared.script.lock().await.push_back(step);
    }

    pub async fn push_repeated(&self, step: Step, times: usize) {
        let mut script = self.shared.script.lock().await;
        script.extend(std::iter::repeat_n(step, times));
    }

    /// Resolver to register with the scheduler for this namespace.
    pub fn resolver(&self) -> impl Fn(&str) -> Arc<dyn AlarmHandler> + Send + Sync + 'static {
        let shared = Arc::clone(&self.shared);
        move |actor_id: &str| -> Arc<dyn AlarmHandler> {
            Arc::new(ScriptedActor {
                actor_id: actor_id.to_string(),
                shared: Arc::clone(&shared),
            })
        }
    }

    /// Every call so far, in start order.
    pub async fn invocations(&self) -> Vec<Invocation> {
        self.shared.invocations.lock().await.clone()
    }

    pub async fn invocations_for(&self, actor_id: &str) -> Vec<Invocation> {
        self.shared
            .invocations
            .lock()
            .await
            .iter()
            .filter(|i| i.actor_id == actor_id)
            .cloned()
            .collect()
    }

    /// Highest number of overlapping calls seen for any single actor.
    pub fn max_concurrent(&self) -> usize {
        self.shared.max_concurrent.load(Ordering::SeqCst)
    }
}

struct ScriptedActor {
    actor_id: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl AlarmHandler for ScriptedActor {
    async fn run_alarm(
        &self,
        scheduled_time: Timestamp,
        retry_count: u32,
    ) -> Result<AlarmResult, ChimeError> {
        {
            let mut running = self.shared.running.lock().await;
            let count = running.entry(self.actor_id.clone()).or_insert(0);
            *count += 1;
            self.shared.max_concurrent.fetch_max(*count, Ordering::SeqCst);
        }

        let step = self
            .shared
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Step::Succeed);
        self.shared.invocations.lock().await.push(Invocation {
            actor_id: self.actor_id.clone(),
            scheduled_time,
            retry_count,
            observed_at: self.shared.clock.now(),
            step,
        });

        if !self.shared.hold.is_zero() {
            tokio::time::sleep(self.shared.hold).await;
        }

        if let Some(count) = self.shared.running.lock().await.get_mut(&self.actor_id) {
            *count -= 1;
        }

        match step {
            Step::Succeed => Ok(AlarmResult::success()),
            Step::Fail { counts } => Ok(AlarmResult::failure(EventOutcome::Exception, counts)),
            Step::GiveUp => Ok(AlarmResult {
                outcome: EventOutcome::Exception,
                retry: false,
                retry_counts_against_limit: false,
            }),
            Step::Error => Err(ChimeError::invocation("scripted invocation error")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockClock;

    #[tokio::test(start_paused = true)]
    async fn replays_script_then_succeeds() {
        let clock = Arc::new(MockClock::at_unix_seconds(0));
        let ns = ScriptedNamespace::new(clock.clone());
        ns.push(Step::Fail { counts: true }).await;
        ns.push(Step::Error).await;

        let handler = (ns.resolver())("a");
        let when = clock.now();
        assert!(handler.run_alarm(when, 0).await.unwrap().should_retry());
        assert!(handler.run_alarm(when, 1).await.is_err());
        assert!(!handler.run_alarm(when, 1).await.unwrap().should_retry());

        let steps: Vec<Step> = ns.invocations_for("a").await.iter().map(|i| i.step).collect();
        assert_eq!(
            steps,
            vec![Step::Fail { counts: true }, Step::Error, Step::Succeed]
        );
        assert_eq!(ns.max_concurrent(), 1);
    }
}
