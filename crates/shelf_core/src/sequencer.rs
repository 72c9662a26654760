//! crates/shelf_core/src/sequencer.rs
//!
//! The fallback sequencer: tries an ordered list of strategies until one
//! succeeds, the list is exhausted, or the caller cancels.
//!
//! Strategies run strictly one after another. A failure is logged and the next
//! strategy starts immediately, with no delay. Every attempt can be bounded by a
//! timeout, and the cancellation token is raced against the in-flight attempt so
//! an abandoned sequence stops doing network work straight away.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ports::{ErrorKind, PortError, PortResult, Strategy};

//=========================================================================================
// Observable State
//=========================================================================================

/// Where a sequence currently is. Published on a `watch` channel at every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Attempting { index: usize, strategy: String },
    Resolved { strategy: String },
    /// A strategy succeeded but another sequence had already filled the shared slot.
    Superseded { strategy: String },
    Exhausted { kind: ErrorKind },
    Cancelled,
}

impl SequencerState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SequencerState::Idle | SequencerState::Attempting { .. })
    }
}

/// A strategy attempt that failed, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct FailedAttempt {
    pub strategy: String,
    pub error: PortError,
    pub elapsed: Duration,
}

//=========================================================================================
// Commit Slot
//=========================================================================================

/// A value committed by a successful strategy, with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    pub strategy: String,
}

/// A write-once cell for the result of one or more sequences.
///
/// The first commit wins. Later commits are handed back to the caller and
/// counted, so racing sequences that share a slot produce exactly one update.
#[derive(Debug)]
pub struct ResolutionSlot<T> {
    cell: OnceLock<Committed<T>>,
    rejected: AtomicUsize,
}

impl<T> Default for ResolutionSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResolutionSlot<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            rejected: AtomicUsize::new(0),
        }
    }

    /// Commits `value` unless something already has. Returns the value on rejection.
    pub fn commit(&self, value: T, strategy: &str) -> Result<(), T> {
        self.cell
            .set(Committed {
                value,
                strategy: strategy.to_string(),
            })
            .map_err(|rejected| {
                self.rejected.fetch_add(1, Ordering::SeqCst);
                rejected.value
            })
    }

    pub fn get(&self) -> Option<&Committed<T>> {
        self.cell.get()
    }

    pub fn is_committed(&self) -> bool {
        self.cell.get().is_some()
    }

    /// How many commits arrived after the first one.
    pub fn rejected_commits(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    pub fn into_inner(self) -> Option<Committed<T>> {
        self.cell.into_inner()
    }
}

//=========================================================================================
// Terminal Results
//=========================================================================================

/// How a sequence that wrote into a shared [`ResolutionSlot`] ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// This sequence committed its value.
    Resolved { strategy: String },
    /// A strategy succeeded but the slot already held another sequence's value.
    Superseded { strategy: String },
    Exhausted { last_error: PortError },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: Outcome,
    pub failures: Vec<FailedAttempt>,
}

/// The terminal state of a sequence run with [`FallbackSequencer::run`].
#[derive(Debug)]
pub enum Resolution<T> {
    Resolved {
        value: T,
        strategy: String,
        failures: Vec<FailedAttempt>,
    },
    Exhausted {
        last_error: PortError,
        failures: Vec<FailedAttempt>,
    },
    Cancelled {
        failures: Vec<FailedAttempt>,
    },
}

impl<T> Resolution<T> {
    pub fn failures(&self) -> &[FailedAttempt] {
        match self {
            Resolution::Resolved { failures, .. }
            | Resolution::Exhausted { failures, .. }
            | Resolution::Cancelled { failures } => failures,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    /// Collapses the resolution into a plain result, dropping the ledger.
    pub fn into_result(self) -> PortResult<T> {
        match self {
            Resolution::Resolved { value, .. } => Ok(value),
            Resolution::Exhausted { last_error, .. } => Err(last_error),
            Resolution::Cancelled { .. } => Err(PortError::Cancelled),
        }
    }
}

//=========================================================================================
// The Sequencer
//=========================================================================================

/// Runs a fixed, ordered list of strategies for resources of type `T`.
///
/// A sequencer is cheap to build; callers build one per sequence because the
/// strategies usually capture per-request inputs.
pub struct FallbackSequencer<T> {
    label: String,
    strategies: Vec<Box<dyn Strategy<T>>>,
    attempt_timeout: Option<Duration>,
    halt_on: Vec<ErrorKind>,
    state: watch::Sender<SequencerState>,
}

impl<T: Send + 'static> FallbackSequencer<T> {
    pub fn new(label: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SequencerState::Idle);
        Self {
            label: label.into(),
            strategies: Vec::new(),
            attempt_timeout: None,
            halt_on: Vec::new(),
            state,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Strategy<T> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn with_boxed(mut self, strategy: Box<dyn Strategy<T>>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Bounds every attempt. A strategy that overruns fails with `PortError::Timeout`.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Stops the sequence at the first failure of this kind instead of advancing.
    pub fn halt_on(mut self, kind: ErrorKind) -> Self {
        if !self.halt_on.contains(&kind) {
            self.halt_on.push(kind);
        }
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<SequencerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SequencerState {
        self.state.borrow().clone()
    }

    /// Runs the sequence and returns its terminal state with the resolved value.
    pub async fn run(&self, cancel: &CancellationToken) -> Resolution<T> {
        let slot = ResolutionSlot::new();
        let report = self.run_into(&slot, cancel).await;
        match report.outcome {
            Outcome::Resolved { strategy } => match slot.into_inner() {
                Some(committed) => Resolution::Resolved {
                    value: committed.value,
                    strategy,
                    failures: report.failures,
                },
                None => Resolution::Exhausted {
                    last_error: PortError::Unexpected(format!(
                        "strategy '{strategy}' resolved without committing"
                    )),
                    failures: report.failures,
                },
            },
            // A private slot cannot be filled by anyone else.
            Outcome::Superseded { strategy } => Resolution::Exhausted {
                last_error: PortError::Unexpected(format!(
                    "strategy '{strategy}' was superseded on a private slot"
                )),
                failures: report.failures,
            },
            Outcome::Exhausted { last_error } => Resolution::Exhausted {
                last_error,
                failures: report.failures,
            },
            Outcome::Cancelled => Resolution::Cancelled {
                failures: report.failures,
            },
        }
    }

    /// Runs the sequence and commits the first success into `slot`.
    ///
    /// Several sequences may share one slot; only the first success across all of
    /// them is committed.
    pub async fn run_into(&self, slot: &ResolutionSlot<T>, cancel: &CancellationToken) -> Report {
        let mut failures: Vec<FailedAttempt> = Vec::new();
        self.transition(SequencerState::Idle);

        if self.strategies.is_empty() {
            warn!(sequence = %self.label, "No strategies configured.");
            let last_error = PortError::Unexpected("no strategies configured".to_string());
            self.transition(SequencerState::Exhausted {
                kind: last_error.kind(),
            });
            return Report {
                outcome: Outcome::Exhausted { last_error },
                failures,
            };
        }

        for (index, strategy) in self.strategies.iter().enumerate() {
            let name = strategy.name().to_string();

            if cancel.is_cancelled() {
                info!(sequence = %self.label, next = %name, "Sequence cancelled before attempt.");
                self.transition(SequencerState::Cancelled);
                return Report {
                    outcome: Outcome::Cancelled,
                    failures,
                };
            }

            info!(
                sequence = %self.label,
                strategy = %name,
                attempt = index + 1,
                of = self.strategies.len(),
                "Attempting strategy."
            );
            self.transition(SequencerState::Attempting {
                index,
                strategy: name.clone(),
            });

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = self.bounded(strategy.as_ref()) => Some(result),
            };
            let elapsed = started.elapsed();

            match result {
                None => {
                    info!(sequence = %self.label, strategy = %name, "Sequence cancelled mid-attempt.");
                    self.transition(SequencerState::Cancelled);
                    return Report {
                        outcome: Outcome::Cancelled,
                        failures,
                    };
                }
                Some(Ok(value)) => {
                    return match slot.commit(value, &name) {
                        Ok(()) => {
                            info!(
                                sequence = %self.label,
                                strategy = %name,
                                failed_attempts = failures.len(),
                                ?elapsed,
                                "Resolved."
                            );
                            self.transition(SequencerState::Resolved {
                                strategy: name.clone(),
                            });
                            Report {
                                outcome: Outcome::Resolved { strategy: name },
                                failures,
                            }
                        }
                        Err(_discarded) => {
                            warn!(
                                sequence = %self.label,
                                strategy = %name,
                                "Resolution already committed elsewhere; discarding result."
                            );
                            self.transition(SequencerState::Superseded {
                                strategy: name.clone(),
                            });
                            Report {
                                outcome: Outcome::Superseded { strategy: name },
                                failures,
                            }
                        }
                    };
                }
                Some(Err(error)) => {
                    let kind = error.kind();
                    warn!(
                        sequence = %self.label,
                        strategy = %name,
                        %kind,
                        error = %error,
                        ?elapsed,
                        "Strategy failed."
                    );
                    failures.push(FailedAttempt {
                        strategy: name,
                        error,
                        elapsed,
                    });
                    if self.halt_on.contains(&kind) {
                        warn!(sequence = %self.label, %kind, "Failure kind halts the sequence.");
                        break;
                    }
                }
            }
        }

        let last_error = failures
            .last()
            .map(|attempt| attempt.error.clone())
            .unwrap_or_else(|| PortError::Unexpected("no attempt recorded".to_string()));
        warn!(
            sequence = %self.label,
            attempts = failures.len(),
            kind = %last_error.kind(),
            "All strategies exhausted."
        );
        self.transition(SequencerState::Exhausted {
            kind: last_error.kind(),
        });
        Report {
            outcome: Outcome::Exhausted { last_error },
            failures,
        }
    }

    async fn bounded(&self, strategy: &dyn Strategy<T>) -> PortResult<T> {
        match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, strategy.attempt()).await {
                Ok(result) => result,
                Err(_) => Err(PortError::Timeout(
                    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                )),
            },
            None => strategy.attempt().await,
        }
    }

    fn transition(&self, next: SequencerState) {
        debug!(sequence = %self.label, state = ?next, "Sequencer transition.");
        self.state.send_replace(next);
    }
}

//=========================================================================================
// Closure-backed Strategy
//=========================================================================================

type AttemptFn<T> = dyn Fn() -> BoxFuture<'static, PortResult<T>> + Send + Sync;

/// A strategy built from a name and a closure returning a boxed future.
pub struct FnStrategy<T> {
    name: String,
    attempt: Arc<AttemptFn<T>>,
}

impl<T> FnStrategy<T> {
    pub fn new<F>(name: impl Into<String>, attempt: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, PortResult<T>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            attempt: Arc::new(attempt),
        }
    }
}

#[async_trait::async_trait]
impl<T: Send + 'static> Strategy<T> for FnStrategy<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self) -> PortResult<T> {
        (self.attempt)().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Records the order in which strategies were invoked.
    #[derive(Clone, Default)]
    struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn failing(log: &CallLog, name: &'static str, error: PortError) -> FnStrategy<String> {
        let log = log.clone();
        FnStrategy::new(name, move || {
            log.0.lock().unwrap().push(name.to_string());
            let error = error.clone();
            async move { Err(error) }.boxed()
        })
    }

    fn succeeding(log: &CallLog, name: &'static str) -> FnStrategy<String> {
        let log = log.clone();
        FnStrategy::new(name, move || {
            log.0.lock().unwrap().push(name.to_string());
            async move { Ok(format!("from-{name}")) }.boxed()
        })
    }

    fn hanging(name: &'static str) -> FnStrategy<String> {
        FnStrategy::new(name, || {
            async {
                futures::future::pending::<()>().await;
                Ok("never".to_string())
            }
            .boxed()
        })
    }

    #[tokio::test]
    async fn resolves_via_first_success_and_stops() {
        let log = CallLog::default();
        let sequencer = FallbackSequencer::new("determinism")
            .with_strategy(failing(&log, "s1", PortError::Network("down".into())))
            .with_strategy(failing(&log, "s2", PortError::Parse("garbage".into())))
            .with_strategy(succeeding(&log, "s3"))
            .with_strategy(succeeding(&log, "s4"));

        for _ in 0..3 {
            let resolution = sequencer.run(&CancellationToken::new()).await;
            match resolution {
                Resolution::Resolved {
                    value,
                    strategy,
                    failures,
                } => {
                    assert_eq!(value, "from-s3");
                    assert_eq!(strategy, "s3");
                    assert_eq!(failures.len(), 2);
                }
                other => panic!("expected resolution, got {other:?}"),
            }
        }
        assert_eq!(
            log.calls(),
            vec!["s1", "s2", "s3", "s1", "s2", "s3", "s1", "s2", "s3"]
        );
        assert_eq!(
            sequencer.state(),
            SequencerState::Resolved {
                strategy: "s3".to_string()
            }
        );
    }

    #[tokio::test]
    async fn exhaustion_reports_the_last_failure() {
        let log = CallLog::default();
        let sequencer = FallbackSequencer::new("exhaustion")
            .with_strategy(failing(&log, "s1", PortError::Network("reset".into())))
            .with_strategy(failing(
                &log,
                "s2",
                PortError::Unauthorized("HTTP 401".into()),
            ));

        let resolution = sequencer.run(&CancellationToken::new()).await;
        let failures: Vec<_> = resolution
            .failures()
            .iter()
            .map(|f| (f.strategy.clone(), f.error.kind()))
            .collect();
        assert_eq!(
            failures,
            vec![
                ("s1".to_string(), ErrorKind::Network),
                ("s2".to_string(), ErrorKind::Auth)
            ]
        );
        assert_eq!(
            resolution.into_result().unwrap_err(),
            PortError::Unauthorized("HTTP 401".into())
        );
        assert_eq!(
            sequencer.state(),
            SequencerState::Exhausted {
                kind: ErrorKind::Auth
            }
        );
    }

    #[tokio::test]
    async fn empty_sequence_is_exhausted() {
        let sequencer: FallbackSequencer<String> = FallbackSequencer::new("empty");
        let error = sequencer
            .run(&CancellationToken::new())
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unexpected);
    }

    #[tokio::test]
    async fn cancelling_between_attempts_prevents_the_next_start() {
        let token = CancellationToken::new();
        let second_started = Arc::new(AtomicUsize::new(0));

        let cancel_on_failure = {
            let token = token.clone();
            FnStrategy::new("s1", move || {
                let token = token.clone();
                async move {
                    token.cancel();
                    Err(PortError::Network("unmounted".into()))
                }
                .boxed()
            })
        };
        let counted = {
            let second_started = second_started.clone();
            FnStrategy::new("s2", move || {
                second_started.fetch_add(1, Ordering::SeqCst);
                async { Ok("late".to_string()) }.boxed()
            })
        };

        let sequencer = FallbackSequencer::new("cancel")
            .with_strategy(cancel_on_failure)
            .with_strategy(counted);
        let resolution = sequencer.run(&token).await;

        assert!(matches!(resolution, Resolution::Cancelled { ref failures } if failures.len() == 1));
        assert_eq!(second_started.load(Ordering::SeqCst), 0);
        assert_eq!(sequencer.state(), SequencerState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_an_in_flight_attempt() {
        let token = CancellationToken::new();
        let sequencer = FallbackSequencer::new("abort").with_strategy(hanging("stuck"));

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };
        let resolution = sequencer.run(&token).await;
        canceller.await.unwrap();

        assert!(matches!(resolution, Resolution::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempts_time_out_and_advance() {
        let log = CallLog::default();
        let sequencer = FallbackSequencer::new("timeout")
            .with_strategy(hanging("stuck"))
            .with_strategy(succeeding(&log, "fallback"))
            .with_attempt_timeout(Duration::from_secs(5));

        let resolution = sequencer.run(&CancellationToken::new()).await;
        let failures = resolution.failures().to_vec();
        assert_eq!(resolution.into_result().unwrap(), "from-fallback");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error, PortError::Timeout(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_strategies_add_no_backoff() {
        let per_attempt = Duration::from_millis(200);
        let sequencer = (0..5).fold(
            FallbackSequencer::<String>::new("no-backoff").with_attempt_timeout(per_attempt),
            |sequencer, i| {
                sequencer.with_strategy(FnStrategy::new(format!("slow-{i}"), || {
                    async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(PortError::Network("refused".into()))
                    }
                    .boxed()
                }))
            },
        );

        let started = tokio::time::Instant::now();
        let resolution = sequencer.run(&CancellationToken::new()).await;
        let elapsed = started.elapsed();

        assert_eq!(resolution.failures().len(), 5);
        assert!(elapsed >= Duration::from_millis(250), "took {elapsed:?}");
        assert!(elapsed <= per_attempt * 5, "took {elapsed:?}");
    }

    #[tokio::test]
    async fn halting_kinds_stop_the_chain() {
        let log = CallLog::default();
        let sequencer = FallbackSequencer::new("halt")
            .with_strategy(failing(&log, "s1", PortError::Unauthorized("401".into())))
            .with_strategy(succeeding(&log, "s2"))
            .halt_on(ErrorKind::Auth);

        let error = sequencer
            .run(&CancellationToken::new())
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Auth);
        assert_eq!(log.calls(), vec!["s1"]);
    }

    #[tokio::test]
    async fn only_the_first_success_is_committed() {
        let log = CallLog::default();
        let sequencer = FallbackSequencer::new("double-success")
            .with_strategy(succeeding(&log, "first"))
            .with_strategy(succeeding(&log, "second"));

        let slot = ResolutionSlot::new();
        let report = sequencer.run_into(&slot, &CancellationToken::new()).await;

        assert!(matches!(report.outcome, Outcome::Resolved { ref strategy } if strategy == "first"));
        assert_eq!(log.calls(), vec!["first"]);
        assert_eq!(
            slot.get(),
            Some(&Committed {
                value: "from-first".to_string(),
                strategy: "first".to_string()
            })
        );
        assert_eq!(slot.commit("from-second".to_string(), "second"), Err("from-second".to_string()));
        assert_eq!(slot.rejected_commits(), 1);
    }

    #[tokio::test]
    async fn racing_sequences_share_one_commit() {
        let log = CallLog::default();
        let left = FallbackSequencer::new("left").with_strategy(succeeding(&log, "left"));
        let right = FallbackSequencer::new("right").with_strategy(succeeding(&log, "right"));
        let slot = ResolutionSlot::new();
        let token = CancellationToken::new();

        let (a, b) = tokio::join!(left.run_into(&slot, &token), right.run_into(&slot, &token));

        let resolved = [&a.outcome, &b.outcome]
            .iter()
            .filter(|outcome| matches!(outcome, Outcome::Resolved { .. }))
            .count();
        let superseded = [&a.outcome, &b.outcome]
            .iter()
            .filter(|outcome| matches!(outcome, Outcome::Superseded { .. }))
            .count();
        assert_eq!((resolved, superseded), (1, 1));
        assert_eq!(slot.rejected_commits(), 1);
        assert!(slot.is_committed());

        let states = [left.state(), right.state()];
        let published_resolved = states
            .iter()
            .filter(|state| matches!(state, SequencerState::Resolved { .. }))
            .count();
        let published_superseded = states
            .iter()
            .filter(|state| matches!(state, SequencerState::Superseded { .. }))
            .count();
        assert_eq!((published_resolved, published_superseded), (1, 1));
        assert!(states.iter().all(SequencerState::is_terminal));
    }

    #[tokio::test]
    async fn a_late_success_on_a_filled_slot_is_not_published_as_resolved() {
        let log = CallLog::default();
        let slot = ResolutionSlot::new();
        assert!(slot.commit("earlier".to_string(), "other").is_ok());

        let sequencer = FallbackSequencer::new("late").with_strategy(succeeding(&log, "s"));
        let receiver = sequencer.subscribe();
        let report = sequencer.run_into(&slot, &CancellationToken::new()).await;

        assert!(matches!(report.outcome, Outcome::Superseded { .. }));
        assert_eq!(
            *receiver.borrow(),
            SequencerState::Superseded {
                strategy: "s".to_string()
            }
        );
        assert_eq!(slot.get().map(|c| c.strategy.as_str()), Some("other"));
    }

    #[tokio::test]
    async fn each_run_starts_from_idle() {
        let log = CallLog::default();
        let sequencer = FallbackSequencer::new("reused")
            .with_strategy(failing(&log, "s1", PortError::Network("x".into())));

        sequencer.run(&CancellationToken::new()).await;
        assert_eq!(
            sequencer.state(),
            SequencerState::Exhausted {
                kind: ErrorKind::Network
            }
        );

        // Cancelled up front: the run goes Idle -> Cancelled without attempting.
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        let mut receiver = sequencer.subscribe();
        receiver.borrow_and_update();
        sequencer.run(&cancelled).await;
        assert!(receiver.has_changed().unwrap());
        assert_eq!(sequencer.state(), SequencerState::Cancelled);
        assert_eq!(log.calls().len(), 1);
    }

    #[tokio::test]
    async fn transitions_are_published() {
        let log = CallLog::default();
        let sequencer = FallbackSequencer::new("watch")
            .with_strategy(failing(&log, "s1", PortError::Network("x".into())))
            .with_strategy(succeeding(&log, "s2"));
        let receiver = sequencer.subscribe();
        assert_eq!(*receiver.borrow(), SequencerState::Idle);

        sequencer.run(&CancellationToken::new()).await;

        let last = receiver.borrow().clone();
        assert!(last.is_terminal());
        assert_eq!(
            last,
            SequencerState::Resolved {
                strategy: "s2".to_string()
            }
        );
    }
}
