use std::time::{Duration, Instant};

use chrono::{DateTime, SubsecRound, Utc};

use crate::config::capture_config::CaptureConfig;
use crate::core::errors::Result;
use crate::core::models::log_entry::LogEntry;
use crate::core::services::stop_signal::StopHandle;
use crate::core::traits::capture_log::CaptureLog;
use crate::core::traits::lifecycle::Supervised;
use crate::core::traits::source::CaptureSource;

/// Where the loop is in its cycle.
///
/// `Idle → Polling → Appending → Idle` on success, `Idle → Polling → Idle`
/// on a source failure, `Idle → Terminated` on stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Polling,
    Appending,
    Terminated,
}

/// What a single cycle produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Appended { records: usize },
    SourceFailed,
    PersistFailed,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub entries_appended: u64,
    pub records_captured: u64,
    pub source_failures: u64,
    pub persistence_failures: u64,
    pub last_capture: Option<DateTime<Utc>>,
}

impl RunSummary {
    fn record(&mut self, outcome: CycleOutcome, captured_at: DateTime<Utc>) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Appended { records } => {
                self.entries_appended += 1;
                self.records_captured += records as u64;
                self.last_capture = Some(captured_at);
            }
            CycleOutcome::SourceFailed => self.source_failures += 1,
            CycleOutcome::PersistFailed => self.persistence_failures += 1,
        }
    }
}

/// Drives periodic poll-then-append cycles against one log file.
///
/// Cycles never overlap. A cycle that overruns the interval is followed
/// immediately by the next one; missed ticks are not replayed. A stop
/// request is honoured only between cycles, so an append in progress
/// always completes.
///
/// Only one loop may write a given log file at a time. Two processes
/// pointed at the same path can interleave lines; that is a deployment
/// mistake and is not guarded by file locks.
pub struct CaptureLoop<S: CaptureSource, L: CaptureLog> {
    config: CaptureConfig,
    source: S,
    log: L,
    stop: StopHandle,
    state: LoopState,
    last_start: Option<DateTime<Utc>>,
}

impl<S: CaptureSource, L: CaptureLog> CaptureLoop<S, L> {
    pub fn new(config: CaptureConfig, source: S, log: L) -> Self {
        Self::with_stop_handle(config, source, log, StopHandle::new())
    }

    pub fn with_stop_handle(config: CaptureConfig, source: S, log: L, stop: StopHandle) -> Self {
        Self {
            config,
            source,
            log,
            stop,
            state: LoopState::Idle,
            last_start: None,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Run cycles until a stop is requested or `max_cycles` is reached.
    pub fn run(&mut self) -> RunSummary {
        tracing::info!(
            source = self.source.name(),
            log_path = %self.config.log_path.display(),
            interval_secs = self.config.interval.as_secs_f64(),
            top_n = self.config.top_n,
            "capture loop started"
        );

        let mut summary = RunSummary::default();

        while !self.stop.is_stopped() {
            let tick = Instant::now();
            let captured_at = self.next_cycle_start();
            let outcome = self.run_cycle(captured_at);
            summary.record(outcome, captured_at);

            if let Some(max) = self.config.max_cycles
                && summary.cycles >= max
            {
                tracing::debug!(cycles = summary.cycles, "cycle limit reached");
                break;
            }

            let remaining = remaining_until(tick, self.config.interval);
            if remaining.is_zero() {
                tracing::debug!(
                    elapsed_ms = tick.elapsed().as_millis() as u64,
                    "cycle overran interval, starting next cycle now"
                );
                continue;
            }
            if self.stop.wait_timeout(remaining) {
                break;
            }
        }

        self.transition(LoopState::Terminated);
        tracing::info!(
            cycles = summary.cycles,
            entries = summary.entries_appended,
            source_failures = summary.source_failures,
            persistence_failures = summary.persistence_failures,
            "capture loop stopped"
        );
        summary
    }

    /// One poll-then-append cycle. Never returns an error: failures are
    /// reported and the cycle is skipped.
    pub fn run_cycle(&mut self, captured_at: DateTime<Utc>) -> CycleOutcome {
        self.transition(LoopState::Polling);

        let mut records = match self.source.fetch_top_queries(self.config.top_n) {
            Ok(records) => records,
            Err(e) if e.is_source_unavailable() => {
                tracing::warn!(
                    source = self.source.name(),
                    error = %e,
                    "capture failed, skipping this cycle"
                );
                self.transition(LoopState::Idle);
                return CycleOutcome::SourceFailed;
            }
            Err(e) => {
                tracing::error!(
                    source = self.source.name(),
                    error = %e,
                    "unexpected source error, skipping this cycle"
                );
                self.transition(LoopState::Idle);
                return CycleOutcome::SourceFailed;
            }
        };

        if records.len() > self.config.top_n {
            tracing::debug!(
                returned = records.len(),
                top_n = self.config.top_n,
                "source returned more than top-n records, truncating"
            );
            records.truncate(self.config.top_n);
        }

        self.transition(LoopState::Appending);
        let entry = LogEntry::new(captured_at, records);
        let outcome = match self.log.append(&entry) {
            Ok(()) => {
                tracing::info!(
                    records = entry.record_count,
                    captured_at = %entry.captured_at,
                    "captured"
                );
                CycleOutcome::Appended {
                    records: entry.record_count,
                }
            }
            Err(e) => {
                tracing::error!(
                    log_path = %self.log.path().display(),
                    records = entry.record_count,
                    error = %e,
                    "capture NOT persisted"
                );
                CycleOutcome::PersistFailed
            }
        };
        self.transition(LoopState::Idle);
        outcome
    }

    /// Wall-clock start of the next cycle, forced strictly past the
    /// previous one so entries stay ordered if the clock steps back.
    fn next_cycle_start(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now().trunc_subsecs(6);
        if let Some(prev) = self.last_start
            && now <= prev
        {
            now = prev + chrono::Duration::microseconds(1);
        }
        self.last_start = Some(now);
        now
    }

    fn transition(&mut self, next: LoopState) {
        tracing::debug!(from = ?self.state, to = ?next, "state");
        self.state = next;
    }
}

impl<S: CaptureSource, L: CaptureLog> Supervised for CaptureLoop<S, L> {
    type Summary = RunSummary;

    fn start(&mut self) -> Result<RunSummary> {
        Ok(self.run())
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}

/// Time left before the next tick. A tick beyond what `Instant` can
/// represent is treated as a full interval away.
fn remaining_until(tick: Instant, interval: Duration) -> Duration {
    match tick.checked_add(interval) {
        Some(next) => next.saturating_duration_since(Instant::now()),
        None => interval,
    }
}
