// src/workflow/memory.rs

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        leave::LeaveStatus,
        workflow::{ExternalRecord, Step, Submission, SubmitReceipt, advance},
    },
    workflow::WorkflowAdapter,
};

#[derive(Default)]
struct State {
    records: HashMap<Uuid, ExternalRecord>,
    scripts: HashMap<Uuid, VecDeque<Step>>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    sequence: AtomicU64,
    submissions: AtomicUsize,
    failing_submissions: AtomicUsize,
    failing_polls: AtomicUsize,
}

/// Deterministic stand-in for the external system. Each poll consumes the
/// next scripted step of the request, or the default step when none is left.
#[derive(Clone)]
pub struct InMemoryWorkflow {
    inner: Arc<Inner>,
    default_step: Step,
    latency: Option<Duration>,
}

impl Default for InMemoryWorkflow {
    fn default() -> Self {
        Self {
            inner: Arc::default(),
            default_step: Step::Hold,
            latency: None,
        }
    }
}

impl InMemoryWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_step(mut self, step: Step) -> Self {
        self.default_step = step;
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queues the outcomes of the next polls of `leave_request_id`.
    pub async fn script(&self, leave_request_id: Uuid, steps: impl IntoIterator<Item = Step>) {
        let mut state = self.inner.state.lock().await;
        state
            .scripts
            .entry(leave_request_id)
            .or_default()
            .extend(steps);
    }

    pub fn fail_next_submissions(&self, count: usize) {
        self.inner.failing_submissions.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_polls(&self, count: usize) {
        self.inner.failing_polls.store(count, Ordering::SeqCst);
    }

    pub async fn record(&self, leave_request_id: Uuid) -> Option<ExternalRecord> {
        self.inner.state.lock().await.records.get(&leave_request_id).cloned()
    }

    pub async fn record_count(&self) -> usize {
        self.inner.state.lock().await.records.len()
    }

    /// Submissions that reached the system, failed ones excluded.
    pub fn submission_count(&self) -> usize {
        self.inner.submissions.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_external_id(&self) -> String {
        let n = self.inner.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("EXT-{}-{:05}", Utc::now().year(), n)
    }
}

/// Consumes one pending failure, if any.
fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl WorkflowAdapter for InMemoryWorkflow {
    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, AppError> {
        self.simulate_latency().await;

        if take_failure(&self.inner.failing_submissions) {
            return Err(AppError::adapter("submission rejected by workflow system"));
        }
        self.inner.submissions.fetch_add(1, Ordering::SeqCst);

        let target = submission.stage.entry_status();
        let mut state = self.inner.state.lock().await;

        if let Some(record) = state.records.get_mut(&submission.leave_request_id) {
            // Known request: move forward only, never out of a terminal status
            if !record.status.is_terminal() && target.progress_rank() > record.status.progress_rank() {
                record.status = target;
            }
            return Ok(SubmitReceipt {
                external_id: record.external_id.clone(),
                message: format!("Leave request already registered, stage {}", submission.stage.as_str()),
            });
        }

        let external_id = self.next_external_id();
        state.records.insert(
            submission.leave_request_id,
            ExternalRecord {
                leave_request_id: submission.leave_request_id,
                external_id: external_id.clone(),
                status: target,
            },
        );

        Ok(SubmitReceipt {
            external_id,
            message: "Leave request submitted for external validation".to_string(),
        })
    }

    async fn poll_status(&self, leave_request_id: Uuid) -> Result<LeaveStatus, AppError> {
        self.simulate_latency().await;

        if take_failure(&self.inner.failing_polls) {
            return Err(AppError::adapter("workflow system did not answer"));
        }

        let mut state = self.inner.state.lock().await;
        let step = state
            .scripts
            .get_mut(&leave_request_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.default_step);

        let record = state
            .records
            .get_mut(&leave_request_id)
            .ok_or_else(|| AppError::adapter(format!("no external record for {leave_request_id}")))?;

        record.status = advance(record.status, step);
        Ok(record.status)
    }
}
