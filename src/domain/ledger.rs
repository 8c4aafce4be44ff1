//! Step ledger: status and timing of every stage in a run.
//!
//! Steps live in an arena (`Vec<PipelineStep>`) with an id index. The ledger
//! performs no I/O and never fails; invalid transitions are logged and ignored.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::step::{PipelineStep, Stage, StepStatus};

/// Ordered record of pipeline steps for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepLedger {
    steps: Vec<PipelineStep>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl StepLedger {
    /// Ledger with the given (id, title) steps, all pending
    pub fn new<I, S, T>(steps: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut ledger = Self::default();
        for (id, title) in steps {
            let step = PipelineStep::new(id, title);
            if ledger.index.contains_key(&step.id) {
                warn!(step = %step.id, "Duplicate step id ignored");
                continue;
            }
            ledger.index.insert(step.id.clone(), ledger.steps.len());
            ledger.steps.push(step);
        }
        ledger
    }

    /// Ledger with every pipeline stage
    pub fn for_pipeline() -> Self {
        Self::new(Stage::ALL.iter().map(|s| (s.id(), s.title())))
    }

    fn step_mut(&mut self, step_id: &str) -> Option<&mut PipelineStep> {
        // The index is skipped by serde; rebuild after deserialization
        if self.index.len() != self.steps.len() {
            self.index = self
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| (s.id.clone(), i))
                .collect();
        }

        match self.index.get(step_id) {
            Some(&idx) => self.steps.get_mut(idx),
            None => {
                warn!(step = %step_id, "Unknown step id");
                None
            }
        }
    }

    /// Pending -> Running
    pub fn begin(&mut self, step_id: &str) {
        let Some(step) = self.step_mut(step_id) else {
            return;
        };

        if step.status != StepStatus::Pending {
            warn!(step = %step_id, status = ?step.status, "Cannot begin a step that is not pending");
            return;
        }

        step.status = StepStatus::Running;
        step.started_at = Some(Utc::now());
        step.progress = Some(0);
        debug!(step = %step_id, "Step started");
    }

    /// Report progress on a running step; decreases are ignored
    pub fn progress(&mut self, step_id: &str, pct: u8, detail: Option<&str>) {
        let Some(step) = self.step_mut(step_id) else {
            return;
        };

        if step.status != StepStatus::Running {
            warn!(step = %step_id, status = ?step.status, "Progress on a step that is not running");
            return;
        }

        let pct = pct.min(100);
        if step.progress.map_or(true, |current| pct >= current) {
            step.progress = Some(pct);
        }
        if let Some(detail) = detail {
            step.detail = Some(detail.to_string());
        }
    }

    /// -> Completed
    pub fn complete(&mut self, step_id: &str, detail: Option<&str>) {
        let Some(step) = self.step_mut(step_id) else {
            return;
        };

        if step.status.is_terminal() {
            warn!(step = %step_id, status = ?step.status, "Step already finished");
            return;
        }

        let now = Utc::now();
        step.status = StepStatus::Completed;
        step.started_at.get_or_insert(now);
        step.finished_at = Some(now);
        step.progress = Some(100);
        if let Some(detail) = detail {
            step.detail = Some(detail.to_string());
        }
        debug!(step = %step_id, duration_ms = ?step.duration_ms(), "Step completed");
    }

    /// -> Failed
    pub fn fail(&mut self, step_id: &str, error: &str) {
        let Some(step) = self.step_mut(step_id) else {
            return;
        };

        if step.status.is_terminal() {
            warn!(step = %step_id, status = ?step.status, "Step already finished");
            return;
        }

        let now = Utc::now();
        step.status = StepStatus::Failed;
        step.started_at.get_or_insert(now);
        step.finished_at = Some(now);
        step.error_message = Some(error.to_string());
        debug!(step = %step_id, error, "Step failed");
    }

    /// Ordered copy of every step
    pub fn snapshot(&self) -> Vec<PipelineStep> {
        self.steps.clone()
    }

    /// Look up a step by id
    pub fn get(&self, step_id: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// Status of a step, if it exists
    pub fn status(&self, step_id: &str) -> Option<StepStatus> {
        self.get(step_id).map(|s| s.status)
    }

    /// The step currently running, if any
    pub fn active(&self) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Running)
    }
}
