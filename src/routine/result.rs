//! Result tree produced by running a routine

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Step;
use crate::error::Error;
use crate::request::RequestResult;
use crate::script::ScriptResult;

#[derive(Debug)]
pub enum StepOutcome {
    Request(RequestResult),
    Script(ScriptResult),
    Subroutine(RoutineResult),
    /// The step could not be run at all
    Errors(Vec<Error>),
}

#[derive(Debug)]
pub struct StepResult {
    pub step: Step,
    pub outcome: StepOutcome,
}

impl StepResult {
    pub fn new(step: Step, outcome: StepOutcome) -> Self {
        Self { step, outcome }
    }

    pub fn error(step: Step, error: Error) -> Self {
        Self::new(step, StepOutcome::Errors(vec![error]))
    }

    pub fn is_passing(&self) -> bool {
        match &self.outcome {
            StepOutcome::Request(result) => result.is_passing(),
            StepOutcome::Script(result) => result.is_passing(),
            StepOutcome::Subroutine(result) => result.is_passing(),
            StepOutcome::Errors(errors) => errors.is_empty(),
        }
    }

    /// Display name: the request or routine name with the step target.
    pub fn name(&self) -> String {
        match &self.outcome {
            StepOutcome::Request(result) => format!("{} ({})", result.name, self.step.run),
            StepOutcome::Subroutine(result) => format!("{} ({})", result.name, self.step.run),
            _ => self.step.run.clone(),
        }
    }
}

#[derive(Debug)]
pub struct RoutineResult {
    pub name: String,
    pub step_results: Vec<StepResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Errors of this routine and all of its descendants, filled once the subtree completes
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub passing: usize,
    pub total: usize,
}

impl Tally {
    fn record(&mut self, passing: bool) {
        self.total += 1;
        if passing {
            self.passing += 1;
        }
    }
}

/// Pass/fail counters per step kind, derived from a result tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub requests: Tally,
    pub scripts: Tally,
    pub subroutines: Tally,
    pub unknown: Tally,
}

impl RunStats {
    pub fn categories(&self) -> [(&'static str, Tally); 4] {
        [
            ("Requests", self.requests),
            ("Scripts", self.scripts),
            ("Subroutines", self.subroutines),
            ("Unknown", self.unknown),
        ]
    }
}

/// Serializable digest of a routine run, handed to scripts by `nap.run`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutineSummary {
    pub name: String,
    pub passing: bool,
    pub passed: usize,
    pub failed: usize,
    pub elapsed_ms: i64,
    pub errors: Vec<String>,
}

impl RoutineResult {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            step_results: Vec::new(),
            started_at: now,
            finished_at: now,
            errors: Vec::new(),
        }
    }

    pub fn push(&mut self, step_result: StepResult) {
        self.step_results.push(step_result);
    }

    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn is_passing(&self) -> bool {
        self.errors.is_empty() && self.step_results.iter().all(StepResult::is_passing)
    }

    /// Collect errors bottom-up so each routine lists its own and its descendants'.
    pub fn populate_errors(&mut self) {
        let mut errors = Vec::new();

        for step_result in &mut self.step_results {
            match &mut step_result.outcome {
                StepOutcome::Subroutine(subroutine) => {
                    subroutine.populate_errors();
                    errors.extend(subroutine.errors.iter().cloned());
                }
                StepOutcome::Errors(step_errors) => {
                    errors.extend(step_errors.iter().map(ToString::to_string));
                }
                StepOutcome::Request(request) => {
                    if let Some(error) = &request.error {
                        errors.push(format!("{}: {}", request.name, error));
                    }
                }
                StepOutcome::Script(script) => {
                    if let Some(error) = &script.error {
                        errors.push(format!("{}: {}", step_result.step.run, error));
                    }
                }
            }
        }

        self.errors = errors;
    }

    /// Passed and failed counts over leaf requests and scripts.
    pub fn pass_fail_counts(&self) -> (usize, usize) {
        self.step_results
            .iter()
            .fold((0, 0), |(passed, failed), step_result| match &step_result.outcome {
                StepOutcome::Subroutine(subroutine) => {
                    let (p, f) = subroutine.pass_fail_counts();
                    (passed + p, failed + f)
                }
                StepOutcome::Request(request) if request.is_passing() => (passed + 1, failed),
                StepOutcome::Script(script) if script.is_passing() => (passed + 1, failed),
                StepOutcome::Request(_) | StepOutcome::Script(_) => (passed, failed + 1),
                StepOutcome::Errors(_) => (passed, failed),
            })
    }

    pub fn stats(&self) -> RunStats {
        let mut stats = RunStats::default();
        self.collect_stats(&mut stats);
        stats
    }

    fn collect_stats(&self, stats: &mut RunStats) {
        for step_result in &self.step_results {
            match &step_result.outcome {
                StepOutcome::Request(request) => stats.requests.record(request.is_passing()),
                StepOutcome::Script(script) => stats.scripts.record(script.is_passing()),
                StepOutcome::Subroutine(subroutine) => {
                    stats.subroutines.record(subroutine.is_passing());
                    subroutine.collect_stats(stats);
                }
                StepOutcome::Errors(_) => stats.unknown.record(false),
            }
        }
    }

    pub fn summary(&self) -> RoutineSummary {
        let (passed, failed) = self.pass_fail_counts();
        RoutineSummary {
            name: self.name.clone(),
            passing: self.is_passing(),
            passed,
            failed,
            elapsed_ms: self.elapsed_ms(),
            errors: self.errors.clone(),
        }
    }
}
