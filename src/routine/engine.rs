//! Recursive routine execution
//!
//! Request and script steps run in order on the routine's own task. Routine
//! steps are spawned as separate tasks and joined once every step of the
//! current routine has been attempted, so their results land in completion
//! order after the synchronous siblings that finished first.

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::result::{RoutineResult, StepOutcome, StepResult};
use super::{sniff_kind, Routine, Step, StepKind};
use crate::context::{Context, RoutineProgress};
use crate::error::Error;
use crate::request::{self, run_request};

/// Run the workflow file at `path`, relative to the context's working directory.
///
/// A target already running on this branch, e.g. a script reaching itself
/// through `nap.run`, yields a cyclic reference error instead of recursing.
pub fn run_path(mut ctx: Context, path: String) -> BoxFuture<'static, RoutineResult> {
    Box::pin(async move {
        let base = Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        let name = format!("Job: {base}");

        let target = ctx.working_dir().join(&path);
        if let Ok(identity) = target.canonicalize() {
            if ctx.is_on_lineage(&identity) {
                warn!("Refusing to re-enter {} on the same branch", target.display());
                let mut result = RoutineResult::new(&name);
                result.push(StepResult::error(
                    Step::new(path),
                    Error::CyclicReference(target.display().to_string()),
                ));
                result.populate_errors();
                return result;
            }

            // Routines join the lineage when they are dispatched.
            if !matches!(sniff_kind(&target, &ctx), Ok(StepKind::Routine)) {
                ctx.push_lineage(identity);
            }
        }

        let routine = Routine::synthetic(name, path);
        let mut result = run_routine(ctx, routine, false).await;
        result.populate_errors();
        result
    })
}

/// Run every step of `routine`; `tracked` routines get their own progress bar.
pub fn run_routine(
    ctx: Context,
    routine: Routine,
    tracked: bool,
) -> BoxFuture<'static, RoutineResult> {
    Box::pin(async move {
        let mut result = RoutineResult::new(&routine.name);
        let progress = ctx
            .progress()
            .filter(|_| tracked)
            .map(|p| p.start(&routine.name, routine.steps.len()));

        let (tx, mut rx) = mpsc::unbounded_channel::<StepResult>();
        let mut wait_count = 0usize;
        let mut halted = false;

        debug!("Running routine {} ({} steps)", routine.name, routine.steps.len());

        for step in &routine.steps {
            let step_path = ctx.working_dir().join(&step.run);

            if !step_path.exists() {
                result.push(StepResult::error(
                    step.clone(),
                    Error::NotFound(step_path.display().to_string()),
                ));
                halted = true;
                break;
            }

            let kind = match sniff_kind(&step_path, &ctx) {
                Ok(kind) => kind,
                Err(e) => {
                    result.push(StepResult::error(step.clone(), e));
                    halted = true;
                    break;
                }
            };

            let iterations = match step.expand_iterations(&ctx) {
                Ok(iterations) => iterations,
                Err(e) => {
                    result.push(StepResult::error(step.clone(), e));
                    halted = true;
                    break;
                }
            };

            debug!("Step {} is a {} with {} iteration(s)", step.run, kind, iterations.len());

            for iteration in &iterations {
                match kind {
                    StepKind::Request => match request::load_from_path(&step_path, iteration) {
                        Ok(request) => {
                            let outcome = run_request(iteration, &step_path, request).await;
                            result.push(StepResult::new(step.clone(), StepOutcome::Request(outcome)));
                            increment(&progress);
                        }
                        Err(e) => {
                            result.push(StepResult::error(step.clone(), e));
                            break;
                        }
                    },
                    StepKind::Script => {
                        let outcome = iteration.script_session().run_file(&step_path);
                        result.push(StepResult::new(step.clone(), StepOutcome::Script(outcome)));
                        increment(&progress);
                    }
                    StepKind::Routine => {
                        match prepare_subroutine(iteration, &step_path) {
                            Ok((sub_ctx, subroutine)) => {
                                wait_count += 1;
                                let tx = tx.clone();
                                let step = step.clone();
                                tokio::spawn(async move {
                                    let outcome = run_routine(sub_ctx, subroutine, true).await;
                                    let _ = tx.send(StepResult::new(
                                        step,
                                        StepOutcome::Subroutine(outcome),
                                    ));
                                });
                            }
                            Err(e) => result.push(StepResult::error(step.clone(), e)),
                        }
                    }
                }
            }
        }

        drop(tx);

        for _ in 0..wait_count {
            match rx.recv().await {
                Some(step_result) => {
                    result.push(step_result);
                    increment(&progress);
                }
                None => {
                    warn!("A subroutine of {} ended without reporting a result", routine.name);
                    break;
                }
            }
        }

        result.finished_at = chrono::Utc::now();

        if let Some(progress) = &progress {
            if halted {
                progress.abandon("failed");
            } else {
                progress.finish();
            }
        }

        result
    })
}

/// Clone a context for the routine at `path` and load it, refusing routines
/// already running on this branch.
fn prepare_subroutine(ctx: &Context, path: &Path) -> crate::error::Result<(Context, Routine)> {
    let identity = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if ctx.is_on_lineage(&identity) {
        return Err(Error::CyclicReference(path.display().to_string()));
    }

    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut sub_ctx = ctx.clone_into(dir);
    let routine = Routine::load_from_path(path, &sub_ctx)?;
    sub_ctx.push_lineage(identity);

    Ok((sub_ctx, routine))
}

fn increment(progress: &Option<RoutineProgress>) {
    if let Some(progress) = progress {
        progress.increment();
    }
}
