//! Plain-text rendering of a run's result tree

use std::fmt::Write;

use crate::routine::{RoutineResult, StepOutcome, StepResult};

const RULE: &str = "------------------------------------------------------";

/// Render `result` for the terminal.
///
/// Without `verbose` only the aggregated errors are listed. With it the whole
/// tree is printed, starting at the routine a job wraps when there is one.
pub fn render(result: &RoutineResult, verbose: bool) -> String {
    let mut out = String::new();

    if !verbose {
        for error in &result.errors {
            let _ = writeln!(out, "[ERROR] {error}");
        }
        return out;
    }

    let root = match result.step_results.as_slice() {
        [StepResult {
            outcome: StepOutcome::Subroutine(inner),
            ..
        }] => inner,
        _ => result,
    };

    let _ = writeln!(out, "{RULE}\nRoutine: {}\n{RULE}", root.name);
    render_routine(&mut out, root, "");

    let _ = writeln!(out, "{RULE}");
    for (category, tally) in root.stats().categories() {
        if tally.total > 0 {
            let _ = writeln!(out, "{category}: {}/{} passing", tally.passing, tally.total);
        }
    }

    out
}

fn render_routine(out: &mut String, result: &RoutineResult, prefix: &str) {
    let _ = writeln!(
        out,
        "{prefix}Elapsed: {}ms, IsPassing: {}",
        result.elapsed_ms(),
        result.is_passing()
    );

    for (i, step_result) in result.step_results.iter().enumerate() {
        render_step(out, i, step_result, prefix);
    }
}

fn render_step(out: &mut String, index: usize, step_result: &StepResult, prefix: &str) {
    let _ = writeln!(out, "{prefix}Run {}: {}", index + 1, step_result.name());

    match &step_result.outcome {
        StepOutcome::Errors(errors) => {
            for error in errors {
                let _ = writeln!(out, "{prefix}  [ERROR] {error}");
            }
        }
        StepOutcome::Request(request) => match &request.error {
            Some(error) => {
                let _ = writeln!(out, "{prefix}  [ERROR] {error}");
            }
            None => {
                let _ = writeln!(
                    out,
                    "{prefix}  Status: {}",
                    request.status.as_deref().unwrap_or_default()
                );
                let _ = writeln!(out, "{prefix}  Elapsed: {}ms", request.elapsed_ms());
            }
        },
        StepOutcome::Script(script) => match &script.error {
            Some(error) => {
                let _ = writeln!(out, "{prefix}  [ERROR] {error}");
            }
            None => {
                for line in &script.output {
                    let _ = writeln!(out, "{prefix}  Output: {line}");
                }
                let _ = writeln!(out, "{prefix}  Elapsed: {}ms", script.elapsed_ms());
            }
        },
        StepOutcome::Subroutine(subroutine) => {
            render_routine(out, subroutine, &format!("{prefix}  "));
        }
    }
}

/// Closing line printed after every run.
pub fn summary_line(elapsed_ms: u128, passed: usize, failed: usize) -> String {
    format!(
        "Run finished in {elapsed_ms}ms. {passed}/{} succeeded.",
        passed + failed
    )
}
