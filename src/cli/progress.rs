// src/cli/progress.rs — Terminal progress renderer for real-time run feedback

use crate::core::policy;
use crate::core::revision::format_score;
use crate::core::types::{EvaluationStatus, ProgressEvent};

/// One line of progress text per event.
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::RunStarted {
            request_id,
            max_iterations,
        } => format!("[start] request {request_id} (up to {max_iterations} iteration(s))"),
        ProgressEvent::AttributesInferred { attributes } if attributes.is_empty() => {
            "[infer] no attributes inferred".to_string()
        }
        ProgressEvent::AttributesInferred { attributes } => {
            format!("[infer] attributes: {}", attributes.join(", "))
        }
        ProgressEvent::IterationStart {
            iteration,
            max_iterations,
        } => format!("[iter {iteration}/{max_iterations}] generating..."),
        ProgressEvent::Generated { iteration, chars } => {
            format!("[iter {iteration}] candidate ready ({chars} chars)")
        }
        ProgressEvent::CriterionEvaluated {
            criterion,
            score,
            status,
        } => {
            let mut line = format!("[eval]   {:<24} {}/10", criterion.label(), format_score(*score));
            if *status != EvaluationStatus::Scored {
                line.push_str(&format!(" ({status})"));
            }
            line
        }
        ProgressEvent::Consolidated {
            iteration,
            scores,
            min_scores,
        } => {
            let passing = scores
                .iter()
                .filter(|(c, s)| policy::passes(**s, min_scores[*c]))
                .count();
            format!(
                "[iter {iteration}] consolidated: {passing}/{} criteria at threshold",
                scores.iter().count()
            )
        }
        ProgressEvent::Complete {
            iterations,
            termination,
        } => format!("[done] {termination} after {iterations} iteration(s)"),
    }
}

/// Build a progress callback that writes formatted output to stderr.
///
/// All progress output goes to stderr so stdout remains clean for results.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + Sync + 'static {
    move |event| eprintln!("{}", format_event(&event))
}
