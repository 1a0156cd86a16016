// src/core/revision.rs — Revision brief for iterations after the first
//
// Packages the prior candidate, its scores and the consolidated feedback,
// ordered by `priority::prioritize`, and renders them as the revision
// section of a generation prompt.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use super::priority::{self, Emphasis};
use super::types::*;

/// Everything the generator needs to revise rather than start over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionContext {
    pub prior_candidate: String,
    pub prior_scores: Scores,
    pub feedback: Feedback,
    pub emphasis: Emphasis,
}

impl RevisionContext {
    /// `None` on the first pass: there is nothing to revise yet.
    pub fn from_state(state: &WorkflowState) -> Option<Self> {
        if state.iteration == 0 {
            return None;
        }
        let prior_candidate = state.candidate_text.clone()?;
        let prior_scores = state.scores?;
        Some(Self {
            prior_candidate,
            emphasis: priority::prioritize(&prior_scores, &state.min_scores),
            prior_scores,
            feedback: state.feedback.clone(),
        })
    }

    /// Criteria in presentation order: critical ones by descending deficit,
    /// then the rest in table order.
    pub fn presentation_order(&self) -> Vec<Criterion> {
        let mut order = self.emphasis.critical_criteria();
        for c in Criterion::ALL {
            if !order.contains(&c) {
                order.push(c);
            }
        }
        order
    }
}

/// Render a score without a trailing `.0` for whole numbers.
pub fn format_score(score: f32) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}")
    } else {
        format!("{score:.1}")
    }
}

fn push_numbered(out: &mut String, heading: &str, items: &[String]) {
    let _ = writeln!(out, "{heading}");
    if items.is_empty() {
        let _ = writeln!(out, "(none)");
        return;
    }
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, item);
    }
}

/// Render the revision section appended to a generation prompt.
pub fn render_revision_instructions(
    ctx: &RevisionContext,
    min_scores: &MinScores,
    attributes: &[String],
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "===== REVISION INSTRUCTIONS =====");
    let _ = writeln!(out, "Your previous response:");
    let _ = writeln!(out, "\"\"\"\n{}\n\"\"\"\n", ctx.prior_candidate);

    let _ = writeln!(out, "CURRENT SCORES AND PRIORITY AREAS:");
    for (criterion, &score) in ctx.prior_scores.iter() {
        let marker = if ctx.emphasis.is_critical(criterion) {
            "NEEDS ATTENTION"
        } else {
            "OK"
        };
        let _ = writeln!(
            out,
            "{}: {}/10 (threshold {}) {}",
            criterion.label(),
            format_score(score),
            format_score(min_scores[criterion]),
            marker
        );
    }
    out.push('\n');

    match &ctx.emphasis {
        Emphasis::Critical(areas) => {
            let _ = writeln!(out, "CRITICAL PRIORITY AREAS (focus most effort here):");
            for area in areas {
                let _ = writeln!(
                    out,
                    "- {} ({} below threshold)",
                    area.criterion.label(),
                    format_score(area.deficit)
                );
            }
            let _ = writeln!(
                out,
                "These areas scored below threshold and need significant improvement. \
                 Prioritize implementing their suggestions.\n"
            );
        }
        Emphasis::Balanced => {
            let _ = writeln!(
                out,
                "All areas are meeting thresholds - focus on balanced improvements.\n"
            );
        }
    }

    let _ = writeln!(out, "Detailed feedback from evaluators by category:\n");
    for criterion in ctx.presentation_order() {
        let entry = &ctx.feedback[criterion];
        let flag = if ctx.emphasis.is_critical(criterion) {
            " CRITICAL PRIORITY"
        } else {
            ""
        };
        let _ = writeln!(out, "{} FEEDBACK:{}", criterion.label().to_uppercase(), flag);
        push_numbered(&mut out, "What's working well:", &entry.what_is_working_well);
        push_numbered(&mut out, "What needs improvement:", &entry.what_needs_improvement);
        push_numbered(&mut out, "Specific suggestions:", &entry.specific_suggestions);
        out.push('\n');
    }

    let labels: Vec<&str> = Criterion::ALL.iter().map(|c| c.label()).collect();
    let _ = writeln!(out, "IMPORTANT REVISION GUIDELINES:");
    let _ = writeln!(
        out,
        "1. PRIORITIZE CRITICAL AREAS: spend most of your effort on areas marked CRITICAL PRIORITY"
    );
    let _ = writeln!(out, "2. Address each specific feedback point directly in the relevant category");
    let _ = writeln!(out, "3. Maintain and expand on what's working well in each area");
    let _ = writeln!(out, "4. For low-scoring areas, implement all specific suggestions");
    let _ = writeln!(
        out,
        "5. For high-scoring areas, make subtle improvements while keeping their strengths"
    );
    let _ = writeln!(out, "6. Balance all criteria: {}", labels.join(", "));
    let _ = writeln!(
        out,
        "7. Strengthen the requested attributes: \"{}\"",
        attributes.join(", ")
    );
    let _ = writeln!(
        out,
        "8. Keep the original subjects and concepts intact (content preservation)"
    );
    let _ = writeln!(
        out,
        "9. Keep the original length, format and presentation style (structure preservation)\n"
    );
    let _ = write!(
        out,
        "Revise your previous response applying these guidelines. \
         Focus most heavily on critical priority areas."
    );

    out
}
