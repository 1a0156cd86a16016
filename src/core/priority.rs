// src/core/priority.rs — Feedback prioritization
//
// Ranks criteria below threshold by deficit so the next generation pass
// knows where to spend its effort.

use serde::{Deserialize, Serialize};

use super::types::{Criterion, MinScores, Scores};

/// A criterion scoring below its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalArea {
    pub criterion: Criterion,
    pub score: f32,
    pub threshold: f32,
    pub deficit: f32,
}

/// Emphasis order presented to the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "areas", rename_all = "snake_case")]
pub enum Emphasis {
    /// Critical criteria, worst deficit first.
    Critical(Vec<CriticalArea>),
    /// Nothing is below threshold.
    Balanced,
}

impl Emphasis {
    pub fn critical_criteria(&self) -> Vec<Criterion> {
        match self {
            Emphasis::Critical(areas) => areas.iter().map(|a| a.criterion).collect(),
            Emphasis::Balanced => Vec::new(),
        }
    }

    pub fn is_critical(&self, criterion: Criterion) -> bool {
        match self {
            Emphasis::Critical(areas) => areas.iter().any(|a| a.criterion == criterion),
            Emphasis::Balanced => false,
        }
    }
}

/// `deficit = threshold - score`; criteria with a positive deficit are
/// critical and sorted by descending deficit. Equal deficits keep
/// `Criterion::ALL` order.
pub fn prioritize(scores: &Scores, min_scores: &MinScores) -> Emphasis {
    let mut areas: Vec<CriticalArea> = Criterion::ALL
        .into_iter()
        .map(|criterion| {
            let score = scores[criterion];
            let threshold = min_scores[criterion];
            CriticalArea {
                criterion,
                score,
                threshold,
                deficit: threshold - score,
            }
        })
        .filter(|a| a.deficit > 0.0)
        .collect();

    if areas.is_empty() {
        return Emphasis::Balanced;
    }

    areas.sort_by(|a, b| b.deficit.total_cmp(&a.deficit));
    Emphasis::Critical(areas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{default_min_scores, CriterionMap};

    fn scores(values: [f32; 4]) -> Scores {
        CriterionMap::from_fn(|c| values[c.index()])
    }

    #[test]
    fn test_worst_deficit_first() {
        // intensity 5, attributes 8, content 3, structure 9; thresholds 7
        let emphasis = prioritize(&scores([5.0, 8.0, 3.0, 9.0]), &default_min_scores());
        assert_eq!(
            emphasis.critical_criteria(),
            vec![Criterion::ContentPreservation, Criterion::Intensity]
        );
        match emphasis {
            Emphasis::Critical(areas) => {
                assert!((areas[0].deficit - 4.0).abs() < f32::EPSILON);
                assert!((areas[1].deficit - 2.0).abs() < f32::EPSILON);
            }
            Emphasis::Balanced => panic!("expected critical areas"),
        }
    }

    #[test]
    fn test_all_passing_is_balanced() {
        let emphasis = prioritize(&scores([7.0, 8.0, 9.0, 10.0]), &default_min_scores());
        assert_eq!(emphasis, Emphasis::Balanced);
        assert!(emphasis.critical_criteria().is_empty());
    }

    #[test]
    fn test_score_at_threshold_not_critical() {
        let emphasis = prioritize(&scores([7.0, 6.0, 7.0, 7.0]), &default_min_scores());
        assert_eq!(emphasis.critical_criteria(), vec![Criterion::AttributeInclusion]);
    }

    #[test]
    fn test_equal_deficits_keep_table_order() {
        let emphasis = prioritize(&scores([4.0, 7.0, 7.0, 4.0]), &default_min_scores());
        assert_eq!(
            emphasis.critical_criteria(),
            vec![Criterion::Intensity, Criterion::StructurePreservation]
        );
    }

    #[test]
    fn test_per_criterion_thresholds() {
        let min = scores([2.0, 9.0, 2.0, 2.0]);
        let emphasis = prioritize(&scores([3.0, 8.0, 3.0, 3.0]), &min);
        assert!(emphasis.is_critical(Criterion::AttributeInclusion));
        assert!(!emphasis.is_critical(Criterion::Intensity));
    }

    #[test]
    fn test_prioritize_is_pure() {
        let s = scores([1.0, 2.0, 3.0, 4.0]);
        let min = default_min_scores();
        assert_eq!(prioritize(&s, &min), prioritize(&s, &min));
    }
}
