// crates/core/src/plan.rs
//! Fixed stage plans driven by the stage runner.
//!
//! Two plans exist: the long generation plan (nominal 30 minutes across four
//! working stages) and the short refinement plan (nominal 15 minutes across
//! three). Durations are nominal; the runner compresses them by the
//! configured speed multiplier.

use std::time::Duration;

use crate::config::TrackerConfig;
use crate::status::Stage;

/// One entry in a stage plan.
#[derive(Debug)]
pub struct StageSpec {
    pub stage: Stage,
    /// Progress jumps to this floor on stage entry; per-tick interpolation
    /// runs from here toward (but never reaching) the next stage's floor.
    pub floor: u8,
    /// Nominal planned duration in seconds, before speed compression.
    pub duration_secs: u64,
    pub message: &'static str,
    pub step: &'static str,
    pub details: &'static [&'static str],
}

/// An ordered plan of stages plus the terminal-write strings.
#[derive(Debug)]
pub struct StagePlan {
    pub stages: &'static [StageSpec],
    /// Includes the creation step, so `stages.len() + 1`.
    pub total_steps: u32,
    pub final_message: &'static str,
    pub final_detail: &'static str,
}

static GENERATION: StagePlan = StagePlan {
    stages: &[
        StageSpec {
            stage: Stage::Analyzing,
            floor: 10,
            duration_secs: 300,
            message: "Analyzing prompt and gathering context...",
            step: "Analyzing input",
            details: &[
                "Parsing prompt structure",
                "Identifying key topics",
                "Determining document structure",
            ],
        },
        StageSpec {
            stage: Stage::Generating,
            floor: 40,
            duration_secs: 900,
            message: "Generating document content...",
            step: "Content generation",
            details: &[
                "Creating outline",
                "Generating introduction",
                "Writing main sections",
                "Adding supporting details",
            ],
        },
        StageSpec {
            stage: Stage::Formatting,
            floor: 75,
            duration_secs: 480,
            message: "Formatting and styling document...",
            step: "Formatting",
            details: &["Applying styles", "Formatting headings", "Adding spacing and layout"],
        },
        StageSpec {
            stage: Stage::Finalizing,
            floor: 90,
            duration_secs: 120,
            message: "Finalizing document and generating PDF...",
            step: "Finalizing",
            details: &["Quality checks", "Generating PDF", "Creating preview"],
        },
    ],
    total_steps: 5,
    final_message: "Document generation completed successfully!",
    final_detail: "Generation complete",
};

static REFINEMENT: StagePlan = StagePlan {
    stages: &[
        StageSpec {
            stage: Stage::Analyzing,
            floor: 20,
            duration_secs: 180,
            message: "Analyzing content...",
            step: "Analyzing",
            details: &["Reading existing content", "Locating target sections"],
        },
        StageSpec {
            stage: Stage::Generating,
            floor: 60,
            duration_secs: 540,
            message: "Refining content...",
            step: "Refining",
            details: &["Rewriting selection", "Blending with surrounding text"],
        },
        StageSpec {
            stage: Stage::Finalizing,
            floor: 95,
            duration_secs: 180,
            message: "Finalizing changes...",
            step: "Finalizing",
            details: &["Consistency checks"],
        },
    ],
    total_steps: 4,
    final_message: "Refinement completed!",
    final_detail: "Refinement complete",
};

impl StagePlan {
    pub fn generation() -> &'static StagePlan {
        &GENERATION
    }

    pub fn refinement() -> &'static StagePlan {
        &REFINEMENT
    }

    /// Sum of nominal stage durations, in seconds.
    pub fn nominal_total_secs(&self) -> u64 {
        self.stages.iter().map(|s| s.duration_secs).sum()
    }

    /// Total wall-clock duration of the plan after speed compression.
    pub fn scaled_total(&self, config: &TrackerConfig) -> Duration {
        config.scale(Duration::from_secs(self.nominal_total_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_plan_totals() {
        let plan = StagePlan::generation();
        assert_eq!(plan.stages.len(), 4);
        assert_eq!(plan.total_steps, 5);
        // Nominal 30 minutes.
        assert_eq!(plan.nominal_total_secs(), 1800);
    }

    #[test]
    fn test_refinement_plan_totals() {
        let plan = StagePlan::refinement();
        assert_eq!(plan.stages.len(), 3);
        assert_eq!(plan.total_steps, 4);
        // Nominal 15 minutes.
        assert_eq!(plan.nominal_total_secs(), 900);
    }

    #[test]
    fn test_floors_strictly_increase() {
        for plan in [StagePlan::generation(), StagePlan::refinement()] {
            for pair in plan.stages.windows(2) {
                assert!(pair[0].floor < pair[1].floor);
            }
            let last = plan.stages.last().unwrap();
            assert!(last.floor < 100);
            assert!(!last.stage.is_terminal());
        }
    }

    #[test]
    fn test_scaled_total_uses_speed_multiplier() {
        let config = TrackerConfig::default();
        assert_eq!(
            StagePlan::generation().scaled_total(&config),
            Duration::from_secs(30)
        );
        assert_eq!(
            StagePlan::refinement().scaled_total(&config),
            Duration::from_secs(15)
        );
    }
}
