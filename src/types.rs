// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Skill Tree Engine - Type Definitions

use serde::{Deserialize, Serialize};

// ─── Trigger Category ───────────────────────────────────────────────────────

/// When a node fires during the spiral pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Win,
    Loss,
    /// Every flip, regardless of outcome.
    Flip,
    /// Never fired by a pass; only reachable through cascades.
    Manual,
}

// ─── Flip Outcome ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FlipOutcome {
    Win,
    Loss,
}

impl FlipOutcome {
    pub fn is_win(self) -> bool {
        self == FlipOutcome::Win
    }

    pub fn label(self) -> char {
        match self {
            FlipOutcome::Win => 'W',
            FlipOutcome::Loss => 'L',
        }
    }

    /// Trigger passes run for this outcome, in order.
    pub fn passes(self) -> [Trigger; 2] {
        match self {
            FlipOutcome::Win => [Trigger::Flip, Trigger::Win],
            FlipOutcome::Loss => [Trigger::Flip, Trigger::Loss],
        }
    }
}

/// Render a flip sequence as a `W`/`L` label, e.g. `"WLWW"`.
pub fn sequence_label(flips: &[FlipOutcome]) -> String {
    flips.iter().map(|f| f.label()).collect()
}

// ─── Upgrade Modifiers ──────────────────────────────────────────────────────

/// Parameter an upgrade step can change.
///
/// `AvsIncrease` is the only kind that accumulates across purchased steps.
/// Every other kind takes the value of the last purchased step carrying it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    AvsIncrease,
    EffectMult,
    BbMultiplierIncrease,
    DepletedReductionPercent,
    QIncrease,
    PerLossIncrease,
    PercentIncrease,
    PerTeammateIncrease,
    PerDepletedIncrease,
}

impl Modifier {
    pub fn accumulates(self) -> bool {
        matches!(self, Modifier::AvsIncrease)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_run_flip_before_outcome() {
        assert_eq!(FlipOutcome::Win.passes(), [Trigger::Flip, Trigger::Win]);
        assert_eq!(FlipOutcome::Loss.passes(), [Trigger::Flip, Trigger::Loss]);
    }

    #[test]
    fn label_renders_sequence() {
        let seq = [FlipOutcome::Win, FlipOutcome::Loss, FlipOutcome::Win];
        assert_eq!(sequence_label(&seq), "WLW");
    }

    #[test]
    fn modifier_serde_is_snake_case() {
        let json = serde_json::to_string(&Modifier::BbMultiplierIncrease).expect("test: serialize");
        assert_eq!(json, "\"bb_multiplier_increase\"");
        let m: Modifier = serde_json::from_str("\"avs_increase\"").expect("test: deserialize");
        assert!(m.accumulates());
    }
}
