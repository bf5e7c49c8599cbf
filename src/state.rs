// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Per-match mutable state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::effects::units;
use crate::ranks::RankRewards;
use crate::types::FlipOutcome;

/// Currency, multipliers and counters for one simulated match.
///
/// Mutated only by the simulator and effect transitions. `pending` holds the
/// current flip's currency until [`MatchState::settle_flip`] folds it into
/// `banked` through `multiplier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub rank: u32,
    /// Rewards for the flip in progress, read once per flip from the rank table.
    pub rewards: RankRewards,
    pub banked: i64,
    pub pending: i64,
    pub multiplier: Decimal,
    pub battle_bonus: u32,
    pub flips: Vec<FlipOutcome>,
    pub total_triggers: u32,
    pub wasted_triggers: u32,
    /// Cascade frames dropped by the depth or trigger budget.
    pub cascades_truncated: u32,
    pub gold: i64,
    pub xp: i64,
    pub defence: i64,
    pub teammate_count: u32,
}

impl MatchState {
    pub fn new(rank: u32, teammate_count: u32) -> Self {
        Self {
            rank,
            rewards: RankRewards::flat(0, 0),
            banked: 0,
            pending: 0,
            multiplier: Decimal::ONE,
            battle_bonus: 0,
            flips: Vec::new(),
            total_triggers: 0,
            wasted_triggers: 0,
            cascades_truncated: 0,
            gold: 0,
            xp: 0,
            defence: 0,
            teammate_count,
        }
    }

    pub fn wins(&self) -> u32 {
        self.flips.iter().filter(|f| f.is_win()).count() as u32
    }

    /// Losses so far, including the flip in progress.
    pub fn losses(&self) -> u32 {
        self.flips.len() as u32 - self.wins()
    }

    /// Record the flip and apply its base currency delta.
    pub fn begin_flip(&mut self, outcome: FlipOutcome, rewards: RankRewards) {
        self.flips.push(outcome);
        self.rewards = rewards;
        match outcome {
            FlipOutcome::Win => {
                self.pending = rewards.per_win;
                self.battle_bonus = 0;
            }
            FlipOutcome::Loss => {
                self.pending = -rewards.loss_penalty;
                self.battle_bonus += 1;
            }
        }
    }

    /// How far pending currency sits above the unmitigated rank penalty.
    pub fn loss_prevented(&self) -> i64 {
        self.pending + self.rewards.loss_penalty
    }

    /// Fold pending into banked through the multiplier, then reset both.
    pub fn settle_flip(&mut self) {
        let settled = Decimal::from(self.pending).checked_mul(self.multiplier).map_or(
            if self.pending < 0 { i64::MIN } else { i64::MAX },
            units,
        );
        self.banked = self.banked.saturating_add(settled);
        self.pending = 0;
        self.multiplier = Decimal::ONE;
    }

    /// Double the banked total at the end of the round. A won round also
    /// doubles gold and xp.
    pub fn apply_round_multiplier(&mut self) {
        self.banked = self.banked.saturating_mul(2);
        if self.wins() > self.losses() {
            self.gold = self.gold.saturating_mul(2);
            self.xp = self.xp.saturating_mul(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn begin_flip_sets_base_delta_and_battle_bonus() {
        let mut s = MatchState::new(1, 0);
        let r = RankRewards::flat(100, 750);
        s.begin_flip(FlipOutcome::Loss, r);
        assert_eq!(s.pending, -750);
        assert_eq!(s.battle_bonus, 1);
        s.settle_flip();
        s.begin_flip(FlipOutcome::Loss, r);
        assert_eq!(s.battle_bonus, 2);
        s.settle_flip();
        s.begin_flip(FlipOutcome::Win, r);
        assert_eq!(s.pending, 100);
        assert_eq!(s.battle_bonus, 0);
        assert_eq!(s.losses(), 2);
        assert_eq!(s.wins(), 1);
    }

    #[test]
    fn settle_applies_multiplier_and_truncates() {
        let mut s = MatchState::new(1, 0);
        s.begin_flip(FlipOutcome::Loss, RankRewards::flat(100, 101));
        s.multiplier = dec!(1.5);
        s.settle_flip();
        assert_eq!(s.banked, -151);
        assert_eq!(s.pending, 0);
        assert_eq!(s.multiplier, Decimal::ONE);
    }

    #[test]
    fn round_multiplier_doubles_banked_either_way() {
        let r = RankRewards::flat(100, 500);

        let mut won = MatchState::new(1, 0);
        for f in [FlipOutcome::Win, FlipOutcome::Loss, FlipOutcome::Win] {
            won.begin_flip(f, r);
            won.settle_flip();
        }
        won.gold = 3;
        let before = won.banked;
        won.apply_round_multiplier();
        assert_eq!(before, -300);
        assert_eq!(won.banked, -600);
        assert_eq!(won.gold, 6);

        let mut lost = MatchState::new(1, 0);
        for f in [FlipOutcome::Loss, FlipOutcome::Win, FlipOutcome::Loss] {
            lost.begin_flip(f, r);
            lost.settle_flip();
        }
        lost.gold = 3;
        lost.apply_round_multiplier();
        assert_eq!(lost.banked, -1800);
        assert_eq!(lost.gold, 3);
    }
}
