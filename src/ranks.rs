// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Per-rank flip rewards and loss penalties.
//!
//! The standard table covers ranks 1..=40 in eight tiers of five. Ranks above
//! the table extrapolate by 1.5x per rank; ranks below 1 clamp to 1.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::effects::units;

pub const TIER_NAMES: [&str; 8] =
    ["Bronze", "Silver", "Gold", "Platinum", "Diamond", "Master", "Grandmaster", "Legend"];

const RANKS_PER_TIER: u32 = 5;
const EXTRAPOLATION_FACTOR: Decimal = dec!(1.5);
/// Extrapolated rewards saturate here, low enough that a full match of
/// multiplied flips still fits in an `i64` banked total.
pub const EXTRAPOLATION_CEILING: i64 = i64::MAX / 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RankError {
    #[error("rank table must contain at least one entry")]
    Empty,
    #[error("rank {rank} has a negative penalty or reward")]
    Negative { rank: u32 },
}

/// Rewards for one flip at a given rank. `loss_penalty` is a magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankRewards {
    pub per_win: i64,
    pub loss_penalty: i64,
    #[serde(default)]
    pub xp_win: i64,
    #[serde(default)]
    pub xp_loss: i64,
    #[serde(default)]
    pub gold_win: i64,
}

impl RankRewards {
    /// Win reward and loss penalty only.
    pub fn flat(per_win: i64, loss_penalty: i64) -> Self {
        Self { per_win, loss_penalty, xp_win: 0, xp_loss: 0, gold_win: 0 }
    }

    fn scaled(&self, factor: Decimal) -> Self {
        let s = |v: i64| match Decimal::from(v).checked_mul(factor) {
            Some(d) => units(d).clamp(-EXTRAPOLATION_CEILING, EXTRAPOLATION_CEILING),
            None if v < 0 => -EXTRAPOLATION_CEILING,
            None => EXTRAPOLATION_CEILING,
        };
        Self {
            per_win: self.per_win,
            loss_penalty: s(self.loss_penalty),
            xp_win: s(self.xp_win),
            xp_loss: s(self.xp_loss),
            gold_win: s(self.gold_win),
        }
    }
}

/// Rank-indexed reward schedule. Entry `i` is rank `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RankRewards>", into = "Vec<RankRewards>")]
pub struct RankTable {
    entries: Vec<RankRewards>,
}

impl TryFrom<Vec<RankRewards>> for RankTable {
    type Error = RankError;

    fn try_from(entries: Vec<RankRewards>) -> Result<Self, Self::Error> {
        RankTable::from_entries(entries)
    }
}

impl From<RankTable> for Vec<RankRewards> {
    fn from(t: RankTable) -> Self {
        t.entries
    }
}

impl Default for RankTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RankTable {
    pub fn from_entries(entries: Vec<RankRewards>) -> Result<Self, RankError> {
        if entries.is_empty() {
            return Err(RankError::Empty);
        }
        for (i, e) in entries.iter().enumerate() {
            if e.per_win < 0 || e.loss_penalty < 0 {
                return Err(RankError::Negative { rank: i as u32 + 1 });
            }
        }
        Ok(Self { entries })
    }

    /// A single-entry table: every rank gets the same rewards.
    pub fn flat(per_win: i64, loss_penalty: i64) -> Self {
        Self { entries: vec![RankRewards::flat(per_win, loss_penalty)] }
    }

    pub fn max_rank(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn rewards(&self, rank: u32) -> RankRewards {
        let rank = rank.max(1);
        let top = self.max_rank();
        let last = self.entries[self.entries.len() - 1];
        if rank <= top {
            return self.entries[(rank - 1) as usize];
        }
        // single-entry tables are flat, not extrapolated
        if top == 1 {
            return last;
        }
        let mut factor = Decimal::ONE;
        for _ in 0..(rank - top) {
            match factor.checked_mul(EXTRAPOLATION_FACTOR) {
                Some(next) => factor = next,
                None => {
                    factor = Decimal::MAX;
                    break;
                }
            }
        }
        last.scaled(factor)
    }

    /// The standard interpolated 40-rank table.
    pub fn standard() -> Self {
        let mut entries = Vec::with_capacity(40);

        // Bronze
        for i in 0..5i64 {
            entries.push(RankRewards {
                per_win: 100,
                loss_penalty: 100 + i * 25,
                xp_win: 100 + i * 30,
                xp_loss: 45 + units(Decimal::from(i) * dec!(13.5)),
                gold_win: 60 + i * 18,
            });
        }

        // Silver
        let silver = [500, 650, 800, 950, 1200];
        for (i, penalty) in silver.into_iter().enumerate() {
            let i = i as i64;
            entries.push(RankRewards {
                per_win: 100,
                loss_penalty: penalty,
                xp_win: 300 + i * 75,
                xp_loss: 135 + i * 23,
                gold_win: 180 + i * 45,
            });
        }

        // Gold and Platinum are tabulated
        let tabulated: [([i64; 5], [i64; 5], [i64; 5], [i64; 5]); 2] = [
            (
                [2750, 3500, 4500, 6000, 7500],
                [750, 875, 1000, 1150, 1325],
                [338, 394, 450, 518, 596],
                [450, 525, 600, 690, 795],
            ),
            (
                [15000, 22500, 32500, 42500, 57500],
                [1500, 1700, 1900, 2100, 2350],
                [675, 765, 855, 945, 1057],
                [900, 1020, 1140, 1260, 1410],
            ),
        ];
        for (penalties, xp_wins, xp_losses, golds) in tabulated {
            for i in 0..5 {
                entries.push(RankRewards {
                    per_win: 100,
                    loss_penalty: penalties[i],
                    xp_win: xp_wins[i],
                    xp_loss: xp_losses[i],
                    gold_win: golds[i],
                });
            }
        }

        // Diamond through Legend grow geometrically within the tier:
        // (base penalty, growth, xp_win, xp_win step, xp_loss, xp_loss step, gold, gold step)
        let geometric: [(i64, Decimal, i64, i64, i64, i64, i64, i64); 4] = [
            (75_000, dec!(1.3), 2600, 300, 1170, 130, 1560, 180),
            (200_000, dec!(1.35), 4100, 400, 1845, 180, 2460, 240),
            (700_000, dec!(1.4), 6000, 500, 2700, 225, 3600, 300),
            (2_000_000, dec!(1.5), 8500, 600, 3825, 270, 5100, 360),
        ];
        for (base, growth, xw, xw_step, xl, xl_step, g, g_step) in geometric {
            let mut factor = Decimal::ONE;
            for i in 0..5i64 {
                entries.push(RankRewards {
                    per_win: 100,
                    loss_penalty: units(Decimal::from(base) * factor),
                    xp_win: xw + i * xw_step,
                    xp_loss: xl + i * xl_step,
                    gold_win: g + i * g_step,
                });
                factor *= growth;
            }
        }

        Self { entries }
    }
}

/// Display name such as `"Gold 3"`. Ranks past the last tier keep counting
/// levels within it.
pub fn rank_name(rank: u32) -> String {
    let rank = rank.max(1);
    let tier = ((rank - 1) / RANKS_PER_TIER) as usize;
    if tier < TIER_NAMES.len() {
        format!("{} {}", TIER_NAMES[tier], (rank - 1) % RANKS_PER_TIER + 1)
    } else {
        let top = TIER_NAMES.len() as u32 * RANKS_PER_TIER;
        format!("{} {}", TIER_NAMES[TIER_NAMES.len() - 1], RANKS_PER_TIER + rank - top)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_has_forty_ranks() {
        let t = RankTable::standard();
        assert_eq!(t.max_rank(), 40);
        assert_eq!(t.rewards(1).loss_penalty, 100);
        assert_eq!(t.rewards(5).loss_penalty, 200);
        assert_eq!(t.rewards(10).loss_penalty, 1200);
        assert_eq!(t.rewards(16).loss_penalty, 15_000);
        assert_eq!(t.rewards(21).loss_penalty, 75_000);
        assert_eq!(t.rewards(22).loss_penalty, 97_500);
        assert_eq!(t.rewards(40).loss_penalty, 10_125_000);
        assert!((1..=40).all(|r| t.rewards(r).per_win == 100));
    }

    #[test]
    fn penalties_grow_within_each_tier() {
        let t = RankTable::standard();
        for r in 1..40 {
            if r % RANKS_PER_TIER == 0 {
                continue;
            }
            assert!(t.rewards(r).loss_penalty < t.rewards(r + 1).loss_penalty, "rank {}", r);
        }
    }

    #[test]
    fn out_of_table_ranks_clamp_and_extrapolate() {
        let t = RankTable::standard();
        assert_eq!(t.rewards(0), t.rewards(1));
        assert_eq!(t.rewards(41).loss_penalty, 15_187_500);
        assert_eq!(t.rewards(41).per_win, 100);
    }

    #[test]
    fn far_ranks_saturate_instead_of_overflowing() {
        let t = RankTable::standard();
        let mut previous = t.rewards(40).loss_penalty;
        for rank in [41, 60, 100, 150, 200, 400, 10_000, u32::MAX] {
            let r = t.rewards(rank);
            assert!(r.loss_penalty >= previous, "rank {} penalty shrank", rank);
            assert!(r.loss_penalty <= EXTRAPOLATION_CEILING);
            assert_eq!(r.per_win, 100);
            previous = r.loss_penalty;
        }
        assert_eq!(t.rewards(400).loss_penalty, EXTRAPOLATION_CEILING);
    }

    #[test]
    fn flat_table_ignores_rank() {
        let t = RankTable::flat(100, 600);
        assert_eq!(t.rewards(1), t.rewards(37));
    }

    #[test]
    fn deserialize_rejects_empty_and_negative() {
        assert!(serde_json::from_str::<RankTable>("[]").is_err());
        let neg = r#"[{"per_win": 100, "loss_penalty": -5}]"#;
        assert!(serde_json::from_str::<RankTable>(neg).is_err());
        let ok = r#"[{"per_win": 100, "loss_penalty": 250}]"#;
        let t: RankTable = serde_json::from_str(ok).expect("test: table");
        assert_eq!(t.rewards(3).loss_penalty, 250);
    }

    #[test]
    fn rank_names() {
        assert_eq!(rank_name(1), "Bronze 1");
        assert_eq!(rank_name(13), "Gold 3");
        assert_eq!(rank_name(40), "Legend 5");
        assert_eq!(rank_name(42), "Legend 7");
    }
}
