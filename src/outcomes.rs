// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Skill Tree Engine - Round Outcome Enumeration

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::simulation::Simulator;
use crate::state::MatchState;
use crate::types::{sequence_label, FlipOutcome};

pub const DEFAULT_ROUNDS_TO_WIN: u32 = 3;
pub const DEFAULT_MAX_FLIPS: u32 = 5;

/// Golden-ratio increment, used to spread sequence keys across seeds.
const KEY_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// A first-to-N flip sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSequence {
    pub label: String,
    pub flips: Vec<FlipOutcome>,
}

impl OutcomeSequence {
    pub fn new(flips: Vec<FlipOutcome>) -> Self {
        Self { label: sequence_label(&flips), flips }
    }

    pub fn wins(&self) -> u32 {
        self.flips.iter().filter(|f| f.is_win()).count() as u32
    }

    pub fn losses(&self) -> u32 {
        self.flips.len() as u32 - self.wins()
    }

    pub fn is_round_win(&self) -> bool {
        self.wins() > self.losses()
    }

    /// Unique per sequence: a leading 1 bit, then one bit per flip.
    pub fn key(&self) -> u64 {
        self.flips.iter().fold(1u64, |k, f| (k << 1) | u64::from(!f.is_win()))
    }

    /// Independent random stream for this sequence under `seed`.
    pub fn rng(&self, seed: u64) -> ChaCha8Rng {
        stream_rng(seed, self.key())
    }
}

/// Random stream for work item `key` under a run-wide `seed`.
pub fn stream_rng(seed: u64, key: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ key.wrapping_mul(KEY_MIX))
}

/// Every sequence of length `rounds_to_win..=max_flips` that ends exactly at
/// the first flip where either side reaches `rounds_to_win`.
///
/// Ordered by length, then with wins before losses at each position.
pub fn enumerate(rounds_to_win: u32, max_flips: u32) -> Vec<OutcomeSequence> {
    let mut out = Vec::new();
    if rounds_to_win == 0 {
        return out;
    }
    for len in rounds_to_win..=max_flips {
        for bits in 0u64..(1u64 << len) {
            // bit set = loss; most significant bit is the first flip
            let flips: Vec<FlipOutcome> = (0..len)
                .map(|i| {
                    if bits >> (len - 1 - i) & 1 == 0 {
                        FlipOutcome::Win
                    } else {
                        FlipOutcome::Loss
                    }
                })
                .collect();
            if ends_exactly_at_last_flip(&flips, rounds_to_win) {
                out.push(OutcomeSequence::new(flips));
            }
        }
    }
    out
}

fn ends_exactly_at_last_flip(flips: &[FlipOutcome], target: u32) -> bool {
    let (mut wins, mut losses) = (0, 0);
    for (i, f) in flips.iter().enumerate() {
        if f.is_win() {
            wins += 1;
        } else {
            losses += 1;
        }
        let decided = wins == target || losses == target;
        let last = i + 1 == flips.len();
        if decided != last {
            return false;
        }
    }
    true
}

/// Terminal state of one sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub label: String,
    pub state: MatchState,
}

/// Simulate every sequence. Each sequence gets its own random stream, so
/// results do not depend on the order sequences are run in.
pub fn run_all(sim: &mut Simulator<'_>, sequences: &[OutcomeSequence], rank: u32, seed: u64) -> Vec<OutcomeRecord> {
    sequences
        .iter()
        .map(|seq| {
            let mut rng = seq.rng(seed);
            OutcomeRecord { label: seq.label.clone(), state: sim.simulate_match(&seq.flips, rank, &mut rng) }
        })
        .collect()
}
