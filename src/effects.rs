// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Node effects.
//!
//! Each effect is a closed variant with typed parameters. A variant has a base
//! transition over [`MatchState`] and, for the trigger family, a [`Cascade`]
//! that the simulator resolves after the base transition.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::MatchState;
use crate::types::Modifier;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EffectError {
    #[error("unknown effect identifier '{0}'")]
    UnknownEffect(String),
    #[error("effect '{effect}' is missing parameter '{param}'")]
    MissingParam { effect: String, param: String },
    #[error("effect '{effect}' parameter '{param}' has the wrong type")]
    InvalidParam { effect: String, param: String },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Effect parameters as supplied by a catalogue entry.
pub type EffectParams = BTreeMap<String, Value>;

/// What an additive multiplier effect reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplierSource {
    BattleBonus,
    Fixed(Decimal),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// multiplier += source * effect_mult
    AddToMultiplier { source: MultiplierSource, effect_mult: Decimal },
    /// pending += base + bb_multiplier * battle_bonus. Once per flip, when found
    /// exhausted, pending += |pending| * depleted_percent.
    ReduceLossByBonus { base_reduction: Decimal, bb_multiplier: Decimal, depleted_percent: Decimal },
    FlatCurrency { amount: Decimal },
    ReduceLossPerLoss { per_loss: Decimal },
    TriggerAdjacent,
    /// Only while pending is negative.
    ReduceLossPercent { percent: Decimal },
    PerTeammateClass { per_teammate: Decimal, class: String },
    /// Pays out again whatever was clawed back from the rank penalty.
    RewardPreventedLoss,
    PerBattleBonus { per_bb: Decimal },
    TriggerMostStocked { times: u32 },
    AddBonusAndTrigger { threshold_low: u32, threshold_high: u32 },
    TriggerRandomAdjacent,
    TriggerAdjacentMostStocked { times: u32 },
    XpPerDepleted { per_depleted: Decimal },
    MultiplyMultiplier { factor: Decimal },
    TriggerAdjacentPerLoss { per_loss: u32 },
    AddBattleBonus { amount: u32 },
    GoldPerPreventedLoss { loss_per_gold: i64 },
    DefencePerBonus { per_bb: Decimal },
    ReduceLossPerDepleted { per_depleted: Decimal },
}

/// Follow-up triggers an effect forces after its base transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    /// Every occupied neighbor, in neighbor order.
    AllNeighbors,
    /// The node with most remaining stock anywhere (excluding self), `times` times.
    MostStocked { times: u32 },
    /// The neighbor with most remaining stock, `times` times.
    MostStockedNeighbor { times: u32 },
    /// One uniformly random neighbor.
    RandomNeighbor,
    /// Distinct random neighbors; two above `high`, one above `low`.
    RandomNeighborsByBonus { low: u32, high: u32 },
    /// `per_loss * losses` independent random neighbor draws.
    RandomNeighborPerLoss { per_loss: u32 },
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

struct ParamReader<'a> {
    effect: &'a str,
    params: &'a EffectParams,
}

impl<'a> ParamReader<'a> {
    fn missing(&self, param: &str) -> EffectError {
        EffectError::MissingParam { effect: self.effect.to_string(), param: param.to_string() }
    }

    fn invalid(&self, param: &str) -> EffectError {
        EffectError::InvalidParam { effect: self.effect.to_string(), param: param.to_string() }
    }

    fn decimal_opt(&self, param: &str) -> Result<Option<Decimal>, EffectError> {
        match self.params.get(param) {
            None => Ok(None),
            Some(Value::Number(n)) => {
                let parsed = if let Some(i) = n.as_i64() {
                    Some(Decimal::from(i))
                } else {
                    n.to_string().parse::<Decimal>().ok()
                };
                parsed.map(Some).ok_or_else(|| self.invalid(param))
            }
            Some(_) => Err(self.invalid(param)),
        }
    }

    fn decimal(&self, param: &str) -> Result<Decimal, EffectError> {
        self.decimal_opt(param)?.ok_or_else(|| self.missing(param))
    }

    fn decimal_or(&self, param: &str, default: Decimal) -> Result<Decimal, EffectError> {
        Ok(self.decimal_opt(param)?.unwrap_or(default))
    }

    fn count_or(&self, param: &str, default: u32) -> Result<u32, EffectError> {
        match self.decimal_opt(param)? {
            None => Ok(default),
            Some(d) if d.fract().is_zero() && d >= Decimal::ZERO => {
                d.to_u32().ok_or_else(|| self.invalid(param))
            }
            Some(_) => Err(self.invalid(param)),
        }
    }

    fn string(&self, param: &str) -> Result<String, EffectError> {
        match self.params.get(param) {
            None => Err(self.missing(param)),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(self.invalid(param)),
        }
    }
}

impl Effect {
    /// Build an effect from its catalogue identifier and parameter map.
    pub fn from_parts(id: &str, params: &EffectParams) -> Result<Self, EffectError> {
        let p = ParamReader { effect: id, params };
        let effect = match id {
            "add_to_qmult" => {
                let source = match params.get("multiplier_source") {
                    None => MultiplierSource::BattleBonus,
                    Some(Value::String(s)) if s == "battle_bonus" => MultiplierSource::BattleBonus,
                    Some(Value::String(_)) => MultiplierSource::Fixed(p.decimal_or("base_value", Decimal::ZERO)?),
                    Some(_) => return Err(p.invalid("multiplier_source")),
                };
                Effect::AddToMultiplier { source, effect_mult: p.decimal_or("effect_mult", Decimal::ONE)? }
            }
            "reduce_qdown" => Effect::ReduceLossByBonus {
                base_reduction: p.decimal("base_reduction")?,
                bb_multiplier: p.decimal("bb_multiplier")?,
                depleted_percent: p.decimal_or("depleted_reduction_percent", Decimal::ZERO)?,
            },
            "flat_q" => Effect::FlatCurrency { amount: p.decimal("base_amount")? },
            "reduce_qdown_per_loss" => Effect::ReduceLossPerLoss { per_loss: p.decimal("base_per_loss")? },
            "trigger_adjacent" => Effect::TriggerAdjacent,
            "reduce_qdown_percent" => Effect::ReduceLossPercent { percent: p.decimal("base_percent")? },
            "flat_q_per_teammate_class" => Effect::PerTeammateClass {
                per_teammate: p.decimal("base_per_teammate")?,
                class: p.string("teammate_class")?,
            },
            "q_per_qdown_prevented" => Effect::RewardPreventedLoss,
            "flat_q_per_bb" => Effect::PerBattleBonus { per_bb: p.decimal("q_per_bb")? },
            "trigger_most_avs" => Effect::TriggerMostStocked { times: p.count_or("num_triggers", 2)? },
            "add_bb_and_trigger" => Effect::AddBonusAndTrigger {
                threshold_low: p.count_or("bb_threshold_1", 5)?,
                threshold_high: p.count_or("bb_threshold_2", 10)?,
            },
            "trigger_random_adjacent" => Effect::TriggerRandomAdjacent,
            "trigger_adjacent_most_avs" => Effect::TriggerAdjacentMostStocked { times: p.count_or("num_triggers", 2)? },
            "xp_per_depleted" => Effect::XpPerDepleted { per_depleted: p.decimal_or("xp_per_depleted", dec!(500))? },
            "multiply_qmult" => Effect::MultiplyMultiplier { factor: p.decimal_or("multiplier", dec!(3))? },
            "trigger_adjacent_per_loss" => Effect::TriggerAdjacentPerLoss { per_loss: p.count_or("nodes_per_loss", 2)? },
            "add_bb" => Effect::AddBattleBonus { amount: p.count_or("bb_increase", 1)? },
            "gold_per_qdown_prevented" => {
                let per = p.count_or("qdown_per_gold", 33)?;
                if per == 0 {
                    return Err(p.invalid("qdown_per_gold"));
                }
                Effect::GoldPerPreventedLoss { loss_per_gold: i64::from(per) }
            }
            "defence_per_bb" => Effect::DefencePerBonus { per_bb: p.decimal_or("defence_per_bb", dec!(2))? },
            "teammate_qdown_reduction_per_depleted" => {
                Effect::ReduceLossPerDepleted { per_depleted: p.decimal("base_per_depleted")? }
            }
            other => return Err(EffectError::UnknownEffect(other.to_string())),
        };
        Ok(effect)
    }

    /// Catalogue identifier of this effect.
    pub fn id(&self) -> &'static str {
        match self {
            Effect::AddToMultiplier { .. } => "add_to_qmult",
            Effect::ReduceLossByBonus { .. } => "reduce_qdown",
            Effect::FlatCurrency { .. } => "flat_q",
            Effect::ReduceLossPerLoss { .. } => "reduce_qdown_per_loss",
            Effect::TriggerAdjacent => "trigger_adjacent",
            Effect::ReduceLossPercent { .. } => "reduce_qdown_percent",
            Effect::PerTeammateClass { .. } => "flat_q_per_teammate_class",
            Effect::RewardPreventedLoss => "q_per_qdown_prevented",
            Effect::PerBattleBonus { .. } => "flat_q_per_bb",
            Effect::TriggerMostStocked { .. } => "trigger_most_avs",
            Effect::AddBonusAndTrigger { .. } => "add_bb_and_trigger",
            Effect::TriggerRandomAdjacent => "trigger_random_adjacent",
            Effect::TriggerAdjacentMostStocked { .. } => "trigger_adjacent_most_avs",
            Effect::XpPerDepleted { .. } => "xp_per_depleted",
            Effect::MultiplyMultiplier { .. } => "multiply_qmult",
            Effect::TriggerAdjacentPerLoss { .. } => "trigger_adjacent_per_loss",
            Effect::AddBattleBonus { .. } => "add_bb",
            Effect::GoldPerPreventedLoss { .. } => "gold_per_qdown_prevented",
            Effect::DefencePerBonus { .. } => "defence_per_bb",
            Effect::ReduceLossPerDepleted { .. } => "teammate_qdown_reduction_per_depleted",
        }
    }

    /// Apply purchased upgrades. `lookup` yields the replacing value for a
    /// modifier kind, or `None` when no purchased step carries it.
    pub fn upgraded(&self, lookup: impl Fn(Modifier) -> Option<Decimal>) -> Effect {
        let mut effect = self.clone();
        match &mut effect {
            Effect::AddToMultiplier { effect_mult, .. } => {
                if let Some(v) = lookup(Modifier::EffectMult) {
                    *effect_mult = v;
                }
            }
            Effect::ReduceLossByBonus { bb_multiplier, depleted_percent, .. } => {
                if let Some(v) = lookup(Modifier::BbMultiplierIncrease) {
                    *bb_multiplier = v;
                }
                if let Some(v) = lookup(Modifier::DepletedReductionPercent) {
                    *depleted_percent = v;
                }
            }
            Effect::FlatCurrency { amount } => {
                if let Some(v) = lookup(Modifier::QIncrease) {
                    *amount = v;
                }
            }
            Effect::ReduceLossPerLoss { per_loss } => {
                if let Some(v) = lookup(Modifier::PerLossIncrease) {
                    *per_loss = v;
                }
            }
            Effect::ReduceLossPercent { percent } => {
                if let Some(v) = lookup(Modifier::PercentIncrease) {
                    *percent = v;
                }
            }
            Effect::PerTeammateClass { per_teammate, .. } => {
                if let Some(v) = lookup(Modifier::PerTeammateIncrease) {
                    *per_teammate = v;
                }
            }
            Effect::ReduceLossPerDepleted { per_depleted } => {
                if let Some(v) = lookup(Modifier::PerDepletedIncrease) {
                    *per_depleted = v;
                }
            }
            _ => {}
        }
        effect
    }

    pub fn cascade(&self) -> Option<Cascade> {
        match *self {
            Effect::TriggerAdjacent => Some(Cascade::AllNeighbors),
            Effect::TriggerMostStocked { times } => Some(Cascade::MostStocked { times }),
            Effect::AddBonusAndTrigger { threshold_low, threshold_high } => {
                Some(Cascade::RandomNeighborsByBonus { low: threshold_low, high: threshold_high })
            }
            Effect::TriggerRandomAdjacent => Some(Cascade::RandomNeighbor),
            Effect::TriggerAdjacentMostStocked { times } => Some(Cascade::MostStockedNeighbor { times }),
            Effect::TriggerAdjacentPerLoss { per_loss } => Some(Cascade::RandomNeighborPerLoss { per_loss }),
            _ => None,
        }
    }

    /// Whether the base transition reads the count of exhausted nodes.
    pub fn reads_depleted_count(&self) -> bool {
        matches!(self, Effect::XpPerDepleted { .. } | Effect::ReduceLossPerDepleted { .. })
    }

    /// Run the base transition. `depleted` is the number of exhausted nodes
    /// after this node's own trigger was counted; it is only meaningful when
    /// [`Effect::reads_depleted_count`] is true.
    pub fn apply(&self, state: &mut MatchState, depleted: u32) {
        let bb = Decimal::from(state.battle_bonus);
        match self {
            Effect::AddToMultiplier { source, effect_mult } => {
                let base = match source {
                    MultiplierSource::BattleBonus => bb,
                    MultiplierSource::Fixed(v) => *v,
                };
                state.multiplier += base * *effect_mult;
            }
            Effect::ReduceLossByBonus { base_reduction, bb_multiplier, .. } => {
                state.pending += units(*base_reduction + *bb_multiplier * bb);
            }
            Effect::FlatCurrency { amount } => state.pending += units(*amount),
            Effect::ReduceLossPerLoss { per_loss } => {
                state.pending += units(*per_loss * Decimal::from(state.losses()));
            }
            Effect::ReduceLossPercent { percent } => {
                if state.pending < 0 {
                    state.pending += units(Decimal::from(state.pending.unsigned_abs()) * *percent);
                }
            }
            Effect::PerTeammateClass { per_teammate, .. } => {
                state.pending += units(*per_teammate * Decimal::from(state.teammate_count));
            }
            Effect::RewardPreventedLoss => {
                let prevented = state.loss_prevented();
                if prevented > 0 {
                    state.pending += prevented;
                }
            }
            Effect::PerBattleBonus { per_bb } => state.pending += units(*per_bb * bb),
            Effect::AddBonusAndTrigger { .. } => state.battle_bonus += 1,
            Effect::XpPerDepleted { per_depleted } => {
                state.xp += units(*per_depleted * Decimal::from(depleted));
            }
            Effect::MultiplyMultiplier { factor } => state.multiplier *= *factor,
            Effect::AddBattleBonus { amount } => state.battle_bonus += *amount,
            Effect::GoldPerPreventedLoss { loss_per_gold } => {
                let prevented = state.loss_prevented();
                if prevented > 0 {
                    state.gold += prevented / *loss_per_gold;
                }
            }
            Effect::DefencePerBonus { per_bb } => state.defence += units(*per_bb * bb),
            Effect::ReduceLossPerDepleted { per_depleted } => {
                state.pending += units(*per_depleted * Decimal::from(depleted));
            }
            Effect::TriggerAdjacent
            | Effect::TriggerMostStocked { .. }
            | Effect::TriggerRandomAdjacent
            | Effect::TriggerAdjacentMostStocked { .. }
            | Effect::TriggerAdjacentPerLoss { .. } => {}
        }
    }

    /// One-shot bonus applied when the node is found exhausted. Returns true
    /// if the effect has such a bonus and it was applied.
    pub fn apply_depleted_bonus(&self, state: &mut MatchState) -> bool {
        match self {
            Effect::ReduceLossByBonus { depleted_percent, .. } if *depleted_percent > Decimal::ZERO => {
                state.pending += units(Decimal::from(state.pending.unsigned_abs()) * *depleted_percent);
                true
            }
            _ => false,
        }
    }
}

/// Truncate toward zero into whole currency units.
pub(crate) fn units(value: Decimal) -> i64 {
    value.trunc().to_i64().unwrap_or(if value.is_sign_negative() { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranks::RankRewards;
    use serde_json::json;

    fn params(v: Value) -> EffectParams {
        serde_json::from_value(v).expect("test: params map")
    }

    fn loss_state(penalty: i64) -> MatchState {
        let mut state = MatchState::new(1, 0);
        state.begin_flip(crate::types::FlipOutcome::Loss, RankRewards::flat(100, penalty));
        state
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = Effect::from_parts("summon_dragon", &EffectParams::new()).unwrap_err();
        assert_eq!(err, EffectError::UnknownEffect("summon_dragon".into()));
    }

    #[test]
    fn missing_param_is_rejected() {
        let err = Effect::from_parts("reduce_qdown", &params(json!({"base_reduction": 350}))).unwrap_err();
        assert!(matches!(err, EffectError::MissingParam { ref param, .. } if param == "bb_multiplier"));
    }

    #[test]
    fn mistyped_param_is_rejected() {
        let err = Effect::from_parts("flat_q", &params(json!({"base_amount": "lots"}))).unwrap_err();
        assert!(matches!(err, EffectError::InvalidParam { .. }));
    }

    #[test]
    fn identifiers_round_trip_through_id() {
        let e = Effect::from_parts("trigger_adjacent_most_avs", &params(json!({"num_triggers": 3})))
            .expect("test: parse");
        assert_eq!(e, Effect::TriggerAdjacentMostStocked { times: 3 });
        assert_eq!(e.id(), "trigger_adjacent_most_avs");
        assert_eq!(e.cascade(), Some(Cascade::MostStockedNeighbor { times: 3 }));
    }

    #[test]
    fn fractional_params_parse_exactly() {
        let e = Effect::from_parts("reduce_qdown_percent", &params(json!({"base_percent": 0.03})))
            .expect("test: parse");
        assert_eq!(e, Effect::ReduceLossPercent { percent: dec!(0.03) });
    }

    #[test]
    fn reduce_loss_scales_with_battle_bonus() {
        let e = Effect::ReduceLossByBonus {
            base_reduction: dec!(350),
            bb_multiplier: dec!(50),
            depleted_percent: Decimal::ZERO,
        };
        let mut state = loss_state(1000);
        state.battle_bonus = 3;
        e.apply(&mut state, 0);
        assert_eq!(state.pending, -1000 + 350 + 150);
    }

    #[test]
    fn percent_reduction_only_applies_to_negative_pending() {
        let e = Effect::ReduceLossPercent { percent: dec!(0.05) };
        let mut state = loss_state(1010);
        e.apply(&mut state, 0);
        assert_eq!(state.pending, -1010 + 50);

        state.pending = 200;
        e.apply(&mut state, 0);
        assert_eq!(state.pending, 200);
    }

    #[test]
    fn prevented_loss_is_paid_again() {
        let mut state = loss_state(1000);
        state.pending = -600;
        Effect::RewardPreventedLoss.apply(&mut state, 0);
        assert_eq!(state.pending, -200);

        let mut untouched = loss_state(1000);
        Effect::RewardPreventedLoss.apply(&mut untouched, 0);
        assert_eq!(untouched.pending, -1000);
    }

    #[test]
    fn gold_floors_prevented_loss() {
        let mut state = loss_state(1000);
        state.pending = -900;
        Effect::GoldPerPreventedLoss { loss_per_gold: 33 }.apply(&mut state, 0);
        assert_eq!(state.gold, 3);
    }

    #[test]
    fn depleted_bonus_only_with_positive_percent() {
        let mut state = loss_state(10_000);
        let plain = Effect::ReduceLossByBonus {
            base_reduction: dec!(350),
            bb_multiplier: dec!(50),
            depleted_percent: Decimal::ZERO,
        };
        assert!(!plain.apply_depleted_bonus(&mut state));
        assert_eq!(state.pending, -10_000);

        let upgraded = plain.upgraded(|m| (m == Modifier::DepletedReductionPercent).then_some(dec!(0.03)));
        assert!(upgraded.apply_depleted_bonus(&mut state));
        assert_eq!(state.pending, -10_000 + 300);
    }

    #[test]
    fn upgraded_replaces_only_matching_parameter() {
        let base = Effect::FlatCurrency { amount: dec!(4500) };
        assert_eq!(base.upgraded(|_| None), base);
        let up = base.upgraded(|m| (m == Modifier::QIncrease).then_some(dec!(7000)));
        assert_eq!(up, Effect::FlatCurrency { amount: dec!(7000) });
        // unrelated modifier kinds leave the effect untouched
        let other = base.upgraded(|m| (m == Modifier::PercentIncrease).then_some(dec!(0.5)));
        assert_eq!(other, base);
    }

    #[test]
    fn multiplier_effects_compose() {
        let mut state = loss_state(100);
        state.battle_bonus = 2;
        Effect::AddToMultiplier { source: MultiplierSource::BattleBonus, effect_mult: dec!(2) }.apply(&mut state, 0);
        assert_eq!(state.multiplier, dec!(5));
        Effect::MultiplyMultiplier { factor: dec!(3) }.apply(&mut state, 0);
        assert_eq!(state.multiplier, dec!(15));
    }

    #[test]
    fn units_truncates_toward_zero() {
        assert_eq!(units(dec!(30.9)), 30);
        assert_eq!(units(dec!(-30.9)), -30);
    }
}
