// ---------------------------------------------------------------------------
// Reward shaping — event-to-score update rules
// ---------------------------------------------------------------------------
//
// Translates the three observed event kinds into score mutations:
//
// 1. Item selected — small myopic nudge (Q by the learning rate, preference
//    and popularity by fixed steps).
// 2. Order completed — order-level reward (base 1.0 plus high-value and
//    multi-item bonuses), applied in full to every line item.
// 3. Explicit feedback — score normalized into [0, 1], rate-scaled into the
//    Q-value and applied unscaled to the preference.
// ---------------------------------------------------------------------------

use crate::score_store::ScoreStore;
use crate::types::OrderData;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Reward for completing any order.
pub const BASE_ORDER_REWARD: f64 = 1.0;
/// Extra reward when the order total exceeds [`HIGH_VALUE_THRESHOLD`].
pub const HIGH_VALUE_BONUS: f64 = 0.5;
pub const HIGH_VALUE_THRESHOLD: f64 = 500.0;
/// Extra reward when the order has more than [`MULTI_ITEM_THRESHOLD`] lines.
pub const MULTI_ITEM_BONUS: f64 = 0.3;
pub const MULTI_ITEM_THRESHOLD: usize = 3;

/// Preference step for a single selection.
pub const SELECTION_PREFERENCE_STEP: f64 = 0.2;
/// Popularity step for a single selection.
pub const SELECTION_POPULARITY_STEP: f64 = 0.1;
/// Popularity per ordered unit on completion.
pub const COMPLETION_POPULARITY_FACTOR: f64 = 0.5;

/// Feedback above 1 is assumed to be on a 0–5 rating scale.
pub const FEEDBACK_SCALE: f64 = 5.0;

// ---------------------------------------------------------------------------
// Pure shaping functions
// ---------------------------------------------------------------------------

/// Compute the scalar reward for a completed order. Bonuses are additive and
/// independent.
pub fn order_reward(order: &OrderData) -> f64 {
	let mut reward = BASE_ORDER_REWARD;
	if order.total > HIGH_VALUE_THRESHOLD {
		reward += HIGH_VALUE_BONUS;
	}
	if order.items.len() > MULTI_ITEM_THRESHOLD {
		reward += MULTI_ITEM_BONUS;
	}
	reward
}

/// Normalize a feedback score into [0, 1]. Scores above 1 are treated as
/// 0–5 ratings and divided by [`FEEDBACK_SCALE`].
pub fn normalize_feedback(score: f64) -> f64 {
	if score > 1.0 {
		score / FEEDBACK_SCALE
	} else {
		score
	}
}

// ---------------------------------------------------------------------------
// Update entry points
// ---------------------------------------------------------------------------

/// Apply the selection nudge for a (user, item) pair.
pub fn apply_selection(store: &mut ScoreStore, user_id: u64, item_id: u64, alpha: f64) {
	let old_q = store.q(user_id, item_id);
	store.add_q(user_id, item_id, alpha);
	store.add_preference(user_id, item_id, SELECTION_PREFERENCE_STEP);
	store.add_popularity(item_id, SELECTION_POPULARITY_STEP);

	tracing::debug!(
		"selection: user {} item {} q {:.3} -> {:.3}",
		user_id,
		item_id,
		old_q,
		store.q(user_id, item_id)
	);
}

/// Apply the completion reward to every line of an order. The full order
/// reward goes to each line item, undivided. Returns the reward.
pub fn apply_completion(store: &mut ScoreStore, user_id: u64, order: &OrderData) -> f64 {
	let reward = order_reward(order);

	for line in &order.items {
		let old_q = store.q(user_id, line.item_id);
		let old_pref = store.preference(user_id, line.item_id);

		store.add_q(user_id, line.item_id, reward);
		store.add_preference(user_id, line.item_id, reward);
		store.add_popularity(line.item_id, f64::from(line.quantity) * COMPLETION_POPULARITY_FACTOR);

		tracing::debug!(
			"completion: user {} item {} q {:.3} -> {:.3} pref {:.3} -> {:.3}",
			user_id,
			line.item_id,
			old_q,
			store.q(user_id, line.item_id),
			old_pref,
			store.preference(user_id, line.item_id)
		);
	}

	tracing::info!(
		"order completed: user {} reward {:.2} items {} total {:.2}",
		user_id,
		reward,
		order.items.len(),
		order.total
	);

	reward
}

/// Apply an explicit feedback score. Returns the normalized score actually
/// applied, or `None` when the input was not a finite number.
pub fn apply_feedback(
	store: &mut ScoreStore,
	user_id: u64,
	item_id: u64,
	score: f64,
	alpha: f64,
) -> Option<f64> {
	if !score.is_finite() {
		tracing::warn!(
			"ignoring non-finite feedback for user {} item {}",
			user_id,
			item_id
		);
		return None;
	}

	let normalized = normalize_feedback(score);
	store.add_q(user_id, item_id, normalized * alpha);
	store.add_preference(user_id, item_id, normalized);

	tracing::debug!(
		"feedback: user {} rated item {} {:.2}/1.0",
		user_id,
		item_id,
		normalized
	);

	Some(normalized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::OrderLine;

	const ALPHA: f64 = 0.1;

	fn order(lines: &[(u64, u32)], total: f64) -> OrderData {
		OrderData {
			items: lines
				.iter()
				.map(|&(item_id, quantity)| OrderLine { item_id, quantity })
				.collect(),
			total,
		}
	}

	// -- order_reward tests ---------------------------------------------------

	#[test]
	fn plain_order_earns_base_reward() {
		let o = order(&[(1, 1)], 100.0);
		assert!((order_reward(&o) - 1.0).abs() < 1e-12);
	}

	#[test]
	fn high_value_multi_item_order_earns_both_bonuses() {
		let o = order(&[(1, 1), (2, 1), (3, 1), (4, 1)], 600.0);
		assert!((order_reward(&o) - 1.8).abs() < 1e-12);
	}

	#[test]
	fn bonuses_are_independent() {
		let high_value = order(&[(1, 1)], 600.0);
		assert!((order_reward(&high_value) - 1.5).abs() < 1e-12);

		let many_items = order(&[(1, 1), (2, 1), (3, 1), (4, 1)], 100.0);
		assert!((order_reward(&many_items) - 1.3).abs() < 1e-12);
	}

	#[test]
	fn thresholds_are_strict() {
		// Exactly 500 total and exactly 3 lines earn no bonus.
		let o = order(&[(1, 1), (2, 1), (3, 1)], 500.0);
		assert!((order_reward(&o) - 1.0).abs() < 1e-12);
	}

	// -- selection tests ------------------------------------------------------

	#[test]
	fn selection_is_monotonic_in_call_count() {
		let mut store = ScoreStore::new();
		let n = 4;
		for _ in 0..n {
			apply_selection(&mut store, 1, 10, ALPHA);
		}
		assert!((store.q(1, 10) - f64::from(n) * ALPHA).abs() < 1e-9);
		assert!((store.preference(1, 10) - f64::from(n) * SELECTION_PREFERENCE_STEP).abs() < 1e-9);
		assert!((store.popularity(10) - f64::from(n) * SELECTION_POPULARITY_STEP).abs() < 1e-9);
	}

	// -- completion tests -----------------------------------------------------

	#[test]
	fn completion_applies_full_reward_per_line() {
		// Two lines, total 600: reward 1.5 (high-value bonus only).
		let mut store = ScoreStore::new();
		let o = order(&[(1, 2), (2, 1)], 600.0);
		let reward = apply_completion(&mut store, 5, &o);

		assert!((reward - 1.5).abs() < 1e-12);
		assert!((store.q(5, 1) - 1.5).abs() < 1e-9);
		assert!((store.q(5, 2) - 1.5).abs() < 1e-9);
		assert!((store.preference(5, 1) - 1.5).abs() < 1e-9);
		assert!((store.preference(5, 2) - 1.5).abs() < 1e-9);
		// Popularity is quantity-scaled.
		assert!((store.popularity(1) - 1.0).abs() < 1e-9);
		assert!((store.popularity(2) - 0.5).abs() < 1e-9);
	}

	#[test]
	fn completion_of_empty_order_touches_nothing() {
		let mut store = ScoreStore::new();
		let o = order(&[], 100.0);
		let reward = apply_completion(&mut store, 5, &o);
		assert!((reward - 1.0).abs() < 1e-12);
		assert!(store.is_empty());
	}

	// -- feedback tests -------------------------------------------------------

	#[test]
	fn feedback_above_one_is_rescaled() {
		assert!((normalize_feedback(4.5) - 0.9).abs() < 1e-12);
		assert!((normalize_feedback(0.9) - 0.9).abs() < 1e-12);
		assert!((normalize_feedback(1.0) - 1.0).abs() < 1e-12);
	}

	#[test]
	fn rated_and_normalized_feedback_are_equivalent() {
		let mut rated = ScoreStore::new();
		let mut direct = ScoreStore::new();

		apply_feedback(&mut rated, 1, 10, 4.5, ALPHA);
		apply_feedback(&mut direct, 1, 10, 0.9, ALPHA);

		assert!((rated.q(1, 10) - direct.q(1, 10)).abs() < 1e-12);
		assert!((rated.preference(1, 10) - direct.preference(1, 10)).abs() < 1e-12);
	}

	#[test]
	fn feedback_scales_q_but_not_preference() {
		let mut store = ScoreStore::new();
		let applied = apply_feedback(&mut store, 1, 10, 0.9, ALPHA).unwrap();
		assert!((applied - 0.9).abs() < 1e-12);
		assert!((store.q(1, 10) - 0.9 * ALPHA).abs() < 1e-12);
		assert!((store.preference(1, 10) - 0.9).abs() < 1e-12);
	}

	#[test]
	fn non_finite_feedback_is_ignored() {
		let mut store = ScoreStore::new();
		assert!(apply_feedback(&mut store, 1, 10, f64::NAN, ALPHA).is_none());
		assert!(store.is_empty());
	}
}
