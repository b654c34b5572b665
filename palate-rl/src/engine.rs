// ---------------------------------------------------------------------------
// RlEngine — core state manager
// ---------------------------------------------------------------------------
//
// Integrates the sub-modules (score_store, events, reward, recommend,
// persistence) into a single stateful struct owning the learned state, the
// shown-event log, the hyperparameters, and the exploration RNG.
//
// Persistence is best-effort by contract: `load_state` falls back to an
// empty store and `save_state` logs failures; neither ever raises toward the
// caller. The engine expects a single owner — the server loop serializes all
// access, and embedders get a plain `&mut self` API with no interior locking.
// ---------------------------------------------------------------------------

use std::path::Path;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::events::EventRecorder;
use crate::persistence;
use crate::recommend;
use crate::reward;
use crate::score_store::ScoreStore;
use crate::types::{
	CandidateItem, EngineStats, OrderData, RewardInfo, ScoredItem, ShownEvent, TopItem,
	UserSummary,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Default checkpoint filename, relative to the working directory.
pub const DEFAULT_STATE_FILE: &str = "rl_state.json";

/// Number of entries reported in a user summary's top-items list.
const SUMMARY_TOP_ITEMS: usize = 5;

/// Process-wide learning constants, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct Hyperparameters {
	/// Learning rate α applied to rate-scaled Q updates.
	pub alpha: f64,
	/// Discount factor γ. Declared for the config surface; the current
	/// blending formula performs no temporal-difference discounting.
	pub gamma: f64,
	/// Exploration rate ε for the recommendation policy.
	pub epsilon: f64,
}

impl Default for Hyperparameters {
	fn default() -> Self {
		Self {
			alpha: 0.1,
			gamma: 0.9,
			epsilon: 0.1,
		}
	}
}

/// Configuration for an [`RlEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Checkpoint path. `None` disables persistence entirely.
	pub storage_path: Option<String>,
	pub hyperparameters: Hyperparameters,
	/// Fixed RNG seed for reproducible exploration; `None` seeds from
	/// entropy.
	pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			storage_path: Some(DEFAULT_STATE_FILE.to_string()),
			hyperparameters: Hyperparameters::default(),
			rng_seed: None,
		}
	}
}

// ---------------------------------------------------------------------------
// RlEngine
// ---------------------------------------------------------------------------

pub struct RlEngine {
	scores: ScoreStore,
	events: EventRecorder,
	params: Hyperparameters,
	rng: StdRng,
	config: EngineConfig,
	dirty: bool,
}

impl RlEngine {
	// -- Lifecycle -----------------------------------------------------------

	/// Create an engine with empty state. Call [`RlEngine::load_state`] to
	/// hydrate from a previous checkpoint.
	pub fn new(config: EngineConfig) -> Self {
		let rng = match config.rng_seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_entropy(),
		};

		Self {
			scores: ScoreStore::new(),
			events: EventRecorder::new(),
			params: config.hyperparameters,
			rng,
			config,
			dirty: false,
		}
	}

	/// Restore learned state from the configured checkpoint. A missing file
	/// is a cold start; a failed load leaves the store empty. Never fails.
	pub fn load_state(&mut self) {
		let path = match &self.config.storage_path {
			Some(path) => path.clone(),
			None => return,
		};

		match persistence::load_from_path(Path::new(&path), &mut self.scores) {
			Ok(true) => {
				let stats = self.stats();
				tracing::info!(
					"loaded RL state from {}: {} q-values, {} users, {} items",
					path,
					stats.q_values,
					stats.users,
					stats.items
				);
			}
			Ok(false) => {
				tracing::info!("no RL state at {}, starting fresh", path);
			}
			Err(e) => {
				tracing::warn!("failed to load RL state from {}: {}", path, e);
				self.scores.clear();
			}
		}
		self.dirty = false;
	}

	/// Checkpoint learned state to the configured path. Failures are logged
	/// and swallowed; the durable copy may be stale afterwards.
	pub fn save_state(&mut self) {
		let path = match &self.config.storage_path {
			Some(path) => path.clone(),
			None => return,
		};

		match persistence::save_to_path(Path::new(&path), &self.scores) {
			Ok(()) => {
				let stats = self.stats();
				tracing::info!(
					"saved RL state to {}: {} q-values, {} users, {} items",
					path,
					stats.q_values,
					stats.users,
					stats.items
				);
				self.dirty = false;
			}
			Err(e) => {
				tracing::warn!("failed to save RL state to {}: {}", path, e);
			}
		}
	}

	/// Save if anything changed since the last checkpoint.
	pub fn dispose(&mut self) {
		if self.dirty {
			self.save_state();
		}
	}

	// -- Event recording -----------------------------------------------------

	/// Record that a recommendation batch was shown; returns the event id.
	pub fn record_shown(&mut self, user_id: u64, recommendations: &[CandidateItem]) -> String {
		self.events.record_shown(user_id, recommendations)
	}

	/// Record that the user acted on an item. The event id, when present,
	/// ties the selection back to a shown batch for traceability; it does
	/// not change the update.
	pub fn record_selected(&mut self, user_id: u64, item_id: u64, event_id: Option<&str>) {
		if let Some(event_id) = event_id {
			tracing::debug!(
				"selection of item {} correlates with event {}",
				item_id,
				event_id
			);
		}
		reward::apply_selection(&mut self.scores, user_id, item_id, self.params.alpha);
		self.dirty = true;
	}

	/// Record a completed order and return the earned reward info.
	pub fn record_completed(&mut self, user_id: u64, order: &OrderData) -> RewardInfo {
		let reward = reward::apply_completion(&mut self.scores, user_id, order);
		self.dirty = true;

		RewardInfo {
			user_id,
			reward,
			items_count: order.items.len(),
			order_total: order.total,
			timestamp: Utc::now().to_rfc3339(),
		}
	}

	/// Record an explicit feedback score for a (user, item) pair.
	pub fn record_feedback(&mut self, user_id: u64, item_id: u64, score: f64) {
		if reward::apply_feedback(&mut self.scores, user_id, item_id, score, self.params.alpha)
			.is_some()
		{
			self.dirty = true;
		}
	}

	// -- Recommendation ------------------------------------------------------

	/// Score and rank candidates for a user. Returns at most 5 items,
	/// annotated with their score breakdown.
	pub fn recommend(&mut self, user_id: u64, candidates: Vec<CandidateItem>) -> Vec<ScoredItem> {
		let scored = recommend::score_candidates(&self.scores, user_id, candidates);
		recommend::select_ranked(scored, self.params.epsilon, &mut self.rng)
	}

	// -- Introspection -------------------------------------------------------

	/// Learning summary for a user: how many items carry a preference, the
	/// top preferences, and how many recommendation batches the user saw.
	pub fn summary(&self, user_id: u64) -> UserSummary {
		let mut prefs = self.scores.preferences_for_user(user_id);
		// Descending by score; ties broken by item id so the output is
		// stable across runs.
		prefs.sort_by(|a, b| {
			b.1.partial_cmp(&a.1)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.0.cmp(&b.0))
		});

		UserSummary {
			user_id,
			learned_items: prefs.len(),
			top_items: prefs
				.iter()
				.take(SUMMARY_TOP_ITEMS)
				.map(|&(item_id, preference_score)| TopItem {
					item_id,
					preference_score,
				})
				.collect(),
			total_interactions: self.events.count_for_user(user_id),
		}
	}

	pub fn stats(&self) -> EngineStats {
		EngineStats {
			q_values: self.scores.q_len(),
			users: self.scores.user_count(),
			items: self.scores.item_count(),
			shown_events: self.events.len(),
		}
	}

	pub fn shown_event(&self, event_id: &str) -> Option<&ShownEvent> {
		self.events.get(event_id)
	}

	pub fn scores(&self) -> &ScoreStore {
		&self.scores
	}

	pub fn is_dirty(&self) -> bool {
		self.dirty
	}

	/// Drop all learned state and the event log.
	pub fn clear(&mut self) {
		self.scores.clear();
		self.events.clear();
		self.dirty = true;
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::OrderLine;

	fn engine() -> RlEngine {
		// No persistence, fixed seed.
		RlEngine::new(EngineConfig {
			storage_path: None,
			hyperparameters: Hyperparameters::default(),
			rng_seed: Some(17),
		})
	}

	fn engine_with_epsilon(epsilon: f64) -> RlEngine {
		RlEngine::new(EngineConfig {
			storage_path: None,
			hyperparameters: Hyperparameters {
				epsilon,
				..Hyperparameters::default()
			},
			rng_seed: Some(17),
		})
	}

	fn candidate(item_id: u64, name: &str) -> CandidateItem {
		CandidateItem {
			item_id,
			name: name.to_string(),
			extra: serde_json::Map::new(),
		}
	}

	fn order(lines: &[(u64, u32)], total: f64) -> OrderData {
		OrderData {
			items: lines
				.iter()
				.map(|&(item_id, quantity)| OrderLine { item_id, quantity })
				.collect(),
			total,
		}
	}

	// -- cold start tests -----------------------------------------------------

	#[test]
	fn cold_start_recommends_in_input_order() {
		let mut engine = engine_with_epsilon(0.0);
		let candidates = vec![
			candidate(4, "d"),
			candidate(2, "b"),
			candidate(9, "i"),
		];
		let result = engine.recommend(1, candidates);

		// All scores are zero, so the stable sort keeps input order.
		assert_eq!(result.len(), 3);
		assert_eq!(result[0].item_id, 4);
		assert_eq!(result[1].item_id, 2);
		assert_eq!(result[2].item_id, 9);
		for item in &result {
			assert_eq!(item.rl_score, 0.0);
			assert_eq!(item.q_value, 0.0);
			assert_eq!(item.preference, 0.0);
		}
	}

	#[test]
	fn load_state_without_file_is_cold_start() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("absent.json");
		let mut engine = RlEngine::new(EngineConfig {
			storage_path: Some(path.to_string_lossy().into_owned()),
			hyperparameters: Hyperparameters::default(),
			rng_seed: Some(1),
		});
		engine.load_state();

		let stats = engine.stats();
		assert_eq!(stats.q_values, 0);
		assert_eq!(stats.users, 0);
		assert_eq!(stats.items, 0);
	}

	// -- learning flow tests --------------------------------------------------

	#[test]
	fn selections_shift_the_ranking() {
		let mut engine = engine_with_epsilon(0.0);
		for _ in 0..3 {
			engine.record_selected(1, 20, None);
		}

		let result = engine.recommend(1, vec![candidate(10, "a"), candidate(20, "b")]);
		assert_eq!(result[0].item_id, 20);
		assert!(result[0].rl_score > result[1].rl_score);
	}

	#[test]
	fn completed_order_returns_reward_info() {
		let mut engine = engine();
		let info = engine.record_completed(3, &order(&[(1, 2), (2, 1)], 600.0));

		assert_eq!(info.user_id, 3);
		assert!((info.reward - 1.5).abs() < 1e-12);
		assert_eq!(info.items_count, 2);
		assert!((info.order_total - 600.0).abs() < 1e-12);
		assert!(!info.timestamp.is_empty());
	}

	#[test]
	fn popularity_crosses_users() {
		let mut engine = engine_with_epsilon(0.0);
		// User 2 orders item 20 heavily; user 1 has no history.
		for _ in 0..10 {
			engine.record_selected(2, 20, None);
		}

		let result = engine.recommend(1, vec![candidate(10, "a"), candidate(20, "b")]);
		assert_eq!(result[0].item_id, 20);
		// Personal signals stay zero for user 1.
		assert_eq!(result[0].q_value, 0.0);
		assert_eq!(result[0].preference, 0.0);
		assert!(result[0].rl_score > 0.0);
	}

	#[test]
	fn shown_events_are_retrievable_and_counted() {
		let mut engine = engine();
		let id = engine.record_shown(1, &[candidate(10, "a")]);
		engine.record_shown(1, &[candidate(11, "b")]);
		engine.record_shown(2, &[candidate(12, "c")]);

		let event = engine.shown_event(&id).unwrap();
		assert_eq!(event.user_id, 1);
		assert_eq!(engine.summary(1).total_interactions, 2);
		assert_eq!(engine.summary(2).total_interactions, 1);
	}

	// -- summary tests --------------------------------------------------------

	#[test]
	fn summary_ranks_top_items_by_preference() {
		let mut engine = engine();
		engine.record_feedback(1, 10, 0.2);
		engine.record_feedback(1, 11, 0.9);
		engine.record_feedback(1, 12, 0.5);

		let summary = engine.summary(1);
		assert_eq!(summary.user_id, 1);
		assert_eq!(summary.learned_items, 3);
		assert_eq!(summary.top_items.len(), 3);
		assert_eq!(summary.top_items[0].item_id, 11);
		assert_eq!(summary.top_items[1].item_id, 12);
		assert_eq!(summary.top_items[2].item_id, 10);
	}

	#[test]
	fn summary_caps_top_items_at_five() {
		let mut engine = engine();
		for item_id in 0..8 {
			engine.record_feedback(1, item_id, 0.1 * (item_id + 1) as f64);
		}
		let summary = engine.summary(1);
		assert_eq!(summary.learned_items, 8);
		assert_eq!(summary.top_items.len(), 5);
		assert_eq!(summary.top_items[0].item_id, 7);
	}

	#[test]
	fn summary_for_unknown_user_is_empty() {
		let engine = engine();
		let summary = engine.summary(42);
		assert_eq!(summary.learned_items, 0);
		assert!(summary.top_items.is_empty());
		assert_eq!(summary.total_interactions, 0);
	}

	// -- persistence lifecycle tests ------------------------------------------

	#[test]
	fn state_survives_engine_restart() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("rl_state.json");
		let config = EngineConfig {
			storage_path: Some(path.to_string_lossy().into_owned()),
			hyperparameters: Hyperparameters::default(),
			rng_seed: Some(1),
		};

		let mut first = RlEngine::new(config.clone());
		first.load_state();
		first.record_selected(1, 10, None);
		first.record_completed(1, &order(&[(10, 1)], 600.0));
		first.save_state();

		let mut second = RlEngine::new(config);
		second.load_state();
		assert!((second.scores().q(1, 10) - (0.1 + 1.5)).abs() < 1e-9);
		assert!((second.scores().preference(1, 10) - (0.2 + 1.5)).abs() < 1e-9);
		assert!((second.scores().popularity(10) - (0.1 + 0.5)).abs() < 1e-9);
	}

	#[test]
	fn dirty_tracks_updates_and_saves() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("rl_state.json");
		let mut engine = RlEngine::new(EngineConfig {
			storage_path: Some(path.to_string_lossy().into_owned()),
			hyperparameters: Hyperparameters::default(),
			rng_seed: Some(1),
		});

		assert!(!engine.is_dirty());
		engine.record_selected(1, 10, None);
		assert!(engine.is_dirty());

		engine.save_state();
		assert!(!engine.is_dirty());
		assert!(path.exists());
	}

	#[test]
	fn dispose_saves_only_when_dirty() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("rl_state.json");
		let mut engine = RlEngine::new(EngineConfig {
			storage_path: Some(path.to_string_lossy().into_owned()),
			hyperparameters: Hyperparameters::default(),
			rng_seed: Some(1),
		});

		engine.dispose();
		assert!(!path.exists());

		engine.record_feedback(1, 10, 0.5);
		engine.dispose();
		assert!(path.exists());
	}

	#[test]
	fn save_without_storage_path_is_a_no_op() {
		let mut engine = engine();
		engine.record_selected(1, 10, None);
		engine.save_state();
		// Still dirty: nothing was written anywhere.
		assert!(engine.is_dirty());
	}

	// -- recommendation policy tests ------------------------------------------

	#[test]
	fn recommendation_cap_holds_at_five() {
		let mut engine = engine_with_epsilon(0.0);
		let many: Vec<CandidateItem> = (0..10).map(|i| candidate(i, "x")).collect();
		assert_eq!(engine.recommend(1, many).len(), 5);

		let few: Vec<CandidateItem> = (0..2).map(|i| candidate(i, "x")).collect();
		assert_eq!(engine.recommend(1, few).len(), 2);
	}

	#[test]
	fn fixed_seed_makes_exploration_reproducible() {
		let run = |seed: u64| -> Vec<Vec<u64>> {
			let mut engine = RlEngine::new(EngineConfig {
				storage_path: None,
				hyperparameters: Hyperparameters {
					epsilon: 0.5,
					..Hyperparameters::default()
				},
				rng_seed: Some(seed),
			});
			engine.record_selected(1, 3, None);
			(0..20)
				.map(|_| {
					engine
						.recommend(1, (0..6).map(|i| candidate(i, "x")).collect())
						.iter()
						.map(|item| item.item_id)
						.collect()
				})
				.collect()
		};

		assert_eq!(run(99), run(99));
	}

	#[test]
	fn clear_drops_learned_state() {
		let mut engine = engine();
		engine.record_selected(1, 10, None);
		engine.record_shown(1, &[candidate(10, "a")]);
		engine.clear();

		let stats = engine.stats();
		assert_eq!(stats.q_values, 0);
		assert_eq!(stats.shown_events, 0);
		assert_eq!(engine.summary(1).learned_items, 0);
	}
}
