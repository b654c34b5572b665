// ---------------------------------------------------------------------------
// ScoreStore — learned value state
// ---------------------------------------------------------------------------
//
// Holds the three score mappings the reward updates and the recommender
// operate on:
//
// 1. Q-values — per (user, item) accumulated reward credit.
// 2. Preferences — per (user, item) affinity weight, updated on different
//    triggers and with different magnitudes than the Q-value.
// 3. Popularity — per item, cross-user engagement counter.
//
// Reads of absent keys return 0.0 without materializing an entry; only the
// `add_*` / `set_*` writers insert. Non-finite values are never stored.
// ---------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// PairKey
// ---------------------------------------------------------------------------

/// Compound (user, item) key with a reversible flat-string encoding for
/// persistence. The underscore delimiter is unambiguous: both components are
/// decimal integers and cannot contain it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey {
	pub user_id: u64,
	pub item_id: u64,
}

impl PairKey {
	pub fn new(user_id: u64, item_id: u64) -> Self {
		Self { user_id, item_id }
	}

	/// Encode as `"{user}_{item}"`.
	pub fn encode(&self) -> String {
		format!("{}_{}", self.user_id, self.item_id)
	}

	/// Decode a `"{user}_{item}"` string. Returns `None` for anything that
	/// is not exactly two underscore-separated decimal integers.
	pub fn decode(encoded: &str) -> Option<Self> {
		let (user, item) = encoded.split_once('_')?;
		Some(Self {
			user_id: user.parse().ok()?,
			item_id: item.parse().ok()?,
		})
	}
}

// ---------------------------------------------------------------------------
// ScoreStore
// ---------------------------------------------------------------------------

/// In-memory container for the three learned score mappings.
#[derive(Debug, Default)]
pub struct ScoreStore {
	q_values: HashMap<PairKey, f64>,
	preferences: HashMap<PairKey, f64>,
	popularity: HashMap<u64, f64>,
}

impl ScoreStore {
	pub fn new() -> Self {
		Self::default()
	}

	// -- Reads (default-zero, never materialize) -----------------------------

	pub fn q(&self, user_id: u64, item_id: u64) -> f64 {
		self.q_values
			.get(&PairKey::new(user_id, item_id))
			.copied()
			.unwrap_or(0.0)
	}

	pub fn preference(&self, user_id: u64, item_id: u64) -> f64 {
		self.preferences
			.get(&PairKey::new(user_id, item_id))
			.copied()
			.unwrap_or(0.0)
	}

	pub fn popularity(&self, item_id: u64) -> f64 {
		self.popularity.get(&item_id).copied().unwrap_or(0.0)
	}

	// -- Writes (upsert) -----------------------------------------------------

	pub fn add_q(&mut self, user_id: u64, item_id: u64, delta: f64) {
		if !delta.is_finite() {
			tracing::warn!(
				"dropping non-finite q delta for user {} item {}",
				user_id,
				item_id
			);
			return;
		}
		*self
			.q_values
			.entry(PairKey::new(user_id, item_id))
			.or_insert(0.0) += delta;
	}

	pub fn add_preference(&mut self, user_id: u64, item_id: u64, delta: f64) {
		if !delta.is_finite() {
			tracing::warn!(
				"dropping non-finite preference delta for user {} item {}",
				user_id,
				item_id
			);
			return;
		}
		*self
			.preferences
			.entry(PairKey::new(user_id, item_id))
			.or_insert(0.0) += delta;
	}

	pub fn add_popularity(&mut self, item_id: u64, delta: f64) {
		if !delta.is_finite() {
			tracing::warn!("dropping non-finite popularity delta for item {}", item_id);
			return;
		}
		*self.popularity.entry(item_id).or_insert(0.0) += delta;
	}

	// -- Absolute writes (used by state restore) -----------------------------

	pub fn set_q(&mut self, key: PairKey, value: f64) {
		if !value.is_finite() {
			tracing::warn!("dropping non-finite q value for key {}", key.encode());
			return;
		}
		self.q_values.insert(key, value);
	}

	pub fn set_preference(&mut self, key: PairKey, value: f64) {
		if !value.is_finite() {
			tracing::warn!(
				"dropping non-finite preference value for key {}",
				key.encode()
			);
			return;
		}
		self.preferences.insert(key, value);
	}

	pub fn set_popularity(&mut self, item_id: u64, value: f64) {
		if !value.is_finite() {
			tracing::warn!("dropping non-finite popularity value for item {}", item_id);
			return;
		}
		self.popularity.insert(item_id, value);
	}

	// -- Iteration / aggregation ---------------------------------------------

	pub fn q_entries(&self) -> impl Iterator<Item = (&PairKey, &f64)> {
		self.q_values.iter()
	}

	pub fn preference_entries(&self) -> impl Iterator<Item = (&PairKey, &f64)> {
		self.preferences.iter()
	}

	pub fn popularity_entries(&self) -> impl Iterator<Item = (&u64, &f64)> {
		self.popularity.iter()
	}

	/// All (item, preference) pairs recorded for a user, in arbitrary order.
	pub fn preferences_for_user(&self, user_id: u64) -> Vec<(u64, f64)> {
		self.preferences
			.iter()
			.filter(|(key, _)| key.user_id == user_id)
			.map(|(key, value)| (key.item_id, *value))
			.collect()
	}

	// -- Size ----------------------------------------------------------------

	pub fn q_len(&self) -> usize {
		self.q_values.len()
	}

	pub fn user_count(&self) -> usize {
		self.preferences
			.keys()
			.map(|key| key.user_id)
			.collect::<HashSet<_>>()
			.len()
	}

	pub fn item_count(&self) -> usize {
		self.popularity.len()
	}

	pub fn is_empty(&self) -> bool {
		self.q_values.is_empty() && self.preferences.is_empty() && self.popularity.is_empty()
	}

	pub fn clear(&mut self) {
		self.q_values.clear();
		self.preferences.clear();
		self.popularity.clear();
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
