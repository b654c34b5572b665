// ---------------------------------------------------------------------------
// State persistence — JSON checkpoint of the score store
// ---------------------------------------------------------------------------
//
// Document layout:
//
//   {
//     "q_values":         { "{user}_{item}": f64, ... },
//     "user_preferences": { "{user}": { "{item}": f64, ... }, ... },
//     "item_popularity":  { "{item}": f64, ... },
//     "timestamp":        "RFC 3339"
//   }
//
// Saves overwrite the whole file. Loads are tolerant at two levels: a missing
// file is a cold start and an unparseable file yields an empty store, while a
// malformed individual key or value is skipped with a warning so one corrupt
// entry cannot lose the rest of the checkpoint. Unknown top-level sections
// are ignored and absent ones default empty, so the format stays
// forward-readable.
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::score_store::{PairKey, ScoreStore};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PersistenceError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

// ---------------------------------------------------------------------------
// Serialization type
// ---------------------------------------------------------------------------

// BTreeMaps keep the document diff-stable across saves.
#[derive(Debug, Serialize)]
struct PersistedState {
	q_values: BTreeMap<String, f64>,
	user_preferences: BTreeMap<String, BTreeMap<String, f64>>,
	item_popularity: BTreeMap<String, f64>,
	timestamp: String,
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Serialize the store to `path`, overwriting any previous checkpoint.
pub fn save_to_path(path: &Path, store: &ScoreStore) -> Result<(), PersistenceError> {
	let q_values: BTreeMap<String, f64> = store
		.q_entries()
		.map(|(key, value)| (key.encode(), *value))
		.collect();

	let mut user_preferences: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
	for (key, value) in store.preference_entries() {
		user_preferences
			.entry(key.user_id.to_string())
			.or_default()
			.insert(key.item_id.to_string(), *value);
	}

	let item_popularity: BTreeMap<String, f64> = store
		.popularity_entries()
		.map(|(item_id, value)| (item_id.to_string(), *value))
		.collect();

	let state = PersistedState {
		q_values,
		user_preferences,
		item_popularity,
		timestamp: Utc::now().to_rfc3339(),
	};

	let json = serde_json::to_string_pretty(&state)
		.map_err(|e| PersistenceError::Serialization(e.to_string()))?;
	fs::write(path, json)?;

	Ok(())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Restore the store from `path`. Returns `Ok(false)` when no checkpoint
/// exists (cold start) and `Ok(true)` after a (possibly partial) restore.
/// The store is cleared before loading either way.
pub fn load_from_path(path: &Path, store: &mut ScoreStore) -> Result<bool, PersistenceError> {
	store.clear();

	if !path.exists() {
		return Ok(false);
	}

	let raw = fs::read_to_string(path)?;
	let document: Value = serde_json::from_str(&raw)
		.map_err(|e| PersistenceError::Serialization(e.to_string()))?;

	load_q_values(&document, store);
	load_user_preferences(&document, store);
	load_item_popularity(&document, store);

	Ok(true)
}

fn load_q_values(document: &Value, store: &mut ScoreStore) {
	let section = match document.get("q_values").and_then(Value::as_object) {
		Some(section) => section,
		None => return,
	};
	for (encoded, value) in section {
		let key = match PairKey::decode(encoded) {
			Some(key) => key,
			None => {
				tracing::warn!("skipping malformed q_values key '{}'", encoded);
				continue;
			}
		};
		match value.as_f64() {
			Some(value) => store.set_q(key, value),
			None => tracing::warn!("skipping non-numeric q_values entry '{}'", encoded),
		}
	}
}

fn load_user_preferences(document: &Value, store: &mut ScoreStore) {
	let section = match document.get("user_preferences").and_then(Value::as_object) {
		Some(section) => section,
		None => return,
	};
	for (user_str, prefs) in section {
		let user_id: u64 = match user_str.parse() {
			Ok(user_id) => user_id,
			Err(_) => {
				tracing::warn!("skipping malformed user_preferences user '{}'", user_str);
				continue;
			}
		};
		let prefs = match prefs.as_object() {
			Some(prefs) => prefs,
			None => {
				tracing::warn!("skipping non-object preferences for user '{}'", user_str);
				continue;
			}
		};
		for (item_str, value) in prefs {
			let item_id: u64 = match item_str.parse() {
				Ok(item_id) => item_id,
				Err(_) => {
					tracing::warn!(
						"skipping malformed preference item '{}' for user {}",
						item_str,
						user_id
					);
					continue;
				}
			};
			match value.as_f64() {
				Some(value) => store.set_preference(PairKey::new(user_id, item_id), value),
				None => tracing::warn!(
					"skipping non-numeric preference for user {} item {}",
					user_id,
					item_id
				),
			}
		}
	}
}

fn load_item_popularity(document: &Value, store: &mut ScoreStore) {
	let section = match document.get("item_popularity").and_then(Value::as_object) {
		Some(section) => section,
		None => return,
	};
	for (item_str, value) in section {
		let item_id: u64 = match item_str.parse() {
			Ok(item_id) => item_id,
			Err(_) => {
				tracing::warn!("skipping malformed item_popularity key '{}'", item_str);
				continue;
			}
		};
		match value.as_f64() {
			Some(value) => store.set_popularity(item_id, value),
			None => tracing::warn!("skipping non-numeric popularity for item {}", item_id),
		}
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
