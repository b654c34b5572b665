// ---------------------------------------------------------------------------
// EventRecorder — shown-recommendation log
// ---------------------------------------------------------------------------
//
// Append-only log of recommendation batches shown to users. Each record gets
// a generated id so a later selection can be correlated with the batch that
// produced it. Records are never mutated after creation.
// ---------------------------------------------------------------------------

use chrono::Utc;
use uuid::Uuid;

use crate::types::{CandidateItem, ShownEvent, ShownItem};

/// Only the first few shown items are snapshotted; the frontend displays at
/// most this many.
pub const SHOWN_SNAPSHOT_CAP: usize = 5;

#[derive(Debug, Default)]
pub struct EventRecorder {
	events: Vec<ShownEvent>,
}

impl EventRecorder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record that a recommendation batch was shown. Returns the generated
	/// event id for later correlation.
	pub fn record_shown(&mut self, user_id: u64, recommendations: &[CandidateItem]) -> String {
		let event_id = Uuid::new_v4().to_string();
		let items: Vec<ShownItem> = recommendations
			.iter()
			.take(SHOWN_SNAPSHOT_CAP)
			.map(|candidate| ShownItem {
				item_id: candidate.item_id,
				name: candidate.name.clone(),
			})
			.collect();

		self.events.push(ShownEvent {
			event_id: event_id.clone(),
			user_id,
			timestamp: Utc::now().to_rfc3339(),
			items,
			completed: false,
			reward: None,
		});

		event_id
	}

	pub fn get(&self, event_id: &str) -> Option<&ShownEvent> {
		self.events.iter().find(|event| event.event_id == event_id)
	}

	pub fn count_for_user(&self, user_id: u64) -> usize {
		self.events
			.iter()
			.filter(|event| event.user_id == user_id)
			.count()
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	pub fn clear(&mut self) {
		self.events.clear();
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(item_id: u64, name: &str) -> CandidateItem {
		CandidateItem {
			item_id,
			name: name.to_string(),
			extra: serde_json::Map::new(),
		}
	}

	#[test]
	fn record_shown_returns_unique_ids() {
		let mut recorder = EventRecorder::new();
		let a = recorder.record_shown(1, &[candidate(10, "dosa")]);
		let b = recorder.record_shown(1, &[candidate(11, "idli")]);
		assert_ne!(a, b);
		assert_eq!(recorder.len(), 2);
	}

	#[test]
	fn snapshot_is_capped_at_five() {
		let mut recorder = EventRecorder::new();
		let candidates: Vec<CandidateItem> =
			(0..8).map(|i| candidate(i, &format!("item-{i}"))).collect();
		let id = recorder.record_shown(1, &candidates);

		let event = recorder.get(&id).unwrap();
		assert_eq!(event.items.len(), SHOWN_SNAPSHOT_CAP);
		assert_eq!(event.items[0].item_id, 0);
		assert_eq!(event.items[4].item_id, 4);
	}

	#[test]
	fn new_events_are_not_completed() {
		let mut recorder = EventRecorder::new();
		let id = recorder.record_shown(7, &[candidate(1, "vada")]);
		let event = recorder.get(&id).unwrap();
		assert_eq!(event.user_id, 7);
		assert!(!event.completed);
		assert!(event.reward.is_none());
		assert!(!event.timestamp.is_empty());
	}

	#[test]
	fn count_for_user_ignores_other_users() {
		let mut recorder = EventRecorder::new();
		recorder.record_shown(1, &[candidate(1, "a")]);
		recorder.record_shown(1, &[candidate(2, "b")]);
		recorder.record_shown(2, &[candidate(3, "c")]);
		assert_eq!(recorder.count_for_user(1), 2);
		assert_eq!(recorder.count_for_user(2), 1);
		assert_eq!(recorder.count_for_user(9), 0);
	}

	#[test]
	fn get_unknown_id_is_none() {
		let recorder = EventRecorder::new();
		assert!(recorder.get("nope").is_none());
	}
}
