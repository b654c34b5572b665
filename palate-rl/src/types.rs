use serde::{Deserialize, Serialize};

fn default_quantity() -> u32 {
	1
}

/// A catalog item offered as a recommendation candidate. Catalog fields
/// beyond the id and display name are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
	pub item_id: u64,
	#[serde(default)]
	pub name: String,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A candidate annotated with its learned score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
	pub item_id: u64,
	pub name: String,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
	pub rl_score: f64,
	pub q_value: f64,
	pub preference: f64,
}

/// One line of a completed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
	pub item_id: u64,
	#[serde(default = "default_quantity")]
	pub quantity: u32,
}

/// A completed order as reported by the checkout layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderData {
	#[serde(default)]
	pub items: Vec<OrderLine>,
	#[serde(default)]
	pub total: f64,
}

/// Outcome of an order-completion update, returned to the caller so it can
/// surface the earned reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardInfo {
	pub user_id: u64,
	pub reward: f64,
	pub items_count: usize,
	pub order_total: f64,
	pub timestamp: String,
}

/// Snapshot of one item in a shown-recommendation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShownItem {
	pub item_id: u64,
	pub name: String,
}

/// Immutable record of a recommendation batch shown to a user.
///
/// `completed` and `reward` are placeholders for delayed credit assignment;
/// no current update path populates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShownEvent {
	pub event_id: String,
	pub user_id: u64,
	pub timestamp: String,
	pub items: Vec<ShownItem>,
	pub completed: bool,
	pub reward: Option<f64>,
}

/// One entry in a user's learning summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopItem {
	pub item_id: u64,
	pub preference_score: f64,
}

/// Per-user learning summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
	pub user_id: u64,
	pub learned_items: usize,
	pub top_items: Vec<TopItem>,
	pub total_interactions: usize,
}

/// Size counters over the engine's learned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
	pub q_values: usize,
	pub users: usize,
	pub items: usize,
	pub shown_events: usize,
}
