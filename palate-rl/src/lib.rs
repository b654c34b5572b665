// ---------------------------------------------------------------------------
// palate-rl-engine — RL personalization for the palate ordering assistant
// ---------------------------------------------------------------------------
//
// Learns per-user item value estimates from selections, completed orders,
// and explicit feedback; serves blended ε-greedy recommendation rankings;
// checkpoints its state to a JSON file. Served to the host orchestrator over
// JSON-RPC 2.0 / NDJSON stdio by the `palate-rl-engine` binary, or embedded
// directly through [`engine::RlEngine`].
// ---------------------------------------------------------------------------

pub mod engine;
pub mod error;
pub mod events;
pub mod persistence;
pub mod protocol;
pub mod recommend;
pub mod reward;
pub mod score_store;
pub mod server;
pub mod transport;
pub mod types;

pub use engine::{EngineConfig, Hyperparameters, RlEngine};
pub use error::EngineError;
pub use score_store::{PairKey, ScoreStore};
