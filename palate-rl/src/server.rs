// ---------------------------------------------------------------------------
// EngineServer — JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Routes incoming JSON-RPC 2.0 requests (NDJSON over stdin) to RlEngine
// operations: a main `run()` loop, a `dispatch()` match, `with_engine` /
// `with_engine_mut` helpers, and free-standing handler functions with typed
// param structs. The engine is created lazily by `engine/initialize`.
//
// The engine lives on this single-threaded loop, which serializes every
// read and update across sessions.
// ---------------------------------------------------------------------------

use std::io::{self, BufRead};

use serde::Deserialize;

use crate::engine::{EngineConfig, Hyperparameters, RlEngine};
use crate::error::EngineError;
use crate::protocol::*;
use crate::transport::NdjsonTransport;
use crate::types::{CandidateItem, OrderData};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// JSON-RPC server that dispatches requests to an [`RlEngine`].
pub struct EngineServer {
	transport: NdjsonTransport,
	engine: Option<RlEngine>,
}

impl EngineServer {
	/// Create a new server with the given transport. The engine is created
	/// lazily when `engine/initialize` is called.
	pub fn new(transport: NdjsonTransport) -> Self {
		Self {
			transport,
			engine: None,
		}
	}

	/// Main loop: read JSON-RPC messages from stdin, dispatch to handlers.
	pub fn run(&mut self) -> Result<(), io::Error> {
		let stdin = io::stdin();
		let reader = stdin.lock();

		for line_result in reader.lines() {
			let line = line_result?;
			if line.trim().is_empty() {
				continue;
			}

			let request: JsonRpcRequest = match serde_json::from_str(&line) {
				Ok(r) => r,
				Err(e) => {
					tracing::error!("Failed to parse request: {}", e);
					continue;
				}
			};

			self.dispatch(request);
		}

		// EOF: the host is gone; flush any unsaved learning.
		if let Some(engine) = &mut self.engine {
			engine.dispose();
		}

		Ok(())
	}

	// ── Dispatch ──────────────────────────────────────────────────────────

	fn dispatch(&mut self, req: JsonRpcRequest) {
		let id = req.id;
		let result = match req.method.as_str() {
			// -- Lifecycle -----------------------------------------------
			"engine/initialize" => self.handle_initialize(req.params),
			"engine/save" => self.with_engine_mut(|e| {
				e.save_state();
				Ok(serde_json::json!({}))
			}),
			"engine/dispose" => self.with_engine_mut(|e| {
				e.dispose();
				Ok(serde_json::json!({}))
			}),
			"engine/clear" => self.with_engine_mut(|e| {
				e.clear();
				Ok(serde_json::json!({}))
			}),
			"engine/stats" => {
				self.with_engine(|e| Ok(serde_json::json!({ "stats": e.stats() })))
			}

			// -- Learning ------------------------------------------------
			"learning/recordShown" => {
				self.with_engine_mut(|e| handle_record_shown(e, req.params))
			}
			"learning/recordSelected" => {
				self.with_engine_mut(|e| handle_record_selected(e, req.params))
			}
			"learning/recordCompleted" => {
				self.with_engine_mut(|e| handle_record_completed(e, req.params))
			}
			"learning/recordFeedback" => {
				self.with_engine_mut(|e| handle_record_feedback(e, req.params))
			}

			// -- Recommendation ------------------------------------------
			"learning/recommend" => self.with_engine_mut(|e| handle_recommend(e, req.params)),

			// -- Introspection -------------------------------------------
			"learning/summary" => self.with_engine(|e| handle_summary(e, req.params)),

			// -- Unknown -------------------------------------------------
			_ => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
				return;
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => {
				let code = match e {
					EngineError::InvalidParams(_) => INVALID_PARAMS,
					_ => ENGINE_ERROR,
				};
				self.transport
					.write_error(id, code, e.to_string(), Some(e.to_json_rpc_error()));
			}
		}
	}

	// ── Engine accessors ──────────────────────────────────────────────────

	fn with_engine<F>(&self, f: F) -> Result<serde_json::Value, EngineError>
	where
		F: FnOnce(&RlEngine) -> Result<serde_json::Value, EngineError>,
	{
		match &self.engine {
			Some(e) => f(e),
			None => Err(EngineError::NotInitialized),
		}
	}

	fn with_engine_mut<F>(&mut self, f: F) -> Result<serde_json::Value, EngineError>
	where
		F: FnOnce(&mut RlEngine) -> Result<serde_json::Value, EngineError>,
	{
		match &mut self.engine {
			Some(e) => f(e),
			None => Err(EngineError::NotInitialized),
		}
	}

	// ── Initialize ────────────────────────────────────────────────────────

	fn handle_initialize(
		&mut self,
		params: serde_json::Value,
	) -> Result<serde_json::Value, EngineError> {
		let p: InitializeParams = parse_params(params)?;

		let defaults = Hyperparameters::default();
		let config = EngineConfig {
			storage_path: match p.storage_path {
				Some(path) => Some(path),
				None => EngineConfig::default().storage_path,
			},
			hyperparameters: Hyperparameters {
				alpha: p.alpha.unwrap_or(defaults.alpha),
				gamma: p.gamma.unwrap_or(defaults.gamma),
				epsilon: p.epsilon.unwrap_or(defaults.epsilon),
			},
			rng_seed: p.rng_seed,
		};

		let mut engine = RlEngine::new(config);
		engine.load_state();
		let stats = engine.stats();
		self.engine = Some(engine);

		Ok(serde_json::json!({ "stats": stats }))
	}
}

// ---------------------------------------------------------------------------
// Param types
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(
	params: serde_json::Value,
) -> Result<T, EngineError> {
	serde_json::from_value(params).map_err(|e| EngineError::InvalidParams(e.to_string()))
}

#[derive(Deserialize)]
struct InitializeParams {
	storage_path: Option<String>,
	alpha: Option<f64>,
	gamma: Option<f64>,
	epsilon: Option<f64>,
	rng_seed: Option<u64>,
}

#[derive(Deserialize)]
struct RecordShownParams {
	user_id: u64,
	recommendations: Vec<CandidateItem>,
}

#[derive(Deserialize)]
struct RecordSelectedParams {
	user_id: u64,
	item_id: u64,
	event_id: Option<String>,
}

#[derive(Deserialize)]
struct RecordCompletedParams {
	user_id: u64,
	order: OrderData,
}

#[derive(Deserialize)]
struct RecordFeedbackParams {
	user_id: u64,
	item_id: u64,
	score: f64,
}

#[derive(Deserialize)]
struct RecommendParams {
	user_id: u64,
	candidates: Vec<CandidateItem>,
}

#[derive(Deserialize)]
struct SummaryParams {
	user_id: u64,
}

// ---------------------------------------------------------------------------
// Free-standing handler functions
// ---------------------------------------------------------------------------

fn handle_record_shown(
	engine: &mut RlEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, EngineError> {
	let p: RecordShownParams = parse_params(params)?;
	let event_id = engine.record_shown(p.user_id, &p.recommendations);
	Ok(serde_json::json!({ "event_id": event_id }))
}

fn handle_record_selected(
	engine: &mut RlEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, EngineError> {
	let p: RecordSelectedParams = parse_params(params)?;
	engine.record_selected(p.user_id, p.item_id, p.event_id.as_deref());
	Ok(serde_json::json!({}))
}

fn handle_record_completed(
	engine: &mut RlEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, EngineError> {
	let p: RecordCompletedParams = parse_params(params)?;
	let info = engine.record_completed(p.user_id, &p.order);
	serde_json::to_value(info).map_err(|e| EngineError::InvalidParams(e.to_string()))
}

fn handle_record_feedback(
	engine: &mut RlEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, EngineError> {
	let p: RecordFeedbackParams = parse_params(params)?;
	engine.record_feedback(p.user_id, p.item_id, p.score);
	Ok(serde_json::json!({}))
}

fn handle_recommend(
	engine: &mut RlEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, EngineError> {
	let p: RecommendParams = parse_params(params)?;
	let recommendations = engine.recommend(p.user_id, p.candidates);
	Ok(serde_json::json!({ "recommendations": recommendations }))
}

fn handle_summary(
	engine: &RlEngine,
	params: serde_json::Value,
) -> Result<serde_json::Value, EngineError> {
	let p: SummaryParams = parse_params(params)?;
	let summary = engine.summary(p.user_id);
	serde_json::to_value(summary).map_err(|e| EngineError::InvalidParams(e.to_string()))
}
