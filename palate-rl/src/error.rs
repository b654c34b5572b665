use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Engine not initialized: call engine/initialize first")]
	NotInitialized,
	#[error("Invalid params: {0}")]
	InvalidParams(String),
}

impl EngineError {
	pub fn code(&self) -> &str {
		match self {
			Self::NotInitialized => "RL_NOT_LOADED",
			Self::InvalidParams(_) => "RL_INVALID_PARAMS",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"engine_code": self.code(),
			"message": self.to_string(),
		})
	}
}
