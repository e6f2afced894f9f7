// =============================================================================
// Aurora Analysis: technical analysis & signal synthesis engine
// =============================================================================
//
// Candles in, indicators / patterns / risk metrics / per-timeframe signals and
// a multi-timeframe consensus out.  All computation is pure; concurrency and
// caching live in `engine`.

pub mod engine;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod multi_timeframe;
pub mod patterns;
pub mod regime;
pub mod risk;
pub mod runtime_config;
pub mod signals;
pub mod store;
pub mod types;

pub use engine::{AnalysisEngine, EngineBuilder};
pub use error::{EngineError, EngineResult};
pub use runtime_config::EngineConfig;
