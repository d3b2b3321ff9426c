//! Offline mode: a canned conversation served through the same bootstrap
//! path as the live model, with the assets pre-seeded in memory.

use std::sync::Arc;

use shared::asset_cache::{AssetCache, FILESET_ASSET, MODEL_ASSET, MemoryAssetCache};
use shared::inference::{
    EngineAssets, EngineFactory, EngineFuture, InferenceEngine, InferenceOptions, ScriptedEngine,
};
use tracing::info;

const SCRIPTED_FOLLOW_UP: &str = r#"Happy to help with that trip.
```json
{"followUpQuestion": "Which date would you like to fly out?", "passengerCount": "1", "seatClass": "economy", "legs": [{"departureLocation": "London", "destinationLocation": "New York", "departureDate": "undefined", "returnDate": "undefined", "return": "roundtrip"}], "results": []}
```"#;

const SCRIPTED_GATHERED: &str = r#"```json
{"followUpQuestion": "none", "passengerCount": "2", "seatClass": "business", "legs": [{"departureLocation": "London", "destinationLocation": "New York", "departureDate": "12/6/2025", "returnDate": "19/6/2025", "return": "roundtrip"}], "results": []}
```"#;

const SCRIPTED_RESULTS: &str = r#"```json
{"followUpQuestion": "none", "passengerCount": "2", "seatClass": "business", "legs": [{"departureLocation": "London", "destinationLocation": "New York", "departureDate": "12/6/2025", "returnDate": "19/6/2025", "return": "roundtrip"}],
 "results": [
  {"airline": "British Airways", "flightNumber": "BA117", "departingTime": "08:25", "arrivingTime": "11:20", "departingAirport": "LHR", "arrivingAirport": "JFK", "numberOfFlightChanges": 0, "flightDuration": "7h 55m", "aircraftType": "Boeing 777", "cost": "$2450"},
  {"airline": "Virgin Atlantic", "flightNumber": "VS3", "departingTime": "11:40", "arrivingTime": "14:45", "departingAirport": "LHR", "arrivingAirport": "JFK", "numberOfFlightChanges": 0, "flightDuration": "8h 05m", "aircraftType": "Airbus A350", "cost": "$2310"},
  {"airline": "KLM", "flightNumber": "KL1008", "departingTime": "06:50", "arrivingTime": "13:10", "departingAirport": "LHR", "arrivingAirport": "JFK", "numberOfFlightChanges": 1, "flightDuration": "11h 20m", "aircraftType": "Boeing 787", "cost": "$1890"}
 ]}
```"#;

const SCRIPTED_FILESET: &str =
    r#"{"loaderPath": "scripted/genai_wasm_internal.js", "binaryPath": "scripted/genai_wasm_internal.wasm"}"#;

const SCRIPTED_WEIGHTS: &[u8] = b"scripted-weights";

/// Follow-up, gathered parameters, then search results; repeats from there.
fn scripted_replies() -> [&'static str; 3] {
    [SCRIPTED_FOLLOW_UP, SCRIPTED_GATHERED, SCRIPTED_RESULTS]
}

pub async fn seeded_cache() -> Arc<dyn AssetCache> {
    let cache = MemoryAssetCache::new();
    cache.store(SCRIPTED_FILESET.as_bytes(), FILESET_ASSET).await;
    cache.store(SCRIPTED_WEIGHTS, MODEL_ASSET).await;
    Arc::new(cache)
}

pub struct ScriptedFactory;

impl EngineFactory for ScriptedFactory {
    fn build<'a>(&'a self, assets: EngineAssets, _options: InferenceOptions) -> EngineFuture<'a> {
        Box::pin(async move {
            info!(
                loader = %assets.fileset.loader_path,
                weights_bytes = assets.weights.len(),
                "scripted engine ready"
            );
            Ok(Arc::new(ScriptedEngine::new(scripted_replies())) as Arc<dyn InferenceEngine>)
        })
    }
}
