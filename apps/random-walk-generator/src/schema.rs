use crate::clock::Sleeper;
use crate::store::{DocumentStore, IndexCreation};
use serde_json::{json, Value};
use std::time::Duration;

pub const SCHEMA_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Closed mapping: documents carrying any field besides these two are rejected.
pub fn index_schema() -> Value {
    json!({
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "timestamp": { "type": "date" },
                "value": { "type": "double" }
            }
        }
    })
}

/// Blocks until the index exists, retrying every [`SCHEMA_RETRY_DELAY`] with no limit.
/// Returns the number of failed attempts before success.
pub async fn ensure_schema<S, Z>(store: &S, sleeper: &Z) -> u64
where
    S: DocumentStore,
    Z: Sleeper,
{
    let schema = index_schema();
    let index = store.index();
    let mut failures = 0u64;
    loop {
        match store.create_index(&schema).await {
            Ok(IndexCreation::Created) => {
                tracing::info!(%index, attempts = failures + 1, "index created");
                return failures;
            }
            Ok(IndexCreation::AlreadyExists) => {
                tracing::info!(%index, attempts = failures + 1, "index already exists");
                return failures;
            }
            Err(err) => {
                failures += 1;
                tracing::warn!(
                    %index,
                    status = ?err.status().map(|s| s.as_u16()),
                    error = %err,
                    retry_in_secs = SCHEMA_RETRY_DELAY.as_secs(),
                    "failed to ensure index (will retry)"
                );
            }
        }
        sleeper.sleep(SCHEMA_RETRY_DELAY).await;
    }
}
