//! Long-poll consumer of the CouchDB `_changes` feed.

use std::{collections::HashSet, time::Duration};

use reqwest::Method;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::dao::score_store::ChangeEvent;

use super::{
    error::{CouchDaoError, CouchResult},
    models::{ChangesResponse, collection_of},
    store::CouchEndpoint,
};

const CHANGES: &str = "_changes";
const POLL_TIMEOUT_MS: u64 = 30_000;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Follow the database change feed forever, broadcasting one [`ChangeEvent`]
/// per touched collection and batch.
pub(super) async fn follow_changes(
    endpoint: CouchEndpoint,
    sender: broadcast::Sender<ChangeEvent>,
) {
    let mut since = Value::String("now".into());
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match poll_once(&endpoint, &since).await {
            Ok(response) => {
                backoff = INITIAL_BACKOFF;
                let mut touched = HashSet::new();
                for row in response.results {
                    match collection_of(&row.id) {
                        Ok(path) => {
                            touched.insert(path);
                        }
                        Err(err) => debug!(error = %err, "ignoring foreign document change"),
                    }
                }
                for path in touched {
                    let _ = sender.send(ChangeEvent { path });
                }
                since = response.last_seq;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    retry_in_ms = backoff.as_millis() as u64,
                    "CouchDB change feed failed"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

async fn poll_once(endpoint: &CouchEndpoint, since: &Value) -> CouchResult<ChangesResponse> {
    let since = match since {
        Value::String(seq) => seq.clone(),
        other => other.to_string(),
    };
    let query = [
        ("feed", "longpoll".to_string()),
        ("since", since),
        ("timeout", POLL_TIMEOUT_MS.to_string()),
    ];

    let response = endpoint
        .request(Method::GET, &[CHANGES])
        .query(&query)
        .send()
        .await
        .map_err(|source| CouchDaoError::RequestSend {
            path: CHANGES.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(CouchDaoError::RequestStatus {
            path: CHANGES.to_string(),
            status: response.status(),
        });
    }

    response
        .json::<ChangesResponse>()
        .await
        .map_err(|source| CouchDaoError::DecodeResponse {
            path: CHANGES.to_string(),
            source,
        })
}
