//! Primary path: the origin's encrypted batch content API

use serde::Deserialize;
use std::collections::HashMap;

use super::RawChapter;
use crate::config::RetryConfig;
use crate::crypto::{CryptoSession, DeviceParams};
use crate::error::AcquisitionError;
use crate::retry::{IsRetryable, retry_with_backoff_when};

const BATCH_PATH: &str = "/reading/reader/batch_full/v";

#[derive(Deserialize)]
struct BatchResponse {
    data: HashMap<String, BatchEntry>,
}

#[derive(Deserialize)]
struct BatchEntry {
    content: String,
    #[serde(default)]
    title: Option<String>,
}

/// Per-chapter outcome of one batch request
pub type BatchResult = HashMap<String, Result<RawChapter, AcquisitionError>>;

/// Fetch and decrypt a batch of chapters from the origin service
///
/// Issues the batch request first, then negotiates one session key for the
/// whole batch. A failure of the request or of the handshake fails the whole
/// call; a payload that does not decrypt fails only its own entry. Transient
/// handshake failures are retried, timeouts are not.
pub async fn fetch_batch(
    http: &reqwest::Client,
    api_base_url: &str,
    device: &DeviceParams,
    retry: &RetryConfig,
    chapter_ids: &[&str],
) -> Result<BatchResult, AcquisitionError> {
    let url = format!("{}{}", api_base_url.trim_end_matches('/'), BATCH_PATH);
    let item_ids = chapter_ids.join(",");

    let response = http
        .get(&url)
        .query(&[
            ("item_ids", item_ids.as_str()),
            ("req_type", "1"),
            ("aid", device.aid.as_str()),
            ("update_version_code", device.update_version_code.as_str()),
        ])
        .header(reqwest::header::COOKIE, device.cookie())
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AcquisitionError::Transport(format!(
            "batch request returned HTTP {status}"
        )));
    }

    let batch: BatchResponse = response
        .json()
        .await
        .map_err(|e| AcquisitionError::UnexpectedResponse(format!("batch body: {e}")))?;

    // a timed-out handshake goes straight to the mirrors
    let session = retry_with_backoff_when(
        retry,
        || CryptoSession::negotiate(http, api_base_url, device),
        |e: &AcquisitionError| e.is_retryable() && !matches!(e, AcquisitionError::Timeout(_)),
    )
    .await?;
    let cipher = session.cipher();

    tracing::debug!(
        requested = chapter_ids.len(),
        returned = batch.data.len(),
        "decrypting batch"
    );

    let mut titles = HashMap::with_capacity(batch.data.len());
    let mut payloads = HashMap::with_capacity(batch.data.len());
    for (id, entry) in batch.data {
        titles.insert(id.clone(), entry.title);
        payloads.insert(id, entry.content);
    }

    let outcome = cipher
        .open_batch(&payloads)
        .into_iter()
        .map(|(id, decoded)| {
            let title = titles.remove(&id).flatten();
            (id, decoded.map(|content| RawChapter { title, content }))
        })
        .collect();

    Ok(outcome)
}
