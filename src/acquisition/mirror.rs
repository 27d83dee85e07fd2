//! Fallback path: unauthenticated per-chapter mirror endpoints

use serde::Deserialize;
use std::time::Duration;

use super::{RawChapter, browser_headers};
use crate::config::MirrorConfig;
use crate::error::AcquisitionError;

#[derive(Deserialize)]
struct MirrorResponse {
    #[serde(default)]
    data: Option<MirrorData>,
}

#[derive(Deserialize, Default)]
struct MirrorData {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Try each mirror in order and return the first usable chapter
///
/// A mirror is usable when it answers HTTP 200 with a non-empty `content`.
/// Returns the winning mirror's name with the chapter, or `None` once every
/// mirror has failed.
pub async fn fetch_from_mirrors(
    http: &reqwest::Client,
    mirrors: &[MirrorConfig],
    chapter_id: &str,
    timeout: Duration,
) -> Option<(String, RawChapter)> {
    for mirror in mirrors {
        match fetch_from_mirror(http, mirror, chapter_id, timeout).await {
            Ok(chapter) => {
                tracing::debug!(chapter_id, mirror = %mirror.name, "mirror delivered chapter");
                return Some((mirror.name.clone(), chapter));
            }
            Err(e) => {
                tracing::debug!(chapter_id, mirror = %mirror.name, error = %e, "mirror failed");
            }
        }
    }
    None
}

/// Fetch one chapter from one mirror
pub async fn fetch_from_mirror(
    http: &reqwest::Client,
    mirror: &MirrorConfig,
    chapter_id: &str,
    timeout: Duration,
) -> Result<RawChapter, AcquisitionError> {
    let response = http
        .get(mirror.url_for(chapter_id))
        .headers(browser_headers())
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(AcquisitionError::Transport(format!(
            "mirror {} returned HTTP {status}",
            mirror.name
        )));
    }

    let body: MirrorResponse = response
        .json()
        .await
        .map_err(|e| AcquisitionError::UnexpectedResponse(format!("mirror {}: {e}", mirror.name)))?;

    let data = body.data.unwrap_or_default();
    match data.content {
        Some(content) if !content.trim().is_empty() => Ok(RawChapter {
            title: data.title.filter(|t| !t.is_empty()),
            content,
        }),
        _ => Err(AcquisitionError::UnexpectedResponse(format!(
            "mirror {} returned empty content",
            mirror.name
        ))),
    }
}
