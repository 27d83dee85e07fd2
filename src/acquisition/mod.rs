//! Chapter acquisition: origin batch API first, mirrors second
//!
//! - [`official`] - Batch content request plus crypto session (primary path)
//! - [`mirror`] - Unauthenticated per-chapter fallback endpoints
//! - [`catalog`] - Chapter list and book metadata from the public web site
//!
//! [`AcquisitionClient`] composes the three behind the [`ContentProvider`]
//! trait, which is what the download orchestration depends on.

pub mod catalog;
pub mod mirror;
pub mod official;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use std::time::Duration;

use crate::config::{Config, MirrorConfig, RetryConfig};
use crate::crypto::DeviceParams;
use crate::error::{AcquisitionError, Result};
use crate::normalize::{normalize, strip_ordinal_prefix};
use crate::retry::retry_with_backoff;
use crate::types::{BookInfo, Chapter, ChapterContent};

/// Source of chapter lists, book metadata and chapter bodies
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Ordered chapters of a book; an error here fails the task
    async fn chapter_list(&self, book_id: &str) -> Result<Vec<Chapter>>;

    /// Book metadata, or `None` when it cannot be resolved
    async fn book_info(&self, book_id: &str) -> Option<BookInfo>;

    /// Fetch and normalize one chapter
    ///
    /// Never fails: a chapter that no source can deliver comes back as
    /// [`ChapterContent::absent`].
    async fn fetch_chapter(&self, chapter: &Chapter) -> ChapterContent;
}

/// A chapter as delivered by a source, before normalization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawChapter {
    /// Title as reported by the source
    pub title: Option<String>,
    /// Raw HTML or text body
    pub content: String,
}

const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36 Edg/126.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36 Edg/125.0.0.0",
];

/// Browser-like headers with a randomly picked desktop user agent
pub fn browser_headers() -> HeaderMap {
    let user_agent = DESKTOP_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0]);

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(REFERER, HeaderValue::from_static("https://fanqienovel.com/"));
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    headers
}

/// Production [`ContentProvider`] backed by the origin service and its mirrors
#[derive(Clone, Debug)]
pub struct AcquisitionClient {
    http: reqwest::Client,
    api_base_url: String,
    web_base_url: String,
    device: DeviceParams,
    mirrors: Vec<MirrorConfig>,
    retry: RetryConfig,
    timeout: Duration,
}

impl AcquisitionClient {
    /// Build a client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.download.request_timeout)
            .danger_accept_invalid_certs(config.origin.accept_invalid_certs)
            .build()?;

        Ok(Self {
            http,
            api_base_url: config.origin.api_base_url.clone(),
            web_base_url: config.origin.web_base_url.clone(),
            device: DeviceParams::from(&config.origin),
            mirrors: config.mirrors.clone(),
            retry: config.retry.clone(),
            timeout: config.download.request_timeout,
        })
    }

    async fn fetch_primary(&self, chapter_id: &str) -> std::result::Result<ChapterContent, AcquisitionError> {
        let mut batch = official::fetch_batch(
            &self.http,
            &self.api_base_url,
            &self.device,
            &self.retry,
            &[chapter_id],
        )
        .await?;

        let raw = batch
            .remove(chapter_id)
            .ok_or_else(|| {
                AcquisitionError::UnexpectedResponse(format!("batch response lacks chapter {chapter_id}"))
            })??;

        let title = raw.title.as_deref().map(strip_ordinal_prefix);
        let body = normalize(&raw.content, title.as_deref());
        if body.is_empty() {
            return Err(AcquisitionError::UnexpectedResponse(
                "primary path returned an empty body".to_string(),
            ));
        }

        Ok(ChapterContent {
            title: title.filter(|t| !t.is_empty()),
            body: Some(body),
        })
    }

    async fn fetch_fallback(&self, chapter_id: &str) -> Option<ChapterContent> {
        let (mirror, raw) =
            mirror::fetch_from_mirrors(&self.http, &self.mirrors, chapter_id, self.timeout).await?;

        let body = normalize(&raw.content, raw.title.as_deref());
        if body.is_empty() {
            tracing::warn!(chapter_id, mirror = %mirror, "mirror content normalized to nothing");
            return None;
        }

        Some(ChapterContent {
            title: raw
                .title
                .as_deref()
                .map(strip_ordinal_prefix)
                .filter(|t| !t.is_empty()),
            body: Some(body),
        })
    }
}

#[async_trait]
impl ContentProvider for AcquisitionClient {
    async fn chapter_list(&self, book_id: &str) -> Result<Vec<Chapter>> {
        let chapters = retry_with_backoff(&self.retry, || {
            catalog::chapter_list(&self.http, &self.web_base_url, book_id)
        })
        .await?;
        Ok(chapters)
    }

    async fn book_info(&self, book_id: &str) -> Option<BookInfo> {
        catalog::book_info(&self.http, &self.web_base_url, book_id).await
    }

    async fn fetch_chapter(&self, chapter: &Chapter) -> ChapterContent {
        match self.fetch_primary(&chapter.id).await {
            Ok(content) => return content,
            Err(e) => {
                tracing::debug!(
                    chapter_id = %chapter.id,
                    error = %e,
                    "primary path failed, trying mirrors"
                );
            }
        }

        match self.fetch_fallback(&chapter.id).await {
            Some(content) => content,
            None => {
                let e = AcquisitionError::ChapterUnavailable {
                    chapter_id: chapter.id.clone(),
                };
                tracing::debug!(ordinal = chapter.ordinal, error = %e, "all sources exhausted");
                ChapterContent::absent()
            }
        }
    }
}
