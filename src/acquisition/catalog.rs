//! Chapter list and book metadata from the public web site

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::browser_headers;
use crate::error::AcquisitionError;
use crate::types::{BookInfo, Chapter};

#[derive(Deserialize)]
struct DirectoryResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<DirectoryData>,
}

#[derive(Deserialize)]
struct DirectoryData {
    #[serde(rename = "allItemIds", default)]
    all_item_ids: Vec<serde_json::Value>,
}

/// Resolve the ordered chapter list of a book
///
/// Server errors and connection problems are [`AcquisitionError::Transport`]
/// (retryable); anything else that prevents a list is
/// [`AcquisitionError::CatalogUnavailable`].
pub async fn chapter_list(
    http: &reqwest::Client,
    web_base_url: &str,
    book_id: &str,
) -> Result<Vec<Chapter>, AcquisitionError> {
    let url = format!(
        "{}/api/reader/directory/detail",
        web_base_url.trim_end_matches('/')
    );

    let response = http
        .get(&url)
        .query(&[("bookId", book_id)])
        .headers(browser_headers())
        .send()
        .await?;

    let status = response.status();
    if status.is_server_error() {
        return Err(AcquisitionError::Transport(format!(
            "chapter directory returned HTTP {status}"
        )));
    }
    if !status.is_success() {
        return Err(AcquisitionError::CatalogUnavailable(format!(
            "chapter directory returned HTTP {status}"
        )));
    }

    let body: DirectoryResponse = response
        .json()
        .await
        .map_err(|e| AcquisitionError::CatalogUnavailable(format!("chapter directory body: {e}")))?;

    if body.code != 0 {
        return Err(AcquisitionError::CatalogUnavailable(format!(
            "chapter directory code {}: {}",
            body.code,
            body.message.unwrap_or_default()
        )));
    }

    let ids = body
        .data
        .map(|d| d.all_item_ids)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|id| match id {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    let chapters = Chapter::from_ids(ids);
    tracing::debug!(book_id, chapters = chapters.len(), "chapter list resolved");
    Ok(chapters)
}

struct PagePatterns {
    title: Regex,
    author: Regex,
    description: Regex,
    tag: Regex,
}

// Literal patterns.
#[allow(clippy::expect_used)]
static PAGE: LazyLock<PagePatterns> = LazyLock::new(|| {
    let compile = |pattern: &str| Regex::new(pattern).expect("book page pattern is valid");
    PagePatterns {
        title: compile(r"(?s)<h1[^>]*>(.*?)</h1>"),
        author: compile(r#"(?s)<span[^>]*class="[^"]*\bauthor-name-text\b[^"]*"[^>]*>(.*?)</span>"#),
        description: compile(
            r#"(?s)<div[^>]*class="[^"]*\bpage-abstract-content\b[^"]*"[^>]*>.*?<p[^>]*>(.*?)</p>"#,
        ),
        tag: compile(r"<[^>]+>"),
    }
});

/// Scrape title, author and description from the book page
///
/// Returns `None` when the page cannot be fetched or has no title; a missing
/// author or description falls back to the placeholder values.
pub async fn book_info(http: &reqwest::Client, web_base_url: &str, book_id: &str) -> Option<BookInfo> {
    let url = format!("{}/page/{}", web_base_url.trim_end_matches('/'), book_id);

    let response = match http.get(&url).headers(browser_headers()).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::warn!(book_id, status = %response.status(), "book page unavailable");
            return None;
        }
        Err(e) => {
            tracing::warn!(book_id, error = %e, "book page request failed");
            return None;
        }
    };

    let html = match response.text().await {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(book_id, error = %e, "book page body unreadable");
            return None;
        }
    };

    parse_book_page(&html, book_id)
}

/// Extract [`BookInfo`] from book page HTML
pub fn parse_book_page(html: &str, book_id: &str) -> Option<BookInfo> {
    let extract = |re: &Regex| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| html_text(m.as_str()))
            .filter(|s| !s.is_empty())
    };

    let title = extract(&PAGE.title)?;
    let fallback = BookInfo::unknown(book_id);

    Some(BookInfo {
        title,
        author: extract(&PAGE.author).unwrap_or(fallback.author),
        description: extract(&PAGE.description).unwrap_or(fallback.description),
    })
}

fn html_text(fragment: &str) -> String {
    PAGE.tag
        .replace_all(fragment, "")
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
