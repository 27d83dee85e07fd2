//! Mock origin service: catalog, book page, key exchange, batch content, mirrors

use flate2::Compression;
use flate2::write::GzEncoder;
use novel_dl::crypto::{PayloadCipher, SessionKey};
use std::io::Write;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Session key handed out by the mock key exchange
pub const SESSION_KEY: [u8; 16] = [0x5a; 16];

/// Serve the chapter directory of `book_id`
pub async fn mount_catalog(server: &MockServer, book_id: &str, chapter_ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/api/reader/directory/detail"))
        .and(query_param("bookId", book_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "code": 0,
            "data": { "allItemIds": chapter_ids }
        })))
        .mount(server)
        .await;
}

/// Serve the book page of `book_id`
pub async fn mount_book_page(server: &MockServer, book_id: &str, title: &str, author: &str, description: &str) {
    let html = format!(
        r#"<html><body>
        <div class="info"><h1>{title}</h1></div>
        <span class="author-name-text">{author}</span>
        <div class="page-abstract-content"><p>{description}</p></div>
        </body></html>"#
    );
    Mock::given(method("GET"))
        .and(path(format!("/page/{book_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

/// Answer key registration with [`SESSION_KEY`] sealed under the bootstrap key
pub async fn mount_register_key(server: &MockServer) {
    let sealed_key = PayloadCipher::new(SessionKey::bootstrap()).seal(&SESSION_KEY);
    Mock::given(method("POST"))
        .and(path("/reading/crypt/registerkey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "key": sealed_key }
        })))
        .mount(server)
        .await;
}

/// Gzip `html` and seal it under [`SESSION_KEY`]
pub fn sealed_chapter(html: &str) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(html.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();
    PayloadCipher::new(SessionKey::from_bytes(SESSION_KEY)).seal(&compressed)
}

/// Serve one chapter from the encrypted batch endpoint
pub async fn mount_batch_chapter(server: &MockServer, chapter_id: &str, title: &str, html: &str) {
    let mut data = serde_json::Map::new();
    data.insert(
        chapter_id.to_string(),
        serde_json::json!({ "content": sealed_chapter(html), "title": title }),
    );
    Mock::given(method("GET"))
        .and(path("/reading/reader/batch_full/v"))
        .and(query_param("item_ids", chapter_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": data })))
        .mount(server)
        .await;
}

/// Make every batch request fail with HTTP 500
pub async fn mount_batch_failure(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/reading/reader/batch_full/v"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

/// Serve `chapter_id` from mirror one
pub async fn mount_first_mirror(server: &MockServer, chapter_id: &str, title: &str, content: &str) {
    Mock::given(method("GET"))
        .and(path("/m1/content"))
        .and(query_param("item_id", chapter_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "content": content, "title": title }
        })))
        .mount(server)
        .await;
}

/// Serve `chapter_id` from mirror two
pub async fn mount_second_mirror(server: &MockServer, chapter_id: &str, title: &str, content: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/m2/{chapter_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "content": content, "title": title }
        })))
        .mount(server)
        .await;
}
