//! Key-exchange handshake against the origin's registration endpoint

use serde::Deserialize;

use super::{PayloadCipher, SessionKey, register_key_content};
use crate::config::OriginConfig;
use crate::error::AcquisitionError;

const REGISTER_KEY_PATH: &str = "/reading/crypt/registerkey";

/// Device and client version identifiers sent during the handshake
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceParams {
    /// Sent as the `install_id` cookie
    pub install_id: String,
    /// Encoded into the registration payload
    pub server_device_id: String,
    /// `aid` query parameter
    pub aid: String,
    /// `update_version_code` query parameter
    pub update_version_code: String,
}

impl From<&OriginConfig> for DeviceParams {
    fn from(origin: &OriginConfig) -> Self {
        Self {
            install_id: origin.install_id.clone(),
            server_device_id: origin.server_device_id.clone(),
            aid: origin.aid.clone(),
            update_version_code: origin.update_version_code.clone(),
        }
    }
}

impl DeviceParams {
    /// `Cookie` header value carrying the install id
    pub fn cookie(&self) -> String {
        format!("install_id={}", self.install_id)
    }
}

#[derive(Deserialize)]
struct RegisterKeyResponse {
    data: RegisterKeyData,
}

#[derive(Deserialize)]
struct RegisterKeyData {
    key: String,
}

/// A negotiated session: the key chapter payloads are sealed under
///
/// Lives only for one primary-path fetch and is never persisted.
#[derive(Debug)]
pub struct CryptoSession {
    key: SessionKey,
    device: DeviceParams,
}

impl CryptoSession {
    /// Register a fresh key with the origin service
    ///
    /// Fails with [`AcquisitionError::Handshake`] when the device id is not a
    /// non-negative integer, when the response has an unexpected shape or when
    /// the returned key does not decrypt to 16 bytes. Non-success statuses and
    /// connection problems are [`AcquisitionError::Transport`].
    pub async fn negotiate(
        http: &reqwest::Client,
        api_base_url: &str,
        device: &DeviceParams,
    ) -> Result<Self, AcquisitionError> {
        let content = register_key_content(&device.server_device_id, "0")?;
        let url = format!("{}{}", api_base_url.trim_end_matches('/'), REGISTER_KEY_PATH);

        tracing::debug!(url = %url, "registering session key");

        let response = http
            .post(&url)
            .query(&[("aid", device.aid.as_str())])
            .header(reqwest::header::COOKIE, device.cookie())
            .json(&serde_json::json!({
                "content": content,
                "keyver": 1,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::Transport(format!(
                "key registration returned HTTP {status}"
            )));
        }

        let body: RegisterKeyResponse = response
            .json()
            .await
            .map_err(|e| AcquisitionError::Handshake(format!("unexpected response shape: {e}")))?;

        let raw_key = PayloadCipher::new(SessionKey::bootstrap())
            .open(&body.data.key)
            .map_err(|e| AcquisitionError::Handshake(format!("cannot unwrap session key: {e}")))?;

        let key = SessionKey::from_slice(&raw_key)?;
        Ok(Self {
            key,
            device: device.clone(),
        })
    }

    /// Hex form of the negotiated key
    pub fn key_hex(&self) -> String {
        self.key.to_hex()
    }

    /// Cipher for chapter payloads sealed under this session's key
    pub fn cipher(&self) -> PayloadCipher {
        PayloadCipher::new(self.key)
    }

    /// Identifiers the session was negotiated with
    pub fn device(&self) -> &DeviceParams {
        &self.device
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn device() -> DeviceParams {
        DeviceParams::from(&OriginConfig::default())
    }

    fn sealed_session_key(raw: &[u8]) -> String {
        PayloadCipher::new(SessionKey::bootstrap()).seal(raw)
    }

    #[tokio::test]
    async fn negotiate_unwraps_key_sealed_under_bootstrap() {
        let server = MockServer::start().await;
        let raw_key = [0x5au8; 16];

        Mock::given(method("POST"))
            .and(path(REGISTER_KEY_PATH))
            .and(query_param("aid", "1967"))
            .and(header("cookie", "install_id=4427064614339001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "key": sealed_session_key(&raw_key) }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = CryptoSession::negotiate(&reqwest::Client::new(), &server.uri(), &device())
            .await
            .unwrap();

        assert_eq!(session.key_hex(), hex::encode(raw_key));
        assert_eq!(session.device().aid, "1967");
    }

    #[tokio::test]
    async fn registration_body_carries_sealed_device_payload() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(REGISTER_KEY_PATH))
            .respond_with(move |request: &Request| {
                let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
                assert_eq!(body["keyver"], 1);

                let framed = STANDARD.decode(body["content"].as_str().unwrap()).unwrap();
                let plain = PayloadCipher::new(SessionKey::bootstrap())
                    .decrypt(&framed)
                    .unwrap();
                assert_eq!(&plain[..8], &4427064614334905u64.to_le_bytes());
                assert_eq!(&plain[8..], &[0u8; 8]);

                ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "data": { "key": sealed_session_key(&[1u8; 16]) }
                }))
            })
            .mount(&server)
            .await;

        CryptoSession::negotiate(&reqwest::Client::new(), &server.uri(), &device())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn server_error_is_a_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = CryptoSession::negotiate(&reqwest::Client::new(), &server.uri(), &device())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Transport(_)));
    }

    #[tokio::test]
    async fn missing_key_field_is_a_handshake_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": {} })),
            )
            .mount(&server)
            .await;

        let err = CryptoSession::negotiate(&reqwest::Client::new(), &server.uri(), &device())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Handshake(_)));
    }

    #[tokio::test]
    async fn invalid_device_id_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut bad = device();
        bad.server_device_id = "device-1".to_string();

        let err = CryptoSession::negotiate(&reqwest::Client::new(), &server.uri(), &bad)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Handshake(_)));
    }

    #[tokio::test]
    async fn short_session_key_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "key": sealed_session_key(&[1u8; 8]) }
            })))
            .mount(&server)
            .await;

        let err = CryptoSession::negotiate(&reqwest::Client::new(), &server.uri(), &device())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::Handshake(_)));
    }
}
