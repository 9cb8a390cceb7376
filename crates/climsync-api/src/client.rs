// Home Assistant REST client
//
// Wraps `reqwest::Client` with bearer auth, `/api/` URL construction and
// status-code mapping. Climate service calls live in `climate.rs` as
// inherent methods to keep this module focused on transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{ApiStatus, EntityState};
use crate::transport::TransportConfig;

/// Raw HTTP client for the Home Assistant REST API.
///
/// All methods return decoded payloads; HTTP status handling is done
/// before the caller sees anything. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HassClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HassClient {
    /// Create a client for the Home Assistant instance at `base_url`
    /// (e.g. `http://homeassistant.local:8123`).
    pub fn new(
        base_url: Url,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client(token)?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    ///
    /// The caller is responsible for attaching the `Authorization` header.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The Home Assistant base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{path}`, preserving any path prefix on the base
    /// (reverse-proxied installs).
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!("{}/api/{}", self.base_url.as_str().trim_end_matches('/'), path);
        Ok(Url::parse(&full)?)
    }

    /// Derive the WebSocket endpoint: `ws(s)://{host}/api/websocket`.
    pub fn websocket_url(&self) -> Result<Url, Error> {
        let mut url = self.api_url("websocket")?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive {scheme} URL from {url}")))?;
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /api/`: verifies the token and that the API is running.
    pub async fn check_api(&self) -> Result<String, Error> {
        let status: ApiStatus = self.get(self.api_url("")?).await?;
        Ok(status.message)
    }

    /// `GET /api/states/{entity_id}`.
    pub async fn get_state(&self, entity_id: &str) -> Result<EntityState, Error> {
        self.get(self.api_url(&format!("states/{entity_id}"))?).await
    }

    /// `POST /api/services/{domain}/{service}`.
    ///
    /// Home Assistant answers once the service call has been executed and
    /// returns the states that changed while it ran.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        body: &impl Serialize,
    ) -> Result<Vec<EntityState>, Error> {
        self.post(self.api_url(&format!("services/{domain}/{service}"))?, body)
            .await
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    /// Map the HTTP status, then decode the JSON body.
    async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let path = resp.url().path().to_owned();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication {
                message: "access token rejected by Home Assistant".into(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound { path });
        }

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Home Assistant error bodies are `{"message": "..."}` or plain text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiStatus>(body)
        .map(|s| s.message)
        .unwrap_or_else(|_| body.trim().to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> HassClient {
        HassClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn api_url_keeps_path_prefix() {
        let c = client("https://proxy.example.com/ha/");
        assert_eq!(
            c.api_url("states/climate.den").unwrap().as_str(),
            "https://proxy.example.com/ha/api/states/climate.den"
        );
    }

    #[test]
    fn websocket_url_switches_scheme() {
        let c = client("http://homeassistant.local:8123");
        assert_eq!(
            c.websocket_url().unwrap().as_str(),
            "ws://homeassistant.local:8123/api/websocket"
        );

        let c = client("https://ha.example.com");
        assert_eq!(
            c.websocket_url().unwrap().as_str(),
            "wss://ha.example.com/api/websocket"
        );
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(error_message(r#"{"message": "Entity not found."}"#), "Entity not found.");
        assert_eq!(error_message("500 Internal Server Error\n"), "500 Internal Server Error");
    }
}
