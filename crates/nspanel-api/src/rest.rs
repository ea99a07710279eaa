// Home Assistant REST client
//
// Wraps `reqwest::Client` with Home Assistant URL construction and
// status-code mapping. Only the endpoints the panel controller needs
// are exposed: the state snapshot and service calls.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::HassState;
use crate::transport::TransportConfig;

/// Raw HTTP client for the Home Assistant REST API.
pub struct HassClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HassClient {
    /// Create a client from a base URL (e.g. `http://homeassistant.local:8123`)
    /// and a long-lived access token.
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
    /// The caller is responsible for attaching the bearer token.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The Home Assistant base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// WebSocket endpoint derived from the base URL (`ws[s]://host/api/websocket`).
    pub fn websocket_url(&self) -> Result<Url, Error> {
        let mut url = self.api_url("websocket")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| {
            Error::WebSocketConnect(format!("cannot derive websocket URL from {}", self.base_url))
        })?;
        Ok(url)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch every entity state (`GET /api/states`).
    pub async fn states(&self) -> Result<Vec<HassState>, Error> {
        let url = self.api_url("states")?;
        self.get(url).await
    }

    /// Fetch a single entity state. Returns `Ok(None)` on HTTP 404.
    pub async fn state(&self, entity_id: &str) -> Result<Option<HassState>, Error> {
        let url = self.api_url(&format!("states/{entity_id}"))?;
        match self.get(url).await {
            Ok(state) => Ok(Some(state)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Call a service (`POST /api/services/<domain>/<service>`).
    ///
    /// Returns the states Home Assistant reports as changed by the call.
    pub async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: &Map<String, Value>,
    ) -> Result<Vec<HassState>, Error> {
        let url = self.api_url(&format!("services/{domain}/{service}"))?;
        self.post(url, data).await
    }

    /// Publish an MQTT message through the `mqtt.publish` service.
    pub async fn publish_mqtt(&self, topic: &str, payload: &str) -> Result<(), Error> {
        let mut data = Map::new();
        data.insert("topic".into(), Value::String(topic.to_owned()));
        data.insert("payload".into(), Value::String(payload.to_owned()));
        self.call_service("mqtt", "publish", &data).await?;
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        parse_response(resp).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        parse_response(resp).await
    }
}

/// Map the status code and decode the JSON body.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("access token rejected (HTTP {})", status.as_u16()),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })
}
