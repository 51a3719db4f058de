//! Base HTTP client with shared logic

use crate::infrastructure::model::types::ModelError;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Base HTTP client with shared functionality
#[derive(Clone)]
pub struct HttpClientBase {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub http: Client,
}

impl HttpClientBase {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self::with_client(endpoint, api_key, Client::new())
    }

    pub fn with_client(endpoint: String, api_key: Option<String>, http: Client) -> Self {
        Self {
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            http,
        }
    }

    /// Build URL from endpoint and path
    pub fn build_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Post JSON, adding bearer auth when a key is configured.
    ///
    /// Local OpenAI-compatible servers (Ollama, llama.cpp) accept requests
    /// without a key.
    pub async fn post_json<Req, Res>(&self, url: &str, body: &Req) -> Result<Res, ModelError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let mut request = self.http.post(url).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let text = request
            .send()
            .await
            .map_err(|e| ModelError::network(&self.endpoint, e))?
            .error_for_status()
            .map_err(|e| ModelError::network(&self.endpoint, e))?
            .text()
            .await
            .map_err(|e| ModelError::network(&self.endpoint, e))?;
        decode_body(&self.endpoint, &text)
    }
}

/// A body that arrived but does not parse is the endpoint's fault, not the network's.
fn decode_body<Res: DeserializeOwned>(endpoint: &str, body: &str) -> Result<Res, ModelError> {
    serde_json::from_str(body).map_err(|e| ModelError::invalid_response(endpoint, e.to_string()))
}
