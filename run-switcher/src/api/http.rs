//! `reqwest`-backed [`ApiClient`] over the pipelines REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ApiClient, ApiError};
use crate::config::ApiConfig;
use crate::core::{
    CompiledTemplate, Experiment, LegacyRun, NextGenRun, Pipeline, PipelineVersion, RecurringRun,
};
use crate::errors::SwitcherError;

/// HTTP client for the pipelines API server.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    /// Creates a client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, SwitcherError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SwitcherError::Config(format!("invalid base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SwitcherError::Config(format!(
                "base_url cannot be a base: {}",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SwitcherError::Config(format!("invalid header name: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SwitcherError::Config(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout()?)
            .default_headers(headers)
            .build()
            .map_err(|e| SwitcherError::Config(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::transport("base url cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::not_found(url.path()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status.as_u16(), message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::decode(e.to_string()))
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn get_legacy_run(&self, id: &str) -> Result<LegacyRun, ApiError> {
        self.get_json(&["apis", "v1beta1", "runs", id]).await
    }

    async fn get_next_gen_run(&self, id: &str) -> Result<NextGenRun, ApiError> {
        self.get_json(&["apis", "v2beta1", "runs", id]).await
    }

    async fn get_recurring_run(&self, id: &str) -> Result<RecurringRun, ApiError> {
        self.get_json(&["apis", "v1beta1", "jobs", id]).await
    }

    async fn get_pipeline(&self, id: &str) -> Result<Pipeline, ApiError> {
        self.get_json(&["apis", "v1beta1", "pipelines", id]).await
    }

    async fn get_pipeline_version(&self, id: &str) -> Result<PipelineVersion, ApiError> {
        self.get_json(&["apis", "v1beta1", "pipeline_versions", id])
            .await
    }

    async fn get_compiled_template(
        &self,
        version_id: &str,
    ) -> Result<CompiledTemplate, ApiError> {
        self.get_json(&["apis", "v1beta1", "pipeline_versions", version_id, "templates"])
            .await
    }

    async fn get_experiment(&self, id: &str) -> Result<Experiment, ApiError> {
        self.get_json(&["apis", "v1beta1", "experiments", id]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpApiClient {
        let config = ApiConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        HttpApiClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_get_pipeline_decodes_default_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/v1beta1/pipelines/P1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "P1",
                "name": "training",
                "default_version": {"id": "V1", "name": "v1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pipeline = client_for(&server).get_pipeline("P1").await.unwrap();

        assert_eq!(pipeline.name.as_deref(), Some("training"));
        assert_eq!(pipeline.default_version.unwrap().id, "V1");
    }

    #[tokio::test]
    async fn test_get_compiled_template_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/v1beta1/pipeline_versions/V1/templates"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"template": "schemaVersion: 2.1.0"})),
            )
            .mount(&server)
            .await;

        let template = client_for(&server).get_compiled_template("V1").await.unwrap();
        assert_eq!(template.template.as_deref(), Some("schemaVersion: 2.1.0"));
    }

    #[tokio::test]
    async fn test_not_found_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/v2beta1/runs/R1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client_for(&server).get_next_gen_run("R1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/v1beta1/experiments/E1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_experiment("E1").await.unwrap_err();
        assert_eq!(err, ApiError::status(503, "unavailable"));
    }

    #[tokio::test]
    async fn test_invalid_body_maps_to_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/v1beta1/jobs/J1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_recurring_run("J1").await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_configured_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/v1beta1/runs/R1"))
            .and(header("x-kubeflow-userid", "alice@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"run": {"id": "R1"}})))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = ApiConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        config
            .headers
            .insert("x-kubeflow-userid".to_string(), "alice@example.com".to_string());
        let client = HttpApiClient::new(&config).unwrap();

        let run = client.get_legacy_run("R1").await.unwrap();
        assert_eq!(run.id(), "R1");
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        let config = ApiConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpApiClient::new(&config),
            Err(SwitcherError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_unrepresentable_timeout() {
        let config = ApiConfig {
            timeout_seconds: 1e300,
            ..Default::default()
        };
        assert!(matches!(
            HttpApiClient::new(&config),
            Err(SwitcherError::Config(_))
        ));
    }
}
