//! Contract with the agent backend and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::errors::ClientError;

use super::models::{
    ConnectRepositoryRequest, DashboardStats, HealthStatus, Job, JobEnvelope, JobList, Repository,
    RepositoryList,
};

/// Operations the synchronization core needs from the backend.
///
/// Implementations return errors; the core decides how to degrade.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<Repository>, ClientError>;

    async fn connect_repository(&self, request: &ConnectRepositoryRequest)
    -> Result<(), ClientError>;

    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError>;

    /// `Ok(None)` when the backend does not know the job.
    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, ClientError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, ClientError>;

    async fn trigger_demo_analysis(&self) -> Result<(), ClientError>;

    async fn health(&self) -> Result<HealthStatus, ClientError>;
}

/// JSON-over-HTTP client for the agent backend.
#[derive(Debug, Clone)]
pub struct HttpService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpService {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Setup)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/jobs/{id}` with the id percent-encoded as a single segment.
    fn job_url(&self, job_id: &str) -> Result<String, ClientError> {
        let invalid = |reason: String| ClientError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("base URL cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(["jobs", job_id]);
        Ok(url.into())
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<String, ClientError> {
        let response = request.send().await.map_err(|source| {
            tracing::debug!(url, error = %source, "API request failed");
            ClientError::Transport {
                url: url.to_string(),
                source,
            }
        })?;
        let status = response.status();
        tracing::debug!(url, status = status.as_u16(), "API response");
        let body = response.text().await.map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;
        if !status.is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn decode<T: DeserializeOwned>(body: &str, url: &str) -> Result<T, ClientError> {
        serde_json::from_str(body).map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.get_json_at(self.url(path)).await
    }

    async fn get_json_at<T: DeserializeOwned>(&self, url: String) -> Result<T, ClientError> {
        tracing::debug!(method = "GET", %url, "API request");
        let body = self.send(self.client.get(&url), &url).await?;
        Self::decode(&body, &url)
    }

    async fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        payload: Option<&B>,
    ) -> Result<(), ClientError> {
        let url = self.url(path);
        tracing::debug!(method = "POST", %url, "API request");
        let mut request = self.client.post(&url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }
        self.send(request, &url).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteService for HttpService {
    async fn list_repositories(&self) -> Result<Vec<Repository>, ClientError> {
        let list: RepositoryList = self.get_json("/repositories").await?;
        Ok(list.repositories)
    }

    async fn connect_repository(
        &self,
        request: &ConnectRepositoryRequest,
    ) -> Result<(), ClientError> {
        self.post_json("/repositories/connect", Some(request)).await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        let list: JobList = self.get_json("/jobs").await?;
        Ok(list.jobs)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, ClientError> {
        match self.get_json_at::<JobEnvelope>(self.job_url(job_id)?).await {
            Ok(envelope) => Ok(envelope.job),
            Err(ClientError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, ClientError> {
        self.get_json("/dashboard/stats").await
    }

    async fn trigger_demo_analysis(&self) -> Result<(), ClientError> {
        self.post_json::<()>("/demo/trigger-commit", None).await
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.get_json("/").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::json;

    /// Serve a stub backend on an ephemeral port and return its base URL.
    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn stub_router() -> Router {
        Router::new()
            .route("/", get(|| async { Json(json!({"message": "Autonomous Developer Agent API", "status": "running"})) }))
            .route(
                "/repositories",
                get(|| async {
                    Json(json!({"repositories": [{
                        "id": "r1",
                        "name": "payments",
                        "url": "https://github.com/acme/payments",
                        "connected_at": "2024-05-01T09:00:00",
                        "status": "connected",
                        "last_commit": null
                    }]}))
                }),
            )
            .route(
                "/repositories/connect",
                post(|Json(body): Json<serde_json::Value>| async move {
                    if body["repo_url"].as_str().unwrap_or_default().starts_with("https://") {
                        (StatusCode::OK, Json(json!({"message": "Repository connected successfully"})))
                    } else {
                        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": "invalid url"})))
                    }
                }),
            )
            .route("/jobs", get(|| async { Json(json!({})) }))
            .route(
                "/jobs/{id}",
                get(|Path(id): Path<String>| async move {
                    if id == "j1" || id == "odd/id?x=1" {
                        (StatusCode::OK, Json(json!({"job": {"id": id, "status": "running"}})))
                    } else {
                        (StatusCode::NOT_FOUND, Json(json!({"detail": "Job not found"})))
                    }
                }),
            )
            .route(
                "/dashboard/stats",
                get(|| async {
                    Json(json!({"total_repositories": 1, "total_jobs": 3, "completed_jobs": 1, "failed_jobs": 1, "success_rate": 33.3}))
                }),
            )
            .route(
                "/demo/trigger-commit",
                post(|| async { (StatusCode::BAD_REQUEST, Json(json!({"detail": "No repositories connected"}))) }),
            )
    }

    #[tokio::test]
    async fn test_http_service_against_stub_backend() {
        let base = spawn_backend(stub_router()).await;
        let service = HttpService::new(&format!("{}/", base), Duration::from_secs(5)).unwrap();
        assert_eq!(service.base_url(), base);

        let health = service.health().await.unwrap();
        assert_eq!(health.status, "running");

        let repos = service.list_repositories().await.unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "payments");

        // Missing `jobs` array defaults to empty.
        assert!(service.list_jobs().await.unwrap().is_empty());

        let stats = service.dashboard_stats().await.unwrap();
        assert_eq!(stats.total_jobs, 3);

        assert_eq!(service.get_job("j1").await.unwrap().map(|j| j.id), Some("j1".to_string()));
        assert!(service.get_job("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_job_encodes_id_as_one_segment() {
        let base = spawn_backend(stub_router()).await;
        let service = HttpService::new(&base, Duration::from_secs(5)).unwrap();
        assert_eq!(service.job_url("odd/id?x=1").unwrap(), format!("{}/jobs/odd%2Fid%3Fx=1", base));

        let job = service.get_job("odd/id?x=1").await.unwrap().unwrap();
        assert_eq!(job.id, "odd/id?x=1");
    }

    #[tokio::test]
    async fn test_stats_are_returned_as_reported() {
        let router = Router::new().route(
            "/dashboard/stats",
            get(|| async { Json(json!({"total_jobs": 2, "completed_jobs": 1, "success_rate": 250.0})) }),
        );
        let base = spawn_backend(router).await;
        let service = HttpService::new(&base, Duration::from_secs(5)).unwrap();
        // Sanitizing happens once, when the store applies the stats.
        assert_eq!(service.dashboard_stats().await.unwrap().success_rate, 250.0);
    }

    #[test]
    fn test_job_url_keeps_base_path() {
        let service = HttpService::new("http://agent.local/api/", Duration::from_secs(5)).unwrap();
        assert_eq!(service.job_url("j1").unwrap(), "http://agent.local/api/jobs/j1");
    }

    #[tokio::test]
    async fn test_http_service_surfaces_rejections() {
        let base = spawn_backend(stub_router()).await;
        let service = HttpService::new(&base, Duration::from_secs(5)).unwrap();

        let rejected = service
            .connect_repository(&ConnectRepositoryRequest {
                repo_url: "not a url".into(),
                repo_name: "broken".into(),
                access_token: None,
            })
            .await;
        match rejected {
            Err(ClientError::Status { status, .. }) => assert_eq!(status, 422),
            other => panic!("Expected Status error, got {:?}", other),
        }

        let trigger = service.trigger_demo_analysis().await;
        assert!(matches!(trigger, Err(ClientError::Status { status: 400, .. })));
    }

    #[tokio::test]
    async fn test_http_service_transport_failure() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let service =
            HttpService::new(&format!("http://127.0.0.1:{}", port), Duration::from_secs(2)).unwrap();
        let err = service.list_jobs().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert!(err.is_transient());
    }
}
