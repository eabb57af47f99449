//! API Module
//!
//! HTTP API layer for the history server.

pub mod config;
pub mod error;
pub mod health;
pub mod history;

use axum::{
    Router,
    routing::{get, post},
};
use gantry_history::{InMemoryCache, PipelineHistoryRepository, SharedPipelineConfig};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<PipelineHistoryRepository>,
    /// Same store the repository caches into, kept for statistics
    pub cache: Arc<InMemoryCache>,
    /// Same provider the repository consults, reloadable over HTTP
    pub pipelines: Arc<SharedPipelineConfig>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // History endpoints
        .route("/history/{name}", get(history::get_history))
        .route("/history/{name}/{counter}", get(history::get_instance))
        .route(
            "/history/{name}/{counter}/comment",
            post(history::update_comment),
        )
        .route("/active/{name}", get(history::get_active))
        .route("/instance/{id}", get(history::get_instance_by_id))
        // Cache endpoints
        .route("/cache/stats", get(history::cache_stats))
        // Configuration endpoints
        .route(
            "/config/pipelines",
            get(config::get_pipelines).put(config::replace_pipelines),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use gantry_core::domain::instance::{
        BuildCause, PipelineInstanceModel, StageInstanceModel, StageState,
    };
    use gantry_core::domain::material::MaterialRevisions;
    use gantry_core::domain::pipeline::{Pipeline, same_name};
    use gantry_history::gateway::{
        CommentUpdate, GatewayError, GatewayResult, HistoryById, HistoryByIds, HistoryCount,
        NameAndCounter, PageQuery, StoreGateway,
    };
    use serde_json::Value;
    use std::sync::Mutex;
    use tower::ServiceExt; // for `oneshot`

    /// Gateway over a fixed list of runs
    #[derive(Default)]
    struct StubGateway {
        runs: Mutex<Vec<PipelineInstanceModel>>,
        down: bool,
    }

    impl StubGateway {
        fn check(&self) -> GatewayResult<()> {
            if self.down {
                return Err(GatewayError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }

        fn find(&self, f: impl Fn(&PipelineInstanceModel) -> bool) -> Option<PipelineInstanceModel> {
            self.runs.lock().unwrap().iter().find(|p| f(p)).cloned()
        }

        fn page(&self, params: &PageQuery) -> Vec<PipelineInstanceModel> {
            let mut runs: Vec<_> = self
                .runs
                .lock()
                .unwrap()
                .iter()
                .filter(|p| same_name(&p.name, &params.name))
                .cloned()
                .collect();
            runs.sort_by(|a, b| b.counter.cmp(&a.counter));
            runs.into_iter()
                .skip(params.offset as usize)
                .take(params.page_size as usize)
                .collect()
        }
    }

    #[async_trait]
    impl StoreGateway for StubGateway {
        async fn history_by_name_and_counter(
            &self,
            params: &NameAndCounter,
        ) -> GatewayResult<Option<PipelineInstanceModel>> {
            self.check()?;
            Ok(self.find(|p| same_name(&p.name, &params.name) && p.counter == params.counter))
        }

        async fn pipeline_by_name_and_counter(
            &self,
            params: &NameAndCounter,
        ) -> GatewayResult<Option<Pipeline>> {
            self.check()?;
            Ok(self
                .find(|p| same_name(&p.name, &params.name) && p.counter == params.counter)
                .map(|p| Pipeline {
                    id: p.id,
                    name: p.name,
                    counter: p.counter,
                    label: p.label,
                    comment: p.comment,
                }))
        }

        async fn history_by_id(
            &self,
            params: &HistoryById,
        ) -> GatewayResult<Option<PipelineInstanceModel>> {
            self.check()?;
            Ok(self.find(|p| p.id == params.id))
        }

        async fn history_by_ids(
            &self,
            params: &HistoryByIds,
        ) -> GatewayResult<Vec<PipelineInstanceModel>> {
            self.check()?;
            Ok(self
                .runs
                .lock()
                .unwrap()
                .iter()
                .filter(|p| params.ids.contains(&p.id))
                .cloned()
                .collect())
        }

        async fn material_revisions_for_pipeline(
            &self,
            _params: &HistoryById,
        ) -> GatewayResult<MaterialRevisions> {
            self.check()?;
            Ok(MaterialRevisions::default())
        }

        async fn update_comment(&self, params: &CommentUpdate) -> GatewayResult<u64> {
            self.check()?;
            let mut updated = 0;
            for run in self.runs.lock().unwrap().iter_mut() {
                if same_name(&run.name, &params.name) && run.counter == params.counter {
                    run.comment = Some(params.comment.clone());
                    updated += 1;
                }
            }
            Ok(updated)
        }

        async fn pipeline_range(&self, params: &PageQuery) -> GatewayResult<Vec<i64>> {
            self.check()?;
            Ok(self.page(params).iter().map(|p| p.id).collect())
        }

        async fn history_by_name(
            &self,
            params: &PageQuery,
        ) -> GatewayResult<Vec<PipelineInstanceModel>> {
            self.check()?;
            Ok(self.page(params))
        }

        async fn all_active_instances(&self) -> GatewayResult<Vec<PipelineInstanceModel>> {
            self.check()?;
            Ok(self
                .runs
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.is_active())
                .cloned()
                .collect())
        }

        async fn count_history(&self, params: &HistoryCount) -> GatewayResult<i64> {
            self.check()?;
            Ok(self
                .runs
                .lock()
                .unwrap()
                .iter()
                .filter(|p| same_name(&p.name, &params.name))
                .count() as i64)
        }
    }

    fn run(id: i64, name: &str, counter: i32, state: StageState) -> PipelineInstanceModel {
        let mut pim = PipelineInstanceModel::new(
            name,
            counter,
            counter.to_string(),
            BuildCause::manual_forced(),
            vec![StageInstanceModel {
                name: "build".to_string(),
                counter: 1,
                state,
                approved_by: None,
                scheduled_at: None,
            }],
        );
        pim.id = id;
        pim
    }

    fn test_app_with(gateway: StubGateway) -> Router {
        let cache = Arc::new(InMemoryCache::new(100));
        let pipelines = Arc::new(SharedPipelineConfig::new(["deploy"]));
        let repository = PipelineHistoryRepository::new(
            Arc::new(gateway),
            cache.clone(),
            pipelines.clone(),
        );

        create_router(AppState {
            repository: Arc::new(repository),
            cache,
            pipelines,
        })
    }

    fn test_app() -> Router {
        let gateway = StubGateway::default();
        {
            let mut runs = gateway.runs.lock().unwrap();
            runs.push(run(1, "deploy", 1, StageState::Passed));
            runs.push(run(2, "deploy", 2, StageState::Passed));
            runs.push(run(3, "deploy", 3, StageState::Building));
            runs.push(run(4, "unconfigured", 1, StageState::Building));
        }
        test_app_with(gateway)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(test_app(), get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_get_instance_by_name_and_counter() {
        let (status, body) = send(test_app(), get("/history/deploy/2")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 2);
        assert_eq!(body["counter"], 2);
    }

    #[tokio::test]
    async fn test_unknown_instance_is_404() {
        let (status, body) = send(test_app(), get("/history/deploy/99")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("deploy/99"));
    }

    #[tokio::test]
    async fn test_zero_counter_is_400() {
        let (status, _) = send(test_app(), get("/history/deploy/0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_instance_by_id() {
        let (status, body) = send(test_app(), get("/instance/3")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "deploy");
        assert_eq!(body["counter"], 3);
    }

    #[tokio::test]
    async fn test_history_page() {
        let (status, body) = send(test_app(), get("/history/deploy?page_size=2&offset=0")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        let pipelines = body["pipelines"].as_array().unwrap();
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0]["counter"], 3);
        assert_eq!(pipelines[1]["counter"], 2);
    }

    #[tokio::test]
    async fn test_history_page_size_out_of_range() {
        let (status, _) = send(test_app(), get("/history/deploy?page_size=101")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_active_instances() {
        let (status, body) = send(test_app(), get("/active/DEPLOY")).await;

        assert_eq!(status, StatusCode::OK);
        let active = body.as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["id"], 3);

        let (status, body) = send(test_app(), get("/active/unconfigured")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_comment() {
        let app = test_app();

        let request = Request::builder()
            .method("POST")
            .uri("/history/deploy/1/comment")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"comment":"flaky test"}"#))
            .unwrap();
        let (status, _) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(app, get("/instance/1")).await;
        assert_eq!(body["comment"], "flaky test");
    }

    #[tokio::test]
    async fn test_update_comment_of_unknown_run() {
        let request = Request::builder()
            .method("POST")
            .uri("/history/deploy/42/comment")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"comment":"nothing here"}"#))
            .unwrap();

        let (status, _) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_store_down_is_503() {
        let app = test_app_with(StubGateway {
            down: true,
            ..Default::default()
        });

        let (status, body) = send(app, get("/history/deploy/1")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Pipeline history store unavailable");
    }

    #[tokio::test]
    async fn test_reload_configured_pipelines() {
        let app = test_app();

        let (_, body) = send(app.clone(), get("/active/unconfigured")).await;
        assert!(body.as_array().unwrap().is_empty());

        let request = Request::builder()
            .method("PUT")
            .uri("/config/pipelines")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"pipelines":["deploy","unconfigured"]}"#))
            .unwrap();
        let (status, _) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = send(app.clone(), get("/config/pipelines")).await;
        assert_eq!(body["pipelines"], serde_json::json!(["deploy", "unconfigured"]));

        let (status, body) = send(app, get("/active/unconfigured")).await;
        assert_eq!(status, StatusCode::OK);
        let active = body.as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["id"], 4);
    }

    #[tokio::test]
    async fn test_reload_rejects_blank_names() {
        let request = Request::builder()
            .method("PUT")
            .uri("/config/pipelines")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"pipelines":[""]}"#))
            .unwrap();

        let (status, _) = send(test_app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let app = test_app();

        send(app.clone(), get("/instance/1")).await;
        send(app.clone(), get("/instance/1")).await;
        let (status, body) = send(app, get("/cache/stats")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hits"], 1);
        assert_eq!(body["entry_count"], 1);
    }
}
