use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use extract::EntityRecord;
use pipeline::{ExportSink, Pipeline, PipelineError, RunOutcome, RunStats, RunStatus};
use planner::PlanError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub sink: Arc<dyn ExportSink>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct ResearchRequest {
    pub topic: String,
}

#[derive(Serialize)]
pub struct ResearchResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub entities: Vec<EntityRecord>,
    pub output_file: Option<String>,
    pub stats: RunStats,
}

impl From<RunOutcome> for ResearchResponse {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            run_id: outcome.run_id,
            status: outcome.status,
            entities: outcome.entities,
            output_file: outcome.location,
            stats: outcome.stats,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/research", post(run_research))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn run_research(
    State(state): State<AppState>,
    Json(req): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>, ApiError> {
    let topic = req.topic.trim();
    if topic.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "topic must not be empty"));
    }

    match state.pipeline.run_and_export(topic, state.sink.as_ref()).await {
        Ok(outcome) => Ok(Json(outcome.into())),
        Err(PipelineError::Planning(PlanError::EmptyTopic)) => {
            Err(api_error(StatusCode::BAD_REQUEST, "topic must not be empty"))
        }
        Err(e @ PipelineError::Planning(_)) => Err(api_error(StatusCode::BAD_GATEWAY, e.to_string())),
        Err(e) => {
            error!(error = %e, "Research run failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use extract::{ExtractError, StructuredExtractor, TargetSchema};
    use pipeline::{Collaborators, ExportError, PipelineConfig};
    use planner::{TermGenerator, TermGroups};
    use retrieval::{RawResult, RecordingSleeper, SearchError, SearchProvider};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct Terms(bool);

    #[async_trait]
    impl TermGenerator for Terms {
        async fn generate_terms(&self, _topic: &str) -> Result<TermGroups, PlanError> {
            if !self.0 {
                return Err(PlanError::Transient("model overloaded".to_string()));
            }
            Ok(TermGroups {
                primary: vec!["vector database".to_string()],
                providers: vec!["vector database vendors".to_string()],
                reviews: vec!["vector database reviews".to_string()],
            })
        }
    }

    struct Search;

    #[async_trait]
    impl SearchProvider for Search {
        async fn search(&self, query: &str) -> Result<RawResult, SearchError> {
            Ok(RawResult::new(format!("Results for {}", query)))
        }
    }

    struct Extractor;

    #[async_trait]
    impl StructuredExtractor for Extractor {
        async fn extract(&self, _topic: &str, _raw: &str, _schema: &TargetSchema) -> Result<String, ExtractError> {
            Ok(r#"{"companies": [{"name": "Qdrant", "rating": 4.7}]}"#.to_string())
        }
    }

    struct NullSink;

    #[async_trait]
    impl ExportSink for NullSink {
        async fn export(&self, _entities: &[EntityRecord]) -> Result<String, ExportError> {
            Ok("reports/test.json".to_string())
        }
    }

    fn app(planning_works: bool) -> Router {
        let collaborators = Collaborators {
            terms: Arc::new(Terms(planning_works)),
            search: Arc::new(Search),
            extractor: Arc::new(Extractor),
        };
        let pipeline = Pipeline::with_sleeper(
            collaborators,
            &PipelineConfig::default(),
            Arc::new(RecordingSleeper::new()),
        )
        .unwrap();

        router(AppState {
            pipeline: Arc::new(pipeline),
            sink: Arc::new(NullSink),
        })
    }

    async fn post_research(app: Router, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/research")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(true)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_research_returns_entities() {
        let (status, body) = post_research(app(true), json!({"topic": "Vector databases"})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["entities"][0]["name"], "Qdrant");
        assert_eq!(body["entities"][0]["rating"], "4.7");
        assert_eq!(body["output_file"], "reports/test.json");
    }

    #[tokio::test]
    async fn test_blank_topic_is_bad_request() {
        let (status, body) = post_research(app(true), json!({"topic": "   "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_planning_failure_is_bad_gateway() {
        let (status, body) = post_research(app(false), json!({"topic": "Vector databases"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("planning failed"));
    }
}
