//! Task registration and listing endpoints.
//!
//! `POST /task` takes a form body with `notify_url`, `param_str` and
//! `time_str` (`YYYYMMDD HH:MM:SS`). Responses keep the `{"err": ...}` shape
//! existing clients rely on: `"ok"` on success, the error text otherwise.

use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::StatusCode,
    Form, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use timehook_scheduler::{EntryId, TaskView};
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct AddTaskForm {
    #[serde(default)]
    pub notify_url: String,
    #[serde(default)]
    pub param_str: String,
    #[serde(default)]
    pub time_str: String,
}

/// POST /task — register a one-shot notification.
///
/// 201 with the handle on success, 500 on missing fields, an unreadable
/// body or a rejected task.
pub async fn add_task(
    State(state): State<Arc<AppState>>,
    form: Result<Form<AddTaskForm>, FormRejection>,
) -> (StatusCode, Json<Value>) {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => {
            warn!(error = %e, "add task: unreadable form body");
            return invalid_params();
        }
    };
    let notify_url = form.notify_url.trim();
    let param = form.param_str.trim();
    let time_str = form.time_str.trim();

    if notify_url.is_empty() || param.is_empty() || time_str.is_empty() {
        return invalid_params();
    }

    match state.tasks.add_task(notify_url, param, time_str) {
        Ok(id) => (StatusCode::CREATED, Json(json!({"err": "ok", "id": id}))),
        Err(e) => {
            warn!(url = %notify_url, error = %e, "add task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"err": e.to_string()})),
            )
        }
    }
}

fn invalid_params() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"err": "Invalid params"})),
    )
}

/// GET / — one human-readable line per live task.
pub async fn list_summaries(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let mut tasks: Vec<_> = state.tasks.get_tasks().into_iter().collect();
    tasks.sort_by_key(|(id, _)| *id);
    Json(tasks.into_iter().map(|(_, job)| job.to_string()).collect())
}

/// GET /tasks — structured listing.
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskView>> {
    Json(state.tasks.views())
}

/// DELETE /tasks/{id} — idempotent; unknown handles also get 204.
pub async fn remove_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<EntryId>,
) -> StatusCode {
    state.tasks.remove_task(id);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use crate::app::{build_router, AppState};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use timehook_core::TimehookConfig;
    use timehook_scheduler::TaskManager;
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<TaskManager>) {
        let config = TimehookConfig::default();
        let tasks = Arc::new(TaskManager::new(&config.scheduler).unwrap());
        let state = Arc::new(AppState::new(config, Arc::clone(&tasks)));
        (build_router(state), tasks)
    }

    fn form_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/task")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn add_task_returns_created_with_handle() {
        let (app, tasks) = test_app();
        let resp = app
            .oneshot(form_post(
                "notify_url=http%3A%2F%2Fexample.test%2Fhook&param_str=abc&time_str=20250601+09%3A00%3A00",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = json_body(resp).await;
        assert_eq!(body["err"], "ok");
        let id = body["id"].as_u64().unwrap();
        assert!(tasks.task_exists(id.into()));
    }

    #[tokio::test]
    async fn values_are_trimmed() {
        let (app, tasks) = test_app();
        let resp = app
            .oneshot(form_post(
                "notify_url=+http%3A%2F%2Fexample.test+&param_str=+abc+&time_str=+20250601+09%3A00%3A00+",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let job = tasks.get_tasks().into_values().next().unwrap();
        assert_eq!(job.notify_url(), "http://example.test");
        assert_eq!(job.param(), "abc");
        assert_eq!(job.time_str(), "20250601 09:00:00");
    }

    #[tokio::test]
    async fn missing_field_is_invalid_params() {
        let (app, tasks) = test_app();
        let resp = app
            .oneshot(form_post("notify_url=http%3A%2F%2Fexample.test&param_str=abc"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["err"], "Invalid params");
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn bodyless_or_mistyped_post_is_invalid_params() {
        let (app, tasks) = test_app();
        let requests = [
            Request::builder()
                .method("POST")
                .uri("/task")
                .body(Body::empty())
                .unwrap(),
            Request::builder()
                .method("POST")
                .uri("/task")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"notify_url":"http://example.test"}"#))
                .unwrap(),
        ];

        for req in requests {
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json_body(resp).await["err"], "Invalid params");
        }
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn bad_timestamp_reports_error_text() {
        let (app, tasks) = test_app();
        let resp = app
            .oneshot(form_post(
                "notify_url=http%3A%2F%2Fexample.test&param_str=abc&time_str=2025-06-01",
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let err = json_body(resp).await["err"].as_str().unwrap().to_string();
        assert!(err.starts_with("Invalid timestamp"), "got {err}");
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn listings_reflect_live_tasks() {
        let (app, tasks) = test_app();
        let id = tasks
            .add_task("http://example.test/hook", "abc", "20250601 09:00:00")
            .unwrap();

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await,
            serde_json::json!([format!(
                "#Task {id} -http://example.test/hook- -abc- @20250601 09:00:00@ #"
            )])
        );

        let resp = app
            .oneshot(Request::builder().uri("/tasks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body[0]["id"], id.get());
        assert_eq!(body[0]["param"], "abc");
        assert!(body[0]["next_run"].is_string());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (app, tasks) = test_app();
        let id = tasks
            .add_task("http://example.test/hook", "abc", "20250601 09:00:00")
            .unwrap();

        for _ in 0..2 {
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("DELETE")
                        .uri(format!("/tasks/{id}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        }
        assert!(!tasks.task_exists(id));
    }

    #[tokio::test]
    async fn health_reports_task_count() {
        let (app, tasks) = test_app();
        tasks
            .add_task("http://example.test/hook", "abc", "20250601 09:00:00")
            .unwrap();

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["tasks"], 1);
        assert_eq!(body["running"], false);
    }
}
