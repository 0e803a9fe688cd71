pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post, put},
    Router,
};

use crate::document::handlers as documents;
use crate::editor::handlers as editor;
use crate::flatten::handlers as flatten;
use crate::layout::handlers as layout;
use crate::overlap::handlers as overlap;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/health", get(health::health_handler))
        // Documents
        .route("/api/v1/documents", post(documents::handle_create_document))
        .route(
            "/api/v1/documents/:id",
            get(documents::handle_get_document).put(documents::handle_replace_document),
        )
        .route(
            "/api/v1/documents/:id/editable",
            patch(documents::handle_set_editable),
        )
        .route(
            "/api/v1/documents/:id/warnings",
            get(documents::handle_document_warnings),
        )
        // Editor
        .route("/api/v1/documents/:id/editor", get(editor::handle_get_editor))
        .route(
            "/api/v1/documents/:id/editor/fields",
            put(editor::handle_load_fields),
        )
        .route(
            "/api/v1/documents/:id/editor/events",
            post(editor::handle_editor_event),
        )
        // Export
        .route("/api/v1/documents/:id/export", post(flatten::handle_export))
        // Stateless checks
        .route("/api/v1/fit", post(layout::handle_fit))
        .route("/api/v1/warnings", post(overlap::handle_warnings))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::document::source::tests::sample_pdf;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "fieldplate-test-boundary";

    fn app() -> Router {
        build_router(AppState::new(Config::default()))
    }

    fn app_with_loading_document() -> (Router, uuid::Uuid) {
        let state = AppState::new(Config::default());
        let id = uuid::Uuid::new_v4();
        let record = crate::document::DocumentRecord::new(
            id,
            None,
            bytes::Bytes::from_static(b"%PDF"),
            crate::editor::session::EditorSession::new(state.editor_settings()),
        );
        state.documents.try_write().unwrap().insert(id, record);
        (build_router(state), id)
    }

    fn multipart_body(file_name: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(method: &str, uri: &str, bytes: &[u8]) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body("lease.pdf", bytes)))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_until_settled(app: &Router, id: &str) -> Value {
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(get_request(&format!("/api/v1/documents/{id}")))
                .await
                .unwrap();
            let summary = body_json(response).await;
            if summary["status"]["state"] != "loading" {
                return summary;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("document {id} never finished loading");
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["service"], "fieldplate-api");
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let response = app()
            .oneshot(get_request(
                "/api/v1/documents/00000000-0000-0000-0000-000000000000",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_fit_endpoint_reports_truncation() {
        let response = app()
            .oneshot(json_request(
                "POST",
                "/api/v1/fit",
                json!({
                    "text": "one two three four five six seven eight nine ten",
                    "boxWidth": 60.0,
                    "boxHeight": 16.0,
                    "style": {
                        "typography": { "fontSize": 10.0, "lineHeightRatio": 1.2 },
                        "padding": 2.0
                    }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fits"], false);
        assert_eq!(body["visibleLines"], 1);
        assert!(body["lines"].as_array().unwrap().len() > 1);
    }

    #[tokio::test]
    async fn test_fit_endpoint_rejects_negative_box() {
        let response = app()
            .oneshot(json_request(
                "POST",
                "/api/v1/fit",
                json!({ "text": "x", "boxWidth": -1.0, "boxHeight": 10.0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stateless_warnings_flag_overlapping_fields() {
        let field = |id: &str, x: f64| {
            json!({
                "id": id, "kind": "text", "label": id, "pageNumber": 1,
                "x": x, "y": 10.0, "width": 20.0, "height": 5.0
            })
        };
        let response = app()
            .oneshot(json_request(
                "POST",
                "/api/v1/warnings",
                json!({
                    "fields": [field("a", 10.0), field("b", 20.0)],
                    "pages": [{
                        "pageNumber": 1, "widthPx": 816.0, "heightPx": 1056.0,
                        "widthPt": 612.0, "heightPt": 792.0
                    }]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["overlappingFieldIds"], json!(["a", "b"]));
        assert_eq!(body["labels"]["overlappingFieldLabels"], json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_upload_place_fill_and_export() {
        let app = app();
        let response = app
            .clone()
            .oneshot(upload("POST", "/api/v1/documents", &sample_pdf(&["Tenant"])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let summary = wait_until_settled(&app, &id).await;
        assert_eq!(summary["status"]["state"], "ready");
        assert_eq!(summary["pages"].as_array().unwrap().len(), 1);

        let events = format!("/api/v1/documents/{id}/editor/events");
        let armed = app
            .clone()
            .oneshot(json_request(
                "POST",
                &events,
                json!({ "type": "arm_placement", "kind": "text" }),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(armed).await["outcome"]["outcome"], "armed");

        let placed = app
            .clone()
            .oneshot(json_request(
                "POST",
                &events,
                json!({ "type": "page_click", "page_number": 1, "x_px": 300.0, "y_px": 600.0 }),
            ))
            .await
            .unwrap();
        let placed = body_json(placed).await;
        assert_eq!(placed["outcome"]["outcome"], "field_placed");
        let field_id = placed["outcome"]["field_id"].as_str().unwrap().to_string();

        let filled = app
            .clone()
            .oneshot(json_request(
                "POST",
                &events,
                json!({ "type": "edit_value", "field_id": field_id, "value": "Ada" }),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(filled).await["outcome"]["outcome"], "value_accepted");

        let exported = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/documents/{id}/export"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(exported.status(), StatusCode::OK);
        assert_eq!(
            exported.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        let bytes = to_bytes(exported.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[tokio::test]
    async fn test_garbage_upload_fails_and_refuses_export() {
        let app = app();
        let response = app
            .clone()
            .oneshot(upload("POST", "/api/v1/documents", b"not a pdf"))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let summary = wait_until_settled(&app, &id).await;
        assert_eq!(summary["status"]["state"], "failed");

        let exported = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/documents/{id}/export"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(exported.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_locked_document_refuses_field_load() {
        let app = app();
        let response = app
            .clone()
            .oneshot(upload("POST", "/api/v1/documents", &sample_pdf(&["x"])))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_str().unwrap().to_string();

        let locked = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                &format!("/api/v1/documents/{id}/editable"),
                json!({ "editable": false }),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(locked).await["editable"], false);

        let response = app
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/documents/{id}/editor/fields"),
                json!({ "fields": [] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_stored_fields_and_values_restore_after_load() {
        let app = app();
        let response = app
            .clone()
            .oneshot(upload("POST", "/api/v1/documents", &sample_pdf(&["x"])))
            .await
            .unwrap();
        let id = body_json(response).await["id"].as_str().unwrap().to_string();
        wait_until_settled(&app, &id).await;

        let response = app
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/documents/{id}/editor/fields"),
                json!({
                    "fields": [{
                        "id": "t", "kind": "text", "label": "Tenant", "pageNumber": 1,
                        "x": 20.0, "y": 40.0, "width": 30.0, "height": 6.0
                    }],
                    "values": { "t": "Ada Lovelace" }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["snapshot"]["values"]["t"], "Ada Lovelace");
        assert_eq!(body["rejectedValueIds"], json!([]));
    }

    #[tokio::test]
    async fn test_value_restore_is_refused_while_loading() {
        let (app, id) = app_with_loading_document();
        let uri = format!("/api/v1/documents/{id}/editor/fields");
        let field = json!({
            "id": "t", "kind": "text", "label": "Tenant", "pageNumber": 1,
            "x": 20.0, "y": 40.0, "width": 30.0, "height": 6.0
        });

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &uri,
                json!({ "fields": [field.clone()], "values": { "t": "Ada" } }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(json_request("PUT", &uri, json!({ "fields": [field] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
