//! Portal API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`; stored objects are served under
//! `/storage/`.
//!
//! Middleware stack (outermost → innermost):
//! CORS → Cache-Control → body limit → Auth validator → Audit logger

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Request bodies carry base64 documents, roughly 4/3 of the file size.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Build the portal API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer
/// of the protected routes). Endpoint handlers use `State<ApiContext>`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // Protected routes: bearer token required.
    //
    // Layers are applied from bottom (innermost) to top (outermost):
    //   Extension (outermost) → Auth → Audit (innermost) → Handler
    //
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/me", get(endpoints::auth::me))
        .route("/policies", get(endpoints::policies::list))
        .route(
            "/policies/:id",
            get(endpoints::policies::detail)
                .patch(endpoints::policies::update)
                .delete(endpoints::policies::remove),
        )
        .route("/policies/:id/approval", get(endpoints::policies::approval))
        .route("/policies/:id/attest", post(endpoints::policies::attest))
        .route("/documents/preview", post(endpoints::documents::preview))
        .route("/documents/export", post(endpoints::documents::export))
        .route("/briefs/import", post(endpoints::briefs::import))
        .route("/briefs/export", post(endpoints::briefs::export))
        .route(
            "/briefs/draft",
            get(endpoints::briefs::load_draft).put(endpoints::briefs::save_draft),
        )
        .route("/briefs/new", get(endpoints::briefs::new_brief))
        .route("/briefs/intake", post(endpoints::briefs::intake))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::Extension(ctx.clone()));

    // Unprotected routes. Administrative handlers authorize themselves.
    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/login", post(endpoints::auth::login))
        .route(
            "/admin/add-users-to-group",
            post(endpoints::admin::add_users_to_group),
        )
        .route("/admin/cleanup-users", post(endpoints::admin::cleanup_users))
        .route(
            "/admin/populate-test-data",
            post(endpoints::admin::populate_test_data),
        )
        .route(
            "/admin/upload-sample-policies",
            post(endpoints::admin::upload_sample_policies),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access));

    let storage = Router::new()
        .route("/storage/:bucket/*key", get(endpoints::storage::fetch))
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .merge(storage)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use base64::Engine;
    use tower::ServiceExt;

    use crate::admin::test_support::signed_in;
    use crate::core_state::test_support::state;
    use crate::document::docx::test_support::{docx_with_body, paragraphs};
    use crate::models::{Policy, Role};

    fn app() -> (Router, Arc<CoreState>) {
        let core = Arc::new(state());
        (api_router(core.clone()), core)
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 16 * 1024 * 1024).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn access_control_docx_b64() -> String {
        let bytes = docx_with_body(&paragraphs(&[
            "SECTION",
            "IT Ops",
            "NUMBER",
            "2.04",
            "SUBJECT",
            "Access Control",
            "PROCEDURES",
            "Badges are required at all times.",
        ]));
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn health_is_public() {
        let (app, _) = app();
        let (status, json) = send(&app, request("GET", "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn health_reports_policy_count() {
        let (app, core) = app();
        core.store.insert_policy(&Policy::draft("Travel", None, None)).unwrap();
        core.store.insert_policy(&Policy::draft("Expenses", None, None)).unwrap();
        let (status, json) = send(&app, request("GET", "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["policies"], 2);
    }

    #[tokio::test]
    async fn protected_route_requires_token() {
        let (app, _) = app();
        let (status, json) = send(&app, request("GET", "/api/policies", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");

        let (status, _) = send(&app, request("GET", "/api/policies", Some("bogus"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_issues_usable_token() {
        let (app, core) = app();
        signed_in(&core, "ada@example.com", Role::Employee);

        let body = serde_json::json!({ "email": "ada@example.com", "password": "secret-pass" });
        let (status, json) = send(&app, request("POST", "/api/auth/login", None, Some(body))).await;
        assert_eq!(status, StatusCode::OK);
        let token = json["access_token"].as_str().unwrap().to_string();

        let (status, json) = send(&app, request("GET", "/api/auth/me", Some(&token), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["claims"]["role"], "employee");

        let bad = serde_json::json!({ "email": "ada@example.com", "password": "wrong" });
        let (status, _) = send(&app, request("POST", "/api/auth/login", None, Some(bad))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes_separate_401_and_403() {
        let (app, core) = app();
        let (_, employee) = signed_in(&core, "emp@example.com", Role::Employee);
        let (_, publisher) = signed_in(&core, "pub@example.com", Role::Publisher);

        let (status, _) = send(&app, request("POST", "/api/admin/cleanup-users", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, json) = send(&app, request("POST", "/api/admin/cleanup-users", Some(&employee), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"]["message"], "Forbidden: admin role required");

        // publishers may upload samples but not clean up
        let (status, _) = send(&app, request("POST", "/api/admin/cleanup-users", Some(&publisher), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, json) =
            send(&app, request("POST", "/api/admin/upload-sample-policies", Some(&publisher), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["uploadedCount"], 0);
    }

    #[tokio::test]
    async fn admin_cleanup_keeps_caller() {
        let (app, core) = app();
        let (_, admin) = signed_in(&core, "root@example.com", Role::Admin);
        signed_in(&core, "other@example.com", Role::Employee);

        let (status, json) = send(&app, request("POST", "/api/admin/cleanup-users", Some(&admin), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["deletedUsers"], 1);
        assert_eq!(core.store.count_profiles().unwrap(), 1);
    }

    #[tokio::test]
    async fn export_then_download_pdf() {
        let (app, core) = app();
        let (_, publisher) = signed_in(&core, "pub@example.com", Role::Publisher);

        let body = serde_json::json!({ "file_name": "access.docx", "data": access_control_docx_b64() });
        let (status, json) = send(&app, request("POST", "/api/documents/export", Some(&publisher), Some(body))).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["pdf_name"], "2.04_Access_Control.pdf");
        assert_eq!(json["policy"]["title"], "Access Control");
        assert_eq!(json["version"]["version_number"], 1);

        let key = json["object"]["key"].as_str().unwrap();
        let response = app
            .clone()
            .oneshot(request("GET", &format!("/storage/policy-documents/{key}"), None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/pdf");
        let bytes = to_bytes(response.into_body(), 16 * 1024 * 1024).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn employees_cannot_export() {
        let (app, core) = app();
        let (_, employee) = signed_in(&core, "emp@example.com", Role::Employee);
        let body = serde_json::json!({ "file_name": "access.docx", "data": access_control_docx_b64() });
        let (status, _) = send(&app, request("POST", "/api/documents/preview", Some(&employee), Some(body))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn corrupt_upload_is_422() {
        let (app, core) = app();
        let (_, publisher) = signed_in(&core, "pub@example.com", Role::Publisher);
        let data = base64::engine::general_purpose::STANDARD.encode(b"not a zip");
        let body = serde_json::json!({ "file_name": "broken.docx", "data": data });
        let (status, json) = send(&app, request("POST", "/api/documents/preview", Some(&publisher), Some(body))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "CONVERSION_FAILED");
    }

    #[tokio::test]
    async fn attest_then_report_and_conflict() {
        let (app, core) = app();
        let (_, publisher) = signed_in(&core, "pub@example.com", Role::Publisher);
        let (_, employee) = signed_in(&core, "emp@example.com", Role::Employee);

        let body = serde_json::json!({ "file_name": "access.docx", "data": access_control_docx_b64() });
        let (_, json) = send(&app, request("POST", "/api/documents/export", Some(&publisher), Some(body))).await;
        let policy_id = json["policy"]["id"].as_str().unwrap().to_string();

        let uri = format!("/api/policies/{policy_id}/attest");
        let (status, _) = send(&app, request("POST", &uri, Some(&employee), None)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, json) = send(&app, request("POST", &uri, Some(&employee), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "CONFLICT");

        let (status, json) = send(
            &app,
            request("GET", &format!("/api/policies/{policy_id}/approval"), Some(&employee), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["recent_attestations"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settings_patch_and_delete() {
        let (app, core) = app();
        let (_, publisher) = signed_in(&core, "pub@example.com", Role::Publisher);
        let (_, employee) = signed_in(&core, "emp@example.com", Role::Employee);
        let policy = Policy::draft("Travel", None, None);
        core.store.insert_policy(&policy).unwrap();
        let uri = format!("/api/policies/{}", policy.id);

        let patch = serde_json::json!({ "status": "review", "category": "Finance" });
        let (status, _) = send(&app, request("PATCH", &uri, Some(&employee), Some(patch.clone()))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, json) = send(&app, request("PATCH", &uri, Some(&publisher), Some(patch))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "review");
        assert_eq!(json["category"], "Finance");

        let (status, _) = send(&app, request("DELETE", &uri, Some(&publisher), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, request("GET", &uri, Some(&publisher), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_policy_id_is_400() {
        let (app, core) = app();
        let (_, employee) = signed_in(&core, "emp@example.com", Role::Employee);
        let (status, _) = send(&app, request("GET", "/api/policies/not-a-uuid", Some(&employee), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn brief_draft_and_intake() {
        let (app, core) = app();
        let (_, employee) = signed_in(&core, "emp@example.com", Role::Employee);

        let save = serde_json::json!({ "title": "Q3 Brief", "content_html": "<p>Draft</p>" });
        let (status, _) = send(&app, request("PUT", "/api/briefs/draft", Some(&employee), Some(save))).await;
        assert_eq!(status, StatusCode::OK);
        let (_, json) = send(&app, request("GET", "/api/briefs/draft", Some(&employee), None)).await;
        assert_eq!(json["title"], "Q3 Brief");

        let form = serde_json::json!({ "projectName": "Atlas" });
        let (status, json) = send(&app, request("POST", "/api/briefs/intake", Some(&employee), Some(form))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["html"].as_str().unwrap().contains("<strong>Project Name:</strong> Atlas"));

        let export = serde_json::json!({ "title": "Q3 Brief", "content_html": "<p>Draft</p>" });
        let (status, json) = send(&app, request("POST", "/api/briefs/export", Some(&employee), Some(export))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["file_name"], "Q3_Brief.docx");
    }

    #[tokio::test]
    async fn responses_are_not_cached() {
        let (app, _) = app();
        let response = app.oneshot(request("GET", "/api/health", None, None)).await.unwrap();
        assert_eq!(response.headers()["cache-control"], "no-store");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (app, _) = app();
        let (status, _) = send(&app, request("GET", "/nonexistent", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
