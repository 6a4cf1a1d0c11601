// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, collaborators, survey},
    state::AppState,
    utils::guard::admin_middleware,
};

/// Assembles the main application router.
///
/// * Public respondent routes under `/api/survey`.
/// * Admin routes under `/api/admin`, behind the admin token guard.
/// * Global middleware (Trace, CORS restricted to the public origin).
pub fn create_router(state: AppState) -> Router {
    let origin = state.config.public_base_url.origin().ascii_serialization();
    let origins: Vec<HeaderValue> = HeaderValue::from_str(&origin).into_iter().collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let survey_routes = Router::new()
        .route("/active", get(survey::get_active_survey))
        .route("/{key}", get(survey::get_survey_by_key))
        .route("/{key}/responses", post(survey::submit_response));

    let admin_routes = Router::new()
        .route(
            "/surveys",
            get(admin::list_surveys).post(admin::create_survey),
        )
        .route("/surveys/deactivate-all", post(admin::deactivate_all_surveys))
        .route(
            "/surveys/{id}",
            get(admin::get_survey).delete(admin::delete_survey),
        )
        .route("/surveys/{id}/activate", post(admin::activate_survey))
        .route("/surveys/{id}/deactivate", post(admin::deactivate_survey))
        .route("/surveys/{id}/responses", get(admin::list_responses))
        .route(
            "/surveys/{id}/keys",
            get(admin::list_keys).post(admin::issue_keys),
        )
        .route("/surveys/{id}/keys/single", post(admin::generate_key))
        .route("/keys/{id}", delete(admin::delete_key))
        .route("/keys/{id}/send", post(admin::send_invitation))
        .route(
            "/collaborators",
            get(collaborators::list_collaborators).post(collaborators::create_collaborator),
        )
        .route(
            "/collaborators/{id}",
            put(collaborators::update_collaborator).delete(collaborators::delete_collaborator),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_middleware,
        ));

    Router::new()
        .nest("/api/survey", survey_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, mail::DisabledMailer, store::MemoryStore};

    fn router(admin_token: Option<&str>) -> Router {
        let mut config = Config::for_tests();
        config.admin_token = admin_token.map(str::to_string);
        create_router(AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(DisabledMailer),
            config,
        ))
    }

    async fn status(app: Router, uri: &str, bearer: Option<&str>) -> StatusCode {
        let mut request = Request::builder().uri(uri);
        if let Some(token) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_admin_guard_checks_bearer_token() {
        assert_eq!(
            status(router(Some("t0k")), "/api/admin/surveys", None).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(router(Some("t0k")), "/api/admin/surveys", Some("wrong")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(router(Some("t0k")), "/api/admin/surveys", Some("t0k")).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_rejected_admin_request_has_json_error_body() {
        let response = router(Some("t0k"))
            .oneshot(
                Request::builder()
                    .uri("/api/admin/surveys")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Missing or invalid admin token");
    }

    #[tokio::test]
    async fn test_admin_routes_open_without_token() {
        assert_eq!(
            status(router(None), "/api/admin/collaborators", None).await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        assert_eq!(
            status(router(None), "/api/survey/does-not-exist", None).await,
            StatusCode::NOT_FOUND
        );
    }
}
