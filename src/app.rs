use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::warn;

use crate::state::AppState;
use crate::{adoptions, auth, pets, users};

pub fn build_app(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.uploads_dir);
    let cors = cors_layer(&state.config.frontend_origins);

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(pets::router())
                .merge(adoptions::router()),
        )
        .route("/health", get(health))
        .nest_service("/uploads", uploads)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

/// Credentialed CORS for the configured frontend origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn health() -> Json<Value> {
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    Json(json!({ "status": "ok", "timestamp": timestamp }))
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AdminSeed, users::services::ensure_admin};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    const ADMIN_EMAIL: &str = "admin@pets.io";
    const ADMIN_PASSWORD: &str = "admin-secret";

    async fn app() -> Router {
        let state = AppState::fake();
        ensure_admin(
            &state,
            &AdminSeed {
                email: ADMIN_EMAIL.into(),
                password: ADMIN_PASSWORD.into(),
            },
        )
        .await
        .unwrap();
        build_app(state)
    }

    async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Returns the `name=value` part of the session cookie.
    async fn login(app: &Router, email: &str, password: &str) -> String {
        let res = send(
            app,
            "POST",
            "/api/sessions/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let set_cookie = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("Max-Age=3600"));
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn register(app: &Router, email: &str) -> Value {
        let res = send(
            app,
            "POST",
            "/api/sessions/register",
            None,
            Some(json!({
                "first_name": "Ana",
                "last_name": "Diaz",
                "email": email,
                "password": "secret1"
            })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        json_body(res).await
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app().await;
        let res = send(&app, "GET", "/health", None, None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["status"], "ok");
    }

    #[tokio::test]
    async fn register_login_adopt_scenario() {
        let app = app().await;

        let registered = register(&app, "ana@pets.io").await;
        assert_eq!(registered["message"], "User registered successfully");
        assert_eq!(registered["user"]["role"], "user");
        assert!(registered["user"].get("password").is_none());
        let user_id = registered["user"]["id"].as_str().unwrap().to_string();

        let user_cookie = login(&app, "ana@pets.io", "secret1").await;
        let admin_cookie = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;

        let res = send(
            &app,
            "POST",
            "/api/pets",
            Some(&admin_cookie),
            Some(json!({ "name": "Rex", "specie": "dog", "birthDate": "2020-01-15" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let pet = json_body(res).await["pet"].clone();
        assert_eq!(pet["adopted"], false);
        assert_eq!(pet["owner"], Value::Null);
        assert_eq!(pet["image"], Value::Null);
        assert_eq!(pet["birthDate"], "2020-01-15");
        let pet_id = pet["id"].as_str().unwrap().to_string();

        let uri = format!("/api/adoptions/{user_id}/{pet_id}");
        let res = send(&app, "POST", &uri, Some(&user_cookie), None).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let adoption = json_body(res).await;
        assert_eq!(adoption["message"], "Adoption created successfully");
        assert_eq!(adoption["adoption"]["pet"]["id"], pet_id.as_str());

        let res = send(&app, "POST", &uri, Some(&user_cookie), None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "Pet is already adopted");

        let res = send(&app, "GET", &format!("/api/pets/{pet_id}"), None, None).await;
        let pet = json_body(res).await["pet"].clone();
        assert_eq!(pet["adopted"], true);
        assert_eq!(pet["owner"]["id"], user_id.as_str());

        let res = send(&app, "GET", "/api/sessions/current", Some(&user_cookie), None).await;
        let me = json_body(res).await;
        assert_eq!(me["user"]["pets"][0]["id"], pet_id.as_str());

        let res = send(&app, "GET", "/api/adoptions/user", Some(&user_cookie), None).await;
        assert_eq!(json_body(res).await["adoptions"].as_array().unwrap().len(), 1);

        let adoption_uri = format!(
            "/api/adoptions/{}",
            adoption["adoption"]["id"].as_str().unwrap()
        );
        let res = send(&app, "DELETE", &adoption_uri, Some(&admin_cookie), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["message"], "Adoption deleted successfully");

        let res = send(&app, "GET", &format!("/api/pets/{pet_id}"), None, None).await;
        let pet = json_body(res).await["pet"].clone();
        assert_eq!(pet["adopted"], false);
        assert_eq!(pet["owner"], Value::Null);

        let res = send(&app, "GET", "/api/sessions/current", Some(&user_cookie), None).await;
        assert_eq!(json_body(res).await["user"]["pets"], json!([]));

        let res = send(&app, "DELETE", &adoption_uri, Some(&admin_cookie), None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await["error"], "Adoption not found");

        let res = send(&app, "POST", &uri, Some(&user_cookie), None).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn admin_endpoints_reject_anonymous_and_plain_users() {
        let app = app().await;
        register(&app, "bob@pets.io").await;
        let user_cookie = login(&app, "bob@pets.io", "secret1").await;

        let pet = format!("/api/pets/{}", uuid::Uuid::new_v4());
        let image = format!("{pet}/image");
        let adoption = format!("/api/adoptions/{}", uuid::Uuid::new_v4());
        let cases = [
            ("GET", "/api/users"),
            ("GET", "/api/adoptions"),
            ("POST", "/api/pets"),
            ("PUT", pet.as_str()),
            ("DELETE", pet.as_str()),
            ("POST", image.as_str()),
            ("DELETE", adoption.as_str()),
        ];
        for (method, uri) in cases {
            let res = send(&app, method, uri, None, None).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
            assert_eq!(json_body(res).await["error"], "Authentication required");

            let res = send(&app, method, uri, Some(&user_cookie), None).await;
            assert_eq!(res.status(), StatusCode::FORBIDDEN, "{method} {uri}");
            assert_eq!(json_body(res).await["error"], "Admin access required");
        }
    }

    #[tokio::test]
    async fn users_cannot_adopt_on_behalf_of_others() {
        let app = app().await;
        let other = register(&app, "carl@pets.io").await;
        register(&app, "dana@pets.io").await;
        let cookie = login(&app, "dana@pets.io", "secret1").await;

        let uri = format!(
            "/api/adoptions/{}/{}",
            other["user"]["id"].as_str().unwrap(),
            uuid::Uuid::new_v4()
        );
        let res = send(&app, "POST", &uri, Some(&cookie), None).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let app = app().await;
        register(&app, "eve@pets.io").await;

        let mut bodies = Vec::new();
        for (email, password) in [("eve@pets.io", "wrong-pass"), ("nobody@pets.io", "secret1")] {
            let res = send(
                &app,
                "POST",
                "/api/sessions/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            bodies.push(json_body(res).await);
        }
        assert_eq!(bodies[0], bodies[1]);
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_bad_input_is_json_error() {
        let app = app().await;
        register(&app, "fay@pets.io").await;
        let cookie = login(&app, "fay@pets.io", "secret1").await;

        let res = send(&app, "POST", "/api/sessions/logout", Some(&cookie), None).await;
        assert_eq!(res.status(), StatusCode::OK);
        let cleared = res.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        assert!(cleared.contains("Max-Age=0"));

        let res = send(&app, "GET", "/api/pets/not-a-uuid", None, None).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "Invalid id");

        let req = Request::builder()
            .method("POST")
            .uri("/api/sessions/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn forgot_and_reset_password_over_http() {
        let app = app().await;
        register(&app, "gus@pets.io").await;

        let res = send(
            &app,
            "POST",
            "/api/sessions/forgot-password",
            None,
            Some(json!({ "email": "nobody@pets.io" })),
        )
        .await;
        let unknown = json_body(res).await;
        assert!(unknown.get("resetToken").is_none());

        let res = send(
            &app,
            "POST",
            "/api/sessions/forgot-password",
            None,
            Some(json!({ "email": "gus@pets.io" })),
        )
        .await;
        let known = json_body(res).await;
        assert_eq!(known["message"], unknown["message"]);
        let token = known["resetToken"].as_str().unwrap().to_string();
        assert_eq!(token.len(), 64);

        let res = send(
            &app,
            "POST",
            "/api/sessions/reset-password",
            None,
            Some(json!({ "token": token, "password": "changed1" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        login(&app, "gus@pets.io", "changed1").await;
    }
}
