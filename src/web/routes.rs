// src/web/routes.rs
use crate::{
    state::AppState,
    web::{admin_handlers, auth_handlers, live_handlers, member_handlers, mw_admin, mw_auth},
};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};

pub fn create_router(app_state: AppState) -> Router {
    // --- Rotas Públicas ---
    let public_routes = Router::new()
        .route("/login", get(auth_handlers::show_login_form).post(auth_handlers::handle_login))
        .route("/logout", get(auth_handlers::handle_logout))
        .route("/", get(|| async { axum::response::Redirect::to("/login") }));

    // --- Rotas de Admin ---
    // Exigem login E identidade de gestor
    let admin_routes = Router::new()
        .route("/", get(admin_handlers::show_dashboard))
        .route("/importar", post(admin_handlers::handle_import))
        .route("/limpar", post(admin_handlers::handle_clear))
        .route("/ao-vivo", get(live_handlers::live_websocket_handler))
        // Só o mw_admin aqui; o mw_auth vem do router pai
        .route_layer(middleware::from_fn(mw_admin::require_admin));

    // --- Rotas Autenticadas ---
    let authenticated_routes = Router::new()
        .route("/cartao", get(member_handlers::member_card_handler))
        .route("/cartao/foto", post(member_handlers::handle_photo_upload))
        .nest("/admin", admin_routes)
        // require_auth corre antes de tudo o que está acima (incluindo /admin/*)
        .route_layer(middleware::from_fn(mw_auth::require_auth));

    // --- Router Final ---
    let body_limit = app_state.max_upload_bytes;
    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        models::member::member,
        state::LiveDirectoryState,
        store::{local::SqliteSnapshotStore, DirectoryStore},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use std::sync::Arc;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    async fn test_app() -> Router {
        let pool = db::memory_pool().await.unwrap();
        let store = SqliteSnapshotStore::load(pool).await.unwrap();
        store.replace(vec![member("1001", "Ana Souza")]).await.unwrap();

        let state = AppState {
            directory: Arc::new(store),
            live_state: LiveDirectoryState::default(),
            max_upload_bytes: 1024 * 1024,
        };
        create_router(state).layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
    }

    fn login_request(username: &str, password: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("username={}&password={}", username, password)))
            .unwrap()
    }

    fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap()
    }

    fn location(res: &Response) -> &str {
        res.headers().get(header::LOCATION).unwrap().to_str().unwrap()
    }

    fn session_cookie(res: &Response) -> String {
        let raw = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        raw.split(';').next().unwrap().to_string()
    }

    async fn body_text(res: Response) -> String {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn admin_keyword_opens_dashboard() {
        let app = test_app().await;

        let res = app.clone().oneshot(login_request("ADMIN", "admin")).await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/admin");
        let cookie = session_cookie(&res);

        let res = app.oneshot(get_with_cookie("/admin", &cookie)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let html = body_text(res).await;
        assert!(html.contains("Ana Souza"));
    }

    #[tokio::test]
    async fn member_login_goes_to_card() {
        let app = test_app().await;

        let res = app.clone().oneshot(login_request("1001", "1001")).await.unwrap();
        assert_eq!(location(&res), "/cartao");
        let cookie = session_cookie(&res);

        let res = app.clone().oneshot(get_with_cookie("/cartao", &cookie)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(res).await.contains("Ana"));

        // membro comum não entra no painel
        let res = app.oneshot(get_with_cookie("/admin", &cookie)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_credentials_render_error() {
        let app = test_app().await;
        let res = app.oneshot(login_request("1001", "errada")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(res).await.contains("Credenciais incorretas"));
    }

    #[tokio::test]
    async fn protected_pages_redirect_anonymous() {
        let app = test_app().await;
        for uri in ["/cartao", "/admin"] {
            let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::SEE_OTHER);
            assert_eq!(location(&res), "/login");
        }
    }

    #[tokio::test]
    async fn logout_ends_session() {
        let app = test_app().await;
        let res = app.clone().oneshot(login_request("admin", "admin")).await.unwrap();
        let cookie = session_cookie(&res);

        let res = app.clone().oneshot(get_with_cookie("/logout", &cookie)).await.unwrap();
        assert_eq!(location(&res), "/login");

        let res = app.oneshot(get_with_cookie("/admin", &cookie)).await.unwrap();
        assert_eq!(location(&res), "/login");
    }

    #[tokio::test]
    async fn clear_without_keyword_keeps_directory() {
        let app = test_app().await;
        let res = app.clone().oneshot(login_request("admin", "admin")).await.unwrap();
        let cookie = session_cookie(&res);

        let req = Request::builder()
            .method("POST")
            .uri("/admin/limpar")
            .header(header::COOKIE, &cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("confirmacao=sim"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert!(location(&res).starts_with("/admin?error="));

        let res = app.oneshot(get_with_cookie("/admin", &cookie)).await.unwrap();
        assert!(body_text(res).await.contains("Ana Souza"));
    }
}
