// src/web/auth_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::member::{LoginForm, MemberRecord},
    services::session_service::{SessionManager, SessionState},
    state::AppState,
    templates::LoginPage,
};
use askama::Template;
use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

/// Página inicial de cada tipo de identidade.
pub fn home_for(member: &MemberRecord) -> &'static str {
    if member.is_admin() {
        "/admin"
    } else {
        "/cartao"
    }
}

fn render_login(error: Option<String>) -> AppResult<Response> {
    match (LoginPage { error }).render() {
        Ok(html) => Ok(Html(html).into_response()),
        Err(e) => {
            tracing::error!("Falha ao renderizar template de login: {}", e);
            Err(AppError::InternalServerError)
        }
    }
}

// GET /login
pub async fn show_login_form(session: Session) -> AppResult<Response> {
    // Sessão guardada é restaurada sem validar credenciais de novo
    if let SessionState::Authenticated(member) = SessionManager::new(session).state().await? {
        tracing::debug!("GET /login: '{}' já autenticado, redirecionando.", member.id);
        return Ok(Redirect::to(home_for(&member)).into_response());
    }
    render_login(None)
}

// POST /login
pub async fn handle_login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    tracing::info!("Tentativa de login para: {}", form.identifier.trim());

    let directory = state.directory.get_all();
    match SessionManager::new(session)
        .login(&directory, &form.identifier, &form.password)
        .await
    {
        Ok(member) => Ok(Redirect::to(home_for(&member)).into_response()),
        Err(AppError::InvalidCredentials) => {
            tracing::warn!("Credenciais incorretas para: {}", form.identifier.trim());
            render_login(Some(AppError::InvalidCredentials.user_message()))
        }
        Err(e) => Err(e),
    }
}

// GET /logout
pub async fn handle_logout(session: Session) -> AppResult<Redirect> {
    let manager = SessionManager::new(session);
    let who = match manager.state().await? {
        SessionState::Authenticated(member) => Some(member.id),
        SessionState::Anonymous => None,
    };
    manager.logout().await?;

    match who {
        Some(id) => tracing::info!("🚪 '{}' saiu.", id),
        None => tracing::info!("🚪 Sessão anónima terminada."),
    }
    Ok(Redirect::to("/login"))
}
