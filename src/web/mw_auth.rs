// src/web/mw_auth.rs
use crate::{
    error::AppError,
    models::member::MemberRecord,
    services::session_service::{SessionManager, SessionState},
};
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

// Identidade autenticada, disponível nos handlers protegidos
#[derive(Clone, Debug)]
pub struct CurrentMember(pub MemberRecord);

// Middleware que verifica se existe uma identidade na sessão
pub async fn require_auth(session: Session, mut request: Request, next: Next) -> Result<Response, AppError> {
    match SessionManager::new(session).state().await {
        Ok(SessionState::Authenticated(member)) => {
            tracing::debug!("Autenticação MW: '{}' autenticado. Prosseguindo...", member.id);
            request.extensions_mut().insert(CurrentMember(member));
            Ok(next.run(request).await)
        }
        Ok(SessionState::Anonymous) => {
            tracing::debug!("Autenticação MW: sessão anónima. Redirecionando para /login");
            Ok(Redirect::to("/login").into_response())
        }
        Err(e) => {
            tracing::error!("Autenticação MW: Erro ao ler sessão: {:?}", e);
            Err(e)
        }
    }
}
