// src/web/mw_admin.rs
use crate::{error::AppError, web::mw_auth::CurrentMember};
use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};

/// Só deixa passar a identidade de gestor.
/// Deve ser executado *depois* do middleware `require_auth`.
pub async fn require_admin(
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if member.is_admin() {
        tracing::debug!("Admin MW: Acesso concedido para {}", member.id);
        Ok(next.run(request).await)
    } else {
        tracing::warn!("Admin MW: Acesso negado para {} (não é gestor).", member.id);
        Err(AppError::Unauthorized)
    }
}
