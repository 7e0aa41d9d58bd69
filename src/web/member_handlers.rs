// src/web/member_handlers.rs
use crate::{
    error::{AppError, AppResult},
    services::{directory_service, session_service::SessionManager},
    state::AppState,
    store::PhotoScope,
    templates::{MemberCardPage, MemberCardView},
    web::{admin_handlers::FeedbackParams, mw_auth::CurrentMember},
};
use askama::Template;
use axum::{
    extract::{Extension, Multipart, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

// GET /cartao
pub async fn member_card_handler(
    State(state): State<AppState>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    Query(params): Query<FeedbackParams>,
) -> AppResult<Response> {
    if member.is_admin() {
        return Ok(Redirect::to("/admin").into_response());
    }
    tracing::debug!("GET /cartao: Carteirinha de {}", member.id);

    let template = MemberCardPage {
        card: MemberCardView::from(&member),
        photo_session_only: state.directory.photo_scope() == PhotoScope::SessionOnly,
        success_message: params.success,
        error_message: params.error,
    };
    match template.render() {
        Ok(html) => Ok(Html(html).into_response()),
        Err(e) => {
            tracing::error!("Falha ao renderizar template MemberCardPage: {}", e);
            Err(AppError::InternalServerError)
        }
    }
}

// POST /cartao/foto
pub async fn handle_photo_upload(
    State(state): State<AppState>,
    session: Session,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    multipart: Multipart,
) -> AppResult<Redirect> {
    tracing::info!("POST /cartao/foto: Nova foto para {}", member.id);

    let result = async {
        let (content_type, bytes) = read_photo_field(multipart).await?;
        let photo = directory_service::encode_photo(content_type.as_deref(), &bytes, state.max_upload_bytes)?;
        let updated = directory_service::attach_photo(state.directory.as_ref(), &member, photo).await?;
        SessionManager::new(session).update_identity(&updated).await
    }
    .await;

    let redirect_url = match result {
        Ok(()) => format!("/cartao?success={}", urlencoding::encode("Foto atualizada.")),
        Err(e) => {
            tracing::error!("Erro ao atualizar foto de {}: {:?}", member.id, e);
            format!("/cartao?error={}", urlencoding::encode(&e.user_message()))
        }
    };
    Ok(Redirect::to(&redirect_url))
}

async fn read_photo_field(mut multipart: Multipart) -> AppResult<(Option<String>, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Pedido multipart inválido: {}", e)))?
    {
        if field.name() == Some("foto") {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Erro ao ler imagem: {}", e)))?;
            return Ok((content_type, bytes.to_vec()));
        }
    }
    Err(AppError::BadRequest("Nenhuma imagem enviada (campo 'foto').".into()))
}
