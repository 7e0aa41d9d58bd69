// src/web/admin_handlers.rs
use crate::{
    error::{AppError, AppResult},
    models::member::MemberFilter,
    services::directory_service,
    state::AppState,
    templates::{AdminDashboardPage, MemberRow, STATUS_OPTIONS},
};
use askama::Template;
use axum::{
    extract::{Form, Multipart, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct ClearForm {
    #[serde(default)]
    confirmacao: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct FeedbackParams {
    pub success: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DashboardParams {
    #[serde(flatten)]
    filter: MemberFilter,
    success: Option<String>,
    error: Option<String>,
}

fn redirect_with(kind: &str, message: &str) -> Redirect {
    let redirect_url = format!("/admin?{}={}", kind, urlencoding::encode(message));
    Redirect::to(&redirect_url)
}

// --- Handlers ---

/// GET /admin - painel com filtros
pub async fn show_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> AppResult<Response> {
    tracing::debug!("GET /admin: filtros {:?}", params.filter);

    let directory = state.directory.get_all();
    let rows: Vec<MemberRow> = directory_service::filter_members(&directory, &params.filter)
        .into_iter()
        .map(MemberRow::from)
        .collect();

    let template = AdminDashboardPage {
        rows,
        stats: directory_service::directory_stats(&directory),
        filter: params.filter,
        status_options: STATUS_OPTIONS,
        backend: state.directory.backend_name(),
        clear_confirmation: directory_service::CLEAR_CONFIRMATION,
        success_message: params.success,
        error_message: params.error,
    };

    match template.render() {
        Ok(html) => Ok(Html(html).into_response()),
        Err(e) => {
            tracing::error!("Falha ao renderizar template AdminDashboardPage: {}", e);
            Err(AppError::InternalServerError)
        }
    }
}

/// POST /admin/importar - substitui o diretório pela planilha enviada
pub async fn handle_import(State(state): State<AppState>, mut multipart: Multipart) -> AppResult<Redirect> {
    tracing::info!("POST /admin/importar: Recebendo planilha...");

    let mut planilha: Option<Vec<u8>> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Upload inválido: {}", e);
                return Ok(redirect_with("error", "Envio inválido ou ficheiro demasiado grande."));
            }
        };
        if field.name() == Some("planilha") {
            match field.bytes().await {
                Ok(bytes) => planilha = Some(bytes.to_vec()),
                Err(e) => {
                    tracing::warn!("Erro ao ler planilha enviada: {}", e);
                    return Ok(redirect_with("error", "Não foi possível receber o ficheiro."));
                }
            }
            break;
        }
    }

    let Some(bytes) = planilha else {
        return Ok(redirect_with("error", "Selecione uma planilha (.xlsx ou .xls)."));
    };

    match directory_service::import_spreadsheet(state.directory.as_ref(), bytes).await {
        Ok(total) => Ok(redirect_with("success", &format!("Base atualizada: {} beneficiários importados.", total))),
        Err(e) => {
            tracing::error!("Erro ao importar planilha: {:?}", e);
            Ok(redirect_with("error", &e.user_message()))
        }
    }
}

/// POST /admin/limpar - apaga o diretório (exige confirmação)
pub async fn handle_clear(State(state): State<AppState>, Form(form): Form<ClearForm>) -> AppResult<Redirect> {
    tracing::info!("POST /admin/limpar: Pedido de limpeza da base.");

    match directory_service::clear_directory(state.directory.as_ref(), &form.confirmacao).await {
        Ok(()) => Ok(redirect_with("success", "Base de beneficiários apagada.")),
        Err(e) => {
            tracing::error!("Erro ao limpar a base: {:?}", e);
            Ok(redirect_with("error", &e.user_message()))
        }
    }
}
