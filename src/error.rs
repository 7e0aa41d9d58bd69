// src/error.rs
use axum::{http::StatusCode, response::Html, response::IntoResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Erro na base de dados: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Erro de migração da base de dados: {0}")]
    SqlxMigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Configuração inválida: {0}")]
    Config(String),

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Erro na sessão: {0}")]
    SessionError(String),

    // Ficheiro enviado não é uma planilha legível
    #[error("Planilha inválida: {0}")]
    Spreadsheet(String),

    // Gravação/leitura rejeitada pela base remota (ou rede indisponível)
    #[error("Falha na base remota: {0}")]
    RemoteStore(String),

    #[error("Snapshot corrompido: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Confirmação necessária para esta operação")]
    ConfirmationRequired,

    #[error("Pedido inválido: {0}")]
    BadRequest(String),

    #[error("Erro interno inesperado")]
    InternalServerError,

    #[error("Não autorizado")]
    Unauthorized,
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::RemoteStore(e.to_string())
    }
}

impl From<calamine::Error> for AppError {
    fn from(e: calamine::Error) -> Self {
        AppError::Spreadsheet(e.to_string())
    }
}

impl AppError {
    /// Mensagem curta para mostrar ao operador/beneficiário.
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidCredentials => "Credenciais incorretas. Verifique seu CPF.".to_string(),
            AppError::Spreadsheet(detail) => format!("Não foi possível ler a planilha: {}", detail),
            AppError::RemoteStore(_) => {
                "A gravação na base remota não foi concluída. Os dados exibidos podem estar desatualizados; tente novamente."
                    .to_string()
            }
            AppError::ConfirmationRequired => {
                "Operação não confirmada. Digite LIMPAR para apagar a base.".to_string()
            }
            AppError::BadRequest(detail) => detail.clone(),
            AppError::Unauthorized => "Acesso restrito à administração.".to_string(),
            _ => "Ocorreu um erro inesperado.".to_string(),
        }
    }
}

// Como converter AppError numa resposta HTTP
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("Erro processado: {:?}", self);

        let status = match &self {
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Spreadsheet(_) | AppError::ConfirmationRequired | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RemoteStore(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let user_message = self.user_message();

        (status, Html(format!(r#"
            <!DOCTYPE html><html><head><title>Erro</title><style>body{{font-family:sans-serif;}}</style></head>
            <body><h1>Erro {status_code}</h1><p>{message}</p><a href="javascript:history.back()">Voltar</a></body></html>
         "#, status_code=status.as_u16(), message=user_message))).into_response()
    }
}

// Tipo Result padrão para a aplicação
pub type AppResult<T = ()> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failures_tell_the_operator_the_write_did_not_happen() {
        let msg = AppError::RemoteStore("timeout".into()).user_message();
        assert!(msg.contains("não foi concluída"));
        let resp = AppError::RemoteStore("timeout".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn credential_mismatch_is_unauthorized() {
        let resp = AppError::InvalidCredentials.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
