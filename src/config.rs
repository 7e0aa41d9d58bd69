// src/config.rs
use crate::error::{AppError, AppResult};
use std::{env, net::SocketAddr};

/// Qual implementação de DirectoryStore usar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryBackend {
    /// Snapshot persistido na base SQLite local.
    Local,
    /// Base de tempo real remota (API REST + event-stream).
    Remote {
        base_url: String,
        auth: Option<String>,
        path: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub backend: DirectoryBackend,
    pub max_upload_bytes: usize,
    pub session_inactivity_hours: i64,
}

impl Config {
    /// Lê a configuração das variáveis de ambiente (já com o .env carregado).
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR inválido: {}", e)))?;

        let database_url = get("DATABASE_URL").unwrap_or_else(|| "sqlite://bssm.db".to_string());

        let backend = match get("DIRECTORY_BACKEND").as_deref().unwrap_or("local") {
            b if b.eq_ignore_ascii_case("local") => DirectoryBackend::Local,
            b if b.eq_ignore_ascii_case("remote") => {
                let base_url = get("REALTIME_DB_URL").ok_or_else(|| {
                    AppError::Config("REALTIME_DB_URL é obrigatório com DIRECTORY_BACKEND=remote".into())
                })?;
                DirectoryBackend::Remote {
                    base_url: base_url.trim_end_matches('/').to_string(),
                    auth: get("REALTIME_DB_AUTH"),
                    path: get("REALTIME_DB_PATH")
                        .unwrap_or_else(|| "membros".to_string())
                        .trim_matches('/')
                        .to_string(),
                }
            }
            other => {
                return Err(AppError::Config(format!(
                    "DIRECTORY_BACKEND desconhecido: '{}' (use local ou remote)",
                    other
                )))
            }
        };

        let max_upload_mb = parse_number(get("MAX_UPLOAD_MB"), "MAX_UPLOAD_MB", 10, MAX_UPLOAD_MB_LIMIT)?;
        let session_inactivity_hours = parse_number(
            get("SESSION_INACTIVITY_HOURS"),
            "SESSION_INACTIVITY_HOURS",
            24,
            MAX_SESSION_HOURS,
        )?;

        Ok(Config {
            bind_addr,
            database_url,
            backend,
            max_upload_bytes: max_upload_mb as usize * 1024 * 1024,
            session_inactivity_hours,
        })
    }
}

// Tetos: 1 GiB de upload e um ano de inatividade
const MAX_UPLOAD_MB_LIMIT: i64 = 1024;
const MAX_SESSION_HOURS: i64 = 24 * 365;

fn parse_number(value: Option<String>, key: &str, default: i64, max: i64) -> AppResult<i64> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse::<i64>()
            .ok()
            .filter(|n| (1..=max).contains(n))
            .ok_or_else(|| {
                AppError::Config(format!("{} deve ser um inteiro entre 1 e {} (recebido '{}')", key, max, v))
            }),
    }
}
