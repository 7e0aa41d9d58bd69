// src/main.rs

// --- Declaração dos Módulos ---
mod config;
mod db;
mod error;
mod models;
mod services;
mod state;
mod store;
mod templates;
mod web;

// --- Imports ---
use crate::{
    config::{Config, DirectoryBackend},
    state::{AppState, LiveDirectoryState},
    store::{firebase::FirebaseRest, local::SqliteSnapshotStore, remote::RemoteDirectoryStore, DirectoryStore},
};
use axum::serve;
use std::{env, sync::Arc};
use time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuração do Logging (Tracing) ---
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            env::var("RUST_LOG")
                .unwrap_or_else(|_| "bssm_portal=debug,tower_http=info,sqlx=warn,tower_sessions=info".into())
                .into()
        }))
        .with(fmt::layer())
        .init();

    tracing::info!("🚀 Iniciando BSSM Portal...");

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("Configuração inválida: {}", e))?;

    // --- Configuração da Base de Dados ---
    let db_pool = match db::create_db_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("❌ Falha crítica ao inicializar a base de dados: {}", e);
            return Err(anyhow::anyhow!("Falha ao conectar/migrar DB: {}", e));
        }
    };

    // --- Diretório de beneficiários ---
    let directory: Arc<dyn DirectoryStore> = match &config.backend {
        DirectoryBackend::Local => Arc::new(
            SqliteSnapshotStore::load(db_pool.clone())
                .await
                .map_err(|e| anyhow::anyhow!("Falha ao carregar diretório local: {}", e))?,
        ),
        DirectoryBackend::Remote { base_url, auth, path } => {
            let transport = FirebaseRest::new(base_url.clone(), auth.clone())
                .map_err(|e| anyhow::anyhow!("Falha ao criar cliente remoto: {}", e))?;
            Arc::new(RemoteDirectoryStore::connect(Arc::new(transport), path.clone()))
        }
    };
    tracing::info!(
        "📇 Diretório '{}' pronto ({} registos).",
        directory.backend_name(),
        directory.get_all().len()
    );

    // --- Difusão ao vivo para os painéis ---
    let live_state = LiveDirectoryState::default();
    live_state.forward_updates(directory.watch());

    // --- Configuração das Sessões ---
    let session_store = SqliteStore::new(db_pool.clone())
        .with_table_name("sessions")
        .map_err(|e| anyhow::anyhow!("Falha ao criar session store: {}", e))?;
    session_store
        .migrate()
        .await
        .map_err(|e| anyhow::anyhow!("Falha ao migrar tabela de sessões: {}", e))?;

    let session_store_clone = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = session_store_clone
            .continuously_delete_expired(tokio::time::Duration::from_secs(60 * 60))
            .await
        {
            tracing::error!("Erro na task de limpeza de sessões: {:?}", e);
        }
    });
    tracing::info!("🧹 Tarefa de limpeza de sessões iniciada.");

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::hours(config.session_inactivity_hours)));

    tracing::info!("🔑 Camada de sessão configurada.");

    // --- Criação do Estado da Aplicação ---
    let app_state = AppState {
        directory,
        live_state,
        max_upload_bytes: config.max_upload_bytes,
    };

    // --- Configuração do Endereço e Listener ---
    tracing::info!("📡 Servidor escutando em http://{}", config.bind_addr);
    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("❌ Falha ao iniciar listener em {}: {}", config.bind_addr, e);
            return Err(e.into());
        }
    };

    // --- Criação do Router e Aplicação das Camadas (Middlewares) ---
    let app = web::routes::create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(session_layer),
    );
    tracing::info!("✅ Router e middlewares configurados.");

    // --- Início do Servidor ---
    tracing::info!("👂 Servidor pronto para aceitar conexões...");
    if let Err(e) = serve(listener, app.into_make_service()).await {
        tracing::error!("❌ Erro fatal no servidor: {}", e);
        return Err(e.into());
    }

    Ok(())
}
