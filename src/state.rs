// src/state.rs
use crate::{
    models::member::{Directory, DirectoryStats},
    services::directory_service,
    store::DirectoryStore,
};
use axum::extract::ws::Message;
use chrono::Local;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use uuid::Uuid;

// Tipo para o 'sender' de uma conexão WebSocket individual
type WsTx = mpsc::Sender<Message>;

/// Atualização enviada aos painéis abertos sempre que o diretório muda.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryUpdate {
    pub total: usize,
    pub elegiveis: usize,
    pub atualizado_em: String,
}

impl DirectoryUpdate {
    pub fn from_directory(directory: &Directory) -> Self {
        let DirectoryStats { total, elegiveis } = directory_service::directory_stats(directory);
        DirectoryUpdate {
            total,
            elegiveis,
            atualizado_em: Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
        }
    }
}

// Conexões WebSocket dos painéis de administração
#[derive(Debug, Clone, Default)]
pub struct LiveDirectoryState {
    pub connections: Arc<Mutex<HashMap<Uuid, WsTx>>>,
}

impl LiveDirectoryState {
    /// Envia uma mensagem para TODAS as conexões ativas.
    pub async fn broadcast(&self, message_text: String) {
        let connections = self.connections.lock().await;
        let message = Message::Text(message_text.into());
        for tx in connections.values() {
            // Cliente desconectado: a própria task de envio limpa a conexão
            let _ = tx.try_send(message.clone());
        }
    }

    /// Uma única task difunde cada snapshot novo, pela ordem em que chegam.
    pub fn forward_updates(&self, mut rx: watch::Receiver<Directory>) -> JoinHandle<()> {
        let live = self.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                let update = DirectoryUpdate::from_directory(&snapshot);
                match serde_json::to_string(&update) {
                    Ok(text) => live.broadcast(text).await,
                    Err(e) => tracing::error!("Falha ao serializar atualização do diretório: {}", e),
                }
            }
            tracing::debug!("Canal do diretório fechado, difusão ao vivo terminada.");
        })
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn DirectoryStore>,
    pub live_state: LiveDirectoryState,
    pub max_upload_bytes: usize,
}
