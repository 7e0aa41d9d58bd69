// src/web/live_handlers.rs
use crate::{
    state::{AppState, DirectoryUpdate},
    web::mw_auth::CurrentMember,
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

/// GET /admin/ao-vivo - upgrade para WebSocket.
pub async fn live_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
) -> impl IntoResponse {
    tracing::info!("Upgrade WebSocket do painel por {}", member.id);
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    tracing::info!("🔌 Nova conexão WS do painel: {}", conn_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(32);

    // Estado atual primeiro, depois as difusões
    let initial = DirectoryUpdate::from_directory(&state.directory.get_all());
    if let Ok(text) = serde_json::to_string(&initial) {
        let _ = tx.send(Message::Text(text.into())).await;
    }
    state.live_state.connections.lock().await.insert(conn_id, tx);

    // --- Task 1: canal -> cliente ---
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!("Falha ao enviar msg WS para {}, terminando send_task.", conn_id);
                break;
            }
        }
    });

    // --- Task 2: cliente -> servidor (só interessa o Close) ---
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg {
                tracing::info!("Cliente {} enviou Close frame.", conn_id);
                break;
            }
            tracing::trace!("Ignorando msg WS do painel {}", conn_id);
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.live_state.connections.lock().await.remove(&conn_id);
    tracing::info!("🔌 Conexão WS do painel {} fechada.", conn_id);
}
