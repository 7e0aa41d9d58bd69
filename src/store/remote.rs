// src/store/remote.rs
use crate::{
    error::{AppError, AppResult},
    models::member::{Directory, MemberRecord},
    store::{DirectoryStore, MemberUpdate, PhotoScope},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Evento recebido de uma subscrição na base remota.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// Substitui o valor em `path` (relativo ao nó subscrito).
    Put { path: String, data: Value },
    /// Atualiza apenas as chaves filhas indicadas em `path`.
    Patch { path: String, data: Value },
    /// O servidor fechou a subscrição (ex.: permissão revogada).
    Cancelled(String),
}

/// Operações mínimas de uma base de tempo real: escrever um nó e ouvi-lo.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn write(&self, path: &str, value: &Value) -> AppResult<()>;

    /// Abre uma subscrição; o canal fecha quando a ligação cai.
    async fn listen(&self, path: &str) -> AppResult<mpsc::Receiver<RemoteEvent>>;
}

/// Diretório guardado num único nó remoto, como objeto indexado pela matrícula.
pub struct RemoteDirectoryStore {
    transport: Arc<dyn RealtimeTransport>,
    path: String,
    tx: watch::Sender<Directory>,
    listener: JoinHandle<()>,
    write_lock: Mutex<()>,
}

impl RemoteDirectoryStore {
    /// Começa já a ouvir o nó remoto em segundo plano (com reconexão).
    pub fn connect(transport: Arc<dyn RealtimeTransport>, path: impl Into<String>) -> Self {
        let path = path.into();
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        let listener = tokio::spawn(listen_loop(transport.clone(), path.clone(), tx.clone()));
        RemoteDirectoryStore {
            transport,
            path,
            tx,
            listener,
            write_lock: Mutex::new(()),
        }
    }

    // Só com o `write_lock` na mão
    async fn write_directory(&self, records: Vec<MemberRecord>) -> AppResult<()> {
        let value = encode_directory(&records)?;
        self.transport.write(&self.path, &value).await.map_err(|e| {
            tracing::error!("❌ Gravação remota em '{}' rejeitada: {:?}", self.path, e);
            e
        })?;
        tracing::info!("☁️ Diretório remoto substituído ({} registos).", records.len());

        // O eco da subscrição chega depois; publica já o que foi aceite
        let published = records
            .into_iter()
            .map(|mut r| {
                r.photo = None;
                r
            })
            .collect();
        self.tx.send_replace(Arc::new(published));
        Ok(())
    }
}

impl Drop for RemoteDirectoryStore {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[async_trait]
impl DirectoryStore for RemoteDirectoryStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    fn photo_scope(&self) -> PhotoScope {
        PhotoScope::SessionOnly
    }

    fn get_all(&self) -> Directory {
        self.tx.borrow().clone()
    }

    async fn replace(&self, records: Vec<MemberRecord>) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_directory(records).await
    }

    async fn update_member(&self, id: &str, apply: MemberUpdate) -> AppResult<Option<MemberRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.get_all().as_ref().clone();
        let Some(record) = records.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        apply(record);
        let updated = record.clone();
        self.write_directory(records).await?;
        Ok(Some(updated))
    }

    fn watch(&self) -> watch::Receiver<Directory> {
        self.tx.subscribe()
    }
}

async fn listen_loop(transport: Arc<dyn RealtimeTransport>, path: String, tx: watch::Sender<Directory>) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match transport.listen(&path).await {
            Ok(mut events) => {
                tracing::info!("📡 Subscrição remota ativa em '{}'.", path);
                // Cada ligação nova começa com um `put` completo na raiz
                let mut mirror = Value::Null;
                while let Some(event) = events.recv().await {
                    match event {
                        RemoteEvent::Put { path: at, data } => apply_put(&mut mirror, &at, data),
                        RemoteEvent::Patch { path: at, data } => apply_patch(&mut mirror, &at, data),
                        RemoteEvent::Cancelled(reason) => {
                            tracing::warn!("Subscrição remota cancelada pelo servidor: {}", reason);
                            break;
                        }
                    }
                    backoff = INITIAL_BACKOFF;
                    let directory = decode_directory(&mirror);
                    tracing::debug!("Diretório remoto atualizado ({} registos).", directory.len());
                    tx.send_replace(Arc::new(directory));
                }
                tracing::warn!("Ligação à base remota terminou, a tentar de novo em {:?}.", backoff);
            }
            Err(e) => {
                tracing::warn!("Falha ao subscrever '{}': {:?}. Nova tentativa em {:?}.", path, e, backoff);
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

// --- Espelho local do nó remoto ---

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Aplica um `put`: `data` substitui o valor em `path`; `null` apaga.
pub fn apply_put(root: &mut Value, path: &str, data: Value) {
    set_at(root, &segments(path), data);
}

/// Aplica um `patch`: cada chave de `data` é um `put` relativo a `path`.
pub fn apply_patch(root: &mut Value, path: &str, data: Value) {
    match data {
        Value::Object(children) => {
            let base = path.trim_end_matches('/');
            for (key, value) in children {
                apply_put(root, &format!("{}/{}", base, key), value);
            }
        }
        other => apply_put(root, path, other),
    }
}

fn set_at(node: &mut Value, path: &[&str], data: Value) {
    let Some((head, rest)) = path.split_first() else {
        *node = data;
        return;
    };

    // Arrays (chaves numéricas sequenciais) passam a objeto antes de descer
    if let Value::Array(items) = node {
        let converted: Map<String, Value> = std::mem::take(items)
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        *node = Value::Object(converted);
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() && data.is_null() {
        map.remove(*head);
        return;
    }
    let child = map.entry(head.to_string()).or_insert(Value::Null);
    set_at(child, rest, data);
}

/// Converte o valor remoto em registos. Entradas inválidas são ignoradas.
pub fn decode_directory(value: &Value) -> Vec<MemberRecord> {
    let entries: Vec<&Value> = match value {
        Value::Null => return Vec::new(),
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        other => {
            tracing::warn!("⚠️ Valor remoto inesperado ({}), usando diretório vazio.", type_name(other));
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<MemberRecord>(entry.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Registo remoto ignorado (formato inválido): {}", e);
                None
            }
        })
        .collect()
}

// Caracteres que a base remota não aceita em chaves
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Objeto `{ matrícula: registo }`, sem fotos.
pub fn encode_directory(records: &[MemberRecord]) -> AppResult<Value> {
    let mut map = Map::new();
    for record in records {
        if record.id.is_empty() {
            return Err(AppError::BadRequest("registo sem matrícula".into()));
        }
        if record.id.contains(FORBIDDEN_KEY_CHARS) {
            return Err(AppError::BadRequest(format!(
                "matrícula '{}' contém caracteres inválidos (. $ # [ ] /)",
                record.id
            )));
        }
        let mut value = serde_json::to_value(record)?;
        if let Value::Object(fields) = &mut value {
            fields.remove("photo");
        }
        // Matrícula repetida: a última linha ganha
        map.insert(record.id.clone(), value);
    }
    Ok(Value::Object(map))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "número",
        Value::String(_) => "texto",
        Value::Array(_) => "lista",
        Value::Object(_) => "objeto",
    }
}
