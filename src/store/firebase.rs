// src/store/firebase.rs
//! Cliente REST para uma Realtime Database (escrita com PUT, leitura por event-stream).
use crate::{
    error::{AppError, AppResult},
    store::remote::{RealtimeTransport, RemoteEvent},
};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

const WRITE_TIMEOUT: Duration = Duration::from_secs(15);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
// O servidor manda keep-alive a cada ~30s; silêncio maior é ligação morta
const IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Clone)]
pub struct FirebaseRest {
    client: Client,
    base_url: String,
    auth: Option<String>,
}

impl FirebaseRest {
    pub fn new(base_url: impl Into<String>, auth: Option<String>) -> AppResult<Self> {
        // Sem timeout global: a subscrição é um pedido que nunca termina
        let client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(FirebaseRest {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    fn node_url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn auth_query(&self) -> Vec<(&'static str, String)> {
        self.auth.iter().map(|token| ("auth", token.clone())).collect()
    }
}

#[async_trait]
impl RealtimeTransport for FirebaseRest {
    async fn write(&self, path: &str, value: &Value) -> AppResult<()> {
        let response = self
            .client
            .put(self.node_url(path))
            .query(&self.auth_query())
            .timeout(WRITE_TIMEOUT)
            .json(value)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::RemoteStore(format!("HTTP {}: {}", status, body.trim())));
        }
        Ok(())
    }

    async fn listen(&self, path: &str) -> AppResult<mpsc::Receiver<RemoteEvent>> {
        let response = self
            .client
            .get(self.node_url(path))
            .query(&self.auth_query())
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;

        let (tx, rx) = mpsc::channel(32);
        let body = Box::pin(response.bytes_stream());
        tokio::spawn(pump_events(body, tx, IDLE_TIMEOUT));
        Ok(rx)
    }
}

/// Lê o corpo, decodifica os frames e envia os eventos até a ligação cair,
/// o servidor ficar calado mais de `idle` ou ninguém estar a ouvir.
async fn pump_events<S, B, E>(mut body: S, tx: mpsc::Sender<RemoteEvent>, idle: Duration)
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut decoder = SseDecoder::default();
    loop {
        let chunk = match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(Ok(c))) => c,
            Ok(Some(Err(e))) => {
                tracing::warn!("Erro ao ler event-stream remoto: {}", e);
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::warn!("Event-stream remoto sem dados há {:?}, a fechar.", idle);
                break;
            }
        };
        for frame in decoder.push(chunk.as_ref()) {
            if let Some(event) = frame.into_event() {
                if tx.send(event).await.is_err() {
                    return; // ninguém está a ouvir
                }
            }
        }
    }
}

/// Um evento `text/event-stream` já montado.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

impl SseFrame {
    /// Traduz para um evento da base; `keep-alive` e desconhecidos dão `None`.
    pub fn into_event(self) -> Option<RemoteEvent> {
        match self.event.as_str() {
            "put" | "patch" => match serde_json::from_str::<PathData>(&self.data) {
                Ok(PathData { path, data }) if self.event == "put" => Some(RemoteEvent::Put { path, data }),
                Ok(PathData { path, data }) => Some(RemoteEvent::Patch { path, data }),
                Err(e) => {
                    tracing::warn!("Evento '{}' com dados inválidos: {}", self.event, e);
                    None
                }
            },
            "cancel" | "auth_revoked" => Some(RemoteEvent::Cancelled(self.event.clone())),
            "keep-alive" => None,
            other => {
                tracing::trace!("Evento remoto ignorado: {}", other);
                None
            }
        }
    }
}

/// Junta pedaços de bytes em frames SSE (separados por linha em branco).
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    current: SseFrame,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(&['\n', '\r'][..]);

            if line.is_empty() {
                if !self.current.event.is_empty() || !self.current.data.is_empty() {
                    frames.push(std::mem::take(&mut self.current));
                }
                continue;
            }
            if line.starts_with(':') {
                continue; // comentário
            }
            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };
            match field {
                "event" => self.current.event = value.to_string(),
                "data" => {
                    if !self.current.data.is_empty() {
                        self.current.data.push('\n');
                    }
                    self.current.data.push_str(value);
                }
                _ => {}
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_frames_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: put\ndata: {\"path\":\"/\",").is_empty());
        let frames = decoder.push(b"\"data\":{\"1\":{\"id\":\"1\"}}}\n\nevent: keep-alive\r\ndata: null\r\n\r\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, "put");
        assert_eq!(frames[1].event, "keep-alive");

        let events: Vec<RemoteEvent> = frames.into_iter().filter_map(SseFrame::into_event).collect();
        assert_eq!(
            events,
            vec![RemoteEvent::Put {
                path: "/".into(),
                data: json!({"1": {"id": "1"}}),
            }]
        );
    }

    #[test]
    fn patch_cancel_and_garbage() {
        let patch = SseFrame {
            event: "patch".into(),
            data: r#"{"path":"/1","data":{"name":"Ana"}}"#.into(),
        };
        assert_eq!(
            patch.into_event(),
            Some(RemoteEvent::Patch {
                path: "/1".into(),
                data: json!({"name": "Ana"}),
            })
        );

        let cancel = SseFrame {
            event: "auth_revoked".into(),
            data: "credential is no longer valid".into(),
        };
        assert_eq!(cancel.into_event(), Some(RemoteEvent::Cancelled("auth_revoked".into())));

        let broken = SseFrame {
            event: "put".into(),
            data: "{nao-json".into(),
        };
        assert_eq!(broken.into_event(), None);
    }

    #[test]
    fn builds_node_urls_with_optional_auth() {
        let fb = FirebaseRest::new("https://bssm.example.com/", Some("segredo".into())).unwrap();
        assert_eq!(fb.node_url("/membros/"), "https://bssm.example.com/membros.json");
        assert_eq!(fb.auth_query(), vec![("auth", "segredo".to_string())]);
    }

    type Chunk = Result<Vec<u8>, std::io::Error>;

    #[tokio::test]
    async fn silent_stream_is_closed_after_idle_timeout() {
        let put = b"event: put\ndata: {\"path\":\"/\",\"data\":null}\n\n".to_vec();
        // um evento e depois silêncio sem fim
        let body = futures_util::stream::iter(vec![Chunk::Ok(put)]).chain(futures_util::stream::pending::<Chunk>());
        let (tx, mut rx) = mpsc::channel(4);
        let pump = tokio::spawn(pump_events(Box::pin(body), tx, Duration::from_millis(50)));

        assert!(matches!(rx.recv().await, Some(RemoteEvent::Put { .. })));
        let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(closed, Ok(None)), "o canal devia fechar depois do timeout");
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn read_error_ends_the_stream() {
        let body = futures_util::stream::iter(vec![Chunk::Err(std::io::Error::other("ligação caiu"))]);
        let (tx, mut rx) = mpsc::channel(4);
        pump_events(body, tx, Duration::from_secs(60)).await;
        assert!(rx.recv().await.is_none());
    }
}
