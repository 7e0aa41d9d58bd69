// src/store/mod.rs
//! Armazenamento do diretório de beneficiários.
//!
//! Duas implementações do mesmo contrato: snapshot local em SQLite
//! ([`local::SqliteSnapshotStore`]) e base de tempo real remota
//! ([`remote::RemoteDirectoryStore`]). A escolha é feita pela configuração.
pub mod firebase;
pub mod local;
pub mod remote;

use crate::{
    error::AppResult,
    models::member::{Directory, MemberRecord},
};
use async_trait::async_trait;
use tokio::{sync::watch, task::JoinHandle};

/// Onde fica a foto da carteirinha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoScope {
    /// A foto é gravada no próprio diretório.
    Directory,
    /// A foto fica apenas na sessão do navegador.
    SessionOnly,
}

pub type DirectoryCallback = Box<dyn Fn(Directory) + Send + Sync + 'static>;

/// Alteração aplicada a um único registo dentro de [`DirectoryStore::update_member`].
pub type MemberUpdate = Box<dyn FnOnce(&mut MemberRecord) + Send + 'static>;

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Nome curto do backend, para logs.
    fn backend_name(&self) -> &'static str;

    fn photo_scope(&self) -> PhotoScope;

    /// Último snapshot conhecido, sem esperar por I/O.
    fn get_all(&self) -> Directory;

    /// Substitui o diretório inteiro numa única gravação (nunca faz merge).
    async fn replace(&self, records: Vec<MemberRecord>) -> AppResult<()>;

    /// Altera o registo `id` sem largar o lock de escrita entre a leitura e a
    /// gravação, para não desfazer um `replace` concorrente.
    /// Devolve o registo alterado, ou `None` se a matrícula não existir.
    async fn update_member(&self, id: &str, apply: MemberUpdate) -> AppResult<Option<MemberRecord>>;

    /// Apaga o diretório. Quem chama tem de ter obtido confirmação explícita.
    async fn clear(&self) -> AppResult<()> {
        self.replace(Vec::new()).await
    }

    /// Canal com o snapshot atual e as mudanças seguintes.
    fn watch(&self) -> watch::Receiver<Directory>;

    /// Chama `callback` já com o diretório atual e depois a cada mudança,
    /// até a [`Subscription`] ser cancelada ou largada.
    fn subscribe(&self, callback: DirectoryCallback) -> Subscription {
        let mut rx = self.watch();
        let handle = tokio::spawn(async move {
            let current = rx.borrow_and_update().clone();
            callback(current);
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                callback(snapshot);
            }
        });
        Subscription { handle }
    }
}

/// Subscrição ativa; cancelada em `unsubscribe()` ou no drop.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // o Drop faz o abort
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::member;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Store mínimo só em memória para testar o contrato por omissão.
    struct MemoryStore {
        tx: watch::Sender<Directory>,
    }

    #[async_trait]
    impl DirectoryStore for MemoryStore {
        fn backend_name(&self) -> &'static str {
            "memoria"
        }
        fn photo_scope(&self) -> PhotoScope {
            PhotoScope::Directory
        }
        fn get_all(&self) -> Directory {
            self.tx.borrow().clone()
        }
        async fn replace(&self, records: Vec<MemberRecord>) -> AppResult<()> {
            self.tx.send_replace(Arc::new(records));
            Ok(())
        }
        async fn update_member(&self, id: &str, apply: MemberUpdate) -> AppResult<Option<MemberRecord>> {
            let mut found = None;
            self.tx.send_modify(|dir| {
                let mut records = dir.as_ref().clone();
                if let Some(record) = records.iter_mut().find(|m| m.id == id) {
                    apply(record);
                    found = Some(record.clone());
                    *dir = Arc::new(records);
                }
            });
            Ok(found)
        }
        fn watch(&self) -> watch::Receiver<Directory> {
            self.tx.subscribe()
        }
    }

    async fn wait_for(seen: &Arc<Mutex<Vec<usize>>>, len: usize) {
        for _ in 0..100 {
            if seen.lock().unwrap().len() >= len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("callback não foi chamado {} vezes", len);
    }

    #[tokio::test]
    async fn subscribe_fires_immediately_then_on_every_change() {
        let store = MemoryStore {
            tx: watch::channel(Arc::new(vec![member("1", "Ana")])).0,
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = store.subscribe(Box::new(move |dir| sink.lock().unwrap().push(dir.len())));

        wait_for(&seen, 1).await;
        store
            .replace(vec![member("1", "Ana"), member("2", "Bia")])
            .await
            .unwrap();
        wait_for(&seen, 2).await;
        store.clear().await.unwrap();
        wait_for(&seen, 3).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 0]);

        sub.unsubscribe();
        store.replace(vec![member("9", "Zé")]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().unwrap().len(), 3);
    }
}
