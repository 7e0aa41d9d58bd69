// src/store/local.rs
use crate::{
    error::AppResult,
    models::member::{Directory, MemberRecord},
    store::{DirectoryStore, MemberUpdate, PhotoScope},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Chave do snapshot do diretório na tabela `snapshots`.
pub const DIRECTORY_KEY: &str = "bssm_directory";

/// Diretório persistido como um único snapshot JSON na base SQLite local.
pub struct SqliteSnapshotStore {
    db_pool: SqlitePool,
    tx: watch::Sender<Directory>,
    // Serializa as gravações: replace e update_member nunca se intercalam
    write_lock: Mutex<()>,
}

impl SqliteSnapshotStore {
    /// Carrega o último snapshot. Dados corrompidos contam como diretório vazio.
    pub async fn load(db_pool: SqlitePool) -> AppResult<Self> {
        let stored: Option<String> = sqlx::query_scalar("SELECT value FROM snapshots WHERE key = ?1")
            .bind(DIRECTORY_KEY)
            .fetch_optional(&db_pool)
            .await?;

        let records = match stored {
            None => {
                tracing::info!("Nenhum snapshot local encontrado, diretório vazio.");
                Vec::new()
            }
            Some(raw) => match serde_json::from_str::<Vec<MemberRecord>>(&raw) {
                Ok(records) => {
                    tracing::info!("📂 Snapshot local carregado ({} registos).", records.len());
                    records
                }
                Err(e) => {
                    tracing::warn!("⚠️ Snapshot local corrompido, usando diretório vazio: {}", e);
                    Vec::new()
                }
            },
        };

        let (tx, _rx) = watch::channel(Arc::new(records));
        Ok(SqliteSnapshotStore {
            db_pool,
            tx,
            write_lock: Mutex::new(()),
        })
    }

    /// Grava e publica o snapshot. Quem chama já tem o `write_lock`.
    async fn write_snapshot(&self, records: Vec<MemberRecord>) -> AppResult<()> {
        let json = serde_json::to_string(&records)?;
        let now = Utc::now().to_rfc3339();

        // Uma única escrita substitui o snapshot inteiro
        sqlx::query(
            r#"
            INSERT INTO snapshots (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at
            "#,
        )
        .bind(DIRECTORY_KEY)
        .bind(&json)
        .bind(&now)
        .execute(&self.db_pool)
        .await?;

        tracing::debug!("Snapshot local gravado ({} registos).", records.len());
        self.tx.send_replace(Arc::new(records));
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for SqliteSnapshotStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    fn photo_scope(&self) -> PhotoScope {
        PhotoScope::Directory
    }

    fn get_all(&self) -> Directory {
        self.tx.borrow().clone()
    }

    async fn replace(&self, records: Vec<MemberRecord>) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_snapshot(records).await
    }

    async fn update_member(&self, id: &str, apply: MemberUpdate) -> AppResult<Option<MemberRecord>> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.get_all().as_ref().clone();
        let Some(record) = records.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        apply(record);
        let updated = record.clone();
        self.write_snapshot(records).await?;
        Ok(Some(updated))
    }

    fn watch(&self) -> watch::Receiver<Directory> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, models::member::member};

    #[tokio::test]
    async fn replace_then_get_all_round_trips_without_merging() {
        let pool = db::memory_pool().await.unwrap();
        let store = SqliteSnapshotStore::load(pool.clone()).await.unwrap();
        assert!(store.get_all().is_empty());

        store
            .replace(vec![member("1", "Ana"), member("2", "Bia")])
            .await
            .unwrap();
        let novos = vec![member("3", "Caio")];
        store.replace(novos.clone()).await.unwrap();
        assert_eq!(*store.get_all(), novos);

        // Uma nova instância lê o mesmo snapshot persistido
        let reloaded = SqliteSnapshotStore::load(pool).await.unwrap();
        assert_eq!(*reloaded.get_all(), novos);
    }

    #[tokio::test]
    async fn corrupt_snapshot_loads_as_empty_directory() {
        let pool = db::memory_pool().await.unwrap();
        sqlx::query("INSERT INTO snapshots (key, value, updated_at) VALUES (?1, ?2, ?3)")
            .bind(DIRECTORY_KEY)
            .bind("{isto não é json")
            .bind("2024-01-01T00:00:00Z")
            .execute(&pool)
            .await
            .unwrap();

        let store = SqliteSnapshotStore::load(pool).await.unwrap();
        assert!(store.get_all().is_empty());
    }

    #[tokio::test]
    async fn clear_empties_the_persisted_snapshot() {
        let pool = db::memory_pool().await.unwrap();
        let store = SqliteSnapshotStore::load(pool.clone()).await.unwrap();
        store.replace(vec![member("1", "Ana")]).await.unwrap();
        store.clear().await.unwrap();

        let reloaded = SqliteSnapshotStore::load(pool).await.unwrap();
        assert!(reloaded.get_all().is_empty());
    }

    #[tokio::test]
    async fn update_member_changes_one_record_and_persists() {
        let pool = db::memory_pool().await.unwrap();
        let store = SqliteSnapshotStore::load(pool.clone()).await.unwrap();
        store
            .replace(vec![member("1", "Ana"), member("2", "Bia")])
            .await
            .unwrap();

        let updated = store
            .update_member("2", Box::new(|m: &mut MemberRecord| m.cargo = "Enfermeira".into()))
            .await
            .unwrap();
        assert_eq!(updated.map(|m| m.cargo), Some("Enfermeira".to_string()));

        let missing = store
            .update_member("9", Box::new(|m: &mut MemberRecord| m.cargo = "x".into()))
            .await
            .unwrap();
        assert!(missing.is_none());

        let reloaded = SqliteSnapshotStore::load(pool).await.unwrap();
        assert_eq!(reloaded.get_all()[0].cargo, member("1", "Ana").cargo);
        assert_eq!(reloaded.get_all()[1].cargo, "Enfermeira");
    }
}
