// src/services/directory_service.rs
use crate::{
    error::{AppError, AppResult},
    models::member::{DirectoryStats, MemberFilter, MemberRecord},
    services::record_mapper,
    store::{DirectoryStore, PhotoScope},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Palavra que o operador tem de escrever para apagar a base.
pub const CLEAR_CONFIRMATION: &str = "LIMPAR";

/// Filtros do painel (todos têm de bater). Filtros vazios aceitam tudo.
pub fn filter_members<'a>(directory: &'a [MemberRecord], filter: &MemberFilter) -> Vec<&'a MemberRecord> {
    let nome = filter.nome.trim().to_lowercase();
    let matricula = filter.matricula.trim().to_lowercase();
    let status = filter.status.trim().to_lowercase();

    directory
        .iter()
        .filter(|m| nome.is_empty() || m.name.to_lowercase().contains(&nome))
        .filter(|m| {
            matricula.is_empty()
                || m.id.to_lowercase().contains(&matricula)
                || m.cpf.as_deref().is_some_and(|cpf| cpf.contains(&matricula))
        })
        .filter(|m| status.is_empty() || m.elegibilidade.to_lowercase().contains(&status))
        .collect()
}

pub fn directory_stats(directory: &[MemberRecord]) -> DirectoryStats {
    DirectoryStats {
        total: directory.len(),
        elegiveis: directory.iter().filter(|m| m.is_eligible()).count(),
    }
}

/// Lê a planilha (no pool de threads bloqueantes), converte e substitui o diretório.
pub async fn import_spreadsheet(store: &dyn DirectoryStore, bytes: Vec<u8>) -> AppResult<usize> {
    tracing::info!("📥 Importando planilha ({} bytes)...", bytes.len());
    let rows = tokio::task::spawn_blocking(move || record_mapper::read_workbook(bytes))
        .await
        .map_err(|e| {
            tracing::error!("Erro na task spawn_blocking (read_workbook): {:?}", e);
            AppError::InternalServerError
        })??;

    let records = record_mapper::map_rows(&rows);
    replace_directory(store, records).await
}

/// Substitui o diretório inteiro. Identidades de gestor nunca são gravadas.
pub async fn replace_directory(store: &dyn DirectoryStore, records: Vec<MemberRecord>) -> AppResult<usize> {
    let before = records.len();
    let records: Vec<MemberRecord> = records.into_iter().filter(|r| !r.is_admin()).collect();
    if records.len() != before {
        tracing::warn!("{} registos de gestor descartados antes de gravar.", before - records.len());
    }

    let total = records.len();
    store.replace(records).await?;
    tracing::info!("✅ Diretório substituído no backend '{}' ({} registos).", store.backend_name(), total);
    Ok(total)
}

/// Apaga o diretório, só com a palavra de confirmação.
pub async fn clear_directory(store: &dyn DirectoryStore, confirmation: &str) -> AppResult<()> {
    if !confirmation.trim().eq_ignore_ascii_case(CLEAR_CONFIRMATION) {
        tracing::warn!("Pedido de limpeza sem confirmação recusado.");
        return Err(AppError::ConfirmationRequired);
    }
    store.clear().await?;
    tracing::warn!("🗑️ Diretório apagado no backend '{}'.", store.backend_name());
    Ok(())
}

/// Converte a imagem enviada num data URI.
pub fn encode_photo(content_type: Option<&str>, bytes: &[u8], max_bytes: usize) -> AppResult<String> {
    let mime = content_type
        .map(str::trim)
        .filter(|ct| ct.starts_with("image/"))
        .ok_or_else(|| AppError::BadRequest("O ficheiro enviado não é uma imagem.".into()))?;
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Imagem vazia.".into()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::BadRequest("Imagem demasiado grande.".into()));
    }
    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
}

/// Aplica a foto à identidade e, no modo local, grava-a também no diretório.
/// A gravação altera só o registo do membro, sob o lock de escrita do store.
pub async fn attach_photo(store: &dyn DirectoryStore, identity: &MemberRecord, photo: String) -> AppResult<MemberRecord> {
    let mut updated = identity.clone();
    updated.photo = Some(photo.clone());

    if store.photo_scope() == PhotoScope::Directory && !identity.is_admin() {
        match store
            .update_member(&identity.id, Box::new(move |m: &mut MemberRecord| m.photo = Some(photo)))
            .await?
        {
            Some(stored) => {
                tracing::info!("📷 Foto gravada no diretório para {}.", identity.id);
                updated = stored;
            }
            None => tracing::debug!("{} já não está no diretório; foto fica só na sessão.", identity.id),
        }
    }
    Ok(updated)
}
