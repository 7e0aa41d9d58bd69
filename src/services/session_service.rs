// src/services/session_service.rs
//! Identificação dos beneficiários e gestão da sessão.
//!
//! ATENÇÃO: isto NÃO é um mecanismo de segurança. A "senha" é sempre uma cópia
//! de dados do próprio beneficiário (matrícula ou CPF); serve só para o
//! beneficiário confirmar quem é. Não endurecer sem decisão de produto.
use crate::{
    error::{AppError, AppResult},
    models::member::{MemberRecord, ADMIN_KEYWORD},
};
use tower_sessions::Session;

/// Chave da identidade autenticada dentro da sessão.
pub const SESSION_KEY: &str = "bssm_session";

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Anonymous,
    Authenticated(MemberRecord),
}

/// Resolve identificador + senha contra o diretório.
///
/// Ordem: gestor (`admin`/`admin`, sem distinguir maiúsculas); depois
/// matrícula exata, CPF (só dígitos) e por fim texto contido em `obs`.
/// O candidato só é aceite se a senha for o próprio identificador, a
/// matrícula ou o CPF do registo.
pub fn resolve_login(directory: &[MemberRecord], identifier: &str, secret: &str) -> Option<MemberRecord> {
    let identifier = identifier.trim();
    let secret = secret.trim();

    if identifier.eq_ignore_ascii_case(ADMIN_KEYWORD) && secret.eq_ignore_ascii_case(ADMIN_KEYWORD) {
        return Some(MemberRecord::synthetic_admin());
    }
    if identifier.is_empty() || secret.is_empty() {
        return None;
    }

    let digits: String = identifier.chars().filter(char::is_ascii_digit).collect();
    let members = || directory.iter().filter(|r| !r.is_admin());

    let by_id = members().filter(|r| r.id == identifier);
    let by_cpf = members().filter(|r| !digits.is_empty() && r.cpf.as_deref() == Some(digits.as_str()));
    let by_obs = members().filter(|r| r.obs.as_deref().is_some_and(|obs| obs.contains(identifier)));

    let secret_matches = |r: &&MemberRecord| {
        secret == identifier || secret == r.id || r.cpf.as_deref().is_some_and(|cpf| !cpf.is_empty() && cpf == secret)
    };

    by_id.chain(by_cpf).chain(by_obs).find(secret_matches).cloned()
}

/// Sessão de um navegador: Anónimo ou Autenticado.
#[derive(Clone)]
pub struct SessionManager {
    session: Session,
}

impl SessionManager {
    pub fn new(session: Session) -> Self {
        SessionManager { session }
    }

    /// Estado atual. A identidade guardada é confiada sem nova validação.
    pub async fn state(&self) -> AppResult<SessionState> {
        let identity = self
            .session
            .get::<MemberRecord>(SESSION_KEY)
            .await
            .map_err(|e| AppError::SessionError(format!("Falha ao ler sessão: {}", e)))?;
        Ok(match identity {
            Some(member) => SessionState::Authenticated(member),
            None => SessionState::Anonymous,
        })
    }

    pub async fn login(&self, directory: &[MemberRecord], identifier: &str, secret: &str) -> AppResult<MemberRecord> {
        let identity = resolve_login(directory, identifier, secret).ok_or(AppError::InvalidCredentials)?;

        self.session
            .cycle_id()
            .await
            .map_err(|e| AppError::SessionError(format!("Falha ao rodar ID: {}", e)))?;
        self.store_identity(&identity).await?;
        tracing::info!("✅ Login bem-sucedido para: {} ({:?})", identity.id, identity.role);
        Ok(identity)
    }

    /// Substitui a identidade guardada (ex.: depois de trocar a foto).
    pub async fn update_identity(&self, identity: &MemberRecord) -> AppResult<()> {
        self.store_identity(identity).await
    }

    /// Apaga os dados e o registo da sessão (volta a Anónimo).
    pub async fn logout(&self) -> AppResult<()> {
        self.session
            .flush()
            .await
            .map_err(|e| AppError::SessionError(format!("Falha ao apagar sessão: {}", e)))
    }

    async fn store_identity(&self, identity: &MemberRecord) -> AppResult<()> {
        self.session
            .insert(SESSION_KEY, identity)
            .await
            .map_err(|e| AppError::SessionError(format!("Falha ao inserir na sessão: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::{member, Role};
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn directory() -> Vec<MemberRecord> {
        let mut maria = member("1001", "Maria Souza");
        maria.cpf = Some("12345678909".into());
        maria.obs = Some("CPF: 12345678909".into());
        let mut joao = member("1002", "João Silva");
        joao.obs = Some("matrícula antiga 77-B".into());
        vec![maria, joao, member("1003", "Sem CPF")]
    }

    #[test]
    fn id_pair_logs_in_as_that_record() {
        for record in directory() {
            let found = resolve_login(&directory(), &record.id, &record.id).unwrap();
            assert_eq!(found, record);
        }
    }

    #[test]
    fn cpf_pair_logs_in_even_when_formatted() {
        let dir = directory();
        assert_eq!(resolve_login(&dir, "12345678909", "12345678909").unwrap().id, "1001");
        assert_eq!(resolve_login(&dir, "123.456.789-09", "123.456.789-09").unwrap().id, "1001");
        // senha = matrícula também serve
        assert_eq!(resolve_login(&dir, "12345678909", "1001").unwrap().id, "1001");
    }

    #[test]
    fn obs_substring_is_a_fuzzy_fallback() {
        let dir = directory();
        assert_eq!(resolve_login(&dir, "77-B", "77-B").unwrap().id, "1002");
        assert_eq!(resolve_login(&dir, "77-B", "1002").unwrap().id, "1002");
    }

    #[test]
    fn admin_keyword_works_in_any_case_and_with_empty_directory() {
        for (u, p) in [("admin", "admin"), ("ADMIN", "Admin"), (" aDmIn ", "admin ")] {
            let id = resolve_login(&[], u, p).unwrap();
            assert_eq!(id.role, Role::Admin);
        }
        assert!(resolve_login(&[], "admin", "1234").is_none());
    }

    #[test]
    fn mismatches_stay_anonymous() {
        let dir = directory();
        assert!(resolve_login(&dir, "1001", "errada").is_none());
        assert!(resolve_login(&dir, "9999", "9999").is_none());
        assert!(resolve_login(&dir, "", "").is_none());
        assert!(resolve_login(&dir, "1003", "").is_none());
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn login_and_logout_drive_the_state_machine() {
        let manager = SessionManager::new(session());
        assert_eq!(manager.state().await.unwrap(), SessionState::Anonymous);

        let err = manager.login(&directory(), "1001", "x").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(manager.state().await.unwrap(), SessionState::Anonymous);

        let who = manager.login(&directory(), "1001", "1001").await.unwrap();
        assert_eq!(manager.state().await.unwrap(), SessionState::Authenticated(who));

        manager.logout().await.unwrap();
        assert_eq!(manager.state().await.unwrap(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn stored_identity_is_trusted_after_directory_changes() {
        let manager = SessionManager::new(session());
        manager.login(&directory(), "1003", "1003").await.unwrap();
        // o diretório pode mudar; a sessão não é revalidada
        match manager.state().await.unwrap() {
            SessionState::Authenticated(m) => assert_eq!(m.id, "1003"),
            SessionState::Anonymous => panic!("sessão devia continuar autenticada"),
        }
    }
}
