// src/models/member.rs
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Papel de uma identidade autenticada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

/// Uma linha do diretório de beneficiários (uma carteirinha).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub id: String, // Matrícula
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub cargo: String,
    #[serde(default)]
    pub local: String,
    #[serde(default)]
    pub elegibilidade: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admissao: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situacao_atual: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_nasc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obs: Option<String>,
    // data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// Snapshot imutável do diretório, partilhado entre leitores.
pub type Directory = Arc<Vec<MemberRecord>>;

pub const ADMIN_KEYWORD: &str = "admin";

impl MemberRecord {
    /// Identidade sintética do gestor. Nunca é gravada no diretório.
    pub fn synthetic_admin() -> Self {
        MemberRecord {
            id: ADMIN_KEYWORD.to_string(),
            name: "Gestor HSM".to_string(),
            role: Role::Admin,
            cargo: "Administrador".to_string(),
            local: "TI/RH".to_string(),
            elegibilidade: "Ativo".to_string(),
            admissao: None,
            situacao_atual: None,
            data_nasc: None,
            cpf: None,
            obs: None,
            photo: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_eligible(&self) -> bool {
        is_eligible(&self.elegibilidade)
    }

    /// Primeiro nome, usado na saudação do cartão.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Classificação de elegibilidade por substring (sem distinguir maiúsculas).
/// Qualquer texto sem "elegível" ou "ativo" conta como inelegível.
pub fn is_eligible(status: &str) -> bool {
    let status = status.to_lowercase();
    status.contains("elegível") || status.contains("ativo")
}

// Struct para dados do formulário de login
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(rename = "username")]
    pub identifier: String,
    pub password: String,
}

/// Filtros do painel administrativo (query string).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MemberFilter {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub matricula: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub total: usize,
    pub elegiveis: usize,
}

#[cfg(test)]
pub(crate) fn member(id: &str, name: &str) -> MemberRecord {
    MemberRecord {
        id: id.to_string(),
        name: name.to_string(),
        role: Role::Member,
        cargo: "Técnico de Enfermagem".to_string(),
        local: "Unidade Central".to_string(),
        elegibilidade: "Elegível".to_string(),
        admissao: None,
        situacao_atual: None,
        data_nasc: None,
        cpf: None,
        obs: None,
        photo: None,
    }
}
