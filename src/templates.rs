// src/templates.rs
use crate::models::member::{DirectoryStats, MemberFilter, MemberRecord};
use askama::Template;

/// Valor mostrado quando um campo opcional não existe.
const MISSING: &str = "-";

fn or_dash(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(MISSING)
        .to_string()
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub error: Option<String>,
}

/// Dados da carteirinha já prontos para exibir.
#[derive(Debug, Clone)]
pub struct MemberCardView {
    pub id: String,
    pub name: String,
    pub first_name: String,
    pub cargo: String,
    pub local: String,
    pub elegibilidade: String,
    pub eligible: bool,
    pub admissao: String,
    pub situacao_atual: String,
    pub data_nasc: String,
    pub cpf: String,
    pub photo: Option<String>,
}

impl From<&MemberRecord> for MemberCardView {
    fn from(m: &MemberRecord) -> Self {
        MemberCardView {
            id: m.id.clone(),
            name: m.name.clone(),
            first_name: m.first_name().to_string(),
            cargo: m.cargo.clone(),
            local: m.local.clone(),
            elegibilidade: m.elegibilidade.clone(),
            eligible: m.is_eligible(),
            admissao: or_dash(&m.admissao),
            situacao_atual: or_dash(&m.situacao_atual),
            data_nasc: or_dash(&m.data_nasc),
            cpf: or_dash(&m.cpf),
            photo: m.photo.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "member_card.html")]
pub struct MemberCardPage {
    pub card: MemberCardView,
    // true quando a foto só vive nesta sessão (modo remoto)
    pub photo_session_only: bool,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

/// Linha da tabela do painel.
#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: String,
    pub name: String,
    pub cargo: String,
    pub local: String,
    pub cpf: String,
    pub admissao: String,
    pub situacao_atual: String,
    pub elegibilidade: String,
    pub eligible: bool,
}

impl From<&MemberRecord> for MemberRow {
    fn from(m: &MemberRecord) -> Self {
        MemberRow {
            id: m.id.clone(),
            name: m.name.clone(),
            cargo: m.cargo.clone(),
            local: m.local.clone(),
            cpf: or_dash(&m.cpf),
            admissao: or_dash(&m.admissao),
            situacao_atual: or_dash(&m.situacao_atual),
            elegibilidade: m.elegibilidade.clone(),
            eligible: m.is_eligible(),
        }
    }
}

pub const STATUS_OPTIONS: &[&str] = &["Elegível", "Ativo", "Inapto"];

#[derive(Template)]
#[template(path = "admin_dashboard.html")]
pub struct AdminDashboardPage {
    pub rows: Vec<MemberRow>,
    pub stats: DirectoryStats,
    pub filter: MemberFilter,
    pub status_options: &'static [&'static str],
    pub backend: &'static str,
    pub clear_confirmation: &'static str,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

impl AdminDashboardPage {
    pub fn is_selected(&self, option: &str) -> bool {
        self.filter.status == option
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::member;

    #[test]
    fn missing_fields_render_as_dash() {
        let mut m = member("1", "Ana Paula");
        m.admissao = Some("15/03/23".into());
        let card = MemberCardView::from(&m);
        assert_eq!(card.admissao, "15/03/23");
        assert_eq!(card.data_nasc, "-");
        assert_eq!(card.situacao_atual, "-");
        assert_eq!(card.cpf, "-");
        assert_eq!(card.first_name, "Ana");
        assert!(card.eligible);
    }

    #[test]
    fn login_page_shows_error() {
        let html = LoginPage {
            error: Some("Credenciais incorretas. Verifique seu CPF.".into()),
        }
        .render()
        .unwrap();
        assert!(html.contains("Credenciais incorretas"));
    }

    #[test]
    fn dashboard_renders_rows_and_selected_status() {
        let mut inapto = member("2", "Bia");
        inapto.elegibilidade = "Inapto".into();
        inapto.admissao = Some("15/03/23".into());
        inapto.situacao_atual = Some("Afastada".into());
        let page = AdminDashboardPage {
            rows: vec![MemberRow::from(&member("1", "Ana")), MemberRow::from(&inapto)],
            stats: DirectoryStats { total: 2, elegiveis: 1 },
            filter: MemberFilter {
                status: "Inapto".into(),
                ..Default::default()
            },
            status_options: STATUS_OPTIONS,
            backend: "local",
            clear_confirmation: "LIMPAR",
            success_message: None,
            error_message: Some("falhou".into()),
        };
        assert!(page.is_selected("Inapto"));
        assert!(!page.is_selected("Ativo"));
        let html = page.render().unwrap();
        assert!(html.contains("Bia"));
        assert!(html.contains("falhou"));
        assert!(html.contains("<td>15/03/23</td>"));
        assert!(html.contains("<td>Afastada</td>"));
        // sem CPF nas duas linhas; Ana também sem admissão nem situação
        assert_eq!(html.matches("<td>-</td>").count(), 4);
    }
}
