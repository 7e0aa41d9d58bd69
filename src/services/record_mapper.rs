// src/services/record_mapper.rs
use crate::{
    error::{AppError, AppResult},
    models::member::{MemberRecord, Role},
    services::date_normalizer::normalize_date,
};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::{collections::BTreeMap, io::Cursor};

/// Uma linha da planilha: nome da coluna -> valor. Células vazias não aparecem.
pub type SheetRow = BTreeMap<String, String>;

// --- Tabela de resolução de colunas (primeira encontrada ganha) ---
const NAME_KEYS: &[&str] = &["Nome", "Colaborador", "NOME"];
const ID_KEYS: &[&str] = &["Matrícula", "MATRICULA", "Matricula"];
const CPF_KEYS: &[&str] = &["CPF", "cpf"];
const CARGO_KEYS: &[&str] = &["Cargo", "CARGO"];
const LOCAL_KEYS: &[&str] = &["Local", "Setor"];
const ELEGIBILIDADE_KEYS: &[&str] = &["Elegibilidade", "SITUAÇÃO ATUAL", "Situação atual"];
const ADMISSAO_KEYS: &[&str] = &["Admissão", "ADMISSÃO", "Admissao"];
const SITUACAO_KEYS: &[&str] = &["Situação atual", "SITUAÇÃO ATUAL"];
const DATA_NASC_KEYS: &[&str] = &["Data Nasc.", "DATA NASC.", "Data de Nascimento"];
const OBS_KEYS: &[&str] = &["Obs", "OBS", "Observação"];

const DEFAULT_NAME: &str = "Sem Nome";
const DEFAULT_CARGO: &str = "Não informado";
const DEFAULT_LOCAL: &str = "HSM";
const DEFAULT_ELEGIBILIDADE: &str = "Em Análise";

/// Lê a primeira folha de um ficheiro .xlsx/.xls para linhas coluna -> valor.
/// A primeira linha não vazia é o cabeçalho; linhas totalmente vazias são ignoradas.
pub fn read_workbook(bytes: Vec<u8>) -> AppResult<Vec<SheetRow>> {
    if bytes.is_empty() {
        return Err(AppError::Spreadsheet("ficheiro vazio".into()));
    }
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Spreadsheet("a planilha não tem folhas".into()))??;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.find(|r| r.iter().any(|c| cell_to_string(c).is_some())) {
        Some(cells) => cells
            .iter()
            .map(|c| cell_to_string(c).unwrap_or_default())
            .collect(),
        None => {
            tracing::warn!("Planilha sem cabeçalho, nenhuma linha importada.");
            return Ok(Vec::new());
        }
    };

    let sheet_rows: Vec<SheetRow> = rows
        .map(|cells| {
            header
                .iter()
                .zip(cells.iter())
                .filter(|(column, _)| !column.is_empty())
                .filter_map(|(column, cell)| cell_to_string(cell).map(|v| (column.clone(), v)))
                .collect::<SheetRow>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    tracing::debug!("Planilha lida: {} colunas, {} linhas.", header.len(), sheet_rows.len());
    Ok(sheet_rows)
}

/// Converte uma célula para texto. Datas viram o seu número de série.
pub fn cell_to_string(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format_number(dt.as_f64()),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Converte todas as linhas em registos. Nunca rejeita uma linha.
pub fn map_rows(rows: &[SheetRow]) -> Vec<MemberRecord> {
    let records: Vec<MemberRecord> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| map_row(index, row))
        .collect();
    tracing::info!("📄 {} linhas convertidas em registos.", records.len());
    records
}

/// Converte uma linha; `index` é a posição (base 0) usada quando falta a matrícula.
pub fn map_row(index: usize, row: &SheetRow) -> MemberRecord {
    let mut missing: Vec<&str> = Vec::new();
    let mut field = |keys: &[&str], label: &'static str, default: &str| {
        pick(row, keys).unwrap_or_else(|| {
            missing.push(label);
            default.to_string()
        })
    };

    let name = field(NAME_KEYS, "nome", DEFAULT_NAME);
    let id = field(ID_KEYS, "matrícula", &index.to_string());
    let cargo = field(CARGO_KEYS, "cargo", DEFAULT_CARGO);
    let local = field(LOCAL_KEYS, "local", DEFAULT_LOCAL);
    let elegibilidade = field(ELEGIBILIDADE_KEYS, "elegibilidade", DEFAULT_ELEGIBILIDADE);

    let cpf = pick(row, CPF_KEYS)
        .map(|raw| raw.chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|digits| !digits.is_empty());

    let obs = pick(row, OBS_KEYS).or_else(|| cpf.as_ref().map(|c| format!("CPF: {}", c)));

    if !missing.is_empty() {
        tracing::debug!("Linha {}: colunas em falta {:?}, usando valores padrão.", index, missing);
    }

    MemberRecord {
        id,
        name,
        role: Role::Member,
        cargo,
        local,
        elegibilidade,
        admissao: pick(row, ADMISSAO_KEYS).map(|v| normalize_date(&v)),
        situacao_atual: pick(row, SITUACAO_KEYS),
        data_nasc: pick(row, DATA_NASC_KEYS).map(|v| normalize_date(&v)),
        cpf,
        obs,
        photo: None,
    }
}

fn pick(row: &SheetRow, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Planilha .xlsx real para testes: linha inicial em branco, cabeçalho,
/// coluna sem título, linha vazia no meio e uma linha sem matrícula.
#[cfg(test)]
pub(crate) fn sample_workbook() -> Vec<u8> {
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("dd/mm/yyyy");
    let admissao = ExcelDateTime::from_ymd(2023, 3, 15).unwrap();
    let sheet = workbook.add_worksheet();

    // linha 0: só espaços, conta como vazia
    sheet.write_string(0, 0, "   ").unwrap();
    for (col, title) in ["Matrícula", "Nome", "CPF", "Admissão", "Situação atual"].iter().enumerate() {
        sheet.write_string(1, col as u16, *title).unwrap();
    }
    // coluna 5 não tem título
    sheet.write_string(2, 0, "1001").unwrap();
    sheet.write_string(2, 1, "Ana Paula").unwrap();
    sheet.write_string(2, 2, "123.456.789-09").unwrap();
    sheet.write_datetime_with_format(2, 3, &admissao, &date_format).unwrap();
    sheet.write_string(2, 4, "Ativo").unwrap();
    sheet.write_string(2, 5, "lixo sem coluna").unwrap();
    // linha 3 fica totalmente vazia
    sheet.write_string(4, 1, "Bia Santos").unwrap();
    sheet.write_number(4, 3, 45000.0).unwrap();

    workbook.save_to_buffer().unwrap()
}
