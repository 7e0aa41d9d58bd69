// src/services/date_normalizer.rs
//! Normalização das datas vindas da planilha para `DD/MM/YY`.
use chrono::{Duration, NaiveDate};

/// Maior número de série aceite (31/12/9999 nas folhas de cálculo).
const MAX_SERIAL: f64 = 2_958_466.0;

/// Converte um valor de data da planilha para `DD/MM/YY`.
///
/// Aceita o número de série das folhas de cálculo (dia 0 = 1899-12-30),
/// `YYYY-MM-DD` (com ou sem hora) e `DD/MM/YYYY` / `DD/MM/YY`.
/// Qualquer outro valor volta tal como veio.
pub fn normalize_date(raw: &str) -> String {
    let value = raw.trim();
    if let Some(date) = parse_serial(value).or_else(|| parse_iso(value)) {
        return date.format("%d/%m/%y").to_string();
    }
    if let Some((day, month, year)) = parse_br(value) {
        return format!("{:02}/{:02}/{:02}", day, month, year % 100);
    }
    raw.to_string()
}

fn serial_epoch() -> NaiveDate {
    // 1899-12-30 é sempre válida
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

fn parse_serial(value: &str) -> Option<NaiveDate> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let serial: f64 = value.parse().ok()?;
    if !(1.0..MAX_SERIAL).contains(&serial) {
        return None;
    }
    // a parte fracionária é a hora do dia
    serial_epoch().checked_add_signed(Duration::days(serial.floor() as i64))
}

fn parse_iso(value: &str) -> Option<NaiveDate> {
    let date_part = value.get(..10)?;
    match value.as_bytes().get(10) {
        None | Some(b'T') | Some(b' ') => {}
        Some(_) => return None,
    }
    let bytes = date_part.as_bytes();
    if bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// `DD/MM/YYYY` ou `DD/MM/YY`; devolve (dia, mês, ano) se for uma data real.
fn parse_br(value: &str) -> Option<(u32, u32, i32)> {
    let mut parts = value.split('/');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let numeric = |s: &str, lens: &[usize]| {
        if lens.contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit()) {
            s.parse::<i32>().ok()
        } else {
            None
        }
    };
    let day = numeric(day, &[1, 2])?;
    let month = numeric(month, &[1, 2])?;
    let year_digits = year.len();
    let mut full_year = numeric(year, &[2, 4])?;
    if year_digits == 2 {
        full_year += 2000;
    }
    // valida o dia (ex.: 31/02 não existe)
    NaiveDate::from_ymd_opt(full_year, month as u32, day as u32)?;
    Some((day as u32, month as u32, full_year))
}
