//! Turns a raw register into the canonical admitted-and-paid table.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{AdmissionError, Result};
use crate::models::{CanonicalField, CanonicalRecord, CanonicalTable, Config, RawTable};

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid header pattern"));

/// Header keys (see [`header_key`]) accepted for each canonical field.
const ALIASES: &[(&str, CanonicalField)] = &[
    ("slno", CanonicalField::SlNo),
    ("serialno", CanonicalField::SlNo),
    ("sno", CanonicalField::SlNo),
    ("studentname", CanonicalField::StudentName),
    ("name", CanonicalField::StudentName),
    ("fathername", CanonicalField::FatherName),
    ("fathersname", CanonicalField::FatherName),
    ("year", CanonicalField::Year),
    ("course", CanonicalField::Course),
    ("branch", CanonicalField::Course),
    ("regno", CanonicalField::RegNo),
    ("registrationno", CanonicalField::RegNo),
    ("cat", CanonicalField::Category),
    ("category", CanonicalField::Category),
    ("admtype", CanonicalField::AdmissionType),
    ("admissiontype", CanonicalField::AdmissionType),
    ("admcat", CanonicalField::AdmissionCategory),
    ("admissioncategory", CanonicalField::AdmissionCategory),
    ("date", CanonicalField::Date),
    ("admissiondate", CanonicalField::Date),
    ("rpt", CanonicalField::Report),
    ("report", CanonicalField::Report),
    ("admnyear", CanonicalField::AdmissionYear),
    ("admissionyear", CanonicalField::AdmissionYear),
    ("admyear", CanonicalField::AdmissionYear),
    ("inout", CanonicalField::Status),
    ("status", CanonicalField::Status),
    ("remarks", CanonicalField::Remarks),
    ("remark", CanonicalField::Remarks),
];

// Two-digit year forms come before their four-digit twins: `%Y` happily reads "24" as year 24.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%y",
    "%d-%m-%Y",
    "%d/%m/%y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%y",
    "%d-%b-%Y",
    "%d %b %Y",
    // Month-first only when the day-first reading is impossible, e.g. "12/31/2024".
    "%m/%d/%Y",
    "%m-%d-%Y",
];

const MIN_YEAR: i32 = 1900;

/// Serial day of 1950-01-01; smaller plain numbers are years or counts, not dates.
const MIN_SERIAL_DAY: f64 = 18_264.0;
/// Largest serial day number a spreadsheet can hold (9999-12-31).
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

pub const DATE_DISPLAY_FORMAT: &str = "%d-%b-%y";

/// Lower-cases a header and strips everything but letters and digits.
pub fn header_key(header: &str) -> String {
    NON_ALNUM
        .replace_all(&header.to_lowercase(), "")
        .into_owned()
}

pub fn canonical_field(header: &str) -> Option<CanonicalField> {
    let key = header_key(header);
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, field)| *field)
}

/// Parses an admission date, returning `None` for anything unrecognized.
///
/// ISO dates are tried first, then day-first forms, then month-first forms,
/// then spreadsheet serial day numbers. A trailing time of day is ignored.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    parse_calendar_date(value)
        .or_else(|| strip_time_of_day(value).and_then(parse_calendar_date))
        .or_else(|| parse_serial_day(value))
}

fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .filter(|date| date.year() >= MIN_YEAR)
    })
}

/// Drops a trailing `HH:MM[:SS]` part, e.g. "15/01/2024 10:30" or "2024-01-15T00:00:00".
fn strip_time_of_day(value: &str) -> Option<&str> {
    let split = value.rfind([' ', 'T'])?;
    let time = &value[split + 1..];
    let is_time = time.contains(':')
        && time.chars().all(|c| c.is_ascii_digit() || c == ':' || c == '.');
    is_time.then(|| value[..split].trim_end())
}

fn parse_serial_day(value: &str) -> Option<NaiveDate> {
    let serial: f64 = value.parse().ok()?;
    if !serial.is_finite() || !(MIN_SERIAL_DAY..=MAX_SERIAL_DAY).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.trunc() as u64))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_DISPLAY_FORMAT).to_string()
}

/// Trims a grouping token and undoes the `2024.0` float rendering spreadsheets produce.
pub fn clean_token(value: &str) -> String {
    let value = value.trim();
    match value.strip_suffix(".0") {
        Some(whole) if !whole.is_empty() && whole.bytes().all(|b| b.is_ascii_digit()) => {
            whole.to_string()
        }
        _ => value.to_string(),
    }
}

/// Records dropped by the inclusion filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExclusionCounts {
    pub inactive: usize,
    pub unpaid: usize,
}

#[derive(Debug, Clone)]
pub struct Normalized {
    pub table: CanonicalTable,
    pub excluded: ExclusionCounts,
}

pub struct Normalizer {
    active_status: String,
    unpaid_marker: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new("IN", "Due Fee")
    }
}

impl Normalizer {
    pub fn new(active_status: &str, unpaid_marker: &str) -> Self {
        Self {
            active_status: active_status.trim().to_lowercase(),
            unpaid_marker: unpaid_marker.trim().to_lowercase(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.active_status, &config.unpaid_marker)
    }

    /// A record counts iff it is active and its remarks do not mark it unpaid.
    pub fn is_included(&self, status: &str, remarks: &str) -> bool {
        self.is_active(status) && !self.is_unpaid(remarks)
    }

    fn is_active(&self, status: &str) -> bool {
        status.trim().to_lowercase() == self.active_status
    }

    fn is_unpaid(&self, remarks: &str) -> bool {
        !self.unpaid_marker.is_empty() && remarks.to_lowercase().contains(&self.unpaid_marker)
    }

    pub fn normalize(&self, raw: &RawTable) -> Result<Normalized> {
        if raw.is_empty() {
            return Err(AdmissionError::DataUnavailable {
                reason: "the register has no data rows".to_string(),
            });
        }

        let columns = map_columns(&raw.headers)?;
        let fields: BTreeSet<CanonicalField> = columns.iter().map(|(field, _)| *field).collect();

        let mut excluded = ExclusionCounts::default();
        let mut records = Vec::new();
        let mut undated = 0usize;

        for row in &raw.rows {
            let cell = |field: CanonicalField| cell_value(row, &columns, field);

            let status = cell(CanonicalField::Status);
            let remarks = cell(CanonicalField::Remarks);
            if !self.is_active(status) {
                excluded.inactive += 1;
                continue;
            }
            if self.is_unpaid(remarks) {
                excluded.unpaid += 1;
                continue;
            }

            let date_text = cell(CanonicalField::Date);
            let date = parse_date(date_text);
            if date.is_none() && !date_text.is_empty() {
                undated += 1;
            }

            records.push(CanonicalRecord {
                sl_no: cell(CanonicalField::SlNo).to_string(),
                student_name: cell(CanonicalField::StudentName).to_string(),
                father_name: cell(CanonicalField::FatherName).to_string(),
                year: clean_token(cell(CanonicalField::Year)),
                course: clean_token(cell(CanonicalField::Course)),
                reg_no: cell(CanonicalField::RegNo).to_string(),
                category: cell(CanonicalField::Category).to_string(),
                admission_type: cell(CanonicalField::AdmissionType).to_string(),
                admission_category: cell(CanonicalField::AdmissionCategory).to_string(),
                date,
                date_display: date.map(format_date),
                report: cell(CanonicalField::Report).to_string(),
                admission_year: clean_token(cell(CanonicalField::AdmissionYear)),
                status: status.to_string(),
                remarks: remarks.to_string(),
            });
        }

        if undated > 0 {
            warn!(rows = undated, "unparseable admission dates left blank");
        }
        info!(
            included = records.len(),
            inactive = excluded.inactive,
            unpaid = excluded.unpaid,
            "normalized admission register"
        );

        Ok(Normalized {
            table: CanonicalTable { records, fields },
            excluded,
        })
    }
}

fn cell_value<'a>(row: &'a [String], columns: &[(CanonicalField, usize)], field: CanonicalField) -> &'a str {
    columns
        .iter()
        .find(|(f, _)| *f == field)
        .and_then(|(_, idx)| row.get(*idx))
        .map(|v| v.trim())
        .unwrap_or("")
}

fn map_columns(headers: &[String]) -> Result<Vec<(CanonicalField, usize)>> {
    let mut columns: Vec<(CanonicalField, usize)> = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        match canonical_field(header) {
            Some(field) if columns.iter().any(|(f, _)| *f == field) => {
                warn!(column = %header, field = field.name(), "duplicate column ignored");
            }
            Some(field) => columns.push((field, idx)),
            None => debug!(column = %header, "unrecognized column dropped"),
        }
    }

    let missing: Vec<String> = CanonicalField::REQUIRED
        .iter()
        .filter(|field| !columns.iter().any(|(f, _)| f == *field))
        .map(|field| field.header().to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AdmissionError::SchemaMismatch { missing });
    }
    Ok(columns)
}
