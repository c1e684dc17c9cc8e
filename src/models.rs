use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_directory: Option<String>,
    pub output_directory: Option<String>,
    // Source discovery
    pub source_extensions: Vec<String>,
    // Inclusion predicate
    pub active_status: String,
    pub unpaid_marker: String,
    pub default_selection: DefaultSelection,
}

/// Initial roster filter state before the user toggles anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultSelection {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "none")]
    Empty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_directory: Some("data-source".to_string()),
            output_directory: Some("output".to_string()),
            source_extensions: vec![
                "xlsx".to_string(),
                "xls".to_string(),
                "csv".to_string(),
                "tsv".to_string(),
                "txt".to_string(),
            ],
            active_status: "IN".to_string(),
            unpaid_marker: "Due Fee".to_string(),
            default_selection: DefaultSelection::All,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// A table as read from the source: header names and string cells, nothing interpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fields of the admission register the rest of the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalField {
    SlNo,
    StudentName,
    FatherName,
    Year,
    Course,
    RegNo,
    Category,
    AdmissionType,
    AdmissionCategory,
    Date,
    Report,
    AdmissionYear,
    Status,
    Remarks,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 14] = [
        CanonicalField::SlNo,
        CanonicalField::StudentName,
        CanonicalField::FatherName,
        CanonicalField::Year,
        CanonicalField::Course,
        CanonicalField::RegNo,
        CanonicalField::Category,
        CanonicalField::AdmissionType,
        CanonicalField::AdmissionCategory,
        CanonicalField::Date,
        CanonicalField::Report,
        CanonicalField::AdmissionYear,
        CanonicalField::Status,
        CanonicalField::Remarks,
    ];

    /// Columns without which no report can be produced.
    pub const REQUIRED: [CanonicalField; 4] = [
        CanonicalField::StudentName,
        CanonicalField::Year,
        CanonicalField::Course,
        CanonicalField::Status,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::SlNo => "sl_no",
            CanonicalField::StudentName => "student_name",
            CanonicalField::FatherName => "father_name",
            CanonicalField::Year => "year",
            CanonicalField::Course => "course",
            CanonicalField::RegNo => "reg_no",
            CanonicalField::Category => "category",
            CanonicalField::AdmissionType => "admission_type",
            CanonicalField::AdmissionCategory => "admission_category",
            CanonicalField::Date => "date",
            CanonicalField::Report => "report",
            CanonicalField::AdmissionYear => "admission_year",
            CanonicalField::Status => "status",
            CanonicalField::Remarks => "remarks",
        }
    }

    /// Column heading used in the admission register.
    pub fn header(self) -> &'static str {
        match self {
            CanonicalField::SlNo => "Sl No",
            CanonicalField::StudentName => "Student Name",
            CanonicalField::FatherName => "Father Name",
            CanonicalField::Year => "Year",
            CanonicalField::Course => "Course",
            CanonicalField::RegNo => "Reg No",
            CanonicalField::Category => "Cat",
            CanonicalField::AdmissionType => "Adm Type",
            CanonicalField::AdmissionCategory => "Adm Cat",
            CanonicalField::Date => "Date",
            CanonicalField::Report => "Rpt",
            CanonicalField::AdmissionYear => "Admn Year",
            CanonicalField::Status => "In/Out",
            CanonicalField::Remarks => "Remarks",
        }
    }
}

/// One admission row after column mapping, coercion and the inclusion filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub sl_no: String,
    pub student_name: String,
    pub father_name: String,
    pub year: String,
    pub course: String,
    pub reg_no: String,
    pub category: String,
    pub admission_type: String,
    pub admission_category: String,
    pub date: Option<NaiveDate>,
    pub date_display: Option<String>,
    pub report: String,
    pub admission_year: String,
    pub status: String,
    pub remarks: String,
}

impl CanonicalRecord {
    /// Text value of a field; the date is rendered as ISO `YYYY-MM-DD`.
    pub fn text(&self, field: CanonicalField) -> String {
        match field {
            CanonicalField::Date => self
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            CanonicalField::SlNo => self.sl_no.clone(),
            CanonicalField::StudentName => self.student_name.clone(),
            CanonicalField::FatherName => self.father_name.clone(),
            CanonicalField::Year => self.year.clone(),
            CanonicalField::Course => self.course.clone(),
            CanonicalField::RegNo => self.reg_no.clone(),
            CanonicalField::Category => self.category.clone(),
            CanonicalField::AdmissionType => self.admission_type.clone(),
            CanonicalField::AdmissionCategory => self.admission_category.clone(),
            CanonicalField::Report => self.report.clone(),
            CanonicalField::AdmissionYear => self.admission_year.clone(),
            CanonicalField::Status => self.status.clone(),
            CanonicalField::Remarks => self.remarks.clone(),
        }
    }
}

/// Headline numbers shown above the year/course statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSummary {
    pub total_students: usize,
    pub total_courses: usize,
    pub total_years: usize,
}

/// The included admission records plus which source columns were present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalTable {
    pub records: Vec<CanonicalRecord>,
    pub fields: BTreeSet<CanonicalField>,
}

impl CanonicalTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.fields.contains(&field)
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            total_students: self.records.len(),
            total_courses: self.available_courses().len(),
            total_years: self.available_years().len(),
        }
    }

    /// Distinct year tokens, sorted.
    pub fn available_years(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.year.clone()).collect()
    }

    /// Distinct course tokens, sorted.
    pub fn available_courses(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.course.clone()).collect()
    }

    /// Renders the table back into register form so it can be normalized again.
    pub fn to_raw_table(&self) -> RawTable {
        let fields: Vec<CanonicalField> = CanonicalField::ALL
            .into_iter()
            .filter(|f| self.has_field(*f))
            .collect();
        let mut raw = RawTable::new(fields.iter().map(|f| f.header().to_string()).collect());
        for record in &self.records {
            raw.push_row(fields.iter().map(|f| record.text(*f)).collect());
        }
        raw
    }
}
