//! Locates the admission register on disk and reads it into a [`RawTable`].
//!
//! The register is either the admissions workbook itself (`.xlsx`/`.xls`, first
//! worksheet) or a delimited text export of it. Text exports arrive in a handful
//! of encodings, so decoding walks a fixed candidate list (BOM first, then strict
//! UTF-8, then Windows-1252) and keeps the first one that yields a header row.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::{debug, info, warn};

use crate::error::{AdmissionError, Result};
use crate::models::RawTable;

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];
const WORKBOOK_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// How a source file was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited { encoding: &'static str, delimiter: u8 },
    Workbook { sheet: String },
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Delimited {
                encoding,
                delimiter,
            } => write!(
                f,
                "{encoding}, '{}' separated",
                char::from(*delimiter).escape_default()
            ),
            SourceFormat::Workbook { sheet } => write!(f, "worksheet '{sheet}'"),
        }
    }
}

/// A parsed source file and how it was decoded.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub table: RawTable,
}

pub struct AdmissionLoader {
    extensions: Vec<String>,
}

impl AdmissionLoader {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Finds the first file in `dir` (by file name) whose extension is accepted.
    pub fn discover_source(&self, dir: &Path) -> Result<PathBuf> {
        if !dir.is_dir() {
            return Err(AdmissionError::DataUnavailable {
                reason: format!("directory {} not found", dir.display()),
            });
        }

        let entries = fs::read_dir(dir).map_err(|e| AdmissionError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| AdmissionError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_file() && self.accepts(&path) {
                candidates.push(path);
            }
        }
        candidates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if candidates.len() > 1 {
            debug!(count = candidates.len(), "multiple source files found, using the first");
        }

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| AdmissionError::DataUnavailable {
                reason: format!(
                    "no .{} file in {}",
                    self.extensions.join("/."),
                    dir.display()
                ),
            })
    }

    pub fn load_file(&self, path: &Path) -> Result<LoadedSource> {
        let source = if is_workbook(path) {
            read_workbook(path)?
        } else {
            let bytes = fs::read(path).map_err(|e| AdmissionError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;
            parse_bytes(path, &bytes)?
        };
        info!(
            path = %source.path.display(),
            format = %source.format,
            rows = source.table.rows.len(),
            "loaded admission register"
        );
        Ok(source)
    }

    pub fn load_from_directory(&self, dir: &Path) -> Result<LoadedSource> {
        let path = self.discover_source(dir)?;
        self.load_file(&path)
    }

    fn accepts(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.') || name.starts_with("~$"))
            .unwrap_or(true);
        if hidden {
            return false;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

/// Decodes and parses raw file content, trying each candidate encoding in turn.
pub fn parse_bytes(path: &Path, bytes: &[u8]) -> Result<LoadedSource> {
    if bytes.is_empty() {
        return Err(AdmissionError::DataUnavailable {
            reason: format!("{} is empty", path.display()),
        });
    }

    let mut tried = Vec::new();
    let mut last_error = String::from("no encoding could decode the file");

    for encoding in candidate_encodings(bytes) {
        tried.push(encoding.name());
        let Some(text) = decode_strict(encoding, bytes) else {
            debug!(encoding = encoding.name(), "decode failed");
            continue;
        };
        let delimiter = detect_delimiter(&text);
        match parse_text(&text, delimiter) {
            Ok(table) => {
                return Ok(LoadedSource {
                    path: path.to_path_buf(),
                    format: SourceFormat::Delimited {
                        encoding: encoding.name(),
                        delimiter,
                    },
                    table,
                });
            }
            Err(message) => {
                warn!(encoding = encoding.name(), %message, "parse failed");
                last_error = message;
            }
        }
    }

    Err(AdmissionError::ParseFailure {
        path: path.to_path_buf(),
        tried,
        message: last_error,
    })
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| WORKBOOK_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Reads the first worksheet of an Excel workbook.
///
/// Date cells are written as ISO `YYYY-MM-DD` so they normalize like text dates.
pub fn read_workbook(path: &Path) -> Result<LoadedSource> {
    let parse_failure = |message: String| AdmissionError::ParseFailure {
        path: path.to_path_buf(),
        tried: vec!["workbook"],
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| parse_failure(e.to_string()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AdmissionError::DataUnavailable {
            reason: format!("{} has no worksheets", path.display()),
        })?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| parse_failure(e.to_string()))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()));

    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| AdmissionError::DataUnavailable {
            reason: format!("worksheet '{sheet}' in {} is empty", path.display()),
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = RawTable::new(headers);
    for row in rows {
        table.push_row(row);
    }
    debug!(sheet = %sheet, "read workbook");

    Ok(LoadedSource {
        path: path.to_path_buf(),
        format: SourceFormat::Workbook { sheet },
        table,
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(value) => value
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| value.as_f64().to_string()),
        other => other.to_string(),
    }
}

fn candidate_encodings(bytes: &[u8]) -> Vec<&'static Encoding> {
    let mut candidates = Vec::new();
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        candidates.push(encoding);
    }
    for encoding in [UTF_8, WINDOWS_1252] {
        if !candidates.contains(&encoding) {
            candidates.push(encoding);
        }
    }
    candidates
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    (!had_errors).then_some(text)
}

/// Picks the delimiter that occurs most often in the header line.
pub fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    let mut best = b',';
    let mut best_count = 0;
    for delimiter in DELIMITERS {
        let count = header.bytes().filter(|b| *b == delimiter).count();
        if count > best_count {
            best = delimiter;
            best_count = count;
        }
    }
    best
}

fn parse_text(text: &str, delimiter: u8) -> std::result::Result<RawTable, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err("no header row".to_string());
    }

    let mut table = RawTable::new(headers);
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        table.push_row(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::parse_date;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
    use tempfile::TempDir;

    fn loader() -> AdmissionLoader {
        AdmissionLoader::new(&["csv".to_string(), ".TSV".to_string()])
    }

    fn loader_with_workbooks() -> AdmissionLoader {
        AdmissionLoader::new(&["csv".to_string(), "xlsx".to_string()])
    }

    #[test]
    fn detects_semicolon_delimiter() {
        assert_eq!(detect_delimiter("Year;Course;Student Name\n1st;CE;A"), b';');
        assert_eq!(detect_delimiter("Year\tCourse\n"), b'\t');
        assert_eq!(detect_delimiter("Year\n"), b',');
    }

    #[test]
    fn parses_utf8_with_bom() {
        let bytes = b"\xEF\xBB\xBFYear,Course\n1st,CE\n";
        let source = parse_bytes(Path::new("a.csv"), bytes).unwrap();
        assert_eq!(
            source.format,
            SourceFormat::Delimited {
                encoding: "UTF-8",
                delimiter: b','
            }
        );
        assert_eq!(source.table.headers, vec!["Year", "Course"]);
        assert_eq!(source.table.rows, vec![vec!["1st", "CE"]]);
    }

    #[test]
    fn falls_back_to_windows_1252() {
        // 0xE9 is 'é' in Windows-1252 and invalid as a lone UTF-8 byte.
        let bytes = b"Student Name,Course\nRen\xE9,CE\n";
        let source = parse_bytes(Path::new("a.csv"), bytes).unwrap();
        assert!(matches!(
            source.format,
            SourceFormat::Delimited {
                encoding: "windows-1252",
                ..
            }
        ));
        assert_eq!(source.table.rows[0][0], "René");
    }

    #[test]
    fn decodes_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Year,Course\n2nd,ME\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let source = parse_bytes(Path::new("a.csv"), &bytes).unwrap();
        assert_eq!(source.format.to_string(), "UTF-16LE, ',' separated");
        assert_eq!(source.table.rows, vec![vec!["2nd", "ME"]]);
    }

    #[test]
    fn skips_blank_lines_and_pads_short_rows() {
        let bytes = b"Year,Course,Remarks\n1st,CE\n,,\n2nd,ME,ok\n";
        let table = parse_bytes(Path::new("a.csv"), bytes).unwrap().table;
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["1st", "CE", ""]);
    }

    #[test]
    fn empty_file_is_data_unavailable() {
        let err = parse_bytes(Path::new("a.csv"), b"").unwrap_err();
        assert!(matches!(err, AdmissionError::DataUnavailable { .. }));
    }

    #[test]
    fn blank_header_is_parse_failure() {
        let err = parse_bytes(Path::new("a.csv"), b"\n\n").unwrap_err();
        match err {
            AdmissionError::ParseFailure { tried, .. } => {
                assert_eq!(tried, vec!["UTF-8", "windows-1252"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reads_first_worksheet_of_a_workbook() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("register.xlsx");

        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let sheet = workbook.add_worksheet();
        sheet.set_name("Register").unwrap();
        for (col, header) in ["Sl No", "Student Name", "Year", "Course", "Date", "In/Out"]
            .into_iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, header).unwrap();
        }
        sheet.write_number(1, 0, 1).unwrap();
        sheet.write_string(1, 1, "Asha Rao").unwrap();
        sheet.write_string(1, 2, "1st").unwrap();
        sheet.write_string(1, 3, "CE").unwrap();
        let admitted = ExcelDateTime::from_ymd(2024, 1, 15).unwrap();
        sheet
            .write_datetime_with_format(1, 4, &admitted, &date_format)
            .unwrap();
        sheet.write_string(1, 5, "IN").unwrap();
        workbook.save(&path).unwrap();

        let source = AdmissionLoader::new(&["xlsx".to_string()])
            .load_from_directory(dir.path())
            .unwrap();
        assert_eq!(
            source.format,
            SourceFormat::Workbook {
                sheet: "Register".to_string()
            }
        );
        assert_eq!(
            source.table.headers,
            vec!["Sl No", "Student Name", "Year", "Course", "Date", "In/Out"]
        );
        let row = &source.table.rows[0];
        assert_eq!(row[0], "1");
        assert_eq!(row[1], "Asha Rao");
        assert_eq!(
            parse_date(&row[4]),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn corrupt_workbook_is_parse_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("register.xlsx");
        fs::write(&path, "Year,Course\n1st,CE\n").unwrap();
        let err = loader_with_workbooks().load_file(&path).unwrap_err();
        assert!(matches!(err, AdmissionError::ParseFailure { .. }));
    }

    #[test]
    fn discovers_first_matching_file_by_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.md"), "x").unwrap();
        fs::write(dir.path().join("b_register.csv"), "Year\n").unwrap();
        fs::write(dir.path().join("a_register.TSV"), "Year\n").unwrap();
        fs::write(dir.path().join("~$a_lock.csv"), "Year\n").unwrap();
        let found = loader().discover_source(dir.path()).unwrap();
        assert_eq!(found.file_name().unwrap(), "a_register.TSV");
    }

    #[test]
    fn empty_directory_is_data_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = loader().discover_source(dir.path()).unwrap_err();
        assert!(matches!(err, AdmissionError::DataUnavailable { .. }));
    }

    #[test]
    fn missing_directory_is_data_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = loader()
            .discover_source(&dir.path().join("absent"))
            .unwrap_err();
        assert!(matches!(err, AdmissionError::DataUnavailable { .. }));
    }
}
