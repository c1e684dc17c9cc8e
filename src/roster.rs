//! Filtered, numbered student roster and its CSV export.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tracing::{debug, info};

use crate::error::{AdmissionError, FilterDimension, Result};
use crate::models::{CanonicalField, CanonicalRecord, CanonicalTable, DefaultSelection};

pub const TOTAL_PREFIX: &str = "TOTAL STUDENTS: ";

/// Columns shown in the roster, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterColumn {
    SlNo,
    StudentName,
    FatherName,
    Year,
    Course,
    AdmissionYear,
    Category,
    Date,
}

impl RosterColumn {
    pub const DISPLAY: [RosterColumn; 8] = [
        RosterColumn::SlNo,
        RosterColumn::StudentName,
        RosterColumn::FatherName,
        RosterColumn::Year,
        RosterColumn::Course,
        RosterColumn::AdmissionYear,
        RosterColumn::Category,
        RosterColumn::Date,
    ];

    pub fn header(self) -> &'static str {
        match self {
            RosterColumn::SlNo => "Sl No",
            RosterColumn::StudentName => "Student Name",
            RosterColumn::FatherName => "Father Name",
            RosterColumn::Year => "Year",
            RosterColumn::Course => "Course",
            RosterColumn::AdmissionYear => "Admission Year",
            RosterColumn::Category => "Category",
            RosterColumn::Date => "Date",
        }
    }

    /// Register field the column is drawn from; the serial number is generated.
    fn source(self) -> Option<CanonicalField> {
        match self {
            RosterColumn::SlNo => None,
            RosterColumn::StudentName => Some(CanonicalField::StudentName),
            RosterColumn::FatherName => Some(CanonicalField::FatherName),
            RosterColumn::Year => Some(CanonicalField::Year),
            RosterColumn::Course => Some(CanonicalField::Course),
            RosterColumn::AdmissionYear => Some(CanonicalField::AdmissionYear),
            RosterColumn::Category => Some(CanonicalField::Category),
            RosterColumn::Date => Some(CanonicalField::Date),
        }
    }

    fn value(self, record: &CanonicalRecord, serial: usize) -> String {
        match self {
            RosterColumn::SlNo => format!("{serial:02}"),
            RosterColumn::StudentName => record.student_name.clone(),
            RosterColumn::FatherName => record.father_name.clone(),
            RosterColumn::Year => record.year.clone(),
            RosterColumn::Course => record.course.clone(),
            RosterColumn::AdmissionYear => record.admission_year.clone(),
            RosterColumn::Category => record.category.clone(),
            RosterColumn::Date => record.date_display.clone().unwrap_or_default(),
        }
    }
}

/// The user's year and course choices for one roster session.
///
/// Mutated only through the explicit toggle/reset operations; the roster reads it
/// when a list is generated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    years: BTreeSet<String>,
    courses: BTreeSet<String>,
}

impl FilterSelection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all(table: &CanonicalTable) -> Self {
        Self {
            years: table.available_years(),
            courses: table.available_courses(),
        }
    }

    pub fn from_default(policy: DefaultSelection, table: &CanonicalTable) -> Self {
        match policy {
            DefaultSelection::All => Self::all(table),
            DefaultSelection::Empty => Self::empty(),
        }
    }

    pub fn years(&self) -> &BTreeSet<String> {
        &self.years
    }

    pub fn courses(&self) -> &BTreeSet<String> {
        &self.courses
    }

    pub fn toggle_year(&mut self, year: &str) {
        toggle(&mut self.years, year);
    }

    pub fn toggle_course(&mut self, course: &str) {
        toggle(&mut self.courses, course);
    }

    /// Selects every available year, or clears the years if all were already selected.
    pub fn toggle_all_years(&mut self, table: &CanonicalTable) {
        toggle_all(&mut self.years, table.available_years());
    }

    pub fn toggle_all_courses(&mut self, table: &CanonicalTable) {
        toggle_all(&mut self.courses, table.available_courses());
    }

    /// Replaces the selected years.
    pub fn set_years<I, S>(&mut self, years: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.years = years.into_iter().map(Into::into).collect();
    }

    pub fn set_courses<I, S>(&mut self, courses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.courses = courses.into_iter().map(Into::into).collect();
    }

    pub fn reset(&mut self) {
        self.years.clear();
        self.courses.clear();
    }

    fn matches(&self, record: &CanonicalRecord) -> bool {
        self.years.contains(&record.year) && self.courses.contains(&record.course)
    }
}

fn toggle(set: &mut BTreeSet<String>, value: &str) {
    if !set.remove(value) {
        set.insert(value.to_string());
    }
}

fn toggle_all(set: &mut BTreeSet<String>, available: BTreeSet<String>) {
    if available.is_subset(set) && !available.is_empty() {
        set.clear();
    } else {
        set.extend(available);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterLineKind {
    Student,
    Summary,
}

/// A roster line ready for display or export.
#[derive(Debug, Clone, Copy)]
pub struct RosterLine<'a> {
    pub kind: RosterLineKind,
    pub values: &'a [String],
}

/// Numbered student rows matching a filter selection, plus the trailing total line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterView {
    pub columns: Vec<RosterColumn>,
    pub rows: Vec<Vec<String>>,
    summary: Vec<String>,
}

impl RosterView {
    pub fn total(&self) -> usize {
        self.rows.len()
    }

    /// True when the filters were valid but nothing matched.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.header()).collect()
    }

    pub fn summary(&self) -> &[String] {
        &self.summary
    }

    pub fn lines(&self) -> impl Iterator<Item = RosterLine<'_>> {
        self.rows
            .iter()
            .map(|values| RosterLine {
                kind: RosterLineKind::Student,
                values,
            })
            .chain(std::iter::once(RosterLine {
                kind: RosterLineKind::Summary,
                values: &self.summary,
            }))
    }
}

/// Builds the roster for the records whose year and course are both selected.
///
/// Either dimension being empty is a [`AdmissionError::NoFilterSelected`], unless the
/// table itself has no records: then there is nothing to select and the roster is empty.
pub fn build_roster(table: &CanonicalTable, selection: &FilterSelection) -> Result<RosterView> {
    if table.is_empty() {
        debug!("no admitted records, roster is empty");
    } else if selection.years.is_empty() {
        return Err(AdmissionError::NoFilterSelected {
            dimension: FilterDimension::Year,
        });
    } else if selection.courses.is_empty() {
        return Err(AdmissionError::NoFilterSelected {
            dimension: FilterDimension::Course,
        });
    }

    let columns: Vec<RosterColumn> = RosterColumn::DISPLAY
        .into_iter()
        .filter(|c| c.source().map_or(true, |field| table.has_field(field)))
        .collect();

    let rows: Vec<Vec<String>> = table
        .records
        .iter()
        .filter(|record| selection.matches(record))
        .enumerate()
        .map(|(idx, record)| columns.iter().map(|c| c.value(record, idx + 1)).collect())
        .collect();

    let summary = columns
        .iter()
        .map(|c| match c {
            RosterColumn::StudentName => format!("{TOTAL_PREFIX}{}", rows.len()),
            _ => String::new(),
        })
        .collect();

    Ok(RosterView {
        columns,
        rows,
        summary,
    })
}

/// Writes the header, every student line and the total line as CSV.
pub fn write_csv<W: Write>(view: &RosterView, writer: W) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(view.headers())?;
    for line in view.lines() {
        writer.write_record(line.values)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_file_name<Tz: TimeZone>(generated_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("students_{}.csv", generated_at.format("%Y%m%d_%H%M%S"))
}

/// Writes the roster into `output_dir` under a timestamped name and returns the path.
pub fn export_csv<Tz: TimeZone>(
    view: &RosterView,
    output_dir: &Path,
    generated_at: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz::Offset: std::fmt::Display,
{
    fs::create_dir_all(output_dir).map_err(|e| AdmissionError::Io {
        path: output_dir.to_path_buf(),
        source: e,
    })?;
    let path = output_dir.join(export_file_name(generated_at));
    let file = fs::File::create(&path).map_err(|e| AdmissionError::Io {
        path: path.clone(),
        source: e,
    })?;
    write_csv(view, file).map_err(|e| AdmissionError::Export {
        path: path.clone(),
        source: e,
    })?;
    info!(path = %path.display(), rows = view.total(), "exported roster");
    Ok(path)
}
