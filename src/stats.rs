//! Grouped admission counts with per-group subtotals and a grand total.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::{CanonicalField, CanonicalRecord, CanonicalTable};

pub const SUBTOTAL_SUFFIX: &str = " - Subtotal";
pub const GRAND_TOTAL_LABEL: &str = "GRAND TOTAL";
/// Group label for records whose admission date could not be parsed.
pub const UNDATED_LABEL: &str = "Undated";
/// Used instead of the short display when two dates share a short label, e.g. 1924 and 2024.
pub const FULL_DATE_FORMAT: &str = "%d-%b-%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Data,
    Subtotal,
    GrandTotal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    pub kind: RowKind,
    pub group: String,
    pub item: String,
    pub count: usize,
}

/// Ordered statistics table: each group's data rows, then its subtotal; one grand total last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedStats {
    pub columns: [&'static str; 3],
    pub rows: Vec<StatsRow>,
}

impl GroupedStats {
    pub fn data_rows(&self) -> impl Iterator<Item = &StatsRow> {
        self.rows.iter().filter(|row| row.kind == RowKind::Data)
    }

    pub fn subtotal_rows(&self) -> impl Iterator<Item = &StatsRow> {
        self.rows.iter().filter(|row| row.kind == RowKind::Subtotal)
    }

    pub fn grand_total(&self) -> usize {
        self.rows
            .iter()
            .rev()
            .find(|row| row.kind == RowKind::GrandTotal)
            .map(|row| row.count)
            .unwrap_or(0)
    }
}

/// Outer key of the date view: real dates in calendar order, then the undated bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DateKey {
    Dated(NaiveDate),
    Undated,
}

/// Counts records per `(outer, inner)` pair and decorates the result with subtotals.
///
/// `outer` yields a sort key and a display label. Groups are emitted in sort-key
/// order; within a group, inner values are emitted in ascending order.
/// An empty input produces a single zero grand-total row.
pub fn aggregate<K, F, G>(
    records: &[CanonicalRecord],
    columns: [&'static str; 3],
    outer: F,
    inner: G,
) -> GroupedStats
where
    K: Ord,
    F: Fn(&CanonicalRecord) -> (K, String),
    G: Fn(&CanonicalRecord) -> String,
{
    let mut groups: BTreeMap<K, (String, BTreeMap<String, usize>)> = BTreeMap::new();
    for record in records {
        let (key, label) = outer(record);
        let (_, counts) = groups
            .entry(key)
            .or_insert_with(|| (label, BTreeMap::new()));
        *counts.entry(inner(record)).or_insert(0) += 1;
    }

    let mut rows = Vec::new();
    let mut grand_total = 0;
    for (_, (label, counts)) in groups {
        let subtotal: usize = counts.values().sum();
        for (item, count) in counts {
            rows.push(StatsRow {
                kind: RowKind::Data,
                group: label.clone(),
                item,
                count,
            });
        }
        rows.push(StatsRow {
            kind: RowKind::Subtotal,
            group: format!("{label}{SUBTOTAL_SUFFIX}"),
            item: String::new(),
            count: subtotal,
        });
        grand_total += subtotal;
    }
    rows.push(StatsRow {
        kind: RowKind::GrandTotal,
        group: GRAND_TOTAL_LABEL.to_string(),
        item: String::new(),
        count: grand_total,
    });

    GroupedStats { columns, rows }
}

/// Students per year of study and course.
pub fn year_course_stats(table: &CanonicalTable) -> GroupedStats {
    aggregate(
        &table.records,
        ["Year", "Course", "Total Students"],
        |r| (r.year.clone(), r.year.clone()),
        |r| r.course.clone(),
    )
}

/// Admissions per admission date and course, in calendar order.
///
/// Returns `None` when the register has no date column.
pub fn date_course_stats(table: &CanonicalTable) -> Option<GroupedStats> {
    if !table.has_field(CanonicalField::Date) {
        return None;
    }
    let ambiguous = ambiguous_date_labels(&table.records);
    Some(aggregate(
        &table.records,
        ["Date", "Course", "Admissions"],
        |r| match (r.date, &r.date_display) {
            (Some(date), Some(display)) if ambiguous.contains(display.as_str()) => (
                DateKey::Dated(date),
                date.format(FULL_DATE_FORMAT).to_string(),
            ),
            (Some(date), Some(display)) => (DateKey::Dated(date), display.clone()),
            _ => (DateKey::Undated, UNDATED_LABEL.to_string()),
        },
        |r| r.course.clone(),
    ))
}

/// Display labels that more than one distinct date renders to.
fn ambiguous_date_labels(records: &[CanonicalRecord]) -> BTreeSet<&str> {
    let mut seen: BTreeMap<&str, NaiveDate> = BTreeMap::new();
    let mut ambiguous = BTreeSet::new();
    for record in records {
        if let (Some(date), Some(display)) = (record.date, record.date_display.as_deref()) {
            if *seen.entry(display).or_insert(date) != date {
                ambiguous.insert(display);
            }
        }
    }
    ambiguous
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::format_date;

    fn record(year: &str, course: &str, date: Option<(i32, u32, u32)>) -> CanonicalRecord {
        let date = date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        CanonicalRecord {
            year: year.to_string(),
            course: course.to_string(),
            status: "IN".to_string(),
            date,
            date_display: date.map(format_date),
            ..Default::default()
        }
    }

    fn table(records: Vec<CanonicalRecord>) -> CanonicalTable {
        let mut fields: std::collections::BTreeSet<_> =
            CanonicalField::REQUIRED.into_iter().collect();
        fields.insert(CanonicalField::Date);
        CanonicalTable { records, fields }
    }

    fn shape(stats: &GroupedStats) -> Vec<(RowKind, &str, &str, usize)> {
        stats
            .rows
            .iter()
            .map(|r| (r.kind, r.group.as_str(), r.item.as_str(), r.count))
            .collect()
    }

    #[test]
    fn year_course_with_subtotals() {
        let stats = year_course_stats(&table(vec![
            record("1st", "CE", None),
            record("2nd", "ME", None),
        ]));
        assert_eq!(
            shape(&stats),
            vec![
                (RowKind::Data, "1st", "CE", 1),
                (RowKind::Subtotal, "1st - Subtotal", "", 1),
                (RowKind::Data, "2nd", "ME", 1),
                (RowKind::Subtotal, "2nd - Subtotal", "", 1),
                (RowKind::GrandTotal, "GRAND TOTAL", "", 2),
            ]
        );
    }

    #[test]
    fn totals_agree_with_record_count() {
        let records = vec![
            record("2nd", "CS", None),
            record("1st", "CE", None),
            record("1st", "CS", None),
            record("1st", "CE", None),
            record("3rd", "ME", None),
            record("2nd", "CS", None),
            record("", "CE", None),
        ];
        let stats = year_course_stats(&table(records.clone()));

        let data_sum: usize = stats.data_rows().map(|r| r.count).sum();
        let subtotal_sum: usize = stats.subtotal_rows().map(|r| r.count).sum();
        assert_eq!(data_sum, records.len());
        assert_eq!(subtotal_sum, records.len());
        assert_eq!(stats.grand_total(), records.len());

        // Each subtotal equals the rows of its own group.
        let mut running = 0;
        for row in &stats.rows {
            match row.kind {
                RowKind::Data => running += row.count,
                RowKind::Subtotal => {
                    assert_eq!(row.count, running, "{}", row.group);
                    running = 0;
                }
                RowKind::GrandTotal => {}
            }
        }
    }

    #[test]
    fn groups_and_courses_are_sorted() {
        let stats = year_course_stats(&table(vec![
            record("2nd", "ME", None),
            record("1st", "CS", None),
            record("1st", "CE", None),
        ]));
        let order: Vec<(&str, &str)> = stats
            .data_rows()
            .map(|r| (r.group.as_str(), r.item.as_str()))
            .collect();
        assert_eq!(order, vec![("1st", "CE"), ("1st", "CS"), ("2nd", "ME")]);
    }

    #[test]
    fn dates_sort_by_calendar_not_display_text() {
        let stats = date_course_stats(&table(vec![
            record("1st", "CE", Some((2024, 2, 1))),
            record("1st", "CE", Some((2024, 1, 15))),
            record("1st", "ME", Some((2023, 12, 31))),
        ]))
        .unwrap();
        let groups: Vec<&str> = stats.data_rows().map(|r| r.group.as_str()).collect();
        assert_eq!(groups, vec!["31-Dec-23", "15-Jan-24", "01-Feb-24"]);
    }

    #[test]
    fn undated_records_form_a_final_group() {
        let stats = date_course_stats(&table(vec![
            record("1st", "CE", None),
            record("1st", "CE", Some((2024, 1, 15))),
        ]))
        .unwrap();
        assert_eq!(
            shape(&stats),
            vec![
                (RowKind::Data, "15-Jan-24", "CE", 1),
                (RowKind::Subtotal, "15-Jan-24 - Subtotal", "", 1),
                (RowKind::Data, "Undated", "CE", 1),
                (RowKind::Subtotal, "Undated - Subtotal", "", 1),
                (RowKind::GrandTotal, "GRAND TOTAL", "", 2),
            ]
        );
    }

    #[test]
    fn dates_a_century_apart_get_distinct_labels() {
        let stats = date_course_stats(&table(vec![
            record("1st", "CE", Some((2024, 1, 15))),
            record("1st", "CE", Some((1924, 1, 15))),
            record("1st", "ME", Some((2024, 2, 1))),
        ]))
        .unwrap();
        let groups: Vec<&str> = stats.subtotal_rows().map(|r| r.group.as_str()).collect();
        assert_eq!(
            groups,
            vec![
                "15-Jan-1924 - Subtotal",
                "15-Jan-2024 - Subtotal",
                "01-Feb-24 - Subtotal"
            ]
        );
    }

    #[test]
    fn date_view_needs_a_date_column() {
        let mut t = table(vec![record("1st", "CE", None)]);
        t.fields.remove(&CanonicalField::Date);
        assert!(date_course_stats(&t).is_none());
    }

    #[test]
    fn empty_table_yields_zero_grand_total() {
        let stats = year_course_stats(&table(Vec::new()));
        assert_eq!(shape(&stats), vec![(RowKind::GrandTotal, "GRAND TOTAL", "", 0)]);
    }
}
