//! Terminal rendering of the statistics tables, charts and roster.
//!
//! Row styling is driven by [`RowKind`] and [`RosterLineKind`], never by label text.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::TableSummary;
use crate::roster::{RosterLineKind, RosterView};
use crate::stats::{GroupedStats, RowKind};

const BAR: char = '█';

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

pub fn stats_table(stats: &GroupedStats) -> Table {
    let mut table = Table::new();
    apply_table_style(&mut table);
    table.set_header(stats.columns.iter().map(|c| header_cell(c)).collect::<Vec<_>>());

    for row in &stats.rows {
        let cells = [row.group.as_str(), row.item.as_str()]
            .into_iter()
            .map(Cell::new)
            .chain(std::iter::once(
                Cell::new(row.count).set_alignment(CellAlignment::Right),
            ));
        let cells: Vec<Cell> = match row.kind {
            RowKind::Data => cells.collect(),
            RowKind::Subtotal => cells.map(|c| c.add_attribute(Attribute::Bold)).collect(),
            RowKind::GrandTotal => cells
                .map(|c| c.add_attribute(Attribute::Bold).fg(Color::Cyan))
                .collect(),
        };
        table.add_row(cells);
    }
    table
}

pub fn roster_table(view: &RosterView) -> Table {
    let mut table = Table::new();
    apply_table_style(&mut table);
    table.set_header(view.headers().into_iter().map(header_cell).collect::<Vec<_>>());

    for line in view.lines() {
        let cells: Vec<Cell> = match line.kind {
            RosterLineKind::Student => line.values.iter().map(Cell::new).collect(),
            RosterLineKind::Summary => line
                .values
                .iter()
                .map(|v| Cell::new(v).add_attribute(Attribute::Bold).fg(Color::Cyan))
                .collect(),
        };
        table.add_row(cells);
    }
    table
}

pub fn summary_cards(summary: &TableSummary) -> String {
    format!(
        "Total Students: {}   Total Courses: {}   Academic Years: {}",
        summary.total_students, summary.total_courses, summary.total_years
    )
}

/// Horizontal bar per data row, scaled so the largest count spans `width` bars.
pub fn bar_chart(stats: &GroupedStats, width: usize) -> String {
    let rows: Vec<(String, usize)> = stats
        .data_rows()
        .map(|row| (format!("{} {}", row.group, row.item), row.count))
        .collect();
    let Some(max) = rows.iter().map(|(_, count)| *count).max() else {
        return String::new();
    };
    let label_width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (label, count) in rows {
        let mut bars = if max == 0 { 0 } else { count * width / max };
        if count > 0 && bars == 0 {
            bars = 1;
        }
        out.push_str(&format!(
            "{label:<label_width$} │{} {count}\n",
            BAR.to_string().repeat(bars)
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalField, CanonicalRecord, CanonicalTable};
    use crate::roster::{build_roster, FilterSelection};
    use crate::stats::year_course_stats;

    fn table() -> CanonicalTable {
        let record = |name: &str, year: &str, course: &str| CanonicalRecord {
            student_name: name.to_string(),
            year: year.to_string(),
            course: course.to_string(),
            status: "IN".to_string(),
            ..Default::default()
        };
        CanonicalTable {
            records: vec![
                record("Asha", "1st", "CE"),
                record("Bilal", "1st", "CE"),
                record("Chitra", "1st", "CE"),
                record("Bo", "1st", "CE"),
                record("Dev", "2nd", "ME"),
            ],
            fields: CanonicalField::REQUIRED.into_iter().collect(),
        }
    }

    #[test]
    fn bars_scale_to_the_largest_count() {
        let chart = bar_chart(&year_course_stats(&table()), 8);
        let lines: Vec<&str> = chart.lines().collect();
        assert_eq!(lines, vec!["1st CE │████████ 4", "2nd ME │██ 1"]);
    }

    #[test]
    fn stats_table_lists_every_row() {
        let rendered = stats_table(&year_course_stats(&table())).to_string();
        assert!(rendered.contains("1st - Subtotal"));
        assert!(rendered.contains("GRAND TOTAL"));
        assert!(rendered.contains("Total Students"));
    }

    #[test]
    fn roster_table_includes_total_line() {
        let t = table();
        let view = build_roster(&t, &FilterSelection::all(&t)).unwrap();
        let rendered = roster_table(&view).to_string();
        assert!(rendered.contains("TOTAL STUDENTS: 5"));
        assert!(rendered.contains("Chitra"));
    }

    #[test]
    fn summary_cards_show_distinct_counts() {
        assert_eq!(
            summary_cards(&table().summary()),
            "Total Students: 5   Total Courses: 2   Academic Years: 2"
        );
    }
}
