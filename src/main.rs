use std::path::{Path, PathBuf};
use std::process::ExitCode;

use admission_analytics::logging::init_logging;
use admission_analytics::models::CanonicalTable;
use admission_analytics::render::{bar_chart, roster_table, stats_table, summary_cards};
use admission_analytics::roster::export_csv;
use admission_analytics::{
    build_roster, date_course_stats, load_register, year_course_stats, AdmissionError, Config,
    FilterSelection,
};
use anyhow::Result;
use chrono::Local;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::debug;

const DEFAULT_CONFIG: &str = "config.toml";
const CHART_WIDTH: usize = 40;

fn cli() -> Command {
    Command::new("admission-analytics")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Year, course and date-wise admission reports from an admission register")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .value_parser(value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding the admission register (overrides config)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .value_name("DIR")
                .help("Directory for roster exports (overrides config)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase diagnostic output (-v, -vv, -vvv)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(Command::new("stats").about("Year and course-wise statistics"))
        .subcommand(Command::new("dates").about("Date-wise admissions"))
        .subcommand(
            Command::new("roster")
                .about("Filtered student list")
                .arg(
                    Arg::new("year")
                        .short('y')
                        .long("year")
                        .value_name("YEAR")
                        .help("Year of study to include (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("course")
                        .long("course")
                        .value_name("COURSE")
                        .help("Course to include (repeatable)")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("export")
                        .short('e')
                        .long("export")
                        .help("Write the list to a timestamped CSV in the output directory")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("report").about("All three reports (default)"))
}

fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    init_logging(matches.get_count("verbose"))?;

    let config_file = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = load_or_create_config(&config_file)?;
    debug!(config = %config_file.display(), ?config, "configuration resolved");

    let data_dir = matches
        .get_one::<PathBuf>("data-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(config.data_directory.as_deref().unwrap_or("data-source")));
    let output_dir = matches
        .get_one::<PathBuf>("output-dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(config.output_directory.as_deref().unwrap_or("output")));

    println!("📂 Reading admission register from: {}", data_dir.display());
    let table = match load_register(&config, &data_dir) {
        Ok((source, normalized)) => {
            println!(
                "📄 Loaded {} rows from {:?} ({})",
                source.table.rows.len(),
                source.path.file_name().unwrap_or_default(),
                source.format
            );
            println!(
                "   ✅ {} admitted and paid ({} not admitted, {} with fee due)",
                normalized.table.len(),
                normalized.excluded.inactive,
                normalized.excluded.unpaid
            );
            normalized.table
        }
        Err(e) => {
            report_load_error(&e, &data_dir);
            return Ok(ExitCode::FAILURE);
        }
    };

    match matches.subcommand() {
        Some(("stats", _)) => print_year_course(&table),
        Some(("dates", _)) => print_date_wise(&table),
        Some(("roster", sub)) => return run_roster(&table, &config, sub, &output_dir),
        _ => {
            print_year_course(&table);
            print_date_wise(&table);
            let selection = FilterSelection::from_default(config.default_selection, &table);
            return generate_roster(&table, &selection, false, &output_dir);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_or_create_config(config_file: &Path) -> Result<Config> {
    if config_file.exists() {
        println!("📋 Loading configuration from: {}", config_file.display());
        Config::load_from_file(config_file)
    } else {
        println!("📝 Creating default configuration file: {}", config_file.display());
        let config = Config::default();
        config.save_to_file(config_file)?;
        Ok(config)
    }
}

fn report_load_error(error: &AdmissionError, data_dir: &Path) {
    println!("❌ {error}");
    match error {
        AdmissionError::DataUnavailable { .. } => {
            println!("   Place the admission register export in {}", data_dir.display());
        }
        AdmissionError::SchemaMismatch { .. } => {
            println!("   Expected columns include: Student Name, Year, Course, In/Out");
        }
        _ => {}
    }
}

fn print_year_course(table: &CanonicalTable) {
    println!("\n📈 YEAR & COURSE STATISTICS");
    println!("===========================\n");
    println!("{}\n", summary_cards(&table.summary()));

    let stats = year_course_stats(table);
    println!("📋 Statistics Table");
    println!("{}", stats_table(&stats));

    if !table.is_empty() {
        println!("\n📊 Course-wise Distribution");
        print!("{}", bar_chart(&stats, CHART_WIDTH));
    }
}

fn print_date_wise(table: &CanonicalTable) {
    println!("\n📅 DATE-WISE ADMISSIONS");
    println!("=======================\n");

    let Some(stats) = date_course_stats(table) else {
        println!("⚠️  The register has no Date column; date-wise report skipped.");
        return;
    };
    println!("📋 Date-wise Admission Table");
    println!("{}", stats_table(&stats));

    if !table.is_empty() {
        println!("\n📊 Daily Admission Trends");
        print!("{}", bar_chart(&stats, CHART_WIDTH));
    }
}

fn run_roster(
    table: &CanonicalTable,
    config: &Config,
    args: &ArgMatches,
    output_dir: &Path,
) -> Result<ExitCode> {
    let mut selection = FilterSelection::from_default(config.default_selection, table);

    if let Some(years) = args.get_many::<String>("year") {
        let years: Vec<&String> = years.collect();
        warn_unknown("Year", &years, &table.available_years());
        selection.set_years(years.into_iter().cloned());
    }
    if let Some(courses) = args.get_many::<String>("course") {
        let courses: Vec<&String> = courses.collect();
        warn_unknown("Course", &courses, &table.available_courses());
        selection.set_courses(courses.into_iter().cloned());
    }

    generate_roster(table, &selection, args.get_flag("export"), output_dir)
}

fn warn_unknown(label: &str, requested: &[&String], available: &std::collections::BTreeSet<String>) {
    for value in requested {
        if !available.contains(*value) {
            println!("⚠️  {label} '{value}' does not appear in the register");
        }
    }
}

fn generate_roster(
    table: &CanonicalTable,
    selection: &FilterSelection,
    export: bool,
    output_dir: &Path,
) -> Result<ExitCode> {
    println!("\n👥 STUDENT LIST");
    println!("===============\n");
    println!("🎓 Years: {}", join_or_none(selection.years()));
    println!("📚 Courses: {}", join_or_none(selection.courses()));

    let view = match build_roster(table, selection) {
        Ok(view) => view,
        Err(e @ AdmissionError::NoFilterSelected { .. }) => {
            println!("❌ {e}");
            return Ok(ExitCode::from(2));
        }
        Err(e) => return Err(e.into()),
    };

    if view.is_empty() {
        println!("⚠️  No students found with the selected filters.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("📋 Student List");
    println!("{}", roster_table(&view));

    if export {
        match export_csv(&view, output_dir, &Local::now()) {
            Ok(path) => println!("📥 Exported {} students to {}", view.total(), path.display()),
            Err(e) => {
                println!("❌ {e}");
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn join_or_none(values: &std::collections::BTreeSet<String>) -> String {
    if values.is_empty() {
        "(none selected)".to_string()
    } else {
        values.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
