use std::path::{Path, PathBuf};

mod equipment;
mod export;
mod init;
mod measurement;
mod observation;
mod terminal;

use chrono::NaiveDate;
use clap::{ArgAction, ValueEnum};
use maintlog::{
    Config, DateRange, EquipmentCode, HistoryFilter, Importance, Logbook, MeasurementPoint,
    Outcome,
    storage::{self, Backend},
};
use tracing::instrument;

/// Parse an equipment code, trimming surrounding whitespace.
fn parse_code(s: &str) -> Result<EquipmentCode, String> {
    EquipmentCode::new(s).map_err(|e| e.to_string())
}

/// Parse a `YYYY-MM-DD` date.
fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected a date as YYYY-MM-DD: {e}"))
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The workspace root holding `maintlog.toml`
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);
        self.command.run(&self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Create the configuration and data stores, seeding an example roster
    Init(init::Command),

    /// Manage the equipment roster
    #[command(subcommand)]
    Equipment(equipment::Command),

    /// Record, browse and delete observations
    #[command(subcommand)]
    Observation(observation::Command),

    /// Record, browse and delete measurements
    #[command(subcommand)]
    Measurement(measurement::Command),

    /// Write spreadsheet reports
    #[command(subcommand)]
    Export(export::Command),
}

impl Command {
    fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Init(command) => command.run(root),
            Self::Equipment(command) => command.run(root),
            Self::Observation(command) => command.run(root),
            Self::Measurement(command) => command.run(root),
            Self::Export(command) => command.run(root),
        }
    }
}

/// Opens the log configured for `root`, preparing its stores.
#[instrument]
fn open_logbook(root: &Path) -> anyhow::Result<Logbook<Box<dyn Backend>>> {
    let config = Config::load_or_default(root)?;
    let mut logbook = Logbook::new(storage::connect(&config, root)?);
    logbook.initialise()?;
    Ok(logbook)
}

/// Prints a successful outcome, or turns a failed one into an error.
fn report(outcome: Outcome) -> anyhow::Result<()> {
    use terminal::Colorize;

    if outcome.success {
        println!("{}", format!("✅ {}", outcome.message).success());
        Ok(())
    } else {
        anyhow::bail!(outcome.message)
    }
}

/// Asks before a destructive change unless `--yes` was given.
fn confirm(prompt: &str, yes: bool) -> anyhow::Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Supported output formats for listings.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Probe locations, as accepted on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PointArg {
    MotorNde,
    MotorDe,
    GearboxIn,
    GearboxOut,
    DrivenDe,
    DrivenNde,
}

impl From<PointArg> for MeasurementPoint {
    fn from(arg: PointArg) -> Self {
        match arg {
            PointArg::MotorNde => Self::MotorNonDriveEnd,
            PointArg::MotorDe => Self::MotorDriveEnd,
            PointArg::GearboxIn => Self::GearboxInput,
            PointArg::GearboxOut => Self::GearboxOutput,
            PointArg::DrivenDe => Self::DrivenDriveEnd,
            PointArg::DrivenNde => Self::DrivenNonDriveEnd,
        }
    }
}

/// Importance levels, as accepted on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ImportanceArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<ImportanceArg> for Importance {
    fn from(arg: ImportanceArg) -> Self {
        match arg {
            ImportanceArg::Low => Self::Low,
            ImportanceArg::Medium => Self::Medium,
            ImportanceArg::High => Self::High,
            ImportanceArg::Critical => Self::Critical,
        }
    }
}

/// Filters shared by history listings and exports.
#[derive(Debug, Default, clap::Args)]
pub struct HistoryArgs {
    /// Keep equipment of these departments (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "DEPT")]
    department: Vec<String>,

    /// Keep these equipment codes (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "CODE", value_parser = parse_code)]
    equipment: Vec<EquipmentCode>,

    /// Keep records on or after this date
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    from: Option<NaiveDate>,

    /// Keep records on or before this date
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    to: Option<NaiveDate>,
}

impl HistoryArgs {
    fn filter(&self) -> HistoryFilter {
        let filter = HistoryFilter::new()
            .departments(self.department.iter().map(|d| d.trim().to_string()))
            .equipment(self.equipment.iter().cloned());
        if self.from.is_none() && self.to.is_none() {
            return filter;
        }
        filter.dates(DateRange::new(
            self.from.unwrap_or(NaiveDate::MIN),
            self.to.unwrap_or(NaiveDate::MAX),
        ))
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use maintlog::Equipment;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "mlog",
            "-vv",
            "measurement",
            "delete",
            "EQ1",
            "gearbox-in",
            "2024-01-10",
            "--yes",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Measurement(_)));
    }

    #[test]
    fn rejects_malformed_dates() {
        assert!(parse_date("10/01/2024").is_err());
        assert_eq!(
            parse_date(" 2024-01-10 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
        );
    }

    #[test]
    fn open_ended_history_range() {
        let args = HistoryArgs {
            from: Some(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()),
            ..HistoryArgs::default()
        };
        let filter = args.filter();
        let range = DateRange::new(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), NaiveDate::MAX);
        assert_eq!(filter, HistoryFilter::new().dates(range));
    }

    #[test]
    fn open_logbook_initialises_default_workspace() {
        let tmp = tempdir().unwrap();

        let logbook = open_logbook(tmp.path()).unwrap();

        let roster: Vec<Equipment> = logbook.load_equipment();
        assert_eq!(roster.len(), 5);
    }

    #[test]
    fn failed_outcome_becomes_error() {
        let error = report(Outcome {
            success: false,
            message: "equipment EQ1 not found".to_string(),
        })
        .unwrap_err();
        assert_eq!(error.to_string(), "equipment EQ1 not found");
    }
}
