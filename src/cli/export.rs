use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use chrono::Local;
use maintlog::{
    HistoryFilter, MeasurementPoint,
    export::{self, equipment_file_name, measurements_file_name, observations_file_name},
    in_departments,
};
use tracing::instrument;

use super::{HistoryArgs, PointArg, open_logbook, terminal::Colorize};

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Export observations, newest first, as an `.xlsx` report
    Observations(History),

    /// Export the roster as an `.xlsx` workbook
    Equipment(Equipment),

    /// Export measurements with one charted sheet per equipment
    Measurements(Measurements),
}

impl Command {
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Observations(command) => command.run(root),
            Self::Equipment(command) => command.run(root),
            Self::Measurements(command) => command.run(root),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct History {
    #[command(flatten)]
    filter: HistoryArgs,

    /// Directory the workbook is written to (default: the root)
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

impl History {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let logbook = open_logbook(root)?;
        let roster = logbook.try_load_equipment()?;
        let observations = logbook.try_load_observations()?;

        let selected = self.filter.filter().apply(&observations, &roster);
        let bytes = export::export_observations(selected, &roster)?;

        let name = observations_file_name(Local::now().naive_local());
        write(self.out.as_deref().unwrap_or(root), &name, &bytes)
    }
}

#[derive(Debug, clap::Parser)]
pub struct Equipment {
    /// Only these departments (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "DEPT")]
    department: Vec<String>,

    /// Directory the workbook is written to (default: the root)
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

impl Equipment {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let logbook = open_logbook(root)?;
        let roster = logbook.try_load_equipment()?;

        let selected: BTreeSet<String> =
            self.department.iter().map(|d| d.trim().to_string()).collect();
        let bytes = export::export_equipment(in_departments(&roster, &selected))?;

        let name = equipment_file_name(Local::now().date_naive(), &selected);
        write(self.out.as_deref().unwrap_or(root), &name, &bytes)
    }
}

#[derive(Debug, clap::Parser)]
pub struct Measurements {
    #[command(flatten)]
    filter: HistoryArgs,

    /// Keep these probe locations (comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    point: Vec<PointArg>,

    /// Directory the workbook is written to (default: the root)
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,
}

impl Measurements {
    fn filter(&self) -> HistoryFilter {
        self.filter
            .filter()
            .points(self.point.iter().copied().map(MeasurementPoint::from))
    }

    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let logbook = open_logbook(root)?;
        let roster = logbook.try_load_equipment()?;
        let measurements = logbook.try_load_measurements()?;

        let selected = self.filter().apply(&measurements, &roster);
        let bytes = export::export_measurements(selected, &roster)?;

        let name = measurements_file_name(Local::now().naive_local());
        write(self.out.as_deref().unwrap_or(root), &name, &bytes)
    }
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, bytes)?;
    tracing::info!("wrote {} bytes", bytes.len());
    println!("{}", format!("✅ Exported {}", path.display()).success());
    Ok(())
}
