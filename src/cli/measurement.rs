use std::path::Path;

use chrono::{Local, NaiveDate};
use maintlog::{EquipmentCode, Measurement, MeasurementPoint, Metric, storage::format_reading};
use tracing::instrument;

use super::{
    HistoryArgs, OutputFormat, PointArg, confirm, open_logbook, parse_code, parse_date, report,
    terminal::Colorize,
};

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Record a reading
    Add(Add),

    /// List readings by equipment, point and date
    List(List),

    /// Delete every reading of an equipment at a point on a date
    Delete(Delete),
}

impl Command {
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::Add(command) => command.run(root),
            Self::List(command) => command.run(root),
            Self::Delete(command) => command.run(root),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct Add {
    /// The equipment measured
    #[arg(value_parser = parse_code)]
    equipment: EquipmentCode,

    /// Where the probe was placed
    #[arg(value_enum)]
    point: PointArg,

    /// Date of the reading (default: today)
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Rotational speed in RPM
    #[arg(long)]
    rpm: f64,

    /// Time-waveform RMS acceleration in g
    #[arg(long)]
    rms: f64,

    /// Crest factor
    #[arg(long)]
    crest: f64,

    /// Time-waveform peak-to-peak acceleration in g
    #[arg(long)]
    peak_to_peak: f64,
}

impl Add {
    fn measurement(self) -> anyhow::Result<Measurement> {
        let readings = [self.rpm, self.rms, self.crest, self.peak_to_peak];
        if readings.iter().any(|value| !value.is_finite()) {
            anyhow::bail!("readings must be finite numbers");
        }
        Ok(Measurement {
            equipment: self.equipment,
            point: self.point.into(),
            date: self.date.unwrap_or_else(|| Local::now().date_naive()),
            speed_rpm: self.rpm,
            twf_rms_g: self.rms,
            crest_factor: self.crest,
            twf_peak_to_peak_g: self.peak_to_peak,
        })
    }

    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let measurement = self.measurement()?;
        let mut logbook = open_logbook(root)?;
        report(logbook.save_measurement(&measurement))
    }
}

#[derive(Debug, clap::Parser)]
pub struct List {
    #[command(flatten)]
    filter: HistoryArgs,

    /// Keep these probe locations (comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    point: Vec<PointArg>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl List {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let logbook = open_logbook(root)?;
        let roster = logbook.try_load_equipment()?;
        let measurements = logbook.try_load_measurements()?;

        let filter = self
            .filter
            .filter()
            .points(self.point.iter().copied().map(MeasurementPoint::from));
        let mut selected = filter.apply(&measurements, &roster);
        selected.sort_by(|a, b| {
            (&a.equipment, a.point, a.date).cmp(&(&b.equipment, b.point, b.date))
        });

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&selected)?),
            OutputFormat::Table => render_table(&selected),
        }
        Ok(())
    }
}

fn render_table(rows: &[&Measurement]) {
    if rows.is_empty() {
        println!("{}", "No measurements".dim());
        return;
    }
    let header = Metric::ALL
        .iter()
        .map(|metric| format!("{:>20}", metric.label()))
        .collect::<String>();
    println!(
        "{}",
        format!("{:<12} {:<10} {:<45}{header}", "Equipment", "Date", "Point").info()
    );
    for measurement in rows {
        let readings = Metric::ALL
            .iter()
            .map(|metric| format!("{:>20}", format_reading(measurement.metric(*metric))))
            .collect::<String>();
        println!(
            "{:<12} {:<10} {:<45}{readings}",
            measurement.equipment.as_str(),
            measurement.date,
            measurement.point.label()
        );
    }
}

#[derive(Debug, clap::Parser)]
pub struct Delete {
    /// The equipment code
    #[arg(value_parser = parse_code)]
    equipment: EquipmentCode,

    /// Where the probe was placed
    #[arg(value_enum)]
    point: PointArg,

    /// Date of the reading(s) to delete
    #[arg(value_parser = parse_date)]
    date: NaiveDate,

    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Delete {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut logbook = open_logbook(root)?;
        let point = MeasurementPoint::from(self.point);
        let prompt = format!(
            "Delete every reading of {} at '{point}' on {}?",
            self.equipment, self.date
        );
        if !confirm(&prompt, self.yes)? {
            println!("Cancelled");
            return Ok(());
        }
        report(logbook.delete_measurement(&self.equipment, point, self.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_readings_are_rejected() {
        let add = Add {
            equipment: parse_code("EQ1").unwrap(),
            point: PointArg::MotorDe,
            date: None,
            rpm: f64::NAN,
            rms: 0.1,
            crest: 3.0,
            peak_to_peak: 1.0,
        };
        assert!(add.measurement().is_err());
    }

    #[test]
    fn point_argument_maps_to_probe_location() {
        let add = Add {
            equipment: parse_code("EQ1").unwrap(),
            point: PointArg::GearboxOut,
            date: Some(NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()),
            rpm: 1480.0,
            rms: 0.1,
            crest: 3.0,
            peak_to_peak: 1.0,
        };
        let measurement = add.measurement().unwrap();
        assert_eq!(measurement.point, MeasurementPoint::GearboxOutput);
    }
}
