use std::path::Path;

use chrono::{Local, NaiveDate};
use maintlog::{EquipmentCode, Observation, department_of};
use tracing::instrument;

use super::{
    HistoryArgs, ImportanceArg, OutputFormat, confirm, open_logbook, parse_code, parse_date,
    report,
    terminal::{self, Colorize},
};

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Record an observation
    Add(Add),

    /// List observations, newest first
    List(List),

    /// Delete every observation of an equipment on a date
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
    /// The equipment observed
    #[arg(value_parser = parse_code)]
    equipment: EquipmentCode,

    /// Date of the observation (default: today)
    #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// What was observed
    #[arg(long, short)]
    observation: String,

    /// What should be done about it
    #[arg(long, default_value = "")]
    recommendation: String,

    /// Work performed and notes
    #[arg(long, default_value = "")]
    notes: String,

    /// Name of the analyst
    #[arg(long, short)]
    analyst: String,

    /// Severity classification
    #[arg(long, value_enum)]
    importance: Option<ImportanceArg>,
}

impl Add {
    /// Builds the record, rejecting blank required text.
    fn observation(self) -> anyhow::Result<Observation> {
        let observation = self.observation.trim();
        let analyst = self.analyst.trim();
        if observation.is_empty() {
            anyhow::bail!("the observation text must not be empty");
        }
        if analyst.is_empty() {
            anyhow::bail!("the analyst name must not be empty");
        }
        Ok(Observation {
            equipment: self.equipment,
            date: self.date.unwrap_or_else(|| Local::now().date_naive()),
            observation: observation.to_string(),
            recommendation: self.recommendation.trim().to_string(),
            work_notes: self.notes.trim().to_string(),
            analyst: analyst.to_string(),
            importance: self.importance.map(Into::into),
        })
    }

    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let observation = self.observation()?;
        let mut logbook = open_logbook(root)?;

        if !logbook
            .try_load_equipment()?
            .iter()
            .any(|e| e.code == observation.equipment)
        {
            tracing::warn!("{} is not on the roster", observation.equipment);
        }

        report(logbook.save_observation(&observation))
    }
}

#[derive(Debug, clap::Parser)]
pub struct List {
    #[command(flatten)]
    filter: HistoryArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl List {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let logbook = open_logbook(root)?;
        let roster = logbook.try_load_equipment()?;
        let observations = logbook.try_load_observations()?;

        let mut selected = self.filter.filter().apply(&observations, &roster);
        selected.sort_by(|a, b| b.date.cmp(&a.date));

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&selected)?),
            OutputFormat::Table => {
                if selected.is_empty() {
                    println!("{}", "No observations".dim());
                }
                for observation in selected {
                    let department = department_of(&roster, &observation.equipment).unwrap_or("-");
                    render(observation, department);
                }
            }
        }
        Ok(())
    }
}

fn render(observation: &Observation, department: &str) {
    let importance = observation
        .importance
        .map(|level| format!(" {}", terminal::importance_tag(level)))
        .unwrap_or_default();
    println!(
        "{}  {} ({department}){importance}",
        observation.date.to_string().info(),
        observation.equipment
    );

    let width = terminal::body_width(18);
    for (label, text) in [
        ("Observation", &observation.observation),
        ("Recommendation", &observation.recommendation),
        ("Work & notes", &observation.work_notes),
        ("Analyst", &observation.analyst),
    ] {
        if text.is_empty() {
            continue;
        }
        for (i, line) in text.lines().enumerate() {
            let label = if i == 0 { label } else { "" };
            println!("  {:<15} {}", label.dim(), terminal::truncate(line, width));
        }
    }
    println!();
}

#[derive(Debug, clap::Parser)]
pub struct Delete {
    /// The equipment code
    #[arg(value_parser = parse_code)]
    equipment: EquipmentCode,

    /// Date of the observation(s) to delete
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
        let prompt = format!(
            "Delete every observation of {} on {}?",
            self.equipment, self.date
        );
        if !confirm(&prompt, self.yes)? {
            println!("Cancelled");
            return Ok(());
        }
        report(logbook.delete_observation(&self.equipment, self.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(observation: &str, analyst: &str) -> Add {
        Add {
            equipment: parse_code("EQ1").unwrap(),
            date: Some(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()),
            observation: observation.to_string(),
            recommendation: " replace seal ".to_string(),
            notes: String::new(),
            analyst: analyst.to_string(),
            importance: Some(ImportanceArg::High),
        }
    }

    #[test]
    fn blank_required_text_is_rejected() {
        assert!(add("  ", "J.Doe").observation().is_err());
        assert!(add("leak", "").observation().is_err());
    }

    #[test]
    fn text_is_trimmed_before_saving() {
        let observation = add(" leak ", "J.Doe").observation().unwrap();
        assert_eq!(observation.observation, "leak");
        assert_eq!(observation.recommendation, "replace seal");
        assert_eq!(observation.importance, Some(maintlog::Importance::High));
    }
}
