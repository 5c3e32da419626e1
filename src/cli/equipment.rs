use std::{collections::BTreeSet, path::Path};

use maintlog::{Equipment, EquipmentCode, departments, in_departments};
use tracing::instrument;

use super::{OutputFormat, confirm, open_logbook, parse_code, report, terminal::Colorize};

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// List the roster, grouped by department
    List(List),

    /// Add a piece of equipment
    Add(Add),

    /// Delete a piece of equipment and all of its history
    Delete(Delete),
}

impl Command {
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        match self {
            Self::List(command) => command.run(root),
            Self::Add(command) => command.run(root),
            Self::Delete(command) => command.run(root),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct List {
    /// Only these departments (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "DEPT")]
    department: Vec<String>,

    /// Only print the department names
    #[arg(long, conflicts_with = "department")]
    departments: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    output: OutputFormat,
}

impl List {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let logbook = open_logbook(root)?;
        let roster = logbook.try_load_equipment()?;

        if self.departments {
            let names = departments(&roster);
            match self.output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
                OutputFormat::Table => names.iter().for_each(|name| println!("{name}")),
            }
            return Ok(());
        }

        let selected: BTreeSet<String> = self.department.iter().map(|d| d.trim().to_string()).collect();
        let mut entries = in_departments(&roster, &selected);
        entries.sort_by(|a, b| a.department.cmp(&b.department).then_with(|| a.code.cmp(&b.code)));

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
            OutputFormat::Table => render_table(&entries),
        }
        Ok(())
    }
}

fn render_table(entries: &[&Equipment]) {
    if entries.is_empty() {
        println!("{}", "No equipment".dim());
        return;
    }
    let groups: BTreeSet<&str> = entries.iter().map(|e| e.department.as_str()).collect();
    for department in groups {
        let heading = if department.is_empty() {
            "(no department)"
        } else {
            department
        };
        println!("{}", heading.info());
        for equipment in entries.iter().filter(|e| e.department == department) {
            println!("  {}", equipment.code);
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct Add {
    /// The equipment code
    code: String,

    /// The department it belongs to
    department: String,
}

impl Add {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut logbook = open_logbook(root)?;
        report(logbook.add_equipment(&self.code, &self.department))
    }
}

#[derive(Debug, clap::Parser)]
pub struct Delete {
    /// The equipment code
    #[arg(value_parser = parse_code)]
    code: EquipmentCode,

    /// Skip confirmation prompts
    #[arg(long, short)]
    yes: bool,
}

impl Delete {
    #[instrument]
    fn run(self, root: &Path) -> anyhow::Result<()> {
        let mut logbook = open_logbook(root)?;

        let impact = logbook.dependents(&self.code)?;
        let prompt = format!(
            "Delete {} along with {} observation(s) and {} measurement(s)?",
            self.code, impact.observations, impact.measurements
        );
        if !confirm(&prompt, self.yes)? {
            println!("Cancelled");
            return Ok(());
        }

        report(logbook.delete_equipment(&self.code))
    }
}
