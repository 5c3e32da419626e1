use std::path::{Path, PathBuf};

use clap::ValueEnum;
use maintlog::{BackendKind, Config};
use tracing::instrument;

use super::{open_logbook, terminal::Colorize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Default)]
enum BackendArg {
    #[default]
    File,
    Hosted,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::File => Self::File,
            BackendArg::Hosted => Self::Hosted,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Storage backend to record in the configuration
    #[arg(long, value_enum, default_value_t)]
    backend: BackendArg,

    /// Directory for the file stores, relative to the root
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: &Path) -> anyhow::Result<()> {
        let config_path = root.join(Config::FILE_NAME);
        if config_path.exists() {
            println!(
                "{}",
                format!("Using existing {}", config_path.display()).dim()
            );
        } else {
            let mut config = Config::default();
            config.backend = self.backend.into();
            if let Some(data_dir) = self.data_dir {
                config.set_data_dir(data_dir);
            }
            std::fs::create_dir_all(root)?;
            config.save(&config_path)?;
            println!("Created {}", config_path.display());
        }

        let logbook = open_logbook(root)?;
        let roster = logbook.try_load_equipment()?;

        println!(
            "{}",
            format!("✅ Maintenance log ready ({} equipment)", roster.len()).success()
        );
        Ok(())
    }
}
