use clap::Parser;
use std::path::PathBuf;

/// RFID turntable: drop the needle, spin the platter, stream the record
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration directory (default: $PMOTURNTABLE_CONFIG, ./.pmoturntable, ~/.pmoturntable)
    #[arg(short = 'c', long = "config", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Desk test: run on simulated hardware, presenting TAG after the arm drops
    #[arg(long = "simulate", value_name = "TAG")]
    pub simulate: Option<String>,
}

impl Args {
    pub fn config_dir(&self) -> String {
        self.config_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default()
    }
}
