mod channel;
mod codec;
mod config;
mod error;
mod front_desk;
mod input;
mod kitchen;
mod logging;
mod monitor;
mod shutdown;
mod state;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::error;

use crate::config::PipelineConfig;
use crate::input::LinePrompt;
use crate::state::ShutdownFlag;

#[derive(Parser, Debug)]
#[command(name = "order_pipeline")]
#[command(about = "Front desk and kitchen exchanging orders over named pipes")]
struct Cli {
    /// Directory where the two FIFOs are created (default /tmp)
    #[arg(long)]
    channel_dir: Option<PathBuf>,

    /// Simulated preparation time per order in milliseconds (default 2000)
    #[arg(long)]
    prep_ms: Option<u64>,

    /// How often blocked waits check for shutdown, in milliseconds (default 100)
    #[arg(long)]
    poll_ms: Option<u64>,
}

impl Cli {
    fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        if let Some(dir) = self.channel_dir {
            config.channel_dir = dir;
        }
        if let Some(ms) = self.prep_ms {
            config.prep_duration = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        config
    }
}

fn main() -> ExitCode {
    logging::init();
    let config = Cli::parse().into_config();

    let stop = ShutdownFlag::new();
    if let Err(err) = shutdown::install_signal_handlers(&stop) {
        error!("{err}");
        eprintln!("order_pipeline: {err}");
        return ExitCode::FAILURE;
    }

    let outcome = LinePrompt::stdin(config.poll_interval)
        .and_then(|mut prompt| front_desk::run(&config, stop, &mut prompt));
    match outcome {
        Ok(summary) => {
            front_desk::print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            eprintln!("order_pipeline: {err}");
            ExitCode::FAILURE
        }
    }
}
