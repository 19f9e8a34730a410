//! Run the chain usage scenarios and print the AG-UI events they produce.

mod config;
mod logging;
mod scenarios;
mod sink;

use agui_chain::{AguiChain, RunOptions};
use clap::Parser;
use tracing::info;

use crate::logging::LogFormat;
use crate::scenarios::Scenario;
use crate::sink::{EventWriter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "agui-chain-demos", about = "Print the AG-UI events of the usage scenarios")]
struct Cli {
    /// Scenario to run. Runs every scenario when omitted.
    #[arg(value_enum)]
    scenario: Option<Scenario>,
    /// Output format for emitted events.
    #[arg(long, value_enum, env = "AGUI_DEMO_FORMAT", default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,
    /// Thread id stamped on lifecycle events.
    #[arg(long, env = "AGUI_DEMO_THREAD_ID", default_value = "thread_123")]
    thread_id: String,
    /// Run id stamped on lifecycle events. Defaults to `run_<scenario>`.
    #[arg(long, env = "AGUI_DEMO_RUN_ID")]
    run_id: Option<String>,
    /// Diagnostic log filter, e.g. `debug` or `agui_chain=trace`. Falls back to `RUST_LOG`.
    #[arg(long, env = "AGUI_DEMO_LOG_LEVEL")]
    log_level: Option<String>,
    /// Diagnostic log format on stderr.
    #[arg(long, value_enum, env = "AGUI_DEMO_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::init();
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref(), cli.log_format)?;

    let selected = match cli.scenario {
        Some(scenario) => vec![scenario],
        None => Scenario::ALL.to_vec(),
    };
    let writer = EventWriter::new(std::io::stdout(), cli.format);

    for scenario in selected {
        let run_id = cli
            .run_id
            .clone()
            .unwrap_or_else(|| format!("run_{}", scenario.slug()));
        let mut chain = AguiChain::new(RunOptions::new(cli.thread_id.clone(), run_id));
        chain.subscribe(writer.subscriber());

        if cli.format == OutputFormat::Pretty {
            println!("=== {} ===", scenario.title());
        }
        info!(scenario = scenario.slug(), "running scenario");
        scenario.run(&mut chain)?;
        if cli.format == OutputFormat::Pretty {
            println!();
        }
    }

    Ok(())
}
