//! Pipeline file validation.

use std::path::PathBuf;

use clap::Args;
use sondeo_config::Config;

/// Validate a pipeline file.
#[derive(Args)]
pub struct CheckArgs {
    /// Path to the pipeline TOML
    #[arg(value_name = "PIPELINE")]
    pub config: PathBuf,
}

/// Run the check command.
pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    let params = config.build()?;

    println!("Pipeline:  {}", args.config.display());
    println!("Version:   {}", config.legacy_version);
    println!(
        "Deadlines: compute {:?}, finish {:?}",
        params.compute_timeout, params.finish_timeout
    );

    for (name, processing) in &config.processing {
        let Some(definition) = params.processings.get(name) else {
            if processing.disabled {
                println!("\n[{name}] disabled");
            }
            continue;
        };

        let channels: Vec<String> = definition.channels().iter().map(|c| c.to_string()).collect();
        println!("\n[{name}]");
        println!("  channels:    {}", channels.join(", "));
        if definition.target_rate() > 0 {
            println!("  target rate: {} Hz", definition.target_rate());
        }
        println!("  filter:      {} stage(s)", definition.filter().len());
        println!("  order:       {}", definition.order().collect::<Vec<_>>().join(" -> "));
    }
    Ok(())
}
