//! Band description preview.

use clap::Args;
use sondeo_analysis::parse_bands;

/// Print the bands a description resolves to.
#[derive(Args)]
pub struct BandsArgs {
    /// Band description, e.g. "log 16 50 8000 | custom 10000 16000"
    #[arg(value_name = "DESCRIPTION")]
    pub description: String,
}

/// Run the bands command.
pub fn run(args: BandsArgs) -> anyhow::Result<()> {
    let bounds = parse_bands(&args.description)?;

    println!("{} bands", bounds.len() - 1);
    for (i, pair) in bounds.windows(2).enumerate() {
        println!("  {:>3}: {:>10.2} - {:>10.2} Hz", i, pair[0], pair[1]);
    }
    Ok(())
}
