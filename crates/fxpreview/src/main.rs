mod cli;
mod run;
mod software;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    run::run(cli)
}
