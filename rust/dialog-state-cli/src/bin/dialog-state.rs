use anyhow::Result;
use clap::Parser;
use dialog_state_cli::{DialogStateCli, init_tracing, run};

pub fn main() -> Result<()> {
    let cli = DialogStateCli::parse();
    init_tracing(cli.verbose);
    run(cli)
}
