use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    remote_fs_ops::logging::init_tracing();
    let args = cli::Args::parse();
    cli::run(args)
}
