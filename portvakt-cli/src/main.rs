//! ## portvakt-cli
//! **`portvakt` binary**
//!
//! Live monitoring, offline replay of a pcap savefile, and the alert
//! history commands.

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli).await
}
