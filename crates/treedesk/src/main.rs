use clap::Parser;

use treedesk::ui::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    treedesk::init();

    cli::run(Cli::parse()).await
}
