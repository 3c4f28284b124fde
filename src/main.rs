use campfire_call_sim::{
    init_errors,
    log_init,
    App,
};
use campfire_config::Args;
use clap::Parser;
use color_eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    init_errors()?;
    log_init();
    App::new(Args::parse())?.run().await
}
