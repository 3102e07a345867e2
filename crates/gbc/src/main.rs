use std::sync::Arc;

use gbc_core::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gbc_core::logging::init("gbc")?;

    let cfg = Arc::new(Config::load()?);

    gbc_twitch::bridge::run(cfg).await
}
