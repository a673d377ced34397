use anyhow::Result;
use log::error;

use magic_renamer::bootstrap::setup::initialize;
use magic_renamer::build_rocket;
use magic_renamer::common::ROCKET_RUNTIME;
use magic_renamer::config::APP_CONFIG;

fn main() -> Result<()> {
    initialize();

    let result = ROCKET_RUNTIME.block_on(async { build_rocket(APP_CONFIG.clone()).launch().await });
    if let Err(e) = result {
        error!("Rocket server failed: {}", e);
        return Err(anyhow::Error::from(e));
    }
    Ok(())
}
