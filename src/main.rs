use anyhow::Result;
use log::info;
use tokio::sync::mpsc;

use ble_osc_bridge::config::AppConfig;
use ble_osc_bridge::core::BluestBackend;
use ble_osc_bridge::mapping::{InputMapper, OscTransmitter};
use ble_osc_bridge::{Bridge, logging, utils};

const WRITE_DEFAULT_CONFIG_FLAG: &str = "--write-default-config";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let write_default = args.iter().any(|a| a == WRITE_DEFAULT_CONFIG_FLAG);
    let path_arg = args.iter().find(|a| !a.starts_with("--")).map(String::as_str);
    let env_path = utils::config_path_from_env();
    let config_path = utils::resolve_config_path(path_arg, env_path.as_deref());

    if write_default {
        logging::init(&Default::default());
        AppConfig::default().save_config(&config_path).await?;
        return Ok(());
    }

    let config = AppConfig::load_config(&config_path).await?;
    logging::init(&config.log);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let backend = BluestBackend::new(event_tx, &config.scan).await?;
    let transmitter = OscTransmitter::from_config(&config.osc).await?;
    let mapper = InputMapper::new(config.osc.bindings.clone());

    let mut bridge = Bridge::new(backend, transmitter, &config.target, mapper)?;
    bridge.run(event_rx).await?;

    info!("Bridge stopped");
    Ok(())
}
