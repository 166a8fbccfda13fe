use anyhow::Result;

mod camera;
mod config;
mod demo;
mod engine;
mod f_model;
mod rendering;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = config::DemoConfig::load()?;
    log::info!("Configuration: {:?}", config);

    pollster::block_on(window::run(config))?;

    Ok(())
}
