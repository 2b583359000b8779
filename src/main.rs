use matrix_bridge::clock::{Clock, TimeWindow};
use matrix_bridge::config::Config;
use matrix_bridge::cover::CoverArt;
use matrix_bridge::dispatch::Dispatcher;
use matrix_bridge::matrix::Matrix;
use matrix_bridge::output::OutputChannel;
use matrix_bridge::volume::VolumeOverlay;
use matrix_bridge::{logging, mqtt};

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "matrix_bridge.json".to_string());
    let config = Config::load(&config_path)?;
    logging::init(config.debug_logging);
    info!("loaded configuration from {config_path}");

    let disp = &config.display;
    let matrix = Arc::new(Matrix::connect(
        &disp.host,
        disp.port,
        disp.width,
        disp.height,
        disp.layer,
        disp.transparent,
    )?);
    info!(
        "display sink ready: {}:{} ({}x{}, layer {})",
        disp.host, disp.port, disp.width, disp.height, disp.layer
    );

    let cover = CoverArt::new(OutputChannel::new(matrix.clone(), config.cover.priority));
    let volume = VolumeOverlay::new(
        OutputChannel::new(matrix.clone(), config.volume.priority),
        Duration::from_secs_f32(config.volume.timeout),
        config.volume.bar_width,
    );
    let window = TimeWindow::parse(&config.clock.start, &config.clock.end)?;
    let clock = Clock::new(
        OutputChannel::new(matrix, config.clock.priority),
        config.clock.kind,
        window,
        config.clock.enabled,
    );

    let dispatcher = Dispatcher::new(cover, volume, clock);
    dispatcher.start_idle();

    mqtt::run(&config.mqtt, &dispatcher)
}
