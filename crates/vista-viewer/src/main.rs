mod args;
mod viewer;

use clap::Parser;
use winit::dpi::LogicalSize;

use vista_engine::config::RendererConfig;
use vista_engine::device::GpuInit;
use vista_engine::logging::{init_logging, LoggingConfig};
use vista_engine::window::{Runtime, RuntimeConfig};

use args::Args;
use viewer::Viewer;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig {
        env_filter: args.log.clone(),
        ..LoggingConfig::default()
    });

    log::info!("vista viewer: T trackball, R restore framing, M 2D/3D, G GPU debugging, Esc quit");

    let viewer = Viewer::new(RendererConfig::default(), args.load_requests());
    Runtime::run(
        RuntimeConfig {
            title: "Vista Viewer".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
        },
        GpuInit::default(),
        viewer,
    )
}
