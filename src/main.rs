mod actions;
mod cli;
mod config;
mod device;
mod geometry;
mod gestures;
mod host;
mod input;
mod logging;
mod render;
mod schedule;
mod tracker;
mod widget;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
