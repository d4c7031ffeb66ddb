#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

mod backup;
mod cli;
mod config;
mod error;
mod installments;
mod models;
mod storage;
mod summary;
mod ui_app;

use anyhow::Result;
use clap::Parser;
use config::AppConfig;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let cfg = AppConfig::load()?;
    match cli.command {
        Some(command) => cli::run(command, &cfg),
        None => ui_app::run_app(cfg),
    }
}
