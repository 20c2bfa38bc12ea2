use anyhow::Result;
use env_logger::{Builder, Env};
use log::error;

mod cli;
mod cmd_dump;
mod cmd_serve;
mod cmd_snapshots;
mod signal;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт info.
    // Пример: RUST_LOG=debug cloudbase serve
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Serve(args) => cmd_serve::exec(args),

        cli::Cmd::Snapshots { dir, json } => cmd_snapshots::exec(dir, json),

        cli::Cmd::Dump { dir, key, snapshot } => cmd_dump::exec(dir, key, snapshot),
    }
}
