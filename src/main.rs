mod cli;
mod error;
mod menu;
mod storage;
mod store;

use std::io;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use menu::Menu;
use storage::{config, FileStore};
use store::TaskStore;

/// 日志输出到 stderr，默认只显示 warn 以上，避免与菜单输出混在一起
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> io::Result<()> {
    init_logging();

    // 解析命令行参数
    let cli = Cli::parse();

    let data_dir = cli.data_dir().map_err(io::Error::other)?;
    // 首次运行写出默认配置，方便用户修改
    if !config::config_path(&data_dir).exists() {
        if let Err(e) = config::save_config(&data_dir, &config::Config::default()) {
            tracing::warn!(error = %e, "could not write default config");
        }
    }
    let mut config = config::load_config(&data_dir);
    cli.apply(&mut config);
    tracing::debug!(data_dir = %data_dir.display(), ?config, "starting");

    let store = TaskStore::load(FileStore::new(&data_dir)).map_err(io::Error::other)?;

    // 运行主循环
    let stdin = io::stdin();
    let mut menu = Menu::new(store, stdin.lock(), io::stdout(), config.menu);
    menu.run()
}
