//! CLI 模块

use std::path::PathBuf;

use clap::Parser;

use crate::error::Result;
use crate::storage::{self, config::Config};

#[derive(Parser, Debug)]
#[command(name = "taskmenu")]
#[command(version)]
#[command(about = "Interactive task list manager")]
pub struct Cli {
    /// Directory holding tasks.json and config.toml (defaults to ~/.taskmenu)
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
    /// Pause between menu rounds in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub pause_ms: Option<u64>,
}

impl Cli {
    /// 命令行指定优先，否则使用 ~/.taskmenu
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => storage::default_data_dir(),
        }
    }

    /// 用命令行参数覆盖配置文件
    pub fn apply(&self, config: &mut Config) {
        if let Some(ms) = self.pause_ms {
            config.menu.pause_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags() {
        let cli = Cli::try_parse_from(["taskmenu"]).unwrap();
        assert!(cli.data_dir.is_none());

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_overrides() {
        let cli =
            Cli::try_parse_from(["taskmenu", "--data-dir", "/tmp/tm", "--pause-ms", "0"]).unwrap();
        assert_eq!(cli.data_dir().unwrap(), PathBuf::from("/tmp/tm"));

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.menu.pause_ms, 0);
    }

    #[test]
    fn test_rejects_bad_pause() {
        assert!(Cli::try_parse_from(["taskmenu", "--pause-ms", "soon"]).is_err());
    }
}
