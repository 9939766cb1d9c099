//! 应用配置持久化

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{ensure_dir, load_toml, save_toml};
use crate::error::Result;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub menu: MenuConfig,
}

/// 菜单配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuConfig {
    /// 每轮操作后重新显示菜单前的停顿（毫秒）
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    /// 查看/搜索前是否清屏
    #[serde(default = "default_clear_screen")]
    pub clear_screen: bool,
}

fn default_pause_ms() -> u64 {
    1000
}

fn default_clear_screen() -> bool {
    true
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            pause_ms: default_pause_ms(),
            clear_screen: default_clear_screen(),
        }
    }
}

/// 获取配置文件路径
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

/// 加载配置（不存在或无法解析则返回默认值）
pub fn load_config(data_dir: &Path) -> Config {
    let path = config_path(data_dir);
    if !path.exists() {
        return Config::default();
    }
    match load_toml(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            Config::default()
        }
    }
}

/// 保存配置
pub fn save_config(data_dir: &Path, config: &Config) -> Result<()> {
    ensure_dir(data_dir)?;
    save_toml(&config_path(data_dir), config)
}
