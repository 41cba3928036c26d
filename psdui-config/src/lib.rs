use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use psdui_core::import::{DEFAULT_MAX_GROUP_DEPTH, GroupBeginPolicy};
use serde::Deserialize;
use thiserror::Error;

/// 指向配置文件的环境变量。
pub const CONFIG_ENV: &str = "PSDUI_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `PSDUI_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(&cwd)
    }

    /// 在指定目录下寻找 `config/default.toml`。
    pub fn discover_in(dir: &Path) -> Result<Self, ConfigError> {
        let default_path = dir.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 解析与建树相关的选项。
#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub group_begin_policy: GroupBeginPolicy,
    #[serde(default)]
    pub skip_invisible_layers: bool,
    #[serde(default = "ImportConfig::default_read_channel_data")]
    pub read_channel_data: bool,
    /// 分组嵌套上限，超出部分展平到上一层。
    #[serde(default = "ImportConfig::default_max_group_depth")]
    pub max_group_depth: usize,
}

impl ImportConfig {
    fn default_read_channel_data() -> bool {
        true
    }

    fn default_max_group_depth() -> usize {
        DEFAULT_MAX_GROUP_DEPTH
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            group_begin_policy: GroupBeginPolicy::default(),
            skip_invisible_layers: false,
            read_channel_data: Self::default_read_channel_data(),
            max_group_depth: Self::default_max_group_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// 相对于输入文件所在目录的导出目录。
    #[serde(default = "OutputConfig::default_layers_dir")]
    pub layers_dir: PathBuf,
    /// 与输入文件同名、带此后缀的目录存在时，直接复制其中的资源。
    #[serde(default = "OutputConfig::default_assets_suffix")]
    pub assets_suffix: String,
    #[serde(default = "OutputConfig::default_reuse")]
    pub reuse_cached_assets: bool,
}

impl OutputConfig {
    fn default_layers_dir() -> PathBuf {
        PathBuf::from("layers")
    }

    fn default_assets_suffix() -> String {
        "-assets".to_string()
    }

    fn default_reuse() -> bool {
        true
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            layers_dir: Self::default_layers_dir(),
            assets_suffix: Self::default_assets_suffix(),
            reuse_cached_assets: Self::default_reuse(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let cfg = AppConfig::discover_in(dir.path()).expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.import.group_begin_policy, GroupBeginPolicy::Either);
        assert!(!cfg.import.skip_invisible_layers);
        assert!(cfg.import.read_channel_data);
        assert_eq!(cfg.import.max_group_depth, 64);
        assert_eq!(cfg.output.layers_dir, PathBuf::from("layers"));
        assert_eq!(cfg.output.assets_suffix, "-assets");
        assert!(cfg.output.reuse_cached_assets);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [import]
            group_begin_policy = "folder_flag"
            skip_invisible_layers = true
            max_group_depth = 8

            [output]
            layers_dir = "sprites"
            reuse_cached_assets = false
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.import.group_begin_policy, GroupBeginPolicy::FolderFlag);
        assert!(cfg.import.skip_invisible_layers);
        assert!(cfg.import.read_channel_data);
        assert_eq!(cfg.import.max_group_depth, 8);
        assert_eq!(cfg.output.layers_dir, PathBuf::from("sprites"));
        assert_eq!(cfg.output.assets_suffix, "-assets");
        assert!(!cfg.output.reuse_cached_assets);
    }

    #[test]
    fn discovers_default_toml_under_config_dir() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        fs::create_dir(dir.path().join("config")).expect("创建配置目录失败");
        fs::write(
            dir.path().join("config").join("default.toml"),
            "[import]\nread_channel_data = false\n",
        )
        .expect("写入配置失败");

        let cfg = AppConfig::discover_in(dir.path()).expect("discover config");
        assert!(!cfg.import.read_channel_data);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[import]\ngroup_begin_policy = \"sometimes\"").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
