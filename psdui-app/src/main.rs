use std::path::PathBuf;

use clap::{Parser, Subcommand};
use psdui_config::{AppConfig, ConfigError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// PSD 图层解析与导出工具
#[derive(Debug, Parser)]
#[command(name = "psdui", version, about)]
struct Cli {
    /// 配置文件路径，缺省时按 `PSDUI_CONFIG` 与 `./config/default.toml` 查找
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 打印文件头、图层数量与诊断信息
    Info { file: PathBuf },
    /// 打印图层树
    Tree {
        file: PathBuf,
        /// 以嵌套 JSON 输出
        #[arg(long)]
        json: bool,
    },
    /// 将图层导出为 PNG
    Extract {
        file: PathBuf,
        /// 导出目录，缺省为输入文件旁的 `layers/`
        #[arg(long)]
        out: Option<PathBuf>,
        /// 忽略缓存资源目录，重新从文件中导出
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let (mut config, config_error) = load_configuration(cli.config);
    init_logging(&config);
    if let Some(err) = config_error {
        report_config_error(&err);
    }
    info!("启动 psdui");

    let result = match &cli.command {
        Command::Info { file } => psdui_frontend::run_info(file, &config),
        Command::Tree { file, json } => psdui_frontend::run_tree(file, &config, *json),
        Command::Extract { file, out, force } => {
            if *force {
                config.output.reuse_cached_assets = false;
            }
            psdui_frontend::run_extract(file, out.as_deref(), &config)
        }
    };

    if let Err(err) = result {
        error!(error = %err, "命令执行失败");
        std::process::exit(1);
    }
}

/// 加载失败时退回默认配置，错误留到日志初始化之后再报告。
fn load_configuration(override_path: Option<PathBuf>) -> (AppConfig, Option<ConfigError>) {
    let loaded = match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    }
}

fn report_config_error(err: &ConfigError) {
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
        }
        ConfigError::Context { .. } => {
            warn!(error = %err, "加载配置失败，使用内建默认值");
        }
    }
}

/// 日志写到 stderr，stdout 只保留命令输出。
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
