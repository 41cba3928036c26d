pub mod assets;
pub mod cli;
pub mod errors;
pub mod loader;
pub mod png;

use std::path::Path;

use errors::FrontendError;
use loader::LoadedPsd;
use psdui_config::AppConfig;
use tracing::info;

use crate::assets::{AssetSource, default_output_dir, import_layers};

/// 打印文件概览。
pub fn run_info(path: &Path, config: &AppConfig) -> Result<(), FrontendError> {
    info!(path = %path.display(), "读取文件概览");
    let loaded = LoadedPsd::open(path, &config.import)?;
    print!("{}", cli::render_summary(&loaded));
    Ok(())
}

/// 打印图层树，`json` 为真时输出嵌套 JSON。
pub fn run_tree(path: &Path, config: &AppConfig, json: bool) -> Result<(), FrontendError> {
    let loaded = LoadedPsd::open(path, &config.import)?;
    let tree = &loaded.outcome.tree;
    if json {
        println!("{}", cli::render_tree_json(tree)?);
    } else {
        print!("{}", cli::render_tree(tree));
    }
    Ok(())
}

/// 导出图层图片并逐行打印写出的文件。`output_dir` 缺省时使用配置中的导出目录。
pub fn run_extract(path: &Path, output_dir: Option<&Path>, config: &AppConfig) -> Result<(), FrontendError> {
    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_output_dir(path, &config.output),
    };
    let report = import_layers(path, &output_dir, config)?;
    if let AssetSource::Cached(dir) = &report.source {
        info!(source = %dir.display(), "使用缓存资源目录");
    }
    for file in &report.files {
        println!("{}", file.display());
    }
    Ok(())
}
