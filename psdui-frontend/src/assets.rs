use std::fs;
use std::path::{Path, PathBuf};

use psdui_config::{AppConfig, OutputConfig};
use psdui_core::diagnostics::Diagnostic;
use psdui_engine::extract::extract_layers;
use tracing::{debug, info, warn};

use crate::errors::FrontendError;
use crate::loader::{classifier, load_document};
use crate::png::write_png;

/// 导出结果的来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetSource {
    /// 从 PSD 通道数据重新组装。
    Extracted,
    /// 复制了预先准备的资源目录。
    Cached(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub source: AssetSource,
    pub output_dir: PathBuf,
    pub files: Vec<PathBuf>,
    /// 导出时跳过的图层。
    pub diagnostics: Vec<Diagnostic>,
}

/// 默认导出目录：输入文件所在目录下的 `layers_dir`。
pub fn default_output_dir(path: &Path, output: &OutputConfig) -> PathBuf {
    parent_dir(path).join(&output.layers_dir)
}

/// 与输入文件同级、名为 `<文件名><后缀>` 的缓存资源目录。
pub fn assets_dir_for(path: &Path, output: &OutputConfig) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_string_lossy();
    Some(parent_dir(path).join(format!("{stem}{}", output.assets_suffix)))
}

/// 导出图层图片。存在缓存资源目录且允许复用时直接复制，否则解析文件并逐层写出 PNG。
pub fn import_layers(path: &Path, output_dir: &Path, config: &AppConfig) -> Result<ImportReport, FrontendError> {
    if config.output.reuse_cached_assets {
        if let Some(cached) = assets_dir_for(path, &config.output).filter(|dir| dir.is_dir()) {
            let files = copy_assets(&cached, output_dir)?;
            info!(
                source = %cached.display(),
                target = %output_dir.display(),
                count = files.len(),
                "已复制缓存资源"
            );
            return Ok(ImportReport {
                source: AssetSource::Cached(cached),
                output_dir: output_dir.to_path_buf(),
                files,
                diagnostics: Vec::new(),
            });
        }
    }

    let document = load_document(path, &config.import)?;
    if !document.has_channel_data {
        warn!(path = %path.display(), "未读取通道数据，没有可导出的图层");
    }
    let extracted = extract_layers(&document, &classifier(&config.import));

    let mut files = Vec::with_capacity(extracted.layers.len());
    if !extracted.layers.is_empty() {
        create_dir(output_dir)?;
    }
    for layer in &extracted.layers {
        let target = output_dir.join(&layer.file_name);
        write_png(&layer.bitmap, &target)?;
        debug!(layer = layer.layer_name.as_str(), file = %target.display(), "已导出图层");
        files.push(target);
    }
    info!(path = %path.display(), count = files.len(), "图层导出完成");

    Ok(ImportReport {
        source: AssetSource::Extracted,
        output_dir: output_dir.to_path_buf(),
        files,
        diagnostics: extracted.diagnostics,
    })
}

/// 复制目录中的普通文件（不递归），同名文件会被覆盖。
fn copy_assets(source: &Path, target: &Path) -> Result<Vec<PathBuf>, FrontendError> {
    create_dir(target)?;
    let entries = fs::read_dir(source).map_err(|err| fs_error(source, err))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| fs_error(source, err))?;
        let src_path = entry.path();
        if !src_path.is_file() {
            continue;
        }
        let dst_path = target.join(entry.file_name());
        fs::copy(&src_path, &dst_path).map_err(|err| fs_error(&dst_path, err))?;
        files.push(dst_path);
    }
    files.sort();
    Ok(files)
}

fn create_dir(path: &Path) -> Result<(), FrontendError> {
    fs::create_dir_all(path).map_err(|err| fs_error(path, err))
}

fn fs_error(path: &Path, source: std::io::Error) -> FrontendError {
    FrontendError::Fs {
        path: path.to_path_buf(),
        source,
    }
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}
