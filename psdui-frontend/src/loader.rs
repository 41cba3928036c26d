use std::path::{Path, PathBuf};

use psdui_config::ImportConfig;
use psdui_core::document::Document;
use psdui_engine::classify::HeuristicClassifier;
use psdui_engine::tree::{BuildOptions, BuildOutcome, LayerTreeBuilder};
use psdui_io::{DocumentLoader, ParseOptions, PsdFacade};
use tracing::{info, warn};

use crate::errors::FrontendError;

/// 解析后的文件及其图层树。
#[derive(Debug)]
pub struct LoadedPsd {
    pub path: PathBuf,
    pub document: Document,
    pub outcome: BuildOutcome,
}

impl LoadedPsd {
    /// 依次完成解析与建树，诊断信息逐条记录到日志。
    pub fn open(path: &Path, config: &ImportConfig) -> Result<Self, FrontendError> {
        let document = load_document(path, config)?;
        let root = root_name(path)?;
        let outcome = tree_builder(config).build(&document, &root);
        for diagnostic in &outcome.diagnostics {
            warn!(path = %path.display(), "{diagnostic}");
        }
        Ok(Self {
            path: path.to_path_buf(),
            document,
            outcome,
        })
    }
}

pub fn load_document(path: &Path, config: &ImportConfig) -> Result<Document, FrontendError> {
    let facade = PsdFacade::with_options(ParseOptions {
        read_channel_data: config.read_channel_data,
    });
    let document = facade.load(path)?;
    info!(
        path = %path.display(),
        width = document.width(),
        height = document.height(),
        layers = document.layers.len(),
        diagnostics = document.diagnostics.len(),
        "已解析 PSD 文件"
    );
    Ok(document)
}

/// 根节点以不带扩展名的文件名命名。
pub fn root_name(path: &Path) -> Result<String, FrontendError> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| FrontendError::NoFileStem(path.to_path_buf()))
}

pub fn classifier(config: &ImportConfig) -> HeuristicClassifier {
    HeuristicClassifier::new(config.group_begin_policy)
}

pub fn tree_builder(config: &ImportConfig) -> LayerTreeBuilder {
    LayerTreeBuilder::new(BuildOptions {
        begin_policy: config.group_begin_policy,
        skip_invisible: config.skip_invisible_layers,
        max_group_depth: config.max_group_depth,
    })
}
