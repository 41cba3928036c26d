use std::collections::HashSet;

use psdui_core::bitmap::AssembledBitmap;
use psdui_core::diagnostics::Diagnostic;
use psdui_core::document::Document;
use tracing::{debug, trace, warn};

use crate::bitmap::{can_extract, extract_layer};
use crate::classify::{LayerClassifier, LayerRole};

/// 由图层名得到 PNG 文件名。
///
/// `:` 之后的部分是注释，不参与文件名；路径分隔符与 NUL 替换为 `_`，
/// 结果总是输出目录内的单个文件名。主干为空、`.` 或 `..` 时返回 `None`。
pub fn image_name_from_layer_name(layer_name: &str) -> Option<String> {
    let stem: String = layer_name
        .split(':')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match stem.as_str() {
        "" | "." | ".." => None,
        _ => Some(format!("{stem}.png")),
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedLayer {
    /// 在 `Document::layers` 中的存储下标。
    pub layer_index: usize,
    pub layer_name: String,
    pub file_name: String,
    pub bitmap: AssembledBitmap,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub layers: Vec<ExtractedLayer>,
    pub diagnostics: Vec<Diagnostic>,
}

/// 按存储顺序组装所有可导出的图层。
///
/// 分组标记与无法导出的图层被跳过；多个图层得到同一文件名时只保留第一个。
/// 名称无法生成文件名的图层记录诊断后跳过。文档未读取通道数据时返回空结果。
pub fn extract_layers(document: &Document, classifier: &impl LayerClassifier) -> ExtractionOutcome {
    let mut outcome = ExtractionOutcome::default();
    if !document.has_channel_data {
        debug!("文档未包含通道数据，跳过导出");
        return outcome;
    }

    let mut taken: HashSet<String> = HashSet::new();
    for (layer_index, record) in document.layers.iter().enumerate() {
        if classifier.classify(record) != LayerRole::Layer || !can_extract(record) {
            continue;
        }
        let Some(file_name) = image_name_from_layer_name(&record.name) else {
            warn!(layer = record.name.as_str(), "图层名无法生成文件名，跳过导出");
            outcome.diagnostics.push(Diagnostic::UnusableImageName {
                layer: record.name.clone(),
            });
            continue;
        };
        if taken.contains(&file_name) {
            trace!(layer = record.name.as_str(), file = file_name.as_str(), "文件名重复，跳过");
            continue;
        }
        let Some(bitmap) = extract_layer(record, document.depth()) else {
            continue;
        };

        taken.insert(file_name.clone());
        outcome.layers.push(ExtractedLayer {
            layer_index,
            layer_name: record.name.clone(),
            file_name,
            bitmap,
        });
    }
    debug!(
        count = outcome.layers.len(),
        skipped = outcome.diagnostics.len(),
        "图层位图组装完成"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use psdui_core::document::{BitDepth, Channel, ChannelId, Compression, Header, LayerRecord, TextAttributes};
    use psdui_core::geometry::Rect;

    use super::*;
    use crate::classify::HeuristicClassifier;

    fn layer(name: &str, value: u8) -> LayerRecord {
        let mut layer = LayerRecord::new(name, Rect::new(0, 0, 1, 1));
        for id in [ChannelId::TRANSPARENCY, ChannelId::RED, ChannelId::GREEN, ChannelId::BLUE] {
            layer.channels.push(Channel::with_data(id, Compression::Raw, vec![value]));
        }
        layer
    }

    #[test]
    fn file_name_stops_at_first_colon() {
        assert_eq!(image_name_from_layer_name("btn_ok:button:1").as_deref(), Some("btn_ok.png"));
        assert_eq!(image_name_from_layer_name("logo").as_deref(), Some("logo.png"));
        assert_eq!(image_name_from_layer_name(":note"), None);
    }

    #[test]
    fn file_name_never_leaves_the_output_directory() {
        assert_eq!(image_name_from_layer_name("../escaped").as_deref(), Some(".._escaped.png"));
        assert_eq!(image_name_from_layer_name("icons/close").as_deref(), Some("icons_close.png"));
        assert_eq!(image_name_from_layer_name("a\\b\0c").as_deref(), Some("a_b_c.png"));
        assert_eq!(image_name_from_layer_name("..:parent"), None);
        assert_eq!(image_name_from_layer_name("."), None);
    }

    #[test]
    fn unusable_name_is_diagnosed_and_others_still_extract() {
        let mut document = Document::new(Header::rgb(1, 1, BitDepth::Eight));
        document.push_layer(layer("..", 1));
        document.push_layer(layer("icons/close", 2));

        let outcome = extract_layers(&document, &HeuristicClassifier::default());
        assert_eq!(outcome.layers.len(), 1);
        assert_eq!(outcome.layers[0].file_name, "icons_close.png");
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::UnusableImageName { layer: "..".to_string() }]
        );
    }

    #[test]
    fn first_layer_wins_a_shared_file_name() {
        let mut document = Document::new(Header::rgb(1, 1, BitDepth::Eight));
        document.push_layer(layer("bg:base", 1));
        document.push_layer(layer("bg:overlay", 2));
        document.push_layer(layer("icon", 3));

        let extracted = extract_layers(&document, &HeuristicClassifier::default()).layers;
        let files: Vec<&str> = extracted.iter().map(|item| item.file_name.as_str()).collect();
        assert_eq!(files, vec!["bg.png", "icon.png"]);
        assert_eq!(extracted[0].layer_name, "bg:base");
        assert_eq!(extracted[0].bitmap.data(), &[1, 1, 1, 1]);
        assert_eq!(extracted[1].layer_index, 2);
    }

    #[test]
    fn unextractable_layer_does_not_reserve_its_name() {
        let mut document = Document::new(Header::rgb(1, 1, BitDepth::Eight));
        let mut text = layer("title", 0);
        text.text = Some(TextAttributes::new("Play"));
        document.push_layer(text);
        document.push_layer(layer("title:art", 9));

        let extracted = extract_layers(&document, &HeuristicClassifier::default()).layers;
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].layer_name, "title:art");
    }

    #[test]
    fn structure_only_document_yields_nothing() {
        let mut document = Document::new(Header::rgb(1, 1, BitDepth::Eight));
        document.push_layer(layer("icon", 3));
        document.has_channel_data = false;
        let outcome = extract_layers(&document, &HeuristicClassifier::default());
        assert!(outcome.layers.is_empty());
        assert!(outcome.diagnostics.is_empty());
    }
}
