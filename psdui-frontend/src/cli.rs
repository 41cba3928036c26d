use std::fmt::Write;

use psdui_core::document::Document;
use psdui_core::tree::LayerTree;

use crate::errors::FrontendError;
use crate::loader::LoadedPsd;

/// 文件头、图层记录数与诊断信息概览。
pub fn render_summary(loaded: &LoadedPsd) -> String {
    let document: &Document = &loaded.document;
    let header = &document.header;
    let mut out = String::new();
    let _ = writeln!(out, "文件：{}", loaded.path.display());
    let _ = writeln!(
        out,
        "画布：{} x {}，{} 通道，{} 位，{:?}",
        header.width,
        header.height,
        header.channel_count,
        header.depth.bits(),
        header.color_mode
    );
    let _ = writeln!(out, "图层记录：{}", document.layers.len());
    let tree = &loaded.outcome.tree;
    let _ = writeln!(
        out,
        "图层树：{} 个图层，分组最大深度 {}",
        tree.leaf_count(),
        tree.group_depth()
    );
    if !document.has_channel_data {
        let _ = writeln!(out, "通道数据：未读取");
    }

    let diagnostics: Vec<_> = document
        .diagnostics
        .iter()
        .chain(loaded.outcome.diagnostics.iter())
        .collect();
    if !diagnostics.is_empty() {
        let _ = writeln!(out, "诊断：{} 条", diagnostics.len());
        for diagnostic in diagnostics {
            let _ = writeln!(out, "  - {diagnostic}");
        }
    }
    out
}

/// 缩进文本形式的图层树，分组以 `/` 结尾。
pub fn render_tree(tree: &LayerTree) -> String {
    let mut out = String::new();
    for (id, depth) in tree.walk() {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let indent = "  ".repeat(depth);
        if node.is_group() {
            let _ = write!(out, "{indent}{}/", node.name);
        } else {
            let _ = write!(
                out,
                "{indent}{} [{},{} {}x{}]",
                node.name, node.position.x, node.position.y, node.size.x, node.size.y
            );
        }
        if !node.visible {
            out.push_str(" (hidden)");
        }
        if let Some(text) = &node.text {
            let _ = write!(out, " text={:?}", text.content);
        }
        out.push('\n');
    }
    out
}

pub fn render_tree_json(tree: &LayerTree) -> Result<String, FrontendError> {
    Ok(serde_json::to_string_pretty(&tree.to_nested())?)
}
