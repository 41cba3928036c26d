pub mod bitmap;
pub mod classify;
pub mod extract;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("unsupported channel count {0}")]
        ChannelCount(usize),
        #[error("plane {index} holds {actual} bytes, expected {expected}")]
        PlaneSizeMismatch {
            index: usize,
            expected: usize,
            actual: usize,
        },
    }
}

pub mod tree {
    use glam::IVec2;
    use psdui_core::diagnostics::Diagnostic;
    use psdui_core::document::Document;
    use psdui_core::import::{DEFAULT_MAX_GROUP_DEPTH, GroupBeginPolicy};
    use psdui_core::tree::{LayerNode, LayerTree, NodeId};
    use tracing::{debug, trace, warn};

    use crate::classify::{HeuristicClassifier, LayerClassifier, LayerRole};

    /// 建树策略。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BuildOptions {
        pub begin_policy: GroupBeginPolicy,
        /// 为真时不为隐藏的普通图层创建节点。
        pub skip_invisible: bool,
        /// 分组嵌套上限。更深的分组不建节点，其内容挂到上限处的分组下。
        pub max_group_depth: usize,
    }

    impl Default for BuildOptions {
        fn default() -> Self {
            Self {
                begin_policy: GroupBeginPolicy::default(),
                skip_invisible: false,
                max_group_depth: DEFAULT_MAX_GROUP_DEPTH,
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct BuildOutcome {
        pub tree: LayerTree,
        pub diagnostics: Vec<Diagnostic>,
    }

    /// 将扁平的图层记录（自下而上存储，夹带分组开始与结束标记）还原为图层树。
    ///
    /// 记录按存储顺序逆序处理，使用显式栈保存尚未关闭的分组；栈底是以文件名命名、
    /// 尺寸为整个画布的根节点。每个分组关闭时反转一次子节点顺序，最终兄弟节点顺序与存储顺序一致。
    #[derive(Debug, Clone)]
    pub struct LayerTreeBuilder<C = HeuristicClassifier> {
        classifier: C,
        options: BuildOptions,
    }

    impl LayerTreeBuilder {
        pub fn new(options: BuildOptions) -> Self {
            Self {
                classifier: HeuristicClassifier::new(options.begin_policy),
                options,
            }
        }
    }

    impl Default for LayerTreeBuilder {
        fn default() -> Self {
            Self::new(BuildOptions::default())
        }
    }

    impl<C: LayerClassifier> LayerTreeBuilder<C> {
        pub fn with_classifier(classifier: C, options: BuildOptions) -> Self {
            Self { classifier, options }
        }

        pub fn classifier(&self) -> &C {
            &self.classifier
        }

        pub fn build(&self, document: &Document, root_name: &str) -> BuildOutcome {
            let canvas = IVec2::new(document.width() as i32, document.height() as i32);
            let mut tree = LayerTree::new(root_name, canvas);
            let mut diagnostics = Vec::new();
            let mut open: Vec<NodeId> = vec![tree.root()];
            // 被展平、尚未遇到结束标记的分组数
            let mut flattened = 0usize;

            for (index, record) in document.layers.iter().enumerate().rev() {
                let top = open.last().copied().unwrap_or(tree.root());
                match self.classifier.classify(record) {
                    LayerRole::GroupEnd => {
                        if flattened > 0 {
                            flattened -= 1;
                        } else if open.len() > 1 {
                            if let Some(closed) = open.pop() {
                                tree.reverse_children(closed);
                            }
                        } else {
                            warn!(layer = record.name.as_str(), index, "分组结束标记没有对应的开始标记，已忽略");
                            diagnostics.push(Diagnostic::GroupUnderflow {
                                layer: record.name.clone(),
                                index,
                            });
                        }
                    }
                    LayerRole::GroupBegin => {
                        let depth = open.len() - 1;
                        if depth >= self.options.max_group_depth {
                            warn!(layer = record.name.as_str(), index, depth, "分组嵌套过深，已展平");
                            diagnostics.push(Diagnostic::GroupTooDeep {
                                layer: record.name.clone(),
                                depth: self.options.max_group_depth,
                            });
                            flattened += 1;
                            continue;
                        }
                        let group = LayerNode::group(record.name.clone(), record.visible(), record.rect);
                        let id = tree.push_child(top, group);
                        open.push(id);
                    }
                    LayerRole::Layer => {
                        if self.options.skip_invisible && !record.visible() {
                            trace!(layer = record.name.as_str(), "跳过隐藏图层");
                            continue;
                        }
                        tree.push_child(top, LayerNode::leaf(record));
                    }
                }
            }

            while open.len() > 1 {
                let Some(unclosed) = open.pop() else {
                    break;
                };
                tree.reverse_children(unclosed);
                let name = tree
                    .node(unclosed)
                    .map(|node| node.name.clone())
                    .unwrap_or_default();
                warn!(group = name.as_str(), "分组缺少结束标记，已在末尾自动关闭");
                diagnostics.push(Diagnostic::UnclosedGroup { name });
            }
            tree.reverse_children(tree.root());

            debug!(
                root = root_name,
                nodes = tree.len(),
                leaves = tree.leaf_count(),
                depth = tree.group_depth(),
                "图层树构建完成"
            );
            BuildOutcome { tree, diagnostics }
        }
    }

    #[cfg(test)]
    mod tests {
        use psdui_core::document::{BitDepth, Header, LayerRecord, SectionDivider};
        use psdui_core::geometry::Rect;
        use serde_json::json;

        use super::*;

        fn leaf(name: &str) -> LayerRecord {
            LayerRecord::new(name, Rect::new(0, 0, 2, 2))
        }

        fn begin(name: &str) -> LayerRecord {
            let mut record = LayerRecord::new(name, Rect::default());
            record.section = Some(SectionDivider::OpenFolder);
            record.set_pixel_data_irrelevant(true);
            record
        }

        fn end() -> LayerRecord {
            let mut record = LayerRecord::new("</Layer group>", Rect::default());
            record.section = Some(SectionDivider::BoundingDivider);
            record
        }

        fn document(records: Vec<LayerRecord>) -> Document {
            let mut document = Document::new(Header::rgb(16, 8, BitDepth::Eight));
            for record in records {
                document.push_layer(record);
            }
            document
        }

        fn names(tree: &LayerTree, id: NodeId) -> Vec<&str> {
            tree.children(id)
                .iter()
                .filter_map(|child| tree.node(*child))
                .map(|node| node.name.as_str())
                .collect()
        }

        #[test]
        fn nested_groups_keep_storage_order() {
            let document = document(vec![
                end(),
                leaf("a"),
                end(),
                leaf("b"),
                leaf("c"),
                begin("inner"),
                leaf("d"),
                begin("outer"),
                leaf("top"),
            ]);
            let outcome = LayerTreeBuilder::default().build(&document, "menu");
            let tree = &outcome.tree;

            assert!(outcome.diagnostics.is_empty());
            assert_eq!(tree.leaf_count(), 5);
            assert_eq!(tree.group_depth(), 2);
            assert_eq!(tree.root_node().name, "menu");
            assert_eq!(tree.root_node().size, IVec2::new(16, 8));
            assert_eq!(names(tree, tree.root()), vec!["outer", "top"]);

            let outer = tree.children(tree.root())[0];
            assert_eq!(names(tree, outer), vec!["a", "inner", "d"]);
            let inner = tree.children(outer)[1];
            assert_eq!(names(tree, inner), vec!["b", "c"]);
            assert_eq!(tree.path_of(tree.children(inner)[0]), vec!["menu", "outer", "inner", "b"]);
        }

        #[test]
        fn stray_group_end_is_recorded_not_fatal() {
            let document = document(vec![leaf("a"), end()]);
            let outcome = LayerTreeBuilder::default().build(&document, "doc");

            assert_eq!(outcome.tree.leaf_count(), 1);
            assert_eq!(
                outcome.diagnostics,
                vec![Diagnostic::GroupUnderflow {
                    layer: "</Layer group>".to_string(),
                    index: 1,
                }]
            );
        }

        #[test]
        fn unclosed_group_is_closed_at_the_end() {
            let document = document(vec![leaf("x"), leaf("y"), begin("panel")]);
            let outcome = LayerTreeBuilder::default().build(&document, "doc");
            let tree = &outcome.tree;

            let panel = tree.children(tree.root())[0];
            assert_eq!(names(tree, panel), vec!["x", "y"]);
            assert_eq!(
                outcome.diagnostics,
                vec![Diagnostic::UnclosedGroup {
                    name: "panel".to_string()
                }]
            );
        }

        #[test]
        fn hidden_leaves_follow_skip_option() {
            let mut hidden = leaf("hidden");
            hidden.set_visible(false);
            let document = document(vec![leaf("shown"), hidden]);

            let kept = LayerTreeBuilder::default().build(&document, "doc");
            assert_eq!(kept.tree.leaf_count(), 2);

            let options = BuildOptions {
                skip_invisible: true,
                ..BuildOptions::default()
            };
            let skipped = LayerTreeBuilder::new(options).build(&document, "doc");
            assert_eq!(names(&skipped.tree, skipped.tree.root()), vec!["shown"]);
        }

        #[test]
        fn folder_policy_ignores_bare_irrelevance_flag() {
            let mut flagged = leaf("flagged");
            flagged.set_pixel_data_irrelevant(true);
            let document = document(vec![leaf("a"), flagged]);

            let options = BuildOptions {
                begin_policy: GroupBeginPolicy::FolderFlag,
                ..BuildOptions::default()
            };
            let outcome = LayerTreeBuilder::new(options).build(&document, "doc");
            assert_eq!(outcome.tree.leaf_count(), 2);
            assert_eq!(outcome.tree.group_depth(), 0);

            let either = LayerTreeBuilder::default().build(&document, "doc");
            assert_eq!(either.tree.group_depth(), 1);
        }

        #[test]
        fn groups_beyond_depth_limit_are_flattened() {
            const LEVELS: usize = 16_000;
            let mut records: Vec<LayerRecord> = (0..LEVELS).map(|_| end()).collect();
            records.push(leaf("core"));
            records.extend((0..LEVELS).rev().map(|level| begin(&format!("g{level}"))));
            records.push(leaf("top"));
            let outcome = LayerTreeBuilder::default().build(&document(records), "doc");
            let tree = &outcome.tree;

            assert_eq!(tree.group_depth(), DEFAULT_MAX_GROUP_DEPTH);
            assert_eq!(names(tree, tree.root()), vec!["g0", "top"]);
            let core = tree
                .walk()
                .into_iter()
                .find(|(id, _)| tree.node(*id).is_some_and(|node| node.name == "core"))
                .map(|(id, _)| id)
                .expect("找不到 core 图层");
            assert_eq!(tree.path_of(core).len(), DEFAULT_MAX_GROUP_DEPTH + 2);

            assert_eq!(outcome.diagnostics.len(), LEVELS - DEFAULT_MAX_GROUP_DEPTH);
            assert_eq!(
                outcome.diagnostics[0],
                Diagnostic::GroupTooDeep {
                    layer: format!("g{DEFAULT_MAX_GROUP_DEPTH}"),
                    depth: DEFAULT_MAX_GROUP_DEPTH,
                }
            );
            assert!(serde_json::to_string(&tree.to_nested()).is_ok());
        }

        #[test]
        fn flattened_group_content_joins_the_deepest_kept_group() {
            let document = document(vec![end(), end(), leaf("deep"), begin("inner"), leaf("mid"), begin("outer")]);
            let options = BuildOptions {
                max_group_depth: 1,
                ..BuildOptions::default()
            };
            let outcome = LayerTreeBuilder::new(options).build(&document, "doc");
            let tree = &outcome.tree;

            assert_eq!(names(tree, tree.root()), vec!["outer"]);
            let outer = tree.children(tree.root())[0];
            assert_eq!(names(tree, outer), vec!["deep", "mid"]);
            assert_eq!(
                outcome.diagnostics,
                vec![Diagnostic::GroupTooDeep {
                    layer: "inner".to_string(),
                    depth: 1,
                }]
            );
        }

        struct PrefixClassifier;

        impl LayerClassifier for PrefixClassifier {
            fn classify(&self, record: &LayerRecord) -> LayerRole {
                if record.name.starts_with('+') {
                    LayerRole::GroupBegin
                } else if record.name.starts_with('-') {
                    LayerRole::GroupEnd
                } else {
                    LayerRole::Layer
                }
            }
        }

        #[test]
        fn custom_classifier_drives_grouping() {
            let document = document(vec![leaf("-"), leaf("inside"), leaf("+box"), leaf("outside")]);
            let builder = LayerTreeBuilder::with_classifier(PrefixClassifier, BuildOptions::default());
            let outcome = builder.build(&document, "doc");

            let value = serde_json::to_value(outcome.tree.to_nested()).expect("序列化图层树失败");
            assert_eq!(
                value,
                json!({
                    "name": "doc",
                    "visible": true,
                    "position": [0, 0],
                    "size": [16, 8],
                    "children": [
                        {
                            "name": "+box",
                            "visible": true,
                            "position": [0, 0],
                            "size": [0, 0],
                            "children": [
                                { "name": "inside", "visible": true, "position": [0, 0], "size": [2, 2] }
                            ]
                        },
                        { "name": "outside", "visible": true, "position": [0, 0], "size": [2, 2] }
                    ]
                })
            );
        }
    }
}
