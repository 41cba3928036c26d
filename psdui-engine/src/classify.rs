use psdui_core::document::{LayerRecord, SectionDivider};
use psdui_core::import::GroupBeginPolicy;

/// 图层名中标记分组结束的哨兵子串。
pub const GROUP_END_MARKERS: [&str; 2] = ["</Layer set>", "</Layer group>"];

/// 旧版文件中以该名称、零高度记录表示分组结束。
const LEGACY_END_NAME: &str = " copy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    GroupBegin,
    GroupEnd,
    Layer,
}

/// 将扁平图层记录归类为分组开始、分组结束或普通图层。
pub trait LayerClassifier {
    fn classify(&self, record: &LayerRecord) -> LayerRole;
}

/// 基于名称哨兵、分组标记与标志位的判定。结束条件优先于开始条件。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeuristicClassifier {
    policy: GroupBeginPolicy,
}

impl HeuristicClassifier {
    pub fn new(policy: GroupBeginPolicy) -> Self {
        Self { policy }
    }

    #[inline]
    pub fn policy(&self) -> GroupBeginPolicy {
        self.policy
    }
}

impl LayerClassifier for HeuristicClassifier {
    fn classify(&self, record: &LayerRecord) -> LayerRole {
        if is_group_end(record) {
            LayerRole::GroupEnd
        } else if is_group_begin(record, self.policy) {
            LayerRole::GroupBegin
        } else {
            LayerRole::Layer
        }
    }
}

pub fn is_group_end(record: &LayerRecord) -> bool {
    GROUP_END_MARKERS
        .iter()
        .any(|marker| record.name.contains(marker))
        || (record.name == LEGACY_END_NAME && record.height() == 0)
        || record.section == Some(SectionDivider::BoundingDivider)
}

pub fn is_group_begin(record: &LayerRecord, policy: GroupBeginPolicy) -> bool {
    match policy {
        GroupBeginPolicy::FolderFlag => record.is_folder(),
        GroupBeginPolicy::PixelDataIrrelevant => record.pixel_data_irrelevant(),
        GroupBeginPolicy::Either => record.is_folder() || record.pixel_data_irrelevant(),
    }
}
