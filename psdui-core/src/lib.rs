pub mod geometry {
    use glam::IVec2;
    use serde::{Deserialize, Serialize};

    /// 图层/掩码的矩形范围，`right`/`bottom` 为开区间。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Rect {
        pub top: i32,
        pub left: i32,
        pub bottom: i32,
        pub right: i32,
    }

    impl Rect {
        #[inline]
        pub fn new(top: i32, left: i32, bottom: i32, right: i32) -> Self {
            Self {
                top,
                left,
                bottom,
                right,
            }
        }

        /// 以左上角与尺寸构造矩形。
        #[inline]
        pub fn from_origin_size(left: i32, top: i32, width: i32, height: i32) -> Self {
            Self::new(top, left, top.saturating_add(height), left.saturating_add(width))
        }

        /// 宽度，倒置的矩形视为 0，超出 `i32` 的跨度截断为 `i32::MAX`。
        #[inline]
        pub fn width(self) -> i32 {
            extent(self.left, self.right)
        }

        #[inline]
        pub fn height(self) -> i32 {
            extent(self.top, self.bottom)
        }

        /// 宽或高无法用 `i32` 表示。
        pub fn exceeds_extent(self) -> bool {
            span(self.left, self.right) > i64::from(i32::MAX)
                || span(self.top, self.bottom) > i64::from(i32::MAX)
        }

        #[inline]
        pub fn is_empty(self) -> bool {
            self.width() == 0 || self.height() == 0
        }

        #[inline]
        pub fn is_inverted(self) -> bool {
            self.right < self.left || self.bottom < self.top
        }

        #[inline]
        pub fn origin(self) -> IVec2 {
            IVec2::new(self.left, self.top)
        }

        #[inline]
        pub fn size(self) -> IVec2 {
            IVec2::new(self.width(), self.height())
        }

        /// 像素数量（宽 × 高）。
        #[inline]
        pub fn pixel_count(self) -> usize {
            self.width() as usize * self.height() as usize
        }

        #[inline]
        pub fn translate(self, offset: IVec2) -> Self {
            Self::new(
                self.top.saturating_add(offset.y),
                self.left.saturating_add(offset.x),
                self.bottom.saturating_add(offset.y),
                self.right.saturating_add(offset.x),
            )
        }
    }

    #[inline]
    fn span(from: i32, to: i32) -> i64 {
        i64::from(to) - i64::from(from)
    }

    fn extent(from: i32, to: i32) -> i32 {
        span(from, to).clamp(0, i64::from(i32::MAX)) as i32
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rect_dimensions_follow_exclusive_edges() {
            let rect = Rect::new(10, 20, 40, 25);
            assert_eq!(rect.width(), 5);
            assert_eq!(rect.height(), 30);
            assert_eq!(rect.pixel_count(), 150);
            assert_eq!(rect.origin(), IVec2::new(20, 10));
            assert!(!rect.is_empty());

            let inverted = Rect::new(10, 10, 5, 20);
            assert!(inverted.is_inverted());
            assert_eq!(inverted.height(), 0);
            assert!(inverted.is_empty());
        }

        #[test]
        fn translate_moves_all_edges() {
            let rect = Rect::from_origin_size(1, 2, 3, 4).translate(IVec2::new(10, 20));
            assert_eq!(rect, Rect::new(22, 11, 26, 14));
        }

        #[test]
        fn full_range_span_is_clamped_not_overflowed() {
            let wide = Rect::new(0, i32::MIN, 1, i32::MAX);
            assert_eq!(wide.width(), i32::MAX);
            assert_eq!(wide.height(), 1);
            assert_eq!(wide.size(), IVec2::new(i32::MAX, 1));
            assert!(wide.exceeds_extent());
            assert!(!Rect::new(0, 0, 1, i32::MAX).exceeds_extent());
            assert_eq!(wide.translate(IVec2::new(0, 5)).right, i32::MAX);
        }
    }
}

pub mod document {
    use serde::{Deserialize, Serialize};

    use crate::diagnostics::Diagnostic;
    use crate::geometry::Rect;

    /// 文件头中的色彩模式。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum ColorMode {
        Bitmap,
        Grayscale,
        Indexed,
        Rgb,
        Cmyk,
        Multichannel,
        Duotone,
        Lab,
    }

    impl ColorMode {
        pub fn from_raw(value: u16) -> Option<Self> {
            match value {
                0 => Some(Self::Bitmap),
                1 => Some(Self::Grayscale),
                2 => Some(Self::Indexed),
                3 => Some(Self::Rgb),
                4 => Some(Self::Cmyk),
                7 => Some(Self::Multichannel),
                8 => Some(Self::Duotone),
                9 => Some(Self::Lab),
                _ => None,
            }
        }

        pub fn raw(self) -> u16 {
            match self {
                Self::Bitmap => 0,
                Self::Grayscale => 1,
                Self::Indexed => 2,
                Self::Rgb => 3,
                Self::Cmyk => 4,
                Self::Multichannel => 7,
                Self::Duotone => 8,
                Self::Lab => 9,
            }
        }
    }

    /// 每通道位深，仅支持 1/8/16。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum BitDepth {
        One,
        Eight,
        Sixteen,
    }

    impl BitDepth {
        pub fn from_raw(value: u16) -> Option<Self> {
            match value {
                1 => Some(Self::One),
                8 => Some(Self::Eight),
                16 => Some(Self::Sixteen),
                _ => None,
            }
        }

        pub fn bits(self) -> u16 {
            match self {
                Self::One => 1,
                Self::Eight => 8,
                Self::Sixteen => 16,
            }
        }

        /// 通道平面中每个采样占用的字节数。1 位深度按整字节存放。
        pub fn bytes_per_sample(self) -> usize {
            match self {
                Self::One | Self::Eight => 1,
                Self::Sixteen => 2,
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Header {
        pub version: u16,
        pub channel_count: u16,
        pub width: u32,
        pub height: u32,
        pub depth: BitDepth,
        pub color_mode: ColorMode,
    }

    impl Header {
        /// 构造版本 1 的 RGB 文件头，常用于测试与写出。
        pub fn rgb(width: u32, height: u32, depth: BitDepth) -> Self {
            Self {
                version: 1,
                channel_count: 4,
                width,
                height,
                depth,
                color_mode: ColorMode::Rgb,
            }
        }
    }

    /// 通道平面的压缩方式。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum Compression {
        Raw,
        Rle,
    }

    impl Compression {
        pub fn from_raw(value: u16) -> Option<Self> {
            match value {
                0 => Some(Self::Raw),
                1 => Some(Self::Rle),
                _ => None,
            }
        }

        pub fn raw(self) -> u16 {
            match self {
                Self::Raw => 0,
                Self::Rle => 1,
            }
        }
    }

    /// 通道标识：非负为颜色分量索引，-1 透明度，-2 用户掩码。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ChannelId(pub i16);

    impl ChannelId {
        pub const TRANSPARENCY: Self = Self(-1);
        pub const USER_MASK: Self = Self(-2);
        pub const RED: Self = Self(0);
        pub const GREEN: Self = Self(1);
        pub const BLUE: Self = Self(2);

        #[inline]
        pub fn get(self) -> i16 {
            self.0
        }

        /// 与图层矩形同尺寸的通道（颜色分量或透明度）。
        #[inline]
        pub fn is_layer_sized(self) -> bool {
            self.0 >= -1
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Channel {
        pub id: ChannelId,
        /// 文件中声明的压缩后字节长度（含 2 字节压缩标记）。
        pub declared_len: u32,
        pub compression: Option<Compression>,
        pub data: Option<Vec<u8>>,
    }

    impl Channel {
        pub fn new(id: ChannelId, declared_len: u32) -> Self {
            Self {
                id,
                declared_len,
                compression: None,
                data: None,
            }
        }

        /// 已解码的通道，供写出或测试直接构造。
        pub fn with_data(id: ChannelId, compression: Compression, data: Vec<u8>) -> Self {
            Self {
                id,
                declared_len: 0,
                compression: Some(compression),
                data: Some(data),
            }
        }

        #[inline]
        pub fn is_decoded(&self) -> bool {
            self.data.is_some()
        }
    }

    /// 掩码像素的加载状态。`Corrupt` 与 `NotLoaded` 需要区分：前者表示掩码存在但已损坏。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum MaskPixels {
        NotLoaded,
        Decoded(Vec<u8>),
        Corrupt { placeholder: Vec<u8>, reason: String },
    }

    impl MaskPixels {
        /// 可用于合成的平面；损坏时返回全零占位平面。
        pub fn plane(&self) -> Option<&[u8]> {
            match self {
                Self::NotLoaded => None,
                Self::Decoded(plane) => Some(plane),
                Self::Corrupt { placeholder, .. } => Some(placeholder),
            }
        }

        #[inline]
        pub fn is_corrupt(&self) -> bool {
            matches!(self, Self::Corrupt { .. })
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Mask {
        pub rect: Rect,
        pub default_color: u8,
        pub flags: u8,
        pub pixels: MaskPixels,
    }

    impl Mask {
        pub const POSITION_RELATIVE: u8 = 0x01;

        pub fn new(rect: Rect, default_color: u8, flags: u8) -> Self {
            Self {
                rect,
                default_color,
                flags,
                pixels: MaskPixels::NotLoaded,
            }
        }

        #[inline]
        pub fn position_is_relative(&self) -> bool {
            self.flags & Self::POSITION_RELATIVE != 0
        }

        /// 将掩码矩形换算为文档坐标。
        pub fn absolute_rect(&self, layer_rect: Rect) -> Rect {
            if self.position_is_relative() {
                self.rect.translate(layer_rect.origin())
            } else {
                self.rect
            }
        }
    }

    /// `lsct`/`lsdk` 分组标记类型。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum SectionDivider {
        Other,
        OpenFolder,
        ClosedFolder,
        BoundingDivider,
    }

    impl SectionDivider {
        pub fn from_raw(value: u32) -> Self {
            match value {
                1 => Self::OpenFolder,
                2 => Self::ClosedFolder,
                3 => Self::BoundingDivider,
                _ => Self::Other,
            }
        }

        pub fn raw(self) -> u32 {
            match self {
                Self::Other => 0,
                Self::OpenFolder => 1,
                Self::ClosedFolder => 2,
                Self::BoundingDivider => 3,
            }
        }

        #[inline]
        pub fn is_folder(self) -> bool {
            matches!(self, Self::OpenFolder | Self::ClosedFolder)
        }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub enum TextJustification {
        #[default]
        Left,
        Right,
        Center,
    }

    impl TextJustification {
        pub fn from_raw(value: i32) -> Self {
            match value {
                1 => Self::Right,
                2 => Self::Center,
                _ => Self::Left,
            }
        }

        pub fn raw(self) -> i32 {
            match self {
                Self::Left => 0,
                Self::Right => 1,
                Self::Center => 2,
            }
        }
    }

    /// 8 位 RGBA 颜色。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Color {
        pub r: u8,
        pub g: u8,
        pub b: u8,
        pub a: u8,
    }

    impl Color {
        pub const BLACK: Self = Self::rgba(0, 0, 0, 255);

        #[inline]
        pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
            Self { r, g, b, a }
        }

        #[inline]
        pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
            Self::rgba(r, g, b, 255)
        }

        /// 由 0..=1 浮点分量构造，越界值会被截断。
        pub fn from_unit(r: f64, g: f64, b: f64, a: f64) -> Self {
            Self::rgba(unit_to_u8(r), unit_to_u8(g), unit_to_u8(b), unit_to_u8(a))
        }

        pub fn to_unit(self) -> [f64; 4] {
            [
                f64::from(self.r) / 255.0,
                f64::from(self.g) / 255.0,
                f64::from(self.b) / 255.0,
                f64::from(self.a) / 255.0,
            ]
        }
    }

    impl Default for Color {
        fn default() -> Self {
            Self::BLACK
        }
    }

    fn unit_to_u8(value: f64) -> u8 {
        if value.is_nan() {
            return 0;
        }
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TextAttributes {
        pub content: String,
        pub font_name: String,
        pub font_size: f32,
        pub justification: TextJustification,
        pub fill_color: Color,
    }

    impl TextAttributes {
        pub fn new(content: impl Into<String>) -> Self {
            Self {
                content: content.into(),
                font_name: String::new(),
                font_size: 0.0,
                justification: TextJustification::Left,
                fill_color: Color::BLACK,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LayerRecord {
        pub name: String,
        pub rect: Rect,
        pub channels: Vec<Channel>,
        /// 四字符混合模式键，例如 `norm`。
        pub blend_mode: String,
        pub opacity: u8,
        pub clipping: u8,
        pub flags: u8,
        pub mask: Option<Mask>,
        pub section: Option<SectionDivider>,
        pub text: Option<TextAttributes>,
        pub solid_fill: Option<Color>,
    }

    impl LayerRecord {
        pub const FLAG_TRANSPARENCY_PROTECTED: u8 = 0x01;
        pub const FLAG_HIDDEN: u8 = 0x02;
        pub const FLAG_PIXEL_DATA_IRRELEVANT_VALID: u8 = 0x08;
        pub const FLAG_PIXEL_DATA_IRRELEVANT: u8 = 0x10;

        pub fn new(name: impl Into<String>, rect: Rect) -> Self {
            Self {
                name: name.into(),
                rect,
                channels: Vec::new(),
                blend_mode: "norm".to_string(),
                opacity: 255,
                clipping: 0,
                flags: 0,
                mask: None,
                section: None,
                text: None,
                solid_fill: None,
            }
        }

        #[inline]
        pub fn visible(&self) -> bool {
            self.flags & Self::FLAG_HIDDEN == 0
        }

        pub fn set_visible(&mut self, visible: bool) {
            if visible {
                self.flags &= !Self::FLAG_HIDDEN;
            } else {
                self.flags |= Self::FLAG_HIDDEN;
            }
        }

        /// 像素数据对外观无意义（通常为分组标记）。
        #[inline]
        pub fn pixel_data_irrelevant(&self) -> bool {
            self.flags & Self::FLAG_PIXEL_DATA_IRRELEVANT != 0
        }

        pub fn set_pixel_data_irrelevant(&mut self, irrelevant: bool) {
            if irrelevant {
                self.flags |=
                    Self::FLAG_PIXEL_DATA_IRRELEVANT | Self::FLAG_PIXEL_DATA_IRRELEVANT_VALID;
            } else {
                self.flags &= !Self::FLAG_PIXEL_DATA_IRRELEVANT;
            }
        }

        #[inline]
        pub fn is_text_layer(&self) -> bool {
            self.text.is_some()
        }

        #[inline]
        pub fn is_folder(&self) -> bool {
            self.section.is_some_and(SectionDivider::is_folder)
        }

        #[inline]
        pub fn width(&self) -> i32 {
            self.rect.width()
        }

        #[inline]
        pub fn height(&self) -> i32 {
            self.rect.height()
        }

        pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
            self.channels.iter().find(|channel| channel.id == id)
        }

        pub fn has_mask_channel(&self) -> bool {
            self.channel(ChannelId::USER_MASK).is_some()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Document {
        pub header: Header,
        pub layers: Vec<LayerRecord>,
        /// 解析时是否读取了通道像素数据。
        pub has_channel_data: bool,
        #[serde(default)]
        pub diagnostics: Vec<Diagnostic>,
    }

    impl Document {
        pub fn new(header: Header) -> Self {
            Self {
                header,
                layers: Vec::new(),
                has_channel_data: true,
                diagnostics: Vec::new(),
            }
        }

        #[inline]
        pub fn width(&self) -> u32 {
            self.header.width
        }

        #[inline]
        pub fn height(&self) -> u32 {
            self.header.height
        }

        #[inline]
        pub fn depth(&self) -> BitDepth {
            self.header.depth
        }

        pub fn layers(&self) -> &[LayerRecord] {
            &self.layers
        }

        pub fn push_layer(&mut self, layer: LayerRecord) {
            self.layers.push(layer);
        }

        pub fn layer_by_name(&self, name: &str) -> Option<&LayerRecord> {
            self.layers.iter().find(|layer| layer.name == name)
        }

        pub fn diagnostics(&self) -> &[Diagnostic] {
            &self.diagnostics
        }
    }

}

pub mod diagnostics {
    use std::fmt::{Display, Formatter};

    use serde::{Deserialize, Serialize};

    /// 解析或建树过程中可恢复的异常情况，不会中断整体流程。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Diagnostic {
        MaskDecodeFailed {
            layer: String,
            offset: u64,
            reason: String,
        },
        UnknownMetadataTag {
            layer: String,
            tag: String,
            offset: u64,
        },
        MetadataDecodeFailed {
            layer: String,
            tag: String,
            reason: String,
        },
        ChannelUndecodable {
            layer: String,
            channel: i16,
            reason: String,
        },
        GroupUnderflow {
            layer: String,
            index: usize,
        },
        UnclosedGroup {
            name: String,
        },
        /// 分组嵌套超过上限，该分组被展平到上一层。
        GroupTooDeep {
            layer: String,
            depth: usize,
        },
        /// 图层名无法映射为输出目录内的文件名，图层未导出。
        UnusableImageName {
            layer: String,
        },
    }

    impl Diagnostic {
        pub fn layer_name(&self) -> &str {
            match self {
                Self::MaskDecodeFailed { layer, .. }
                | Self::UnknownMetadataTag { layer, .. }
                | Self::MetadataDecodeFailed { layer, .. }
                | Self::ChannelUndecodable { layer, .. }
                | Self::GroupUnderflow { layer, .. }
                | Self::GroupTooDeep { layer, .. }
                | Self::UnusableImageName { layer } => layer,
                Self::UnclosedGroup { name } => name,
            }
        }
    }

    impl Display for Diagnostic {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::MaskDecodeFailed {
                    layer,
                    offset,
                    reason,
                } => write!(f, "图层 {layer} 的掩码解码失败（偏移 {offset}）：{reason}"),
                Self::UnknownMetadataTag { layer, tag, offset } => {
                    write!(f, "图层 {layer} 含未识别的附加信息块 {tag}（偏移 {offset}）")
                }
                Self::MetadataDecodeFailed { layer, tag, reason } => {
                    write!(f, "图层 {layer} 的附加信息块 {tag} 解析失败：{reason}")
                }
                Self::ChannelUndecodable {
                    layer,
                    channel,
                    reason,
                } => write!(f, "图层 {layer} 的通道 {channel} 无法解码：{reason}"),
                Self::GroupUnderflow { layer, index } => {
                    write!(f, "第 {index} 条记录 {layer} 关闭了不存在的分组")
                }
                Self::UnclosedGroup { name } => write!(f, "分组 {name} 缺少结束标记"),
                Self::GroupTooDeep { layer, depth } => {
                    write!(f, "分组 {layer} 的嵌套深度超过 {depth}，已展平")
                }
                Self::UnusableImageName { layer } => {
                    write!(f, "图层 {layer} 无法生成合法的文件名，已跳过")
                }
            }
        }
    }
}

pub mod import {
    use serde::{Deserialize, Serialize};

    /// 图层树中分组嵌套的默认上限，更深的分组被展平。
    pub const DEFAULT_MAX_GROUP_DEPTH: usize = 64;

    /// 判定一条图层记录是否开启新分组的策略。
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum GroupBeginPolicy {
        /// 分组标记（`lsct`/`lsdk` 为打开或关闭的文件夹）。
        FolderFlag,
        /// 像素数据无关标志位。
        PixelDataIrrelevant,
        /// 任一条件成立即可。
        #[default]
        Either,
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn policy_uses_snake_case_names() {
            let value = serde_json::to_value(GroupBeginPolicy::PixelDataIrrelevant).expect("序列化策略失败");
            assert_eq!(value, serde_json::json!("pixel_data_irrelevant"));
            assert_eq!(GroupBeginPolicy::default(), GroupBeginPolicy::Either);
        }
    }
}

pub mod tree {
    use glam::IVec2;
    use serde::{Deserialize, Serialize};

    use crate::document::{LayerRecord, TextAttributes};
    use crate::geometry::Rect;

    /// 节点在 `LayerTree` 中的下标。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NodeId(usize);

    impl NodeId {
        #[inline]
        pub fn index(self) -> usize {
            self.0
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LayerNode {
        pub name: String,
        pub visible: bool,
        pub rect: Rect,
        pub position: IVec2,
        pub size: IVec2,
        pub text: Option<TextAttributes>,
        /// 仅分组节点持有子节点列表。
        pub children: Option<Vec<NodeId>>,
        /// 非拥有的父节点索引，仅用于遍历。
        pub parent: Option<NodeId>,
    }

    impl LayerNode {
        pub fn group(name: impl Into<String>, visible: bool, rect: Rect) -> Self {
            Self {
                name: name.into(),
                visible,
                rect,
                position: rect.origin(),
                size: rect.size(),
                text: None,
                children: Some(Vec::new()),
                parent: None,
            }
        }

        pub fn leaf(record: &LayerRecord) -> Self {
            Self {
                name: record.name.clone(),
                visible: record.visible(),
                rect: record.rect,
                position: record.rect.origin(),
                size: record.rect.size(),
                text: record.text.clone(),
                children: None,
                parent: None,
            }
        }

        #[inline]
        pub fn is_group(&self) -> bool {
            self.children.is_some()
        }

        #[inline]
        pub fn is_text(&self) -> bool {
            self.text.is_some()
        }
    }

    /// 以 arena 方式保存的图层树，节点之间仅通过 `NodeId` 关联。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct LayerTree {
        nodes: Vec<LayerNode>,
        root: NodeId,
    }

    impl LayerTree {
        /// 创建只包含根节点的树，根节点尺寸为整个画布。
        pub fn new(root_name: impl Into<String>, canvas_size: IVec2) -> Self {
            let mut root = LayerNode::group(root_name, true, Rect::default());
            root.size = canvas_size;
            Self {
                nodes: vec![root],
                root: NodeId(0),
            }
        }

        #[inline]
        pub fn root(&self) -> NodeId {
            self.root
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.nodes.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.nodes.len() <= 1
        }

        pub fn node(&self, id: NodeId) -> Option<&LayerNode> {
            self.nodes.get(id.0)
        }

        pub fn root_node(&self) -> &LayerNode {
            &self.nodes[self.root.0]
        }

        /// 将节点挂到 `parent` 下。若 `parent` 不是分组节点，则挂到根节点。
        pub fn push_child(&mut self, parent: NodeId, mut node: LayerNode) -> NodeId {
            let parent = match self.nodes.get(parent.0) {
                Some(candidate) if candidate.is_group() => parent,
                _ => self.root,
            };
            let id = NodeId(self.nodes.len());
            node.parent = Some(parent);
            self.nodes.push(node);
            if let Some(children) = self.nodes[parent.0].children.as_mut() {
                children.push(id);
            }
            id
        }

        pub fn reverse_children(&mut self, id: NodeId) {
            if let Some(children) = self.nodes.get_mut(id.0).and_then(|n| n.children.as_mut()) {
                children.reverse();
            }
        }

        pub fn children(&self, id: NodeId) -> &[NodeId] {
            self.node(id)
                .and_then(|node| node.children.as_deref())
                .unwrap_or(&[])
        }

        pub fn parent(&self, id: NodeId) -> Option<NodeId> {
            self.node(id).and_then(|node| node.parent)
        }

        /// 深度优先（先序）遍历，返回节点及其深度（根为 0）。
        pub fn walk(&self) -> Vec<(NodeId, usize)> {
            let mut order = Vec::with_capacity(self.nodes.len());
            let mut pending = vec![(self.root, 0usize)];
            while let Some((id, depth)) = pending.pop() {
                order.push((id, depth));
                for child in self.children(id).iter().rev() {
                    pending.push((*child, depth + 1));
                }
            }
            order
        }

        /// 非分组节点数量。
        pub fn leaf_count(&self) -> usize {
            self.nodes.iter().filter(|node| !node.is_group()).count()
        }

        /// 分组嵌套的最大深度，根节点不计入。
        pub fn group_depth(&self) -> usize {
            self.walk()
                .into_iter()
                .filter(|(id, _)| *id != self.root && self.nodes[id.0].is_group())
                .map(|(_, depth)| depth)
                .max()
                .unwrap_or(0)
        }

        /// 根节点到指定节点的名称路径。
        pub fn path_of(&self, id: NodeId) -> Vec<&str> {
            let mut path = Vec::new();
            let mut cursor = Some(id);
            while let Some(current) = cursor {
                let Some(node) = self.node(current) else {
                    break;
                };
                path.push(node.name.as_str());
                cursor = node.parent;
            }
            path.reverse();
            path
        }

        /// 转换为嵌套结构，便于按值交给 UI 层或序列化为 JSON。
        ///
        /// 按先序遍历的逆序自底向上构建，不依赖调用栈深度。
        pub fn to_nested(&self) -> NestedLayer {
            let mut built: Vec<Option<NestedLayer>> = vec![None; self.nodes.len()];
            for (id, _) in self.walk().into_iter().rev() {
                let children = self.nodes[id.0].children.as_ref().map(|children| {
                    children
                        .iter()
                        .filter_map(|child| built[child.0].take())
                        .collect()
                });
                built[id.0] = Some(self.nested_node(id, children));
            }
            built[self.root.0]
                .take()
                .unwrap_or_else(|| self.nested_node(self.root, Some(Vec::new())))
        }

        fn nested_node(&self, id: NodeId, children: Option<Vec<NestedLayer>>) -> NestedLayer {
            let node = &self.nodes[id.0];
            NestedLayer {
                name: node.name.clone(),
                visible: node.visible,
                position: [node.position.x, node.position.y],
                size: [node.size.x, node.size.y],
                text: node.text.clone(),
                children,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct NestedLayer {
        pub name: String,
        pub visible: bool,
        pub position: [i32; 2],
        pub size: [i32; 2],
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text: Option<TextAttributes>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub children: Option<Vec<NestedLayer>>,
    }

}

pub mod bitmap {
    use serde::{Deserialize, Serialize};

    /// 按通道交错、自下而上行序排列的位图，创建后不可修改。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AssembledBitmap {
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    }

    impl AssembledBitmap {
        /// 长度不等于 `width * height * channels` 时返回 `None`。
        pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Option<Self> {
            let expected = width as usize * height as usize * channels as usize;
            if data.len() != expected {
                return None;
            }
            Some(Self {
                width,
                height,
                channels,
                data,
            })
        }

        #[inline]
        pub fn width(&self) -> u32 {
            self.width
        }

        #[inline]
        pub fn height(&self) -> u32 {
            self.height
        }

        #[inline]
        pub fn channels(&self) -> u8 {
            self.channels
        }

        pub fn data(&self) -> &[u8] {
            &self.data
        }

        pub fn into_data(self) -> Vec<u8> {
            self.data
        }

        /// 第 `y` 行（0 为最底行）。
        pub fn row(&self, y: u32) -> Option<&[u8]> {
            if y >= self.height {
                return None;
            }
            let stride = self.width as usize * self.channels as usize;
            let start = y as usize * stride;
            Some(&self.data[start..start + stride])
        }

        /// 以自上而下的行序复制数据，供常规图像编码器使用。
        pub fn top_down_rows(&self) -> Vec<u8> {
            let mut flipped = Vec::with_capacity(self.data.len());
            for y in (0..self.height).rev() {
                if let Some(row) = self.row(y) {
                    flipped.extend_from_slice(row);
                }
            }
            flipped
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn rejects_mismatched_length() {
            assert!(AssembledBitmap::new(2, 2, 4, vec![0; 15]).is_none());
            assert!(AssembledBitmap::new(2, 2, 4, vec![0; 16]).is_some());
        }

        #[test]
        fn top_down_rows_reverse_row_order() {
            let bitmap = AssembledBitmap::new(1, 3, 1, vec![1, 2, 3]).expect("尺寸匹配");
            assert_eq!(bitmap.row(0), Some(&[1u8][..]));
            assert_eq!(bitmap.row(3), None);
            assert_eq!(bitmap.top_down_rows(), vec![3, 2, 1]);
        }
    }
}
