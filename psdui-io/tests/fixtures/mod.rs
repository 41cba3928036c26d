use psdui_core::document::{
    BitDepth, Channel, ChannelId, Compression, Document, Header, LayerRecord, Mask, MaskPixels,
    SectionDivider,
};
use psdui_core::geometry::Rect;
use psdui_io::writer::write_document;

/// 每个通道填充同一个采样值的 RGBA 图层。
pub fn solid_layer(
    name: &str,
    rect: Rect,
    depth: BitDepth,
    compression: Compression,
    rgba: [u8; 4],
) -> LayerRecord {
    let mut layer = LayerRecord::new(name, rect);
    let samples = rect.pixel_count() * depth.bytes_per_sample();
    let ids = [ChannelId::TRANSPARENCY, ChannelId::RED, ChannelId::GREEN, ChannelId::BLUE];
    let values = [rgba[3], rgba[0], rgba[1], rgba[2]];
    for (id, value) in ids.into_iter().zip(values) {
        layer
            .channels
            .push(Channel::with_data(id, compression, vec![value; samples]));
    }
    layer
}

/// 存储顺序自下而上：分组结束标记、`icon`、分组 `buttons`。
pub fn icon_document() -> Document {
    let mut document = Document::new(Header::rgb(8, 8, BitDepth::Eight));

    let mut end = LayerRecord::new("</Layer group>", Rect::default());
    end.section = Some(SectionDivider::BoundingDivider);
    document.push_layer(end);

    document.push_layer(solid_layer(
        "icon",
        Rect::new(2, 2, 6, 6),
        BitDepth::Eight,
        Compression::Rle,
        [10, 20, 30, 40],
    ));

    let mut folder = LayerRecord::new("buttons", Rect::default());
    folder.section = Some(SectionDivider::OpenFolder);
    folder.set_pixel_data_irrelevant(true);
    document.push_layer(folder);
    document
}

/// 单个图层，带有一个原始编码、内容为 `MASK_MARKER` 的 1x4 掩码。
pub fn masked_document() -> Document {
    let mut document = Document::new(Header::rgb(4, 4, BitDepth::Eight));
    let mut layer = solid_layer(
        "shadow",
        Rect::new(0, 0, 4, 4),
        BitDepth::Eight,
        Compression::Rle,
        [0, 0, 0, 128],
    );
    let mut mask = Mask::new(Rect::new(0, 0, 1, 4), 255, 0);
    mask.pixels = MaskPixels::Decoded(MASK_MARKER.to_vec());
    layer.mask = Some(mask);
    layer
        .channels
        .push(Channel::with_data(ChannelId::USER_MASK, Compression::Raw, Vec::new()));
    document.push_layer(layer);
    document
}

pub const MASK_MARKER: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

pub fn encode(document: &Document) -> Vec<u8> {
    write_document(document).expect("写出测试文档失败")
}

/// 定位某段原始编码平面（压缩标记 + 数据）在字节流中的位置。
pub fn find_raw_plane(bytes: &[u8], data: &[u8]) -> usize {
    let mut needle = vec![0, 0];
    needle.extend_from_slice(data);
    bytes
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
        .expect("未找到目标通道平面")
}
