use std::path::Path;

use image::{ColorType, ImageFormat};
use psdui_core::bitmap::AssembledBitmap;
use tracing::trace;

use crate::errors::FrontendError;

/// 将自下而上的位图按常规行序写为 PNG。
pub fn write_png(bitmap: &AssembledBitmap, path: &Path) -> Result<(), FrontendError> {
    let color = match bitmap.channels() {
        1 => ColorType::L8,
        2 => ColorType::La8,
        3 => ColorType::Rgb8,
        4 => ColorType::Rgba8,
        other => return Err(FrontendError::UnsupportedChannels(other)),
    };
    let rows = bitmap.top_down_rows();
    image::save_buffer_with_format(
        path,
        &rows,
        bitmap.width(),
        bitmap.height(),
        color,
        ImageFormat::Png,
    )
    .map_err(|source| FrontendError::Png {
        path: path.to_path_buf(),
        source,
    })?;
    trace!(path = %path.display(), width = bitmap.width(), height = bitmap.height(), "已写出 PNG");
    Ok(())
}
