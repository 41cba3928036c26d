use std::path::PathBuf;

use psdui_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Load(#[from] IoError),
    #[error("位图通道数 {0} 无法编码为 PNG")]
    UnsupportedChannels(u8),
    #[error("写出 PNG {path:?} 失败: {source}")]
    Png {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("文件操作 {path:?} 失败: {source}")]
    Fs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("无法从 {0:?} 推导图层树根节点名称")]
    NoFileStem(PathBuf),
    #[error("序列化图层树失败: {0}")]
    Json(#[from] serde_json::Error),
}
