use std::path::PathBuf;

use partdraw_engine::PipelineError;
use partdraw_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("无法读取记录文件 {path:?}: {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("记录文件 {path:?} 不是有效的 JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("记录文件 {path:?} 不是有效的 CSV: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("不支持的记录文件类型 {path:?}（仅支持 .json/.csv）")]
    UnsupportedSource { path: PathBuf },
    #[error("参数 `{0}` 不是 key=value 形式")]
    InvalidAssignment(String),
    #[error("写出 {path:?} 失败: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("序列化报告失败: {0}")]
    Report(#[source] serde_json::Error),
    #[error(transparent)]
    Dxf(#[from] IoError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
