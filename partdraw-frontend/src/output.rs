use std::fs;
use std::path::{Path, PathBuf};

use partdraw_engine::GeneratedDrawing;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::FrontendError;

/// 批处理结束后默认写出的报告文件名。
pub const DEFAULT_REPORT_NAME: &str = "report.json";

/// 把生成的图纸写入输出目录。
#[derive(Debug, Clone)]
pub struct OutputWriter {
    directory: PathBuf,
}

impl OutputWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn ensure_directory(&self) -> Result<(), FrontendError> {
        fs::create_dir_all(&self.directory).map_err(|source| FrontendError::Write {
            path: self.directory.clone(),
            source,
        })
    }

    pub fn write_drawing(&self, drawing: &GeneratedDrawing) -> Result<PathBuf, FrontendError> {
        self.ensure_directory()?;
        let path = self.directory.join(&drawing.filename);
        fs::write(&path, &drawing.content).map_err(|source| FrontendError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = drawing.content.len(), "图纸已写出");
        Ok(path)
    }

    pub fn write_all<'a, I>(&self, drawings: I) -> Result<Vec<PathBuf>, FrontendError>
    where
        I: IntoIterator<Item = &'a GeneratedDrawing>,
    {
        drawings
            .into_iter()
            .map(|drawing| self.write_drawing(drawing))
            .collect()
    }

    /// 未给出显式路径时写到输出目录下的 `report.json`。
    pub fn default_report_path(&self) -> PathBuf {
        self.directory.join(DEFAULT_REPORT_NAME)
    }
}

/// 以缩进 JSON 写出报告，必要时创建父目录。
pub fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<(), FrontendError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| FrontendError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(report).map_err(FrontendError::Report)?;
    fs::write(path, json).map_err(|source| FrontendError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "报告已写出");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawings_land_in_nested_directory() {
        let dir = tempfile::tempdir().expect("temp dir");
        let writer = OutputWriter::new(dir.path().join("out").join("dxf"));
        let drawing = GeneratedDrawing {
            filename: "A.dxf".into(),
            content: "  0\nEOF\n".into(),
        };
        let path = writer.write_drawing(&drawing).expect("write");
        assert_eq!(fs::read_to_string(path).expect("read back"), "  0\nEOF\n");
    }

    #[test]
    fn report_is_pretty_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("reports").join("run.json");
        write_json_report(&path, &serde_json::json!({ "submitted": 2 })).expect("write report");
        let text = fs::read_to_string(&path).expect("read report");
        let value: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["submitted"], 2);
        assert!(text.contains('\n'));
    }
}
