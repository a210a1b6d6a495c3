use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV_VAR: &str = "PARTDRAW_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件：优先读取环境变量 `PARTDRAW_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 生成图纸的落盘位置。
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_directory")]
    pub directory: PathBuf,
}

impl OutputConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from("output")
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: Self::default_directory(),
        }
    }
}

/// 批处理重名策略；配置层不依赖引擎，由前端映射为 `DuplicatePolicy`。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateNames {
    #[default]
    Suffix,
    Overwrite,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub duplicate_names: DuplicateNames,
    /// 批处理结束后是否在输出目录写出 `report.json`。
    #[serde(default)]
    pub write_report: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.output.directory, PathBuf::from("output"));
        assert_eq!(cfg.batch.duplicate_names, DuplicateNames::Suffix);
        assert!(!cfg.batch.write_report);
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [output]
            directory = "/tmp/drawings"

            [batch]
            duplicate_names = "overwrite"
            write_report = true
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.output.directory, PathBuf::from("/tmp/drawings"));
        assert_eq!(cfg.batch.duplicate_names, DuplicateNames::Overwrite);
        assert!(cfg.batch.write_report);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg = AppConfig::from_toml_str("[batch]\nwrite_report = true\n").expect("parse");
        assert!(cfg.batch.write_report);
        assert_eq!(cfg.batch.duplicate_names, DuplicateNames::Suffix);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn invalid_policy_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[batch]\nduplicate_names = \"rename\"").unwrap();

        let err = AppConfig::from_file(file.path()).expect_err("unknown policy");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().starts_with("解析配置文件"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = AppConfig::from_file(dir.path().join("absent.toml")).expect_err("missing");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
