//! 显式诊断收集器：各阶段把非致命问题写入这里，而不是依赖进程级日志。
//! 每条诊断同时以 `tracing` 事件输出，方便宿主进程统一观察。

use serde::Serialize;
use tracing::{info, warn};

use crate::coerce::CoercionSource;
use crate::keys::CanonicalKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// 字段存在但无法解析，使用了默认值。
    DefaultSubstituted {
        field: CanonicalKey,
        source: CoercionSource,
    },
    /// 重量计算失败，已改用诊断文字。
    WeightCalculation,
    /// 批处理中跳过了该行。
    RowSkipped,
    /// 批处理中文件名冲突。
    DuplicateFilename { filename: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    #[serde(skip)]
    row: Option<usize>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置后续诊断所属的行号（批处理使用，单条模式为 `None`）。
    pub fn set_row(&mut self, row: Option<usize>) {
        self.row = row;
    }

    pub fn push(&mut self, severity: Severity, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => info!(row = ?self.row, "{message}"),
            Severity::Warning => warn!(row = ?self.row, "{message}"),
        }
        self.entries.push(Diagnostic {
            row: self.row,
            severity,
            kind,
            message,
        });
    }

    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Severity::Warning, kind, message);
    }

    pub fn info(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Severity::Info, kind, message);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|entry| entry.severity == Severity::Warning)
    }

    pub fn for_row(&self, row: usize) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(move |entry| entry.row == Some(row))
    }
}
