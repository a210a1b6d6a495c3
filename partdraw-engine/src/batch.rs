//! 批量出图：逐行运行管线，单行失败只跳过该行。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coerce::require_text;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::emitter::GeneratedDrawing;
use crate::errors::PipelineError;
use crate::keys::{CanonicalKey, normalize_record};
use crate::pipeline::Pipeline;
use crate::record::RawRecord;

/// 批处理中文件名冲突时的处理方式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// 追加 `_2`、`_3`… 后缀。
    #[default]
    Suffix,
    /// 后出现的行替换先前的结果。
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    pub duplicate_policy: DuplicatePolicy,
}

/// 成功的一行。`row` 从 1 开始，对应输入顺序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub row: usize,
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    pub row: usize,
    pub part_name: Option<String>,
    pub error: PipelineError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// 没有可处理的行。
    Empty,
    AllFailed,
    Partial,
    Complete,
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub submitted: usize,
    /// 所有值都为空的行，不参与处理。
    pub blank_rows: usize,
    pub entries: Vec<BatchEntry>,
    pub skipped: Vec<SkippedRow>,
    pub diagnostics: Diagnostics,
}

impl BatchResult {
    pub fn processed(&self) -> usize {
        self.submitted - self.blank_rows
    }

    pub fn outcome(&self) -> BatchOutcome {
        if self.processed() == 0 {
            BatchOutcome::Empty
        } else if self.skipped.is_empty() {
            BatchOutcome::Complete
        } else if self.entries.is_empty() {
            BatchOutcome::AllFailed
        } else {
            BatchOutcome::Partial
        }
    }

    pub fn drawings(&self) -> impl Iterator<Item = GeneratedDrawing> + '_ {
        self.entries.iter().map(|entry| GeneratedDrawing {
            filename: entry.filename.clone(),
            content: entry.content.clone(),
        })
    }

    pub fn report(&self) -> BatchReport<'_> {
        BatchReport {
            outcome: self.outcome(),
            submitted: self.submitted,
            blank_rows: self.blank_rows,
            generated: self
                .entries
                .iter()
                .map(|entry| ReportEntry {
                    row: entry.row,
                    filename: &entry.filename,
                    bytes: entry.content.len(),
                })
                .collect(),
            skipped: self
                .skipped
                .iter()
                .map(|skip| ReportSkip {
                    row: skip.row,
                    part_name: skip.part_name.as_deref(),
                    error: skip.error.to_string(),
                })
                .collect(),
            diagnostics: &self.diagnostics,
        }
    }
}

/// 可序列化的批处理摘要（不含图纸内容）。
#[derive(Debug, Serialize)]
pub struct BatchReport<'a> {
    pub outcome: BatchOutcome,
    pub submitted: usize,
    pub blank_rows: usize,
    pub generated: Vec<ReportEntry<'a>>,
    pub skipped: Vec<ReportSkip<'a>>,
    pub diagnostics: &'a Diagnostics,
}

#[derive(Debug, Serialize)]
pub struct ReportEntry<'a> {
    pub row: usize,
    pub filename: &'a str,
    pub bytes: usize,
}

#[derive(Debug, Serialize)]
pub struct ReportSkip<'a> {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_name: Option<&'a str>,
    pub error: String,
}

pub struct BatchRunner<'p> {
    pipeline: &'p Pipeline,
    options: BatchOptions,
}

impl<'p> BatchRunner<'p> {
    pub fn new(pipeline: &'p Pipeline) -> Self {
        Self::with_options(pipeline, BatchOptions::default())
    }

    pub fn with_options(pipeline: &'p Pipeline, options: BatchOptions) -> Self {
        Self { pipeline, options }
    }

    /// `overrides` 归一化后覆盖每一行的同名字段；空白的覆盖值不生效。
    pub fn run(&self, records: &[RawRecord], overrides: &RawRecord) -> BatchResult {
        let overrides = normalize_record(overrides);
        let mut result = BatchResult {
            submitted: records.len(),
            ..BatchResult::default()
        };
        let mut by_filename: HashMap<String, usize> = HashMap::new();

        for (index, record) in records.iter().enumerate() {
            let row = index + 1;
            if record.is_blank() {
                result.blank_rows += 1;
                continue;
            }
            result.diagnostics.set_row(Some(row));

            let mut normalized = normalize_record(record);
            normalized.apply_overrides(&overrides);

            match self
                .pipeline
                .generate_normalized(&normalized, &mut result.diagnostics)
            {
                Ok(drawing) => self.place(&mut result, &mut by_filename, row, drawing),
                Err(error) => {
                    warn!(row, error = %error, "跳过该行");
                    result.diagnostics.warn(
                        DiagnosticKind::RowSkipped,
                        format!("第 {row} 行已跳过: {error}"),
                    );
                    result.skipped.push(SkippedRow {
                        row,
                        part_name: require_text(&normalized, CanonicalKey::PartName).ok(),
                        error,
                    });
                }
            }
        }
        result.diagnostics.set_row(None);

        info!(
            submitted = result.submitted,
            generated = result.entries.len(),
            skipped = result.skipped.len(),
            outcome = ?result.outcome(),
            "批处理完成"
        );
        result
    }

    fn place(
        &self,
        result: &mut BatchResult,
        by_filename: &mut HashMap<String, usize>,
        row: usize,
        drawing: GeneratedDrawing,
    ) {
        let GeneratedDrawing { filename, content } = drawing;
        let Some(&existing) = by_filename.get(&filename) else {
            by_filename.insert(filename.clone(), result.entries.len());
            result.entries.push(BatchEntry {
                row,
                filename,
                content,
            });
            return;
        };

        match self.options.duplicate_policy {
            DuplicatePolicy::Overwrite => {
                let replaced = result.entries[existing].row;
                result.diagnostics.warn(
                    DiagnosticKind::DuplicateFilename {
                        filename: filename.clone(),
                    },
                    format!("{filename} 与第 {replaced} 行重名，已覆盖"),
                );
                result.entries[existing] = BatchEntry {
                    row,
                    filename,
                    content,
                };
            }
            DuplicatePolicy::Suffix => {
                let unique = next_free_name(&filename, by_filename);
                result.diagnostics.info(
                    DiagnosticKind::DuplicateFilename {
                        filename: filename.clone(),
                    },
                    format!("{filename} 重名，改存为 {unique}"),
                );
                by_filename.insert(unique.clone(), result.entries.len());
                result.entries.push(BatchEntry {
                    row,
                    filename: unique,
                    content,
                });
            }
        }
    }
}

/// `NAME.dxf` → 第一个未被占用的 `NAME_2.dxf`、`NAME_3.dxf`…
fn next_free_name(filename: &str, taken: &HashMap<String, usize>) -> String {
    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, extension)) => (stem, format!(".{extension}")),
        None => (filename, String::new()),
    };
    (2..)
        .map(|counter| format!("{stem}_{counter}{extension}"))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| filename.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str) -> RawRecord {
        RawRecord::new()
            .with("part_name", name)
            .with("shape", "rectangle")
            .with("width", 10.0)
            .with("height", 20.0)
    }

    #[test]
    fn suffixes_skip_names_already_taken() {
        let mut taken = HashMap::new();
        taken.insert("A.dxf".to_string(), 0);
        taken.insert("A_2.dxf".to_string(), 1);
        assert_eq!(next_free_name("A.dxf", &taken), "A_3.dxf");
        assert_eq!(next_free_name("plain", &HashMap::new()), "plain_2");
    }

    #[test]
    fn overwrite_policy_keeps_last_row() {
        let pipeline = Pipeline::new();
        let runner = BatchRunner::with_options(
            &pipeline,
            BatchOptions {
                duplicate_policy: DuplicatePolicy::Overwrite,
            },
        );
        let records = vec![part("A"), part("B"), part("A")];
        let result = runner.run(&records, &RawRecord::new());

        assert_eq!(result.outcome(), BatchOutcome::Complete);
        let rows: Vec<(usize, &str)> = result
            .entries
            .iter()
            .map(|entry| (entry.row, entry.filename.as_str()))
            .collect();
        assert_eq!(rows, vec![(3, "A.dxf"), (2, "B.dxf")]);
        assert_eq!(result.diagnostics.warnings().count(), 1);
    }

    #[test]
    fn blank_rows_are_ignored() {
        let pipeline = Pipeline::new();
        let blank = RawRecord::new().with("part_name", "  ").with("shape", "");
        let result = BatchRunner::new(&pipeline).run(&[blank, part("X")], &RawRecord::new());
        assert_eq!(result.submitted, 2);
        assert_eq!(result.blank_rows, 1);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].row, 2);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn report_lists_rows_without_content() {
        let pipeline = Pipeline::new();
        let records = vec![part("A"), RawRecord::new().with("part_name", "B")];
        let result = BatchRunner::new(&pipeline).run(&records, &RawRecord::new());
        let report = serde_json::to_value(result.report()).expect("report serializes");

        assert_eq!(report["outcome"], "partial");
        assert_eq!(report["generated"][0]["filename"], "A.dxf");
        assert_eq!(report["skipped"][0]["row"], 2);
        assert_eq!(report["skipped"][0]["part_name"], "B");
        assert_eq!(report["skipped"][0]["error"], "missing required field: shape");
        assert!(report["generated"][0].get("content").is_none());
    }
}
