use std::path::{Path, PathBuf};

use partdraw_config::{AppConfig, DuplicateNames};
use partdraw_core::document::{DimensionKind, Document, Entity};
use partdraw_core::geometry::Point2;
use partdraw_engine::{
    BatchOptions, BatchResult, BatchRunner, Diagnostics, DuplicatePolicy, GeneratedDrawing,
    Pipeline,
};
use partdraw_io::{DocumentLoader, DxfFacade};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::FrontendError;
use crate::loader::{load_records, parse_assignments};
use crate::output::{OutputWriter, write_json_report};

/// 命令执行所需的共享状态：管线、输出目录与报告设置。
pub struct CliContext {
    pub pipeline: Pipeline,
    pub output: OutputWriter,
    pub batch_options: BatchOptions,
    report_path: Option<PathBuf>,
    write_report: bool,
}

impl CliContext {
    /// 命令行参数优先于配置文件。
    pub fn from_config(
        config: &AppConfig,
        output_override: Option<PathBuf>,
        report_override: Option<PathBuf>,
    ) -> Self {
        let directory = output_override.unwrap_or_else(|| config.output.directory.clone());
        Self {
            pipeline: Pipeline::new(),
            output: OutputWriter::new(directory),
            batch_options: BatchOptions {
                duplicate_policy: duplicate_policy(config.batch.duplicate_names),
            },
            report_path: report_override,
            write_report: config.batch.write_report,
        }
    }

    fn report_target(&self) -> Option<PathBuf> {
        match &self.report_path {
            Some(path) => Some(path.clone()),
            None if self.write_report => Some(self.output.default_report_path()),
            None => None,
        }
    }
}

pub fn duplicate_policy(names: DuplicateNames) -> DuplicatePolicy {
    match names {
        DuplicateNames::Suffix => DuplicatePolicy::Suffix,
        DuplicateNames::Overwrite => DuplicatePolicy::Overwrite,
    }
}

#[derive(Debug, Serialize)]
struct GenerateReport<'a> {
    filename: &'a str,
    diagnostics: &'a Diagnostics,
}

/// 单条记录出图：任何错误都直接返回。
pub fn run_generate(
    context: &CliContext,
    assignments: &[String],
) -> Result<PathBuf, FrontendError> {
    let record = parse_assignments(assignments)?;
    let mut diagnostics = Diagnostics::new();
    let drawing = context.pipeline.generate(&record, &mut diagnostics)?;
    let path = context.output.write_drawing(&drawing)?;

    println!("已生成图纸：{}", path.display());
    print_diagnostics(&diagnostics);

    if let Some(report_path) = &context.report_path {
        write_json_report(
            report_path,
            &GenerateReport {
                filename: &drawing.filename,
                diagnostics: &diagnostics,
            },
        )?;
    }
    Ok(path)
}

/// 批量出图：读取记录文件，`--set` 覆盖值作用于每一行，失败的行被跳过。
pub fn run_batch(
    context: &CliContext,
    source: &Path,
    overrides: &[String],
) -> Result<BatchResult, FrontendError> {
    let records = load_records(source)?;
    let overrides = parse_assignments(overrides)?;
    let runner = BatchRunner::with_options(&context.pipeline, context.batch_options);
    let result = runner.run(&records, &overrides);

    let drawings: Vec<GeneratedDrawing> = result.drawings().collect();
    let written = context.output.write_all(&drawings)?;
    info!(
        directory = %context.output.directory().display(),
        files = written.len(),
        "批处理输出完成"
    );

    println!(
        "批处理 {}：共 {} 行，生成 {} 个图纸，跳过 {} 行，空行 {} 行",
        source.display(),
        result.submitted,
        result.entries.len(),
        result.skipped.len(),
        result.blank_rows
    );
    for entry in &result.entries {
        println!("  - 第 {} 行 -> {}", entry.row, entry.filename);
    }
    for skip in &result.skipped {
        println!(
            "  - 第 {} 行已跳过 ({}): {}",
            skip.row,
            skip.part_name.as_deref().unwrap_or("<未命名>"),
            skip.error
        );
    }

    if let Some(report_path) = context.report_target() {
        write_json_report(&report_path, &result.report())?;
    }
    Ok(result)
}

/// 读取 DXF 并打印图层与实体概览。
pub fn run_inspect(path: &Path) -> Result<Document, FrontendError> {
    let document = DxfFacade::new().load(path)?;
    info!(
        path = %path.display(),
        layers = document.layers().count(),
        entities = document.entities().count(),
        "DXF 文档统计"
    );
    println!("DXF 文档：{}", path.display());
    for line in describe_document(&document) {
        println!("{line}");
    }
    Ok(document)
}

pub fn describe_document(document: &Document) -> Vec<String> {
    let mut lines = vec!["图层：".to_string()];
    for layer in document.layers() {
        lines.push(format!(
            "  - {} (颜色: {}, 可见: {})",
            layer.name, layer.color, layer.is_visible
        ));
    }
    let styles: Vec<String> = document
        .dimension_styles()
        .map(|style| format!("{} (字高 {:.2})", style.name, style.text_height))
        .collect();
    if !styles.is_empty() {
        lines.push(format!("标注样式：{}", styles.join(", ")));
    }

    lines.push("实体：".to_string());
    for (id, entity) in document.entities() {
        let line = match entity {
            Entity::Polyline(polyline) => {
                let coords: Vec<String> = polyline
                    .vertices
                    .iter()
                    .map(|vertex| format_point(vertex.position))
                    .collect();
                format!(
                    "  - 多段线 #{}, Layer={}, 顶点数={}, 闭合={}, 顶点={}",
                    id.get(),
                    polyline.layer,
                    polyline.vertices.len(),
                    if polyline.is_closed { "是" } else { "否" },
                    coords.join(" -> ")
                )
            }
            Entity::Text(text) => format!(
                "  - 文字 #{}, Layer={}, 插入点={}, 高度={:.2}, 内容=\"{}\"",
                id.get(),
                text.layer,
                format_point(text.insert),
                text.height,
                text.content
            ),
            Entity::Dimension(dimension) => {
                let kind_label = match dimension.kind {
                    DimensionKind::Linear => "线性".to_string(),
                    DimensionKind::Aligned => "对齐".to_string(),
                    DimensionKind::Unknown(code) => format!("未知({code})"),
                };
                format!(
                    "  - 尺寸 #{}, Layer={}, 类型={}, 尺寸线={} -> {}, 测量值={:.2}, 样式={}",
                    id.get(),
                    dimension.layer,
                    kind_label,
                    format_point(dimension.dimension_line_start()),
                    format_point(dimension.definition_point),
                    dimension.measurement,
                    dimension.style_name
                )
            }
        };
        lines.push(line);
    }
    if let Some(bounds) = document.bounds() {
        lines.push(format!(
            "范围：min={}, max={}",
            format_point(bounds.min()),
            format_point(bounds.max())
        ));
    }
    lines
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.warnings() {
        warn!(message = %diagnostic.message, "出图诊断");
        println!("  ! {}", diagnostic.message);
    }
}

fn format_point(point: Point2) -> String {
    format!("({:.2}, {:.2})", point.x(), point.y())
}

#[cfg(test)]
mod tests {
    use super::*;
    use partdraw_core::document::DimensionStyle;

    #[test]
    fn config_policy_maps_to_engine_policy() {
        assert_eq!(
            duplicate_policy(DuplicateNames::Overwrite),
            DuplicatePolicy::Overwrite
        );
        assert_eq!(duplicate_policy(DuplicateNames::Suffix), DuplicatePolicy::Suffix);
    }

    #[test]
    fn report_target_prefers_explicit_path() {
        let mut config = AppConfig::default();
        config.batch.write_report = true;
        let context = CliContext::from_config(&config, Some(PathBuf::from("out")), None);
        assert_eq!(context.report_target(), Some(PathBuf::from("out").join("report.json")));

        let context = CliContext::from_config(
            &config,
            Some(PathBuf::from("out")),
            Some(PathBuf::from("custom.json")),
        );
        assert_eq!(context.report_target(), Some(PathBuf::from("custom.json")));

        let context = CliContext::from_config(&AppConfig::default(), None, None);
        assert_eq!(context.report_target(), None);
        assert_eq!(context.output.directory(), Path::new("output"));
    }

    #[test]
    fn description_lists_layers_and_entities() {
        let mut document = Document::new();
        document.add_layer("CONTOUR", 7);
        document.add_dimension_style(DimensionStyle::scaled("PARTDRAW", 5.0));
        document.add_polyline(
            [Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), Point2::new(10.0, 5.0)],
            true,
            "CONTOUR",
        );
        document.add_text(Point2::new(0.0, -10.0), "PLATE", 5.0, 0.0, "TEXT");

        let lines = describe_document(&document);
        assert!(lines.iter().any(|line| line.contains("CONTOUR (颜色: 7")));
        assert!(lines.iter().any(|line| line.contains("PARTDRAW (字高 5.00)")));
        assert!(lines.iter().any(|line| line.contains("顶点数=3")));
        assert!(lines.iter().any(|line| line.contains("内容=\"PLATE\"")));
        assert!(lines.last().is_some_and(|line| line.starts_with("范围")));
    }
}
