//! 把准备好的参数装配成文档并序列化为 DXF 文本。

use once_cell::sync::Lazy;
use partdraw_core::document::{DimensionStyle, Document};
use partdraw_core::geometry::Vector2;
use partdraw_io::{DXF_EXTENSION, DocumentWriter};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::PipelineError;
use crate::pipeline::PreparedParams;
use crate::shapes::ShapeBuilder;

pub const CONTOUR_LAYER: &str = "CONTOUR";
pub const HOLES_LAYER: &str = "HOLES";
pub const TEXT_LAYER: &str = "TEXT";
pub const DIMENSIONS_LAYER: &str = "DIMENSIONS";
pub const DIMENSION_STYLE: &str = "PARTDRAW";

/// 文字行之间的纵向间距（相对字高）。
pub const LINE_SPACING_FACTOR: f64 = 1.5;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("静态正则表达式"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedDrawing {
    pub filename: String,
    #[serde(skip)]
    pub content: String,
}

/// 零件名中连续的非 `[A-Za-z0-9._-]` 字符替换为单个下划线，并追加扩展名。
pub fn sanitize_filename(part_name: &str) -> String {
    let stem = UNSAFE_FILENAME_CHARS.replace_all(part_name, "_");
    format!("{stem}.{DXF_EXTENSION}")
}

/// 按固定顺序装配图层与实体：轮廓、文字、标注。
pub fn build_document(
    params: &PreparedParams,
    builder: &dyn ShapeBuilder,
) -> Result<Document, PipelineError> {
    let style = &params.style;
    let mut document = Document::new();
    document.add_layer(CONTOUR_LAYER, style.contour_color);
    document.add_layer(HOLES_LAYER, style.holes_color);

    builder.build_contour(&params.fields, &mut document, CONTOUR_LAYER)?;

    if let Some(lines) = params.text_lines.as_deref().filter(|lines| !lines.is_empty()) {
        document.add_layer(TEXT_LAYER, style.text_color);
        let origin = style.text_insert_point;
        let step = style.char_height * LINE_SPACING_FACTOR;
        for (index, line) in lines.iter().enumerate() {
            let insert = origin.translate(Vector2::new(0.0, -step * index as f64));
            document.add_text(insert, line.as_str(), style.char_height, 0.0, TEXT_LAYER);
        }
    }

    if style.include_dims {
        document.add_layer(DIMENSIONS_LAYER, style.text_color);
        document.add_dimension_style(DimensionStyle::scaled(DIMENSION_STYLE, style.char_height));
        builder.build_dimensions(
            &params.fields,
            style,
            &mut document,
            DIMENSIONS_LAYER,
            DIMENSION_STYLE,
        )?;
    }

    debug!(
        part = %params.part_name,
        shape = %params.shape,
        entities = document.entities().count(),
        "文档装配完成"
    );
    Ok(document)
}

/// 序列化文档；写出失败时记录细节，只向调用方暴露通用错误。
pub fn emit(
    params: &PreparedParams,
    document: &Document,
    writer: &dyn DocumentWriter,
) -> Result<GeneratedDrawing, PipelineError> {
    let content = writer.write_to_string(document).map_err(|err| {
        error!(part = %params.part_name, error = %err, "DXF 序列化失败");
        PipelineError::DrawingEmission {
            detail: err.to_string(),
        }
    })?;
    Ok(GeneratedDrawing {
        filename: sanitize_filename(&params.part_name),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_characters_collapse_to_underscore() {
        assert_eq!(sanitize_filename("Part #1/2024"), "Part_1_2024.dxf");
        assert_eq!(sanitize_filename("chapa-01.v2"), "chapa-01.v2.dxf");
        assert_eq!(sanitize_filename("Flange  Ø 80"), "Flange_80.dxf");
    }

    #[test]
    fn sanitized_names_only_use_safe_characters() {
        let name = sanitize_filename("a/b\\c:d*e?f\"g<h>i|j k");
        let stem = name.trim_end_matches(".dxf");
        assert!(
            stem.chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
        );
        assert_eq!(stem, "a_b_c_d_e_f_g_h_i_j_k");
    }
}
