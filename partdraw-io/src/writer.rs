//! DXF R12（AC1009）ASCII 写出器。
//!
//! 只输出固定的段落顺序与固定的数值格式，不写入时间戳或句柄，
//! 因此同一文档多次写出的结果逐字节一致。

use std::fmt::Write as _;

use partdraw_core::{
    document::{Dimension, DimensionStyle, Document, Entity, Polyline, Text},
    geometry::{Point2, Vector2},
};

use crate::IoError;

const ACAD_VERSION: &str = "AC1009";
const CONTINUOUS_LINETYPE: &str = "CONTINUOUS";
const STANDARD_TEXT_STYLE: &str = "STANDARD";
/// 组码 70 中表示“块只被该标注引用”的标志位。
const DIMENSION_BLOCK_FLAG: i16 = 32;

pub(crate) fn write_document(document: &Document) -> Result<String, IoError> {
    let mut writer = DxfWriter::new();
    writer.write_header(document)?;
    writer.write_tables(document)?;

    let dimensions: Vec<&Dimension> = document
        .entities()
        .filter_map(|(_, entity)| match entity {
            Entity::Dimension(dimension) => Some(dimension),
            _ => None,
        })
        .collect();
    writer.write_blocks(document, &dimensions)?;
    writer.write_entities(document)?;
    writer.pair(0, "EOF");
    Ok(writer.finish())
}

struct DxfWriter {
    buffer: String,
}

impl DxfWriter {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn finish(self) -> String {
        self.buffer
    }

    fn pair(&mut self, code: i32, value: impl std::fmt::Display) {
        // 写入 String 不会失败。
        let _ = write!(self.buffer, "{code:>3}\n{value}\n");
    }

    fn int(&mut self, code: i32, value: i16) {
        self.pair(code, value);
    }

    fn real(&mut self, code: i32, value: f64, context: &str) -> Result<(), IoError> {
        let formatted = format_real(value).ok_or_else(|| {
            IoError::InvalidDocument(format!("{context} 含有非有限数值 {value}"))
        })?;
        self.pair(code, formatted);
        Ok(())
    }

    fn text(&mut self, code: i32, value: &str) {
        let encoded = encode_text(value);
        self.pair(code, encoded);
    }

    /// 以 10/20/30 为基准写出二维点（Z 恒为 0）。
    fn point(&mut self, base_code: i32, point: Point2, context: &str) -> Result<(), IoError> {
        self.real(base_code, point.x(), context)?;
        self.real(base_code + 10, point.y(), context)?;
        self.real(base_code + 20, 0.0, context)
    }

    fn begin_section(&mut self, name: &str) {
        self.pair(0, "SECTION");
        self.pair(2, name);
    }

    fn end_section(&mut self) {
        self.pair(0, "ENDSEC");
    }

    fn write_header(&mut self, document: &Document) -> Result<(), IoError> {
        self.begin_section("HEADER");
        self.pair(9, "$ACADVER");
        self.pair(1, ACAD_VERSION);
        self.pair(9, "$INSBASE");
        self.point(10, Point2::origin(), "$INSBASE")?;
        let (min, max) = match document.bounds() {
            Some(bounds) => (bounds.min(), bounds.max()),
            None => (Point2::origin(), Point2::origin()),
        };
        self.pair(9, "$EXTMIN");
        self.point(10, min, "$EXTMIN")?;
        self.pair(9, "$EXTMAX");
        self.point(10, max, "$EXTMAX")?;
        self.pair(9, "$INSUNITS");
        self.int(70, 4);
        self.end_section();
        Ok(())
    }

    fn write_tables(&mut self, document: &Document) -> Result<(), IoError> {
        self.begin_section("TABLES");

        self.begin_table("LTYPE", 1);
        self.pair(0, "LTYPE");
        self.pair(2, CONTINUOUS_LINETYPE);
        self.int(70, 0);
        self.pair(3, "Solid line");
        self.int(72, 65);
        self.int(73, 0);
        self.real(40, 0.0, "LTYPE")?;
        self.end_table();

        let layers: Vec<_> = document.layers().collect();
        self.begin_table("LAYER", layers.len());
        for layer in layers {
            self.pair(0, "LAYER");
            self.text(2, &layer.name);
            self.int(70, 0);
            let color = layer.color.abs().max(1);
            self.int(62, if layer.is_visible { color } else { -color });
            self.pair(6, CONTINUOUS_LINETYPE);
        }
        self.end_table();

        self.begin_table("STYLE", 1);
        self.pair(0, "STYLE");
        self.pair(2, STANDARD_TEXT_STYLE);
        self.int(70, 0);
        self.real(40, 0.0, "STYLE")?;
        self.real(41, 1.0, "STYLE")?;
        self.real(50, 0.0, "STYLE")?;
        self.int(71, 0);
        self.real(42, 2.5, "STYLE")?;
        self.pair(3, "txt");
        self.pair(4, "");
        self.end_table();

        let styles: Vec<_> = document.dimension_styles().collect();
        self.begin_table("DIMSTYLE", styles.len());
        for style in styles {
            let context = format!("DIMSTYLE {}", style.name);
            self.pair(0, "DIMSTYLE");
            self.text(2, &style.name);
            self.int(70, 0);
            self.real(140, style.text_height, &context)?;
            self.real(41, style.arrow_size, &context)?;
            self.real(42, style.extension_offset, &context)?;
            self.real(44, style.extension_extend, &context)?;
            self.real(147, style.text_gap, &context)?;
        }
        self.end_table();

        self.end_section();
        Ok(())
    }

    fn begin_table(&mut self, name: &str, count: usize) {
        self.pair(0, "TABLE");
        self.pair(2, name);
        self.pair(70, count);
    }

    fn end_table(&mut self) {
        self.pair(0, "ENDTAB");
    }

    fn write_blocks(
        &mut self,
        document: &Document,
        dimensions: &[&Dimension],
    ) -> Result<(), IoError> {
        self.begin_section("BLOCKS");
        for (index, dimension) in dimensions.iter().enumerate() {
            let style = document
                .dimension_style(&dimension.style_name)
                .ok_or_else(|| {
                    IoError::InvalidDocument(format!(
                        "标注引用了未定义的样式 {}",
                        dimension.style_name
                    ))
                })?;
            let name = dimension_block_name(index);
            self.pair(0, "BLOCK");
            self.pair(8, "0");
            self.pair(2, &name);
            self.int(70, 1);
            self.point(10, Point2::origin(), "BLOCK")?;
            self.pair(3, &name);
            self.pair(1, "");
            self.render_dimension(dimension, style)?;
            self.pair(0, "ENDBLK");
            self.pair(8, "0");
        }
        self.end_section();
        Ok(())
    }

    /// 将对齐标注展开为块内几何：尺寸线、两条尺寸界线、两个实心箭头与测量文字。
    fn render_dimension(
        &mut self,
        dimension: &Dimension,
        style: &DimensionStyle,
    ) -> Result<(), IoError> {
        let context = "DIMENSION 块";
        let p1 = dimension.extension_line_origin;
        let p2 = dimension.extension_line_end;
        let line_start = dimension.dimension_line_start();
        let line_end = dimension.definition_point;

        self.block_line(line_start, line_end, context)?;

        if let Some(outward) = dimension.offset().normalize() {
            for (measured, on_line) in [(p1, line_start), (p2, line_end)] {
                let from = measured.translate(outward.scale(style.extension_offset));
                let to = on_line.translate(outward.scale(style.extension_extend));
                self.block_line(from, to, context)?;
            }
        }

        let direction = Vector2::from_points(line_start, line_end);
        if let Some(unit) = direction.normalize() {
            let half_width = unit.perp().scale(style.arrow_size / 6.0);
            let back = unit.scale(style.arrow_size);
            self.block_arrow(line_start, back, half_width, context)?;
            self.block_arrow(line_end, back.scale(-1.0), half_width, context)?;
        }

        let label = dimension
            .text
            .clone()
            .unwrap_or_else(|| format_measurement(dimension.measurement));
        self.pair(0, "TEXT");
        self.pair(8, "0");
        self.point(10, dimension.text_midpoint, context)?;
        self.real(40, style.text_height, context)?;
        self.text(1, &label);
        self.real(50, readable_angle(direction.angle()), context)?;
        self.pair(7, STANDARD_TEXT_STYLE);
        self.int(72, 1);
        self.point(11, dimension.text_midpoint, context)?;
        self.int(73, 2);
        Ok(())
    }

    fn block_line(&mut self, start: Point2, end: Point2, context: &str) -> Result<(), IoError> {
        self.pair(0, "LINE");
        self.pair(8, "0");
        self.point(10, start, context)?;
        self.point(11, end, context)
    }

    /// 实心三角箭头，尖端位于 `tip`，底边中心位于 `tip + back`。
    fn block_arrow(
        &mut self,
        tip: Point2,
        back: Vector2,
        half_width: Vector2,
        context: &str,
    ) -> Result<(), IoError> {
        let base = tip.translate(back);
        let left = base.translate(half_width);
        let right = base.translate(half_width.scale(-1.0));
        self.pair(0, "SOLID");
        self.pair(8, "0");
        self.point(10, tip, context)?;
        self.point(11, left, context)?;
        self.point(12, right, context)?;
        self.point(13, right, context)
    }

    fn write_entities(&mut self, document: &Document) -> Result<(), IoError> {
        self.begin_section("ENTITIES");
        let mut dimension_index = 0;
        for (_, entity) in document.entities() {
            match entity {
                Entity::Polyline(polyline) => self.write_polyline(polyline)?,
                Entity::Text(text) => self.write_text(text)?,
                Entity::Dimension(dimension) => {
                    self.write_dimension(dimension, dimension_index)?;
                    dimension_index += 1;
                }
            }
        }
        self.end_section();
        Ok(())
    }

    fn write_polyline(&mut self, polyline: &Polyline) -> Result<(), IoError> {
        let context = "POLYLINE";
        self.pair(0, "POLYLINE");
        self.text(8, &polyline.layer);
        self.int(66, 1);
        self.point(10, Point2::origin(), context)?;
        self.int(70, if polyline.is_closed { 1 } else { 0 });
        for vertex in &polyline.vertices {
            self.pair(0, "VERTEX");
            self.text(8, &polyline.layer);
            self.point(10, vertex.position, "VERTEX")?;
            if vertex.bulge != 0.0 {
                self.real(42, vertex.bulge, "VERTEX")?;
            }
            self.int(70, 0);
        }
        self.pair(0, "SEQEND");
        self.text(8, &polyline.layer);
        Ok(())
    }

    fn write_text(&mut self, text: &Text) -> Result<(), IoError> {
        let context = "TEXT";
        self.pair(0, "TEXT");
        self.text(8, &text.layer);
        self.point(10, text.insert, context)?;
        self.real(40, text.height, context)?;
        self.text(1, &text.content);
        if text.rotation != 0.0 {
            self.real(50, text.rotation.to_degrees(), context)?;
        }
        self.pair(7, STANDARD_TEXT_STYLE);
        Ok(())
    }

    fn write_dimension(&mut self, dimension: &Dimension, index: usize) -> Result<(), IoError> {
        let context = "DIMENSION";
        self.pair(0, "DIMENSION");
        self.text(8, &dimension.layer);
        self.pair(2, dimension_block_name(index));
        self.text(3, &dimension.style_name);
        self.point(10, dimension.definition_point, context)?;
        self.point(11, dimension.text_midpoint, context)?;
        self.int(70, dimension.kind.type_code() | DIMENSION_BLOCK_FLAG);
        if let Some(text) = &dimension.text {
            self.text(1, text);
        }
        self.point(13, dimension.extension_line_origin, context)?;
        self.point(14, dimension.extension_line_end, context)?;
        self.real(42, dimension.measurement, context)?;
        if dimension.rotation != 0.0 {
            self.real(50, dimension.rotation.to_degrees(), context)?;
        }
        Ok(())
    }
}

fn dimension_block_name(index: usize) -> String {
    format!("*D{index}")
}

/// 固定 10 位小数后去掉多余的零，保证输出稳定；`-0` 统一为 `0.0`。
pub(crate) fn format_real(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let mut formatted = format!("{value:.10}");
    while formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.push('0');
    }
    if formatted == "-0.0" {
        formatted = "0.0".to_string();
    }
    Some(formatted)
}

/// 标注文字：最多两位小数，去掉尾随零。
pub(crate) fn format_measurement(value: f64) -> String {
    let mut formatted = format!("{value:.2}");
    if formatted.contains('.') {
        while formatted.ends_with('0') {
            formatted.pop();
        }
        if formatted.ends_with('.') {
            formatted.pop();
        }
    }
    if formatted == "-0" {
        formatted = "0".to_string();
    }
    formatted
}

/// 将方向角折算到 (-90°, 90°]，保证文字不倒置。返回角度制。
fn readable_angle(radians: f64) -> f64 {
    let mut degrees = radians.to_degrees();
    if degrees > 90.0 + 1e-9 {
        degrees -= 180.0;
    } else if degrees <= -90.0 + 1e-9 {
        degrees += 180.0;
    }
    degrees
}

/// R12 文件按 ANSI 代码页解释，非 ASCII 字符写成 `\U+XXXX`；控制字符替换为空格。
pub(crate) fn encode_text(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_control() {
            encoded.push(' ');
        } else if ch.is_ascii() {
            encoded.push(ch);
        } else {
            let _ = write!(encoded, "\\U+{:04X}", ch as u32);
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reals_are_formatted_stably() {
        assert_eq!(format_real(100.0).as_deref(), Some("100.0"));
        assert_eq!(format_real(0.1).as_deref(), Some("0.1"));
        assert_eq!(format_real(-12.5).as_deref(), Some("-12.5"));
        assert_eq!(format_real(-0.0).as_deref(), Some("0.0"));
        assert_eq!(format_real(f64::NAN), None);
        assert_eq!(format_real(f64::INFINITY), None);
    }

    #[test]
    fn measurement_text_drops_trailing_zeros() {
        assert_eq!(format_measurement(100.0), "100");
        assert_eq!(format_measurement(10.5), "10.5");
        assert_eq!(format_measurement(33.333), "33.33");
    }

    #[test]
    fn readable_angle_keeps_text_upright() {
        assert!((readable_angle(0.0)).abs() < 1e-9);
        assert!((readable_angle(-std::f64::consts::FRAC_PI_2) - 90.0).abs() < 1e-9);
        assert!((readable_angle(std::f64::consts::PI) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn non_ascii_text_is_escaped() {
        assert_eq!(encode_text("PEÇA"), "PE\\U+00C7A");
        assert_eq!(encode_text("a\nb"), "a b");
    }
}
