use std::fs;
use std::path::Path;

use partdraw_core::{
    document::{
        Dimension, DimensionKind, DimensionStyle, Document, Entity, PolylineVertex, Text,
    },
    geometry::{Point2, Vector2},
};
use thiserror::Error;
use tracing::debug;

mod writer;

/// 写出文件使用的扩展名（不含点）。
pub const DXF_EXTENSION: &str = "dxf";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError>;
}

/// 将文档序列化为内存中的文本，供调用方自行决定落盘或打包。
pub trait DocumentWriter {
    fn write_to_string(&self, document: &Document) -> Result<String, IoError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 直接从 DXF 文本解析文档。
    pub fn parse_str(&self, data: &str) -> Result<Document, IoError> {
        DxfParser::new(data).parse().map_err(|err| match err {
            DxfError::Unsupported { feature } => IoError::UnsupportedFeature(feature),
            DxfError::Invalid { message } => IoError::InvalidDocument(message),
        })
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_str(&data)
    }
}

impl DocumentWriter for DxfFacade {
    fn write_to_string(&self, document: &Document) -> Result<String, IoError> {
        writer::write_document(document)
    }
}

impl DocumentSaver for DxfFacade {
    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let content = self.write_to_string(document)?;
        fs::write(path, content).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug)]
enum DxfError {
    Unsupported { feature: String },
    Invalid { message: String },
}

impl DxfError {
    fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// 实体或表项的组码体，不含起始的 `0` 组。
type Body = Vec<(i32, String)>;

/// 读取本库写出的子集：图层、标注样式、POLYLINE/LWPOLYLINE、TEXT、DIMENSION。
/// 其他段落与实体被跳过。
struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        while let Some((code, value)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.as_str() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::invalid("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::invalid(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.as_str() {
                        "TABLES" => self.parse_tables(&mut document)?,
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        other => {
                            debug!(section = other, "跳过 DXF 段");
                            self.skip_section()?
                        }
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_tables(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = self
                .reader
                .next_pair()?
                .ok_or_else(|| DxfError::invalid("TABLES 段提前结束"))?;
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "TABLES 段遇到组码 {code}（期望 0）"
                )));
            }
            match value.as_str() {
                "ENDSEC" => break,
                // 表头自身的组码（2 表名、70 数量）直接忽略。
                "TABLE" => {
                    self.read_body()?;
                }
                "ENDTAB" => {
                    self.read_body()?;
                }
                "LAYER" => {
                    let body = self.read_body()?;
                    apply_layer(document, &body)?;
                }
                "DIMSTYLE" => {
                    let body = self.read_body()?;
                    document.add_dimension_style(parse_dimension_style(&body)?);
                }
                _ => {
                    self.read_body()?;
                }
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::invalid("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.as_str() {
                "ENDSEC" => break,
                "POLYLINE" => {
                    self.parse_polyline_entity(document)?;
                }
                "LWPOLYLINE" => {
                    let body = self.read_body()?;
                    parse_lwpolyline(document, &body)?;
                }
                "TEXT" => {
                    let body = self.read_body()?;
                    document.add_entity(Entity::Text(parse_text(&body)?));
                }
                "DIMENSION" => {
                    let body = self.read_body()?;
                    document.add_dimension(parse_dimension(&body)?);
                }
                other => {
                    debug!(entity = other, "跳过不支持的实体");
                    self.read_body()?;
                }
            }
        }
        Ok(())
    }

    /// 旧式 POLYLINE：头部之后紧跟 VERTEX 序列，以 SEQEND 结束。
    fn parse_polyline_entity(&mut self, document: &mut Document) -> Result<(), DxfError> {
        let header = self.read_body()?;
        let layer = layer_of(&header);
        let flags = optional_i16(&header, 70, "POLYLINE 标志（组码 70）")?.unwrap_or(0);
        let mut vertices = Vec::new();
        loop {
            let (code, value) = self
                .reader
                .next_pair()?
                .ok_or_else(|| DxfError::invalid("POLYLINE 缺少 SEQEND"))?;
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "POLYLINE 顶点序列遇到组码 {code}"
                )));
            }
            match value.as_str() {
                "VERTEX" => {
                    let body = self.read_body()?;
                    let x = required_f64(&body, 10, "VERTEX X（组码 10）")?;
                    let y = required_f64(&body, 20, "VERTEX Y（组码 20）")?;
                    let bulge = optional_f64(&body, 42, "VERTEX 凸度（组码 42）")?.unwrap_or(0.0);
                    vertices.push(PolylineVertex::with_bulge(Point2::new(x, y), bulge));
                }
                "SEQEND" => {
                    self.read_body()?;
                    break;
                }
                other => {
                    return Err(DxfError::unsupported(format!(
                        "POLYLINE 内的实体 {other}"
                    )));
                }
            }
        }
        document.add_polyline_with_vertices(vertices, flags & 0x01 != 0, layer);
        Ok(())
    }

    /// 读取到下一个 `0` 组为止的全部组码，并把该 `0` 组放回。
    fn read_body(&mut self) -> Result<Body, DxfError> {
        let mut body = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(pair) => body.push(pair),
                None => break,
            }
        }
        Ok(body)
    }
}

fn apply_layer(document: &mut Document, body: &Body) -> Result<(), DxfError> {
    let name = required_string(body, 2, "LAYER 名称（组码 2）")?;
    let color = optional_i16(body, 62, "LAYER 颜色（组码 62）")?.unwrap_or(7);
    document.add_layer(&name, color.abs());
    document.set_layer_visible(&name, color >= 0);
    Ok(())
}

fn parse_dimension_style(body: &Body) -> Result<DimensionStyle, DxfError> {
    let name = required_string(body, 2, "DIMSTYLE 名称（组码 2）")?;
    let text_height = optional_f64(body, 140, "DIMSTYLE DIMTXT（组码 140）")?.unwrap_or(2.5);
    let mut style = DimensionStyle::scaled(name, text_height);
    if let Some(value) = optional_f64(body, 41, "DIMSTYLE DIMASZ（组码 41）")? {
        style.arrow_size = value;
    }
    if let Some(value) = optional_f64(body, 42, "DIMSTYLE DIMEXO（组码 42）")? {
        style.extension_offset = value;
    }
    if let Some(value) = optional_f64(body, 44, "DIMSTYLE DIMEXE（组码 44）")? {
        style.extension_extend = value;
    }
    if let Some(value) = optional_f64(body, 147, "DIMSTYLE DIMGAP（组码 147）")? {
        style.text_gap = value;
    }
    Ok(style)
}

/// LWPOLYLINE 的顶点以组码 10 开头，随后的 20/42 属于同一顶点。
fn parse_lwpolyline(document: &mut Document, body: &Body) -> Result<(), DxfError> {
    let layer = layer_of(body);
    let flags = optional_i16(body, 70, "LWPOLYLINE 标志（组码 70）")?.unwrap_or(0);
    let mut vertices: Vec<PolylineVertex> = Vec::new();
    let mut pending_x: Option<f64> = None;
    for (code, value) in body {
        match code {
            10 => {
                pending_x = Some(parse_f64(value, "LWPOLYLINE 顶点 X（组码 10）")?);
            }
            20 => {
                let x = pending_x
                    .take()
                    .ok_or_else(|| DxfError::invalid("LWPOLYLINE 顶点缺少 X 坐标"))?;
                let y = parse_f64(value, "LWPOLYLINE 顶点 Y（组码 20）")?;
                vertices.push(PolylineVertex::new(Point2::new(x, y)));
            }
            42 => {
                let bulge = parse_f64(value, "LWPOLYLINE 凸度（组码 42）")?;
                if let Some(last) = vertices.last_mut() {
                    last.bulge = bulge;
                }
            }
            _ => {}
        }
    }
    document.add_polyline_with_vertices(vertices, flags & 0x01 != 0, layer);
    Ok(())
}

fn parse_text(body: &Body) -> Result<Text, DxfError> {
    let layer = layer_of(body);
    let x = required_f64(body, 10, "TEXT 插入点 X（组码 10）")?;
    let y = required_f64(body, 20, "TEXT 插入点 Y（组码 20）")?;
    let height = optional_f64(body, 40, "TEXT 高度（组码 40）")?.unwrap_or(0.0);
    let content = required_string(body, 1, "TEXT 内容（组码 1）")?;
    let rotation_deg = optional_f64(body, 50, "TEXT 旋转（组码 50）")?.unwrap_or(0.0);
    Ok(Text {
        insert: Point2::new(x, y),
        content: decode_inline_text(&content),
        height,
        rotation: rotation_deg.to_radians(),
        layer,
    })
}

fn parse_dimension(body: &Body) -> Result<Dimension, DxfError> {
    let layer = layer_of(body);
    let point = |x_code: i32, context: &str| -> Result<Point2, DxfError> {
        let x = required_f64(body, x_code, context)?;
        let y = required_f64(body, x_code + 10, context)?;
        Ok(Point2::new(x, y))
    };
    let definition_point = point(10, "DIMENSION 定义点（组码 10/20）")?;
    let text_midpoint = point(11, "DIMENSION 文字中点（组码 11/21）")?;
    let extension_line_origin = point(13, "DIMENSION 第一测量点（组码 13/23）")?;
    let extension_line_end = point(14, "DIMENSION 第二测量点（组码 14/24）")?;
    let type_flags = optional_i16(body, 70, "DIMENSION 类型（组码 70）")?.unwrap_or(0);
    let measurement = match optional_f64(body, 42, "DIMENSION 测量值（组码 42）")? {
        Some(value) => value,
        None => Vector2::from_points(extension_line_origin, extension_line_end).length(),
    };
    let rotation_deg = optional_f64(body, 50, "DIMENSION 旋转（组码 50）")?.unwrap_or(0.0);
    Ok(Dimension {
        kind: DimensionKind::from_type_code(type_flags),
        definition_point,
        text_midpoint,
        extension_line_origin,
        extension_line_end,
        text: find(body, 1).map(decode_inline_text),
        measurement,
        rotation: rotation_deg.to_radians(),
        style_name: find(body, 3).unwrap_or("STANDARD").to_string(),
        layer,
    })
}

fn find(body: &Body, code: i32) -> Option<&str> {
    body.iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, value)| value.as_str())
}

fn layer_of(body: &Body) -> String {
    find(body, 8).unwrap_or("0").to_string()
}

fn required_string(body: &Body, code: i32, context: &str) -> Result<String, DxfError> {
    find(body, code)
        .map(str::to_string)
        .ok_or_else(|| DxfError::invalid(format!("缺少 {context}")))
}

fn required_f64(body: &Body, code: i32, context: &str) -> Result<f64, DxfError> {
    let raw = find(body, code).ok_or_else(|| DxfError::invalid(format!("缺少 {context}")))?;
    parse_f64(raw, context)
}

fn optional_f64(body: &Body, code: i32, context: &str) -> Result<Option<f64>, DxfError> {
    find(body, code).map(|raw| parse_f64(raw, context)).transpose()
}

fn optional_i16(body: &Body, code: i32, context: &str) -> Result<Option<i16>, DxfError> {
    find(body, code).map(|raw| parse_i16(raw, context)).transpose()
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => return Ok(None),
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::invalid(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    /// 回退一个组码对；缓冲区只容纳一个，调用方保证读取后才会再次回退。
    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "尝试多次回退 DXF pair");
        self.buffer = Some(pair);
    }
}

fn parse_f64(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
}

/// 解码 `\U+XXXX` 转义；其余反斜杠序列原样保留。
fn decode_inline_text(raw: &str) -> String {
    let mut result = String::new();
    let mut rest = raw;
    while let Some(index) = rest.find("\\U+") {
        result.push_str(&rest[..index]);
        let after = &rest[index + 3..];
        let hex: String = after.chars().take(4).collect();
        match (hex.len() == 4)
            .then(|| u32::from_str_radix(&hex, 16).ok())
            .flatten()
            .and_then(char::from_u32)
        {
            Some(ch) => {
                result.push(ch);
                rest = &after[4..];
            }
            None => {
                result.push_str("\\U+");
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_inline_text_handles_unicode_escapes() {
        assert_eq!(decode_inline_text("PE\\U+00C7A"), "PEÇA");
        assert_eq!(decode_inline_text("plain"), "plain");
        assert_eq!(decode_inline_text("bad \\U+ZZ"), "bad \\U+ZZ");
    }

    #[test]
    fn parse_rejects_dangling_group_code() {
        let err = DxfFacade::new()
            .parse_str("  0\nSECTION\n  2")
            .expect_err("truncated file must fail");
        assert!(matches!(err, IoError::InvalidDocument(_)));
    }

    #[test]
    fn parse_reads_lwpolyline_vertices() {
        let data = "  0\nSECTION\n  2\nENTITIES\n  0\nLWPOLYLINE\n  8\nCUT\n 90\n3\n 70\n1\n 10\n0\n 20\n0\n 10\n5\n 20\n0\n 42\n0.5\n 10\n5\n 20\n5\n  0\nENDSEC\n  0\nEOF\n";
        let doc = DxfFacade::new().parse_str(data).expect("parse");
        let polyline = doc
            .entities()
            .find_map(|(_, entity)| match entity {
                Entity::Polyline(polyline) => Some(polyline),
                _ => None,
            })
            .expect("polyline");
        assert_eq!(polyline.layer, "CUT");
        assert!(polyline.is_closed);
        assert_eq!(polyline.vertices.len(), 3);
        assert!((polyline.vertices[1].bulge - 0.5).abs() < 1e-9);
    }
}
