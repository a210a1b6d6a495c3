use std::collections::HashMap;
use std::fmt;

use partdraw_core::document::Document;
use partdraw_core::geometry::Point2;
use serde::Serialize;

use crate::coerce::{Coerced, NumericFields};
use crate::errors::PipelineError;
use crate::keys::{CanonicalKey, clean_key};
use crate::style::StyleConfig;

/// 可识别的形状种类。只有注册了构建器的种类才能出图。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Triangle,
    RightTriangle,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Rectangle,
        ShapeKind::Circle,
        ShapeKind::Triangle,
        ShapeKind::RightTriangle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Triangle => "triangle",
            ShapeKind::RightTriangle => "right_triangle",
        }
    }

    /// 解析形状标识；大小写、首尾空白与内部空白/连字符不敏感。
    pub fn from_identifier(raw: &str) -> Option<Self> {
        let cleaned = clean_key(raw).replace('-', "_");
        Self::ALL.into_iter().find(|kind| kind.as_str() == cleaned)
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 形状能力接口：面积、轮廓与标注。新增形状只需实现该接口并注册。
pub trait ShapeBuilder: Send + Sync {
    fn kind(&self) -> ShapeKind;

    /// 零件面积（mm²），用于重量计算。
    fn area(&self, fields: &NumericFields) -> f64;

    fn build_contour(
        &self,
        fields: &NumericFields,
        document: &mut Document,
        layer: &str,
    ) -> Result<(), PipelineError>;

    fn build_dimensions(
        &self,
        fields: &NumericFields,
        style: &StyleConfig,
        document: &mut Document,
        layer: &str,
        dimension_style: &str,
    ) -> Result<(), PipelineError>;
}

/// 取构建器需要的尺寸；记录中完全没有该字段时报错。
pub fn require_dimension(
    kind: ShapeKind,
    key: CanonicalKey,
    fields: &NumericFields,
) -> Result<f64, PipelineError> {
    let missing = || PipelineError::MissingGeometryParameter {
        shape: kind,
        parameter: key,
    };
    let field: &Coerced<f64> = fields.get(key).ok_or_else(missing)?;
    if field.was_supplied() {
        Ok(field.value)
    } else {
        Err(missing())
    }
}

/// 矩形：左下角位于原点，宽沿 X，高沿 Y。
pub struct RectangleBuilder;

impl ShapeBuilder for RectangleBuilder {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Rectangle
    }

    fn area(&self, fields: &NumericFields) -> f64 {
        fields.width.value * fields.height.value
    }

    fn build_contour(
        &self,
        fields: &NumericFields,
        document: &mut Document,
        layer: &str,
    ) -> Result<(), PipelineError> {
        let width = require_dimension(self.kind(), CanonicalKey::Width, fields)?;
        let height = require_dimension(self.kind(), CanonicalKey::Height, fields)?;
        document.add_polyline(
            [
                Point2::new(0.0, 0.0),
                Point2::new(width, 0.0),
                Point2::new(width, height),
                Point2::new(0.0, height),
            ],
            true,
            layer,
        );
        Ok(())
    }

    fn build_dimensions(
        &self,
        fields: &NumericFields,
        style: &StyleConfig,
        document: &mut Document,
        layer: &str,
        dimension_style: &str,
    ) -> Result<(), PipelineError> {
        let width = require_dimension(self.kind(), CanonicalKey::Width, fields)?;
        let height = require_dimension(self.kind(), CanonicalKey::Height, fields)?;
        let top_left = Point2::new(0.0, height);
        // 上边沿正向偏移、左边自上而下负向偏移，两条尺寸线都落在轮廓外侧。
        let placements = [
            (top_left, Point2::new(width, height), style.dim_distance),
            (top_left, Point2::new(0.0, 0.0), -style.dim_distance),
        ];
        for (p1, p2, distance) in placements {
            document
                .add_aligned_dimension(p1, p2, distance, dimension_style, layer)
                .ok_or_else(|| PipelineError::DrawingEmission {
                    detail: format!("标注样式 {dimension_style} 未注册"),
                })?;
        }
        Ok(())
    }
}

pub struct ShapeRegistry {
    builders: HashMap<ShapeKind, Box<dyn ShapeBuilder>>,
}

impl ShapeRegistry {
    /// 默认注册表，包含全部内置形状。
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(RectangleBuilder);
        registry
    }

    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// 注册或替换某一形状的构建器。
    pub fn register<B: ShapeBuilder + 'static>(&mut self, builder: B) {
        self.builders.insert(builder.kind(), Box::new(builder));
    }

    pub fn get(&self, kind: ShapeKind) -> Option<&dyn ShapeBuilder> {
        self.builders.get(&kind).map(|builder| builder.as_ref())
    }

    /// 解析形状标识并查找构建器；未知或未注册时返回 `UnknownShape`。
    pub fn resolve(&self, identifier: &str) -> Result<&dyn ShapeBuilder, PipelineError> {
        ShapeKind::from_identifier(identifier)
            .and_then(|kind| self.get(kind))
            .ok_or_else(|| PipelineError::UnknownShape {
                shape: identifier.to_string(),
            })
    }

    pub fn kinds(&self) -> Vec<ShapeKind> {
        let mut kinds: Vec<ShapeKind> = self.builders.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
