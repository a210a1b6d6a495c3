use partdraw_core::document::Document;
use partdraw_io::{DocumentWriter, DxfFacade};
use tracing::{debug, info};

use crate::coerce::{NumericFields, coerce_layer_colors, coerce_numeric_fields, require_text};
use crate::diagnostics::Diagnostics;
use crate::emitter::{self, GeneratedDrawing};
use crate::errors::PipelineError;
use crate::keys::{CanonicalKey, NormalizedRecord, normalize_record};
use crate::record::RawRecord;
use crate::shapes::{ShapeKind, ShapeRegistry};
use crate::style::{StyleConfig, compute_style, is_truthy};
use crate::weight::{WeightReport, build_annotation};

/// 校验与转换后的零件参数；构造成功即保证名称非空且形状已注册。
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedParams {
    pub part_name: String,
    pub shape: ShapeKind,
    pub fields: NumericFields,
    pub style: StyleConfig,
    pub text_lines: Option<Vec<String>>,
    pub weight: Option<WeightReport>,
}

pub struct Pipeline {
    registry: ShapeRegistry,
    writer: Box<dyn DocumentWriter + Send + Sync>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_registry(ShapeRegistry::new())
    }

    pub fn with_registry(registry: ShapeRegistry) -> Self {
        Self {
            registry,
            writer: Box::new(DxfFacade::new()),
        }
    }

    /// 替换序列化器，主要用于测试写出失败路径。
    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: DocumentWriter + Send + Sync + 'static,
    {
        self.writer = Box::new(writer);
        self
    }

    pub fn registry(&self) -> &ShapeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ShapeRegistry {
        &mut self.registry
    }

    pub fn prepare(
        &self,
        record: &RawRecord,
        diagnostics: &mut Diagnostics,
    ) -> Result<PreparedParams, PipelineError> {
        self.prepare_normalized(&normalize_record(record), diagnostics)
    }

    /// 先校验名称与形状，再做数值转换、样式与标注计算。
    pub fn prepare_normalized(
        &self,
        record: &NormalizedRecord,
        diagnostics: &mut Diagnostics,
    ) -> Result<PreparedParams, PipelineError> {
        let part_name = require_text(record, CanonicalKey::PartName)?;
        let shape_id = require_text(record, CanonicalKey::Shape)?;
        let builder = self.registry.resolve(&shape_id)?;

        let fields = coerce_numeric_fields(record, diagnostics);
        let colors = coerce_layer_colors(record, diagnostics);
        let include_dims = is_truthy(record.get(CanonicalKey::IncludeDims));
        let style = compute_style(&fields, colors, include_dims);

        let (text_lines, weight) = if is_truthy(record.get(CanonicalKey::IncludeTextInfo)) {
            let annotation =
                build_annotation(&part_name, builder.area(&fields), &fields, diagnostics);
            (Some(annotation.lines), annotation.weight)
        } else {
            (None, None)
        };

        debug!(part = %part_name, shape = %builder.kind(), "参数准备完成");
        Ok(PreparedParams {
            part_name,
            shape: builder.kind(),
            fields,
            style,
            text_lines,
            weight,
        })
    }

    pub fn build_document(&self, params: &PreparedParams) -> Result<Document, PipelineError> {
        let builder = self.registry.get(params.shape).ok_or_else(|| {
            PipelineError::UnknownShape {
                shape: params.shape.to_string(),
            }
        })?;
        emitter::build_document(params, builder)
    }

    /// 单条记录：返回第一个错误。
    pub fn generate(
        &self,
        record: &RawRecord,
        diagnostics: &mut Diagnostics,
    ) -> Result<GeneratedDrawing, PipelineError> {
        self.generate_normalized(&normalize_record(record), diagnostics)
    }

    pub fn generate_normalized(
        &self,
        record: &NormalizedRecord,
        diagnostics: &mut Diagnostics,
    ) -> Result<GeneratedDrawing, PipelineError> {
        let params = self.prepare_normalized(record, diagnostics)?;
        let document = self.build_document(&params)?;
        let drawing = emitter::emit(&params, &document, self.writer.as_ref())?;
        info!(
            part = %params.part_name,
            filename = %drawing.filename,
            bytes = drawing.content.len(),
            "图纸已生成"
        );
        Ok(drawing)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
