pub mod batch;
pub mod coerce;
pub mod diagnostics;
pub mod emitter;
pub mod keys;
pub mod pipeline;
pub mod record;
pub mod shapes;
pub mod style;
pub mod weight;

pub mod errors {
    use thiserror::Error;

    use crate::keys::CanonicalKey;
    use crate::shapes::ShapeKind;

    /// 单条记录处理失败的原因。批处理中每个错误只导致对应行被跳过。
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum PipelineError {
        #[error("missing required field: {field}")]
        MissingRequiredField { field: CanonicalKey },
        #[error("unknown shape: {shape:?}")]
        UnknownShape { shape: String },
        #[error("shape {shape} requires parameter {parameter}")]
        MissingGeometryParameter {
            shape: ShapeKind,
            parameter: CanonicalKey,
        },
        /// 细节只写入日志。
        #[error("internal drawing error")]
        DrawingEmission { detail: String },
    }
}

pub use batch::{BatchOptions, BatchOutcome, BatchResult, BatchRunner, DuplicatePolicy};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use emitter::GeneratedDrawing;
pub use errors::PipelineError;
pub use keys::{CanonicalKey, FieldKey};
pub use pipeline::{Pipeline, PreparedParams};
pub use record::{RawRecord, RawValue};
pub use shapes::{ShapeBuilder, ShapeKind, ShapeRegistry};
