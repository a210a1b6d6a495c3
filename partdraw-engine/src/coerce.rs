//! 必填校验与数值转换。数值转换从不失败：无法解析时退回声明的默认值，
//! 并通过 [`CoercionSource`] 说明值的来源。

use serde::Serialize;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::errors::PipelineError;
use crate::keys::{CanonicalKey, NormalizedRecord};
use crate::record::RawValue;

pub const DEFAULT_DENSITY_KG_M3: f64 = 7850.0;
pub const DEFAULT_QUANTITY: f64 = 1.0;
pub const DEFAULT_CONTOUR_COLOR: i16 = 7;
pub const DEFAULT_HOLES_COLOR: i16 = 1;
pub const DEFAULT_TEXT_COLOR: i16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionSource {
    Parsed,
    /// 字段不存在或为 null。
    Missing,
    /// 字段存在但为空白文本。
    Blank,
    /// 字段存在但无法解析。
    Unparseable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coerced<T> {
    pub value: T,
    pub source: CoercionSource,
}

impl<T> Coerced<T> {
    #[inline]
    pub fn parsed(value: T) -> Self {
        Self {
            value,
            source: CoercionSource::Parsed,
        }
    }

    #[inline]
    pub fn defaulted(value: T, source: CoercionSource) -> Self {
        Self { value, source }
    }

    /// 是否使用了默认值。
    #[inline]
    pub fn is_default(&self) -> bool {
        self.source != CoercionSource::Parsed
    }

    /// 记录中是否出现过该字段（即使为空白或无法解析）。
    #[inline]
    pub fn was_supplied(&self) -> bool {
        self.source != CoercionSource::Missing
    }
}

/// 解析允许逗号作小数点的数字文本，拒绝非有限值。
pub fn parse_locale_f64(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn coerce_f64(value: Option<&RawValue>, default: f64) -> Coerced<f64> {
    match value {
        None | Some(RawValue::Null) => Coerced::defaulted(default, CoercionSource::Missing),
        Some(RawValue::Number(number)) if number.is_finite() => Coerced::parsed(*number),
        Some(RawValue::Number(_)) | Some(RawValue::Bool(_)) => {
            Coerced::defaulted(default, CoercionSource::Unparseable)
        }
        Some(RawValue::Text(text)) if text.trim().is_empty() => {
            Coerced::defaulted(default, CoercionSource::Blank)
        }
        Some(RawValue::Text(text)) => match parse_locale_f64(text) {
            Some(number) => Coerced::parsed(number),
            None => Coerced::defaulted(default, CoercionSource::Unparseable),
        },
    }
}

/// ACI 颜色：截断为整数，超出 1–255 时退回默认值。
pub fn coerce_color(value: Option<&RawValue>, default: i16) -> Coerced<i16> {
    let number = coerce_f64(value, f64::from(default));
    if number.is_default() {
        return Coerced::defaulted(default, number.source);
    }
    let truncated = number.value.trunc();
    if (1.0..=255.0).contains(&truncated) {
        Coerced::parsed(truncated as i16)
    } else {
        Coerced::defaulted(default, CoercionSource::Unparseable)
    }
}

/// 所有数值型参数的转换结果。
#[derive(Debug, Clone, PartialEq)]
pub struct NumericFields {
    pub width: Coerced<f64>,
    pub height: Coerced<f64>,
    pub diameter: Coerced<f64>,
    pub rt_base: Coerced<f64>,
    pub rt_height: Coerced<f64>,
    pub triangle_base: Coerced<f64>,
    pub material_thickness: Coerced<f64>,
    pub material_density: Coerced<f64>,
    pub part_quantity: Coerced<f64>,
}

impl NumericFields {
    pub fn get(&self, key: CanonicalKey) -> Option<&Coerced<f64>> {
        match key {
            CanonicalKey::Width => Some(&self.width),
            CanonicalKey::Height => Some(&self.height),
            CanonicalKey::Diameter => Some(&self.diameter),
            CanonicalKey::RtBase => Some(&self.rt_base),
            CanonicalKey::RtHeight => Some(&self.rt_height),
            CanonicalKey::TriangleBase => Some(&self.triangle_base),
            CanonicalKey::MaterialThickness => Some(&self.material_thickness),
            CanonicalKey::MaterialDensity => Some(&self.material_density),
            CanonicalKey::PartQuantity => Some(&self.part_quantity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerColors {
    pub contour: i16,
    pub holes: i16,
    pub text: i16,
}

impl Default for LayerColors {
    fn default() -> Self {
        Self {
            contour: DEFAULT_CONTOUR_COLOR,
            holes: DEFAULT_HOLES_COLOR,
            text: DEFAULT_TEXT_COLOR,
        }
    }
}

/// 取必填文本字段（去除首尾空白后非空）。
pub fn require_text(record: &NormalizedRecord, key: CanonicalKey) -> Result<String, PipelineError> {
    record
        .get_present(key)
        .map(|value| value.to_text().trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(PipelineError::MissingRequiredField { field: key })
}

pub fn coerce_numeric_fields(
    record: &NormalizedRecord,
    diagnostics: &mut Diagnostics,
) -> NumericFields {
    let mut field = |key: CanonicalKey, default: f64| {
        let coerced = coerce_f64(record.get(key), default);
        report_substitution(diagnostics, key, record.get(key), coerced.source, default);
        coerced
    };
    NumericFields {
        width: field(CanonicalKey::Width, 0.0),
        height: field(CanonicalKey::Height, 0.0),
        diameter: field(CanonicalKey::Diameter, 0.0),
        rt_base: field(CanonicalKey::RtBase, 0.0),
        rt_height: field(CanonicalKey::RtHeight, 0.0),
        triangle_base: field(CanonicalKey::TriangleBase, 0.0),
        material_thickness: field(CanonicalKey::MaterialThickness, 0.0),
        material_density: field(CanonicalKey::MaterialDensity, DEFAULT_DENSITY_KG_M3),
        part_quantity: field(CanonicalKey::PartQuantity, DEFAULT_QUANTITY),
    }
}

pub fn coerce_layer_colors(record: &NormalizedRecord, diagnostics: &mut Diagnostics) -> LayerColors {
    let mut color = |key: CanonicalKey, default: i16| {
        let coerced = coerce_color(record.get(key), default);
        report_substitution(
            diagnostics,
            key,
            record.get(key),
            coerced.source,
            f64::from(default),
        );
        coerced.value
    };
    LayerColors {
        contour: color(CanonicalKey::ContourColor, DEFAULT_CONTOUR_COLOR),
        holes: color(CanonicalKey::HolesColor, DEFAULT_HOLES_COLOR),
        text: color(CanonicalKey::TextColor, DEFAULT_TEXT_COLOR),
    }
}

fn report_substitution(
    diagnostics: &mut Diagnostics,
    field: CanonicalKey,
    raw: Option<&RawValue>,
    source: CoercionSource,
    default: f64,
) {
    if source != CoercionSource::Unparseable {
        return;
    }
    let raw = raw.map(RawValue::to_text).unwrap_or_default();
    diagnostics.warn(
        DiagnosticKind::DefaultSubstituted { field, source },
        format!("字段 {field} 的值 \"{raw}\" 无法解析，使用默认值 {default}"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::normalize_record;
    use crate::record::RawRecord;

    fn text(value: &str) -> RawValue {
        RawValue::Text(value.to_string())
    }

    #[test]
    fn comma_is_accepted_as_decimal_separator() {
        let coerced = coerce_f64(Some(&text("10,5")), 0.0);
        assert_eq!(coerced.value, 10.5);
        assert_eq!(coerced.source, CoercionSource::Parsed);
        assert_eq!(coerce_f64(Some(&text("  7.25 ")), 0.0).value, 7.25);
    }

    #[test]
    fn empty_and_absent_values_fall_back_to_default() {
        let blank = coerce_f64(Some(&text("")), 0.0);
        assert_eq!(blank.value, 0.0);
        assert_eq!(blank.source, CoercionSource::Blank);

        let absent = coerce_f64(None, 0.0);
        assert_eq!(absent.value, 0.0);
        assert_eq!(absent.source, CoercionSource::Missing);
        assert!(!absent.was_supplied());

        let null = coerce_f64(Some(&RawValue::Null), 1.0);
        assert_eq!(null.value, 1.0);
    }

    #[test]
    fn garbage_never_raises() {
        for raw in ["abc", "1.000,5", "inf", "NaN", "--3"] {
            let coerced = coerce_f64(Some(&text(raw)), 3.0);
            assert_eq!(coerced.value, 3.0, "value {raw}");
            assert_eq!(coerced.source, CoercionSource::Unparseable, "value {raw}");
        }
        assert!(coerce_f64(Some(&RawValue::Bool(true)), 0.0).is_default());
        assert!(coerce_f64(Some(&RawValue::Number(f64::NAN)), 0.0).is_default());
    }

    #[test]
    fn colors_are_truncated_and_range_checked() {
        assert_eq!(coerce_color(Some(&text("3.9")), 7).value, 3);
        assert_eq!(coerce_color(Some(&RawValue::Number(256.0)), 7).value, 7);
        assert_eq!(coerce_color(Some(&text("0")), 2).value, 2);
        assert_eq!(coerce_color(None, 1).value, 1);
    }

    #[test]
    fn numeric_fields_use_declared_defaults() {
        let record = normalize_record(&RawRecord::new().with("largura", "100"));
        let mut diagnostics = Diagnostics::new();
        let fields = coerce_numeric_fields(&record, &mut diagnostics);

        assert_eq!(fields.width.value, 100.0);
        assert_eq!(fields.height.value, 0.0);
        assert_eq!(fields.part_quantity.value, 1.0);
        assert_eq!(fields.material_density.value, DEFAULT_DENSITY_KG_M3);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unparseable_values_are_reported() {
        let record = normalize_record(
            &RawRecord::new()
                .with("qtd", "duas")
                .with("contour_color", "vermelho"),
        );
        let mut diagnostics = Diagnostics::new();
        let fields = coerce_numeric_fields(&record, &mut diagnostics);
        let colors = coerce_layer_colors(&record, &mut diagnostics);

        assert_eq!(fields.part_quantity.value, 1.0);
        assert_eq!(colors.contour, DEFAULT_CONTOUR_COLOR);
        assert_eq!(diagnostics.len(), 2);
        assert!(matches!(
            diagnostics.entries()[0].kind,
            DiagnosticKind::DefaultSubstituted {
                field: CanonicalKey::PartQuantity,
                ..
            }
        ));
    }

    #[test]
    fn required_text_rejects_blank_values() {
        let record = normalize_record(&RawRecord::new().with("nome_arquivo", "   "));
        let err = require_text(&record, CanonicalKey::PartName).expect_err("blank name");
        assert!(matches!(
            err,
            PipelineError::MissingRequiredField {
                field: CanonicalKey::PartName
            }
        ));

        let record = normalize_record(&RawRecord::new().with("forma", " rectangle "));
        assert_eq!(
            require_text(&record, CanonicalKey::Shape).expect("shape present"),
            "rectangle"
        );
    }
}
