//! 重量与标注文字。面积非正时不算致命错误：改为输出固定的诊断文字，
//! 让零件照常出图，车间可在图面上看到问题。

use serde::Serialize;
use thiserror::Error;

use crate::coerce::NumericFields;
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// 重量无法计算时写在图面上的固定文字。
pub const WEIGHT_ERROR_LINE: &str = "ERRO NO CALCULO DE PESO";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightReport {
    pub area_mm2: f64,
    pub volume_m3: f64,
    pub unit_weight_kg: f64,
    pub total_weight_kg: f64,
    pub quantity: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum WeightError {
    #[error("part area is {0}, expected a positive value")]
    NonPositiveArea(f64),
}

/// 面积单位 mm²，厚度单位 mm，密度单位 kg/m³。数量按整数截断。
pub fn compute_weight(
    area_mm2: f64,
    thickness_mm: f64,
    density_kg_m3: f64,
    quantity: f64,
) -> Result<WeightReport, WeightError> {
    if !area_mm2.is_finite() || area_mm2 <= 0.0 {
        return Err(WeightError::NonPositiveArea(area_mm2));
    }
    let volume_m3 = (area_mm2 / 1_000_000.0) * (thickness_mm / 1_000.0);
    let unit_weight_kg = volume_m3 * density_kg_m3;
    let quantity = quantity.trunc() as i64;
    Ok(WeightReport {
        area_mm2,
        volume_m3,
        unit_weight_kg,
        total_weight_kg: unit_weight_kg * quantity as f64,
        quantity,
    })
}

/// 固定位数格式化并以逗号作小数点。
pub fn format_decimal_comma(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}").replace('.', ",")
}

/// 标注文字块：正常时 4 行，面积无效时 2 行诊断文字。
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub lines: Vec<String>,
    pub weight: Option<WeightReport>,
}

pub fn build_annotation(
    part_name: &str,
    area_mm2: f64,
    fields: &NumericFields,
    diagnostics: &mut Diagnostics,
) -> Annotation {
    let title = part_name.to_uppercase();
    match compute_weight(
        area_mm2,
        fields.material_thickness.value,
        fields.material_density.value,
        fields.part_quantity.value,
    ) {
        Ok(report) => Annotation {
            lines: vec![
                title,
                format!(
                    "Thickness: {:.2} mm (Qty: {:02}x)",
                    fields.material_thickness.value, report.quantity
                ),
                format!(
                    "Unit Weight: {} kg",
                    format_decimal_comma(report.unit_weight_kg, 3)
                ),
                format!(
                    "Total Weight: {} kg",
                    format_decimal_comma(report.total_weight_kg, 3)
                ),
            ],
            weight: Some(report),
        },
        Err(err) => {
            diagnostics.warn(
                DiagnosticKind::WeightCalculation,
                format!("无法计算零件 {part_name} 的重量: {err}"),
            );
            Annotation {
                lines: vec![title, WEIGHT_ERROR_LINE.to_string()],
                weight: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::Coerced;

    fn fields(thickness: f64, density: f64, quantity: f64) -> NumericFields {
        let value = Coerced::parsed;
        NumericFields {
            width: value(0.0),
            height: value(0.0),
            diameter: value(0.0),
            rt_base: value(0.0),
            rt_height: value(0.0),
            triangle_base: value(0.0),
            material_thickness: value(thickness),
            material_density: value(density),
            part_quantity: value(quantity),
        }
    }

    #[test]
    fn steel_plate_weight() {
        let report = compute_weight(1_000_000.0, 10.0, 7850.0, 2.0).expect("positive area");
        assert!((report.volume_m3 - 0.01).abs() < 1e-12);
        assert!((report.unit_weight_kg - 78.5).abs() < 1e-9);
        assert!((report.total_weight_kg - 157.0).abs() < 1e-9);
        assert_eq!(report.quantity, 2);
    }

    #[test]
    fn quantity_is_truncated() {
        let report = compute_weight(1_000_000.0, 1.0, 1000.0, 2.9).expect("positive area");
        assert_eq!(report.quantity, 2);
        assert!((report.total_weight_kg - 2.0).abs() < 1e-9);
    }

    #[test]
    fn annotation_uses_decimal_comma() {
        let mut diagnostics = Diagnostics::new();
        let annotation = build_annotation(
            "Flange a",
            1_000_000.0,
            &fields(10.0, 7850.0, 2.0),
            &mut diagnostics,
        );
        assert_eq!(
            annotation.lines,
            vec![
                "FLANGE A".to_string(),
                "Thickness: 10.00 mm (Qty: 02x)".to_string(),
                "Unit Weight: 78,500 kg".to_string(),
                "Total Weight: 157,000 kg".to_string(),
            ]
        );
        assert!(annotation.weight.is_some());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn zero_area_produces_diagnostic_lines() {
        let mut diagnostics = Diagnostics::new();
        let annotation =
            build_annotation("p2", 0.0, &fields(3.0, 7850.0, 1.0), &mut diagnostics);
        assert_eq!(
            annotation.lines,
            vec!["P2".to_string(), WEIGHT_ERROR_LINE.to_string()]
        );
        assert!(annotation.weight.is_none());
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics.entries()[0].kind,
            DiagnosticKind::WeightCalculation
        ));
    }

    #[test]
    fn decimal_comma_formatting() {
        assert_eq!(format_decimal_comma(0.5, 3), "0,500");
        assert_eq!(format_decimal_comma(1234.5678, 3), "1234,568");
    }
}
