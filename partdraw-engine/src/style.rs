use partdraw_core::geometry::Point2;

use crate::coerce::{LayerColors, NumericFields};
use crate::record::RawValue;

/// 复选框类选项的真值集合（不区分大小写）。
pub const TRUTHY_TOKENS: [&str; 4] = ["true", "on", "1", "sim"];

/// 所有尺寸均为 0 时用于推导字高的替代尺寸。
pub const FALLBACK_MAX_DIMENSION: f64 = 200.0;
pub const MIN_CHAR_HEIGHT: f64 = 5.0;
pub const MAX_CHAR_HEIGHT: f64 = 35.0;
pub const MIN_DIM_DISTANCE: f64 = 15.0;

/// 与绘图比例相关的呈现参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleConfig {
    pub contour_color: i16,
    pub holes_color: i16,
    pub text_color: i16,
    pub include_dims: bool,
    pub char_height: f64,
    pub dim_distance: f64,
    pub text_insert_point: Point2,
}

pub fn is_truthy(value: Option<&RawValue>) -> bool {
    match value {
        Some(RawValue::Bool(flag)) => *flag,
        Some(other) => {
            let token = other.to_text().trim().to_lowercase();
            TRUTHY_TOKENS.contains(&token.as_str())
        }
        None => false,
    }
}

pub fn compute_style(fields: &NumericFields, colors: LayerColors, include_dims: bool) -> StyleConfig {
    let max_dim = fields
        .width
        .value
        .max(fields.height.value)
        .max(fields.diameter.value);
    let max_dim = if max_dim > 0.0 {
        max_dim
    } else {
        FALLBACK_MAX_DIMENSION
    };
    let char_height = (max_dim / 25.0).clamp(MIN_CHAR_HEIGHT, MAX_CHAR_HEIGHT);
    StyleConfig {
        contour_color: colors.contour,
        holes_color: colors.holes,
        text_color: colors.text,
        include_dims,
        char_height,
        dim_distance: (char_height * 3.0).max(MIN_DIM_DISTANCE),
        // 放在原点下方，避免与向上绘制的几何重叠。
        text_insert_point: Point2::new(0.0, -2.0 * char_height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::{Coerced, CoercionSource};

    fn fields(width: f64, height: f64, diameter: f64) -> NumericFields {
        let value = |v: f64| Coerced::parsed(v);
        let missing = Coerced::defaulted(0.0, CoercionSource::Missing);
        NumericFields {
            width: value(width),
            height: value(height),
            diameter: value(diameter),
            rt_base: missing,
            rt_height: missing,
            triangle_base: missing,
            material_thickness: missing,
            material_density: value(7850.0),
            part_quantity: value(1.0),
        }
    }

    #[test]
    fn truthy_tokens_are_case_insensitive() {
        for token in ["true", "TRUE", "On", "1", "SIM", " sim "] {
            assert!(is_truthy(Some(&RawValue::Text(token.into()))), "{token}");
        }
        for token in ["false", "yes", "0", "", "não", "verdadeiro"] {
            assert!(!is_truthy(Some(&RawValue::Text(token.into()))), "{token}");
        }
        assert!(is_truthy(Some(&RawValue::Number(1.0))));
        assert!(is_truthy(Some(&RawValue::Bool(true))));
        assert!(!is_truthy(Some(&RawValue::Number(2.0))));
        assert!(!is_truthy(None));
    }

    #[test]
    fn char_height_scales_with_largest_dimension() {
        let style = compute_style(&fields(500.0, 100.0, 0.0), LayerColors::default(), false);
        assert_eq!(style.char_height, 20.0);
        assert_eq!(style.dim_distance, 60.0);
        assert_eq!(style.text_insert_point, Point2::new(0.0, -40.0));
    }

    #[test]
    fn char_height_is_clamped() {
        let small = compute_style(&fields(10.0, 10.0, 0.0), LayerColors::default(), false);
        assert_eq!(small.char_height, MIN_CHAR_HEIGHT);
        assert_eq!(small.dim_distance, MIN_DIM_DISTANCE);

        let large = compute_style(&fields(0.0, 0.0, 5000.0), LayerColors::default(), true);
        assert_eq!(large.char_height, MAX_CHAR_HEIGHT);
        assert_eq!(large.dim_distance, 105.0);
        assert!(large.include_dims);
    }

    #[test]
    fn zero_dimensions_use_fallback_scale() {
        let style = compute_style(&fields(0.0, 0.0, 0.0), LayerColors::default(), false);
        assert_eq!(style.char_height, FALLBACK_MAX_DIMENSION / 25.0);
        assert_eq!(style.contour_color, 7);
        assert_eq!(style.holes_color, 1);
        assert_eq!(style.text_color, 2);
    }
}
