//! 字段名归一化：把表单/表格中的列名映射到内部规范键。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::record::{RawRecord, RawValue};

/// 管线识别的全部规范参数名。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalKey {
    PartName,
    Shape,
    Width,
    Height,
    Diameter,
    RtBase,
    RtHeight,
    TriangleBase,
    IncludeTextInfo,
    IncludeDims,
    PartQuantity,
    MaterialThickness,
    MaterialDensity,
    ContourColor,
    HolesColor,
    TextColor,
}

impl CanonicalKey {
    pub const ALL: [CanonicalKey; 16] = [
        CanonicalKey::PartName,
        CanonicalKey::Shape,
        CanonicalKey::Width,
        CanonicalKey::Height,
        CanonicalKey::Diameter,
        CanonicalKey::RtBase,
        CanonicalKey::RtHeight,
        CanonicalKey::TriangleBase,
        CanonicalKey::IncludeTextInfo,
        CanonicalKey::IncludeDims,
        CanonicalKey::PartQuantity,
        CanonicalKey::MaterialThickness,
        CanonicalKey::MaterialDensity,
        CanonicalKey::ContourColor,
        CanonicalKey::HolesColor,
        CanonicalKey::TextColor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalKey::PartName => "part_name",
            CanonicalKey::Shape => "shape",
            CanonicalKey::Width => "width",
            CanonicalKey::Height => "height",
            CanonicalKey::Diameter => "diameter",
            CanonicalKey::RtBase => "rt_base",
            CanonicalKey::RtHeight => "rt_height",
            CanonicalKey::TriangleBase => "triangle_base",
            CanonicalKey::IncludeTextInfo => "include_text_info",
            CanonicalKey::IncludeDims => "include_dims",
            CanonicalKey::PartQuantity => "part_quantity",
            CanonicalKey::MaterialThickness => "material_thickness",
            CanonicalKey::MaterialDensity => "material_density",
            CanonicalKey::ContourColor => "contour_color",
            CanonicalKey::HolesColor => "holes_color",
            CanonicalKey::TextColor => "text_color",
        }
    }

    /// 按规范名精确查找（要求已归一化）。
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 面向用户的列名别名（已归一化形式）→ 规范键。
pub const ALIASES: &[(&str, CanonicalKey)] = &[
    ("nome_arquivo", CanonicalKey::PartName),
    ("custom_filename", CanonicalKey::PartName),
    ("drawing_code", CanonicalKey::PartName),
    ("forma", CanonicalKey::Shape),
    ("largura", CanonicalKey::Width),
    ("altura", CanonicalKey::Height),
    ("diametro", CanonicalKey::Diameter),
    ("base_(cateto_1)", CanonicalKey::RtBase),
    ("altura_(cateto_2)", CanonicalKey::RtHeight),
    ("base", CanonicalKey::TriangleBase),
    ("habilitar_bloco", CanonicalKey::IncludeTextInfo),
    ("cotas", CanonicalKey::IncludeDims),
    ("qtd", CanonicalKey::PartQuantity),
    ("espessura", CanonicalKey::MaterialThickness),
];

/// 归一化后的字段键：识别出的规范键，或原样透传的未知键。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    Canonical(CanonicalKey),
    Other(String),
}

/// 去除首尾空白、转小写，并以 `_` 连接内部空白。
pub fn clean_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

pub fn normalize_key(raw: &str) -> FieldKey {
    let cleaned = clean_key(raw);
    if let Some(key) = CanonicalKey::from_name(&cleaned) {
        return FieldKey::Canonical(key);
    }
    match ALIASES.iter().find(|(alias, _)| *alias == cleaned) {
        Some((_, key)) => FieldKey::Canonical(*key),
        None => FieldKey::Other(cleaned),
    }
}

/// 以规范键索引的记录视图。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    canonical: BTreeMap<CanonicalKey, RawValue>,
    extra: BTreeMap<String, RawValue>,
}

impl NormalizedRecord {
    pub fn get(&self, key: CanonicalKey) -> Option<&RawValue> {
        self.canonical.get(&key)
    }

    /// 非空白的值；空白单元格视为缺失。
    pub fn get_present(&self, key: CanonicalKey) -> Option<&RawValue> {
        self.get(key).filter(|value| !value.is_blank())
    }

    pub fn set(&mut self, key: FieldKey, value: RawValue) {
        match key {
            FieldKey::Canonical(key) => {
                self.canonical.insert(key, value);
            }
            FieldKey::Other(name) => {
                self.extra.insert(name, value);
            }
        }
    }

    pub fn extra(&self, name: &str) -> Option<&RawValue> {
        self.extra.get(name)
    }

    /// 叠加全局覆盖值：覆盖值在行值之后写入，空白的覆盖值被忽略。
    pub fn apply_overrides(&mut self, overrides: &NormalizedRecord) {
        for (key, value) in &overrides.canonical {
            if !value.is_blank() {
                self.canonical.insert(*key, value.clone());
            }
        }
        for (name, value) in &overrides.extra {
            if !value.is_blank() {
                self.extra.insert(name.clone(), value.clone());
            }
        }
    }
}

pub fn normalize_record(record: &RawRecord) -> NormalizedRecord {
    let mut normalized = NormalizedRecord::default();
    for (key, value) in record.iter() {
        normalized.set(normalize_key(key), value.clone());
    }
    normalized
}
