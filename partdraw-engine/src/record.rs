use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 单元格/表单字段的原始值。JSON 中的 `null` 对应 [`RawValue::Null`]。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl RawValue {
    /// 空值或纯空白文本。
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(text) => text.trim().is_empty(),
            RawValue::Number(_) | RawValue::Bool(_) => false,
        }
    }

    /// 文本视图。整数值的数字不带小数部分，例如 `1.0` 输出为 `1`。
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Number(value) => {
                if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
                    format!("{}", *value as i64)
                } else {
                    value.to_string()
                }
            }
            RawValue::Bool(value) => value.to_string(),
            RawValue::Text(text) => text.clone(),
            RawValue::Null => String::new(),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

/// 一条零件记录：保持字段插入顺序，同名键后写覆盖先写。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, RawValue)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    /// 链式构造，便于测试与命令行参数拼装。
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 整行为空（例如表格中的空白行）。
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, value)| value.is_blank())
    }
}

impl<K, V> FromIterator<(K, V)> for RawRecord
where
    K: Into<String>,
    V: Into<RawValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RawRecord::new();
        for (key, value) in iter {
            record.insert(key, value);
        }
        record
    }
}

impl Serialize for RawRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// 按文档顺序逐项插入，别名冲突时以后出现的列为准。
impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = RawRecord;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of field names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RawRecord, A::Error> {
                let mut record = RawRecord::new();
                while let Some((key, value)) = access.next_entry::<String, RawValue>()? {
                    record.insert(key, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_existing_key_in_place() {
        let mut record = RawRecord::new().with("Largura", "10").with("Altura", "5");
        record.insert("Largura", 12.0);
        let keys: Vec<&str> = record.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["Largura", "Altura"]);
        assert_eq!(record.get("Largura"), Some(&RawValue::Number(12.0)));
    }

    #[test]
    fn numbers_render_without_trailing_fraction() {
        assert_eq!(RawValue::Number(1.0).to_text(), "1");
        assert_eq!(RawValue::Number(10.5).to_text(), "10.5");
        assert_eq!(RawValue::Bool(true).to_text(), "true");
        assert_eq!(RawValue::Null.to_text(), "");
    }

    #[test]
    fn blank_rows_are_detected() {
        let record = RawRecord::new().with("a", "  ").with("b", RawValue::Null);
        assert!(record.is_blank());
        assert!(!record.clone().with("c", 0.0).is_blank());
    }

    #[test]
    fn deserializes_from_json_object() {
        let record: RawRecord = serde_json::from_str(
            r#"{"Nome Arquivo": "P1", "largura": 100, "cotas": true, "obs": null}"#,
        )
        .expect("valid json record");
        assert_eq!(record.get("largura"), Some(&RawValue::Number(100.0)));
        assert_eq!(record.get("cotas"), Some(&RawValue::Bool(true)));
        assert_eq!(record.get("obs"), Some(&RawValue::Null));
        assert_eq!(record.get("Nome Arquivo"), Some(&RawValue::Text("P1".into())));
    }

    #[test]
    fn json_keeps_document_order() {
        let record: RawRecord =
            serde_json::from_str(r#"{"zeta": 1, "part_name": "First", "nome_arquivo": "Second"}"#)
                .expect("valid json record");
        let keys: Vec<&str> = record.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["zeta", "part_name", "nome_arquivo"]);
        assert_eq!(
            serde_json::to_string(&record).expect("serialize"),
            r#"{"zeta":1.0,"part_name":"First","nome_arquivo":"Second"}"#
        );
    }
}
