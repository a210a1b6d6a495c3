use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use partdraw_engine::{RawRecord, RawValue};
use serde::Deserialize;
use tracing::info;

use crate::errors::FrontendError;

/// 记录文件格式，按扩展名识别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Json,
    Csv,
}

impl RecordFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// JSON 输入既可以是对象数组，也可以是单个对象。
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonRecords {
    Many(Vec<RawRecord>),
    One(RawRecord),
}

/// 读取记录文件；行顺序与文件中一致。
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, FrontendError> {
    let format = RecordFormat::from_path(path).ok_or_else(|| FrontendError::UnsupportedSource {
        path: path.to_path_buf(),
    })?;
    let records = match format {
        RecordFormat::Json => {
            let data = fs::read_to_string(path).map_err(|source| read_error(path, source))?;
            parse_json_records(&data).map_err(|source| FrontendError::Json {
                path: path.to_path_buf(),
                source,
            })?
        }
        RecordFormat::Csv => {
            let file = fs::File::open(path).map_err(|source| read_error(path, source))?;
            parse_csv_records(file).map_err(|source| FrontendError::Csv {
                path: path.to_path_buf(),
                source,
            })?
        }
    };
    info!(path = %path.display(), rows = records.len(), "记录文件读取完成");
    Ok(records)
}

pub fn parse_json_records(data: &str) -> Result<Vec<RawRecord>, serde_json::Error> {
    Ok(match serde_json::from_str::<JsonRecords>(data)? {
        JsonRecords::Many(records) => records,
        JsonRecords::One(record) => vec![record],
    })
}

/// 首行为表头；单元格去除首尾空白后作为文本值，缺失的单元格不写入记录。
pub fn parse_csv_records<R: Read>(reader: R) -> Result<Vec<RawRecord>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: RawRecord = headers
            .iter()
            .zip(row.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, value)| (header.clone(), RawValue::Text(value.trim().to_string())))
            .collect();
        records.push(record);
    }
    Ok(records)
}

/// 解析命令行中的 `key=value` 参数，值按文本处理。
pub fn parse_assignments<I, S>(assignments: I) -> Result<RawRecord, FrontendError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut record = RawRecord::new();
    for assignment in assignments {
        let assignment = assignment.as_ref();
        let (key, value) = assignment
            .split_once('=')
            .filter(|(key, _)| !key.trim().is_empty())
            .ok_or_else(|| FrontendError::InvalidAssignment(assignment.to_string()))?;
        record.insert(key.trim(), value);
    }
    Ok(record)
}

fn read_error(path: &Path, source: std::io::Error) -> FrontendError {
    FrontendError::ReadSource {
        path: PathBuf::from(path),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn json_accepts_array_or_single_object() {
        let many = parse_json_records(
            r#"[{"nome_arquivo": "A", "largura": 100, "cotas": true}, {"part_name": null}]"#,
        )
        .expect("array");
        assert_eq!(many.len(), 2);
        assert_eq!(many[0].get("largura"), Some(&RawValue::Number(100.0)));
        assert_eq!(many[0].get("cotas"), Some(&RawValue::Bool(true)));
        assert_eq!(many[1].get("part_name"), Some(&RawValue::Null));

        let one = parse_json_records(r#"{"forma": "rectangle"}"#).expect("object");
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn csv_rows_keep_order_and_trim_cells() {
        let data = "Nome Arquivo , Largura,Altura\nA, 100 ,50\n,,\nB,20\n";
        let records = parse_csv_records(data.as_bytes()).expect("csv");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get("Nome Arquivo"), Some(&RawValue::from("A")));
        assert_eq!(records[0].get("Largura"), Some(&RawValue::from("100")));
        assert!(records[1].is_blank());
        assert_eq!(records[2].get("Altura"), None);
    }

    #[test]
    fn assignments_require_equals_sign() {
        let record = parse_assignments(["part_name=Plate A", " largura = 10,5", "cotas="])
            .expect("valid assignments");
        assert_eq!(record.get("part_name"), Some(&RawValue::from("Plate A")));
        assert_eq!(record.get("largura"), Some(&RawValue::from(" 10,5")));
        assert_eq!(record.get("cotas"), Some(&RawValue::from("")));

        for invalid in ["largura", "=10"] {
            assert!(matches!(
                parse_assignments([invalid]),
                Err(FrontendError::InvalidAssignment(_))
            ));
        }
    }

    #[test]
    fn load_records_dispatches_on_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        let csv_path = dir.path().join("parts.CSV");
        let mut file = fs::File::create(&csv_path).expect("create csv");
        writeln!(file, "part_name,shape\nA,rectangle").expect("write csv");
        assert_eq!(load_records(&csv_path).expect("csv").len(), 1);

        let txt_path = dir.path().join("parts.txt");
        fs::write(&txt_path, "part_name=A").expect("write txt");
        assert!(matches!(
            load_records(&txt_path),
            Err(FrontendError::UnsupportedSource { .. })
        ));

        let bad_json = dir.path().join("parts.json");
        fs::write(&bad_json, "[1, 2]").expect("write json");
        assert!(matches!(
            load_records(&bad_json),
            Err(FrontendError::Json { .. })
        ));
    }
}
