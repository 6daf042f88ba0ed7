use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use quarry_core::driver::QueryOutput;
use quarry_core::value::SqlValue;
use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guesses the format from the file name, looking through a `.gz` suffix.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".csv") {
            Some(Self::Csv)
        } else if name.ends_with(".json") {
            Some(Self::Json)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write export file at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize JSON export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot infer export format from {0}; use a .csv or .json file name")]
    UnknownFormat(String),
}

/// Writes `output` to `path` in the format implied by its extension.
pub fn export_output(path: &Path, output: &QueryOutput) -> Result<usize, ExportError> {
    match ExportFormat::from_path(path) {
        Some(ExportFormat::Csv) => export_to_csv(path, output),
        Some(ExportFormat::Json) => export_to_json(path, output),
        None => Err(ExportError::UnknownFormat(path.display().to_string())),
    }
}

/// Header row plus one line per result row. `NULL` becomes an empty field.
pub fn export_to_csv(path: &Path, output: &QueryOutput) -> Result<usize, ExportError> {
    let mut content = String::new();
    content.push_str(
        &output
            .columns
            .iter()
            .map(|column| csv_escape(&column.name))
            .collect::<Vec<_>>()
            .join(","),
    );
    content.push('\n');

    for row in &output.rows {
        let values = (0..output.columns.len())
            .map(|index| match row.get(index) {
                None | Some(SqlValue::Null) => String::new(),
                Some(SqlValue::Binary(bytes)) => hex(bytes),
                Some(value) => csv_escape(&value.to_string()),
            })
            .collect::<Vec<_>>();
        content.push_str(&values.join(","));
        content.push('\n');
    }

    write_payload(path, content.as_bytes())?;
    Ok(output.rows.len())
}

/// An array of objects keyed by column name.
pub fn export_to_json(path: &Path, output: &QueryOutput) -> Result<usize, ExportError> {
    let records = output
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::with_capacity(output.columns.len());
            for (index, column) in output.columns.iter().enumerate() {
                let value = row.get(index).map_or(Value::Null, json_value);
                object.insert(column.name.clone(), value);
            }
            Value::Object(object)
        })
        .collect::<Vec<_>>();

    let payload = serde_json::to_string_pretty(&records)?;
    write_payload(path, payload.as_bytes())?;
    Ok(output.rows.len())
}

fn json_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Int(value) => Value::from(*value),
        SqlValue::UInt(value) => Value::from(*value),
        SqlValue::Float(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
        SqlValue::Binary(bytes) => Value::String(hex(bytes)),
        other => Value::String(other.to_string()),
    }
}

fn write_payload(path: &Path, payload: &[u8]) -> Result<(), ExportError> {
    let to_error = |source| ExportError::Write {
        path: path.display().to_string(),
        source,
    };
    let file = BufWriter::new(File::create(path).map_err(to_error)?);

    let gzip = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("gz"));
    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(payload).map_err(to_error)?;
        encoder.finish().map_err(to_error)?.flush().map_err(to_error)
    } else {
        let mut file = file;
        file.write_all(payload).map_err(to_error)?;
        file.flush().map_err(to_error)
    }
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut rendered = String::with_capacity(2 + bytes.len() * 2);
    rendered.push_str("0x");
    for byte in bytes {
        let _ = write!(rendered, "{byte:02x}");
    }
    rendered
}

fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Read;
    use std::path::Path;

    use flate2::read::GzDecoder;
    use quarry_core::driver::{ColumnMeta, QueryOutput};
    use quarry_core::value::SqlValue;
    use tempfile::TempDir;

    use super::{export_output, export_to_csv, export_to_json, ExportError, ExportFormat};

    fn sample() -> QueryOutput {
        QueryOutput {
            columns: vec![
                ColumnMeta::new("id", "LONGLONG"),
                ColumnMeta::new("name", "VAR_STRING"),
                ColumnMeta::new("avatar", "BLOB"),
            ],
            rows: vec![
                vec![
                    SqlValue::Int(1),
                    SqlValue::Text("alpha".to_string()),
                    SqlValue::Null,
                ],
                vec![
                    SqlValue::Int(2),
                    SqlValue::Text("quote \"name\"".to_string()),
                    SqlValue::Binary(vec![0xca, 0xfe]),
                ],
            ],
            affected_rows: Some(0),
            insert_id: None,
        }
    }

    #[test]
    fn exports_rows_to_csv_with_header_and_escaping() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("result.csv");

        let written = export_to_csv(&path, &sample()).expect("csv export failed");

        assert_eq!(written, 2);
        let output = fs::read_to_string(path).expect("failed to read csv output");
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "id,name,avatar");
        assert_eq!(lines[1], "1,alpha,");
        assert_eq!(lines[2], "2,\"quote \"\"name\"\"\",0xcafe");
    }

    #[test]
    fn exports_rows_to_json_with_native_types() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("result.json");

        let written = export_to_json(&path, &sample()).expect("json export failed");

        assert_eq!(written, 2);
        let output = fs::read_to_string(path).expect("failed to read json output");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("invalid json");
        assert_eq!(parsed[0]["id"], 1);
        assert_eq!(parsed[0]["name"], "alpha");
        assert!(parsed[0]["avatar"].is_null());
        assert_eq!(parsed[1]["avatar"], "0xcafe");
    }

    #[test]
    fn gz_suffix_compresses_output() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("result.csv.gz");

        export_output(&path, &sample()).expect("gzip export failed");

        let compressed = fs::read(&path).expect("failed to read gzip output");
        let mut decoded = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .expect("output should be valid gzip");
        assert!(decoded.starts_with("id,name,avatar\n"));
    }

    #[test]
    fn format_is_inferred_from_file_name() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out/Report.JSON")),
            Some(ExportFormat::Json)
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("rows.csv.gz")),
            Some(ExportFormat::Csv)
        );
        assert_eq!(ExportFormat::from_path(Path::new("rows.xml")), None);

        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let error = export_output(&temp_dir.path().join("rows.xml"), &sample())
            .expect_err("unknown format should be rejected");
        assert!(matches!(error, ExportError::UnknownFormat(_)));
    }
}
