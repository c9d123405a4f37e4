use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{
    ArrayRef, Float64Array, Float64Builder, Int64Array, ListBuilder, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Value as JsonValue};

use crate::sif::model::MetadataValue;
use crate::sif::spectrum::MismatchPolicy;
use crate::sif::DecodedFile;

// ---------------------------------------------------------------------------
// SpectrumRecord – one exported row
// ---------------------------------------------------------------------------

/// One calibrated frame, flattened into a table row.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumRecord {
    /// Wavelength axis (x).
    pub x: Vec<f64>,
    /// Counts (y) – same length as `x`.
    pub y: Vec<f64>,
    /// Scalar header fields plus `source` and `frame`.
    pub metadata: BTreeMap<String, MetadataValue>,
}

/// One record per calibrated frame of `file`, tagged with `source`.
pub fn records_from_decoded(
    source: &str,
    file: &DecodedFile,
    policy: MismatchPolicy,
) -> Result<Vec<SpectrumRecord>> {
    let spectrum = file
        .calibrated_spectrum(policy)
        .with_context(|| format!("pairing wavelengths with counts for {source}"))?;

    let scalars: BTreeMap<String, MetadataValue> = file
        .metadata
        .iter()
        .filter(|(_, v)| v.is_scalar())
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();

    Ok(spectrum
        .frames
        .into_iter()
        .map(|frame| {
            let mut metadata = scalars.clone();
            metadata.insert("source".into(), MetadataValue::String(source.to_string()));
            metadata.insert("frame".into(), MetadataValue::Integer(frame.frame as i64));
            SpectrumRecord {
                x: frame.wavelengths,
                y: frame.counts,
                metadata,
            }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write spectrum records to a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – `x` and `y` list columns plus one column per field
/// * `.json`    – `[{ "x": [...], "y": [...], ...meta }, ...]`
/// * `.csv`     – columns `x` and `y` containing semicolon-separated floats
pub fn write_file(path: &Path, records: &[SpectrumRecord]) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "parquet" | "pq" => write_parquet(path, records),
        "json" => write_json(path, records),
        "csv" => write_csv(path, records),
        other => bail!("Unsupported output extension: .{other}"),
    }?;
    log::info!("Wrote {} spectra to {}", records.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Column typing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Integer,
    Float,
    Text,
}

/// Union of metadata columns over all records, with one type per column.
/// Integer and float cells widen to float; anything else mixed becomes text.
fn column_kinds(records: &[SpectrumRecord]) -> BTreeMap<String, ColumnKind> {
    let mut kinds: BTreeMap<String, ColumnKind> = BTreeMap::new();
    for rec in records {
        for (col, val) in &rec.metadata {
            let kind = match val {
                MetadataValue::Integer(_) => ColumnKind::Integer,
                MetadataValue::Float(_) => ColumnKind::Float,
                _ => ColumnKind::Text,
            };
            kinds
                .entry(col.clone())
                .and_modify(|k| {
                    *k = match (*k, kind) {
                        (a, b) if a == b => a,
                        (ColumnKind::Integer, ColumnKind::Float)
                        | (ColumnKind::Float, ColumnKind::Integer) => ColumnKind::Float,
                        _ => ColumnKind::Text,
                    }
                })
                .or_insert(kind);
        }
    }
    kinds
}

// ---------------------------------------------------------------------------
// JSON writer
// ---------------------------------------------------------------------------

fn write_json(path: &Path, records: &[SpectrumRecord]) -> Result<()> {
    let rows = records
        .iter()
        .map(|rec| -> Result<JsonValue, serde_json::Error> {
            let mut obj = Map::new();
            obj.insert("x".into(), serde_json::to_value(&rec.x)?);
            obj.insert("y".into(), serde_json::to_value(&rec.y)?);
            for (key, val) in &rec.metadata {
                obj.insert(key.clone(), serde_json::to_value(val)?);
            }
            Ok(JsonValue::Object(obj))
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()
        .context("serializing records")?;

    let file = File::create(path).context("creating JSON file")?;
    serde_json::to_writer_pretty(BufWriter::new(file), &rows).context("writing JSON")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

/// Header row `x,y,<columns...>`; `x` and `y` cells hold `;`-joined floats.
fn write_csv(path: &Path, records: &[SpectrumRecord]) -> Result<()> {
    let columns: Vec<String> = column_kinds(records).into_keys().collect();
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;

    let mut header = vec!["x".to_string(), "y".to_string()];
    header.extend(columns.iter().cloned());
    writer.write_record(&header).context("writing CSV header")?;

    for (row_no, rec) in records.iter().enumerate() {
        let mut row = vec![join_semicolon(&rec.x), join_semicolon(&rec.y)];
        row.extend(
            columns
                .iter()
                .map(|col| rec.metadata.get(col).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer
            .write_record(&row)
            .with_context(|| format!("writing CSV row {row_no}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn join_semicolon(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

/// Schema:
/// - `x`: List<Float64> – wavelengths
/// - `y`: List<Float64> – counts
/// - one nullable Int64 / Float64 / Utf8 column per metadata field
fn write_parquet(path: &Path, records: &[SpectrumRecord]) -> Result<()> {
    let list_type = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
    let mut fields = vec![
        Field::new("x", list_type.clone(), false),
        Field::new("y", list_type, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(build_f64_list(records.iter().map(|r| r.x.as_slice()))),
        Arc::new(build_f64_list(records.iter().map(|r| r.y.as_slice()))),
    ];

    for (name, kind) in column_kinds(records) {
        let cells = records.iter().map(|r| r.metadata.get(&name));
        let (data_type, array): (DataType, ArrayRef) = match kind {
            ColumnKind::Integer => (
                DataType::Int64,
                Arc::new(cells.map(|v| v.and_then(MetadataValue::as_i64)).collect::<Int64Array>()),
            ),
            ColumnKind::Float => (
                DataType::Float64,
                Arc::new(cells.map(|v| v.and_then(MetadataValue::as_f64)).collect::<Float64Array>()),
            ),
            ColumnKind::Text => (
                DataType::Utf8,
                Arc::new(cells.map(|v| v.map(|v| v.to_string())).collect::<StringArray>()),
            ),
        };
        fields.push(Field::new(name, data_type, true));
        columns.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = File::create(path).context("creating parquet file")?;
    let mut writer =
        ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn build_f64_list<'a>(rows: impl Iterator<Item = &'a [f64]>) -> arrow::array::ListArray {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = builder.values();
        for &v in row {
            values.append_value(v);
        }
        builder.append(true);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sif::writer::SifBuilder;
    use crate::{decode_reader, DecodeOptions};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::io::Cursor;

    fn two_frame_records() -> Vec<SpectrumRecord> {
        let bytes = SifBuilder::new(3, 1)
            .calibration(&[400.0, 1.0])
            .frame(vec![1.0, 2.0, 3.0])
            .frame(vec![4.0, 5.0, 6.0])
            .to_bytes()
            .unwrap();
        let file = decode_reader(Cursor::new(bytes), &DecodeOptions::default()).unwrap();
        records_from_decoded("capture.sif", &file, MismatchPolicy::Reject).unwrap()
    }

    #[test]
    fn one_record_per_frame() {
        let records = two_frame_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].x, vec![401.0, 402.0, 403.0]);
        assert_eq!(records[1].y, vec![4.0, 5.0, 6.0]);
        assert_eq!(records[1].metadata["frame"], MetadataValue::Integer(1));
        assert_eq!(
            records[0].metadata["source"],
            MetadataValue::String("capture.sif".into())
        );
        assert!(!records[0].metadata.contains_key("DetectorDimensions"));
    }

    #[test]
    fn mixed_columns_widen() {
        let mut a = BTreeMap::new();
        a.insert("n".to_string(), MetadataValue::Integer(1));
        a.insert("s".to_string(), MetadataValue::Integer(1));
        let mut b = BTreeMap::new();
        b.insert("n".to_string(), MetadataValue::Float(1.5));
        b.insert("s".to_string(), MetadataValue::String("x".into()));
        let rec = |metadata| SpectrumRecord { x: vec![], y: vec![], metadata };
        let kinds = column_kinds(&[rec(a), rec(b)]);
        assert_eq!(kinds["n"], ColumnKind::Float);
        assert_eq!(kinds["s"], ColumnKind::Text);
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_file(&path, &two_frame_records()).unwrap();

        let root: JsonValue =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let rows = root.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["x"], serde_json::json!([401.0, 402.0, 403.0]));
        assert_eq!(rows[0]["SifVersion"], serde_json::json!(65567));
        // NaN Raman wavelength has no JSON form
        assert!(rows[0]["RamanExWavelength"].is_null());
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_file(&path, &two_frame_records()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "x");
        assert_eq!(&headers[1], "y");
        let y_idx = 1;
        let frame_idx = headers.iter().position(|h| h == "frame").unwrap();
        let rows: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[1][y_idx], "4;5;6");
        assert_eq!(&rows[1][frame_idx], "1");
    }

    #[test]
    fn parquet_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        write_file(&path, &two_frame_records()).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let mut rows = 0;
        for batch in reader {
            let batch = batch.unwrap();
            let schema = batch.schema();
            assert!(schema.index_of("x").is_ok());
            assert!(schema.index_of("ExposureTime").is_ok());
            rows += batch.num_rows();
        }
        assert_eq!(rows, 2);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_file(&dir.path().join("out.txt"), &[]).unwrap_err();
        assert!(err.to_string().contains(".txt"));
    }
}
