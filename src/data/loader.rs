use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use arrow::error::ArrowError;
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::error::LoadError;
use super::model::{Dataset, FieldDef, FieldType, MetadataValue, Record, Schema, LATITUDE, LONGITUDE};

// ---------------------------------------------------------------------------
// Load-time configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Json,
    Parquet,
}

/// How the source is parsed and normalised.
///
/// Every field has a default, so a JSON config file only needs the keys it
/// overrides:
///
/// ```json
/// { "delimiter": ",", "categorical_fields": ["Ville"] }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Force a format instead of guessing from the file extension.
    pub format: Option<SourceFormat>,
    /// Field delimiter of delimited sources.
    pub delimiter: char,
    /// Cell contents (after trimming) read as null in delimited sources.
    pub null_values: Vec<String>,
    /// Columns used for filtering and counting.  All are required.
    pub categorical_fields: Vec<String>,
    /// Source column name → canonical name.
    pub column_renames: BTreeMap<String, String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            format: None,
            delimiter: ';',
            null_values: vec![String::new()],
            categorical_fields: vec!["Ville".to_string(), "Accès".to_string()],
            column_renames: BTreeMap::from([
                ("lat_coor1".to_string(), LATITUDE.to_string()),
                ("long_coor1".to_string(), LONGITUDE.to_string()),
            ]),
        }
    }
}

impl LoadOptions {
    /// Read options from a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) fn delimiter_byte(&self) -> Result<u8, LoadError> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(LoadError::InvalidDelimiter(self.delimiter))
        }
    }

    fn is_null_token(&self, cell: &str) -> bool {
        let cell = cell.trim();
        self.null_values.iter().any(|n| n.trim() == cell)
    }
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load and normalise a dataset from a file.  Dispatch by
/// [`LoadOptions::format`], falling back to the extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – delimited text with a header row
/// * `.json`         – `[{ "Ville": "Paris", "lat_coor1": 48.8, ... }, ...]`
/// * `.parquet`      – flat Arrow-typed columns
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset, LoadError> {
    let format = match options.format {
        Some(format) => format,
        None => format_from_extension(path)?,
    };
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match format {
        SourceFormat::Csv => read_csv(file, options),
        SourceFormat::Json => read_json(file, options),
        SourceFormat::Parquet => read_parquet(file, options),
    }
}

fn format_from_extension(path: &Path) -> Result<SourceFormat, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" | "txt" => Ok(SourceFormat::Csv),
        "json" => Ok(SourceFormat::Json),
        "parquet" | "pq" => Ok(SourceFormat::Parquet),
        other => Err(LoadError::UnsupportedFormat(format!(".{other}"))),
    }
}

static NULL: MetadataValue = MetadataValue::Null;

/// Cells as read from the source, before normalisation.
struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<MetadataValue>>,
    /// Text cells of passthrough columns get a type guessed from their
    /// contents (delimited sources carry no types).
    infer_types: bool,
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

pub fn read_csv<R: Read>(reader: R, options: &LoadOptions) -> Result<Dataset, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row = record
            .iter()
            .map(|cell| {
                if options.is_null_token(cell) {
                    MetadataValue::Null
                } else {
                    MetadataValue::String(cell.to_string())
                }
            })
            .collect();
        rows.push(row);
    }

    normalize(
        RawTable {
            headers,
            rows,
            infer_types: true,
        },
        options,
    )
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`).  Keys missing from
/// a row read as null.
pub fn read_json<R: Read>(reader: R, options: &LoadOptions) -> Result<Dataset, LoadError> {
    let root: JsonValue = serde_json::from_reader(reader)?;
    let records = root
        .as_array()
        .ok_or_else(|| LoadError::JsonShape("top-level value is not an array".into()))?;

    let mut headers: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| LoadError::JsonShape(format!("row {i} is not an object")))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        objects.push(obj);
    }

    let rows = objects
        .iter()
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map(json_to_metadata).unwrap_or(MetadataValue::Null))
                .collect()
        })
        .collect();

    normalize(
        RawTable {
            headers,
            rows,
            infer_types: false,
        },
        options,
    )
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Flat Parquet file, one Arrow column per dataset column.  Works with files
/// written by Pandas (`df.to_parquet()`) and Polars.
pub fn read_parquet(file: File, options: &LoadOptions) -> Result<Dataset, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        for row in 0..batch.num_rows() {
            let values = batch
                .columns()
                .iter()
                .map(|col| extract_metadata_value(col, row))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(values);
        }
    }

    normalize(
        RawTable {
            headers,
            rows,
            infer_types: false,
        },
        options,
    )
}

/// Extract a single value from an Arrow column at a given row.
fn extract_metadata_value(col: &ArrayRef, row: usize) -> Result<MetadataValue, ArrowError> {
    if col.is_null(row) {
        return Ok(MetadataValue::Null);
    }
    let value = match col.data_type() {
        DataType::Utf8 => MetadataValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => {
            MetadataValue::String(col.as_string::<i64>().value(row).to_string())
        }
        DataType::Int32 => MetadataValue::Integer(col.as_primitive::<Int32Type>().value(row) as i64),
        DataType::Int64 => MetadataValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => {
            MetadataValue::Float(col.as_primitive::<Float32Type>().value(row) as f64)
        }
        DataType::Float64 => MetadataValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => MetadataValue::Bool(col.as_boolean().value(row)),
        _ => MetadataValue::String(array_value_to_string(col, row)?),
    };
    Ok(value)
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Rename columns, check the required ones, and build typed records.
///
/// Blank headers are named `Unnamed: {i}` after their position, before
/// renaming.
fn normalize(raw: RawTable, options: &LoadOptions) -> Result<Dataset, LoadError> {
    let headers: Vec<String> = raw
        .headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            if h.trim().is_empty() {
                format!("Unnamed: {i}")
            } else {
                h
            }
        })
        .map(|h| options.column_renames.get(&h).cloned().unwrap_or(h))
        .collect();

    let mut seen = BTreeSet::new();
    for h in &headers {
        if !seen.insert(h.as_str()) {
            return Err(LoadError::DuplicateColumn(h.clone()));
        }
    }

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
    };
    let lat_idx = position(LATITUDE)?;
    let lon_idx = position(LONGITUDE)?;
    for field in &options.categorical_fields {
        if field == LATITUDE || field == LONGITUDE {
            return Err(LoadError::CoordinateCategorical(field.clone()));
        }
        position(field.as_str())?;
    }

    let fields: Vec<FieldDef> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let field_type = if i == lat_idx {
                FieldType::Latitude
            } else if i == lon_idx {
                FieldType::Longitude
            } else if options.categorical_fields.contains(name) {
                FieldType::Categorical
            } else {
                FieldType::Passthrough
            };
            FieldDef {
                name: name.clone(),
                field_type,
            }
        })
        .collect();
    let schema = Schema::new(fields);

    // Column index of each categorical slot, in schema order.
    let category_cols = schema
        .categorical_fields()
        .iter()
        .map(|name| position(name.as_str()))
        .collect::<Result<Vec<_>, _>>()?;
    let passthrough_cols: Vec<(usize, &str)> = schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.field_type == FieldType::Passthrough)
        .map(|(i, f)| (i, f.name.as_str()))
        .collect();

    let mut bad_coordinates = 0usize;
    let mut records = Vec::with_capacity(raw.rows.len());
    for row in &raw.rows {
        let cell = |i: usize| row.get(i).unwrap_or(&NULL);

        let categories = category_cols.iter().map(|&i| cell(i).as_label()).collect();

        let latitude = cell(lat_idx).as_f64();
        let longitude = cell(lon_idx).as_f64();
        if (latitude.is_none() && !cell(lat_idx).is_null())
            || (longitude.is_none() && !cell(lon_idx).is_null())
        {
            bad_coordinates += 1;
        }

        let passthrough = passthrough_cols
            .iter()
            .map(|&(i, name)| {
                let value = match cell(i) {
                    MetadataValue::String(s) if raw.infer_types => guess_metadata_type(s),
                    other => other.clone(),
                };
                (name.to_string(), value)
            })
            .collect();

        records.push(Record::new(categories, latitude, longitude, passthrough));
    }

    if bad_coordinates > 0 {
        log::warn!("{bad_coordinates} rows carry a non-numeric coordinate");
    }
    log::debug!("Normalised columns: {:?}", schema.column_names());

    Ok(Dataset::new(schema, records))
}
