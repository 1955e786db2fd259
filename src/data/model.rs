use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::error::UnknownFieldError;

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

// ---------------------------------------------------------------------------
// MetadataValue – a single passthrough cell
// ---------------------------------------------------------------------------

/// A dynamically-typed value for columns the pipeline does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => Ok(()),
        }
    }
}

impl MetadataValue {
    /// Numeric view of the value.  Numeric strings are parsed; anything
    /// non-finite counts as absent.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            MetadataValue::Float(v) => *v,
            MetadataValue::Integer(i) => *i as f64,
            MetadataValue::String(s) => s.trim().parse::<f64>().ok()?,
            MetadataValue::Bool(_) | MetadataValue::Null => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Text label used when the value lands in a categorical column.
    pub fn as_label(&self) -> Option<String> {
        match self {
            MetadataValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Schema – declared type per column
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// String label used for filtering and counting.
    Categorical,
    Latitude,
    Longitude,
    /// Carried along untouched.
    Passthrough,
}

/// Where a field's label lives inside a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSlot<'a> {
    Category(usize),
    Latitude,
    Longitude,
    Passthrough(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
}

/// Column layout of a loaded dataset, fixed at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDef>,
    /// Categorical field names in the order their values are stored in
    /// [`Record`].
    categorical: Vec<String>,
}

impl Schema {
    pub(crate) fn new(fields: Vec<FieldDef>) -> Self {
        let categorical = fields
            .iter()
            .filter(|f| f.field_type == FieldType::Categorical)
            .map(|f| f.name.clone())
            .collect();
        Schema {
            fields,
            categorical,
        }
    }

    /// All fields in source column order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn categorical_fields(&self) -> &[String] {
        &self.categorical
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Slot of a categorical field inside [`Record`].
    pub fn categorical_index(&self, name: &str) -> Result<usize, UnknownFieldError> {
        self.categorical
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| UnknownFieldError::new(name))
    }

    /// Locate any field of the schema for filtering or counting.
    pub fn resolve(&self, name: &str) -> Result<FieldSlot<'_>, UnknownFieldError> {
        let field = self.field(name).ok_or_else(|| UnknownFieldError::new(name))?;
        Ok(match field.field_type {
            FieldType::Categorical => FieldSlot::Category(self.categorical_index(name)?),
            FieldType::Latitude => FieldSlot::Latitude,
            FieldType::Longitude => FieldSlot::Longitude,
            FieldType::Passthrough => FieldSlot::Passthrough(field.name.as_str()),
        })
    }
}

// ---------------------------------------------------------------------------
// Record – one row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    categories: Vec<Option<String>>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    passthrough: BTreeMap<String, MetadataValue>,
}

impl Record {
    pub(crate) fn new(
        categories: Vec<Option<String>>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        passthrough: BTreeMap<String, MetadataValue>,
    ) -> Self {
        Record {
            categories,
            latitude,
            longitude,
            passthrough,
        }
    }

    /// Label at a categorical slot, see [`Schema::categorical_index`].
    pub fn category(&self, index: usize) -> Option<&str> {
        self.categories.get(index).and_then(|c| c.as_deref())
    }

    pub fn latitude(&self) -> Option<f64> {
        self.latitude
    }

    pub fn longitude(&self) -> Option<f64> {
        self.longitude
    }

    pub fn passthrough(&self) -> &BTreeMap<String, MetadataValue> {
        &self.passthrough
    }

    /// Label of a field, `None` when null.  Non-text values are rendered
    /// with their `Display` form.
    pub fn label(&self, slot: FieldSlot<'_>) -> Option<Cow<'_, str>> {
        match slot {
            FieldSlot::Category(idx) => self.category(idx).map(Cow::Borrowed),
            FieldSlot::Latitude => self.latitude.map(|v| Cow::Owned(v.to_string())),
            FieldSlot::Longitude => self.longitude.map(|v| Cow::Owned(v.to_string())),
            FieldSlot::Passthrough(name) => match self.passthrough.get(name)? {
                MetadataValue::String(s) => Some(Cow::Borrowed(s.as_str())),
                other => other.as_label().map(Cow::Owned),
            },
        }
    }

    /// Text of one cell, `None` when null.
    pub fn cell(&self, schema: &Schema, field: &FieldDef) -> Option<String> {
        let slot = schema.resolve(&field.name).ok()?;
        self.label(slot).map(Cow::into_owned)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The normalised dataset.  Nothing mutates it after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: Schema,
    records: Vec<Record>,
}

impl Dataset {
    pub(crate) fn new(schema: Schema, records: Vec<Record>) -> Self {
        Dataset { schema, records }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Non-null distinct labels of a field.
    pub fn distinct_values(&self, field: &str) -> Result<BTreeSet<String>, UnknownFieldError> {
        let slot = self.schema.resolve(field)?;
        Ok(self
            .records
            .iter()
            .filter_map(|r| r.label(slot))
            .map(Cow::into_owned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            FieldDef {
                name: "Ville".into(),
                field_type: FieldType::Categorical,
            },
            FieldDef {
                name: LATITUDE.into(),
                field_type: FieldType::Latitude,
            },
            FieldDef {
                name: "Adresse".into(),
                field_type: FieldType::Passthrough,
            },
        ])
    }

    #[test]
    fn numeric_strings_count_as_coordinates() {
        assert_eq!(MetadataValue::String(" 48.85 ".into()).as_f64(), Some(48.85));
        assert_eq!(MetadataValue::Integer(2).as_f64(), Some(2.0));
        assert_eq!(MetadataValue::String("n/a".into()).as_f64(), None);
        assert_eq!(MetadataValue::Float(f64::NAN).as_f64(), None);
        assert_eq!(MetadataValue::Null.as_f64(), None);
    }

    #[test]
    fn every_schema_field_resolves() {
        let schema = schema();
        assert_eq!(schema.resolve("Ville"), Ok(FieldSlot::Category(0)));
        assert_eq!(schema.resolve(LATITUDE), Ok(FieldSlot::Latitude));
        assert_eq!(schema.resolve("Adresse"), Ok(FieldSlot::Passthrough("Adresse")));
        assert_eq!(schema.resolve("Region"), Err(UnknownFieldError::new("Region")));
        // only categorical fields have a category slot
        assert!(schema.categorical_index("Adresse").is_err());
    }

    #[test]
    fn passthrough_labels_use_display_form() {
        let mut extra = BTreeMap::new();
        extra.insert("Adresse".to_string(), MetadataValue::Integer(12));
        let record = Record::new(vec![None], Some(48.5), None, extra);
        assert_eq!(record.label(FieldSlot::Passthrough("Adresse")).as_deref(), Some("12"));
        assert_eq!(record.label(FieldSlot::Latitude).as_deref(), Some("48.5"));
        assert_eq!(record.label(FieldSlot::Longitude), None);
        assert_eq!(record.label(FieldSlot::Category(0)), None);
    }

    #[test]
    fn cells_render_by_declared_type() {
        let schema = schema();
        let mut extra = BTreeMap::new();
        extra.insert("Adresse".to_string(), MetadataValue::String("1 rue".into()));
        let record = Record::new(vec![Some("Paris".into())], Some(48.5), None, extra);

        let cells: Vec<Option<String>> = schema
            .fields()
            .iter()
            .map(|f| record.cell(&schema, f))
            .collect();
        assert_eq!(
            cells,
            vec![Some("Paris".into()), Some("48.5".into()), Some("1 rue".into())]
        );
    }

    #[test]
    fn distinct_values_skip_nulls() {
        let records = vec![
            Record::new(vec![Some("A".into())], None, None, BTreeMap::new()),
            Record::new(vec![None], None, None, BTreeMap::new()),
            Record::new(vec![Some("B".into())], None, None, BTreeMap::new()),
            Record::new(vec![Some("A".into())], None, None, BTreeMap::new()),
        ];
        let ds = Dataset::new(schema(), records);
        let values = ds.distinct_values("Ville").unwrap();
        assert_eq!(values.into_iter().collect::<Vec<_>>(), vec!["A", "B"]);
    }
}
