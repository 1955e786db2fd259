use std::io::Write;
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use serde::Serialize;

use crate::chart::{BarChart, PieChart};
use crate::data::aggregate::{BoundingBox, CoordinateExtract};
use crate::data::error::LoadError;
use crate::data::filter::FilteredView;
use crate::data::loader::LoadOptions;
use crate::state::Snapshot;

// ---------------------------------------------------------------------------
// Summary of one snapshot
// ---------------------------------------------------------------------------

/// Serializable digest of a [`Snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub total_records: usize,
    pub matching_records: usize,
    pub map_fallback: bool,
    pub bounds: Option<BoundingBox>,
    pub bars: Vec<BarChart>,
    pub pies: Vec<PieChart>,
    pub points: CoordinateExtract,
}

impl Summary {
    pub fn from_snapshot(snapshot: &Snapshot<'_>) -> Self {
        Summary {
            total_records: snapshot.view.dataset().len(),
            matching_records: snapshot.view.len(),
            map_fallback: snapshot.map.fallback,
            bounds: snapshot.map.points.bounds(),
            bars: snapshot.counts.iter().map(BarChart::from_counts).collect(),
            pies: snapshot.counts.iter().map(PieChart::from_counts).collect(),
            points: snapshot.map.points.clone(),
        }
    }

    pub fn write_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }

    /// Human-readable digest: match count, map extent and counts per field.
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "{} of {} records match\n",
            self.matching_records, self.total_records
        );

        let map_note = if self.map_fallback {
            " (no match, showing the whole dataset)"
        } else {
            ""
        };
        out.push_str(&format!("Map: {} points{map_note}\n", self.points.len()));
        if let Some(b) = &self.bounds {
            out.push_str(&format!(
                "  lat {:.5} .. {:.5}, lon {:.5} .. {:.5}\n",
                b.south, b.north, b.west, b.east
            ));
        }

        for chart in &self.pies {
            out.push_str(&format!("{}:\n", chart.field));
            for slice in &chart.slices {
                out.push_str(&format!(
                    "  {:<30} {:>6}  {:>5.1}%\n",
                    slice.label,
                    slice.count,
                    slice.share * 100.0
                ));
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Render the first `max_rows` records of a view as a text table.
pub fn format_table(view: &FilteredView<'_>, max_rows: usize) -> Result<String, ArrowError> {
    let schema = view.dataset().schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| Field::new(f.name.as_str(), DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = schema
        .fields()
        .iter()
        .map(|f| {
            let cells: Vec<Option<String>> = view
                .records()
                .take(max_rows)
                .map(|r| r.cell(schema, f))
                .collect();
            Arc::new(StringArray::from(cells)) as ArrayRef
        })
        .collect();

    let batch = RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

/// Write the whole view as delimited text with a header row, using the
/// delimiter of `options`.  Null cells are written as the first of
/// `options.null_values`, so reading the output back with the same options
/// gives the same records.
pub fn write_csv<W: Write>(
    view: &FilteredView<'_>,
    writer: W,
    options: &LoadOptions,
) -> Result<(), LoadError> {
    let null = options.null_values.first().map(String::as_str).unwrap_or("");
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .from_writer(writer);
    let (header, rows) = view.to_rows();
    writer.write_record(&header)?;
    for row in &rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or(null)))?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::tests::sample;
    use crate::data::loader::{read_csv, LoadOptions};
    use crate::state::DashboardState;

    #[test]
    fn summary_reflects_snapshot() {
        let mut state = DashboardState::new(Arc::new(sample()));
        state
            .set_selection("Ville", ["A".to_string()].into())
            .unwrap();
        let summary = Summary::from_snapshot(&state.snapshot().unwrap());

        assert_eq!(summary.total_records, 5);
        assert_eq!(summary.matching_records, 3);
        assert_eq!(summary.points.len(), 2);
        assert!(!summary.map_fallback);

        let text = summary.to_text();
        assert!(text.starts_with("3 of 5 records match\n"));
        assert!(text.contains("Map: 2 points\n"));
    }

    #[test]
    fn json_summary_has_expected_keys() {
        let state = DashboardState::new(Arc::new(sample()));
        let summary = Summary::from_snapshot(&state.snapshot().unwrap());
        let mut buf = Vec::new();
        summary.write_json(&mut buf).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["matching_records"], 4);
        assert_eq!(value["bars"][0]["field"], "Ville");
        assert_eq!(value["bars"][0]["bars"][0]["label"], "A");
        assert_eq!(value["points"][0]["latitude"], 48.1);
    }

    #[test]
    fn table_lists_view_rows() {
        let ds = sample();
        let table = format_table(&FilteredView::all(&ds), 2).unwrap();
        assert!(table.contains("Ville"));
        assert!(table.contains("Restreint"));
        assert!(!table.contains("48.5"));
    }

    #[test]
    fn csv_export_reloads_to_the_same_view() {
        let ds = sample();
        let view = FilteredView::all(&ds);
        let mut buf = Vec::new();
        write_csv(&view, &mut buf, &LoadOptions::default()).unwrap();

        let reloaded = read_csv(buf.as_slice(), &LoadOptions::default()).unwrap();
        assert_eq!(reloaded.records(), ds.records());
    }

    #[test]
    fn csv_export_writes_nulls_as_the_configured_token() {
        let options = LoadOptions {
            delimiter: ',',
            null_values: vec!["NA".into()],
            ..LoadOptions::default()
        };
        let text = "Ville,Accès,lat_coor1,long_coor1\nNA,Libre,1,2\n,Libre,3,4\n";
        let ds = read_csv(text.as_bytes(), &options).unwrap();
        assert_eq!(ds.records()[0].category(0), None);
        assert_eq!(ds.records()[1].category(0), Some(""));

        let mut buf = Vec::new();
        write_csv(&FilteredView::all(&ds), &mut buf, &options).unwrap();
        let written = String::from_utf8(buf.clone()).unwrap();
        assert!(written.contains("NA,Libre,1,2\n"));

        let reloaded = read_csv(buf.as_slice(), &options).unwrap();
        assert_eq!(reloaded.records()[0].category(0), None);
        assert_eq!(reloaded.records()[1].category(0), Some(""));
        assert_eq!(reloaded.records(), ds.records());
    }

    #[test]
    fn csv_export_rejects_non_ascii_delimiter() {
        let ds = sample();
        let options = LoadOptions {
            delimiter: '§',
            ..LoadOptions::default()
        };
        let err = write_csv(&FilteredView::all(&ds), Vec::new(), &options).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDelimiter('§')));
    }
}
