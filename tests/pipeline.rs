use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use defib_explorer::data::aggregate::{aggregate_counts, extract_coordinates};
use defib_explorer::data::error::LoadError;
use defib_explorer::data::filter::{apply, FilterSpec};
use defib_explorer::data::loader::{load_file, LoadOptions};
use defib_explorer::data::store::DatasetStore;

const RATP_EXTRACT: &str = "\
Identifiant;Ville;Accès;Emplacement;lat_coor1;long_coor1
1;Paris;Libre;Salle des billets;48.8530;2.3690
2;Paris;Restreint;Local agents;;2.3470
3;Vincennes;Libre;Quai;48.8474;2.4392
4;Montreuil;;Couloir;48.8638;2.4485
5;Paris;Libre;Quai;48.8800;2.3550
";

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn selection(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn store_serves_one_dataset_for_the_whole_pipeline() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "defibrillateurs.csv", RATP_EXTRACT);
    let store = DatasetStore::open(&path, LoadOptions::default());

    let dataset = store.load().unwrap();
    assert_eq!(dataset.len(), 5);
    assert_eq!(
        store.distinct_values("Ville").unwrap(),
        selection(&["Montreuil", "Paris", "Vincennes"])
    );

    // The file is gone, the cached dataset is still served.
    fs::remove_file(&path).unwrap();
    let again = store.load().unwrap();
    assert!(Arc::ptr_eq(&dataset, &again));

    let spec = FilterSpec::from([("Ville".to_string(), selection(&["Paris"]))]);
    let view = apply(&dataset, &spec).unwrap();
    assert_eq!(view.len(), 3);

    let counts = aggregate_counts(&view, "Ville").unwrap();
    assert_eq!(counts.by_label(), vec![("Paris", 3)]);

    let access = aggregate_counts(&view, "Accès").unwrap();
    assert_eq!(access.by_count(), vec![("Libre", 2), ("Restreint", 1)]);

    let coords = extract_coordinates(&view);
    assert_eq!(coords.len(), 2);
    assert_eq!(coords.points()[0].latitude, 48.8530);
}

#[test]
fn missing_column_stops_the_load() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "bad.csv", "Ville;Accès;lat_coor1\nParis;Libre;48.8\n");
    let store = DatasetStore::open(&path, LoadOptions::default());
    match store.load() {
        Err(LoadError::MissingColumn(column)) => assert_eq!(column, "longitude"),
        other => panic!("expected a missing column error, got {other:?}"),
    }
}

#[test]
fn config_file_drives_the_loader() {
    let dir = TempDir::new().unwrap();
    let config = write(
        &dir,
        "options.json",
        r#"{ "delimiter": ",", "categorical_fields": ["City"], "null_values": ["", "NA"] }"#,
    );
    let data = write(
        &dir,
        "points.txt",
        "City,lat_coor1,long_coor1\nLyon,45.76,4.83\nNA,45.70,4.80\n",
    );

    let options = LoadOptions::from_json_file(&config).unwrap();
    let dataset = load_file(&data, &options).unwrap();
    assert_eq!(dataset.schema().categorical_fields(), ["City"]);
    assert_eq!(dataset.distinct_values("City").unwrap(), selection(&["Lyon"]));
}

#[test]
fn parquet_source_loads_like_csv() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("defibrillateurs.parquet");

    let schema = Arc::new(Schema::new(vec![
        Field::new("Ville", DataType::Utf8, true),
        Field::new("Accès", DataType::Utf8, true),
        Field::new("lat_coor1", DataType::Float64, true),
        Field::new("long_coor1", DataType::Float64, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(vec![Some("Paris"), Some("Paris"), None])),
            Arc::new(StringArray::from(vec![Some("Libre"), Some("Restreint"), Some("Libre")])),
            Arc::new(Float64Array::from(vec![Some(48.85), None, Some(48.90)])),
            Arc::new(Float64Array::from(vec![Some(2.35), Some(2.36), Some(2.40)])),
        ],
    )
    .unwrap();
    let file = fs::File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let dataset = load_file(&path, &LoadOptions::default()).unwrap();
    assert_eq!(dataset.len(), 3);
    assert_eq!(
        dataset.schema().column_names(),
        vec!["Ville", "Accès", "latitude", "longitude"]
    );

    let spec = FilterSpec::from([("Ville".to_string(), selection(&["Paris"]))]);
    let view = apply(&dataset, &spec).unwrap();
    assert_eq!(view.len(), 2);
    assert_eq!(extract_coordinates(&view).len(), 1);
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "defibrillateurs.xlsx", "");
    assert!(matches!(
        load_file(&path, &LoadOptions::default()),
        Err(LoadError::UnsupportedFormat(_))
    ));
}
