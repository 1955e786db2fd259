use std::collections::HashMap;

use serde::Serialize;

use super::error::UnknownFieldError;
use super::filter::FilteredView;

// ---------------------------------------------------------------------------
// CategoryCount
// ---------------------------------------------------------------------------

/// Number of records per label of one field.
///
/// Iteration order is unspecified; use [`by_count`](Self::by_count) or
/// [`by_label`](Self::by_label) for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    field: String,
    counts: HashMap<String, usize>,
}

impl CategoryCount {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn get(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts, i.e. records with a non-null label.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(label, &n)| (label.as_str(), n))
    }

    /// Largest count first, ties broken by label.
    pub fn by_count(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    pub fn by_label(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

/// Group the records of `view` by their label for `field`.  Null labels are
/// left out.
pub fn aggregate_counts(view: &FilteredView<'_>, field: &str) -> Result<CategoryCount, UnknownFieldError> {
    let slot = view.dataset().schema().resolve(field)?;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in view.records().filter_map(|r| r.label(slot)) {
        *counts.entry(label.into_owned()).or_insert(0) += 1;
    }
    Ok(CategoryCount {
        field: field.to_string(),
        counts,
    })
}

// ---------------------------------------------------------------------------
// CoordinateExtract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: (self.south + self.north) / 2.0,
            longitude: (self.west + self.east) / 2.0,
        }
    }
}

/// Located points of a view, in view order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CoordinateExtract {
    points: Vec<Coordinate>,
}

impl CoordinateExtract {
    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Smallest box holding every point, `None` without points.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let init = BoundingBox {
            south: first.latitude,
            west: first.longitude,
            north: first.latitude,
            east: first.longitude,
        };
        Some(self.points.iter().fold(init, |b, p| BoundingBox {
            south: b.south.min(p.latitude),
            west: b.west.min(p.longitude),
            north: b.north.max(p.latitude),
            east: b.east.max(p.longitude),
        }))
    }
}

/// Coordinates of every record in `view` that has both a latitude and a
/// longitude.  Records missing either are skipped.
pub fn extract_coordinates(view: &FilteredView<'_>) -> CoordinateExtract {
    let points: Vec<Coordinate> = view
        .records()
        .filter_map(|r| {
            Some(Coordinate {
                latitude: r.latitude()?,
                longitude: r.longitude()?,
            })
        })
        .collect();

    let skipped = view.len() - points.len();
    if skipped > 0 {
        log::debug!("{skipped} of {} records have no usable coordinates", view.len());
    }
    CoordinateExtract { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::tests::sample;
    use crate::data::filter::{apply, FilterSpec, FilteredView};
    use crate::data::loader::{read_csv, LoadOptions};
    use pretty_assertions::assert_eq;

    fn city_a() -> FilterSpec {
        FilterSpec::from([("Ville".to_string(), ["A".to_string()].into())])
    }

    #[test]
    fn counts_filtered_city() {
        let ds = sample();
        let view = apply(&ds, &city_a()).unwrap();
        let counts = aggregate_counts(&view, "Ville").unwrap();
        assert_eq!(counts.by_label(), vec![("A", 3)]);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn null_labels_are_not_counted() {
        let ds = sample();
        let view = FilteredView::all(&ds);
        let counts = aggregate_counts(&view, "Accès").unwrap();
        assert_eq!(counts.get("Libre"), 3);
        assert_eq!(counts.get("Restreint"), 1);
        assert_eq!(counts.len(), 2);
        // five records, one without an access type
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn by_count_puts_largest_first() {
        let ds = sample();
        let counts = aggregate_counts(&FilteredView::all(&ds), "Ville").unwrap();
        assert_eq!(counts.by_count(), vec![("A", 3), ("B", 1), ("C", 1)]);
    }

    #[test]
    fn counting_unknown_field_fails() {
        let ds = sample();
        let err = aggregate_counts(&FilteredView::all(&ds), "Adresse").unwrap_err();
        assert_eq!(err.field, "Adresse");
    }

    #[test]
    fn counts_passthrough_column() {
        let text = "\
Ville;Accès;Emplacement;lat_coor1;long_coor1
A;Libre;Quai;48.1;2.1
A;Libre;;48.2;2.2
B;Libre;Quai;48.3;2.3
B;Libre;Couloir;48.4;2.4
";
        let ds = read_csv(text.as_bytes(), &LoadOptions::default()).unwrap();
        let counts = aggregate_counts(&FilteredView::all(&ds), "Emplacement").unwrap();
        assert_eq!(counts.by_count(), vec![("Quai", 2), ("Couloir", 1)]);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn coordinates_skip_missing_latitude() {
        let ds = sample();
        let view = apply(&ds, &city_a()).unwrap();
        let extract = extract_coordinates(&view);
        assert_eq!(
            extract.points(),
            &[
                Coordinate {
                    latitude: 48.1,
                    longitude: 2.1
                },
                Coordinate {
                    latitude: 48.5,
                    longitude: 2.5
                },
            ]
        );
    }

    #[test]
    fn empty_view_gives_empty_results() {
        let ds = sample();
        let mut spec = city_a();
        spec.insert("Accès".into(), Default::default());
        let view = apply(&ds, &spec).unwrap();
        assert!(aggregate_counts(&view, "Ville").unwrap().is_empty());
        let extract = extract_coordinates(&view);
        assert!(extract.is_empty());
        assert_eq!(extract.bounds(), None);
    }

    #[test]
    fn bounds_cover_all_points() {
        let ds = sample();
        let extract = extract_coordinates(&FilteredView::all(&ds));
        assert_eq!(extract.len(), 4);
        let bounds = extract.bounds().unwrap();
        assert_eq!(bounds.south, 48.1);
        assert_eq!(bounds.north, 48.5);
        assert_eq!(bounds.west, 2.1);
        assert_eq!(bounds.east, 2.5);
        assert!((bounds.center().latitude - 48.3).abs() < 1e-9);
    }
}
