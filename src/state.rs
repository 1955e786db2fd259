use std::collections::BTreeSet;
use std::sync::Arc;

use crate::data::aggregate::{aggregate_counts, extract_coordinates, CategoryCount, CoordinateExtract};
use crate::data::error::UnknownFieldError;
use crate::data::filter::{apply, select_everything, FilterSpec, FilteredView};
use crate::data::model::Dataset;

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// Selection state of one dashboard, independent of rendering.
///
/// Every change to the selection is followed by a [`snapshot`](Self::snapshot)
/// that recomputes the view and its aggregates from scratch.
#[derive(Debug, Clone)]
pub struct DashboardState {
    dataset: Arc<Dataset>,

    /// Per-field selections.
    pub filters: FilterSpec,
}

/// Points to put on the map.
#[derive(Debug, Clone)]
pub struct MapLayer {
    pub points: CoordinateExtract,
    /// The selection matched nothing and `points` holds the whole dataset.
    pub fallback: bool,
}

/// Everything a renderer needs after one filter change.
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub view: FilteredView<'a>,
    /// One entry per categorical field, in schema order.
    pub counts: Vec<CategoryCount>,
    pub map: MapLayer,
}

impl DashboardState {
    /// Start with every distinct value of every categorical field selected.
    pub fn new(dataset: Arc<Dataset>) -> Self {
        let filters = select_everything(&dataset);
        DashboardState { dataset, filters }
    }

    /// Start without any restriction.
    pub fn unrestricted(dataset: Arc<Dataset>) -> Self {
        DashboardState {
            dataset,
            filters: FilterSpec::new(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn check_field(&self, field: &str) -> Result<(), UnknownFieldError> {
        self.dataset.schema().resolve(field).map(|_| ())
    }

    /// Toggle a single value in a field's selection.
    pub fn toggle_filter_value(&mut self, field: &str, value: &str) -> Result<(), UnknownFieldError> {
        self.check_field(field)?;
        let selected = self.filters.entry(field.to_string()).or_default();
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
        Ok(())
    }

    /// Replace a field's selection.
    pub fn set_selection(
        &mut self,
        field: &str,
        values: BTreeSet<String>,
    ) -> Result<(), UnknownFieldError> {
        self.check_field(field)?;
        self.filters.insert(field.to_string(), values);
        Ok(())
    }

    /// Select all values in a field.
    pub fn select_all(&mut self, field: &str) -> Result<(), UnknownFieldError> {
        let values = self.dataset.distinct_values(field)?;
        self.filters.insert(field.to_string(), values);
        Ok(())
    }

    /// Deselect all values in a field.  Nothing passes until a value is
    /// selected again.
    pub fn select_none(&mut self, field: &str) -> Result<(), UnknownFieldError> {
        self.set_selection(field, BTreeSet::new())
    }

    /// Drop a field's restriction entirely, null labels included.
    pub fn clear_field(&mut self, field: &str) -> Result<(), UnknownFieldError> {
        self.check_field(field)?;
        self.filters.remove(field);
        Ok(())
    }

    /// Run the pipeline for the current selection.
    ///
    /// An empty view is reported as such; only the map layer falls back to
    /// every located record, flagged with [`MapLayer::fallback`].
    pub fn snapshot(&self) -> Result<Snapshot<'_>, UnknownFieldError> {
        let view = apply(&self.dataset, &self.filters)?;
        let counts = self
            .dataset
            .schema()
            .categorical_fields()
            .iter()
            .map(|field| aggregate_counts(&view, field))
            .collect::<Result<Vec<_>, _>>()?;

        let map = if view.is_empty() {
            log::info!("No record matches the selection, mapping the whole dataset");
            MapLayer {
                points: extract_coordinates(&FilteredView::all(&self.dataset)),
                fallback: true,
            }
        } else {
            MapLayer {
                points: extract_coordinates(&view),
                fallback: false,
            }
        };

        Ok(Snapshot { view, counts, map })
    }
}
