use std::collections::{BTreeMap, BTreeSet};

use super::error::UnknownFieldError;
use super::model::{Dataset, Record};

// ---------------------------------------------------------------------------
// Filter predicate: which values are accepted per field
// ---------------------------------------------------------------------------

/// Per-field selection: maps field name → set of accepted labels.
///
/// * Field absent → no constraint on that field.
/// * Field mapped to an empty set → nothing passes.
///
/// Callers wanting "no restriction" must remove the field, never pass an
/// empty set.
pub type FilterSpec = BTreeMap<String, BTreeSet<String>>;

/// A [`FilterSpec`] with every categorical field mapped to all of its
/// distinct values.  Records whose value is null still fail it.
pub fn select_everything(dataset: &Dataset) -> FilterSpec {
    dataset
        .schema()
        .categorical_fields()
        .iter()
        .enumerate()
        .map(|(slot, field)| {
            let values = dataset
                .records()
                .iter()
                .filter_map(|r| r.category(slot))
                .map(str::to_string)
                .collect();
            (field.clone(), values)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// FilteredView
// ---------------------------------------------------------------------------

/// The records of a dataset that passed a [`FilterSpec`], in dataset order.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    indices: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// A view over every record.
    pub fn all(dataset: &'a Dataset) -> Self {
        FilteredView {
            dataset,
            indices: (0..dataset.len()).collect(),
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Positions of the matching records in the dataset.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.dataset.records();
        self.indices.iter().map(move |&i| &records[i])
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Header plus one row of cells per record.
    pub fn to_rows(&self) -> (Vec<String>, Vec<Vec<Option<String>>>) {
        let schema = self.dataset.schema();
        let header = schema.fields().iter().map(|f| f.name.clone()).collect();
        let rows = self
            .records()
            .map(|r| {
                schema
                    .fields()
                    .iter()
                    .map(|f| r.cell(schema, f))
                    .collect()
            })
            .collect();
        (header, rows)
    }
}

/// Return the records that pass every field of `spec`.
///
/// A record passes a field when its label for that field is in the accepted
/// set.  A null label is never accepted.
pub fn apply<'a>(dataset: &'a Dataset, spec: &FilterSpec) -> Result<FilteredView<'a>, UnknownFieldError> {
    // Resolve every field up front so a bad name fails even on an empty
    // dataset.
    let predicates = spec
        .iter()
        .map(|(field, accepted)| {
            dataset
                .schema()
                .resolve(field)
                .map(|slot| (slot, accepted))
        })
        .collect::<Result<Vec<_>, UnknownFieldError>>()?;

    let indices: Vec<usize> = if predicates.iter().any(|(_, accepted)| accepted.is_empty()) {
        Vec::new()
    } else {
        dataset
            .records()
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                predicates.iter().all(|(slot, accepted)| {
                    record
                        .label(*slot)
                        .is_some_and(|label| accepted.contains(label.as_ref()))
                })
            })
            .map(|(i, _)| i)
            .collect()
    };

    log::debug!(
        "Filter over {} field(s) kept {} of {} records",
        predicates.len(),
        indices.len(),
        dataset.len()
    );

    Ok(FilteredView { dataset, indices })
}
