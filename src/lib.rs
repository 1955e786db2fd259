//! Filtering and aggregation over geolocated defibrillator records.
//!
//! A [`DatasetStore`](data::store::DatasetStore) reads the source once.
//! [`filter::apply`](data::filter::apply) narrows it to the records matching a
//! [`FilterSpec`](data::filter::FilterSpec), and the
//! [`aggregate`](data::aggregate) functions derive per-category counts and
//! map coordinates from the result.

pub mod chart;
pub mod data;
pub mod report;
pub mod state;
