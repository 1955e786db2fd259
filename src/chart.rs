use palette::{Hsl, IntoColor, Srgb};
use serde::Serialize;

use crate::data::aggregate::CategoryCount;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues, as
/// `#rrggbb` strings.
pub fn generate_palette(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            let rgb: Srgb<u8> = rgb.into_format();
            format!("#{:02x}{:02x}{:02x}", rgb.red, rgb.green, rgb.blue)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Chart series built from category counts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub label: String,
    pub count: usize,
    pub color: String,
}

/// One bar per label, largest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub field: String,
    pub bars: Vec<Bar>,
}

impl BarChart {
    pub fn from_counts(counts: &CategoryCount) -> Self {
        let entries = counts.by_count();
        let colors = generate_palette(entries.len());
        let bars = entries
            .into_iter()
            .zip(colors)
            .map(|((label, count), color)| Bar {
                label: label.to_string(),
                count,
                color,
            })
            .collect();
        BarChart {
            field: counts.field().to_string(),
            bars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub label: String,
    pub count: usize,
    /// Fraction of the total, in `0.0..=1.0`.
    pub share: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieChart {
    pub field: String,
    pub slices: Vec<Slice>,
}

impl PieChart {
    pub fn from_counts(counts: &CategoryCount) -> Self {
        let total = counts.total();
        let entries = counts.by_count();
        let colors = generate_palette(entries.len());
        let slices = entries
            .into_iter()
            .zip(colors)
            .map(|((label, count), color)| Slice {
                label: label.to_string(),
                count,
                share: count as f64 / total as f64,
                color,
            })
            .collect();
        PieChart {
            field: counts.field().to_string(),
            slices,
        }
    }
}
