use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[(self.next_u64() % items.len() as u64) as usize]
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// City name and approximate centre.
const CITIES: [(&str, f64, f64); 6] = [
    ("Paris", 48.8566, 2.3522),
    ("Vincennes", 48.8474, 2.4392),
    ("Saint-Denis", 48.9362, 2.3574),
    ("Boulogne-Billancourt", 48.8397, 2.2399),
    ("Montreuil", 48.8638, 2.4485),
    ("Nanterre", 48.8924, 2.2069),
];

const ACCESS: [&str; 3] = ["Libre", "Restreint", "Agents RATP"];
const PLACES: [&str; 4] = ["Salle des billets", "Quai", "Local agents", "Couloir"];

fn main() {
    let mut rng = SimpleRng::new(42);
    let n_rows = 240;

    let mut ids: Vec<i64> = Vec::with_capacity(n_rows);
    let mut cities: Vec<String> = Vec::with_capacity(n_rows);
    let mut access: Vec<Option<String>> = Vec::with_capacity(n_rows);
    let mut places: Vec<String> = Vec::with_capacity(n_rows);
    let mut lats: Vec<Option<f64>> = Vec::with_capacity(n_rows);
    let mut lons: Vec<Option<f64>> = Vec::with_capacity(n_rows);

    for i in 0..n_rows {
        // Paris dominates the network
        let (city, lat0, lon0) = if rng.chance(0.6) {
            CITIES[0]
        } else {
            *rng.pick(&CITIES[1..])
        };
        ids.push(i as i64 + 1);
        cities.push(city.to_string());
        access.push((!rng.chance(0.03)).then(|| rng.pick(&ACCESS).to_string()));
        places.push(rng.pick(&PLACES).to_string());
        // a few stations were never geolocated
        let located = !rng.chance(0.05);
        lats.push(located.then(|| lat0 + (rng.next_f64() - 0.5) * 0.04));
        lons.push(located.then(|| lon0 + (rng.next_f64() - 0.5) * 0.06));
    }

    // Write CSV with the source column names and `;` delimiter
    let csv_path = "sample_defibrillateurs.csv";
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(csv_path)
        .expect("Failed to create CSV file");
    writer
        .write_record(["Identifiant", "Ville", "Accès", "Emplacement", "lat_coor1", "long_coor1"])
        .expect("Failed to write CSV header");
    for i in 0..n_rows {
        let fmt = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
        writer
            .write_record([
                ids[i].to_string(),
                cities[i].clone(),
                access[i].clone().unwrap_or_default(),
                places[i].clone(),
                fmt(lats[i]),
                fmt(lons[i]),
            ])
            .expect("Failed to write CSV row");
    }
    writer.flush().expect("Failed to flush CSV file");

    // Write Parquet with the same columns
    let schema = Arc::new(Schema::new(vec![
        Field::new("Identifiant", DataType::Int64, false),
        Field::new("Ville", DataType::Utf8, false),
        Field::new("Accès", DataType::Utf8, true),
        Field::new("Emplacement", DataType::Utf8, false),
        Field::new("lat_coor1", DataType::Float64, true),
        Field::new("long_coor1", DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(StringArray::from(cities)),
            Arc::new(StringArray::from(access)),
            Arc::new(StringArray::from(places)),
            Arc::new(Float64Array::from(lats)),
            Arc::new(Float64Array::from(lons)),
        ],
    )
    .expect("Failed to create RecordBatch");

    let parquet_path = "sample_defibrillateurs.parquet";
    let file = std::fs::File::create(parquet_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!("Wrote {n_rows} defibrillators to {csv_path} and {parquet_path}");
}
