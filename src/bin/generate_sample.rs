use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{Float64Array, Float64Builder, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

/// Channels per observation, including the ten the loader discards.
const CHANNELS: usize = 200;
/// Samples per 15-minute file at 4 Hz.
const SAMPLES: usize = 3600;
const CADENCE_S: f64 = 0.25;

#[derive(Parser, Debug)]
#[command(about = "Write a synthetic drifting-burst observation pair (Parquet + JSON)")]
struct Args {
    /// Directory the two files are written into
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Burst centre frequency (MHz) `t` seconds after 08:00:04.
fn burst_frequency(t: f64) -> f64 {
    320.0 * (-t / 900.0).exp()
}

/// One 15-minute file: `grid[channel][sample]` in digits.
fn generate_observation(
    frequency: &[f64],
    start_s: f64,
    rng: &mut SimpleRng,
) -> Vec<Vec<f64>> {
    frequency
        .iter()
        .enumerate()
        .map(|(ch, &f)| {
            // Receiver ripple across the band.
            let background = 110.0 + 12.0 * (ch as f64 / 17.0).sin();
            (0..SAMPLES)
                .map(|i| {
                    let t = start_s + i as f64 * CADENCE_S;
                    let fb = burst_frequency(t);
                    let burst = gaussian(f, fb, 4.0 + 0.03 * fb, 60.0);
                    (background + burst + rng.gauss(0.0, 3.0)).clamp(0.0, 255.0).round()
                })
                .collect()
        })
        .collect()
}

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

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn write_parquet(
    path: &Path,
    frequency: &[f64],
    grid: &[Vec<f64>],
    offsets: &[f64],
    time_obs: &str,
) -> anyhow::Result<()> {
    let mut intensity = ListBuilder::new(Float64Builder::new());
    for row in grid {
        intensity.values().append_slice(row);
        intensity.append(true);
    }

    let metadata = HashMap::from([
        ("TIME-OBS".to_string(), time_obs.to_string()),
        ("TIME-OFFSETS".to_string(), serde_json::to_string(offsets)?),
        ("INSTRUME".to_string(), "SYNTH".to_string()),
        ("DATE-OBS".to_string(), "2024/01/01".to_string()),
    ]);
    let schema = Arc::new(Schema::new_with_metadata(
        vec![
            Field::new("frequency", DataType::Float64, false),
            Field::new(
                "intensity",
                DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                false,
            ),
        ],
        metadata,
    ));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Float64Array::from(frequency.to_vec())),
            Arc::new(intensity.finish()),
        ],
    )?;

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_json(
    path: &Path,
    frequency: &[f64],
    grid: &[Vec<f64>],
    offsets: &[f64],
    time_obs: &str,
) -> anyhow::Result<()> {
    let doc = serde_json::json!({
        "header": {
            "TIME-OBS": time_obs,
            "INSTRUME": "SYNTH",
            "DATE-OBS": "2024/01/01",
        },
        "intensity": grid,
        "time": offsets,
        "frequency": frequency,
    });
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer(std::io::BufWriter::new(file), &doc)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    // 870 → 45 MHz, highest channel first as the receivers store them.
    let frequency: Vec<f64> = (0..CHANNELS)
        .map(|i| 870.0 - i as f64 * (825.0 / (CHANNELS - 1) as f64))
        .collect();
    let offsets: Vec<f64> = (0..SAMPLES).map(|i| i as f64 * CADENCE_S).collect();

    let first = generate_observation(&frequency, 0.0, &mut rng);
    let first_path = args.output_dir.join("SYNTH_20240101_080004_01.parquet");
    write_parquet(&first_path, &frequency, &first, &offsets, "08:00:04")?;

    let second = generate_observation(&frequency, SAMPLES as f64 * CADENCE_S, &mut rng);
    let second_path = args.output_dir.join("SYNTH_20240101_081504_01.json");
    write_json(&second_path, &frequency, &second, &offsets, "08:15:04")?;

    println!(
        "Wrote {} and {} ({CHANNELS} channels x {SAMPLES} samples each)",
        first_path.display(),
        second_path.display()
    );
    Ok(())
}
