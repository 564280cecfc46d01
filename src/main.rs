use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use rusty_callisto::analysis::{front_velocity, DriftModel, FrontVelocity};
use rusty_callisto::config::{Language, Settings};
use rusty_callisto::data::filter::apply_window;
use rusty_callisto::report::{open_stitched, summarize, window_from, write_contrast_csv};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Calibrate, stitch and analyse e-Callisto spectrograms",
    long_about = None,
    arg_required_else_help = true,
    after_help = "Examples:\n  rusty-callisto summary BLEN7M_20110809_080004_25.json BLEN7M_20110809_081504_25.json\n  rusty-callisto drift burst.parquet --inf-time 8.05 --sup-time 8.10\n  rusty-callisto export burst.csv --start-freq 45 --end-freq 80 --output cut.csv\n"
)]
struct Cli {
    /// JSON settings file; flags below override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Label language code (en, pt)
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Window start, UT hours
    #[arg(long, global = true, requires = "end_time")]
    start_time: Option<f64>,

    /// Window end, UT hours
    #[arg(long, global = true, requires = "start_time")]
    end_time: Option<f64>,

    /// Window lower frequency, MHz
    #[arg(long, global = true, requires = "end_freq")]
    start_freq: Option<f64>,

    /// Window upper frequency, MHz
    #[arg(long, global = true, requires = "start_freq")]
    end_freq: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stitch the files in order and summarise the windowed result
    Summary {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Fit the frequency drift and compute the front velocity
    Drift {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Inferior fiducial time, UT hours
        #[arg(long)]
        inf_time: f64,

        /// Superior fiducial time, UT hours
        #[arg(long)]
        sup_time: f64,

        /// Report this velocity (km/s) instead of deriving it from the fit
        #[arg(long, allow_hyphen_values = true)]
        velocity: Option<f64>,

        #[arg(long)]
        json: bool,
    },

    /// Summarise every file list in a JSON array of arrays
    Batch { list: PathBuf },

    /// Write the windowed contrast grid as CSV
    Export {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, short)]
        output: PathBuf,
    },
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?,
            None => Settings::default(),
        };
        if let Some(code) = &self.lang {
            settings.language = Language::from_code(code);
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            settings.time_range = Some((start, end));
        }
        if let (Some(low), Some(high)) = (self.start_freq, self.end_freq) {
            settings.frequency_range = Some((low, high));
        }
        Ok(settings)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let settings = cli.settings()?;

    match &cli.command {
        Command::Summary { files, json } => run_summary(files, &settings, *json),
        Command::Drift {
            files,
            inf_time,
            sup_time,
            velocity,
            json,
        } => run_drift(files, *inf_time, *sup_time, *velocity, *json),
        Command::Batch { list } => run_batch(list, &settings),
        Command::Export { files, output } => run_export(files, output, &settings),
    }
}

fn run_summary(files: &[PathBuf], settings: &Settings, json: bool) -> anyhow::Result<()> {
    let stitched = open_stitched(files).context("Failed to build the stitched spectrogram")?;
    let summary = summarize(&stitched, settings).context("Failed to summarise")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

fn run_drift(
    files: &[PathBuf],
    inf_time: f64,
    sup_time: f64,
    velocity: Option<f64>,
    json: bool,
) -> anyhow::Result<()> {
    let stitched = open_stitched(files).context("Failed to build the stitched spectrogram")?;
    let model = DriftModel::from_spectrogram(&stitched).context("Failed to fit the drift")?;
    let front = match velocity {
        Some(v) => FrontVelocity::from_velocity(v),
        None => front_velocity(&model, inf_time, sup_time)
            .context("Failed to compute the front velocity")?,
    };

    if json {
        let out = serde_json::json!({
            "model": model,
            "inf_time": inf_time,
            "sup_time": sup_time,
            "front": front,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{model}");
    println!("  interval:   {inf_time} h - {sup_time} h");
    if let Some(df) = front.freq_diff {
        println!("  df:         {df:.3} MHz");
    }
    if let Some(dn) = front.density_diff {
        println!("  dN:         {dn:.4e} cm^-3");
    }
    if let Some(dh) = front.height_diff {
        println!("  dH:         {dh:.1} km");
    }
    if let Some(rate) = front.df_over_dt {
        println!("  df/dt:      {rate:.4} MHz/s");
    }
    println!("  velocity:   {:.1} km/s", front.velocity);
    Ok(())
}

fn run_batch(list: &Path, settings: &Settings) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(list)
        .with_context(|| format!("Failed to read batch list {}", list.display()))?;
    let groups: Vec<Vec<PathBuf>> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of file lists", list.display()))?;
    if groups.is_empty() {
        bail!("batch list {} is empty", list.display());
    }

    let mut failures = 0;
    for (i, files) in groups.iter().enumerate() {
        let result = open_stitched(files)
            .and_then(|stitched| summarize(&stitched, settings));
        match result {
            Ok(summary) => print!("{summary}"),
            Err(e) => {
                log::error!("Batch entry {i} failed: {e}");
                failures += 1;
            }
        }
    }
    log::info!(
        "Batch finished: {} of {} entries succeeded",
        groups.len() - failures,
        groups.len()
    );
    if failures > 0 {
        bail!("{failures} batch entries failed");
    }
    Ok(())
}

fn run_export(files: &[PathBuf], output: &Path, settings: &Settings) -> anyhow::Result<()> {
    let stitched = open_stitched(files).context("Failed to build the stitched spectrogram")?;
    let cut = apply_window(&stitched, &window_from(settings));
    if cut.is_empty() {
        bail!("the selected window is empty");
    }
    let file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    write_contrast_csv(&cut, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", output.display()))?;
    log::info!(
        "Wrote {} x {} contrast grid to {}",
        cut.contrast.nrows(),
        cut.contrast.ncols(),
        output.display()
    );
    Ok(())
}
