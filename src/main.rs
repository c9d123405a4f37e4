use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use rusty_sif::export::{self, SpectrumRecord};
use rusty_sif::{decode, DecodeOptions, DecodedFile, MismatchPolicy};

/// Decode Andor `.sif` spectroscopy files and export their spectra.
#[derive(Parser, Debug)]
#[command(name = "rusty-sif", version, about)]
struct Args {
    /// SIF files to decode.
    #[arg(required = true, value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Write calibrated spectra here; the extension (.parquet, .json, .csv)
    /// picks the format.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print each file's header metadata as JSON.
    #[arg(long)]
    info: bool,

    /// Keep the readable frames of a file that ends early.
    #[arg(long = "tolerate-corrupt")]
    tolerate_corrupt: bool,

    /// When the calibration does not match the frame size, pair it with the
    /// last row of the first frame instead of failing.
    #[arg(long)]
    reslice: bool,

    /// Evaluate Mechelle pixel calibration coefficients as a polynomial.
    #[arg(long = "evaluate-pixel-calibration")]
    evaluate_pixel_calibration: bool,
}

impl Args {
    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions::default()
            .tolerate_corruption(self.tolerate_corrupt)
            .evaluate_pixel_calibration(self.evaluate_pixel_calibration)
    }

    fn mismatch_policy(&self) -> MismatchPolicy {
        if self.reslice {
            MismatchPolicy::LastRowOfFirstFrame
        } else {
            MismatchPolicy::Reject
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let options = args.decode_options();
    let mut records: Vec<SpectrumRecord> = Vec::new();

    for path in &args.files {
        let file = decode(path, &options)
            .with_context(|| format!("decoding {}", path.display()))?;

        if args.info {
            let json = serde_json::to_string_pretty(&file.metadata)
                .context("serializing metadata")?;
            println!("{json}");
        } else if args.output.is_none() {
            print_summary(path, &file);
        }

        if args.output.is_some() {
            let source = path.display().to_string();
            records.extend(export::records_from_decoded(
                &source,
                &file,
                args.mismatch_policy(),
            )?);
        }
    }

    if let Some(output) = &args.output {
        export::write_file(output, &records)
            .with_context(|| format!("writing {}", output.display()))?;
    }
    Ok(())
}

fn print_summary(path: &std::path::Path, file: &DecodedFile) {
    let (frames, rows, cols) = file.pixels.dim();
    println!("{}", path.display());
    println!("  frames:       {frames} x {rows} x {cols}");
    if let Some(spectrograph) = file.metadata.spectrograph() {
        println!("  spectrograph: {spectrograph}");
    }
    if let Some(exposure) = file.metadata.get("ExposureTime") {
        println!("  exposure:     {exposure} s");
    }
    let calibration = match &file.calibration {
        Some(c) => format!("{} point(s)", c.wavelengths_for_frame(0).map_or(0, |w| w.len())),
        None => "none".to_string(),
    };
    println!("  calibration:  {calibration}");
    if let Some(c) = &file.corruption {
        println!(
            "  truncated:    {} of {} frame(s) decoded",
            c.decoded_frames, c.expected_frames
        );
    }
}
