use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use rusty_sif::sif::calibration::evaluate_polynomial;
use rusty_sif::sif::writer::SifBuilder;

const WIDTH: usize = 1024;
const FRAMES: usize = 6;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn generate_frame(
    wavelengths: &[f64],
    peaks: &[(f64, f64, f64)],
    background: f64,
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f32> {
    wavelengths
        .iter()
        .map(|&wl| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(wl, mu, sigma, amp))
                .sum();
            (background + signal + rng.gauss(0.0, noise_level)) as f32
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

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    // Neon-like emission lines (nm, width, counts)
    let lines = [
        (585.2, 0.6, 9000.0),
        (614.3, 0.5, 6000.0),
        (640.2, 0.7, 12000.0),
        (703.2, 0.6, 4000.0),
    ];

    // Each frame drifts the grating slightly: lowest degree first.
    let calibrations: Vec<Vec<f64>> = (0..FRAMES)
        .map(|frame| vec![550.0 + frame as f64 * 0.25, 0.18, -2.0e-6])
        .collect();

    let mut builder = SifBuilder::new(WIDTH as i64, 1)
        .exposure_time(0.5)
        .original_filename("C:\\data\\sample_data.sif")
        .per_frame_calibration(&calibrations)
        .timestamps((0..FRAMES as i64).map(|i| i * 500).collect());

    for (frame, coefficients) in calibrations.iter().enumerate() {
        let wavelengths = evaluate_polynomial(coefficients, WIDTH).to_vec();
        let gain = 1.0 + frame as f64 * 0.1;
        let peaks: Vec<(f64, f64, f64)> = lines
            .iter()
            .map(|&(mu, sigma, amp)| (mu, sigma, amp * gain))
            .collect();
        builder = builder.frame(generate_frame(&wavelengths, &peaks, 300.0, 25.0, &mut rng));
    }

    let output_path = "sample_data.sif";
    let file = File::create(output_path).context("creating output file")?;
    let mut writer = BufWriter::new(file);
    builder.write_to(&mut writer).context("writing SIF")?;
    writer.flush().context("flushing SIF")?;

    println!("Wrote {FRAMES} frames ({WIDTH} pixels each) to {output_path}");
    Ok(())
}
