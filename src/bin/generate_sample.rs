use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rusty_plate::data::model::{CanonicalTable, PlateData};
use rusty_plate::data::writer::format_intermediate;
use rusty_plate::data::Well;

/// Write synthetic intermediate result files for manual testing.
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Args {
    /// Output directory
    #[arg(default_value = ".")]
    out_dir: PathBuf,

    /// Number of plates (one `<barcode>_results.txt` each)
    #[arg(short, long, default_value_t = 2)]
    plates: usize,

    /// Measurement cycles per plate
    #[arg(short, long, default_value_t = 48)]
    cycles: usize,

    /// Minutes between cycles
    #[arg(long, default_value_t = 15.0)]
    interval: f64,

    #[arg(long, default_value = "lux")]
    reporter: String,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Logistic growth curve.
fn logistic(t: f64, od0: f64, capacity: f64, rate: f64) -> f64 {
    capacity / (1.0 + (capacity / od0 - 1.0) * (-rate * t).exp())
}

/// Blank wells: medium only.
fn is_blank(well: Well) -> bool {
    well.row_letter() == 'H' && well.column() >= 10
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
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
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

fn generate_plate(args: &Args, rng: &mut SimpleRng) -> anyhow::Result<PlateData> {
    // Per-well growth rate (1/h) and promoter strength.
    let params: Vec<(f64, f64)> = Well::all()
        .map(|w| {
            let rate = 0.6 + 0.1 * f64::from(w.column() % 4) + rng.gauss(0.0, 0.02);
            let strength = 500.0 * f64::from(w.row() + 1);
            (rate, strength)
        })
        .collect();

    let mut od_rows = Vec::with_capacity(args.cycles);
    let mut fu_rows = Vec::with_capacity(args.cycles);
    for cycle in 0..args.cycles {
        let minutes = cycle as f64 * args.interval;
        let temp = 30.0 + rng.gauss(0.0, 0.05);
        let mut od = vec![cycle as f64, minutes, temp];
        let mut fu = od.clone();

        for (well, &(rate, strength)) in Well::all().zip(&params) {
            let medium = 0.045 + rng.gauss(0.0, 0.002);
            let background = 20.0 + rng.gauss(0.0, 2.0);
            if is_blank(well) {
                od.push(medium);
                fu.push(background);
            } else {
                let growth = logistic(minutes / 60.0, 0.01, 1.2, rate);
                od.push(medium + growth);
                fu.push(background + strength * growth);
            }
        }
        od_rows.push(od);
        fu_rows.push(fu);
    }

    let od = CanonicalTable::from_rows(&od_rows)?;
    let fu = CanonicalTable::from_rows(&fu_rows)?;
    Ok(PlateData::new(od, fu)?)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(args.seed);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    for plate_no in 0..args.plates {
        let plate = generate_plate(&args, &mut rng)?;
        let path = args.out_dir.join(format!("{:04}_results.txt", 1000 + plate_no));
        std::fs::write(&path, format_intermediate(&plate, &args.reporter))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {} cycles to {}", plate.cycles(), path.display());
    }
    Ok(())
}
