use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use math_multigrid::{CycleShape, Grid1d, MgConfig, MgType, Multigrid, RichardsonTolerances};
use ndarray::Array1;
use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "mg-poisson",
    about = "Solve the 1-D Poisson problem -u'' = f on (0, 1) with multigrid"
)]
struct Cli {
    /// Refinement level: the fine grid has 2^k intervals
    #[arg(short, long, default_value_t = 8)]
    k: u32,

    /// How levels are combined
    #[arg(long, value_enum, default_value_t = TypeChoice::Multiplicative)]
    mg_type: TypeChoice,

    /// Cycle shape of the multiplicative cycle
    #[arg(long, value_enum, default_value_t = CycleChoice::V)]
    cycle: CycleChoice,

    /// Rediscretize coarse operators instead of forming Galerkin products
    #[arg(long)]
    no_galerkin: bool,

    /// JSON configuration file (overrides the defaults above)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Relative residual tolerance
    #[arg(long, default_value_t = 1e-10)]
    rtol: f64,

    /// Maximum Richardson iterations
    #[arg(long, default_value_t = 50)]
    max_its: usize,

    /// Collect per-level timings and print the hierarchy
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TypeChoice {
    Multiplicative,
    Additive,
    Full,
    Kaskade,
}

impl From<TypeChoice> for MgType {
    fn from(choice: TypeChoice) -> Self {
        match choice {
            TypeChoice::Multiplicative => MgType::Multiplicative,
            TypeChoice::Additive => MgType::Additive,
            TypeChoice::Full => MgType::Full,
            TypeChoice::Kaskade => MgType::Kaskade,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CycleChoice {
    V,
    W,
}

impl From<CycleChoice> for CycleShape {
    fn from(choice: CycleChoice) -> Self {
        match choice {
            CycleChoice::V => CycleShape::V,
            CycleChoice::W => CycleShape::W,
        }
    }
}

fn build_config(cli: &Cli) -> Result<MgConfig> {
    let mut config = match &cli.config {
        Some(path) => MgConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => MgConfig {
            mg_type: cli.mg_type.into(),
            cycle: cli.cycle.into(),
            galerkin: !cli.no_galerkin,
            ..MgConfig::for_poisson()
        },
    };
    config.richardson = RichardsonTolerances {
        rtol: cli.rtol,
        max_iterations: cli.max_its,
        ..config.richardson
    };
    config.log_levels |= cli.verbose;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    if cli.k == 0 || cli.k > 24 {
        bail!("refinement level must lie in 1..=24, got {}", cli.k);
    }

    let config = build_config(&cli)?;
    let grid = Grid1d::<f64>::dyadic(cli.k)?;
    let nodes = grid.nodes();
    let n = nodes.len();
    let h = grid.h();

    // u(t) = sin(pi t) gives f = pi^2 sin(pi t)
    let b = Array1::from_iter(nodes.iter().map(|&t| PI * PI * (PI * t).sin()));
    let exact = Array1::from_iter(nodes.iter().map(|&t| (PI * t).sin()));

    let mut mg = Multigrid::from_discretization(Box::new(grid), config)?;
    let setup_start = Instant::now();
    mg.setup()?;
    let setup_time = setup_start.elapsed();

    let mut x = Array1::zeros(n);
    let solve_start = Instant::now();
    let (iterations, summary) = if mg.mg_type() == MgType::Multiplicative {
        let outcome = mg.solve(&b, &mut x)?;
        let summary = format!(
            "{} after {} iterations, residual {:.3e} -> {:.3e}",
            outcome.reason,
            outcome.iterations,
            outcome.residual_history.first().copied().unwrap_or(0.0),
            outcome.final_residual()
        );
        (outcome.iterations, summary)
    } else {
        // other level combinations are preconditioners only: one application
        let failure = mg.apply(&b, &mut x)?;
        let summary = match failure {
            Some(reason) => format!("single application, {}", reason),
            None => "single application".to_string(),
        };
        (1, summary)
    };
    let solve_time = solve_start.elapsed();

    let error = x
        .iter()
        .zip(exact.iter())
        .map(|(a, e)| (a - e).abs())
        .fold(0.0_f64, f64::max);

    println!("grid: {} unknowns, h = {:.3e}, {} levels", n, h, mg.num_levels());
    println!("{}", summary);
    println!("max error vs sin(pi t): {:.3e}", error);
    println!(
        "setup {:.3?}, solve {:.3?} ({:.3?} per iteration)",
        setup_time,
        solve_time,
        solve_time / iterations.max(1) as u32
    );

    if cli.verbose {
        println!();
        print!("{}", mg.diagnostics());
    }

    if let Some(failure) = mg.failure() {
        bail!("multigrid reported a failure: {}", failure);
    }
    Ok(())
}
