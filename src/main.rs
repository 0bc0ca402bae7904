use anyhow::{ensure, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use pfsweep::{
    case3, generate_dataset, load_case, runpf, write_machine_csv_file, NetworkModel, PFOpt,
    SweepGrid, SweepOpt, SynchronousMachine,
};

#[derive(Parser)]
#[command(name = "pfsweep")]
#[command(about = "Newton-Raphson AC power flow and load sweep dataset generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a single power flow and print the bus voltages
    Run {
        #[command(flatten)]
        pf: PfArgs,
    },
    /// Sweep the load at one bus and write the converged cases to CSV
    Sweep {
        #[command(flatten)]
        pf: PfArgs,
        /// Bus whose load is swept (1-based)
        #[arg(long, default_value_t = 2)]
        bus: usize,
        #[arg(long, default_value_t = 0.5)]
        p_min: f64,
        #[arg(long, default_value_t = 2.0)]
        p_max: f64,
        #[arg(long, default_value_t = 0.5)]
        q_min: f64,
        #[arg(long, default_value_t = 2.0)]
        q_max: f64,
        /// Grid points per axis
        #[arg(long, default_value_t = 8)]
        points: usize,
        /// Output CSV file
        #[arg(short, long, default_value = "power_flow_dataset.csv")]
        output: PathBuf,
    },
    /// Print the power-angle table of a synchronous machine
    Machine {
        /// Direct axis synchronous reactance (p.u.)
        #[arg(long, default_value_t = 1.8)]
        xd: f64,
        /// Quadrature axis synchronous reactance (p.u.)
        #[arg(long, default_value_t = 1.7)]
        xq: f64,
        /// Armature resistance (p.u.)
        #[arg(long, default_value_t = 0.0)]
        ra: f64,
        /// Terminal voltage (p.u.)
        #[arg(long, default_value_t = 1.0)]
        v: f64,
        /// Internal emf (p.u.)
        #[arg(long, default_value_t = 1.2)]
        e: f64,
        /// Number of load angles over [0, 90] degrees
        #[arg(long, default_value_t = 50)]
        points: usize,
        /// Also write the table to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct PfArgs {
    /// JSON case file (defaults to the built-in 3-bus system)
    #[arg(long)]
    case: Option<PathBuf>,
    /// Tolerance on the max P & Q mismatch (p.u.)
    #[arg(long, default_value_t = 1e-6)]
    tol: f64,
    /// Maximum Newton iterations
    #[arg(long, default_value_t = 20)]
    max_it: usize,
    /// Print the mismatch at every iteration
    #[arg(short, long)]
    verbose: bool,
}

impl PfArgs {
    fn network(&self) -> Result<NetworkModel> {
        match &self.case {
            Some(path) => load_case(path),
            None => Ok(case3()),
        }
    }

    fn opt(&self) -> Result<PFOpt> {
        ensure!(
            self.tol.is_finite() && self.tol > 0.0,
            "tolerance must be positive"
        );
        Ok(PFOpt {
            tolerance: self.tol,
            max_it: self.max_it,
            verbose: self.verbose,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { pf } => cmd_run(&pf),
        Commands::Sweep {
            pf,
            bus,
            p_min,
            p_max,
            q_min,
            q_max,
            points,
            output,
        } => {
            ensure!(bus >= 1, "bus numbers start at 1");
            let sweep = SweepOpt {
                bus: bus - 1,
                p_range: (p_min, p_max),
                q_range: (q_min, q_max),
                points,
            };
            cmd_sweep(&pf, &sweep, &output)
        }
        Commands::Machine {
            xd,
            xq,
            ra,
            v,
            e,
            points,
            output,
        } => cmd_machine(xd, xq, ra, v, e, points, output),
    }
}

fn cmd_run(pf: &PfArgs) -> Result<()> {
    let net = pf.network()?;
    let res = runpf(&net, &pf.opt()?)?;
    println!();
    println!("{}", res);
    Ok(())
}

fn cmd_sweep(pf: &PfArgs, sweep: &SweepOpt, output: &Path) -> Result<()> {
    let net = pf.network()?;
    let grid = SweepGrid::from_opt(sweep);
    let ds = generate_dataset(&net, &grid, &pf.opt()?)?;
    ds.to_csv_file(output)?;

    println!("Dataset generated: {:?}", ds.shape());
    println!("Skipped {} of {} grid points", ds.skipped, grid.len());
    let mut head = ds.clone();
    head.rows.truncate(5);
    print!("{}", head);
    Ok(())
}

fn cmd_machine(
    xd: f64,
    xq: f64,
    ra: f64,
    v: f64,
    e: f64,
    points: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let machine = SynchronousMachine::new(xd, xq, ra)?;
    let table = machine.load_angle_sweep(v, e, points);

    println!("Load Angle (deg) | Electrical Power (pu)");
    println!("----------------------------------------");
    for pt in &table {
        println!("{:6.1}           | {:6.3}", pt.delta_deg, pt.p);
    }

    if let Some(path) = output {
        write_machine_csv_file(&table, &path)?;
    }
    Ok(())
}
