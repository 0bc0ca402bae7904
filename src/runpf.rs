use crate::error::PfResult;
use crate::network::NetworkModel;
use crate::newton::{newtonpf, PrintProgress, ProgressMonitor};
use crate::pfopt::PFOpt;
use crate::power::calc_power;

use num_complex::Complex64;
use std::fmt;

/// Voltage at one bus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusState {
    /// Magnitude (p.u.).
    pub vm: f64,
    /// Angle (rad), on the same branch as the slack angle; not wrapped
    /// into (-pi, pi].
    pub va: f64,
}

/// Converged power flow solution.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverResult {
    pub buses: Vec<BusState>,
    pub iterations: usize,
    pub converged: bool,
    /// Infinity norm of the final P & Q mismatch (p.u.).
    pub mismatch: f64,
    slack_power: Complex64,
}

impl SolverResult {
    pub fn vm(&self) -> Vec<f64> {
        self.buses.iter().map(|b| b.vm).collect()
    }

    pub fn va(&self) -> Vec<f64> {
        self.buses.iter().map(|b| b.va).collect()
    }

    /// Complex power injected at the slack bus (p.u.).
    pub fn slack_power(&self) -> Complex64 {
        self.slack_power
    }
}

impl fmt::Display for SolverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Power Flow Solution (per unit):")?;
        writeln!(f, "--------------------------------")?;
        for (i, b) in self.buses.iter().enumerate() {
            writeln!(
                f,
                "Bus {:2}: Voltage = {:.4} pu, Angle = {:.4} rad",
                i + 1,
                b.vm,
                b.va
            )?;
        }
        write!(
            f,
            "Converged in {} iterations (max mismatch {:.3e} p.u.)",
            self.iterations, self.mismatch
        )
    }
}

/// Runs a Newton-Raphson AC power flow from a flat start.
///
/// Every PQ bus starts at 1.0 p.u. and the slack angle (0 rad for the
/// usual reference); the slack bus is held at its fixed voltage for the
/// whole run.
pub fn runpf(net: &NetworkModel, opt: &PFOpt) -> PfResult<SolverResult> {
    if opt.verbose {
        runpf_with_progress(net, opt, Some(&PrintProgress {}))
    } else {
        runpf_with_progress(net, opt, None)
    }
}

pub fn runpf_with_progress(
    net: &NetworkModel,
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> PfResult<SolverResult> {
    let nb = net.nb();
    let slack = net.slack();
    let (slack_vm, slack_va) = net.slack_voltage();

    // flat start, angles relative to the slack
    let mut vm0 = vec![1.0; nb];
    let va0 = vec![slack_va; nb];
    vm0[slack] = slack_vm;

    let soln = newtonpf(net, &vm0, &va0, opt, progress)?;
    log::info!(
        "Power flow converged in {} iterations (max mismatch {:e} p.u.).",
        soln.iterations,
        soln.norm_f
    );

    let (p_calc, q_calc) = calc_power(net, &soln.vm, &soln.va);
    let buses = soln
        .vm
        .iter()
        .zip(&soln.va)
        .map(|(&vm, &va)| BusState { vm, va })
        .collect();

    Ok(SolverResult {
        buses,
        iterations: soln.iterations,
        converged: true,
        mismatch: soln.norm_f,
        slack_power: Complex64::new(p_calc[slack], q_calc[slack]),
    })
}
