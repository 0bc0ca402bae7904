use crate::error::{PfError, PfResult};
use crate::network::NetworkModel;
use crate::pfopt::PFOpt;
use crate::power::{calc_power, format_f64_vec, format_polar_vec, make_jac, mismatch};

use full::slice::norm_inf;
use std::f64::consts::PI;

pub trait ProgressMonitor {
    fn update(&self, i: usize, norm_f: f64);
}

pub struct PrintProgress {}

impl ProgressMonitor for PrintProgress {
    fn update(&self, i: usize, norm_f: f64) {
        if i == 0 {
            println!(" it    max P & Q mismatch (p.u.)");
            println!("----  ---------------------------");
        }
        println!("{:3}        {:10.3e}", i, norm_f);
    }
}

/// Newton iterate returned on convergence.
#[derive(Debug)]
pub(crate) struct NewtonSoln {
    pub vm: Vec<f64>,
    pub va: Vec<f64>,
    pub iterations: usize,
    pub norm_f: f64,
}

fn eval_mismatch(net: &NetworkModel, vm: &[f64], va: &[f64], i: usize) -> PfResult<Vec<f64>> {
    let (p_calc, q_calc) = calc_power(net, vm, va);
    let f = mismatch(net, &p_calc, &q_calc);
    if f.iter().any(|f| !f.is_finite()) {
        return Err(PfError::Numerical {
            iteration: i,
            what: "non-finite power mismatch".to_string(),
        });
    }
    Ok(f)
}

fn max_mismatch(f: &[f64]) -> f64 {
    if f.is_empty() {
        0.0
    } else {
        norm_inf(f)
    }
}

/// Solves power flow using full Newton's method (power balance, polar).
///
/// Starts from the bus voltage magnitudes `vm0` and angles `va0`, which
/// hold the fixed slack values and the initial guess for every PQ bus.
/// Only PQ bus magnitudes and angles are updated; the slack entries are
/// returned exactly as given.
///
/// Each iteration solves `J dx = F`, where `F` is the specified minus
/// calculated injection mismatch, and applies `dx` to the PQ angles and
/// magnitudes. Fails with `PfError::Numerical` if the Jacobian is
/// singular or the iterate stops being finite, and with
/// `PfError::Convergence` if the mismatch is still above tolerance after
/// `max_it` iterations.
pub(crate) fn newtonpf(
    net: &NetworkModel,
    vm0: &[f64],
    va0: &[f64],
    opt: &PFOpt,
    progress: Option<&dyn ProgressMonitor>,
) -> PfResult<NewtonSoln> {
    let tol = opt.tolerance;
    let max_it = opt.max_it;

    let pq = net.pq();
    let npq = pq.len();

    let mut converged = false;
    let mut i = 0;
    let mut vm = vm0.to_vec();
    let mut va = va0.to_vec();

    // evaluate F(x0)
    let mut f = eval_mismatch(net, &vm, &va, i)?;
    log::trace!("F0: {}", format_f64_vec(&f));

    // check tolerance
    let mut norm_f = max_mismatch(&f);
    if let Some(pm) = progress {
        pm.update(i, norm_f);
    }
    if norm_f < tol {
        converged = true;
        log::debug!("Converged at the initial point.");
    }
    log::debug!("norm_f0: {}", norm_f);

    // do Newton iterations
    while !converged && i < max_it {
        // update iteration counter
        i += 1;

        // evaluate Jacobian at the current point
        let (p_calc, q_calc) = calc_power(net, &vm, &va);
        let jac = make_jac(net, &vm, &va, &p_calc, &q_calc);
        log::trace!("J_{}:\n{}", i, jac);

        // compute update step
        let dx = jac
            .lu()
            .solve(&nalgebra::DVector::from_column_slice(&f))
            .ok_or_else(|| PfError::Numerical {
                iteration: i,
                what: "singular Jacobian".to_string(),
            })?;
        if dx.iter().any(|d| !d.is_finite()) {
            return Err(PfError::Numerical {
                iteration: i,
                what: "ill-conditioned Jacobian".to_string(),
            });
        }
        log::trace!("dx: {}", format_f64_vec(dx.as_slice()));

        // update voltage
        for (j, &k) in pq.iter().enumerate() {
            va[k] += dx[j];
            vm[k] += dx[npq + j];

            // flip a negative magnitude onto the opposite angle
            if vm[k] < 0.0 {
                vm[k] = -vm[k];
                va[k] += PI;
            }
        }
        log::trace!("V_{}: {}", i, format_polar_vec(&vm, &va));

        // evaluate F(x)
        f = eval_mismatch(net, &vm, &va, i)?;

        // check for convergence
        norm_f = max_mismatch(&f);
        if let Some(pm) = progress {
            pm.update(i, norm_f);
        }
        if norm_f < tol {
            converged = true;
            log::debug!(
                "Newton's method power flow (power balance, polar) converged in {} iterations.",
                i
            );
        }
        log::debug!("norm_f{}: {}", i, norm_f);
    }

    if !converged {
        log::debug!(
            "Newton's method power flow (power balance, polar) did not converge in {} iterations.",
            i
        );
        return Err(PfError::Convergence {
            iterations: i,
            mismatch: norm_f,
        });
    }

    Ok(NewtonSoln {
        vm,
        va,
        iterations: i,
        norm_f,
    })
}
