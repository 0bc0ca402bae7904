use crate::dataset::{Dataset, DatasetRow};
use crate::error::{PfError, PfResult};
use crate::network::{BusRole, NetworkModel};
use crate::pfopt::{PFOpt, SweepOpt};
use crate::runpf::runpf;

/// `n` evenly spaced values over `[start, stop]`, endpoints included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut v: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            v[n - 1] = stop;
            v
        }
    }
}

/// Rectangular grid of (P, Q) loads applied at one bus.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub bus: usize,
    pub p_load: Vec<f64>,
    pub q_load: Vec<f64>,
}

impl SweepGrid {
    pub fn new(bus: usize, p_load: Vec<f64>, q_load: Vec<f64>) -> Self {
        Self {
            bus,
            p_load,
            q_load,
        }
    }

    pub fn from_opt(opt: &SweepOpt) -> Self {
        Self {
            bus: opt.bus,
            p_load: linspace(opt.p_range.0, opt.p_range.1, opt.points),
            q_load: linspace(opt.q_range.0, opt.q_range.1, opt.points),
        }
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.p_load.len() * self.q_load.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid points in enumeration order: P outer, Q inner.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.p_load
            .iter()
            .flat_map(move |&p| self.q_load.iter().map(move |&q| (p, q)))
    }
}

/// Solves the power flow at every grid point and collects the converged
/// bus voltages.
///
/// The load at `grid.bus` replaces that bus's specified injection with
/// `(-p, -q)`. Points that fail with a numerical or convergence error are
/// counted in `Dataset::skipped` and produce no row. Configuration errors
/// (such as sweeping the slack bus) abort the sweep.
pub fn generate_dataset(
    base: &NetworkModel,
    grid: &SweepGrid,
    opt: &PFOpt,
) -> PfResult<Dataset> {
    let bus = grid.bus;
    if bus >= base.nb() {
        return Err(PfError::config(format!(
            "sweep bus {} out of range for {} buses",
            bus,
            base.nb()
        )));
    }
    if base.role(bus) == BusRole::Slack {
        return Err(PfError::config(format!(
            "cannot sweep the load at slack bus {}",
            bus
        )));
    }

    let mut ds = Dataset::new(bus, base.nb());
    for (p, q) in grid.points() {
        let net = base.with_injections(&[(bus, -p, -q)])?;
        match runpf(&net, opt) {
            Ok(res) => {
                log::debug!(
                    "P = {}, Q = {}: converged in {} iterations",
                    p,
                    q,
                    res.iterations
                );
                ds.rows.push(DatasetRow {
                    p_load: p,
                    q_load: q,
                    vm: res.vm(),
                    va: res.va(),
                });
            }
            Err(err) if err.is_scenario_local() => {
                log::warn!("P = {}, Q = {}: skipped ({})", p, q, err);
                ds.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    log::info!(
        "Sweep at bus {}: {} of {} grid points converged, {} skipped.",
        bus + 1,
        ds.rows.len(),
        grid.len(),
        ds.skipped
    );
    Ok(ds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_endpoints() {
        let v = linspace(0.5, 2.0, 8);
        assert_eq!(v.len(), 8);
        assert_eq!(v[0], 0.5);
        assert_eq!(v[7], 2.0);
        assert!((v[1] - (0.5 + 1.5 / 7.0)).abs() < 1e-15);

        assert!(linspace(1.0, 2.0, 0).is_empty());
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert_eq!(linspace(1.0, 2.0, 3), vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn grid_order() {
        let grid = SweepGrid::new(1, vec![1.0, 2.0], vec![3.0, 4.0, 5.0]);
        assert_eq!(grid.len(), 6);
        let pts: Vec<_> = grid.points().collect();
        assert_eq!(
            pts,
            vec![
                (1.0, 3.0),
                (1.0, 4.0),
                (1.0, 5.0),
                (2.0, 3.0),
                (2.0, 4.0),
                (2.0, 5.0)
            ]
        );
    }

    #[test]
    fn default_grid() {
        let grid = SweepGrid::from_opt(&SweepOpt::default());
        assert_eq!(grid.bus, 1);
        assert_eq!(grid.len(), 64);
        assert_eq!(grid.p_load, grid.q_load);
    }
}
