use crate::error::{PfError, PfResult};

use anyhow::{Context, Result};
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Role of a bus in the power flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRole {
    /// Reference bus with fixed voltage magnitude and angle.
    Slack,
    /// Injection specified bus, voltage magnitude and angle unknown.
    PQ,
}

/// Immutable description of a small, dense AC network.
///
/// Holds the bus admittance matrix, the specified active/reactive
/// injections per bus (p.u., generation positive, load negative) and
/// the slack bus. Bus roles and the list of unknown buses are resolved
/// once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkModel {
    y_bus: DMatrix<Complex64>,
    p_spec: Vec<f64>,
    q_spec: Vec<f64>,
    slack: usize,
    slack_vm: f64,
    slack_va: f64,
    roles: Vec<BusRole>,
    pq: Vec<usize>,
}

impl NetworkModel {
    /// Builds a network with the slack bus held at 1.0 p.u., 0 rad.
    pub fn new(
        y_bus: DMatrix<Complex64>,
        p_spec: Vec<f64>,
        q_spec: Vec<f64>,
        slack: usize,
    ) -> PfResult<Self> {
        let nb = y_bus.nrows();
        if nb == 0 {
            return Err(PfError::config("network has no buses"));
        }
        if y_bus.ncols() != nb {
            return Err(PfError::config(format!(
                "admittance matrix must be square, got {}x{}",
                nb,
                y_bus.ncols()
            )));
        }
        if p_spec.len() != nb || q_spec.len() != nb {
            return Err(PfError::config(format!(
                "injection vectors have lengths {} (P) and {} (Q), expected {}",
                p_spec.len(),
                q_spec.len(),
                nb
            )));
        }
        if slack >= nb {
            return Err(PfError::config(format!(
                "slack bus index {} out of range for {} buses",
                slack, nb
            )));
        }
        if y_bus.iter().any(|y| !y.re.is_finite() || !y.im.is_finite()) {
            return Err(PfError::config("admittance matrix has non-finite entries"));
        }
        if p_spec.iter().chain(&q_spec).any(|s| !s.is_finite()) {
            return Err(PfError::config("specified injections must be finite"));
        }

        let roles: Vec<BusRole> = (0..nb)
            .map(|i| if i == slack { BusRole::Slack } else { BusRole::PQ })
            .collect();
        let pq = (0..nb).filter(|&i| roles[i] == BusRole::PQ).collect();

        Ok(Self {
            y_bus,
            p_spec,
            q_spec,
            slack,
            slack_vm: 1.0,
            slack_va: 0.0,
            roles,
            pq,
        })
    }

    /// Builds a network from row-major admittance entries.
    pub fn from_rows(
        rows: &[Vec<Complex64>],
        p_spec: Vec<f64>,
        q_spec: Vec<f64>,
        slack: usize,
    ) -> PfResult<Self> {
        let nb = rows.len();
        if let Some(r) = rows.iter().find(|r| r.len() != nb) {
            return Err(PfError::config(format!(
                "admittance row has {} entries, expected {}",
                r.len(),
                nb
            )));
        }
        let y_bus = DMatrix::from_fn(nb, nb, |i, j| rows[i][j]);
        Self::new(y_bus, p_spec, q_spec, slack)
    }

    /// Returns a copy with the slack bus held at the given magnitude (p.u.)
    /// and angle (rad).
    pub fn with_slack_voltage(&self, vm: f64, va: f64) -> PfResult<Self> {
        if !(vm.is_finite() && vm > 0.0) || !va.is_finite() {
            return Err(PfError::config(format!(
                "invalid slack voltage {} p.u. at {} rad",
                vm, va
            )));
        }
        let mut net = self.clone();
        net.slack_vm = vm;
        net.slack_va = va;
        Ok(net)
    }

    /// Returns a copy with the specified (P, Q) injections replaced at the
    /// given buses. The original network is left untouched.
    pub fn with_injections(&self, changes: &[(usize, f64, f64)]) -> PfResult<Self> {
        let mut net = self.clone();
        for &(i, p, q) in changes {
            if i >= self.nb() {
                return Err(PfError::config(format!(
                    "bus index {} out of range for {} buses",
                    i,
                    self.nb()
                )));
            }
            if !p.is_finite() || !q.is_finite() {
                return Err(PfError::config(format!(
                    "non-finite injection at bus {}",
                    i
                )));
            }
            net.p_spec[i] = p;
            net.q_spec[i] = q;
        }
        Ok(net)
    }

    /// Number of buses.
    pub fn nb(&self) -> usize {
        self.p_spec.len()
    }

    pub fn y_bus(&self) -> &DMatrix<Complex64> {
        &self.y_bus
    }

    pub fn y(&self, i: usize, j: usize) -> Complex64 {
        self.y_bus[(i, j)]
    }

    pub fn p_spec(&self) -> &[f64] {
        &self.p_spec
    }

    pub fn q_spec(&self) -> &[f64] {
        &self.q_spec
    }

    pub fn slack(&self) -> usize {
        self.slack
    }

    /// Fixed (magnitude, angle) of the slack bus.
    pub fn slack_voltage(&self) -> (f64, f64) {
        (self.slack_vm, self.slack_va)
    }

    pub fn role(&self, i: usize) -> BusRole {
        self.roles[i]
    }

    /// Indexes of the injection specified buses, in bus order.
    pub fn pq(&self) -> &[usize] {
        &self.pq
    }
}

/// Three bus test system: bus 1 slack, buses 2 and 3 loads.
pub fn case3() -> NetworkModel {
    let y_self = Complex64::new(10.0, -30.0);
    let y_mutual = Complex64::new(-5.0, 15.0);
    let y_bus = DMatrix::from_fn(3, 3, |i, j| if i == j { y_self } else { y_mutual });

    NetworkModel {
        y_bus,
        p_spec: vec![0.0, -1.0, -0.8],
        q_spec: vec![0.0, -0.5, -0.3],
        slack: 0,
        slack_vm: 1.0,
        slack_va: 0.0,
        roles: vec![BusRole::Slack, BusRole::PQ, BusRole::PQ],
        pq: vec![1, 2],
    }
}

/// JSON network description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseFile {
    pub ybus_re: Vec<Vec<f64>>,
    pub ybus_im: Vec<Vec<f64>>,
    pub p_spec: Vec<f64>,
    pub q_spec: Vec<f64>,
    pub slack: usize,
    #[serde(default)]
    pub slack_vm: Option<f64>,
    #[serde(default)]
    pub slack_va: Option<f64>,
}

impl CaseFile {
    pub fn to_network(&self) -> PfResult<NetworkModel> {
        if self.ybus_re.len() != self.ybus_im.len()
            || self
                .ybus_re
                .iter()
                .zip(&self.ybus_im)
                .any(|(re, im)| re.len() != im.len())
        {
            return Err(PfError::config(
                "real and imaginary admittance parts differ in shape",
            ));
        }
        let rows: Vec<Vec<Complex64>> = self
            .ybus_re
            .iter()
            .zip(&self.ybus_im)
            .map(|(re, im)| {
                re.iter()
                    .zip(im)
                    .map(|(&g, &b)| Complex64::new(g, b))
                    .collect()
            })
            .collect();

        let net = NetworkModel::from_rows(
            &rows,
            self.p_spec.clone(),
            self.q_spec.clone(),
            self.slack,
        )?;
        match (self.slack_vm, self.slack_va) {
            (None, None) => Ok(net),
            (vm, va) => net.with_slack_voltage(vm.unwrap_or(1.0), va.unwrap_or(0.0)),
        }
    }
}

impl From<&NetworkModel> for CaseFile {
    fn from(net: &NetworkModel) -> Self {
        let nb = net.nb();
        let (slack_vm, slack_va) = net.slack_voltage();
        Self {
            ybus_re: (0..nb)
                .map(|i| (0..nb).map(|j| net.y(i, j).re).collect())
                .collect(),
            ybus_im: (0..nb)
                .map(|i| (0..nb).map(|j| net.y(i, j).im).collect())
                .collect(),
            p_spec: net.p_spec.clone(),
            q_spec: net.q_spec.clone(),
            slack: net.slack,
            slack_vm: Some(slack_vm),
            slack_va: Some(slack_va),
        }
    }
}

/// Reads a network from a JSON case file.
pub fn load_case(path: &Path) -> Result<NetworkModel> {
    let file = File::open(path).with_context(|| format!("opening case file {:?}", path))?;
    let case: CaseFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing case file {:?}", path))?;
    let net = case.to_network()?;
    log::debug!("loaded {}-bus case from {:?}", net.nb(), path);
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ybus2() -> DMatrix<Complex64> {
        DMatrix::from_row_slice(
            2,
            2,
            &[
                Complex64::new(5.0, -15.0),
                Complex64::new(-5.0, 15.0),
                Complex64::new(-5.0, 15.0),
                Complex64::new(5.0, -15.0),
            ],
        )
    }

    #[test]
    fn case3_roles() {
        let net = case3();
        assert_eq!(net.nb(), 3);
        assert_eq!(net.slack(), 0);
        assert_eq!(net.role(0), BusRole::Slack);
        assert_eq!(net.role(2), BusRole::PQ);
        assert_eq!(net.pq(), &[1, 2]);
        assert_eq!(net.y(1, 2), Complex64::new(-5.0, 15.0));
        assert_eq!(net.slack_voltage(), (1.0, 0.0));
    }

    #[test]
    fn case3_matches_constructor() {
        let net = case3();
        let rebuilt = NetworkModel::new(
            net.y_bus().clone(),
            net.p_spec().to_vec(),
            net.q_spec().to_vec(),
            0,
        )
        .unwrap();
        assert_eq!(rebuilt, net);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let err = NetworkModel::new(ybus2(), vec![0.0; 3], vec![0.0; 2], 0).unwrap_err();
        assert!(matches!(err, PfError::Configuration { .. }));

        let rect = DMatrix::from_element(2, 3, Complex64::new(1.0, 0.0));
        let err = NetworkModel::new(rect, vec![0.0; 2], vec![0.0; 2], 0).unwrap_err();
        assert!(matches!(err, PfError::Configuration { .. }));

        let ragged = vec![vec![Complex64::new(1.0, 0.0); 2], vec![Complex64::new(1.0, 0.0)]];
        let err = NetworkModel::from_rows(&ragged, vec![0.0; 2], vec![0.0; 2], 0).unwrap_err();
        assert!(matches!(err, PfError::Configuration { .. }));
    }

    #[test]
    fn rejects_bad_slack() {
        let err = NetworkModel::new(ybus2(), vec![0.0; 2], vec![0.0; 2], 2).unwrap_err();
        assert!(matches!(err, PfError::Configuration { .. }));

        let net = NetworkModel::new(ybus2(), vec![0.0; 2], vec![0.0; 2], 1).unwrap();
        assert_eq!(net.pq(), &[0]);
        assert!(net.with_slack_voltage(0.0, 0.0).is_err());
        assert!(net.with_slack_voltage(1.02, f64::NAN).is_err());
    }

    #[test]
    fn injections_are_copy_on_write() {
        let base = case3();
        let derived = base.with_injections(&[(1, -2.0, -1.5)]).unwrap();
        assert_eq!(base.p_spec(), &[0.0, -1.0, -0.8]);
        assert_eq!(base.q_spec(), &[0.0, -0.5, -0.3]);
        assert_eq!(derived.p_spec(), &[0.0, -2.0, -0.8]);
        assert_eq!(derived.q_spec(), &[0.0, -1.5, -0.3]);
        assert_eq!(derived.y_bus(), base.y_bus());

        assert!(base.with_injections(&[(3, 0.0, 0.0)]).is_err());
        assert!(base.with_injections(&[(1, f64::INFINITY, 0.0)]).is_err());
    }

    #[test]
    fn case_file_round_trip() {
        let net = case3().with_slack_voltage(1.05, 0.0).unwrap();
        let json = serde_json::to_string(&CaseFile::from(&net)).unwrap();
        let case: CaseFile = serde_json::from_str(&json).unwrap();
        assert_eq!(case.to_network().unwrap(), net);
    }

    #[test]
    fn case_file_defaults_slack_voltage() {
        let json = r#"{
            "ybus_re": [[5.0, -5.0], [-5.0, 5.0]],
            "ybus_im": [[-15.0, 15.0], [15.0, -15.0]],
            "p_spec": [0.0, -0.5],
            "q_spec": [0.0, -0.2],
            "slack": 0
        }"#;
        let case: CaseFile = serde_json::from_str(json).unwrap();
        let net = case.to_network().unwrap();
        assert_eq!(net.slack_voltage(), (1.0, 0.0));
        assert_eq!(net.y(0, 1), Complex64::new(-5.0, 15.0));
    }
}
