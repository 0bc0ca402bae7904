use crate::error::{PfError, PfResult};
use crate::sweep::linspace;

use anyhow::{Context, Result};
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Steady-state round rotor synchronous generator.
///
/// Output power follows from the direct axis reactance only; the
/// quadrature reactance and armature resistance are carried as machine
/// data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynchronousMachine {
    xd: f64,
    xq: f64,
    ra: f64,
}

impl SynchronousMachine {
    /// Reactances and resistance in p.u.
    pub fn new(xd: f64, xq: f64, ra: f64) -> PfResult<Self> {
        if !(xd.is_finite() && xd > 0.0) || !(xq.is_finite() && xq > 0.0) {
            return Err(PfError::config(format!(
                "reactances must be positive, got Xd = {}, Xq = {}",
                xd, xq
            )));
        }
        if !(ra.is_finite() && ra >= 0.0) {
            return Err(PfError::config(format!(
                "armature resistance must be non-negative, got {}",
                ra
            )));
        }
        Ok(Self { xd, xq, ra })
    }

    pub fn xd(&self) -> f64 {
        self.xd
    }

    pub fn xq(&self) -> f64 {
        self.xq
    }

    pub fn ra(&self) -> f64 {
        self.ra
    }

    /// Active power output `V E / Xd sin(delta)`.
    pub fn electrical_power(&self, v: f64, e: f64, delta: f64) -> f64 {
        v * e / self.xd * delta.sin()
    }

    /// Reactive power output `V / Xd (E cos(delta) - V)`.
    pub fn reactive_power(&self, v: f64, e: f64, delta: f64) -> f64 {
        v / self.xd * (e * delta.cos() - v)
    }

    /// Stator current magnitude.
    pub fn stator_current(&self, v: f64, e: f64, delta: f64) -> f64 {
        let (s, c) = delta.sin_cos();
        let i_d = (e * c - v) / self.xd;
        let i_q = e * s / self.xd;
        i_d.hypot(i_q)
    }

    pub fn operating_point(&self, v: f64, e: f64, delta: f64) -> MachinePoint {
        MachinePoint {
            v,
            e,
            delta_deg: delta.to_degrees(),
            p: self.electrical_power(v, e, delta),
            q: self.reactive_power(v, e, delta),
            i: self.stator_current(v, e, delta),
        }
    }

    /// Operating points for `n` load angles evenly spaced over [0, pi/2].
    pub fn load_angle_sweep(&self, v: f64, e: f64, n: usize) -> Vec<MachinePoint> {
        linspace(0.0, FRAC_PI_2, n)
            .into_iter()
            .map(|delta| self.operating_point(v, e, delta))
            .collect()
    }
}

/// One row of the machine power-angle table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachinePoint {
    #[serde(rename = "V_terminal_pu")]
    pub v: f64,
    #[serde(rename = "E_internal_pu")]
    pub e: f64,
    pub delta_deg: f64,
    #[serde(rename = "P_pu")]
    pub p: f64,
    #[serde(rename = "Q_pu")]
    pub q: f64,
    #[serde(rename = "I_pu")]
    pub i: f64,
}

pub fn write_machine_csv<W: Write>(points: &[MachinePoint], wtr: W) -> Result<()> {
    let mut wtr = Writer::from_writer(wtr);
    for pt in points {
        wtr.serialize(pt).context("writing machine table")?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_machine_csv_file(points: &[MachinePoint], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating machine table {:?}", path))?;
    write_machine_csv(points, BufWriter::new(file))
        .with_context(|| format!("writing machine table {:?}", path))?;
    log::info!("wrote {} operating points to {:?}", points.len(), path);
    Ok(())
}
