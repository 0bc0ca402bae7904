use crate::network::NetworkModel;

use itertools::{izip, Itertools};
use nalgebra::DMatrix;

/// Computes the calculated bus injections from the polar power flow
/// equations.
///
///   P_i = sum_j V_i V_j (G_ij cos(th_i - th_j) + B_ij sin(th_i - th_j))
///   Q_i = sum_j V_i V_j (G_ij sin(th_i - th_j) - B_ij cos(th_i - th_j))
///
/// Returns the active and reactive injections for every bus, slack included.
pub fn calc_power(net: &NetworkModel, vm: &[f64], va: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let nb = net.nb();
    let mut p = vec![0.0; nb];
    let mut q = vec![0.0; nb];
    for i in 0..nb {
        for j in 0..nb {
            let y = net.y(i, j);
            let (s, c) = (va[i] - va[j]).sin_cos();
            let vv = vm[i] * vm[j];
            p[i] += vv * (y.re * c + y.im * s);
            q[i] += vv * (y.re * s - y.im * c);
        }
    }
    (p, q)
}

/// Specified minus calculated injections at the PQ buses: all active
/// power components first, then all reactive ones.
pub fn mismatch(net: &NetworkModel, p_calc: &[f64], q_calc: &[f64]) -> Vec<f64> {
    let pq = net.pq();
    [
        pq.iter()
            .map(|&i| net.p_spec()[i] - p_calc[i])
            .collect::<Vec<_>>(),
        pq.iter()
            .map(|&i| net.q_spec()[i] - q_calc[i])
            .collect::<Vec<_>>(),
    ]
    .concat()
}

/// Builds the power flow Jacobian with respect to the PQ bus angles and
/// magnitudes.
///
/// Rows are ordered [dP; dQ] and columns [dVa; dVm] over `net.pq()`, matching
/// the layout returned by `mismatch`. `p_calc` and `q_calc` must be the
/// injections at the same operating point.
pub fn make_jac(
    net: &NetworkModel,
    vm: &[f64],
    va: &[f64],
    p_calc: &[f64],
    q_calc: &[f64],
) -> DMatrix<f64> {
    let pq = net.pq();
    let npq = pq.len();
    let mut jac = DMatrix::zeros(2 * npq, 2 * npq);

    for (r, &i) in pq.iter().enumerate() {
        for (c, &k) in pq.iter().enumerate() {
            let y = net.y(i, k);
            let (g, b) = (y.re, y.im);
            if i == k {
                let v2 = vm[i] * vm[i];
                jac[(r, c)] = -q_calc[i] - b * v2;
                jac[(r, npq + c)] = p_calc[i] / vm[i] + g * vm[i];
                jac[(npq + r, c)] = p_calc[i] - g * v2;
                jac[(npq + r, npq + c)] = q_calc[i] / vm[i] - b * vm[i];
            } else {
                let (s, co) = (va[i] - va[k]).sin_cos();
                let gs_bc = g * s - b * co;
                let gc_bs = g * co + b * s;
                jac[(r, c)] = vm[i] * vm[k] * gs_bc;
                jac[(r, npq + c)] = vm[i] * gc_bs;
                jac[(npq + r, c)] = -vm[i] * vm[k] * gc_bs;
                jac[(npq + r, npq + c)] = vm[i] * gs_bc;
            }
        }
    }
    jac
}

pub(crate) fn format_f64_vec(v: &[f64]) -> String {
    format!("[{}]", v.iter().map(|x| format!("{:.6}", x)).join(", "))
}

pub(crate) fn format_polar_vec(vm: &[f64], va: &[f64]) -> String {
    format!(
        "[{}]",
        izip!(vm, va)
            .map(|(m, a)| format!("{:.6}∠{:.6}", m, a))
            .join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::case3;

    #[test]
    fn flat_start_injections_balance() {
        // Rows of the case3 admittance matrix sum to zero, so a flat
        // start draws no power anywhere.
        let net = case3();
        let (p, q) = calc_power(&net, &[1.0; 3], &[0.0; 3]);
        for (p, q) in p.iter().zip(&q) {
            assert!(p.abs() < 1e-12);
            assert!(q.abs() < 1e-12);
        }
        assert_eq!(mismatch(&net, &p, &q), vec![-1.0, -0.8, -0.5, -0.3]);
    }

    #[test]
    fn flat_start_jacobian() {
        let net = case3();
        let (p, q) = calc_power(&net, &[1.0; 3], &[0.0; 3]);
        let jac = make_jac(&net, &[1.0; 3], &[0.0; 3], &p, &q);
        // dP/dVa = -B, dP/dVm = G, dQ/dVa = -G, dQ/dVm = -B at a flat start
        // with zero injections.
        let expected = DMatrix::from_row_slice(
            4,
            4,
            &[
                30.0, -15.0, 10.0, -5.0, //
                -15.0, 30.0, -5.0, 10.0, //
                -10.0, 5.0, 30.0, -15.0, //
                5.0, -10.0, -15.0, 30.0,
            ],
        );
        assert!((jac - expected).abs().max() < 1e-12);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let net = case3();
        let vm = [1.0, 0.97, 0.95];
        let va = [0.0, -0.04, -0.06];
        let (p, q) = calc_power(&net, &vm, &va);
        let jac = make_jac(&net, &vm, &va, &p, &q);

        let h = 1e-7;
        let pq = net.pq();
        let npq = pq.len();
        for (c, &k) in pq.iter().enumerate() {
            let mut va_h = va;
            va_h[k] += h;
            let (p_h, q_h) = calc_power(&net, &vm, &va_h);
            let mut vm_h = vm;
            vm_h[k] += h;
            let (p_v, q_v) = calc_power(&net, &vm_h, &va);
            for (r, &i) in pq.iter().enumerate() {
                assert!((jac[(r, c)] - (p_h[i] - p[i]) / h).abs() < 1e-4);
                assert!((jac[(npq + r, c)] - (q_h[i] - q[i]) / h).abs() < 1e-4);
                assert!((jac[(r, npq + c)] - (p_v[i] - p[i]) / h).abs() < 1e-4);
                assert!((jac[(npq + r, npq + c)] - (q_v[i] - q[i]) / h).abs() < 1e-4);
            }
        }
    }
}
