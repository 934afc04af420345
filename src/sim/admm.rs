//! Lightweight box-constrained LQR solver for scalar systems.
//!
//! Solves
//!
//! ```text
//! minimise  Σ_{k<N}   q/2 · (x[k] - x_ref)²  +  Σ_{k<N-1} r/2 · u[k]²
//! s.t.      x[k+1] = a·x[k] + b·u[k],   x[0] = x0
//!           x_min <= x[k] <= x_max,     u_min <= u[k] <= u_max
//! ```
//!
//! with ADMM: the box constraints live on slack copies of the trajectory, so
//! the primal update is an unconstrained LQR solve whose Riccati gains are
//! computed once per problem and reused for every iteration.

use thiserror::Error;

/// Closed interval used for state and input boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn project(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Fixed-horizon QP over `x[k+1] = a·x[k] + b·u[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarQp {
    pub a: f64,
    pub b: f64,
    /// State tracking weight.
    pub q: f64,
    /// Input weight.
    pub r: f64,
    /// State reference.
    pub x_ref: f64,
    /// Number of state knots; there are `horizon - 1` inputs.
    pub horizon: usize,
    pub state_bounds: Bounds,
    pub input_bounds: Bounds,
}

/// ADMM iteration parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmmSettings {
    /// Penalty parameter.
    pub rho: f64,
    /// Iteration budget; running out counts as failure.
    pub max_iter: usize,
    /// Primal and dual residual tolerance.
    pub tolerance: f64,
}

impl Default for AdmmSettings {
    fn default() -> Self {
        Self {
            rho: 1.0,
            max_iter: 500,
            tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("horizon must contain at least two knots, got {0}")]
    HorizonTooShort(usize),

    #[error("invalid bounds: min {min} > max {max}")]
    InvalidBounds { min: f64, max: f64 },

    #[error("no convergence after {iterations} iterations (primal {primal:.3e}, dual {dual:.3e})")]
    MaxIterations {
        iterations: usize,
        primal: f64,
        dual: f64,
    },

    #[error("solver produced a non-finite value")]
    NonFinite,
}

/// Converged trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmmSolution {
    /// Box-feasible state trajectory (`horizon` knots).
    pub states: Vec<f64>,
    /// Box-feasible inputs (`horizon - 1` values).
    pub controls: Vec<f64>,
    pub iterations: usize,
}

/// Time-varying Riccati factors of the rho-augmented LQR problem.
struct RiccatiCache {
    gain: Vec<f64>,
    quu_inv: Vec<f64>,
    closed_loop: Vec<f64>,
}

impl RiccatiCache {
    fn new(qp: &ScalarQp, rho: f64) -> Self {
        let n = qp.horizon;
        let (a, b) = (qp.a, qp.b);
        let q_rho = qp.q + rho;
        let r_rho = qp.r + rho;

        let mut gain = vec![0.0; n - 1];
        let mut quu_inv = vec![0.0; n - 1];
        let mut closed_loop = vec![0.0; n - 1];
        let mut p = q_rho;
        for k in (0..n - 1).rev() {
            let inv = 1.0 / (r_rho + b * p * b);
            let k_gain = inv * b * p * a;
            gain[k] = k_gain;
            quu_inv[k] = inv;
            closed_loop[k] = a - b * k_gain;
            p = q_rho + a * p * (a - b * k_gain);
        }

        Self {
            gain,
            quu_inv,
            closed_loop,
        }
    }
}

/// Working buffers for one solve.
struct Workspace {
    x: Vec<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
    z: Vec<f64>,
    g: Vec<f64>,
    y: Vec<f64>,
    q: Vec<f64>,
    r: Vec<f64>,
    p: Vec<f64>,
    d: Vec<f64>,
}

/// Solves `qp` from initial state `x0`.
///
/// The problem is rebuilt from scratch on every call; nothing is carried
/// over between solves.
///
/// # Errors
///
/// Returns [`SolverError::MaxIterations`] when the residuals do not fall
/// below the tolerance within the iteration budget.
pub fn solve(qp: &ScalarQp, x0: f64, settings: &AdmmSettings) -> Result<AdmmSolution, SolverError> {
    let n = qp.horizon;
    if n < 2 {
        return Err(SolverError::HorizonTooShort(n));
    }
    for bounds in [qp.state_bounds, qp.input_bounds] {
        if bounds.min > bounds.max {
            return Err(SolverError::InvalidBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }
    }

    let rho = settings.rho;
    let cache = RiccatiCache::new(qp, rho);
    let x_start = qp.state_bounds.project(x0);
    let u_start = qp.input_bounds.project(0.0);
    let mut ws = Workspace {
        x: vec![x0; n],
        u: vec![u_start; n - 1],
        v: vec![x_start; n],
        z: vec![u_start; n - 1],
        g: vec![0.0; n],
        y: vec![0.0; n - 1],
        q: vec![0.0; n],
        r: vec![0.0; n - 1],
        p: vec![0.0; n],
        d: vec![0.0; n - 1],
    };

    update_linear_cost(qp, rho, &mut ws);
    backward_pass(qp, &cache, &mut ws);

    let mut primal = f64::INFINITY;
    let mut dual = f64::INFINITY;
    for iter in 1..=settings.max_iter {
        forward_pass(qp, &cache, x0, &mut ws);

        primal = 0.0;
        dual = 0.0;
        for k in 0..n {
            let v_new = qp.state_bounds.project(ws.x[k] + ws.g[k]);
            ws.g[k] += ws.x[k] - v_new;
            primal = f64::max(primal, (ws.x[k] - v_new).abs());
            dual = f64::max(dual, rho * (ws.v[k] - v_new).abs());
            ws.v[k] = v_new;
        }
        for k in 0..n - 1 {
            let z_new = qp.input_bounds.project(ws.u[k] + ws.y[k]);
            ws.y[k] += ws.u[k] - z_new;
            primal = f64::max(primal, (ws.u[k] - z_new).abs());
            dual = f64::max(dual, rho * (ws.z[k] - z_new).abs());
            ws.z[k] = z_new;
        }

        if !primal.is_finite() || !dual.is_finite() {
            return Err(SolverError::NonFinite);
        }
        if primal < settings.tolerance && dual < settings.tolerance {
            return Ok(AdmmSolution {
                states: ws.v,
                controls: ws.z,
                iterations: iter,
            });
        }

        update_linear_cost(qp, rho, &mut ws);
        backward_pass(qp, &cache, &mut ws);
    }

    Err(SolverError::MaxIterations {
        iterations: settings.max_iter,
        primal,
        dual,
    })
}

fn update_linear_cost(qp: &ScalarQp, rho: f64, ws: &mut Workspace) {
    for k in 0..ws.q.len() {
        ws.q[k] = -qp.q * qp.x_ref - rho * (ws.v[k] - ws.g[k]);
    }
    for k in 0..ws.r.len() {
        ws.r[k] = -rho * (ws.z[k] - ws.y[k]);
    }
}

fn backward_pass(qp: &ScalarQp, cache: &RiccatiCache, ws: &mut Workspace) {
    let n = ws.p.len();
    ws.p[n - 1] = ws.q[n - 1];
    for k in (0..n - 1).rev() {
        ws.d[k] = cache.quu_inv[k] * (qp.b * ws.p[k + 1] + ws.r[k]);
        ws.p[k] = ws.q[k] + cache.closed_loop[k] * ws.p[k + 1] - cache.gain[k] * ws.r[k];
    }
}

fn forward_pass(qp: &ScalarQp, cache: &RiccatiCache, x0: f64, ws: &mut Workspace) {
    ws.x[0] = x0;
    for k in 0..ws.u.len() {
        ws.u[k] = -cache.gain[k] * ws.x[k] - ws.d[k];
        ws.x[k + 1] = qp.a * ws.x[k] + qp.b * ws.u[k];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery_qp(q: f64, r: f64, x_ref: f64, horizon: usize) -> ScalarQp {
        ScalarQp {
            a: 1.0,
            b: -1.0,
            q,
            r,
            x_ref,
            horizon,
            state_bounds: Bounds::new(0.78, 15.6),
            input_bounds: Bounds::new(-9.6, 9.6),
        }
    }

    #[test]
    fn zero_state_weight_stays_idle() {
        let qp = battery_qp(0.0, 100.0, 0.0, 24);
        let sol = solve(&qp, 7.8, &AdmmSettings::default()).unwrap();
        assert_eq!(sol.controls.len(), 23);
        assert_eq!(sol.states.len(), 24);
        assert!(sol.controls.iter().all(|u| u.abs() < 1e-9));
        assert_eq!(sol.iterations, 1);
    }

    #[test]
    fn tracking_moves_toward_reference() {
        // Below the reference: the input must be negative (charging raises x).
        let qp = battery_qp(1.0, 1.0, 10.0, 12);
        let sol = solve(&qp, 5.0, &AdmmSettings::default()).unwrap();
        assert!(sol.controls[0] < 0.0);
        assert!(sol.states.last().copied().unwrap() > 5.0);
    }

    #[test]
    fn input_box_is_respected() {
        let mut qp = battery_qp(10.0, 0.01, 15.0, 8);
        qp.input_bounds = Bounds::new(-1.0, 1.0);
        let settings = AdmmSettings {
            max_iter: 5000,
            ..AdmmSettings::default()
        };
        let sol = solve(&qp, 5.0, &settings).unwrap();
        assert!(sol.controls.iter().all(|u| (-1.0..=1.0).contains(u)));
        assert!((sol.controls[0] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn state_box_is_respected() {
        let qp = battery_qp(5.0, 0.1, 20.0, 10);
        let settings = AdmmSettings {
            max_iter: 5000,
            ..AdmmSettings::default()
        };
        let sol = solve(&qp, 14.0, &settings).unwrap();
        assert!(sol.states.iter().all(|x| *x <= 15.6));
    }

    #[test]
    fn too_short_horizon_is_rejected() {
        let qp = battery_qp(0.0, 1.0, 0.0, 1);
        assert_eq!(
            solve(&qp, 7.8, &AdmmSettings::default()),
            Err(SolverError::HorizonTooShort(1))
        );
    }

    #[test]
    fn exhausted_budget_is_reported() {
        let qp = battery_qp(1.0, 1.0, 10.0, 12);
        let settings = AdmmSettings {
            max_iter: 1,
            ..AdmmSettings::default()
        };
        assert!(matches!(
            solve(&qp, 5.0, &settings),
            Err(SolverError::MaxIterations { iterations: 1, .. })
        ));
    }

    #[test]
    fn solve_is_deterministic() {
        let qp = battery_qp(1.0, 2.0, 9.0, 24);
        let a = solve(&qp, 6.0, &AdmmSettings::default());
        let b = solve(&qp, 6.0, &AdmmSettings::default());
        assert_eq!(a, b);
    }
}
