// tandem_core/src/solver/nlp/sqp.rs

//! Sequential quadratic programming with elastic constraints.
//!
//! # Subproblem
//!
//! Decision variables: x = [d, s] with the step d (n entries) and one elastic slack per
//! constraint (m entries).
//!
//! Cost: ½ dᵀ B d + gᵀ d + ρ Σ s
//!
//! Subject to:
//! - Upper rows: J d - s ≤ cu - c
//! - Lower rows: -J d - s ≤ c - cl
//! - Variable bounds: zl - z ≤ d ≤ zu - z
//! - Slacks: s ≥ 0
//!
//! The slacks keep the QP feasible when the linearization is inconsistent.

use std::time::{Duration, Instant};

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT::NonnegativeConeT,
};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::PlannerError;
use crate::modules::bound_violation;
use crate::session::{LogKind, SessionLog};
use crate::solver::nlp::lbfgs::DampedLbfgs;

/// A smooth, bounded, constrained minimization problem.
///
/// Evaluations take the session log explicitly; implementations must not mutate themselves
/// while being solved.
pub trait NonlinearProgram {
    fn num_variables(&self) -> usize;

    fn num_constraints(&self) -> usize;

    /// Lower and upper variable bounds (infinite entries for unbounded).
    fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>);

    /// Lower and upper constraint bounds (infinite entries for unbounded).
    fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>);

    fn objective(&self, z: &DVector<f64>, log: &mut SessionLog) -> f64;

    fn gradient(&self, z: &DVector<f64>, log: &mut SessionLog) -> DVector<f64>;

    fn constraints(&self, z: &DVector<f64>, log: &mut SessionLog) -> DVector<f64>;

    /// `num_constraints x num_variables` Jacobian of [`NonlinearProgram::constraints`].
    fn jacobian(&self, z: &DVector<f64>, log: &mut SessionLog) -> DMatrix<f64>;

    /// Sum of constraint bound overshoots.
    fn violation_of(&self, c: &DVector<f64>) -> f64 {
        let (lower, upper) = self.constraint_bounds();
        let lower: Vec<Option<f64>> = lower.iter().map(|l| l.is_finite().then_some(*l)).collect();
        let upper: Vec<Option<f64>> = upper.iter().map(|u| u.is_finite().then_some(*u)).collect();
        bound_violation(c.as_slice(), &lower, &upper)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqpOptions {
    /// Wall-clock budget in seconds.
    pub max_cpu_time: f64,
    pub max_iter: Option<usize>,
    pub lbfgs_memory: usize,
    /// Step-norm tolerance for convergence.
    pub tolerance: f64,
    pub feasibility_tolerance: f64,
    pub elastic_penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Converged,
    TimeBudget,
    IterationCap,
    Stalled,
}

#[derive(Debug, Clone)]
pub struct SqpResult {
    /// The best iterate found.
    pub z: DVector<f64>,
    pub objective: f64,
    pub violation: f64,
    pub iterations: usize,
    pub status: SolveStatus,
}

/// `true` if `(objective, violation)` beats the incumbent: feasible beats infeasible, then the
/// lower objective (feasible) or the lower violation (infeasible) wins. Equal points never win.
pub fn is_better(objective: f64, violation: f64, incumbent: (f64, f64), feasibility_tolerance: f64) -> bool {
    let feasible = violation <= feasibility_tolerance;
    let incumbent_feasible = incumbent.1 <= feasibility_tolerance;
    match (feasible, incumbent_feasible) {
        (true, false) => true,
        (false, true) => false,
        (true, true) => objective < incumbent.0 || (objective == incumbent.0 && violation < incumbent.1),
        (false, false) => violation < incumbent.1 || (violation == incumbent.1 && objective < incumbent.0),
    }
}

// --- QP subproblem ---

struct QpStep {
    d: DVector<f64>,
    slack_sum: f64,
    /// Multiplier of each constraint, `λ_upper - λ_lower`.
    multipliers: DVector<f64>,
}

#[derive(Clone, Copy)]
enum Row {
    Upper(usize),
    Lower(usize),
    Other,
}

/// One inequality `a · x ≤ bound` of the subproblem.
struct QpRow {
    /// Non-zero coefficients by increasing column.
    entries: Vec<(usize, f64)>,
    bound: f64,
    kind: Row,
}

struct Iterate<'a> {
    z: &'a DVector<f64>,
    g: &'a DVector<f64>,
    c: &'a DVector<f64>,
    jacobian: &'a DMatrix<f64>,
}

/// Row `i` of the Jacobian scaled by `sign`, followed by the elastic slack column.
fn linearized_row(jacobian: &DMatrix<f64>, i: usize, sign: f64, slack: usize) -> Vec<(usize, f64)> {
    let mut entries: Vec<(usize, f64)> = jacobian
        .row(i)
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(k, v)| (k, sign * v))
        .collect();
    entries.push((slack, -1.0));
    entries
}

fn solve_qp(
    hessian: &DMatrix<f64>,
    at: &Iterate<'_>,
    (cl, cu): (&DVector<f64>, &DVector<f64>),
    (zl, zu): (&DVector<f64>, &DVector<f64>),
    elastic_penalty: f64,
    time_limit: f64,
) -> Result<QpStep, PlannerError> {
    let n = at.z.len();
    let m = at.c.len();
    let nx = n + m;

    let mut p = DMatrix::<f64>::zeros(nx, nx);
    p.view_mut((0, 0), (n, n)).copy_from(hessian);
    let mut q = DVector::<f64>::zeros(nx);
    q.rows_mut(0, n).copy_from(at.g);
    q.rows_mut(n, m).fill(elastic_penalty);

    let mut rows: Vec<QpRow> = Vec::new();
    for i in 0..m {
        if cu[i].is_finite() {
            rows.push(QpRow {
                entries: linearized_row(at.jacobian, i, 1.0, n + i),
                bound: cu[i] - at.c[i],
                kind: Row::Upper(i),
            });
        }
        if cl[i].is_finite() {
            rows.push(QpRow {
                entries: linearized_row(at.jacobian, i, -1.0, n + i),
                bound: at.c[i] - cl[i],
                kind: Row::Lower(i),
            });
        }
    }
    for k in 0..n {
        if zu[k].is_finite() {
            rows.push(QpRow {
                entries: vec![(k, 1.0)],
                bound: zu[k] - at.z[k],
                kind: Row::Other,
            });
        }
        if zl[k].is_finite() {
            rows.push(QpRow {
                entries: vec![(k, -1.0)],
                bound: at.z[k] - zl[k],
                kind: Row::Other,
            });
        }
    }
    for i in 0..m {
        rows.push(QpRow {
            entries: vec![(n + i, -1.0)],
            bound: 0.0,
            kind: Row::Other,
        });
    }

    let b_all: Vec<f64> = rows.iter().map(|row| row.bound).collect();
    let p_csc = dmatrix_to_csc_upper_tri(&p);
    let a_csc = rows_to_csc(&rows, nx);
    let cones = vec![NonnegativeConeT(rows.len())];
    let q_slice: Vec<f64> = q.iter().copied().collect();

    let settings = DefaultSettingsBuilder::default()
        .max_iter(100)
        .verbose(false)
        .time_limit(time_limit.max(1e-3))
        .build()
        .map_err(|e| PlannerError::QpSubproblem(format!("invalid settings: {e:?}")))?;
    let mut solver = DefaultSolver::new(&p_csc, &q_slice, &a_csc, &b_all, &cones, settings)
        .map_err(|e| PlannerError::QpSubproblem(format!("{e:?}")))?;
    solver.solve();
    let sol = &solver.solution;
    if !matches!(sol.status, SolverStatus::Solved | SolverStatus::AlmostSolved) {
        return Err(PlannerError::QpSubproblem(format!("{:?}", sol.status)));
    }

    let d = DVector::from_iterator(n, sol.x[..n].iter().copied());
    let slack_sum = sol.x[n..].iter().map(|s| s.max(0.0)).sum();
    let mut multipliers = DVector::zeros(m);
    for (r, row) in rows.iter().enumerate() {
        match row.kind {
            Row::Upper(i) => multipliers[i] += sol.z[r],
            Row::Lower(i) => multipliers[i] -= sol.z[r],
            Row::Other => {}
        }
    }
    Ok(QpStep {
        d,
        slack_sum,
        multipliers,
    })
}

/// Column-compressed constraint matrix of the stacked subproblem rows.
fn rows_to_csc(rows: &[QpRow], ncols: usize) -> CscMatrix<f64> {
    let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); ncols];
    for (r, row) in rows.iter().enumerate() {
        for &(c, v) in &row.entries {
            columns[c].push((r, v));
        }
    }
    let mut colptr = Vec::with_capacity(ncols + 1);
    colptr.push(0);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    for column in columns {
        for (r, v) in column {
            rowval.push(r);
            nzval.push(v);
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(rows.len(), ncols, colptr, rowval, nzval)
}

/// Convert a symmetric nalgebra `DMatrix<f64>` to upper-triangular `CscMatrix<f64>`.
fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows.saturating_sub(1)) {
            let v = m[(i, j)];
            if v.abs() > 1e-15 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

// --- Driver ---

const ARMIJO: f64 = 1e-4;
const MIN_STEP: f64 = 1e-4;
const MAX_STALLS: usize = 3;

fn clamp(z: &DVector<f64>, zl: &DVector<f64>, zu: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(z.len(), |i, _| z[i].max(zl[i]).min(zu[i]))
}

/// Minimizes `problem` starting from `z0`.
///
/// Never fails for lack of convergence: when the time budget, the iteration cap, repeated
/// line-search failures or unsolvable QP subproblems stop the iteration, the best iterate found
/// so far is returned together with its status. The deadline is checked before every
/// evaluation past the first objective and constraint values, so the budget is overrun by at
/// most one evaluation.
///
/// # Errors
/// `MalformedInput` if `z0` has the wrong length.
pub fn solve<P: NonlinearProgram + ?Sized>(
    problem: &P,
    z0: &DVector<f64>,
    options: &SqpOptions,
    log: &mut SessionLog,
    tag: &str,
) -> Result<SqpResult, PlannerError> {
    let start = Instant::now();
    let budget = Duration::try_from_secs_f64(options.max_cpu_time.max(0.0)).unwrap_or(Duration::MAX);
    let deadline = start.checked_add(budget);
    let expired = || deadline.is_some_and(|d| Instant::now() >= d);
    let remaining = || deadline.map_or(f64::INFINITY, |d| d.saturating_duration_since(Instant::now()).as_secs_f64());

    let n = problem.num_variables();
    if z0.len() != n {
        return Err(PlannerError::MalformedInput(format!(
            "initial guess has {} entries, expected {n}",
            z0.len()
        )));
    }

    let (zl, zu) = problem.variable_bounds();
    let (cl, cu) = problem.constraint_bounds();
    let mut z = clamp(z0, &zl, &zu);
    let mut f = problem.objective(&z, log);
    let mut c = problem.constraints(&z, log);
    let mut violation = problem.violation_of(&c);

    let mut best = SqpResult {
        z: z.clone(),
        objective: f,
        violation,
        iterations: 0,
        status: SolveStatus::TimeBudget,
    };
    if expired() {
        return Ok(finish(best, 0, SolveStatus::TimeBudget, start));
    }
    let mut g = problem.gradient(&z, log);
    if expired() {
        return Ok(finish(best, 0, SolveStatus::TimeBudget, start));
    }
    let mut jacobian = problem.jacobian(&z, log);

    let mut lbfgs = DampedLbfgs::new(options.lbfgs_memory);
    let mut penalty = 10.0_f64;
    let mut stalls = 0;
    let mut solved_any_qp = false;
    let mut iterations = 0;

    let status = 'sqp: loop {
        if expired() {
            break SolveStatus::TimeBudget;
        }
        if options.max_iter.is_some_and(|cap| iterations >= cap) {
            break SolveStatus::IterationCap;
        }

        let at = Iterate {
            z: &z,
            g: &g,
            c: &c,
            jacobian: &jacobian,
        };
        let step = match solve_qp(
            &lbfgs.hessian(n),
            &at,
            (&cl, &cu),
            (&zl, &zu),
            options.elastic_penalty,
            remaining(),
        ) {
            Ok(step) => step,
            Err(e) => {
                warn!(error = %e, iteration = iterations, "QP subproblem failed, resetting Hessian");
                // A fresh Hessian would rebuild the very same subproblem.
                if !solved_any_qp && lbfgs.is_empty() {
                    break SolveStatus::Stalled;
                }
                lbfgs.reset();
                stalls += 1;
                if stalls >= MAX_STALLS {
                    break SolveStatus::Stalled;
                }
                continue;
            }
        };
        solved_any_qp = true;
        iterations += 1;

        let step_norm = step.d.iter().fold(0.0_f64, |a, d| a.max(d.abs()));
        if step_norm < options.tolerance && violation <= options.feasibility_tolerance {
            break SolveStatus::Converged;
        }

        penalty = penalty.max(1.1 * step.multipliers.iter().fold(0.0_f64, |a, l| a.max(l.abs())));
        let merit = f + penalty * violation;
        let directional = g.dot(&step.d) - penalty * (violation - step.slack_sum).max(0.0);

        let mut alpha = 1.0;
        let mut accepted = None;
        while alpha >= MIN_STEP {
            if expired() {
                break 'sqp SolveStatus::TimeBudget;
            }
            let trial = clamp(&(&z + &step.d * alpha), &zl, &zu);
            let f_trial = problem.objective(&trial, log);
            let c_trial = problem.constraints(&trial, log);
            let v_trial = problem.violation_of(&c_trial);
            if f_trial + penalty * v_trial <= merit + ARMIJO * alpha * directional.min(0.0) {
                accepted = Some((trial, f_trial, c_trial, v_trial));
                break;
            }
            alpha *= 0.5;
        }

        let Some((z_next, f_next, c_next, v_next)) = accepted else {
            stalls += 1;
            debug!(iteration = iterations, stalls, "line search failed, resetting Hessian");
            lbfgs.reset();
            if stalls >= MAX_STALLS {
                break SolveStatus::Stalled;
            }
            continue;
        };
        stalls = 0;

        trace!(iteration = iterations, objective = f_next, violation = v_next, step = step_norm, alpha, "SQP iteration");
        log.record_vector(tag, LogKind::Iteration, "sqp", vec![f_next, v_next, step_norm, alpha]);
        if is_better(f_next, v_next, (best.objective, best.violation), options.feasibility_tolerance) {
            best.z = z_next.clone();
            best.objective = f_next;
            best.violation = v_next;
        }

        if expired() {
            break SolveStatus::TimeBudget;
        }
        let g_next = problem.gradient(&z_next, log);
        if expired() {
            break SolveStatus::TimeBudget;
        }
        let jacobian_next = problem.jacobian(&z_next, log);
        let s = &z_next - &z;
        let y = (&g_next - &g) + (&jacobian_next - &jacobian).tr_mul(&step.multipliers);
        lbfgs.push(s, y);

        z = z_next;
        f = f_next;
        g = g_next;
        c = c_next;
        jacobian = jacobian_next;
        violation = v_next;
    };

    Ok(finish(best, iterations, status, start))
}

fn finish(mut best: SqpResult, iterations: usize, status: SolveStatus, start: Instant) -> SqpResult {
    best.iterations = iterations;
    best.status = status;
    debug!(
        iterations,
        status = ?status,
        objective = best.objective,
        violation = best.violation,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "SQP finished"
    );
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::cell::Cell;

    /// min (z0 - 1)² + (z1 - 2)²  s.t.  z0 + z1 ≤ 2,  -5 ≤ z ≤ 5
    struct Projection;

    impl NonlinearProgram for Projection {
        fn num_variables(&self) -> usize {
            2
        }

        fn num_constraints(&self) -> usize {
            1
        }

        fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>) {
            (DVector::from_element(2, -5.0), DVector::from_element(2, 5.0))
        }

        fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>) {
            (DVector::from_element(1, f64::NEG_INFINITY), DVector::from_element(1, 2.0))
        }

        fn objective(&self, z: &DVector<f64>, _log: &mut SessionLog) -> f64 {
            (z[0] - 1.0).powi(2) + (z[1] - 2.0).powi(2)
        }

        fn gradient(&self, z: &DVector<f64>, _log: &mut SessionLog) -> DVector<f64> {
            DVector::from_vec(vec![2.0 * (z[0] - 1.0), 2.0 * (z[1] - 2.0)])
        }

        fn constraints(&self, z: &DVector<f64>, _log: &mut SessionLog) -> DVector<f64> {
            DVector::from_element(1, z[0] + z[1])
        }

        fn jacobian(&self, _z: &DVector<f64>, _log: &mut SessionLog) -> DMatrix<f64> {
            DMatrix::from_row_slice(1, 2, &[1.0, 1.0])
        }
    }

    fn options() -> SqpOptions {
        SqpOptions {
            max_cpu_time: 5.0,
            max_iter: Some(50),
            lbfgs_memory: 5,
            tolerance: 1e-6,
            feasibility_tolerance: 1e-6,
            elastic_penalty: 1e3,
        }
    }

    #[test]
    fn test_solves_constrained_projection() {
        let mut log = SessionLog::new();
        let result = solve(&Projection, &DVector::from_vec(vec![-3.0, 4.0]), &options(), &mut log, "t").unwrap();
        assert_abs_diff_eq!(result.z[0], 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(result.z[1], 1.5, epsilon = 1e-3);
        assert!(result.violation <= 1e-6);
        assert!(log.get("t/iter_sqp").is_some());
    }

    #[test]
    fn test_rejects_wrong_guess_length() {
        let mut log = SessionLog::new();
        assert!(matches!(
            solve(&Projection, &DVector::zeros(3), &options(), &mut log, "t"),
            Err(PlannerError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_zero_budget_returns_the_initial_point() {
        let mut log = SessionLog::new();
        let mut opts = options();
        opts.max_cpu_time = 0.0;
        let result = solve(&Projection, &DVector::from_vec(vec![0.0, 0.0]), &opts, &mut log, "t").unwrap();
        assert_eq!(result.status, SolveStatus::TimeBudget);
        assert_eq!(result.iterations, 0);
        assert_abs_diff_eq!(result.objective, 5.0);
    }

    /// min z² over one bounded variable. A `misleading` gradient points uphill so that every line
    /// search fails; `delay` slows down each objective evaluation.
    struct Scalar {
        bounds: (f64, f64),
        misleading: bool,
        delay: Duration,
        evaluations: Cell<usize>,
    }

    impl Scalar {
        fn new(bounds: (f64, f64), misleading: bool, delay: Duration) -> Self {
            Self {
                bounds,
                misleading,
                delay,
                evaluations: Cell::new(0),
            }
        }
    }

    impl NonlinearProgram for Scalar {
        fn num_variables(&self) -> usize {
            1
        }

        fn num_constraints(&self) -> usize {
            0
        }

        fn variable_bounds(&self) -> (DVector<f64>, DVector<f64>) {
            (DVector::from_element(1, self.bounds.0), DVector::from_element(1, self.bounds.1))
        }

        fn constraint_bounds(&self) -> (DVector<f64>, DVector<f64>) {
            (DVector::zeros(0), DVector::zeros(0))
        }

        fn objective(&self, z: &DVector<f64>, _log: &mut SessionLog) -> f64 {
            std::thread::sleep(self.delay);
            self.evaluations.set(self.evaluations.get() + 1);
            z[0] * z[0]
        }

        fn gradient(&self, z: &DVector<f64>, _log: &mut SessionLog) -> DVector<f64> {
            let sign = if self.misleading { -1.0 } else { 1.0 };
            DVector::from_element(1, sign * 2.0 * z[0])
        }

        fn constraints(&self, _z: &DVector<f64>, _log: &mut SessionLog) -> DVector<f64> {
            DVector::zeros(0)
        }

        fn jacobian(&self, _z: &DVector<f64>, _log: &mut SessionLog) -> DMatrix<f64> {
            DMatrix::zeros(0, 1)
        }
    }

    #[test]
    fn test_deadline_interrupts_line_search() {
        let delay = Duration::from_millis(20);
        let problem = Scalar::new((-5.0, 5.0), true, delay);
        let mut opts = options();
        opts.max_cpu_time = 0.1;
        opts.max_iter = None;
        let started = Instant::now();
        let result = solve(&problem, &DVector::from_element(1, 1.0), &opts, &mut SessionLog::new(), "t").unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.status, SolveStatus::TimeBudget);
        assert_abs_diff_eq!(result.z[0], 1.0);
        // A full failed line search alone takes 14 evaluations.
        assert!(problem.evaluations.get() < 14, "{} evaluations", problem.evaluations.get());
        assert!(elapsed < Duration::from_millis(250), "took {elapsed:?}");
    }

    #[test]
    fn test_unsolvable_first_subproblem_returns_the_start() {
        // Crossed bounds: the start is clamped to -1 and no step can satisfy both bounds.
        let problem = Scalar::new((1.0, -1.0), false, Duration::ZERO);
        let mut log = SessionLog::new();
        let result = solve(&problem, &DVector::from_element(1, 0.0), &options(), &mut log, "t").unwrap();
        assert_eq!(result.status, SolveStatus::Stalled);
        assert_eq!(result.iterations, 0);
        assert_abs_diff_eq!(result.z[0], -1.0);
        assert_abs_diff_eq!(result.objective, 1.0);
        assert_abs_diff_eq!(result.violation, 0.0);
    }

    #[test]
    fn test_subproblem_matrix_from_rows() {
        let jacobian = DMatrix::from_row_slice(1, 3, &[0.5, 0.0, -1.0]);
        assert_eq!(linearized_row(&jacobian, 0, -1.0, 3), vec![(0, -0.5), (2, 1.0), (3, -1.0)]);

        let row = |entries: Vec<(usize, f64)>| QpRow {
            entries,
            bound: 0.0,
            kind: Row::Other,
        };
        let rows = vec![row(vec![(0, 2.0), (2, -1.0)]), row(vec![(1, 3.0)]), row(vec![(0, -4.0)])];
        let a = rows_to_csc(&rows, 4);
        assert_eq!((a.m, a.n), (3, 4));
        assert_eq!(a.colptr, vec![0, 2, 3, 4, 4]);
        assert_eq!(a.rowval, vec![0, 2, 1, 0]);
        assert_eq!(a.nzval, vec![2.0, -4.0, 3.0, -1.0]);
    }

    #[test]
    fn test_selection_order() {
        let tol = 1e-3;
        assert!(is_better(5.0, 0.0, (1.0, 0.5), tol));
        assert!(!is_better(1.0, 0.5, (5.0, 0.0), tol));
        assert!(is_better(1.0, 0.0, (2.0, 0.0), tol));
        assert!(is_better(1.0, 0.0, (1.0, 1e-4), tol));
        assert!(!is_better(1.0, 1e-4, (1.0, 1e-4), tol));
        assert!(is_better(9.0, 0.1, (1.0, 0.2), tol));
    }
}
