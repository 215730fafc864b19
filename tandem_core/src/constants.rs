// tandem_core/src/constants.rs

// --- Agents ---
pub const ROBOT_SPEED_MAX: f64 = 2.0;
pub const ROBOT_ACC_MAX: f64 = 2.0;
pub const PEDESTRIAN_SPEED_MAX: f64 = 2.2;

// --- Environment ---
pub const ENV_DT_DEFAULT: f64 = 0.4;
/// Where the pseudo-ego of an unconditioned prediction is parked.
pub const PSEUDO_EGO_POSITION: [f64; 2] = [1.0e4, 1.0e4];

pub const POTENTIAL_FIELD_V0_DEFAULT: f64 = 4.0;
pub const POTENTIAL_FIELD_SIGMA_DEFAULT: f64 = 1.0;

pub const SOCIAL_FORCES_V0_DEFAULT: f64 = 2.1;
pub const SOCIAL_FORCES_SIGMA_DEFAULT: f64 = 1.5;
pub const SOCIAL_FORCES_TAU: f64 = 0.5;
/// Goal distance assumed for pedestrians without a goal (they keep walking their direction).
pub const SOCIAL_FORCES_GOAL_LOOKAHEAD: f64 = 20.0;

pub const KALMAN_INITIAL_STD: f64 = 0.05;
pub const KALMAN_PROCESS_NOISE: f64 = 0.3;
/// Position std of probabilistic behavior models after one second of prediction.
pub const POSITION_STD_GROWTH: f64 = 0.25;

// --- Modules ---
pub const MIN_DISTANCE_DEFAULT: f64 = 0.5;
pub const SAFE_BRAKING_MARGIN: f64 = 0.3;
/// Lower clamp for distances and norms that are divided by or differentiated through.
pub const NORM_EPS: f64 = 1e-6;

// --- Attention ---
pub const ATTENTION_CLOSEST_K_DEFAULT: usize = 3;
pub const ATTENTION_EUCLIDEAN_RADIUS_DEFAULT: f64 = 4.0;

// --- Solver ---
pub const SOLVER_HORIZON_DEFAULT: usize = 5;
pub const SOLVER_MAX_CPU_TIME_DEFAULT: f64 = 1.0;
pub const SOLVER_LBFGS_MEMORY: usize = 6;
pub const SOLVER_TOLERANCE: f64 = 1e-4;
pub const SOLVER_FEASIBILITY_TOLERANCE: f64 = 1e-3;
pub const SOLVER_ELASTIC_PENALTY: f64 = 1e3;
pub const SOLVER_GOAL_TOLERANCE: f64 = 0.1;
pub const FINITE_DIFFERENCE_STEP: f64 = 1e-6;
pub const TAG_OPTIMIZATION: &str = "opt";
