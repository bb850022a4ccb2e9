// Tilt-to-velocity steering models
//
// A model is an (algorithm, filter) pair selected by the frame's model byte.
// The filter picks the orientation fed to the algorithm (current sample or a
// smoothed one over the history window); the algorithm maps the tilt angles
// (phi, theta) to (alpha, beta), which become a differential velocity pair.
//
// Degenerate input is not intercepted: a zero accelerometer vector, or an
// inverse-distance evaluation exactly on a grid node, yields NaN/inf values.
// Callers check `VelocityCommand::is_finite` before forwarding.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;

use crate::config::V_MAX;
use crate::frame::ControlSample;
use crate::history::{Orientation, OrientationSample, SampleHistory};

/// Interpolation algorithm over the tilt angles
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Bilinear,
    /// Shepard inverse-distance weighting with the given power
    Shepard { power: f32 },
    /// Closed-form model found by genetic programming
    SymbolicB,
}

/// Smoothing applied over the history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    None,
    SimpleMovingAverage,
    ExponentialMovingAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SteeringModel {
    pub algorithm: Algorithm,
    pub filter: Filter,
}

const fn model(algorithm: Algorithm, filter: Filter) -> Option<SteeringModel> {
    Some(SteeringModel { algorithm, filter })
}

const SHEPARD_SOFT: Algorithm = Algorithm::Shepard { power: 1.5 };
const SHEPARD_SHARP: Algorithm = Algorithm::Shepard { power: 4.5 };

/// Model table indexed by model code; `None` entries are disabled codes
const MODELS: [Option<SteeringModel>; 15] = [
    model(Algorithm::Bilinear, Filter::None),
    model(Algorithm::Bilinear, Filter::SimpleMovingAverage),
    model(Algorithm::Bilinear, Filter::ExponentialMovingAverage),
    model(SHEPARD_SOFT, Filter::None),
    model(SHEPARD_SOFT, Filter::SimpleMovingAverage),
    model(SHEPARD_SOFT, Filter::ExponentialMovingAverage),
    model(SHEPARD_SHARP, Filter::None),
    model(SHEPARD_SHARP, Filter::SimpleMovingAverage),
    model(SHEPARD_SHARP, Filter::ExponentialMovingAverage),
    None,
    None,
    None,
    model(Algorithm::SymbolicB, Filter::None),
    model(Algorithm::SymbolicB, Filter::SimpleMovingAverage),
    model(Algorithm::SymbolicB, Filter::ExponentialMovingAverage),
];

impl SteeringModel {
    pub const DEFAULT: Self = Self {
        algorithm: Algorithm::Bilinear,
        filter: Filter::None,
    };

    /// Resolve a model code; unknown and disabled codes fall back to the default
    pub fn from_code(code: u8) -> Self {
        MODELS
            .get(usize::from(code))
            .copied()
            .flatten()
            .unwrap_or(Self::DEFAULT)
    }

    /// Record the sample in the history and compute the velocity command
    pub fn compute(
        &self,
        sample: &ControlSample,
        history: &mut SampleHistory,
        now: Instant,
    ) -> VelocityCommand {
        let current = history.insert(sample.x, sample.y, sample.z, now);
        let orientation = match self.filter {
            Filter::None => current.orientation,
            Filter::SimpleMovingAverage => simple_moving_average(history.window(now)),
            Filter::ExponentialMovingAverage => exponential_moving_average(history.window(now)),
        };
        let (alpha, beta) = self.algorithm.alpha_beta(TiltAngles::from(orientation));
        VelocityCommand::from_alpha_beta(alpha, beta)
    }
}

/// Steering entry point: resolve the model code and compute the command
pub fn compute_velocity(
    model_code: u8,
    sample: &ControlSample,
    history: &mut SampleHistory,
    now: Instant,
) -> VelocityCommand {
    SteeringModel::from_code(model_code).compute(sample, history, now)
}

/// Motor command derived from (alpha, beta)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct VelocityCommand {
    /// mm/s
    pub translational: f32,
    /// deg/s
    pub rotational: f32,
}

impl VelocityCommand {
    pub fn from_alpha_beta(alpha: f32, beta: f32) -> Self {
        let left = V_MAX * (alpha - beta);
        let right = V_MAX * (alpha + beta);
        Self {
            translational: 0.5 * (left + right),
            rotational: (right - left) / 20.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.translational.is_finite() && self.rotational.is_finite()
    }
}

/// Tilt angles in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiltAngles {
    pub phi: f32,
    pub theta: f32,
}

impl From<Orientation> for TiltAngles {
    fn from(o: Orientation) -> Self {
        let phi = o.ay.atan2(o.az);
        // Theta is measured the other way around than the usual pitch
        let theta = -(-o.ax).atan2(o.ay * phi.sin() + o.az * phi.cos());
        Self {
            phi: phi.to_degrees(),
            theta: theta.to_degrees(),
        }
    }
}

// === Filters ===

fn simple_moving_average(window: &VecDeque<OrientationSample>) -> Orientation {
    let mut sum = Orientation::default();
    for sample in window {
        sum.ax += sample.orientation.ax;
        sum.ay += sample.orientation.ay;
        sum.az += sample.orientation.az;
    }
    let count = window.len().max(1) as f32;
    Orientation {
        ax: sum.ax / count,
        ay: sum.ay / count,
        az: sum.az / count,
    }
}

/// Weights decay by `1 - 2/(N+1)` per step from the newest sample
fn exponential_moving_average(window: &VecDeque<OrientationSample>) -> Orientation {
    let decay = 2.0 / (window.len() as f32 + 1.0);
    let mut weight = 1.0f32;
    let mut total = 0.0f32;
    let mut sum = Orientation::default();

    for sample in window {
        sum.ax += weight * sample.orientation.ax;
        sum.ay += weight * sample.orientation.ay;
        sum.az += weight * sample.orientation.az;
        total += weight;
        weight *= 1.0 - decay;
    }
    if total == 0.0 {
        total = 1.0;
    }
    Orientation {
        ax: sum.ax / total,
        ay: sum.ay / total,
        az: sum.az / total,
    }
}

// === Algorithms ===

/// Reference point of the interpolation grid
#[derive(Debug, Clone, Copy)]
struct GridPoint {
    phi: f32,
    theta: f32,
    alpha: f32,
    beta: f32,
}

const fn node(phi: f32, theta: f32, alpha: f32, beta: f32) -> GridPoint {
    GridPoint {
        phi,
        theta,
        alpha,
        beta,
    }
}

//   index:  0    1    2      3   4   5      6    7    8
//   phi:   -90   0   90    -90   0  90    -90    0   90
//   theta: -90 -90  -90      0   0   0     90   90   90
const GRID: [GridPoint; 9] = [
    node(-90.0, -90.0, -0.5, -0.5),
    node(0.0, -90.0, -1.0, 0.0),
    node(90.0, -90.0, -0.5, 0.5),
    node(-90.0, 0.0, 0.0, 0.0),
    node(0.0, 0.0, 0.0, 0.0),
    node(90.0, 0.0, 0.0, 0.0),
    node(-90.0, 90.0, 0.5, 0.5),
    node(0.0, 90.0, 1.0, 0.0),
    node(90.0, 90.0, 0.5, -0.5),
];

impl Algorithm {
    pub fn alpha_beta(&self, angles: TiltAngles) -> (f32, f32) {
        match *self {
            Algorithm::Bilinear => bilinear(angles),
            Algorithm::Shepard { power } => shepard(angles, power),
            Algorithm::SymbolicB => symbolic_b(angles),
        }
    }
}

fn bilinear(TiltAngles { phi, theta }: TiltAngles) -> (f32, f32) {
    // Corners of the enclosing cell: q11 = (phi_lo, theta_lo), q12 = (phi_lo, theta_hi),
    // q21 = (phi_hi, theta_lo), q22 = (phi_hi, theta_hi)
    let [q11, q12, q21, q22] = match (phi >= 0.0, theta >= 0.0) {
        (true, true) => [4, 7, 5, 8],
        (true, false) => [1, 4, 2, 5],
        (false, true) => [3, 6, 4, 7],
        (false, false) => [0, 3, 1, 4],
    }
    .map(|i| GRID[i]);

    let dx = q22.phi - q11.phi;
    let dy = q22.theta - q11.theta;
    let lo = (q22.phi - phi) / dx;
    let hi = (phi - q11.phi) / dx;

    let r1_alpha = q11.alpha * lo + q21.alpha * hi;
    let r1_beta = q11.beta * lo + q21.beta * hi;
    let r2_alpha = q12.alpha * lo + q22.alpha * hi;
    let r2_beta = q12.beta * lo + q22.beta * hi;

    let lo = (q22.theta - theta) / dy;
    let hi = (theta - q11.theta) / dy;
    (r1_alpha * lo + r2_alpha * hi, r1_beta * lo + r2_beta * hi)
}

fn shepard(TiltAngles { phi, theta }: TiltAngles, power: f32) -> (f32, f32) {
    let mut weight_sum = 0.0f32;
    let mut alpha = 0.0f32;
    let mut beta = 0.0f32;

    for point in &GRID {
        let dist = ((phi - point.phi).powi(2) + (theta - point.theta).powi(2)).sqrt();
        let weight = dist.powf(-power);
        weight_sum += weight;
        alpha += weight * point.alpha;
        beta += weight * point.beta;
    }

    (alpha / weight_sum, beta / weight_sum)
}

// Genetic programming primitives; sqrt is protected against negative input
fn gp_add(a: f32, b: f32) -> f32 {
    a + b
}

fn gp_sub(a: f32, b: f32) -> f32 {
    a - b
}

fn gp_mul(a: f32, b: f32) -> f32 {
    a * b
}

fn gp_sqrt(a: f32) -> f32 {
    a.abs().sqrt()
}

fn symbolic_b(TiltAngles { phi, theta }: TiltAngles) -> (f32, f32) {
    let p = phi / 90.0;
    let t = theta / 90.0;

    let alpha = gp_mul(
        gp_sqrt(gp_sub(
            gp_sqrt(gp_sqrt(gp_add(t, t))),
            gp_sqrt(gp_mul(gp_mul(p, t), gp_sqrt(p))),
        )),
        t,
    );
    let beta = gp_mul(
        gp_mul(t, p),
        gp_sub(
            gp_mul(gp_sqrt(gp_mul(t, gp_sqrt(p))), gp_sqrt(t)),
            gp_sqrt(gp_add(t, t)),
        ),
    );
    (alpha, beta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::time::Duration;

    const SQRT_2: f32 = std::f32::consts::SQRT_2;

    fn drive(x: f32, y: f32, z: f32) -> ControlSample {
        ControlSample {
            drive: true,
            model_code: 0,
            x,
            y,
            z,
        }
    }

    fn angles(phi: f32, theta: f32) -> TiltAngles {
        TiltAngles { phi, theta }
    }

    fn orientation(ax: f32, ay: f32, az: f32) -> OrientationSample {
        OrientationSample {
            orientation: Orientation { ax, ay, az },
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_model_table() {
        assert_eq!(SteeringModel::from_code(0), SteeringModel::DEFAULT);
        assert_eq!(
            SteeringModel::from_code(2),
            SteeringModel {
                algorithm: Algorithm::Bilinear,
                filter: Filter::ExponentialMovingAverage
            }
        );
        assert_eq!(
            SteeringModel::from_code(4),
            SteeringModel {
                algorithm: Algorithm::Shepard { power: 1.5 },
                filter: Filter::SimpleMovingAverage
            }
        );
        assert_eq!(
            SteeringModel::from_code(6),
            SteeringModel {
                algorithm: Algorithm::Shepard { power: 4.5 },
                filter: Filter::None
            }
        );
        assert_eq!(
            SteeringModel::from_code(14),
            SteeringModel {
                algorithm: Algorithm::SymbolicB,
                filter: Filter::ExponentialMovingAverage
            }
        );
    }

    #[test]
    fn test_disabled_and_unknown_codes_fall_back() {
        for code in [9u8, 10, 11, 15, 255] {
            assert_eq!(SteeringModel::from_code(code), SteeringModel::DEFAULT);
        }
    }

    #[test]
    fn test_fallback_codes_match_code_zero() {
        let t0 = Instant::now();
        let mut seeded = SampleHistory::new();
        seeded.insert(0.5, 1.0, 9.0, t0);
        seeded.insert(-0.3, 2.0, 9.5, t0 + Duration::from_millis(20));
        let now = t0 + Duration::from_millis(40);
        let sample = drive(0.3, 2.0, 9.5);

        let reference = compute_velocity(0, &sample, &mut seeded.clone(), now);
        assert!(reference.is_finite());
        for code in [9u8, 10, 11, 15, 255] {
            let cmd = compute_velocity(code, &sample, &mut seeded.clone(), now);
            assert_eq!(cmd, reference, "code {}", code);
        }
    }

    #[test]
    fn test_tilt_angles() {
        let flat = TiltAngles::from(Orientation::from_raw(0.0, 0.0, 1.0));
        assert_relative_eq!(flat.phi, 0.0);
        assert_relative_eq!(flat.theta, 0.0);

        let tilted = TiltAngles::from(Orientation::from_raw(SQRT_2, -1.0, 1.0));
        assert_relative_eq!(tilted.phi, -45.0, epsilon = 1e-4);
        assert_relative_eq!(tilted.theta, 45.0, epsilon = 1e-4);
    }

    #[test]
    fn test_bilinear_reproduces_grid_nodes() {
        for point in GRID {
            let (alpha, beta) = bilinear(angles(point.phi, point.theta));
            assert_relative_eq!(alpha, point.alpha, epsilon = 1e-6);
            assert_relative_eq!(beta, point.beta, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_bilinear_quadrants_from_raw_axes() {
        // (x, y, z) chosen so that |phi| == |theta| == 45 degrees
        let cases = [
            ((SQRT_2, 1.0, 1.0), (0.375, -0.125)),
            ((-SQRT_2, 1.0, 1.0), (-0.375, 0.125)),
            ((SQRT_2, -1.0, 1.0), (0.375, 0.125)),
            ((-SQRT_2, -1.0, 1.0), (-0.375, -0.125)),
        ];
        for ((x, y, z), (alpha, beta)) in cases {
            let mut history = SampleHistory::new();
            let cmd = compute_velocity(0, &drive(x, y, z), &mut history, Instant::now());
            // translational = V_MAX * alpha, rotational = V_MAX * beta / 10
            assert_relative_eq!(cmd.translational, V_MAX * alpha, epsilon = 1e-2);
            assert_relative_eq!(cmd.rotational, V_MAX * beta / 10.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_flat_handset_is_standstill() {
        let mut history = SampleHistory::new();
        let t0 = Instant::now();
        for i in 0..30 {
            let now = t0 + Duration::from_millis(i * 20);
            let cmd = compute_velocity(0, &drive(0.0, 0.0, 1.0), &mut history, now);
            assert_eq!(cmd.translational, 0.0);
            assert_eq!(cmd.rotational, 0.0);
        }
        assert_eq!(
            Algorithm::Bilinear.alpha_beta(TiltAngles::from(Orientation::from_raw(0.0, 0.0, 1.0))),
            (0.0, 0.0)
        );
    }

    #[test]
    fn test_velocity_transform() {
        let cmd = VelocityCommand::from_alpha_beta(0.5, 0.25);
        // left = 300, right = 900
        assert_relative_eq!(cmd.translational, 600.0);
        assert_relative_eq!(cmd.rotational, 30.0);
    }

    #[test]
    fn test_shepard_near_node_approaches_node_value() {
        let (alpha, beta) = shepard(angles(89.0, 89.0), 4.5);
        assert_relative_eq!(alpha, 0.5, epsilon = 1e-3);
        assert_relative_eq!(beta, -0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_shepard_on_grid_node_is_not_finite() {
        for power in [1.5, 4.5] {
            let (alpha, beta) = shepard(angles(0.0, 0.0), power);
            assert!(!alpha.is_finite());
            assert!(!beta.is_finite());
        }
        let mut history = SampleHistory::new();
        let cmd = compute_velocity(3, &drive(0.0, 0.0, 1.0), &mut history, Instant::now());
        assert!(!cmd.is_finite());
    }

    #[test]
    fn test_zero_vector_is_not_finite_for_every_model() {
        for code in 0..=14u8 {
            let mut history = SampleHistory::new();
            let cmd = compute_velocity(code, &drive(0.0, 0.0, 0.0), &mut history, Instant::now());
            assert!(!cmd.is_finite(), "code {}", code);
        }
    }

    #[test]
    fn test_symbolic_b_reference_points() {
        assert_eq!(symbolic_b(angles(0.0, 0.0)), (0.0, 0.0));

        // p = t = 1: alpha = sqrt(2^(1/4) - 1), beta = 1 - sqrt(2)
        let (alpha, beta) = symbolic_b(angles(90.0, 90.0));
        assert_relative_eq!(alpha, 0.434_979, epsilon = 1e-5);
        assert_relative_eq!(beta, -0.414_214, epsilon = 1e-5);
    }

    #[test]
    fn test_simple_moving_average() {
        let window: VecDeque<_> = [orientation(1.0, 0.0, 0.0), orientation(0.0, 1.0, 0.0)]
            .into_iter()
            .collect();
        let mean = simple_moving_average(&window);
        assert_relative_eq!(mean.ax, 0.5);
        assert_relative_eq!(mean.ay, 0.5);
        assert_relative_eq!(mean.az, 0.0);
    }

    #[test]
    fn test_exponential_moving_average_favours_newest() {
        // N = 2: decay = 2/3, weights 1 and 1/3
        let window: VecDeque<_> = [orientation(1.0, 0.0, 0.0), orientation(0.0, 1.0, 0.0)]
            .into_iter()
            .collect();
        let ema = exponential_moving_average(&window);
        assert_relative_eq!(ema.ax, 0.75, epsilon = 1e-6);
        assert_relative_eq!(ema.ay, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_exponential_moving_average_single_sample() {
        let window: VecDeque<_> = [orientation(0.0, 0.6, 0.8)].into_iter().collect();
        assert_eq!(exponential_moving_average(&window), window[0].orientation);
    }

    #[test]
    fn test_filtered_models_use_history() {
        let t0 = Instant::now();
        let mut history = SampleHistory::new();
        // Older sample tilted forward, newest flat
        compute_velocity(0, &drive(SQRT_2, 1.0, 1.0), &mut history, t0);
        let now = t0 + Duration::from_millis(20);

        let plain = compute_velocity(0, &drive(0.0, 0.0, 1.0), &mut history.clone(), now);
        let smoothed = compute_velocity(1, &drive(0.0, 0.0, 1.0), &mut history.clone(), now);
        assert_eq!(plain.translational, 0.0);
        assert!(smoothed.translational > 0.0);
    }

    #[test]
    fn test_filtered_models_ignore_stale_history() {
        let t0 = Instant::now();
        let mut history = SampleHistory::new();
        compute_velocity(0, &drive(SQRT_2, 1.0, 1.0), &mut history, t0);
        let now = t0 + Duration::from_millis(1500);
        let cmd = compute_velocity(1, &drive(0.0, 0.0, 1.0), &mut history, now);
        assert_eq!(cmd.translational, 0.0);
        assert_eq!(cmd.rotational, 0.0);
    }

    proptest! {
        #[test]
        fn shepard_is_mirror_symmetric_in_phi(
            phi in 1.0f32..89.0,
            theta in -89.0f32..89.0,
            power in prop_oneof![Just(1.5f32), Just(4.5f32)],
        ) {
            let (a1, b1) = shepard(angles(phi, theta), power);
            let (a2, b2) = shepard(angles(-phi, theta), power);
            prop_assert!((a1 - a2).abs() < 1e-4);
            prop_assert!((b1 + b2).abs() < 1e-4);
        }

        #[test]
        fn shepard_on_any_grid_node_is_not_finite(
            index in 0usize..GRID.len(),
            power in prop_oneof![Just(1.5f32), Just(4.5f32)],
        ) {
            let node = GRID[index];
            let (alpha, beta) = shepard(angles(node.phi, node.theta), power);
            prop_assert!(!alpha.is_finite());
            prop_assert!(!beta.is_finite());
        }

        #[test]
        fn zero_vector_is_not_finite_for_any_code(code in any::<u8>()) {
            let mut history = SampleHistory::new();
            let cmd = compute_velocity(code, &drive(0.0, 0.0, 0.0), &mut history, Instant::now());
            prop_assert!(!cmd.is_finite());
        }

        #[test]
        fn bilinear_stays_in_modeled_range(phi in -90.0f32..=90.0, theta in -90.0f32..=90.0) {
            let (alpha, beta) = bilinear(angles(phi, theta));
            prop_assert!(alpha.abs() <= 1.0 + 1e-6);
            prop_assert!(beta.abs() <= 1.0 + 1e-6);
        }
    }
}
