pub mod error;
pub mod math;
pub mod goals;
pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use error::{Result, SolverError};

pub use math::triple::{Triple, TripleExt};
pub use math::svd::{compute_svd, Svd};
pub use math::fast_svd::{fast_svd3, FastSvd3};
pub use math::fitting::{
    best_fit_circle, best_fit_line, best_fit_plane, best_fit_sphere, CircleFit, LineFit, LineFitKind,
    PlaneFit, PlaneFitKind, SphereFit,
};

pub use goals::*;

pub use simulation::states::Node;
pub use simulation::params::SolverParams;
pub use simulation::engine::{ExecutionReport, Solver};
pub use simulation::binder::{BinderKind, BoundGeometry, GeometryBinder};
pub use simulation::interaction::{InteractionCommand, InteractionHandle, Ray};
pub use simulation::background::{BackgroundExecution, RenderHook};
pub use simulation::scenario::Scenario;

pub use configuration::config::{BinderConfig, ExecutionConfig, GoalConfig, ScenarioConfig, SolverConfig};

pub use benchmark::benchmark::{bench_iterate, bench_svd, make_cloth};
