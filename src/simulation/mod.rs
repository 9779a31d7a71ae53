pub mod states;
pub mod params;
pub mod interaction;
pub mod binder;
pub mod integrator;
pub mod engine;
pub mod background;
pub mod scenario;
