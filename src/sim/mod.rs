//! Simulation context: engine ownership, clock, and per-step callbacks.
//!
//! Execution is single-threaded and step-driven. Operations that advance
//! simulated time block the caller until their termination condition is met;
//! "concurrency" is cooperative advancement of the discrete-time loop.

use crate::engine::PhysicsEngine;

/// A callback invoked once per advanced simulation step.
pub type StepCallback<E> = Box<dyn FnMut(&mut E)>;

/// Configuration for the simulation loop.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Fixed timestep in seconds. Default: 1/240.
    pub timestep: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 240.0,
        }
    }
}

/// Owns a physics engine, the simulated clock, and the list of per-step
/// callbacks.
///
/// Callbacks are invoked exactly once per [`step`](Simulator::step), in
/// registration order, *before* the engine advances — so control commands
/// they issue take effect in the step whose results are read back afterward.
pub struct Simulator<E: PhysicsEngine> {
    engine: E,
    config: SimConfig,
    callbacks: Vec<StepCallback<E>>,
    elapsed: f64,
}

impl<E: PhysicsEngine> Simulator<E> {
    /// Create a simulator with the default configuration.
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, SimConfig::default())
    }

    /// Create a simulator with an explicit configuration.
    pub fn with_config(engine: E, config: SimConfig) -> Self {
        Self {
            engine,
            config,
            callbacks: Vec::new(),
            elapsed: 0.0,
        }
    }

    /// Shared access to the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Exclusive access to the engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The fixed timestep in seconds.
    pub fn timestep(&self) -> f32 {
        self.config.timestep
    }

    /// Cumulative simulated seconds elapsed.
    pub fn simulated_seconds(&self) -> f64 {
        self.elapsed
    }

    /// Register a callback to run once per advanced step.
    pub fn register_step_callback(&mut self, callback: StepCallback<E>) {
        self.callbacks.push(callback);
    }

    /// Advance the simulation by one timestep.
    pub fn step(&mut self) {
        for callback in &mut self.callbacks {
            callback(&mut self.engine);
        }
        self.engine.step(self.config.timestep);
        self.elapsed += f64::from(self.config.timestep);
    }

    /// Advance the simulation by (approximately) `seconds` of simulated time.
    pub fn step_for(&mut self, seconds: f32) {
        let steps = (seconds / self.config.timestep).round().max(1.0) as u64;
        for _ in 0..steps {
            self.step();
        }
    }
}
