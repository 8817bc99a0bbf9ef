#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/entity.rs"]
pub mod entity;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/store.rs"]
pub mod store;

#[path = "core/simulator.rs"]
pub mod simulator;

#[path = "core/instances.rs"]
pub mod instances;

#[path = "core/mesh.rs"]
pub mod mesh;

#[path = "core/camera.rs"]
pub mod camera;

#[path = "core/backend.rs"]
pub mod backend;

#[cfg(feature = "gpu")]
#[path = "core/gpu.rs"]
pub mod gpu;

#[path = "core/renderer.rs"]
pub mod renderer;

#[path = "core/picker.rs"]
pub mod picker;

#[path = "core/overlay.rs"]
pub mod overlay;

#[path = "core/input.rs"]
pub mod input;

#[path = "core/schedule.rs"]
pub mod schedule;

#[path = "core/engine.rs"]
pub mod engine;

pub mod observer;

pub use config::EngineConfig;
pub use engine::{Engine, EngineEvent};
pub use error::{BackendError, EngineError};
pub use input::{InputEvent, Key};
