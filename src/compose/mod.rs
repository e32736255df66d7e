//! Docker Compose specification resolution
//!
//! This module turns one or more compose documents into a normalized
//! [`ComposeSpec`] and a deterministic service startup order. Nothing here
//! talks to a container runtime.

pub mod config;
pub mod env;
pub mod graph;
pub mod interpolate;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod project;

pub use config::RawDocument;
pub use env::{EnvLookup, ProcessEnv};
pub use graph::{resolve_order, DependencyGraph};
pub use interpolate::interpolate;
pub use model::{
    BuildSpec, ComposeSpec, Condition, DependencyCondition, NetworkSpec, ServiceSpec, VolumeSpec,
};
pub use normalize::Normalizer;
pub use parser::{ComposeParser, DEFAULT_COMPOSE_FILES};
pub use project::{ComposeProject, ProjectOptions};
