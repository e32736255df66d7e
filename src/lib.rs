//! rune-compose - Docker Compose specification resolver
//!
//! Loads compose documents the way `docker compose` does and resolves them
//! into a canonical model:
//!
//! - `${VAR}`, `${VAR:-default}` and `${VAR-default}` interpolation
//! - Default file discovery and multi-file merging
//! - Normalization of every loosely-typed service field
//! - Deterministic, cycle-checked service startup order

pub mod compose;
pub mod error;

pub use error::{ComposeError, Result};
