//! adaptest-core: Adaptive item selection and ability estimation.
//!
//! This crate holds the 3PL response model, information-based item
//! selection, the ability estimator, session finalization and the
//! collaborator traits the rest of adaptest builds on.

pub mod engine;
pub mod error;
pub mod estimation;
pub mod irt;
pub mod model;
pub mod selection;
pub mod session;
pub mod traits;

pub use engine::{CatEngine, Collaborators, EngineConfig};
pub use error::{CatError, StoreError};
