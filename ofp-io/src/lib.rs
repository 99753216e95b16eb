//! Collaborator boundary and batch orchestration for footprint projection

pub mod batch;
pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod image;
pub mod local;
pub mod persist;

pub use batch::{BatchReport, CancellationToken, Collaborators, Orchestrator, PairKey, PairOutcome};
pub use catalog::ImageDescriptor;
pub use config::{BatchConfig, OutputMode, Rendering};
pub use error::{CollaboratorError, IoError, Result};
pub use persist::DirectorySink;
