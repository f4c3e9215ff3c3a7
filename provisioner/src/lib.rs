//! Provisioning engine for template-driven groups and folders.
//!
//! [`Provisioner`] resolves definitions against a [`backend::Backend`],
//! creating missing resources together with their ancestors, privileges and
//! containing-group memberships, and retracting resources once they are
//! empty. [`ProvisioningService`] works at the level of a subject and its
//! attribute values, and [`BatchRunner`] spreads subjects over workers.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod privileges;
pub mod reconcile;
pub mod result;
pub mod service;
pub mod subject;
mod teardown;

pub use batch::{BatchReport, BatchRunner, Job, SubjectResult};
pub use config::ProvisionerConfig;
pub use engine::{Provisioner, ResolutionChain};
pub use error::{ProvisioningError, Result};
pub use locks::PathLocks;
pub use privileges::backend_privileges;
pub use reconcile::MembershipDiff;
pub use result::OperationResult;
pub use service::{ProvisioningService, StartupReport};
pub use subject::{GroupedValues, SubjectDescription};
