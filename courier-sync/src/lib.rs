//! # courier-sync
//!
//! Publishes artifact versions to deployment targets and reports what is
//! deployed where.
//!
//! - [`merge`]: marker-delimited section merge
//! - [`resolver`]: effective render modes per organization
//! - [`planner`]: concurrent per-target publish pipeline
//! - [`status`]: up-to-date / outdated overview
//! - [`diff`]: unified diffs of a planned publish
//! - [`checkout`]: git gateway over local directories

pub mod checkout;
pub mod diff;
pub mod error;
pub mod merge;
pub mod planner;
pub mod resolver;
pub mod status;

pub use checkout::LocalCheckoutGateway;
pub use diff::{file_diff, preview_diffs, FileDiff};
pub use error::{CheckoutError, PublishError, TargetFailure, ValidationError};
pub use merge::{end_marker, merge, section_content, start_marker};
pub use planner::{
    DeploymentPlanner, FilePlan, PlannerPorts, PublishOutcome, PublishRequest, TargetPreview,
    TargetPublishResult,
};
pub use resolver::RenderModeResolver;
pub use status::{
    ArtifactStatus, ArtifactTargetStatus, DeployedArtifact, DeploymentOverview,
    DeploymentStatusComputer, LastDeployment, RepositoryStatus, TargetStatus,
};
