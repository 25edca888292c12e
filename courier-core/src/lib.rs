//! Courier core library: domain types, ports, stores, configuration, events.
//!
//! - [`types`]: newtypes and domain structs
//! - [`error`]: [`StoreError`], [`GitError`]
//! - [`ports`]: async collaborator traits
//! - [`memory`]: in-memory port implementations
//! - [`store`]: YAML file store and authoring helpers
//! - [`config`]: [`CourierConfig`]
//! - [`events`]: typed event bus

pub mod config;
pub mod error;
pub mod events;
pub mod memory;
pub mod ports;
pub mod store;
pub mod types;

pub use config::CourierConfig;
pub use error::{GitError, GitErrorKind, StoreError};
pub use events::{DeploymentCompleted, DeploymentFailed, DomainEvent, EventBus};
pub use memory::{MemoryGitGateway, MemoryStore};
pub use ports::{
    DeploymentStore, GitGateway, RenderModeConfigStore, StoreResult, TargetCatalog, VersionStore,
};
pub use store::FileStore;
pub use types::{
    normalize_render_modes, ArtifactId, ArtifactKind, ArtifactVersion, ArtifactVersionId,
    CommitId, Deployment, DeploymentId, DeploymentStatus, FileSection, FileUpdate, GitRepo,
    GitRepoId, OrganizationId, RenderMode, RenderModeConfiguration, RenderedSection, Target,
    TargetId,
};
