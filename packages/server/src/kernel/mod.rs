//! Kernel module - job orchestration infrastructure.

pub mod artifacts;
pub mod env_resolver;
pub mod event_stream;
pub mod jobs;
pub mod run_registry;

pub use artifacts::{
    ArtifactAggregator, ArtifactError, ArtifactNames, ArtifactPair, ArtifactSource,
    HttpArtifactSource, LocalArtifactSource,
};
pub use env_resolver::JobEnv;
pub use jobs::{BaseJobLauncher, JobHandle, JobRequest, LaunchError, ProgressSignal};
pub use run_registry::RunRegistry;
