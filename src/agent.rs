// src/agent.rs

//! Provisioning agents
//!
//! An [`Agent`] bundles the services a mirror run needs: the artifact and metadata
//! repository registries, the HTTP client, and the destination lock table. A
//! [`ProvisioningContext`] hands out the running agent, or creates one through its
//! [`AgentProvider`] the first time one is needed.

use crate::error::{Error, RepositorySide, Result};
use crate::lock::LocationLocks;
use crate::repository::{
    ArtifactRepositoryManager, MetadataRepositoryManager, RemoteArtifactRepositoryFactory,
    RemoteMetadataRepositoryFactory, RepositoryClient, RepositoryManager,
    SimpleArtifactRepositoryFactory, SimpleMetadataRepositoryFactory,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Services shared by every run on one context
pub struct Agent {
    artifact_manager: ArtifactRepositoryManager,
    metadata_manager: MetadataRepositoryManager,
    locks: Arc<LocationLocks>,
}

impl Agent {
    pub fn new(
        artifact_manager: ArtifactRepositoryManager,
        metadata_manager: MetadataRepositoryManager,
    ) -> Self {
        Self {
            artifact_manager,
            metadata_manager,
            locks: Arc::new(LocationLocks::new()),
        }
    }

    /// Agent handling local folders and HTTP(S) repositories
    pub fn with_defaults() -> Result<Self> {
        let client = Arc::new(RepositoryClient::new()?);

        let artifact_manager = RepositoryManager::new(RepositorySide::Artifact)
            .with_factory(Arc::new(SimpleArtifactRepositoryFactory))
            .with_factory(Arc::new(RemoteArtifactRepositoryFactory::new(Arc::clone(&client))));
        let metadata_manager = RepositoryManager::new(RepositorySide::Metadata)
            .with_factory(Arc::new(SimpleMetadataRepositoryFactory))
            .with_factory(Arc::new(RemoteMetadataRepositoryFactory::new(client)));

        Ok(Self::new(artifact_manager, metadata_manager))
    }

    pub fn artifact_manager(&self) -> &ArtifactRepositoryManager {
        &self.artifact_manager
    }

    pub fn metadata_manager(&self) -> &MetadataRepositoryManager {
        &self.metadata_manager
    }

    pub fn locks(&self) -> &Arc<LocationLocks> {
        &self.locks
    }
}

/// Creates agents on demand
pub trait AgentProvider: Send + Sync {
    fn create_agent(&self) -> Result<Agent>;
}

/// Provider of [`Agent::with_defaults`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAgentProvider;

impl AgentProvider for DefaultAgentProvider {
    fn create_agent(&self) -> Result<Agent> {
        Agent::with_defaults()
    }
}

/// Source of the agent used by mirror runs
#[derive(Default)]
pub struct ProvisioningContext {
    running: RwLock<Option<Arc<Agent>>>,
    provider: Option<Arc<dyn AgentProvider>>,
}

impl ProvisioningContext {
    /// Context with neither a running agent nor a provider
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(provider: Arc<dyn AgentProvider>) -> Self {
        Self {
            running: RwLock::new(None),
            provider: Some(provider),
        }
    }

    pub fn with_default_provider() -> Self {
        Self::with_provider(Arc::new(DefaultAgentProvider))
    }

    pub fn with_agent(agent: Arc<Agent>) -> Self {
        Self {
            running: RwLock::new(Some(agent)),
            provider: None,
        }
    }

    pub fn running_agent(&self) -> Option<Arc<Agent>> {
        self.running.read().clone()
    }

    /// The running agent, or a new one from the provider which then becomes running
    pub fn acquire_agent(&self) -> Result<Arc<Agent>> {
        if let Some(agent) = self.running_agent() {
            debug!("Using running provisioning agent");
            return Ok(agent);
        }

        let provider = self.provider.as_ref().ok_or_else(|| {
            Error::Setup("No provisioning agent is running and no provider is available".to_string())
        })?;

        let mut running = self.running.write();
        if let Some(agent) = running.as_ref() {
            return Ok(Arc::clone(agent));
        }
        let agent = Arc::new(provider.create_agent()?);
        info!("Created provisioning agent");
        *running = Some(Arc::clone(&agent));
        Ok(agent)
    }
}
