//! Reference-counted deployment of stream definitions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::definition::{DeployableTemplate, StreamDefinition};
use crate::error::DeployError;

pub const DEPLOYER_TYPE: &str = "eventstream";

/// Which artifacts deployed which stream.
#[derive(Default)]
struct Mappings {
    /// artifact id -> stream id
    artifacts: HashMap<String, String>,
    /// stream id -> artifact ids using it
    users: HashMap<String, HashSet<String>>,
}

/// Deploys stream definitions on behalf of template artifacts.
///
/// A stream stays deployed while any artifact references it. Two artifacts
/// may share a stream only if their definitions are identical.
#[derive(Default)]
pub struct StreamDeployer {
    streams: DashMap<String, Arc<StreamDefinition>>,
    mappings: Mutex<Mappings>,
}

impl StreamDeployer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deployer_type(&self) -> &'static str {
        DEPLOYER_TYPE
    }

    /// Deploy the template's stream, replacing whatever this artifact
    /// deployed before.
    pub fn deploy_artifact(&self, template: Option<&DeployableTemplate>) -> Result<(), DeployError> {
        let template = template.ok_or(DeployError::NoArtifact)?;
        let mut mappings = self.mappings.lock();

        if let Some(previous) = mappings.artifacts.remove(&template.artifact_id) {
            debug!("Artifact {} previously deployed stream {}", template.artifact_id, previous);
            self.release(&mut mappings, &template.artifact_id, &previous);
        }

        let definition = template.stream_definition()?;
        let stream_id = definition.stream_id();

        match self.streams.get(&stream_id).map(|s| s.value().clone()) {
            None => {
                self.streams.insert(stream_id.clone(), Arc::new(definition));
                info!("Deployed stream {} for artifact {}", stream_id, template.artifact_id);
            }
            Some(existing) if *existing == definition => {
                debug!("Stream {} already deployed, sharing it with artifact {}", stream_id, template.artifact_id);
            }
            Some(_) => {
                return Err(DeployError::ConflictingDefinition {
                    stream_id,
                    artifact_id: template.artifact_id.clone(),
                });
            }
        }

        mappings.artifacts.insert(template.artifact_id.clone(), stream_id.clone());
        mappings
            .users
            .entry(stream_id)
            .or_default()
            .insert(template.artifact_id.clone());
        Ok(())
    }

    /// Deploy only if no stream with the template's id exists yet.
    pub fn deploy_if_not_done_already(&self, template: Option<&DeployableTemplate>) -> Result<(), DeployError> {
        let template = template.ok_or(DeployError::NoArtifact)?;
        let stream_id = template.stream_definition()?.stream_id();

        if self.streams.contains_key(&stream_id) {
            info!(
                "Common artifact: stream {} of domain {} was not deployed as it is already deployed",
                stream_id, template.domain
            );
            return Ok(());
        }
        self.deploy_artifact(Some(template))
    }

    /// Drop the artifact's reference, removing the stream once unused.
    pub fn undeploy_artifact(&self, artifact_id: &str) {
        let mut mappings = self.mappings.lock();
        match mappings.artifacts.remove(artifact_id) {
            Some(stream_id) => self.release(&mut mappings, artifact_id, &stream_id),
            None => warn!("No stream associated with artifact {}, nothing to undeploy", artifact_id),
        }
    }

    fn release(&self, mappings: &mut Mappings, artifact_id: &str, stream_id: &str) {
        let Some(users) = mappings.users.get_mut(stream_id) else {
            warn!("Mapping for stream {} not found while releasing artifact {}", stream_id, artifact_id);
            return;
        };
        users.remove(artifact_id);
        if users.is_empty() {
            mappings.users.remove(stream_id);
            self.streams.remove(stream_id);
            info!("Undeployed stream {} (no remaining users)", stream_id);
        }
    }

    pub fn stream(&self, stream_id: &str) -> Option<Arc<StreamDefinition>> {
        self.streams.get(stream_id).map(|s| s.value().clone())
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn stream_of(&self, artifact_id: &str) -> Option<String> {
        self.mappings.lock().artifacts.get(artifact_id).cloned()
    }

    /// Artifact ids currently referencing `stream_id`, sorted.
    pub fn users_of(&self, stream_id: &str) -> Vec<String> {
        let mappings = self.mappings.lock();
        let mut users: Vec<String> = mappings
            .users
            .get(stream_id)
            .map(|u| u.iter().cloned().collect())
            .unwrap_or_default();
        users.sort();
        users
    }
}
