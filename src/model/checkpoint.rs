use std::path::{Path, PathBuf};

use burn::{prelude::*, record::CompactRecorder};
use thiserror::Error;

use super::{FromArtifact, ModelArtifact, Objective, RegistryError, SymbolRegistry};

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Failed to read model artifact {path:?}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error("Failed to record model weights at {path:?}: {reason}")]
    Record { path: PathBuf, reason: String },

    #[error("Checkpoint holds a {found:?} model, expected {expected:?}")]
    Architecture {
        expected: super::Architecture,
        found: super::Architecture,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Writes `<dir>/<name>.mpk` and the `<dir>/<name>.json` artifact.
pub fn save_checkpoint<B: Backend, M: Module<B>>(
    model: &M,
    artifact: &ModelArtifact,
    dir: &Path,
    name: &str,
) -> Result<(), CheckpointError> {
    let artifact_path = dir.join(format!("{name}.json"));
    artifact
        .save(&artifact_path)
        .map_err(|e| CheckpointError::Artifact {
            path: artifact_path,
            reason: e.to_string(),
        })?;

    let weights_path = dir.join(name);
    model
        .clone()
        .save_file(&weights_path, &CompactRecorder::new())
        .map_err(|e| CheckpointError::Record {
            path: weights_path,
            reason: e.to_string(),
        })
}

/// Rebuilds the model described by `<dir>/<name>.json`, resolves its loss and
/// metric names through `registry`, then restores `<dir>/<name>.mpk`.
pub fn load_checkpoint<B: Backend, M: FromArtifact<B>>(
    dir: &Path,
    name: &str,
    registry: &SymbolRegistry<B>,
    device: &B::Device,
) -> Result<(M, ModelArtifact, Objective<B>), CheckpointError> {
    let artifact_path = dir.join(format!("{name}.json"));
    let artifact =
        ModelArtifact::load(&artifact_path).map_err(|e| CheckpointError::Artifact {
            path: artifact_path,
            reason: e.to_string(),
        })?;

    if artifact.architecture != M::ARCHITECTURE {
        return Err(CheckpointError::Architecture {
            expected: M::ARCHITECTURE,
            found: artifact.architecture,
        });
    }

    let objective = Objective::compile(registry, &artifact.loss, &artifact.metrics)?;

    let weights_path = dir.join(name);
    let model = M::from_artifact(&artifact, device)
        .load_file(&weights_path, &CompactRecorder::new(), device)
        .map_err(|e| CheckpointError::Record {
            path: weights_path,
            reason: e.to_string(),
        })?;

    Ok((model, artifact, objective))
}
