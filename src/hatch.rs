//! Hatch assembly: collect assets, persist them in the background, prune
//! failures, and commit the manifest.
//!
//! # Lifecycle
//!
//! ```text
//! Open ──finish()──> Draining ──> Validated ──> Finalized
//!                        └────────────┴──────> Failed
//! ```
//!
//! While `Open`, [`Hatch::save_asset`] registers an asset and spawns its
//! persistence onto a [`JoinSet`] without waiting for it. [`Hatch::finish`]
//! joins every task, runs the two-pass pruning from [`crate::graph`], applies
//! the failure-rate gate and the referential-integrity check, and only then
//! writes the manifest. A rejected run writes no manifest.
//!
//! `save_asset` spawns onto the ambient Tokio runtime and must be called from
//! within one.

use crate::config::HatchConfig;
use crate::error::{HatchError, PersistError};
use crate::graph::{self, GraphNode, PruneOutcome};
use crate::models::{Asset, AssetId, ObjectType};
use crate::outputs::archive::archive_dir;
use crate::outputs::manifest::{Manifest, ManifestEntry, write_manifest};
use crate::persist::persist;
use crate::storage::{FsStorage, Storage};
use crate::utils::ensure_writable_dir;
use crate::verify::verify_manifest_entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, instrument, warn};

/// Where a hatch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatchState {
    Open,
    Draining,
    Validated,
    Finalized,
    Failed,
}

impl HatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            HatchState::Open => "open",
            HatchState::Draining => "draining",
            HatchState::Validated => "validated",
            HatchState::Finalized => "finalized",
            HatchState::Failed => "failed",
        }
    }
}

impl fmt::Display for HatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the hatch remembers about an asset once it has been handed off.
#[derive(Debug, Clone)]
struct Registered {
    node: GraphNode,
    object_type: ObjectType,
    uri: Option<String>,
    title: Option<String>,
}

impl Registered {
    fn from_asset(asset: &Asset) -> Self {
        Self {
            node: GraphNode::new(asset.id().clone(), asset.get_dependent_asset_ids()),
            object_type: asset.object_type(),
            uri: asset.canonical_uri().map(str::to_string),
            title: asset.title().map(str::to_string),
        }
    }
}

/// Result of a successful [`Hatch::finish`].
#[derive(Debug, Clone)]
pub struct HatchReport {
    pub manifest: Manifest,
    /// Number of registered assets.
    pub total: usize,
    /// Registered assets missing from the manifest.
    pub failed: usize,
    pub archive: Option<PathBuf>,
}

/// Assembler for one ingestion run.
pub struct Hatch {
    config: HatchConfig,
    storage: Arc<dyn Storage>,
    state: HatchState,
    registered: Vec<Registered>,
    failed: HashSet<AssetId>,
    pending: JoinSet<Result<(), PersistError>>,
    task_assets: HashMap<task::Id, AssetId>,
}

impl fmt::Debug for Hatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hatch")
            .field("name", &self.config.name)
            .field("state", &self.state)
            .field("registered", &self.registered.len())
            .field("failed", &self.failed.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Hatch {
    /// Open a hatch writing to `config.root` on the local filesystem.
    ///
    /// The directory is created if needed and probed for writability.
    pub async fn new(config: HatchConfig) -> Result<Self, HatchError> {
        ensure_writable_dir(&config.root).await?;
        let storage = Arc::new(FsStorage::new(config.root.clone()));
        Ok(Self::with_storage(config, storage))
    }

    /// Open a hatch on an arbitrary storage backend. `config.root` is only
    /// used for archiving, and only when the backend is local.
    pub fn with_storage(config: HatchConfig, storage: Arc<dyn Storage>) -> Self {
        info!(name = %config.name, root = %config.root.display(), "Hatch opened");
        Self {
            config,
            storage,
            state: HatchState::Open,
            registered: Vec::new(),
            failed: HashSet::new(),
            pending: JoinSet::new(),
            task_assets: HashMap::new(),
        }
    }

    pub fn state(&self) -> HatchState {
        self.state
    }

    pub fn config(&self) -> &HatchConfig {
        &self.config
    }

    /// Number of assets registered so far, failed ones included.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), HatchError> {
        if self.state != HatchState::Open {
            return Err(HatchError::NotAccepting {
                state: self.state.as_str(),
                operation,
            });
        }
        Ok(())
    }

    /// Register an asset and schedule its persistence in the background.
    ///
    /// An asset already marked failed is routed to [`Hatch::save_failed_asset`].
    pub fn save_asset(&mut self, asset: Asset) -> Result<(), HatchError> {
        self.ensure_open("save assets")?;
        if asset.is_failed() {
            return self.save_failed_asset(asset);
        }

        let id = asset.id().clone();
        self.registered.push(Registered::from_asset(&asset));
        let storage = Arc::clone(&self.storage);
        let handle = self
            .pending
            .spawn(async move { persist(asset, storage.as_ref()).await });
        self.task_assets.insert(handle.id(), id.clone());
        debug!(asset_id = %id, pending = self.pending.len(), "Scheduled asset persistence");
        Ok(())
    }

    /// Register an asset the producer already knows is unusable. Nothing is written.
    pub fn save_failed_asset(&mut self, asset: Asset) -> Result<(), HatchError> {
        self.ensure_open("save assets")?;
        debug!(asset_id = %asset.id(), object_type = %asset.object_type(), "Registered failed asset");
        self.failed.insert(asset.id().clone());
        self.registered.push(Registered::from_asset(&asset));
        Ok(())
    }

    /// Drain pending persistence, validate the asset graph, and commit the manifest.
    ///
    /// # Errors
    ///
    /// - [`HatchError::FailureRateExceeded`] when more than 90% of the
    ///   registered assets did not make it into the hatch
    /// - [`HatchError::Validation`] on a dangling dependency or a malformed
    ///   manifest URI
    /// - [`HatchError::NotAccepting`] when called twice
    ///
    /// In every error case no manifest is written. Archiving runs after the
    /// manifest is committed, so an archive failure is logged and reported as
    /// `archive: None` rather than failing the run.
    #[instrument(level = "info", skip_all, fields(name = %self.config.name))]
    pub async fn finish(&mut self) -> Result<HatchReport, HatchError> {
        self.ensure_open("finish")?;
        self.state = HatchState::Draining;
        info!(
            registered = self.registered.len(),
            pending = self.pending.len(),
            "Draining pending persistence"
        );
        self.drain().await;

        let result = self.validate_and_commit().await;
        self.state = match &result {
            Ok(_) => HatchState::Finalized,
            Err(e) => {
                error!(error = %e, "Hatch rejected");
                HatchState::Failed
            }
        };
        result
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.pending.join_next_with_id().await {
            match joined {
                Ok((task_id, Ok(()))) => {
                    self.task_assets.remove(&task_id);
                }
                Ok((task_id, Err(_))) => {
                    if let Some(id) = self.task_assets.remove(&task_id) {
                        self.failed.insert(id);
                    }
                }
                Err(join_error) => {
                    if let Some(id) = self.task_assets.remove(&join_error.id()) {
                        warn!(asset_id = %id, error = %join_error, "Persistence task aborted");
                        self.failed.insert(id);
                    }
                }
            }
        }
    }

    async fn validate_and_commit(&mut self) -> Result<HatchReport, HatchError> {
        let nodes: Vec<GraphNode> = self.registered.iter().map(|r| r.node.clone()).collect();
        let outcome = graph::prune(&nodes, &self.failed);
        let total = nodes.len();
        let failed = total - outcome.survivors.len();
        info!(
            total,
            failed,
            failed_directly = self.failed.len(),
            failed_by_association = outcome.failed_by_association.len(),
            pruned_dependents = outcome.pruned_dependents.len(),
            "Pruned hatch"
        );

        if graph::failure_rate_exceeded(failed, total) {
            return Err(HatchError::FailureRateExceeded { failed, total });
        }

        let dangling = graph::dangling_references(&nodes, &outcome.survivors);
        if let Some(first) = dangling.first() {
            return Err(HatchError::Validation(format!(
                "{} dangling reference(s); asset {} depends on {} which is not in the hatch",
                dangling.len(),
                first.parent,
                first.missing
            )));
        }

        let manifest = self.build_manifest(&outcome)?;
        self.state = HatchState::Validated;

        write_manifest(&manifest, self.storage.as_ref()).await?;

        let archive = match (self.config.archive, self.storage.local_root()) {
            (true, Some(root)) => match archive_dir(root).await {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, "Hatch committed but archiving failed");
                    None
                }
            },
            (true, None) => {
                warn!("Archive requested but storage has no local root; skipping");
                None
            }
            (false, _) => None,
        };

        info!(
            assets = manifest.assets.len(),
            videos = manifest.videos.len(),
            "Hatch finalized"
        );
        Ok(HatchReport {
            manifest,
            total,
            failed,
            archive,
        })
    }

    fn build_manifest(&self, outcome: &PruneOutcome) -> Result<Manifest, HatchError> {
        let by_id: HashMap<&AssetId, &Registered> =
            self.registered.iter().map(|r| (&r.node.id, r)).collect();
        let mut manifest = Manifest::new(&self.config.name, &self.config.language);

        for id in &outcome.survivors {
            let Some(registered) = by_id.get(id) else {
                continue;
            };
            let entry = ManifestEntry {
                id: id.clone(),
                uri: registered.uri.clone(),
                title: registered.title.clone(),
                is_top_level: outcome.is_top_level(id),
            };
            verify_manifest_entry(&entry).map_err(|e| HatchError::Validation(e.to_string()))?;
            match registered.object_type {
                ObjectType::Video => manifest.videos.push(entry),
                _ => manifest.assets.push(entry),
            }
        }
        Ok(manifest)
    }
}
