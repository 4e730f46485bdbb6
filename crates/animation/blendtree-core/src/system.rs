//! The animation system: asset tables, per-entity animation components and
//! the per-frame driver.
//!
//! Authoring and loading happen first, then [`AnimationSystem::bind_phase`]
//! resolves every reference and builds trackers, then
//! [`AnimationSystem::run`] is called once per frame. Asset tables are only
//! read during `run`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde_json::Value as Json;

use crate::animation::{AnimRef, Animation};
use crate::config::SystemConfig;
use crate::document::{
    animation_from_document, animation_to_document, read_document, tree_from_document,
    tree_to_document, write_document,
};
use crate::error::AnimError;
use crate::graph::AnimationTree;
use crate::ids::{EntityId, Uid};
use crate::library::{AnimationLibrary, TreeLibrary};
use crate::outputs::{CoreEvent, Outputs};
use crate::parameter::Parameter;
use crate::scene::{Scene, SceneGraph, ScriptInvoker};
use crate::serialization::PropertyRegistry;
use crate::timeline::{Timeline, TimelineInfo};
use crate::tracker::{AnimationTracker, FrameContext};
use crate::value::Value;

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// Animation state attached to one root entity.
#[derive(Clone, Debug)]
pub struct AnimationComponent {
    pub tree_name: String,
    tree: Uid,
    tracker: Option<AnimationTracker>,
}

impl AnimationComponent {
    /// Id of the bound tree; invalid until the first bind.
    #[inline]
    pub fn tree_id(&self) -> Uid {
        self.tree
    }

    #[inline]
    pub fn tracker(&self) -> Option<&AnimationTracker> {
        self.tracker.as_ref()
    }
}

#[derive(Debug)]
pub struct AnimationSystem {
    config: SystemConfig,
    registry: PropertyRegistry,
    animations: AnimationLibrary,
    trees: TreeLibrary,
    components: BTreeMap<EntityId, AnimationComponent>,
    bound: bool,
    outputs: Outputs,
}

impl Default for AnimationSystem {
    fn default() -> Self {
        Self::new(SystemConfig::default())
    }
}

impl AnimationSystem {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            animations: AnimationLibrary::new(&config.empty_animation_name),
            registry: PropertyRegistry::standard(),
            trees: TreeLibrary::default(),
            components: BTreeMap::new(),
            bound: false,
            outputs: Outputs::with_capacity_limit(config.max_events_per_tick),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    #[inline]
    pub fn registry(&self) -> &PropertyRegistry {
        &self.registry
    }

    #[inline]
    pub fn animations(&self) -> &AnimationLibrary {
        &self.animations
    }

    /// Mutable asset access invalidates the last bind.
    pub fn animations_mut(&mut self) -> &mut AnimationLibrary {
        self.bound = false;
        &mut self.animations
    }

    #[inline]
    pub fn trees(&self) -> &TreeLibrary {
        &self.trees
    }

    /// Mutable asset access invalidates the last bind.
    pub fn trees_mut(&mut self) -> &mut TreeLibrary {
        self.bound = false;
        &mut self.trees
    }

    /// True between a bind phase and the next structural edit.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    #[inline]
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Create an empty animation at the configured frame rate.
    pub fn create_animation(&mut self, name: &str) -> AnimRef {
        let mut animation = Animation::new(name);
        animation.frames_per_second = self.config.default_frames_per_second;
        self.animations_mut().insert(animation)
    }

    pub fn create_tree(&mut self, name: &str) -> Result<&mut AnimationTree, AnimError> {
        self.trees_mut().create(name)
    }

    /// Run an authoring closure against a tree with read access to the
    /// animation library. Marks the tree modified.
    pub fn edit_tree<R>(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut AnimationTree, &AnimationLibrary) -> Result<R, AnimError>,
    ) -> Result<R, AnimError> {
        self.bound = false;
        let tree = self.trees.get_mut_by_name(name)?;
        edit(tree, &self.animations)
    }

    /// Add a timeline to a library animation, resolving entity-addressed
    /// targets against `scene`.
    pub fn add_timeline(
        &mut self,
        animation: &str,
        info: TimelineInfo,
        scene: Option<&dyn SceneGraph>,
    ) -> Result<&mut Timeline, AnimError> {
        self.animations_mut()
            .get_mut_by_name(animation)?
            .add_timeline(info, scene)
    }

    /// Cut `[start, end]` out of `source` into a new library animation.
    pub fn extract_animation(
        &mut self,
        source: &str,
        name: &str,
        start: f32,
        end: f32,
    ) -> Result<AnimRef, AnimError> {
        let clip = self.animations.get_by_name(source)?.extract(name, start, end)?;
        Ok(self.animations_mut().insert(clip))
    }

    // ---- persistence ----

    fn asset_path(folder: &Path, name: &str, extension: &str) -> PathBuf {
        folder.join(format!("{name}.{extension}"))
    }

    /// Load every animation, then every tree, found directly in `folder`.
    /// Files that fail to load are logged and skipped. Returns the number of
    /// assets loaded.
    pub fn init(&mut self, folder: impl AsRef<Path>) -> Result<usize, AnimError> {
        let folder = folder.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(folder)
            .map_err(|err| AnimError::io(folder, &err))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let animation_ext = self.config.animation_extension.clone();
        let tree_ext = self.config.tree_extension.clone();

        let mut loaded = 0;
        for path in paths.iter().filter(|p| has_extension(p, &animation_ext)) {
            match self.load_animation_file(path) {
                Ok(_) => loaded += 1,
                Err(err) => error!("skipping animation {}: {err}", path.display()),
            }
        }
        for path in paths.iter().filter(|p| has_extension(p, &tree_ext)) {
            match self.load_tree_file(path) {
                Ok(_) => loaded += 1,
                Err(err) => error!("skipping tree {}: {err}", path.display()),
            }
        }
        info!(
            "loaded {loaded} asset(s) from {}: {} animation(s), {} tree(s)",
            folder.display(),
            self.animations.len(),
            self.trees.len()
        );
        Ok(loaded)
    }

    pub fn animation_to_document(&self, name: &str) -> Result<Json, AnimError> {
        animation_to_document(self.animations.get_by_name(name)?, &self.registry)
    }

    /// Parse and add an animation, replacing any animation with the same
    /// name. Nothing is added if the document is malformed.
    pub fn animation_from_document(&mut self, doc: &Json) -> Result<AnimRef, AnimError> {
        let animation = animation_from_document(doc, &self.registry)?;
        if animation.name == self.animations.empty_name() && animation.id != Uid::EMPTY_ANIMATION
        {
            return Err(AnimError::invalid_operation(format!(
                "animation name \"{}\" is reserved",
                animation.name
            )));
        }
        Ok(self.animations_mut().insert(animation))
    }

    pub fn tree_to_document(&self, name: &str) -> Result<Json, AnimError> {
        tree_to_document(
            self.trees.get_by_name(name)?,
            Some(&self.animations),
            &self.registry,
        )
    }

    /// Parse and add a tree, replacing any tree with the same name. Node
    /// animations are reattached to the library; missing ones fall back to
    /// the empty animation at the next bind.
    pub fn tree_from_document(&mut self, doc: &Json) -> Result<Uid, AnimError> {
        let mut tree = tree_from_document(doc, &self.registry)?;
        let missing = tree.reload_animations(&self.animations);
        if missing > 0 {
            warn!(
                "tree {} references {missing} animation(s) not in the library",
                tree.name
            );
        }
        Ok(self.trees_mut().insert(tree))
    }

    pub fn load_animation_file(&mut self, path: impl AsRef<Path>) -> Result<AnimRef, AnimError> {
        let path = path.as_ref();
        let doc = read_document(path)?;
        let anim = self.animation_from_document(&doc)?;
        if let Some(loaded) = self.animations.get(anim.id()) {
            let name = loaded.name.clone();
            debug!("loaded animation {name} from {}", path.display());
            self.animations.clear_modified(&name);
        }
        Ok(anim)
    }

    pub fn load_tree_file(&mut self, path: impl AsRef<Path>) -> Result<Uid, AnimError> {
        let path = path.as_ref();
        let doc = read_document(path)?;
        let id = self.tree_from_document(&doc)?;
        if let Some(loaded) = self.trees.get(id) {
            let name = loaded.name.clone();
            debug!("loaded tree {name} from {}", path.display());
            self.trees.clear_modified(&name);
        }
        Ok(id)
    }

    /// Write `<folder>/<name>.<animation_extension>`.
    pub fn save_animation_file(
        &mut self,
        name: &str,
        folder: impl AsRef<Path>,
    ) -> Result<PathBuf, AnimError> {
        let doc = self.animation_to_document(name)?;
        let path = Self::asset_path(folder.as_ref(), name, &self.config.animation_extension);
        write_document(&path, &doc, self.config.pretty_documents)?;
        self.animations.clear_modified(name);
        Ok(path)
    }

    /// Write `<folder>/<name>.<tree_extension>`.
    pub fn save_tree_file(
        &mut self,
        name: &str,
        folder: impl AsRef<Path>,
    ) -> Result<PathBuf, AnimError> {
        let doc = self.tree_to_document(name)?;
        let path = Self::asset_path(folder.as_ref(), name, &self.config.tree_extension);
        write_document(&path, &doc, self.config.pretty_documents)?;
        self.trees.clear_modified(name);
        Ok(path)
    }

    /// Save every animation and tree modified since it was last loaded or
    /// saved. Assets that fail stay marked modified; the first failure is
    /// returned after the others have been attempted.
    pub fn save_all_modified(
        &mut self,
        folder: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>, AnimError> {
        let folder = folder.as_ref();
        let mut written = Vec::new();
        let mut first_error = None;

        for name in self.animations.take_modified() {
            if name == self.animations.empty_name() || self.animations.get_by_name(&name).is_err() {
                continue;
            }
            match self.save_animation_file(&name, folder) {
                Ok(path) => written.push(path),
                Err(err) => {
                    error!("failed to save animation {name}: {err}");
                    self.animations.mark_modified(&name);
                    first_error.get_or_insert(err);
                }
            }
        }
        for name in self.trees.take_modified() {
            if self.trees.get_by_name(&name).is_err() {
                continue;
            }
            match self.save_tree_file(&name, folder) {
                Ok(path) => written.push(path),
                Err(err) => {
                    error!("failed to save tree {name}: {err}");
                    self.trees.mark_modified(&name);
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }

    // ---- components ----

    /// Give `entity` an animation component playing `tree`. When the system
    /// is already bound the tracker is built immediately, otherwise at the
    /// next bind phase.
    pub fn attach(&mut self, entity: EntityId, tree: &str) -> Result<(), AnimError> {
        let tree_ref = self.trees.get_by_name(tree)?;
        let tracker = if self.bound {
            Some(AnimationTracker::new(tree_ref, &self.animations)?)
        } else {
            None
        };
        let previous = self.components.insert(
            entity,
            AnimationComponent {
                tree_name: tree.to_string(),
                tree: tree_ref.id,
                tracker,
            },
        );
        if previous.is_some() {
            debug!("{entity}: animation component replaced");
        }
        Ok(())
    }

    /// Remove the entity's component; its tracker is dropped before the
    /// next run.
    pub fn detach(&mut self, entity: EntityId) -> bool {
        self.components.remove(&entity).is_some()
    }

    pub fn component(&self, entity: EntityId) -> Option<&AnimationComponent> {
        self.components.get(&entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.components.keys().copied()
    }

    /// Resolve every reference, recompute animation lengths and build a
    /// fresh tracker for every component. Returns the number of problems
    /// found; affected nodes fall back to the empty animation and affected
    /// components stay idle.
    pub fn bind_phase(&mut self) -> usize {
        self.animations.recalculate_lengths();

        let mut problems = 0;
        for tree in self.trees.iter_mut() {
            let found = tree.bind(&self.animations);
            if found > 0 {
                warn!("tree {}: {found} problem(s) during bind", tree.name);
            }
            problems += found;
        }

        for (entity, component) in self.components.iter_mut() {
            component.tracker = None;
            let tree = match self.trees.get_by_name(&component.tree_name) {
                Ok(tree) => tree,
                Err(err) => {
                    error!("{entity}: {err}");
                    problems += 1;
                    continue;
                }
            };
            component.tree = tree.id;
            match AnimationTracker::new(tree, &self.animations) {
                Ok(tracker) => component.tracker = Some(tracker),
                Err(err) => {
                    error!("{entity}: cannot start tree {}: {err}", tree.name);
                    problems += 1;
                }
            }
        }

        self.bound = true;
        info!(
            "bound {} tree(s) and {} component(s) with {problems} problem(s)",
            self.trees.len(),
            self.components.len()
        );
        problems
    }

    /// Advance every animated entity by `dt` seconds, writing property
    /// values into `scene`. A failing entity keeps its last pose and is
    /// reported in the outputs.
    pub fn run(
        &mut self,
        dt: f32,
        scene: &mut dyn Scene,
        scripts: &mut dyn ScriptInvoker,
    ) -> &Outputs {
        self.outputs.clear();
        if !self.bound {
            warn!("run called before bind_phase; skipping");
            return &self.outputs;
        }

        for (entity, component) in self.components.iter_mut() {
            let Some(tracker) = component.tracker.as_mut() else {
                continue;
            };
            let Some(tree) = self.trees.get(component.tree) else {
                error!("{entity}: tree {} is gone", component.tree_name);
                self.outputs.push_event(CoreEvent::Error {
                    entity: Some(*entity),
                    message: AnimError::not_found("tree", component.tree_name.clone()).to_string(),
                });
                continue;
            };
            let mut ctx = FrameContext {
                entity: *entity,
                animations: &self.animations,
                scene: &mut *scene,
                scripts: &mut *scripts,
                outputs: &mut self.outputs,
            };
            if let Err(err) = tracker.update(tree, dt, &mut ctx) {
                error!("{entity}: update failed ({}): {err}", err.category());
                ctx.outputs.push_event(CoreEvent::Error {
                    entity: Some(*entity),
                    message: err.to_string(),
                });
            }
        }
        &self.outputs
    }

    // ---- per-entity parameters ----

    fn tracker_mut(&mut self, entity: EntityId) -> Result<&mut AnimationTracker, AnimError> {
        self.components
            .get_mut(&entity)
            .ok_or_else(|| AnimError::not_found("animation component", entity.to_string()))?
            .tracker
            .as_mut()
            .ok_or_else(|| AnimError::not_found("tracker", entity.to_string()))
    }

    pub fn tracker(&self, entity: EntityId) -> Option<&AnimationTracker> {
        self.components.get(&entity)?.tracker.as_ref()
    }

    pub fn set_parameter(
        &mut self,
        entity: EntityId,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), AnimError> {
        self.tracker_mut(entity)?.set_parameter(name, value.into())
    }

    pub fn set_parameter_by_id(
        &mut self,
        entity: EntityId,
        id: Uid,
        value: impl Into<Value>,
    ) -> Result<(), AnimError> {
        self.tracker_mut(entity)?.set_parameter_by_id(id, value.into())
    }

    pub fn set_parameter_by_index(
        &mut self,
        entity: EntityId,
        index: usize,
        value: impl Into<Value>,
    ) -> Result<(), AnimError> {
        self.tracker_mut(entity)?
            .set_parameter_by_index(index, value.into())
    }

    pub fn parameter(&self, entity: EntityId, name: &str) -> Result<&Parameter, AnimError> {
        self.tracker(entity)
            .ok_or_else(|| AnimError::not_found("tracker", entity.to_string()))?
            .parameter(name)
    }

    pub fn current_node_name(&self, entity: EntityId) -> Result<&str, AnimError> {
        let component = self
            .components
            .get(&entity)
            .ok_or_else(|| AnimError::not_found("animation component", entity.to_string()))?;
        let tracker = component
            .tracker
            .as_ref()
            .ok_or_else(|| AnimError::not_found("tracker", entity.to_string()))?;
        let tree = self
            .trees
            .get(component.tree)
            .ok_or_else(|| AnimError::not_found("tree", component.tree_name.clone()))?;
        Ok(tracker.current_node(tree)?.name.as_str())
    }
}
