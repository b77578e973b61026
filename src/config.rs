//! Experiment configuration for motion-policy pretraining
//!
//! A configuration is read once from a YAML (or JSON) document, validated
//! field by field and frozen. Every group rejects unknown keys so a typo in an
//! experiment file fails loudly instead of silently falling back to a default.
//! Overrides never mutate a [`Configuration`]; they patch the source document
//! and run the whole load again.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Batch size forced by `mintest`
pub const MINTEST_BATCH_SIZE: usize = 10;

/// Seed used when the experiment does not pin one
pub const DEFAULT_SEED: u64 = 42;

/// Gradient clipping threshold used when the experiment does not set one
pub const DEFAULT_GRADIENT_CLIP_VAL: f64 = 1.0;

/// Longest accepted validation cadence (one year)
pub const MAX_VAL_EVERY_N_MINUTES: f64 = 365.0 * 24.0 * 60.0;

/// Metric monitored for best-checkpoint selection and plateau detection
pub const DEFAULT_MONITOR_METRIC: &str = "avg_val_collision_rate";

/// Model-side hyperparameters: optimisation schedule and loss inputs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrainingModelParameters {
    /// Learning-rate floor after warmup
    pub min_lr: f64,
    /// Peak learning rate reached at the end of warmup
    pub max_lr: f64,
    /// Number of linear warmup steps
    pub warmup_steps: u64,
    /// Per-step multiplicative decay after warmup. `None` holds at `max_lr`.
    #[serde(default)]
    pub decay_rate: Option<f64>,
    /// Weight of the collision loss term
    pub collision_loss_weight: f64,
    /// Weight of the point-match loss term
    pub point_match_loss_weight: f64,
    /// Margin fed to the collision loss
    pub collision_loss_margin: f64,
    /// Axis-aligned box bounding the point-cloud input
    pub pc_bounds: PcBounds,
    /// Fraction of each batch drawn as hard negatives. `None` disables mining.
    #[serde(default)]
    pub hard_negative_ratio: Option<f64>,
}

/// Axis-aligned 3-D bounding box, serialized as `[[x, y, z], [x, y, z]]`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(from = "[[f64; 3]; 2]", into = "[[f64; 3]; 2]")]
pub struct PcBounds {
    /// Lower corner
    pub min: [f64; 3],
    /// Upper corner
    pub max: [f64; 3],
}

impl From<[[f64; 3]; 2]> for PcBounds {
    fn from([min, max]: [[f64; 3]; 2]) -> Self {
        Self { min, max }
    }
}

impl From<PcBounds> for [[f64; 3]; 2] {
    fn from(bounds: PcBounds) -> Self {
        [bounds.min, bounds.max]
    }
}

impl PcBounds {
    /// Create a box from its two corners
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Whether a point lies inside the box (boundary included)
    pub fn contains(&self, point: [f64; 3]) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// Map a point into `[-1, 1]^3` relative to the box. Degenerate axes map to 0.
    pub fn normalize(&self, point: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for axis in 0..3 {
            let extent = self.max[axis] - self.min[axis];
            if extent > 0.0 {
                out[axis] = 2.0 * (point[axis] - self.min[axis]) / extent - 1.0;
            }
        }
        out
    }

    /// Keep only the points inside the box
    pub fn filter<'a>(&'a self, points: &'a [[f64; 3]]) -> impl Iterator<Item = [f64; 3]> + 'a {
        points.iter().copied().filter(move |p| self.contains(*p))
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.min.iter().chain(self.max.iter()).any(|v| !v.is_finite()) {
            return Err(Error::validation(format!("{field} must contain only finite numbers")));
        }
        for axis in 0..3 {
            if self.min[axis] > self.max[axis] {
                return Err(Error::validation(format!(
                    "{field}: lower corner {:?} exceeds upper corner {:?} on axis {axis}",
                    self.min, self.max
                )));
            }
        }
        Ok(())
    }
}

/// Data-module parameters handed to the external data loader
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DataModuleParameters {
    /// Root of the dataset directory
    pub data_dir: PathBuf,
    /// Trajectory group used for training
    pub train_trajectory_key: String,
    /// Trajectory group used for validation
    pub val_trajectory_key: String,
    /// Points sampled from the robot surface
    pub num_robot_points: usize,
    /// Points sampled from the obstacles
    pub num_obstacle_points: usize,
    /// Points sampled from the target end effector
    pub num_target_points: usize,
    /// Std-dev of the joint noise applied to training samples
    pub random_scale: f64,
    /// Skip the pretraining validation split
    #[serde(default)]
    pub ignore_pretrain_data: bool,
}

/// Parameters visible to both the model and the data module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SharedParameters {
    /// Gripper prismatic joint opening
    pub prismatic_joint: f64,
    /// Number of future configurations supervised per sample
    pub action_chunk_length: usize,
}

/// Tuning for the plateau detector behind early stopping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct EarlyStoppingParameters {
    /// Validation passes without improvement before the plateau signal fires
    pub patience: usize,
    /// Minimum decrease that counts as an improvement
    pub min_delta: f64,
    /// Metric reported by the validation pass (lower is better)
    pub monitor: String,
}

impl Default for EarlyStoppingParameters {
    fn default() -> Self {
        Self {
            patience: 10,
            min_delta: 0.0,
            monitor: DEFAULT_MONITOR_METRIC.to_string(),
        }
    }
}

/// `resume_training` block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResumeTraining {
    /// Checkpoint to continue from
    pub checkpoint_path: PathBuf,
}

/// The experiment document as written on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawConfiguration {
    pub training_model_parameters: TrainingModelParameters,
    pub data_module_parameters: DataModuleParameters,
    pub shared_parameters: SharedParameters,
    pub experiment_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub num_workers: Option<usize>,
    pub checkpoint_interval: u64,
    pub val_every_n_minutes: f64,
    pub gpus: u32,
    pub train_batch_size: usize,
    pub val_batch_size: usize,
    pub max_epochs: usize,
    pub use_simple_model: bool,
    pub stop_early: bool,
    pub save_checkpoint_dir: PathBuf,
    #[serde(default)]
    pub mintest: bool,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub gradient_clip_val: Option<f64>,
    #[serde(default)]
    pub load_checkpoint_path: Option<PathBuf>,
    #[serde(default)]
    pub resume_training: Option<ResumeTraining>,
    #[serde(default)]
    pub early_stopping: Option<EarlyStoppingParameters>,
}

/// Which policy network the framework should build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Reduced network used for quick experiments
    Simple,
    /// Full pretraining transformer
    Full,
}

/// How the run's weights are initialised
#[derive(Debug, Clone, PartialEq)]
pub enum WarmStart {
    /// Fresh initialisation
    Fresh,
    /// Load weights only, start counters from zero
    LoadWeights(PathBuf),
    /// Restore weights, optimizer and run state
    Resume(PathBuf),
}

/// Resolved run-level settings
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub experiment_name: String,
    pub description: String,
    pub num_workers: usize,
    /// Step interval between periodic checkpoints
    pub checkpoint_interval: u64,
    pub val_every_n_minutes: f64,
    pub gpus: u32,
    pub train_batch_size: usize,
    pub val_batch_size: usize,
    pub max_epochs: usize,
    pub model_variant: ModelVariant,
    pub stop_early: bool,
    pub save_checkpoint_dir: PathBuf,
    pub mintest: bool,
    pub seed: u64,
    pub gradient_clip_val: f64,
    pub warm_start: WarmStart,
    pub early_stopping: EarlyStoppingParameters,
}

impl RunParameters {
    /// Directory that receives this experiment's checkpoints
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.save_checkpoint_dir.join(&self.experiment_name)
    }

    /// Validation cadence in seconds
    pub fn val_interval_secs(&self) -> f64 {
        self.val_every_n_minutes * 60.0
    }
}

/// Where a configuration is read from
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// A file; `.json` files are parsed as JSON, everything else as YAML
    File(PathBuf),
    /// An in-memory YAML document
    Yaml(String),
    /// An in-memory JSON document
    Json(String),
}

/// Validated, immutable experiment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    training_model: TrainingModelParameters,
    data_module: DataModuleParameters,
    shared: SharedParameters,
    run: RunParameters,
    source: RawConfiguration,
}

impl Configuration {
    /// Load and validate a configuration
    pub fn load(source: ConfigSource) -> Result<Self> {
        let raw: RawConfiguration = match source {
            ConfigSource::File(path) => return Self::from_file(path),
            ConfigSource::Yaml(text) => serde_yaml::from_str(&text)
                .map_err(|e| Error::validation(format!("invalid configuration: {e}")))?,
            ConfigSource::Json(text) => serde_json::from_str(&text)
                .map_err(|e| Error::validation(format!("invalid configuration: {e}")))?,
        };
        ConfigurationBuilder::from_raw(raw).build()
    }

    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        debug!("Read configuration from {}", path.display());

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Load a YAML document
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Self::load(ConfigSource::Yaml(text.to_string()))
    }

    /// Load a JSON document
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::load(ConfigSource::Json(text.to_string()))
    }

    /// Start a builder
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Builder seeded with this configuration's document
    pub fn to_builder(&self) -> ConfigurationBuilder {
        ConfigurationBuilder::from_raw(self.source.clone())
    }

    pub fn training_model_parameters(&self) -> &TrainingModelParameters {
        &self.training_model
    }

    pub fn data_module_parameters(&self) -> &DataModuleParameters {
        &self.data_module
    }

    pub fn shared_parameters(&self) -> &SharedParameters {
        &self.shared
    }

    pub fn run(&self) -> &RunParameters {
        &self.run
    }

    /// The document this configuration was resolved from
    pub fn source(&self) -> &RawConfiguration {
        &self.source
    }

    /// Serialize the source document back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.source)?)
    }

    /// Produce a new configuration with dotted-path overrides applied.
    ///
    /// Values are parsed as YAML scalars, so `"5"` is a number and `"null"`
    /// clears an optional field.
    pub fn with_overrides<I, K, V>(&self, overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut tree = serde_yaml::to_value(&self.source)?;
        for (key, value) in overrides {
            let value: Value = serde_yaml::from_str(value.as_ref()).map_err(|e| {
                Error::validation(format!("override for `{}` is not valid YAML: {e}", key.as_ref()))
            })?;
            set_path(&mut tree, key.as_ref(), value)?;
        }
        let raw: RawConfiguration = serde_yaml::from_value(tree)
            .map_err(|e| Error::validation(format!("invalid configuration after overrides: {e}")))?;
        ConfigurationBuilder::from_raw(raw).build()
    }
}

/// Split a `key.path=value` override
pub fn parse_override(assignment: &str) -> Result<(String, String)> {
    match assignment.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(Error::validation(format!(
            "override `{assignment}` must have the form key.path=value"
        ))),
    }
}

fn set_path(tree: &mut Value, path: &str, value: Value) -> Result<()> {
    if path.split('.').any(str::is_empty) {
        return Err(Error::validation(format!("override key `{path}` is malformed")));
    }

    let mut node = tree;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        let map = node.as_mapping_mut().ok_or_else(|| {
            Error::validation(format!(
                "override `{path}`: `{part}` does not address a parameter group"
            ))
        })?;
        let key = Value::String(part.to_string());
        if parts.peek().is_none() {
            map.insert(key, value);
            return Ok(());
        }
        node = map.entry(key).or_insert(Value::Null);
    }
    Ok(())
}

/// Validating constructor for [`Configuration`]
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    training_model: Option<TrainingModelParameters>,
    data_module: Option<DataModuleParameters>,
    shared: Option<SharedParameters>,
    experiment_name: Option<String>,
    description: String,
    num_workers: Option<usize>,
    checkpoint_interval: Option<u64>,
    val_every_n_minutes: Option<f64>,
    gpus: Option<u32>,
    train_batch_size: Option<usize>,
    val_batch_size: Option<usize>,
    max_epochs: Option<usize>,
    use_simple_model: Option<bool>,
    stop_early: Option<bool>,
    save_checkpoint_dir: Option<PathBuf>,
    mintest: bool,
    seed: Option<u64>,
    gradient_clip_val: Option<f64>,
    load_checkpoint_path: Option<PathBuf>,
    resume_training: Option<ResumeTraining>,
    early_stopping: Option<EarlyStoppingParameters>,
}

impl ConfigurationBuilder {
    /// Seed a builder with every field of a parsed document
    pub fn from_raw(raw: RawConfiguration) -> Self {
        Self {
            training_model: Some(raw.training_model_parameters),
            data_module: Some(raw.data_module_parameters),
            shared: Some(raw.shared_parameters),
            experiment_name: Some(raw.experiment_name),
            description: raw.description,
            num_workers: raw.num_workers,
            checkpoint_interval: Some(raw.checkpoint_interval),
            val_every_n_minutes: Some(raw.val_every_n_minutes),
            gpus: Some(raw.gpus),
            train_batch_size: Some(raw.train_batch_size),
            val_batch_size: Some(raw.val_batch_size),
            max_epochs: Some(raw.max_epochs),
            use_simple_model: Some(raw.use_simple_model),
            stop_early: Some(raw.stop_early),
            save_checkpoint_dir: Some(raw.save_checkpoint_dir),
            mintest: raw.mintest,
            seed: raw.seed,
            gradient_clip_val: raw.gradient_clip_val,
            load_checkpoint_path: raw.load_checkpoint_path,
            resume_training: raw.resume_training,
            early_stopping: raw.early_stopping,
        }
    }

    pub fn training_model_parameters(mut self, params: TrainingModelParameters) -> Self {
        self.training_model = Some(params);
        self
    }

    pub fn data_module_parameters(mut self, params: DataModuleParameters) -> Self {
        self.data_module = Some(params);
        self
    }

    pub fn shared_parameters(mut self, params: SharedParameters) -> Self {
        self.shared = Some(params);
        self
    }

    pub fn experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn num_workers(mut self, workers: usize) -> Self {
        self.num_workers = Some(workers);
        self
    }

    pub fn checkpoint_interval(mut self, steps: u64) -> Self {
        self.checkpoint_interval = Some(steps);
        self
    }

    pub fn val_every_n_minutes(mut self, minutes: f64) -> Self {
        self.val_every_n_minutes = Some(minutes);
        self
    }

    pub fn gpus(mut self, gpus: u32) -> Self {
        self.gpus = Some(gpus);
        self
    }

    pub fn train_batch_size(mut self, size: usize) -> Self {
        self.train_batch_size = Some(size);
        self
    }

    pub fn val_batch_size(mut self, size: usize) -> Self {
        self.val_batch_size = Some(size);
        self
    }

    pub fn max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = Some(epochs);
        self
    }

    pub fn use_simple_model(mut self, simple: bool) -> Self {
        self.use_simple_model = Some(simple);
        self
    }

    pub fn stop_early(mut self, enabled: bool) -> Self {
        self.stop_early = Some(enabled);
        self
    }

    pub fn save_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_checkpoint_dir = Some(dir.into());
        self
    }

    pub fn mintest(mut self, enabled: bool) -> Self {
        self.mintest = enabled;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn gradient_clip_val(mut self, value: f64) -> Self {
        self.gradient_clip_val = Some(value);
        self
    }

    pub fn load_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_checkpoint_path = Some(path.into());
        self
    }

    pub fn resume_training(mut self, checkpoint_path: impl Into<PathBuf>) -> Self {
        self.resume_training = Some(ResumeTraining {
            checkpoint_path: checkpoint_path.into(),
        });
        self
    }

    pub fn early_stopping(mut self, params: EarlyStoppingParameters) -> Self {
        self.early_stopping = Some(params);
        self
    }

    /// Check every field and freeze the result
    pub fn build(self) -> Result<Configuration> {
        let raw = RawConfiguration {
            training_model_parameters: required(self.training_model, "training_model_parameters")?,
            data_module_parameters: required(self.data_module, "data_module_parameters")?,
            shared_parameters: required(self.shared, "shared_parameters")?,
            experiment_name: required(self.experiment_name, "experiment_name")?,
            description: self.description,
            num_workers: self.num_workers,
            checkpoint_interval: required(self.checkpoint_interval, "checkpoint_interval")?,
            val_every_n_minutes: required(self.val_every_n_minutes, "val_every_n_minutes")?,
            gpus: required(self.gpus, "gpus")?,
            train_batch_size: required(self.train_batch_size, "train_batch_size")?,
            val_batch_size: required(self.val_batch_size, "val_batch_size")?,
            max_epochs: required(self.max_epochs, "max_epochs")?,
            use_simple_model: required(self.use_simple_model, "use_simple_model")?,
            stop_early: required(self.stop_early, "stop_early")?,
            save_checkpoint_dir: required(self.save_checkpoint_dir, "save_checkpoint_dir")?,
            mintest: self.mintest,
            seed: self.seed,
            gradient_clip_val: self.gradient_clip_val,
            load_checkpoint_path: self.load_checkpoint_path,
            resume_training: self.resume_training,
            early_stopping: self.early_stopping,
        };

        validate_training_model(&raw.training_model_parameters)?;
        validate_data_module(&raw.data_module_parameters)?;
        validate_shared(&raw.shared_parameters)?;
        validate_run(&raw)?;

        let warm_start = match (&raw.load_checkpoint_path, &raw.resume_training) {
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "load_checkpoint_path and resume_training are mutually exclusive",
                ))
            }
            (Some(path), None) => WarmStart::LoadWeights(path.clone()),
            (None, Some(resume)) => WarmStart::Resume(resume.checkpoint_path.clone()),
            (None, None) => WarmStart::Fresh,
        };

        let (train_batch_size, val_batch_size, num_workers) = if raw.mintest {
            (MINTEST_BATCH_SIZE, MINTEST_BATCH_SIZE, 0)
        } else {
            (
                raw.train_batch_size,
                raw.val_batch_size,
                raw.num_workers.unwrap_or_else(num_cpus::get),
            )
        };

        let run = RunParameters {
            experiment_name: raw.experiment_name.clone(),
            description: raw.description.clone(),
            num_workers,
            checkpoint_interval: raw.checkpoint_interval,
            val_every_n_minutes: raw.val_every_n_minutes,
            gpus: raw.gpus,
            train_batch_size,
            val_batch_size,
            max_epochs: raw.max_epochs,
            model_variant: if raw.use_simple_model {
                ModelVariant::Simple
            } else {
                ModelVariant::Full
            },
            stop_early: raw.stop_early,
            save_checkpoint_dir: raw.save_checkpoint_dir.clone(),
            mintest: raw.mintest,
            seed: raw.seed.unwrap_or(DEFAULT_SEED),
            gradient_clip_val: raw.gradient_clip_val.unwrap_or(DEFAULT_GRADIENT_CLIP_VAL),
            warm_start,
            early_stopping: raw.early_stopping.clone().unwrap_or_default(),
        };

        Ok(Configuration {
            training_model: raw.training_model_parameters.clone(),
            data_module: raw.data_module_parameters.clone(),
            shared: raw.shared_parameters.clone(),
            run,
            source: raw,
        })
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::validation(format!("missing required field `{field}`")))
}

fn ensure(condition: bool, field: &str, requirement: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::validation(format!("{field} {requirement}")))
    }
}

fn positive(value: f64, field: &str) -> Result<()> {
    ensure(value.is_finite() && value > 0.0, field, "must be a finite number > 0")
}

fn non_negative(value: f64, field: &str) -> Result<()> {
    ensure(value.is_finite() && value >= 0.0, field, "must be a finite number >= 0")
}

fn validate_training_model(params: &TrainingModelParameters) -> Result<()> {
    const GROUP: &str = "training_model_parameters";

    positive(params.min_lr, &format!("{GROUP}.min_lr"))?;
    positive(params.max_lr, &format!("{GROUP}.max_lr"))?;
    ensure(
        params.min_lr <= params.max_lr,
        &format!("{GROUP}.min_lr"),
        "must not exceed max_lr",
    )?;

    if let Some(rate) = params.decay_rate {
        ensure(
            rate.is_finite() && rate > 0.0 && rate <= 1.0,
            &format!("{GROUP}.decay_rate"),
            "must be in (0, 1] or null",
        )?;
    }

    non_negative(params.collision_loss_weight, &format!("{GROUP}.collision_loss_weight"))?;
    non_negative(params.point_match_loss_weight, &format!("{GROUP}.point_match_loss_weight"))?;
    non_negative(params.collision_loss_margin, &format!("{GROUP}.collision_loss_margin"))?;
    params.pc_bounds.validate(&format!("{GROUP}.pc_bounds"))?;

    if let Some(ratio) = params.hard_negative_ratio {
        ensure(
            (0.0..=1.0).contains(&ratio),
            &format!("{GROUP}.hard_negative_ratio"),
            "must be in [0, 1] or null",
        )?;
    }
    Ok(())
}

fn validate_data_module(params: &DataModuleParameters) -> Result<()> {
    const GROUP: &str = "data_module_parameters";

    ensure(
        !params.data_dir.as_os_str().is_empty(),
        &format!("{GROUP}.data_dir"),
        "must not be empty",
    )?;
    ensure(
        !params.train_trajectory_key.is_empty(),
        &format!("{GROUP}.train_trajectory_key"),
        "must not be empty",
    )?;
    ensure(
        !params.val_trajectory_key.is_empty(),
        &format!("{GROUP}.val_trajectory_key"),
        "must not be empty",
    )?;
    ensure(params.num_robot_points > 0, &format!("{GROUP}.num_robot_points"), "must be > 0")?;
    ensure(params.num_obstacle_points > 0, &format!("{GROUP}.num_obstacle_points"), "must be > 0")?;
    ensure(params.num_target_points > 0, &format!("{GROUP}.num_target_points"), "must be > 0")?;
    non_negative(params.random_scale, &format!("{GROUP}.random_scale"))
}

fn validate_shared(params: &SharedParameters) -> Result<()> {
    non_negative(params.prismatic_joint, "shared_parameters.prismatic_joint")?;
    ensure(
        params.action_chunk_length > 0,
        "shared_parameters.action_chunk_length",
        "must be > 0",
    )
}

fn validate_run(raw: &RawConfiguration) -> Result<()> {
    ensure(!raw.experiment_name.trim().is_empty(), "experiment_name", "must not be empty")?;
    ensure(
        !raw.experiment_name.contains(['/', '\\']),
        "experiment_name",
        "must not contain path separators",
    )?;
    ensure(
        !matches!(raw.experiment_name.as_str(), "." | ".."),
        "experiment_name",
        "must not be `.` or `..`",
    )?;
    ensure(raw.checkpoint_interval > 0, "checkpoint_interval", "must be > 0")?;
    positive(raw.val_every_n_minutes, "val_every_n_minutes")?;
    ensure(
        raw.val_every_n_minutes <= MAX_VAL_EVERY_N_MINUTES,
        "val_every_n_minutes",
        &format!("must not exceed {MAX_VAL_EVERY_N_MINUTES}"),
    )?;
    ensure(raw.gpus >= 1, "gpus", "must be >= 1")?;
    ensure(raw.train_batch_size > 0, "train_batch_size", "must be > 0")?;
    ensure(raw.val_batch_size > 0, "val_batch_size", "must be > 0")?;
    ensure(raw.max_epochs > 0, "max_epochs", "must be > 0")?;
    ensure(
        !raw.save_checkpoint_dir.as_os_str().is_empty(),
        "save_checkpoint_dir",
        "must not be empty",
    )?;
    if let Some(clip) = raw.gradient_clip_val {
        positive(clip, "gradient_clip_val")?;
    }
    if let Some(early) = &raw.early_stopping {
        ensure(early.patience > 0, "early_stopping.patience", "must be > 0")?;
        non_negative(early.min_delta, "early_stopping.min_delta")?;
        ensure(!early.monitor.is_empty(), "early_stopping.monitor", "must not be empty")?;
    }
    Ok(())
}
