//! JSON run configuration.
//!
//! A [`SimulationConfig`] describes a complete closed-loop run: camera,
//! emitter population, generator settings, analyzers and controller. Every
//! section has defaults, so a file only needs the fields it changes.

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use shared::CustomParameters;
use simulator::{
    BlinkingKinetics, Camera, CameraConfig, CameraError, FluorophoreProperties, GeneratorConfig,
    GeneratorError, ImageGenerator, PhotophysicsError,
};
use thiserror::Error;

use crate::analysis::{
    AnalyzerSet, EvaluationAlgorithm, EvaluationError, SpotCounter, ThresholdRegions,
};
use crate::control::{ControlError, ControlLawConfig, FeedbackController};
use crate::tester::{AlgorithmTester, TesterError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("camera: {0}")]
    Camera(#[from] CameraError),
    #[error("fluorophores: {0}")]
    Photophysics(#[from] PhotophysicsError),
    #[error("generator: {0}")]
    Generator(#[from] GeneratorError),
    #[error("controller: {0}")]
    Control(#[from] ControlError),
    #[error("analyzer: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("{0}")]
    Tester(#[from] TesterError),
    #[error("primary analyzer {0:?} is not among the configured analyzers")]
    MissingPrimary(String),
}

/// Emitter population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluorophoreConfig {
    /// Photons per frame while ON
    pub signal: f64,
    /// Photons per frame in every state
    pub background: f64,
    pub kinetics: BlinkingKinetics,
    /// Emitters placed uniformly at random when `positions` is absent
    pub count: usize,
    /// Explicit (column, row) positions in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<(f64, f64)>>,
}

impl Default for FluorophoreConfig {
    fn default() -> Self {
        Self {
            signal: 1000.0,
            background: 5.0,
            kinetics: BlinkingKinetics::default(),
            count: 100,
            positions: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    SpotCounter,
    ThresholdRegions,
}

impl AnalyzerKind {
    pub fn create(self, name: impl Into<String>) -> Box<dyn EvaluationAlgorithm> {
        match self {
            AnalyzerKind::SpotCounter => Box::new(SpotCounter::named(name)),
            AnalyzerKind::ThresholdRegions => Box::new(ThresholdRegions::named(name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub name: String,
    pub kind: AnalyzerKind,
    /// Overrides applied on top of the analyzer's defaults
    #[serde(default)]
    pub parameters: CustomParameters,
}

impl AnalyzerConfig {
    pub fn build(&self) -> Result<Box<dyn EvaluationAlgorithm>, EvaluationError> {
        let mut analyzer = self.kind.create(self.name.as_str());
        analyzer.set_custom_parameters(&self.parameters)?;
        Ok(analyzer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Target value of the primary analyzer's signal
    pub setpoint: f64,
    pub law: ControlLawConfig,
    /// Name of the analyzer that drives the controller
    pub primary: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            setpoint: 10.0,
            law: ControlLawConfig::default(),
            primary: "spots".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub camera: CameraConfig,
    pub fluorophores: FluorophoreConfig,
    pub generator: GeneratorConfig,
    pub controller: ControllerConfig,
    pub analyzers: Vec<AnalyzerConfig>,
    /// Ticks to run
    pub frames: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            fluorophores: FluorophoreConfig::default(),
            generator: GeneratorConfig::default(),
            controller: ControllerConfig::default(),
            analyzers: vec![
                AnalyzerConfig {
                    name: "spots".to_string(),
                    kind: AnalyzerKind::SpotCounter,
                    parameters: CustomParameters::new().with("threshold", 130),
                },
                AnalyzerConfig {
                    name: "regions".to_string(),
                    kind: AnalyzerKind::ThresholdRegions,
                    parameters: CustomParameters::new().with("threshold", 130),
                },
            ],
            frames: 1000,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!("Loaded simulation config from {}", path.display());
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn build_generator(&self) -> Result<ImageGenerator, ConfigError> {
        let camera = Camera::new(self.camera.clone())?;
        let fl = &self.fluorophores;
        let properties = FluorophoreProperties::new(fl.signal, fl.background, fl.kinetics)?;

        let generator = match &fl.positions {
            Some(positions) => {
                ImageGenerator::new(camera, properties, positions, self.generator.clone())?
            }
            None => ImageGenerator::with_random_population(
                camera,
                properties,
                fl.count,
                self.generator.clone(),
            )?,
        };
        Ok(generator)
    }

    /// Assemble a ready-to-run closed loop.
    ///
    /// # Errors
    /// Any invalid section, duplicate analyzer names, or a primary analyzer
    /// name that matches none of `analyzers`.
    pub fn build(&self) -> Result<AlgorithmTester, ConfigError> {
        let generator = self.build_generator()?;

        let mut primary = None;
        let mut secondary = AnalyzerSet::new();
        for analyzer_config in &self.analyzers {
            let analyzer = analyzer_config.build()?;
            if analyzer_config.name == self.controller.primary && primary.is_none() {
                primary = Some(analyzer);
            } else {
                secondary.insert(analyzer)?;
            }
        }
        let primary =
            primary.ok_or_else(|| ConfigError::MissingPrimary(self.controller.primary.clone()))?;

        let law = self.controller.law.build()?;
        let controller = FeedbackController::new(primary, law, self.controller.setpoint)?;
        Ok(AlgorithmTester::new(generator, controller, secondary)?)
    }
}
