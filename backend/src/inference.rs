use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use log::{info, warn};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tract_onnx::prelude::tract_ndarray::ArrayView2;
use tract_onnx::prelude::*;

use crate::error::PipelineError;
use crate::sample::INPUT_LEN;

/// Un classifieur pré-entraîné: un vecteur 1x64 en entrée, un label par ligne
/// en sortie.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: ArrayView2<'_, f32>) -> Result<Vec<i64>, PipelineError>;
}

/// Classifieur exporté au format ONNX (par ex. un modèle scikit-learn passé
/// par skl2onnx, sans ZipMap).
pub struct OnnxClassifier {
    model: TypedRunnableModel<TypedModel>,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P) -> TractResult<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, INPUT_LEN)),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { model })
    }

    fn run(&self, input: ArrayView2<'_, f32>) -> TractResult<Vec<i64>> {
        let tensor = input.to_owned().into_tensor();
        let outputs = self.model.run(tvec!(tensor.into()))?;
        let labels = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("Aucune sortie du modèle"))?;
        labels_from_tensor(labels)
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: ArrayView2<'_, f32>) -> Result<Vec<i64>, PipelineError> {
        self.run(input)
            .map_err(|e| PipelineError::Inference(format!("{e:#}")))
    }
}

/// Interprète la première sortie du graphe comme des labels: entiers tels
/// quels, scores flottants par argmax sur chaque ligne.
fn labels_from_tensor(output: &Tensor) -> TractResult<Vec<i64>> {
    match output.datum_type() {
        DatumType::I64 => Ok(output.as_slice::<i64>()?.to_vec()),
        DatumType::I32 => Ok(output.as_slice::<i32>()?.iter().map(|&v| v as i64).collect()),
        DatumType::F32 => {
            let scores = output.to_array_view::<f32>()?;
            let per_row = scores.shape().last().copied().unwrap_or(1).max(1);
            let flat = scores.iter().copied().collect::<Vec<f32>>();
            if per_row == 1 {
                return Ok(flat.iter().map(|v| v.round() as i64).collect());
            }
            Ok(flat
                .chunks(per_row)
                .map(|row| {
                    row.iter()
                        .enumerate()
                        .fold((0usize, f32::NEG_INFINITY), |best, (i, &s)| {
                            if s > best.1 {
                                (i, s)
                            } else {
                                best
                            }
                        })
                        .0 as i64
                })
                .collect())
        }
        other => anyhow::bail!("Type de sortie non supporté: {:?}", other),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Chargé une fois puis partagé en lecture seule.
    Startup,
    /// Relu depuis le disque à chaque requête.
    PerRequest,
}

impl FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "startup" => Ok(CachePolicy::Startup),
            "per-request" => Ok(CachePolicy::PerRequest),
            other => Err(format!("attendu 'startup' ou 'per-request', reçu '{other}'")),
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CachePolicy::Startup => f.write_str("startup"),
            CachePolicy::PerRequest => f.write_str("per-request"),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub path: String,
    pub input_shape: Vec<usize>,
    pub cache_policy: CachePolicy,
    pub loaded: bool,
}

/// Source du classifieur utilisée par le pipeline.
pub trait ModelProvider: Send + Sync {
    fn classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError>;
    fn info(&self) -> ModelInfo;
}

pub type Loader = fn(&Path) -> Result<Arc<dyn Classifier>, PipelineError>;

fn load_onnx(path: &Path) -> Result<Arc<dyn Classifier>, PipelineError> {
    let classifier = OnnxClassifier::load(path).map_err(|e| PipelineError::ArtifactLoad {
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })?;
    Ok(Arc::new(classifier))
}

/// Modèle lu depuis un fichier, selon la politique de cache choisie.
pub struct ArtifactModel {
    path: PathBuf,
    policy: CachePolicy,
    loader: Loader,
    cached: OnceCell<Arc<dyn Classifier>>,
}

impl ArtifactModel {
    pub fn new(path: impl Into<PathBuf>, policy: CachePolicy) -> Self {
        Self::with_loader(path, policy, load_onnx)
    }

    pub fn with_loader(path: impl Into<PathBuf>, policy: CachePolicy, loader: Loader) -> Self {
        Self {
            path: path.into(),
            policy,
            loader,
            cached: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Arc<dyn Classifier>, PipelineError> {
        if !self.path.is_file() {
            return Err(PipelineError::ArtifactLoad {
                path: self.path.clone(),
                reason: "fichier introuvable".into(),
            });
        }
        (self.loader)(&self.path)
    }

    /// Tente le chargement au démarrage; un échec n'empêche pas le serveur de
    /// démarrer, chaque requête renverra alors l'affichage d'erreur.
    pub fn warm_up(&self) {
        match self.classifier() {
            Ok(_) => info!("✅ Modèle prêt: {} ({})", self.path.display(), self.policy),
            Err(e) => warn!("⚠️ Modèle indisponible au démarrage: {}", e),
        }
    }
}

impl ModelProvider for ArtifactModel {
    fn classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError> {
        match self.policy {
            CachePolicy::Startup => self.cached.get_or_try_init(|| self.load()).cloned(),
            CachePolicy::PerRequest => self.load(),
        }
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            path: self.path.display().to_string(),
            input_shape: vec![1, INPUT_LEN],
            cache_policy: self.policy,
            loaded: self.cached.get().is_some(),
        }
    }
}
