use std::path::PathBuf;

/// Erreurs du pipeline d'inférence. Toutes aboutissent au même affichage
/// côté utilisateur, mais restent distinctes dans les logs et les tests.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("contenu d'upload invalide: {0}")]
    Decode(String),

    #[error("type de fichier non supporté: {0}")]
    UnsupportedFile(String),

    #[error("valeur non numérique: {token:?}")]
    Parse { token: String },

    #[error("forme invalide: {expected} valeurs attendues, {found} trouvées")]
    Shape { expected: usize, found: usize },

    #[error("impossible de charger le modèle {}: {reason}", .path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("échec de l'inférence: {0}")]
    Inference(String),
}

impl PipelineError {
    /// Nom stable utilisé dans les logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode_error",
            PipelineError::UnsupportedFile(_) => "unsupported_file_error",
            PipelineError::Parse { .. } => "parse_error",
            PipelineError::Shape { .. } => "shape_error",
            PipelineError::ArtifactLoad { .. } => "artifact_load_error",
            PipelineError::Inference(_) => "inference_error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} invalide ({value:?}): {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_distinct() {
        let errors = [
            PipelineError::Decode("x".into()),
            PipelineError::UnsupportedFile("a.csv".into()),
            PipelineError::Parse { token: "abc".into() },
            PipelineError::Shape { expected: 64, found: 3 },
            PipelineError::ArtifactLoad {
                path: "model.onnx".into(),
                reason: "absent".into(),
            },
            PipelineError::Inference("boom".into()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn shape_message_mentions_counts() {
        let err = PipelineError::Shape { expected: 64, found: 63 };
        assert_eq!(
            err.to_string(),
            "forme invalide: 64 valeurs attendues, 63 trouvées"
        );
    }
}
