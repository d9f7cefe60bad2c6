//! Upload décodé -> échantillon -> prédiction -> trois sorties d'affichage.

use log::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::inference::ModelProvider;
use crate::models::{DigitView, UploadPayload, UploadRequest, ViewStatus};
use crate::render::Heatmap;
use crate::sample::DigitSample;
use crate::upload::{check_filename, decode_data_uri};

pub const ERROR_MESSAGE: &str = "There was an error processing this file.";

/// État de la page avant tout upload.
pub fn initial_view() -> DigitView {
    DigitView {
        status: ViewStatus::Empty,
        summary: None,
        image: Heatmap::blank(),
        prediction: None,
        label: None,
    }
}

/// Affichage unique pour toutes les erreurs du pipeline.
pub fn error_view() -> DigitView {
    DigitView {
        status: ViewStatus::Error,
        summary: Some(ERROR_MESSAGE.to_string()),
        image: Heatmap::blank(),
        prediction: None,
        label: None,
    }
}

pub fn prediction_message(label: i64) -> String {
    format!("This looks like a {label}!")
}

/// Point d'entrée du handler: sans contenu, on renvoie l'état initial.
pub fn handle_upload(request: UploadRequest, models: &dyn ModelProvider) -> DigitView {
    match request.into_payload() {
        Some(payload) => predict_digit(&payload, models),
        None => initial_view(),
    }
}

pub fn predict_digit(payload: &UploadPayload, models: &dyn ModelProvider) -> DigitView {
    match try_predict(payload, models) {
        Ok(view) => view,
        Err(e @ PipelineError::UnsupportedFile(_)) => {
            warn!("Fichier refusé ({}): {}", e.kind(), e);
            error_view()
        }
        Err(e) => {
            error!("Erreur de traitement ({}) pour {:?}: {}", e.kind(), payload.filename, e);
            error_view()
        }
    }
}

fn try_predict(
    payload: &UploadPayload,
    models: &dyn ModelProvider,
) -> Result<DigitView, PipelineError> {
    if let Some(ts) = payload.last_modified {
        debug!("last_modified={} ignoré", ts);
    }

    let decoded = decode_data_uri(&payload.contents)?;
    check_filename(&payload.filename)?;

    debug!("Upload décodé: {} octets ({})", decoded.bytes.len(), decoded.mime_type);

    let sample = DigitSample::parse(&decoded.bytes)?;
    if sample.is_empty() {
        warn!("Fichier {:?} sans aucune valeur", payload.filename);
    }
    let input = sample.input_row()?;

    let classifier = models.classifier()?;
    let labels = classifier.predict(input.view())?;
    let label = labels
        .first()
        .copied()
        .ok_or_else(|| PipelineError::Inference("aucun label renvoyé".into()))?;

    let grid = sample.grid()?;
    info!(
        "Prédiction réussie: {:?} ({} valeurs) -> {}",
        payload.filename,
        sample.len(),
        label
    );

    Ok(DigitView {
        status: ViewStatus::Predicted,
        summary: Some(sample.summary()),
        image: Heatmap::from_grid(&grid),
        prediction: Some(prediction_message(label)),
        label: Some(label),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use tract_onnx::prelude::tract_ndarray::ArrayView2;

    use crate::inference::tests::FixedClassifier;
    use crate::inference::{CachePolicy, Classifier, ModelInfo};

    /// Fournisseur de test: un label fixe, ou un modèle absent.
    pub(crate) struct StubModels {
        pub label: Option<i64>,
        pub calls: AtomicUsize,
    }

    impl StubModels {
        pub(crate) fn predicting(label: i64) -> Self {
            Self { label: Some(label), calls: AtomicUsize::new(0) }
        }

        pub(crate) fn missing() -> Self {
            Self { label: None, calls: AtomicUsize::new(0) }
        }
    }

    impl ModelProvider for StubModels {
        fn classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.label {
                Some(label) => Ok(Arc::new(FixedClassifier(label))),
                None => Err(PipelineError::ArtifactLoad {
                    path: "model.onnx".into(),
                    reason: "fichier introuvable".into(),
                }),
            }
        }

        fn info(&self) -> ModelInfo {
            ModelInfo {
                path: "model.onnx".into(),
                input_shape: vec![1, 64],
                cache_policy: CachePolicy::Startup,
                loaded: self.label.is_some(),
            }
        }
    }

    /// Somme des valeurs modulo 10: vérifie que le classifieur reçoit bien
    /// le vecteur lu.
    struct SumClassifier;

    impl Classifier for SumClassifier {
        fn predict(&self, input: ArrayView2<'_, f32>) -> Result<Vec<i64>, PipelineError> {
            Ok(vec![input.sum() as i64 % 10])
        }
    }

    struct SumModels;

    impl ModelProvider for SumModels {
        fn classifier(&self) -> Result<Arc<dyn Classifier>, PipelineError> {
            Ok(Arc::new(SumClassifier))
        }

        fn info(&self) -> ModelInfo {
            StubModels::missing().info()
        }
    }

    pub(crate) fn data_uri(text: &str) -> String {
        format!("data:text/plain;base64,{}", STANDARD.encode(text))
    }

    pub(crate) fn digit_text(values: &[f32]) -> String {
        values
            .chunks(8)
            .map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn payload(text: &str, filename: &str) -> UploadPayload {
        UploadPayload {
            contents: data_uri(text),
            filename: filename.to_string(),
            last_modified: Some(1_700_000_000_000),
        }
    }

    #[test]
    fn valid_sample_is_predicted() {
        let values: Vec<f32> = (0..64).map(|i| (i % 17) as f32).collect();
        let models = StubModels::predicting(3);
        let view = predict_digit(&payload(&digit_text(&values), "three.txt"), &models);

        assert_eq!(view.status, ViewStatus::Predicted);
        assert_eq!(view.prediction.as_deref(), Some("This looks like a 3!"));
        assert_eq!(view.label, Some(3));
        let flat: Vec<f32> = view.image.matrix.iter().flatten().copied().collect();
        assert_eq!(flat, values);
        assert_eq!(view.image.matrix.len(), 8);
        assert!(view.summary.unwrap().starts_with("[[0, 1, 2, 3, 4, 5, 6, 7],"));
    }

    #[test]
    fn classifier_sees_the_parsed_vector() {
        let mut values = vec![0.0f32; 64];
        values[10] = 4.0;
        values[63] = 3.0;
        let view = predict_digit(&payload(&digit_text(&values), "a.txt"), &SumModels);
        assert_eq!(view.prediction.as_deref(), Some("This looks like a 7!"));
    }

    #[test]
    fn all_zeros_scenario() {
        let models = StubModels::predicting(0);
        let view = predict_digit(&payload(&digit_text(&[0.0; 64]), "zero.txt"), &models);
        assert_eq!(view.image.matrix, vec![vec![0.0; 8]; 8]);
        assert_eq!(view.prediction.as_deref(), Some("This looks like a 0!"));
        let summary = view.summary.unwrap();
        assert!(summary.chars().all(|c| "[]0, \n".contains(c)));
    }

    #[test]
    fn wrong_token_counts_give_the_error_view() {
        for count in [0usize, 1, 63, 65, 640] {
            let text = vec!["1"; count].join(" ");
            let models = StubModels::predicting(1);
            let view = predict_digit(&payload(&text, "bad.txt"), &models);
            assert_eq!(view, error_view());
            assert_eq!(models.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn undecodable_payload_gives_the_error_view() {
        let models = StubModels::predicting(1);
        for contents in ["no comma here", "data:text/plain;base64,%%%%", "text/plain,MA=="] {
            let payload = UploadPayload {
                contents: contents.to_string(),
                filename: "a.txt".into(),
                last_modified: None,
            };
            assert_eq!(predict_digit(&payload, &models), error_view());
        }
    }

    #[test]
    fn non_numeric_text_gives_the_error_view() {
        let view = predict_digit(&payload("zéro un deux", "a.txt"), &StubModels::predicting(1));
        assert_eq!(view, error_view());
    }

    #[test]
    fn unsupported_extension_gives_the_error_view() {
        let text = digit_text(&[1.0; 64]);
        let models = StubModels::predicting(1);
        let view = predict_digit(&payload(&text, "digit.csv"), &models);
        assert_eq!(view, error_view());
        assert_eq!(models.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_model_gives_the_error_view() {
        let models = StubModels::missing();
        let view = predict_digit(&payload(&digit_text(&[2.0; 64]), "a.txt"), &models);
        assert_eq!(view, error_view());
    }

    #[test]
    fn error_view_matches_initial_image() {
        let error = error_view();
        let initial = initial_view();
        assert_eq!(error.image, initial.image);
        assert_eq!(error.summary.as_deref(), Some(ERROR_MESSAGE));
        assert!(error.prediction.is_none());
        assert!(initial.summary.is_none());
        assert!(initial.prediction.is_none());
        assert_eq!(initial.image.range, [0.0, 16.0]);
        assert_eq!(initial.image.color_scale, "Greys");
    }

    #[test]
    fn no_contents_is_the_initial_view() {
        let request = UploadRequest {
            contents: None,
            filename: None,
            last_modified: None,
        };
        assert_eq!(handle_upload(request, &StubModels::predicting(5)), initial_view());
    }

    #[test]
    fn identical_uploads_give_identical_views() {
        let models = StubModels::predicting(8);
        let p = payload(&digit_text(&[5.5; 64]), "same.txt");
        assert_eq!(predict_digit(&p, &models), predict_digit(&p, &models));
    }
}
