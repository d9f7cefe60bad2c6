use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, Engine};
use base64::alphabet;

use crate::error::PipelineError;

// Le navigateur envoie du base64 standard; on tolère l'absence de padding.
const DATA_URI_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const ACCEPTED_EXTENSION: &str = ".txt";

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedUpload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Décode un data URI `data:<mime>[;base64],<payload>`.
pub fn decode_data_uri(contents: &str) -> Result<DecodedUpload, PipelineError> {
    let (header, payload) = contents
        .split_once(',')
        .ok_or_else(|| PipelineError::Decode("séparateur ',' manquant".into()))?;

    let header = header
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| PipelineError::Decode(format!("en-tête inattendu: {header:?}")))?;
    let mime_type = header.split(';').next().unwrap_or_default().to_string();

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = DATA_URI_ENGINE
        .decode(compact.as_bytes())
        .map_err(|e| PipelineError::Decode(e.to_string()))?;

    Ok(DecodedUpload { mime_type, bytes })
}

/// Seuls les fichiers `.txt` sont acceptés.
pub fn check_filename(filename: &str) -> Result<(), PipelineError> {
    let lower = filename.to_ascii_lowercase();
    if lower.len() > ACCEPTED_EXTENSION.len() && lower.ends_with(ACCEPTED_EXTENSION) {
        Ok(())
    } else {
        Err(PipelineError::UnsupportedFile(filename.to_string()))
    }
}
