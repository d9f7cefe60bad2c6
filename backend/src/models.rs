use serde::{Deserialize, Serialize};

use crate::render::Heatmap;

/// Corps de `POST /api/upload`: les trois valeurs fournies par le widget
/// d'upload du navigateur.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct UploadRequest {
    /// Data URI (`data:<mime>;base64,<payload>`), absent tant qu'aucun
    /// fichier n'a été choisi.
    pub contents: Option<String>,
    pub filename: Option<String>,
    pub last_modified: Option<i64>,
}

impl UploadRequest {
    pub fn into_payload(self) -> Option<UploadPayload> {
        let contents = self.contents?;
        Some(UploadPayload {
            contents,
            filename: self.filename.unwrap_or_default(),
            last_modified: self.last_modified,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadPayload {
    pub contents: String,
    pub filename: String,
    pub last_modified: Option<i64>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Empty,
    Predicted,
    Error,
}

/// Les trois sorties affichées par la page, toujours calculées ensemble.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct DigitView {
    pub status: ViewStatus,
    pub summary: Option<String>,
    pub image: Heatmap,
    pub prediction: Option<String>,
    pub label: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: String,
    pub execution_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn timed(mut self, start: std::time::Instant) -> Self {
        self.execution_time_ms = Some(start.elapsed().as_millis() as u64);
        self
    }
}
