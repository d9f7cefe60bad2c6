//! Lecture d'un échantillon 8x8 à partir du texte uploadé.

use tract_onnx::prelude::tract_ndarray::{Array1, Array2};

use crate::error::PipelineError;

pub const GRID_SIDE: usize = 8;
pub const INPUT_LEN: usize = GRID_SIDE * GRID_SIDE;

#[derive(Debug, Clone, PartialEq)]
pub struct DigitSample {
    values: Vec<f32>,
    /// Nombre de valeurs sur chaque ligne non vide du fichier.
    rows: Vec<usize>,
}

impl DigitSample {
    /// Nombres flottants séparés par des espaces; `#` commente la fin de ligne.
    pub fn parse(bytes: &[u8]) -> Result<Self, PipelineError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| PipelineError::Decode(format!("texte non UTF-8: {e}")))?;

        let mut values = Vec::new();
        let mut rows = Vec::new();
        for line in text.lines() {
            let data = line.split('#').next().unwrap_or_default();
            let before = values.len();
            for token in data.split_whitespace() {
                let value = token.parse::<f32>().map_err(|_| PipelineError::Parse {
                    token: token.to_string(),
                })?;
                values.push(value);
            }
            if values.len() > before {
                rows.push(values.len() - before);
            }
        }

        Ok(Self { values, rows })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Vecteur ligne 1x64 attendu par le classifieur.
    pub fn input_row(&self) -> Result<Array2<f32>, PipelineError> {
        self.reshape(1, INPUT_LEN)
    }

    /// Matrice 8x8 pour l'affichage.
    pub fn grid(&self) -> Result<Array2<f32>, PipelineError> {
        self.reshape(GRID_SIDE, GRID_SIDE)
    }

    fn reshape(&self, rows: usize, cols: usize) -> Result<Array2<f32>, PipelineError> {
        Array2::from_shape_vec((rows, cols), self.values.clone()).map_err(|_| {
            PipelineError::Shape {
                expected: rows * cols,
                found: self.values.len(),
            }
        })
    }

    /// Représentation textuelle du tableau lu, avec la disposition du fichier
    /// quand toutes les lignes ont la même largeur.
    pub fn summary(&self) -> String {
        let uniform = self
            .rows
            .first()
            .filter(|width| self.rows.len() > 1 && self.rows.iter().all(|w| w == *width));

        match uniform {
            Some(&width) => {
                match Array2::from_shape_vec((self.rows.len(), width), self.values.clone()) {
                    Ok(matrix) => matrix.to_string(),
                    Err(_) => Array1::from_vec(self.values.clone()).to_string(),
                }
            }
            None => Array1::from_vec(self.values.clone()).to_string(),
        }
    }
}
