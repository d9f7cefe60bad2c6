//! Rendu de l'échantillon en carte de chaleur en niveaux de gris.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{GrayImage, ImageFormat, Luma};
use log::warn;
use serde::Serialize;
use tract_onnx::prelude::tract_ndarray::Array2;

use crate::sample::GRID_SIDE;

/// Échelle d'intensité fixe des échantillons.
pub const INTENSITY_RANGE: [f32; 2] = [0.0, 16.0];
pub const COLOR_SCALE: &str = "Greys";
/// Taille en pixels d'une case de la grille dans le PNG.
pub const CELL_PIXELS: u32 = 32;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Heatmap {
    pub matrix: Vec<Vec<f32>>,
    pub range: [f32; 2],
    pub color_scale: &'static str,
    /// `data:image/png;base64,...`
    pub png: Option<String>,
}

impl Heatmap {
    pub fn from_grid(grid: &Array2<f32>) -> Self {
        let matrix: Vec<Vec<f32>> = grid.rows().into_iter().map(|row| row.to_vec()).collect();
        let png = match encode_png(&matrix) {
            Ok(png) => Some(png),
            Err(e) => {
                warn!("Rendu PNG impossible: {}", e);
                None
            }
        };

        Heatmap {
            matrix,
            range: INTENSITY_RANGE,
            color_scale: COLOR_SCALE,
            png,
        }
    }

    /// Image 8x8 entièrement nulle.
    pub fn blank() -> Self {
        Self::from_grid(&Array2::zeros((GRID_SIDE, GRID_SIDE)))
    }
}

/// Échelle "Greys": le minimum est blanc, le maximum noir.
pub fn greys(value: f32) -> u8 {
    let [low, high] = INTENSITY_RANGE;
    if value.is_nan() {
        return u8::MAX;
    }
    let t = ((value - low) / (high - low)).clamp(0.0, 1.0);
    (255.0 - (t * 255.0).round()) as u8
}

fn encode_png(matrix: &[Vec<f32>]) -> Result<String, image::ImageError> {
    let height = matrix.len() as u32;
    let width = matrix.first().map_or(0, |row| row.len()) as u32;

    let img = GrayImage::from_fn(width * CELL_PIXELS, height * CELL_PIXELS, |x, y| {
        let value = matrix[(y / CELL_PIXELS) as usize][(x / CELL_PIXELS) as usize];
        Luma([greys(value)])
    });

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(buf.into_inner())))
}
