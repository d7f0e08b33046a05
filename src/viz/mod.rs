mod cluster;
mod pca;

use std::path::Path;

use image::RgbImage;
use ndarray::{Array2, Array3};

use crate::config::{Enhancement, VisualizerConfig};
use crate::error::PipelineError;
use crate::model::layers::bilinear_weights;
use crate::viz::pca::{normalize_unit, pca_project};

/// Projects per-pixel spectrogram embeddings onto a video frame.
///
/// `embeddings` has one row per spatial position (row-major over a square
/// grid, e.g. 196 rows for a 14x14 map); `frame` is channels-first
/// `(3, H, W)` in any scale. Writes one image of three side-by-side panels
/// (frame, overlay, blend) to `output_path`.
pub fn render_sound_clusters(
    embeddings: &Array2<f32>,
    frame: &Array3<f32>,
    output_path: &Path,
    cfg: &VisualizerConfig,
) -> Result<(), PipelineError> {
    let (n, _d) = embeddings.dim();
    let grid = (n as f64).sqrt() as usize;
    if grid * grid != n || n == 0 {
        return Err(PipelineError::invalid_input(format!(
            "embedding rows ({n}) do not form a square spatial grid"
        )));
    }
    if frame.dim().0 != 3 {
        return Err(PipelineError::invalid_input(format!(
            "frame must be (3, H, W), got {:?}",
            frame.dim()
        )));
    }

    let mut x = embeddings.clone();
    normalize_unit(&mut x);

    let mut features = pca_project(&x, 3)?;
    normalize_unit(&mut features);

    match cfg.enhancement {
        Enhancement::None => {}
        Enhancement::PixelEmphasis {
            threshold,
            attenuation,
            gamma,
        } => {
            features.mapv_inplace(|v| if v < threshold { v * attenuation } else { v });
            normalize_unit(&mut features);
            features.mapv_inplace(|v| v.max(0.0).powf(gamma));
            normalize_unit(&mut features);
        }
        Enhancement::ClusterTint => {
            features = cluster::cluster_tint(&features)?;
            normalize_unit(&mut features);
        }
    }

    let overlay = Array3::from_shape_vec((grid, grid, 3), features.into_raw_vec_and_offset().0)
        .map_err(|e| PipelineError::runtime("reshape overlay grid", e))?;

    // Channels-first frame to (H, W, 3) for display, normalized to [0, 1].
    let (fh, fw) = (frame.dim().1, frame.dim().2);
    let mut frame_display = Array3::<f32>::zeros((fh, fw, 3));
    for c in 0..3 {
        for y in 0..fh {
            for xcol in 0..fw {
                frame_display[[y, xcol, c]] = frame[[c, y, xcol]];
            }
        }
    }
    normalize_unit_3(&mut frame_display);

    let overlay_resized = bilinear_resize_hwc(&overlay, fh, fw);

    let alpha = cfg.alpha;
    let mut blended = Array3::<f32>::zeros((fh, fw, 3));
    for ((idx, &f), &o) in frame_display
        .indexed_iter()
        .zip(overlay_resized.iter())
    {
        blended[idx] = ((1.0 - alpha) * f + alpha * o).clamp(0.0, 1.0);
    }

    let panels = [&frame_display, &overlay_resized, &blended];
    let mut img = RgbImage::new((3 * fw) as u32, fh as u32);
    for (p, panel) in panels.iter().enumerate() {
        for y in 0..fh {
            for xcol in 0..fw {
                let pixel = image::Rgb([
                    to_u8(panel[[y, xcol, 0]]),
                    to_u8(panel[[y, xcol, 1]]),
                    to_u8(panel[[y, xcol, 2]]),
                ]);
                img.put_pixel((p * fw + xcol) as u32, y as u32, pixel);
            }
        }
    }
    img.save(output_path)
        .map_err(|e| PipelineError::runtime("write visualization", e))?;

    tracing::info!(path = %output_path.display(), grid, "sound-cluster visualization written");
    Ok(())
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn normalize_unit_3(a: &mut Array3<f32>) {
    let min = a.iter().copied().fold(f32::INFINITY, f32::min);
    let max = a.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min + pca::NORM_EPS;
    a.mapv_inplace(|v| (v - min) / range);
}

/// Bilinear resize of an `(H, W, C)` array via separable 1-D interpolation.
fn bilinear_resize_hwc(src: &Array3<f32>, out_h: usize, out_w: usize) -> Array3<f32> {
    let (h, w, c) = src.dim();
    let row_w = bilinear_weights(out_h, h);
    let col_w = bilinear_weights(out_w, w);

    let mut rows = Array3::<f32>::zeros((out_h, w, c));
    for o in 0..out_h {
        for i in 0..h {
            let wgt = row_w[o * h + i];
            if wgt == 0.0 {
                continue;
            }
            for j in 0..w {
                for ch in 0..c {
                    rows[[o, j, ch]] += wgt * src[[i, j, ch]];
                }
            }
        }
    }

    let mut out = Array3::<f32>::zeros((out_h, out_w, c));
    for p in 0..out_w {
        for j in 0..w {
            let wgt = col_w[p * w + j];
            if wgt == 0.0 {
                continue;
            }
            for o in 0..out_h {
                for ch in 0..c {
                    out[[o, p, ch]] += wgt * rows[[o, j, ch]];
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array3};

    use super::*;
    use crate::config::{Enhancement, VisualizerConfig};

    fn scratch_png(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "soundpixel_rs_viz_{tag}_{}.png",
            std::process::id()
        ))
    }

    fn toy_frame() -> Array3<f32> {
        let mut frame = Array3::<f32>::zeros((3, 8, 8));
        for c in 0..3 {
            for y in 0..8 {
                for x in 0..8 {
                    // Values outside [0, 1] on purpose; rendering normalizes.
                    frame[[c, y, x]] = (c + y + x) as f32 * 17.0 - 30.0;
                }
            }
        }
        frame
    }

    fn toy_embeddings(n: usize, d: usize) -> Array2<f32> {
        Array2::from_shape_fn((n, d), |(i, j)| ((i * 31 + j * 7) % 13) as f32 * 0.21)
    }

    #[test]
    fn render_writes_three_panel_image() {
        let path = scratch_png("panels");
        let embeddings = toy_embeddings(16, 32);
        let frame = toy_frame();
        render_sound_clusters(&embeddings, &frame, &path, &VisualizerConfig::default())
            .expect("render");
        let img = image::open(&path).expect("readable png");
        assert_eq!(img.width(), 24);
        assert_eq!(img.height(), 8);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn constant_embeddings_do_not_divide_by_zero() {
        let path = scratch_png("constant");
        let embeddings = Array2::from_elem((16, 32), 0.7f32);
        let frame = toy_frame();
        render_sound_clusters(&embeddings, &frame, &path, &VisualizerConfig::default())
            .expect("constant input must render");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn cluster_tint_variant_renders() {
        let path = scratch_png("tint");
        let embeddings = toy_embeddings(16, 32);
        let frame = toy_frame();
        let cfg = VisualizerConfig {
            enhancement: Enhancement::ClusterTint,
            alpha: 0.6,
        };
        render_sound_clusters(&embeddings, &frame, &path, &cfg).expect("render");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn non_square_grid_is_rejected() {
        let path = scratch_png("nonsquare");
        let embeddings = toy_embeddings(15, 32);
        let frame = toy_frame();
        let err = render_sound_clusters(&embeddings, &frame, &path, &VisualizerConfig::default())
            .expect_err("15 rows are not a square grid");
        assert!(err.to_string().contains("square"));
    }

    #[test]
    fn wrong_frame_layout_is_rejected() {
        let path = scratch_png("layout");
        let embeddings = toy_embeddings(16, 32);
        let frame = Array3::<f32>::zeros((8, 8, 3));
        assert!(render_sound_clusters(
            &embeddings,
            &frame,
            &path,
            &VisualizerConfig::default()
        )
        .is_err());
    }

    #[test]
    fn resize_preserves_constant_images() {
        let src = Array3::from_elem((4, 4, 3), 0.25f32);
        let out = bilinear_resize_hwc(&src, 9, 7);
        assert_eq!(out.dim(), (9, 7, 3));
        for &v in out.iter() {
            assert!((v - 0.25).abs() < 1e-5);
        }
    }
}
