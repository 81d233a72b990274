//! Edge detection with hysteresis thresholds
//!
//! Separable Sobel (3, 5 or 7 taps) or Scharr derivatives with replicated
//! borders, a choice of L1 or L2 magnitude, four-direction non-maximum
//! suppression and 8-connected hysteresis. Output pixels are 255 on edges and
//! 0 elsewhere.

use image::{GrayImage, Luma};

use super::params::{EdgeParams, GradientNorm, KernelSize};

const TAN_22_5_DEG: f32 = 0.414_213_56;
const TAN_67_5_DEG: f32 = 2.414_213_6;

/// Smoothing and derivative taps for one kernel choice
fn kernel_taps(kernel: KernelSize) -> (&'static [f32], &'static [f32]) {
    match kernel {
        KernelSize::Auto => (&[3.0, 10.0, 3.0], &[-1.0, 0.0, 1.0]),
        KernelSize::Sobel(5) => (&[1.0, 4.0, 6.0, 4.0, 1.0], &[-1.0, -2.0, 0.0, 2.0, 1.0]),
        KernelSize::Sobel(7) => (
            &[1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0],
            &[-1.0, -4.0, -5.0, 0.0, 5.0, 4.0, 1.0],
        ),
        KernelSize::Sobel(_) => (&[1.0, 2.0, 1.0], &[-1.0, 0.0, 1.0]),
    }
}

/// Per-pixel derivatives of a grayscale image
struct Gradients {
    width: usize,
    height: usize,
    gx: Vec<f32>,
    gy: Vec<f32>,
}

fn convolve_rows(src: &[f32], width: usize, height: usize, taps: &[f32]) -> Vec<f32> {
    let radius = (taps.len() / 2) as isize;
    let last = width as isize - 1;
    let mut out = vec![0.0f32; src.len()];

    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut sum = 0.0;
            for (i, tap) in taps.iter().enumerate() {
                let sx = (x as isize + i as isize - radius).clamp(0, last) as usize;
                sum += row[sx] * tap;
            }
            out[y * width + x] = sum;
        }
    }

    out
}

fn convolve_cols(src: &[f32], width: usize, height: usize, taps: &[f32]) -> Vec<f32> {
    let radius = (taps.len() / 2) as isize;
    let last = height as isize - 1;
    let mut out = vec![0.0f32; src.len()];

    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for (i, tap) in taps.iter().enumerate() {
                let sy = (y as isize + i as isize - radius).clamp(0, last) as usize;
                sum += src[sy * width + x] * tap;
            }
            out[y * width + x] = sum;
        }
    }

    out
}

fn gradients(image: &GrayImage, kernel: KernelSize) -> Gradients {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let src: Vec<f32> = image.as_raw().iter().map(|&v| v as f32).collect();
    let (smooth, derivative) = kernel_taps(kernel);

    let gx = convolve_cols(&convolve_rows(&src, width, height, derivative), width, height, smooth);
    let gy = convolve_cols(&convolve_rows(&src, width, height, smooth), width, height, derivative);

    Gradients { width, height, gx, gy }
}

/// Run the edge detector over a grayscale image
pub fn detect_edges(image: &GrayImage, params: &EdgeParams) -> GrayImage {
    let mut edges = GrayImage::new(image.width(), image.height());
    if image.width() == 0 || image.height() == 0 {
        return edges;
    }

    let grad = gradients(image, params.kernel());
    let (w, h) = (grad.width, grad.height);

    let magnitude: Vec<f32> = grad
        .gx
        .iter()
        .zip(&grad.gy)
        .map(|(&gx, &gy)| match params.norm() {
            GradientNorm::L1 => gx.abs() + gy.abs(),
            GradientNorm::L2 => (gx * gx + gy * gy).sqrt(),
        })
        .collect();

    let mag_at = |x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0.0
        } else {
            magnitude[y as usize * w + x as usize]
        }
    };

    let low = params.low() as f32;
    let high = params.high() as f32;

    // 0 = suppressed, 1 = weak candidate, 2 = strong
    let mut state = vec![0u8; w * h];
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let m = magnitude[idx];
            if m <= low {
                continue;
            }

            let (xi, yi) = (x as isize, y as isize);
            let ax = grad.gx[idx].abs();
            let ay = grad.gy[idx].abs();

            let is_max = if ay <= ax * TAN_22_5_DEG {
                m > mag_at(xi - 1, yi) && m >= mag_at(xi + 1, yi)
            } else if ay > ax * TAN_67_5_DEG {
                m > mag_at(xi, yi - 1) && m >= mag_at(xi, yi + 1)
            } else {
                let s = if grad.gx[idx] * grad.gy[idx] < 0.0 { -1 } else { 1 };
                m > mag_at(xi - s, yi - 1) && m > mag_at(xi + s, yi + 1)
            };

            if !is_max {
                continue;
            }

            if m > high {
                state[idx] = 2;
                stack.push(idx);
            } else {
                state[idx] = 1;
            }
        }
    }

    // Promote weak pixels connected to strong ones
    while let Some(idx) = stack.pop() {
        let (x, y) = ((idx % w) as isize, (idx / w) as isize);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w as isize || ny >= h as isize {
                    continue;
                }
                let nidx = ny as usize * w + nx as usize;
                if state[nidx] == 1 {
                    state[nidx] = 2;
                    stack.push(nidx);
                }
            }
        }
    }

    for (idx, s) in state.iter().enumerate() {
        if *s == 2 {
            edges.put_pixel((idx % w) as u32, (idx / w) as u32, Luma([255]));
        }
    }

    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_image(width: u32, height: u32, split: u32, level: u8) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| if x < split { Luma([0]) } else { Luma([level]) })
    }

    fn edge_count(image: &GrayImage) -> usize {
        image.pixels().filter(|p| p.0[0] == 255).count()
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let image = GrayImage::from_pixel(32, 32, Luma([128]));
        let params = EdgeParams::sobel3(100.0, 50.0, GradientNorm::L2);
        assert_eq!(edge_count(&detect_edges(&image, &params)), 0);
    }

    #[test]
    fn test_vertical_step_gives_single_column() {
        let image = step_image(20, 20, 10, 200);
        let params = EdgeParams::sobel3(250.0, 125.0, GradientNorm::L2);
        let edges = detect_edges(&image, &params);

        for y in 0..20 {
            assert_eq!(edges.get_pixel(9, y).0[0], 255, "row {}", y);
            assert_eq!(edges.get_pixel(10, y).0[0], 0, "row {}", y);
        }
        assert_eq!(edge_count(&edges), 20);
    }

    #[test]
    fn test_weak_step_below_threshold() {
        // Sobel response of a 20-level step is 80
        let image = step_image(20, 20, 10, 20);
        let params = EdgeParams::sobel3(250.0, 125.0, GradientNorm::L2);
        assert_eq!(edge_count(&detect_edges(&image, &params)), 0);
    }

    #[test]
    fn test_larger_kernels_find_the_step() {
        let image = step_image(24, 24, 12, 200);
        for size in [5u8, 7] {
            let params = EdgeParams::new(250.0, 125.0, GradientNorm::L1, KernelSize::Sobel(size)).unwrap();
            let edges = detect_edges(&image, &params);
            assert!(edge_count(&edges) >= 24, "kernel {}", size);
            assert!(edges.enumerate_pixels().all(|(x, _, p)| p.0[0] == 0 || (10..=13).contains(&x)));
        }
    }

    #[test]
    fn test_scharr_kernel() {
        let image = step_image(20, 20, 10, 200);
        let params = EdgeParams::new(250.0, 125.0, GradientNorm::L2, KernelSize::Auto).unwrap();
        assert_eq!(edge_count(&detect_edges(&image, &params)), 20);
    }

    #[test]
    fn test_rectangle_outline_is_closed() {
        let mut image = GrayImage::new(40, 40);
        for y in 10..30 {
            for x in 10..30 {
                image.put_pixel(x, y, Luma([255]));
            }
        }
        let params = EdgeParams::sobel3(200.0, 100.0, GradientNorm::L2);
        let edges = detect_edges(&image, &params);

        assert!(edge_count(&edges) > 60);
        assert_eq!(edges.get_pixel(20, 20).0[0], 0);
        assert_eq!(edges.get_pixel(2, 2).0[0], 0);
    }
}
