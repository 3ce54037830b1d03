//! Pixel mask selection strategies

use image::{imageops, RgbaImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Largest single-axis Sobel response on 8-bit luma
const SOBEL_MAX: f32 = 4.0 * 255.0;

/// A pixel position, `x` counted from the left and `y` from the top
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PixelCoord {
    pub x: u32,
    pub y: u32,
}

impl PixelCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// How the pixels to hide are chosen
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum MaskStrategy {
    /// Every pixel whose coordinates are both multiples of `spacing`
    UniformGrid { spacing: u32 },
    /// Pixels whose normalised Sobel gradient exceeds `sensitivity`
    EdgeDetection { sensitivity: f32 },
    /// A horizontal and a vertical band through the centre, each
    /// `ceil(max(w, h) / thickness_divisor)` pixels to either side
    CentralCross { thickness_divisor: u32 },
    /// Whole `block_size` squares, each kept with probability `1 / one_in`
    RandomBlock {
        block_size: u32,
        one_in: u32,
        seed: u64,
    },
}

/// Choose the coordinates to hide. Degenerate inputs produce an empty mask.
pub fn select_pixels(image: &RgbaImage, strategy: &MaskStrategy) -> Vec<PixelCoord> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    match *strategy {
        MaskStrategy::UniformGrid { spacing } => uniform_grid(width, height, spacing),
        MaskStrategy::EdgeDetection { sensitivity } => edge_detection(image, sensitivity),
        MaskStrategy::CentralCross { thickness_divisor } => {
            central_cross(width, height, thickness_divisor)
        }
        MaskStrategy::RandomBlock {
            block_size,
            one_in,
            seed,
        } => random_blocks(width, height, block_size, one_in, seed),
    }
}

fn uniform_grid(width: u32, height: u32, spacing: u32) -> Vec<PixelCoord> {
    if spacing == 0 || spacing > width || spacing > height {
        return Vec::new();
    }

    let step = spacing as usize;
    let mut selected = Vec::new();
    for y in (0..height).step_by(step) {
        for x in (0..width).step_by(step) {
            selected.push(PixelCoord::new(x, y));
        }
    }
    selected
}

fn edge_detection(image: &RgbaImage, sensitivity: f32) -> Vec<PixelCoord> {
    let gray = imageops::grayscale(image);
    let (width, height) = gray.dimensions();

    // clamp-to-edge sampling
    let at = |x: i64, y: i64| -> f32 {
        let cx = x.clamp(0, width as i64 - 1) as u32;
        let cy = y.clamp(0, height as i64 - 1) as u32;
        gray.get_pixel(cx, cy).0[0] as f32
    };

    let mut selected = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let (xi, yi) = (x as i64, y as i64);
            let gx = (at(xi + 1, yi - 1) + 2.0 * at(xi + 1, yi) + at(xi + 1, yi + 1))
                - (at(xi - 1, yi - 1) + 2.0 * at(xi - 1, yi) + at(xi - 1, yi + 1));
            let gy = (at(xi - 1, yi + 1) + 2.0 * at(xi, yi + 1) + at(xi + 1, yi + 1))
                - (at(xi - 1, yi - 1) + 2.0 * at(xi, yi - 1) + at(xi + 1, yi - 1));

            let magnitude = ((gx * gx + gy * gy).sqrt() / SOBEL_MAX).min(1.0);
            if magnitude > sensitivity {
                selected.push(PixelCoord::new(x, y));
            }
        }
    }
    selected
}

fn central_cross(width: u32, height: u32, thickness_divisor: u32) -> Vec<PixelCoord> {
    if thickness_divisor == 0 {
        return Vec::new();
    }

    let thickness = (width.max(height) as f64 / thickness_divisor as f64).ceil();
    let centre_x = width as f64 / 2.0;
    let centre_y = height as f64 / 2.0;

    let mut selected = Vec::new();
    for y in 0..height {
        let in_row_band = (y as f64 - centre_y).abs() < thickness;
        for x in 0..width {
            if in_row_band || (x as f64 - centre_x).abs() < thickness {
                selected.push(PixelCoord::new(x, y));
            }
        }
    }
    selected
}

fn random_blocks(width: u32, height: u32, block_size: u32, one_in: u32, seed: u64) -> Vec<PixelCoord> {
    if block_size == 0 || one_in == 0 || block_size > width || block_size > height {
        return Vec::new();
    }

    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut selected = Vec::new();

    // only complete blocks are candidates
    for block_y in 0..height / block_size {
        for block_x in 0..width / block_size {
            if !rng.gen_ratio(1, one_in) {
                continue;
            }
            for y in block_y * block_size..(block_y + 1) * block_size {
                for x in block_x * block_size..(block_x + 1) * block_size {
                    selected.push(PixelCoord::new(x, y));
                }
            }
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    fn white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
    }

    fn split_black_white(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn test_uniform_grid_selects_corners() {
        let selected = select_pixels(&white(4, 4), &MaskStrategy::UniformGrid { spacing: 3 });
        assert_eq!(
            selected,
            vec![
                PixelCoord::new(0, 0),
                PixelCoord::new(3, 0),
                PixelCoord::new(0, 3),
                PixelCoord::new(3, 3),
            ]
        );
    }

    #[test]
    fn test_uniform_grid_oversized_spacing_is_empty() {
        let image = white(4, 4);
        assert!(select_pixels(&image, &MaskStrategy::UniformGrid { spacing: 5 }).is_empty());
        assert!(select_pixels(&image, &MaskStrategy::UniformGrid { spacing: 0 }).is_empty());
    }

    #[test]
    fn test_zero_sized_image_is_empty() {
        let empty = RgbaImage::new(0, 0);
        let strategies = [
            MaskStrategy::UniformGrid { spacing: 1 },
            MaskStrategy::EdgeDetection { sensitivity: 0.0 },
            MaskStrategy::CentralCross {
                thickness_divisor: 1,
            },
            MaskStrategy::RandomBlock {
                block_size: 1,
                one_in: 1,
                seed: 0,
            },
        ];
        for strategy in &strategies {
            assert!(select_pixels(&empty, strategy).is_empty());
        }
    }

    #[test]
    fn test_edge_detection_finds_the_boundary() {
        let selected = select_pixels(
            &split_black_white(4, 4),
            &MaskStrategy::EdgeDetection { sensitivity: 0.7 },
        );
        assert_eq!(selected.len(), 8);
        assert!(selected.iter().all(|p| p.x == 1 || p.x == 2));
    }

    #[test]
    fn test_edge_detection_ignores_flat_images() {
        let selected = select_pixels(&white(8, 8), &MaskStrategy::EdgeDetection { sensitivity: 0.0 });
        assert!(selected.is_empty());
    }

    #[test]
    fn test_central_cross() {
        let selected = select_pixels(
            &white(10, 10),
            &MaskStrategy::CentralCross {
                thickness_divisor: 10,
            },
        );
        // one column and one row through (5, 5)
        assert_eq!(selected.len(), 19);
        assert!(selected.iter().all(|p| p.x == 5 || p.y == 5));
        assert!(selected.contains(&PixelCoord::new(5, 5)));
    }

    #[test]
    fn test_random_block_full_probability_covers_complete_blocks() {
        let selected = select_pixels(
            &white(10, 10),
            &MaskStrategy::RandomBlock {
                block_size: 3,
                one_in: 1,
                seed: 99,
            },
        );
        assert_eq!(selected.len(), 81);
        assert!(selected.iter().all(|p| p.x < 9 && p.y < 9));
    }

    #[test]
    fn test_random_block_oversized_is_empty() {
        let strategy = MaskStrategy::RandomBlock {
            block_size: 5,
            one_in: 1,
            seed: 1,
        };
        assert!(select_pixels(&white(4, 4), &strategy).is_empty());
    }

    #[test]
    fn test_strategy_serde_is_tagged() {
        let strategy = MaskStrategy::UniformGrid { spacing: 3 };
        let json = serde_json::to_string(&strategy).unwrap();
        assert_eq!(json, r#"{"strategy":"uniform-grid","spacing":3}"#);
        assert_eq!(serde_json::from_str::<MaskStrategy>(&json).unwrap(), strategy);
    }

    proptest! {
        #[test]
        fn proptest_random_block_is_deterministic(
            seed in any::<u64>(),
            width in 0u32..40,
            height in 0u32..40,
            block_size in 1u32..8,
        ) {
            let image = white(width, height);
            let strategy = MaskStrategy::RandomBlock { block_size, one_in: 3, seed };
            prop_assert_eq!(select_pixels(&image, &strategy), select_pixels(&image, &strategy));
        }

        #[test]
        fn proptest_selection_stays_in_bounds(
            width in 0u32..24,
            height in 0u32..24,
            spacing in 0u32..6,
            divisor in 0u32..6,
        ) {
            let image = split_black_white(width, height);
            let strategies = [
                MaskStrategy::UniformGrid { spacing },
                MaskStrategy::EdgeDetection { sensitivity: 0.5 },
                MaskStrategy::CentralCross { thickness_divisor: divisor },
                MaskStrategy::RandomBlock { block_size: spacing, one_in: 2, seed: 7 },
            ];
            for strategy in &strategies {
                for p in select_pixels(&image, strategy) {
                    prop_assert!(p.x < width && p.y < height);
                }
            }
        }
    }
}
