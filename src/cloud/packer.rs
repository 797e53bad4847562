//! Spiral placement of tokens on a bounded canvas.
//!
//! Tokens are placed one at a time, largest first. Each starts at the canvas
//! center and walks outward along an Archimedean spiral until its box clears
//! every placed box grown by the padding. A token that never finds room is
//! left out of the result and reported as a [`LayoutExhaustion`].

use super::mapper::VisualToken;
use crate::config::CloudConfig;
use crate::error::LayoutExhaustion;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Radians advanced per spiral step.
const ANGLE_STEP: f64 = 0.1;
/// Radius gained per radian.
const SPIRAL_SPACING: f64 = 2.0;
/// Average glyph advance relative to the font size.
const DEFAULT_CHAR_ASPECT: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn bounds(&self) -> BoundingBox {
        BoundingBox::centered(0.0, 0.0, self.width, self.height)
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(800.0, 400.0)
    }
}

/// Axis-aligned box in canvas coordinates, origin at the canvas center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl BoundingBox {
    pub fn centered(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self {
            left: cx - width / 2.0,
            top: cy - height / 2.0,
            right: cx + width / 2.0,
            bottom: cy + height / 2.0,
        }
    }

    pub fn expanded(&self, by: f64) -> Self {
        Self {
            left: self.left - by,
            top: self.top - by,
            right: self.right + by,
            bottom: self.bottom + by,
        }
    }

    /// Overlap with positive area. Shared edges do not count.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.left >= self.left
            && other.right <= self.right
            && other.top >= self.top
            && other.bottom <= self.bottom
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedToken {
    pub token: VisualToken,
    /// Center of the token relative to the canvas center.
    pub x: f64,
    pub y: f64,
    /// Degrees, one of the packer's rotation choices.
    pub rotation: i32,
    /// Extent after rotation.
    pub width: f64,
    pub height: f64,
}

impl PlacedToken {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::centered(self.x, self.y, self.width, self.height)
    }

    pub fn is_vertical(&self) -> bool {
        self.rotation.rem_euclid(180) == 90
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackResult {
    pub placed: Vec<PlacedToken>,
    pub dropped: Vec<LayoutExhaustion>,
}

impl PackResult {
    pub fn is_complete(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Where rotations come from. Seeded picks are uniform over the choices;
/// without a seed the choices are cycled in order.
enum RotationPicker {
    Seeded(StdRng),
    Alternating(usize),
}

impl RotationPicker {
    fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => RotationPicker::Seeded(StdRng::seed_from_u64(seed)),
            None => RotationPicker::Alternating(0),
        }
    }

    fn pick(&mut self, choices: &[i32]) -> i32 {
        if choices.is_empty() {
            return 0;
        }
        match self {
            RotationPicker::Seeded(rng) => choices[rng.random_range(0..choices.len())],
            RotationPicker::Alternating(next) => {
                let choice = choices[*next % choices.len()];
                *next += 1;
                choice
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpiralPacker {
    pub canvas: CanvasSize,
    pub rotations: Vec<i32>,
    pub padding: f64,
    pub seed: Option<u64>,
    pub max_steps: usize,
    pub char_aspect: f64,
}

impl Default for SpiralPacker {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            rotations: vec![0, 90],
            padding: 5.0,
            seed: None,
            max_steps: 4000,
            char_aspect: DEFAULT_CHAR_ASPECT,
        }
    }
}

impl SpiralPacker {
    pub fn from_config(config: &CloudConfig) -> Self {
        Self {
            canvas: CanvasSize::new(config.width, config.height),
            rotations: config.rotations.clone(),
            padding: config.padding.max(0.0),
            seed: config.seed,
            max_steps: config.max_spiral_steps,
            char_aspect: DEFAULT_CHAR_ASPECT,
        }
    }

    /// Unrotated text extent at the token's font size.
    pub fn measure(&self, token: &VisualToken) -> (f64, f64) {
        let chars = token.text.chars().count() as f64;
        (chars * token.font_size * self.char_aspect, token.font_size)
    }

    pub fn pack(&self, tokens: &[VisualToken]) -> PackResult {
        let mut order: Vec<&VisualToken> = tokens.iter().collect();
        // Stable, so equal sizes keep input order.
        order.sort_by(|a, b| b.font_size.total_cmp(&a.font_size));

        let canvas = self.canvas.bounds();
        let mut picker = RotationPicker::new(self.seed);
        let mut result = PackResult::default();

        for token in order {
            let rotation = picker.pick(&self.rotations);
            let (w, h) = rotated_extent(self.measure(token), rotation);

            match self.place(w, h, &canvas, &result.placed) {
                Ok((x, y)) => result.placed.push(PlacedToken {
                    token: token.clone(),
                    x,
                    y,
                    rotation,
                    width: w,
                    height: h,
                }),
                Err(attempts) => {
                    tracing::debug!(text = %token.text, attempts, "token left out of cloud");
                    result.dropped.push(LayoutExhaustion {
                        text: token.text.clone(),
                        attempts,
                    });
                }
            }
        }

        tracing::debug!(
            placed = result.placed.len(),
            dropped = result.dropped.len(),
            "cloud layout finished"
        );
        result
    }

    /// Walks the spiral for a `w`×`h` box. Returns the center on success or the
    /// number of positions tried on failure.
    fn place(
        &self,
        w: f64,
        h: f64,
        canvas: &BoundingBox,
        placed: &[PlacedToken],
    ) -> Result<(f64, f64), usize> {
        if !(w.is_finite() && h.is_finite()) || w > canvas.width() || h > canvas.height() {
            return Err(0);
        }

        let eccentricity = canvas.width() / canvas.height();
        // Past this radius every spiral point is outside the canvas.
        let max_radius = (canvas.width().powi(2) + canvas.height().powi(2)).sqrt() / 2.0;

        let mut attempts = 0;
        for step in 0..self.max_steps {
            let theta = step as f64 * ANGLE_STEP;
            let radius = SPIRAL_SPACING * theta;
            if radius * eccentricity.min(1.0) > max_radius {
                break;
            }

            let x = eccentricity * radius * theta.cos();
            let y = radius * theta.sin();
            attempts += 1;

            let candidate = BoundingBox::centered(x, y, w, h);
            if !canvas.contains_box(&candidate) {
                continue;
            }

            let collides = placed
                .iter()
                .any(|p| p.bounds().expanded(self.padding).intersects(&candidate));
            if !collides {
                return Ok((x, y));
            }
        }

        Err(attempts)
    }
}

fn rotated_extent((w, h): (f64, f64), rotation: i32) -> (f64, f64) {
    match rotation.rem_euclid(180) {
        0 => (w, h),
        90 => (h, w),
        _ => {
            let rad = (rotation as f64).to_radians();
            let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
            (w * cos + h * sin, w * sin + h * cos)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::mapper::NEUTRAL;

    fn token(text: &str, size: f64) -> VisualToken {
        VisualToken {
            text: text.to_string(),
            font_size: size,
            color: NEUTRAL,
            mentions: (size * 10.0) as u64,
            sentiment: 0.0,
        }
    }

    fn assert_no_overlap(result: &PackResult, padding: f64) {
        for (i, a) in result.placed.iter().enumerate() {
            for b in result.placed.iter().skip(i + 1) {
                assert!(
                    !a.bounds().expanded(padding).intersects(&b.bounds()),
                    "{} overlaps {}",
                    a.token.text,
                    b.token.text
                );
            }
        }
    }

    #[test]
    fn test_empty_input() {
        let result = SpiralPacker::default().pack(&[]);
        assert!(result.placed.is_empty());
        assert!(result.dropped.is_empty());
    }

    #[test]
    fn test_single_token_at_center() {
        let result = SpiralPacker::default().pack(&[token("AAPL", 100.0)]);
        assert_eq!(result.placed.len(), 1);
        let placed = &result.placed[0];
        assert_eq!((placed.x, placed.y), (0.0, 0.0));
        assert_eq!(placed.rotation, 0);
    }

    #[test]
    fn test_rotation_swaps_extent() {
        let packer = SpiralPacker {
            rotations: vec![90],
            ..SpiralPacker::default()
        };
        let result = packer.pack(&[token("TSLA", 20.0)]);
        let placed = &result.placed[0];
        assert!(placed.is_vertical());
        assert_eq!(placed.width, 20.0);
        assert!((placed.height - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_many_tokens_do_not_overlap() {
        let tokens: Vec<VisualToken> = (0..40)
            .map(|i| token(&format!("KW{i}"), 20.0 + (i % 7) as f64 * 10.0))
            .collect();
        let packer = SpiralPacker::default();
        let result = packer.pack(&tokens);
        assert!(!result.placed.is_empty());
        assert_eq!(result.placed.len() + result.dropped.len(), tokens.len());
        assert_no_overlap(&result, packer.padding);

        let canvas = packer.canvas.bounds();
        for placed in &result.placed {
            assert!(canvas.contains_box(&placed.bounds()));
        }
    }

    #[test]
    fn test_oversized_token_dropped_not_error() {
        let result = SpiralPacker::default().pack(&[
            token("SUPERCALIFRAGILISTIC", 100.0),
            token("AMD", 30.0),
        ]);
        assert_eq!(result.placed.len(), 1);
        assert_eq!(result.placed[0].token.text, "AMD");
        assert_eq!(result.dropped[0].text, "SUPERCALIFRAGILISTIC");
        assert!(!result.is_complete());
    }

    #[test]
    fn test_crowding_degrades_to_fewer_tokens() {
        let packer = SpiralPacker {
            canvas: CanvasSize::new(200.0, 100.0),
            ..SpiralPacker::default()
        };
        let tokens: Vec<VisualToken> = (0..30).map(|i| token(&format!("T{i}"), 40.0)).collect();
        let result = packer.pack(&tokens);
        assert!(result.placed.len() < tokens.len());
        assert!(!result.placed.is_empty());
        assert_no_overlap(&result, packer.padding);
    }

    #[test]
    fn test_seeded_layout_is_reproducible() {
        let packer = SpiralPacker {
            seed: Some(42),
            ..SpiralPacker::default()
        };
        let tokens: Vec<VisualToken> = ["NVDA", "AMD", "GME", "PLTR", "SPY", "QQQ"]
            .iter()
            .enumerate()
            .map(|(i, t)| token(t, 25.0 + i as f64 * 8.0))
            .collect();
        assert_eq!(packer.pack(&tokens), packer.pack(&tokens));
    }

    #[test]
    fn test_unseeded_rotations_alternate() {
        let tokens = vec![token("A", 30.0), token("B", 30.0), token("C", 30.0)];
        let result = SpiralPacker::default().pack(&tokens);
        let rotations: Vec<i32> = result.placed.iter().map(|p| p.rotation).collect();
        assert_eq!(rotations, [0, 90, 0]);
    }

    #[test]
    fn test_largest_placed_first() {
        let tokens = vec![token("small", 20.0), token("BIG", 80.0)];
        let result = SpiralPacker::default().pack(&tokens);
        assert_eq!(result.placed[0].token.text, "BIG");
        assert_eq!((result.placed[0].x, result.placed[0].y), (0.0, 0.0));
    }

    #[test]
    fn test_zero_step_budget_drops_everything() {
        let packer = SpiralPacker {
            max_steps: 0,
            ..SpiralPacker::default()
        };
        let result = packer.pack(&[token("AAPL", 50.0)]);
        assert!(result.placed.is_empty());
        assert_eq!(result.dropped.len(), 1);
    }

    #[test]
    fn test_box_edges_touching_is_not_overlap() {
        let a = BoundingBox::centered(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::centered(10.0, 0.0, 10.0, 10.0);
        assert!(!a.intersects(&b));
        assert!(a.expanded(1.0).intersects(&b));
    }
}
