//! Turns keyword records into sized, colored tokens ready for layout.
//!
//! Font size is `mentions / divisor` clamped to the size range. This is a fixed
//! divisor, not a min/max normalization over the dataset, so two snapshots with
//! very different mention ranges are not scaled comparably. It stays simple and
//! stable across refreshes at the cost of not adapting to the data.

use crate::config::CloudConfig;
use crate::feeds::KeywordRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Straight-line blend; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub const NEGATIVE: Rgb = Rgb::new(0xe7, 0x4c, 0x3c);
pub const NEUTRAL: Rgb = Rgb::new(0xf3, 0x9c, 0x12);
pub const POSITIVE: Rgb = Rgb::new(0x27, 0xae, 0x60);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeRange {
    pub min: f64,
    pub max: f64,
}

impl Default for SizeRange {
    fn default() -> Self {
        Self {
            min: 20.0,
            max: 100.0,
        }
    }
}

/// A keyword with its visual encoding attached.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualToken {
    pub text: String,
    pub font_size: f64,
    pub color: Rgb,
    pub mentions: u64,
    pub sentiment: f64,
}

impl VisualToken {
    pub fn tooltip(&self) -> String {
        format!(
            "{}: {} mentions, Sentiment: {:.2}",
            self.text, self.mentions, self.sentiment
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataMapper {
    pub size_range: SizeRange,
    pub divisor: f64,
}

impl Default for DataMapper {
    fn default() -> Self {
        Self {
            size_range: SizeRange::default(),
            divisor: 10.0,
        }
    }
}

impl DataMapper {
    pub fn from_config(config: &CloudConfig) -> Self {
        Self {
            size_range: SizeRange {
                min: config.min_font_size,
                max: config.max_font_size,
            },
            divisor: config.mention_divisor,
        }
    }

    /// One token per record, in input order.
    pub fn map(&self, records: &[KeywordRecord]) -> Vec<VisualToken> {
        records.iter().map(|r| self.map_one(r)).collect()
    }

    pub fn map_one(&self, record: &KeywordRecord) -> VisualToken {
        VisualToken {
            text: record.keyword.clone(),
            font_size: self.font_size(record.mentions),
            color: sentiment_color(record.sentiment),
            mentions: record.mentions,
            sentiment: record.sentiment,
        }
    }

    pub fn font_size(&self, mentions: u64) -> f64 {
        (mentions as f64 / self.divisor).clamp(self.size_range.min, self.size_range.max)
    }
}

/// Piecewise-linear over negative (-1), neutral (0) and positive (+1).
pub fn sentiment_color(sentiment: f64) -> Rgb {
    let s = if sentiment.is_nan() {
        0.0
    } else {
        sentiment.clamp(-1.0, 1.0)
    };

    if s < 0.0 {
        NEUTRAL.lerp(NEGATIVE, -s)
    } else {
        NEUTRAL.lerp(POSITIVE, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<KeywordRecord> {
        vec![
            KeywordRecord::new("AAPL", 500, 0.8),
            KeywordRecord::new("TSLA", 50, -0.3),
        ]
    }

    #[test]
    fn test_font_size_fixed_divisor_then_clamp() {
        let tokens = DataMapper::default().map(&records());
        assert_eq!(tokens[0].font_size, 50.0);
        assert_eq!(tokens[1].font_size, 20.0);
        assert_eq!(DataMapper::default().font_size(5_000), 100.0);
    }

    #[test]
    fn test_order_preserved() {
        let tokens = DataMapper::default().map(&records());
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["AAPL", "TSLA"]);
    }

    #[test]
    fn test_control_points() {
        assert_eq!(sentiment_color(-1.0), NEGATIVE);
        assert_eq!(sentiment_color(0.0), NEUTRAL);
        assert_eq!(sentiment_color(1.0), POSITIVE);
    }

    #[test]
    fn test_out_of_range_sentiment_clamped() {
        assert_eq!(sentiment_color(2.0), sentiment_color(1.0));
        assert_eq!(sentiment_color(-7.5), NEGATIVE);
        assert_eq!(sentiment_color(f64::NAN), NEUTRAL);
    }

    #[test]
    fn test_interpolated_colors() {
        let tokens = DataMapper::default().map(&records());
        // 0.8 of the way from neutral to positive
        assert_eq!(tokens[0].color, Rgb::new(80, 170, 80));
        // 0.3 of the way from neutral to negative
        assert_eq!(tokens[1].color, Rgb::new(239, 132, 31));
    }

    #[test]
    fn test_hex_and_tooltip() {
        assert_eq!(NEGATIVE.to_hex(), "#e74c3c");
        let token = DataMapper::default().map_one(&KeywordRecord::new("GME", 120, -0.456));
        assert_eq!(token.tooltip(), "GME: 120 mentions, Sentiment: -0.46");
    }
}
