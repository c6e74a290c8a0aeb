//! Prediction output formatting
//!
//! Turns a raw point estimate and the artifact's MAE into the rounded
//! estimate, the price band and the explanatory message shown to users.

use crate::models::PriceRange;

/// Nominal confidence quoted in the message
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Fraction of the MAE added on each side of the estimate
pub const DEFAULT_BAND_FRACTION: f64 = 0.1;

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Confidence level quoted in the message (0-1)
    pub confidence: f64,
    /// Half-width of the band as a fraction of the MAE
    pub band_fraction: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            band_fraction: DEFAULT_BAND_FRACTION,
        }
    }
}

/// Formats point estimates into user-facing output
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self {
            config: OutputConfig::default(),
        }
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn confidence(&self) -> f64 {
        self.config.confidence
    }

    /// Price band around the unrounded estimate.
    ///
    /// This is a fixed heuristic of `band_fraction * mae` on each side, not a
    /// statistical confidence interval: it encodes how far off the model
    /// typically is, scaled down. Rounding is half-to-even.
    pub fn range(&self, estimate: f64, mae: f64) -> PriceRange {
        let margin = self.config.band_fraction * mae;
        PriceRange {
            low: (estimate - margin).round_ties_even() as i64,
            high: (estimate + margin).round_ties_even() as i64,
        }
    }

    /// Estimate rounded to cents
    pub fn round_estimate(&self, estimate: f64) -> f64 {
        (estimate * 100.0).round_ties_even() / 100.0
    }

    /// Message naming the band and the factors the estimate ignores
    pub fn message(&self, range: &PriceRange) -> String {
        format!(
            "🧭 Estimación de precio para tu vivienda:\n\n\
             📌 Con una confianza aproximada del {confidence:.0}%, se estima que el precio adecuado \
             se encuentra entre **{low} €** y **{high} €**.\n\n\
             ℹ️ Ten en cuenta que este intervalo depende de los datos proporcionados. \
             El precio más ajustado puede variar en función de características adicionales no incluidas, como:\n\
             - La localización exacta dentro de la zona\n\
             - La planta del inmueble\n\
             - La orientación y luminosidad\n\
             - Servicios como ascensor, calefacción, zonas comunes, etc.\n\n\
             🏡 Estos factores pueden influir significativamente en la valoración final.",
            confidence = self.config.confidence * 100.0,
            low = range.low,
            high = range.high,
        )
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_ten_percent_of_mae() {
        let formatter = OutputFormatter::new();
        let range = formatter.range(300_000.0, 20_000.0);
        assert_eq!(range, PriceRange { low: 298_000, high: 302_000 });
        assert_eq!(range.width(), 4_000);

        let narrower = formatter.range(300_000.0, 10_000.0);
        assert_eq!(narrower.width(), 2_000);
    }

    #[test]
    fn test_range_uses_unrounded_estimate() {
        let formatter = OutputFormatter::new();
        let range = formatter.range(250_000.4, 1_000.0);
        assert_eq!(range.low, 249_900);
        assert_eq!(range.high, 250_100);
    }

    #[test]
    fn test_half_rounds_to_even() {
        let formatter = OutputFormatter::new();
        // 100.5 - 0 and 101.5 + 0
        assert_eq!(formatter.range(100.5, 0.0).low, 100);
        assert_eq!(formatter.range(101.5, 0.0).high, 102);
    }

    #[test]
    fn test_round_estimate_to_cents() {
        let formatter = OutputFormatter::new();
        assert_eq!(formatter.round_estimate(300_000.0), 300_000.0);
        assert_eq!(formatter.round_estimate(123_456.789), 123_456.79);
        assert_eq!(formatter.round_estimate(300_000.125), 300_000.12);
        assert_eq!(formatter.round_estimate(300_000.375), 300_000.38);
    }

    #[test]
    fn test_message_names_range_and_caveats() {
        let formatter = OutputFormatter::new();
        let message = formatter.message(&PriceRange { low: 298_000, high: 302_000 });
        assert!(message.contains("95%"));
        assert!(message.contains("**298000 €**"));
        assert!(message.contains("**302000 €**"));
        assert!(message.contains("localización exacta"));
        assert!(message.contains("planta"));
        assert!(message.contains("orientación"));
        assert!(message.contains("ascensor"));
    }

    #[test]
    fn test_custom_confidence() {
        let formatter = OutputFormatter::with_config(OutputConfig {
            confidence: 0.9,
            band_fraction: 0.2,
        });
        assert!(formatter
            .message(&PriceRange { low: 1, high: 2 })
            .contains("90%"));
        assert_eq!(formatter.range(1_000.0, 100.0).width(), 40);
    }
}
