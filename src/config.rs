use crate::series::{PlotKind, SeriesConfig};

/// Session configuration, read from the environment the same way every
/// binary in this crate does.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bin window for downsampled histograms.
    pub resolution: usize,
    /// Window for the TSS curve when it should differ from `resolution`.
    pub tss_resolution: Option<usize>,
    /// Metric plotted against fragment-length distance.
    pub y_metric: String,
    pub y_exponent: i32,
    pub show_reference: bool,
    pub search_debounce_ms: u64,
    pub frame_ms: u64,
    /// Quiet period after the last resize before the surface is redrawn.
    pub redraw_debounce_ms: u64,
    /// Drop columns flagged redundant from tables.
    pub less_redundant: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolution: 10,
            tss_resolution: None,
            y_metric: "short_mononucleosomal_ratio".to_string(),
            y_exponent: 0,
            show_reference: true,
            search_debounce_ms: 100,
            frame_ms: 16,
            redraw_debounce_ms: 500,
            less_redundant: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            resolution: env_parse("RESOLUTION").unwrap_or(d.resolution),
            tss_resolution: env_parse("TSS_RESOLUTION"),
            y_metric: std::env::var("Y_METRIC").unwrap_or(d.y_metric),
            y_exponent: env_parse("Y_EXPONENT").unwrap_or(d.y_exponent),
            show_reference: std::env::var("SHOW_REFERENCE")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(d.show_reference),
            search_debounce_ms: env_parse("SEARCH_DEBOUNCE_MS").unwrap_or(d.search_debounce_ms),
            frame_ms: env_parse("FRAME_MS").unwrap_or(d.frame_ms),
            redraw_debounce_ms: env_parse("REDRAW_DEBOUNCE_MS").unwrap_or(d.redraw_debounce_ms),
            less_redundant: std::env::var("LESS_REDUNDANT")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(d.less_redundant),
        }
    }

    pub fn series_config(&self) -> SeriesConfig {
        let mut cfg = SeriesConfig {
            resolution: self.resolution.max(1),
            y_metric: self.y_metric.clone(),
            y_exponent: self.y_exponent,
            show_reference: self.show_reference,
            ..SeriesConfig::default()
        };
        if let Some(r) = self.tss_resolution {
            cfg.resolution_overrides.insert(PlotKind::TssEnrichment, r.max(1));
        }
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }

    #[test]
    fn test_redraw_debounce_from_env() {
        assert_eq!(Config::default().redraw_debounce_ms, 500);
        std::env::set_var("REDRAW_DEBOUNCE_MS", " 250 ");
        assert_eq!(Config::from_env().redraw_debounce_ms, 250);
        std::env::set_var("REDRAW_DEBOUNCE_MS", "soon");
        assert_eq!(Config::from_env().redraw_debounce_ms, 500);
        std::env::remove_var("REDRAW_DEBOUNCE_MS");
    }

    #[test]
    fn test_series_config_clamps_resolution() {
        let cfg = Config {
            resolution: 0,
            tss_resolution: Some(0),
            ..Config::default()
        };
        let s = cfg.series_config();
        assert_eq!(s.resolution_for(PlotKind::FragmentLength), 1);
        assert_eq!(s.resolution_for(PlotKind::TssEnrichment), 1);
    }
}
