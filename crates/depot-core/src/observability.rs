//! Named log layers and their runtime levels.
//!
//! A layer groups the tracing targets of one part of the service so an
//! operator can raise or lower its verbosity without a restart. The
//! subscriber owns the actual filter; this module only knows how to turn a
//! set of per-layer levels into filter directives.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLayer {
    Main,
    Service,
    Transport,
    Endpoints,
    Database,
}

impl LogLayer {
    pub const ALL: [LogLayer; 5] = [
        LogLayer::Main,
        LogLayer::Service,
        LogLayer::Transport,
        LogLayer::Endpoints,
        LogLayer::Database,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LogLayer::Main => "main",
            LogLayer::Service => "service",
            LogLayer::Transport => "transport",
            LogLayer::Endpoints => "endpoints",
            LogLayer::Database => "database",
        }
    }

    /// Tracing targets whose events belong to this layer.
    pub fn targets(&self) -> &'static [&'static str] {
        match self {
            LogLayer::Main => &["depot"],
            LogLayer::Service => &["depot_engine"],
            LogLayer::Transport => &["tower_http"],
            LogLayer::Endpoints => &["depot_server"],
            LogLayer::Database => &["depot_storage", "sqlx"],
        }
    }
}

impl fmt::Display for LogLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogLayer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        LogLayer::ALL
            .into_iter()
            .find(|layer| layer.name() == wanted)
            .ok_or_else(|| Error::bad_request(format!("unknown log layer '{}'", s)))
    }
}

/// Parse a level name. `fatal` is accepted as an alias for `error`.
pub fn parse_level(s: &str) -> Result<LevelFilter> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("fatal") {
        return Ok(LevelFilter::ERROR);
    }
    LevelFilter::from_str(trimmed)
        .map_err(|_| Error::bad_request(format!("unknown log level '{}'", s)))
}

/// Per-layer levels with a fallback for everything else.
#[derive(Debug, Clone)]
pub struct LogLevels {
    default: LevelFilter,
    layers: BTreeMap<LogLayer, LevelFilter>,
}

impl LogLevels {
    pub fn new(default: LevelFilter) -> Self {
        Self {
            default,
            layers: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, layer: LogLayer, level: LevelFilter) {
        self.layers.insert(layer, level);
    }

    pub fn get(&self, layer: LogLayer) -> LevelFilter {
        self.layers.get(&layer).copied().unwrap_or(self.default)
    }

    /// Render as an `EnvFilter` directive string.
    ///
    /// Every layer is written out explicitly: filter targets match by prefix,
    /// so `depot` alone would also cover `depot_engine`.
    pub fn directives(&self) -> String {
        let mut parts = vec![self.default.to_string().to_lowercase()];
        for layer in LogLayer::ALL {
            let level = self.get(layer).to_string().to_lowercase();
            for target in layer.targets() {
                parts.push(format!("{}={}", target, level));
            }
        }
        parts.join(",")
    }

    /// Current level of every layer, keyed by layer name.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        LogLayer::ALL
            .into_iter()
            .map(|layer| {
                (
                    layer.name().to_string(),
                    self.get(layer).to_string().to_lowercase(),
                )
            })
            .collect()
    }
}

impl Default for LogLevels {
    fn default() -> Self {
        Self::new(LevelFilter::INFO)
    }
}

/// Runtime log level control, implemented by whoever owns the subscriber.
pub trait LevelControl: Send + Sync {
    fn set_level(&self, layer: &str, level: &str) -> Result<()>;

    fn levels(&self) -> BTreeMap<String, String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_layer_from_str() {
        assert_eq!("database".parse::<LogLayer>().unwrap(), LogLayer::Database);
        assert_eq!(" Transport ".parse::<LogLayer>().unwrap(), LogLayer::Transport);
        let err = "kernel".parse::<LogLayer>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_parse_level_aliases() {
        assert_eq!(parse_level("DEBUG").unwrap(), LevelFilter::DEBUG);
        assert_eq!(parse_level("warn").unwrap(), LevelFilter::WARN);
        assert_eq!(parse_level("FATAL").unwrap(), LevelFilter::ERROR);
        assert!(parse_level("loud").unwrap_err().is(ErrorKind::BadRequest));
    }

    #[test]
    fn test_directives_cover_every_layer() {
        let mut levels = LogLevels::new(LevelFilter::INFO);
        levels.set(LogLayer::Database, LevelFilter::DEBUG);

        let directives = levels.directives();
        assert!(directives.starts_with("info,"));
        assert!(directives.contains("depot=info"));
        assert!(directives.contains("depot_engine=info"));
        assert!(directives.contains("depot_storage=debug"));
        assert!(directives.contains("sqlx=debug"));
        assert!(directives.contains("tower_http=info"));
    }

    #[test]
    fn test_snapshot_falls_back_to_default() {
        let mut levels = LogLevels::new(LevelFilter::WARN);
        levels.set(LogLayer::Service, LevelFilter::TRACE);
        let snapshot = levels.snapshot();
        assert_eq!(snapshot.len(), LogLayer::ALL.len());
        assert_eq!(snapshot["service"], "trace");
        assert_eq!(snapshot["main"], "warn");
    }
}
