//! Datapoint type (DPT) parsing, canonicalization and classification.
//!
//! ETS and hand-written projects spell the same type in many ways:
//! `9.001`, `9`, `DPST-9-1`, `DPT-9`, `9_001`, `DPST_9_1`. Everything is
//! folded into a [`Dpt`] and rendered either in dot form (`9.001`, minor
//! padded to three digits) or hyphen form (`DPST-9-1`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Default number of distinct keys each normalizer cache holds before reset.
pub const DEFAULT_CACHE_CAPACITY: usize = 1_000;

static DPT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:DPS?T)?[\s_:.\-]*(\d{1,3})(?:[\s_.\-]+(\d{1,5}))?$")
        .expect("DPT pattern is a valid regex")
});

/// A parsed datapoint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dpt {
    pub main: u16,
    pub sub: u16,
}

/// Coarse value family of a datapoint type, as far as classification cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DptFamily {
    Boolean,
    /// 1.007 step, 1.008 up/down, 1.010 start/stop.
    Movement,
    /// 4-bit relative dimming (3.x).
    Dimming,
    /// 5.001 scaling 0–100 %.
    Percent,
    /// Any other 8-bit unsigned value.
    Scaling,
    Float2,
    Float4,
    Time,
    Date,
    DateTime,
    Scene,
    Other,
}

impl Dpt {
    /// Parse any accepted surface form. Returns `None` for anything else.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Some(dpt) = Self::parse_token(trimmed) {
            return Some(dpt);
        }
        trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .find_map(Self::parse_token)
    }

    fn parse_token(token: &str) -> Option<Self> {
        let caps = DPT_PATTERN.captures(token)?;
        let main = caps.get(1)?.as_str().parse().ok()?;
        let sub = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self { main, sub })
    }

    /// Dot form with a three-digit minor, e.g. `9.001`.
    #[must_use]
    pub fn dot(self) -> String {
        format!("{}.{:03}", self.main, self.sub)
    }

    /// Hyphen form, e.g. `DPST-9-1`, or `DPT-9` for a bare major.
    #[must_use]
    pub fn hyphen(self) -> String {
        if self.sub == 0 {
            format!("DPT-{}", self.main)
        } else {
            format!("DPST-{}-{}", self.main, self.sub)
        }
    }

    #[must_use]
    pub fn family(self) -> DptFamily {
        match (self.main, self.sub) {
            (1, 7 | 8 | 10) => DptFamily::Movement,
            (1, _) => DptFamily::Boolean,
            (3, _) => DptFamily::Dimming,
            (5, 1 | 4) => DptFamily::Percent,
            (5, _) => DptFamily::Scaling,
            (9, _) => DptFamily::Float2,
            (14, _) => DptFamily::Float4,
            (10, _) => DptFamily::Time,
            (11, _) => DptFamily::Date,
            (19, _) => DptFamily::DateTime,
            (17 | 18, _) => DptFamily::Scene,
            _ => DptFamily::Other,
        }
    }

    /// Home Assistant KNX sensor `type` for this datapoint, `"sensor"` when
    /// there is no dedicated one.
    #[must_use]
    pub fn sensor_type(self) -> &'static str {
        match (self.main, self.sub) {
            (9, 1) => "temperature",
            (9, 2) => "temperature_difference_2byte",
            (9, 4) => "illuminance",
            (9, 5) => "wind_speed_ms",
            (9, 6) => "pressure_2byte",
            (9, 7) => "humidity",
            (9, 8) => "ppm",
            (9, 20) => "voltage",
            (9, 21) => "curr",
            (9, 24) => "power_2byte",
            (14, 19) => "electric_current",
            (14, 27) => "electric_potential",
            (14, 56) => "power",
            (14, 68) => "common_temperature",
            (5, 1) => "percent",
            _ => "sensor",
        }
    }
}

impl fmt::Display for Dpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.main, self.sub)
    }
}

/// Uncached dot-form canonicalization.
#[must_use]
pub fn normalize_dpt(raw: &str) -> Option<String> {
    Dpt::parse(raw).map(Dpt::dot)
}

/// Uncached hyphen-form canonicalization.
#[must_use]
pub fn hyphen_dpt(raw: &str) -> Option<String> {
    Dpt::parse(raw).map(Dpt::hyphen)
}

/// Caching front-end for [`normalize_dpt`] / [`hyphen_dpt`].
///
/// Each pipeline owns its own instance. The caches are cleared wholesale once
/// they reach capacity, which keeps memory bounded on very large projects
/// without tracking recency.
#[derive(Debug)]
pub struct DptNormalizer {
    capacity: usize,
    dot: RefCell<HashMap<String, Option<String>>>,
    hyphen: RefCell<HashMap<String, Option<String>>>,
}

impl Default for DptNormalizer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl DptNormalizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            dot: RefCell::new(HashMap::new()),
            hyphen: RefCell::new(HashMap::new()),
        }
    }

    /// Dot form of `raw`, e.g. `"DPST-9-1"` → `"9.001"`.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> Option<String> {
        lookup(&self.dot, self.capacity, raw, normalize_dpt)
    }

    /// Hyphen form of `raw`, e.g. `"9.001"` → `"DPST-9-1"`.
    #[must_use]
    pub fn hyphen(&self, raw: &str) -> Option<String> {
        lookup(&self.hyphen, self.capacity, raw, hyphen_dpt)
    }

    /// Parsed form of `raw`, going through the dot cache.
    #[must_use]
    pub fn dpt(&self, raw: &str) -> Option<Dpt> {
        let dot = self.normalize(raw)?;
        let (main, sub) = dot.split_once('.')?;
        Some(Dpt {
            main: main.parse().ok()?,
            sub: sub.parse().ok()?,
        })
    }

    /// Family of `raw`, `None` when it does not parse.
    #[must_use]
    pub fn family(&self, raw: Option<&str>) -> Option<DptFamily> {
        raw.and_then(|raw| self.dpt(raw)).map(Dpt::family)
    }

    /// Number of cached keys as `(dot, hyphen)`.
    #[must_use]
    pub fn cached_len(&self) -> (usize, usize) {
        (self.dot.borrow().len(), self.hyphen.borrow().len())
    }
}

fn lookup(
    cache: &RefCell<HashMap<String, Option<String>>>,
    capacity: usize,
    raw: &str,
    compute: fn(&str) -> Option<String>,
) -> Option<String> {
    if let Some(hit) = cache.borrow().get(raw) {
        return hit.clone();
    }
    let value = compute(raw);
    let mut cache = cache.borrow_mut();
    if cache.len() >= capacity {
        cache.clear();
    }
    cache.insert(raw.to_string(), value.clone());
    value
}
