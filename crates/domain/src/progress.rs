//! Import progress events.

use serde::Serialize;

/// Pipeline phase, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Load,
    Scan,
    Extract,
    Parse,
    Build,
    Done,
}

impl Phase {
    /// Overall percent range `(start, end)` this phase reports within.
    ///
    /// `Extract` and `Parse` share the per-file band; the exact position
    /// comes from [`file_slot`].
    #[must_use]
    pub fn range(self) -> (f32, f32) {
        match self {
            Self::Load => (0.0, 5.0),
            Self::Scan => (5.0, 10.0),
            Self::Extract | Self::Parse => (FILES_START, FILES_END),
            Self::Build => (90.0, 99.0),
            Self::Done => (100.0, 100.0),
        }
    }

    /// Map a phase-local fraction (0..=1) into the overall percent.
    #[must_use]
    pub fn at(self, fraction: f32) -> f32 {
        let (start, end) = self.range();
        start + (end - start) * fraction.clamp(0.0, 1.0)
    }
}

const FILES_START: f32 = 10.0;
const FILES_END: f32 = 90.0;
/// Share of a file slot owned by extraction; parsing owns the rest.
const EXTRACT_SHARE: f32 = 0.4;

/// Overall percent for file `index` of `total` in `phase` at `fraction`
/// through that phase's part of the slot.
#[must_use]
pub fn file_slot(phase: Phase, index: usize, total: usize, fraction: f32) -> f32 {
    if total == 0 {
        return FILES_END;
    }
    #[allow(clippy::cast_precision_loss)]
    let slot = (FILES_END - FILES_START) / total as f32;
    #[allow(clippy::cast_precision_loss)]
    let slot_start = FILES_START + slot * index as f32;
    let fraction = fraction.clamp(0.0, 1.0);
    let within = match phase {
        Phase::Extract => EXTRACT_SHARE * fraction,
        _ => EXTRACT_SHARE + (1.0 - EXTRACT_SHARE) * fraction,
    };
    (slot_start + slot * within).min(FILES_END)
}

/// One progress update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub percent: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_percent: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_count: Option<usize>,
}

impl ProgressEvent {
    #[must_use]
    pub fn new(phase: Phase, percent: f32) -> Self {
        Self {
            phase,
            percent,
            total_files: None,
            processed_files: None,
            filename: None,
            file_percent: None,
            found_count: None,
            processed_count: None,
        }
    }

    #[must_use]
    pub fn with_files(mut self, processed: usize, total: usize) -> Self {
        self.processed_files = Some(processed);
        self.total_files = Some(total);
        self
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_file_percent(mut self, file_percent: f32) -> Self {
        self.file_percent = Some(file_percent);
        self
    }

    #[must_use]
    pub fn with_found(mut self, found: usize) -> Self {
        self.found_count = Some(found);
        self
    }

    #[must_use]
    pub fn with_processed(mut self, processed: usize) -> Self {
        self.processed_count = Some(processed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_keep_phases_within_their_range() {
        assert!((Phase::Load.at(1.0) - 5.0).abs() < f32::EPSILON);
        assert!((Phase::Scan.at(0.0) - 5.0).abs() < f32::EPSILON);
        assert!((Phase::Build.at(2.0) - 99.0).abs() < f32::EPSILON);
    }

    #[test]
    fn should_split_file_slots_between_extract_and_parse() {
        assert!((file_slot(Phase::Extract, 0, 2, 0.0) - 10.0).abs() < 1e-4);
        assert!((file_slot(Phase::Extract, 0, 2, 1.0) - 26.0).abs() < 1e-4);
        assert!((file_slot(Phase::Parse, 0, 2, 1.0) - 50.0).abs() < 1e-4);
        assert!((file_slot(Phase::Parse, 1, 2, 1.0) - 90.0).abs() < 1e-4);
    }

    #[test]
    fn should_be_monotonic_across_files() {
        let mut last = 0.0;
        for index in 0..5 {
            for phase in [Phase::Extract, Phase::Parse] {
                for step in 0..=4 {
                    #[allow(clippy::cast_precision_loss)]
                    let p = file_slot(phase, index, 5, step as f32 / 4.0);
                    assert!(p >= last, "{p} < {last}");
                    last = p;
                }
            }
        }
    }

    #[test]
    fn should_serialize_phase_lowercase() {
        let event = ProgressEvent::new(Phase::Extract, 12.0).with_filename("0.xml");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"], "extract");
        assert_eq!(json["filename"], "0.xml");
        assert!(json.get("found_count").is_none());
    }
}
