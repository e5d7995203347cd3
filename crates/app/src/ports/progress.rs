//! Progress port — where an import reports how far along it is.

use knxha_domain::progress::ProgressEvent;

/// Receives progress events from a running import.
///
/// Implementations must be cheap: `report` is called from inside the scan
/// loop. Any closure `Fn(ProgressEvent)` is a sink.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event);
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}
