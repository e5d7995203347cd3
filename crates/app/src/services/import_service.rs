//! Import service — scan, assemble and classify one project archive.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use knxha_domain::catalog::Catalog;
use knxha_domain::dpt::DptNormalizer;
use knxha_domain::entity::HaEntities;
use knxha_domain::error::KnxHaError;
use knxha_domain::progress::{Phase, ProgressEvent};
use knxha_domain::report::ParseReport;
use knxha_domain::snapshot::{ClassifyOptions, Snapshot};
use tracing::Instrument;

use crate::assembler::{Assembly, CatalogAssembler};
use crate::ports::{ProgressSink, ProjectSource};
use crate::router::EntityRouter;

/// Everything one import produced.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub catalog: Catalog,
    pub report: ParseReport,
    pub entities: HaEntities,
}

/// Application service running the whole import pipeline.
///
/// One instance owns one [`DptNormalizer`], so its caches are shared by every
/// import and classification run on this service. Only one import may run at
/// a time; a second concurrent call fails with [`KnxHaError::Busy`].
pub struct ImportService<S> {
    source: S,
    dpts: DptNormalizer,
    running: AtomicBool,
}

/// Clears the running flag when the import ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Forwards events with the percent clamped to never decrease.
struct MonotonicProgress<'a, P> {
    inner: &'a P,
    last: AtomicU32,
}

impl<'a, P: ProgressSink> MonotonicProgress<'a, P> {
    fn new(inner: &'a P) -> Self {
        Self {
            inner,
            last: AtomicU32::new(0f32.to_bits()),
        }
    }
}

impl<P: ProgressSink> ProgressSink for MonotonicProgress<'_, P> {
    fn report(&self, mut event: ProgressEvent) {
        let last = f32::from_bits(self.last.load(Ordering::Acquire));
        if event.percent < last {
            event.percent = last;
        }
        self.last.store(event.percent.to_bits(), Ordering::Release);
        self.inner.report(event);
    }
}

impl<S: ProjectSource> ImportService<S> {
    /// Create a new service reading projects through `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            dpts: DptNormalizer::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Whether an import is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<RunGuard<'_>, KnxHaError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| RunGuard(&self.running))
            .map_err(|_| KnxHaError::Busy)
    }

    /// Import a project archive: scan it, assemble the catalog and classify
    /// it with `options`.
    ///
    /// The service is claimed when this is called, not when the returned
    /// future is first polled, so a second call made while the first future
    /// is alive resolves to [`KnxHaError::Busy`] without touching the
    /// archive. Dropping the future releases the service.
    ///
    /// Progress goes through `progress` in phase order, ending with `done`
    /// at 100 %; percent never decreases.
    ///
    /// # Errors
    ///
    /// Returns [`KnxHaError::Busy`] when another import is running on this
    /// service, or the archive error from the source.
    pub fn import<'a, P: ProgressSink>(
        &'a self,
        archive: &'a [u8],
        options: ClassifyOptions,
        progress: &'a P,
    ) -> impl Future<Output = Result<ImportOutcome, KnxHaError>> + 'a {
        let guard = self.begin();
        let span = tracing::info_span!("import", bytes = archive.len());
        async move {
            let _guard = guard?;
            self.run(archive, options, progress).await
        }
        .instrument(span)
    }

    async fn run(
        &self,
        archive: &[u8],
        options: ClassifyOptions,
        progress: &impl ProgressSink,
    ) -> Result<ImportOutcome, KnxHaError> {
        let progress = MonotonicProgress::new(progress);

        let scan = self.source.scan(archive, &progress).await?;
        tracing::info!(
            documents = scan.documents_total,
            parsed = scan.documents_parsed,
            skipped = scan.documents_skipped,
            recovered = scan.documents_recovered,
            "archive scanned"
        );
        progress.report(
            ProgressEvent::new(Phase::Build, Phase::Build.at(0.0))
                .with_found(scan.addresses.len()),
        );

        let Assembly { catalog, report } = CatalogAssembler::new(&self.dpts).assemble(scan);
        progress.report(
            ProgressEvent::new(Phase::Build, Phase::Build.at(0.5))
                .with_processed(catalog.addresses.len()),
        );

        let entities = self.classify(&catalog, options);
        progress.report(
            ProgressEvent::new(Phase::Build, Phase::Build.at(1.0)).with_found(entities.len()),
        );
        progress.report(ProgressEvent::new(Phase::Done, Phase::Done.at(1.0)));

        Ok(ImportOutcome {
            catalog,
            report,
            entities,
        })
    }

    /// Classify an already assembled catalog.
    #[must_use]
    pub fn classify(&self, catalog: &Catalog, options: ClassifyOptions) -> HaEntities {
        let entities = EntityRouter::new(options).route(catalog, &self.dpts);
        for (domain, count) in entities.counts() {
            tracing::info!(%domain, count, "entities classified");
        }
        entities
    }

    /// Classify the catalog carried by a restored snapshot with its options.
    #[must_use]
    pub fn classify_snapshot(&self, snapshot: &Snapshot) -> HaEntities {
        self.classify(&snapshot.catalog, snapshot.options)
    }

    /// Wrap a catalog into a snapshot stamped with the current time.
    #[must_use]
    pub fn snapshot(&self, catalog: Catalog, options: ClassifyOptions) -> Snapshot {
        Snapshot::new(catalog, options, chrono::Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use knxha_domain::entity::EntityDomain;
    use knxha_domain::record::{ProjectScan, RawAddress};

    use super::*;

    struct FakeSource {
        scan: ProjectScan,
        fail: bool,
    }

    impl FakeSource {
        fn new(scan: ProjectScan) -> Self {
            Self { scan, fail: false }
        }
    }

    impl ProjectSource for FakeSource {
        fn scan(
            &self,
            _archive: &[u8],
            progress: &impl ProgressSink,
        ) -> impl Future<Output = Result<ProjectScan, KnxHaError>> + Send {
            progress.report(ProgressEvent::new(Phase::Load, 5.0));
            progress.report(ProgressEvent::new(Phase::Scan, 10.0));
            // out-of-order value on purpose, must be clamped
            progress.report(ProgressEvent::new(Phase::Scan, 7.0));
            let result = if self.fail {
                Err(KnxHaError::Archive("not a zip archive".into()))
            } else {
                Ok(self.scan.clone())
            };
            async move {
                tokio::task::yield_now().await;
                result
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for Recorder {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn address(id: &str, ga: &str, name: &str, dpt: &str) -> RawAddress {
        RawAddress {
            id: id.into(),
            name: name.into(),
            address: ga.parse().unwrap(),
            dpt: Some(dpt.into()),
            description: None,
            security: None,
        }
    }

    fn scan() -> ProjectScan {
        ProjectScan {
            project_name: Some("Villa".into()),
            addresses: vec![
                address("a", "1/0/1", "Pump", "1.001"),
                address("b", "1/0/2", "Pump status", "1.001"),
                address("c", "2/0/1", "Reserve", "1.001"),
            ],
            ..ProjectScan::default()
        }
    }

    #[tokio::test]
    async fn should_import_and_classify() {
        let service = ImportService::new(FakeSource::new(scan()));
        let recorder = Recorder::default();
        let outcome = service
            .import(b"zip", ClassifyOptions::default(), &recorder)
            .await
            .unwrap();
        assert_eq!(outcome.catalog.project_name.as_deref(), Some("Villa"));
        assert_eq!(outcome.catalog.addresses.len(), 3);
        assert_eq!(outcome.entities.domain(EntityDomain::Switch).len(), 2);
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn should_report_monotonic_progress_ending_with_done() {
        let service = ImportService::new(FakeSource::new(scan()));
        let recorder = Recorder::default();
        service
            .import(b"zip", ClassifyOptions::default(), &recorder)
            .await
            .unwrap();
        let events = recorder.events.into_inner().unwrap();
        let percents: Vec<f32> = events.iter().map(|e| e.percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        let last = events.last().unwrap();
        assert_eq!(last.phase, Phase::Done);
        assert!((last.percent - 100.0).abs() < f32::EPSILON);
        assert!(events.iter().any(|e| e.phase == Phase::Build));
    }

    #[tokio::test]
    async fn should_reject_concurrent_import_as_busy() {
        let service = ImportService::new(FakeSource::new(scan()));
        let recorder = Recorder::default();
        let (first, second) = tokio::join!(
            service.import(b"zip", ClassifyOptions::default(), &recorder),
            service.import(b"zip", ClassifyOptions::default(), &recorder),
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(KnxHaError::Busy)));
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn should_claim_service_when_import_is_called() {
        let service = ImportService::new(FakeSource::new(scan()));
        let recorder = Recorder::default();
        let first = service.import(b"zip", ClassifyOptions::default(), &recorder);
        assert!(service.is_running());
        let second = service
            .import(b"zip", ClassifyOptions::default(), &recorder)
            .await;
        assert!(matches!(second, Err(KnxHaError::Busy)));
        assert!(recorder.events.lock().unwrap().is_empty());
        assert!(first.await.is_ok());
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn should_release_service_when_import_is_dropped() {
        let service = ImportService::new(FakeSource::new(scan()));
        let recorder = Recorder::default();
        drop(service.import(b"zip", ClassifyOptions::default(), &recorder));
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn should_release_guard_after_failure() {
        let service = ImportService::new(FakeSource {
            scan: ProjectScan::default(),
            fail: true,
        });
        let result = service
            .import(b"nope", ClassifyOptions::default(), &Recorder::default())
            .await;
        assert!(matches!(result, Err(KnxHaError::Archive(_))));
        assert!(!service.is_running());
    }

    #[tokio::test]
    async fn should_apply_reserve_option() {
        let service = ImportService::new(FakeSource::new(scan()));
        let outcome = service
            .import(
                b"zip",
                ClassifyOptions { drop_reserve: true },
                &Recorder::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.entities.domain(EntityDomain::Switch).len(), 1);
    }

    #[test]
    fn should_classify_restored_snapshot_with_its_options() {
        let service = ImportService::new(FakeSource::new(ProjectScan::default()));
        let dpts = DptNormalizer::new();
        let Assembly { catalog, .. } = CatalogAssembler::new(&dpts).assemble(scan());
        let snapshot = service.snapshot(catalog, ClassifyOptions { drop_reserve: true });
        let restored = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        let entities = service.classify_snapshot(&restored);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities.iter().next().unwrap().name(), "Pump");
    }
}
