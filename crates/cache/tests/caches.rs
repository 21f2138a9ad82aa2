#![cfg(unix)]

mod common;

use common::{Scratch, WRITE_OK};
use recap_cache::{
    ActiveCacheConfig, ActiveRecordingReportCache, ArchivedRecordingReportCache, FsArchiveStore,
    GenerationLock, ReportCaches, ReportGenerator, ReportsConfigBuilder,
    SubprocessReportGenerator,
};
use recap_core::{ConnectionDescriptor, ExitStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

fn target() -> ConnectionDescriptor {
    ConnectionDescriptor::new("service:jmx:rmi:///jndi/rmi://app:9091/jmxrmi")
}

fn active_cache(scratch: &Scratch, body: &str) -> ActiveRecordingReportCache {
    let generator: Arc<dyn ReportGenerator> = Arc::new(SubprocessReportGenerator::new(
        scratch.worker(body),
        GenerationLock::new(),
    ));
    ActiveRecordingReportCache::new(&ActiveCacheConfig::default(), generator)
}

fn archived_cache(scratch: &Scratch, body: &str) -> ArchivedRecordingReportCache {
    let generator: Arc<dyn ReportGenerator> = Arc::new(SubprocessReportGenerator::new(
        scratch.worker(body),
        GenerationLock::new(),
    ));
    ArchivedRecordingReportCache::new(
        scratch.report_dir(),
        generator,
        Arc::new(FsArchiveStore::new(scratch.archive_dir())),
    )
}

#[tokio::test]
async fn test_active_hit_skips_the_worker() {
    let scratch = Scratch::new();
    let cache = active_cache(&scratch, WRITE_OK);

    assert_eq!(cache.get(&target(), "rec1", "").await.unwrap(), "<html>OK</html>");
    assert_eq!(cache.get(&target(), "rec1", "").await.unwrap(), "<html>OK</html>");
    assert_eq!(scratch.invocations(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_active_single_flight() {
    let scratch = Scratch::new();
    let cache = active_cache(&scratch, &format!("sleep 0.3\n{WRITE_OK}"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get(&target(), "rec1", "heap").await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "<html>OK</html>");
    }
    assert_eq!(scratch.invocations(), 1);
}

#[tokio::test]
async fn test_active_delete_forces_recomputation() {
    let scratch = Scratch::new();
    let cache = active_cache(&scratch, WRITE_OK);

    cache.get(&target(), "rec1", "").await.unwrap();
    assert!(cache.delete(&target(), "rec1").await);
    cache.get(&target(), "rec1", "").await.unwrap();
    assert_eq!(scratch.invocations(), 2);
}

#[tokio::test]
async fn test_active_load_survives_an_abandoned_caller() {
    let scratch = Scratch::new();
    let cache = active_cache(&scratch, &format!("sleep 0.3\n{WRITE_OK}"));

    let impatient = tokio::time::timeout(
        Duration::from_millis(50),
        cache.get(&target(), "rec1", ""),
    )
    .await;
    assert!(impatient.is_err());

    // The abandoned generation finishes and its report is kept
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(cache.get(&target(), "rec1", "").await.unwrap(), "<html>OK</html>");
    assert_eq!(scratch.invocations(), 1);
    assert!(scratch.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn test_active_caller_after_an_abandoned_one_joins_its_generation() {
    let scratch = Scratch::new();
    let cache = active_cache(&scratch, &format!("sleep 0.5\n{WRITE_OK}"));

    let impatient = tokio::time::timeout(
        Duration::from_millis(50),
        cache.get(&target(), "rec1", ""),
    )
    .await;
    assert!(impatient.is_err());

    assert_eq!(cache.get(&target(), "rec1", "").await.unwrap(), "<html>OK</html>");
    assert_eq!(scratch.invocations(), 1);
}

#[tokio::test]
async fn test_active_stop_during_generation_forces_regeneration() {
    let scratch = Scratch::new();
    let cache = active_cache(&scratch, &format!("sleep 0.4\n{WRITE_OK}"));

    let pending = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.get(&target(), "rec1", "").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    cache.delete(&target(), "rec1").await;

    assert_eq!(pending.await.unwrap().unwrap(), "<html>OK</html>");
    assert_eq!(cache.get(&target(), "rec1", "").await.unwrap(), "<html>OK</html>");
    assert_eq!(scratch.invocations(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_archived_double_checked_locking() {
    let scratch = Scratch::new();
    scratch.archive_recording("target-a", "rec1.jfr");
    let cache = Arc::new(archived_cache(&scratch, &format!("sleep 0.2\n{WRITE_OK}")));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get("rec1.jfr", "heap").await })
        })
        .collect();
    let mut paths = HashSet::new();
    for handle in handles {
        paths.insert(handle.await.unwrap().unwrap());
    }

    assert_eq!(paths.len(), 1);
    assert_eq!(scratch.invocations(), 1);
    let path = paths.into_iter().next().unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "<html>OK</html>");
}

#[tokio::test]
async fn test_archived_failure_is_cached_as_error_text() {
    let scratch = Scratch::new();
    scratch.archive_recording("target-a", "rec1.jfr");
    let cache = archived_cache(&scratch, "exit 3");

    let err = cache.get("rec1.jfr", "").await.unwrap_err();
    assert_eq!(err.exit_status(), Some(ExitStatus::RecordingException));

    let path = cache.get("rec1.jfr", "").await.unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains(ExitStatus::RecordingException.message()));
    assert_eq!(scratch.invocations(), 1);
    assert!(scratch.leftover_temp_files().is_empty());
}

#[tokio::test]
async fn test_archived_not_found_leaves_no_file() {
    let scratch = Scratch::new();
    scratch.archive_recording("target-a", "rec1.jfr");
    let cache = archived_cache(&scratch, r#"printf partial > "$3"; exit 2"#);

    let err = cache.get("rec1.jfr", "").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!cache.report_path("rec1.jfr", "").unwrap().exists());

    // Nothing was cached, so the next request tries again
    assert!(cache.get("rec1.jfr", "").await.is_err());
    assert_eq!(scratch.invocations(), 2);
}

#[tokio::test]
async fn test_archived_timeout_is_cached_as_terminated() {
    let scratch = Scratch::new();
    scratch.archive_recording("target-a", "rec1.jfr");
    let generator: Arc<dyn ReportGenerator> = Arc::new(SubprocessReportGenerator::new(
        {
            let mut config = scratch.worker("exec sleep 30");
            config.timeout = Duration::from_millis(300);
            config
        },
        GenerationLock::new(),
    ));
    let cache = ArchivedRecordingReportCache::new(
        scratch.report_dir(),
        generator,
        Arc::new(FsArchiveStore::new(scratch.archive_dir())),
    );

    let err = cache.get("rec1.jfr", "").await.unwrap_err();
    assert_eq!(err.exit_status(), Some(ExitStatus::Terminated));
    let text = std::fs::read_to_string(cache.report_path("rec1.jfr", "").unwrap()).unwrap();
    assert!(text.contains(ExitStatus::Terminated.message()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_caches_share_one_generation_lock() {
    let scratch = Scratch::new();
    scratch.archive_recording("target-a", "rec2.jfr");
    let running = scratch.path().join("running");
    let script = format!(
        "mkdir '{0}' || exit 6\nsleep 0.3\nrmdir '{0}'\n{WRITE_OK}",
        running.display()
    );
    let worker = scratch.worker(&script);
    let config = ReportsConfigBuilder::new()
        .with_worker_command(worker.worker_program, worker.worker_args)
        .with_max_memory_mb(None)
        .with_transformers(worker.transformers)
        .with_temp_dir(scratch.temp_dir())
        .with_report_dir(scratch.report_dir())
        .with_archive_dir(scratch.archive_dir())
        .build()
        .unwrap();
    let caches = Arc::new(ReportCaches::from_config(&config).unwrap());

    let active = {
        let caches = caches.clone();
        tokio::spawn(async move { caches.active.get(&target(), "rec1", "").await })
    };
    let archived = {
        let caches = caches.clone();
        tokio::spawn(async move { caches.archived.get("rec2.jfr", "").await })
    };

    assert_eq!(active.await.unwrap().unwrap(), "<html>OK</html>");
    archived.await.unwrap().unwrap();
    assert_eq!(scratch.invocations(), 2);
    assert_eq!(caches.lock.acquisitions(), 2);
}
