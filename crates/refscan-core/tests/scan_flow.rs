use refscan_core::{
    Advisory, BatchRun, Progress, ScanConfig, ScanCoordinator, ScanError, ScanState, ScanTally,
    Scanner, FINISHED_MESSAGE,
};
use refscan_host::{EntityId, MemoryEntity, MemoryHost};
use refscan_report::{MemoryReportStore, ReportStore};
use refscan_test_utils::{
    bulk_candidates, clean_site, mixed_site, single_broken_reference, FailingReportStore,
    FlakyStorage, DELETED_TARGET,
};
use refscan_topology::TypeReferences;
use std::sync::Arc;

fn scanner(host: &Arc<MemoryHost>, store: Arc<dyn ReportStore>) -> Scanner {
    Scanner::new(host.clone(), host.clone(), store)
}

fn node_references(host: &Arc<MemoryHost>) -> TypeReferences {
    scanner(host, Arc::new(MemoryReportStore::new()))
        .resolver()
        .resolve_reference_fields()
        .unwrap()
        .get("node")
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn single_deleted_target_is_reported_once() {
    let host = Arc::new(single_broken_reference());
    let store = Arc::new(MemoryReportStore::new());
    let mut run = scanner(&host, store.clone()).batch().unwrap();

    let mut last = Progress::ZERO;
    let finished = run.run_to_completion(|p| last = p.progress).await;

    assert!(finished.success);
    assert_eq!(finished.message, FINISHED_MESSAGE);
    assert_eq!(finished.broken_targets, 1);
    assert_eq!(last, Progress::DONE);

    let report = store.read().await.unwrap();
    let records: Vec<_> = report.records().collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity_type, "node");
    assert_eq!(records[0].bundle, "article");
    assert_eq!(records[0].field, "ref");
    assert_eq!(records[0].source_id, EntityId::new(1));
    assert_eq!(records[0].targets, vec![EntityId::new(DELETED_TARGET)]);
}

#[tokio::test]
async fn thirty_one_candidates_take_two_steps() {
    let host = Arc::new(bulk_candidates(31));
    let references = node_references(&host);
    let coordinator = ScanCoordinator::new(host.clone(), Arc::new(MemoryReportStore::new()));

    let first = coordinator
        .run_step("node", &references, ScanState::Unstarted)
        .await
        .unwrap();
    assert_eq!(first.loaded, 30);
    assert_eq!(first.state.processed(), 30);
    assert_eq!(first.progress, Progress::partial(30, 31));
    assert!(first.progress < Progress::DONE);
    assert_eq!(
        first.message,
        "Validating 30 of 31 broken target references in entity type node"
    );

    let second = coordinator
        .run_step("node", &references, first.state)
        .await
        .unwrap();
    assert_eq!(second.loaded, 1);
    assert_eq!(second.progress, Progress::DONE);
    assert_eq!(
        second.state,
        ScanState::Done(ScanTally {
            processed: 31,
            skipped: 0,
            total: 31
        })
    );
}

#[tokio::test]
async fn zero_candidates_finish_in_one_step() {
    let host = Arc::new(clean_site());
    let store = Arc::new(MemoryReportStore::new());
    let references = node_references(&host);
    let coordinator = ScanCoordinator::new(host.clone(), store.clone());

    let outcome = coordinator
        .run_step("node", &references, ScanState::Unstarted)
        .await
        .unwrap();

    assert!(outcome.is_done());
    assert_eq!(outcome.progress, Progress::DONE);
    assert_eq!(outcome.attempted, 0);
    assert!(store.read().await.unwrap().is_empty());
}

#[tokio::test]
async fn load_gaps_are_skipped_not_failed() {
    let host = Arc::new(bulk_candidates(5));
    let references = node_references(&host);
    let storage = Arc::new(FlakyStorage::new(host.clone()));
    storage.drop_on_load([2, 3]);
    let store = Arc::new(MemoryReportStore::new());
    let coordinator = ScanCoordinator::new(storage.clone(), store.clone());

    let outcome = coordinator
        .run_step("node", &references, ScanState::Unstarted)
        .await
        .unwrap();

    assert_eq!(outcome.attempted, 5);
    assert_eq!(outcome.loaded, 3);
    assert_eq!(outcome.progress, Progress::DONE);
    assert_eq!(
        outcome.state,
        ScanState::Done(ScanTally {
            processed: 3,
            skipped: 2,
            total: 5
        })
    );
    assert_eq!(store.read().await.unwrap().source_count(), 3);
}

#[tokio::test]
async fn candidate_deleted_between_steps() {
    let host = Arc::new(bulk_candidates(31));
    let references = node_references(&host);
    let coordinator = ScanCoordinator::new(host.clone(), Arc::new(MemoryReportStore::new()));

    let first = coordinator
        .run_step("node", &references, ScanState::Unstarted)
        .await
        .unwrap();
    assert!(host.delete("node", 31u64));

    let second = coordinator
        .run_step("node", &references, first.state)
        .await
        .unwrap();
    assert_eq!(second.loaded, 0);
    assert_eq!(second.progress, Progress::DONE);
    assert_eq!(
        second.state,
        ScanState::Done(ScanTally {
            processed: 30,
            skipped: 1,
            total: 31
        })
    );
}

#[tokio::test]
async fn candidate_repaired_between_steps_yields_no_findings() {
    let host = Arc::new(bulk_candidates(31));
    let references = node_references(&host);
    let store = Arc::new(MemoryReportStore::new());
    let coordinator = ScanCoordinator::new(host.clone(), store.clone());

    let first = coordinator
        .run_step("node", &references, ScanState::Unstarted)
        .await
        .unwrap();
    assert_eq!(first.broken_targets, 30);

    // node 31 points at user 1031; restoring the user repairs it
    host.upsert(MemoryEntity {
        entity_type: "user".into(),
        id: EntityId::new(1031),
        bundle: "user".into(),
        values: Default::default(),
    });

    let second = coordinator
        .run_step("node", &references, first.state)
        .await
        .unwrap();
    assert_eq!(second.loaded, 1);
    assert_eq!(second.broken_targets, 0);
    assert_eq!(second.progress, Progress::DONE);
    assert_eq!(
        second.state,
        ScanState::Done(ScanTally {
            processed: 31,
            skipped: 0,
            total: 31
        })
    );
    assert_eq!(store.read().await.unwrap().source_count(), 30);
}

#[tokio::test]
async fn failed_merge_keeps_state_for_retry() {
    let host = Arc::new(bulk_candidates(35));
    let references = node_references(&host);
    let coordinator = ScanCoordinator::new(host.clone(), Arc::new(MemoryReportStore::new()));

    let first = coordinator
        .run_step("node", &references, ScanState::Unstarted)
        .await
        .unwrap();
    let before = first.state.clone();

    let store = Arc::new(FailingReportStore::failing_first(1));
    let flaky = ScanCoordinator::new(host.clone(), store.clone());
    let failure = flaky
        .run_step("node", &references, first.state)
        .await
        .unwrap_err();
    assert!(matches!(failure.source, ScanError::Store(_)));
    assert_eq!(failure.state, before);

    let retried = flaky
        .run_step("node", &references, failure.state)
        .await
        .unwrap();
    assert!(retried.is_done());
    assert_eq!(store.merge_attempts(), 2);
    assert_eq!(store.read().await.unwrap().source_count(), 5);
}

#[tokio::test]
async fn failed_load_keeps_state_for_retry() {
    let host = Arc::new(bulk_candidates(3));
    let references = node_references(&host);
    let storage = Arc::new(FlakyStorage::new(host.clone()));
    let coordinator = ScanCoordinator::new(storage.clone(), Arc::new(MemoryReportStore::new()))
        .with_page_size(2);

    let first = coordinator
        .run_step("node", &references, ScanState::Unstarted)
        .await
        .unwrap();
    let before = first.state.clone();

    storage.fail_next_loads(1);
    let failure = coordinator
        .run_step("node", &references, first.state)
        .await
        .unwrap_err();
    assert!(matches!(failure.source, ScanError::Load { .. }));
    assert_eq!(failure.state, before);

    let retried = coordinator
        .run_step("node", &references, failure.state)
        .await
        .unwrap();
    assert!(retried.is_done());

    let calls = storage.load_calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[1], calls[2]);
}

#[tokio::test]
async fn repeated_full_scans_give_identical_reports() {
    let host = Arc::new(mixed_site());
    let store = Arc::new(MemoryReportStore::new());
    let scanner = scanner(&host, store.clone()).with_config(ScanConfig::new().with_page_size(1));

    scanner.batch().unwrap().run_to_completion(|_| {}).await;
    let first = store.read().await.unwrap();
    scanner.batch().unwrap().run_to_completion(|_| {}).await;
    let second = store.read().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.target_count(), 5);
}

#[tokio::test]
async fn mixed_site_report_shape() {
    let host = Arc::new(mixed_site());
    let store = Arc::new(MemoryReportStore::new());
    let finished = scanner(&host, store.clone())
        .batch()
        .unwrap()
        .run_to_completion(|_| {})
        .await;

    assert!(finished.success);
    assert_eq!(finished.total, 2);
    assert_eq!(finished.completed, 2);

    let report = store.read().await.unwrap();
    assert_eq!(
        report.get("node", "article", "field_tags", EntityId::new(10)),
        Some(&[EntityId::new(8), EntityId::new(9)][..])
    );
    assert_eq!(
        report.get("taxonomy_term", "tags", "parent", EntityId::new(20)),
        Some(&[EntityId::new(99)][..])
    );
    assert!(report.entity_types().all(|t| t != "comment"));

    let summary = report.summary();
    assert_eq!(
        summary.headline(),
        "Total 4 of broken references between 4 different types."
    );
}

#[tokio::test]
async fn batch_failure_names_operation() {
    let host = Arc::new(single_broken_reference());
    let store = Arc::new(FailingReportStore::failing_first(1));
    let mut run = scanner(&host, store).batch().unwrap();

    let finished = run.run_to_completion(|_| {}).await;
    assert!(!finished.success);
    assert_eq!(
        finished.message,
        r#"An error occurred while processing scan node with arguments: {"bundle_key":"type","bundles":{"article":{"ref":"uuid"}}}"#
    );
}

#[tokio::test]
async fn batch_retries_retryable_failures() {
    let host = Arc::new(single_broken_reference());
    let store = Arc::new(FailingReportStore::failing_first(1));
    let finished = scanner(&host, store.clone())
        .batch()
        .unwrap()
        .with_retries(1)
        .run_to_completion(|_| {})
        .await;

    assert!(finished.success);
    assert_eq!(store.read().await.unwrap().target_count(), 1);
}

#[tokio::test]
async fn batch_reports_overall_progress() {
    let host = Arc::new(mixed_site());
    let coordinator =
        ScanCoordinator::new(host.clone(), Arc::new(MemoryReportStore::new())).with_page_size(1);
    let map = scanner(&host, Arc::new(MemoryReportStore::new()))
        .resolver()
        .resolve_reference_fields()
        .unwrap();
    let mut run = BatchRun::new(coordinator, map);

    let mut lines = Vec::new();
    while let Some(progress) = run.step().await.unwrap() {
        lines.push(progress.overall());
    }

    assert!(run.is_finished());
    assert_eq!(lines.first().unwrap(), "Processed 0 out of 2 entity types.");
    assert_eq!(lines.last().unwrap(), "Processed 2 out of 2 entity types.");
}

#[tokio::test]
async fn advisor_estimates_then_reports() {
    let host = Arc::new(mixed_site());
    let store = Arc::new(MemoryReportStore::new());
    let scanner = scanner(&host, store.clone());
    let advisor = scanner.advisor();

    assert_eq!(advisor.count_candidate_types().await.unwrap(), 2);
    assert!(advisor.has_candidates("node").await.unwrap());
    assert!(!advisor.has_candidates("comment").await.unwrap());

    let empty = store.read().await.unwrap();
    assert_eq!(advisor.advisory(&empty).await.unwrap(), Advisory::Estimate(2));

    scanner.batch().unwrap().run_to_completion(|_| {}).await;
    let report = store.read().await.unwrap();
    let advisory = advisor.advisory(&report).await.unwrap();
    assert!(matches!(advisory, Advisory::Report(_)));
    assert_eq!(
        advisory.to_string(),
        "Total 4 of broken references between 4 different types."
    );
}

#[tokio::test]
async fn clean_site_advisory() {
    let host = Arc::new(clean_site());
    let store = Arc::new(MemoryReportStore::new());
    let advisor = scanner(&host, store.clone()).advisor();

    let report = store.read().await.unwrap();
    assert_eq!(advisor.advisory(&report).await.unwrap(), Advisory::Clean);
}
