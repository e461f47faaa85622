//! Result cache bounds under service traffic

use futures::future::join_all;
use shopiditor_exec::{
    CacheConfig, ExecutionRequest, ExecutionService, ResultCache, RuntimeSelector,
};
use shopiditor_tests::common::{setup_test_logging, StubRuntime};
use std::sync::Arc;

fn service(config: CacheConfig) -> ExecutionService {
    let selector = RuntimeSelector::new().with_runtime(StubRuntime::new("echo", "echo", &[]));
    ExecutionService::new(selector, Arc::new(ResultCache::with_config(config)))
}

#[tokio::test]
async fn test_default_bounds_after_many_executions() {
    setup_test_logging();
    let service = service(CacheConfig::default());

    let mut last = None;
    for _ in 0..101 {
        let response = service
            .execute(ExecutionRequest::new("x", "echo"))
            .await
            .unwrap();
        assert!(service.cache().len().await <= 100);
        last = Some(response);
    }

    assert!(service.cache().len().await <= 50);
    // The entry that triggered the trim may or may not survive
    let last = last.unwrap();
    if let Some(found) = service.result(&last.execution_id().to_string()).await {
        assert_eq!(found, last);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_executions_respect_high_water() {
    setup_test_logging();
    let service = Arc::new(service(CacheConfig::new(20, 5)));

    let tasks = (0..200).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            let response = service
                .execute(ExecutionRequest::new(format!("{}", i), "echo"))
                .await
                .unwrap();
            assert!(service.cache().len().await <= 20);
            response
        })
    });

    for outcome in join_all(tasks).await {
        assert!(outcome.unwrap().is_success());
    }
    assert!(service.cache().len().await <= 20);
}
