//! End-to-end dispatch, deadline and caching behaviour through ExecutionService

use shopiditor_exec::{
    ExecConfig, ExecutionRequest, ExecutionService, ExecutionStatus, RequestError, ResultCache,
    RuntimeSelector, TIMEOUT_MESSAGE,
};
use shopiditor_tests::common::{setup_test_logging, shell_service, StubRuntime};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn stub_service() -> ExecutionService {
    let selector = RuntimeSelector::new()
        .with_runtime(StubRuntime::new("primary", "javascript", &["js"]))
        .with_runtime(StubRuntime::new("fallback", "javascript", &["js", "node"]))
        .with_runtime(
            StubRuntime::new("slow", "slowlang", &[]).with_delay(Duration::from_secs(30)),
        );
    ExecutionService::new(selector, Arc::new(ResultCache::new()))
}

#[tokio::test]
async fn test_first_registered_runtime_wins() {
    setup_test_logging();
    let service = stub_service();

    let response = service
        .execute(ExecutionRequest::new("1", "JS"))
        .await
        .unwrap();
    assert_eq!(response.output(), "primary");

    let response = service
        .execute(ExecutionRequest::new("1", "node"))
        .await
        .unwrap();
    assert_eq!(response.output(), "fallback");

    assert_eq!(
        service.supported_languages(),
        vec!["javascript", "slowlang"]
    );
}

#[tokio::test]
async fn test_unsupported_language_is_client_error() {
    setup_test_logging();
    let service = stub_service();

    let err = service
        .execute(ExecutionRequest::new("print 1", "fortran"))
        .await
        .unwrap_err();

    assert_eq!(err, RequestError::UnsupportedLanguage("fortran".to_string()));
    assert!(service.cache().is_empty().await);
}

#[tokio::test]
async fn test_deadline_applies_to_any_runtime() {
    setup_test_logging();
    let service = stub_service();

    let started = Instant::now();
    let response = service
        .execute(ExecutionRequest::new("x", "slowlang").with_timeout_ms(200))
        .await
        .unwrap();

    assert_eq!(response.status(), ExecutionStatus::Timeout);
    assert_eq!(response.error_message(), TIMEOUT_MESSAGE);
    assert!(started.elapsed() < Duration::from_secs(2));

    let cached = service
        .result(&response.execution_id().to_string())
        .await
        .unwrap();
    assert_eq!(cached.status(), ExecutionStatus::Timeout);
}

#[tokio::test]
async fn test_shell_round_trip() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let service = shell_service(dir.path());

    let request = ExecutionRequest::new("echo \"hello $1\"", "sh").with_arg("world");
    let response = service.execute(request).await.unwrap();

    assert_eq!(response.status(), ExecutionStatus::Success);
    assert_eq!(response.output(), "hello world\n");
    assert!(response.error_message().is_empty());

    let cached = service
        .result(&response.execution_id().to_string())
        .await
        .unwrap();
    assert_eq!(cached, response);
}

#[tokio::test]
async fn test_shell_timeout_returns_promptly() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let service = shell_service(dir.path());

    let started = Instant::now();
    let response = service
        .execute(ExecutionRequest::new("while true; do :; done", "shell").with_timeout_ms(200))
        .await
        .unwrap();

    assert_eq!(response.status(), ExecutionStatus::Timeout);
    assert_eq!(response.error_message(), TIMEOUT_MESSAGE);
    assert!(started.elapsed() < Duration::from_millis(200) + Duration::from_secs(2));
}

#[tokio::test]
async fn test_request_json_envelope() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let service = shell_service(dir.path());

    let request: ExecutionRequest = serde_json::from_str(
        r#"{"code": "echo $1 $2", "language": "SH", "timeout": 2000, "arguments": ["a", "b"]}"#,
    )
    .unwrap();
    let response = service.execute(request).await.unwrap();
    let value = serde_json::to_value(&response).unwrap();

    assert_eq!(value["status"], "Success");
    assert_eq!(value["output"], "a b\n");
    assert_eq!(value["error"], "");
    assert!(value["executionTimeMs"].is_u64());
    assert!(value["executionId"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_default_configuration_runs_javascript_in_v8() {
    setup_test_logging();
    let service = ExecConfig::default().build_service().unwrap();

    let ok = service.execute(ExecutionRequest::new(
        "console.log('hi from ' + 'v8')",
        "javascript",
    ));
    let looping = service.execute(
        ExecutionRequest::new("while (true) {}", "js").with_timeout_ms(200),
    );
    let (ok, looping) = tokio::join!(ok, looping);

    let ok = ok.unwrap();
    assert_eq!(ok.status(), ExecutionStatus::Success);
    assert!(ok.output().contains("hi from v8"));

    let looping = looping.unwrap();
    assert_eq!(looping.status(), ExecutionStatus::Timeout);
    assert_eq!(service.cache().len().await, 2);
}
