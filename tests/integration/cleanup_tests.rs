//! Temporary sources and child processes never outlive an execution

use shopiditor_exec::{ExecutionRequest, ExecutionStatus};
use shopiditor_tests::common::{leftovers, setup_test_logging, shell_service};

#[tokio::test]
async fn test_work_dir_empty_after_every_outcome() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let service = shell_service(dir.path());

    let cases = [
        ("echo ok", ExecutionStatus::Success),
        ("echo bad >&2", ExecutionStatus::Error),
        ("exit 7", ExecutionStatus::Error),
        ("sleep 10", ExecutionStatus::Timeout),
    ];

    for (code, expected) in cases {
        let response = service
            .execute(ExecutionRequest::new(code, "sh").with_timeout_ms(300))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "code: {}", code);
        assert!(
            leftovers(dir.path()).is_empty(),
            "leftovers after {:?}: {:?}",
            code,
            leftovers(dir.path())
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_timeouts_clean_up() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let service = shell_service(dir.path());

    let runs = (0..8).map(|i| {
        let service = service.clone();
        tokio::spawn(async move {
            let code = if i % 2 == 0 { "sleep 10" } else { "echo done" };
            service
                .execute(ExecutionRequest::new(code, "sh").with_timeout_ms(250))
                .await
                .unwrap()
        })
    });

    for (i, run) in futures::future::join_all(runs).await.into_iter().enumerate() {
        let response = run.unwrap();
        if i % 2 == 0 {
            assert_eq!(response.status(), ExecutionStatus::Timeout);
        } else {
            assert_eq!(response.output(), "done\n");
        }
    }

    assert!(leftovers(dir.path()).is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timed_out_process_is_reaped() {
    setup_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("pid");
    let service = shell_service(dir.path());

    let request = ExecutionRequest::new("echo $$ > \"$1\"; while true; do :; done", "sh")
        .with_arg(pid_file.to_string_lossy())
        .with_timeout_ms(300);
    let response = service.execute(request).await.unwrap();
    assert_eq!(response.status(), ExecutionStatus::Timeout);

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let pid = pid.trim();
    assert!(!pid.is_empty());
    assert!(
        !std::path::Path::new("/proc").join(pid).exists(),
        "process {} outlived its execution",
        pid
    );
    assert!(leftovers(dir.path()).is_empty());
}
