// Retry executor contract: fixed delay, bounded attempts, explicit
// retryable-vs-fatal classification exercised on both branches.

use kwscout::retry::{is_retryable, RetryExecutor, RetryPolicy};
use kwscout::ApiError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn executor(max_attempts: u32) -> RetryExecutor {
    RetryExecutor::new(RetryPolicy {
        max_attempts,
        delay: Duration::from_millis(5),
    })
}

fn server_error() -> ApiError {
    ApiError::Status {
        code: 503,
        url: "https://api.example.test/keywordstool".to_string(),
    }
}

fn client_error() -> ApiError {
    ApiError::Status {
        code: 400,
        url: "https://api.example.test/keywordstool".to_string(),
    }
}

#[tokio::test]
async fn succeeds_on_third_attempt_with_budget_of_three() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let value = executor(3)
        .execute("flaky op", move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(server_error())
                } else {
                    Ok(42u32)
                }
            }
        })
        .await
        .expect("third attempt succeeds");

    assert_eq!(value, 42);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn success_short_circuits_remaining_attempts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    executor(5)
        .execute("immediate", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApiError>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fatal_errors_are_not_retried() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let err = executor(3)
        .execute("bad request", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(client_error())
            }
        })
        .await
        .unwrap_err();

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(matches!(err, ApiError::Status { code: 400, .. }));
}

#[tokio::test]
async fn exhaustion_wraps_last_error_with_label_and_count() {
    let err = executor(3)
        .execute("always down", || async { Err::<(), _>(server_error()) })
        .await
        .unwrap_err();

    match err {
        ApiError::RetryExhausted {
            label,
            attempts,
            source,
        } => {
            assert_eq!(label, "always down");
            assert_eq!(attempts, 3);
            assert!(matches!(*source, ApiError::Status { code: 503, .. }));
        }
        other => panic!("expected RetryExhausted, got {other:?}"),
    }
}

#[test]
fn classification_table() {
    let url = "https://api.example.test".to_string();

    // Retryable: timeouts, network faults, 5xx, 408, 429
    assert!(is_retryable(&ApiError::Timeout { url: url.clone() }));
    assert!(is_retryable(&ApiError::Network {
        url: url.clone(),
        message: "connection reset".into()
    }));
    for code in [500, 502, 503, 504, 408, 429] {
        assert!(
            is_retryable(&ApiError::Status {
                code,
                url: url.clone()
            }),
            "{code} should be retryable"
        );
    }

    // Fatal: other 4xx, decode, missing data, our own throttle
    for code in [400, 401, 403, 404, 422] {
        assert!(
            !is_retryable(&ApiError::Status {
                code,
                url: url.clone()
            }),
            "{code} should be fatal"
        );
    }
    assert!(!is_retryable(&ApiError::Decode("bad json".into())));
    assert!(!is_retryable(&ApiError::MissingData("keywordList".into())));
    assert!(!is_retryable(&ApiError::RateLimited {
        route: "keyword_tool".into(),
        retry_after: Duration::from_secs(1)
    }));
}
