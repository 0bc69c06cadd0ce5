use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bfetch::{
    AbortSignal, CallOptions, Client, ClientOptions, FetchError, Hooks, Request, Response,
    RetryOptions, StatusCode, Transport, TransportError,
};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue};

#[derive(Clone)]
enum Reply {
    Status(u16, &'static str, &'static str),
    Fail,
    Hang,
}

impl Reply {
    fn json(status: u16, body: &'static str) -> Self {
        Self::Status(status, "application/json", body)
    }
}

#[derive(Clone, Default)]
struct Scripted {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl Scripted {
    fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            requests: Arc::default(),
        }
    }

    /// Repeats one reply for every request.
    fn always(reply: Reply) -> Self {
        Self::new(std::iter::repeat(reply).take(64))
    }

    fn calls(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        self.requests.lock().expect("lock").push(request.clone());
        let reply = self
            .replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Reply::Fail);

        match reply {
            Reply::Status(code, content_type, body) => {
                let status = StatusCode::from_u16(code).map_err(TransportError::builder)?;
                let mut headers = HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
                Ok(Response {
                    status,
                    status_text: status.canonical_reason().unwrap_or_default().to_owned(),
                    headers,
                    body: Bytes::from_static(body.as_bytes()),
                })
            }
            Reply::Fail => Err(TransportError::network("connection refused")),
            Reply::Hang => std::future::pending().await,
        }
    }
}

type Trace = Arc<Mutex<Vec<String>>>;

fn recorder(trace: &Trace, event: &'static str, level: &'static str) -> impl Fn() + Send + Sync {
    let trace = trace.clone();
    move || trace.lock().expect("lock").push(format!("{event}:{level}"))
}

fn tracing_hooks(trace: &Trace, level: &'static str) -> Hooks {
    let before = recorder(trace, "before", level);
    let after = recorder(trace, "after", level);
    let retry = recorder(trace, "retry", level);
    let request_error = recorder(trace, "request_error", level);
    let response_error = recorder(trace, "response_error", level);
    let parse_error = recorder(trace, "parse_error", level);

    Hooks::new()
        .before_request(move |_| before())
        .after_response(move |_, _, _| after())
        .on_request_retry(move |_, _, _, _| retry())
        .on_request_error(move |_, _, _| request_error())
        .on_response_error(move |_, _, _, _| response_error())
        .on_response_parse_error(move |_, _, _, _| parse_error())
}

fn traced_call(transport: &Scripted, trace: &Trace) -> (Client, CallOptions) {
    let client = Client::with_transport(transport.clone())
        .extend(ClientOptions::new().hooks(tracing_hooks(trace, "client")));
    let options = CallOptions::new().hooks(tracing_hooks(trace, "call"));
    (client, options)
}

fn events(trace: &Trace) -> Vec<String> {
    trace.lock().expect("lock").clone()
}

#[tokio::test]
async fn hooks_fire_client_then_call_at_every_stage() {
    let transport = Scripted::new([Reply::json(503, "{}"), Reply::json(200, r#"{"ok":true}"#)]);
    let trace = Trace::default();
    let (client, options) = traced_call(&transport, &trace);

    let response = client
        .fetch("http://h/x", options)
        .await
        .expect("request must succeed after one retry");

    let body: serde_json::Value = response
        .json()
        .expect("json body")
        .expect("valid json");
    assert_eq!(body, serde_json::json!({"ok": true}));
    assert_eq!(
        events(&trace),
        [
            "before:client",
            "before:call",
            "after:client",
            "after:call",
            "retry:client",
            "retry:call",
            "before:client",
            "before:call",
            "after:client",
            "after:call",
        ]
    );
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn sustained_failure_retries_exactly_times() {
    let transport = Scripted::always(Reply::json(429, "{}"));
    let trace = Trace::default();
    let (client, options) = traced_call(&transport, &trace);

    let err = client
        .fetch("http://h/x", options.retry(RetryOptions::new().times(3)))
        .await
        .expect_err("request must fail");

    assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
    let events = events(&trace);
    let count = |name: &str| events.iter().filter(|event| *event == name).count();
    assert_eq!(count("retry:client"), 3);
    assert_eq!(count("retry:call"), 3);
    assert_eq!(count("before:client"), 4);
    assert_eq!(count("response_error:call"), 1);
    assert_eq!(events.last().map(String::as_str), Some("response_error:call"));
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn zero_times_disables_retries() {
    let transport = Scripted::always(Reply::json(500, "{}"));
    let client = Client::with_transport(transport.clone())
        .extend(ClientOptions::new().retry(RetryOptions::new().times(0)));

    client.get("http://h/x").await.expect_err("request must fail");

    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn status_outside_the_retry_set_is_not_retried() {
    let transport = Scripted::always(Reply::json(503, "{}"));
    let client = Client::with_transport(transport.clone());

    client
        .fetch(
            "http://h/x",
            CallOptions::new().retry(RetryOptions::new().times(5).status_codes([500])),
        )
        .await
        .expect_err("request must fail");

    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn retry_budget_is_captured_from_the_first_attempt() {
    let transport = Scripted::always(Reply::json(503, "{}"));
    let client = Client::with_transport(transport.clone());
    let hooks = Hooks::new().before_request(|options| {
        let next = match options.retry.times {
            None => 1,
            Some(_) => 10,
        };
        options.retry.times = Some(next);
    });

    client
        .fetch("http://h/x", CallOptions::new().hooks(hooks))
        .await
        .expect_err("request must fail");

    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn shrinking_the_budget_later_does_not_cut_retries_short() {
    let transport = Scripted::always(Reply::json(503, "{}"));
    let client = Client::with_transport(transport.clone());
    let hooks = Hooks::new().before_request(|options| {
        let next = match options.retry.times {
            None => 3,
            Some(_) => 0,
        };
        options.retry.times = Some(next);
    });

    client
        .fetch("http://h/x", CallOptions::new().hooks(hooks))
        .await
        .expect_err("request must fail");

    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn before_request_changes_apply_to_the_rebuilt_request() {
    let transport = Scripted::new([Reply::json(503, "{}"), Reply::json(200, "{}")]);
    let client = Client::with_transport(transport.clone());
    let hooks = Hooks::new().before_request(|options| {
        let attempt = options.headers.len() + 1;
        options.headers.push(("x-attempt".to_owned(), attempt.to_string()));
    });

    client
        .fetch("http://h/x", CallOptions::new().hooks(hooks))
        .await
        .expect("request must succeed");

    let attempts: Vec<_> = transport
        .requests()
        .iter()
        .map(|request| request.headers["x-attempt"].to_str().map(str::to_owned))
        .collect::<Result<_, _>>()
        .expect("ascii header");
    assert_eq!(attempts, ["1", "2"]);
}

#[tokio::test]
async fn before_request_switching_to_post_disables_retry() {
    let transport = Scripted::always(Reply::json(503, "{}"));
    let client = Client::with_transport(transport.clone());
    let hooks = Hooks::new().before_request(|options| {
        options.method = Some(http::Method::POST);
    });

    client
        .fetch("http://h/x", CallOptions::new().hooks(hooks))
        .await
        .expect_err("request must fail");

    assert_eq!(transport.calls(), 1);
    assert_eq!(transport.requests()[0].method, http::Method::POST);
}

#[tokio::test]
async fn transport_failures_are_never_retried() {
    let transport = Scripted::always(Reply::Fail);
    let trace = Trace::default();
    let (client, options) = traced_call(&transport, &trace);

    let err = client
        .fetch("http://h/x", options.retry(RetryOptions::new().times(3)))
        .await
        .expect_err("request must fail");

    assert!(matches!(err, FetchError::Request(_)));
    assert!(err.response().is_none());
    assert_eq!(
        events(&trace),
        [
            "before:client",
            "before:call",
            "request_error:client",
            "request_error:call",
        ]
    );
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn decode_failures_are_never_retried() {
    let transport = Scripted::always(Reply::json(200, "{"));
    let trace = Trace::default();
    let (client, options) = traced_call(&transport, &trace);

    let err = client
        .fetch("http://h/x", options.retry(RetryOptions::new().times(3)))
        .await
        .expect_err("request must fail");

    assert!(matches!(err, FetchError::Parse(_)));
    assert_eq!(
        events(&trace),
        [
            "before:client",
            "before:call",
            "after:client",
            "after:call",
            "parse_error:client",
            "parse_error:call",
        ]
    );
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn pre_aborted_signal_never_reaches_the_transport() {
    let transport = Scripted::always(Reply::json(200, "{}"));
    let client = Client::with_transport(transport.clone());
    let signal = AbortSignal::new();
    signal.abort();

    let err = client
        .fetch("http://h/x", CallOptions::new().signal(signal))
        .await
        .expect_err("request must be aborted");

    assert!(err.is_abort());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn abort_during_flight_is_a_transport_failure() {
    let transport = Scripted::always(Reply::Hang);
    let signal = AbortSignal::new();
    let client = Client::with_transport(transport.clone())
        .extend(ClientOptions::new().signal(signal.clone()));

    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.abort();
    });

    let err = client
        .fetch("http://h/x", CallOptions::new().retry(RetryOptions::new().times(3)))
        .await
        .expect_err("request must be aborted");

    match err {
        FetchError::Request(err) => assert!(matches!(err.source, TransportError::Aborted)),
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn call_timeout_overrides_client_timeout() {
    let transport = Scripted::always(Reply::Hang);
    let client = Client::with_transport(transport)
        .extend(ClientOptions::new().timeout(Duration::from_secs(30)));

    let started = tokio::time::Instant::now();
    let err = client
        .fetch(
            "http://h/x",
            CallOptions::new().timeout(Duration::from_millis(20)),
        )
        .await
        .expect_err("request must time out");

    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn retry_delay_is_awaited_between_attempts() {
    let transport = Scripted::new([Reply::json(503, "{}"), Reply::json(200, "{}")]);
    let client = Client::with_transport(transport.clone());

    let started = tokio::time::Instant::now();
    client
        .fetch(
            "http://h/x",
            CallOptions::new().retry(RetryOptions::new().delay(Duration::from_millis(30))),
        )
        .await
        .expect("request must succeed");

    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn abort_during_retry_delay_stops_without_another_attempt() {
    let transport = Scripted::always(Reply::json(503, "{}"));
    let signal = AbortSignal::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let record = errors.clone();
    let client = Client::with_transport(transport.clone());
    let hooks = Hooks::new().on_request_error(move |error, request, _| {
        record
            .lock()
            .expect("lock")
            .push((error.source.is_abort(), request.url.clone()));
    });

    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.abort();
    });

    let started = tokio::time::Instant::now();
    let err = client
        .fetch(
            "http://h/x",
            CallOptions::new()
                .signal(signal)
                .hooks(hooks)
                .retry(RetryOptions::new().times(3).delay(Duration::from_secs(30))),
        )
        .await
        .expect_err("request must be aborted");

    assert!(err.is_abort());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(transport.calls(), 1);
    assert_eq!(*errors.lock().expect("lock"), [(true, "http://h/x".to_owned())]);
}

#[tokio::test]
async fn retry_hook_sees_the_failed_response_and_request() {
    let transport = Scripted::new([Reply::json(408, "{}"), Reply::json(200, "{}")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let client = Client::with_transport(transport);
    let hooks = Hooks::new().on_request_retry(move |retry, response, request, _| {
        record
            .lock()
            .expect("lock")
            .push((retry, response.status, request.url.clone()));
    });

    client
        .fetch(
            "http://h/x",
            CallOptions::new().query("q", "1").hooks(hooks),
        )
        .await
        .expect("request must succeed");

    assert_eq!(
        *seen.lock().expect("lock"),
        [(1, StatusCode::REQUEST_TIMEOUT, "http://h/x?q=1".to_owned())]
    );
}
