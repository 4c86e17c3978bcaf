//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port in a background thread
//! with its own runtime, then drives `Fitting` over real HTTP through the
//! built-in `UreqTransport`.

use std::io::Write;
use std::time::Duration;

use mock_server::{Echo, Info, Upload};
use pype_core::{
    FailureKind, Fitting, FittingError, Health, Method, RequestDescriptor, TracingLogger,
    TransportConfig, UreqTransport,
};
use serde_json::{json, Value};

/// Start the mock server on a random port and return its base URL.
fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn fitting() -> Fitting {
    Fitting::default().with_logger(TracingLogger)
}

#[tokio::test]
async fn get_decodes_typed_result() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base).suffix("/info").method(Method::Get);

    let env = fitting().send_request::<Info>(&descriptor).await.unwrap();

    assert_eq!(env.status().health(), Health::Good);
    assert!(env.status().response_utc() >= env.status().request_utc());
    let info = env.into_result().unwrap();
    assert_eq!(info.name, "mock-server");
    assert_eq!(info.version, 1);
}

#[tokio::test]
async fn post_delivers_parameters_and_headers() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base)
        .suffix("/echo")
        .method(Method::Post)
        .header("X-Trace", "integration")
        .parameter("x", "y")
        .parameter("nested", json!({"n": [1, 2, 3]}));

    let env = fitting().send_request::<Echo>(&descriptor).await.unwrap();

    assert!(env.is_good(), "{:?}", env.diagnostic());
    let echo = env.into_result().unwrap();
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.content_type.as_deref(), Some("application/json"));
    assert_eq!(echo.headers.get("x-trace").map(String::as_str), Some("integration"));
    assert_eq!(echo.body, Some(json!({"x": "y", "nested": {"n": [1, 2, 3]}})));
}

#[tokio::test]
async fn put_delivers_parameters() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base)
        .suffix("/echo")
        .method(Method::Put)
        .parameter("x", "y");

    let echo = fitting()
        .send_request::<Echo>(&descriptor)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(echo.method, "PUT");
    assert_eq!(echo.body, Some(json!({"x": "y"})));
}

#[tokio::test]
async fn bodyless_methods_send_no_body() {
    let base = start_server();
    for method in [Method::Get, Method::Patch, Method::Delete] {
        let descriptor = RequestDescriptor::new(&base)
            .suffix("/echo")
            .method(method)
            .parameter("ignored", true);

        let echo = fitting()
            .send_request::<Echo>(&descriptor)
            .await
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(echo.method, method.as_str());
        assert!(echo.body.is_none(), "{method} should not carry a body");
    }
}

#[tokio::test]
async fn default_user_agent_is_sent() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base).suffix("/echo").method(Method::Get);

    let echo = fitting()
        .send_request::<Echo>(&descriptor)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let agent = echo.headers.get("user-agent").unwrap();
    assert!(agent.starts_with("pype/"), "{agent}");
}

#[tokio::test]
async fn descriptor_user_agent_replaces_default() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base)
        .suffix("/echo")
        .method(Method::Get)
        .header("User-Agent", "inventory-sync/2.0");

    let echo = fitting()
        .send_request::<Echo>(&descriptor)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(echo.headers.get("user-agent").map(String::as_str), Some("inventory-sync/2.0"));
}

#[tokio::test]
async fn custom_content_type_is_sent() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base)
        .suffix("/echo")
        .method(Method::Get)
        .content_type("text/plain");

    let echo = fitting()
        .send_request::<Echo>(&descriptor)
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(echo.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn body_over_ten_mebibytes_is_read_in_full() {
    let base = start_server();
    let len = 11 * 1024 * 1024;
    let descriptor = RequestDescriptor::new(&base)
        .suffix(format!("/big/{len}"))
        .method(Method::Get);

    let env = fitting().send_request::<String>(&descriptor).await.unwrap();

    assert_eq!(env.status().health(), Health::Good, "{:?}", env.diagnostic());
    assert_eq!(env.into_result().unwrap().len(), len);
}

#[tokio::test]
async fn error_status_is_bad_health() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base)
        .suffix("/status/503")
        .method(Method::Get);

    let env = fitting().send_request_json(&descriptor).await.unwrap();

    assert_eq!(env.status().health(), Health::Bad);
    assert!(env.result().is_none());
    let failure = env.failure().unwrap();
    assert_eq!(failure.kind(), FailureKind::ProtocolError);
    assert_eq!(failure.status_code(), Some(503));
}

#[tokio::test]
async fn no_content_decodes_as_null() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base)
        .suffix("/status/204")
        .method(Method::Delete);

    let env = fitting().send_request::<Option<Value>>(&descriptor).await.unwrap();

    assert!(env.is_good());
    assert_eq!(env.into_result(), Some(None));
}

#[tokio::test]
async fn non_json_body_is_generic_failure() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base).suffix("/text").method(Method::Get);

    let env = fitting().send_request_json(&descriptor).await.unwrap();

    assert_eq!(env.failure().unwrap().kind(), FailureKind::GenericFailure);
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let base = start_server();
    let config = TransportConfig {
        timeout: Some(Duration::from_millis(100)),
        ..TransportConfig::default()
    };
    let fitting = Fitting::new(UreqTransport::new(&config));
    let descriptor = RequestDescriptor::new(&base)
        .suffix("/delay/2000")
        .method(Method::Get);

    let env = fitting.send_request_json(&descriptor).await.unwrap();

    assert_eq!(env.status().health(), Health::Bad);
    assert_eq!(env.failure().unwrap().kind(), FailureKind::Timeout);
    assert!(env.diagnostic().unwrap().contains("timeout"));
}

#[tokio::test]
async fn unreachable_host_is_unknown_transport_failure() {
    // Bind then release a port so nothing is listening on it.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    let descriptor = RequestDescriptor::new(format!("http://{addr}"))
        .suffix("/info")
        .method(Method::Get);

    let env = fitting().send_request_json(&descriptor).await.unwrap();

    assert_eq!(env.status().health(), Health::Bad);
    assert_eq!(env.failure().unwrap().kind(), FailureKind::UnknownTransportFailure);
}

#[tokio::test]
async fn invalid_descriptor_raises() {
    let descriptor = RequestDescriptor::new("").suffix("/info").method(Method::Get);
    let err = fitting().send_request_json(&descriptor).await.unwrap_err();
    assert!(matches!(err, FittingError::MissingField("base_path")));
}

#[tokio::test]
async fn faucet_streams_large_payload() {
    let base = start_server();
    let fitting = fitting();
    let upload = RequestDescriptor::new(&base)
        .suffix("/uploads")
        .method(Method::Post)
        .content_type("application/octet-stream");

    let payload = vec![b'p'; 64 * 1024];
    let result = tokio::task::spawn_blocking({
        let fitting = fitting.clone();
        move || {
            let mut faucet = fitting.open_faucet(&upload)?;
            for chunk in payload.chunks(4096) {
                faucet.write_all(chunk).map_err(|e| {
                    FittingError::Faucet(pype_core::TransportError::unknown("write failed").with_source(e))
                })?;
            }
            faucet.finish().map_err(FittingError::Faucet)
        }
    })
    .await
    .unwrap();
    assert_eq!(result.unwrap(), 201);

    let list = RequestDescriptor::new(&base).suffix("/uploads").method(Method::Get);
    let uploads = fitting
        .send_request::<Vec<Upload>>(&list)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].bytes, 64 * 1024);
}

#[tokio::test]
async fn dropped_faucet_stores_nothing() {
    let base = start_server();
    let fitting = fitting();
    let upload = RequestDescriptor::new(&base)
        .suffix("/uploads")
        .method(Method::Post)
        .content_type("application/octet-stream");

    tokio::task::spawn_blocking({
        let fitting = fitting.clone();
        move || {
            let mut faucet = fitting.open_faucet(&upload).unwrap();
            faucet.write_all(&[b'p'; 1000]).unwrap();
            drop(faucet);
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let list = RequestDescriptor::new(&base).suffix("/uploads").method(Method::Get);
    let uploads = fitting
        .send_request::<Vec<Upload>>(&list)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert!(uploads.is_empty(), "{uploads:?}");
}

#[tokio::test]
async fn faucet_rejects_get() {
    let base = start_server();
    let descriptor = RequestDescriptor::new(&base).suffix("/info").method(Method::Get);
    let err = fitting().open_faucet(&descriptor).unwrap_err();
    assert!(matches!(err, FittingError::Faucet(_)));
}
