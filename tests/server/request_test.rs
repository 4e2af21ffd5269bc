//! Requests through a started supervisor.

use std::time::Duration;

use omnisharp_supervisor::events::ServerEvent;
use omnisharp_supervisor::protocol::commands;
use omnisharp_supervisor::queue::{Lane, RequestError};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{collect_until, options, Harness};

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct TypeLookup {
    r#type: String,
}

#[tokio::test]
async fn successful_response_resolves_with_body() {
    let mut harness = Harness::new(options(), true);
    let mut server = harness.start().await;

    let supervisor = harness.supervisor.clone();
    let pending = tokio::spawn(async move {
        supervisor
            .make_request::<TypeLookup>(commands::TYPE_LOOKUP, json!({"Line": 3}), None)
            .await
    });

    let request = server.next_request().await;
    assert_eq!(request["Type"], "request");
    assert_eq!(request["Command"], commands::TYPE_LOOKUP);
    assert_eq!(request["Arguments"]["Line"], 3);
    server
        .respond(&request, true, json!({"Type": "System.String"}), None)
        .await;

    let body = pending.await.unwrap().unwrap();
    assert_eq!(
        body,
        TypeLookup {
            r#type: "System.String".to_string()
        }
    );
}

#[tokio::test]
async fn failed_response_rejects_with_message_then_body() {
    let mut harness = Harness::new(options(), true);
    let mut server = harness.start().await;

    for (message, body, expected) in [
        (Some("boom"), json!("ignored"), "boom"),
        (None, json!("body text"), "body text"),
    ] {
        let supervisor = harness.supervisor.clone();
        let pending = tokio::spawn(async move {
            supervisor
                .request_value(commands::FIND_USAGES, Value::Null, None)
                .await
        });
        let request = server.next_request().await;
        server.respond(&request, false, body, message).await;

        assert_eq!(
            pending.await.unwrap(),
            Err(RequestError::Failed(expected.to_string()))
        );
    }
}

#[tokio::test]
async fn sequence_ids_are_monotonic() {
    let mut harness = Harness::new(options(), true);
    let mut server = harness.start().await;

    let mut seen = Vec::new();
    for _ in 0..3 {
        let supervisor = harness.supervisor.clone();
        let pending = tokio::spawn(async move {
            supervisor.request_value(commands::PROJECTS, Value::Null, None).await
        });
        let request = server.next_request().await;
        seen.push(request["Seq"].as_u64().unwrap());
        server.respond(&request, true, json!({}), None).await;
        pending.await.unwrap().unwrap();
    }

    assert_eq!(seen, vec![1, 2, 3]);
}

#[tokio::test]
async fn plain_text_output_does_not_stall_dispatch() {
    let mut harness = Harness::new(options(), true);
    let mut events = harness.supervisor.subscribe();
    let mut server = harness.start().await;

    let supervisor = harness.supervisor.clone();
    let pending = tokio::spawn(async move {
        supervisor.request_value(commands::CODE_CHECK, Value::Null, None).await
    });
    let request = server.next_request().await;

    server.write_line("not-json-at-all").await;
    server.write_line("{ broken json").await;
    server.respond(&request, true, json!([]), None).await;

    assert_eq!(pending.await.unwrap(), Ok(json!([])));
    let events = collect_until(&mut events, Duration::from_secs(1), |e| {
        matches!(e, ServerEvent::StdOut(_))
    })
    .await;
    assert!(events.contains(&ServerEvent::StdOut("not-json-at-all".to_string())));
}

#[tokio::test]
async fn cancelling_pending_request_skips_dispatch() {
    let mut harness = Harness::new(options(), true);
    let mut server = harness.start().await;

    // The priority lane holds one request in flight; the second waits.
    let supervisor = harness.supervisor.clone();
    let first = tokio::spawn(async move {
        supervisor.request_value(commands::UPDATE_BUFFER, json!({"n": 1}), None).await
    });
    let first_request = server.next_request().await;

    let token = CancellationToken::new();
    let supervisor = harness.supervisor.clone();
    let second_token = token.clone();
    let second = tokio::spawn(async move {
        supervisor
            .request_value(commands::UPDATE_BUFFER, json!({"n": 2}), Some(&second_token))
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.supervisor.queue().pending_len(Lane::Priority), 1);

    token.cancel();
    assert_eq!(
        second.await.unwrap(),
        Err(RequestError::Cancelled(commands::UPDATE_BUFFER.to_string()))
    );

    server.respond(&first_request, true, json!(null), None).await;
    assert_eq!(first.await.unwrap(), Ok(Value::Null));
    assert!(server.no_request_within(Duration::from_millis(200)).await);
}

#[tokio::test]
async fn requests_fail_when_not_started_and_after_stop() {
    let mut harness = Harness::new(options(), true);
    assert_eq!(
        harness
            .supervisor
            .request_value(commands::PROJECTS, Value::Null, None)
            .await,
        Err(RequestError::NotStarted)
    );

    let mut server = harness.start().await;
    let supervisor = harness.supervisor.clone();
    let outstanding = tokio::spawn(async move {
        supervisor.request_value(commands::PROJECTS, Value::Null, None).await
    });
    let _request = server.next_request().await;

    harness.supervisor.stop().await;

    assert_eq!(
        outstanding.await.unwrap(),
        Err(RequestError::ServerStopped(commands::PROJECTS.to_string()))
    );
    assert_eq!(
        harness
            .supervisor
            .request_value(commands::PROJECTS, Value::Null, None)
            .await,
        Err(RequestError::NotStarted)
    );
}

#[tokio::test]
async fn latency_is_reported_on_stop() {
    let mut harness = Harness::new(options(), true);
    let mut events = harness.supervisor.subscribe();
    let mut server = harness.start().await;

    let supervisor = harness.supervisor.clone();
    let pending = tokio::spawn(async move {
        supervisor.request_value(commands::PROJECTS, Value::Null, None).await
    });
    let request = server.next_request().await;
    server.respond(&request, true, json!({}), None).await;
    pending.await.unwrap().unwrap();

    harness.supervisor.stop().await;

    let events = collect_until(&mut events, Duration::from_secs(1), |e| {
        matches!(e, ServerEvent::ServerStop)
    })
    .await;
    let report = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::Telemetry(report) => Some(report),
            _ => None,
        })
        .expect("telemetry flushed on stop");
    assert_eq!(report.event_name, "omnisharp/projects");
    assert_eq!(report.measures.as_array().iter().sum::<u64>(), 1);
}

#[tokio::test]
async fn server_log_records_are_published() {
    let mut harness = Harness::new(options(), true);
    let mut events = harness.supervisor.subscribe();
    let mut server = harness.start().await;

    server
        .write_line(
            &json!({
                "Type": "event",
                "Event": "log",
                "Body": {"LogLevel": "WARNING", "Name": "OmniSharp.MSBuild", "Message": "Restore failed"}
            })
            .to_string(),
        )
        .await;

    let events = collect_until(&mut events, Duration::from_secs(1), |e| {
        matches!(e, ServerEvent::Log(_))
    })
    .await;
    let record = events
        .iter()
        .find_map(|e| match e {
            ServerEvent::Log(record) => Some(record),
            _ => None,
        })
        .expect("log published");
    assert_eq!(record.to_string(), "[warn]: OmniSharp.MSBuild\nRestore failed");
}
