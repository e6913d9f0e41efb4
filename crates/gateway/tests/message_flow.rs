//! Integration tests for the session driver: a Slack thread driven through
//! scripted assistant runs against a mocked ticket table.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use tb_gateway::runtime::{DriverError, FAILURE_NOTICE};
use tb_sessions::ThreadKey;

use common::*;

const TABLE_PATH: &str = "/v0/appTest/Tickets";

fn created_record() -> serde_json::Value {
    json!({
        "records": [{
            "id": "rec1",
            "createdTime": "2026-01-05T10:00:00.000Z",
            "fields": {
                "Title": "Laptop broken",
                "Details": "Screen flickers",
                "Priority": "High",
                "Created By": DISPLAY_NAME,
                "Status": "Pending"
            }
        }]
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ticket creation over several turns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn conversation_creates_exactly_one_ticket_with_sender_name() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path(TABLE_PATH).json_body(json!({
            "records": [{
                "fields": {
                    "Title": "Laptop broken",
                    "Details": "Screen flickers",
                    "Priority": "High",
                    "Created By": DISPLAY_NAME,
                    "Status": "Pending"
                }
            }]
        }));
        then.status(200).json_body(created_record());
    });

    let h = harness(
        vec![
            Turn::Reply("Sure. What should the ticket be called?"),
            Turn::Reply("Got it. Can you describe the problem?"),
            Turn::Reply("Thanks. What priority: Low, Medium or High?"),
            Turn::Tools(
                vec![tool_call(
                    "call_create",
                    "create_new_ticket",
                    json!({
                        "ticket_title": "Laptop broken",
                        "ticket_details": "Screen flickers",
                        "priority": "High"
                    }),
                )],
                "Your ticket 'Laptop broken' has been created.",
            ),
        ],
        &server.url(TABLE_PATH),
        fast_poll(10, 5),
    );

    let root = "1700000000.000100";
    let turns = [
        message(GENERAL_CHANNEL, root, None, "I need a new ticket"),
        message(GENERAL_CHANNEL, "1700000000.000200", Some(root), "Laptop broken"),
        message(GENERAL_CHANNEL, "1700000000.000300", Some(root), "Screen flickers"),
        message(GENERAL_CHANNEL, "1700000000.000400", Some(root), "High"),
    ];
    for msg in &turns {
        h.driver.handle(msg).await.unwrap();
    }

    create.assert_calls(1);

    // One thread, one session, one assistant definition.
    assert_eq!(h.runtime.sessions_created.load(Ordering::SeqCst), 1);
    assert_eq!(h.runtime.assistants_created.load(Ordering::SeqCst), 1);
    let sessions: Vec<String> = h
        .runtime
        .user_messages
        .lock()
        .iter()
        .map(|(s, _)| s.clone())
        .collect();
    assert_eq!(sessions, vec!["thread_0"; 4]);
    let key = ThreadKey::for_message(GENERAL_CHANNEL, root, None);
    assert_eq!(h.threads.lookup(&key).as_deref(), Some("thread_0"));

    // The tool output carries the stored ticket back to the assistant.
    let submitted = h.runtime.submitted.lock().clone();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].call_id, "call_create");
    let ticket: serde_json::Value = serde_json::from_str(&submitted[0].output).unwrap();
    assert_eq!(ticket["title"], "Laptop broken");

    // HR hears about it once; the user gets four threaded replies.
    let admin = h.notifier.to_channel(ADMIN_CHANNEL);
    assert_eq!(admin.len(), 1);
    assert!(admin[0].text.contains("Laptop broken"));
    assert!(admin[0].text.contains(DISPLAY_NAME));
    assert!(admin[0].text.contains("Screen flickers"));
    assert!(admin[0].text.contains("High"));

    let replies = h.notifier.to_channel(GENERAL_CHANNEL);
    assert_eq!(replies.len(), 4);
    assert!(replies.iter().all(|p| p.thread_ts.as_deref() == Some(root)));
    assert_eq!(replies[3].text, "Your ticket 'Laptop broken' has been created.");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run control
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn unknown_tool_gets_an_error_output_and_the_run_finishes() {
    let server = MockServer::start();
    let h = harness(
        vec![Turn::Tools(
            vec![tool_call("call_x", "reset_password", json!({}))],
            "I can't do that, but I can open a ticket.",
        )],
        &server.url(TABLE_PATH),
        fast_poll(10, 5),
    );

    let msg = message(GENERAL_CHANNEL, "1.0", None, "reset my password");
    h.driver.handle(&msg).await.unwrap();

    let submitted = h.runtime.submitted.lock().clone();
    assert_eq!(submitted.len(), 1);
    assert!(submitted[0].output.starts_with("Unknown tool 'reset_password'"));
    assert_eq!(
        h.notifier.to_channel(GENERAL_CHANNEL)[0].text,
        "I can't do that, but I can open a ticket."
    );
}

#[tokio::test]
async fn non_admin_listing_reaches_no_table() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.path(TABLE_PATH);
        then.status(200).json_body(json!({ "records": [] }));
    });
    let h = harness(
        vec![Turn::Tools(
            vec![tool_call("call_list", "get_all_tickets", json!({}))],
            "Only HR can see tickets.",
        )],
        &server.url(TABLE_PATH),
        fast_poll(10, 5),
    );

    h.driver
        .handle(&message(GENERAL_CHANNEL, "2.0", None, "show all tickets"))
        .await
        .unwrap();

    any.assert_calls(0);
    let submitted = h.runtime.submitted.lock().clone();
    assert_eq!(
        submitted[0].output,
        "You are not Authorized for this only HR personal can see the Tickets"
    );
}

#[tokio::test]
async fn stalled_run_times_out_and_is_cancelled_remotely() {
    let server = MockServer::start();
    let h = harness(vec![Turn::Stall], &server.url(TABLE_PATH), fast_poll(3, 5));

    let msg = message(GENERAL_CHANNEL, "3.0", None, "hello?");
    let err = h.driver.handle(&msg).await.unwrap_err();
    match err {
        DriverError::RunTimedOut { polls, .. } => assert_eq!(polls, 3),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(h.runtime.cancelled.lock().clone(), vec!["run_0".to_string()]);
    assert!(h.driver.cancels().is_empty());
}

#[tokio::test]
async fn run_that_keeps_requesting_tools_is_bounded() {
    let server = MockServer::start();
    let h = harness(
        vec![Turn::EndlessTools(vec![tool_call(
            "call_loop",
            "reset_password",
            json!({}),
        )])],
        &server.url(TABLE_PATH),
        fast_poll(3, 1),
    );

    let msg = message(GENERAL_CHANNEL, "3.1", None, "loop forever");
    let result = tokio::time::timeout(Duration::from_secs(3), h.driver.handle(&msg))
        .await
        .expect("driver returned");
    match result {
        Err(DriverError::RunTimedOut { polls, .. }) => assert_eq!(polls, 3),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(h.runtime.submitted.lock().len(), 3);
    assert_eq!(h.runtime.cancelled.lock().clone(), vec!["run_0".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_stops_a_run_between_tool_rounds() {
    let server = MockServer::start();
    let h = harness(
        vec![Turn::EndlessTools(vec![tool_call(
            "call_loop",
            "reset_password",
            json!({}),
        )])],
        &server.url(TABLE_PATH),
        fast_poll(u32::MAX, 60),
    );
    let key = ThreadKey::for_message(GENERAL_CHANNEL, "3.2", None);

    let task = {
        let driver = h.driver.clone();
        tokio::spawn(async move {
            driver
                .handle(&message(GENERAL_CHANNEL, "3.2", None, "loop"))
                .await
        })
    };

    for _ in 0..200 {
        if h.driver.cancels().is_running(key.as_str()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(h.driver.cancels().cancel(key.as_str()));

    let result = tokio::time::timeout(Duration::from_secs(3), task)
        .await
        .expect("run stopped")
        .unwrap();
    assert!(matches!(result, Err(DriverError::RunCancelled { .. })));
    assert_eq!(h.runtime.cancelled.lock().len(), 1);
}

#[tokio::test]
async fn failed_message_posts_a_notice_into_the_thread() {
    let server = MockServer::start();
    let h = harness(vec![Turn::Stall], &server.url(TABLE_PATH), fast_poll(1, 5));

    h.driver
        .process(message(GENERAL_CHANNEL, "4.0", Some("3.5"), "anyone?"))
        .await;

    let posts = h.notifier.to_channel(GENERAL_CHANNEL);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, FAILURE_NOTICE);
    assert_eq!(posts[0].thread_ts.as_deref(), Some("3.5"));
}

#[tokio::test]
async fn cancelling_a_thread_stops_its_run() {
    let server = MockServer::start();
    let h = harness(vec![Turn::Stall], &server.url(TABLE_PATH), fast_poll(1_000, 60));
    let key = ThreadKey::for_message(GENERAL_CHANNEL, "5.0", None);

    let task = {
        let driver = h.driver.clone();
        tokio::spawn(async move {
            driver
                .handle(&message(GENERAL_CHANNEL, "5.0", None, "wait"))
                .await
        })
    };

    for _ in 0..100 {
        if h.driver.cancels().is_running(key.as_str()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(h.driver.cancels().cancel(key.as_str()));

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("run stopped")
        .unwrap();
    assert!(matches!(result, Err(DriverError::RunCancelled { .. })));
    assert_eq!(h.runtime.cancelled.lock().len(), 1);
}

#[tokio::test]
async fn thread_binding_survives_a_restart() {
    let server = MockServer::start();
    let Harness {
        driver,
        threads,
        state_dir,
        ..
    } = harness(vec![Turn::Reply("hi")], &server.url(TABLE_PATH), fast_poll(10, 5));
    driver
        .handle(&message(GENERAL_CHANNEL, "6.0", None, "hello"))
        .await
        .unwrap();

    // Release the state-dir lock before reopening.
    drop(driver);
    drop(threads);

    let reopened = tb_sessions::ThreadMap::open(state_dir.path()).unwrap();
    let key = ThreadKey::for_message(GENERAL_CHANNEL, "6.0", None);
    assert_eq!(reopened.lookup(&key).as_deref(), Some("thread_0"));
}
