//! End-to-end tests against shell scripts standing in for assistant CLIs

#![cfg(unix)]

mod common;

use clibridge::{BridgeError, ChatClient, DaemonState, PromptBuilder, TransportConfig};
use clibridge_protocol::ChatTurn;
use common::sh_fixture;
use futures::StreamExt;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_test::assert_ok;

fn exec_client(fixture: &str) -> ChatClient {
    assert_ok!(ChatClient::new(
        "codex",
        "codex",
        &TransportConfig::exec(sh_fixture(fixture)).with_timeout_secs(10),
    ))
}

#[tokio::test]
async fn test_delta_stub_chat_and_stream() {
    let client = exec_client("delta_stub.sh");
    let turns = vec![ChatTurn::user("Say hi")];

    let answer = assert_ok!(client.chat(&turns).await);
    assert_eq!(answer, "Hi there");

    let texts: Vec<String> = client
        .stream_chat(&turns)
        .unwrap()
        .map(|f| f.unwrap().text)
        .collect()
        .await;
    assert_eq!(texts, vec!["Hi", " there"]);
}

#[tokio::test]
async fn test_codex_event_stream() {
    let client = exec_client("codex_events_stub.sh");
    let answer = assert_ok!(client.chat(&[ChatTurn::user("What is 2+2?")]).await);
    assert_eq!(answer, "Four.");
}

#[tokio::test]
async fn test_failing_stub_reports_stderr() {
    let client = exec_client("failing_stub.sh");
    let err = client.chat(&[ChatTurn::user("hello")]).await.unwrap_err();
    match err {
        BridgeError::NonZeroExit { code, message } => {
            assert_eq!(code, Some(1));
            assert_eq!(message, "boom");
        }
        other => panic!("expected non-zero exit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_cli() {
    let client = assert_ok!(ChatClient::new(
        "codex",
        "codex",
        &TransportConfig::exec("definitely-not-an-assistant-cli --json"),
    ));
    let err = client.chat(&[ChatTurn::user("hello")]).await.unwrap_err();
    assert!(matches!(err, BridgeError::ProcessNotFound { .. }));
}

#[tokio::test]
async fn test_echo_daemon_serves_concurrent_callers() {
    let client = assert_ok!(ChatClient::new(
        "gemini",
        "gemini-2.5-pro",
        &TransportConfig::daemon_stdio(sh_fixture("echo_daemon.sh")).with_timeout_secs(10),
    ));
    assert_eq!(client.state().await, Some(DaemonState::NotStarted));

    let tasks: Vec<_> = (0..6)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let turns = vec![ChatTurn::user(format!("question {}", i))];
                let answer = client.chat(&turns).await.unwrap();
                (turns, answer)
            })
        })
        .collect();

    for task in tasks {
        let (turns, answer) = task.await.unwrap();
        let echoed: Value = serde_json::from_str(&answer).unwrap();
        assert_eq!(echoed["model"], "gemini-2.5-pro");
        assert_eq!(echoed["prompt"], PromptBuilder::build(&turns).as_str());
    }

    assert_eq!(client.state().await, Some(DaemonState::Ready));
    assert_ok!(client.shutdown().await);
    assert_eq!(client.state().await, Some(DaemonState::NotStarted));
}

#[tokio::test]
async fn test_silent_daemon_times_out() {
    let client = assert_ok!(ChatClient::new(
        "gemini",
        "gemini",
        &TransportConfig::daemon_stdio(sh_fixture("silent_daemon.sh")).with_timeout_secs(1),
    ));

    let started = Instant::now();
    let err = client.chat(&[ChatTurn::user("anyone?")]).await.unwrap_err();
    assert!(matches!(err, BridgeError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(3));

    // The daemon survives a timeout
    assert_eq!(client.state().await, Some(DaemonState::Ready));
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropping_exec_stream_kills_the_child() {
    let dir = tempfile::TempDir::new().unwrap();
    let pid_file = dir.path().join("pid");
    let marker = dir.path().join("finished");
    let command = format!(
        "{} '{}' '{}'",
        sh_fixture("slow_delta_stub.sh"),
        pid_file.display(),
        marker.display()
    );
    let client = assert_ok!(ChatClient::new(
        "codex",
        "codex",
        &TransportConfig::exec(command).with_timeout_secs(10),
    ));

    let mut stream = client.stream_chat(&[ChatTurn::user("Say hi")]).unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.text, "Hi");
    drop(stream);

    let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!marker.exists(), "exec child kept running after its stream was dropped");
    assert_not_running(&pid);
}

/// Gone, or at most a zombie awaiting reaping
#[cfg(target_os = "linux")]
fn assert_not_running(pid: &str) {
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let state = stat.rsplit(')').next().unwrap_or_default().split_whitespace().next();
        assert_eq!(state, Some("Z"), "process {} still running", pid);
    }
}

#[cfg(not(target_os = "linux"))]
fn assert_not_running(_pid: &str) {}

#[tokio::test]
async fn test_dropping_daemon_stream_keeps_daemon_ready() {
    let client = assert_ok!(ChatClient::new(
        "gemini",
        "gemini",
        &TransportConfig::daemon_stdio(sh_fixture("echo_daemon.sh")).with_timeout_secs(10),
    ));

    let mut stream = client.stream_chat(&[ChatTurn::user("first")]).unwrap();
    assert!(stream.next().await.unwrap().is_ok());
    drop(stream);
    assert_eq!(client.state().await, Some(DaemonState::Ready));

    let answer = assert_ok!(client.chat(&[ChatTurn::user("second")]).await);
    let echoed: Value = serde_json::from_str(&answer).unwrap();
    assert_eq!(echoed["prompt"], "User: second\n\nAssistant:");
    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_abandoning_a_daemon_request_mid_flight() {
    let client = assert_ok!(ChatClient::new(
        "gemini",
        "gemini",
        &TransportConfig::daemon_stdio(sh_fixture("silent_daemon.sh")).with_timeout_secs(10),
    ));

    let mut stream = client.stream_chat(&[ChatTurn::user("anyone?")]).unwrap();
    let pending = tokio::time::timeout(Duration::from_millis(300), stream.next()).await;
    assert!(pending.is_err());
    drop(stream);

    assert_eq!(client.state().await, Some(DaemonState::Ready));
    client.shutdown().await.unwrap();
}
