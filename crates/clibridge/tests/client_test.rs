//! ChatClient behavior over a scripted transport

mod common;

use clibridge::{BridgeError, ChatClient, PromptBuilder, TransportMode};
use clibridge_protocol::{ChatTurn, FragmentKind};
use clibridge_transport::TransportError;
use common::fake_transport::FakeTransport;
use futures::StreamExt;
use std::time::Duration;

fn client(fake: &FakeTransport) -> ChatClient {
    ChatClient::with_transport("codex", "gpt-5-codex", fake.shared())
}

fn question() -> Vec<ChatTurn> {
    vec![ChatTurn::user("Say hi")]
}

#[tokio::test]
async fn test_exec_concatenates_deltas() {
    let fake = FakeTransport::new(TransportMode::Exec).respond(&[
        r#"{"type":"session.started"}"#,
        r#"{"delta":{"content":"Hi"}}"#,
        r#"{"delta":{"content":" there"}}"#,
    ]);

    let answer = client(&fake).chat(&question()).await.unwrap();
    assert_eq!(answer, "Hi there");

    let sent = fake.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].model, "gpt-5-codex");
    assert_eq!(sent[0].prompt, PromptBuilder::build(&question()));
}

#[tokio::test]
async fn test_exec_takes_last_final_and_stdio_takes_first() {
    let lines = [r#"{"result":"first"}"#, r#"{"result":"second"}"#];

    let exec = FakeTransport::new(TransportMode::Exec).respond(&lines);
    assert_eq!(client(&exec).chat(&question()).await.unwrap(), "second");

    let stdio = FakeTransport::new(TransportMode::DaemonStdio).respond(&lines);
    assert_eq!(client(&stdio).chat(&question()).await.unwrap(), "first");
}

#[tokio::test]
async fn test_plain_text_exec_output() {
    let fake = FakeTransport::new(TransportMode::Exec).respond(&["Hello", "", "world"]);
    let answer = client(&fake).chat(&question()).await.unwrap();
    assert_eq!(answer, "Hello\n\nworld");
}

#[tokio::test]
async fn test_daemon_timeout_answers_with_last_line() {
    let fake = FakeTransport::new(TransportMode::DaemonStdio).respond_then_fail(
        &["thinking...", "still thinking"],
        TransportError::Timeout(Duration::from_secs(1)),
    );
    let answer = client(&fake).chat(&question()).await.unwrap();
    assert_eq!(answer, "still thinking");
}

#[tokio::test]
async fn test_daemon_timeout_without_output() {
    let fake = FakeTransport::new(TransportMode::DaemonStdio)
        .respond_then_fail(&[], TransportError::Timeout(Duration::from_secs(1)));
    let err = client(&fake).chat(&question()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Timeout(d) if d == Duration::from_secs(1)));
}

#[tokio::test]
async fn test_exec_timeout_is_an_error() {
    let fake = FakeTransport::new(TransportMode::Exec).respond_then_fail(
        &["partial"],
        TransportError::Timeout(Duration::from_secs(1)),
    );
    let err = client(&fake).chat(&question()).await.unwrap_err();
    assert!(matches!(err, BridgeError::Timeout(_)));
}

#[tokio::test]
async fn test_empty_turns_never_reach_the_transport() {
    let fake = FakeTransport::new(TransportMode::Exec);
    let client = client(&fake);

    let err = client.chat(&[]).await.unwrap_err();
    assert!(matches!(err, BridgeError::InvalidRequest(_)));
    assert!(client.stream_chat(&[]).is_err());
    assert_eq!(fake.send_count(), 0);
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let fake = FakeTransport::new(TransportMode::Exec).respond(&[r#"{"delta":{"content":"Hi"}}"#]);
    let stream = client(&fake).stream_chat(&question()).unwrap();
    assert_eq!(fake.send_count(), 0);

    let fragments: Vec<_> = stream.collect().await;
    assert_eq!(fake.send_count(), 1);
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].as_ref().unwrap().text, "Hi");
}

#[tokio::test]
async fn test_exec_stream_yields_deltas_in_order() {
    let fake = FakeTransport::new(TransportMode::Exec).respond(&[
        r#"{"delta":{"content":"Hi"}}"#,
        r#"{"delta":{"content":" there"}}"#,
        r#"{"result":"Hi there"}"#,
    ]);
    let texts: Vec<String> = client(&fake)
        .stream_chat(&question())
        .unwrap()
        .map(|f| f.unwrap().text)
        .collect()
        .await;
    assert_eq!(texts, vec!["Hi", " there"]);
}

#[tokio::test]
async fn test_exec_stream_falls_back_to_plain_text() {
    let fake = FakeTransport::new(TransportMode::Exec).respond(&["just text"]);
    let fragments: Vec<_> = client(&fake).stream_chat(&question()).unwrap().collect().await;
    assert_eq!(fragments.len(), 1);
    assert_eq!(fragments[0].as_ref().unwrap().text, "just text");
}

#[tokio::test]
async fn test_exec_stream_with_no_output_fails() {
    let fake = FakeTransport::new(TransportMode::Exec).respond(&[]);
    let fragments: Vec<_> = client(&fake).stream_chat(&question()).unwrap().collect().await;
    assert!(matches!(fragments.as_slice(), [Err(BridgeError::MalformedResponse(_))]));
}

#[tokio::test]
async fn test_daemon_stream_cuts_word_groups() {
    let answer = "one two three four five six seven eight nine ten eleven twelve thirteen";
    let reply = format!(r#"{{"result":"{}"}}"#, answer);
    let fake = FakeTransport::new(TransportMode::DaemonStdio).respond(&[&reply]);

    let fragments: Vec<_> = client(&fake)
        .stream_chat(&question())
        .unwrap()
        .map(|f| f.unwrap())
        .collect()
        .await;
    assert_eq!(fragments.len(), 2);
    assert!(fragments.iter().all(|f| f.kind == FragmentKind::WordGroup));
    assert_eq!(fragments[1].text, "thirteen");
}

#[tokio::test]
async fn test_model_override() {
    let fake = FakeTransport::new(TransportMode::DaemonStdio).respond(&[r#"{"result":"ok"}"#]);
    client(&fake)
        .chat_with_model(&question(), Some("o4-mini"))
        .await
        .unwrap();
    assert_eq!(fake.sent()[0].model, "o4-mini");
}

#[tokio::test]
async fn test_upstream_error_line() {
    let fake = FakeTransport::new(TransportMode::Exec)
        .respond(&[r#"{"error":{"message":"quota exceeded"}}"#]);
    let err = client(&fake).chat(&question()).await.unwrap_err();
    match err {
        BridgeError::UpstreamError(message) => assert_eq!(message, "quota exceeded"),
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_send_failure_maps_to_bridge_error() {
    let fake = FakeTransport::new(TransportMode::Exec).fail_send(TransportError::ProcessNotFound {
        program: "codex".into(),
    });
    let err = client(&fake).chat(&question()).await.unwrap_err();
    assert!(matches!(err, BridgeError::ProcessNotFound { ref program } if program == "codex"));
}

#[tokio::test]
async fn test_clones_share_the_transport() {
    let fake = FakeTransport::new(TransportMode::DaemonStdio)
        .respond(&[r#"{"result":"a"}"#])
        .respond(&[r#"{"result":"b"}"#]);
    let first = client(&fake);
    let second = first.clone();

    let (q1, q2) = (question(), question());
    let (a, b) = tokio::join!(first.chat(&q1), second.chat(&q2));
    let mut answers = vec![a.unwrap(), b.unwrap()];
    answers.sort();
    assert_eq!(answers, vec!["a", "b"]);
    assert_eq!(fake.send_count(), 2);
    assert_eq!(first.state().await, Some(clibridge::DaemonState::Ready));
}
