//! Fragment streams
//!
//! Exec transports stream for real: fragments are produced while the process
//! is still writing. Daemons answer in one piece, so their "stream" is the
//! finished answer cut into word groups.

use crate::error::{BridgeError, Result};
use crate::extract::ResponseAccumulator;
use clibridge_protocol::Fragment;
use clibridge_transport::{Exchange, ProcessTransport, TransportMode, TransportRequest};
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Stream of answer fragments
///
/// Dropping the stream stops reading; for exec transports that also kills the
/// process.
pub type FragmentStream = BoxStream<'static, Result<Fragment>>;

/// Words per synthesized fragment
pub const WORDS_PER_GROUP: usize = 12;

/// Split an answer into groups of [`WORDS_PER_GROUP`] words
///
/// Words are joined by single spaces and groups carry no trailing space; the
/// last group may be shorter.
pub fn word_groups(text: &str) -> Vec<Fragment> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(WORDS_PER_GROUP)
        .map(|group| Fragment::word_group(group.join(" ")))
        .collect()
}

/// Stream a finished answer as word groups
///
/// `answer` is not awaited until the stream is first polled.
pub fn synthesized<F>(answer: F) -> FragmentStream
where
    F: Future<Output = Result<String>> + Send + 'static,
{
    stream::once(answer)
        .flat_map(|result| {
            let items: Vec<Result<Fragment>> = match result {
                Ok(text) => word_groups(&text).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
        .boxed()
}

enum ExecStream {
    Pending {
        transport: Arc<dyn ProcessTransport>,
        request: TransportRequest,
    },
    Reading {
        exchange: Exchange,
        acc: ResponseAccumulator,
    },
    Done,
}

/// Stream fragments from an exec transport as the process writes them
///
/// Nothing is spawned until the stream is first polled.
pub fn live(transport: Arc<dyn ProcessTransport>, request: TransportRequest) -> FragmentStream {
    stream::unfold(ExecStream::Pending { transport, request }, advance).boxed()
}

async fn advance(state: ExecStream) -> Option<(Result<Fragment>, ExecStream)> {
    let (mut exchange, mut acc) = match state {
        ExecStream::Pending { transport, request } => match transport.send(&request).await {
            Ok(exchange) => (exchange, ResponseAccumulator::for_mode(TransportMode::Exec)),
            Err(e) => return Some((Err(e.into()), ExecStream::Done)),
        },
        ExecStream::Reading { exchange, acc } => (exchange, acc),
        ExecStream::Done => return None,
    };

    loop {
        match exchange.receive_line().await {
            Ok(Some(line)) => match acc.push(&line) {
                Ok(Some(fragment)) => {
                    return Some((Ok(fragment), ExecStream::Reading { exchange, acc }));
                }
                Ok(None) => {}
                Err(e) => return Some((Err(e), ExecStream::Done)),
            },
            Ok(None) => {
                debug!("exec stream finished");
                return match acc.stream_fallback() {
                    Some(fragment) => Some((Ok(fragment), ExecStream::Done)),
                    None if acc.has_content() => None,
                    None => Some((
                        Err(BridgeError::MalformedResponse(
                            "no answer found in assistant output".to_string(),
                        )),
                        ExecStream::Done,
                    )),
                };
            }
            Err(e) => return Some((Err(e.into()), ExecStream::Done)),
        }
    }
}
