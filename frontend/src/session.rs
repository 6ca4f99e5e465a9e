use futures_util::{Stream, StreamExt};

use crate::models::ChatTurn;
use crate::storage::HistoryStore;

/// Shown in place of a reply whenever a request fails.
pub const FALLBACK_REPLY: &str = "抱歉，我现在无法回答。请稍后再试。";

/// A request handed out by [`ChatSession::begin_send`].
#[derive(Clone, Debug, PartialEq)]
pub struct PendingSend {
    /// Identifies the request; results for a superseded id are ignored.
    pub id: u64,
    /// The conversation to send, ending with the new user turn.
    pub history: Vec<ChatTurn>,
}

/// The chat widget's conversation plus the reply currently streaming in.
///
/// Every change to the committed history is written through to the store.
/// A streaming fragment is never persisted; it only becomes part of the
/// history once the reply completes.
#[derive(Debug)]
pub struct ChatSession<S> {
    store: S,
    history: Vec<ChatTurn>,
    fragment: String,
    in_flight: Option<u64>,
    /// A request dropped by `new_chat` whose response is still being read.
    abandoned: Option<u64>,
    next_id: u64,
}

impl<S: HistoryStore> ChatSession<S> {
    pub fn restore(store: S) -> Self {
        let history = store.load();
        Self { store, history, fragment: String::new(), in_flight: None, abandoned: None, next_id: 0 }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// True until the last request's task has finished, even if its reply
    /// was discarded by `new_chat`.
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some() || self.abandoned.is_some()
    }

    /// Records the user's turn and returns what should be sent upstream.
    /// `None` when the text is blank or another request is still running.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingSend> {
        if text.trim().is_empty() || self.is_sending() {
            return None;
        }

        self.history.push(ChatTurn::user(text));
        self.persist();

        let id = self.next_id;
        self.next_id += 1;
        self.in_flight = Some(id);
        self.fragment.clear();

        Some(PendingSend { id, history: self.history.clone() })
    }

    pub fn push_fragment(&mut self, id: u64, text: &str) {
        if self.in_flight == Some(id) {
            self.fragment.push_str(text);
        }
    }

    /// Folds the streamed fragment into a new assistant turn.
    pub fn complete(&mut self, id: u64) {
        if self.release_abandoned(id) || self.in_flight != Some(id) {
            return;
        }
        let reply = std::mem::take(&mut self.fragment);
        self.finish_with(ChatTurn::assistant(reply));
    }

    /// Drops whatever streamed so far and appends the fallback reply instead.
    pub fn fail(&mut self, id: u64) {
        if self.release_abandoned(id) || self.in_flight != Some(id) {
            return;
        }
        self.fragment.clear();
        self.finish_with(ChatTurn::assistant(FALLBACK_REPLY));
    }

    /// Forgets the whole conversation. A reply still streaming is discarded,
    /// but sending stays blocked until its request has finished.
    pub fn new_chat(&mut self) {
        self.history.clear();
        self.fragment.clear();
        if let Some(id) = self.in_flight.take() {
            self.abandoned = Some(id);
        }
        if let Err(e) = self.store.clear() {
            log::warn!("Failed to clear chat history: {e}");
        }
    }

    fn release_abandoned(&mut self, id: u64) -> bool {
        if self.abandoned == Some(id) {
            self.abandoned = None;
            true
        } else {
            false
        }
    }

    fn finish_with(&mut self, turn: ChatTurn) {
        self.history.push(turn);
        self.in_flight = None;
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.history) {
            log::warn!("Failed to save chat history: {e}");
        }
    }
}

/// Drains a reply stream in order, handing each fragment to `on_fragment`.
/// Returns the number of fragments, or the first error the stream yields.
pub async fn fold_fragments<St, E>(fragments: St, mut on_fragment: impl FnMut(&str)) -> Result<usize, E>
where
    St: Stream<Item = Result<String, E>>,
{
    let mut fragments = std::pin::pin!(fragments);
    let mut count = 0;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        on_fragment(&fragment);
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use futures::stream;

    use super::*;
    use crate::storage::MemoryStore;

    fn session_with(history: &[ChatTurn]) -> (ChatSession<MemoryStore>, MemoryStore) {
        let store = MemoryStore::default();
        store.save(history).unwrap();
        (ChatSession::restore(store.clone()), store)
    }

    /// Runs one send against `reply`, the way the widget does.
    fn run_send(
        session: &mut ChatSession<MemoryStore>,
        text: &str,
        reply: Vec<Result<String, String>>,
    ) -> PendingSend {
        let pending = session.begin_send(text).unwrap();
        let result = block_on(fold_fragments(stream::iter(reply), |f| session.push_fragment(pending.id, f)));
        match result {
            Ok(_) => session.complete(pending.id),
            Err(_) => session.fail(pending.id),
        }
        pending
    }

    #[test]
    fn restores_history_from_store() {
        let previous = vec![ChatTurn::user("q"), ChatTurn::assistant("a")];
        let (session, _) = session_with(&previous);
        assert_eq!(session.history(), previous.as_slice());
        assert!(!session.is_sending());
    }

    #[test]
    fn user_turn_is_persisted_before_the_reply() {
        let (mut session, store) = session_with(&[]);
        let pending = session.begin_send("何为正念？").unwrap();

        assert_eq!(pending.history, vec![ChatTurn::user("何为正念？")]);
        assert_eq!(store.persisted(), vec![ChatTurn::user("何为正念？")]);
        assert!(session.is_sending());
    }

    #[test]
    fn successful_reply_is_appended_and_persisted() {
        let previous = vec![ChatTurn::user("q1"), ChatTurn::assistant("a1")];
        let (mut session, store) = session_with(&previous);

        let pending = run_send(
            &mut session,
            "q2",
            vec![Ok("心".to_string()), Ok("无所住".to_string())],
        );

        let mut expected = previous.clone();
        expected.push(ChatTurn::user("q2"));
        assert_eq!(pending.history, expected);
        expected.push(ChatTurn::assistant("心无所住"));
        assert_eq!(store.persisted(), expected);
        assert_eq!(session.history(), expected.as_slice());
        assert_eq!(session.fragment(), "");
        assert!(!session.is_sending());
    }

    #[test]
    fn failure_appends_fallback_never_partial_text() {
        let previous = vec![ChatTurn::user("q1"), ChatTurn::assistant("a1")];
        let (mut session, store) = session_with(&previous);

        run_send(
            &mut session,
            "q2",
            vec![Ok("partial ".to_string()), Err("connection reset".to_string())],
        );

        let mut expected = previous.clone();
        expected.push(ChatTurn::user("q2"));
        expected.push(ChatTurn::assistant(FALLBACK_REPLY));
        assert_eq!(store.persisted(), expected);
        assert_eq!(session.fragment(), "");
        assert!(!session.is_sending());
    }

    #[test]
    fn fragment_accumulates_while_streaming() {
        let (mut session, store) = session_with(&[]);
        let pending = session.begin_send("q").unwrap();

        session.push_fragment(pending.id, "一");
        session.push_fragment(pending.id, "二");

        assert_eq!(session.fragment(), "一二");
        assert_eq!(store.persisted(), vec![ChatTurn::user("q")]);
    }

    #[test]
    fn blank_input_and_overlapping_sends_are_refused() {
        let (mut session, _) = session_with(&[]);
        assert_eq!(session.begin_send("   \n"), None);
        assert!(session.begin_send("first").is_some());
        assert_eq!(session.begin_send("second"), None);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn new_chat_clears_memory_and_store() {
        let (mut session, store) = session_with(&[ChatTurn::user("q"), ChatTurn::assistant("a")]);
        session.new_chat();
        assert!(session.history().is_empty());
        assert_eq!(store.raw(), None);

        // Also from an already empty state.
        session.new_chat();
        assert!(session.history().is_empty());
        assert_eq!(store.raw(), None);
    }

    #[test]
    fn new_chat_discards_a_reply_still_streaming() {
        let (mut session, store) = session_with(&[]);
        let pending = session.begin_send("q").unwrap();
        session.push_fragment(pending.id, "half");

        session.new_chat();
        session.push_fragment(pending.id, " more");

        assert!(session.history().is_empty());
        assert_eq!(session.fragment(), "");
        assert!(session.is_sending());
        assert_eq!(session.begin_send("again"), None);

        session.complete(pending.id);

        assert!(session.history().is_empty());
        assert_eq!(store.raw(), None);
        assert!(!session.is_sending());
        assert!(session.begin_send("again").is_some());
    }

    #[test]
    fn failed_abandoned_request_releases_sending_without_fallback() {
        let (mut session, store) = session_with(&[]);
        let pending = session.begin_send("q").unwrap();

        session.new_chat();
        session.fail(pending.id);

        assert!(session.history().is_empty());
        assert_eq!(store.raw(), None);
        assert!(!session.is_sending());
    }

    #[test]
    fn fold_stops_at_first_error() {
        let mut seen = Vec::new();
        let result = block_on(fold_fragments(
            stream::iter(vec![
                Ok("a".to_string()),
                Err("boom"),
                Ok("b".to_string()),
            ]),
            |f| seen.push(f.to_string()),
        ));
        assert_eq!(result, Err("boom"));
        assert_eq!(seen, vec!["a"]);
    }
}
