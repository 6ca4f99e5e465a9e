use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::api;
use crate::models::ChatTurn;
use crate::session::{self, ChatSession};
use crate::storage::LocalStorageStore;

/// Shared widget state, provided via Leptos context.
#[derive(Clone, Copy)]
pub struct AppState {
    pub session: ReadSignal<ChatSession<LocalStorageStore>>,
    pub is_open: ReadSignal<bool>,

    pub set_session: WriteSignal<ChatSession<LocalStorageStore>>,
    pub set_is_open: WriteSignal<bool>,
}

impl AppState {
    /// Restore the saved conversation and provide the state in the current context.
    pub fn provide() -> Self {
        let (session, set_session) = signal(ChatSession::restore(LocalStorageStore::default()));
        let (is_open, set_is_open) = signal(false);

        let state = Self { session, is_open, set_session, set_is_open };
        provide_context(state);
        state
    }

    pub fn history(&self) -> Vec<ChatTurn> {
        self.session.with(|s| s.history().to_vec())
    }

    pub fn fragment(&self) -> String {
        self.session.with(|s| s.fragment().to_string())
    }

    pub fn is_sending(&self) -> bool {
        self.session.with(|s| s.is_sending())
    }

    pub fn new_chat(&self) {
        self.set_session.update(|s| s.new_chat());
    }

    /// Send a message and stream the reply into the session.
    pub fn send_message(&self, text: String) {
        let mut pending = None;
        self.set_session.update(|s| pending = s.begin_send(&text));
        let Some(pending) = pending else {
            return;
        };

        let set_session = self.set_session;
        spawn_local(async move {
            let id = pending.id;
            let result = match api::stream_chat(&pending.history).await {
                Ok(fragments) => {
                    session::fold_fragments(fragments, |f| {
                        set_session.update(|s| s.push_fragment(id, f));
                    })
                    .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(count) => {
                    log::debug!("Reply complete after {count} fragments");
                    set_session.update(|s| s.complete(id));
                }
                Err(e) => {
                    log::error!("Chat request failed: {e}");
                    set_session.update(|s| s.fail(id));
                }
            }
        });
    }
}
