use leptos::ev;
use leptos::html;
use leptos::prelude::*;

use crate::models::{ChatTurn, Role};
use crate::state::AppState;

/// Floating chat button that opens into the chat panel.
#[component]
pub fn ChatWidget() -> impl IntoView {
    let state = expect_context::<AppState>();

    view! {
        <div class="chat-widget">
            <Show
                when=move || state.is_open.get()
                fallback=move || view! {
                    <button class="chat-toggle" title="AI 师傅" on:click=move |_| state.set_is_open.set(true)>
                        "💬"
                    </button>
                }
            >
                <ChatPanel />
            </Show>
        </div>
    }
}

/// Header, message history, streaming reply and input.
#[component]
fn ChatPanel() -> impl IntoView {
    let state = expect_context::<AppState>();
    let messages_ref = NodeRef::<html::Div>::new();

    // Keep the newest text in view as history grows and fragments stream in.
    Effect::new(move |_| {
        state.session.track();
        if let Some(container) = messages_ref.get() {
            container.set_scroll_top(container.scroll_height());
        }
    });

    view! {
        <div class="chat-panel">
            <div class="chat-header">
                <h3>"AI 师傅"</h3>
                <div class="chat-actions">
                    <button class="new-chat-btn" on:click=move |_| state.new_chat()>
                        "新对话"
                    </button>
                    <button class="close-btn" on:click=move |_| state.set_is_open.set(false)>
                        "×"
                    </button>
                </div>
            </div>

            <div class="messages-container" node_ref=messages_ref>
                {move || {
                    state
                        .history()
                        .into_iter()
                        .map(|turn| view! { <MessageBubble turn=turn /> })
                        .collect_view()
                }}
                // Reply streaming in
                {move || {
                    let text = state.fragment();
                    (!text.is_empty()).then(|| {
                        view! { <div class="message assistant streaming">{text}</div> }
                    })
                }}
                // Waiting for the first fragment
                {move || {
                    (state.is_sending() && state.fragment().is_empty()).then(|| {
                        view! { <div class="message assistant thinking">"思考中..."</div> }
                    })
                }}
            </div>

            <ChatInput />
        </div>
    }
}

/// A single chat message bubble.
#[component]
fn MessageBubble(turn: ChatTurn) -> impl IntoView {
    let css_class = match turn.role {
        Role::User => "message user",
        Role::Assistant => "message assistant",
    };

    view! {
        <div class=css_class data-role=turn.role.as_str()>
            {turn.content}
        </div>
    }
}

/// Chat input with textarea and send button.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();
    let (input, set_input) = signal(String::new());

    let is_sending = move || state.is_sending();

    let send = move || {
        let text = input.get_untracked();
        if text.trim().is_empty() || state.is_sending() {
            return;
        }
        set_input.set(String::new());
        state.send_message(text);
    };

    let on_keydown = move |ev: ev::KeyboardEvent| {
        if ev.key() == "Enter" && !ev.shift_key() {
            ev.prevent_default();
            send();
        }
    };

    view! {
        <div class="input-area">
            <textarea
                rows="1"
                placeholder="请输入您的问题..."
                prop:value=input
                on:input=move |ev| {
                    set_input.set(event_target_value(&ev));
                }
                on:keydown=on_keydown
                disabled=is_sending
            />
            <button
                class="send-btn"
                on:click=move |_| send()
                disabled=move || is_sending() || input.get().trim().is_empty()
            >
                {move || if is_sending() { "…" } else { "发送" }}
            </button>
        </div>
    }
}
