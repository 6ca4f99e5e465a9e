mod api;
mod components;
mod decode;
mod models;
mod session;
mod state;
mod storage;

use leptos::mount::mount_to_body;
use leptos::prelude::*;

use components::chat::ChatWidget;
use state::AppState;

/// Root component: restores the saved conversation and renders the widget.
#[component]
fn App() -> impl IntoView {
    AppState::provide();

    view! { <ChatWidget /> }
}

fn main() {
    console_log::init_with_level(log::Level::Debug).expect("Failed to init logger");
    mount_to_body(App);
}
