use futures_util::stream::{self, Stream};
use gloo_net::http::Request;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::ReadableStreamDefaultReader;

use crate::decode::Utf8Chunker;
use crate::models::{ChatRequest, ChatTurn};

/// Base URL of the backend API server. Empty means same origin.
const API_BASE: &str = match option_env!("DHARMA_CHAT_API_BASE") {
    Some(base) => base,
    None => "",
};

fn js_error(e: JsValue) -> String {
    format!("Stream error: {e:?}")
}

/// Reads one chunk from the body. `None` once the body is exhausted.
async fn read_chunk(reader: &ReadableStreamDefaultReader) -> Result<Option<Vec<u8>>, String> {
    let result = JsFuture::from(reader.read()).await.map_err(js_error)?;
    let done = Reflect::get(&result, &JsValue::from_str("done"))
        .map_err(js_error)?
        .as_bool()
        .unwrap_or(true);
    if done {
        return Ok(None);
    }
    let value = Reflect::get(&result, &JsValue::from_str("value")).map_err(js_error)?;
    Ok(Some(Uint8Array::new(&value).to_vec()))
}

struct BodyReader {
    reader: ReadableStreamDefaultReader,
    decoder: Utf8Chunker,
    finished: bool,
}

/// Posts `history` to the chat endpoint and returns the reply as a lazy
/// sequence of text fragments. The sequence can only be consumed once.
pub async fn stream_chat(
    history: &[ChatTurn],
) -> Result<impl Stream<Item = Result<String, String>>, String> {
    let body = ChatRequest { messages: history };

    let resp = Request::post(&format!("{API_BASE}/api/chat"))
        .json(&body)
        .map_err(|e| format!("Serialize error: {e}"))?
        .send()
        .await
        .map_err(|e| format!("Network error: {e}"))?;

    if !resp.ok() {
        return Err(format!("Server error: {}", resp.status()));
    }

    let reader: ReadableStreamDefaultReader = resp
        .body()
        .ok_or_else(|| "Response has no body".to_string())?
        .get_reader()
        .unchecked_into();

    let state = BodyReader { reader, decoder: Utf8Chunker::default(), finished: false };

    Ok(stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }
            match read_chunk(&st.reader).await {
                Ok(Some(bytes)) => {
                    let text = st.decoder.push(&bytes);
                    if !text.is_empty() {
                        return Some((Ok(text), st));
                    }
                }
                Ok(None) => {
                    st.finished = true;
                    if let Some(rest) = st.decoder.finish() {
                        return Some((Ok(rest), st));
                    }
                }
                Err(e) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
            }
        }
    }))
}
