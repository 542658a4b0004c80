//! Companion app DOM: selectors, page scripts and their results.
//!
//! The app renders inside the first child frame of the page, so every
//! script resolves its document through `window.frames[0]`.

use {
    chatsync_channels::{InboundMessage, PollOutcome},
    chatsync_config::ChatType,
    serde::Deserialize,
};

pub const APP_LOADED: &str = "body:not(.initial-load)";
pub const USERNAME_INPUT: &str = "input#username";
pub const PASSWORD_INPUT: &str = "input#password";
pub const LOGIN_BUTTON: &str = "button.icon-login";
pub const MODAL: &str = "div.modal-body.ng-scope";
pub const SAVE_CREDENTIALS_DIALOG: &str = "div[ng-include=\"'partials/save_credentials.ws'\"]";
pub const MODAL_CANCEL: &str = "a[ng-click='modalCancel()']";
pub const CHAT_TAB: &str = "li.all-chat";
pub const CHAT_SECTION: &str = "section.chat.all-chat.ng-scope";
pub const MESSAGE_INPUT: &str = "input#message";
pub const SUBMIT_BUTTON: &str = "input[type='submit']";

const MESSAGE_LIST: &str = "div.content.push-top-double.push-bottom-double";
const OWN_MESSAGES: &str = "li.message.clearfix.ng-scope.my-message";
const OTHER_MESSAGES: &str = "li.message.clearfix.ng-scope:not(.my-message):not(.historical)";

/// Tab icon for the chat the bridge joins.
pub fn chat_tab(chat_type: ChatType) -> &'static str {
    match chat_type {
        ChatType::Clan => "i.icon-clanchat:not(.icon)",
        ChatType::Friends => "i.icon-friendschat:not(.icon)",
    }
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".into())
}

fn in_frame(body: &str) -> String {
    format!(
        "(() => {{ const frame = window.frames[0]; \
         const doc = frame ? frame.document : null; {body} }})()"
    )
}

/// `true` when `selector` matches (or, with `hidden`, does not match).
pub fn selector_state(selector: &str, hidden: bool) -> String {
    let test = if hidden {
        "=== null"
    } else {
        "!== null"
    };
    in_frame(&format!(
        "return !!doc && doc.querySelector({}) {test};",
        js_str(selector)
    ))
}

pub fn exists(selector: &str) -> String {
    selector_state(selector, false)
}

/// Clicks the element; `false` when it is missing.
pub fn click(selector: &str) -> String {
    in_frame(&format!(
        "const el = doc && doc.querySelector({}); if (!el) return false; el.click(); return true;",
        js_str(selector)
    ))
}

/// Clears and focuses an input so key events land in it.
pub fn focus_input(selector: &str) -> String {
    in_frame(&format!(
        "const el = doc && doc.querySelector({}); if (!el) return false; \
         frame.focus(); el.value = ''; el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.focus(); return true;",
        js_str(selector)
    ))
}

pub fn own_message_count() -> String {
    in_frame(&format!(
        "const list = doc && doc.querySelector({}); \
         const ul = list && list.querySelector('ul'); \
         return ul ? ul.querySelectorAll({}).length : 0;",
        js_str(MESSAGE_LIST),
        js_str(OWN_MESSAGES)
    ))
}

pub fn frame_markup() -> String {
    in_frame("return doc ? doc.documentElement.outerHTML : null;")
}

/// Reads the message after `cursor`, returning a [`ChatScan`].
pub fn scan_messages(cursor: i64) -> String {
    in_frame(&format!(
        "const list = doc && doc.querySelector({list}); \
         if (!list) return {{ container: false, count: 0, item: null }}; \
         const ul = list.querySelector('ul'); \
         if (!ul) return {{ container: true, count: 0, item: null }}; \
         const items = ul.querySelectorAll({others}); \
         const next = {cursor} + 1; \
         if (next < 0 || next >= items.length) return {{ container: true, count: items.length, item: null }}; \
         const li = items[next]; \
         const author = li.querySelector('.author'); \
         const text = li.querySelector('p'); \
         const first = (el) => el && el.childNodes.length ? el.childNodes[0].nodeValue : null; \
         return {{ container: true, count: items.length, item: {{ author: first(author), text: first(text) }} }};",
        list = js_str(MESSAGE_LIST),
        others = js_str(OTHER_MESSAGES),
    ))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannedItem {
    pub author: Option<String>,
    pub text: Option<String>,
}

/// Raw result of [`scan_messages`].
#[derive(Debug, Clone, Deserialize)]
pub struct ChatScan {
    pub container: bool,
    pub count: i64,
    pub item: Option<ScannedItem>,
}

impl ChatScan {
    pub fn into_outcome(self, cursor: i64) -> PollOutcome {
        if !self.container {
            return PollOutcome::Disconnected;
        }
        match self.item {
            Some(item) => PollOutcome::Message(InboundMessage {
                index: cursor + 1,
                text: item.text.unwrap_or_default(),
                author: item.author.map(|a| trim_author(&a)),
            }),
            // The list shrinks when the app reloads its history.
            None => PollOutcome::Idle {
                cursor: cursor.min(self.count - 1),
            },
        }
    }
}

/// Author nodes read `"Name - "`.
fn trim_author(raw: &str) -> String {
    raw.strip_suffix(" - ").unwrap_or(raw).trim().to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    fn scan(value: serde_json::Value) -> ChatScan {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn missing_container_is_disconnected() {
        let outcome = scan(json!({"container": false, "count": 0, "item": null})).into_outcome(4);
        assert_eq!(outcome, PollOutcome::Disconnected);
    }

    #[test]
    fn next_item_advances_cursor() {
        let outcome = scan(json!({
            "container": true,
            "count": 3,
            "item": {"author": "Zezima - ", "text": "buying gf"},
        }))
        .into_outcome(1);
        assert_eq!(
            outcome,
            PollOutcome::Message(InboundMessage {
                index: 2,
                text: "buying gf".into(),
                author: Some("Zezima".into()),
            })
        );
    }

    #[rstest]
    #[case(2, 3, 2)]
    #[case(7, 3, 2)]
    #[case(-1, 0, -1)]
    #[case(5, 0, -1)]
    fn idle_corrects_shrunk_history(#[case] cursor: i64, #[case] count: i64, #[case] expected: i64) {
        let outcome = scan(json!({"container": true, "count": count, "item": null}))
            .into_outcome(cursor);
        assert_eq!(outcome, PollOutcome::Idle { cursor: expected });
    }

    #[test]
    fn missing_text_and_author() {
        let outcome = scan(json!({
            "container": true,
            "count": 1,
            "item": {"author": null, "text": null},
        }))
        .into_outcome(-1);
        assert_eq!(
            outcome,
            PollOutcome::Message(InboundMessage {
                index: 0,
                text: String::new(),
                author: None,
            })
        );
    }

    #[rstest]
    #[case("Zezima - ", "Zezima")]
    #[case("Mod Ash", "Mod Ash")]
    #[case("A - B - ", "A - B")]
    fn author_suffix(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(trim_author(raw), expected);
    }

    #[test]
    fn scripts_quote_selectors() {
        let script = click(SAVE_CREDENTIALS_DIALOG);
        assert!(script.contains(r#""div[ng-include=\"'partials/save_credentials.ws'\"]""#));
        assert!(scan_messages(-1).contains("-1 + 1"));
        assert!(selector_state(MODAL, true).contains("=== null"));
    }

    #[test]
    fn chat_tabs() {
        assert!(chat_tab(ChatType::Clan).contains("clanchat"));
        assert!(chat_tab(ChatType::Friends).contains("friendschat"));
    }
}
