//! Rendering relayed game messages for Discord.

use chrono::{DateTime, Utc};

/// Breaks a fence inside the text so it cannot close the code block.
const FENCE_ESCAPE: &str = "`\u{200b}``";

/// `HH:MM:SS: author:` header followed by the text in a code block.
pub fn render(text: &str, author: Option<&str>, timestamp: Option<DateTime<Utc>>) -> String {
    let mut out = String::new();
    if let Some(at) = timestamp {
        out.push_str(&at.format("%H:%M:%S:").to_string());
    }
    if let Some(author) = author {
        out.push(' ');
        out.push_str(author);
        out.push_str(":\n");
    }
    out.push_str("```\n");
    out.push_str(&text.replace("```", FENCE_ESCAPE));
    out.push_str("\n```");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, chrono::TimeZone};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 5, 7).unwrap()
    }

    #[test]
    fn full_header() {
        assert_eq!(
            render("hello", Some("Zezima"), Some(at())),
            "09:05:07: Zezima:\n```\nhello\n```"
        );
    }

    #[test]
    fn bare_text() {
        assert_eq!(render("hello", None, None), "```\nhello\n```");
    }

    #[test]
    fn timestamp_without_author() {
        assert_eq!(render("hi", None, Some(at())), "09:05:07:```\nhi\n```");
    }

    #[test]
    fn author_without_timestamp() {
        assert_eq!(render("hi", Some("bob"), None), " bob:\n```\nhi\n```");
    }

    #[test]
    fn escapes_fences() {
        let rendered = render("a ``` b", None, None);
        assert_eq!(rendered, "```\na `\u{200b}`` b\n```");
        assert_eq!(rendered.matches("```").count(), 2);
    }
}
