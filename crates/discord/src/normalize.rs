//! Discord's autocompleted emoji written the way RuneScape players type them.

const EMOTICONS: &[(char, &str)] = &[
    ('\u{2764}', "<3"),
    ('\u{1F494}', "</3"),
    ('\u{1F622}', ":'("),
    ('\u{1F617}', ":*"),
    ('\u{1F603}', ":)"),
    ('\u{1F604}', ":D"),
    ('\u{1F609}', ";)"),
    ('\u{1F610}', ":|"),
    ('\u{1F62E}', ":o"),
    ('\u{1F620}', ">:("),
    ('\u{1F626}', ":("),
    ('\u{1F615}', ":/"),
];

/// Variation selector Discord appends to `❤`.
const EMOJI_PRESENTATION: char = '\u{FE0F}';

pub fn normalize_emoji(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut replaced = false;
    for c in text.chars() {
        if c == EMOJI_PRESENTATION && replaced {
            continue;
        }
        match EMOTICONS.iter().find(|(emoji, _)| *emoji == c) {
            Some((_, emoticon)) => {
                out.push_str(emoticon);
                replaced = true;
            },
            None => {
                out.push(c);
                replaced = false;
            },
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("i ❤ this", "i <3 this")]
    #[case("i ❤\u{FE0F} this", "i <3 this")]
    #[case("💔", "</3")]
    #[case("😢😗😃😄😉😐😮😠😦😕", ":'(:*:):D;):|:o>:(:(:/")]
    #[case("no emoji here", "no emoji here")]
    #[case("🙂 stays", "🙂 stays")]
    #[case("\u{FE0F} alone", "\u{FE0F} alone")]
    fn maps_emoticons(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_emoji(input), expected);
    }
}
