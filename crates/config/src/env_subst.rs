//! `${VAR}` and `${VAR:-fallback}` placeholders in raw config text.

/// Substitute placeholders from the process environment.
///
/// Unset variables without a fallback are left as written so the
/// validator can point at them.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

pub(crate) fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        match (is_var_name(name), lookup(name), fallback) {
            (true, Some(value), _) if !value.is_empty() || fallback.is_none() => {
                out.push_str(&value)
            },
            (true, _, Some(fallback)) => out.push_str(fallback),
            _ => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// Placeholders still present after substitution.
pub fn unresolved(input: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if is_var_name(name) {
            names.push(name);
        }
        rest = &after[end + 1..];
    }
    names
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    fn lookup(name: &str) -> Option<String> {
        match name {
            "DISCORD_TOKEN" => Some("abc.def".into()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case("token = \"${DISCORD_TOKEN}\"", "token = \"abc.def\"")]
    #[case("${MISSING}", "${MISSING}")]
    #[case("${MISSING:-fallback}", "fallback")]
    #[case("${EMPTY:-fallback}", "fallback")]
    #[case("${EMPTY}", "")]
    #[case("${DISCORD_TOKEN:-unused}", "abc.def")]
    #[case("a ${DISCORD_TOKEN} b ${MISSING} c", "a abc.def b ${MISSING} c")]
    #[case("unterminated ${DISCORD_TOKEN", "unterminated ${DISCORD_TOKEN")]
    #[case("${not a var}", "${not a var}")]
    #[case("plain text", "plain text")]
    #[case("päss ${DISCORD_TOKEN} ✓", "päss abc.def ✓")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute_env_with(input, lookup), expected);
    }

    #[test]
    fn lists_unresolved_names() {
        let text = substitute_env_with("${DISCORD_TOKEN} ${RS_PASSWORD} ${OTHER:-x}", lookup);
        assert_eq!(unresolved(&text), ["RS_PASSWORD"]);
    }
}
