/// Splits a chat message into arguments.
///
/// Arguments are separated by whitespace. A `"` starts a quoted span that runs
/// until the next `"`, so multi-word arguments can be passed as `"some name"`.
/// If the message begins with the command, the first argument is the command.
pub fn tokenize(message: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in message.chars() {
        match c {
            '"' if quoted => {
                quoted = false;
                push_arg(&mut args, &mut current);
            }
            '"' => quoted = true,
            c if c.is_whitespace() && !quoted => push_arg(&mut args, &mut current),
            c => current.push(c),
        }
    }
    // an unterminated quote keeps whatever it collected
    push_arg(&mut args, &mut current);
    args
}

fn push_arg(args: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        args.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::tokenize;

    #[test]
    fn splits_on_spaces() {
        assert_eq!(tokenize("!addplayer bob"), vec!["!addplayer", "bob"]);
    }

    #[test]
    fn single_word_is_kept() {
        assert_eq!(tokenize("!help"), vec!["!help"]);
    }

    #[test]
    fn empty_message() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn repeated_whitespace_is_collapsed() {
        assert_eq!(tokenize("  a   b\tc\n"), vec!["a", "b", "c"]);
    }

    #[test]
    fn quoted_span_is_one_argument() {
        assert_eq!(
            tokenize(r#"!addplayer "Big Bad Wolf" extra"#),
            vec!["!addplayer", "Big Bad Wolf", "extra"]
        );
    }

    #[test]
    fn quote_inside_word_continues_it() {
        assert_eq!(tokenize(r#"ab"c d" e"#), vec!["abc d", "e"]);
    }

    #[test]
    fn closing_quote_ends_argument() {
        assert_eq!(tokenize(r#""one"two"#), vec!["one", "two"]);
    }

    #[test]
    fn empty_quotes_are_dropped() {
        assert_eq!(tokenize(r#"a "" b"#), vec!["a", "b"]);
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        assert_eq!(tokenize(r#"!changeign "New Name"#), vec!["!changeign", "New Name"]);
    }
}
