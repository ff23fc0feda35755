/// Splits command text into its name and arguments.
///
/// Arguments are separated by whitespace. Double quotes group words into one argument
/// (and may produce an empty one); inside quotes a backslash escapes the next character.
pub fn split_command_text(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = input.trim().chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            ch if ch.is_whitespace() && !in_quotes => {
                if in_token {
                    parts.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            ch => {
                current.push(ch);
                in_token = true;
            }
        }
    }

    if in_token {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::split_command_text;

    #[test]
    fn splits_on_runs_of_whitespace() {
        assert_eq!(
            split_command_text("  walk   Alice  3 "),
            vec!["walk", "Alice", "3"]
        );
    }

    #[test]
    fn quoted_segments_stay_together() {
        assert_eq!(
            split_command_text(r#"say Alice "hello there" done"#),
            vec!["say", "Alice", "hello there", "done"]
        );
    }

    #[test]
    fn escapes_inside_quotes() {
        assert_eq!(
            split_command_text(r#"say "she said \"hi\"""#),
            vec!["say", r#"she said "hi""#]
        );
    }

    #[test]
    fn empty_quotes_produce_empty_argument() {
        assert_eq!(split_command_text(r#"set name """#), vec!["set", "name", ""]);
        assert!(split_command_text("   ").is_empty());
    }
}
