use herald_core::ArgumentError;

/// Shell-like argument splitting.
///
/// Handles:
/// - Whitespace-separated arguments
/// - Quoted strings (single and double quotes)
/// - Backslash escapes within double quotes
///
/// An unterminated quote is reported as an invalid argument.
pub fn shell_split(input: &str) -> Result<Vec<String>, ArgumentError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    // A quoted empty string ("") still produces an argument.
    let mut quoted = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if in_single_quote || in_double_quote {
        return Err(ArgumentError::invalid("Unterminated quote in arguments."));
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_split_simple() {
        let args = shell_split("ban hello world").unwrap();
        assert_eq!(args, vec!["ban", "hello", "world"]);
    }

    #[test]
    fn test_shell_split_quoted() {
        let args = shell_split(r#"@user "spamming links" 7d"#).unwrap();
        assert_eq!(args, vec!["@user", "spamming links", "7d"]);
    }

    #[test]
    fn test_shell_split_mixed_quotes() {
        let args = shell_split(r#""double's quote" 'single"s quote'"#).unwrap();
        assert_eq!(args, vec!["double's quote", r#"single"s quote"#]);
    }

    #[test]
    fn test_shell_split_escape_in_double_quotes() {
        let args = shell_split(r#""say \"hi\"""#).unwrap();
        assert_eq!(args, vec![r#"say "hi""#]);
    }

    #[test]
    fn test_shell_split_empty_quotes_kept() {
        let args = shell_split(r#"a "" b"#).unwrap();
        assert_eq!(args, vec!["a", "", "b"]);
    }

    #[test]
    fn test_shell_split_whitespace_only() {
        assert!(shell_split("   \t  ").unwrap().is_empty());
        assert!(shell_split("").unwrap().is_empty());
    }

    #[test]
    fn test_shell_split_unterminated() {
        assert!(matches!(
            shell_split(r#"say "oops"#),
            Err(ArgumentError::Invalid(_))
        ));
    }
}
