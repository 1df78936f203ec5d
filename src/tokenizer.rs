//! Splitting a raw command line into tokens.

use std::iter::Peekable;
use std::str::Chars;

/// Characters that open (and close) a quoted token.
pub const QUOTE_CHARS: [char; 3] = ['"', '\'', '`'];

/// Split `line` into whitespace-delimited tokens, honoring quotes.
///
/// A token that begins with a quote character runs until the matching close
/// quote, keeping any embedded whitespace. An unterminated quote runs to the
/// end of the input. Quote characters inside an unquoted token are literal.
pub fn tokenize(line: &str) -> Tokens<'_> {
    Tokens {
        chars: line.chars().peekable(),
    }
}

/// Iterator over the tokens of a single line. See [`tokenize`].
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Tokens<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn quoted(&mut self, quote: char) -> String {
        let mut token = String::new();
        for c in self.chars.by_ref() {
            if c == quote {
                return token;
            }
            token.push(c);
        }
        // implicit end quote
        token
    }

    fn bare(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.chars.next_if(|c| !c.is_whitespace()) {
            token.push(c);
        }
        token
    }
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.skip_whitespace();
        let first = *self.chars.peek()?;
        if QUOTE_CHARS.contains(&first) {
            self.chars.next();
            Some(self.quoted(first))
        } else {
            Some(self.bare())
        }
    }
}

impl std::iter::FusedIterator for Tokens<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(line: &str) -> Vec<String> {
        tokenize(line).collect()
    }

    #[test]
    fn test_empty_and_blank_lines_yield_nothing() {
        assert!(tokens("").is_empty());
        assert!(tokens("   ").is_empty());
        assert!(tokens("\t \n").is_empty());
    }

    #[test]
    fn test_whitespace_delimited() {
        assert_eq!(tokens("  a  bb\tccc "), vec!["a", "bb", "ccc"]);
    }

    #[test]
    fn test_empty_quoted_token() {
        assert_eq!(tokens("\"\""), vec![""]);
        assert_eq!(tokens("a '' b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_quoted_token_keeps_whitespace() {
        assert_eq!(
            tokens("copy \"my file.txt\" 'other file' `third one`"),
            vec!["copy", "my file.txt", "other file", "third one"]
        );
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        assert_eq!(tokens("String1 \"String 2"), vec!["String1", "String 2"]);
        assert_eq!(tokens("'  trailing  "), vec!["  trailing  "]);
    }

    #[test]
    fn test_other_quote_chars_inside_quotes_are_literal() {
        assert_eq!(tokens("\"it's `fine`\""), vec!["it's `fine`"]);
    }

    #[test]
    fn test_quote_inside_bare_token_is_literal() {
        assert_eq!(tokens("ab\"c d\""), vec!["ab\"c", "d\""]);
    }

    #[test]
    fn test_text_after_closing_quote_starts_new_token() {
        assert_eq!(tokens("\"ab\"cd"), vec!["ab", "cd"]);
    }

    #[test]
    fn test_iterator_is_fused() {
        let mut iter = tokenize("one");
        assert_eq!(iter.next().as_deref(), Some("one"));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }
}
