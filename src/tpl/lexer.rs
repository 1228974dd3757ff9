#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Variable,
    BlockStart,
    BlockEnd,
    Partial,
}

/// A lexed template fragment.
///
/// `params` depends on the kind:
/// - `Text`: empty, the content is `raw`
/// - `Variable`: `[expr]`
/// - `BlockStart`: `[name, args...]`
/// - `BlockEnd`: `[name]`
/// - `Partial`: `[name]` or `[name, context_expr]`
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub raw: String,
    pub params: Vec<String>,
    /// Byte offset of the token start in the template source.
    pub offset: usize,
}

impl Token {
    /// First parameter: the helper/partial name or the variable expression.
    pub fn name(&self) -> &str {
        self.params.first().map(String::as_str).unwrap_or("")
    }
}

/// Scanner over the template text.
///
/// Tags are tried in a fixed order at every position: block start, block end,
/// partial, comment, variable. The first one matching wins; otherwise plain text
/// is consumed up to the next `{{`, or a single character when the `{{` at the
/// current position did not form a valid tag.
struct Lexer<'a> {
    template: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(template: &'a str) -> Self {
        Self {
            template,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn tokenize(mut self) -> Vec<Token> {
        while self.pos < self.template.len() {
            if self.try_block_start()
                || self.try_block_end()
                || self.try_partial()
                || self.try_comment()
                || self.try_variable()
            {
                continue;
            }
            self.scan_text();
        }
        self.tokens
    }

    /// `{{#name arg1 arg2}}`
    fn try_block_start(&mut self) -> bool {
        let Some((body, len)) = tag_body(&self.template[self.pos..]) else {
            return false;
        };
        let Some(rest) = body.trim_start().strip_prefix('#') else {
            return false;
        };
        let params: Vec<String> = rest.split_whitespace().map(str::to_string).collect();
        match params.first() {
            Some(name) if is_name(name) => {
                self.push(TokenKind::BlockStart, len, params);
                true
            }
            _ => false,
        }
    }

    /// `{{/name}}`
    fn try_block_end(&mut self) -> bool {
        let Some((body, len)) = tag_body(&self.template[self.pos..]) else {
            return false;
        };
        let Some(rest) = body.trim_start().strip_prefix('/') else {
            return false;
        };
        let name = rest.trim();
        if !is_name(name) {
            return false;
        }
        self.push(TokenKind::BlockEnd, len, vec![name.to_string()]);
        true
    }

    /// `{{> name context_expr}}`
    fn try_partial(&mut self) -> bool {
        let Some((body, len)) = tag_body(&self.template[self.pos..]) else {
            return false;
        };
        let Some(rest) = body.trim_start().strip_prefix('>') else {
            return false;
        };
        let params: Vec<String> = rest.split_whitespace().take(2).map(str::to_string).collect();
        if params.is_empty() {
            return false;
        }
        self.push(TokenKind::Partial, len, params);
        true
    }

    /// `{{!-- ... --}}`, dropped without emitting a token.
    fn try_comment(&mut self) -> bool {
        let remaining = &self.template[self.pos..];
        if !remaining.starts_with("{{!--") {
            return false;
        }
        match remaining[5..].find("--}}") {
            Some(end) => {
                self.pos += 5 + end + 4;
                true
            }
            None => false,
        }
    }

    /// `{{ expr }}`
    fn try_variable(&mut self) -> bool {
        let Some((body, len)) = tag_body(&self.template[self.pos..]) else {
            return false;
        };
        let expr = body.trim();
        if expr.is_empty() || expr.starts_with(['#', '/', '>']) {
            return false;
        }
        self.push(TokenKind::Variable, len, vec![expr.to_string()]);
        true
    }

    fn scan_text(&mut self) {
        let remaining = &self.template[self.pos..];
        let next_stop = match remaining.find("{{") {
            // The `{{` here did not form a tag: consume one character to make progress.
            Some(0) => 1,
            Some(idx) => idx,
            None => remaining.len(),
        };
        self.append_text(next_stop);
    }

    fn push(&mut self, kind: TokenKind, len: usize, params: Vec<String>) {
        self.tokens.push(Token {
            kind,
            raw: self.template[self.pos..self.pos + len].to_string(),
            params,
            offset: self.pos,
        });
        self.pos += len;
    }

    /// Append text, merging with the previous text token when possible.
    fn append_text(&mut self, len: usize) {
        let text = &self.template[self.pos..self.pos + len];
        match self.tokens.last_mut() {
            Some(last) if last.kind == TokenKind::Text => last.raw.push_str(text),
            _ => self.tokens.push(Token {
                kind: TokenKind::Text,
                raw: text.to_string(),
                params: Vec::new(),
                offset: self.pos,
            }),
        }
        self.pos += len;
    }
}

/// Splits `{{body}}` at the start of `s`, returning the body and the full tag length.
/// A body running into another `{{` is not a tag.
fn tag_body(s: &str) -> Option<(&str, usize)> {
    let inner = s.strip_prefix("{{")?;
    let end = inner.find("}}")?;
    let body = &inner[..end];
    if body.contains("{{") {
        return None;
    }
    Some((body, end + 4))
}

fn is_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '@')
}

/// Converts template text into a token stream. Never fails: malformed tags
/// degrade to text.
pub fn tokenize(template: &str) -> Vec<Token> {
    Lexer::new(template).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_plain_text() {
        let tokens = tokenize("hello world");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].raw, "hello world");
        assert_eq!(tokens[0].offset, 0);
    }

    #[test]
    fn test_variable_with_offsets() {
        let tokens = tokenize("Hello {{ name }}!");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::Text, TokenKind::Variable, TokenKind::Text]
        );
        assert_eq!(tokens[1].params, vec!["name"]);
        assert_eq!(tokens[1].raw, "{{ name }}");
        assert_eq!(tokens[1].offset, 6);
        assert_eq!(tokens[2].offset, 16);
    }

    #[test]
    fn test_block_tokens() {
        let tokens = tokenize("{{#each items}}x{{/each}}");
        assert_eq!(
            kinds(&tokens),
            vec![TokenKind::BlockStart, TokenKind::Text, TokenKind::BlockEnd]
        );
        assert_eq!(tokens[0].params, vec!["each", "items"]);
        assert_eq!(tokens[2].params, vec!["each"]);
        assert_eq!(tokens[2].offset, 16);
    }

    #[test]
    fn test_partial_token() {
        let tokens = tokenize("{{> card user}}");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Partial);
        assert_eq!(tokens[0].params, vec!["card", "user"]);

        let tokens = tokenize("{{>card}}");
        assert_eq!(tokens[0].params, vec!["card"]);
    }

    #[test]
    fn test_comment_is_dropped() {
        let tokens = tokenize("a{{!-- {{name}} is }} ignored --}}b");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].raw, "ab");
    }

    #[test]
    fn test_malformed_tags_degrade_to_text() {
        let tokens = tokenize("a {{ unclosed");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].raw, "a {{ unclosed");

        let tokens = tokenize("{{#}} {{/}} {{>}} {{}}");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].raw, "{{#}} {{/}} {{>}} {{}}");
    }

    #[test]
    fn test_nested_open_braces() {
        let tokens = tokenize("{{ {{x}}");
        assert_eq!(kinds(&tokens), vec![TokenKind::Text, TokenKind::Variable]);
        assert_eq!(tokens[0].raw, "{{ ");
        assert_eq!(tokens[1].params, vec!["x"]);
    }

    #[test]
    fn test_multibyte_text() {
        let tokens = tokenize("héllo {{名前}} ✓");
        assert_eq!(tokens[1].params, vec!["名前"]);
        assert_eq!(tokens[2].raw, " ✓");
    }
}
