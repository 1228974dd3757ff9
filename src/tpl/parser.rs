use crate::Result;
use crate::error::TplError;
use crate::tpl::ast::{AstNode, Filter};
use crate::tpl::lexer::{Token, TokenKind};
use log::debug;

/// Builds the AST from a token stream.
///
/// Blocks are matched by scanning forward for the end tag with the same helper
/// name, counting nested same-name blocks, and the tokens in between are parsed
/// recursively as the block's children. The source text is never re-scanned.
pub fn parse(tokens: &[Token]) -> Result<Vec<AstNode>> {
    let mut nodes = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        match token.kind {
            TokenKind::Text => {
                append_text(&mut nodes, &token.raw);
                i += 1;
            }
            TokenKind::Variable => {
                nodes.push(parse_variable(token.name()));
                i += 1;
            }
            TokenKind::BlockStart => {
                let helper = token.name();
                let end = find_block_end(tokens, i, helper)
                    .ok_or_else(|| TplError::unclosed_block(helper, token.offset))?;
                let children = parse(&tokens[i + 1..end])?;
                nodes.push(AstNode::Block {
                    helper: helper.to_string(),
                    args: token.params[1..].to_vec(),
                    children,
                });
                i = end + 1;
            }
            TokenKind::BlockEnd => {
                debug!(
                    "Parse: dropping unmatched block end '{}' at offset {}",
                    token.name(),
                    token.offset
                );
                i += 1;
            }
            TokenKind::Partial => {
                nodes.push(AstNode::Partial {
                    name: token.name().to_string(),
                    context: token.params.get(1).cloned(),
                });
                i += 1;
            }
        }
    }

    Ok(nodes)
}

/// Index of the end tag closing the block that starts at `start`.
fn find_block_end(tokens: &[Token], start: usize, helper: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (idx, token) in tokens.iter().enumerate().skip(start + 1) {
        if token.name() != helper {
            continue;
        }
        match token.kind {
            TokenKind::BlockStart => depth += 1,
            TokenKind::BlockEnd => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// `path | filter a b | other` -> `Var`. A path with several words is an
/// inline helper call.
fn parse_variable(expr: &str) -> AstNode {
    let mut segments = expr.split('|');
    let mut head = segments.next().unwrap_or("").split_whitespace();
    let path = head.next().unwrap_or("").to_string();
    let args = head.map(str::to_string).collect();

    let filters = segments
        .filter_map(|segment| {
            let mut words = segment.split_whitespace();
            let name = words.next()?;
            Some(Filter {
                name: name.to_string(),
                args: words.map(str::to_string).collect(),
            })
        })
        .collect();

    AstNode::Var {
        path,
        args,
        filters,
    }
}

/// Append text, merging with the previous text node when possible.
fn append_text(nodes: &mut Vec<AstNode>, text: &str) {
    if let Some(AstNode::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(AstNode::Text(text.to_string()));
    }
}
