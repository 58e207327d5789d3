use crate::core::io::traits::TextFormat;
use crate::core::models::tree::{NodeId, PhyloTree, PhyloTreeBuilder, TreeError};
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::warn;

/// Branch length given to the internal nodes inserted when a multifurcation is
/// resolved into a binary tree.
pub const EPSILON_BRANCH: f64 = 1e-7;

#[derive(Debug, Error)]
pub enum NewickError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unexpected end of Newick input")]
    UnexpectedEnd,
    #[error("Unexpected token '{token}' at token {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("Invalid branch length '{0}'")]
    InvalidLength(String),
    #[error("Internal node with a single child at token {0}")]
    UnaryNode(usize),
    #[error("Invalid tree: {0}")]
    Tree(#[from] TreeError),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Comma,
    Colon,
    End,
    Text(String),
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let flush = |text: &mut String, tokens: &mut Vec<Token>| {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            tokens.push(Token::Text(trimmed.to_string()));
        }
        text.clear();
    };
    for c in input.chars() {
        let delimiter = match c {
            '(' => Some(Token::Open),
            ')' => Some(Token::Close),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            ';' => Some(Token::End),
            _ => None,
        };
        match delimiter {
            Some(token) => {
                flush(&mut text, &mut tokens);
                tokens.push(token);
            }
            None => text.push(c),
        }
    }
    flush(&mut text, &mut tokens);
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    builder: PhyloTreeBuilder,
    binarized: bool,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Result<Token, NewickError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(NewickError::UnexpectedEnd)?;
        self.position += 1;
        Ok(token)
    }

    fn unexpected(&self, token: &Token) -> NewickError {
        NewickError::UnexpectedToken {
            token: format!("{token:?}"),
            position: self.position.saturating_sub(1),
        }
    }

    fn branch_length(&mut self) -> Result<f64, NewickError> {
        if self.peek() != Some(&Token::Colon) {
            return Ok(0.0);
        }
        self.position += 1;
        match self.next()? {
            Token::Text(value) => value
                .parse::<f64>()
                .map_err(|_| NewickError::InvalidLength(value)),
            other => Err(self.unexpected(&other)),
        }
    }

    fn subtree(&mut self) -> Result<NodeId, NewickError> {
        match self.next()? {
            Token::Open => {
                let start = self.position;
                let mut children = vec![self.subtree()?];
                loop {
                    match self.next()? {
                        Token::Comma => children.push(self.subtree()?),
                        Token::Close => break,
                        other => return Err(self.unexpected(&other)),
                    }
                }
                // Internal node labels carry no information for the likelihood.
                if let Some(Token::Text(_)) = self.peek() {
                    self.position += 1;
                }
                let length = self.branch_length()?;
                if children.len() < 2 {
                    return Err(NewickError::UnaryNode(start));
                }
                let node = self.resolve(&children, length)?;
                Ok(node)
            }
            Token::Text(name) => {
                let length = self.branch_length()?;
                Ok(self.builder.add_leaf(name, length))
            }
            other => Err(self.unexpected(&other)),
        }
    }

    /// Joins `children` into a binary subtree, nesting everything after the first
    /// child under epsilon-length branches.
    fn resolve(&mut self, children: &[NodeId], length: f64) -> Result<NodeId, NewickError> {
        if children.len() == 2 {
            return Ok(self.builder.join(children[0], children[1], length)?);
        }
        if !self.binarized {
            warn!("Input tree is not binary. Binarizing by adding epsilon-length branches.");
            self.binarized = true;
        }
        let right = self.resolve(&children[1..], EPSILON_BRANCH)?;
        Ok(self.builder.join(children[0], right, length)?)
    }
}

/// Newick trees, resolved into strictly binary [`PhyloTree`]s.
pub struct NewickFile;

impl NewickFile {
    pub fn parse(input: &str) -> Result<PhyloTree, NewickError> {
        let mut parser = Parser {
            tokens: tokenize(input),
            position: 0,
            builder: PhyloTreeBuilder::new(),
            binarized: false,
        };
        let root = parser.subtree()?;
        match parser.peek() {
            None | Some(Token::End) => {}
            Some(other) => {
                let other = other.clone();
                parser.position += 1;
                return Err(parser.unexpected(&other));
            }
        }
        Ok(parser.builder.build(root)?)
    }
}

impl TextFormat for NewickFile {
    type Value = PhyloTree;
    type Error = NewickError;

    fn read_from(reader: &mut impl BufRead) -> Result<Self::Value, Self::Error> {
        let mut content = String::new();
        for line in reader.lines() {
            content.push_str(line?.trim());
        }
        Self::parse(&content)
    }

    fn write_to(value: &Self::Value, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", value.newick_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_nested_binary_tree() {
        let tree = NewickFile::parse("((a:0.1,b:0.2):0.05,c:0.3);").unwrap();
        assert_eq!(tree.leaf_names(), vec!["a", "b", "c"]);
        assert!((tree.total_length() - 0.65).abs() < 1e-12);
    }

    #[test]
    fn root_branch_length_is_ignored() {
        let tree = NewickFile::parse("(a:1,b:1):5;").unwrap();
        assert!((tree.total_length() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn multifurcation_is_binarized_with_epsilon_branches() {
        let tree = NewickFile::parse("(a:0.1,b:0.2,c:0.3);").unwrap();
        assert_eq!(tree.leaf_names(), vec!["a", "b", "c"]);
        assert_eq!(tree.len(), 5);
        assert!((tree.total_length() - (0.6 + EPSILON_BRANCH)).abs() < 1e-12);
    }

    #[test]
    fn lines_are_concatenated_before_parsing() {
        let input = "((a:0.1,\n  b:0.2)\n:0.05,c:0.3);\n";
        let tree = NewickFile::read_from(&mut Cursor::new(input)).unwrap();
        assert_eq!(tree.leaf_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn invalid_branch_length_is_reported() {
        assert!(matches!(
            NewickFile::parse("(a:x,b:1);"),
            Err(NewickError::InvalidLength(value)) if value == "x"
        ));
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(matches!(
            NewickFile::parse("((a:1,b:1);"),
            Err(NewickError::UnexpectedToken { .. }) | Err(NewickError::UnexpectedEnd)
        ));
    }

    #[test]
    fn single_child_node_is_rejected() {
        assert!(matches!(NewickFile::parse("((a:1):1,b:1);"), Err(NewickError::UnaryNode(_))));
    }

    #[test]
    fn written_tree_parses_back() {
        let tree = NewickFile::parse("((a:0.1,b:0.2):0.05,c:0.3);").unwrap();
        let mut buffer = Vec::new();
        NewickFile::write_to(&tree, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.trim(), "((a:0.1,b:0.2):0.05,c:0.3);");
    }
}
