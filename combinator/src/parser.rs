use std::ops::Range;

use thiserror::Error;

use crate::tree::{Node, NodeId, Tree};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum SyntaxError {
    #[error("statement cannot be empty")]
    Empty,
    #[error("parens do not match")]
    UnmatchedParen { position: usize },
    #[error("parens cannot be empty ()")]
    EmptyParens { position: usize },
}

impl SyntaxError {
    /// Char range of the offending parentheses.
    pub fn span(&self) -> Range<usize> {
        match *self {
            SyntaxError::Empty => 0..0,
            SyntaxError::UnmatchedParen { position } => position..position + 1,
            SyntaxError::EmptyParens { position } => position..position + 2,
        }
    }
}

/// Checks that `statement` is non-empty, has balanced parentheses and no `()`.
pub fn well_formed(statement: &str) -> Result<(), SyntaxError> {
    if statement.is_empty() {
        return Err(SyntaxError::Empty);
    }
    let mut open = Vec::new();
    let mut prev_open = false;
    for (position, ch) in statement.chars().enumerate() {
        match ch {
            '(' => {
                open.push(position);
                prev_open = true;
            }
            ')' => {
                if prev_open {
                    return Err(SyntaxError::EmptyParens {
                        position: position - 1,
                    });
                }
                if open.pop().is_none() {
                    return Err(SyntaxError::UnmatchedParen { position });
                }
            }
            _ => prev_open = false,
        }
    }
    match open.last() {
        Some(&position) => Err(SyntaxError::UnmatchedParen { position }),
        None => Ok(()),
    }
}

/// Parses a statement into a left-associated application tree.
///
/// `x(yz)w` becomes `((x (y z)) w)`: every symbol outside parentheses and every
/// parenthesised group is one operand, and operands are applied left to right.
pub fn parse(statement: &str) -> Result<Tree, SyntaxError> {
    well_formed(statement)?;
    let mut tree = Tree::with_capacity(2 * statement.len());
    let root = build(&mut tree, statement).ok_or(SyntaxError::Empty)?;
    tree.set_root(root);
    Ok(tree)
}

/// Parses `statement` into `tree`'s arena as a detached subtree.
pub fn graft(tree: &mut Tree, statement: &str) -> Result<NodeId, SyntaxError> {
    well_formed(statement)?;
    build(tree, statement).ok_or(SyntaxError::Empty)
}

fn build(tree: &mut Tree, statement: &str) -> Option<NodeId> {
    // One running application per open paren.
    let mut groups: Vec<Option<NodeId>> = vec![None];
    for ch in statement.chars() {
        let operand = match ch {
            '(' => {
                groups.push(None);
                continue;
            }
            ')' => match groups.pop().flatten() {
                Some(group) => group,
                None => continue,
            },
            symbol => tree.add_leaf(symbol),
        };
        let running = groups.last_mut()?;
        *running = Some(match running.take() {
            Some(applied) => tree.add_apply(applied, operand),
            None => operand,
        });
    }
    groups.pop().flatten()
}

/// Renders the subtree at `id` with the fewest parentheses: an operand is
/// parenthesised only when it is itself an application.
pub fn render(tree: &Tree, id: NodeId) -> String {
    enum Task {
        Spine(NodeId),
        Operand(NodeId),
        Close,
    }

    let mut out = String::new();
    let mut tasks = vec![Task::Spine(id)];
    while let Some(task) = tasks.pop() {
        match task {
            Task::Close => out.push(')'),
            Task::Operand(id) => match tree.node(id) {
                Node::Leaf(symbol) => out.push(symbol),
                Node::Apply(..) => {
                    out.push('(');
                    tasks.push(Task::Close);
                    tasks.push(Task::Spine(id));
                }
            },
            Task::Spine(mut id) => {
                // Outermost operand first, so the innermost one is popped first.
                let mut operands = Vec::new();
                while let Node::Apply(left, right) = tree.node(id) {
                    operands.push(right);
                    id = left;
                }
                if let Node::Leaf(symbol) = tree.node(id) {
                    out.push(symbol);
                }
                tasks.extend(operands.into_iter().map(Task::Operand));
            }
        }
    }
    out
}

/// Drops whitespace, which the statement syntax would otherwise read as symbols.
pub fn strip_whitespace(input: &str) -> String {
    input.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn canonical(statement: &str) -> String {
        parse(statement).unwrap().to_string()
    }

    #[test]
    fn test_parse() {
        let cases = [
            ("x", "x"),
            ("(x)", "x"),
            ("((x))", "x"),
            ("xx", "xx"),
            ("(x)x", "xx"),
            ("((x)x)", "xx"),
            ("((x)(x))", "xx"),
            ("x(x)", "xx"),
            ("xxx", "xxx"),
            ("(xxx)", "xxx"),
            ("((x)xx)", "xxx"),
            ("(((x)x)x)", "xxx"),
            ("((x)(xx))", "x(xx)"),
            ("x(xx)", "x(xx)"),
            ("x((x)x)", "x(xx)"),
            ("(x(xx))", "x(xx)"),
            ("xx(xx)", "xx(xx)"),
            ("x(xx)x", "x(xx)x"),
        ];
        for (statement, expected) in cases {
            assert_eq!(canonical(statement), expected, "parsing {statement}");
        }
    }

    #[test]
    fn test_shape() {
        let tree = parse("x(yz)w").unwrap();
        let root = tree.root();
        assert_eq!(tree.symbol(tree.right(root).unwrap()), Some('w'));
        let inner = tree.left(root).unwrap();
        assert_eq!(tree.symbol(tree.left(inner).unwrap()), Some('x'));
        let group = tree.right(inner).unwrap();
        assert_eq!(render(&tree, group), "yz");
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn test_unicode_symbols() {
        assert_eq!(canonical("λ(αβ)"), "λ(αβ)");
        assert_eq!(parse("λ").unwrap().len(), 1);
    }

    #[test]
    fn test_well_formed() {
        let cases = [
            ("x", true),
            ("(x)", true),
            ("(xy)", true),
            ("((x))", true),
            ("(x(x))", true),
            ("", false),
            ("()", false),
            ("x()", false),
            ("(()", false),
            (")(", false),
            ("(x(", false),
            ("(x))((x)", false),
        ];
        for (statement, expected) in cases {
            assert_eq!(
                well_formed(statement).is_ok(),
                expected,
                "checking {statement}"
            );
        }
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(well_formed(""), Err(SyntaxError::Empty));
        assert_eq!(
            well_formed("x()"),
            Err(SyntaxError::EmptyParens { position: 1 })
        );
        assert_eq!(
            well_formed("ab)"),
            Err(SyntaxError::UnmatchedParen { position: 2 })
        );
        assert_eq!(
            well_formed("(a(b"),
            Err(SyntaxError::UnmatchedParen { position: 2 })
        );
        assert_eq!(SyntaxError::EmptyParens { position: 1 }.span(), 1..3);
        assert!(parse("(x").is_err());
    }

    #[test]
    fn test_graft_is_detached() {
        let mut tree = parse("ab").unwrap();
        let body = graft(&mut tree, "x(yz)").unwrap();
        assert_eq!(tree.parent(body), None);
        assert_eq!(render(&tree, body), "x(yz)");
        assert_eq!(tree.to_string(), "ab");
        assert!(graft(&mut tree, "()").is_err());
    }

    #[test]
    fn test_strip_whitespace() {
        assert_eq!(strip_whitespace(" S (K a)\tb "), "S(Ka)b");
    }

    fn arb_statement() -> impl Strategy<Value = String> {
        let leaf = prop::sample::select(vec!['a', 'b', 'x', 'S', 'K', 'I']).prop_map(String::from);
        leaf.prop_recursive(5, 48, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(lhs, rhs)| format!("{lhs}({rhs})")),
                inner.prop_map(|t| format!("({t})")),
            ]
        })
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 200_000;
        let grouped = format!("{}x{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(well_formed(&grouped), Ok(()));
        assert_eq!(canonical(&grouped), "x");

        let right_nested = format!("{}x{}", "x(".repeat(depth), ")".repeat(depth));
        let rendered = format!("{}xx{}", "x(".repeat(depth - 1), ")".repeat(depth - 1));
        let tree = parse(&right_nested).unwrap();
        assert_eq!(tree.len(), 2 * depth + 1);
        assert_eq!(tree.to_string(), rendered);
    }

    proptest! {
        #[test]
        fn render_is_canonical(statement in arb_statement()) {
            let tree = parse(&statement).unwrap();
            let rendered = tree.to_string();
            let reparsed = parse(&rendered).unwrap();
            prop_assert_eq!(reparsed.to_string(), rendered);
            prop_assert_eq!(reparsed, tree);
        }
    }
}
