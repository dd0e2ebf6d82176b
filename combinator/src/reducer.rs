//! Outer-first, left-first rewriting of application trees.
//!
//! [`rewrite`] repeatedly fires the combinator at the head of a spine once it
//! has enough arguments; [`normalize`] does that at a node and then descends
//! into its children, left before right. Both draw on one frame budget and
//! poll an optional [`CancelToken`], so a statement without a normal form ends
//! in an error instead of running forever.

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    basis::{Basis, Combinator},
    cancel::{CancelCause, CancelToken},
    parser::{self, SyntaxError},
    tree::{Node, NodeId, Tree},
};

pub const DEFAULT_MAX_FRAMES: usize = 1_000_000;

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum ReduceError {
    #[error("loop detected after {frames} frames")]
    LoopDetected { frames: usize },
    #[error("reduction {0}")]
    Cancelled(#[from] CancelCause),
    #[error("definition of `{name}` is malformed: {source}")]
    MalformedDefinition {
        name: char,
        #[source]
        source: SyntaxError,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, derive_more::Display)]
pub enum Order {
    /// Substitute arguments as they are.
    #[default]
    #[display(fmt = "normal")]
    Normal,
    /// Normalize arguments before substituting them.
    #[display(fmt = "applicative")]
    Applicative,
}

#[derive(Clone, Debug)]
pub struct Options {
    pub order: Order,
    /// Frames a single reduction may enter before it is reported as a loop.
    pub max_frames: usize,
    pub cancel: Option<CancelToken>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            order: Order::Normal,
            max_frames: DEFAULT_MAX_FRAMES,
            cancel: None,
        }
    }
}

impl Options {
    pub fn applicative(self) -> Self {
        self.with_order(Order::Applicative)
    }

    pub fn with_order(self, order: Order) -> Self {
        Self { order, ..self }
    }

    pub fn with_max_frames(self, max_frames: usize) -> Self {
        Self { max_frames, ..self }
    }

    pub fn with_cancel(self, cancel: CancelToken) -> Self {
        Self {
            cancel: Some(cancel),
            ..self
        }
    }
}

/// Fully normalizes `tree`. On error the tree is dropped; nothing partial is
/// handed back. The result is compacted, so slots freed along the way do not
/// outlive the reduction.
pub fn normalize(mut tree: Tree, basis: &Basis, options: &Options) -> Result<Tree, ReduceError> {
    let mut context = Context::new(basis, options);
    let root = tree.root();
    let outcome = context.normalize_at(&mut tree, root);
    context.finish(outcome, "normalize")?;
    Ok(tree.extract(tree.root()))
}

/// Rewrites at the root only, until its head no longer has a combinator with
/// enough arguments. Arguments are left alone unless applicative order asks
/// for them to be normalized first.
pub fn rewrite(mut tree: Tree, basis: &Basis, options: &Options) -> Result<Tree, ReduceError> {
    let mut context = Context::new(basis, options);
    let root = tree.root();
    let outcome = context.rewrite_at(&mut tree, root);
    context.finish(outcome, "rewrite")?;
    Ok(tree.extract(tree.root()))
}

/// Pending work of a reduction. Arguments that applicative order normalizes
/// first are queued ahead of the `Fire` that consumes them, so nesting lives
/// on the task stack and never on the native one.
enum Task {
    /// Rewrite at the node, then descend into its children.
    Normalize(NodeId),
    /// Try the combinator at the head of the node's spine; with `descend`,
    /// carry on into the children once nothing fires there any more.
    Head { at: NodeId, descend: bool },
    /// The arguments of the redex at `at` are ready to be substituted.
    Fire { at: NodeId, descend: bool },
    Descend(NodeId),
}

struct Context<'a> {
    basis: &'a Basis,
    order: Order,
    frames: usize,
    max_frames: usize,
    cancel: Option<&'a CancelToken>,
}

impl<'a> Context<'a> {
    fn new(basis: &'a Basis, options: &'a Options) -> Self {
        Self {
            basis,
            order: options.order,
            frames: 0,
            max_frames: options.max_frames,
            cancel: options.cancel.as_ref(),
        }
    }

    /// Cancellation is checked before the frame is counted.
    fn enter(&mut self) -> Result<(), ReduceError> {
        if let Some(cancel) = self.cancel {
            cancel.check()?;
        }
        self.frames += 1;
        if self.frames > self.max_frames {
            return Err(ReduceError::LoopDetected {
                frames: self.frames,
            });
        }
        Ok(())
    }

    fn finish<T>(&self, outcome: Result<T, ReduceError>, what: &str) -> Result<T, ReduceError> {
        match &outcome {
            Ok(_) => debug!(frames = self.frames, order = %self.order, "{what} finished"),
            Err(e @ ReduceError::Cancelled(_)) => {
                debug!(frames = self.frames, order = %self.order, error = %e, "{what} aborted")
            }
            Err(e) => warn!(frames = self.frames, order = %self.order, error = %e, "{what} aborted"),
        }
        outcome
    }

    /// Normalizes the subtree at `at` in place.
    fn normalize_at(&mut self, tree: &mut Tree, at: NodeId) -> Result<(), ReduceError> {
        self.run(tree, Task::Normalize(at))
    }

    /// Fires the combinator at the head of `at`'s spine for as long as it has
    /// enough arguments.
    fn rewrite_at(&mut self, tree: &mut Tree, at: NodeId) -> Result<(), ReduceError> {
        self.run(tree, Task::Head { at, descend: false })
    }

    fn run(&mut self, tree: &mut Tree, task: Task) -> Result<(), ReduceError> {
        let mut tasks = vec![task];
        while let Some(task) = tasks.pop() {
            match task {
                Task::Normalize(id) => {
                    self.enter()?;
                    if !tree.is_leaf(id) {
                        tasks.push(Task::Head { at: id, descend: true });
                    }
                }
                Task::Head { at, descend } => {
                    self.enter()?;
                    match self.redex(tree, at) {
                        Some(combinator) if self.order == Order::Applicative => {
                            tasks.push(Task::Fire { at, descend });
                            let head = tree.leftmost_leaf(at);
                            let arguments =
                                tree.right_siblings_along_spine(head, combinator.arity());
                            tasks.extend(arguments.into_iter().rev().map(Task::Normalize));
                        }
                        Some(combinator) => {
                            let at = self.fire(tree, combinator, at)?;
                            tasks.push(Task::Head { at, descend });
                        }
                        None if descend => tasks.push(Task::Descend(at)),
                        None => {}
                    }
                }
                // Normalizing the arguments replaces only the right children
                // of the spine, so `at` and the head are still in place.
                Task::Fire { at, descend } => match self.redex(tree, at) {
                    Some(combinator) => {
                        let at = self.fire(tree, combinator, at)?;
                        tasks.push(Task::Head { at, descend });
                    }
                    None if descend => tasks.push(Task::Descend(at)),
                    None => {}
                },
                Task::Descend(id) => {
                    if let Node::Apply(left, right) = tree.node(id) {
                        tasks.push(Task::Normalize(right));
                        tasks.push(Task::Normalize(left));
                    }
                }
            }
        }
        Ok(())
    }

    /// The combinator at the head of `at`'s spine, when it has enough
    /// arguments to fire. Nullary combinators are inert names.
    fn redex(&self, tree: &Tree, at: NodeId) -> Option<&'a Combinator> {
        let basis: &'a Basis = self.basis;
        let head = tree.leftmost_leaf(at);
        let combinator = basis.find(tree.symbol(head)?)?;
        let arity = combinator.arity();
        (arity > 0 && tree.depth_to(head, at) >= arity).then_some(combinator)
    }

    /// Splices the substituted body over the redex and returns the node now
    /// in `at`'s position.
    fn fire(
        &self,
        tree: &mut Tree,
        combinator: &Combinator,
        at: NodeId,
    ) -> Result<NodeId, ReduceError> {
        let head = tree.leftmost_leaf(at);
        let arity = combinator.arity();
        let depth = tree.depth_to(head, at);
        let arguments = tree.right_siblings_along_spine(head, arity);
        let redex = tree.nth_parent(head, arity);
        let body = parser::graft(tree, &combinator.definition).map_err(|source| {
            ReduceError::MalformedDefinition {
                name: combinator.name,
                source,
            }
        })?;
        let body = substitute(tree, combinator, &arguments, body);
        tree.splice(redex, body);
        tree.release(redex);
        trace!(
            combinator = %combinator.name,
            frames = self.frames,
            nodes = tree.len(),
            "rewrite"
        );
        Ok(tree.nth_parent(body, depth - arity))
    }
}

/// Replaces every parameter leaf of the freshly grafted `body` with its own
/// copy of the matching argument. Other leaves, such as names of further
/// combinators, stay as they are. Returns the top of the substituted body.
fn substitute(
    tree: &mut Tree,
    combinator: &Combinator,
    arguments: &[NodeId],
    mut body: NodeId,
) -> NodeId {
    let mut leaves = Vec::new();
    let mut pending = vec![body];
    while let Some(id) = pending.pop() {
        match tree.node(id) {
            Node::Leaf(symbol) => leaves.push((id, symbol)),
            Node::Apply(left, right) => {
                pending.push(right);
                pending.push(left);
            }
        }
    }

    for (leaf, symbol) in leaves {
        let argument = combinator
            .arguments
            .iter()
            .position(|&parameter| parameter == symbol)
            .and_then(|index| arguments.get(index));
        if let Some(&argument) = argument {
            let copy = tree.copy_subtree(argument);
            if leaf == body {
                body = copy;
            } else {
                tree.splice(leaf, copy);
            }
            tree.release(leaf);
        }
    }
    body
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use proptest::prelude::*;

    use super::*;
    use crate::{catalog, parser::parse};

    fn rule(name: char, arguments: &str, definition: &str) -> Combinator {
        Combinator::new(name, arguments.chars(), definition).unwrap()
    }

    fn run(basis: &Basis, statement: &str, options: &Options) -> Result<String, ReduceError> {
        normalize(parse(statement).unwrap(), basis, options).map(|tree| tree.to_string())
    }

    #[test]
    fn test_reduce() {
        let basis = Basis::from_iter([rule('I', "x", "x"), rule('R', "xy", "yx")]);
        let cases = [
            ("Ix", "x"),
            ("Rxy", "yx"),
            ("Ryx", "xy"),
            ("RIxy", "xIy"),
            ("II", "I"),
            ("x(Ix)", "xx"),
            ("x(I(Ix))x", "xxx"),
        ];
        for (statement, expected) in cases {
            for options in [Options::default(), Options::default().applicative()] {
                assert_eq!(
                    run(&basis, statement, &options).unwrap(),
                    expected,
                    "{statement} in {} order",
                    options.order
                );
            }
        }
    }

    #[test]
    fn test_rewrite_cascades_at_root_only() {
        let basis = catalog::ski();
        // SKSK -> K(SK)(KK)... -> K, all at the root.
        let tree = rewrite(parse("SKSK").unwrap(), &basis, &Options::default()).unwrap();
        assert_eq!(tree.to_string(), "K");
        // The argument's redex is not touched by a head rewrite.
        let tree = rewrite(parse("x(Ia)").unwrap(), &basis, &Options::default()).unwrap();
        assert_eq!(tree.to_string(), "x(Ia)");
        let tree = rewrite(parse("Kx(Ia)").unwrap(), &basis, &Options::default()).unwrap();
        assert_eq!(tree.to_string(), "x");
    }

    #[test]
    fn test_applicative_rewrite_normalizes_arguments() {
        let basis = catalog::ski();
        let options = Options::default().applicative();
        let tree = rewrite(parse("S(Ia)(Ib)c").unwrap(), &basis, &options).unwrap();
        assert_eq!(tree.to_string(), "ac(bc)");
        let tree = rewrite(parse("S(Ia)(Ib)c").unwrap(), &basis, &Options::default()).unwrap();
        assert_eq!(tree.to_string(), "ac(Ibc)");
    }

    #[test]
    fn test_not_enough_arguments() {
        let basis = catalog::ski();
        assert_eq!(run(&basis, "Sxy", &Options::default()).unwrap(), "Sxy");
        assert_eq!(run(&basis, "K", &Options::default()).unwrap(), "K");
        assert_eq!(run(&basis, "x", &Options::default()).unwrap(), "x");
    }

    #[test]
    fn test_nullary_combinator_is_inert() {
        let basis = Basis::from_iter([rule('c', "", "xy")]);
        for statement in ["c", "cz", "a(cz)", "ac"] {
            assert_eq!(run(&basis, statement, &Options::default()).unwrap(), statement);
        }
    }

    #[test]
    fn test_improper_names_pass_through() {
        let basis = Basis::from_iter([rule('D', "x", "Kxx")]);
        assert_eq!(run(&basis, "Da", &Options::default()).unwrap(), "Kaa");
        let basis = basis.with(catalog::k());
        assert_eq!(run(&basis, "Da", &Options::default()).unwrap(), "a");
    }

    #[test]
    fn test_loop_detected() {
        let basis = catalog::bckw();
        let options = Options::default().with_max_frames(50_000);
        assert_eq!(
            run(&basis, "WWW", &options),
            Err(ReduceError::LoopDetected { frames: 50_001 })
        );
    }

    #[test]
    fn test_loop_detected_with_default_ceiling() {
        let basis = catalog::bckw();
        assert_eq!(
            run(&basis, "WWW", &Options::default()),
            Err(ReduceError::LoopDetected {
                frames: DEFAULT_MAX_FRAMES + 1
            })
        );
    }

    #[test]
    fn test_loop_memory_is_bounded() {
        let basis = catalog::bckw();
        let options = Options::default().with_max_frames(10_000);
        let mut tree = parse("WWW").unwrap();
        let mut context = Context::new(&basis, &options);
        let root = tree.root();
        assert!(context.rewrite_at(&mut tree, root).is_err());
        assert_eq!(tree.to_string(), "WWW");
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_deadline_cancels_before_loop_ceiling() {
        let basis = catalog::bckw();
        let options = Options::default()
            .with_cancel(CancelToken::new().with_timeout(Duration::from_millis(20)));
        assert_eq!(options.max_frames, DEFAULT_MAX_FRAMES);
        let started = std::time::Instant::now();
        assert_eq!(
            run(&basis, "WWW", &options),
            Err(ReduceError::Cancelled(CancelCause::DeadlineExceeded))
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_explicit_cancel() {
        let basis = catalog::bckw();
        let token = CancelToken::new();
        let options = Options::default()
            .with_max_frames(usize::MAX)
            .with_cancel(token.clone());
        let worker = std::thread::spawn(move || run(&basis, "WWW", &options));
        std::thread::sleep(Duration::from_millis(10));
        token.cancel();
        assert_eq!(
            worker.join().unwrap(),
            Err(ReduceError::Cancelled(CancelCause::Cancelled))
        );

        let token = CancelToken::new();
        token.cancel();
        let options = Options::default().with_cancel(token);
        assert_eq!(
            run(&catalog::ski(), "Ix", &options),
            Err(ReduceError::Cancelled(CancelCause::Cancelled))
        );
    }

    #[test]
    fn test_duplicated_arguments_are_not_aliased() {
        let basis = Basis::from_iter([catalog::w()]);
        let mut tree = rewrite(parse("Wf(ab)").unwrap(), &basis, &Options::default()).unwrap();
        assert_eq!(tree.to_string(), "f(ab)(ab)");

        let root = tree.root();
        let second = tree.right(root).unwrap();
        let first = tree.right(tree.left(root).unwrap()).unwrap();
        assert_ne!(first, second);
        let leaf = tree.leftmost_leaf(first);
        assert!(tree.relabel(leaf, 'z'));
        assert_eq!(tree.to_string(), "f(zb)(ab)");
    }

    #[test]
    fn test_malformed_definition() {
        let basis = Basis::from_iter([Combinator {
            name: 'Q',
            arguments: vec!['x'],
            definition: "x(".to_owned(),
        }]);
        assert!(matches!(
            run(&basis, "Qa", &Options::default()),
            Err(ReduceError::MalformedDefinition { name: 'Q', .. })
        ));
    }

    #[test]
    fn test_whole_body_is_a_parameter() {
        // The body's top is itself replaced, at the root and below it.
        let basis = catalog::ski();
        assert_eq!(run(&basis, "K(ab)c", &Options::default()).unwrap(), "ab");
        assert_eq!(run(&basis, "x(K(ab)c)", &Options::default()).unwrap(), "x(ab)");
    }

    fn nested(depth: usize, function: &str, innermost: &str) -> String {
        format!(
            "{}{innermost}{}",
            format!("{function}(").repeat(depth),
            ")".repeat(depth)
        )
    }

    #[test]
    fn test_deep_applicative_arguments() {
        let basis = catalog::ski();
        let statement = nested(100_000, "I", "a");
        let options = Options::default().applicative();
        assert_eq!(run(&basis, &statement, &options).unwrap(), "a");
    }

    #[test]
    fn test_deep_right_nesting() {
        let basis = catalog::ski();
        let statement = nested(100_000, "x", "Ia");
        let expected = nested(99_999, "x", "xa");
        for options in [Options::default(), Options::default().applicative()] {
            assert_eq!(
                run(&basis, &statement, &options).unwrap(),
                expected,
                "{} order",
                options.order
            );
        }
    }

    fn arb_ski_term() -> impl Strategy<Value = String> {
        let leaf = prop::sample::select(vec!['S', 'K', 'I', 'a', 'b']).prop_map(String::from);
        leaf.prop_recursive(4, 24, 2, |inner| {
            (inner.clone(), inner).prop_map(|(lhs, rhs)| format!("{lhs}({rhs})"))
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn normal_and_applicative_agree(statement in arb_ski_term()) {
            let basis = catalog::ski();
            let bounded = || {
                Options::default()
                    .with_max_frames(5_000)
                    .with_cancel(CancelToken::new().with_timeout(Duration::from_millis(50)))
            };
            let normal = run(&basis, &statement, &bounded());
            let applicative = run(&basis, &statement, &bounded().applicative());
            if let (Ok(normal), Ok(applicative)) = (normal, applicative) {
                prop_assert_eq!(normal, applicative);
            }
        }
    }
}
