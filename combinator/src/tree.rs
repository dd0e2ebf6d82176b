//! Arena storage for application trees.
//!
//! Every node of a [`Tree`] lives in one `Vec`, addressed by [`NodeId`]. Parent
//! links are handles into the same arena, so climbing the spine and splicing a
//! rewritten subtree back into its parent's slot are plain index updates.
//! Detached subtrees are handed back with [`Tree::release`] and their slots are
//! reused by later allocations.

/// Lightweight handle into a [`Tree`]'s arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, derive_more::Display)]
#[display(fmt = "#{_0}")]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Node {
    /// `x`
    Leaf(char),
    /// `t t`
    Apply(NodeId, NodeId),
}

#[derive(Clone, Debug)]
struct Slot {
    node: Node,
    parent: Option<NodeId>,
}

#[derive(Clone, Debug)]
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl Tree {
    /// A tree made of a single leaf.
    pub fn leaf(symbol: char) -> Self {
        let mut tree = Self::with_capacity(1);
        let leaf = tree.add_leaf(symbol);
        tree.set_root(leaf);
        tree
    }

    /// An arena with no designated root yet. Callers must `set_root` before
    /// handing the tree out.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.slots[id.index()].parent = None;
        self.root = id;
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let slot = Slot { node, parent: None };
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = slot;
            id
        } else {
            let id = NodeId(self.slots.len() as u32);
            self.slots.push(slot);
            id
        }
    }

    pub(crate) fn add_leaf(&mut self, symbol: char) -> NodeId {
        self.alloc(Node::Leaf(symbol))
    }

    /// Allocates `left right`. Both children must be detached.
    pub(crate) fn add_apply(&mut self, left: NodeId, right: NodeId) -> NodeId {
        let id = self.alloc(Node::Apply(left, right));
        self.slots[left.index()].parent = Some(id);
        self.slots[right.index()].parent = Some(id);
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn node(&self, id: NodeId) -> Node {
        self.slots[id.index()].node
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.index()].parent
    }

    pub fn symbol(&self, id: NodeId) -> Option<char> {
        match self.node(id) {
            Node::Leaf(symbol) => Some(symbol),
            Node::Apply(..) => None,
        }
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.node(id), Node::Leaf(_))
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id) {
            Node::Apply(left, _) => Some(left),
            Node::Leaf(_) => None,
        }
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id) {
            Node::Apply(_, right) => Some(right),
            Node::Leaf(_) => None,
        }
    }

    /// Climbs parent links until a node without a parent.
    pub fn root_of(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.parent(id) {
            id = parent;
        }
        id
    }

    pub fn leftmost_leaf(&self, mut id: NodeId) -> NodeId {
        while let Node::Apply(left, _) = self.node(id) {
            id = left;
        }
        id
    }

    /// Climbs `n` parents, stopping early at the top of the component.
    pub fn nth_parent(&self, mut id: NodeId, n: usize) -> NodeId {
        for _ in 0..n {
            match self.parent(id) {
                Some(parent) => id = parent,
                None => break,
            }
        }
        id
    }

    /// Number of parent hops from `descendant` up to `ancestor`. If `ancestor`
    /// is not above `descendant` this counts the hops to the component's top.
    pub fn depth_to(&self, mut descendant: NodeId, ancestor: NodeId) -> usize {
        let mut depth = 0;
        while descendant != ancestor {
            match self.parent(descendant) {
                Some(parent) => {
                    descendant = parent;
                    depth += 1;
                }
                None => break,
            }
        }
        depth
    }

    /// The arguments applied to `id` along its spine: the right child of its
    /// parent, then of its grandparent, and so on for `n` hops (fewer if the
    /// top is reached first).
    pub fn right_siblings_along_spine(&self, mut id: NodeId, n: usize) -> Vec<NodeId> {
        let mut siblings = Vec::with_capacity(n);
        for _ in 0..n {
            let parent = match self.parent(id) {
                Some(parent) => parent,
                None => break,
            };
            if let Node::Apply(_, right) = self.node(parent) {
                siblings.push(right);
            }
            id = parent;
        }
        siblings
    }

    /// Node kinds of the subtree at `id` in post-order (left, right, node).
    fn postorder(&self, id: NodeId) -> Vec<Node> {
        let mut pending = vec![id];
        let mut order = Vec::new();
        while let Some(id) = pending.pop() {
            let node = self.node(id);
            if let Node::Apply(left, right) = node {
                pending.push(left);
                pending.push(right);
            }
            order.push(node);
        }
        order.reverse();
        order
    }

    /// Allocates a fresh subtree from a post-order listing and returns its top.
    fn rebuild(&mut self, order: &[Node]) -> NodeId {
        let mut built: Vec<NodeId> = Vec::new();
        for node in order {
            let id = match *node {
                Node::Leaf(symbol) => self.add_leaf(symbol),
                Node::Apply(..) => {
                    let right = built.pop();
                    let left = built.pop();
                    match (left, right) {
                        (Some(left), Some(right)) => self.add_apply(left, right),
                        _ => unreachable!("post-order listing is missing an operand"),
                    }
                }
            };
            built.push(id);
        }
        built.pop().unwrap_or_else(|| unreachable!("empty post-order listing"))
    }

    /// Deep copy of the subtree at `id`, detached from the rest of the tree and
    /// sharing no node with its source.
    pub fn copy_subtree(&mut self, id: NodeId) -> NodeId {
        let order = self.postorder(id);
        self.rebuild(&order)
    }

    /// A new, compact tree holding a copy of the subtree at `id`.
    pub fn extract(&self, id: NodeId) -> Tree {
        let order = self.postorder(id);
        let mut tree = Tree::with_capacity(order.len());
        let root = tree.rebuild(&order);
        tree.set_root(root);
        tree
    }

    /// Applies the trees left to right: `join(&[a, b, c])` is `((a b) c)`.
    /// The inputs are copied, never moved or mutated.
    pub fn join(trees: &[&Tree]) -> Option<Tree> {
        let (first, rest) = trees.split_first()?;
        let capacity = trees.iter().map(|tree| tree.len() + 1).sum();
        let mut joined = Tree::with_capacity(capacity);
        let mut acc = joined.rebuild(&first.postorder(first.root));
        for tree in rest {
            let next = joined.rebuild(&tree.postorder(tree.root));
            acc = joined.add_apply(acc, next);
        }
        joined.set_root(acc);
        Some(joined)
    }

    /// Puts the detached subtree `new` where `old` sits (a child slot of its
    /// parent, or the root) and detaches `old`.
    pub(crate) fn splice(&mut self, old: NodeId, new: NodeId) {
        let parent = self.slots[old.index()].parent.take();
        self.slots[new.index()].parent = parent;
        match parent {
            Some(parent) => {
                if let Node::Apply(left, right) = &mut self.slots[parent.index()].node {
                    if *left == old {
                        *left = new;
                    } else if *right == old {
                        *right = new;
                    }
                }
            }
            None if self.root == old => self.root = new,
            None => {}
        }
    }

    /// Returns the slots of a detached subtree to the free list.
    pub(crate) fn release(&mut self, id: NodeId) {
        debug_assert!(id != self.root, "releasing the root of a tree");
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Node::Apply(left, right) = self.node(id) {
                pending.push(left);
                pending.push(right);
            }
            self.slots[id.index()].parent = None;
            self.free.push(id);
        }
    }

    /// Changes the symbol of a leaf. Returns `false` for an application.
    pub fn relabel(&mut self, id: NodeId, symbol: char) -> bool {
        match &mut self.slots[id.index()].node {
            Node::Leaf(current) => {
                *current = symbol;
                true
            }
            Node::Apply(..) => false,
        }
    }
}

/// Trees are equal when they have the same shape and symbols, wherever the
/// nodes happen to live in their arenas.
impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self.root, other.root)];
        while let Some((lhs, rhs)) = pending.pop() {
            match (self.node(lhs), other.node(rhs)) {
                (Node::Leaf(a), Node::Leaf(b)) if a == b => {}
                (Node::Apply(l1, r1), Node::Apply(l2, r2)) => {
                    pending.push((l1, l2));
                    pending.push((r1, r2));
                }
                _ => return false,
            }
        }
        true
    }
}

impl Eq for Tree {}

impl std::fmt::Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&crate::parser::render(self, self.root))
    }
}
