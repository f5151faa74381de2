use crate::topology::{NodeId, Topology};
use std::collections::HashSet;

/// Lazy sequence of node ids handed out by a view
pub type Children<'a> = Box<dyn Iterator<Item = NodeId> + 'a>;

/// Minimal directed-graph abstraction.
///
/// Views are cursors over a `Topology`; they never own graph state. Decorators may
/// keep per-traversal state (see `SingleVisit`), so a sequence is not restartable.
pub trait GraphView {
    fn children(&mut self, node: NodeId) -> Children<'_>;
}

impl<V: GraphView + ?Sized> GraphView for &mut V {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        (**self).children(node)
    }
}

impl<V: GraphView + ?Sized> GraphView for Box<V> {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        (**self).children(node)
    }
}

/// Consumers of a node
#[derive(Debug, Clone, Copy)]
pub struct Forward<'t> {
    topology: &'t Topology,
}

impl<'t> Forward<'t> {
    pub fn new(topology: &'t Topology) -> Self {
        Self { topology }
    }
}

impl GraphView for Forward<'_> {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        Box::new(self.topology.consumers(node).iter().copied())
    }
}

/// Producers (inputs) of a node
#[derive(Debug, Clone, Copy)]
pub struct Backward<'t> {
    topology: &'t Topology,
}

impl<'t> Backward<'t> {
    pub fn new(topology: &'t Topology) -> Self {
        Self { topology }
    }
}

impl GraphView for Backward<'_> {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        let mut seen = HashSet::new();
        // a merge may list the same producer twice
        Box::new(
            self.topology
                .producers(node)
                .iter()
                .copied()
                .filter(move |id| seen.insert(*id)),
        )
    }
}

/// Passes through only the children satisfying a predicate
pub struct Filter<V, P> {
    inner: V,
    pred: P,
}

impl<V: GraphView, P: FnMut(NodeId) -> bool> GraphView for Filter<V, P> {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        let pred = &mut self.pred;
        Box::new(self.inner.children(node).filter(move |id| pred(*id)))
    }
}

/// Returns nothing for nodes failing the predicate
pub struct EnterIf<V, P> {
    inner: V,
    pred: P,
}

impl<V: GraphView, P: FnMut(NodeId) -> bool> GraphView for EnterIf<V, P> {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        if (self.pred)(node) {
            self.inner.children(node)
        } else {
            Box::new(std::iter::empty())
        }
    }
}

/// Hands out every node at most once across all queries
pub struct SingleVisit<V> {
    inner: V,
    visited: HashSet<NodeId>,
}

impl<V> SingleVisit<V> {
    /// Marks a node as already returned, e.g. the start of a walk
    pub fn mark(&mut self, node: NodeId) -> bool {
        self.visited.insert(node)
    }

    pub fn visited(&self) -> &HashSet<NodeId> {
        &self.visited
    }

    pub fn reset(&mut self) {
        self.visited.clear();
    }
}

impl<V: GraphView> GraphView for SingleVisit<V> {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        let visited = &mut self.visited;
        Box::new(self.inner.children(node).filter(move |id| visited.insert(*id)))
    }
}

/// Union of two views: children of the first followed by children of the second
pub struct Connect<A, B> {
    first: A,
    second: B,
}

impl<A: GraphView, B: GraphView> GraphView for Connect<A, B> {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        Box::new(self.first.children(node).chain(self.second.children(node)))
    }
}

pub trait ViewExt: GraphView + Sized {
    fn filter_children<P: FnMut(NodeId) -> bool>(self, pred: P) -> Filter<Self, P> {
        Filter { inner: self, pred }
    }

    fn enter_if<P: FnMut(NodeId) -> bool>(self, pred: P) -> EnterIf<Self, P> {
        EnterIf { inner: self, pred }
    }

    /// Drops children matching `pred` so the walk stops before them
    fn stop_before<P: FnMut(NodeId) -> bool>(
        self,
        mut pred: P,
    ) -> Filter<Self, impl FnMut(NodeId) -> bool> {
        self.filter_children(move |id| !pred(id))
    }

    /// Keeps nodes matching `pred` but never expands them
    fn stop_after<P: FnMut(NodeId) -> bool>(
        self,
        mut pred: P,
    ) -> EnterIf<Self, impl FnMut(NodeId) -> bool> {
        self.enter_if(move |id| !pred(id))
    }

    fn single_visit(self) -> SingleVisit<Self> {
        SingleVisit {
            inner: self,
            visited: HashSet::new(),
        }
    }

    fn connect<B: GraphView>(self, second: B) -> Connect<Self, B> {
        Connect {
            first: self,
            second,
        }
    }
}

impl<V: GraphView> ViewExt for V {}
