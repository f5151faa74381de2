use super::view::{Children, GraphView};
use crate::topology::NodeId;

type Hook<'c> = Box<dyn FnMut(NodeId) + Send + 'c>;
type Condition<'c> = Box<dyn FnMut(NodeId) -> bool + Send + 'c>;

/// Transitive closure of a view, walked depth first.
///
/// `on_enter` fires when a node is first discovered and `on_leave` once all of
/// its expanded children are done, in strict pre/post order. Nodes rejected by
/// `expand_if` are still reported but their children are not queried.
///
/// No cycle detection happens here: a cyclic view diverges. `Topology::build`
/// rejects cycles before any view exists.
pub struct Traverse<'c, V> {
    inner: V,
    expand_if: Option<Condition<'c>>,
    on_enter: Option<Hook<'c>>,
    on_leave: Option<Hook<'c>>,
}

impl<'c, V: GraphView> Traverse<'c, V> {
    pub fn new(inner: V) -> Self {
        Self {
            inner,
            expand_if: None,
            on_enter: None,
            on_leave: None,
        }
    }

    pub fn expand_if(mut self, condition: impl FnMut(NodeId) -> bool + Send + 'c) -> Self {
        self.expand_if = Some(Box::new(condition));
        self
    }

    pub fn on_enter(mut self, hook: impl FnMut(NodeId) + Send + 'c) -> Self {
        self.on_enter = Some(Box::new(hook));
        self
    }

    pub fn on_leave(mut self, hook: impl FnMut(NodeId) + Send + 'c) -> Self {
        self.on_leave = Some(Box::new(hook));
        self
    }

    pub fn inner_mut(&mut self) -> &mut V {
        &mut self.inner
    }

    /// Every node reachable from `start`, excluding `start` itself
    pub fn walk(&mut self, start: NodeId) -> Vec<NodeId> {
        let mut reached = Vec::new();
        let roots: Vec<NodeId> = self.inner.children(start).collect();
        let mut stack: Vec<(Option<NodeId>, std::vec::IntoIter<NodeId>)> =
            vec![(None, roots.into_iter())];

        loop {
            let next = match stack.last_mut() {
                Some((_, pending)) => pending.next(),
                None => break,
            };

            match next {
                Some(child) => {
                    if let Some(hook) = self.on_enter.as_mut() {
                        hook(child);
                    }
                    reached.push(child);

                    let expand = self.expand_if.as_mut().map_or(true, |cond| cond(child));
                    let grandchildren: Vec<NodeId> = if expand {
                        self.inner.children(child).collect()
                    } else {
                        Vec::new()
                    };
                    stack.push((Some(child), grandchildren.into_iter()));
                }
                None => {
                    if let Some((Some(done), _)) = stack.pop() {
                        if let Some(hook) = self.on_leave.as_mut() {
                            hook(done);
                        }
                    }
                }
            }
        }

        reached
    }
}

impl<V: GraphView> GraphView for Traverse<'_, V> {
    fn children(&mut self, node: NodeId) -> Children<'_> {
        Box::new(self.walk(node).into_iter())
    }
}
