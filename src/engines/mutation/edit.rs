use crate::error::{ArchevoError, Result};
use crate::topology::{Op, TopologyBuilder};
use log::debug;

/// Which former consumers an inserted block takes over
#[derive(Debug, Clone, PartialEq)]
pub enum Rewire {
    All,
    Only(Vec<String>),
}

/// One declarative structural edit
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Splices a chain of new nodes between `node` and its consumers
    InsertAfter {
        node: String,
        block: Vec<Op>,
        rewire: Rewire,
    },
    /// Deletes a pass-through node, joining its producer to its consumer
    Remove { node: String },
    /// Swaps the op in place. A different op type gets a fresh name so no
    /// parameters are carried across incompatible layouts.
    ReplaceOp { node: String, op: Op },
    /// Replaces the single-entry, single-exit chain `first..=last` by `block`
    ReplaceBlock {
        first: String,
        last: String,
        block: Vec<Op>,
    },
}

/// How an edit changed the name space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditRecord {
    pub entry: Option<String>, // first node of the new region
    pub exit: Option<String>,  // last node of the new region
    pub kept: Vec<String>,     // consumers still reading the original node
    pub created: Vec<String>,
    pub removed: Vec<String>,
}

/// A structural edit applied to a builder.
///
/// Implemented by `Edit`; custom edits only need to go through the builder
/// surface and report the names they touched.
pub trait Mutation {
    fn apply(&self, builder: &mut TopologyBuilder) -> Result<EditRecord>;
}

impl<M: Mutation + ?Sized> Mutation for Box<M> {
    fn apply(&self, builder: &mut TopologyBuilder) -> Result<EditRecord> {
        (**self).apply(builder)
    }
}

impl Mutation for Edit {
    fn apply(&self, builder: &mut TopologyBuilder) -> Result<EditRecord> {
        debug!("applying {:?}", self);
        match self {
            Edit::InsertAfter {
                node,
                block,
                rewire,
            } => insert_after(builder, node, block, rewire),
            Edit::Remove { node } => remove(builder, node),
            Edit::ReplaceOp { node, op } => replace_op(builder, node, op),
            Edit::ReplaceBlock { first, last, block } => replace_block(builder, first, last, block),
        }
    }
}

fn unsupported(node: &str, reason: impl Into<String>) -> ArchevoError {
    ArchevoError::UnsupportedEdit {
        node: node.to_string(),
        reason: reason.into(),
    }
}

/// Inserts `block` as a chain fed by `producer`, returning the created names
fn add_chain(builder: &mut TopologyBuilder, producer: &str, block: &[Op]) -> Result<Vec<String>> {
    let mut created = Vec::with_capacity(block.len());
    let mut previous = producer.to_string();
    for op in block {
        let name = builder.fresh_name(op.type_name());
        builder.insert(name.clone(), op.clone(), vec![previous])?;
        previous = name.clone();
        created.push(name);
    }
    Ok(created)
}

/// Moves consumers and declared outputs reading `old` over to `new`
fn redirect(builder: &mut TopologyBuilder, old: &str, new: &str, consumers: &[String]) -> Result<()> {
    for consumer in consumers {
        builder.replace_input(consumer, old, new)?;
    }
    if builder.is_output(old) {
        let outputs = builder
            .outputs()
            .iter()
            .map(|o| if o == old { new.to_string() } else { o.clone() })
            .collect();
        builder.set_output_names(outputs)?;
    }
    Ok(())
}

fn distinct_inputs(builder: &TopologyBuilder, node: &str) -> Result<Vec<String>> {
    let mut inputs: Vec<String> = Vec::new();
    for input in builder.node_inputs(node)? {
        if !inputs.contains(input) {
            inputs.push(input.clone());
        }
    }
    Ok(inputs)
}

fn insert_after(
    builder: &mut TopologyBuilder,
    node: &str,
    block: &[Op],
    rewire: &Rewire,
) -> Result<EditRecord> {
    builder.node(node)?;
    if block.is_empty() {
        return Err(unsupported(node, "empty block"));
    }
    if block.iter().any(|op| op.is_merge() || matches!(op, Op::Input { .. })) {
        return Err(unsupported(node, "inserted blocks must be single-input chains"));
    }

    let consumers = builder.consumers(node);
    let (moved, kept): (Vec<String>, Vec<String>) = match rewire {
        Rewire::All => (consumers, Vec::new()),
        Rewire::Only(only) => consumers.into_iter().partition(|c| only.contains(c)),
    };

    let created = add_chain(builder, node, block)?;
    let exit = created.last().cloned().unwrap_or_default();
    for consumer in &moved {
        builder.replace_input(consumer, node, &exit)?;
    }
    if matches!(rewire, Rewire::All) && builder.is_output(node) {
        redirect(builder, node, &exit, &[])?;
    }

    Ok(EditRecord {
        entry: created.first().cloned(),
        exit: Some(exit),
        kept,
        created,
        removed: Vec::new(),
    })
}

fn remove(builder: &mut TopologyBuilder, node: &str) -> Result<EditRecord> {
    let spec = builder.node(node)?;
    if matches!(spec.op, Op::Input { .. }) {
        return Err(unsupported(node, "declared inputs cannot be removed"));
    }
    if builder.is_output(node) {
        return Err(unsupported(node, "declared outputs cannot be removed"));
    }
    let producers = distinct_inputs(builder, node)?;
    let consumers = builder.consumers(node);
    if producers.len() != 1 || consumers.len() != 1 {
        return Err(unsupported(
            node,
            format!(
                "only pass-through nodes are removable ({} producers, {} consumers)",
                producers.len(),
                consumers.len()
            ),
        ));
    }

    let producer = &producers[0];
    builder.replace_input(&consumers[0], node, producer)?;
    builder.remove_node(node)?;

    Ok(EditRecord {
        entry: None,
        exit: None,
        kept: Vec::new(),
        created: Vec::new(),
        removed: vec![node.to_string()],
    })
}

fn replace_op(builder: &mut TopologyBuilder, node: &str, op: &Op) -> Result<EditRecord> {
    let spec = builder.node(node)?.clone();
    if matches!(spec.op, Op::Input { .. }) || matches!(op, Op::Input { .. }) {
        return Err(unsupported(node, "input ops cannot be replaced"));
    }
    if spec.inputs.len() != 1 && !op.is_merge() {
        return Err(unsupported(node, "a single-input op cannot replace a merge"));
    }

    if spec.op.type_name() == op.type_name() {
        builder.node_mut(node)?.op = op.clone();
        return Ok(EditRecord {
            entry: Some(node.to_string()),
            exit: Some(node.to_string()),
            ..EditRecord::default()
        });
    }

    let consumers = builder.consumers(node);
    let name = builder.fresh_name(op.type_name());
    builder.insert(name.clone(), op.clone(), spec.inputs.clone())?;
    redirect(builder, node, &name, &consumers)?;
    builder.remove_node(node)?;

    Ok(EditRecord {
        entry: Some(name.clone()),
        exit: Some(name.clone()),
        kept: Vec::new(),
        created: vec![name],
        removed: vec![node.to_string()],
    })
}

fn replace_block(
    builder: &mut TopologyBuilder,
    first: &str,
    last: &str,
    block: &[Op],
) -> Result<EditRecord> {
    if block.is_empty() {
        return Err(unsupported(first, "empty block"));
    }
    if block.iter().any(|op| op.is_merge() || matches!(op, Op::Input { .. })) {
        return Err(unsupported(first, "replacement blocks must be single-input chains"));
    }
    if matches!(builder.node(first)?.op, Op::Input { .. }) {
        return Err(unsupported(first, "declared inputs cannot be replaced"));
    }
    builder.node(last)?;

    let producers = distinct_inputs(builder, first)?;
    if producers.len() != 1 {
        return Err(unsupported(first, "block entry must have exactly one producer"));
    }

    // walk the chain, every interior link must be one-to-one
    let mut chain = vec![first.to_string()];
    let mut current = first.to_string();
    while current != last {
        if builder.is_output(&current) {
            return Err(unsupported(&current, "declared output inside a replaced block"));
        }
        let consumers = builder.consumers(&current);
        if consumers.len() != 1 || chain.len() > builder.names().len() {
            return Err(unsupported(&current, format!("'{}' is not reachable as a chain", last)));
        }
        let next = consumers[0].clone();
        if distinct_inputs(builder, &next)?.len() != 1 {
            return Err(unsupported(&next, "block interior node has several producers"));
        }
        chain.push(next.clone());
        current = next;
    }

    let consumers = builder.consumers(last);
    let was_output = builder.is_output(last);
    let created = add_chain(builder, &producers[0], block)?;
    let exit = created.last().cloned().unwrap_or_default();

    for consumer in &consumers {
        builder.replace_input(consumer, last, &exit)?;
    }
    if was_output {
        redirect(builder, last, &exit, &[])?;
    }
    for name in &chain {
        builder.remove_node(name)?;
    }

    Ok(EditRecord {
        entry: created.first().cloned(),
        exit: Some(exit),
        kept: Vec::new(),
        created,
        removed: chain,
    })
}
