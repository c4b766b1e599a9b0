//! Object graph of a read archive.
//!
//! Nodes live in an arena owned by the archive and are created on first
//! access. A stored node unions the definitions of its path across
//! layers. Instance roots resolve their source lazily through the merged
//! tree; objects below an instance root are alias nodes that mirror the
//! source's nodes under the instance's path.

use std::sync::{Arc, OnceLock};

use tracing::warn;

use super::archive::ArchiveShared;
use super::layer::{ChildSlot, ObjectSource};
use super::property::{CompoundReader, ICompoundProperty};
use crate::core::{child_path, children_hash, properties_hash, ChildDigest, Digest, MetaData, ObjectHeader};
use crate::util::{Error, Result};

pub(crate) type NodeId = usize;

pub(crate) const TOP: NodeId = 0;

/// Bound on nested instance resolution; deeper chains are treated as cycles.
const MAX_INSTANCE_DEPTH: usize = 64;

pub(crate) enum NodeBody {
    /// Definitions of this path, base layer first.
    Stored(Vec<ObjectSource>),
    Instance {
        source_path: String,
        target: OnceLock<NodeId>,
    },
    /// Mirror of a node below an instance source.
    Alias(NodeId),
}

pub(crate) struct ObjectNode {
    pub name: String,
    pub full_name: String,
    pub meta: MetaData,
    pub parent: Option<NodeId>,
    pub body: NodeBody,
    pub instance_descendant: bool,
    children: OnceLock<Arc<[NodeId]>>,
    properties: OnceLock<Arc<CompoundReader>>,
    hashes: OnceLock<Option<(Digest, Digest)>>,
}

impl ObjectNode {
    /// Arena holding only the merged root.
    pub fn top(sources: Vec<ObjectSource>) -> Self {
        Self::new(String::new(), "/".to_string(), MetaData::new(), None, NodeBody::Stored(sources), false)
    }

    fn new(
        name: String,
        full_name: String,
        meta: MetaData,
        parent: Option<NodeId>,
        body: NodeBody,
        instance_descendant: bool,
    ) -> Self {
        Self {
            name,
            full_name,
            meta,
            parent,
            body,
            instance_descendant,
            children: OnceLock::new(),
            properties: OnceLock::new(),
            hashes: OnceLock::new(),
        }
    }

    /// Stand-in for lookups that found nothing.
    fn placeholder() -> Self {
        Self::new(String::new(), String::new(), MetaData::new(), None, NodeBody::Stored(Vec::new()), false)
    }
}

/// Merge state of one child name while walking the layers.
struct PendingChild {
    name: String,
    meta: MetaData,
    kind: PendingKind,
    /// A prune or replace already decided this path.
    decided: bool,
}

enum PendingKind {
    Stored(Vec<ObjectSource>),
    Instance(String),
    Pruned,
}

impl ArchiveShared {
    pub(crate) fn node(&self, id: NodeId) -> Arc<ObjectNode> {
        Arc::clone(&self.nodes.read()[id])
    }

    fn push_node(&self, node: ObjectNode) -> NodeId {
        let mut nodes = self.nodes.write();
        nodes.push(Arc::new(node));
        nodes.len() - 1
    }

    /// Merged children of `id`, built on first request.
    pub(crate) fn children_of(&self, id: NodeId) -> Result<Arc<[NodeId]>> {
        self.children_at_depth(id, 0)
    }

    fn children_at_depth(&self, id: NodeId, depth: usize) -> Result<Arc<[NodeId]>> {
        let node = self.node(id);
        if let Some(children) = node.children.get() {
            return Ok(Arc::clone(children));
        }
        let built: Vec<NodeId> = match &node.body {
            NodeBody::Stored(sources) => self.merge_children(id, &node, sources)?,
            NodeBody::Instance { .. } | NodeBody::Alias(_) => {
                let content = self.content_at_depth(id, depth)?;
                let mirrored = self.children_at_depth(content, depth + 1)?;
                mirrored
                    .iter()
                    .map(|&m| {
                        let source = self.node(m);
                        self.push_node(ObjectNode::new(
                            source.name.clone(),
                            child_path(&node.full_name, &source.name),
                            source.meta.clone(),
                            Some(id),
                            NodeBody::Alias(m),
                            true,
                        ))
                    })
                    .collect()
            }
        };
        Ok(Arc::clone(node.children.get_or_init(|| built.into())))
    }

    fn merge_children(&self, id: NodeId, node: &ObjectNode, sources: &[ObjectSource]) -> Result<Vec<NodeId>> {
        let mut order: Vec<PendingChild> = Vec::new();
        for source in sources {
            let directives = source.layer.honors_directives();
            let headers = source.headers()?;
            for (i, (name, meta)) in headers.children.into_iter().enumerate() {
                let incoming = match source.child(i)? {
                    ChildSlot::Stored(s) => PendingKind::Stored(vec![s]),
                    ChildSlot::Instance(path) => PendingKind::Instance(path),
                };
                let prune = directives && meta.is_prune();
                let replace = directives && meta.is_replace();

                let Some(pos) = order.iter().position(|p| p.name == name) else {
                    order.push(PendingChild {
                        name,
                        meta,
                        kind: if prune { PendingKind::Pruned } else { incoming },
                        decided: prune || replace,
                    });
                    continue;
                };

                let pending = &mut order[pos];
                if matches!(pending.kind, PendingKind::Pruned) {
                    continue;
                }
                if (prune || replace) && !pending.decided {
                    pending.decided = true;
                    if prune {
                        pending.kind = PendingKind::Pruned;
                    } else {
                        pending.kind = incoming;
                        pending.meta = meta;
                    }
                    continue;
                }
                match (&mut pending.kind, incoming) {
                    (PendingKind::Stored(list), PendingKind::Stored(more)) => {
                        list.extend(more);
                        pending.meta.merge_from(&meta);
                    }
                    (PendingKind::Instance(_), _) => {
                        warn!(
                            path = %child_path(&node.full_name, &name),
                            layer = source.layer.index,
                            "override below an instance root ignored"
                        );
                    }
                    (PendingKind::Stored(_), PendingKind::Instance(path)) => {
                        warn!(
                            path = %child_path(&node.full_name, &name),
                            source = %path,
                            layer = source.layer.index,
                            "instance override of a stored object ignored without replace"
                        );
                    }
                    _ => {}
                }
            }
        }

        let mut children = Vec::with_capacity(order.len());
        for pending in order {
            let full_name = child_path(&node.full_name, &pending.name);
            let body = match pending.kind {
                PendingKind::Pruned => continue,
                PendingKind::Stored(sources) => NodeBody::Stored(sources),
                PendingKind::Instance(source_path) => NodeBody::Instance {
                    source_path,
                    target: OnceLock::new(),
                },
            };
            children.push(self.push_node(ObjectNode::new(
                pending.name,
                full_name,
                pending.meta,
                Some(id),
                body,
                false,
            )));
        }
        Ok(children)
    }

    /// The stored node whose content `id` shows, following instances and
    /// aliases.
    pub(crate) fn content_of(&self, id: NodeId) -> Result<NodeId> {
        self.content_at_depth(id, 0)
    }

    fn content_at_depth(&self, id: NodeId, depth: usize) -> Result<NodeId> {
        let mut current = id;
        for _ in 0..=MAX_INSTANCE_DEPTH {
            let node = self.node(current);
            current = match &node.body {
                NodeBody::Stored(_) => return Ok(current),
                NodeBody::Alias(target) => *target,
                NodeBody::Instance { source_path, target } => match target.get() {
                    Some(&t) => t,
                    None => {
                        let resolved = self.resolve_instance(&node.full_name, source_path, depth)?;
                        *target.get_or_init(|| resolved)
                    }
                },
            };
        }
        Err(Error::malformed(format!("instance chain at {} is cyclic", self.node(id).full_name)))
    }

    fn resolve_instance(&self, path: &str, source_path: &str, depth: usize) -> Result<NodeId> {
        let within = |inner: &str, outer: &str| {
            inner == outer || inner.strip_prefix(outer).is_some_and(|rest| rest.starts_with('/'))
        };
        if within(path, source_path) || within(source_path, path) {
            return Err(Error::malformed(format!(
                "instance {path} and its source {source_path} contain each other"
            )));
        }
        self.find_at_depth(source_path, depth + 1)?
            .ok_or_else(|| Error::malformed(format!("instance {path} refers to missing source {source_path}")))
    }

    /// Walk `path` from the root.
    pub(crate) fn find(&self, path: &str) -> Result<Option<NodeId>> {
        self.find_at_depth(path, 0)
    }

    fn find_at_depth(&self, path: &str, depth: usize) -> Result<Option<NodeId>> {
        if depth > MAX_INSTANCE_DEPTH {
            return Err(Error::malformed(format!("instance resolution of {path} is cyclic")));
        }
        let mut current = TOP;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let children = self.children_at_depth(current, depth)?;
            let next = children.iter().copied().find(|&c| self.node(c).name == segment);
            match next {
                Some(c) => current = c,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub(crate) fn properties_of(&self, id: NodeId) -> Result<Arc<CompoundReader>> {
        let content = self.node(self.content_of(id)?);
        if let Some(props) = content.properties.get() {
            return Ok(Arc::clone(props));
        }
        let NodeBody::Stored(sources) = &content.body else {
            return Err(Error::malformed(format!("{} resolved to a non-stored object", content.full_name)));
        };
        let compounds = sources.iter().map(ObjectSource::properties).collect::<Result<Vec<_>>>()?;
        let reader = Arc::new(CompoundReader::top(compounds));
        Ok(Arc::clone(content.properties.get_or_init(|| reader)))
    }

    /// `(properties hash, children hash)` of what `id` shows.
    ///
    /// Single-layer reads report the recorded hashes; merged trees are
    /// re-hashed. `None` when any contributing layer has no digests.
    pub(crate) fn hashes_of(&self, id: NodeId) -> Result<Option<(Digest, Digest)>> {
        self.hashes_at_depth(id, 0)
    }

    fn hashes_at_depth(&self, id: NodeId, hops: usize) -> Result<Option<(Digest, Digest)>> {
        let content_id = self.content_of(id)?;
        let hops = if content_id != id { hops + 1 } else { hops };
        if hops > MAX_INSTANCE_DEPTH {
            return Err(Error::malformed(format!("instance chain at {} is cyclic", self.node(id).full_name)));
        }
        let content = self.node(content_id);
        if let Some(h) = content.hashes.get() {
            return Ok(*h);
        }

        let hashes = match &content.body {
            NodeBody::Stored(sources) if self.layers.len() == 1 => match sources.first() {
                Some(source) => source.headers()?.hashes,
                None => None,
            },
            _ if !self.all_digests() => None,
            _ => self.compute_hashes(content_id, hops)?,
        };
        Ok(*content.hashes.get_or_init(|| hashes))
    }

    fn compute_hashes(&self, id: NodeId, hops: usize) -> Result<Option<(Digest, Digest)>> {
        let Some(top) = self.properties_of(id)?.child_hashes(self)? else {
            return Ok(None);
        };
        let mut children = Vec::new();
        for &c in self.children_of(id)?.iter() {
            match self.hashes_at_depth(c, hops)? {
                Some(h) => children.push((self.node(c), h)),
                None => return Ok(None),
            }
        }
        let children = children_hash(children.iter().map(|(node, (props, kids))| ChildDigest {
            name: &node.name,
            meta: &node.meta,
            properties: *props,
            children: *kids,
        }));
        Ok(Some((properties_hash(top), children)))
    }

    /// Resolve every instance reachable without descending into instances.
    pub(crate) fn validate_instances(&self) -> Result<usize> {
        let mut stack = vec![TOP];
        let mut instances = 0;
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            match node.body {
                NodeBody::Instance { .. } => {
                    self.content_of(id)?;
                    instances += 1;
                }
                NodeBody::Stored(_) => stack.extend(self.children_of(id)?.iter().rev()),
                NodeBody::Alias(_) => {}
            }
        }
        Ok(instances)
    }
}

/// An object of a read archive.
///
/// Lookups that find nothing return an invalid handle; check
/// [`valid`](Self::valid). Operations that need a real object fail with
/// `NotFound` on an invalid handle.
#[derive(Clone)]
pub struct IObject {
    shared: Arc<ArchiveShared>,
    id: Option<NodeId>,
    node: Arc<ObjectNode>,
}

impl IObject {
    pub(crate) fn new(shared: Arc<ArchiveShared>, id: NodeId) -> Self {
        let node = shared.node(id);
        Self {
            shared,
            id: Some(id),
            node,
        }
    }

    pub(crate) fn invalid(shared: Arc<ArchiveShared>) -> Self {
        Self {
            shared,
            id: None,
            node: Arc::new(ObjectNode::placeholder()),
        }
    }

    /// False for handles returned by failed lookups.
    pub fn valid(&self) -> bool {
        self.id.is_some()
    }

    fn id(&self) -> Result<NodeId> {
        self.id.ok_or_else(|| Error::not_found("invalid object"))
    }

    /// Empty for the top object.
    pub fn name(&self) -> &str {
        &self.node.name
    }

    /// Full path, `/` for the top object.
    pub fn full_name(&self) -> &str {
        &self.node.full_name
    }

    /// Merged object metadata.
    pub fn meta_data(&self) -> &MetaData {
        &self.node.meta
    }

    /// Name, path and metadata as one header.
    pub fn header(&self) -> ObjectHeader {
        ObjectHeader::new(self.node.name.clone(), self.node.full_name.clone(), self.node.meta.clone())
    }

    /// The `schema` metadata value, if any.
    pub fn schema(&self) -> Option<&str> {
        self.node.meta.schema()
    }

    /// Invalid for the top object.
    pub fn parent(&self) -> IObject {
        match self.node.parent {
            Some(p) => IObject::new(Arc::clone(&self.shared), p),
            None => IObject::invalid(Arc::clone(&self.shared)),
        }
    }

    /// Number of merged children.
    pub fn num_children(&self) -> Result<usize> {
        Ok(self.shared.children_of(self.id()?)?.len())
    }

    /// Child by name; an invalid handle when absent.
    pub fn child(&self, name: &str) -> Result<IObject> {
        let children = self.shared.children_of(self.id()?)?;
        let found = children.iter().copied().find(|&c| self.shared.node(c).name == name);
        Ok(match found {
            Some(c) => IObject::new(Arc::clone(&self.shared), c),
            None => IObject::invalid(Arc::clone(&self.shared)),
        })
    }

    /// Child by position; `OutOfRange` past the end.
    pub fn child_at(&self, index: usize) -> Result<IObject> {
        let children = self.shared.children_of(self.id()?)?;
        children
            .get(index)
            .map(|&c| IObject::new(Arc::clone(&self.shared), c))
            .ok_or(Error::OutOfRange {
                what: "child",
                index,
                count: children.len(),
            })
    }

    /// Children in first-definition order.
    pub fn children(&self) -> Result<Vec<IObject>> {
        let children = self.shared.children_of(self.id()?)?;
        Ok(children.iter().map(|&c| IObject::new(Arc::clone(&self.shared), c)).collect())
    }

    /// Names of the children, in order.
    pub fn child_names(&self) -> Result<Vec<String>> {
        let children = self.shared.children_of(self.id()?)?;
        Ok(children.iter().map(|&c| self.shared.node(c).name.clone()).collect())
    }

    /// The top-level compound property.
    pub fn properties(&self) -> Result<ICompoundProperty> {
        let reader = self.shared.properties_of(self.id()?)?;
        Ok(ICompoundProperty::new(Arc::clone(&self.shared), reader))
    }

    /// True for an instance root.
    pub fn is_instance_root(&self) -> bool {
        matches!(self.node.body, NodeBody::Instance { .. })
    }

    /// True below an instance root.
    pub fn is_instance_descendant(&self) -> bool {
        self.node.instance_descendant
    }

    /// Full path of the source object of an instance root.
    pub fn instance_source_path(&self) -> Option<&str> {
        match &self.node.body {
            NodeBody::Instance { source_path, .. } => Some(source_path),
            _ => None,
        }
    }

    /// The object this one shows content of: the source for instance
    /// roots, the mirrored object for instance descendants, itself
    /// otherwise.
    pub fn content_object(&self) -> Result<IObject> {
        let content = self.shared.content_of(self.id()?)?;
        Ok(IObject::new(Arc::clone(&self.shared), content))
    }

    /// Hash of the merged properties; `None` unless every layer records digests.
    pub fn properties_hash(&self) -> Result<Option<Digest>> {
        Ok(self.shared.hashes_of(self.id()?)?.map(|(p, _)| p))
    }

    /// Hash of the merged children, recursively.
    pub fn children_hash(&self) -> Result<Option<Digest>> {
        Ok(self.shared.hashes_of(self.id()?)?.map(|(_, c)| c))
    }
}

impl std::fmt::Debug for IObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IObject")
            .field("full_name", &self.node.full_name)
            .field("valid", &self.valid())
            .field("instance_root", &self.is_instance_root())
            .finish()
    }
}
