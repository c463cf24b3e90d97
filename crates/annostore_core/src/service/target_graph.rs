//! Transitive target closure and its propagation.
//!
//! # Responsibility
//! - Compute the closure of descriptors reachable from an annotation through
//!   annotation-typed targets.
//! - Recompute dependents after a change so stored closures stay current.
//!
//! # Invariants
//! - A closure never contains the id of the annotation it belongs to.
//! - Closure entries have unique ids and keep first-occurrence order.
//! - Tombstoned annotations are leaves; their own targets are not expanded.
//! - Traversal and propagation are iterative and bounded by
//!   `StoreConfig::max_graph_depth` and the visited sets respectively.

use crate::error::{AnnotationError, AnnotationResult};
use crate::model::annotation::Annotation;
use crate::model::kind::DocumentKind;
use crate::model::record::{is_tombstone, TARGET_CLOSURE_ID_PATH};
use crate::model::target::TargetDescriptor;
use crate::repo::document_store::DocumentStore;
use crate::service::annotation_store::AnnotationStore;
use log::{debug, info};
use std::collections::{HashMap, HashSet, VecDeque};

/// Partially expanded annotation on the traversal stack.
struct Frame {
    id: String,
    direct: Vec<TargetDescriptor>,
    next: usize,
    closure: Vec<TargetDescriptor>,
    seen: HashSet<String>,
}

impl Frame {
    fn new(id: String, direct: Vec<TargetDescriptor>) -> Self {
        let mut frame = Self {
            seen: HashSet::from([id.clone()]),
            id,
            direct: Vec::new(),
            next: 0,
            closure: Vec::new(),
        };
        frame.merge(&direct);
        frame.direct = direct;
        frame
    }

    fn merge(&mut self, descriptors: &[TargetDescriptor]) {
        for descriptor in descriptors {
            if self.seen.insert(descriptor.id.clone()) {
                self.closure.push(descriptor.clone());
            }
        }
    }
}

impl<S: DocumentStore> AnnotationStore<S> {
    /// Computes the transitive target closure of `annotation`.
    ///
    /// Deterministic for an unchanged store.
    ///
    /// # Errors
    /// - `SelfTarget` when a direct target is the annotation itself.
    /// - `TargetCycle` when an annotation-typed target leads back onto the
    ///   current traversal path.
    /// - `NotFound` when an annotation-typed target does not exist.
    /// - `GraphTooDeep` beyond `max_graph_depth` nested annotations.
    pub fn compute_closure(&self, annotation: &Annotation) -> AnnotationResult<Vec<TargetDescriptor>> {
        let root_id = annotation.id();
        let direct = annotation.target_info();
        if direct.iter().any(|descriptor| descriptor.id == root_id) {
            return Err(AnnotationError::SelfTarget {
                id: root_id.to_string(),
            });
        }

        let limit = self.config().max_graph_depth;
        let mut memo: HashMap<String, Vec<TargetDescriptor>> = HashMap::new();
        let mut path: Vec<String> = vec![root_id.to_string()];
        let mut stack = vec![Frame::new(root_id.to_string(), direct)];

        loop {
            let Some(frame) = stack.last_mut() else {
                return Ok(Vec::new());
            };

            if let Some(descriptor) = frame.direct.get(frame.next).cloned() {
                frame.next += 1;
                if !descriptor.is_annotation() {
                    continue;
                }
                if let Some(closure) = memo.get(&descriptor.id) {
                    frame.merge(closure);
                    continue;
                }
                if path.contains(&descriptor.id) {
                    let mut cycle = path.clone();
                    cycle.push(descriptor.id);
                    return Err(AnnotationError::TargetCycle { path: cycle });
                }

                let stored = self.load_record(DocumentKind::Annotation, &descriptor.id)?;
                if is_tombstone(&stored) {
                    memo.insert(descriptor.id, Vec::new());
                    continue;
                }
                if path.len() > limit {
                    return Err(AnnotationError::GraphTooDeep {
                        id: root_id.to_string(),
                        limit,
                    });
                }
                let (target, _) = Annotation::from_stored(stored)?;
                path.push(descriptor.id.clone());
                stack.push(Frame::new(descriptor.id, target.target_info()));
                continue;
            }

            let Some(finished) = stack.pop() else {
                return Ok(Vec::new());
            };
            path.pop();
            match stack.last_mut() {
                Some(parent) => {
                    parent.merge(&finished.closure);
                    memo.insert(finished.id, finished.closure);
                }
                None => return Ok(finished.closure),
            }
        }
    }

    /// Recomputes and persists the closures of every annotation depending on
    /// `changed_id`, cascading to their own dependents.
    ///
    /// Best effort: writes done before a failing step are kept.
    pub fn propagate_change(&self, changed_id: &str) -> AnnotationResult<usize> {
        self.refresh()?;

        let mut queue = VecDeque::from([changed_id.to_string()]);
        let mut pending: HashSet<String> = HashSet::from([changed_id.to_string()]);
        let mut rewritten = 0usize;

        while let Some(current) = queue.pop_front() {
            pending.remove(&current);
            self.ensure_fresh()?;
            let dependents = self.store().search_by_field(
                DocumentKind::Annotation,
                TARGET_CLOSURE_ID_PATH,
                &current,
            )?;
            debug!(
                "event=closure_propagate module=graph status=start id={current} dependents={}",
                dependents.len()
            );

            for stored in dependents {
                if is_tombstone(&stored) {
                    continue;
                }
                let (dependent, previous) = Annotation::from_stored(stored)?;
                if dependent.id() == current {
                    return Err(AnnotationError::SelfTarget { id: current });
                }

                let closure = self.compute_closure(&dependent)?;
                if same_ids(&previous, &closure) {
                    continue;
                }
                self.write(
                    DocumentKind::Annotation,
                    dependent.id(),
                    &dependent.to_stored(&closure)?,
                )?;
                rewritten += 1;
                if pending.insert(dependent.id().to_string()) {
                    queue.push_back(dependent.id().to_string());
                }
            }
        }

        info!("event=closure_propagate module=graph status=ok id={changed_id} rewritten={rewritten}");
        Ok(rewritten)
    }
}

fn same_ids(left: &[TargetDescriptor], right: &[TargetDescriptor]) -> bool {
    let left: HashSet<&str> = left.iter().map(|d| d.id.as_str()).collect();
    let right: HashSet<&str> = right.iter().map(|d| d.id.as_str()).collect();
    left == right
}
