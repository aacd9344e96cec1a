// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Context Frames
//!
//! A [`ContextFrame`] is one node of the thread-scoped stack of request and
//! operation attributes. Frames link to the frame that was active before them
//! through a non-owning parent pointer, so pushing a frame never copies or keeps
//! alive its ancestors. Whoever pushed a frame keeps the prior frame alive until
//! it pops.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Type-keyed attribute store. At most one value per type.
///
/// Cloning is shallow: values are shared between the clones.
#[derive(Clone, Default)]
pub struct Attributes {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing any previous value of the same type.
    /// Returns `true` if a value was replaced.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) -> bool {
        self.entries
            .insert(TypeId::of::<T>(), Arc::new(value))
            .is_some()
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: Any + Send + Sync>(&mut self) -> bool {
        self.entries.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// A node in the thread-scoped attribute stack.
pub struct ContextFrame {
    attributes: Attributes,
    parent: Option<Weak<ContextFrame>>,
}

impl ContextFrame {
    /// A root frame with no parent.
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            parent: None,
        }
    }

    /// A frame carrying `template`'s attributes forward, linked under `parent`.
    pub fn derive(template: &ContextFrame, parent: Option<&Arc<ContextFrame>>) -> Self {
        Self {
            attributes: template.attributes.clone(),
            parent: parent.map(Arc::downgrade),
        }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.attributes.get::<T>()
    }

    /// The frame that was active when this one was pushed, while it is still alive.
    pub fn parent(&self) -> Option<Arc<ContextFrame>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Number of live ancestors above this frame.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut next = self.parent();
        while let Some(frame) = next {
            depth += 1;
            next = frame.parent();
        }
        depth
    }
}

impl fmt::Debug for ContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFrame")
            .field("attributes", &self.attributes)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// The thread-scoped stack of [`ContextFrame`]s. Every operation acts on the
/// calling thread.
pub trait FrameStack: Send + Sync {
    /// The calling thread's active frame, if any.
    fn current_frame(&self) -> Option<Arc<ContextFrame>>;

    /// Make `frame` active and return the frame it replaced.
    fn enter_frame(&self, frame: Arc<ContextFrame>) -> Option<Arc<ContextFrame>>;

    /// Reactivate `prior` and return the frame it replaced.
    fn exit_frame(&self, prior: Option<Arc<ContextFrame>>) -> Option<Arc<ContextFrame>>;
}
