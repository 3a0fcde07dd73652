//! The slice of the page the install handler touches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub trait Element: Send + Sync {
    fn set_visible(&self, visible: bool);
    fn is_visible(&self) -> bool;
}

pub trait Document: Send + Sync {
    fn element_by_id(&self, id: &str) -> Option<Arc<dyn Element>>;

    /// Add a class to the root element. Adding a present class is a no-op.
    fn add_root_class(&self, class: &str);

    fn has_root_class(&self, class: &str) -> bool;
}

/// Display-mode signals reported by the host.
pub trait DisplayEnvironment: Send + Sync {
    fn matches_media(&self, query: &str) -> bool;

    /// Legacy `navigator.standalone`; `None` where the host lacks it
    fn navigator_standalone(&self) -> Option<bool>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Starts hidden, like the install button in the page markup.
#[derive(Debug, Default)]
pub struct MemoryElement {
    visible: AtomicBool,
}

impl Element for MemoryElement {
    fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }

    fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocument {
    elements: Mutex<HashMap<String, Arc<MemoryElement>>>,
    root_classes: Mutex<Vec<String>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(self, id: &str) -> Self {
        lock(&self.elements).insert(id.to_string(), Arc::new(MemoryElement::default()));
        self
    }

    pub fn element(&self, id: &str) -> Option<Arc<MemoryElement>> {
        lock(&self.elements).get(id).cloned()
    }

    pub fn root_classes(&self) -> Vec<String> {
        lock(&self.root_classes).clone()
    }
}

impl Document for MemoryDocument {
    fn element_by_id(&self, id: &str) -> Option<Arc<dyn Element>> {
        self.element(id).map(|e| e as Arc<dyn Element>)
    }

    fn add_root_class(&self, class: &str) {
        let mut classes = lock(&self.root_classes);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }

    fn has_root_class(&self, class: &str) -> bool {
        lock(&self.root_classes).iter().any(|c| c == class)
    }
}

/// Fixed display signals.
#[derive(Debug, Clone, Default)]
pub struct StaticDisplay {
    pub matching_media: Vec<String>,
    pub navigator_standalone: Option<bool>,
}

impl StaticDisplay {
    /// A regular browser tab
    pub fn browser() -> Self {
        Self::default()
    }

    pub fn with_media(mut self, query: &str) -> Self {
        self.matching_media.push(query.to_string());
        self
    }

    pub fn with_navigator_standalone(mut self, standalone: bool) -> Self {
        self.navigator_standalone = Some(standalone);
        self
    }
}

impl DisplayEnvironment for StaticDisplay {
    fn matches_media(&self, query: &str) -> bool {
        self.matching_media.iter().any(|q| q == query)
    }

    fn navigator_standalone(&self) -> Option<bool> {
        self.navigator_standalone
    }
}
