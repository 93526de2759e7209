//! Lexical scope frames.
//!
//! An [`Environment`] is a shared handle to one frame: a binding map plus a parent
//! link. Cloning the handle does not copy the bindings, which is what lets several
//! closures created in one frame observe each other's assignments.
//!
//! Frames are reference counted. A closure stored in the frame it captures keeps
//! that frame alive through a cycle, so every frame created under a root is also
//! tracked weakly by the root; [`Environment::teardown`] clears all of them at
//! once when the owning interpreter goes away.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use crate::Error;
use crate::ast::{Symbol, Value};

type FrameRegistry = Rc<RefCell<Vec<Weak<Frame>>>>;

struct Frame {
    bindings: RefCell<HashMap<Symbol, Value>>,
    parent: Option<Environment>,
    label: String,
    /// Last expression evaluated with this frame current
    current_code: RefCell<Option<Value>>,
    registry: FrameRegistry,
}

/// Shared handle to a binding frame
#[derive(Clone)]
pub struct Environment(Rc<Frame>);

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Environment({})", self.0.label)
    }
}

/// Frames compare by identity
impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Environment {
    /// Create a root frame with no parent
    pub fn new() -> Self {
        let registry: FrameRegistry = Rc::new(RefCell::new(Vec::new()));
        let frame = Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
            label: "global".to_owned(),
            current_code: RefCell::new(None),
            registry: registry.clone(),
        });
        registry.borrow_mut().push(Rc::downgrade(&frame));
        Environment(frame)
    }

    /// Create a child frame; `label` names it in debugger dumps
    pub fn with_parent(parent: &Environment, label: impl Into<String>) -> Self {
        let registry = parent.0.registry.clone();
        let frame = Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            label: label.into(),
            current_code: RefCell::new(None),
            registry: registry.clone(),
        });

        let mut frames = registry.borrow_mut();
        if frames.len() == frames.capacity() {
            frames.retain(|weak| weak.strong_count() > 0);
        }
        frames.push(Rc::downgrade(&frame));
        drop(frames);

        Environment(frame)
    }

    pub fn parent(&self) -> Option<&Environment> {
        self.0.parent.as_ref()
    }

    pub fn label(&self) -> &str {
        &self.0.label
    }

    pub fn ptr_eq(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Bind `name` in this frame, overwriting any earlier binding here
    pub fn define(&self, name: Symbol, value: Value) {
        self.0.bindings.borrow_mut().insert(name, value);
    }

    /// Walk the chain innermost-first
    pub fn get(&self, name: Symbol) -> Option<Value> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.0.bindings.borrow().get(&name) {
                return Some(value.clone());
            }
            frame = frame.parent()?;
        }
    }

    pub fn lookup(&self, name: Symbol) -> Result<Value, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnboundSymbol(name.to_string()))
    }

    /// Mutate the innermost existing binding of `name`; never creates one
    pub fn assign(&self, name: Symbol, value: Value) -> Result<(), Error> {
        let mut frame = self;
        loop {
            if let Some(slot) = frame.0.bindings.borrow_mut().get_mut(&name) {
                *slot = value;
                return Ok(());
            }
            match frame.parent() {
                Some(parent) => frame = parent,
                None => return Err(Error::UnboundSymbol(name.to_string())),
            }
        }
    }

    pub fn is_bound_locally(&self, name: Symbol) -> bool {
        self.0.bindings.borrow().contains_key(&name)
    }

    pub(crate) fn set_current_code(&self, code: &Value) {
        *self.0.current_code.borrow_mut() = Some(code.clone());
    }

    /// Get all bindings in this environment and its parents
    /// Returns a Vec of (name, value) pairs sorted by name, inner bindings winning
    pub fn get_all_bindings(&self) -> Vec<(Symbol, Value)> {
        let mut bindings = HashMap::new();

        if let Some(parent) = self.parent() {
            bindings.extend(parent.get_all_bindings());
        }
        for (name, value) in self.0.bindings.borrow().iter() {
            bindings.insert(*name, value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    fn frames(&self) -> impl Iterator<Item = &Environment> {
        std::iter::successors(Some(self), |frame| frame.parent())
    }

    /// One line describing this frame and what it was last evaluating
    pub fn dump_header(&self) -> String {
        match &*self.0.current_code.borrow() {
            Some(code) => format!("{}: {code}", self.0.label),
            None => self.0.label.clone(),
        }
    }

    /// Numbered headers for the whole chain, innermost frame first
    pub fn dump_headers(&self) -> String {
        let mut out = String::new();
        for (index, frame) in self.frames().enumerate() {
            let _ = writeln!(out, "{index:>3}: {}", frame.dump_header());
        }
        out
    }

    fn dump_frame_into(&self, index: usize, out: &mut String) {
        let _ = writeln!(out, "{index:>3}: {}", self.dump_header());
        let mut bindings: Vec<_> = self
            .0
            .bindings
            .borrow()
            .iter()
            .map(|(name, value)| (*name, value.clone()))
            .collect();
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in bindings {
            let _ = writeln!(out, "       {name} => {value}");
        }
    }

    /// Full contents of every frame in the chain
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (index, frame) in self.frames().enumerate() {
            frame.dump_frame_into(index, &mut out);
        }
        out
    }

    /// Full contents of frame `index`, counted outward from this one
    pub fn dump_single_frame(&self, index: usize) -> String {
        match self.frames().nth(index) {
            Some(frame) => {
                let mut out = String::new();
                frame.dump_frame_into(index, &mut out);
                out
            }
            None => format!("No such frame: {index}\n"),
        }
    }

    /// Clear every live frame created under this frame's root.
    ///
    /// Breaks reference cycles between frames and the closures they hold. Any
    /// handle still held afterwards sees empty frames.
    pub fn teardown(&self) {
        let frames: Vec<Rc<Frame>> = self
            .0
            .registry
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for frame in &frames {
            let bindings = std::mem::take(&mut *frame.bindings.borrow_mut());
            let code = frame.current_code.borrow_mut().take();
            drop(bindings);
            drop(code);
        }
        self.0.registry.borrow_mut().clear();
    }

    #[cfg(test)]
    pub(crate) fn live_frame_count(&self) -> usize {
        self.0
            .registry
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
