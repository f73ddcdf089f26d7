//! The interface between instrumented models and the hook registry.
//!
//! The registry never runs tensor math itself. Models describe their
//! structure through [`Module::visit`] so the registry can discover and name
//! their hook points, and expose a forward (and optionally backward) pass
//! through [`HookedModel`].
//!
//! # Example
//!
//! ```ignore
//! struct Block {
//!     hook_resid_pre: Arc<HookPoint>,
//!     mlp: Mlp,
//! }
//!
//! impl Module for Block {
//!     fn visit(&self, v: &mut ModuleVisitor<'_>) {
//!         v.hook_point("hook_resid_pre", &self.hook_resid_pre);
//!         v.module("mlp", &self.mlp);
//!     }
//! }
//!
//! impl Module for Transformer {
//!     fn visit(&self, v: &mut ModuleVisitor<'_>) {
//!         v.hook_point("hook_embed", &self.hook_embed);
//!         v.modules("blocks", &self.blocks); // blocks.0, blocks.1, ...
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::error::{HookError, Result};
use crate::hook_point::HookPoint;
use crate::hooks::Direction;
use crate::name::HookName;

/// A node in a model's module tree.
pub trait Module {
    /// Reports this module's hook points and child modules, in order.
    fn visit(&self, visitor: &mut ModuleVisitor<'_>);
}

/// A model whose forward pass runs through [`HookPoint`]s.
pub trait HookedModel: Module {
    /// Input to one forward pass.
    type Input;
    /// Result of one forward pass.
    type Output;

    /// Runs one forward pass.
    ///
    /// # Errors
    ///
    /// Implementation-defined; typically [`HookError::Model`].
    fn forward(&self, input: Self::Input) -> Result<Self::Output>;

    /// Propagates gradients from a scalar `output` back through the model,
    /// calling [`HookPoint::backward`] at every hook point it crosses.
    ///
    /// # Errors
    ///
    /// The default implementation returns [`HookError::BackwardUnsupported`].
    fn backward(&self, output: &Self::Output) -> Result<()> {
        let _ = output;
        Err(HookError::BackwardUnsupported)
    }

    /// Consulted before the registry binds a hook to `name`.
    ///
    /// Override to refuse bindings the model cannot honour.
    ///
    /// # Errors
    ///
    /// Return [`HookError::Rejected`] to veto the binding.
    fn check_hook(&self, name: &HookName, direction: Direction) -> Result<()> {
        let _ = (name, direction);
        Ok(())
    }
}

/// Everything a traversal found, in visit order.
#[derive(Debug, Default)]
pub(crate) struct Discovery {
    pub(crate) hook_points: Vec<(HookName, Arc<HookPoint>)>,
    pub(crate) modules: Vec<String>,
}

/// Walks a module tree, tracking the dotted path to the current position.
pub struct ModuleVisitor<'a> {
    path: Vec<String>,
    found: &'a mut Discovery,
}

impl<'a> ModuleVisitor<'a> {
    pub(crate) fn new(found: &'a mut Discovery) -> Self {
        Self {
            path: Vec::new(),
            found,
        }
    }

    /// Returns the dotted path of the module currently being visited.
    #[must_use]
    pub fn path(&self) -> String {
        self.path.join(".")
    }

    /// Reports a hook point held by the current module.
    pub fn hook_point(&mut self, name: &str, point: &Arc<HookPoint>) {
        self.path.push(name.to_string());
        let hook_name = HookName::from_segments(&self.path);
        self.found.hook_points.push((hook_name, Arc::clone(point)));
        self.path.pop();
    }

    /// Reports and descends into a child module.
    pub fn module<M: Module + ?Sized>(&mut self, name: &str, module: &M) {
        self.path.push(name.to_string());
        self.found.modules.push(self.path.join("."));
        module.visit(self);
        self.path.pop();
    }

    /// Reports a list of child modules, named by index under `name`.
    pub fn modules<M: Module>(&mut self, name: &str, modules: &[M]) {
        self.path.push(name.to_string());
        self.found.modules.push(self.path.join("."));
        for (index, module) in modules.iter().enumerate() {
            self.module(&index.to_string(), module);
        }
        self.path.pop();
    }
}
