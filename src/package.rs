// src/package.rs
//
// Registration of native modules with a host runtime.

use std::collections::HashMap;

use log::{info, warn};

use crate::config::EngineConfig;
use crate::module::{JunoEngineModule, NativeModule};
use crate::native::GlobalEngine;

/// Host state handed to packages while they create their modules.
#[derive(Debug, Clone, Default)]
pub struct HostContext {
    pub config: EngineConfig,
}

impl HostContext {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

/// A native UI component factory. This crate ships none.
pub trait ViewManager: Send + Sync {
    fn name(&self) -> &'static str;
}

/// A bundle of native modules and view managers.
pub trait ModulePackage {
    fn create_native_modules(&self, ctx: &HostContext) -> Vec<Box<dyn NativeModule>>;
    fn create_view_managers(&self, ctx: &HostContext) -> Vec<Box<dyn ViewManager>>;
}

/// Exposes the Juno engine module over the process-wide engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct JunoEnginePackage;

impl ModulePackage for JunoEnginePackage {
    fn create_native_modules(&self, ctx: &HostContext) -> Vec<Box<dyn NativeModule>> {
        GlobalEngine::engine().configure(ctx.config);
        vec![Box::new(JunoEngineModule::new(GlobalEngine))]
    }

    fn create_view_managers(&self, _ctx: &HostContext) -> Vec<Box<dyn ViewManager>> {
        Vec::new()
    }
}

/// Modules from every registered package, looked up by name.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<&'static str, Box<dyn NativeModule>>,
    view_managers: Vec<Box<dyn ViewManager>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register everything a package provides.
    ///
    /// A module whose name is already taken is discarded.
    pub fn register(&mut self, package: &dyn ModulePackage, ctx: &HostContext) {
        for module in package.create_native_modules(ctx) {
            let name = module.name();
            if self.modules.contains_key(name) {
                warn!("module {name} already registered, ignoring duplicate");
                continue;
            }
            info!("registered module {name}");
            self.modules.insert(name, module);
        }
        self.view_managers.extend(package.create_view_managers(ctx));
    }

    pub fn module(&self, name: &str) -> Option<&dyn NativeModule> {
        self.modules.get(name).map(|m| m.as_ref())
    }

    pub fn module_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.modules.keys().copied()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn view_managers(&self) -> &[Box<dyn ViewManager>] {
        &self.view_managers
    }
}
