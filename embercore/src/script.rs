//! Per-entity script bindings. The embedded interpreter itself is out of
//! scope (§1); [`ScriptWorld`] is generic over a [`ScriptBackend`] trait so
//! the running engine can plug in a real VM while tests use
//! [`RecordingScriptBackend`] or the null default.

use crate::unit::UnitId;
use nalgebra::Vector3;
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::trace;

/// Tagged argument union passed across the scripting bridge (§9: "enumerated
/// types, fixed max arity, no heap allocation per call"). `SmallVec` keeps a
/// typical call (a handful of args) off the heap.
#[derive(Copy, Clone, Debug)]
pub enum ScriptArg {
    Float(f32),
    Int(i64),
    Bool(bool),
    Vector3(Vector3<f32>),
    Unit(UnitId),
}

pub type ScriptArgs = SmallVec<[ScriptArg; 6]>;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum CallOutcome {
    Called,
    NotDefined,
}

/// Opaque handle to a loaded script module, scoped to one [`ScriptBackend`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ModuleHandle(u32);

impl ModuleHandle {
    pub const INVALID: ModuleHandle = ModuleHandle(u32::MAX);
}

/// The embedded interpreter's dispatch contract. `load_module` is keyed by
/// the compiled script resource id so repeated spawns of the same resource
/// share one loaded module (§4.7 "module cache keyed by resource id").
pub trait ScriptBackend {
    fn load_module(&mut self, resource_id: u64) -> ModuleHandle;
    fn defines(&self, module: ModuleHandle, fn_name: &str) -> bool;
    fn call(&mut self, module: ModuleHandle, fn_name: &str, args: &ScriptArgs) -> CallOutcome;
    /// Calls `fn_name(world, units, args)` once for a whole group of units
    /// that share `module`, per §4.7's `multicast_group` contract.
    fn call_group(&mut self, module: ModuleHandle, fn_name: &str, units: &[UnitId], args: &ScriptArgs) -> CallOutcome;
}

/// Accepts every load/call and reports no function as defined. Used when
/// scripting is compiled out or disabled.
#[derive(Default)]
pub struct NullScriptBackend;

impl ScriptBackend for NullScriptBackend {
    fn load_module(&mut self, _resource_id: u64) -> ModuleHandle {
        ModuleHandle::INVALID
    }
    fn defines(&self, _module: ModuleHandle, _fn_name: &str) -> bool {
        false
    }
    fn call(&mut self, _module: ModuleHandle, _fn_name: &str, _args: &ScriptArgs) -> CallOutcome {
        CallOutcome::NotDefined
    }
    fn call_group(&mut self, _module: ModuleHandle, _fn_name: &str, _units: &[UnitId], _args: &ScriptArgs) -> CallOutcome {
        CallOutcome::NotDefined
    }
}

/// One recorded dispatch, for test assertions.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub module: ModuleHandle,
    pub fn_name: String,
    pub units: Vec<UnitId>,
    pub args: Vec<ScriptArg>,
}

/// Deterministic backend for tests: every resource id maps to its own
/// module, every function is considered defined unless explicitly excluded,
/// and every dispatch is appended to `calls` for assertion.
#[derive(Default)]
pub struct RecordingScriptBackend {
    pub calls: Vec<RecordedCall>,
    next_module: u32,
    modules_by_resource: HashMap<u64, ModuleHandle>,
    undefined_functions: HashMap<ModuleHandle, Vec<String>>,
}

impl RecordingScriptBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `fn_name` as absent on `module`, so `defines`/`call` behave as
    /// if the module's script simply never declared it.
    pub fn mark_undefined(&mut self, module: ModuleHandle, fn_name: &str) {
        self.undefined_functions.entry(module).or_default().push(fn_name.to_string());
    }
}

impl ScriptBackend for RecordingScriptBackend {
    fn load_module(&mut self, resource_id: u64) -> ModuleHandle {
        *self.modules_by_resource.entry(resource_id).or_insert_with(|| {
            let handle = ModuleHandle(self.next_module);
            self.next_module += 1;
            handle
        })
    }

    fn defines(&self, module: ModuleHandle, fn_name: &str) -> bool {
        !self
            .undefined_functions
            .get(&module)
            .is_some_and(|fns| fns.iter().any(|f| f == fn_name))
    }

    fn call(&mut self, module: ModuleHandle, fn_name: &str, args: &ScriptArgs) -> CallOutcome {
        if !self.defines(module, fn_name) {
            return CallOutcome::NotDefined;
        }
        self.calls.push(RecordedCall {
            module,
            fn_name: fn_name.to_string(),
            units: Vec::new(),
            args: args.to_vec(),
        });
        CallOutcome::Called
    }

    fn call_group(&mut self, module: ModuleHandle, fn_name: &str, units: &[UnitId], args: &ScriptArgs) -> CallOutcome {
        if !self.defines(module, fn_name) {
            return CallOutcome::NotDefined;
        }
        self.calls.push(RecordedCall {
            module,
            fn_name: fn_name.to_string(),
            units: units.to_vec(),
            args: args.to_vec(),
        });
        CallOutcome::Called
    }
}

/// What a unit's script resource names: which compiled module to load and
/// bind this instance to.
#[derive(Clone, Debug)]
pub struct ScriptDesc {
    pub resource_id: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ScriptInstance(u32);

impl ScriptInstance {
    pub const INVALID: ScriptInstance = ScriptInstance(u32::MAX);
    pub fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

struct Entry {
    unit: UnitId,
    module: ModuleHandle,
}

/// Owns every unit's script instance for one `World`, dispatching
/// broadcast/unicast/group calls through a [`ScriptBackend`].
pub struct ScriptWorld<B: ScriptBackend = NullScriptBackend> {
    backend: B,
    entries: Vec<Option<Entry>>,
    of_unit: HashMap<UnitId, u32>,
    all_modules: Vec<ModuleHandle>,
    /// Debug-only short-circuit used during hot-reload races (§4.7).
    pub disable_callbacks: bool,
}

impl Default for ScriptWorld<NullScriptBackend> {
    fn default() -> Self {
        ScriptWorld::with_backend(NullScriptBackend)
    }
}

impl<B: ScriptBackend> ScriptWorld<B> {
    pub fn with_backend(backend: B) -> Self {
        ScriptWorld {
            backend,
            entries: Vec::new(),
            of_unit: HashMap::new(),
            all_modules: Vec::new(),
            disable_callbacks: false,
        }
    }

    /// Ensures `desc`'s module is loaded (cached by resource id) and binds
    /// `unit` to it. Hard error if `unit` already has a script instance,
    /// matching §4.7's "a unit may have at most one script instance".
    pub fn create(&mut self, unit: UnitId, desc: &ScriptDesc) -> ScriptInstance {
        if self.of_unit.contains_key(&unit) {
            crate::debug_panic!("unit {unit:?} already has a script instance");
        }

        let module = self.backend.load_module(desc.resource_id);
        if !self.all_modules.contains(&module) {
            self.all_modules.push(module);
        }

        let index = self.entries.len() as u32;
        self.entries.push(Some(Entry { unit, module }));
        self.of_unit.insert(unit, index);
        trace!(?unit, "script instance created");
        ScriptInstance(index)
    }

    pub fn destroy(&mut self, instance: ScriptInstance) {
        if let Some(Some(entry)) = self.entries.get_mut(instance.0 as usize).map(std::mem::take) {
            self.of_unit.remove(&entry.unit);
        }
    }

    /// Removes `unit`'s script instance, if any. Called from the
    /// `UnitManager` destroy callback so a destroyed unit's script never
    /// sees another dispatch (§4.7).
    pub fn destroy_unit(&mut self, unit: UnitId) {
        if let Some(index) = self.of_unit.remove(&unit) {
            self.entries[index as usize] = None;
        }
    }

    pub fn instance(&self, unit: UnitId) -> ScriptInstance {
        self.of_unit.get(&unit).map(|&i| ScriptInstance(i)).unwrap_or(ScriptInstance::INVALID)
    }

    /// Calls `fn_name` on every loaded module that defines it.
    pub fn broadcast(&mut self, fn_name: &str, args: &ScriptArgs) {
        if self.disable_callbacks {
            return;
        }
        for &module in &self.all_modules.clone() {
            self.backend.call(module, fn_name, args);
        }
    }

    /// Calls `fn_name` on `instance`'s module only if defined there.
    pub fn unicast(&mut self, fn_name: &str, instance: ScriptInstance, args: &ScriptArgs) {
        if self.disable_callbacks {
            return;
        }
        let Some(Some(entry)) = self.entries.get(instance.0 as usize) else {
            return;
        };
        self.backend.call(entry.module, fn_name, args);
    }

    /// Groups `units` by script module (stable order by first encounter, to
    /// keep multicast ordering reproducible per §9) and calls
    /// `fn_name(world, group_units, args)` once per group.
    pub fn multicast_group(&mut self, fn_name: &str, units: &[UnitId], args: &ScriptArgs) {
        if self.disable_callbacks {
            return;
        }

        let mut order: Vec<ModuleHandle> = Vec::new();
        let mut groups: HashMap<ModuleHandle, Vec<UnitId>> = HashMap::new();
        for &unit in units {
            let Some(&index) = self.of_unit.get(&unit) else {
                continue;
            };
            let Some(entry) = &self.entries[index as usize] else {
                continue;
            };
            if !groups.contains_key(&entry.module) {
                order.push(entry.module);
            }
            groups.entry(entry.module).or_default().push(unit);
        }

        for module in order {
            let group_units = &groups[&module];
            self.backend.call_group(module, fn_name, group_units, args);
        }
    }

    pub fn spawned(&mut self, units: &[UnitId]) {
        self.multicast_group("spawned", units, &ScriptArgs::new());
    }

    pub fn unspawned(&mut self, units: &[UnitId]) {
        self.multicast_group("unspawned", units, &ScriptArgs::new());
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::UnitManager;

    fn args() -> ScriptArgs {
        ScriptArgs::new()
    }

    #[test]
    fn broadcast_calls_every_module_defining_the_function() {
        let mut mgr = UnitManager::new();
        let mut scripts = ScriptWorld::with_backend(RecordingScriptBackend::new());
        let a = mgr.create();
        let b = mgr.create();
        scripts.create(a, &ScriptDesc { resource_id: 1 });
        scripts.create(b, &ScriptDesc { resource_id: 2 });

        scripts.broadcast("update", &args());
        assert_eq!(scripts.backend().calls.len(), 2);
    }

    #[test]
    fn unicast_only_reaches_its_own_instance() {
        let mut mgr = UnitManager::new();
        let mut scripts = ScriptWorld::with_backend(RecordingScriptBackend::new());
        let a = mgr.create();
        let b = mgr.create();
        let ia = scripts.create(a, &ScriptDesc { resource_id: 1 });
        scripts.create(b, &ScriptDesc { resource_id: 1 });

        scripts.unicast("collision_begin", ia, &args());
        assert_eq!(scripts.backend().calls.len(), 1);
    }

    #[test]
    fn multicast_group_groups_units_by_module() {
        let mut mgr = UnitManager::new();
        let mut scripts = ScriptWorld::with_backend(RecordingScriptBackend::new());
        let a = mgr.create();
        let b = mgr.create();
        let c = mgr.create();
        scripts.create(a, &ScriptDesc { resource_id: 1 });
        scripts.create(b, &ScriptDesc { resource_id: 1 });
        scripts.create(c, &ScriptDesc { resource_id: 2 });

        scripts.spawned(&[a, b, c]);

        assert_eq!(scripts.backend().calls.len(), 2);
        let first = &scripts.backend().calls[0];
        assert_eq!(first.units, vec![a, b]);
        let second = &scripts.backend().calls[1];
        assert_eq!(second.units, vec![c]);
    }

    #[test]
    fn disabled_callbacks_short_circuit_every_dispatch() {
        let mut mgr = UnitManager::new();
        let mut scripts = ScriptWorld::with_backend(RecordingScriptBackend::new());
        let a = mgr.create();
        scripts.create(a, &ScriptDesc { resource_id: 1 });
        scripts.disable_callbacks = true;

        scripts.broadcast("update", &args());
        assert!(scripts.backend().calls.is_empty());
    }

    #[test]
    fn destroy_unit_removes_instance_before_any_broadcast() {
        let mut mgr = UnitManager::new();
        let mut scripts = ScriptWorld::with_backend(RecordingScriptBackend::new());
        let a = mgr.create();
        scripts.create(a, &ScriptDesc { resource_id: 1 });
        scripts.destroy_unit(a);
        assert!(!scripts.instance(a).is_valid());
    }
}
