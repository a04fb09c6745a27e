//! Method table: the immutable registry of static methods a run executes.

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::bytecode::{CallTarget, Instruction, Method};
use crate::fault::LoadError;
use crate::verify::verify_method;

/// Dense index of a method inside its [`MethodTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodId(pub(crate) u32);

impl MethodId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Method after verification, with call operands resolved.
#[derive(Debug, Clone)]
pub struct LoadedMethod {
    name: String,
    arity: u8,
    slot_count: u16,
    constants: Vec<i32>,
    code: Vec<Instruction<MethodId>>,
}

impl LoadedMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> u8 {
        self.arity
    }

    pub fn slot_count(&self) -> u16 {
        self.slot_count
    }

    pub fn constants(&self) -> &[i32] {
        &self.constants
    }

    pub fn code(&self) -> &[Instruction<MethodId>] {
        &self.code
    }
}

/// Registry of methods keyed by `(name, arity)`.
///
/// Built once by [`MethodTable::load`] and read-only afterwards, so a single
/// table can back any number of concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: Vec<LoadedMethod>,
    index: HashMap<(String, u8), MethodId>,
}

impl MethodTable {
    /// Verify every method and resolve all call targets.
    pub fn load(methods: impl IntoIterator<Item = Method>) -> Result<Self, LoadError> {
        let methods: Vec<Method> = methods.into_iter().collect();

        let mut index = HashMap::with_capacity(methods.len());
        for (i, method) in methods.iter().enumerate() {
            let key = (method.name.clone(), method.arity);
            if index.insert(key, MethodId(i as u32)).is_some() {
                return Err(LoadError::program(
                    &method.name,
                    0,
                    format!("duplicate method `{}/{}`", method.name, method.arity),
                ));
            }
        }

        let mut loaded = Vec::with_capacity(methods.len());
        for method in methods {
            verify_method(&method)?;

            let Method {
                name,
                arity,
                slot_count,
                constants,
                code,
            } = method;
            let mut resolved = Vec::with_capacity(code.len());
            for (pc, inst) in code.into_iter().enumerate() {
                resolved.push(inst.map_call(|target| resolve(&index, &name, pc, target))?);
            }

            loaded.push(LoadedMethod {
                name,
                arity,
                slot_count,
                constants,
                code: resolved,
            });
        }

        debug!("loaded method table with {} method(s)", loaded.len());
        Ok(Self {
            methods: loaded,
            index,
        })
    }

    pub fn lookup(&self, name: &str, arity: u8) -> Option<MethodId> {
        self.index.get(&(name.to_string(), arity)).copied()
    }

    /// Fetch a method by id. Ids handed out by this table are always valid.
    pub fn method(&self, id: MethodId) -> &LoadedMethod {
        &self.methods[id.index()]
    }

    pub fn get(&self, name: &str, arity: u8) -> Option<&LoadedMethod> {
        self.lookup(name, arity).map(|id| self.method(id))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MethodId, &LoadedMethod)> + '_ {
        self.methods
            .iter()
            .enumerate()
            .map(|(i, m)| (MethodId(i as u32), m))
    }
}

fn resolve(
    index: &HashMap<(String, u8), MethodId>,
    caller: &str,
    pc: usize,
    target: CallTarget,
) -> Result<MethodId, LoadError> {
    let key = (target.name, target.argc);
    index.get(&key).copied().ok_or_else(|| {
        LoadError::unknown_method(
            caller,
            pc,
            format!("call to undefined method `{}/{}`", key.0, key.1),
        )
    })
}
