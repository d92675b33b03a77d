//! `MirContext` owns every function in a compilation unit and the global
//! variables they reference; it is the MIR counterpart to `cc_ir::Context`.

use hashbrown::HashMap;

use crate::entities::{Arena, MirFuncId};
use crate::function::MirFunction;
use crate::types::MirType;

#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub name: String,
    pub data: Vec<u8>,
    pub alignment: u32,
}

#[derive(Debug, Default)]
pub struct MirContext {
    pub funcs: Arena<MirFuncId, MirFunction>,
    pub func_names: HashMap<String, MirFuncId>,
    pub globals: Vec<GlobalVariable>,
}

impl MirContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_function(
        &mut self,
        name: &str,
        ret_type: MirType,
        flags: crate::function::FunctionFlags,
    ) -> MirFuncId {
        if let Some(&id) = self.func_names.get(name) {
            return id;
        }
        let id = self.funcs.push(MirFunction::new(name, ret_type, flags));
        self.func_names.insert(name.to_string(), id);
        id
    }

    pub fn get_function(&self, name: &str) -> Option<MirFuncId> {
        self.func_names.get(name).copied()
    }
}
