//! Module-level data that is not a type, constant, function or block:
//! global variables and their linkage.

use crate::entities::{TypeId, UseId};
use crate::function::Linkage;

#[derive(Debug, Clone)]
pub struct GlobalData {
    pub name: String,
    pub ty: TypeId,
    /// Value type this global points to; the global itself always has
    /// pointer type.
    pub value_ty: TypeId,
    pub linkage: Linkage,
    pub initializer: Option<crate::entities::ConstId>,
    pub use_head: Option<UseId>,
}
