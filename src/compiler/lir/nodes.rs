//! LIR node definitions.
//!
//! The lowered form is a flat three-address instruction list per
//! function: `dst := op(args)` with explicit labels, jumps and frees.
//! Program order is preserved exactly as written; no reordering happens
//! here or later. The whole module serializes to JSON for the target
//! emitters, which map each [RuntimeCall] to its fixed `ago_*` symbol.

use crate::compiler::datatypes::TypeTag;
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::runtime::value::Value;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------

/// Index into [LirModule::functions] and [FunctionTable].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId(u32);

impl FunctionId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_u32(id: u32) -> Self {
        Self(id)
    }
}

/// A storage slot within one function frame. Bindings and temporaries
/// share the same local space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(u32);

impl LocalId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_u32(id: u32) -> Self {
        Self(id)
    }
}

/// A branch target within one function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId(u32);

impl LabelId {
    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_u32(id: u32) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------
// Operands and instructions
// ---------------------------------------------------------------------

/// An instruction argument: a folded compile-time constant, a local
/// slot, or a reference to a function (for closure creation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Const(Value),
    Local(LocalId),
    FunctionRef(FunctionId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Inst {
    /// Branch target marker.
    Label(LabelId),

    Jump(LabelId),

    /// Falls through when the condition is true, jumps when false.
    Branch {
        condition: Operand,
        if_false: LabelId,
    },

    /// `dst := src`
    Store { dst: LocalId, src: Operand },

    /// Direct call to a user function from the function table.
    Call {
        dst: Option<LocalId>,
        function: FunctionId,
        args: Vec<Operand>,
    },

    /// Call through a Function value (lambda dispatch).
    CallIndirect {
        dst: Option<LocalId>,
        callee: Operand,
        args: Vec<Operand>,
    },

    /// Named runtime-library call; the emitter resolves the symbol via
    /// [RuntimeCall::name].
    CallRuntime {
        dst: Option<LocalId>,
        call: RuntimeCall,
        args: Vec<Operand>,
    },

    /// Allocate an empty heap value (list or struct) into `dst`.
    Alloc {
        dst: LocalId,
        tag: TypeTag,
        capacity: usize,
    },

    /// Release the heap value in `target` at owning-scope end.
    Free { target: LocalId, tag: TypeTag },

    /// Create a Function value from copies of the captured operands.
    /// The snapshot is taken here, at closure-creation time.
    MakeClosure {
        dst: LocalId,
        function: FunctionId,
        captures: Vec<Operand>,
    },

    Return(Option<Operand>),
}

/// The fixed runtime-library surface. Every name the emitters must
/// implement appears here exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeCall {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,

    // Comparison
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Equal,
    NotEqual,

    // Logical (value level; short-circuit is branch structure, not a call)
    And,
    Or,
    Not,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,

    // Membership and coalescing
    In,
    Elvis,

    // Range construction
    Range,
    RangeExclusive,

    Cast(TypeTag),

    // Collections
    ListNew,
    ListGet,
    ListSet,
    ListAppend,
    ListFree,
    ListLength,

    // Strings
    StringConcat,
    StringLength,
    StringGet,

    // Structs
    StructNew,
    StructGet,
    StructSet,

    // IO and process
    ReadLine,
    Exit,
    Print(TypeTag),
}

impl RuntimeCall {
    /// The symbol name the emitters link against.
    pub fn name(&self) -> String {
        match self {
            RuntimeCall::Add => "ago_add".to_string(),
            RuntimeCall::Subtract => "ago_subtract".to_string(),
            RuntimeCall::Multiply => "ago_multiply".to_string(),
            RuntimeCall::Divide => "ago_divide".to_string(),
            RuntimeCall::Modulo => "ago_modulo".to_string(),
            RuntimeCall::Negate => "ago_neg".to_string(),
            RuntimeCall::GreaterThan => "ago_greater_than".to_string(),
            RuntimeCall::GreaterEqual => "ago_greater_equal".to_string(),
            RuntimeCall::LessThan => "ago_less_than".to_string(),
            RuntimeCall::LessEqual => "ago_less_equal".to_string(),
            RuntimeCall::Equal => "ago_equal".to_string(),
            RuntimeCall::NotEqual => "ago_not_equal".to_string(),
            RuntimeCall::And => "ago_and".to_string(),
            RuntimeCall::Or => "ago_or".to_string(),
            RuntimeCall::Not => "ago_not".to_string(),
            RuntimeCall::BitAnd => "ago_bit_and".to_string(),
            RuntimeCall::BitOr => "ago_bit_or".to_string(),
            RuntimeCall::BitXor => "ago_bit_xor".to_string(),
            RuntimeCall::In => "ago_in".to_string(),
            RuntimeCall::Elvis => "ago_elvis".to_string(),
            RuntimeCall::Range => "ago_range".to_string(),
            RuntimeCall::RangeExclusive => "ago_range_exclusive".to_string(),
            RuntimeCall::Cast(tag) => format!("ago_cast_{}", tag_symbol(*tag)),
            RuntimeCall::ListNew => "ago_list_new".to_string(),
            RuntimeCall::ListGet => "ago_list_get".to_string(),
            RuntimeCall::ListSet => "ago_list_set".to_string(),
            RuntimeCall::ListAppend => "ago_list_append".to_string(),
            RuntimeCall::ListFree => "ago_list_free".to_string(),
            RuntimeCall::ListLength => "ago_list_length".to_string(),
            RuntimeCall::StringConcat => "ago_string_concat".to_string(),
            RuntimeCall::StringLength => "ago_string_length".to_string(),
            RuntimeCall::StringGet => "ago_string_get".to_string(),
            RuntimeCall::StructNew => "ago_struct_new".to_string(),
            RuntimeCall::StructGet => "ago_struct_get".to_string(),
            RuntimeCall::StructSet => "ago_struct_set".to_string(),
            RuntimeCall::ReadLine => "ago_read_line".to_string(),
            RuntimeCall::Exit => "ago_exit".to_string(),
            RuntimeCall::Print(tag) => format!("ago_print_{}", tag_symbol(*tag)),
        }
    }
}

fn tag_symbol(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::Int => "int",
        TypeTag::Float => "float",
        TypeTag::Bool => "bool",
        TypeTag::String => "string",
        TypeTag::Struct => "struct",
        TypeTag::Any => "any",
        TypeTag::IntList => "int_list",
        TypeTag::FloatList => "float_list",
        TypeTag::BoolList => "bool_list",
        TypeTag::StringList => "string_list",
        TypeTag::AnyList => "any_list",
        TypeTag::Range => "range",
        TypeTag::Function => "function",
        TypeTag::NoReturn => "void",
    }
}

// ---------------------------------------------------------------------
// Functions and the module
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub tag: TypeTag,
}

/// One entry in the global function table, built during the signature
/// pass so bodies can call forward and mutually-recursive functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub id: FunctionId,
    /// Full identifier including the suffix (`addera`, `cleari`, ...)
    pub name: String,
    pub params: Vec<Param>,
    /// None for a `-i` suffixed function: it returns nothing.
    pub return_tag: Option<TypeTag>,
    pub location: TextLocation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionTable {
    infos: Vec<FunctionInfo>,
    by_name: FxHashMap<String, usize>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signature. Ids are assigned by the lowering context
    /// (the synthesized entry and lambdas share the same id space).
    /// A duplicate name keeps the first registration and returns its id
    /// so the caller can report the clash.
    pub fn insert(&mut self, info: FunctionInfo) -> Result<(), FunctionId> {
        if let Some(&existing) = self.by_name.get(&info.name) {
            return Err(self.infos[existing].id);
        }
        self.by_name.insert(info.name.clone(), self.infos.len());
        self.infos.push(info);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionInfo> {
        self.by_name.get(name).map(|&index| &self.infos[index])
    }

    pub fn infos(&self) -> &[FunctionInfo] {
        &self.infos
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LirFunction {
    pub id: FunctionId,
    pub name: String,
    pub params: Vec<Param>,
    pub return_tag: Option<TypeTag>,
    /// Total frame size; params occupy the first slots.
    pub local_count: u32,
    pub body: Vec<Inst>,
}

/// A complete lowered program. Function 0 is the synthesized entry
/// holding the program's top-level statements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LirModule {
    pub functions: Vec<LirFunction>,
    pub table: FunctionTable,
}

impl LirModule {
    pub fn entry(&self) -> Option<&LirFunction> {
        self.functions.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_call_names_are_stable() {
        assert_eq!(RuntimeCall::Add.name(), "ago_add");
        assert_eq!(RuntimeCall::ListAppend.name(), "ago_list_append");
        assert_eq!(RuntimeCall::Cast(TypeTag::Int).name(), "ago_cast_int");
        assert_eq!(
            RuntimeCall::Cast(TypeTag::IntList).name(),
            "ago_cast_int_list"
        );
        assert_eq!(RuntimeCall::Print(TypeTag::String).name(), "ago_print_string");
        assert_eq!(RuntimeCall::ReadLine.name(), "ago_read_line");
    }

    #[test]
    fn function_table_rejects_duplicate_names() {
        let mut table = FunctionTable::new();
        let id = FunctionId(1);
        let info = FunctionInfo {
            id,
            name: "addera".to_string(),
            params: vec![],
            return_tag: Some(TypeTag::Int),
            location: TextLocation::default(),
        };
        table.insert(info.clone()).unwrap();
        assert_eq!(table.insert(info), Err(id));
        assert_eq!(table.lookup("addera").map(|i| i.id), Some(id));
    }
}
