//! The parse tree contract.
//!
//! The surface grammar and tokenizer live outside this crate: the parser
//! hands over a finished tree of statements and expressions (as JSON, see
//! the serde derives). These types are the fixed node-kind contract the
//! lowering engine consumes; changing a variant here is a breaking change
//! for the parser.

use crate::compiler::parsers::tokens::TextLocation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: NodeKind,
    pub location: TextLocation,
}

impl AstNode {
    pub fn new(kind: NodeKind, location: TextLocation) -> Self {
        AstNode { kind, location }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// `stem+suffix := value` declares (or fully replaces) the binding
    /// for this stem in the current scope. Value and declared type both
    /// change on re-declaration.
    Declaration { name: String, value: Expression },

    /// `stem+suffix = value` assigns to an existing binding. The value
    /// is cast to the binding's CURRENT declared type; the declared type
    /// never changes through `=`.
    Reassignment { name: String, value: Expression },

    /// `des namea(xa, yes) ... fin`. The function name's own suffix
    /// declares the return type (`-i` means no return value).
    FunctionDef {
        name: String,
        params: Vec<String>,
        body: Vec<AstNode>,
    },

    /// `si cond ... aliter si cond ... aliter ... fin`.
    /// One (condition, body) pair per `si`/`aliter si` branch.
    If {
        branches: Vec<IfBranch>,
        else_body: Option<Vec<AstNode>>,
    },

    /// `dum cond ... fin`
    While {
        condition: Expression,
        body: Vec<AstNode>,
    },

    /// `pro xa in iterable ... fin`
    For {
        binding: String,
        iterable: Expression,
        body: Vec<AstNode>,
    },

    /// `redeo [value]`
    Return(Option<Expression>),

    Break,
    Continue,
    Pass,

    /// Expression evaluated only for side effects (usually a call).
    Expression(Expression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IfBranch {
    pub condition: Expression,
    pub body: Vec<AstNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub location: TextLocation,
}

impl Expression {
    pub fn new(kind: ExpressionKind, location: TextLocation) -> Self {
        Expression { kind, location }
    }

    pub fn int(value: i64, location: TextLocation) -> Self {
        Expression::new(ExpressionKind::Literal(Literal::Int(value)), location)
    }

    pub fn float(value: f64, location: TextLocation) -> Self {
        Expression::new(ExpressionKind::Literal(Literal::Float(value)), location)
    }

    pub fn bool(value: bool, location: TextLocation) -> Self {
        Expression::new(ExpressionKind::Literal(Literal::Bool(value)), location)
    }

    pub fn string(value: impl Into<String>, location: TextLocation) -> Self {
        Expression::new(
            ExpressionKind::Literal(Literal::String(value.into())),
            location,
        )
    }

    pub fn identifier(name: impl Into<String>, location: TextLocation) -> Self {
        Expression::new(ExpressionKind::Identifier(name.into()), location)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExpressionKind {
    Literal(Literal),

    /// A stem reference through some suffix; resolution happens at
    /// lowering time against the stem resolver.
    Identifier(String),

    BinaryOp {
        op: Operator,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },

    /// Named call: user function or builtin (`dici`, `audies`, `exei`,
    /// `insero`). Lambda values are called through their stem name too;
    /// dispatch is decided at lowering time.
    Call {
        callee: String,
        args: Vec<Expression>,
    },

    /// `base[index]`: Int index for lists/strings, String key for structs.
    Index {
        base: Box<Expression>,
        index: Box<Expression>,
    },

    /// `base.method(args).method(args)...`. Steps lower left to right,
    /// each consuming the previous result. A bare-suffix method name
    /// (`.a()`, `.es()`, ...) is a cast.
    MethodChain {
        base: Box<Expression>,
        calls: Vec<MethodCall>,
    },

    ListLiteral(Vec<Expression>),

    /// Keys carry suffixes like any other identifier; field values are
    /// cast to the key's declared type.
    StructLiteral(Vec<StructField>),

    /// `intra [captures] (params) ... fin`. Captures are copied at
    /// closure creation time, never referenced live.
    Lambda {
        name: String,
        params: Vec<String>,
        captures: Vec<String>,
        body: Vec<AstNode>,
    },

    /// `start..end` (inclusive) or `start.<end` (exclusive).
    Range {
        start: Box<Expression>,
        end: Box<Expression>,
        inclusive: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    pub name: String,
    pub args: Vec<Expression>,
    pub location: TextLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructField {
    pub key: String,
    pub value: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    Equal,
    NotEqual,

    // Logical (`et` / `vel`). Short-circuit, handled by the lowering
    // engine rather than as a runtime call pair
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,

    // Membership
    In,

    // Null coalescing `?:`
    Elvis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
}
