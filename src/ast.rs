use std::rc::Rc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::{diagnostics::SourceFile, lexer::TemplateFragment};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    BigInt(BigInt),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictEqual => "===",
            BinaryOp::StrictNotEqual => "!==",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn from_compound(op: &str) -> Option<Self> {
        match op {
            "+=" => Some(BinaryOp::Add),
            "-=" => Some(BinaryOp::Sub),
            "*=" => Some(BinaryOp::Mul),
            "/=" => Some(BinaryOp::Div),
            "%=" => Some(BinaryOp::Mod),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEntry {
    KeyValue(String, Expr),
    Shorthand(String),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub rest: Option<String>,
    pub body: Vec<Stmt>,
    pub annotations: Vec<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub parent: Option<String>,
    pub methods: Vec<Rc<FunctionDef>>,
    pub annotations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    pub origin: Option<Rc<SourceFile>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    Keyword(String),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Array(Vec<ArrayItem>),
    Object(Vec<ObjectEntry>),
    Template {
        strings: Vec<String>,
        exprs: Vec<TemplateFragment>,
    },
    Function(Rc<FunctionDef>),
    Increment {
        target: Box<Expr>,
        delta: i8,
        prefix: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
    pub origin: Option<Rc<SourceFile>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationMode {
    Of,
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub binding: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expression(Expr),
    Assign {
        name: String,
        value: Expr,
    },
    CompoundAssign {
        name: String,
        op: BinaryOp,
        value: Expr,
    },
    MemberAssign {
        target: Expr,
        op: Option<BinaryOp>,
        value: Expr,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    ForClassic {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Box<Stmt>,
    },
    ForEach {
        binding: String,
        mode: IterationMode,
        iterable: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Throw(Expr),
    Try {
        body: Vec<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Function(Rc<FunctionDef>),
    Class(Rc<ClassDef>),
    Extension(ExtensionNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionNode {
    pub tag: String,
    pub fields: IndexMap<String, ExtensionField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionField {
    Expr(Expr),
    Block(Vec<Stmt>),
    Name(String),
    Text(String),
}

impl ExtensionNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, field: ExtensionField) -> Self {
        self.fields.insert(key.into(), field);
        self
    }

    pub fn expr(&self, key: &str) -> Option<&Expr> {
        match self.fields.get(key) {
            Some(ExtensionField::Expr(expr)) => Some(expr),
            _ => None,
        }
    }

    pub fn block(&self, key: &str) -> Option<&[Stmt]> {
        match self.fields.get(key) {
            Some(ExtensionField::Block(body)) => Some(body),
            _ => None,
        }
    }

    pub fn name(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(ExtensionField::Name(name) | ExtensionField::Text(name)) => Some(name),
            _ => None,
        }
    }
}
