use crate::error::SourceLocation;

/// A complete AWK program: pattern-action rules plus function definitions.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub rules: Vec<Rule>,
    pub functions: Vec<FunctionDef>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A pattern-action rule. A missing pattern matches every record, a
/// missing action is the implicit `{ print $0 }`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Option<Pattern>,
    pub action: Option<Block>,
    pub location: SourceLocation,
}

/// Pattern kinds that can trigger a rule
#[derive(Debug, Clone)]
pub enum Pattern {
    /// BEGIN - runs before any input
    Begin,
    /// END - runs after all input
    End,
    /// BEGINFILE - runs before each input file (gawk extension)
    BeginFile,
    /// ENDFILE - runs after each input file (gawk extension)
    EndFile,
    /// Arbitrary expression; a regex literal here matches against $0
    Expr(Expr),
    /// Range pattern: start,end with per-rule activation state
    Range { start: Expr, end: Expr },
}

/// User-defined function
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub location: SourceLocation,
}

/// A block of statements
#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub location: SourceLocation,
}

impl Block {
    pub fn new(statements: Vec<Stmt>, location: SourceLocation) -> Self {
        Self {
            statements,
            location,
        }
    }
}

/// Output redirection kinds for print/printf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// > target (truncate on first open)
    Write,
    /// >> target
    Append,
    /// | command
    Pipe,
    /// |& command (coprocess, gawk extension)
    PipeBoth,
}

/// Statement kinds
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression statement (assignment, call, getline, ...)
    Expr(Expr),

    /// print expr, expr, ... [redirect]
    Print {
        args: Vec<Expr>,
        redirect: Option<(RedirectKind, Expr)>,
        location: SourceLocation,
    },

    /// printf format, expr, ... [redirect]
    Printf {
        format: Box<Expr>,
        args: Vec<Expr>,
        redirect: Option<(RedirectKind, Expr)>,
        location: SourceLocation,
    },

    Block(Block),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        location: SourceLocation,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        location: SourceLocation,
    },

    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        location: SourceLocation,
    },

    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        location: SourceLocation,
    },

    /// for (var in array)
    ForIn {
        var: String,
        array: String,
        body: Box<Stmt>,
        location: SourceLocation,
    },

    /// switch/case/default (gawk extension); matched cases fall through
    /// into later case bodies until a break
    Switch {
        expr: Expr,
        cases: Vec<(Expr, Block)>,
        default: Option<Block>,
        location: SourceLocation,
    },

    Break { location: SourceLocation },
    Continue { location: SourceLocation },
    Next { location: SourceLocation },
    Nextfile { location: SourceLocation },

    Exit {
        status: Option<Expr>,
        location: SourceLocation,
    },

    Return {
        value: Option<Expr>,
        location: SourceLocation,
    },

    /// delete array[indices]; empty indices deletes the whole array
    Delete {
        array: String,
        indices: Vec<Expr>,
        location: SourceLocation,
    },

    /// Bare semicolon
    Empty,
}

/// Expression kinds
#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64, SourceLocation),

    String(String, SourceLocation),

    /// Uncompiled ERE source; in a boolean context matches against $0
    Regex(String, SourceLocation),

    Variable(String, SourceLocation),

    /// $expr
    Field(Box<Expr>, SourceLocation),

    /// arr[i] or arr[i,j] (indices joined with SUBSEP at eval time)
    ArrayAccess {
        array: String,
        indices: Vec<Expr>,
        location: SourceLocation,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        location: SourceLocation,
    },

    /// Covers !, unary +/-, and ++/-- in both positions
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        prefix: bool,
        location: SourceLocation,
    },

    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        location: SourceLocation,
    },

    /// Target must be a variable, field, or array element
    Assign {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
        location: SourceLocation,
    },

    Call {
        name: String,
        args: Vec<Expr>,
        location: SourceLocation,
    },

    /// @name(args) or @(expr)(args) (gawk extension)
    IndirectCall {
        target: Box<Expr>,
        args: Vec<Expr>,
        location: SourceLocation,
    },

    /// expr ~ re / expr !~ re
    Match {
        string: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        location: SourceLocation,
    },

    /// Concatenation by juxtaposition; always at least two parts
    Concat(Vec<Expr>, SourceLocation),

    /// All seven getline forms; at most one of file/command is present
    Getline {
        var: Option<Box<Expr>>,
        file: Option<Box<Expr>>,
        command: Option<Box<Expr>>,
        coprocess: bool,
        location: SourceLocation,
    },

    /// (k1, k2) in array - membership only, no autovivification
    In {
        keys: Vec<Expr>,
        array: String,
        location: SourceLocation,
    },
}

impl Expr {
    pub fn location(&self) -> SourceLocation {
        match self {
            Expr::Number(_, loc)
            | Expr::String(_, loc)
            | Expr::Regex(_, loc)
            | Expr::Variable(_, loc)
            | Expr::Field(_, loc)
            | Expr::ArrayAccess { location: loc, .. }
            | Expr::Binary { location: loc, .. }
            | Expr::Unary { location: loc, .. }
            | Expr::Ternary { location: loc, .. }
            | Expr::Assign { location: loc, .. }
            | Expr::Call { location: loc, .. }
            | Expr::IndirectCall { location: loc, .. }
            | Expr::Match { location: loc, .. }
            | Expr::Concat(_, loc)
            | Expr::Getline { location: loc, .. }
            | Expr::In { location: loc, .. } => *loc,
        }
    }

    /// True for expressions that may appear as an assignment target
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Expr::Variable(..) | Expr::Field(..) | Expr::ArrayAccess { .. }
        )
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,

    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    Incr,
    Decr,
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    PowAssign,
}
