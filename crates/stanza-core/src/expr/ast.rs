//! Target-language expressions and statements
//!
//! Only what straight-line setup code needs: literals, variables, member
//! access and calls. Rendering is deterministic and produces C++-like text.

use std::fmt;
use std::time::Duration;

use crate::types::{IdName, Identifier, InstanceLabel, SemanticType};

/// Name of the application object every component is attached to.
pub const APP: &str = "App";

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Verbatim token, e.g. an enum constant like `OUTPUT`
    Raw(String),
    Bool(bool),
    Int(i64),
    /// Integer rendered in hexadecimal, e.g. an I2C address
    Hex(u64),
    Float(f64),
    Str(String),
    /// Reference to a declared identifier
    Var(IdName),
    Member {
        object: Box<Expression>,
        member: String,
        /// `->` instead of `.`
        pointer: bool,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
}

impl Expression {
    pub fn raw(token: impl Into<String>) -> Self {
        Expression::Raw(token.into())
    }

    pub fn string(text: impl Into<String>) -> Self {
        Expression::Str(text.into())
    }

    /// The application object.
    pub fn app() -> Self {
        Expression::Raw(APP.to_string())
    }

    /// Whole milliseconds of `d`, the unit every timing setter takes.
    pub fn millis(d: Duration) -> Self {
        Expression::Int(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }

    pub fn dot(self, member: impl Into<String>) -> Self {
        Expression::Member {
            object: Box::new(self),
            member: member.into(),
            pointer: false,
        }
    }

    pub fn arrow(self, member: impl Into<String>) -> Self {
        Expression::Member {
            object: Box::new(self),
            member: member.into(),
            pointer: true,
        }
    }

    pub fn call<I>(self, args: I) -> Self
    where
        I: IntoIterator<Item = Expression>,
    {
        Expression::Call {
            callee: Box::new(self),
            args: args.into_iter().collect(),
        }
    }

    /// Collect every identifier this expression refers to.
    pub fn references(&self, out: &mut Vec<IdName>) {
        match self {
            Expression::Var(name) => out.push(name.clone()),
            Expression::Member { object, .. } => object.references(out),
            Expression::Call { callee, args } => {
                callee.references(out);
                args.iter().for_each(|a| a.references(out));
            }
            _ => {}
        }
    }
}

impl From<bool> for Expression {
    fn from(b: bool) -> Self {
        Expression::Bool(b)
    }
}

impl From<i64> for Expression {
    fn from(i: i64) -> Self {
        Expression::Int(i)
    }
}

impl From<&VarRef> for Expression {
    fn from(var: &VarRef) -> Self {
        Expression::Var(var.name.clone())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Raw(token) => f.write_str(token),
            Expression::Bool(b) => write!(f, "{b}"),
            Expression::Int(i) => write!(f, "{i}"),
            Expression::Hex(h) => write!(f, "0x{h:02X}"),
            Expression::Float(x) if x.fract() == 0.0 => write!(f, "{x:.1}f"),
            Expression::Float(x) => write!(f, "{x}f"),
            Expression::Str(s) => write_quoted(f, s),
            Expression::Var(name) => write!(f, "{name}"),
            Expression::Member {
                object,
                member,
                pointer,
            } => write!(f, "{}{}{}", object, if *pointer { "->" } else { "." }, member),
            Expression::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

/// Handle to a declared variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    pub name: IdName,
    pub ty: SemanticType,
}

impl VarRef {
    pub fn expr(&self) -> Expression {
        Expression::from(self)
    }

    /// `name->member`
    pub fn arrow(&self, member: impl Into<String>) -> Expression {
        self.expr().arrow(member)
    }
}

impl From<&Identifier> for VarRef {
    fn from(id: &Identifier) -> Self {
        Self {
            name: id.name.clone(),
            ty: id.ty.clone(),
        }
    }
}

/// One emitted statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `Type *name = value;`
    Declare { id: Identifier, value: Expression },
    /// `expr;`
    Expr(Expression),
}

impl Statement {
    /// Identifiers the statement reads.
    pub fn references(&self) -> Vec<IdName> {
        let mut out = Vec::new();
        match self {
            Statement::Declare { value, .. } => value.references(&mut out),
            Statement::Expr(expr) => expr.references(&mut out),
        }
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Declare { id, value } => write!(f, "{} *{} = {};", id.ty, id.name, value),
            Statement::Expr(expr) => write!(f, "{expr};"),
        }
    }
}

/// Statements of one completed task plus the identifiers they declare
#[derive(Debug, Clone, PartialEq)]
pub struct StatementFragment {
    pub instance: InstanceLabel,
    pub statements: Vec<Statement>,
    pub declares: Vec<Identifier>,
}

impl StatementFragment {
    /// Identifiers read by this fragment that it does not declare itself.
    pub fn external_references(&self) -> Vec<IdName> {
        let mut out: Vec<IdName> = Vec::new();
        for name in self.statements.iter().flat_map(Statement::references) {
            if !self.declares.iter().any(|d| d.name == name) && !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

impl fmt::Display for StatementFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}
