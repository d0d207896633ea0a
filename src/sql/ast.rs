// src/sql/ast.rs

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Text(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    /// `name(args...)`; a bare identifier is a call with no arguments.
    FunctionCall { name: String, args: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select { items: Vec<SelectItem> },
    Explain(Box<Statement>),
    DescribeFunction(String),
    Exit,
}
