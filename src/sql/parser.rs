use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while},
    character::complete::{alpha1, alphanumeric1, char, i64 as integer, multispace0, multispace1},
    combinator::{all_consuming, map, opt, recognize, value},
    error::Error,
    multi::{many0_count, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded},
};

use crate::error::{DbError, DbResult};
use crate::sql::ast::{Expr, Literal, SelectItem, Statement};

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn integer_literal(input: &str) -> IResult<&str, Expr> {
    map(integer, |i| Expr::Literal(Literal::Integer(i))).parse(input)
}

fn text_literal(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        |s: &str| Expr::Literal(Literal::Text(s.to_string())),
    )
    .parse(input)
}

/// Keywords, function calls with parentheses, and bare niladic calls.
fn identifier_expr(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expr),
        preceded(multispace0, char(')')),
    ))
    .parse(input)?;
    let name = name.to_uppercase();
    let node = match (name.as_str(), args) {
        ("TRUE", None) => Expr::Literal(Literal::Boolean(true)),
        ("FALSE", None) => Expr::Literal(Literal::Boolean(false)),
        ("NULL", None) => Expr::Literal(Literal::Null),
        (_, args) => Expr::FunctionCall { name, args: args.unwrap_or_default() },
    };
    Ok((input, node))
}

fn expr(input: &str) -> IResult<&str, Expr> {
    alt((integer_literal, text_literal, identifier_expr)).parse(input)
}

fn select_item(input: &str) -> IResult<&str, SelectItem> {
    let alias = preceded((multispace1, tag_no_case("AS"), multispace1), identifier);
    map(pair(expr, opt(alias)), |(expr, alias)| SelectItem {
        expr,
        alias: alias.map(str::to_string),
    })
    .parse(input)
}

fn select(input: &str) -> IResult<&str, Statement> {
    map(
        preceded(
            (tag_no_case("SELECT"), multispace1),
            separated_list1(ws(char(',')), select_item),
        ),
        |items| Statement::Select { items },
    )
    .parse(input)
}

fn explain(input: &str) -> IResult<&str, Statement> {
    map(preceded((tag_no_case("EXPLAIN"), multispace1), select), |stmt| {
        Statement::Explain(Box::new(stmt))
    })
    .parse(input)
}

fn describe_function(input: &str) -> IResult<&str, Statement> {
    map(
        preceded((tag_no_case("DESCRIBE"), multispace1, tag_no_case("FUNCTION"), multispace1), identifier),
        |name: &str| Statement::DescribeFunction(name.to_uppercase()),
    )
    .parse(input)
}

fn exit(input: &str) -> IResult<&str, Statement> {
    value(Statement::Exit, alt((tag_no_case(".EXIT"), tag_no_case("EXIT")))).parse(input)
}

pub fn parse_statement(input: &str) -> DbResult<Statement> {
    if input.trim().is_empty() {
        return Err(DbError::ParseError("Empty input".into()));
    }
    let mut statement = all_consuming(delimited(
        multispace0,
        alt((explain, describe_function, select, exit)),
        (multispace0, opt(char(';')), multispace0),
    ));
    match statement.parse(input) {
        Ok((_, stmt)) => Ok(stmt),
        Err(e) => Err(DbError::ParseError(format!("could not parse '{}': {}", input.trim(), e))),
    }
}
