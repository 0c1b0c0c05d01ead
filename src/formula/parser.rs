//! Recursive-descent parser for formula expressions.
//!
//! Precedence, lowest first: `||`, `&&`, comparisons, `+ -`, `* / %`,
//! unary `- !`, atoms (numbers, parameters, calls, parentheses, `if`).

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1},
    combinator::{map_res, opt, recognize},
    error::ErrorKind,
    multi::many0_count,
    sequence::pair,
    IResult, Parser,
};

use super::expression::{BinOp, Expr, ParseError, UnaryOp};

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

fn number(input: &str) -> IResult<&str, f32> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        |s: &str| s.parse::<f32>(),
    )
    .parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn symbol<'a>(input: &'a str, sym: &'static str) -> IResult<&'a str, &'a str> {
    tag(sym).parse(input.trim_start())
}

fn keyword<'a>(input: &'a str, word: &'static str) -> IResult<&'a str, &'a str> {
    let (rest, ident) = identifier(input.trim_start())?;
    if ident == word {
        Ok((rest, ident))
    } else {
        fail(input, ErrorKind::Tag)
    }
}

fn first_operator<'a>(input: &'a str, ops: &[(&'static str, BinOp)]) -> Option<(&'a str, BinOp)> {
    ops.iter()
        .find_map(|(sym, op)| symbol(input, *sym).ok().map(|(rest, _)| (rest, *op)))
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut left) = and_expr(input)?;
    while let Some((rest, op)) = first_operator(input, &[("||", BinOp::Or)]) {
        let (rest, right) = and_expr(rest)?;
        left = Expr::binary(op, left, right);
        input = rest;
    }
    Ok((input, left))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut left) = comparison(input)?;
    while let Some((rest, op)) = first_operator(input, &[("&&", BinOp::And)]) {
        let (rest, right) = comparison(rest)?;
        left = Expr::binary(op, left, right);
        input = rest;
    }
    Ok((input, left))
}

const COMPARISONS: [(&str, BinOp); 6] = [
    (">=", BinOp::Gte),
    ("<=", BinOp::Lte),
    ("==", BinOp::Eq),
    ("!=", BinOp::Neq),
    (">", BinOp::Gt),
    ("<", BinOp::Lt),
];

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, left) = sum(input)?;
    match first_operator(input, &COMPARISONS) {
        Some((rest, op)) => {
            let (rest, right) = sum(rest)?;
            Ok((rest, Expr::binary(op, left, right)))
        }
        None => Ok((input, left)),
    }
}

fn sum(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut left) = term(input)?;
    while let Some((rest, op)) = first_operator(input, &[("+", BinOp::Add), ("-", BinOp::Sub)]) {
        let (rest, right) = term(rest)?;
        left = Expr::binary(op, left, right);
        input = rest;
    }
    Ok((input, left))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut left) = unary(input)?;
    while let Some((rest, op)) = first_operator(
        input,
        &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod)],
    ) {
        let (rest, right) = unary(rest)?;
        left = Expr::binary(op, left, right);
        input = rest;
    }
    Ok((input, left))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    if let Ok((rest, _)) = symbol(input, "-") {
        let (rest, operand) = unary(rest)?;
        return Ok((
            rest,
            Expr::UnaryOp {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            },
        ));
    }
    if let Ok((rest, _)) = symbol(input, "!") {
        let (rest, operand) = unary(rest)?;
        return Ok((
            rest,
            Expr::UnaryOp {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
        ));
    }
    atom(input)
}

fn call_args(input: &str) -> IResult<&str, Vec<Expr>> {
    let mut args = Vec::new();
    if let Ok((rest, _)) = symbol(input, ")") {
        return Ok((rest, args));
    }
    let mut input = input;
    loop {
        let (rest, arg) = or_expr(input)?;
        args.push(arg);
        if let Ok((rest, _)) = symbol(rest, ",") {
            input = rest;
            continue;
        }
        let (rest, _) = symbol(rest, ")")?;
        return Ok((rest, args));
    }
}

fn atom(input: &str) -> IResult<&str, Expr> {
    let input = input.trim_start();

    if let Ok((rest, value)) = number(input) {
        return Ok((rest, Expr::Literal(value)));
    }

    if let Ok((rest, _)) = symbol(input, "(") {
        let (rest, inner) = or_expr(rest)?;
        let (rest, _) = symbol(rest, ")")?;
        return Ok((rest, inner));
    }

    let (rest, name) = identifier(input)?;

    if name == "if" {
        let (rest, condition) = or_expr(rest)?;
        let (rest, _) = keyword(rest, "then")?;
        let (rest, true_expr) = or_expr(rest)?;
        let (rest, _) = keyword(rest, "else")?;
        let (rest, false_expr) = or_expr(rest)?;
        return Ok((
            rest,
            Expr::Conditional {
                condition: Box::new(condition),
                true_expr: Box::new(true_expr),
                false_expr: Box::new(false_expr),
            },
        ));
    }

    if let Ok((rest, _)) = symbol(rest, "(") {
        let (rest, args) = call_args(rest)?;
        return Ok((
            rest,
            Expr::Function {
                name: name.to_string(),
                args,
            },
        ));
    }

    Ok((rest, Expr::Param(name.to_string())))
}

/// Parse a complete expression; trailing input is an error
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    match or_expr(input) {
        Ok((rest, expr)) if rest.trim().is_empty() => Ok(expr),
        Ok((rest, _)) => Err(ParseError {
            message: format!("unexpected trailing input '{}'", rest.trim()),
        }),
        Err(e) => Err(ParseError {
            message: format!("invalid expression '{}': {}", input, e),
        }),
    }
}
