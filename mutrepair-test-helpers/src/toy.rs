// SPDX-License-Identifier: Apache-2.0

//! A tiny Java-shaped subject language.
//!
//! A subject declares one static routine whose body is a single
//! `return <expr>;` line, preceded by a `//@ ensures \result == <expr>;`
//! annotation. Expressions are operands separated by `+` and `-`, evaluated
//! left to right. Operands are integer literals, the parameter `x`, `loop`
//! (never terminates) and `boom` (raises an exception).

use std::fmt;
use std::path::Path;

use mutrepair::Program;

pub const CLASS_NAME: &str = "demo.Calc";
pub const ROUTINE: &str = "addTwo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    Parse(String),
    Diverges,
    Throws(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Parse(msg) => write!(f, "parse error: {}", msg),
            EvalError::Diverges => write!(f, "does not terminate"),
            EvalError::Throws(what) => write!(f, "throws {}", what),
        }
    }
}

/// Checks that `expr` is well formed without evaluating it.
pub fn parse(expr: &str) -> Result<Vec<&str>, EvalError> {
    let tokens: Vec<&str> = expr.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(EvalError::Parse("empty expression".to_string()));
    }
    for (i, token) in tokens.iter().enumerate() {
        let ok = if i % 2 == 0 {
            *token == "x" || *token == "loop" || *token == "boom" || token.parse::<i64>().is_ok()
        } else {
            *token == "+" || *token == "-"
        };
        if !ok {
            return Err(EvalError::Parse(format!("unexpected token '{}'", token)));
        }
    }
    if tokens.len() % 2 == 0 {
        return Err(EvalError::Parse("dangling operator".to_string()));
    }
    Ok(tokens)
}

pub fn eval(expr: &str, x: i64) -> Result<i64, EvalError> {
    let tokens = parse(expr)?;
    let operand = |t: &str| -> Result<i64, EvalError> {
        match t {
            "x" => Ok(x),
            "loop" => Err(EvalError::Diverges),
            "boom" => Err(EvalError::Throws("ArithmeticException".to_string())),
            lit => lit
                .parse::<i64>()
                .map_err(|e| EvalError::Parse(e.to_string())),
        }
    };
    let mut acc = operand(tokens[0])?;
    for pair in tokens[1..].chunks(2) {
        let rhs = operand(pair[1])?;
        acc = if pair[0] == "+" {
            acc.wrapping_add(rhs)
        } else {
            acc.wrapping_sub(rhs)
        };
    }
    Ok(acc)
}

/// Token indices of the `+`/`-` operators in `expr`.
pub fn operator_sites(expr: &str) -> Vec<usize> {
    expr.split_whitespace()
        .enumerate()
        .filter(|(_, t)| *t == "+" || *t == "-")
        .map(|(i, _)| i)
        .collect()
}

/// `expr` with the operator at token index `site` flipped.
pub fn flip_operator(expr: &str, site: usize) -> String {
    expr.split_whitespace()
        .enumerate()
        .map(|(i, t)| match (i == site, t) {
            (true, "+") => "-",
            (true, "-") => "+",
            _ => t,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The body of `routine`: 1-based line number of its `return` and the
/// returned expression.
pub fn return_expr(source: &str, routine: &str) -> Option<(u32, String)> {
    let decl = format!(" {}(", routine);
    let lines: Vec<&str> = source.lines().collect();
    let start = lines.iter().position(|l| l.contains(&decl) && l.contains('{'))?;
    lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find_map(|(i, line)| {
            let body = line.trim().strip_prefix("return ")?;
            let expr = body.strip_suffix(';')?;
            Some(((i + 1) as u32, expr.trim().to_string()))
        })
}

/// The right-hand side of the `ensures \result == ...;` annotation that
/// precedes `routine`.
pub fn ensures_expr(source: &str, routine: &str) -> Option<String> {
    let decl = format!(" {}(", routine);
    let lines: Vec<&str> = source.lines().collect();
    let start = lines.iter().position(|l| l.contains(&decl) && l.contains('{'))?;
    lines[..start].iter().rev().find_map(|line| {
        let spec = line.trim().strip_prefix("//@ ensures \\result ==")?;
        Some(spec.trim().strip_suffix(';')?.trim().to_string())
    })
}

/// Rewrites the `return` line at `line` (1-based) to return `expr`.
pub fn replace_return(source: &str, line: u32, expr: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for (i, text) in source.lines().enumerate() {
        if (i + 1) as u32 == line {
            let indent: String = text.chars().take_while(|c| c.is_whitespace()).collect();
            out.push_str(&format!("{}return {};", indent, expr));
        } else {
            out.push_str(text);
        }
        out.push('\n');
    }
    out
}

pub fn subject_source(ensures: &str, body: &str) -> String {
    format!(
        "package demo;

public class Calc {{
    //@ ensures \\result == {ensures};
    public static int {ROUTINE}(int x) {{
        return {body};
    }}
}}
"
    )
}

/// Writes the subject under `root` and returns it.
pub fn write_subject(root: &Path, ensures: &str, body: &str) -> Program {
    let program = Program::new(root, CLASS_NAME);
    let path = program.file_path();
    std::fs::create_dir_all(path.parent().expect("subject has a parent dir"))
        .expect("create subject dir");
    std::fs::write(&path, subject_source(ensures, body)).expect("write subject");
    program
}
