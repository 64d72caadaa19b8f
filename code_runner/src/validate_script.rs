use thiserror::Error;
use util::execution_config::ScriptLimits;

use crate::script::ast::{Expr, Program, Stmt, StmtKind};
use crate::script::builtins::is_builtin;
use crate::script::interpreter::READ_ONLY_INPUTS;
use crate::script::{ScriptError, parse};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptValidationError {
    #[error("script is empty")]
    Empty,

    #[error("script is {bytes} bytes, limit is {limit}")]
    TooLarge { bytes: usize, limit: usize },

    #[error("script has {lines} lines, limit is {limit}")]
    TooManyLines { lines: usize, limit: usize },

    #[error(transparent)]
    Syntax(#[from] ScriptError),

    #[error("line {line}: unknown function '{name}'")]
    UnknownFunction { name: String, line: usize },

    #[error("line {line}: '{name}' is a read-only input")]
    ReadOnlyAssignment { name: String, line: usize },
}

/// Checks a script before it is ever run: size and line limits, syntax,
/// calls to functions that do not exist, and writes to input variables.
///
/// Returns the parsed program on success.
pub fn validate_script(
    script: &str,
    limits: &ScriptLimits,
) -> Result<Program, ScriptValidationError> {
    if script.trim().is_empty() {
        return Err(ScriptValidationError::Empty);
    }
    if script.len() > limits.max_script_bytes {
        return Err(ScriptValidationError::TooLarge {
            bytes: script.len(),
            limit: limits.max_script_bytes,
        });
    }
    let lines = script.lines().count();
    if lines > limits.max_script_lines {
        return Err(ScriptValidationError::TooManyLines {
            lines,
            limit: limits.max_script_lines,
        });
    }

    let program = parse(script)?;
    check_block(&program.body)?;
    Ok(program)
}

fn check_block(body: &[Stmt]) -> Result<(), ScriptValidationError> {
    for stmt in body {
        check_stmt(stmt)?;
    }
    Ok(())
}

fn check_stmt(stmt: &Stmt) -> Result<(), ScriptValidationError> {
    let line = stmt.line;
    let guard_name = |name: &str| {
        if READ_ONLY_INPUTS.contains(&name) {
            Err(ScriptValidationError::ReadOnlyAssignment {
                name: name.to_string(),
                line,
            })
        } else {
            Ok(())
        }
    };

    match &stmt.kind {
        StmtKind::Let(name, expr) => {
            guard_name(name)?;
            check_expr(expr, line)
        }
        StmtKind::Assign(target, _, expr) => {
            guard_name(&target.name)?;
            for index in &target.path {
                check_expr(index, line)?;
            }
            check_expr(expr, line)
        }
        StmtKind::If {
            branches,
            otherwise,
        } => {
            for (cond, body) in branches {
                check_expr(cond, line)?;
                check_block(body)?;
            }
            match otherwise {
                Some(body) => check_block(body),
                None => Ok(()),
            }
        }
        StmtKind::While(cond, body) => {
            check_expr(cond, line)?;
            check_block(body)
        }
        StmtKind::For(name, iterable, body) => {
            guard_name(name)?;
            check_expr(iterable, line)?;
            check_block(body)
        }
        StmtKind::Expr(expr) => check_expr(expr, line),
        StmtKind::Break | StmtKind::Continue | StmtKind::Return => Ok(()),
    }
}

fn check_expr(expr: &Expr, line: usize) -> Result<(), ScriptValidationError> {
    match expr {
        Expr::Literal(_) | Expr::Var(_) => Ok(()),
        Expr::List(items) => items.iter().try_for_each(|e| check_expr(e, line)),
        Expr::Map(entries) => entries.iter().try_for_each(|(k, v)| {
            check_expr(k, line)?;
            check_expr(v, line)
        }),
        Expr::Unary(_, inner) => check_expr(inner, line),
        Expr::Binary(_, l, r) | Expr::Logical(_, l, r) | Expr::Index(l, r) => {
            check_expr(l, line)?;
            check_expr(r, line)
        }
        Expr::Call(name, args) => {
            if !is_builtin(name) {
                return Err(ScriptValidationError::UnknownFunction {
                    name: name.clone(),
                    line,
                });
            }
            args.iter().try_for_each(|e| check_expr(e, line))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> ScriptLimits {
        ScriptLimits::default()
    }

    #[test]
    fn accepts_a_well_formed_script() {
        let script = "let n = len(words(answer))\nif n > 3 { score = max_points } else { score = 0 }";
        assert_eq!(validate_script(script, &limits()).unwrap().body.len(), 2);
    }

    #[test]
    fn rejects_blank_scripts() {
        assert_eq!(validate_script("  \n\t", &limits()), Err(ScriptValidationError::Empty));
    }

    #[test]
    fn enforces_size_and_line_limits() {
        let small = ScriptLimits {
            max_script_bytes: 10,
            ..limits()
        };
        assert!(matches!(
            validate_script("score = 1000000", &small),
            Err(ScriptValidationError::TooLarge { bytes: 15, limit: 10 })
        ));

        let few_lines = ScriptLimits {
            max_script_lines: 2,
            ..limits()
        };
        assert!(matches!(
            validate_script("a = 1\nb = 2\nscore = 3", &few_lines),
            Err(ScriptValidationError::TooManyLines { lines: 3, limit: 2 })
        ));
    }

    #[test]
    fn reports_syntax_errors() {
        let err = validate_script("score = (1 + 2", &limits()).unwrap_err();
        assert!(matches!(err, ScriptValidationError::Syntax(ScriptError::Syntax { .. })));
    }

    #[test]
    fn rejects_functions_outside_the_builtin_set() {
        let err = validate_script("x = 1\nscore = open('/etc/passwd')", &limits()).unwrap_err();
        assert_eq!(
            err,
            ScriptValidationError::UnknownFunction {
                name: "open".into(),
                line: 2
            }
        );
    }

    #[test]
    fn rejects_writes_to_inputs() {
        let err = validate_script("for answer in answers { score = 1 }", &limits()).unwrap_err();
        assert!(matches!(err, ScriptValidationError::ReadOnlyAssignment { .. }));
    }
}
