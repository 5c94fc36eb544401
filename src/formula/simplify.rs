//! Fixed algebraic simplifications applied after each substitution pass.
//!
//! - `X if 1 else Y` → `X`, `X if 0 else Y` → `Y`
//! - `(a * V) - (b * V)` → `(a-b) * V` for numeric `a`, `b`, also as the
//!   tail of a sum: `X + (a * V) - (b * V)` → `X + (a-b) * V`
//! - `0 + X` → `X`, `X + 0` → `X`

use super::ast::{BinOp, Expr};

/// Apply the rule set until nothing changes
///
/// Returns true if the tree was modified.
pub fn simplify(expr: &mut Expr) -> bool {
    let mut changed_any = false;
    while simplify_once(expr) {
        changed_any = true;
    }
    changed_any
}

fn simplify_once(expr: &mut Expr) -> bool {
    let mut changed = match expr {
        Expr::Neg(inner) | Expr::Paren(inner) => simplify_once(inner),
        Expr::Binary { lhs, rhs, .. } => {
            let l = simplify_once(lhs);
            simplify_once(rhs) || l
        }
        Expr::Call { args, .. } => args.iter_mut().fold(false, |acc, a| simplify_once(a) || acc),
        Expr::Cond {
            then,
            cond,
            otherwise,
        } => {
            let t = simplify_once(then);
            let c = simplify_once(cond);
            simplify_once(otherwise) || t || c
        }
        _ => false,
    };

    let folded = fold_conditional(expr)
        .or_else(|| fold_linear(expr))
        .or_else(|| drop_zero_term(expr));
    if let Some(folded) = folded {
        *expr = folded;
        changed = true;
    }

    changed
}

fn fold_conditional(expr: &Expr) -> Option<Expr> {
    let Expr::Cond {
        then,
        cond,
        otherwise,
    } = expr
    else {
        return None;
    };

    match cond.as_number() {
        Some(v) if v == 1.0 => Some((**then).clone()),
        Some(v) if v == 0.0 => Some((**otherwise).clone()),
        _ => None,
    }
}

/// Split `(a * V)` into `(a, V)`
fn scaled_term(expr: &Expr) -> Option<(f64, &Expr)> {
    let Expr::Paren(inner) = expr else {
        return None;
    };
    let Expr::Binary {
        op: BinOp::Mul,
        lhs,
        rhs,
    } = inner.as_ref()
    else {
        return None;
    };
    let coefficient = match lhs.as_ref() {
        Expr::Num(_) => lhs.as_number()?,
        _ => return None,
    };
    match rhs.as_ref() {
        Expr::Event(_) | Expr::Metric(_) | Expr::Context(_) => Some((coefficient, rhs.as_ref())),
        _ => None,
    }
}

fn fold_linear(expr: &Expr) -> Option<Expr> {
    let Expr::Binary {
        op: BinOp::Sub,
        lhs,
        rhs,
    } = expr
    else {
        return None;
    };

    let (b, subtrahend) = scaled_term(rhs)?;
    let linear = |a: f64, v: &Expr| {
        (v == subtrahend).then(|| {
            Expr::binary(BinOp::Mul, Expr::Num(format_number(a - b)), v.clone())
        })
    };

    if let Some((a, v)) = scaled_term(lhs) {
        return linear(a, v);
    }

    // Sums associate to the left: `X + (a * V) - (b * V)` is `(X + (a * V)) - (b * V)`.
    let Expr::Binary {
        op: BinOp::Add,
        lhs: head,
        rhs: last,
    } = lhs.as_ref()
    else {
        return None;
    };
    let (a, v) = scaled_term(last)?;
    Some(Expr::binary(BinOp::Add, (**head).clone(), linear(a, v)?))
}

/// Drop a literal zero operand of `+`
fn drop_zero_term(expr: &Expr) -> Option<Expr> {
    let Expr::Binary {
        op: BinOp::Add,
        lhs,
        rhs,
    } = expr
    else {
        return None;
    };

    if is_zero(rhs) {
        Some((**lhs).clone())
    } else if is_zero(lhs) {
        Some((**rhs).clone())
    } else {
        None
    }
}

fn is_zero(expr: &Expr) -> bool {
    expr.as_number() == Some(0.0)
}

/// Shortest decimal form, integral values without a fraction
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
