//! Expression lowering to C source fragments.

use crate::codegen::format_literal;
use crate::error::{NeurogenError, Result};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::spec::RealKind;

/// Lower an expression to a fully parenthesized C expression.
///
/// `resolve` maps a free symbol to the C lvalue or literal it should be
/// read from; an unresolvable symbol aborts lowering. Emission order is
/// the tree order of the expression, never re-associated, so identical
/// input yields identical text.
pub(crate) fn lower(
    expr: &Expr,
    real: RealKind,
    resolve: &dyn Fn(&str) -> Option<String>,
) -> Result<String> {
    match expr {
        Expr::Const(v) => format_literal(*v, real),
        Expr::Sym(name) => resolve(name).ok_or_else(|| {
            NeurogenError::undefined_symbol(name, "expression lowering")
        }),
        Expr::Unary(UnaryOp::Neg, a) => Ok(format!("(-{})", lower(a, real, resolve)?)),
        Expr::Binary(BinaryOp::Pow, a, b) => Ok(format!(
            "pow{}({}, {})",
            real.fn_suffix(),
            lower(a, real, resolve)?,
            lower(b, real, resolve)?
        )),
        Expr::Binary(op, a, b) => {
            let op = match op {
                BinaryOp::Add => "+",
                BinaryOp::Sub => "-",
                BinaryOp::Mul => "*",
                BinaryOp::Div => "/",
                BinaryOp::Pow => unreachable!(),
            };
            Ok(format!(
                "({} {} {})",
                lower(a, real, resolve)?,
                op,
                lower(b, real, resolve)?
            ))
        }
        Expr::Call(func, a) => Ok(format!(
            "{}{}({})",
            func.cname(),
            real.fn_suffix(),
            lower(a, real, resolve)?
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::sym;

    fn ident(name: &str) -> Option<String> {
        Some(name.to_string())
    }

    #[test]
    fn lowers_with_width_suffixes() {
        let e = (sym("x") * 2.0).exp();
        assert_eq!(
            lower(&e, RealKind::F32, &ident).unwrap(),
            "expf((x * 2.0f))"
        );
        assert_eq!(lower(&e, RealKind::F64, &ident).unwrap(), "exp((x * 2.0))");
    }

    #[test]
    fn pow_lowers_to_libm_call() {
        let e = sym("x").pow(3.0);
        assert_eq!(lower(&e, RealKind::F32, &ident).unwrap(), "powf(x, 3.0f)");
    }

    #[test]
    fn unresolved_symbol_fails() {
        let e = sym("ghost");
        assert!(matches!(
            lower(&e, RealKind::F32, &|_| None),
            Err(NeurogenError::UndefinedSymbol { .. })
        ));
    }
}
