use sigcomp_parser::parse_equation;
use sigcomp_symbolic::{Indexing, SymExprKind};

#[test]
fn equation_round_trips_to_compact_text() {
    let eq = parse_equation("y(t) = 2*x(t) + 1").unwrap();
    assert_eq!(eq.to_string(), "y(t)=2*x(t)+1");

    let eq = parse_equation("y[n] = x[n+1] * x[n]").unwrap();
    assert_eq!(eq.to_string(), "y[n]=x[n+1]*x[n]");
}

#[test]
fn equation_keeps_indexing_notation() {
    let eq = parse_equation("y[n] = x[n-1]").unwrap();
    match eq.rhs.kind.as_ref() {
        SymExprKind::Signal(name, _, indexing) => {
            assert_eq!(name, "x");
            assert_eq!(*indexing, Indexing::Index);
        }
        other => panic!("expected a signal reference, got {other:?}"),
    }
    assert!(eq.lhs.is_some());
}

#[test]
fn bare_expression_has_no_lhs() {
    let eq = parse_equation("t*x(t)").unwrap();
    assert!(eq.lhs.is_none());
    assert_eq!(eq.to_string(), "t*x(t)");
}
