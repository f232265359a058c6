//! Built-in recurrence oracles for a library of probabilistic loops.

use std::fmt;

use crate::expr::ExprError;
use crate::formula::Formula;
use crate::oracle::{invariant_at, render_value, Expectations, PointCheck, RecurrenceOracle};

type CheckFn = fn(&[i64], &Expectations) -> Result<Option<PointCheck>, ExprError>;
type RuleFn = fn(&str, &str) -> Formula;

/// A built-in oracle backed by plain functions.
#[derive(Clone, Copy)]
pub struct BuiltinCase {
    pub name: &'static str,
    /// The loop being analysed, in guarded-command shorthand.
    pub program: &'static str,
    pub variables: &'static [&'static str],
    pub domain: &'static str,
    filter: Option<fn(&[i64]) -> bool>,
    check: CheckFn,
    rule: RuleFn,
}

impl fmt::Debug for BuiltinCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinCase")
            .field("name", &self.name)
            .field("variables", &self.variables)
            .field("domain", &self.domain)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

impl RecurrenceOracle for BuiltinCase {
    fn name(&self) -> &str {
        self.name
    }

    fn variables(&self) -> &[&'static str] {
        self.variables
    }

    fn domain(&self) -> &str {
        self.domain
    }

    fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    fn admits(&self, point: &[i64]) -> bool {
        self.filter.map_or(true, |filter| filter(point))
    }

    fn check(&self, point: &[i64], expectations: &Expectations) -> Result<Option<PointCheck>, ExprError> {
        (self.check)(point, expectations)
    }

    fn rule(&self, pre: &str, post: &str) -> Formula {
        (self.rule)(pre, post)
    }
}

pub const DEFAULT_CASE: &str = "random-walk-v2";

static CASES: [BuiltinCase; 13] = [
    BuiltinCase {
        name: "random-walk-v1",
        program: "n=0; while (0<x) { x++ [p] x--; n++ }",
        variables: &["x", "y", "n"],
        domain: "0<=x and 0<=y and 0<=n",
        filter: None,
        check: random_walk_v1_check,
        rule: random_walk_v1_rule,
    },
    BuiltinCase {
        name: "random-walk-v2",
        program: "n=0; while (0<x && x<y) { x++ [p] x--; n++ }",
        variables: &["x", "y", "n"],
        domain: "0<=x and x<=y and n>=0",
        filter: None,
        check: random_walk_v2_check,
        rule: random_walk_v2_rule,
    },
    BuiltinCase {
        name: "sum",
        program: "x=0; while (0<n) { x=x+n; n-- }",
        variables: &["x", "y", "n"],
        domain: "x>=y and y>=0 and n>=0",
        filter: None,
        check: sum_check,
        rule: sum_rule,
    },
    BuiltinCase {
        name: "coin",
        program: "while (n>0) { x=x [p] x++; y=y [p] y++; n-- }",
        variables: &["x", "y", "n"],
        domain: "(x=0 or x=1) and (y=0 or y=1) and n>=0",
        filter: Some(coin_filter),
        check: coin_check,
        rule: coin_rule,
    },
    BuiltinCase {
        name: "binomial",
        program: "while (n>0) { x=x+y [p] x=x; n-- }",
        variables: &["x", "y", "n"],
        domain: "x>=0 and y>=0 and n>=0",
        filter: None,
        check: binomial_check,
        rule: binomial_rule,
    },
    BuiltinCase {
        name: "binomial-v2",
        program: "while (n>0) { x=x+n [p] x=x+y; n-- }",
        variables: &["x", "y", "n"],
        domain: "x>=0 and y>=0 and n>=0",
        filter: None,
        check: binomial_v2_check,
        rule: binomial_v2_rule,
    },
    BuiltinCase {
        name: "geo-sum",
        program: "x=1; while (x!=0) { x=0 [p] y=y+n; n++ }",
        variables: &["x", "y", "n"],
        domain: "(x=0 or x=1) and y>=0 and n>=0",
        filter: Some(geo_sum_filter),
        check: geo_sum_check,
        rule: geo_sum_rule,
    },
    BuiltinCase {
        name: "geometric-v2",
        program: "while (x>0) { x-- [p] n++ }",
        variables: &["x", "y", "n"],
        domain: "x>=0 and y>=0 and n>=0",
        filter: None,
        check: geometric_v2_check,
        rule: geometric_v2_rule,
    },
    BuiltinCase {
        name: "martingale",
        program: "n=1; while (n!=0) { x=x+y; n=0 [p] x=x-y; y=2*y }",
        variables: &["x", "y", "n"],
        domain: "y>=0 and n>=0",
        filter: None,
        check: martingale_check,
        rule: martingale_rule,
    },
    BuiltinCase {
        name: "product",
        program: "while (n>0) { x++ [p] y++; n-- }",
        variables: &["x", "y", "n"],
        domain: "x>=0 and y>=0 and n>=0",
        filter: None,
        check: product_check,
        rule: product_rule,
    },
    BuiltinCase {
        name: "product-v2",
        program: "while (n>0) { x=x [p] x++; y=y [p] y++; n-- }",
        variables: &["x", "y", "n"],
        domain: "x>=0 and y>=0 and n>=0",
        filter: None,
        check: product_v2_check,
        rule: product_v2_rule,
    },
    BuiltinCase {
        name: "random-square-sum-v2",
        program: "x=0; y=0; while (0<n) { x=x [p] x=x+n*n; y=y+n; n-- }",
        variables: &["x", "y", "n"],
        domain: "x>=y and y>=0 and n>=0",
        filter: None,
        check: random_square_sum_v2_check,
        rule: random_square_sum_v2_rule,
    },
    BuiltinCase {
        name: "random-sum",
        program: "x=0; while (0<n) { x=x [p] x=x+n; n-- }",
        variables: &["x", "n"],
        domain: "x>=0 and n>=0",
        filter: None,
        check: random_sum_check,
        rule: random_sum_rule,
    },
];

/// Every built-in case, in listing order.
pub fn builtin_cases() -> &'static [BuiltinCase] {
    &CASES
}

pub fn find_case(name: &str) -> Option<&'static BuiltinCase> {
    CASES.iter().find(|case| case.name == name)
}

fn coords<const N: usize>(point: &[i64]) -> Result<[i64; N], ExprError> {
    <[i64; N]>::try_from(point)
        .map_err(|_| ExprError::Malformed(format!("expected {N} coordinates, got {}", point.len())))
}

fn i(args: &[i64]) -> String {
    invariant_at(args)
}

/// Start a check at `point` with the pre-expectation as lower bound.
fn start(point: &[i64], e: &Expectations) -> Result<PointCheck, ExprError> {
    Ok(PointCheck::new(Some(e.pre_at(point)?)))
}

fn bound_below(check: &mut PointCheck, point: &[i64]) {
    if let Some(lower) = &check.lower {
        let constraint = format!("{}<={}", render_value(lower), i(point));
        check.push(constraint);
    }
}

fn bound_above(check: &mut PointCheck, point: &[i64], e: &Expectations) -> Result<(), ExprError> {
    let upper = e.post_at(point)?;
    check.push(format!("{}<={}", i(point), render_value(&upper)));
    check.upper = Some(upper);
    Ok(())
}

fn random_walk_v1_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if x < 0 || y < 0 || n < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if 0 < x {
        c.push(format!("2*{}<={}+{}", i(p), i(&[x + 1, y, n + 1]), i(&[x - 1, y, n + 1])));
    }
    if x <= 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn random_walk_v1_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("I[x,y,n]>=({pre})")),
        Formula::implies(
            Formula::atom("0<x"),
            Formula::atom("2*I[x,y,n]<=I[x-1,y,n+1]+I[x+1,y,n+1]"),
        ),
        Formula::implies(Formula::atom("x<=0"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn random_walk_v2_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if x < 0 || y < 0 || x > y || n < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if 0 < x && x < y {
        c.push(format!("2*{}<={}+{}", i(p), i(&[x + 1, y, n + 1]), i(&[x - 1, y, n + 1])));
    }
    if x == 0 || x == y {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn random_walk_v2_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("I[x,y,n]>=({pre})")),
        Formula::implies(
            Formula::and(vec![Formula::atom("0<x"), Formula::atom("x<y")]),
            Formula::atom("2*I[x,y,n]<=I[x-1,y,n+1]+I[x+1,y,n+1]"),
        ),
        Formula::implies(
            Formula::or(vec![Formula::atom("x<=0"), Formula::atom("x>=y")]),
            Formula::atom(format!("I[x,y,n]<=({post})")),
        ),
    ])
}

fn sum_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if n < 0 || x < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if n > 0 {
        c.push(format!("{}<={}", i(p), i(&[x + n, y, n - 1])));
    }
    if n <= 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn sum_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,y,n]")),
        Formula::implies(Formula::atom("n>0"), Formula::atom("I[x,y,n]<=I[x+n,y,n-1]")),
        Formula::implies(Formula::atom("n<=0"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn coin_filter(p: &[i64]) -> bool {
    matches!(p, [x, y, _] if (*x == 0 || *x == 1) && (*y == 0 || *y == 1))
}

fn coin_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if n < 0 || x < 0 || y < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if x == y {
        c.push(format!(
            "16*{}<={}+3*{}+3*{}+9*{}",
            i(p),
            i(&[0, 0, n + 1]),
            i(&[0, 1, n + 1]),
            i(&[1, 0, n + 1]),
            i(&[1, 1, n + 1])
        ));
    }
    if x != y {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn coin_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,y,n]")),
        Formula::implies(
            Formula::atom("x==y"),
            Formula::atom("16*I[x,y,n]<=9*I[1,1,n+1]+3*I[1,0,n+1]+3*I[0,1,n+1]+I[0,0,n+1]"),
        ),
        Formula::implies(Formula::atom("x!=y"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn binomial_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if n < 0 || y < 0 || x < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if n > 0 {
        c.push(format!("4*{}<={}+3*{}", i(p), i(&[x + y, y, n - 1]), i(&[x, y, n - 1])));
    }
    if n <= 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn binomial_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,y,n]")),
        Formula::implies(
            Formula::atom("n>0"),
            Formula::atom("4*I[x,y,n]<=I[x+y,y,n-1]+3*I[x,y,n-1]"),
        ),
        Formula::implies(Formula::atom("n<=0"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn binomial_v2_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if n < 0 || y < 0 || x < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if n > 0 {
        c.push(format!("4*{}<={}+3*{}", i(p), i(&[x + n, y, n - 1]), i(&[x + y, y, n - 1])));
    }
    if n <= 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn binomial_v2_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,y,n]")),
        Formula::implies(
            Formula::atom("n>0"),
            Formula::atom("4*I[x,y,n]<=I[x+n,y,n-1]+3*I[x+y,y,n-1]"),
        ),
        Formula::implies(Formula::atom("n<=0"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn geo_sum_filter(p: &[i64]) -> bool {
    matches!(p.first(), Some(0) | Some(1))
}

fn geo_sum_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if n < 0 || y < 0 || x < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if x != 0 {
        c.push(format!("4*{}<={}+3*{}", i(p), i(&[0, y, n + 1]), i(&[x, y + n, n + 1])));
    }
    if x == 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn geo_sum_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,y,n]")),
        Formula::implies(
            Formula::atom("x<>0"),
            Formula::atom("4*I[x,y,n]<=I[0,y,n+1]+3*I[x,y+n,n+1]"),
        ),
        Formula::implies(Formula::atom("x==0"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn geometric_v2_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if n < 0 || y < 0 || x < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if x > 0 {
        c.push(format!("2*{}<={}+{}", i(p), i(&[x - 1, y, n]), i(&[x, y, n + 1])));
    }
    if x <= 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn geometric_v2_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,y,n]")),
        Formula::implies(Formula::atom("x>0"), Formula::atom("2*I[x,y,n]<=I[x-1,y,n]+I[x,y,n+1]")),
        Formula::implies(Formula::atom("x<=1"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn martingale_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if n < 0 || y < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if n != 0 {
        c.push(format!("2*{}<={}+{}", i(p), i(&[x + y, y, 0]), i(&[x - y, 2 * y, n])));
    }
    if n == 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn martingale_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,y,n]")),
        Formula::implies(
            Formula::atom("n<>0"),
            Formula::atom("2*I[x,y,n]<=I[x+y,y,0]+I[x-y,2*y,n]"),
        ),
        Formula::implies(Formula::atom("n==0"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn product_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if x < 0 || y < 0 || n < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    if n >= 2 {
        bound_below(&mut c, p);
    }
    if n >= 1 {
        c.push(format!("2*{}<={}+{}", i(p), i(&[x + 1, y, n - 1]), i(&[x, y + 1, n - 1])));
    }
    if n == 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn product_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::implies(Formula::atom("n>=2"), Formula::atom(format!("({pre})<=I[0,0,n]"))),
        Formula::implies(
            Formula::atom("n>=1"),
            Formula::atom("2*I[x,y,n]<=I[x+1,y,n-1]+I[x,y+1,n-1]"),
        ),
        Formula::atom(format!("I[x,y,0]<=({post})")),
    ])
}

fn product_v2_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if x < 0 || y < 0 || n < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    if n >= 2 {
        bound_below(&mut c, p);
    }
    if n >= 1 {
        c.push(format!(
            "4*{}<={}+{}+{}+{}",
            i(p),
            i(&[x + 1, y + 1, n - 1]),
            i(&[x + 1, y, n - 1]),
            i(&[x, y + 1, n - 1]),
            i(&[x, y, n - 1])
        ));
    }
    if n == 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn product_v2_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("I[x,y,0]<=({post})")),
        Formula::implies(Formula::atom("n>=2"), Formula::atom(format!("({pre})<=I[0,0,n]"))),
        Formula::implies(
            Formula::atom("n>=1"),
            Formula::atom("4*I[x,y,n]<=I[x+1,y+1,n-1]+I[x,y+1,n-1]+I[x+1,y,n-1]+I[x,y,n-1]"),
        ),
    ])
}

fn random_square_sum_v2_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, y, n] = coords(p)?;
    if n < 0 || x < 0 || x < y {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if n > 0 {
        c.push(format!("2*{}<={}+{}", i(p), i(&[x + n * n, y + n, n - 1]), i(&[x, y, n - 1])));
    }
    if n <= 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn random_square_sum_v2_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,y,n]")),
        Formula::implies(
            Formula::atom("n>0"),
            Formula::atom("2*I[x,y,n]<=I[x+n*n,y+n,n-1]+I[x,y,n-1]"),
        ),
        Formula::implies(Formula::atom("n<=0"), Formula::atom(format!("I[x,y,n]<=({post})"))),
    ])
}

fn random_sum_check(p: &[i64], e: &Expectations) -> Result<Option<PointCheck>, ExprError> {
    let [x, n] = coords(p)?;
    if n < 0 || x < 0 {
        return Ok(None);
    }
    let mut c = start(p, e)?;
    bound_below(&mut c, p);
    if n > 0 {
        c.push(format!("2*{}<={}+{}", i(p), i(&[x + n, n - 1]), i(&[x, n - 1])));
    }
    if n <= 0 {
        bound_above(&mut c, p, e)?;
    }
    Ok(c.finish())
}

fn random_sum_rule(pre: &str, post: &str) -> Formula {
    Formula::and(vec![
        Formula::atom(format!("({pre})<=I[x,n]")),
        Formula::implies(Formula::atom("n>0"), Formula::atom("2*I[x,n]<=I[x+n,n-1]+I[x,n-1]")),
        Formula::implies(Formula::atom("n<=0"), Formula::atom(format!("I[x,n]<=({post})"))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse_relation;
    use crate::formula::parse_redlog;
    use num::rational::BigRational;

    fn expectations(case: &BuiltinCase, pre: &str, post: &str) -> Expectations {
        Expectations::new(pre, post, case.variables).unwrap()
    }

    #[test]
    fn names_are_unique_and_resolvable() {
        let mut names: Vec<&str> = builtin_cases().iter().map(|c| c.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 13);
        assert!(find_case(DEFAULT_CASE).is_some());
        assert!(find_case("no-such-case").is_none());
    }

    #[test]
    fn every_domain_and_rule_parses() {
        for case in builtin_cases() {
            parse_redlog(case.domain).unwrap_or_else(|e| panic!("{}: {e}", case.name));
            let rule = case.rule("x", "n");
            for atom in rule.atoms() {
                parse_relation(atom).unwrap_or_else(|e| panic!("{}: `{atom}`: {e}", case.name));
            }
        }
    }

    #[test]
    fn every_emitted_constraint_parses() {
        for case in builtin_cases() {
            let e = expectations(case, "0", "1");
            let arity = case.variables.len();
            let point = vec![1; arity];
            if let Some(check) = case.check(&point, &e).unwrap() {
                for constraint in &check.constraints {
                    parse_relation(constraint)
                        .unwrap_or_else(|err| panic!("{}: `{constraint}`: {err}", case.name));
                }
            }
        }
    }

    #[test]
    fn random_walk_interior_point_relates_neighbours() {
        let case = find_case("random-walk-v2").unwrap();
        let e = expectations(case, "x*(y-x)", "n");
        let check = case.check(&[1, 3, 2], &e).unwrap().unwrap();
        assert_eq!(check.lower, Some(BigRational::from_integer(2.into())));
        assert_eq!(check.upper, None);
        assert_eq!(
            check.constraints,
            vec!["2<=I[1,3,2]", "2*I[1,3,2]<=I[2,3,3]+I[0,3,3]"]
        );
    }

    #[test]
    fn random_walk_boundary_point_is_bounded_above() {
        let case = find_case("random-walk-v2").unwrap();
        let e = expectations(case, "x*(y-x)", "n");
        let check = case.check(&[2, 2, 3], &e).unwrap().unwrap();
        assert_eq!(check.upper, Some(BigRational::from_integer(3.into())));
        assert_eq!(check.constraints, vec!["0<=I[2,2,3]", "I[2,2,3]<=3"]);
        assert!(case.check(&[3, 2, 0], &e).unwrap().is_none());
    }

    #[test]
    fn contradicting_bounds_drop_the_point() {
        let case = find_case("sum").unwrap();
        let e = expectations(case, "5", "n");
        assert!(case.check(&[0, 0, 0], &e).unwrap().is_none());
    }

    #[test]
    fn product_guards_the_lower_bound() {
        let case = find_case("product").unwrap();
        let e = expectations(case, "n*(n-1)", "x*y");
        let check = case.check(&[0, 0, 1], &e).unwrap().unwrap();
        assert_eq!(check.constraints, vec!["2*I[0,0,1]<=I[1,0,0]+I[0,1,0]"]);
        assert_eq!(check.lower, Some(BigRational::from_integer(0.into())));
    }

    #[test]
    fn fractional_bounds_render_in_parentheses() {
        let case = find_case("random-sum").unwrap();
        let e = expectations(case, "x/2", "x");
        let check = case.check(&[1, 0], &e).unwrap().unwrap();
        assert_eq!(check.constraints, vec!["(1/2)<=I[1,0]", "I[1,0]<=1"]);
    }

    #[test]
    fn filters_restrict_ground_checks() {
        let coin = find_case("coin").unwrap();
        assert!(coin.has_filter());
        assert!(coin.admits(&[1, 0, 3]));
        assert!(!coin.admits(&[2, 0, 3]));
        let geo = find_case("geo-sum").unwrap();
        assert!(geo.admits(&[1, 3, 3]));
        assert!(!geo.admits(&[2, 0, 0]));
        let walk = find_case("random-walk-v1").unwrap();
        assert!(!walk.has_filter());
        assert!(walk.admits(&[7, 7, 7]));
    }

    #[test]
    fn wrong_arity_is_reported() {
        let case = find_case("random-sum").unwrap();
        let e = expectations(case, "x", "n");
        assert!(matches!(case.check(&[1, 2, 3], &e), Err(ExprError::Malformed(_))));
    }
}
