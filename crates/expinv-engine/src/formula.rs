//! Boolean structure over relational atoms.
//!
//! Recurrence rules are built as [`Formula`] trees whose leaves are
//! relation strings such as `2*I[x,y,n]<=I[x-1,y,n+1]+I[x+1,y,n+1]`.
//! Atoms stay textual until a consumer parses them, so the same tree can
//! be instantiated at a point, rendered for Redlog, or lowered to SMT.

use std::fmt;

use pest::Parser;

use crate::expr::{build_relation, next_pair, ExprError, ExprParser, Pair, Rule};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    Atom(String),
    Bool(bool),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Implies(Box<Formula>, Box<Formula>),
}

#[allow(clippy::should_implement_trait)]
impl Formula {
    pub fn atom(text: impl Into<String>) -> Self {
        Formula::Atom(text.into())
    }

    pub fn and(children: Vec<Formula>) -> Self {
        Formula::And(children)
    }

    pub fn or(children: Vec<Formula>) -> Self {
        Formula::Or(children)
    }

    pub fn not(inner: Formula) -> Self {
        Formula::Not(Box::new(inner))
    }

    pub fn implies(premise: Formula, conclusion: Formula) -> Self {
        Formula::Implies(Box::new(premise), Box::new(conclusion))
    }

    /// Atom strings in left-to-right order.
    pub fn atoms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Formula::Atom(text) => out.push(text),
            Formula::Bool(_) => {}
            Formula::Not(inner) => inner.collect_atoms(out),
            Formula::And(children) | Formula::Or(children) => {
                children.iter().for_each(|c| c.collect_atoms(out))
            }
            Formula::Implies(a, b) => {
                a.collect_atoms(out);
                b.collect_atoms(out);
            }
        }
    }

    /// Rewrite every atom, keeping the boolean structure.
    pub fn try_map_atoms<E>(
        &self,
        f: &mut dyn FnMut(&str) -> Result<String, E>,
    ) -> Result<Formula, E> {
        Ok(match self {
            Formula::Atom(text) => Formula::Atom(f(text)?),
            Formula::Bool(b) => Formula::Bool(*b),
            Formula::Not(inner) => Formula::not(inner.try_map_atoms(f)?),
            Formula::And(children) => Formula::And(
                children
                    .iter()
                    .map(|c| c.try_map_atoms(f))
                    .collect::<Result<_, _>>()?,
            ),
            Formula::Or(children) => Formula::Or(
                children
                    .iter()
                    .map(|c| c.try_map_atoms(f))
                    .collect::<Result<_, _>>()?,
            ),
            Formula::Implies(a, b) => Formula::implies(a.try_map_atoms(f)?, b.try_map_atoms(f)?),
        })
    }

    /// Render in Redlog syntax. Every operand is parenthesized and the
    /// equality operators are spelled `=` and `<>`.
    pub fn to_redlog(&self) -> String {
        match self {
            Formula::Atom(text) => redlog_atom(text),
            Formula::Bool(b) => b.to_string(),
            Formula::Not(inner) => format!("not ({})", inner.to_redlog()),
            Formula::And(children) => join_redlog(children, "and", "true"),
            Formula::Or(children) => join_redlog(children, "or", "false"),
            Formula::Implies(a, b) => format!("({}) impl ({})", a.to_redlog(), b.to_redlog()),
        }
    }
}

fn join_redlog(children: &[Formula], op: &str, unit: &str) -> String {
    if children.is_empty() {
        return unit.to_string();
    }
    let parts: Vec<String> = children.iter().map(Formula::to_redlog).collect();
    format!("({})", parts.join(&format!(") {op} (")))
}

/// Respell an in-house relation for Redlog.
pub fn redlog_atom(atom: &str) -> String {
    atom.replace("==", "=").replace("!=", "<>")
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, children: &[Formula]) -> fmt::Result {
            write!(f, "{name}(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")
        }
        match self {
            Formula::Atom(text) => f.write_str(text),
            Formula::Bool(true) => f.write_str("True"),
            Formula::Bool(false) => f.write_str("False"),
            Formula::Not(inner) => write!(f, "Not({inner})"),
            Formula::And(children) => list(f, "And", children),
            Formula::Or(children) => list(f, "Or", children),
            Formula::Implies(a, b) => write!(f, "Implies({a}, {b})"),
        }
    }
}

/// Parse a quantifier-free view of a Redlog formula.
///
/// Existential quantifiers are dropped to their body, leaving the bound
/// variables free, which is what a model search over them needs.
/// Universal quantifiers are rejected.
pub fn parse_redlog(source: &str) -> Result<Formula, ExprError> {
    let mut pairs = ExprParser::parse(Rule::formula_input, source)
        .map_err(|e| ExprError::syntax(e, source))?;
    let input = next_pair(&mut pairs, "formula input")?;
    build_formula(next_pair(&mut input.into_inner(), "formula")?)
}

fn build_formula(pair: Pair<'_>) -> Result<Formula, ExprError> {
    match pair.as_rule() {
        Rule::formula => {
            let mut inner = pair.into_inner();
            let premise = build_formula(next_pair(&mut inner, "disjunction")?)?;
            // `kw_impl` then the right-associated rest.
            match (inner.next(), inner.next()) {
                (Some(_), Some(rest)) => Ok(Formula::implies(premise, build_formula(rest)?)),
                _ => Ok(premise),
            }
        }
        Rule::disjunction => build_junction(pair, Rule::kw_or, Formula::Or),
        Rule::conjunction => build_junction(pair, Rule::kw_and, Formula::And),
        Rule::negation => {
            let mut inner = pair.into_inner();
            let first = next_pair(&mut inner, "negation")?;
            if first.as_rule() == Rule::kw_not {
                Ok(Formula::not(build_formula(next_pair(&mut inner, "negated formula")?)?))
            } else {
                build_formula(first)
            }
        }
        Rule::kw_true => Ok(Formula::Bool(true)),
        Rule::kw_false => Ok(Formula::Bool(false)),
        Rule::relation => Ok(Formula::Atom(build_relation(pair)?.to_string())),
        Rule::quantified => {
            let mut inner = pair.into_inner();
            let quantifier = next_pair(&mut inner, "quantifier")?;
            if quantifier.as_str() != "ex" {
                return Err(ExprError::Unsupported(format!(
                    "universal quantifier in `{}`",
                    quantifier.as_str()
                )));
            }
            let _bound = next_pair(&mut inner, "bound variables")?;
            build_formula(next_pair(&mut inner, "quantifier body")?)
        }
        other => Err(ExprError::Malformed(format!("unexpected {other:?}"))),
    }
}

fn build_junction(
    pair: Pair<'_>,
    keyword: Rule,
    make: fn(Vec<Formula>) -> Formula,
) -> Result<Formula, ExprError> {
    let mut children = pair
        .into_inner()
        .filter(|p| p.as_rule() != keyword)
        .map(build_formula)
        .collect::<Result<Vec<_>, _>>()?;
    if children.len() == 1 {
        Ok(children.remove(0))
    } else {
        Ok(make(children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk_rule() -> Formula {
        Formula::and(vec![
            Formula::atom("I[x,y,n]>=(x*(y-x))"),
            Formula::implies(
                Formula::and(vec![Formula::atom("0<x"), Formula::atom("x<y")]),
                Formula::atom("2*I[x,y,n]<=I[x-1,y,n+1]+I[x+1,y,n+1]"),
            ),
            Formula::implies(
                Formula::or(vec![Formula::atom("x<=0"), Formula::atom("x>=y")]),
                Formula::atom("I[x,y,n]<=(n)"),
            ),
        ])
    }

    #[test]
    fn redlog_rendering_parenthesizes_every_operand() {
        let rendered = walk_rule().to_redlog();
        assert_eq!(
            rendered,
            "(I[x,y,n]>=(x*(y-x))) and (((0<x) and (x<y)) impl (2*I[x,y,n]<=I[x-1,y,n+1]+I[x+1,y,n+1])) and (((x<=0) or (x>=y)) impl (I[x,y,n]<=(n)))"
        );
    }

    #[test]
    fn redlog_rendering_respells_equality() {
        let f = Formula::implies(Formula::atom("x==y"), Formula::not(Formula::atom("x!=0")));
        assert_eq!(f.to_redlog(), "(x=y) impl (not (x<>0))");
    }

    #[test]
    fn atoms_are_listed_in_order() {
        let rule = walk_rule();
        let atoms = rule.atoms();
        assert_eq!(atoms.len(), 6);
        assert_eq!(atoms[1], "0<x");
        assert_eq!(atoms[5], "I[x,y,n]<=(n)");
    }

    #[test]
    fn atom_mapping_keeps_structure() {
        let mapped: Formula = walk_rule()
            .try_map_atoms(&mut |a| Ok::<_, ()>(a.to_uppercase()))
            .unwrap();
        assert_eq!(mapped.atoms()[1], "0<X");
        assert!(matches!(mapped, Formula::And(ref c) if c.len() == 3));
    }

    #[test]
    fn display_uses_constructor_names() {
        let f = Formula::or(vec![Formula::Bool(true), Formula::not(Formula::atom("x>0"))]);
        assert_eq!(f.to_string(), "Or(True, Not(x>0))");
    }

    #[test]
    fn parses_redlog_precedence() {
        let f = parse_redlog("not x > 0 and y >= 0 or n = 0 impl x <> y").unwrap();
        let expected = Formula::implies(
            Formula::or(vec![
                Formula::and(vec![Formula::not(Formula::atom("x>0")), Formula::atom("y>=0")]),
                Formula::atom("n==0"),
            ]),
            Formula::atom("x!=y"),
        );
        assert_eq!(f, expected);
    }

    #[test]
    fn parses_parenthesized_relations_and_formulas() {
        let f = parse_redlog("((x + 1)*2 >= 0 and (y - x <= 3))").unwrap();
        assert_eq!(
            f,
            Formula::and(vec![Formula::atom("(x+1)*2>=0"), Formula::atom("y-x<=3")])
        );
    }

    #[test]
    fn existential_quantifiers_drop_to_their_body() {
        let f = parse_redlog("ex(x, ex({y, n}, x >= 0 and true))").unwrap();
        assert_eq!(f, Formula::and(vec![Formula::atom("x>=0"), Formula::Bool(true)]));
        assert!(matches!(
            parse_redlog("all(x, x >= 0)"),
            Err(ExprError::Unsupported(_))
        ));
    }

    #[test]
    fn keywords_do_not_swallow_identifiers() {
        let f = parse_redlog("notes >= 0 and android <= 1").unwrap();
        assert_eq!(
            f,
            Formula::and(vec![Formula::atom("notes>=0"), Formula::atom("android<=1")])
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_redlog("x >= and").is_err());
        assert!(parse_redlog("").is_err());
    }
}
