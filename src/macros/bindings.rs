//! Per-expansion binding table and pattern variable collection.

use std::collections::HashMap;

use crate::ast::{prim, ScopeTag, Symbol, Term};

/// Variables seen while rewriting one pattern, keyed by `(name, scope)`.
///
/// Each distinct variable maps to the neutral symbol that replaced it, so
/// repeated occurrences of one variable keep unifying after the rewrite and
/// a guard can refer to the replacement.
#[derive(Debug, Default)]
pub struct BindingTable {
    seen: HashMap<(String, ScopeTag), Symbol>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the neutral replacement for `sym`, minting it on first sight.
    pub fn neutralize(&mut self, sym: &Symbol, fresh: impl FnOnce() -> ScopeTag) -> Symbol {
        self.seen
            .entry(sym.key())
            .or_insert_with(|| {
                let name = if sym.is_ignored() {
                    sym.name.clone()
                } else {
                    format!("_{}", sym.name)
                };
                Symbol::new(name, fresh())
            })
            .clone()
    }

    /// The replacement recorded for `sym`, if it was seen on the pattern side.
    pub fn replacement(&self, sym: &Symbol) -> Option<&Symbol> {
        self.seen.get(&sym.key())
    }

    pub fn contains(&self, sym: &Symbol) -> bool {
        self.seen.contains_key(&sym.key())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Variables a pattern binds, in first-occurrence order.
///
/// Pinned variables and `_` do not bind. A guard wrapped around the pattern
/// is skipped.
pub fn pattern_variables(pattern: &Term) -> Vec<Symbol> {
    let mut out = Vec::new();
    collect_pattern_variables(pattern, &mut out);
    out
}

fn collect_pattern_variables(term: &Term, out: &mut Vec<Symbol>) {
    match term {
        Term::Symbol(sym) => {
            if !sym.is_wildcard() && !out.contains(sym) {
                out.push(sym.clone());
            }
        }
        Term::Literal(_) => {}
        Term::Pair(left, right) => {
            collect_pattern_variables(left, out);
            collect_pattern_variables(right, out);
        }
        Term::Sequence(items) | Term::Aggregate { elements: items, .. } => {
            items.iter().for_each(|t| collect_pattern_variables(t, out));
        }
        Term::Node { tag, children, .. } => match (tag.as_str(), children.as_slice()) {
            (prim::PIN, _) => {}
            (prim::WHEN, [pattern, _guard]) => collect_pattern_variables(pattern, out),
            (prim::TYPED, [value, _ty]) => collect_pattern_variables(value, out),
            _ => children.iter().for_each(|t| collect_pattern_variables(t, out)),
        },
    }
}

/// Variables that evaluating `term` leaves bound in the enclosing scope.
pub fn exported_bindings(term: &Term) -> Vec<Symbol> {
    let mut out = Vec::new();
    collect_exported(term, &mut out);
    out
}

fn collect_exported(term: &Term, out: &mut Vec<Symbol>) {
    let Term::Node {
        tag,
        meta,
        children,
    } = term
    else {
        return;
    };
    match (tag.as_str(), children.as_slice()) {
        (prim::MATCH, [pattern, value]) => {
            collect_pattern_variables(pattern, out);
            collect_exported(value, out);
        }
        (prim::BLOCK, exprs) => exprs.iter().for_each(|e| collect_exported(e, out)),
        (prim::CASE, [subject, clauses @ ..]) if meta.export_bindings => {
            collect_exported(subject, out);
            for clause in clauses {
                if let Some([head, body]) = clause.as_node(prim::CLAUSE) {
                    let (pattern, _) = prim::split_guard(head);
                    collect_pattern_variables(pattern, out);
                    collect_exported(body, out);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutralize_is_stable_per_variable() {
        let mut table = BindingTable::new();
        let mut next = 100;
        let mut fresh = || {
            next += 1;
            ScopeTag(next)
        };
        let x = Symbol::new("x", ScopeTag::ROOT);
        let first = table.neutralize(&x, &mut fresh);
        let again = table.neutralize(&x, &mut fresh);
        assert_eq!(first, again);
        assert_eq!(first.name, "_x");
        let other = table.neutralize(&Symbol::new("x", ScopeTag(3)), &mut fresh);
        assert_ne!(first, other);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn underscored_names_are_kept() {
        let mut table = BindingTable::new();
        let out = table.neutralize(&Symbol::new("_rest", ScopeTag::ROOT), || ScopeTag(9));
        assert_eq!(out, Symbol::new("_rest", ScopeTag(9)));
    }

    #[test]
    fn pattern_variables_skip_pins_and_wildcards() {
        let pattern = Term::seq(vec![
            Term::var("a"),
            prim::pin(Term::var("b")),
            Term::wildcard(),
            Term::pair(Term::var("c"), Term::var("a")),
        ]);
        let names: Vec<_> = pattern_variables(&pattern)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn exported_bindings_follow_matches_and_export_cases() {
        let step = prim::case(
            Term::var("list"),
            vec![
                prim::clause(prim::cons(Term::var("x"), Term::var("t")), Term::var("t")),
                prim::clause(Term::var("other"), prim::match_(Term::var("x"), Term::nil())),
            ],
        );
        assert!(exported_bindings(&step).is_empty());
        let names: Vec<_> = exported_bindings(&step.exporting_bindings())
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["x", "t", "other"]);
    }
}
