//! Rule AST data structures.
//!
//! A compiled rule is a tree of boolean nodes over arithmetic expressions:
//! - `Expr`: what can be computed per bar (literals, price fields,
//!   `entry_price`, indicator references, arithmetic)
//! - `Rule`: comparisons combined with AND / OR / NOT
//! - `IndicatorRef`: an indicator plus the output field to read
//!
//! The tree is immutable after compilation and owned by the strategy that
//! compiled it.

use crate::domain::indicator::IndicatorType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorField {
    Value,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    StochasticK,
    StochasticD,
    BollingerUpper,
    BollingerMiddle,
    BollingerLower,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRef {
    pub indicator_type: IndicatorType,
    pub field: IndicatorField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Price(PriceField),
    EntryPrice,
    Indicator(IndicatorRef),
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Comparison {
        left: Expr,
        op: CmpOp,
        right: Expr,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
}

/// Collect every indicator referenced anywhere in a rule tree.
pub fn extract_indicators(rule: &Rule) -> Vec<IndicatorType> {
    let mut out = Vec::new();
    collect_rule(rule, &mut out);
    out
}

fn collect_rule(rule: &Rule, out: &mut Vec<IndicatorType>) {
    match rule {
        Rule::Comparison { left, right, .. } => {
            collect_expr(left, out);
            collect_expr(right, out);
        }
        Rule::And(rules) | Rule::Or(rules) => {
            for r in rules {
                collect_rule(r, out);
            }
        }
        Rule::Not(inner) => collect_rule(inner, out),
    }
}

fn collect_expr(expr: &Expr, out: &mut Vec<IndicatorType>) {
    match expr {
        Expr::Indicator(ind_ref) => {
            if !out.contains(&ind_ref.indicator_type) {
                out.push(ind_ref.indicator_type.clone());
            }
        }
        Expr::Arith { left, right, .. } => {
            collect_expr(left, out);
            collect_expr(right, out);
        }
        Expr::Number(_) | Expr::Price(_) | Expr::EntryPrice => {}
    }
}

/// Largest warm-up window among the indicators a set of rules references.
/// A strategy with no indicator references needs at least one bar.
pub fn min_bars_required(rules: &[&Rule]) -> usize {
    rules
        .iter()
        .flat_map(|r| extract_indicators(r))
        .map(|t| t.warmup_bars())
        .max()
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sma_ref(period: usize) -> Expr {
        Expr::Indicator(IndicatorRef {
            indicator_type: IndicatorType::Sma(period),
            field: IndicatorField::Value,
        })
    }

    #[test]
    fn comparison_rule() {
        let rule = Rule::Comparison {
            left: Expr::Price(PriceField::Close),
            op: CmpOp::Gt,
            right: Expr::Number(100.0),
        };
        assert!(matches!(rule, Rule::Comparison { op: CmpOp::Gt, .. }));
    }

    #[test]
    fn arithmetic_expr() {
        let expr = Expr::Arith {
            op: ArithOp::Mul,
            left: Box::new(Expr::EntryPrice),
            right: Box::new(Expr::Number(0.95)),
        };
        assert!(matches!(expr, Expr::Arith { op: ArithOp::Mul, .. }));
    }

    #[test]
    fn nested_composites() {
        let leaf = Rule::Comparison {
            left: sma_ref(20),
            op: CmpOp::Lt,
            right: sma_ref(50),
        };
        let rule = Rule::And(vec![
            Rule::Or(vec![leaf.clone(), Rule::Not(Box::new(leaf.clone()))]),
            leaf,
        ]);
        assert!(matches!(rule, Rule::And(_)));
    }

    #[test]
    fn extract_indicators_deduplicates() {
        let rule = Rule::And(vec![
            Rule::Comparison {
                left: sma_ref(20),
                op: CmpOp::Gt,
                right: sma_ref(50),
            },
            Rule::Comparison {
                left: sma_ref(20),
                op: CmpOp::Gt,
                right: Expr::Number(0.0),
            },
        ]);

        let indicators = extract_indicators(&rule);
        assert_eq!(indicators.len(), 2);
        assert!(indicators.contains(&IndicatorType::Sma(20)));
        assert!(indicators.contains(&IndicatorType::Sma(50)));
    }

    #[test]
    fn extract_indicators_inside_arithmetic() {
        let rule = Rule::Comparison {
            left: Expr::Arith {
                op: ArithOp::Div,
                left: Box::new(Expr::Price(PriceField::Close)),
                right: Box::new(sma_ref(200)),
            },
            op: CmpOp::Gt,
            right: Expr::Number(1.05),
        };

        let indicators = extract_indicators(&rule);
        assert_eq!(indicators, vec![IndicatorType::Sma(200)]);
    }

    #[test]
    fn extract_indicators_none() {
        let rule = Rule::Comparison {
            left: Expr::Price(PriceField::Close),
            op: CmpOp::Gt,
            right: Expr::EntryPrice,
        };
        assert!(extract_indicators(&rule).is_empty());
    }

    #[test]
    fn min_bars_takes_longest_warmup() {
        let entry = Rule::Comparison {
            left: sma_ref(5),
            op: CmpOp::Gt,
            right: Expr::Number(0.0),
        };
        let exit = Rule::Comparison {
            left: sma_ref(200),
            op: CmpOp::Lt,
            right: Expr::Number(0.0),
        };
        assert_eq!(min_bars_required(&[&entry, &exit]), 200);
    }

    #[test]
    fn min_bars_no_indicators_is_one() {
        let rule = Rule::Comparison {
            left: Expr::Price(PriceField::Close),
            op: CmpOp::Gt,
            right: Expr::Number(100.0),
        };
        assert_eq!(min_bars_required(&[&rule]), 1);
    }
}
