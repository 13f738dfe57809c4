//! Rule expression parser.
//!
//! Recursive descent over the infix rule grammar, lowest to highest
//! precedence:
//!
//! ```text
//! or_expr    := and_expr ( OR and_expr )*
//! and_expr   := not_expr ( AND not_expr )*
//! not_expr   := NOT not_expr | primary
//! primary    := '(' or_expr ')' | comparison
//! comparison := sum ( < | <= | > | >= | == | != ) sum
//! sum        := term ( ('+' | '-') term )*
//! term       := factor ( ('*' | '/') factor )*
//! factor     := NUMBER | '(' sum ')' | price field | entry_price
//!             | indicator call
//! ```
//!
//! Logical keywords are case-insensitive and identifiers are lowered, so
//! `RSI(14) < 30 and Price > SMA(200)` compiles. All name and arity problems
//! are compile errors with a character position; nothing is deferred to
//! evaluation.

use crate::domain::error::CompileError;
use crate::domain::indicator::IndicatorType;
use crate::domain::rule::{
    ArithOp, CmpOp, Expr, IndicatorField, IndicatorRef, PriceField, Rule,
};

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn syntax(&self, message: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            message: message.into(),
            position: self.pos,
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), CompileError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(self.syntax(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.syntax(format!("expected '{}', found end of input", expected))),
        }
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        word
    }

    /// Consume a logical keyword (case-insensitive, whole word).
    fn consume_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let word = self.peek_word();
        if word.eq_ignore_ascii_case(keyword) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn parse_number(&mut self) -> Result<f64, CompileError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            self.pos = start;
            return Err(self.syntax("expected number"));
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| CompileError::Syntax {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_or_expr(&mut self) -> Result<Rule, CompileError> {
        let mut children = vec![self.parse_and_expr()?];
        while self.consume_keyword("OR") {
            children.push(self.parse_and_expr()?);
        }
        if children.len() == 1 {
            Ok(children.pop().unwrap())
        } else {
            Ok(Rule::Or(children))
        }
    }

    fn parse_and_expr(&mut self) -> Result<Rule, CompileError> {
        let mut children = vec![self.parse_not_expr()?];
        while self.consume_keyword("AND") {
            children.push(self.parse_not_expr()?);
        }
        if children.len() == 1 {
            Ok(children.pop().unwrap())
        } else {
            Ok(Rule::And(children))
        }
    }

    fn parse_not_expr(&mut self) -> Result<Rule, CompileError> {
        if self.consume_keyword("NOT") {
            let inner = self.parse_not_expr()?;
            return Ok(Rule::Not(Box::new(inner)));
        }
        self.parse_primary_condition()
    }

    /// A parenthesis at condition level is ambiguous: it may group a boolean
    /// expression or the left arithmetic operand of a comparison. Try the
    /// boolean reading first; on failure rewind and parse a comparison, whose
    /// factor rule accepts the parenthesized arithmetic.
    fn parse_primary_condition(&mut self) -> Result<Rule, CompileError> {
        self.skip_whitespace();
        if self.peek() == Some('(') {
            let checkpoint = self.pos;
            self.advance();
            if let Ok(rule) = self.parse_or_expr() {
                self.skip_whitespace();
                if self.peek() == Some(')') {
                    self.advance();
                    return Ok(rule);
                }
            }
            self.pos = checkpoint;
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Rule, CompileError> {
        let left = self.parse_sum()?;
        let op = self.parse_cmp_op()?;
        let right = self.parse_sum()?;
        Ok(Rule::Comparison { left, op, right })
    }

    fn parse_cmp_op(&mut self) -> Result<CmpOp, CompileError> {
        self.skip_whitespace();
        // longest operators first
        for (text, op) in [
            (">=", CmpOp::Ge),
            ("<=", CmpOp::Le),
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            (">", CmpOp::Gt),
            ("<", CmpOp::Lt),
        ] {
            if self.remaining().starts_with(text) {
                self.pos += text.len();
                return Ok(op);
            }
        }
        Err(self.syntax("expected comparison operator"))
    }

    fn parse_sum(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => ArithOp::Add,
                Some('-') => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_factor()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') => ArithOp::Mul,
                Some('/') => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, CompileError> {
        self.skip_whitespace();

        match self.peek() {
            Some(ch) if ch.is_ascii_digit() || ch == '.' || ch == '-' => {
                return self.parse_number().map(Expr::Number);
            }
            Some('(') => {
                self.advance();
                let expr = self.parse_sum()?;
                self.expect_char(')')?;
                return Ok(expr);
            }
            _ => {}
        }

        let word_pos = self.pos;
        let word = self.peek_word();
        if word.is_empty() {
            return Err(self.syntax(match self.peek() {
                Some(ch) => format!("expected expression, found '{}'", ch),
                None => "expected expression, found end of input".to_string(),
            }));
        }

        let lower = word.to_ascii_lowercase();
        if matches!(lower.as_str(), "and" | "or" | "not") {
            return Err(self.syntax(format!("expected expression, found '{}'", word)));
        }
        self.pos += word.len();

        match lower.as_str() {
            "price" | "close" => return Ok(Expr::Price(PriceField::Close)),
            "open" => return Ok(Expr::Price(PriceField::Open)),
            "high" => return Ok(Expr::Price(PriceField::High)),
            "low" => return Ok(Expr::Price(PriceField::Low)),
            "volume" => return Ok(Expr::Price(PriceField::Volume)),
            "entry_price" => return Ok(Expr::EntryPrice),
            _ => {}
        }

        // Remaining identifiers must be indicators. obv/vwap take no
        // parameters and may be written without parentheses.
        self.skip_whitespace();
        let args = if self.peek() == Some('(') {
            self.advance();
            self.parse_args()?
        } else if matches!(lower.as_str(), "obv" | "vwap") {
            Vec::new()
        } else if is_indicator_name(&lower) {
            return Err(CompileError::Syntax {
                message: format!("indicator '{}' requires parentheses", lower),
                position: word_pos,
            });
        } else {
            return Err(CompileError::UnknownReference {
                name: word,
                position: word_pos,
            });
        };

        let ind_ref = make_indicator(&lower, &args, word_pos)?;
        Ok(Expr::Indicator(ind_ref))
    }

    fn parse_args(&mut self) -> Result<Vec<f64>, CompileError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_number()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(')') => {
                    self.advance();
                    return Ok(args);
                }
                Some(ch) => {
                    return Err(self.syntax(format!("expected ',' or ')', found '{}'", ch)));
                }
                None => return Err(self.syntax("expected ')', found end of input")),
            }
        }
    }

    fn parse(&mut self) -> Result<Rule, CompileError> {
        let rule = self.parse_or_expr()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.syntax(format!(
                "unexpected input after rule: '{}'",
                self.remaining()
            )));
        }
        Ok(rule)
    }
}

fn is_indicator_name(name: &str) -> bool {
    matches!(
        name,
        "sma"
            | "ema"
            | "wma"
            | "rsi"
            | "stoch_k"
            | "stoch_d"
            | "williams_r"
            | "macd"
            | "macd_signal"
            | "macd_hist"
            | "adx"
            | "bb_upper"
            | "bb_middle"
            | "bb_lower"
            | "atr"
            | "obv"
            | "vwap"
            | "roc"
            | "cci"
            | "momentum"
    )
}

fn int_param(args: &[f64], index: usize, name: &str, pos: usize) -> Result<usize, CompileError> {
    let v = args[index];
    if v.fract() != 0.0 || v < 1.0 {
        return Err(CompileError::Syntax {
            message: format!("'{}' parameter {} must be a positive integer", name, index + 1),
            position: pos,
        });
    }
    Ok(v as usize)
}

fn arity_error(name: &str, expected: &str, got: usize, pos: usize) -> CompileError {
    CompileError::Syntax {
        message: format!("'{}' expects {} parameters, got {}", name, expected, got),
        position: pos,
    }
}

/// Resolve an indicator call to a typed reference, applying the
/// conventional default parameters when the call site omits them.
fn make_indicator(name: &str, args: &[f64], pos: usize) -> Result<IndicatorRef, CompileError> {
    let simple = |indicator_type| IndicatorRef {
        indicator_type,
        field: IndicatorField::Value,
    };

    let one_period =
        |args: &[f64], default: Option<usize>, name: &str| -> Result<usize, CompileError> {
            match (args.len(), default) {
                (1, _) => int_param(args, 0, name, pos),
                (0, Some(d)) => Ok(d),
                (n, Some(_)) => Err(arity_error(name, "0 or 1", n, pos)),
                (n, None) => Err(arity_error(name, "1", n, pos)),
            }
        };

    let stoch_params = |args: &[f64], name: &str| -> Result<(usize, usize), CompileError> {
        match args.len() {
            0 => Ok((14, 3)),
            2 => Ok((int_param(args, 0, name, pos)?, int_param(args, 1, name, pos)?)),
            n => Err(arity_error(name, "0 or 2", n, pos)),
        }
    };

    let macd_params = |args: &[f64], name: &str| -> Result<(usize, usize, usize), CompileError> {
        match args.len() {
            0 => Ok((12, 26, 9)),
            3 => Ok((
                int_param(args, 0, name, pos)?,
                int_param(args, 1, name, pos)?,
                int_param(args, 2, name, pos)?,
            )),
            n => Err(arity_error(name, "0 or 3", n, pos)),
        }
    };

    let bollinger_params = |args: &[f64], name: &str| -> Result<(usize, u32), CompileError> {
        let (period, mult) = match args.len() {
            0 => (20, 2.0),
            1 => (int_param(args, 0, name, pos)?, 2.0),
            2 => {
                let mult = args[1];
                if mult <= 0.0 {
                    return Err(CompileError::Syntax {
                        message: format!("'{}' multiplier must be positive", name),
                        position: pos,
                    });
                }
                (int_param(args, 0, name, pos)?, mult)
            }
            n => return Err(arity_error(name, "0 to 2", n, pos)),
        };
        Ok((period, (mult * 100.0).round() as u32))
    };

    match name {
        "sma" => Ok(simple(IndicatorType::Sma(one_period(args, None, name)?))),
        "ema" => Ok(simple(IndicatorType::Ema(one_period(args, None, name)?))),
        "wma" => Ok(simple(IndicatorType::Wma(one_period(args, None, name)?))),
        "rsi" => Ok(simple(IndicatorType::Rsi(one_period(args, Some(14), name)?))),
        "atr" => Ok(simple(IndicatorType::Atr(one_period(args, Some(14), name)?))),
        "adx" => Ok(simple(IndicatorType::Adx(one_period(args, Some(14), name)?))),
        "williams_r" => Ok(simple(IndicatorType::WilliamsR(one_period(
            args,
            Some(14),
            name,
        )?))),
        "roc" => Ok(simple(IndicatorType::Roc(one_period(args, Some(12), name)?))),
        "cci" => Ok(simple(IndicatorType::Cci(one_period(args, Some(20), name)?))),
        "momentum" => Ok(simple(IndicatorType::Momentum(one_period(
            args,
            Some(10),
            name,
        )?))),
        "obv" => {
            if !args.is_empty() {
                return Err(arity_error(name, "0", args.len(), pos));
            }
            Ok(simple(IndicatorType::Obv))
        }
        "vwap" => {
            if !args.is_empty() {
                return Err(arity_error(name, "0", args.len(), pos));
            }
            Ok(simple(IndicatorType::Vwap))
        }
        "stoch_k" | "stoch_d" => {
            let (k_period, d_period) = stoch_params(args, name)?;
            Ok(IndicatorRef {
                indicator_type: IndicatorType::Stochastic { k_period, d_period },
                field: if name == "stoch_k" {
                    IndicatorField::StochasticK
                } else {
                    IndicatorField::StochasticD
                },
            })
        }
        "macd" | "macd_signal" | "macd_hist" => {
            let (fast, slow, signal) = macd_params(args, name)?;
            Ok(IndicatorRef {
                indicator_type: IndicatorType::Macd { fast, slow, signal },
                field: match name {
                    "macd" => IndicatorField::MacdLine,
                    "macd_signal" => IndicatorField::MacdSignal,
                    _ => IndicatorField::MacdHistogram,
                },
            })
        }
        "bb_upper" | "bb_middle" | "bb_lower" => {
            let (period, stddev_mult_x100) = bollinger_params(args, name)?;
            Ok(IndicatorRef {
                indicator_type: IndicatorType::Bollinger {
                    period,
                    stddev_mult_x100,
                },
                field: match name {
                    "bb_upper" => IndicatorField::BollingerUpper,
                    "bb_middle" => IndicatorField::BollingerMiddle,
                    _ => IndicatorField::BollingerLower,
                },
            })
        }
        _ => Err(CompileError::Syntax {
            message: format!("unknown indicator '{}'", name),
            position: pos,
        }),
    }
}

/// Compile rule text into an AST. Compilation happens once per strategy per
/// run; the result is reused for every bar and every code.
pub fn compile(input: &str) -> Result<Rule, CompileError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
