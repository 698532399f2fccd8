//! Parser for the `_xpath_query` filter expressions.
//!
//! Supports comparisons of case properties against quoted or numeric
//! literals, combined with `and`, `or`, `not(...)` and parentheses.

use casewell_core::{AppError, AppResult};
use casewell_domain::search_query::{
    case_property_exact, case_property_missing, case_property_range,
};
use casewell_domain::{PATH_SEPARATOR, RangeBounds, RangeKind, SearchClause, XPATH_QUERY_KEY};
use chrono::NaiveDate;
use serde_json::{Number, Value};

/// Deepest nesting of parentheses and `not(...)` accepted in one expression.
const MAX_EXPRESSION_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Operator(Operator),
    OpenParen,
    CloseParen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Text(String),
    Number(String),
}

impl Literal {
    fn as_str(&self) -> &str {
        match self {
            Self::Text(value) | Self::Number(value) => value.as_str(),
        }
    }
}

/// Compiles a query expression into a search clause.
pub(crate) fn parse_expression(input: &str) -> AppResult<SearchClause> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
    };
    let clause = parser.parse_or()?;

    if let Some(token) = parser.peek() {
        return Err(invalid(format!("unexpected {token:?} in '{input}'")));
    }

    Ok(clause)
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::invalid_filter(XPATH_QUERY_KEY, message)
}

fn tokenize(input: &str) -> AppResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&current) = chars.peek() {
        match current {
            _ if current.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::OpenParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::CloseParen);
            }
            '\'' | '"' => {
                chars.next();
                let mut literal = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == current {
                        closed = true;
                        break;
                    }
                    literal.push(next);
                }
                if !closed {
                    return Err(invalid(format!("unterminated string literal in '{input}'")));
                }
                tokens.push(Token::Quoted(literal));
            }
            '=' => {
                chars.next();
                tokens.push(Token::Operator(Operator::Eq));
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(invalid(format!("expected '!=' in '{input}'")));
                }
                tokens.push(Token::Operator(Operator::NotEq));
            }
            '<' | '>' => {
                chars.next();
                let inclusive = chars.next_if_eq(&'=').is_some();
                let operator = match (current, inclusive) {
                    ('<', false) => Operator::Lt,
                    ('<', true) => Operator::Lte,
                    ('>', false) => Operator::Gt,
                    _ => Operator::Gte,
                };
                tokens.push(Token::Operator(operator));
            }
            _ => {
                let mut word = String::new();
                while let Some(next) = chars.next_if(|next| is_word_char(*next)) {
                    word.push(next);
                }
                if word.is_empty() {
                    return Err(invalid(format!(
                        "unexpected character '{current}' in '{input}'"
                    )));
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}

fn is_word_char(value: char) -> bool {
    value.is_alphanumeric() || matches!(value, '_' | '-' | '.' | '@' | '/' | ':')
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn next_is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn expect(&mut self, expected: &Token) -> AppResult<()> {
        match self.next() {
            Some(token) if &token == expected => Ok(()),
            Some(token) => Err(invalid(format!("expected {expected:?}, found {token:?}"))),
            None => Err(invalid(format!(
                "expected {expected:?}, found end of expression"
            ))),
        }
    }

    fn parse_or(&mut self) -> AppResult<SearchClause> {
        let mut clauses = vec![self.parse_and()?];
        while self.next_is_keyword("or") {
            self.position += 1;
            clauses.push(self.parse_and()?);
        }

        Ok(collapse(clauses, SearchClause::or))
    }

    fn parse_and(&mut self) -> AppResult<SearchClause> {
        let mut clauses = vec![self.parse_unary()?];
        while self.next_is_keyword("and") {
            self.position += 1;
            clauses.push(self.parse_unary()?);
        }

        Ok(collapse(clauses, SearchClause::and))
    }

    fn parse_unary(&mut self) -> AppResult<SearchClause> {
        if self.next_is_keyword("not")
            && matches!(self.tokens.get(self.position + 1), Some(Token::OpenParen))
        {
            self.position += 2;
            let inner = self.parse_group()?;
            return Ok(SearchClause::not(inner));
        }

        if matches!(self.peek(), Some(Token::OpenParen)) {
            self.position += 1;
            return self.parse_group();
        }

        self.parse_comparison()
    }

    fn parse_group(&mut self) -> AppResult<SearchClause> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return Err(invalid(format!(
                "expression nests deeper than {MAX_EXPRESSION_DEPTH} levels"
            )));
        }

        self.depth += 1;
        let inner = self.parse_or()?;
        self.expect(&Token::CloseParen)?;
        self.depth -= 1;
        Ok(inner)
    }

    fn parse_comparison(&mut self) -> AppResult<SearchClause> {
        let property = match self.next() {
            Some(Token::Word(word)) => word,
            Some(token) => return Err(invalid(format!("expected a property, found {token:?}"))),
            None => return Err(invalid("expected a property, found end of expression")),
        };
        if property.contains(PATH_SEPARATOR) {
            return Err(invalid(format!(
                "property paths such as '{property}' are not supported in query expressions"
            )));
        }

        let operator = match self.next() {
            Some(Token::Operator(operator)) => operator,
            Some(token) => {
                return Err(invalid(format!(
                    "expected a comparison after '{property}', found {token:?}"
                )));
            }
            None => {
                return Err(invalid(format!(
                    "expected a comparison after '{property}'"
                )));
            }
        };

        let literal = match self.next() {
            Some(Token::Quoted(value)) => Literal::Text(value),
            Some(Token::Word(word)) if is_numeric_literal(&word) => Literal::Number(word),
            Some(token) => {
                return Err(invalid(format!(
                    "expected a quoted or numeric literal for '{property}', found {token:?}"
                )));
            }
            None => {
                return Err(invalid(format!(
                    "expected a literal for '{property}'"
                )));
            }
        };

        comparison_clause(&property, operator, &literal)
    }
}

fn collapse(
    mut clauses: Vec<SearchClause>,
    combine: fn(Vec<SearchClause>) -> SearchClause,
) -> SearchClause {
    if clauses.len() == 1
        && let Some(clause) = clauses.pop()
    {
        return clause;
    }
    combine(clauses)
}

fn comparison_clause(
    property: &str,
    operator: Operator,
    literal: &Literal,
) -> AppResult<SearchClause> {
    let value = literal.as_str();
    match operator {
        Operator::Eq if value.is_empty() => Ok(case_property_missing(property)),
        Operator::Eq => Ok(case_property_exact(property, value)),
        Operator::NotEq if value.is_empty() => {
            Ok(SearchClause::not(case_property_missing(property)))
        }
        Operator::NotEq => Ok(SearchClause::not(case_property_exact(property, value))),
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            let (kind, bound) = range_bound(property, literal)?;
            let mut bounds = RangeBounds::default();
            match operator {
                Operator::Lt => bounds.lt = Some(bound),
                Operator::Lte => bounds.lte = Some(bound),
                Operator::Gt => bounds.gt = Some(bound),
                _ => bounds.gte = Some(bound),
            }
            Ok(case_property_range(property, kind, bounds))
        }
    }
}

fn range_bound(property: &str, literal: &Literal) -> AppResult<(RangeKind, Value)> {
    let value = literal.as_str();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok((RangeKind::Date, Value::String(date.to_string())));
    }

    if let Ok(integer) = value.parse::<i64>() {
        return Ok((RangeKind::Numeric, Value::from(integer)));
    }

    if let Some(number) = is_numeric_literal(value)
        .then(|| value.parse::<f64>().ok())
        .flatten()
        .and_then(Number::from_f64)
    {
        return Ok((RangeKind::Numeric, Value::Number(number)));
    }

    Err(invalid(format!(
        "'{value}' compared with '{property}' is neither a date nor a number"
    )))
}

/// Plain decimal notation: optional sign, digits, optional fraction.
fn is_numeric_literal(word: &str) -> bool {
    let unsigned = word.strip_prefix('-').unwrap_or(word);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };

    !whole.is_empty()
        && whole.chars().all(|value| value.is_ascii_digit())
        && fraction.is_none_or(|fraction| {
            !fraction.is_empty() && fraction.chars().all(|value| value.is_ascii_digit())
        })
}
