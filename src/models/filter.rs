//! Filter Expression Model
//!
//! Callers select the seed entities with a parenthesized query string in the
//! remote store's grammar, e.g. `( ObjectID > 0 )` or
//! `(( Name = "Archive" ) OR ( State != Closed ))`. This module models those
//! expressions explicitly:
//!
//! - [`FilterExpression::parse`] — recursive-descent parser; a malformed
//!   filter is reported before any fetch is issued
//! - `Display` — canonical parenthesized rendering, the form handed to a
//!   gateway implementation
//! - [`FilterExpression::any_of`] — OR-fold builder for batched
//!   "any of these identities" lookups
//! - [`FilterExpression::matches`] — evaluator over entity fields with
//!   dotted-path support (`TestCase.ObjectID`), used by the in-memory
//!   gateway
//!
//! The expression tree is pure data; the gateway decides how to transport
//! it.

use crate::models::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing a filter string
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("unexpected end of filter expression")]
    UnexpectedEnd,

    #[error("unexpected token '{0}' in filter expression")]
    UnexpectedToken(String),

    #[error("unknown comparison operator '{0}'")]
    UnknownOperator(String),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("trailing input after filter expression: '{0}'")]
    TrailingInput(String),

    #[error("filter expression is empty")]
    Empty,
}

/// Comparison operator for filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterThanOrEqual,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "lte")]
    LessThanOrEqual,
    Contains,
}

impl FilterOperator {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Equals),
            "!=" => Some(Self::NotEquals),
            ">" => Some(Self::GreaterThan),
            ">=" => Some(Self::GreaterThanOrEqual),
            "<" => Some(Self::LessThan),
            "<=" => Some(Self::LessThanOrEqual),
            _ if token.eq_ignore_ascii_case("contains") => Some(Self::Contains),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "!=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Contains => "contains",
        }
    }
}

/// A parsed filter expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterExpression {
    Comparison {
        property: String,
        operator: FilterOperator,
        value: Value,
    },
    And(Box<FilterExpression>, Box<FilterExpression>),
    Or(Box<FilterExpression>, Box<FilterExpression>),
}

impl FilterExpression {
    /// Build a single comparison clause.
    pub fn comparison(
        property: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self::Comparison {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }

    /// Shorthand for an equality clause.
    pub fn equals(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(property, FilterOperator::Equals, value)
    }

    /// OR-fold an identity list into one expression, the shape used for
    /// batched reverse-association and ancestor lookups.
    ///
    /// Callers never pass an empty list; the traversal engine skips empty
    /// batches before building the filter.
    pub fn any_of(property: &str, ids: &[i64]) -> Self {
        debug_assert!(!ids.is_empty(), "empty identity batch");
        let mut expression = Self::equals(property, ids[0]);
        for id in &ids[1..] {
            expression = Self::Or(
                Box::new(expression),
                Box::new(Self::equals(property, *id)),
            );
        }
        expression
    }

    /// Parse a query string in the remote store's parenthesized grammar.
    pub fn parse(input: &str) -> Result<Self, FilterParseError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(FilterParseError::Empty);
        }
        let mut parser = Parser { tokens, position: 0 };
        let expression = parser.expression()?;
        match parser.peek() {
            None => Ok(expression),
            Some(token) => Err(FilterParseError::TrailingInput(token.to_string())),
        }
    }

    /// Evaluate the expression against one entity's fields.
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Self::And(left, right) => left.matches(entity) && right.matches(entity),
            Self::Or(left, right) => left.matches(entity) || right.matches(entity),
            Self::Comparison {
                property,
                operator,
                value,
            } => compare(entity.field_path(property).as_ref(), *operator, value),
        }
    }
}

fn compare(actual: Option<&Value>, operator: FilterOperator, expected: &Value) -> bool {
    match operator {
        FilterOperator::Equals => actual == Some(expected),
        FilterOperator::NotEquals => actual != Some(expected),
        FilterOperator::Contains => match (actual.and_then(Value::as_str), expected.as_str()) {
            (Some(actual), Some(expected)) => actual.contains(expected),
            _ => false,
        },
        // Ordering operators are numeric; non-numeric operands never match
        _ => match (actual.and_then(Value::as_f64), expected.as_f64()) {
            (Some(actual), Some(expected)) => match operator {
                FilterOperator::GreaterThan => actual > expected,
                FilterOperator::GreaterThanOrEqual => actual >= expected,
                FilterOperator::LessThan => actual < expected,
                FilterOperator::LessThanOrEqual => actual <= expected,
                _ => unreachable!(),
            },
            _ => false,
        },
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparison {
                property,
                operator,
                value,
            } => {
                let rendered = match value {
                    Value::String(text) => format!("\"{}\"", text),
                    other => other.to_string(),
                };
                write!(f, "({} {} {})", property, operator.as_str(), rendered)
            }
            Self::And(left, right) => write!(f, "({} AND {})", left, right),
            Self::Or(left, right) => write!(f, "({} OR {})", left, right),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Word(String),
    Quoted(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
            Token::Word(word) => f.write_str(word),
            Token::Quoted(text) => write!(f, "\"{}\"", text),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(other) => text.push(other),
                        None => return Err(FilterParseError::UnterminatedString),
                    }
                }
                tokens.push(Token::Quoted(text));
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Result<Token, FilterParseError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(FilterParseError::UnexpectedEnd)?;
        self.position += 1;
        Ok(token)
    }

    fn expect_close(&mut self) -> Result<(), FilterParseError> {
        match self.next()? {
            Token::Close => Ok(()),
            other => Err(FilterParseError::UnexpectedToken(other.to_string())),
        }
    }

    /// expression := '(' body ')' | comparison
    /// body       := expression (AND|OR expression)* | property op value
    fn expression(&mut self) -> Result<FilterExpression, FilterParseError> {
        match self.next()? {
            Token::Open => {
                let inner = if matches!(self.peek(), Some(Token::Open)) {
                    // compound: nested expressions joined by AND/OR
                    let mut expression = self.expression()?;
                    while let Some(Token::Word(word)) = self.peek() {
                        let connective = word.clone();
                        self.position += 1;
                        let right = self.expression()?;
                        expression = if connective.eq_ignore_ascii_case("and") {
                            FilterExpression::And(Box::new(expression), Box::new(right))
                        } else if connective.eq_ignore_ascii_case("or") {
                            FilterExpression::Or(Box::new(expression), Box::new(right))
                        } else {
                            return Err(FilterParseError::UnexpectedToken(connective));
                        };
                    }
                    expression
                } else {
                    self.comparison()?
                };
                self.expect_close()?;
                Ok(inner)
            }
            other => Err(FilterParseError::UnexpectedToken(other.to_string())),
        }
    }

    fn comparison(&mut self) -> Result<FilterExpression, FilterParseError> {
        let property = match self.next()? {
            Token::Word(word) => word,
            other => return Err(FilterParseError::UnexpectedToken(other.to_string())),
        };
        let operator = match self.next()? {
            Token::Word(word) => FilterOperator::parse(&word)
                .ok_or(FilterParseError::UnknownOperator(word))?,
            other => return Err(FilterParseError::UnexpectedToken(other.to_string())),
        };
        let value = match self.next()? {
            Token::Quoted(text) => Value::String(text),
            Token::Word(word) => literal_value(&word),
            other => return Err(FilterParseError::UnexpectedToken(other.to_string())),
        };
        Ok(FilterExpression::Comparison {
            property,
            operator,
            value,
        })
    }
}

fn literal_value(word: &str) -> Value {
    if let Ok(number) = word.parse::<i64>() {
        return Value::from(number);
    }
    if let Ok(number) = word.parse::<f64>() {
        return Value::from(number);
    }
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entity;
    use serde_json::json;

    #[test]
    fn parses_simple_comparison() {
        let expression = FilterExpression::parse("( ObjectID > 0 )").unwrap();
        assert_eq!(
            expression,
            FilterExpression::comparison("ObjectID", FilterOperator::GreaterThan, 0)
        );
    }

    #[test]
    fn parses_quoted_values_and_compounds() {
        let expression =
            FilterExpression::parse("(( Name = \"Archive\" ) OR ( State != Closed ))").unwrap();
        assert_eq!(
            expression,
            FilterExpression::Or(
                Box::new(FilterExpression::equals("Name", "Archive")),
                Box::new(FilterExpression::comparison(
                    "State",
                    FilterOperator::NotEquals,
                    "Closed"
                )),
            )
        );
    }

    #[test]
    fn rejects_malformed_filters() {
        assert_eq!(
            FilterExpression::parse(""),
            Err(FilterParseError::Empty)
        );
        assert_eq!(
            FilterExpression::parse("( ObjectID > )"),
            Err(FilterParseError::UnexpectedToken(")".to_string()))
        );
        assert_eq!(
            FilterExpression::parse("( ObjectID ~ 3 )"),
            Err(FilterParseError::UnknownOperator("~".to_string()))
        );
        assert_eq!(
            FilterExpression::parse("( Name = \"Archive )"),
            Err(FilterParseError::UnterminatedString)
        );
        assert_eq!(
            FilterExpression::parse("( ObjectID > 0 ) junk"),
            Err(FilterParseError::TrailingInput("junk".to_string()))
        );
    }

    #[test]
    fn display_renders_canonical_form_that_reparses() {
        let expression =
            FilterExpression::parse("(( ObjectID > 0 ) AND ( Name = \"Top\" ))").unwrap();
        let rendered = expression.to_string();
        assert_eq!(rendered, "((ObjectID > 0) AND (Name = \"Top\"))");
        assert_eq!(FilterExpression::parse(&rendered).unwrap(), expression);
    }

    #[test]
    fn any_of_folds_ids_into_or_chain() {
        let expression = FilterExpression::any_of("TestCase.ObjectID", &[1, 2, 3]);
        let folder = Entity::new("defect", 9, "D")
            .with_field("TestCase", json!({"_type": "testcase", "ObjectID": 2}));
        assert!(expression.matches(&folder));
        let other = Entity::new("defect", 10, "D")
            .with_field("TestCase", json!({"_type": "testcase", "ObjectID": 4}));
        assert!(!expression.matches(&other));
    }

    #[test]
    fn evaluator_compares_numbers_strings_and_dotted_paths() {
        let case = Entity::new("testcase", 512, "TC")
            .with_field("LastVerdict", json!("Pass"))
            .with_field("TestFolder", json!({"_type": "testfolder", "ObjectID": 40}));

        assert!(FilterExpression::parse("( ObjectID > 0 )").unwrap().matches(&case));
        assert!(FilterExpression::parse("( LastVerdict = \"Pass\" )").unwrap().matches(&case));
        assert!(FilterExpression::parse("( TestFolder.ObjectID = 40 )").unwrap().matches(&case));
        assert!(FilterExpression::parse("( Name contains \"T\" )").unwrap().matches(&case));
        assert!(!FilterExpression::parse("( LastVerdict = \"Fail\" )").unwrap().matches(&case));
        // missing field never satisfies a comparison
        assert!(!FilterExpression::parse("( State = \"Open\" )").unwrap().matches(&case));
    }
}
