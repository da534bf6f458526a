//! A total, side-effect-free boolean expression language over a JSON-like
//! context: comparisons, membership, boolean ops, literals, attribute
//! access, subscripting, and name references. No calls, no imports, no
//! assignment, no arithmetic beyond comparison — the compiler rejects
//! anything outside that grammar rather than trying to sandbox it at
//! evaluation time.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use serde_json::Value;
use supervision_common::error::{Result, SupervisionError};

/// A compiled condition. Immutable once built; safe to share across threads
/// and across rules via the LRU cache in `PolicyEngine`.
#[derive(Debug, Clone)]
pub enum Node {
    Literal(Value),
    Name(String),
    Attr(Box<Node>, String),
    Subscript(Box<Node>, Box<Node>),
    ListLiteral(Vec<Node>),
    Compare(Box<Node>, CompareOp, Box<Node>),
    Membership { needle: Box<Node>, haystack: Box<Node>, negate: bool },
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// Parse `source` into a `Node`, rejecting anything outside the supported
/// grammar. This is the only place that touches the raw source string; the
/// result is what gets cached.
pub fn compile(source: &str) -> Result<Node> {
    let mut parser = Parser::new(source);
    let node = parser.parse_or()?;
    parser.skip_ws();
    if parser.chars.peek().is_some() {
        return Err(SupervisionError::PolicyInvalidCondition(format!(
            "unexpected trailing input in condition: {source}"
        )));
    }
    Ok(node)
}

/// Evaluate a compiled condition against `ctx`. A missing attribute or name
/// evaluates to `Value::Null`; comparisons against `null` are false except
/// `== null` / `!= null`.
pub fn evaluate(node: &Node, ctx: &Value) -> bool {
    matches!(eval_value(node, ctx), Value::Bool(true))
}

fn eval_value(node: &Node, ctx: &Value) -> Value {
    match node {
        Node::Literal(v) => v.clone(),
        Node::Name(name) => ctx.get(name).cloned().unwrap_or(Value::Null),
        Node::Attr(base, field) => {
            let base_val = eval_value(base, ctx);
            base_val.get(field).cloned().unwrap_or(Value::Null)
        }
        Node::Subscript(base, index) => {
            let base_val = eval_value(base, ctx);
            let index_val = eval_value(index, ctx);
            match index_val {
                Value::String(key) => base_val.get(&key).cloned().unwrap_or(Value::Null),
                Value::Number(n) => n
                    .as_u64()
                    .and_then(|i| base_val.get(i as usize))
                    .cloned()
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            }
        }
        Node::ListLiteral(items) => {
            Value::Array(items.iter().map(|n| eval_value(n, ctx)).collect())
        }
        Node::Compare(lhs, op, rhs) => {
            let l = eval_value(lhs, ctx);
            let r = eval_value(rhs, ctx);
            Value::Bool(compare(&l, *op, &r))
        }
        Node::Membership { needle, haystack, negate } => {
            let needle_val = eval_value(needle, ctx);
            let haystack_val = eval_value(haystack, ctx);
            let found = match &haystack_val {
                Value::Array(items) => items.contains(&needle_val),
                Value::String(s) => match &needle_val {
                    Value::String(n) => s.contains(n.as_str()),
                    _ => false,
                },
                Value::Object(map) => match &needle_val {
                    Value::String(n) => map.contains_key(n),
                    _ => false,
                },
                _ => false,
            };
            Value::Bool(found != *negate)
        }
        Node::And(lhs, rhs) => {
            Value::Bool(evaluate(lhs, ctx) && evaluate(rhs, ctx))
        }
        Node::Or(lhs, rhs) => Value::Bool(evaluate(lhs, ctx) || evaluate(rhs, ctx)),
        Node::Not(inner) => Value::Bool(!evaluate(inner, ctx)),
    }
}

fn compare(l: &Value, op: CompareOp, r: &Value) -> bool {
    if l.is_null() || r.is_null() {
        return match op {
            CompareOp::Eq => l.is_null() && r.is_null(),
            CompareOp::Ne => !(l.is_null() && r.is_null()),
            _ => false,
        };
    }
    match op {
        CompareOp::Eq => l == r,
        CompareOp::Ne => l != r,
        CompareOp::Lt | CompareOp::Gt | CompareOp::Le | CompareOp::Ge => {
            let ordering = match (as_f64(l), as_f64(r)) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => match (l.as_str(), r.as_str()) {
                    (Some(a), Some(b)) => Some(a.cmp(b)),
                    _ => None,
                },
            };
            match (ordering, op) {
                (Some(std::cmp::Ordering::Less), CompareOp::Lt) => true,
                (Some(std::cmp::Ordering::Greater), CompareOp::Gt) => true,
                (Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal), CompareOp::Le) => true,
                (Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal), CompareOp::Ge) => true,
                _ => false,
            }
        }
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    rest: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self { chars: source.chars().peekable(), rest: source, pos: 0 }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(ch) = c {
            self.pos += ch.len_utf8();
        }
        c
    }

    fn peek_str(&self) -> &'a str {
        &self.rest[self.pos..]
    }

    fn try_consume(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.peek_str().starts_with(token) {
            let is_word = token.chars().next().map(|c| c.is_alphabetic()).unwrap_or(false);
            if is_word {
                let after = &self.peek_str()[token.len()..];
                if after.chars().next().map(|c| c.is_alphanumeric() || c == '_').unwrap_or(false) {
                    return false;
                }
            }
            for _ in 0..token.chars().count() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut node = self.parse_and()?;
        loop {
            if self.try_consume("or") {
                let rhs = self.parse_and()?;
                node = Node::Or(Box::new(node), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut node = self.parse_not()?;
        loop {
            if self.try_consume("and") {
                let rhs = self.parse_not()?;
                node = Node::And(Box::new(node), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_not(&mut self) -> Result<Node> {
        if self.try_consume("not") {
            let inner = self.parse_not()?;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node> {
        let lhs = self.parse_primary()?;
        self.skip_ws();

        if self.try_consume("not") {
            if !self.try_consume("in") {
                return Err(SupervisionError::PolicyInvalidCondition(
                    "expected 'in' after 'not'".to_string(),
                ));
            }
            let rhs = self.parse_primary()?;
            return Ok(Node::Membership { needle: Box::new(lhs), haystack: Box::new(rhs), negate: true });
        }
        if self.try_consume("in") {
            let rhs = self.parse_primary()?;
            return Ok(Node::Membership { needle: Box::new(lhs), haystack: Box::new(rhs), negate: false });
        }

        for (token, op) in [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ] {
            if self.try_consume(token) {
                let rhs = self.parse_primary()?;
                return Ok(Node::Compare(Box::new(lhs), op, Box::new(rhs)));
            }
        }

        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        self.skip_ws();
        if self.try_consume("(") {
            let inner = self.parse_or()?;
            self.skip_ws();
            if !self.try_consume(")") {
                return Err(SupervisionError::PolicyInvalidCondition(
                    "unclosed '('".to_string(),
                ));
            }
            return self.parse_postfix(inner);
        }
        if self.try_consume("[") {
            let mut items = Vec::new();
            self.skip_ws();
            if !self.peek_str().starts_with(']') {
                loop {
                    items.push(self.parse_primary()?);
                    self.skip_ws();
                    if self.try_consume(",") {
                        continue;
                    }
                    break;
                }
            }
            self.skip_ws();
            if !self.try_consume("]") {
                return Err(SupervisionError::PolicyInvalidCondition(
                    "unclosed '['".to_string(),
                ));
            }
            return Ok(Node::ListLiteral(items));
        }
        if self.try_consume("true") {
            return Ok(Node::Literal(Value::Bool(true)));
        }
        if self.try_consume("false") {
            return Ok(Node::Literal(Value::Bool(false)));
        }
        if self.try_consume("null") || self.try_consume("None") {
            return Ok(Node::Literal(Value::Null));
        }
        if let Some(&c) = self.chars.peek() {
            if c == '"' || c == '\'' {
                return self.parse_string();
            }
            if c.is_ascii_digit() || c == '-' {
                return self.parse_number();
            }
            if c.is_alphabetic() || c == '_' {
                return self.parse_name();
            }
        }
        Err(SupervisionError::PolicyInvalidCondition(format!(
            "unexpected token at offset {}",
            self.pos
        )))
    }

    fn parse_postfix(&mut self, mut node: Node) -> Result<Node> {
        loop {
            if self.peek_str().starts_with('.') {
                self.advance();
                let field = self.parse_identifier()?;
                node = Node::Attr(Box::new(node), field);
                continue;
            }
            if self.peek_str().starts_with('[') {
                self.advance();
                let index = self.parse_primary()?;
                self.skip_ws();
                if !self.try_consume("]") {
                    return Err(SupervisionError::PolicyInvalidCondition(
                        "unclosed '['".to_string(),
                    ));
                }
                node = Node::Subscript(Box::new(node), Box::new(index));
                continue;
            }
            break;
        }
        Ok(node)
    }

    fn parse_name(&mut self) -> Result<Node> {
        let ident = self.parse_identifier()?;
        self.parse_postfix(Node::Name(ident))
    }

    fn parse_identifier(&mut self) -> Result<String> {
        let mut ident = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(SupervisionError::PolicyInvalidCondition(format!(
                "expected identifier at offset {}",
                self.pos
            )));
        }
        Ok(ident)
    }

    fn parse_string(&mut self) -> Result<Node> {
        let quote = self.advance().expect("caller checked quote present");
        let mut s = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => break,
                Some(c) => s.push(c),
                None => {
                    return Err(SupervisionError::PolicyInvalidCondition(
                        "unterminated string literal".to_string(),
                    ))
                }
            }
        }
        Ok(Node::Literal(Value::String(s)))
    }

    fn parse_number(&mut self) -> Result<Node> {
        let mut s = String::new();
        if self.peek_str().starts_with('-') {
            s.push('-');
            self.advance();
        }
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                s.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let n: f64 = s.parse().map_err(|_| {
            SupervisionError::PolicyInvalidCondition(format!("invalid number literal: {s}"))
        })?;
        Ok(Node::Literal(serde_json::json!(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiles_and_evaluates_comparison() {
        let node = compile("request.amount > 100").unwrap();
        assert!(evaluate(&node, &json!({"request": {"amount": 150}})));
        assert!(!evaluate(&node, &json!({"request": {"amount": 50}})));
    }

    #[test]
    fn missing_attribute_is_null_and_compares_false() {
        let node = compile("agent.region == \"us-east\"").unwrap();
        assert!(!evaluate(&node, &json!({"agent": {}})));
    }

    #[test]
    fn null_equality_is_special_cased() {
        let node = compile("agent.region == null").unwrap();
        assert!(evaluate(&node, &json!({"agent": {}})));
    }

    #[test]
    fn boolean_composition_and_membership() {
        let node = compile("agent.tier in [\"gold\", \"platinum\"] and not request.blocked").unwrap();
        assert!(evaluate(
            &node,
            &json!({"agent": {"tier": "gold"}, "request": {"blocked": false}})
        ));
        assert!(!evaluate(
            &node,
            &json!({"agent": {"tier": "bronze"}, "request": {"blocked": false}})
        ));
    }

    #[test]
    fn rejects_function_calls() {
        assert!(compile("eval('1+1')").is_err());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(compile("true true").is_err());
    }
}
