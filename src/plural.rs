//! Plural-Forms expression compiler and evaluator
//!
//! Gettext catalogs declare their plural selection logic in the
//! `Plural-Forms` header as a C-like expression over the variable `n`,
//! for example `nplurals=3; plural=(n%10==1 && n%100!=11 ? 0 : ...)`.
//! This module compiles such expressions into an immutable AST and
//! evaluates them per lookup. The grammar is closed: integer literals,
//! `n`, `%`, comparisons, `&&`/`||`/`!`, and the ternary operator with
//! C precedence. Nothing outside that set compiles, so untrusted
//! catalog headers can never smuggle in executable behavior.

use std::sync::Arc;

/// Errors from compiling a plural-forms expression or declaration.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
	#[error("invalid token {found:?} at byte {position}")]
	InvalidToken { position: usize, found: String },

	#[error("trailing input after expression at byte {position}")]
	TrailingInput { position: usize },

	#[error("unbalanced parentheses")]
	UnbalancedParens,

	#[error("unexpected token at byte {position}")]
	UnexpectedToken { position: usize },

	#[error("unexpected end of expression")]
	UnexpectedEnd,

	#[error("invalid Plural-Forms declaration: {0}")]
	InvalidPluralForms(String),
}

/// Errors from evaluating a compiled expression.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
	#[error("modulo by zero in plural expression")]
	DivisionByZero,

	#[error("plural index {index} out of range for nplurals={nplurals}")]
	IndexOutOfRange { index: u64, nplurals: usize },
}

/// Comparison operators of the plural-forms grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
}

/// Immutable expression tree over the variable `n`.
///
/// The grammar has no operator that can produce a negative value, so
/// evaluation runs entirely in `u64`. Boolean sub-results coerce to
/// `0`/`1` exactly as C's integer booleans do, which is what lets
/// ternary chains like `(n != 1)` serve directly as plural indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluralExpr {
	/// Integer literal.
	Literal(u64),
	/// The count variable `n`.
	Var,
	/// `lhs % rhs`.
	Mod(Box<PluralExpr>, Box<PluralExpr>),
	/// `lhs <op> rhs`, yielding 0 or 1.
	Compare(CmpOp, Box<PluralExpr>, Box<PluralExpr>),
	/// `lhs && rhs`, yielding 0 or 1.
	And(Box<PluralExpr>, Box<PluralExpr>),
	/// `lhs || rhs`, yielding 0 or 1.
	Or(Box<PluralExpr>, Box<PluralExpr>),
	/// `!expr`, yielding 0 or 1.
	Not(Box<PluralExpr>),
	/// `cond ? then : otherwise`.
	Ternary {
		cond: Box<PluralExpr>,
		then: Box<PluralExpr>,
		otherwise: Box<PluralExpr>,
	},
}

impl PluralExpr {
	/// Evaluate the expression for a given count.
	///
	/// Pure and re-entrant; a shared tree may be evaluated from any
	/// number of threads concurrently.
	pub fn evaluate(&self, n: u64) -> Result<u64, EvalError> {
		Ok(match self {
			Self::Literal(value) => *value,
			Self::Var => n,
			Self::Mod(lhs, rhs) => {
				let divisor = rhs.evaluate(n)?;
				if divisor == 0 {
					return Err(EvalError::DivisionByZero);
				}
				lhs.evaluate(n)? % divisor
			}
			Self::Compare(op, lhs, rhs) => {
				let lhs = lhs.evaluate(n)?;
				let rhs = rhs.evaluate(n)?;
				u64::from(match op {
					CmpOp::Eq => lhs == rhs,
					CmpOp::Ne => lhs != rhs,
					CmpOp::Lt => lhs < rhs,
					CmpOp::Le => lhs <= rhs,
					CmpOp::Gt => lhs > rhs,
					CmpOp::Ge => lhs >= rhs,
				})
			}
			Self::And(lhs, rhs) => u64::from(lhs.evaluate(n)? != 0 && rhs.evaluate(n)? != 0),
			Self::Or(lhs, rhs) => u64::from(lhs.evaluate(n)? != 0 || rhs.evaluate(n)? != 0),
			Self::Not(inner) => u64::from(inner.evaluate(n)? == 0),
			Self::Ternary { cond, then, otherwise } => {
				if cond.evaluate(n)? != 0 {
					then.evaluate(n)?
				} else {
					otherwise.evaluate(n)?
				}
			}
		})
	}
}

/// Compile a plural-forms expression into an AST.
///
/// The compiler is pure and performs no evaluation; it only ever
/// constructs nodes from the closed [`PluralExpr`] set.
///
/// # Examples
///
/// ```
/// use pomo::plural::compile;
///
/// let expr = compile("n != 1").unwrap();
/// assert_eq!(expr.evaluate(1).unwrap(), 0);
/// assert_eq!(expr.evaluate(4).unwrap(), 1);
/// ```
pub fn compile(src: &str) -> Result<PluralExpr, CompileError> {
	let tokens = tokenize(src)?;
	let mut parser = Parser { tokens, pos: 0 };
	let expr = parser.ternary()?;
	if let Some(lexed) = parser.tokens.get(parser.pos) {
		return Err(match lexed.token {
			Token::RParen => CompileError::UnbalancedParens,
			_ => CompileError::TrailingInput {
				position: lexed.position,
			},
		});
	}
	Ok(expr)
}

/// A plural rule: the plural-form count plus the compiled selection
/// expression from a `Plural-Forms` header.
///
/// # Examples
///
/// ```
/// use pomo::plural::PluralRule;
///
/// let rule = PluralRule::parse("nplurals=2; plural=(n != 1);").unwrap();
/// assert_eq!(rule.nplurals(), 2);
/// assert_eq!(rule.plural_index(1).unwrap(), 0);
/// assert_eq!(rule.plural_index(7).unwrap(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluralRule {
	nplurals: usize,
	expr: Arc<PluralExpr>,
}

impl Default for PluralRule {
	/// The universal two-form rule `nplurals=2; plural=(n != 1)`,
	/// gettext's behavior when a catalog declares no `Plural-Forms`.
	fn default() -> Self {
		Self {
			nplurals: 2,
			expr: Arc::new(PluralExpr::Compare(
				CmpOp::Ne,
				Box::new(PluralExpr::Var),
				Box::new(PluralExpr::Literal(1)),
			)),
		}
	}
}

impl PluralRule {
	/// Parse a full declaration of the form
	/// `nplurals=<int>; plural=<expr>;` (whitespace-insensitive,
	/// trailing semicolon optional).
	pub fn parse(declaration: &str) -> Result<Self, CompileError> {
		let (nplurals, expr_src) = split_declaration(declaration)?;
		Ok(Self {
			nplurals,
			expr: Arc::new(compile(expr_src)?),
		})
	}

	/// Scan a header body (the msgstr of the `msgid ""` entry) for a
	/// `Plural-Forms:` field and parse it. Returns `Ok(None)` when the
	/// header carries no such field.
	pub fn from_header(header: &str) -> Result<Option<Self>, CompileError> {
		for line in header.lines() {
			if let Some(value) = line.trim().strip_prefix("Plural-Forms:") {
				return Self::parse(value).map(Some);
			}
		}
		Ok(None)
	}

	/// Assemble a rule from an already-compiled expression tree, as the
	/// rule cache does after a cache hit.
	pub(crate) fn from_parts(nplurals: usize, expr: Arc<PluralExpr>) -> Self {
		Self { nplurals, expr }
	}

	/// Number of plural forms declared by the rule.
	pub fn nplurals(&self) -> usize {
		self.nplurals
	}

	/// The compiled selection expression.
	pub fn expr(&self) -> &PluralExpr {
		&self.expr
	}

	/// Select the plural-form index for a count.
	///
	/// A result outside `[0, nplurals)` is a fault of the rule, not of
	/// the caller, and surfaces as [`EvalError::IndexOutOfRange`]
	/// rather than being clamped.
	pub fn plural_index(&self, n: u64) -> Result<usize, EvalError> {
		let index = self.expr.evaluate(n)?;
		match usize::try_from(index) {
			Ok(index) if index < self.nplurals => Ok(index),
			_ => Err(EvalError::IndexOutOfRange {
				index,
				nplurals: self.nplurals,
			}),
		}
	}
}

/// Split `nplurals=<int>; plural=<expr>` into its two parts without
/// compiling the expression, so cache lookups can key on the raw
/// expression source.
pub(crate) fn split_declaration(declaration: &str) -> Result<(usize, &str), CompileError> {
	let mut nplurals = None;
	let mut expr_src = None;

	for segment in declaration.split(';') {
		let segment = segment.trim();
		if segment.is_empty() {
			continue;
		}
		let Some((key, value)) = segment.split_once('=') else {
			return Err(CompileError::InvalidPluralForms(format!(
				"expected key=value, got {segment:?}"
			)));
		};
		match key.trim() {
			"nplurals" => {
				let parsed: usize = value.trim().parse().map_err(|_| {
					CompileError::InvalidPluralForms(format!(
						"nplurals must be a positive integer, got {:?}",
						value.trim()
					))
				})?;
				if parsed == 0 {
					return Err(CompileError::InvalidPluralForms(
						"nplurals must be at least 1".to_string(),
					));
				}
				nplurals = Some(parsed);
			}
			"plural" => expr_src = Some(value),
			other => {
				return Err(CompileError::InvalidPluralForms(format!(
					"unknown field {other:?}"
				)));
			}
		}
	}

	match (nplurals, expr_src) {
		(Some(nplurals), Some(expr_src)) => Ok((nplurals, expr_src)),
		(None, _) => Err(CompileError::InvalidPluralForms(
			"missing nplurals field".to_string(),
		)),
		(_, None) => Err(CompileError::InvalidPluralForms(
			"missing plural field".to_string(),
		)),
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
	Num(u64),
	Var,
	Mod,
	Cmp(CmpOp),
	And,
	Or,
	Not,
	Question,
	Colon,
	LParen,
	RParen,
}

#[derive(Debug, Clone, Copy)]
struct Lexed {
	token: Token,
	position: usize,
}

fn tokenize(src: &str) -> Result<Vec<Lexed>, CompileError> {
	let bytes = src.as_bytes();
	let mut tokens = Vec::new();
	let mut i = 0;

	while i < bytes.len() {
		let position = i;
		let token = match bytes[i] {
			b' ' | b'\t' | b'\r' | b'\n' => {
				i += 1;
				continue;
			}
			b'0'..=b'9' => {
				let start = i;
				while i < bytes.len() && bytes[i].is_ascii_digit() {
					i += 1;
				}
				let literal = &src[start..i];
				let value: u64 = literal.parse().map_err(|_| CompileError::InvalidToken {
					position: start,
					found: literal.to_string(),
				})?;
				tokens.push(Lexed {
					token: Token::Num(value),
					position,
				});
				continue;
			}
			b'n' => Token::Var,
			b'%' => Token::Mod,
			b'?' => Token::Question,
			b':' => Token::Colon,
			b'(' => Token::LParen,
			b')' => Token::RParen,
			b'=' if bytes.get(i + 1) == Some(&b'=') => {
				i += 1;
				Token::Cmp(CmpOp::Eq)
			}
			b'!' if bytes.get(i + 1) == Some(&b'=') => {
				i += 1;
				Token::Cmp(CmpOp::Ne)
			}
			b'!' => Token::Not,
			b'<' if bytes.get(i + 1) == Some(&b'=') => {
				i += 1;
				Token::Cmp(CmpOp::Le)
			}
			b'<' => Token::Cmp(CmpOp::Lt),
			b'>' if bytes.get(i + 1) == Some(&b'=') => {
				i += 1;
				Token::Cmp(CmpOp::Ge)
			}
			b'>' => Token::Cmp(CmpOp::Gt),
			b'&' if bytes.get(i + 1) == Some(&b'&') => {
				i += 1;
				Token::And
			}
			b'|' if bytes.get(i + 1) == Some(&b'|') => {
				i += 1;
				Token::Or
			}
			other => {
				// Division is deliberately not in the grammar even
				// though some real-world headers contain it by typo.
				return Err(CompileError::InvalidToken {
					position,
					found: (other as char).to_string(),
				});
			}
		};
		tokens.push(Lexed { token, position });
		i += 1;
	}

	Ok(tokens)
}

/// Recursive-descent parser with C precedence: ternary (loosest,
/// right-associative), `||`, `&&`, equality, relational, `%`, unary
/// `!`, primary.
struct Parser {
	tokens: Vec<Lexed>,
	pos: usize,
}

impl Parser {
	fn peek(&self) -> Option<Token> {
		self.tokens.get(self.pos).map(|lexed| lexed.token)
	}

	fn eat(&mut self, token: Token) -> bool {
		if self.peek() == Some(token) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn ternary(&mut self) -> Result<PluralExpr, CompileError> {
		let cond = self.or_expr()?;
		if !self.eat(Token::Question) {
			return Ok(cond);
		}
		let then = self.ternary()?;
		if !self.eat(Token::Colon) {
			return Err(match self.tokens.get(self.pos) {
				Some(lexed) => CompileError::UnexpectedToken {
					position: lexed.position,
				},
				None => CompileError::UnexpectedEnd,
			});
		}
		// Right associativity falls out of the recursion.
		let otherwise = self.ternary()?;
		Ok(PluralExpr::Ternary {
			cond: Box::new(cond),
			then: Box::new(then),
			otherwise: Box::new(otherwise),
		})
	}

	fn or_expr(&mut self) -> Result<PluralExpr, CompileError> {
		let mut expr = self.and_expr()?;
		while self.eat(Token::Or) {
			let rhs = self.and_expr()?;
			expr = PluralExpr::Or(Box::new(expr), Box::new(rhs));
		}
		Ok(expr)
	}

	fn and_expr(&mut self) -> Result<PluralExpr, CompileError> {
		let mut expr = self.equality()?;
		while self.eat(Token::And) {
			let rhs = self.equality()?;
			expr = PluralExpr::And(Box::new(expr), Box::new(rhs));
		}
		Ok(expr)
	}

	fn equality(&mut self) -> Result<PluralExpr, CompileError> {
		let mut expr = self.relational()?;
		while let Some(Token::Cmp(op @ (CmpOp::Eq | CmpOp::Ne))) = self.peek() {
			self.pos += 1;
			let rhs = self.relational()?;
			expr = PluralExpr::Compare(op, Box::new(expr), Box::new(rhs));
		}
		Ok(expr)
	}

	fn relational(&mut self) -> Result<PluralExpr, CompileError> {
		let mut expr = self.modulo()?;
		while let Some(Token::Cmp(op @ (CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge))) =
			self.peek()
		{
			self.pos += 1;
			let rhs = self.modulo()?;
			expr = PluralExpr::Compare(op, Box::new(expr), Box::new(rhs));
		}
		Ok(expr)
	}

	fn modulo(&mut self) -> Result<PluralExpr, CompileError> {
		let mut expr = self.unary()?;
		while self.eat(Token::Mod) {
			let rhs = self.unary()?;
			expr = PluralExpr::Mod(Box::new(expr), Box::new(rhs));
		}
		Ok(expr)
	}

	fn unary(&mut self) -> Result<PluralExpr, CompileError> {
		if self.eat(Token::Not) {
			let inner = self.unary()?;
			return Ok(PluralExpr::Not(Box::new(inner)));
		}
		self.primary()
	}

	fn primary(&mut self) -> Result<PluralExpr, CompileError> {
		let Some(lexed) = self.tokens.get(self.pos).copied() else {
			return Err(CompileError::UnexpectedEnd);
		};
		self.pos += 1;
		match lexed.token {
			Token::Num(value) => Ok(PluralExpr::Literal(value)),
			Token::Var => Ok(PluralExpr::Var),
			Token::LParen => {
				let expr = self.ternary()?;
				if !self.eat(Token::RParen) {
					return Err(CompileError::UnbalancedParens);
				}
				Ok(expr)
			}
			Token::RParen => Err(CompileError::UnbalancedParens),
			_ => Err(CompileError::UnexpectedToken {
				position: lexed.position,
			}),
		}
	}
}
