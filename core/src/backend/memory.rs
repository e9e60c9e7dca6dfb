use super::{BoundQuery, QueryBackend, Row};
use crate::derive::{ComparisonOp, CriteriaQuery, JunctionOp, Operand, Predicate, Selection};
use crate::error::{BindError, QueryError, QueryResult};
use crate::template::lexer::{tokenize, TokenKind};
use crate::value::Value;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Where a value was committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommitTarget {
	Named(String),
	Position(usize),
	Slot(usize),
}

impl fmt::Display for CommitTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CommitTarget::Named(name) => write!(f, ":{}", name),
			CommitTarget::Position(position) => write!(f, "?{}", position),
			CommitTarget::Slot(slot) => write!(f, "slot {}", slot),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
	pub target: CommitTarget,
	pub value: Value,
}

#[derive(Debug, Clone, Default)]
struct Stub {
	rows: Vec<Row>,
	affected: u64,
}

type Tables = Arc<RwLock<HashMap<String, Vec<Row>>>>;

/// In-memory backend: criteria queries run against stored rows, template
/// queries answer from registered stubs. Every commit is recorded.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
	tables: Tables,
	stubs: Arc<RwLock<HashMap<String, Stub>>>,
	commits: Arc<Mutex<Vec<Commit>>>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_row(&self, entity: &str, row: Row) {
		self.tables
			.write()
			.entry(entity.to_string())
			.or_default()
			.push(row);
	}

	pub fn scan_table(&self, entity: &str) -> Vec<Row> {
		self.tables.read().get(entity).cloned().unwrap_or_default()
	}

	/// Rows returned when `text` is executed.
	pub fn stub_rows(&self, text: &str, rows: Vec<Row>) {
		self.stubs.write().entry(text.to_string()).or_default().rows = rows;
	}

	/// Affected-row count reported when `text` runs as an update.
	pub fn stub_update(&self, text: &str, affected: u64) {
		self.stubs.write().entry(text.to_string()).or_default().affected = affected;
	}

	pub fn commits(&self) -> Vec<Commit> {
		self.commits.lock().clone()
	}

	pub fn clear_commits(&self) {
		self.commits.lock().clear();
	}
}

#[async_trait]
impl QueryBackend for MemoryBackend {
	fn create_query(&self, text: &str, _native: bool) -> QueryResult<Box<dyn BoundQuery>> {
		let tokens = tokenize(text)?;
		let mut names = BTreeSet::new();
		let mut positions = BTreeSet::new();
		let mut sequence = 0;

		for token in &tokens {
			let placeholder = token.text(text);
			match token.kind {
				TokenKind::Named => {
					names.insert(placeholder[1..].to_string());
				}
				TokenKind::Positional if placeholder.len() == 1 => {
					sequence += 1;
					positions.insert(sequence);
				}
				TokenKind::Positional => {
					if let Ok(position) = placeholder[1..].parse::<usize>() {
						positions.insert(position);
					}
				}
				_ => {}
			}
		}

		let stub = self.stubs.read().get(text).cloned().unwrap_or_default();
		Ok(Box::new(TextQuery {
			text: text.to_string(),
			names,
			positions,
			named_values: HashMap::new(),
			positional_values: HashMap::new(),
			first_result: 0,
			max_results: None,
			stub,
			commits: Arc::clone(&self.commits),
		}))
	}

	fn create_criteria_query(&self, query: &CriteriaQuery) -> QueryResult<Box<dyn BoundQuery>> {
		Ok(Box::new(CriteriaHandle {
			query: query.clone(),
			slots: HashMap::new(),
			first_result: 0,
			max_results: query.max_results,
			tables: Arc::clone(&self.tables),
			commits: Arc::clone(&self.commits),
		}))
	}

	async fn remove(&self, entity: &str, rows: &[Row]) -> QueryResult<u64> {
		let mut tables = self.tables.write();
		let Some(table) = tables.get_mut(entity) else {
			return Ok(0);
		};

		let before = table.len();
		table.retain(|row| !rows.contains(row));
		Ok((before - table.len()) as u64)
	}
}

/// Handle for a template query served from stubs.
struct TextQuery {
	text: String,
	names: BTreeSet<String>,
	positions: BTreeSet<usize>,
	named_values: HashMap<String, Value>,
	positional_values: HashMap<usize, Value>,
	first_result: usize,
	max_results: Option<usize>,
	stub: Stub,
	commits: Arc<Mutex<Vec<Commit>>>,
}

impl TextQuery {
	fn record(&self, target: CommitTarget, value: Value) {
		self.commits.lock().push(Commit { target, value });
	}

	fn ensure_bound(&self) -> QueryResult<()> {
		if let Some(name) = self.names.iter().find(|n| !self.named_values.contains_key(*n)) {
			return Err(QueryError::Execution(format!(
				"No value bound for :{} in '{}'",
				name, self.text
			)));
		}
		if let Some(position) = self
			.positions
			.iter()
			.find(|p| !self.positional_values.contains_key(*p))
		{
			return Err(QueryError::Execution(format!(
				"No value bound for ?{} in '{}'",
				position, self.text
			)));
		}
		Ok(())
	}

	fn window(&self, rows: Vec<Row>) -> Vec<Row> {
		window(rows, self.first_result, self.max_results)
	}
}

#[async_trait]
impl BoundQuery for TextQuery {
	fn set_named(&mut self, name: &str, value: Value) -> Result<(), BindError> {
		if !self.names.contains(name) {
			return Err(BindError::UnknownName(name.to_string()));
		}
		self.record(CommitTarget::Named(name.to_string()), value.clone());
		self.named_values.insert(name.to_string(), value);
		Ok(())
	}

	fn set_positional(&mut self, position: usize, value: Value) -> Result<(), BindError> {
		if !self.positions.contains(&position) {
			return Err(BindError::UnknownPosition(position));
		}
		self.record(CommitTarget::Position(position), value.clone());
		self.positional_values.insert(position, value);
		Ok(())
	}

	fn set_slot(&mut self, slot: usize, _value: Value) -> Result<(), BindError> {
		Err(BindError::UnknownSlot(slot))
	}

	fn set_first_result(&mut self, offset: usize) {
		self.first_result = offset;
	}

	fn set_max_results(&mut self, max: usize) {
		self.max_results = Some(max);
	}

	fn first_result(&self) -> usize {
		self.first_result
	}

	fn max_results(&self) -> Option<usize> {
		self.max_results
	}

	async fn fetch_all(&mut self) -> QueryResult<Vec<Row>> {
		self.ensure_bound()?;
		Ok(self.window(self.stub.rows.clone()))
	}

	async fn fetch_one(&mut self) -> QueryResult<Option<Row>> {
		let mut rows = self.fetch_all().await?;
		single(&mut rows)
	}

	async fn execute_update(&mut self) -> QueryResult<u64> {
		self.ensure_bound()?;
		Ok(self.stub.affected)
	}
}

/// Handle for a criteria query evaluated against stored rows.
struct CriteriaHandle {
	query: CriteriaQuery,
	slots: HashMap<usize, Value>,
	first_result: usize,
	max_results: Option<usize>,
	tables: Tables,
	commits: Arc<Mutex<Vec<Commit>>>,
}

impl CriteriaHandle {
	fn run(&self) -> QueryResult<Vec<Row>> {
		let rows = self
			.tables
			.read()
			.get(&self.query.entity)
			.cloned()
			.unwrap_or_default();

		let evaluator = PredicateEvaluator { slots: &self.slots };
		let mut matched = Vec::new();
		for row in rows {
			let keep = match &self.query.predicate {
				Some(predicate) => evaluator.evaluate(predicate, &row)?,
				None => true,
			};
			if keep {
				matched.push(row);
			}
		}

		for order in self.query.order.orders().iter().rev() {
			matched.sort_by(|a, b| {
				let left = sort_key(a.get(&order.property), order.ignore_case);
				let right = sort_key(b.get(&order.property), order.ignore_case);
				let ordering = left.sort_cmp(&right);
				match order.direction {
					crate::paging::Direction::Asc => ordering,
					crate::paging::Direction::Desc => ordering.reverse(),
				}
			});
		}

		let projected: Vec<Row> = match &self.query.selection {
			Selection::Entity => matched,
			Selection::Count { distinct } => {
				let count = if *distinct { dedup(matched).len() } else { matched.len() };
				let mut row = Row::new();
				row.insert("count".to_string(), Value::Integer(count as i64));
				return Ok(vec![row]);
			}
			Selection::Identifiers(ids) => matched
				.into_iter()
				.map(|row| {
					ids.iter()
						.map(|id| {
							let key = id.dot_path();
							let value = row.get(&key).cloned().unwrap_or(Value::Null);
							(key, value)
						})
						.collect::<Row>()
				})
				.collect(),
		};

		let projected = if self.query.distinct { dedup(projected) } else { projected };
		Ok(window(projected, self.first_result, self.max_results))
	}
}

#[async_trait]
impl BoundQuery for CriteriaHandle {
	fn set_named(&mut self, name: &str, _value: Value) -> Result<(), BindError> {
		Err(BindError::UnknownName(name.to_string()))
	}

	fn set_positional(&mut self, position: usize, value: Value) -> Result<(), BindError> {
		self.set_slot(position, value)
	}

	fn set_slot(&mut self, slot: usize, value: Value) -> Result<(), BindError> {
		if !self.query.parameters.iter().any(|p| p.position == slot) {
			return Err(BindError::UnknownSlot(slot));
		}
		self.commits.lock().push(Commit {
			target: CommitTarget::Slot(slot),
			value: value.clone(),
		});
		self.slots.insert(slot, value);
		Ok(())
	}

	fn uses_slots(&self) -> bool {
		true
	}

	fn set_first_result(&mut self, offset: usize) {
		self.first_result = offset;
	}

	fn set_max_results(&mut self, max: usize) {
		self.max_results = Some(max);
	}

	fn first_result(&self) -> usize {
		self.first_result
	}

	fn max_results(&self) -> Option<usize> {
		self.max_results
	}

	async fn fetch_all(&mut self) -> QueryResult<Vec<Row>> {
		self.run()
	}

	async fn fetch_one(&mut self) -> QueryResult<Option<Row>> {
		let mut rows = self.run()?;
		single(&mut rows)
	}

	async fn execute_update(&mut self) -> QueryResult<u64> {
		Err(QueryError::Execution(format!(
			"Criteria query on {} cannot be executed as an update",
			self.query.entity
		)))
	}
}

struct PredicateEvaluator<'a> {
	slots: &'a HashMap<usize, Value>,
}

impl PredicateEvaluator<'_> {
	fn evaluate(&self, predicate: &Predicate, row: &Row) -> QueryResult<bool> {
		match predicate {
			Predicate::Junction { op, left, right } => {
				let left = self.evaluate(left, row)?;
				match op {
					JunctionOp::And => Ok(left && self.evaluate(right, row)?),
					JunctionOp::Or => Ok(left || self.evaluate(right, row)?),
				}
			}
			Predicate::Comparison { op, left, right } => {
				let left = self.operand(left, row)?;
				let right = self.operand(right, row)?;
				if left.is_null() || right.is_null() {
					return Ok(false);
				}
				Ok(match op {
					ComparisonOp::Eq => left.sql_eq(&right),
					ComparisonOp::NotEq => !left.sql_eq(&right),
					ComparisonOp::Lt => compare_values(&left, &right, |o| o == Ordering::Less),
					ComparisonOp::Gt => compare_values(&left, &right, |o| o == Ordering::Greater),
					ComparisonOp::LtEq => compare_values(&left, &right, |o| o != Ordering::Greater),
					ComparisonOp::GtEq => compare_values(&left, &right, |o| o != Ordering::Less),
				})
			}
			Predicate::Between { operand, low, high } => {
				let value = self.operand(operand, row)?;
				let low = self.operand(low, row)?;
				let high = self.operand(high, row)?;
				Ok(compare_values(&value, &low, |o| o != Ordering::Less)
					&& compare_values(&value, &high, |o| o != Ordering::Greater))
			}
			Predicate::IsNull(operand) => Ok(self.operand(operand, row)?.is_null()),
			Predicate::IsNotNull(operand) => Ok(!self.operand(operand, row)?.is_null()),
			Predicate::In { operand, values, negated } => {
				let value = self.operand(operand, row)?;
				let values = self.operand(values, row)?;
				let found = values.elements().iter().any(|v| v.sql_eq(&value));
				Ok(found != *negated)
			}
			Predicate::MemberOf { element, collection, negated } => {
				let element = self.operand(element, row)?;
				let collection = self.operand(collection, row)?;
				let found = !collection.is_null()
					&& collection.elements().iter().any(|v| v.sql_eq(&element));
				Ok(found != *negated)
			}
			Predicate::Like { operand, pattern, negated, escape } => {
				let value = self.operand(operand, row)?;
				let pattern = self.operand(pattern, row)?;
				match (value.as_str(), pattern.as_str()) {
					(Some(text), Some(pattern)) => Ok(like_match(text, pattern, *escape) != *negated),
					_ => Ok(false),
				}
			}
			Predicate::IsTrue(operand) => Ok(self.operand(operand, row)? == Value::Boolean(true)),
			Predicate::IsFalse(operand) => Ok(self.operand(operand, row)? == Value::Boolean(false)),
			Predicate::IsEmpty(operand) => Ok(is_empty(&self.operand(operand, row)?)),
			Predicate::IsNotEmpty(operand) => Ok(!is_empty(&self.operand(operand, row)?)),
		}
	}

	fn operand(&self, operand: &Operand, row: &Row) -> QueryResult<Value> {
		match operand {
			Operand::Path(path) => Ok(row.get(&path.dot_path()).cloned().unwrap_or(Value::Null)),
			Operand::Parameter(position) => self
				.slots
				.get(position)
				.cloned()
				.ok_or_else(|| QueryError::Execution(format!("No value bound for parameter ?{}", position))),
			Operand::Upper(inner) => Ok(self.operand(inner, row)?.to_uppercase()),
		}
	}
}

fn compare_values<F>(left: &Value, right: &Value, cmp_fn: F) -> bool
where
	F: Fn(Ordering) -> bool,
{
	left.compare(right).is_some_and(cmp_fn)
}

fn is_empty(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::List(items) | Value::Array(items) => items.is_empty(),
		_ => false,
	}
}

fn sort_key(value: Option<&Value>, ignore_case: bool) -> Value {
	let value = value.cloned().unwrap_or(Value::Null);
	if ignore_case { value.to_lowercase() } else { value }
}

fn dedup(rows: Vec<Row>) -> Vec<Row> {
	let mut unique: Vec<Row> = Vec::with_capacity(rows.len());
	for row in rows {
		if !unique.contains(&row) {
			unique.push(row);
		}
	}
	unique
}

fn window(rows: Vec<Row>, first: usize, max: Option<usize>) -> Vec<Row> {
	rows.into_iter()
		.skip(first)
		.take(max.unwrap_or(usize::MAX))
		.collect()
}

fn single(rows: &mut Vec<Row>) -> QueryResult<Option<Row>> {
	match rows.len() {
		0 => Ok(None),
		1 => Ok(rows.pop()),
		n => Err(QueryError::Execution(format!(
			"Query returned {} rows where at most one was expected",
			n
		))),
	}
}

/// SQL LIKE matching with `%`, `_` and an escape character.
pub fn like_match(text: &str, pattern: &str, escape: char) -> bool {
	enum Piece {
		Literal(char),
		One,
		Many,
	}

	let mut pieces = Vec::new();
	let mut chars = pattern.chars();
	while let Some(c) = chars.next() {
		match c {
			c if c == escape => pieces.push(Piece::Literal(chars.next().unwrap_or(escape))),
			'%' => pieces.push(Piece::Many),
			'_' => pieces.push(Piece::One),
			c => pieces.push(Piece::Literal(c)),
		}
	}

	let text: Vec<char> = text.chars().collect();
	// matches[j]: pieces[..i] match text[..j]
	let mut matches = vec![false; text.len() + 1];
	matches[0] = true;
	for piece in &pieces {
		let mut next = vec![false; text.len() + 1];
		match piece {
			Piece::Many => {
				let mut seen = false;
				for j in 0..=text.len() {
					seen |= matches[j];
					next[j] = seen;
				}
			}
			Piece::One => {
				for j in 1..=text.len() {
					next[j] = matches[j - 1];
				}
			}
			Piece::Literal(c) => {
				for j in 1..=text.len() {
					next[j] = matches[j - 1] && text[j - 1] == *c;
				}
			}
		}
		matches = next;
	}
	matches[text.len()]
}
