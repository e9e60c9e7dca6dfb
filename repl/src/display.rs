use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rxrepo_core::derive::{CriteriaQuery, PartTree};
use rxrepo_core::{DeclaredQuery, ExecutionStrategy, ParameterBinding};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
	Table,
	Json,
	Plain,
}

impl OutputMode {
	pub fn parse(name: &str) -> Option<Self> {
		match name {
			"table" => Some(OutputMode::Table),
			"json" => Some(OutputMode::Json),
			"plain" => Some(OutputMode::Plain),
			_ => None,
		}
	}
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
	pub show_timing: bool,
	pub use_colors: bool,
	pub output_mode: OutputMode,
	pub max_column_width: usize,
}

impl Default for DisplayConfig {
	fn default() -> Self {
		Self {
			show_timing: false,
			use_colors: true,
			output_mode: OutputMode::Table,
			max_column_width: 40,
		}
	}
}

pub fn print_welcome() {
	println!("\n{}", "rxrepo explain shell".bright_cyan().bold());
	println!(
		"Type {} for help, {} to exit",
		".help".bright_green(),
		".exit".bright_green()
	);
	println!(
		"Enter a query template ending in {} to see how it is rewritten",
		";".bright_green()
	);
	println!();
}

pub fn print_goodbye(explained: usize, duration: Duration) {
	println!();
	println!("{}", "─".repeat(40).bright_black());
	println!("   Explained {} queries in {:.1?}", explained, duration);
	println!();
}

pub fn clear_screen() {
	print!("\x1B[2J\x1B[1;1H");
}

pub fn print_error(msg: &str) {
	println!("{} {}", "✗".bright_red().bold(), msg.bright_red());
}

pub fn print_warning(msg: &str) {
	println!("{} {}", "⚠".bright_yellow(), msg.bright_yellow());
}

pub fn print_info(msg: &str) {
	println!("{} {}", "ℹ".bright_blue(), msg.bright_white());
}

pub fn print_success(msg: &str) {
	println!("{} {}", "✓".bright_green().bold(), msg.bright_green());
}

pub fn print_hint(msg: &str) {
	println!("{} {}", "›".bright_white(), msg.bright_white().dimmed());
}

pub fn print_toggle(feature: &str, enabled: bool) {
	let status = if enabled {
		"ON".bright_green().bold()
	} else {
		"OFF".bright_red()
	};
	println!("{}: {}", feature, status);
}

pub fn print_timing(duration: Duration, config: &DisplayConfig) {
	if config.show_timing {
		println!(
			"  {} {:.3}ms",
			"Time:".bright_black(),
			duration.as_secs_f64() * 1000.0
		);
	}
}

fn field(label: &str, value: &str) {
	println!("  {:14} {}", label.bright_black(), value);
}

pub(crate) fn truncate(text: &str, width: usize) -> String {
	if text.chars().count() > width {
		let cut: String = text.chars().take(width.saturating_sub(3)).collect();
		format!("{}...", cut)
	} else {
		text.to_string()
	}
}

fn bindings_json(bindings: &[ParameterBinding]) -> serde_json::Value {
	bindings
		.iter()
		.map(|b| {
			json!({
				"identifier": b.identifier().to_string(),
				"origin": b.origin().to_string(),
				"kind": b.kind().to_string(),
			})
		})
		.collect()
}

pub fn print_bindings(bindings: &[ParameterBinding], config: &DisplayConfig) {
	if bindings.is_empty() {
		field("Bindings:", "none");
		return;
	}

	match config.output_mode {
		OutputMode::Table => {
			let mut table = Table::new();
			table
				.load_preset(UTF8_FULL)
				.set_content_arrangement(ContentArrangement::Dynamic)
				.set_header(vec!["#", "Placeholder", "Origin", "Kind"]);
			for (i, binding) in bindings.iter().enumerate() {
				table.add_row(vec![
					(i + 1).to_string(),
					binding.identifier().to_string(),
					truncate(&binding.origin().to_string(), config.max_column_width),
					binding.kind().to_string(),
				]);
			}
			println!("{}", table);
		}
		OutputMode::Json | OutputMode::Plain => {
			for (i, binding) in bindings.iter().enumerate() {
				println!("  {:>3}. {}", i + 1, binding);
			}
		}
	}
}

pub fn print_declared(query: &DeclaredQuery, config: &DisplayConfig) {
	if config.output_mode == OutputMode::Json {
		let value = json!({
			"text": query.text(),
			"native": query.is_native(),
			"entity": query.entity(),
			"alias": query.alias(),
			"projection": query.projection(),
			"constructor_expression": query.has_constructor_expression(),
			"join_aliases": query.join_aliases(),
			"projection_aliases": query.projection_aliases(),
			"jdbc_style": query.uses_jdbc_style_parameters(),
			"bindings": bindings_json(query.bindings()),
		});
		println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
		return;
	}

	let text = if config.use_colors {
		query.text().bright_white().bold().to_string()
	} else {
		query.text().to_string()
	};
	field("Query:", &text);
	field("Entity:", query.entity().unwrap_or("-"));
	field("Alias:", query.alias().unwrap_or("-"));
	field(
		"Projection:",
		if query.projection().is_empty() {
			"-"
		} else {
			query.projection()
		},
	);
	if query.has_constructor_expression() {
		field("Constructor:", "yes");
	}
	if !query.join_aliases().is_empty() {
		let joins: Vec<&str> = query.join_aliases().iter().map(String::as_str).collect();
		field("Joins:", &joins.join(", "));
	}
	if query.uses_jdbc_style_parameters() {
		field("Parameters:", "jdbc style");
	}
	print_bindings(query.bindings(), config);
}

pub fn print_text(label: &str, text: &str, config: &DisplayConfig) {
	match config.output_mode {
		OutputMode::Json => println!("{}", json!({ "label": label, "text": text })),
		_ if config.use_colors => field(&format!("{}:", label), &text.bright_white().bold().to_string()),
		_ => field(&format!("{}:", label), text),
	}
}

pub fn print_derived(
	tree: &PartTree,
	criteria: &CriteriaQuery,
	strategy: ExecutionStrategy,
	config: &DisplayConfig,
) {
	let bindings = criteria.bindings();
	if config.output_mode == OutputMode::Json {
		let value = json!({
			"entity": tree.entity,
			"tree": tree.to_string(),
			"query": criteria.to_string(),
			"strategy": strategy.to_string(),
			"bindings": bindings_json(&bindings),
		});
		println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
		return;
	}

	field("Entity:", &tree.entity);
	field("Parts:", &tree.to_string());
	field("Query:", &criteria.to_string());
	field("Strategy:", &strategy.to_string());
	print_bindings(&bindings, config);
}
