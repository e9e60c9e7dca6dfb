mod commands;
mod completer;
pub mod display;
mod history;
mod prompt;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor, Result};
use rxrepo_core::EngineConfig;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

pub use self::commands::{CommandHandler, ExplainSession};
pub use self::display::DisplayConfig;

/// rxrepo - explain query templates and derived query methods
#[derive(Parser, Debug)]
#[command(name = "rxrepo")]
#[command(version, about, long_about = None)]
struct Cli {
	/// Engine configuration file
	#[arg(short, long, default_value = "rxrepo.toml")]
	config: PathBuf,
	/// Run these commands instead of starting the shell
	#[arg(short = 'e', long = "execute")]
	commands: Vec<String>,
	/// Run commands from a file
	#[arg(short, long)]
	file: Option<PathBuf>,
	/// Read commands from standard input
	#[arg(long)]
	stdin: bool,
	#[arg(short, long)]
	quiet: bool,
	#[arg(long)]
	no_history: bool,
	#[arg(long)]
	exit_on_error: bool,
	/// Output format (table/json/plain)
	#[arg(long)]
	mode: Option<String>,
}

pub struct Repl {
	editor: Editor<completer::RxCompleter, DefaultHistory>,
	command_handler: CommandHandler,
	display_config: DisplayConfig,
	session: ExplainSession,
	history: history::HistoryManager,
	multiline_buffer: String,
	in_multiline: bool,
	explained: usize,
	start_time: Instant,
	quiet: bool,
	exit_on_error: bool,
}

impl Repl {
	fn new(cli: &Cli, config: EngineConfig) -> Result<Self> {
		let editor_config = Config::builder()
			.history_ignore_space(true)
			.completion_type(rustyline::CompletionType::List)
			.edit_mode(rustyline::EditMode::Emacs)
			.build();

		let mut editor = Editor::with_config(editor_config)?;
		editor.set_helper(Some(completer::RxCompleter::new()));

		let history = history::HistoryManager::new(".rxrepo_history");
		if !cli.no_history {
			history.load(&mut editor);
		}

		let mut display_config = DisplayConfig::default();
		if let Some(mode) = cli.mode.as_deref().and_then(display::OutputMode::parse) {
			display_config.output_mode = mode;
		}

		Ok(Self {
			editor,
			command_handler: CommandHandler::new(),
			display_config,
			session: ExplainSession::new(config),
			history,
			multiline_buffer: String::new(),
			in_multiline: false,
			explained: 0,
			start_time: Instant::now(),
			quiet: cli.quiet,
			exit_on_error: cli.exit_on_error,
		})
	}

	fn run_interactive(&mut self) -> Result<()> {
		if !self.quiet {
			display::print_welcome();
		}

		loop {
			let prompt_str = prompt::generate_prompt(
				self.in_multiline,
				self.session.current_entity.as_deref(),
				&self.display_config,
			);

			match self.editor.readline(&prompt_str) {
				Ok(line) => {
					if !line.trim().is_empty() {
						self.editor.add_history_entry(&line)?;
					}
					if !self.handle_line(&line)? {
						break;
					}
				}
				Err(ReadlineError::Interrupted) => self.handle_interrupt(),
				Err(ReadlineError::Eof) => {
					println!();
					display::print_goodbye(self.explained, self.start_time.elapsed());
					break;
				}
				Err(err) => {
					display::print_error(&format!("Readline error: {:?}", err));
					break;
				}
			}
		}

		self.history.save(&mut self.editor)?;
		Ok(())
	}

	fn run_script(&mut self, content: &str) -> Result<()> {
		for (line_num, line) in content.lines().enumerate() {
			let trimmed = line.trim();
			// Skip comments
			if trimmed.starts_with("--") || trimmed.starts_with('#') {
				continue;
			}
			match self.handle_line(line) {
				Ok(true) => {}
				Ok(false) => return Ok(()),
				Err(e) => {
					display::print_error(&format!("Error at line {}: {}", line_num + 1, e));
					if self.exit_on_error {
						return Err(e);
					}
				}
			}
		}

		// Explain any unterminated template
		if !self.multiline_buffer.trim().is_empty() {
			let template = std::mem::take(&mut self.multiline_buffer);
			self.explain(&template);
		}
		Ok(())
	}

	/// Returns false when the shell should stop.
	fn handle_line(&mut self, line: &str) -> Result<bool> {
		if !self.in_multiline && line.trim().starts_with('.') {
			return self.handle_command(line);
		}

		if self.in_multiline {
			self.multiline_buffer.push('\n');
		}
		self.multiline_buffer.push_str(line);

		let trimmed = line.trim();
		let ends_input = trimmed.ends_with(';') || (trimmed.is_empty() && self.in_multiline);
		if !ends_input {
			self.in_multiline = !self.multiline_buffer.trim().is_empty();
			return Ok(true);
		}

		self.in_multiline = false;
		let template = std::mem::take(&mut self.multiline_buffer);
		if !template.trim().is_empty() {
			self.explain(&template);
		}
		Ok(true)
	}

	fn explain(&mut self, template: &str) {
		self.explained += 1;
		let template = template.trim().trim_end_matches(';');
		if let Err(message) = self.session.explain_template(template, &self.display_config) {
			display::print_error(&message);
			if self.exit_on_error {
				std::process::exit(1);
			}
		}
	}

	fn handle_command(&mut self, line: &str) -> Result<bool> {
		let result = self
			.command_handler
			.handle(line, &mut self.display_config, &mut self.session);
		self.refresh_completions();

		match result {
			commands::CommandResult::Continue => {
				self.explained += 1;
				Ok(true)
			}
			commands::CommandResult::Exit => {
				if !self.quiet {
					display::print_goodbye(self.explained, self.start_time.elapsed());
				}
				Ok(false)
			}
			commands::CommandResult::Error(msg) => {
				display::print_error(&msg);
				if self.exit_on_error {
					std::process::exit(1);
				}
				Ok(true)
			}
			commands::CommandResult::ClearScreen => {
				display::clear_screen();
				if !self.quiet {
					display::print_welcome();
				}
				Ok(true)
			}
			commands::CommandResult::ShowHistory => {
				self.history.display(&self.editor, &self.display_config);
				Ok(true)
			}
			commands::CommandResult::ExecuteFromHistory(n) => {
				match self.history.replay(&self.editor, n) {
					Ok(entry) => self.handle_line(&entry),
					Err(message) => {
						display::print_warning(&message);
						Ok(true)
					}
				}
			}
		}
	}

	fn refresh_completions(&mut self) {
		let entities = self.session.entity_names();
		let properties = self.session.property_names();
		if let Some(helper) = self.editor.helper_mut() {
			helper.set_names(entities, properties);
		}
	}

	fn handle_interrupt(&mut self) {
		if self.in_multiline {
			display::print_warning("Cancelled multiline input");
			self.multiline_buffer.clear();
			self.in_multiline = false;
		} else {
			display::print_hint("Use .exit or Ctrl+D to quit");
		}
	}
}

fn get_env_filter() -> EnvFilter {
	if std::env::var_os("RUST_LOG").is_some() {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
	} else if cfg!(debug_assertions) {
		EnvFilter::new("rxrepo_core=debug")
	} else {
		EnvFilter::new("rxrepo_core=warn")
	}
}

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	tracing_subscriber::fmt()
		.with_env_filter(get_env_filter())
		.with_writer(io::stderr)
		.with_target(false)
		.compact()
		.init();

	let config = EngineConfig::load_from_path(&cli.config)?;
	tracing::debug!("Loaded engine config {:?}", config);
	let mut repl = Repl::new(&cli, config)?;

	if !cli.commands.is_empty() {
		for command in &cli.commands {
			if !repl.handle_line(command)? {
				break;
			}
		}
		// A trailing template without ';' still gets explained.
		repl.run_script("")?;
	} else if let Some(path) = &cli.file {
		if !cli.quiet {
			display::print_info(&format!("Executing file: {}", path.display()));
		}
		let content = fs::read_to_string(path)?;
		repl.run_script(&content)?;
	} else if cli.stdin {
		let mut content = String::new();
		io::stdin().read_to_string(&mut content)?;
		repl.run_script(&content)?;
	} else {
		repl.run_interactive()?;
	}

	Ok(())
}
