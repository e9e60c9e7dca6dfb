use super::display::{self, DisplayConfig, OutputMode};
use colored::Colorize;
use rxrepo_core::derive::{parse_method_name, PredicateCompiler};
use rxrepo_core::execution::{ExecutionStrategy, QueryShape};
use rxrepo_core::{
    DeclaredQuery, EngineConfig, EntityDef, EntitySchema, MethodParameter, MethodSignature, Sort,
    ValueType,
};
use std::time::Instant;

pub enum CommandResult {
    Continue,
    Exit,
    Error(String),
    ClearScreen,
    ShowHistory,
    ExecuteFromHistory(usize),
}

/// Entities declared so far and the engine settings queries compile with.
pub struct ExplainSession {
    pub schema: EntitySchema,
    pub current_entity: Option<String>,
    pub config: EngineConfig,
}

impl ExplainSession {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            schema: EntitySchema::new(),
            current_entity: None,
            config,
        }
    }

    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schema.entity_names().map(str::to_string).collect();
        names.sort();
        names
    }

    pub fn property_names(&self) -> Vec<String> {
        self.current_entity
            .as_deref()
            .and_then(|name| self.schema.entity(name))
            .map(|entity| entity.property_names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Rewrites `template` and prints what it compiled to.
    pub fn explain_template(&self, template: &str, display_config: &DisplayConfig) -> Result<(), String> {
        let query = DeclaredQuery::compile(template, false, self.current_entity.as_deref())
            .map_err(|e| e.to_string())?;
        display::print_declared(&query, display_config);
        Ok(())
    }

    fn explain_count(&self, template: &str, display_config: &DisplayConfig) -> Result<(), String> {
        let count = DeclaredQuery::compile(template, false, self.current_entity.as_deref())
            .and_then(|query| query.derive_count_query(None, None))
            .map_err(|e| e.to_string())?;
        display::print_text("Count", count.text(), display_config);
        Ok(())
    }

    fn explain_sort(&self, arguments: &str, display_config: &DisplayConfig) -> Result<(), String> {
        let (template, keys) = arguments
            .split_once(';')
            .ok_or_else(|| "Usage: .sort <query> ; <property [asc|desc]>, ...".to_string())?;
        let sorted = DeclaredQuery::compile(template.trim(), false, self.current_entity.as_deref())
            .and_then(|query| query.with_sort(&Sort::parse(keys), self.config.allow_unsafe_sort))
            .map_err(|e| e.to_string())?;
        display::print_text("Sorted", sorted.text(), display_config);
        Ok(())
    }

    fn explain_derived(&self, arguments: &[&str], display_config: &DisplayConfig) -> Result<(), String> {
        let Some((method, parameters)) = arguments.split_first() else {
            return Err("Usage: .derive <methodName> [name:type ...]".to_string());
        };
        let entity = self
            .current_entity
            .as_deref()
            .ok_or_else(|| "No entity selected; declare one with .entity".to_string())?;

        let tree = parse_method_name(method, entity, &self.schema).map_err(|e| e.to_string())?;
        let mut signature = MethodSignature::new(entity, method);
        if parameters.is_empty() {
            for part in tree.parts() {
                for n in 0..part.argument_count() {
                    let name = match n {
                        0 => part.property.leaf().to_string(),
                        n => format!("{}{}", part.property.leaf(), n),
                    };
                    signature = signature.param(MethodParameter::value(&name, ValueType::Any));
                }
            }
            tracing::debug!("Inferred signature {}", signature);
        } else {
            for parameter in parameters {
                signature = signature.param(parse_parameter(parameter)?);
            }
        }

        let criteria = PredicateCompiler::new(&self.schema, self.config.escape())
            .compile(&tree, &signature, None)
            .map_err(|e| e.to_string())?;
        let strategy = ExecutionStrategy::select(QueryShape::derived(&signature, &tree));
        display::print_derived(&tree, &criteria, strategy, display_config);
        Ok(())
    }

    fn declare_entity(&mut self, arguments: &[&str]) -> Result<(), String> {
        let Some((name, properties)) = arguments.split_first() else {
            return Err("Usage: .entity <Name> [*]prop:type | prop:[type] | prop:@Entity ...".to_string());
        };

        let mut entity = EntityDef::new(*name);
        for property in properties {
            let (prop, kind) = property
                .split_once(':')
                .ok_or_else(|| format!("Expected prop:type, got '{}'", property))?;
            entity = if let Some(target) = kind.strip_prefix('@') {
                entity.association(prop, target)
            } else if let Some(element) = kind.strip_prefix('[').and_then(|k| k.strip_suffix(']')) {
                entity.collection(prop, parse_type(element)?)
            } else if let Some(id) = prop.strip_prefix('*') {
                entity.id(id, parse_type(kind)?)
            } else {
                entity.property(prop, parse_type(kind)?)
            };
        }

        self.schema.add(entity);
        self.current_entity = Some(name.to_string());
        display::print_success(&format!("Entity {} declared and selected", name));
        Ok(())
    }
}

fn parse_type(name: &str) -> Result<ValueType, String> {
    ValueType::parse(name).ok_or_else(|| format!("Unknown type '{}'", name))
}

fn parse_parameter(parameter: &str) -> Result<MethodParameter, String> {
    match parameter {
        "pageable" => Ok(MethodParameter::pageable()),
        "sort" => Ok(MethodParameter::sort()),
        "limit" => Ok(MethodParameter::limit()),
        other => match other.split_once(':') {
            Some((name, kind)) => Ok(MethodParameter::value(name, parse_type(kind)?)),
            None => Ok(MethodParameter::unnamed(parse_type(other)?)),
        },
    }
}

pub struct CommandHandler {}

impl CommandHandler {
    pub fn new() -> Self {
        CommandHandler {}
    }

    pub fn handle(
        &self,
        line: &str,
        display_config: &mut DisplayConfig,
        session: &mut ExplainSession,
    ) -> CommandResult {
        let line = line.trim();
        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let parts: Vec<&str> = rest.split_whitespace().collect();

        let start = Instant::now();
        let outcome = match command {
            ".help" | ".h" | ".?" => {
                self.show_help();
                Ok(())
            }
            ".exit" | ".quit" | ".q" => return CommandResult::Exit,
            ".clear" | ".cls" => return CommandResult::ClearScreen,
            ".template" | ".t" => session.explain_template(rest.trim_end_matches(';'), display_config),
            ".count" => session.explain_count(rest.trim_end_matches(';'), display_config),
            ".sort" => session.explain_sort(rest.trim_end_matches(';'), display_config),
            ".derive" | ".d" => session.explain_derived(&parts, display_config),
            ".entity" => session.declare_entity(&parts),
            ".use" => match parts.first() {
                Some(name) if session.schema.entity(name).is_some() => {
                    session.current_entity = Some(name.to_string());
                    display::print_info(&format!("Using entity {}", name));
                    Ok(())
                }
                Some(name) => Err(format!("Unknown entity {}", name)),
                None => Err("Usage: .use <Entity>".to_string()),
            },
            ".entities" => {
                self.show_entities(session);
                Ok(())
            }
            ".timing" | ".time" => {
                display_config.show_timing = !display_config.show_timing;
                display::print_toggle("Timing", display_config.show_timing);
                Ok(())
            }
            ".color" | ".colors" => {
                display_config.use_colors = !display_config.use_colors;
                display::print_toggle("Colors", display_config.use_colors);
                Ok(())
            }
            ".mode" => match parts.first() {
                Some(name) => match OutputMode::parse(name) {
                    Some(mode) => {
                        display_config.output_mode = mode;
                        display::print_info(&format!("Output mode set to: {}", name));
                        Ok(())
                    }
                    None => Err(format!("Unknown mode: {}", name)),
                },
                None => {
                    display::print_info(&format!(
                        "Current output mode: {:?}",
                        display_config.output_mode
                    ));
                    Ok(())
                }
            },
            ".history" | ".hist" => {
                return match parts.first() {
                    Some(n) => match n.parse::<usize>() {
                        Ok(n) => CommandResult::ExecuteFromHistory(n),
                        Err(_) => CommandResult::Error(format!("Invalid history number: {}", n)),
                    },
                    None => CommandResult::ShowHistory,
                };
            }
            _ => Err(format!("Unknown command: {}. Type .help for help.", command)),
        };

        match outcome {
            Ok(()) => {
                display::print_timing(start.elapsed(), display_config);
                CommandResult::Continue
            }
            Err(message) => CommandResult::Error(message),
        }
    }

    fn show_help(&self) {
        println!("\n{}", "rxrepo Commands".bright_cyan().bold());
        println!("{}", "─".repeat(50).bright_black());

        let commands = vec![
            (".help, .h, .?", "Show this help message"),
            (".exit, .quit, .q", "Exit the shell"),
            (".clear, .cls", "Clear the screen"),
            ("", ""),
            ("Templates:", ""),
            (".template <query>", "Show rewritten text, bindings and aliases"),
            (".count <query>", "Show the derived count query"),
            (".sort <query> ; <keys>", "Append a sort, e.g. name desc, age"),
            ("", ""),
            ("Derived queries:", ""),
            (".entity <Name> <props>", "Declare an entity (*id:int name:text tags:[text])"),
            (".use <Name>", "Select the entity queries refer to"),
            (".entities", "List declared entities"),
            (".derive <method> [params]", "Compile a method name, e.g. findByAgeGreaterThan"),
            ("", ""),
            ("Display Options:", ""),
            (".timing, .time", "Toggle timing"),
            (".color, .colors", "Toggle colors"),
            (".mode <format>", "Set output format (table/json/plain)"),
            ("", ""),
            ("History:", ""),
            (".history, .hist", "Show history"),
            (".history <n>", "Run history entry n"),
        ];

        for (cmd, desc) in commands {
            if cmd.is_empty() {
                println!();
            } else if desc.is_empty() {
                println!("{}", cmd.bright_yellow());
            } else {
                println!("  {:28} {}", cmd.bright_green(), desc.bright_white());
            }
        }

        println!("\n{}", "Query Input:".bright_yellow());
        println!("  • Lines not starting with '.' are explained as templates");
        println!("  • End templates with ';'; Enter without ';' continues the input");
        println!("  • Ctrl+C cancels current input, Ctrl+D exits");
        println!();
    }

    fn show_entities(&self, session: &ExplainSession) {
        let names = session.entity_names();
        if names.is_empty() {
            display::print_info("No entities declared");
            return;
        }
        for name in names {
            let marker = if session.current_entity.as_deref() == Some(name.as_str()) {
                "*"
            } else {
                " "
            };
            let properties: Vec<&str> = session
                .schema
                .entity(&name)
                .map(|e| e.property_names().collect())
                .unwrap_or_default();
            println!("{} {} ({})", marker, name.bright_green(), properties.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ExplainSession {
        let mut session = ExplainSession::new(EngineConfig::default());
        session
            .declare_entity(&["User", "*id:int", "name:text", "age:int", "tags:[text]"])
            .unwrap();
        session
    }

    #[test]
    fn test_declares_entities() {
        let session = session();
        assert_eq!(session.entity_names(), vec!["User".to_string()]);
        assert_eq!(session.property_names(), vec!["id", "name", "age", "tags"]);
    }

    #[test]
    fn test_rejects_bad_property_declarations() {
        let mut session = session();
        assert!(session.declare_entity(&["Item", "price"]).is_err());
        assert!(session.declare_entity(&["Item", "price:money"]).is_err());
    }

    #[test]
    fn test_parses_parameters() {
        assert_eq!(parse_parameter("pageable").unwrap(), MethodParameter::pageable());
        assert_eq!(
            parse_parameter("age:int").unwrap(),
            MethodParameter::value("age", ValueType::Integer)
        );
        assert!(parse_parameter("age:money").is_err());
    }

    #[test]
    fn test_explains_without_errors() {
        let session = session();
        let config = DisplayConfig {
            output_mode: OutputMode::Plain,
            ..DisplayConfig::default()
        };
        assert!(session
            .explain_template("select u from #{#entityName} u where u.name like %:name%", &config)
            .is_ok());
        assert!(session.explain_sort("select u from User u ; name desc", &config).is_ok());
        assert!(session.explain_sort("select u from User u", &config).is_err());
        assert!(session.explain_derived(&["findByAgeBetweenAndTagsContaining"], &config).is_ok());
        assert!(session.explain_derived(&["findByShoeSize"], &config).is_err());
    }
}
