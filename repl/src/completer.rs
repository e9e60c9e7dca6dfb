use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper, Result};

const COMMANDS: &[&str] = &[
    ".help", ".exit", ".clear", ".template", ".count", ".sort", ".entity", ".use", ".entities",
    ".derive", ".timing", ".color", ".mode", ".history",
];

const QUERY_KEYWORDS: &[&str] = &[
    "select", "distinct", "from", "where", "join", "left join", "inner join", "fetch", "and", "or",
    "not", "in", "like", "between", "is null", "is not null", "member of", "order by", "group by",
    "having", "count", "new", "as", "asc", "desc",
];

const SUBJECTS: &[&str] = &[
    "findBy", "findDistinctBy", "findFirstBy", "findTop", "countBy", "existsBy", "deleteBy",
];

const OPERATORS: &[&str] = &[
    "IsNull", "IsNotNull", "Between", "LessThan", "LessThanEqual", "GreaterThan",
    "GreaterThanEqual", "Before", "After", "Like", "NotLike", "StartingWith", "EndingWith",
    "Containing", "NotContaining", "In", "NotIn", "IsEmpty", "IsNotEmpty", "True", "False", "Not",
    "IgnoreCase", "AllIgnoreCase", "And", "Or", "OrderBy",
];

/// Completes shell commands, template keywords and the names of declared
/// entities and properties.
pub struct RxCompleter {
    entities: Vec<String>,
    properties: Vec<String>,
}

impl RxCompleter {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Refreshes the names offered after the session changed.
    pub fn set_names(&mut self, entities: Vec<String>, properties: Vec<String>) {
        self.entities = entities;
        self.properties = properties;
    }

    fn word_start(line: &str, pos: usize) -> usize {
        line[..pos]
            .rfind(|c: char| c.is_whitespace() || "(),;".contains(c))
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    fn pairs<'a>(candidates: impl IntoIterator<Item = &'a str>, partial: &str) -> Vec<Pair> {
        candidates
            .into_iter()
            .filter(|c| c.to_lowercase().starts_with(&partial.to_lowercase()))
            .map(|c| Pair {
                display: c.to_string(),
                replacement: c.to_string(),
            })
            .collect()
    }

    fn method_name_completions(&self, partial: &str) -> Vec<Pair> {
        if !partial.chars().any(char::is_uppercase) {
            return Self::pairs(SUBJECTS.iter().copied(), partial);
        }

        let expects_property = ["By", "And", "Or", "OrderBy"]
            .iter()
            .any(|suffix| partial.ends_with(suffix));
        let suffixes: Vec<String> = if expects_property {
            self.properties.iter().map(|p| capitalize(p)).collect()
        } else {
            OPERATORS.iter().map(|o| o.to_string()).collect()
        };

        suffixes
            .into_iter()
            .map(|suffix| {
                let candidate = format!("{}{}", partial, suffix);
                Pair {
                    display: suffix,
                    replacement: candidate,
                }
            })
            .collect()
    }

    fn get_completions(&self, line: &str, pos: usize) -> Vec<Pair> {
        let start = Self::word_start(line, pos);
        let partial = &line[start..pos];
        let command = line.split_whitespace().next().unwrap_or("");

        if start == 0 && partial.starts_with('.') {
            return Self::pairs(COMMANDS.iter().copied(), partial);
        }

        match command {
            ".derive" | ".d" => self.method_name_completions(partial),
            ".use" => Self::pairs(self.entities.iter().map(String::as_str), partial),
            ".mode" => Self::pairs(["table", "json", "plain"], partial),
            ".entity" | ".help" | ".exit" | ".history" => Vec::new(),
            _ => {
                let mut completions = Self::pairs(QUERY_KEYWORDS.iter().copied(), partial);
                completions.extend(Self::pairs(self.entities.iter().map(String::as_str), partial));
                completions
            }
        }
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Completer for RxCompleter {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Pair>)> {
        Ok((Self::word_start(line, pos), self.get_completions(line, pos)))
    }
}

impl Hinter for RxCompleter {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() {
            return None;
        }

        match line.trim_end() {
            ".template" | ".t" => Some(" select u from User u where u.name like %:name%".to_string()),
            ".count" => Some(" select u from User u where u.age > ?1".to_string()),
            ".sort" => Some(" select u from User u ; name desc, age".to_string()),
            ".entity" => Some(" User *id:int name:text tags:[text]".to_string()),
            ".derive" | ".d" => Some(" findByNameContainingIgnoreCase".to_string()),
            _ => None,
        }
    }
}

impl Highlighter for RxCompleter {
    fn highlight_hint<'h>(&self, hint: &'h str) -> std::borrow::Cow<'h, str> {
        std::borrow::Cow::Owned(format!("\x1b[2m{}\x1b[0m", hint))
    }
}

impl Validator for RxCompleter {}

impl Helper for RxCompleter {}
