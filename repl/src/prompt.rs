use super::display::DisplayConfig;
use colored::Colorize;

pub fn generate_prompt(in_multiline: bool, entity: Option<&str>, config: &DisplayConfig) -> String {
    if in_multiline {
        return if config.use_colors {
            "    ... ".bright_black().to_string()
        } else {
            "    ... ".to_string()
        };
    }

    let base = "rxrepo";
    let scope = entity.map(|e| format!("[{}]", e)).unwrap_or_default();
    if config.use_colors {
        format!("{}{}> ", base.bright_cyan().bold(), scope.bright_black())
    } else {
        format!("{}{}> ", base, scope)
    }
}
