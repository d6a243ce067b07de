//! Available commands and autocomplete logic

use crate::config::ResourceConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: String,
  pub aliases: Vec<String>,
  pub description: String,
}

impl Command {
  fn new(name: &str, aliases: &[&str], description: &str) -> Self {
    Self {
      name: name.to_string(),
      aliases: aliases.iter().map(|a| a.to_string()).collect(),
      description: description.to_string(),
    }
  }
}

/// Name of the built-in exit command
pub const QUIT: &str = "quit";

/// One command per configured resource, followed by the built-ins
pub fn build_commands(resources: &[ResourceConfig]) -> Vec<Command> {
  let mut commands: Vec<Command> = resources
    .iter()
    .map(|r| Command {
      name: r.name.to_lowercase(),
      aliases: r.aliases.iter().map(|a| a.to_lowercase()).collect(),
      description: r
        .description
        .clone()
        .unwrap_or_else(|| format!("Browse {}", r.table())),
    })
    .collect();

  commands.push(Command::new(QUIT, &["q", "exit"], "Exit opsdeck"));
  commands
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions<'a>(commands: &'a [Command], input: &str) -> Vec<&'a Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return commands.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in commands {
    let aliases = || cmd.aliases.iter().map(String::as_str);

    let priority = if cmd.name == input_lower {
      0
    } else if aliases().any(|a| a == input_lower) {
      1
    } else if cmd.name.starts_with(&input_lower) {
      2
    } else if aliases().any(|a| a.starts_with(&input_lower)) {
      3
    } else if cmd.name.contains(&input_lower) {
      4
    } else if aliases().any(|a| a.contains(&input_lower)) {
      5
    } else {
      continue;
    };

    matches.push((cmd, priority));
  }

  // Stable sort keeps configuration order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
