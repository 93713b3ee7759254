use serde::{Deserialize, Serialize};

/// One command within a pipeline/chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "|")]
    Pipe,
    #[serde(rename = "&&")]
    And,
}

/// A pipeline or chain of commands submitted to the approvals engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub operator: Operator,
    pub commands: Vec<Command>,
    pub purpose: String,
}

fn basename(command: &str) -> &str {
    command.rsplit('/').next().unwrap_or(command)
}

/// `basename(command) + " " + args joined by space` (§4.4).
pub fn full_command_string(command: &Command) -> String {
    let base = basename(&command.command);
    if command.args.is_empty() {
        base.to_string()
    } else {
        format!("{base} {}", command.args.join(" "))
    }
}

/// Per-family canonicalisation: known command families skip leading flags
/// and switch-arguments until the subcommand token; unknown commands
/// canonicalise to just their basename.
pub fn compute_prefix(command: &Command) -> String {
    let base = basename(&command.command);
    let family = KNOWN_FAMILIES.iter().find(|f| f.name == base);
    let Some(family) = family else {
        return base.to_string();
    };

    let mut iter = command.args.iter().peekable();
    while let Some(arg) = iter.peek() {
        if family.switch_flags.contains(&arg.as_str()) {
            iter.next();
            iter.next(); // consume the flag's value
            continue;
        }
        if arg.starts_with('-') {
            iter.next();
            continue;
        }
        break;
    }
    match iter.next() {
        Some(subcommand) => format!("{base} {subcommand}"),
        None => base.to_string(),
    }
}

struct CommandFamily {
    name: &'static str,
    /// Flags that consume a following value argument (e.g. `git -C <dir>`).
    switch_flags: &'static [&'static str],
}

const KNOWN_FAMILIES: &[CommandFamily] = &[
    CommandFamily { name: "git", switch_flags: &["-C", "-c"] },
    CommandFamily { name: "docker", switch_flags: &["-H", "--context"] },
    CommandFamily { name: "kubectl", switch_flags: &["-n", "--namespace", "--context"] },
    CommandFamily { name: "cargo", switch_flags: &["--manifest-path"] },
    CommandFamily { name: "npm", switch_flags: &["--prefix"] },
];

/// Shell interpreters whose `-c`/`-lc` invocation is hard-rejected to
/// prevent approval laundering (§4.4).
const SHELL_INTERPRETERS: &[&str] = &["sh", "bash", "zsh", "ksh", "dash", "fish"];

/// Returns `Some(reason)` if this command invokes a shell interpreter with
/// an inline script, or `env VAR=... shell ...`.
pub fn hard_rejection_reason(command: &Command) -> Option<String> {
    let base = basename(&command.command);
    if SHELL_INTERPRETERS.contains(&base) {
        if command.args.iter().any(|a| a == "-c" || a == "-lc") {
            return Some(format!(
                "shell invocation not allowed: {}",
                full_command_string(command)
            ));
        }
    }
    if base == "env" {
        let has_assignment = command.args.iter().any(|a| a.contains('=') && !a.starts_with('-'));
        let invokes_shell = command
            .args
            .iter()
            .any(|a| SHELL_INTERPRETERS.contains(&a.as_str()));
        if has_assignment && invokes_shell {
            return Some(format!(
                "shell invocation not allowed: {}",
                full_command_string(command)
            ));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_command_string() {
        let cmd = Command {
            command: "/usr/bin/git".to_string(),
            args: vec!["log".to_string(), "-n".to_string(), "1".to_string()],
        };
        assert_eq!(full_command_string(&cmd), "git log -n 1");
    }

    #[test]
    fn test_prefix_unknown_command_is_basename() {
        let cmd = Command {
            command: "rg".to_string(),
            args: vec!["pattern".to_string()],
        };
        assert_eq!(compute_prefix(&cmd), "rg");
    }

    #[test]
    fn test_prefix_known_family_skips_leading_flags() {
        let cmd = Command {
            command: "git".to_string(),
            args: vec!["--no-pager".to_string(), "log".to_string()],
        };
        assert_eq!(compute_prefix(&cmd), "git log");
    }

    #[test]
    fn test_prefix_known_family_skips_switch_argument() {
        let cmd = Command {
            command: "git".to_string(),
            args: vec!["-C".to_string(), "/tmp/repo".to_string(), "log".to_string()],
        };
        assert_eq!(compute_prefix(&cmd), "git log");
    }

    #[test]
    fn test_hard_rejection_bash_dash_c() {
        let cmd = Command {
            command: "bash".to_string(),
            args: vec!["-c".to_string(), "rm -rf /".to_string()],
        };
        let reason = hard_rejection_reason(&cmd).unwrap();
        assert_eq!(reason, "shell invocation not allowed: bash -c rm -rf /");
    }

    #[test]
    fn test_hard_rejection_env_var_shell() {
        let cmd = Command {
            command: "env".to_string(),
            args: vec!["FOO=bar".to_string(), "bash".to_string(), "-c".to_string(), "id".to_string()],
        };
        assert!(hard_rejection_reason(&cmd).is_some());
    }

    #[test]
    fn test_no_rejection_for_plain_command() {
        let cmd = Command {
            command: "git".to_string(),
            args: vec!["log".to_string(), "-n".to_string(), "1".to_string()],
        };
        assert!(hard_rejection_reason(&cmd).is_none());
    }
}
