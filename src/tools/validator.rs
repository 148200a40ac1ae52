//! Command Validation Module
//!
//! This module decides whether a proposed argument vector may run at all.
//! It uses an allowlist of base-command names plus a textual scan for shell
//! operators. Commands are never handed to a shell, so the operator scan is an
//! early, explicit rejection rather than the last line of defence.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Reasons a request is refused before any process is spawned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Empty command")]
    EmptyCommand,

    /// `also_detected` lists operators found in the same request. They do not
    /// change the verdict, they only enrich the diagnostic.
    #[error("Command not allowed: {command}{}", detected_suffix(.also_detected))]
    NotAllowed {
        command: String,
        also_detected: Vec<ShellOperator>,
    },

    #[error("Shell operators not allowed: {}", join_operators(.0))]
    ShellOperators(Vec<ShellOperator>),

    #[error("Directory not specified")]
    DirectoryNotSpecified,

    #[error("Directory does not exist: {0}")]
    DirectoryNotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Insufficient permissions for: {0}")]
    InsufficientPermissions(String),
}

/// Outcome of a validation step: `Ok(())` is accepted
pub type ValidationOutcome = Result<(), Rejection>;

fn join_operators(operators: &[ShellOperator]) -> String {
    operators
        .iter()
        .map(ShellOperator::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn detected_suffix(operators: &[ShellOperator]) -> String {
    if operators.is_empty() {
        String::new()
    } else {
        format!(" (shell operators also present: {})", join_operators(operators))
    }
}

/// Shell operators that are refused in request text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShellOperator {
    /// `;` command separator
    Semicolon,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `|`
    Pipe,
    /// `>`
    RedirectOut,
    /// `>>`
    Append,
    /// `<`
    RedirectIn,
    /// `<<`
    HereDoc,
}

impl ShellOperator {
    /// Every operator, in the order findings are reported
    pub const ALL: [ShellOperator; 8] = [
        ShellOperator::Semicolon,
        ShellOperator::And,
        ShellOperator::Or,
        ShellOperator::Pipe,
        ShellOperator::RedirectOut,
        ShellOperator::Append,
        ShellOperator::RedirectIn,
        ShellOperator::HereDoc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semicolon => ";",
            Self::And => "&&",
            Self::Or => "||",
            Self::Pipe => "|",
            Self::RedirectOut => ">",
            Self::Append => ">>",
            Self::RedirectIn => "<",
            Self::HereDoc => "<<",
        }
    }
}

impl fmt::Display for ShellOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable set of permitted base-command names
///
/// Cloning is cheap: all clones share one allocation. Entries keep the order of
/// first appearance so the list can be shown back to users as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    commands: Arc<Vec<String>>,
}

impl AllowList {
    /// Build an allowlist, dropping blanks and duplicates
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for command in commands {
            let command = command.into();
            let command = command.trim();
            if !command.is_empty() && !unique.iter().any(|c| c == command) {
                unique.push(command.to_string());
            }
        }
        Self {
            commands: Arc::new(unique),
        }
    }

    /// Parse a comma-separated list such as `"ls,cat, pwd"`
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    /// Exact, case-sensitive membership test
    pub fn contains(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Command validator that enforces the allowlist
///
/// # Rules
///
/// Evaluated in order, first failure wins:
///
/// 1. **Non-empty**: an empty argv is refused
/// 2. **Allowlist**: `argv[0]` must be an exact allowlist member
/// 3. **No shell operators**: the space-joined argv must not contain any
///    [`ShellOperator`]
#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    allowlist: AllowList,
}

impl CommandValidator {
    pub fn new(allowlist: AllowList) -> Self {
        Self { allowlist }
    }

    /// Validate an argument vector
    ///
    /// # Example
    ///
    /// ```
    /// use shell_gateway::tools::{AllowList, CommandValidator, Rejection};
    ///
    /// let validator = CommandValidator::new(AllowList::parse("ls,echo"));
    /// assert!(validator.validate(&["echo", "hello"]).is_ok());
    /// assert!(matches!(
    ///     validator.validate(&["rm", "-rf", "/"]),
    ///     Err(Rejection::NotAllowed { .. })
    /// ));
    /// ```
    pub fn validate<S: AsRef<str>>(&self, argv: &[S]) -> ValidationOutcome {
        let Some(base) = argv.first() else {
            return Err(Rejection::EmptyCommand);
        };

        let joined = argv.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        let operators = self.scan_for_shell_operators(&joined);

        if !self.is_allowed(base.as_ref()) {
            return Err(Rejection::NotAllowed {
                command: base.as_ref().to_string(),
                also_detected: operators,
            });
        }

        if !operators.is_empty() {
            return Err(Rejection::ShellOperators(operators));
        }

        Ok(())
    }

    /// Check if a base command is in the allowlist
    pub fn is_allowed(&self, command: &str) -> bool {
        self.allowlist.contains(command)
    }

    /// Report every shell operator present in `text`
    ///
    /// Each operator appears at most once, in [`ShellOperator::ALL`] order.
    /// Matching is by substring, so `>>` in the text reports both `>` and `>>`.
    pub fn scan_for_shell_operators(&self, text: &str) -> Vec<ShellOperator> {
        ShellOperator::ALL
            .into_iter()
            .filter(|op| text.contains(op.as_str()))
            .collect()
    }

    pub fn allowlist(&self) -> &AllowList {
        &self.allowlist
    }

    /// Allowed commands, in configured order
    pub fn allowed_commands(&self) -> &[String] {
        self.allowlist.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn validator(list: &str) -> CommandValidator {
        CommandValidator::new(AllowList::parse(list))
    }

    #[test]
    fn test_allowlist_parse_trims_and_dedups() {
        let list = AllowList::parse(" ls, cat,,ls ,pwd ");
        assert_eq!(list.as_slice(), ["ls", "cat", "pwd"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_empty_allowlist_permits_nothing() {
        let validator = CommandValidator::default();
        assert!(validator.allowlist().is_empty());
        assert!(!validator.is_allowed("ls"));
        assert!(!validator.is_allowed(""));
        assert!(matches!(
            validator.validate(&["ls"]),
            Err(Rejection::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_is_allowed_exact_match() {
        let validator = validator("ls,echo");
        assert!(validator.is_allowed("ls"));
        assert!(validator.is_allowed("echo"));

        assert!(!validator.is_allowed("LS"));
        assert!(!validator.is_allowed("/bin/ls"));
        assert!(!validator.is_allowed("ls "));
        assert!(!validator.is_allowed("./echo"));
    }

    #[test]
    fn test_validate_accepts_allowed_command() {
        let validator = validator("ls,echo");
        assert_eq!(validator.validate(&["echo", "hello"]), Ok(()));
        assert_eq!(validator.validate(&["ls", "-la", "/tmp"]), Ok(()));
    }

    #[test]
    fn test_validate_empty_command() {
        let validator = validator("ls");
        let empty: [&str; 0] = [];
        assert_eq!(validator.validate(&empty), Err(Rejection::EmptyCommand));
    }

    #[test]
    fn test_validate_not_allowed_message() {
        let validator = validator("ls");
        let err = validator.validate(&["rm", "-rf", "/"]).unwrap_err();
        assert_eq!(err.to_string(), "Command not allowed: rm");
    }

    #[test]
    fn test_not_allowed_reported_before_operators() {
        let validator = validator("ls");
        let err = validator.validate(&["cat", "a", "|", "grep", "b"]).unwrap_err();

        assert_eq!(
            err,
            Rejection::NotAllowed {
                command: "cat".to_string(),
                also_detected: vec![ShellOperator::Pipe],
            }
        );
        assert_eq!(
            err.to_string(),
            "Command not allowed: cat (shell operators also present: |)"
        );
    }

    #[test]
    fn test_validate_rejects_operators_in_arguments() {
        let validator = validator("ls,echo");

        let err = validator.validate(&["ls", ";", "rm", "-rf", "/"]).unwrap_err();
        assert_eq!(err, Rejection::ShellOperators(vec![ShellOperator::Semicolon]));
        assert_eq!(err.to_string(), "Shell operators not allowed: ;");

        let err = validator.validate(&["echo", "a&&b"]).unwrap_err();
        assert_eq!(err, Rejection::ShellOperators(vec![ShellOperator::And]));
    }

    #[test]
    fn test_scan_reports_in_declared_order() {
        let validator = validator("");
        let found = validator.scan_for_shell_operators("cat < in | sort > out; echo done");
        assert_eq!(
            found,
            vec![
                ShellOperator::Semicolon,
                ShellOperator::Pipe,
                ShellOperator::RedirectOut,
                ShellOperator::RedirectIn,
            ]
        );
    }

    #[test]
    fn test_scan_substring_overlaps() {
        let validator = validator("");

        assert_eq!(
            validator.scan_for_shell_operators("a >> b"),
            vec![ShellOperator::RedirectOut, ShellOperator::Append]
        );
        assert_eq!(
            validator.scan_for_shell_operators("a || b"),
            vec![ShellOperator::Or, ShellOperator::Pipe]
        );
        assert_eq!(
            validator.scan_for_shell_operators("cat << EOF"),
            vec![ShellOperator::RedirectIn, ShellOperator::HereDoc]
        );
    }

    #[test]
    fn test_scan_deduplicates() {
        let validator = validator("");
        assert_eq!(
            validator.scan_for_shell_operators("a; b; c;"),
            vec![ShellOperator::Semicolon]
        );
    }

    #[test]
    fn test_scan_clean_text() {
        let validator = validator("");
        let clean = [
            "ls -la /tmp",
            "grep -r pattern .",
            "find . -name '*.rs'",
            "echo $HOME",
            "wc -l file-name_with.dots",
        ];
        for text in clean {
            assert!(
                validator.scan_for_shell_operators(text).is_empty(),
                "should be clean: {}",
                text
            );
        }
    }

    #[test]
    fn test_operator_display() {
        let rendered: Vec<String> = ShellOperator::ALL.iter().map(|op| op.to_string()).collect();
        assert_eq!(rendered, [";", "&&", "||", "|", ">", ">>", "<", "<<"]);
    }

    #[test]
    fn test_validator_clones_share_allowlist() {
        let original = validator("ls,cat");
        let clone = original.clone();
        assert_eq!(original.allowlist(), clone.allowlist());
        assert_eq!(clone.allowed_commands(), ["ls", "cat"]);
    }

    proptest! {
        #[test]
        fn prop_unlisted_base_always_not_allowed(
            base in "[a-z]{1,12}",
            args in prop::collection::vec(".{0,16}", 0..5)
        ) {
            prop_assume!(base != "ls" && base != "echo");
            let validator = validator("ls,echo");
            let mut argv = vec![base.clone()];
            argv.extend(args);
            let is_not_allowed = matches!(
                validator.validate(argv.as_slice()),
                Err(Rejection::NotAllowed { ref command, .. }) if *command == base
            );
            prop_assert!(is_not_allowed);
        }

        #[test]
        fn prop_scan_matches_substring_presence(text in "[a-z ;&|<>]{0,24}") {
            let validator = validator("");
            let found = validator.scan_for_shell_operators(&text);
            for op in ShellOperator::ALL {
                prop_assert_eq!(found.contains(&op), text.contains(op.as_str()));
            }
            let mut deduped = found.clone();
            deduped.dedup();
            prop_assert_eq!(deduped, found);
        }

        #[test]
        fn prop_safe_arguments_accepted(
            args in prop::collection::vec("[a-zA-Z0-9_./-]{1,12}", 0..6)
        ) {
            let validator = validator("echo");
            let mut argv = vec!["echo".to_string()];
            argv.extend(args);
            prop_assert_eq!(validator.validate(argv.as_slice()), Ok(()));
        }
    }
}
