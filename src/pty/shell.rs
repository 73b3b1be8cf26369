use std::env;

const FALLBACK_SHELL: &str = "/bin/sh";

/// The user's shell: `$SHELL` when set, otherwise `/bin/sh`.
pub fn detect_shell() -> String {
    match env::var("SHELL") {
        Ok(shell) if !shell.is_empty() => shell,
        _ => FALLBACK_SHELL.to_string(),
    }
}

/// Get the shell name from its full path (e.g. "/bin/zsh" -> "zsh").
pub fn shell_name(shell_path: &str) -> &str {
    shell_path.rsplit('/').next().unwrap_or(shell_path)
}
