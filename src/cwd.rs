//! Working-directory extraction from terminal titles
//!
//! Most shells set the terminal title to something like
//! `user@host: ~/projects/app`. The title is an untrusted heuristic, not a
//! protocol: extraction is best-effort, and anything that does not yield an
//! absolute path is discarded silently.

use std::path::PathBuf;

/// Extract an absolute working directory from a terminal title.
///
/// Tried in order, first success wins:
/// 1. the text after the final colon, trimmed;
/// 2. a leading `~/`-prefixed or absolute path.
///
/// A leading `~` is expanded with `home`. Returns `None` unless the result
/// is an absolute path.
pub fn extract_cwd(title: &str, home: &str) -> Option<PathBuf> {
    let candidate = after_final_colon(title).or_else(|| leading_path(title))?;

    let expanded = if let Some(rest) = candidate.strip_prefix('~') {
        format!("{}{}", home, rest)
    } else {
        candidate.to_string()
    };

    if expanded.starts_with('/') {
        Some(PathBuf::from(expanded))
    } else {
        None
    }
}

fn after_final_colon(title: &str) -> Option<&str> {
    let (_, after) = title.rsplit_once(':')?;
    let after = after.trim();
    if after.is_empty() {
        None
    } else {
        Some(after)
    }
}

fn leading_path(title: &str) -> Option<&str> {
    if title.starts_with("~/") {
        return Some(title);
    }
    if title.starts_with('/') {
        // Bare absolute paths end at the first whitespace
        let path = title.split_whitespace().next()?;
        if path.len() > 1 {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "/home/alice";

    #[test]
    fn user_at_host_title_with_tilde() {
        assert_eq!(
            extract_cwd("alice@host: ~/projects/app", HOME),
            Some(PathBuf::from("/home/alice/projects/app"))
        );
    }

    #[test]
    fn title_with_absolute_path_after_colon() {
        assert_eq!(
            extract_cwd("bash: /etc", HOME),
            Some(PathBuf::from("/etc"))
        );
    }

    #[test]
    fn plain_text_yields_nothing() {
        assert_eq!(extract_cwd("random text with no path", HOME), None);
    }

    #[test]
    fn bare_tilde_path_keeps_spaces() {
        assert_eq!(
            extract_cwd("~/work dir", HOME),
            Some(PathBuf::from("/home/alice/work dir"))
        );
    }

    #[test]
    fn bare_absolute_path_stops_at_whitespace() {
        assert_eq!(
            extract_cwd("/usr/local/bin extra words", HOME),
            Some(PathBuf::from("/usr/local/bin"))
        );
    }

    #[test]
    fn relative_text_after_colon_is_discarded() {
        // The colon pattern wins, so a relative candidate never falls back
        assert_eq!(extract_cwd("title: not-a-path", HOME), None);
    }

    #[test]
    fn trailing_colon_falls_back_to_leading_path() {
        assert_eq!(extract_cwd("foo:", HOME), None);
        assert_eq!(
            extract_cwd("~/projects:", HOME),
            Some(PathBuf::from("/home/alice/projects:"))
        );
    }

    #[test]
    fn lone_slash_is_not_a_path() {
        assert_eq!(extract_cwd("/", HOME), None);
    }
}
