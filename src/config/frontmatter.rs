//! Resolution of external per-agent files: a YAML-like frontmatter block
//! between `---` delimiters, followed by free-form text taken as the
//! agent's system prompt unless the frontmatter sets one explicitly.

use std::path::Path;

use crate::error::ConfigError;

use super::AgentSpec;

pub fn load_agent_file(path: &Path) -> Result<AgentSpec, ConfigError> {
    if path.extension().and_then(|e| e.to_str()) != Some("md") {
        return Err(ConfigError::BadExternalExtension {
            path: path.to_path_buf(),
        });
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let (frontmatter_raw, body) = split_frontmatter(&raw, path)?;

    let mut value: serde_yaml::Value =
        serde_yaml::from_str(frontmatter_raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let has_explicit_prompt = value
        .as_mapping()
        .map(|m| m.contains_key(serde_yaml::Value::String("prompt".to_string())))
        .unwrap_or(false);

    if !has_explicit_prompt {
        if let serde_yaml::Value::Mapping(map) = &mut value {
            map.insert(
                serde_yaml::Value::String("prompt".to_string()),
                serde_yaml::Value::String(body.trim().to_string()),
            );
        }
    }

    serde_yaml::from_value(value).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Split `raw` into the frontmatter block body and the trailing free text.
/// Expects the document to start with a `---` delimiter line.
fn split_frontmatter<'a>(raw: &'a str, path: &Path) -> Result<(&'a str, &'a str), ConfigError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(after_open) = raw.strip_prefix("---") else {
        return Err(ConfigError::UnclosedFrontmatter {
            path: path.to_path_buf(),
        });
    };
    let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);

    let Some(close_rel) = find_closing_delimiter(after_open) else {
        return Err(ConfigError::UnclosedFrontmatter {
            path: path.to_path_buf(),
        });
    };

    let frontmatter = &after_open[..close_rel];
    let rest = &after_open[close_rel..];
    let body = rest
        .strip_prefix("---")
        .unwrap_or(rest)
        .trim_start_matches('\n');

    Ok((frontmatter, body))
}

fn find_closing_delimiter(s: &str) -> Option<usize> {
    let mut offset = 0;
    for line in s.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
        if trimmed == "---" {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_md(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn body_becomes_prompt_when_frontmatter_omits_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_md(
            &dir,
            "agent.md",
            "---\ndescription: does things\n---\nYou are a careful assistant.\n",
        );
        let spec = load_agent_file(&path).unwrap();
        assert_eq!(spec.description, "does things");
        assert_eq!(spec.prompt, "You are a careful assistant.");
    }

    #[test]
    fn explicit_frontmatter_prompt_wins_over_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_md(
            &dir,
            "agent.md",
            "---\ndescription: d\nprompt: explicit prompt\n---\nignored body\n",
        );
        let spec = load_agent_file(&path).unwrap();
        assert_eq!(spec.prompt, "explicit prompt");
    }

    #[test]
    fn rejects_non_markdown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_md(&dir, "agent.txt", "---\ndescription: d\n---\n");
        let err = load_agent_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::BadExternalExtension { .. }));
    }

    #[test]
    fn unclosed_frontmatter_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_md(&dir, "agent.md", "---\ndescription: d\n");
        let err = load_agent_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnclosedFrontmatter { .. }));
    }
}
