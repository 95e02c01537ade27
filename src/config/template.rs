//! Phase (b) of config loading: render the raw document as a template before
//! it is parsed as YAML.
//!
//! Supports `{{ NAME }}` interpolation and `{% if COND %} ... {% endif %}` /
//! `{% for X in LIST %} ... {% endfor %}` blocks, all resolved against the
//! process environment exposed as read-only bindings. This is deliberately
//! small: the pack has no precedent for a full template engine (see
//! DESIGN.md), so this stays a single hand-rolled pre-pass rather than a new
//! dependency.

use std::collections::HashMap;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Expr(String),
    If { cond: String, body: Vec<Node> },
    For { var: String, list: String, body: Vec<Node> },
}

#[derive(Debug, Clone)]
enum Tag {
    Text(String),
    Expr(String),
    IfStart(String),
    ForStart(String, String),
    EndIf,
    EndFor,
}

/// Render `source` as a template, using `env` as the variable bindings.
/// `path` and an approximate line number are attached to any error for the
/// `ConfigError::Template` variant.
pub fn render(
    source: &str,
    env: &HashMap<String, String>,
    path: &std::path::Path,
) -> Result<String, ConfigError> {
    let tags = tokenize(source, path)?;
    let (nodes, rest) = parse_block(&tags, path)?;
    if !rest.is_empty() {
        return Err(ConfigError::Template {
            path: path.to_path_buf(),
            line: line_of(source, source.len()),
            message: "unexpected closing tag with no matching opener".to_string(),
        });
    }
    let mut out = String::new();
    render_nodes(&nodes, env, &mut out, path, source)?;
    Ok(out)
}

fn line_of(source: &str, byte_offset: usize) -> usize {
    source[..byte_offset.min(source.len())]
        .bytes()
        .filter(|b| *b == b'\n')
        .count()
        + 1
}

fn tokenize(source: &str, path: &std::path::Path) -> Result<Vec<Tag>, ConfigError> {
    let mut tags = Vec::new();
    let mut rest = source;
    let mut consumed = 0usize;

    loop {
        let next_expr = rest.find("{{");
        let next_tag = rest.find("{%");
        let next = match (next_expr, next_tag) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };

        let Some(start) = next else {
            if !rest.is_empty() {
                tags.push(Tag::Text(rest.to_string()));
            }
            break;
        };

        if start > 0 {
            tags.push(Tag::Text(rest[..start].to_string()));
        }
        consumed += start;

        let is_expr = rest[start..].starts_with("{{");
        let (close, rest_after) = if is_expr {
            (rest[start..].find("}}"), "}}")
        } else {
            (rest[start..].find("%}"), "%}")
        };

        let Some(close_rel) = close else {
            return Err(ConfigError::Template {
                path: path.to_path_buf(),
                line: line_of(source, consumed),
                message: "unterminated template tag".to_string(),
            });
        };

        let open_len = if is_expr { 2 } else { 2 };
        let body_start = start + open_len;
        let body_end = start + close_rel;
        let body = rest[body_start..body_end].trim();

        if is_expr {
            tags.push(Tag::Expr(body.to_string()));
        } else if let Some(cond) = body.strip_prefix("if ") {
            tags.push(Tag::IfStart(cond.trim().to_string()));
        } else if body == "endif" {
            tags.push(Tag::EndIf);
        } else if let Some(spec) = body.strip_prefix("for ") {
            let spec = spec.trim();
            let Some((var, list)) = spec.split_once(" in ") else {
                return Err(ConfigError::Template {
                    path: path.to_path_buf(),
                    line: line_of(source, consumed),
                    message: format!("malformed for-loop header: '{}'", spec),
                });
            };
            tags.push(Tag::ForStart(var.trim().to_string(), list.trim().to_string()));
        } else if body == "endfor" {
            tags.push(Tag::EndFor);
        } else {
            return Err(ConfigError::Template {
                path: path.to_path_buf(),
                line: line_of(source, consumed),
                message: format!("unrecognized template tag: '{}'", body),
            });
        }

        let advance = body_end + rest_after.len();
        consumed += advance - start;
        rest = &rest[advance..];
    }

    Ok(tags)
}

fn parse_block<'a>(tags: &'a [Tag], path: &std::path::Path) -> Result<(Vec<Node>, &'a [Tag]), ConfigError> {
    let mut nodes = Vec::new();
    let mut rest = tags;

    while let Some((tag, tail)) = rest.split_first() {
        match tag {
            Tag::Text(t) => {
                nodes.push(Node::Text(t.clone()));
                rest = tail;
            }
            Tag::Expr(e) => {
                nodes.push(Node::Expr(e.clone()));
                rest = tail;
            }
            Tag::IfStart(cond) => {
                let (body, after) = parse_block(tail, path)?;
                let Some((Tag::EndIf, after)) = after.split_first() else {
                    return Err(ConfigError::Template {
                        path: path.to_path_buf(),
                        line: 0,
                        message: "missing {% endif %}".to_string(),
                    });
                };
                nodes.push(Node::If {
                    cond: cond.clone(),
                    body,
                });
                rest = after;
            }
            Tag::ForStart(var, list) => {
                let (body, after) = parse_block(tail, path)?;
                let Some((Tag::EndFor, after)) = after.split_first() else {
                    return Err(ConfigError::Template {
                        path: path.to_path_buf(),
                        line: 0,
                        message: "missing {% endfor %}".to_string(),
                    });
                };
                nodes.push(Node::For {
                    var: var.clone(),
                    list: list.clone(),
                    body,
                });
                rest = after;
            }
            Tag::EndIf | Tag::EndFor => return Ok((nodes, rest)),
        }
    }

    Ok((nodes, rest))
}

fn render_nodes(
    nodes: &[Node],
    env: &HashMap<String, String>,
    out: &mut String,
    path: &std::path::Path,
    source: &str,
) -> Result<(), ConfigError> {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Expr(e) => {
                out.push_str(&lookup(e, env).unwrap_or_default());
            }
            Node::If { cond, body } => {
                if eval_cond(cond, env) {
                    render_nodes(body, env, out, path, source)?;
                }
            }
            Node::For { var, list, body } => {
                for item in eval_list(list, env) {
                    let mut scoped = env.clone();
                    scoped.insert(var.clone(), item);
                    render_nodes(body, &scoped, out, path, source)?;
                }
            }
        }
    }
    Ok(())
}

fn lookup(name: &str, env: &HashMap<String, String>) -> Option<String> {
    env.get(name.trim()).cloned()
}

fn eval_cond(cond: &str, env: &HashMap<String, String>) -> bool {
    let cond = cond.trim();
    if let Some(name) = cond.strip_prefix('!') {
        return !truthy(name.trim(), env);
    }
    if let Some((lhs, rhs)) = cond.split_once("==") {
        let lhs = lookup(lhs.trim(), env).unwrap_or_default();
        let rhs = rhs.trim().trim_matches('"').to_string();
        return lhs == rhs;
    }
    if let Some((lhs, rhs)) = cond.split_once("!=") {
        let lhs = lookup(lhs.trim(), env).unwrap_or_default();
        let rhs = rhs.trim().trim_matches('"').to_string();
        return lhs != rhs;
    }
    truthy(cond, env)
}

fn truthy(name: &str, env: &HashMap<String, String>) -> bool {
    match env.get(name) {
        Some(v) => !v.is_empty() && v != "0" && v != "false",
        None => false,
    }
}

fn eval_list(list: &str, env: &HashMap<String, String>) -> Vec<String> {
    let list = list.trim();
    let inner = if let Some(stripped) = list.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        stripped.to_string()
    } else {
        lookup(list, env).unwrap_or_default()
    };
    inner
        .split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn interpolates_simple_variable() {
        let e = env(&[("NAME", "swarm-one")]);
        let out = render("name: {{ NAME }}", &e, std::path::Path::new("x")).unwrap();
        assert_eq!(out, "name: swarm-one");
    }

    #[test]
    fn renders_if_block_when_truthy() {
        let e = env(&[("ENABLE_X", "1")]);
        let out = render(
            "{% if ENABLE_X %}has_x: true{% endif %}",
            &e,
            std::path::Path::new("x"),
        )
        .unwrap();
        assert_eq!(out, "has_x: true");
    }

    #[test]
    fn skips_if_block_when_falsy() {
        let e = env(&[]);
        let out = render(
            "{% if ENABLE_X %}has_x: true{% endif %}",
            &e,
            std::path::Path::new("x"),
        )
        .unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn renders_for_loop_over_literal_list() {
        let e = env(&[]);
        let out = render(
            "{% for AGENT in [a, b, c] %}- {{ AGENT }}\n{% endfor %}",
            &e,
            std::path::Path::new("x"),
        )
        .unwrap();
        assert_eq!(out, "- a\n- b\n- c\n");
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let e = env(&[]);
        let err = render("{{ NAME", &e, std::path::Path::new("cfg.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Template { .. }));
    }
}
