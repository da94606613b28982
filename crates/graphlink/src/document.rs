//! `.graphql` document parsing and file-import glue.
//!
//! Documents are plain GraphQL source text. `#import "path"` comment
//! directives are resolved relative to the importing file before parsing,
//! and the parser produces the list of named/anonymous operations with an
//! operation kind each. At most one operation may be anonymous, and never
//! alongside named operations in the same document.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{ClientError, Result};

/// The kind of a GraphQL operation.
///
/// The mapping from keyword to kind is a closed set; an unrecognized
/// top-level keyword maps to [`OperationKind::Unknown`] with a logged
/// warning rather than failing the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    /// A read-only query.
    #[default]
    Query,
    /// A mutation.
    Mutation,
    /// A live subscription.
    Subscription,
    /// Sentinel for an unrecognized operation keyword.
    Unknown,
}

impl OperationKind {
    /// Map an operation keyword to a kind.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "query" => Self::Query,
            "mutation" => Self::Mutation,
            "subscription" => Self::Subscription,
            _ => Self::Unknown,
        }
    }
}

/// One operation found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// The operation name; `None` for anonymous operations.
    pub name: Option<String>,
    /// The operation kind.
    pub kind: OperationKind,
}

/// A parsed GraphQL document.
#[derive(Debug, Clone)]
pub struct Document {
    /// The full source text, with imports already resolved.
    pub source: String,
    /// The operations defined in the document, in source order.
    pub operations: Vec<Operation>,
}

/// Read a `.graphql` file, resolve its `#import` directives, and parse it.
pub fn load_document(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut seen = HashSet::new();
    seen.insert(canonical(path));
    let resolved = resolve_imports_inner(&source, base_dir, &mut seen)?;

    tracing::debug!(
        target: "graphlink::document",
        path = %path.display(),
        "document loaded"
    );
    parse_document(&resolved)
}

/// Replace `#import "path"` lines with the referenced file's content.
///
/// Paths are resolved relative to `base_dir`; imported files may import
/// further files relative to their own location. Import cycles are
/// skipped with a warning.
pub fn resolve_imports(source: &str, base_dir: impl AsRef<Path>) -> Result<String> {
    let mut seen = HashSet::new();
    resolve_imports_inner(source, base_dir.as_ref(), &mut seen)
}

fn resolve_imports_inner(
    source: &str,
    base_dir: &Path,
    seen: &mut HashSet<PathBuf>,
) -> Result<String> {
    let mut resolved = String::with_capacity(source.len());

    for line in source.lines() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix("#import") else {
            resolved.push_str(line);
            resolved.push('\n');
            continue;
        };

        let Some(import_path) = parse_import_path(rest) else {
            tracing::warn!(
                target: "graphlink::document",
                line = %trimmed,
                "malformed #import directive, leaving as comment"
            );
            resolved.push_str(line);
            resolved.push('\n');
            continue;
        };

        let target = base_dir.join(import_path);
        let key = canonical(&target);
        if !seen.insert(key) {
            tracing::warn!(
                target: "graphlink::document",
                path = %target.display(),
                "import cycle detected, skipping"
            );
            continue;
        }

        let imported = std::fs::read_to_string(&target)?;
        let imported_dir = target.parent().unwrap_or_else(|| Path::new("."));
        resolved.push_str(&resolve_imports_inner(&imported, imported_dir, seen)?);
        resolved.push('\n');
    }

    Ok(resolved)
}

fn parse_import_path(rest: &str) -> Option<&str> {
    let rest = rest.trim();
    let quoted = rest.strip_prefix('"').or_else(|| rest.strip_prefix('\''))?;
    quoted
        .find(['"', '\''])
        .map(|end| &quoted[..end])
        .filter(|p| !p.is_empty())
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Parse GraphQL source into its operation list.
///
/// Fails with [`ClientError::Document`] when more than one operation is
/// anonymous or an anonymous operation appears alongside named ones.
pub fn parse_document(source: &str) -> Result<Document> {
    let operations = scan_operations(source);

    let anonymous = operations.iter().filter(|op| op.name.is_none()).count();
    if anonymous > 1 {
        return Err(ClientError::Document(
            "at most one operation may be anonymous".into(),
        ));
    }
    if anonymous == 1 && operations.len() > 1 {
        return Err(ClientError::Document(
            "an anonymous operation may not appear alongside named operations".into(),
        ));
    }

    Ok(Document {
        source: source.to_string(),
        operations,
    })
}

/// Scan for top-level operation definitions.
///
/// Tracks brace/paren depth, string literals, and comments so only
/// definition-level tokens are considered. Fragment definitions are
/// recognized and skipped.
fn scan_operations(source: &str) -> Vec<Operation> {
    let mut operations = Vec::new();
    let mut brace_depth = 0usize;
    let mut paren_depth = 0usize;
    // Keyword and optional name of the definition being read.
    let mut pending: Option<(String, Option<String>)> = None;

    let mut chars = source.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        match ch {
            '#' => {
                while let Some(&(_, c)) = chars.peek() {
                    chars.next();
                    if c == '\n' {
                        break;
                    }
                }
            }
            '"' => {
                skip_string(&mut chars);
            }
            '{' => {
                if brace_depth == 0 && paren_depth == 0 {
                    match pending.take() {
                        Some((keyword, _)) if keyword == "fragment" => {}
                        Some((keyword, name)) => {
                            let kind = OperationKind::from_keyword(&keyword);
                            if kind == OperationKind::Unknown {
                                tracing::warn!(
                                    target: "graphlink::document",
                                    keyword = %keyword,
                                    "unrecognized operation kind"
                                );
                            }
                            operations.push(Operation { name, kind });
                        }
                        // Shorthand `{ ... }` is an anonymous query.
                        None => operations.push(Operation {
                            name: None,
                            kind: OperationKind::Query,
                        }),
                    }
                }
                brace_depth += 1;
            }
            '}' => {
                brace_depth = brace_depth.saturating_sub(1);
            }
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            '@' => {
                // Directive: the following name is not an operation name.
                while let Some(&(_, c)) = chars.peek() {
                    if is_name_continue(c) {
                        chars.next();
                    } else {
                        break;
                    }
                }
            }
            c if is_name_start(c) => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, c)) = chars.peek() {
                    if is_name_continue(c) {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                if brace_depth == 0 && paren_depth == 0 {
                    let word = &source[start..end];
                    match &mut pending {
                        None => pending = Some((word.to_string(), None)),
                        Some((_, name @ None)) => *name = Some(word.to_string()),
                        // `fragment Name on Type` and similar trailing
                        // tokens carry no operation name.
                        Some(_) => {}
                    }
                }
            }
            _ => {}
        }
    }

    operations
}

fn skip_string(chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>) {
    // Block string if two more quotes follow, otherwise a normal string.
    let mut lookahead = chars.clone();
    let block = matches!(
        (lookahead.next(), lookahead.next()),
        (Some((_, '"')), Some((_, '"')))
    );

    if block {
        chars.next();
        chars.next();
        let mut quotes = 0;
        for (_, c) in chars.by_ref() {
            if c == '"' {
                quotes += 1;
                if quotes == 3 {
                    return;
                }
            } else {
                quotes = 0;
            }
        }
    } else {
        let mut escaped = false;
        for (_, c) in chars.by_ref() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => return,
                _ => {}
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
