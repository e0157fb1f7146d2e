//! Rule compilation.
//!
//! Rules are configured as one string:
//!
//! ```text
//! pattern:template[;template...][|pattern:template[;template...]]...
//! ```
//!
//! - `|` separates rules, `:` separates a pattern from its templates and `;`
//!   separates templates.
//! - A doubled delimiter is one literal character: `||` for `|` anywhere,
//!   `::` for `:` anywhere in a rule, `;;` for `;` inside templates. Nothing
//!   else is escaped, so regex backslash escapes pass through untouched.
//! - Patterns use the `regex` crate syntax and match the raw bytes of a
//!   name, so names that are not UTF-8 can match too. Templates reference captures as
//!   `$1`, `${1}`, `$name` or `${name}`; `$$` is a literal dollar sign. A `$`
//!   followed by digits always means the group with exactly those digits, so
//!   `b$1file` is `b`, group 1, `file`.
//!
//! - Group syntax that starts with `(?:` or `(?i:` has to double its colon,
//!   as in `(?::a|b)`.
//!
//! The order of rules and of templates within a rule is preserved.

use crate::error::ConfigError;
use crate::matcher::{self, Expansion};
use regex::bytes::Regex;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;
use tracing::debug;

/// Separates rules in a configuration string.
pub const RULE_SEPARATOR: char = '|';

/// Separates a pattern from its templates.
pub const PATTERN_SEPARATOR: char = ':';

/// Separates templates of one rule.
pub const TEMPLATE_SEPARATOR: char = ';';

/// Comment prefix for rules files.
const COMMENT_PREFIX: char = '#';

/// A replacement template with captures rewritten into braced form.
#[derive(Debug, Clone)]
struct Template {
    /// Template as written in the configuration.
    source: String,
    /// Template handed to `Captures::expand`.
    expansion: String,
}

/// A compiled pattern with its ordered replacement templates.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    templates: Vec<Template>,
}

impl Rule {
    /// Compiles a pattern and its templates.
    ///
    /// Fails if the pattern does not compile, if no template is given, or if
    /// a template references a group the pattern does not define.
    pub fn new<S: AsRef<str>>(pattern: &str, templates: &[S]) -> Result<Self, ConfigError> {
        if pattern.is_empty() {
            return Err(ConfigError::EmptyPattern {
                rule: pattern.to_string(),
            });
        }
        if templates.is_empty() {
            return Err(ConfigError::NoTemplates {
                pattern: pattern.to_string(),
            });
        }

        let regex = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let templates = templates
            .iter()
            .map(|t| compile_template(&regex, t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pattern: regex,
            templates,
        })
    }

    /// Parses a single `pattern:template[;template...]` rule.
    pub fn parse(rule: &str) -> Result<Self, ConfigError> {
        let mut parts = split_escaped(rule, PATTERN_SEPARATOR);
        match parts.len() {
            1 => {
                return Err(ConfigError::MissingSeparator {
                    rule: rule.to_string(),
                });
            }
            2 => {}
            _ => {
                return Err(ConfigError::UnexpectedSeparator {
                    rule: rule.to_string(),
                });
            }
        }

        let templates = split_escaped(&parts.pop().unwrap_or_default(), TEMPLATE_SEPARATOR);
        let pattern = parts.pop().unwrap_or_default();
        if pattern.is_empty() {
            return Err(ConfigError::EmptyPattern {
                rule: rule.to_string(),
            });
        }

        Self::new(&pattern, &templates)
    }

    /// The pattern source.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// The templates as written, in order.
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.source.as_str())
    }

    pub fn is_match(&self, name: impl AsRef<OsStr>) -> bool {
        self.pattern.is_match(name.as_ref().as_bytes())
    }

    /// Appends the candidates this rule generates for `name`.
    ///
    /// The first match of the pattern is replaced by each template in turn;
    /// text before and after the match is kept. Returns false, leaving `out`
    /// untouched, if the pattern does not match.
    pub(crate) fn apply(&self, name: &OsStr, out: &mut Vec<OsString>) -> bool {
        let name = name.as_bytes();
        let Some(captures) = self.pattern.captures(name) else {
            return false;
        };
        let Some(whole) = captures.get(0) else {
            return false;
        };

        for template in &self.templates {
            let mut candidate = Vec::with_capacity(name.len() + template.expansion.len());
            candidate.extend_from_slice(&name[..whole.start()]);
            captures.expand(template.expansion.as_bytes(), &mut candidate);
            candidate.extend_from_slice(&name[whole.end()..]);
            out.push(OsString::from_vec(candidate));
        }
        true
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let templates: Vec<_> = self.templates().collect();
        write!(f, "{}:{}", self.pattern(), templates.join(";"))
    }
}

/// Ordered, immutable set of compiled rules.
///
/// Built once at startup and shared (usually behind an `Arc`) by the
/// resolver and the lister. Needs no synchronization.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Parses a `|`-separated rule configuration string.
    ///
    /// ```
    /// use regexfs_core::RuleTable;
    ///
    /// let table = RuleTable::parse(r"^a(.*)$:b$1;c$1|(.*)\.txt$:$1.md").unwrap();
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.expand("afile").candidates(), ["bfile", "cfile"]);
    /// ```
    pub fn parse(config: &str) -> Result<Self, ConfigError> {
        if config.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut rules = Vec::new();
        for (index, text) in split_escaped(config, RULE_SEPARATOR).iter().enumerate() {
            if text.is_empty() {
                return Err(ConfigError::EmptyRule { index });
            }
            let rule = Rule::parse(text)?;
            debug!(index, rule = %rule, "Compiled rule");
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Parses a rules file body: one `pattern:template[;template...]` per
    /// line. Blank lines and lines starting with `#` are skipped.
    pub fn parse_lines(text: &str) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
                continue;
            }
            let rule = Rule::parse(trimmed)?;
            debug!(rule = %rule, "Compiled rule");
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Reads and parses a rules file, see [`RuleTable::parse_lines`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_lines(&text)
    }

    /// Appends the rules of `other` after the rules of `self`.
    pub fn extend(&mut self, other: RuleTable) {
        self.rules.extend(other.rules);
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Virtual names for one directory entry name, see [`matcher::expand`].
    pub fn expand(&self, entry_name: impl AsRef<OsStr>) -> Expansion {
        matcher::expand(self, entry_name.as_ref())
    }
}

/// Splits at every single `delim`; a doubled `delim` becomes one literal.
fn split_escaped(input: &str, delim: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != delim {
            current.push(c);
        } else if chars.peek() == Some(&delim) {
            chars.next();
            current.push(delim);
        } else {
            parts.push(std::mem::take(&mut current));
        }
    }
    parts.push(current);
    parts
}

/// A capture reference found in a template.
#[derive(Debug, PartialEq, Eq)]
enum GroupRef {
    Index(usize),
    Name(String),
}

fn compile_template(pattern: &Regex, source: &str) -> Result<Template, ConfigError> {
    let (expansion, refs) = normalize_template(source);

    for group in refs {
        let known = match &group {
            GroupRef::Index(i) => *i < pattern.captures_len(),
            GroupRef::Name(n) => pattern.capture_names().flatten().any(|c| c == n),
        };
        if !known {
            return Err(ConfigError::UnknownGroup {
                pattern: pattern.as_str().to_string(),
                template: source.to_string(),
                group: match group {
                    GroupRef::Index(i) => i.to_string(),
                    GroupRef::Name(n) => n,
                },
            });
        }
    }

    Ok(Template {
        source: source.to_string(),
        expansion,
    })
}

/// Rewrites every capture reference into `${...}` form and collects them.
///
/// Malformed references (a lone `$`, an unterminated `${`) are kept as
/// literal text, which is also how `Captures::expand` treats them.
fn normalize_template(template: &str) -> (String, Vec<GroupRef>) {
    let mut out = String::with_capacity(template.len() + 8);
    let mut refs = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            out.push_str("$$");
            rest = tail;
        } else if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_group_name(&braced[..end]) => {
                    let name = &braced[..end];
                    refs.push(group_ref(name));
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                    rest = &braced[end + 1..];
                }
                _ => {
                    out.push_str("$$");
                    rest = after;
                }
            }
        } else {
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            let len = if digits > 0 {
                digits
            } else {
                after
                    .bytes()
                    .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                    .count()
            };
            if len == 0 {
                out.push_str("$$");
                rest = after;
                continue;
            }
            let name = &after[..len];
            refs.push(group_ref(name));
            out.push_str("${");
            out.push_str(name);
            out.push('}');
            rest = &after[len..];
        }
    }
    out.push_str(rest);
    (out, refs)
}

fn is_group_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn group_ref(name: &str) -> GroupRef {
    match name.parse::<usize>() {
        Ok(index) if name.bytes().all(|b| b.is_ascii_digit()) => GroupRef::Index(index),
        _ => GroupRef::Name(name.to_string()),
    }
}
