//! Inline suppression comments
//!
//! - `// kensa-disable-next-line B001` disables B001 on the following line
//! - `// kensa-disable-line B001, B003` disables both rules on this line
//! - without a rule list, every rule is disabled
//!
//! Rules may be named by id or by name (`null-dereference`).

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?://|/\*)\s*kensa-disable-(next-line|line)\b([^*\n]*)")
        .expect("Invalid regex pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableDirective {
    pub line: usize,
    /// Empty means every rule.
    pub rules: Vec<String>,
}

impl DisableDirective {
    pub fn new(line: usize, rules: Vec<String>) -> Self {
        Self { line, rules }
    }

    pub fn disables_all(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn disables_rule(&self, rule: &str) -> bool {
        self.rules.is_empty() || self.rules.iter().any(|r| r.eq_ignore_ascii_case(rule))
    }

    fn absorb(&mut self, other: DisableDirective) {
        if self.disables_all() || other.disables_all() {
            self.rules.clear();
        } else {
            for rule in other.rules {
                if !self.rules.contains(&rule) {
                    self.rules.push(rule);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisableDirectives {
    by_line: HashMap<usize, DisableDirective>,
}

impl DisableDirectives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(source: &str) -> Self {
        let mut directives = Self::new();

        for (index, line) in source.lines().enumerate() {
            let Some(captures) = DIRECTIVE.captures(line) else {
                continue;
            };
            let target = match &captures[1] {
                "next-line" => index + 2,
                _ => index + 1,
            };
            directives.add(DisableDirective::new(target, parse_rule_list(&captures[2])));
        }

        directives
    }

    pub fn add(&mut self, directive: DisableDirective) {
        match self.by_line.get_mut(&directive.line) {
            Some(existing) => existing.absorb(directive),
            None => {
                self.by_line.insert(directive.line, directive);
            }
        }
    }

    pub fn is_disabled(&self, line: usize, rule: &str) -> bool {
        self.by_line
            .get(&line)
            .is_some_and(|d| d.disables_rule(rule))
    }

    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_line.len()
    }
}

fn parse_rule_list(rest: &str) -> Vec<String> {
    let rest = rest.split("--").next().unwrap_or("");
    rest.split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
