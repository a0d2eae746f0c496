//! Versioned prompt templates with named `{{slot}}` placeholders.
//!
//! A template file looks like:
//!
//! ```text
//! # version: 1
//! [system]
//! ...system text, may reference {{slots}}...
//! [user]
//! ...user text...
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{RagError, Result};
use crate::models::ChatMessage;

const ROUTER_V1: &str = include_str!("../../prompts/router.v1.prompt");
const ANSWER_V1: &str = include_str!("../../prompts/answer.v1.prompt");

pub const ROUTER_SLOTS: &[&str] = &["scopes", "examples", "question"];
pub const ANSWER_SLOTS: &[&str] = &["context", "question"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub name: String,
    pub version: u32,
    system: String,
    user: String,
}

impl PromptTemplate {
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let err = |msg: &str| RagError::Prompt(format!("{name}: {msg}"));

        enum Section {
            Header,
            System,
            User,
        }

        let mut version = None;
        let mut system: Option<Vec<&str>> = None;
        let mut user: Option<Vec<&str>> = None;
        let mut current = Section::Header;

        for line in source.lines() {
            match line.trim_end() {
                "[system]" => {
                    if system.replace(Vec::new()).is_some() {
                        return Err(err("duplicate [system] section"));
                    }
                    current = Section::System;
                }
                "[user]" => {
                    if user.replace(Vec::new()).is_some() {
                        return Err(err("duplicate [user] section"));
                    }
                    current = Section::User;
                }
                other => match current {
                    Section::System => system.get_or_insert_with(Vec::new).push(line),
                    Section::User => user.get_or_insert_with(Vec::new).push(line),
                    Section::Header => {
                        if let Some(v) = other.trim().strip_prefix("# version:") {
                            version = Some(
                                v.trim()
                                    .parse::<u32>()
                                    .map_err(|_| err("version is not a number"))?,
                            );
                        } else if !other.trim().is_empty() {
                            return Err(err("text before the first section"));
                        }
                    }
                },
            }
        }

        let join = |lines: Vec<&str>| lines.join("\n").trim_matches('\n').to_string();
        Ok(Self {
            name: name.to_string(),
            version: version.ok_or_else(|| err("missing '# version:' header"))?,
            system: join(system.ok_or_else(|| err("missing [system] section"))?),
            user: join(user.ok_or_else(|| err("missing [user] section"))?),
        })
    }

    /// Every slot referenced by either section.
    pub fn slots(&self) -> Result<BTreeSet<String>> {
        let mut slots = BTreeSet::new();
        for text in [&self.system, &self.user] {
            for piece in split_slots(text).map_err(|e| self.error(&e))? {
                if let Piece::Slot(name) = piece {
                    slots.insert(name.to_string());
                }
            }
        }
        Ok(slots)
    }

    /// Fail unless the template references exactly `expected`.
    pub fn expect_slots(&self, expected: &[&str]) -> Result<()> {
        let found = self.slots()?;
        let wanted: BTreeSet<String> = expected.iter().map(|s| s.to_string()).collect();
        if found != wanted {
            return Err(self.error(&format!(
                "expected slots {wanted:?}, template has {found:?}"
            )));
        }
        Ok(())
    }

    /// Fill every slot and produce a system + user message pair.
    /// Substituted values are not re-scanned for placeholders.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<Vec<ChatMessage>> {
        let slots = self.slots()?;
        for (key, _) in values {
            if !slots.contains(*key) {
                return Err(self.error(&format!("unknown slot '{key}'")));
            }
        }

        let fill = |text: &str| -> Result<String> {
            let mut out = String::with_capacity(text.len());
            for piece in split_slots(text).map_err(|e| self.error(&e))? {
                match piece {
                    Piece::Text(t) => out.push_str(t),
                    Piece::Slot(name) => {
                        let value = values
                            .iter()
                            .find(|(k, _)| *k == name)
                            .map(|(_, v)| *v)
                            .ok_or_else(|| self.error(&format!("missing value for '{name}'")))?;
                        out.push_str(value);
                    }
                }
            }
            Ok(out)
        };

        Ok(vec![
            ChatMessage::system(fill(&self.system)?),
            ChatMessage::user(fill(&self.user)?),
        ])
    }

    fn error(&self, msg: &str) -> RagError {
        RagError::Prompt(format!("{} v{}: {msg}", self.name, self.version))
    }
}

enum Piece<'a> {
    Text(&'a str),
    Slot(&'a str),
}

fn split_slots(text: &str) -> std::result::Result<Vec<Piece<'_>>, String> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| "unterminated '{{' placeholder".to_string())?;
        let name = after[..end].trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!("invalid slot name '{name}'"));
        }
        if start > 0 {
            pieces.push(Piece::Text(&rest[..start]));
        }
        pieces.push(Piece::Slot(name));
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

/// The templates the pipeline runs with.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub router: PromptTemplate,
    pub answer: PromptTemplate,
}

impl PromptSet {
    pub fn builtin() -> Result<Self> {
        Self::from_sources(ROUTER_V1, ANSWER_V1)
    }

    /// Built-in templates, with `router.prompt` / `answer.prompt` from `dir`
    /// taking precedence when present.
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let read = |file: &str, fallback: &'static str| -> Result<String> {
            match dir.map(|d| d.join(file)) {
                Some(path) if path.exists() => {
                    tracing::info!("Using prompt template {}", path.display());
                    Ok(std::fs::read_to_string(path)?)
                }
                _ => Ok(fallback.to_string()),
            }
        };
        Self::from_sources(
            &read("router.prompt", ROUTER_V1)?,
            &read("answer.prompt", ANSWER_V1)?,
        )
    }

    fn from_sources(router: &str, answer: &str) -> Result<Self> {
        let router = PromptTemplate::parse("router", router)?;
        router.expect_slots(ROUTER_SLOTS)?;
        let answer = PromptTemplate::parse("answer", answer)?;
        answer.expect_slots(ANSWER_SLOTS)?;
        Ok(Self { router, answer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "# version: 3\n[system]\nBe brief.\n[user]\nQ: {{question}}\nC: {{ context }}\n";

    #[test]
    fn test_parse_sections_and_version() {
        let t = PromptTemplate::parse("simple", SIMPLE).unwrap();
        assert_eq!(t.version, 3);
        assert_eq!(t.system, "Be brief.");
        assert_eq!(t.user, "Q: {{question}}\nC: {{ context }}");
    }

    #[test]
    fn test_parse_errors() {
        assert!(PromptTemplate::parse("t", "[system]\na\n[user]\nb").is_err());
        assert!(PromptTemplate::parse("t", "# version: x\n[system]\na\n[user]\nb").is_err());
        assert!(PromptTemplate::parse("t", "# version: 1\n[system]\na").is_err());
        assert!(PromptTemplate::parse("t", "# version: 1\nstray\n[system]\na\n[user]\nb").is_err());
    }

    #[test]
    fn test_slots() {
        let t = PromptTemplate::parse("simple", SIMPLE).unwrap();
        let slots: Vec<String> = t.slots().unwrap().into_iter().collect();
        assert_eq!(slots, vec!["context", "question"]);
        assert!(t.expect_slots(&["question", "context"]).is_ok());
        assert!(t.expect_slots(&["question"]).is_err());
    }

    #[test]
    fn test_render() {
        let t = PromptTemplate::parse("simple", SIMPLE).unwrap();
        let msgs = t
            .render(&[("question", "What is VBAT?"), ("context", "VBAT is 3.3 V")])
            .unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[1].content, "Q: What is VBAT?\nC: VBAT is 3.3 V");
    }

    #[test]
    fn test_render_does_not_expand_values() {
        let t = PromptTemplate::parse("simple", SIMPLE).unwrap();
        let msgs = t
            .render(&[("question", "{{context}}"), ("context", "x")])
            .unwrap();
        assert_eq!(msgs[1].content, "Q: {{context}}\nC: x");
    }

    #[test]
    fn test_render_missing_and_unknown_slots() {
        let t = PromptTemplate::parse("simple", SIMPLE).unwrap();
        assert!(t.render(&[("question", "q")]).is_err());
        assert!(t
            .render(&[("question", "q"), ("context", "c"), ("extra", "e")])
            .is_err());
    }

    #[test]
    fn test_unterminated_placeholder() {
        let t = PromptTemplate::parse("bad", "# version: 1\n[system]\n{{oops\n[user]\nx").unwrap();
        assert!(t.slots().is_err());
    }

    #[test]
    fn test_builtin_templates_load() {
        let set = PromptSet::builtin().unwrap();
        assert_eq!(set.router.version, 1);
        assert_eq!(set.answer.version, 1);
    }

    #[test]
    fn test_answer_template_carries_grounding_rules() {
        let set = PromptSet::builtin().unwrap();
        let msgs = set
            .answer
            .render(&[("context", ""), ("question", "What is the price?")])
            .unwrap();
        assert!(msgs[0].content.contains("only"));
        assert!(msgs[0].content.contains("I cannot find this information"));
        assert!(msgs[1].content.contains("Question: What is the price?"));
    }

    #[test]
    fn test_load_override_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("answer.prompt"),
            "# version: 2\n[system]\nGrounded.\n[user]\n{{context}} / {{question}}",
        )
        .unwrap();
        let set = PromptSet::load(Some(dir.path())).unwrap();
        assert_eq!(set.answer.version, 2);
        assert_eq!(set.router.version, 1);
    }

    #[test]
    fn test_load_rejects_override_with_wrong_slots() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("answer.prompt"),
            "# version: 2\n[system]\nNo context here.\n[user]\n{{question}}",
        )
        .unwrap();
        assert!(PromptSet::load(Some(dir.path())).is_err());
    }
}
