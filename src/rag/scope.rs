//! Document scopes, the closed catalog the router classifies into, and the
//! parser that maps free-form completion output back onto that catalog.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{RagError, Result};
use crate::search::MetadataFilter;

/// Label meaning "search across all documents".
pub const UNSCOPED_LABEL: &str = "unscoped";

/// Requested-scope value that asks the router to decide.
pub const AUTO_LABEL: &str = "auto";

/// Where a query is allowed to look.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Unscoped,
    Document(String),
}

impl Scope {
    pub fn as_str(&self) -> &str {
        match self {
            Scope::Unscoped => UNSCOPED_LABEL,
            Scope::Document(id) => id,
        }
    }

    pub fn is_unscoped(&self) -> bool {
        matches!(self, Scope::Unscoped)
    }

    /// The retrieval filter this scope implies.
    pub fn filter(&self) -> Option<MetadataFilter> {
        match self {
            Scope::Unscoped => None,
            Scope::Document(id) => Some(MetadataFilter::source(id.clone())),
        }
    }

    fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case(UNSCOPED_LABEL)
            || trimmed.eq_ignore_ascii_case("all")
        {
            Scope::Unscoped
        } else {
            Scope::Document(trimmed.to_string())
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Scope::from_label(&label))
    }
}

/// The scope a caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestedScope {
    #[default]
    Auto,
    Explicit(Scope),
}

impl RequestedScope {
    /// `"auto"` defers to the router; `"unscoped"`, `"all"` or an empty string
    /// search everything; anything else names a document scope verbatim.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case(AUTO_LABEL) {
            RequestedScope::Auto
        } else {
            RequestedScope::Explicit(Scope::from_label(value))
        }
    }
}

/// One routable document and the hints the router sees for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeProfile {
    /// Must equal the `source` metadata written by ingestion.
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Extra names the router may answer with.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A worked routing example shown to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingExample {
    pub question: String,
    pub scope: Scope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    scopes: Vec<ScopeProfile>,
    #[serde(default)]
    examples: Vec<RoutingExample>,
}

/// The closed set of document scopes known at deployment time.
#[derive(Debug, Clone)]
pub struct ScopeCatalog {
    scopes: Vec<ScopeProfile>,
    examples: Vec<RoutingExample>,
    /// Lowercased vocabulary term -> document scope it names.
    vocabulary: Vec<(String, Scope)>,
}

impl ScopeCatalog {
    pub fn new(scopes: Vec<ScopeProfile>, examples: Vec<RoutingExample>) -> Result<Self> {
        if scopes.is_empty() {
            return Err(RagError::Config("scope catalog is empty".into()));
        }
        for (i, profile) in scopes.iter().enumerate() {
            let id = profile.id.trim();
            if id.is_empty() {
                return Err(RagError::Config(format!("scope #{i} has an empty id")));
            }
            if id.eq_ignore_ascii_case(UNSCOPED_LABEL) || id.eq_ignore_ascii_case(AUTO_LABEL) {
                return Err(RagError::Config(format!("scope id '{id}' is reserved")));
            }
            if scopes[..i].iter().any(|p| p.id == profile.id) {
                return Err(RagError::Config(format!("duplicate scope id '{id}'")));
            }
        }
        for example in &examples {
            if let Scope::Document(id) = &example.scope {
                if !scopes.iter().any(|p| &p.id == id) {
                    return Err(RagError::Config(format!(
                        "routing example '{}' names unknown scope '{id}'",
                        example.question
                    )));
                }
            }
        }

        let vocabulary = build_vocabulary(&scopes);
        Ok(Self {
            scopes,
            examples,
            vocabulary,
        })
    }

    /// Catalog for the bundled datasheets.
    pub fn builtin() -> Self {
        let scopes = vec![
            ScopeProfile {
                id: "data/stm32f4.pdf".into(),
                description: "STM32F405xx/STM32F407xx high-performance microcontroller datasheet"
                    .into(),
                keywords: [
                    "STM32F407", "STM32F405", "Cortex-M4", "FPU", "168 MHz", "1 Mbyte Flash",
                    "Ethernet MAC", "USB OTG HS", "camera interface", "APB2",
                ]
                .map(String::from)
                .to_vec(),
                aliases: Vec::new(),
            },
            ScopeProfile {
                id: "data/stm32f1.pdf".into(),
                description: "STM32F103x8/STM32F103xB medium-density mainstream microcontroller \
                              datasheet (Blue Pill)"
                    .into(),
                keywords: [
                    "STM32F103", "Cortex-M3", "72 MHz", "64 or 128 Kbytes Flash",
                    "5 V tolerant I/O", "CAN", "Blue Pill",
                ]
                .map(String::from)
                .to_vec(),
                aliases: Vec::new(),
            },
            ScopeProfile {
                id: "data/bg96.pdf".into(),
                description: "Quectel BG96 LTE Cat M1/Cat NB1/EGPRS cellular IoT module \
                              hardware design"
                    .into(),
                keywords: [
                    "BG96", "Quectel", "LTE Cat M1", "Cat NB1", "NB-IoT", "EGPRS", "VBAT",
                    "PSM", "eDRX", "GNSS", "AT commands",
                ]
                .map(String::from)
                .to_vec(),
                aliases: Vec::new(),
            },
        ];
        let examples = vec![
            example("What is the clock speed of STM32F407?", "data/stm32f4.pdf"),
            example("Is the PA10 pin of the STM32F103 5V tolerant?", "data/stm32f1.pdf"),
            example("Does BG96 support NB-IoT?", "data/bg96.pdf"),
            example("What is a GPIO?", UNSCOPED_LABEL),
            example("How do I debounce a push button?", UNSCOPED_LABEL),
        ];
        // Built-in entries are static and satisfy every check in `new`.
        let vocabulary = build_vocabulary(&scopes);
        Self {
            scopes,
            examples,
            vocabulary,
        }
    }

    /// Load a catalog from a JSON file of `{ "scopes": [...], "examples": [...] }`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let file: CatalogFile = serde_json::from_str(&data)?;
        Self::new(file.scopes, file.examples)
    }

    pub fn scopes(&self) -> &[ScopeProfile] {
        &self.scopes
    }

    pub fn examples(&self) -> &[RoutingExample] {
        &self.examples
    }

    pub fn contains(&self, id: &str) -> bool {
        self.scopes.iter().any(|p| p.id == id)
    }

    /// Map raw router output onto the catalog.
    ///
    /// Every identifier and alias is searched for case-insensitively. A hit
    /// only counts when it is not glued to neighbouring word characters, so
    /// `stm32f4` never matches inside `stm32f407`, while path prefixes such
    /// as `./` or `docs/` are tolerated. The earliest hit wins; at the same
    /// position the longest term wins. A document named anywhere beats a
    /// stray `unscoped`; no document hit means [`Scope::Unscoped`].
    pub fn parse_label(&self, raw: &str) -> Scope {
        let haystack = raw.to_lowercase();
        let mut best: Option<(usize, usize, &Scope)> = None;

        for (term, scope) in &self.vocabulary {
            if let Some(pos) = find_bounded(&haystack, term) {
                let better = match best {
                    None => true,
                    Some((best_pos, best_len, _)) => {
                        pos < best_pos || (pos == best_pos && term.len() > best_len)
                    }
                };
                if better {
                    best = Some((pos, term.len(), scope));
                }
            }
        }

        best.map(|(_, _, scope)| scope.clone())
            .unwrap_or(Scope::Unscoped)
    }

    /// Check an explicitly requested scope against the catalog.
    /// Permissive mode passes unknown scopes through; they match no passages.
    pub fn resolve_explicit(&self, scope: Scope, strict: bool) -> Result<Scope> {
        match &scope {
            Scope::Document(id) if !self.contains(id) => {
                if strict {
                    return Err(RagError::UnknownScope(id.clone()));
                }
                tracing::warn!("Requested scope '{id}' is not in the catalog");
                Ok(scope)
            }
            _ => Ok(scope),
        }
    }
}

fn example(question: &str, scope: &str) -> RoutingExample {
    RoutingExample {
        question: question.to_string(),
        scope: Scope::from_label(scope),
    }
}

/// Ids, explicit aliases, and the file name and stem of path-like ids.
/// Derived names claimed by more than one scope are dropped as ambiguous.
fn build_vocabulary(scopes: &[ScopeProfile]) -> Vec<(String, Scope)> {
    let mut owners: HashMap<String, Vec<usize>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    let mut claim = |term: &str, idx: usize| {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return;
        }
        let entry = owners.entry(term.clone()).or_insert_with(|| {
            order.push(term.clone());
            Vec::new()
        });
        if !entry.contains(&idx) {
            entry.push(idx);
        }
    };

    for (idx, profile) in scopes.iter().enumerate() {
        claim(&profile.id, idx);
        for alias in &profile.aliases {
            claim(alias, idx);
        }
        let path = Path::new(&profile.id);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            claim(name, idx);
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            claim(stem, idx);
        }
    }

    order
        .into_iter()
        .filter_map(|term| {
            let idx = owners.get(&term)?;
            (idx.len() == 1).then(|| (term, Scope::Document(scopes[idx[0]].id.clone())))
        })
        .collect()
}

/// Path separators and dots are boundaries, so `./data/x.pdf` still names `data/x.pdf`.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-')
}

/// Byte offset of the first occurrence of `term` in `haystack` that is not
/// adjacent to word characters.
fn find_bounded(haystack: &str, term: &str) -> Option<usize> {
    haystack.match_indices(term).map(|(pos, _)| pos).find(|&pos| {
        let before_ok = haystack[..pos]
            .chars()
            .next_back()
            .map_or(true, |c| !is_word_char(c));
        let after_ok = haystack[pos + term.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_word_char(c));
        before_ok && after_ok
    })
}
