//! # Manifest Derivation
//!
//! Every action documents itself in `README.md`. The README starts with a
//! YAML front matter block carrying the package metadata, followed by the
//! human-readable documentation:
//!
//! ```markdown
//! ---
//! slug: rootio
//! name: rootio
//! tags: disk
//! maintainers: Jane Doe <jane@example.com>
//! description: "Partitions and formats a disk"
//! version: v1.0.0
//! createdAt: "2021-02-14T15:00:26.527Z"
//! ---
//!
//! # rootio
//! ...
//! ```
//!
//! The [`ManifestDeriver`] opens the README of an action and hands it to a
//! [`ManifestParser`]. The parser is a narrow trait (a reader in, a
//! [`Manifest`] out) so the README format can change without touching the
//! pipeline. [`ReadmeParser`] is the default implementation.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::locator::Action;

/// Name of the documentation file inside every action version directory.
pub const README_FILE: &str = "README.md";

/// Package metadata derived from an action's README.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Manifest {
    /// Package name; matches the action directory name.
    pub name: String,
    /// Package version without a leading `v`.
    pub version: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub maintainers: Vec<Maintainer>,
    pub created_at: Option<String>,
    /// The markdown body following the front matter.
    pub readme: String,
    /// Front matter keys the manifest has no dedicated field for.
    pub annotations: BTreeMap<String, String>,
}

impl Manifest {
    /// The image tag for this manifest under `container_repo`.
    ///
    /// Always `<container_repo>/<name>:v<version>`.
    pub fn image_tag(&self, container_repo: &str) -> String {
        format!(
            "{}/{}:v{}",
            container_repo.trim_end_matches('/'),
            self.name,
            self.version
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Maintainer {
    pub name: String,
    pub email: Option<String>,
}

impl Maintainer {
    /// Parse a `Name <email>` entry. Entries without an address keep only
    /// the name.
    pub fn parse(entry: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"^\s*(?P<name>[^<]*?)\s*(?:<(?P<email>[^>]+)>)?\s*$")
                .expect("maintainer pattern is valid")
        });

        let caps = pattern.captures(entry)?;
        let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
        let email = caps.name("email").map(|m| m.as_str().trim().to_string());
        if name.is_empty() && email.is_none() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            email,
        })
    }
}

/// Converts documentation text into a [`Manifest`].
pub trait ManifestParser: Send + Sync {
    fn parse(&self, reader: &mut dyn Read) -> Result<Manifest, MetadataError>;
}

/// Parses README files with YAML front matter and a markdown body.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadmeParser;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrontMatter {
    slug: Option<String>,
    name: Option<String>,
    version: Option<serde_yaml::Value>,
    tags: Option<OneOrMany>,
    maintainers: Option<OneOrMany>,
    description: Option<String>,
    created_at: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Comma-separated strings are split into their entries.
    fn into_entries(self) -> Vec<String> {
        let raw = match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        };
        raw.iter()
            .flat_map(|s| s.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl ManifestParser for ReadmeParser {
    fn parse(&self, reader: &mut dyn Read) -> Result<Manifest, MetadataError> {
        let mut raw = String::new();
        reader
            .read_to_string(&mut raw)
            .map_err(|e| MetadataError::FrontMatter {
                message: format!("README is not valid UTF-8 text: {}", e),
            })?;
        parse_readme(&raw)
    }
}

/// Parse README text into a manifest.
pub fn parse_readme(raw: &str) -> Result<Manifest, MetadataError> {
    let normalized = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let (front, body) = split_front_matter(&normalized);

    let front: FrontMatter = match front {
        Some(yaml) if !yaml.trim().is_empty() => {
            serde_yaml::from_str(yaml).map_err(|e| MetadataError::FrontMatter {
                message: e.to_string(),
            })?
        }
        _ => FrontMatter::default(),
    };

    let summary = summarize_body(body);

    let name = non_empty(front.slug.clone())
        .or_else(|| non_empty(front.name.clone()))
        .ok_or(MetadataError::MissingField { field: "name" })?;

    let version = match front.version {
        Some(value) => scalar_to_string(&value).ok_or_else(|| MetadataError::FrontMatter {
            message: "field 'version' must be a string".to_string(),
        })?,
        None => String::new(),
    };
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version).to_string();
    if version.is_empty() {
        return Err(MetadataError::MissingField { field: "version" });
    }

    let annotations = front
        .extra
        .iter()
        .filter_map(|(key, value)| scalar_to_string(value).map(|v| (key.clone(), v)))
        .collect();

    Ok(Manifest {
        name,
        version,
        display_name: non_empty(front.name).or(summary.title),
        description: non_empty(front.description).or(summary.first_paragraph),
        keywords: front.tags.map(OneOrMany::into_entries).unwrap_or_default(),
        maintainers: front
            .maintainers
            .map(OneOrMany::into_entries)
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| Maintainer::parse(entry))
            .collect(),
        created_at: non_empty(front.created_at),
        readme: body.trim().to_string(),
        annotations,
    })
}

/// Split `---`-delimited front matter from the body.
///
/// Text without an opening `---` line, or without a closing one, has no
/// front matter and is returned whole as the body.
fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let Some(rest) = raw.strip_prefix("---\n") else {
        return (None, raw);
    };
    if let Some(rest_body) = rest.strip_prefix("---") {
        // Empty front matter block.
        return (Some(""), rest_body.strip_prefix('\n').unwrap_or(rest_body));
    }
    if let Some(pos) = rest.find("\n---\n") {
        (Some(&rest[..pos]), &rest[pos + "\n---\n".len()..])
    } else if let Some(front) = rest.strip_suffix("\n---") {
        (Some(front), "")
    } else {
        (None, raw)
    }
}

#[derive(Debug, Default)]
struct BodySummary {
    title: Option<String>,
    first_paragraph: Option<String>,
}

/// Pull the first heading and first paragraph out of a markdown body.
fn summarize_body(body: &str) -> BodySummary {
    let mut summary = BodySummary::default();
    let mut in_heading = false;
    let mut in_paragraph = false;
    let mut buffer = String::new();

    for event in Parser::new(body) {
        match event {
            Event::Start(Tag::Heading { .. }) if summary.title.is_none() => {
                in_heading = true;
                buffer.clear();
            }
            Event::End(TagEnd::Heading(_)) if in_heading => {
                in_heading = false;
                summary.title = non_empty(Some(buffer.trim().to_string()));
            }
            Event::Start(Tag::Paragraph) if summary.first_paragraph.is_none() => {
                in_paragraph = true;
                buffer.clear();
            }
            Event::End(TagEnd::Paragraph) if in_paragraph => {
                in_paragraph = false;
                summary.first_paragraph = non_empty(Some(buffer.trim().to_string()));
            }
            Event::Text(text) | Event::Code(text) if in_heading || in_paragraph => {
                buffer.push_str(&text);
            }
            Event::SoftBreak | Event::HardBreak if in_paragraph => buffer.push(' '),
            _ => {}
        }
        if summary.title.is_some() && summary.first_paragraph.is_some() {
            break;
        }
    }

    summary
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Opens action READMEs and derives their manifests.
pub struct ManifestDeriver {
    parser: Box<dyn ManifestParser>,
}

impl Default for ManifestDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestDeriver {
    /// Create a deriver using [`ReadmeParser`].
    pub fn new() -> Self {
        Self::with_parser(Box::new(ReadmeParser))
    }

    pub fn with_parser(parser: Box<dyn ManifestParser>) -> Self {
        Self { parser }
    }

    /// Derive the manifest of `action`, whose files live in `action_dir`.
    ///
    /// Fails when the README cannot be opened, does not parse, or describes
    /// a different action than `action`.
    pub fn derive(&self, action_dir: &Path, action: &Action) -> Result<Manifest, MetadataError> {
        let readme_path = action_dir.join(README_FILE);
        let file = File::open(&readme_path).map_err(|source| MetadataError::Read {
            path: readme_path,
            source,
        })?;
        let mut reader = BufReader::new(file);

        let manifest =
            self.parser
                .parse(&mut reader)
                .map_err(|source| MetadataError::Action {
                    action: action.to_string(),
                    source: Box::new(source),
                })?;

        check_identity(&manifest, action)?;
        Ok(manifest)
    }
}

fn check_identity(manifest: &Manifest, action: &Action) -> Result<(), MetadataError> {
    let expected_version = action
        .version
        .strip_prefix('v')
        .unwrap_or(&action.version);
    if manifest.name != action.name || manifest.version != expected_version {
        return Err(MetadataError::IdentityMismatch {
            expected: action.to_string(),
            found: format!("{}/v{}", manifest.name, manifest.version),
        });
    }
    Ok(())
}
