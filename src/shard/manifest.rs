//! Shard identifiers, index sections, and the generator's section manifest.
//!
//! The generator splits its search data by section (`all`, `classes`,
//! `functions`, ...) and, within a section, by the first character of the
//! symbol name. The manifest (`searchdata.js`) lists, per section, the
//! characters that have a shard; shard `<section>_<n>` covers the character
//! at position `n` (hexadecimal) of that list.

use crate::error::LoadError;
use crate::types::Kind;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static VAR_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var\s+(\w+)\s*=\s*\{(.*?)\}\s*;").expect("static regex")
});

static BLOCK_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\d+)\s*:\s*("(?:[^"\\]|\\.)*")"#).expect("static regex")
});

/// A section of the generated search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    All,
    Classes,
    Namespaces,
    Concepts,
    Files,
    Functions,
    Variables,
    Typedefs,
    Enums,
    EnumValues,
    Related,
    Defines,
    Groups,
    Pages,
    Other,
}

impl Section {
    pub fn from_name(name: &str) -> Self {
        match name {
            "all" => Self::All,
            "classes" => Self::Classes,
            "namespaces" => Self::Namespaces,
            "concepts" => Self::Concepts,
            "files" => Self::Files,
            "functions" => Self::Functions,
            "variables" => Self::Variables,
            "typedefs" => Self::Typedefs,
            "enums" => Self::Enums,
            "enumvalues" => Self::EnumValues,
            "related" => Self::Related,
            "defines" => Self::Defines,
            "groups" => Self::Groups,
            "pages" => Self::Pages,
            _ => Self::Other,
        }
    }

    /// Kind of an entry whose anchor points into a page (`page.html#id`).
    pub const fn member_kind(self) -> Kind {
        match self {
            Self::Variables => Kind::Variable,
            Self::Typedefs | Self::Enums => Kind::Typedef,
            Self::EnumValues => Kind::EnumValue,
            Self::Classes | Self::Concepts => Kind::Class,
            Self::Namespaces => Kind::Namespace,
            Self::Files => Kind::File,
            Self::Groups | Self::Pages => Kind::Page,
            Self::All | Self::Functions | Self::Related | Self::Defines | Self::Other => {
                Kind::Function
            }
        }
    }

    /// Kind of an entry whose anchor is a whole page the page name does not classify.
    pub const fn page_kind(self) -> Kind {
        match self {
            Self::Classes | Self::Concepts => Kind::Class,
            Self::Namespaces => Kind::Namespace,
            Self::Files => Kind::File,
            _ => Kind::Page,
        }
    }
}

/// Identifier of one fragment, e.g. `functions_b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id of the shard at `position` within a section.
    pub fn for_section(section_name: &str, position: usize) -> Self {
        Self(format!("{}_{:x}", section_name, position))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Section name part (`functions` for `functions_b`).
    pub fn section_name(&self) -> &str {
        self.0.rsplit_once('_').map_or(self.0.as_str(), |(name, _)| name)
    }

    pub fn section(&self) -> Section {
        Section::from_name(self.section_name())
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ShardId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// One shard listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSpec {
    pub id: ShardId,
    /// First character of every symbol in this shard (lowercase).
    pub first_char: char,
}

/// The set of shards a documentation site provides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardManifest {
    shards: Vec<ShardSpec>,
}

impl ShardManifest {
    pub const fn new(shards: Vec<ShardSpec>) -> Self {
        Self { shards }
    }

    /// Parse the generator's `searchdata.js`.
    ///
    /// Only `indexSectionsWithContent` and `indexSectionNames` are read; other
    /// variables (labels) are ignored.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let malformed = |reason: &str| LoadError::Malformed {
            shard: "searchdata".to_string(),
            reason: reason.to_string(),
        };

        let mut contents = None;
        let mut names = None;
        for block in VAR_BLOCK.captures_iter(text) {
            let items = parse_block(&block[2]).map_err(|e| malformed(&e))?;
            match &block[1] {
                "indexSectionsWithContent" => contents = Some(items),
                "indexSectionNames" => names = Some(items),
                _ => {}
            }
        }

        let contents = contents.ok_or_else(|| malformed("missing indexSectionsWithContent"))?;
        let names = names.ok_or_else(|| malformed("missing indexSectionNames"))?;

        let mut shards = vec![];
        for (section, chars) in &contents {
            let Some(name) = names.get(section) else {
                tracing::warn!("Section {} has content but no name, skipping", section);
                continue;
            };
            shards.extend(
                chars
                    .chars()
                    .enumerate()
                    .map(|(position, first_char)| ShardSpec {
                        id: ShardId::for_section(name, position),
                        first_char: first_char.to_lowercase().next().unwrap_or(first_char),
                    }),
            );
        }

        Ok(Self { shards })
    }

    pub fn shards(&self) -> &[ShardSpec] {
        &self.shards
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Shards worth loading.
    ///
    /// The `all` section duplicates every other section with less precise
    /// kinds, so it is only used when it is the only section present.
    pub fn preferred(&self) -> impl Iterator<Item = &ShardSpec> {
        let only_all = self.shards.iter().all(|s| s.id.section() == Section::All);
        self.shards
            .iter()
            .filter(move |s| only_all || s.id.section() != Section::All)
    }

    /// Ids of all preferred shards, in manifest order.
    pub fn preferred_ids(&self) -> Vec<ShardId> {
        self.preferred().map(|s| s.id.clone()).collect()
    }

    /// Preferred shards that may contain symbols starting with `c`.
    pub fn shards_for_char(&self, c: char) -> impl Iterator<Item = &ShardId> {
        let c = c.to_lowercase().next().unwrap_or(c);
        self.preferred()
            .filter(move |s| s.first_char == c)
            .map(|s| &s.id)
    }
}

/// `0: "abc", 1: "def"` into an ordered map of decoded strings.
fn parse_block(block: &str) -> Result<BTreeMap<usize, String>, String> {
    let mut items = BTreeMap::new();
    for caps in BLOCK_ITEM.captures_iter(block) {
        let index: usize = caps[1]
            .parse()
            .map_err(|_| format!("bad section index '{}'", &caps[1]))?;
        let value: String = serde_json::from_str(&caps[2])
            .map_err(|e| format!("bad section string {}: {}", &caps[2], e))?;
        items.insert(index, value);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    const SEARCHDATA: &str = r#"
var indexSectionsWithContent =
{
  0: "_abl",
  1: "ml",
  2: "abcdefghijkl"
};

var indexSectionNames =
{
  0: "all",
  1: "classes",
  2: "functions"
};

var indexSectionLabels =
{
  0: "All",
  1: "Classes",
  2: "Functions"
};
"#;

    #[rstest]
    #[case("functions_b", "functions", Section::Functions)]
    #[case("enumvalues_0", "enumvalues", Section::EnumValues)]
    #[case("all_1a", "all", Section::All)]
    #[case("custom", "custom", Section::Other)]
    fn test_shard_id_section(#[case] id: &str, #[case] name: &str, #[case] section: Section) {
        let id = ShardId::from(id);
        check!(id.section_name() == name);
        check!(id.section() == section);
    }

    #[test]
    fn test_shard_id_for_section_is_hex() {
        check!(ShardId::for_section("functions", 11).as_str() == "functions_b");
        check!(ShardId::for_section("all", 26).as_str() == "all_1a");
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = ShardManifest::parse(SEARCHDATA).unwrap();
        check!(manifest.shards().len() == 4 + 2 + 12);

        // functions: 'l' is position 11 -> functions_b
        let for_l: Vec<_> = manifest.shards_for_char('L').map(ShardId::as_str).collect();
        check!(for_l == ["classes_1", "functions_b"]);
    }

    #[test]
    fn test_preferred_skips_all_section() {
        let manifest = ShardManifest::parse(SEARCHDATA).unwrap();
        let ids = manifest.preferred_ids();
        check!(ids.iter().all(|id| id.section() != Section::All));
        check!(ids.len() == 14);
    }

    #[test]
    fn test_preferred_uses_all_when_alone() {
        let manifest = ShardManifest::new(vec![ShardSpec {
            id: ShardId::new("all_0"),
            first_char: 'a',
        }]);
        check!(manifest.preferred_ids() == vec![ShardId::new("all_0")]);
    }

    #[test]
    fn test_parse_manifest_missing_names() {
        let text = "var indexSectionsWithContent = { 0: \"ab\" };";
        let_assert!(Err(LoadError::Malformed { reason, .. }) = ShardManifest::parse(text));
        check!(reason.contains("indexSectionNames"));
    }
}
