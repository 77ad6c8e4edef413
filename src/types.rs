//! Core data types shared by the loader, index, and query engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// DO NOT reorder variants - the declaration order is the tie-break between
/// kinds that share a configured weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Class,
    Namespace,
    Function,
    Variable,
    Typedef,
    #[serde(alias = "enum_value")]
    EnumValue,
    File,
    Page,
}

impl Kind {
    pub const ALL: [Self; 8] = [
        Self::Class,
        Self::Namespace,
        Self::Function,
        Self::Variable,
        Self::Typedef,
        Self::EnumValue,
        Self::File,
        Self::Page,
    ];

    /// Short label used by the CLI output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Namespace => "namespace",
            Self::Function => "fn",
            Self::Variable => "var",
            Self::Typedef => "type",
            Self::EnumValue => "enumvalue",
            Self::File => "file",
            Self::Page => "page",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of an entry in the index's insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u32);

impl EntryId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A deep link target: page path plus optional in-page anchor id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Anchor {
    pub path: String,
}

impl Anchor {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The page part, without any `#fragment`.
    pub fn page(&self) -> &str {
        self.path.split_once('#').map_or(self.path.as_str(), |(page, _)| page)
    }

    /// The in-page anchor id, if the link points into a page.
    pub fn fragment(&self) -> Option<&str> {
        self.path
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .filter(|fragment| !fragment.is_empty())
    }

    /// Resolves this anchor against an optional base URL.
    ///
    /// Generated anchors are relative to the search data directory
    /// (`../d0/da4/page.html#id`), so leading `../` and `./` segments are
    /// dropped before joining.
    pub fn resolve(&self, base: Option<&str>) -> String {
        let Some(base) = base else {
            return self.path.clone();
        };

        let mut relative = self.path.as_str();
        loop {
            if let Some(rest) = relative.strip_prefix("../") {
                relative = rest;
            } else if let Some(rest) = relative.strip_prefix("./") {
                relative = rest;
            } else {
                break;
            }
        }

        format!("{}/{}", base.trim_end_matches('/'), relative)
    }
}

/// One indexable unit: a single (symbol, anchor) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Lowercased display name; the index key.
    pub key: String,
    pub display_name: String,
    pub scope_label: String,
    pub anchor: Anchor,
    pub kind: Kind,
    /// Position among the anchors of one symbol record (overloads).
    pub overload_index: u16,
    /// Raw record id from the generator (e.g. `lock_5078`).
    pub fragment_id: String,
}

impl Entry {
    /// Composite identity used for insert deduplication.
    pub fn identity(&self) -> EntryIdentity {
        EntryIdentity {
            key: self.key.clone(),
            anchor: self.anchor.path.clone(),
            overload_index: self.overload_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryIdentity {
    pub key: String,
    pub anchor: String,
    pub overload_index: u16,
}

/// How a query matched an entry. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStage {
    Exact = 0,
    Prefix = 1,
    Substring = 2,
}

/// A ranked hit as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub display_name: String,
    pub scope_label: String,
    pub anchor_url: String,
    pub kind: Kind,
    pub stage: MatchStage,
    #[serde(skip)]
    pub entry: EntryId,
}

/// Ordered, capped results for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    /// Normalized query text the results were computed for.
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub truncated: bool,
    /// Number of matching candidates before truncation.
    pub total_candidates: usize,
}

impl ResultSet {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Display names in ranked order.
    pub fn names(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.display_name.as_str()).collect()
    }

    /// Hits grouped by display name, groups ordered by their best hit.
    pub fn grouped(&self) -> Vec<HitGroup<'_>> {
        let mut groups: Vec<HitGroup<'_>> = vec![];
        for hit in &self.hits {
            match groups.iter_mut().find(|g| g.display_name == hit.display_name) {
                Some(group) => group.hits.push(hit),
                None => groups.push(HitGroup {
                    display_name: &hit.display_name,
                    hits: vec![hit],
                }),
            }
        }
        groups
    }
}

/// Overloads and same-named symbols listed under one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitGroup<'a> {
    pub display_name: &'a str,
    pub hits: Vec<&'a SearchHit>,
}
