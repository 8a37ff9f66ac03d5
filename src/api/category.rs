//! Allocation categories.

use std::fmt;
use std::str::FromStr;

/// A closed set of tags partitioning allocations for aggregate reporting.
///
/// Categories index fixed-size arrays in [`MemoryStats`](crate::MemoryStats),
/// so aggregation is always exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Category {
    /// Default bucket for anything not otherwise classified.
    #[default]
    General,

    /// Long-lived engine resources (meshes, textures, materials).
    Resources,

    /// Short-lived scratch data expected to be released soon.
    Temporary,
}

impl Category {
    /// Number of categories.
    pub const COUNT: usize = 3;

    /// Every category, in index order.
    pub const ALL: [Category; Self::COUNT] =
        [Category::General, Category::Resources, Category::Temporary];

    /// Dense index of this category.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable lowercase name, used in exports.
    pub const fn name(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Resources => "resources",
            Category::Temporary => "temporary",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown allocation category `{0}`")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}
