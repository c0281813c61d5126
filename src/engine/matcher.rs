use super::traits::ChannelMatcher;
use rustc_hash::FxHashSet;

/// Trim, lowercase and drop every whitespace character.
pub fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// The runtime union of the block and custom lists, already normalized.
#[derive(Debug, Clone, Default)]
pub struct EffectiveBlockList {
    entries: FxHashSet<Box<str>>,
}

impl EffectiveBlockList {
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = raw
            .into_iter()
            .map(|s| normalize(s.as_ref()))
            .filter(|s| !s.is_empty())
            .map(String::into_boxed_str)
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Membership of an already-normalized entry.
    pub fn contains_normalized(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }
}

impl ChannelMatcher for EffectiveBlockList {
    fn contains(&self, name: &str) -> bool {
        let normalized = normalize(name);
        !normalized.is_empty() && self.entries.contains(normalized.as_str())
    }
}
