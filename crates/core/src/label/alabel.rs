//! Contingent-name sets for upper/lower-case values.
//!
//! An [`ALabel`] names the set of contingent time-points an upper-case bound
//! depends on. It is a plain `u64` bitset; the mapping between bits and
//! time-point names lives in an [`ALabelAlphabet`] shared by every edge of
//! one network. The alphabet is append-only: indices are never reused,
//! because already-issued bitsets would silently change meaning.

use core::fmt;

use hashbrown::HashMap;

/// Maximum number of contingent names one alphabet can hold.
///
/// Bound by the `u64` word backing [`ALabel`]; a hard scalability ceiling of
/// the representation, surfaced as an error rather than widened silently.
pub const MAX_ALABELS: usize = 64;

/// Error growing an [`ALabelAlphabet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The alphabet already holds [`MAX_ALABELS`] names.
    AlphabetFull { name: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlphabetFull { name } => {
                write!(f, "alphabet full ({MAX_ALABELS} names), cannot add {name:?}")
            }
        }
    }
}

impl core::error::Error for Error {}

/// Append-only name↔index table for contingent time-points.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ALabelAlphabet {
    names: Vec<String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: HashMap<String, u8>,
}

impl ALabelAlphabet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `name`, assigning the next free one if the name
    /// is new.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlphabetFull`] once [`MAX_ALABELS`] names exist.
    pub fn put(&mut self, name: &str) -> Result<u8, Error> {
        if let Some(&index) = self.index.get(name) {
            return Ok(index);
        }
        if self.names.len() >= MAX_ALABELS {
            return Err(Error::AlphabetFull {
                name: name.to_owned(),
            });
        }
        #[allow(clippy::cast_possible_truncation)]
        let index = self.names.len() as u8;
        self.names.push(name.to_owned());
        let _ = self.index.insert(name.to_owned(), index);
        Ok(index)
    }

    /// Returns the index of `name`, if already assigned.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u8> {
        // Deserialized alphabets carry only the name list; fall back to a scan.
        self.index.get(name).copied().or_else(|| {
            self.names
                .iter()
                .position(|n| n == name)
                .and_then(|i| u8::try_from(i).ok())
        })
    }

    /// Returns the name at `index`, if assigned.
    #[must_use]
    pub fn name_of(&self, index: u8) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Rebuilds the name→index map after deserialization.
    pub fn rebuild_index(&mut self) {
        self.index = self.names.iter().cloned().zip(0u8..).collect();
    }
}

/// An immutable set of contingent-name indices into an [`ALabelAlphabet`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct ALabel(u64);

impl ALabel {
    /// The empty name set.
    pub const EMPTY: Self = Self(0);

    /// Singleton set for an alphabet index.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        Self(1u64 << index)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of names in the set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Set union; the conjunction of the two name sets.
    #[must_use]
    pub const fn conjunction(&self, other: &Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns `true` if every name of `other` is in `self`.
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        other.0 & !self.0 == 0
    }

    #[must_use]
    pub const fn contains_index(&self, index: u8) -> bool {
        self.0 & (1u64 << index) != 0
    }

    /// Returns a copy without the given index.
    #[must_use]
    pub const fn remove_index(&self, index: u8) -> Self {
        Self(self.0 & !(1u64 << index))
    }

    /// Iterates the member indices in increasing order.
    pub fn indices(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..64).filter(move |i| self.0 & (1u64 << i) != 0)
    }

    /// Renders the set using `alphabet` for names; `∅` when empty.
    #[must_use]
    pub fn to_text(&self, alphabet: &ALabelAlphabet) -> String {
        if self.is_empty() {
            return "∅".to_owned();
        }
        let mut out = String::new();
        for index in self.indices() {
            if !out.is_empty() {
                out.push('∙');
            }
            out.push_str(alphabet.name_of(index).unwrap_or("?"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_is_append_only_and_idempotent() {
        let mut alphabet = ALabelAlphabet::new();
        let c0 = alphabet.put("C0").unwrap();
        let c1 = alphabet.put("C1").unwrap();
        assert_eq!((c0, c1), (0, 1));
        assert_eq!(alphabet.put("C0"), Ok(0));
        assert_eq!(alphabet.len(), 2);
        assert_eq!(alphabet.name_of(1), Some("C1"));
        assert_eq!(alphabet.index_of("C1"), Some(1));
        assert_eq!(alphabet.index_of("C2"), None);
    }

    #[test]
    fn alphabet_overflows_at_64() {
        let mut alphabet = ALabelAlphabet::new();
        for i in 0..MAX_ALABELS {
            let _ = alphabet.put(&format!("C{i}")).unwrap();
        }
        assert!(matches!(
            alphabet.put("one-too-many"),
            Err(Error::AlphabetFull { .. })
        ));
        // Existing names still resolve after the failed insert.
        assert_eq!(alphabet.index_of("C63"), Some(63));
    }

    #[test]
    fn conjunction_is_union() {
        let a = ALabel::from_index(0).conjunction(&ALabel::from_index(3));
        let b = ALabel::from_index(3).conjunction(&ALabel::from_index(7));
        let c = a.conjunction(&b);
        assert_eq!(c.len(), 3);
        assert!(c.contains(&a));
        assert!(c.contains(&b));
        assert!(!a.contains(&b));
        assert!(c.contains(&ALabel::EMPTY));
    }

    #[test]
    fn remove_and_indices() {
        let a = ALabel::from_index(2).conjunction(&ALabel::from_index(5));
        assert_eq!(a.remove_index(2), ALabel::from_index(5));
        assert_eq!(a.indices().collect::<Vec<_>>(), vec![2, 5]);
    }

    #[test]
    fn text_rendering_uses_alphabet() {
        let mut alphabet = ALabelAlphabet::new();
        let c = alphabet.put("C").unwrap();
        let d = alphabet.put("D").unwrap();
        let set = ALabel::from_index(c).conjunction(&ALabel::from_index(d));
        assert_eq!(set.to_text(&alphabet), "C∙D");
        assert_eq!(ALabel::EMPTY.to_text(&alphabet), "∅");
    }
}
