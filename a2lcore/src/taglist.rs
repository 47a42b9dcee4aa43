use fnv::FnvBuildHasher;
use std::{collections::HashMap, ops::Index};

/// Anything that can be stored in a `TagList`
pub trait Tagged {
    fn tag(&self) -> &str;
}

/// A list of tagged items
///
/// A `TagList` keeps its items in insertion order and additionally allows for
/// fast access to items by their tag. Each tag occurs at most once: inserting
/// an item whose tag is already present replaces the old item in place.
#[derive(Debug, Clone)]
pub struct TagList<T: Tagged> {
    // storage for items
    items: Vec<T>,
    // mapping from tag to index in the items vector
    map: HashMap<String, usize, FnvBuildHasher>,
}

impl<T: Tagged> TagList<T> {
    /// create a new `TagList`
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: vec![],
            map: HashMap::default(),
        }
    }

    /// create a new `TagList` with a specified initial capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            map: HashMap::with_capacity_and_hasher(capacity, FnvBuildHasher::default()),
        }
    }

    /// insert an item into the `TagList`
    ///
    /// If an item with the same tag exists, it is replaced and returned. The
    /// replacement keeps the position of the original item.
    pub fn insert(&mut self, value: T) -> Option<T> {
        if let Some(index) = self.map.get(value.tag()) {
            Some(std::mem::replace(&mut self.items[*index], value))
        } else {
            let index = self.items.len();
            self.map.insert(value.tag().to_string(), index);
            self.items.push(value);
            None
        }
    }

    /// get an item by tag
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&T> {
        let index = self.map.get(tag)?;
        Some(&self.items[*index])
    }

    /// get a mutable reference to an item by tag
    pub fn get_mut(&mut self, tag: &str) -> Option<&mut T> {
        let index = self.map.get(tag)?;
        Some(&mut self.items[*index])
    }

    /// get the position of an item by tag
    #[must_use]
    pub fn index(&self, tag: &str) -> Option<usize> {
        self.map.get(tag).copied()
    }

    /// Checks if the `TagList` contains an item with the given tag
    #[must_use]
    pub fn contains_key(&self, tag: &str) -> bool {
        self.map.contains_key(tag)
    }

    /// Returns an iterator over references to the items in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Returns an iterator over the tags in insertion order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(Tagged::tag)
    }

    /// Returns the number of items in the `TagList`
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if the `TagList` is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Tagged> Default for TagList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tagged> Index<usize> for TagList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<T: Tagged> FromIterator<T> for TagList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let into_iter = iter.into_iter();
        let (low, _high) = into_iter.size_hint();
        let mut taglist = TagList::with_capacity(low);
        for item in into_iter {
            taglist.insert(item);
        }
        taglist
    }
}

impl<T: Tagged> IntoIterator for TagList<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T: Tagged> IntoIterator for &'a TagList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> PartialEq for TagList<T>
where
    T: Tagged + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        // the map is derived from the items
        self.items == other.items
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestItem {
        tag: String,
        value: u32,
    }

    impl TestItem {
        fn new(tag: &str, value: u32) -> Self {
            Self {
                tag: tag.to_string(),
                value,
            }
        }
    }

    impl Tagged for TestItem {
        fn tag(&self) -> &str {
            &self.tag
        }
    }

    #[test]
    fn insert_and_lookup() {
        let mut taglist = TagList::new();
        assert!(taglist.is_empty());
        assert!(taglist.get("A").is_none());

        assert!(taglist.insert(TestItem::new("A", 1)).is_none());
        assert!(taglist.insert(TestItem::new("B", 2)).is_none());
        assert_eq!(taglist.len(), 2);
        assert_eq!(taglist.get("B").unwrap().value, 2);
        assert_eq!(taglist.index("A"), Some(0));
        assert!(taglist.contains_key("A"));
        assert!(!taglist.contains_key("C"));
        assert_eq!(taglist[1].tag(), "B");
    }

    #[test]
    fn replace_keeps_position() {
        let mut taglist: TagList<TestItem> =
            [TestItem::new("A", 1), TestItem::new("B", 2)].into_iter().collect();
        let old = taglist.insert(TestItem::new("A", 10));
        assert_eq!(old, Some(TestItem::new("A", 1)));
        assert_eq!(taglist.len(), 2);
        assert_eq!(taglist.tags().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(taglist.get("A").unwrap().value, 10);

        taglist.get_mut("B").unwrap().value = 20;
        let values: Vec<u32> = taglist.iter().map(|item| item.value).collect();
        assert_eq!(values, vec![10, 20]);
    }
}
