use std::collections::BTreeMap;

use crate::{addressing::Va, page::PageId};

/// Per process map from page aligned virtual addresses to page descriptors.
pub(crate) struct PageDirectory {
    entries: BTreeMap<Va, PageId>,
}

impl PageDirectory {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Finds the descriptor of the page containing `va`.
    pub(crate) fn find(&self, va: Va) -> Option<PageId> {
        self.entries.get(&va.page_down()).copied()
    }

    /// Registers `page` at `va`.
    ///
    /// If there already is a page at this address, the directory stays
    /// unchanged and the existing page is returned.
    pub(crate) fn insert(&mut self, va: Va, page: PageId) -> Result<(), PageId> {
        debug_assert!(va.is_page_aligned());

        match self.entries.get(&va) {
            Some(existing) => Err(*existing),
            None => {
                self.entries.insert(va, page);
                Ok(())
            }
        }
    }

    pub(crate) fn remove(&mut self, va: Va) -> Option<PageId> {
        self.entries.remove(&va.page_down())
    }

    /// First registered page inside of `[start, end)`
    pub(crate) fn first_in_range(&self, start: Va, end: Va) -> Option<Va> {
        self.entries.range(start.page_down()..end).next().map(|(va, _)| *va)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Va, PageId)> + '_ {
        self.entries.iter().map(|(va, page)| (*va, *page))
    }

    /// Removes all entries, ordered by their address
    pub(crate) fn take_all(&mut self) -> Vec<(Va, PageId)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::PageDirectory;
    use crate::addressing::{Va, PAGE_SIZE};

    #[test]
    fn test_find_rounds_down() {
        let mut dir = PageDirectory::new();
        dir.insert(Va::new(0x10000), 4).unwrap();

        assert_eq!(dir.find(Va::new(0x10000)), Some(4));
        assert_eq!(dir.find(Va::new(0x10fff)), Some(4));
        assert_eq!(dir.find(Va::new(0x11000)), None);
        assert_eq!(dir.find(Va::new(0xffff)), None);
    }

    #[test]
    fn test_insert_twice() {
        let mut dir = PageDirectory::new();
        dir.insert(Va::new(0x10000), 1).unwrap();

        assert_eq!(dir.insert(Va::new(0x10000), 2), Err(1));
        assert_eq!(dir.find(Va::new(0x10000)), Some(1));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_range_and_take() {
        let mut dir = PageDirectory::new();
        for i in [5usize, 1, 3] {
            dir.insert(Va::new(i * PAGE_SIZE), i).unwrap();
        }

        assert_eq!(
            dir.first_in_range(Va::new(2 * PAGE_SIZE), Va::new(4 * PAGE_SIZE)),
            Some(Va::new(3 * PAGE_SIZE))
        );
        assert_eq!(
            dir.first_in_range(Va::new(6 * PAGE_SIZE), Va::new(9 * PAGE_SIZE)),
            None
        );

        assert_eq!(dir.remove(Va::new(3 * PAGE_SIZE + 12)), Some(3));

        let all = dir.take_all();
        assert_eq!(
            all,
            vec![(Va::new(PAGE_SIZE), 1), (Va::new(5 * PAGE_SIZE), 5)]
        );
        assert!(dir.is_empty());
    }
}
