//! The catalog: every registered module, in registration order.

use crate::entry::CatalogEntry;
use crate::module::ModuleId;

#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: CatalogEntry) {
        self.entries.push(entry);
    }

    pub fn get(&self, id: ModuleId) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_by_name(&self, short_name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.short_name == short_name)
    }

    /// Unknown modules count as disabled: they may never own the screen.
    pub fn is_disabled(&self, id: ModuleId) -> bool {
        self.get(id).map_or(true, CatalogEntry::is_disabled)
    }

    pub fn name_of(&self, id: ModuleId) -> &str {
        self.get(id).map_or("<unregistered>", |e| e.short_name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Priority;

    fn entry(id: usize, name: &str, disabled: bool) -> CatalogEntry {
        CatalogEntry::new(ModuleId(id), name, name, false, disabled, Priority::Normal)
    }

    #[test]
    fn lookup_by_id_and_name() {
        let mut cat = Catalog::new();
        cat.push(entry(0, "weather", false));
        cat.push(entry(3, "darts", true));

        assert_eq!(cat.len(), 2);
        assert_eq!(cat.get(ModuleId(3)).unwrap().short_name, "darts");
        assert_eq!(cat.find_by_name("weather").unwrap().id, ModuleId(0));
        assert!(cat.find_by_name("fuel").is_none());
    }

    #[test]
    fn unknown_module_reads_as_disabled() {
        let mut cat = Catalog::new();
        cat.push(entry(0, "weather", false));
        cat.push(entry(1, "darts", true));

        assert!(!cat.is_disabled(ModuleId(0)));
        assert!(cat.is_disabled(ModuleId(1)));
        assert!(cat.is_disabled(ModuleId(9)));
        assert_eq!(cat.name_of(ModuleId(9)), "<unregistered>");
    }
}
