//! The playlist: visible, enabled modules rotating round-robin.
//!
//! Only bookkeeping lives here.  Eligibility (disabled flag, `is_enabled()`)
//! and activation need the catalog and the module arena, so the scheduler
//! drives them and uses [`Playlist::scan_from`] for the circular walk.

use crate::entry::PlaylistEntry;
use crate::module::ModuleId;

#[derive(Debug, Default)]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
    /// Index of the entry that was activated last.  `None` = idle.
    current: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PlaylistEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn get(&self, idx: usize) -> Option<&PlaylistEntry> {
        self.entries.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut PlaylistEntry> {
        self.entries.get_mut(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn set_current(&mut self, idx: Option<usize>) {
        self.current = idx;
    }

    pub fn position(&self, id: ModuleId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// The entry with `is_running` set, paused or not.
    pub fn running_index(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.run.is_running)
    }

    /// The entry that was interrupted: running and paused.
    pub fn paused_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.run.is_running && e.run.is_paused)
    }

    /// Pause the running entry (remaining time untouched) and return it.
    pub fn pause_running(&mut self) -> Option<&PlaylistEntry> {
        let entry = self.entries.iter_mut().find(|e| e.run.is_live())?;
        entry.run.pause();
        Some(entry)
    }

    pub fn stop_all(&mut self) {
        for entry in &mut self.entries {
            entry.run.stop();
        }
    }

    /// Index where round-robin continues: one past the current entry, or the
    /// start of the list when idle.
    pub fn next_index(&self) -> usize {
        match self.current {
            Some(idx) if !self.entries.is_empty() => (idx + 1) % self.entries.len(),
            _ => 0,
        }
    }

    /// Every index exactly once, walking circularly from `start`.
    pub fn scan_from(&self, start: usize) -> impl Iterator<Item = usize> {
        let len = self.entries.len();
        (0..len).map(move |step| (start + step) % len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CatalogEntry;
    use crate::module::Priority;

    fn playlist(names: &[&str]) -> Playlist {
        let mut p = Playlist::new();
        for (i, name) in names.iter().enumerate() {
            let cat = CatalogEntry::new(ModuleId(i), *name, *name, false, false, Priority::Normal);
            p.push(PlaylistEntry::from_catalog(&cat, 1_000));
        }
        p
    }

    #[test]
    fn scan_wraps_around_once() {
        let p = playlist(&["a", "b", "c", "d"]);
        let order: Vec<usize> = p.scan_from(2).collect();
        assert_eq!(order, vec![2, 3, 0, 1]);
    }

    #[test]
    fn scan_of_empty_playlist_yields_nothing() {
        let p = Playlist::new();
        assert_eq!(p.scan_from(0).count(), 0);
        assert_eq!(p.next_index(), 0);
    }

    #[test]
    fn next_index_follows_current() {
        let mut p = playlist(&["a", "b", "c"]);
        assert_eq!(p.next_index(), 0, "idle starts at the top");
        p.set_current(Some(1));
        assert_eq!(p.next_index(), 2);
        p.set_current(Some(2));
        assert_eq!(p.next_index(), 0);
    }

    #[test]
    fn pause_running_keeps_the_countdown() {
        let mut p = playlist(&["a", "b"]);
        p.get_mut(1).unwrap().run.activate(1_000);
        p.get_mut(1).unwrap().run.consume(250);

        let paused = p.pause_running().unwrap();
        assert_eq!(paused.short_name, "b");
        assert_eq!(paused.run.remaining_time_ms, 750);

        assert_eq!(p.paused_index(), Some(1));
        assert_eq!(p.running_index(), Some(1));
        assert!(p.pause_running().is_none(), "nothing live left to pause");
    }

    #[test]
    fn stop_all_clears_running_flags() {
        let mut p = playlist(&["a", "b"]);
        p.get_mut(0).unwrap().run.activate(1_000);
        p.stop_all();
        assert!(p.running_index().is_none());
    }
}
