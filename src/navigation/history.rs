/// Bounded back/forward list. `index` always points at the entry on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationHistory {
    entries: Vec<String>,
    index: usize,
    capacity: usize,
}

impl NavigationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            capacity: capacity.max(1),
        }
    }

    /// Appends `path` after the current entry, dropping any forward entries.
    /// Returns `false` when `path` is already the current entry.
    pub fn record(&mut self, path: &str) -> bool {
        if self.current() == Some(path) {
            return false;
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(path.to_string());
        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(..overflow);
        }
        self.index = self.entries.len() - 1;
        true
    }

    pub fn current(&self) -> Option<&str> {
        self.entries.get(self.index).map(String::as_str)
    }

    pub fn back_target(&self) -> Option<(usize, &str)> {
        let target = self.index.checked_sub(1)?;
        self.entries.get(target).map(|path| (target, path.as_str()))
    }

    pub fn forward_target(&self) -> Option<(usize, &str)> {
        let target = self.index + 1;
        self.entries.get(target).map(|path| (target, path.as_str()))
    }

    /// Moves the cursor onto an existing entry; out-of-range indices are ignored.
    pub fn move_to(&mut self, index: usize) {
        if index < self.entries.len() {
            self.index = index;
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.back_target().is_some()
    }

    pub fn can_go_forward(&self) -> bool {
        self.forward_target().is_some()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
