#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardState {
    pub source_paths: Vec<String>,
    pub is_cut: bool,
}

impl ClipboardState {
    pub fn set(&mut self, paths: Vec<String>, is_cut: bool) {
        self.source_paths = paths
            .into_iter()
            .filter(|path| !path.trim().is_empty())
            .collect();
        self.is_cut = is_cut && !self.source_paths.is_empty();
    }

    pub fn clear(&mut self) {
        self.source_paths.clear();
        self.is_cut = false;
    }

    pub fn has_content(&self) -> bool {
        !self.source_paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.source_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source_paths.is_empty()
    }
}
