use std::collections::{BTreeMap, BTreeSet};

/// In-memory project under one root directory.
///
/// Paths are relative to the root and use `/`. Writing a file creates every
/// missing ancestor directory. Ordered maps keep staging and packing
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTree {
    root: String,
    dirs: BTreeSet<String>,
    files: BTreeMap<String, String>,
}

impl ProjectTree {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            dirs: BTreeSet::new(),
            files: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn write(&mut self, path: &str, contents: impl Into<String>) {
        let path = normalize(path);
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.mkdir(parent);
        }
        self.files.insert(path, contents.into());
    }

    pub fn mkdir(&mut self, path: &str) {
        let path = normalize(path);
        let mut prefix = String::new();
        for part in path.split('/').filter(|part| !part.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(part);
            self.dirs.insert(prefix.clone());
        }
    }

    pub fn read(&self, path: &str) -> Option<&str> {
        self.files.get(&normalize(path)).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    /// Removes a file; its directories stay.
    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(&normalize(path))
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .map(|(path, contents)| (path.as_str(), contents.as_str()))
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<&str>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_create_ancestors_and_paths_normalize() {
        let mut tree = ProjectTree::new("demo");
        tree.write("./src/app//app.component.ts", "x");
        tree.mkdir("src/assets");

        assert_eq!(tree.read("src/app/app.component.ts"), Some("x"));
        assert_eq!(
            tree.dirs().collect::<Vec<_>>(),
            vec!["src", "src/app", "src/assets"]
        );
        assert_eq!(tree.remove("src\\app\\app.component.ts").as_deref(), Some("x"));
        assert!(!tree.contains("src/app/app.component.ts"));
        assert_eq!(tree.dirs().count(), 3);
    }
}
