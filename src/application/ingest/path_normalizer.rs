use std::collections::HashMap;

const DEFAULT_CAPACITY: usize = 256;

/// Collapses `.` and `..` segments and empty separators.
///
/// A leading `/` survives; `..` never climbs above the start of the path.
pub fn normalize_path(path: &str) -> String {
    let mut safe: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                safe.pop();
            }
            segment => safe.push(segment),
        }
    }

    let joined = safe.join("/");
    if path.starts_with('/') {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Memoizing wrapper around [`normalize_path`], owned by one engine instance.
///
/// The cache is bounded; once full it is dropped and refilled.
#[derive(Debug, Clone)]
pub struct PathNormalizer {
    cache: HashMap<String, String>,
    capacity: usize,
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl PathNormalizer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn normalize(&mut self, path: &str) -> String {
        if let Some(hit) = self.cache.get(path) {
            return hit.clone();
        }

        let normalized = normalize_path(path);
        if self.cache.len() >= self.capacity {
            self.cache.clear();
        }
        self.cache.insert(path.to_string(), normalized.clone());
        normalized
    }
}
