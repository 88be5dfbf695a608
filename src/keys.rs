/// Round-robin pool of provider API keys.
///
/// Rotation walks forward from the active key and stops once it would wrap
/// back to the key that started the current run of failures, so a pool of
/// one key never retries itself.
#[derive(Debug, Clone, Default)]
pub struct KeyPool {
    keys: Vec<String>,
    current: usize,
    failure_start: Option<usize>,
}

impl KeyPool {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(Into::into)
            .map(|k: String| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            keys,
            current: 0,
            failure_start: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn add(&mut self, key: impl Into<String>) {
        let key = key.into().trim().to_string();
        if !key.is_empty() {
            self.keys.push(key);
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index >= self.keys.len() {
            return None;
        }
        let removed = self.keys.remove(index);
        self.current = self.current.min(self.keys.len().saturating_sub(1));
        self.failure_start = None;
        Some(removed)
    }

    /// Reset to the first key and return it
    pub fn first(&mut self) -> Option<&str> {
        self.current = 0;
        self.failure_start = None;
        self.keys.first().map(String::as_str)
    }

    pub fn current(&self) -> Option<&str> {
        self.keys.get(self.current).map(String::as_str)
    }

    /// Advance to the next key after a failure. Returns `None` when every key
    /// has been tried since the failures began.
    pub fn rotate(&mut self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let start = *self.failure_start.get_or_insert(self.current);
        let next = (self.current + 1) % self.keys.len();
        if next == start {
            return None;
        }
        self.current = next;
        Some(&self.keys[next])
    }

    /// A call succeeded on the active key; the next failure starts a fresh cycle.
    pub fn mark_success(&mut self) {
        self.failure_start = None;
    }
}

/// Mask a key for display: keep the first 4 and last 4 characters
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_to_second_key_then_gives_up() {
        let mut pool = KeyPool::new(["A", "B"]);
        assert_eq!(pool.first(), Some("A"));
        assert_eq!(pool.rotate(), Some("B"));
        assert_eq!(pool.rotate(), None);
        assert_eq!(pool.current(), Some("B"));
    }

    #[test]
    fn single_key_has_no_rotation() {
        let mut pool = KeyPool::new(["A"]);
        pool.first();
        assert_eq!(pool.rotate(), None);
    }

    #[test]
    fn success_starts_a_new_cycle() {
        let mut pool = KeyPool::new(["A", "B", "C"]);
        pool.first();
        assert_eq!(pool.rotate(), Some("B"));
        pool.mark_success();
        assert_eq!(pool.rotate(), Some("C"));
        assert_eq!(pool.rotate(), Some("A"));
        assert_eq!(pool.rotate(), None);
    }

    #[test]
    fn empty_pool_yields_nothing() {
        let mut pool = KeyPool::default();
        assert!(pool.first().is_none());
        assert!(pool.rotate().is_none());
    }

    #[test]
    fn blank_keys_are_dropped_and_remove_clamps_index() {
        let mut pool = KeyPool::new(["A", "  ", "B"]);
        assert_eq!(pool.len(), 2);
        pool.first();
        pool.rotate();
        assert_eq!(pool.remove(1), Some("B".to_string()));
        assert_eq!(pool.current(), Some("A"));
        assert_eq!(pool.remove(5), None);
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_key("AIzaSyABCDEFG1234"), "AIza…1234");
        assert_eq!(mask_key("short"), "*****");
    }
}
