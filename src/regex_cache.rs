use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use regex::{Regex, RegexBuilder};

use crate::error::Result;

const MAX_CACHE_SIZE: usize = 64;

/// Bounded cache of compiled regexes keyed by (pattern, case-insensitive).
///
/// When IGNORECASE changes, entries compiled with the other flag simply
/// stop being hit; nothing needs flushing. On overflow the older half of
/// the entries is dropped in insertion order, which keeps eviction
/// deterministic.
pub struct RegexCache {
    cache: HashMap<(String, bool), Rc<Regex>>,
    order: VecDeque<(String, bool)>,
    hits: u64,
    misses: u64,
}

impl RegexCache {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, pattern: &str, ignore_case: bool) -> Result<Rc<Regex>> {
        let key = (pattern.to_string(), ignore_case);
        if let Some(re) = self.cache.get(&key) {
            self.hits += 1;
            return Ok(re.clone());
        }

        self.misses += 1;
        let re = Rc::new(
            RegexBuilder::new(pattern)
                .case_insensitive(ignore_case)
                .build()?,
        );

        self.evict_if_needed();
        self.cache.insert(key.clone(), re.clone());
        self.order.push_back(key);
        Ok(re)
    }

    fn evict_if_needed(&mut self) {
        if self.cache.len() < MAX_CACHE_SIZE {
            return;
        }
        let to_remove = self.cache.len() / 2;
        for _ in 0..to_remove {
            if let Some(key) = self.order.pop_front() {
                self.cache.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new()
    }
}
