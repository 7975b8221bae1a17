//! Collision-free archive entry names

use std::collections::HashSet;

use crate::models::split_extension;

/// Tracks entry names already written to one archive
///
/// A taken name gets `_1`, `_2`, ... inserted before its extension until
/// it is unique across the whole archive.
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `candidate`, or the first free suffixed variant of it
    pub fn claim(&mut self, candidate: &str) -> String {
        if self.used.insert(candidate.to_string()) {
            return candidate.to_string();
        }

        let (stem, ext) = split_extension(candidate);
        let mut counter = 1u32;
        loop {
            let name = format!("{}_{}{}", stem, counter, ext);
            if self.used.insert(name.clone()) {
                return name;
            }
            counter += 1;
        }
    }
}

/// Flatten path separators so every entry lands at the archive root
pub fn sanitize_entry_name(name: &str) -> String {
    let flat: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if flat.is_empty() || flat.chars().all(|c| c == '.') {
        "attachment".to_string()
    } else {
        flat
    }
}
