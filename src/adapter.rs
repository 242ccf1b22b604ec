// Part of ethercat-rs. Copyright 2018-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

use crate::types::{check_index, Result};
use derive_new::new;

/// A network adapter the EtherCAT stack can open.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Adapter {
    pub name: String,
    pub description: String,
}

/// Snapshot of the adapters reported by one scan.
///
/// The list is never refreshed behind the caller's back; call
/// [`Master::list_adapters`](crate::Master::list_adapters) again to rescan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterList {
    adapters: Vec<Adapter>,
}

impl AdapterList {
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Adapter name, or an empty string past the end of the list.
    pub fn name(&self, index: usize) -> &str {
        self.adapters
            .get(index)
            .map(|a| a.name.as_str())
            .unwrap_or("")
    }

    /// Adapter description, or an empty string past the end of the list.
    pub fn description(&self, index: usize) -> &str {
        self.adapters
            .get(index)
            .map(|a| a.description.as_str())
            .unwrap_or("")
    }

    pub fn get(&self, index: usize) -> Result<&Adapter> {
        check_index("adapter", index, self.adapters.len())?;
        Ok(&self.adapters[index])
    }

    pub fn find(&self, name: &str) -> Option<&Adapter> {
        self.adapters.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Adapter> {
        self.adapters.iter()
    }
}

impl From<Vec<Adapter>> for AdapterList {
    fn from(adapters: Vec<Adapter>) -> Self {
        Self { adapters }
    }
}

impl<'a> IntoIterator for &'a AdapterList {
    type Item = &'a Adapter;
    type IntoIter = std::slice::Iter<'a, Adapter>;

    fn into_iter(self) -> Self::IntoIter {
        self.adapters.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn list() -> AdapterList {
        AdapterList::from(vec![
            Adapter::new("eth0".into(), "Intel I210 Gigabit".into()),
            Adapter::new("enp3s0".into(), "Realtek RTL8111".into()),
        ])
    }

    #[test]
    fn lenient_lookup() {
        let list = list();
        assert_eq!(list.len(), 2);
        for i in 0..list.len() {
            assert!(!list.name(i).is_empty());
            assert!(!list.description(i).is_empty());
        }
        assert_eq!(list.name(1), "enp3s0");
        assert_eq!(list.description(0), "Intel I210 Gigabit");
        assert_eq!(list.name(2), "");
        assert_eq!(list.description(usize::MAX), "");
    }

    #[test]
    fn strict_lookup() {
        let list = list();
        assert_eq!(list.get(0).unwrap().name, "eth0");
        match list.get(2) {
            Err(Error::IndexOutOfRange { what, index, len }) => {
                assert_eq!((what, index, len), ("adapter", 2, 2));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(list.find("enp3s0").map(|a| a.description.as_str()), Some("Realtek RTL8111"));
        assert!(list.find("wlan0").is_none());
    }

    #[test]
    fn empty_list() {
        let list = AdapterList::default();
        assert!(list.is_empty());
        assert_eq!(list.name(0), "");
        assert_eq!(list.iter().count(), 0);
    }
}
