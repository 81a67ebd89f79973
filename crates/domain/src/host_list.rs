//! 主机列表规范化
//!
//! 上游的主机编辑逻辑可能把删除的主机置空而不是移动数组，这里统一把原始
//! 主机数组整理成可分发的列表：去掉空项、重复项以及本机。本机的工作总是
//! 由调用方在进程内完成，不经过分发路径。

use std::collections::HashSet;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize};

/// 规范化后的目标主机列表：非空、唯一、不含本机，保持输入的相对顺序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HostList(Vec<String>);

impl HostList {
    /// 只去空去重，不排除任何主机
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        normalize_host_list(names.into_iter().map(Some), "").hosts
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

/// 反序列化同样经过规范化，稀疏数组中的 `null` 按空项处理
impl<'de> Deserialize<'de> for HostList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<Option<String>>::deserialize(deserializer)?;
        Ok(normalize_host_list(raw, "").hosts)
    }
}

impl Deref for HostList {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl IntoIterator for HostList {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedHosts {
    pub hosts: HostList,
    pub found_local_host: bool,
}

/// 把可能稀疏、重复的原始主机数组整理为分发列表
///
/// 空项（`None`、空串或只含空白）直接丢弃；重复项只保留第一次出现；
/// 与 `local_host` 完全相同的名字被排除并记录在 `found_local_host` 中。
/// 本函数没有错误路径，返回的列表与输入没有共享存储。
pub fn normalize_host_list<I, S>(raw_hosts: I, local_host: &str) -> NormalizedHosts
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut hosts = Vec::new();
    let mut found_local_host = false;

    for entry in raw_hosts.into_iter().flatten() {
        let name = entry.as_ref();
        if name.trim().is_empty() {
            continue;
        }
        if !local_host.is_empty() && name == local_host {
            found_local_host = true;
            continue;
        }
        if seen.insert(name.to_string()) {
            hosts.push(name.to_string());
        }
    }

    NormalizedHosts {
        hosts: HostList(hosts),
        found_local_host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excludes_local_empty_and_duplicates() {
        let raw = vec![Some("h1"), Some("local"), Some(""), Some("h2"), Some("h1")];
        let normalized = normalize_host_list(raw, "local");

        assert_eq!(&*normalized.hosts, &["h1".to_string(), "h2".to_string()]);
        assert!(normalized.found_local_host);
    }

    #[test]
    fn test_sparse_slots_are_skipped() {
        let raw: Vec<Option<String>> = vec![
            None,
            Some("mds1".to_string()),
            None,
            Some("   ".to_string()),
            Some("client7".to_string()),
        ];
        let normalized = normalize_host_list(raw, "mds0");

        assert_eq!(normalized.hosts.len(), 2);
        assert_eq!(normalized.hosts[0], "mds1");
        assert_eq!(normalized.hosts[1], "client7");
        assert!(!normalized.found_local_host);
    }

    #[test]
    fn test_preserves_relative_order() {
        let raw = vec![Some("c"), Some("a"), Some("b"), Some("a"), Some("c")];
        let normalized = normalize_host_list(raw, "z");
        assert_eq!(normalized.hosts.into_inner(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_output_never_longer_than_input() {
        let raw = vec![Some("x"); 10];
        let normalized = normalize_host_list(raw, "y");
        assert_eq!(normalized.hosts.len(), 1);

        let empty: Vec<Option<&str>> = Vec::new();
        let normalized = normalize_host_list(empty, "y");
        assert!(normalized.hosts.is_empty());
        assert!(!normalized.found_local_host);
    }

    #[test]
    fn test_only_local_host() {
        let normalized = normalize_host_list(vec![Some("me"), Some("me")], "me");
        assert!(normalized.hosts.is_empty());
        assert!(normalized.found_local_host);
    }

    #[test]
    fn test_output_is_independently_owned() {
        let mut raw = vec![Some("a".to_string()), Some("b".to_string())];
        let normalized = normalize_host_list(raw.clone(), "");
        raw[0] = None;
        raw.clear();
        assert_eq!(normalized.hosts.len(), 2);
        assert_eq!(normalized.hosts[0], "a");
    }

    #[test]
    fn test_from_names_keeps_everything_but_blanks() {
        let list = HostList::from_names(["a", "", "b", "a"]);
        assert_eq!(list.into_inner(), vec!["a", "b"]);
    }

    #[test]
    fn test_deserialize_goes_through_normalization() {
        let hosts: HostList =
            serde_json::from_str(r#"["h1", "", null, "h2", "h1", "  "]"#).unwrap();
        assert_eq!(hosts.into_inner(), vec!["h1", "h2"]);
    }
}
