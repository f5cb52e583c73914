//! 会话分页合并
//!
//! 把一次分页拉取的结果合并进规范会话列表。三种模式：
//! - 全量快照：limit 超过阈值时整体替换
//! - 切片：按偏移覆盖工作数组的 `[offset, offset + len)` 区间
//! - 合并：未给出偏移时按 ID 求并集
//!
//! 偏移量指工作数组（插入顺序）中的位置，而不是排序后的展示位置。

use crate::im::store::ConversationCollection;
use crate::im::types::LocalConversation;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// 默认全量快照阈值：limit 超过该值视为"拉取全部"
pub const DEFAULT_FULL_SNAPSHOT_THRESHOLD: usize = 1000;

/// 一次分页请求的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: Option<usize>,
    pub limit: usize,
    /// 显式要求全量快照，不依赖 limit 与阈值的比较
    pub full_snapshot: bool,
}

impl PageRequest {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset: Some(offset),
            limit,
            full_snapshot: false,
        }
    }

    /// 全量快照请求：结果整体替换本地列表
    pub fn full_snapshot(limit: usize) -> Self {
        Self {
            offset: Some(0),
            limit,
            full_snapshot: true,
        }
    }

    /// 不带偏移的批量请求（按 ID 合并）
    pub fn unpositioned(limit: usize) -> Self {
        Self {
            offset: None,
            limit,
            full_snapshot: false,
        }
    }

    pub fn mode(&self, full_snapshot_threshold: usize) -> MergeMode {
        if self.full_snapshot || self.limit > full_snapshot_threshold {
            MergeMode::FullSnapshot
        } else {
            match self.offset {
                Some(offset) => MergeMode::Slice { offset },
                None => MergeMode::Union,
            }
        }
    }
}

/// 合并模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    FullSnapshot,
    Slice { offset: usize },
    Union,
}

/// 合并结果统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: Vec<LocalConversation>,
    pub updated: Vec<LocalConversation>,
    pub removed: Vec<String>,
}

impl MergeSummary {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// 把一页会话合并进集合，完成后集合已按排序规则有序
///
/// 合并是幂等的：同一页在同一偏移重复合并，结果（按 ID 比较）不变
pub fn merge_page(
    collection: &mut ConversationCollection,
    page: Vec<LocalConversation>,
    request: PageRequest,
    full_snapshot_threshold: usize,
) -> MergeSummary {
    let page = dedup_page(page);
    let mode = request.mode(full_snapshot_threshold);
    info!(
        "[ConvPage] 合并分页结果，模式: {:?}, 本页会话数: {}, 本地会话数: {}",
        mode,
        page.len(),
        collection.len()
    );

    let mut records = collection.records.clone();
    let mut slots = collection.slots.clone();
    let mut summary = MergeSummary::default();

    match mode {
        MergeMode::FullSnapshot => {
            let page_ids: HashSet<&str> =
                page.iter().map(|c| c.conversation_id.as_str()).collect();
            summary.removed = slots
                .iter()
                .filter(|id| !page_ids.contains(id.as_str()))
                .cloned()
                .collect();
            for id in &summary.removed {
                warn!("[ConvPage]   全量快照中不存在，删除会话: {}", id);
                records.remove(id);
            }
            slots = page.iter().map(|c| c.conversation_id.clone()).collect();
        }
        MergeMode::Slice { offset } => {
            write_slice(&mut slots, offset, &page);
        }
        MergeMode::Union => {
            for conv in &page {
                if !records.contains_key(&conv.conversation_id) {
                    slots.push(conv.conversation_id.clone());
                }
            }
        }
    }

    for conv in page {
        record_change(&records, &conv, &mut summary);
        records.insert(conv.conversation_id.clone(), conv);
    }

    debug_assert_eq!(records.len(), slots.len());
    collection.commit(records, slots);

    info!(
        "[ConvPage] 合并完成 - 新增: {}, 更新: {}, 删除: {}",
        summary.inserted.len(),
        summary.updated.len(),
        summary.removed.len()
    );
    summary
}

/// 页内重复 ID 只保留第一次出现
fn dedup_page(page: Vec<LocalConversation>) -> Vec<LocalConversation> {
    let mut seen = HashSet::new();
    page.into_iter()
        .filter(|conv| {
            let fresh = seen.insert(conv.conversation_id.clone());
            if !fresh {
                warn!(
                    "[ConvPage]   分页结果中会话 {} 重复出现，忽略",
                    conv.conversation_id
                );
            }
            fresh
        })
        .collect()
}

/// 覆盖/扩展工作数组中的 `[offset, offset + len)` 区间
///
/// 被覆盖下来的 ID 若不再出现在数组中会被追加到末尾，保证成员不丢失；
/// 本页 ID 在区间外的旧位置会被移除，保证不重复。
fn write_slice(slots: &mut Vec<String>, offset: usize, page: &[LocalConversation]) {
    if offset > slots.len() {
        debug!(
            "[ConvPage]   偏移 {} 超出工作数组长度 {}，追加到末尾",
            offset,
            slots.len()
        );
    }

    let mut written: HashSet<usize> = HashSet::new();
    let mut displaced: Vec<String> = Vec::new();
    for (i, conv) in page.iter().enumerate() {
        let slot = offset + i;
        let id = conv.conversation_id.clone();
        if slot < slots.len() {
            let old = std::mem::replace(&mut slots[slot], id);
            if old != slots[slot] {
                displaced.push(old);
            }
            written.insert(slot);
        } else {
            written.insert(slots.len());
            slots.push(id);
        }
    }

    let page_ids: HashSet<&str> = page.iter().map(|c| c.conversation_id.as_str()).collect();
    let mut kept: Vec<String> = slots
        .iter()
        .enumerate()
        .filter(|(idx, id)| written.contains(idx) || !page_ids.contains(id.as_str()))
        .map(|(_, id)| id.clone())
        .collect();

    for id in displaced {
        if !kept.contains(&id) {
            kept.push(id);
        }
    }
    *slots = kept;
}

fn record_change(
    records: &HashMap<String, LocalConversation>,
    incoming: &LocalConversation,
    summary: &mut MergeSummary,
) {
    match records.get(&incoming.conversation_id) {
        Some(existing) if existing == incoming => {
            debug!("[ConvPage]   会话 {} 无需更新", incoming.conversation_id);
        }
        Some(_) => {
            debug!("[ConvPage]   更新会话: {}", incoming.conversation_id);
            summary.updated.push(incoming.clone());
        }
        None => {
            debug!("[ConvPage]   新增会话: {}", incoming.conversation_id);
            summary.inserted.push(incoming.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::im::conversation::sort::is_sorted;
    use crate::im::message::models::LocalMessage;
    use crate::im::types::ConversationKind;

    const THRESHOLD: usize = DEFAULT_FULL_SNAPSHOT_THRESHOLD;

    fn conv(id: &str) -> LocalConversation {
        LocalConversation::new(id, id, ConversationKind::Private)
    }

    fn conv_at(id: &str, at: i64) -> LocalConversation {
        conv(id).with_latest_message(LocalMessage::new(format!("m-{id}"), id, "u1", "x", at))
    }

    fn id_set(collection: &ConversationCollection) -> Vec<String> {
        let mut ids: Vec<String> = collection
            .ordered()
            .into_iter()
            .map(|c| c.conversation_id)
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn mode_selection() {
        assert_eq!(
            PageRequest::new(0, 20).mode(THRESHOLD),
            MergeMode::Slice { offset: 0 }
        );
        assert_eq!(
            PageRequest::new(0, THRESHOLD + 1).mode(THRESHOLD),
            MergeMode::FullSnapshot
        );
        assert_eq!(PageRequest::unpositioned(20).mode(THRESHOLD), MergeMode::Union);
        assert_eq!(
            PageRequest::new(0, THRESHOLD).mode(THRESHOLD),
            MergeMode::Slice { offset: 0 }
        );
        assert_eq!(
            PageRequest::full_snapshot(usize::MAX).mode(usize::MAX),
            MergeMode::FullSnapshot
        );
    }

    #[test]
    fn consecutive_pages_contain_each_conversation_once() {
        let mut collection = ConversationCollection::new();
        merge_page(
            &mut collection,
            vec![conv("X"), conv("Y")],
            PageRequest::new(0, 2),
            THRESHOLD,
        );
        merge_page(
            &mut collection,
            vec![conv("Z"), conv("W")],
            PageRequest::new(2, 2),
            THRESHOLD,
        );

        assert_eq!(id_set(&collection), vec!["W", "X", "Y", "Z"]);
        assert_eq!(collection.loaded_len(), 4);
        assert!(is_sorted(&collection.ordered()));
    }

    #[test]
    fn same_page_twice_is_idempotent() {
        let mut collection = ConversationCollection::new();
        let page = vec![conv_at("a", 5), conv_at("b", 9), conv("c")];

        let first = merge_page(&mut collection, page.clone(), PageRequest::new(0, 3), THRESHOLD);
        let after_first = collection.ordered();
        let second = merge_page(&mut collection, page, PageRequest::new(0, 3), THRESHOLD);

        assert_eq!(first.inserted.len(), 3);
        assert!(second.is_empty());
        assert_eq!(collection.ordered(), after_first);
    }

    #[test]
    fn slice_leaves_entries_outside_the_range_untouched() {
        let mut collection = ConversationCollection::new();
        merge_page(
            &mut collection,
            vec![conv("a"), conv("b"), conv("c"), conv("d")],
            PageRequest::new(0, 4),
            THRESHOLD,
        );

        let refreshed_b = conv("b").with_pinned(true);
        let summary = merge_page(
            &mut collection,
            vec![refreshed_b.clone()],
            PageRequest::new(1, 1),
            THRESHOLD,
        );

        assert_eq!(summary.updated, vec![refreshed_b]);
        assert_eq!(id_set(&collection), vec!["a", "b", "c", "d"]);
        assert_eq!(collection.ordered()[0].conversation_id, "b");
    }

    #[test]
    fn displaced_entries_are_kept_and_shifted_entries_not_duplicated() {
        let mut collection = ConversationCollection::new();
        merge_page(
            &mut collection,
            vec![conv("A"), conv("B")],
            PageRequest::new(0, 2),
            THRESHOLD,
        );
        // 推送事件插入的会话排在工作数组末尾
        collection.upsert(conv("N"));

        // 服务端列表整体后移一位，第二页与已加载的 B 重叠
        merge_page(
            &mut collection,
            vec![conv("B"), conv("C")],
            PageRequest::new(2, 2),
            THRESHOLD,
        );

        assert_eq!(id_set(&collection), vec!["A", "B", "C", "N"]);
        assert_eq!(collection.loaded_len(), 4);
    }

    #[test]
    fn full_snapshot_replaces_wholesale() {
        let mut collection = ConversationCollection::new();
        merge_page(
            &mut collection,
            vec![conv("old1"), conv("keep")],
            PageRequest::new(0, 2),
            THRESHOLD,
        );

        let summary = merge_page(
            &mut collection,
            vec![conv("keep"), conv("new")],
            PageRequest::new(0, THRESHOLD + 1),
            THRESHOLD,
        );

        assert_eq!(summary.removed, vec!["old1".to_string()]);
        assert_eq!(summary.inserted.len(), 1);
        assert_eq!(id_set(&collection), vec!["keep", "new"]);
    }

    #[test]
    fn unpositioned_batch_is_an_id_union() {
        let mut collection = ConversationCollection::new();
        collection.upsert(conv("a"));

        merge_page(
            &mut collection,
            vec![conv("b"), conv("a").with_pinned(true), conv("b")],
            PageRequest::unpositioned(10),
            THRESHOLD,
        );

        assert_eq!(id_set(&collection), vec!["a", "b"]);
        assert!(collection.get("a").map(|c| c.is_pinned).unwrap_or(false));
    }
}
