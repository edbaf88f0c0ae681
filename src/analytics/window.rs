//! ウィンドウ化アクセス層
//! 仮想スクロールで表示範囲だけを取り出し、ページ単位の読み込みで
//! 大きなリプレイ集合でも描画コストを表示件数に比例させる。

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{ReplayError, Result};

/// 表示範囲（両端を含むインデックス）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleRange {
    pub start: usize,
    pub end: usize,
}

impl VisibleRange {
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }
}

/// 固定高さの行を前提とした仮想スクロール
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualScroll {
    item_height: f64,
    container_height: f64,
    overscan: usize,
}

impl VirtualScroll {
    /// 行の高さは正の有限値、コンテナの高さは0以上の有限値である必要がある
    pub fn new(item_height: f64, container_height: f64, overscan: usize) -> Result<Self> {
        if !item_height.is_finite() || item_height <= 0.0 {
            return Err(ReplayError::InvalidWindow {
                reason: format!("item_height must be positive, got {}", item_height),
            });
        }
        if !container_height.is_finite() || container_height < 0.0 {
            return Err(ReplayError::InvalidWindow {
                reason: format!("container_height must be non-negative, got {}", container_height),
            });
        }

        Ok(Self {
            item_height,
            container_height,
            overscan,
        })
    }

    /// スクロール位置から表示範囲を求める
    /// 件数0の場合はNone。両端は常に`[0, item_count - 1]`に収まる
    pub fn visible_range(&self, item_count: usize, scroll_top: f64) -> Option<VisibleRange> {
        if item_count == 0 {
            return None;
        }

        let last = item_count - 1;
        let scroll_top = if scroll_top.is_finite() { scroll_top.max(0.0) } else { 0.0 };

        let first_visible = to_index((scroll_top / self.item_height).floor());
        let last_visible = to_index(((scroll_top + self.container_height) / self.item_height).ceil());

        let start = first_visible.saturating_sub(self.overscan).min(last);
        let end = last_visible.saturating_add(self.overscan).min(last);

        Some(VisibleRange { start, end: end.max(start) })
    }

    /// 表示範囲の要素だけを取り出す
    pub fn visible_items<'a, T>(&self, items: &'a [T], scroll_top: f64) -> &'a [T] {
        match self.visible_range(items.len(), scroll_top) {
            Some(range) => &items[range.start..=range.end],
            None => &[],
        }
    }

    /// 全体の高さ（スクロール領域の大きさ）
    pub fn total_height(&self, item_count: usize) -> f64 {
        item_count as f64 * self.item_height
    }

    /// 指定インデックスの行の上端位置
    pub fn offset_top(&self, index: usize) -> f64 {
        index as f64 * self.item_height
    }
}

/// 浮動小数点のインデックスをusizeへ（負値は0、巨大値は飽和）
fn to_index(value: f64) -> usize {
    if value <= 0.0 {
        0
    } else if value >= usize::MAX as f64 {
        usize::MAX
    } else {
        value as usize
    }
}

/// 非同期読み込みの受付票
/// 発行後にスクロール位置が変わった場合、完了しても反映されない
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLoadTicket {
    pub page: usize,
    generation: u64,
}

/// ページ単位の読み込み管理
#[derive(Debug, Clone)]
pub struct Paginator {
    total_items: usize,
    page_size: usize,
    loaded: BTreeSet<usize>,
    current_page: usize,
    generation: u64,
}

impl Paginator {
    /// ページサイズ0は1として扱う
    pub fn new(total_items: usize, page_size: usize) -> Self {
        Self {
            total_items,
            page_size: page_size.max(1),
            loaded: BTreeSet::new(),
            current_page: 0,
            generation: 0,
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.page_size)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn is_loaded(&self, page: usize) -> bool {
        self.loaded.contains(&page)
    }

    pub fn loaded_pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.loaded.iter().copied()
    }

    /// ページを明示的に読み込む
    /// 範囲外は状態を変えずにエラーを返す。新たに読み込んだ場合はtrue
    pub fn load_page(&mut self, page: usize) -> Result<bool> {
        let total_pages = self.total_pages();
        if page >= total_pages {
            return Err(ReplayError::PageOutOfRange { page, total_pages });
        }

        self.current_page = page;
        Ok(self.loaded.insert(page))
    }

    /// 現在ページの次を先読みする
    /// 最終ページの場合や読み込み済みの場合は何もしない
    pub fn preload_next(&mut self) -> bool {
        let next = self.current_page + 1;
        if next >= self.total_pages() || self.loaded.contains(&next) {
            return false;
        }
        self.loaded.insert(next)
    }

    /// 非同期読み込みを開始する（範囲外ならNone）
    pub fn begin_load(&self, page: usize) -> Option<PageLoadTicket> {
        (page < self.total_pages()).then_some(PageLoadTicket {
            page,
            generation: self.generation,
        })
    }

    /// 新しいスクロール位置により、発行済みの受付票を無効にする
    pub fn supersede(&mut self) {
        self.generation += 1;
    }

    /// 非同期読み込みの完了を反映する
    /// 古い受付票は無視してfalseを返す
    pub fn finish_load(&mut self, ticket: PageLoadTicket) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(page = ticket.page, "ignoring superseded page load");
            return false;
        }

        self.current_page = ticket.page;
        self.loaded.insert(ticket.page);
        true
    }

    /// 読み込み済みページに含まれるインデックス（元の並び順）
    pub fn visible_indices(&self) -> Vec<usize> {
        self.loaded
            .iter()
            .flat_map(|&page| {
                let start = page * self.page_size;
                let end = (start + self.page_size).min(self.total_items);
                start..end
            })
            .collect()
    }

    /// 読み込み済みページの要素（元の並び順）
    pub fn visible_items<'a, T>(&self, items: &'a [T]) -> Vec<&'a T> {
        self.visible_indices()
            .into_iter()
            .filter_map(|index| items.get(index))
            .collect()
    }

    /// 指定ページの要素
    pub fn page_items<'a, T>(&self, items: &'a [T], page: usize) -> &'a [T] {
        let start = (page * self.page_size).min(items.len());
        let end = (start + self.page_size).min(items.len());
        &items[start..end]
    }
}
