//! 空间索引
//!
//! 包围盒树，用于剪枝距离查询的候选边对：
//! - 批量插入矩形（每个矩形带一个回指源边/源形状的 id）
//! - 范围查询：返回与查询矩形相交的所有 id
//!
//! 树的节点存放在一个 `Vec` 中并以下标互相引用，
//! 因此整个索引可以直接克隆、移动和序列化。

use crate::math::{BoundingBox2, Point2};
use serde::{Deserialize, Serialize};

/// 叶子节点最多容纳的条目数
const LEAF_CAPACITY: usize = 4;

/// 索引条目
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: usize,
    pub bbox: BoundingBox2,
}

impl IndexEntry {
    pub fn new(id: usize, bbox: BoundingBox2) -> Self {
        Self { id, bbox }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum NodeKind {
    /// 叶子：`entries` 中的一段 [start, end)
    Leaf { start: usize, end: usize },
    /// 内部节点：左右子节点在 `nodes` 中的下标
    Branch { left: usize, right: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Node {
    bbox: BoundingBox2,
    kind: NodeKind,
}

/// 包围盒树（节点池实现）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialIndex {
    /// 条目，按树的叶子顺序排列
    entries: Vec<IndexEntry>,
    /// 节点池
    nodes: Vec<Node>,
    /// 根节点下标
    root: Option<usize>,
}

impl SpatialIndex {
    /// 创建空索引
    pub fn new() -> Self {
        Self::default()
    }

    /// 由一批矩形构建索引，无效矩形被忽略
    pub fn from_entries(entries: impl IntoIterator<Item = IndexEntry>) -> Self {
        let mut index = Self::new();
        index.insert_batch(entries);
        index
    }

    /// 批量插入并重建树
    pub fn insert_batch(&mut self, entries: impl IntoIterator<Item = IndexEntry>) {
        self.entries
            .extend(entries.into_iter().filter(|e| e.bbox.is_valid()));
        self.rebuild();
    }

    /// 重建整棵树
    pub fn rebuild(&mut self) {
        self.nodes.clear();
        self.root = None;
        if self.entries.is_empty() {
            return;
        }
        let count = self.entries.len();
        self.nodes.reserve(2 * count / LEAF_CAPACITY + 1);
        self.root = Some(self.build(0, count));
    }

    /// 递归构建 [start, end) 范围内条目的子树，返回节点下标
    fn build(&mut self, start: usize, end: usize) -> usize {
        let slice = &mut self.entries[start..end];
        let bbox = slice
            .iter()
            .fold(BoundingBox2::empty(), |acc, e| acc.union(&e.bbox));

        if end - start <= LEAF_CAPACITY {
            self.nodes.push(Node {
                bbox,
                kind: NodeKind::Leaf { start, end },
            });
            return self.nodes.len() - 1;
        }

        // 沿较长的轴按中心中位数划分
        let split_x = bbox.width() >= bbox.height();
        let key = |e: &IndexEntry| {
            let c = e.bbox.center();
            if split_x {
                c.x
            } else {
                c.y
            }
        };
        let mid = (end - start) / 2;
        slice.select_nth_unstable_by(mid, |a, b| key(a).total_cmp(&key(b)));

        // 先占位，子节点建好后再回填
        let index = self.nodes.len();
        self.nodes.push(Node {
            bbox,
            kind: NodeKind::Leaf { start, end },
        });
        let left = self.build(start, start + mid);
        let right = self.build(start + mid, end);
        self.nodes[index].kind = NodeKind::Branch { left, right };
        index
    }

    /// 范围查询：查找包围盒与 `rect` 相交的所有 id
    pub fn query_rect(&self, rect: &BoundingBox2) -> Vec<usize> {
        let mut result = Vec::new();
        self.visit_intersecting(rect, |entry| result.push(entry.id));
        result
    }

    /// 点击测试：查找包含指定点的所有 id
    pub fn query_point(&self, point: &Point2) -> Vec<usize> {
        self.query_rect(&BoundingBox2::new(*point, *point))
    }

    /// 对每个与 `rect` 相交的条目调用 `f`
    pub fn visit_intersecting(&self, rect: &BoundingBox2, mut f: impl FnMut(&IndexEntry)) {
        let Some(root) = self.root else {
            return;
        };
        if !rect.is_valid() {
            return;
        }

        let mut stack = vec![root];
        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index];
            if !node.bbox.intersects(rect) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, end } => {
                    for entry in &self.entries[start..end] {
                        if entry.bbox.intersects(rect) {
                            f(entry);
                        }
                    }
                }
                NodeKind::Branch { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
    }

    /// 所有条目的总包围盒
    pub fn bounding_box(&self) -> BoundingBox2 {
        self.root
            .map(|r| self.nodes[r].bbox)
            .unwrap_or_else(BoundingBox2::empty)
    }

    /// 清空索引
    pub fn clear(&mut self) {
        self.entries.clear();
        self.nodes.clear();
        self.root = None;
    }

    /// 获取条目数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 检查是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 树的节点数量
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
