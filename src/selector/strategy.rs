//! 负载均衡策略

use crate::registry::{Node, Service};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 负载均衡策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// 随机（Random）
    #[default]
    Random,
    /// 轮询（Round Robin）
    RoundRobin,
}

impl Strategy {
    /// 从候选节点中选择一个
    pub fn pick(&self, nodes: &[Node], counter: &AtomicUsize) -> Option<Node> {
        if nodes.is_empty() {
            return None;
        }
        let index = match self {
            Strategy::Random => rand::thread_rng().gen_range(0..nodes.len()),
            Strategy::RoundRobin => counter.fetch_add(1, Ordering::Relaxed) % nodes.len(),
        };
        nodes.get(index).cloned()
    }
}

/// 汇总所有版本的节点，按节点 id 排序
///
/// Registry 返回的顺序不稳定，排序后轮询才能在多次查询间保持一致。
pub fn flatten_nodes(services: &[Service]) -> Vec<Node> {
    let mut nodes: Vec<Node> = services
        .iter()
        .flat_map(|s| s.nodes.iter().cloned())
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    nodes
}
