//! Dinic max-flow over an s-t graph with two terminals appended after the
//! regular nodes. Terminal capacities are stored as their difference, so
//! negative or equal costs are accepted.

use std::collections::VecDeque;

const NONE: usize = usize::MAX;
const EPS: f64 = 1e-9;

pub struct FlowGraph {
    head: Vec<usize>,
    next: Vec<usize>,
    to: Vec<usize>,
    cap: Vec<f64>,
    source: usize,
    sink: usize,
    flow: f64,
}

impl FlowGraph {
    pub fn new(node_count: usize, edge_hint: usize) -> Self {
        Self {
            head: vec![NONE; node_count + 2],
            next: Vec::with_capacity(edge_hint * 2),
            to: Vec::with_capacity(edge_hint * 2),
            cap: Vec::with_capacity(edge_hint * 2),
            source: node_count,
            sink: node_count + 1,
            flow: 0.0,
        }
    }

    fn push_arc(&mut self, from: usize, to: usize, cap: f64) {
        self.to.push(to);
        self.cap.push(cap);
        self.next.push(self.head[from]);
        self.head[from] = self.to.len() - 1;
    }

    /// Adds `u -> v` with `cap` and `v -> u` with `rev_cap`.
    pub fn add_edge(&mut self, u: usize, v: usize, cap: f64, rev_cap: f64) {
        self.push_arc(u, v, cap);
        self.push_arc(v, u, rev_cap);
    }

    /// `source_cap` is paid when the node ends on the sink side, `sink_cap`
    /// when it ends on the source side.
    pub fn add_terminal_weights(&mut self, node: usize, source_cap: f64, sink_cap: f64) {
        let common = source_cap.min(sink_cap);
        self.flow += common;

        let from_source = source_cap - common;
        let to_sink = sink_cap - common;
        if from_source > EPS {
            self.add_edge(self.source, node, from_source, 0.0);
        }
        if to_sink > EPS {
            self.add_edge(node, self.sink, to_sink, 0.0);
        }
    }

    pub fn max_flow(&mut self) -> f64 {
        let n = self.head.len();
        let mut level = vec![NONE; n];
        let mut iter = vec![NONE; n];
        let mut path: Vec<usize> = Vec::new();

        while self.build_levels(&mut level) {
            iter.copy_from_slice(&self.head);
            self.flow += self.blocking_flow(&mut level, &mut iter, &mut path);
        }

        self.flow
    }

    fn build_levels(&self, level: &mut [usize]) -> bool {
        level.fill(NONE);
        level[self.source] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(self.source);

        while let Some(u) = queue.pop_front() {
            let mut e = self.head[u];
            while e != NONE {
                let v = self.to[e];
                if self.cap[e] > EPS && level[v] == NONE {
                    level[v] = level[u] + 1;
                    queue.push_back(v);
                }
                e = self.next[e];
            }
        }

        level[self.sink] != NONE
    }

    fn blocking_flow(&mut self, level: &mut [usize], iter: &mut [usize], path: &mut Vec<usize>) -> f64 {
        let mut total = 0.0;
        let mut u = self.source;
        path.clear();

        loop {
            if u == self.sink {
                let bottleneck = path
                    .iter()
                    .map(|&e| self.cap[e])
                    .fold(f64::INFINITY, f64::min);
                for &e in path.iter() {
                    self.cap[e] -= bottleneck;
                    self.cap[e ^ 1] += bottleneck;
                }
                total += bottleneck;

                let saturated = path
                    .iter()
                    .position(|&e| self.cap[e] <= EPS)
                    .unwrap_or(0);
                path.truncate(saturated);
                u = match path.last() {
                    Some(&e) => self.to[e],
                    None => self.source,
                };
                continue;
            }

            let mut advanced = false;
            while iter[u] != NONE {
                let e = iter[u];
                let v = self.to[e];
                if self.cap[e] > EPS && level[v] != NONE && level[v] == level[u] + 1 {
                    path.push(e);
                    u = v;
                    advanced = true;
                    break;
                }
                iter[u] = self.next[e];
            }

            if !advanced {
                if u == self.source {
                    break;
                }
                level[u] = NONE;
                match path.pop() {
                    Some(e) => {
                        u = self.to[e ^ 1];
                        iter[u] = self.next[e];
                    }
                    None => break,
                }
            }
        }

        total
    }

    /// Nodes still reachable from the source in the residual graph. Only
    /// meaningful after `max_flow`.
    pub fn source_side(&self) -> Vec<bool> {
        let mut reached = vec![false; self.head.len()];
        reached[self.source] = true;
        let mut queue = VecDeque::new();
        queue.push_back(self.source);

        while let Some(u) = queue.pop_front() {
            let mut e = self.head[u];
            while e != NONE {
                let v = self.to[e];
                if self.cap[e] > EPS && !reached[v] {
                    reached[v] = true;
                    queue.push_back(v);
                }
                e = self.next[e];
            }
        }

        reached.truncate(self.source);
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textbook_network() {
        // two internal nodes, classic diamond
        let mut graph = FlowGraph::new(2, 8);
        graph.add_terminal_weights(0, 3.0, 0.0);
        graph.add_terminal_weights(1, 2.0, 0.0);
        graph.add_edge(0, 1, 1.0, 0.0);
        // 0 -> sink 2, 1 -> sink 3
        graph.add_terminal_weights(0, 0.0, 2.0);
        graph.add_terminal_weights(1, 0.0, 3.0);

        let flow = graph.max_flow();
        assert!((flow - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_cut_follows_weak_link() {
        let mut graph = FlowGraph::new(3, 8);
        graph.add_terminal_weights(0, 10.0, 0.0);
        graph.add_terminal_weights(2, 0.0, 10.0);
        graph.add_edge(0, 1, 5.0, 5.0);
        graph.add_edge(1, 2, 1.0, 1.0);

        let flow = graph.max_flow();
        assert!((flow - 1.0).abs() < 1e-9);
        assert_eq!(graph.source_side(), vec![true, true, false]);
    }

    #[test]
    fn test_equal_terminal_costs_fall_to_sink() {
        let mut graph = FlowGraph::new(1, 2);
        graph.add_terminal_weights(0, 4.0, 4.0);
        let flow = graph.max_flow();
        assert!((flow - 4.0).abs() < 1e-9);
        assert_eq!(graph.source_side(), vec![false]);
    }

    #[test]
    fn test_negative_costs_are_offset() {
        let mut graph = FlowGraph::new(2, 4);
        graph.add_terminal_weights(0, -1.0, -3.0);
        graph.add_terminal_weights(1, -5.0, -2.0);
        graph.max_flow();
        // node 0 is cheaper on the source side, node 1 on the sink side
        assert_eq!(graph.source_side(), vec![true, false]);
    }
}
