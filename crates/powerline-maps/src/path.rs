//! Shortest paths over a board's connection graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::MapData;

/// A cheapest route between two cities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// City IDs from start to destination, both inclusive.
    pub cities: Vec<String>,
    /// Sum of connection costs along the route.
    pub cost: u64,
}

/// Adjacency-list view of a board, built once per map at load time.
#[derive(Debug, Clone)]
pub(crate) struct CityGraph {
    index: HashMap<String, usize>,
    ids: Vec<String>,
    edges: Vec<Vec<(usize, u64)>>,
}

impl CityGraph {
    /// Builds the undirected graph. Expects a validated map.
    pub(crate) fn new(map: &MapData) -> Self {
        let ids: Vec<String> = map.cities.iter().map(|c| c.id.clone()).collect();
        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        let mut edges = vec![Vec::new(); ids.len()];
        for link in &map.connections {
            let (Some(&a), Some(&b)) = (index.get(&link.from), index.get(&link.to)) else {
                continue;
            };
            let cost = u64::try_from(link.cost).unwrap_or(0);
            edges[a].push((b, cost));
            edges[b].push((a, cost));
        }
        Self { index, ids, edges }
    }

    /// Dijkstra from `from` to `to`. `None` if either city is unknown or
    /// `to` is unreachable.
    pub(crate) fn shortest_path(&self, from: &str, to: &str) -> Option<Route> {
        let start = *self.index.get(from)?;
        let goal = *self.index.get(to)?;

        let mut dist = vec![u64::MAX; self.ids.len()];
        let mut prev: Vec<Option<usize>> = vec![None; self.ids.len()];
        dist[start] = 0;

        let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::new();
        heap.push(Reverse((0, start)));

        while let Some(Reverse((cost, node))) = heap.pop() {
            if node == goal {
                break;
            }
            if cost != dist[node] {
                continue;
            }
            for &(next, step) in &self.edges[node] {
                let candidate = cost.saturating_add(step);
                if candidate < dist[next] {
                    dist[next] = candidate;
                    prev[next] = Some(node);
                    heap.push(Reverse((candidate, next)));
                }
            }
        }

        if dist[goal] == u64::MAX {
            return None;
        }

        let mut cities = vec![self.ids[goal].clone()];
        let mut at = goal;
        while let Some(p) = prev[at] {
            cities.push(self.ids[p].clone());
            at = p;
        }
        cities.reverse();

        Some(Route {
            cities,
            cost: dist[goal],
        })
    }
}
