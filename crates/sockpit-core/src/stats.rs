use crate::format::format_bytes;
use crate::ServerStats;
use std::collections::HashSet;

/// Expansion state for the client tree, keyed by position in the snapshot's
/// client list. The backend issues no stable per-client identifier, so the
/// key is a synthetic positional one: if the relay reorders clients between
/// polls, an expanded marker can land on a different client. Known
/// limitation of the wire contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeState {
    expanded: HashSet<usize>,
}

impl TreeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.contains(&index)
    }

    pub fn set_expanded(&mut self, index: usize, expanded: bool) {
        if expanded {
            self.expanded.insert(index);
        } else {
            self.expanded.remove(&index);
        }
    }

    /// Flips one client's marker. Takes effect on the next rebuild; nothing
    /// is re-rendered eagerly here.
    pub fn toggle(&mut self, index: usize) {
        if !self.expanded.remove(&index) {
            self.expanded.insert(index);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayTree {
    pub rows: Vec<TreeRow>,
}

impl DisplayTree {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.rows.as_slice(), [TreeRow::Empty])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeRow {
    /// Single placeholder leaf shown when the snapshot carries no clients.
    Empty,
    Client(ClientRow),
    Target(TargetRow),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRow {
    pub index: usize,
    pub address: String,
    pub active_connections: u64,
    pub sent: String,
    pub received: String,
    pub total: String,
    pub expandable: bool,
    pub expanded: bool,
    pub target_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRow {
    pub client_index: usize,
    pub address: String,
    pub active_connections: u64,
    pub total: String,
}

/// Rebuilds the display tree from a snapshot, carrying expansion markers
/// forward by position. Markers for vanished indexes, and for clients that
/// no longer have targets to reveal, are dropped rather than preserved.
pub fn render(previous: &TreeState, stats: &ServerStats) -> (DisplayTree, TreeState) {
    let mut state = TreeState::new();
    let mut rows = Vec::new();

    if stats.client_stats.is_empty() {
        rows.push(TreeRow::Empty);
        return (DisplayTree { rows }, state);
    }

    for (index, client) in stats.client_stats.iter().enumerate() {
        let expandable = !client.targets.is_empty();
        let expanded = expandable && previous.is_expanded(index);
        state.set_expanded(index, expanded);

        rows.push(TreeRow::Client(ClientRow {
            index,
            address: client.client_ip.clone(),
            active_connections: client.active_connections,
            sent: format_bytes(client.total_bytes_sent),
            received: format_bytes(client.total_bytes_received),
            total: format_bytes(client.total_bytes),
            expandable,
            expanded,
            target_count: client.targets.len(),
        }));

        if expanded {
            for target in &client.targets {
                rows.push(TreeRow::Target(TargetRow {
                    client_index: index,
                    address: target.address.clone(),
                    active_connections: target.active_connections,
                    total: format_bytes(target.total_bytes),
                }));
            }
        }
    }

    (DisplayTree { rows }, state)
}

/// Sum of per-client active connections. Kept separate from the relay's own
/// `current_connections` counter, which can lag behind or disagree.
pub fn current_connections(stats: &ServerStats) -> u64 {
    stats
        .client_stats
        .iter()
        .map(|client| client.active_connections)
        .sum()
}

/// The `sum/max` headline figure, e.g. `2/100`.
pub fn connections_label(stats: &ServerStats) -> String {
    format!("{}/{}", current_connections(stats), stats.max_connections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientStat, TargetStat};

    fn target(address: &str, active: u64, total: u64) -> TargetStat {
        TargetStat {
            address: address.to_string(),
            active_connections: active,
            total_bytes: total,
            ..TargetStat::default()
        }
    }

    fn client(ip: &str, active: u64, targets: Vec<TargetStat>) -> ClientStat {
        ClientStat {
            client_ip: ip.to_string(),
            active_connections: active,
            targets,
            ..ClientStat::default()
        }
    }

    fn stats_with(clients: Vec<ClientStat>) -> ServerStats {
        ServerStats {
            client_stats: clients,
            ..ServerStats::default()
        }
    }

    fn client_row(row: &TreeRow) -> &ClientRow {
        match row {
            TreeRow::Client(client) => client,
            other => panic!("expected client row, got {other:?}"),
        }
    }

    fn target_row(row: &TreeRow) -> &TargetRow {
        match row {
            TreeRow::Target(target) => target,
            other => panic!("expected target row, got {other:?}"),
        }
    }

    #[test]
    fn empty_snapshot_renders_a_single_placeholder_leaf() {
        let (tree, state) = render(&TreeState::new(), &stats_with(Vec::new()));
        assert!(tree.is_placeholder());
        assert!(state.is_empty());
    }

    #[test]
    fn new_indexes_default_to_collapsed() {
        let snapshot = stats_with(vec![
            client("10.0.0.1", 1, vec![target("a.example:443", 1, 10)]),
            client("10.0.0.2", 2, vec![target("b.example:443", 1, 20)]),
        ]);
        let (tree, state) = render(&TreeState::new(), &snapshot);

        assert_eq!(tree.rows.len(), 2);
        assert!(!client_row(&tree.rows[0]).expanded);
        assert!(!client_row(&tree.rows[1]).expanded);
        assert!(state.is_empty());
    }

    #[test]
    fn expansion_survives_a_rebuild_at_the_same_index() {
        let snapshot = stats_with(vec![
            client("10.0.0.1", 1, vec![target("a.example:443", 1, 10)]),
            client("10.0.0.2", 2, vec![target("b.example:443", 1, 20)]),
        ]);

        let mut state = TreeState::new();
        state.toggle(1);
        let (tree, carried) = render(&state, &snapshot);

        assert!(!client_row(&tree.rows[0]).expanded);
        assert!(client_row(&tree.rows[1]).expanded);
        assert_eq!(target_row(&tree.rows[2]).address, "b.example:443");

        // The next poll returns an identically shaped snapshot.
        let (tree, carried) = render(&carried, &snapshot);
        assert!(!client_row(&tree.rows[0]).expanded);
        assert!(client_row(&tree.rows[1]).expanded);
        assert!(carried.is_expanded(1));
        assert!(!carried.is_expanded(0));
    }

    #[test]
    fn expanded_client_reveals_targets_in_snapshot_order() {
        let snapshot = stats_with(vec![client(
            "10.0.0.1",
            2,
            vec![
                target("first.example:443", 1, 10),
                target("second.example:80", 1, 20),
            ],
        )]);

        let mut state = TreeState::new();
        state.toggle(0);
        let (tree, _) = render(&state, &snapshot);

        assert_eq!(tree.rows.len(), 3);
        assert_eq!(client_row(&tree.rows[0]).target_count, 2);
        assert_eq!(target_row(&tree.rows[1]).address, "first.example:443");
        assert_eq!(target_row(&tree.rows[2]).address, "second.example:80");
    }

    #[test]
    fn client_without_targets_loses_its_expansion_marker() {
        let snapshot = stats_with(vec![client("10.0.0.1", 1, Vec::new())]);

        let mut state = TreeState::new();
        state.toggle(0);
        let (tree, carried) = render(&state, &snapshot);

        let row = client_row(&tree.rows[0]);
        assert!(!row.expandable);
        assert!(!row.expanded);
        assert!(carried.is_empty());
    }

    #[test]
    fn aggregate_sums_active_connections_across_clients() {
        let snapshot = stats_with(vec![
            client("10.0.0.1", 3, Vec::new()),
            client("10.0.0.2", 5, Vec::new()),
            client("10.0.0.3", 0, Vec::new()),
        ]);
        assert_eq!(current_connections(&snapshot), 8);
    }

    #[test]
    fn single_client_snapshot_renders_formatted_headline_and_rows() {
        let mut snapshot = stats_with(vec![ClientStat {
            client_ip: "1.2.3.4".to_string(),
            active_connections: 2,
            total_bytes_sent: 2048,
            total_bytes_received: 1024,
            total_bytes: 3072,
            targets: vec![target("example.com:443", 1, 3072)],
        }]);
        snapshot.max_connections = 100;

        assert_eq!(connections_label(&snapshot), "2/100");

        let mut state = TreeState::new();
        state.toggle(0);
        let (tree, _) = render(&state, &snapshot);

        let head = client_row(&tree.rows[0]);
        assert_eq!(head.address, "1.2.3.4");
        assert_eq!(head.sent, "2 KB");
        assert_eq!(head.received, "1 KB");
        assert_eq!(head.total, "3 KB");
        assert!(head.expandable);

        let detail = target_row(&tree.rows[1]);
        assert_eq!(detail.address, "example.com:443");
        assert_eq!(detail.active_connections, 1);
        assert_eq!(detail.total, "3 KB");
    }
}
