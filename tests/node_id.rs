use ironstream::NodeId;
use std::collections::BTreeSet;

#[test]
fn test_node_id_creation() {
    assert_eq!(NodeId::new(1).raw(), 1);
    assert_eq!(NodeId::new(1), NodeId::new(1));
    assert_ne!(NodeId::new(1), NodeId::new(2));
}

#[test]
fn test_node_id_display() {
    assert_eq!(NodeId::new(12).to_string(), "node#12");
}

#[test]
fn test_node_id_ordering() {
    let ids: BTreeSet<NodeId> = [3, 1, 2].into_iter().map(NodeId::new).collect();
    let raw: Vec<u64> = ids.iter().map(NodeId::raw).collect();
    assert_eq!(raw, vec![1, 2, 3]);
}
