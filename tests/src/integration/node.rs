//! # Nodes From Configuration
//!
//! A notary node started from a JSON file, served to a requesting client.

use super::support::{party_key, spend, state};
use nc_03_notary_consensus::{ConsensusBackend, ConsensusConfigError};
use nc_05_notary_client::{NotaryClient, NotaryClientFlow};
use notary_node::{ConfigError, NodeError, NotaryConfig, NotaryNode};
use shared_crypto::KeyPair;
use std::io::Write;

fn config_file(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_replicated_node_from_file_notarises_and_refuses_double_spend() {
    let seed = "07".repeat(32);
    let file = config_file(&format!(
        r#"{{
            "notary_name": "O=Cluster Notary, L=Oslo, C=NO",
            "key_seed_hex": "{seed}",
            "mode": {{
                "kind": "replicated_cluster",
                "replica_id": 1,
                "cluster_addresses": ["n0:10000", "n1:10000", "n2:10000", "n3:10000"],
                "request_timeout_ms": 5000,
                "view_change_timeout_ms": 300
            }}
        }}"#
    ));
    let config = NotaryConfig::from_file(file.path()).unwrap();
    let node = NotaryNode::start(config).unwrap();

    assert_eq!(node.identity().owning_key, KeyPair::from_seed([7; 32]).public_key());
    let ConsensusBackend::ReplicatedCluster { cluster, .. } = node.backend().as_ref() else {
        panic!("expected a replicated backend");
    };
    assert_eq!(cluster.size(), 4);

    let alice = party_key(1);
    let t1 = spend(node.identity(), vec![state(40, 0)], &[&alice], 1);
    let t2 = spend(node.identity(), vec![state(40, 0)], &[&alice], 2);
    {
        let client = NotaryClient::new("Alice", node.endpoint(), NotaryClientFlow::new(false));
        let notarised = client.notarize(t1.clone(), vec![]).await.unwrap();
        assert_eq!(notarised.sigs.last().unwrap().by, node.identity().owning_key);
        assert_eq!(client.notarize(t2, vec![]).await.unwrap_err().kind(), "conflict");
    }

    assert_eq!(
        node.ledger().get(&state(40, 0)).unwrap().unwrap().consuming_tx,
        t1.id()
    );
    assert_eq!(node.shutdown().await, 2);
}

#[tokio::test]
async fn test_replica_outside_cluster_refuses_to_start() {
    let file = config_file(
        r#"{
            "mode": {
                "kind": "replicated_cluster",
                "replica_id": 4,
                "cluster_addresses": ["n0:1", "n1:1", "n2:1", "n3:1"]
            }
        }"#,
    );
    let config = NotaryConfig::from_file(file.path()).unwrap();

    let err = NotaryNode::start(config).err().unwrap();

    assert!(matches!(
        err,
        NodeError::Config(ConfigError::Consensus(ConsensusConfigError::ReplicaIdOutOfRange { .. }))
    ));
}
