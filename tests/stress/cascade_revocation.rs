//! Stress test: cascade revocation over a wide, deep delegation tree.

use std::sync::Arc;

use agentic_trust::{
    AgentId, AttestationBuilder, AttestationStore, AuthorityType, CancellationToken,
    CapabilityType, DelegateRequest, DelegationEngine, Ed25519Signer, GenesisBuilder,
    MemoryStore, RevocationEngine, RevocationReason, StoredRecord, TrustVerifier,
    VerificationLevel, VerifyRequest,
};

fn agent(name: &str) -> AgentId {
    AgentId::new(name)
}

/// Build a 3-level tree: root delegates to `fanout` children, each of
/// which delegates to `fanout` grandchildren.
fn build_tree(fanout: usize) -> (Arc<MemoryStore>, Ed25519Signer, Vec<AgentId>) {
    let store = Arc::new(MemoryStore::new());
    let key = Ed25519Signer::generate();
    let shared: Arc<dyn AttestationStore> = store.clone();

    let genesis = GenesisBuilder::new(
        agent("agent_root"),
        agent("authority_ops"),
        AuthorityType::Organization,
    )
    .sign(&key)
    .unwrap();
    store.put(StoredRecord::Genesis(genesis)).unwrap();

    let attestation = AttestationBuilder::new(
        agent("agent_root"),
        agent("authority_ops"),
        "read:*",
        CapabilityType::Access,
    )
    .sign(&key)
    .unwrap();
    store.put(StoredRecord::Attestation(attestation)).unwrap();

    let engine = DelegationEngine::new(shared);
    let mut all = Vec::new();
    for i in 0..fanout {
        let child = agent(&format!("agent_child_{i}"));
        let outcome = engine
            .delegate(
                &DelegateRequest::new(agent("agent_root"), child.clone())
                    .capability("read:data"),
                &key,
            )
            .unwrap();
        assert!(outcome.is_granted());
        all.push(child.clone());

        for j in 0..fanout {
            let grandchild = agent(&format!("agent_grandchild_{i}_{j}"));
            let outcome = engine
                .delegate(
                    &DelegateRequest::new(child.clone(), grandchild.clone())
                        .capability("read:data"),
                    &key,
                )
                .unwrap();
            assert!(outcome.is_granted());
            all.push(grandchild);
        }
    }

    (store, key, all)
}

#[test]
fn stress_cascade_revokes_tree_of_90() {
    let fanout = 9; // 9 children + 81 grandchildren
    let (store, key, all) = build_tree(fanout);
    let shared: Arc<dyn AttestationStore> = store.clone();

    let engine = RevocationEngine::new(shared.clone());
    let preview = engine
        .compute_impact(&agent("agent_root"), &CancellationToken::new())
        .unwrap();
    assert_eq!(preview.descendants.len(), fanout + fanout * fanout);

    // Depths are exact: children at 1, grandchildren at 2.
    for d in &preview.descendants {
        if d.agent_id.0.starts_with("agent_child_") {
            assert_eq!(d.depth, 1);
        } else {
            assert_eq!(d.depth, 2);
        }
    }

    let result = engine
        .revoke(
            &agent("agent_root"),
            RevocationReason::Compromised,
            &agent("authority_ops"),
            &preview.confirmation_token,
            &key,
        )
        .unwrap();
    assert_eq!(result.newly_affected(), 1 + fanout + fanout * fanout);
    assert!(result.is_complete());

    // Every member of the tree is denied afterwards.
    let verifier = TrustVerifier::new(shared);
    for member in &all {
        let denied = verifier
            .verify(&VerifyRequest::new(
                member.clone(),
                "read:data",
                VerificationLevel::Quick,
            ))
            .unwrap();
        assert!(!denied.valid, "{member} must be denied");
    }
}

#[test]
fn stress_partial_cascade_leaves_other_branches() {
    let fanout = 5;
    let (store, key, _all) = build_tree(fanout);
    let shared: Arc<dyn AttestationStore> = store.clone();

    let engine = RevocationEngine::new(shared.clone());
    let target = agent("agent_child_0");
    let preview = engine
        .compute_impact(&target, &CancellationToken::new())
        .unwrap();
    assert_eq!(preview.descendants.len(), fanout);

    engine
        .revoke(
            &target,
            RevocationReason::PolicyViolation,
            &agent("authority_ops"),
            &preview.confirmation_token,
            &key,
        )
        .unwrap();

    let verifier = TrustVerifier::new(shared);

    // child_0's subtree is dead.
    for j in 0..fanout {
        let denied = verifier
            .verify(&VerifyRequest::new(
                agent(&format!("agent_grandchild_0_{j}")),
                "read:data",
                VerificationLevel::Standard,
            ))
            .unwrap();
        assert!(!denied.valid);
    }

    // Every other branch still verifies.
    for i in 1..fanout {
        let ok = verifier
            .verify(&VerifyRequest::new(
                agent(&format!("agent_child_{i}")),
                "read:data",
                VerificationLevel::Standard,
            ))
            .unwrap();
        assert!(ok.valid, "sibling branch {i} must survive");
    }
}

#[test]
fn stress_idempotent_recascade_after_partial_overlap() {
    let fanout = 4;
    let (store, key, _all) = build_tree(fanout);
    let shared: Arc<dyn AttestationStore> = store.clone();
    let engine = RevocationEngine::new(shared);

    // Revoke one child first.
    let child = agent("agent_child_1");
    let token = engine
        .compute_impact(&child, &CancellationToken::new())
        .unwrap()
        .confirmation_token;
    let first = engine
        .revoke(
            &child,
            RevocationReason::PolicyViolation,
            &agent("authority_ops"),
            &token,
            &key,
        )
        .unwrap();
    assert_eq!(first.newly_affected(), 1 + fanout);

    // Revoking the root afterwards skips the already-terminal branch
    // but still covers everything else.
    let token = engine
        .compute_impact(&agent("agent_root"), &CancellationToken::new())
        .unwrap()
        .confirmation_token;
    let second = engine
        .revoke(
            &agent("agent_root"),
            RevocationReason::Compromised,
            &agent("authority_ops"),
            &token,
            &key,
        )
        .unwrap();

    let expected_total = 1 + fanout + fanout * fanout;
    let expected_already = 1 + fanout;
    assert_eq!(second.already_revoked.len(), expected_already);
    assert_eq!(second.newly_affected(), expected_total - expected_already);

    // Each agent carries exactly one terminal record.
    assert_eq!(
        store.revocations_for(&agent("agent_child_1")).unwrap().len(),
        1
    );
    assert_eq!(
        store
            .revocations_for(&agent("agent_grandchild_1_0"))
            .unwrap()
            .len(),
        1
    );
}
