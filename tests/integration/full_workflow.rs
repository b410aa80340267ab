//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle:
//! 1. Establish genesis trust for a root agent
//! 2. Attest capabilities with constraints
//! 3. Delegate down a chain, tightening constraints
//! 4. Verify actions at every level
//! 5. Preview and commit a cascade revocation
//! 6. Verify the whole subtree is denied afterwards

use std::sync::Arc;

use agentic_trust::{
    assemble, AgentId, AnchorResult, AttestationBuilder, AttestationStore, AuditLedger,
    AuthorityType, CancellationToken, CapabilityType, Constraint, DelegateRequest,
    DelegationEngine, DenialReason, Ed25519Signer, Ed25519Verifier, GenesisBuilder, MemoryStore,
    RevocationEngine, RevocationReason, StoredRecord, TimeWindow, TrustVerifier,
    VerificationLevel, VerifyRequest,
};

fn agent(id: &str) -> AgentId {
    AgentId::new(id)
}

#[test]
fn full_workflow_genesis_to_cascade_revocation() {
    let store = Arc::new(MemoryStore::new());
    let authority_key = Ed25519Signer::generate();
    let shared: Arc<dyn AttestationStore> = store.clone();

    // ── Step 1: Genesis for the root agent ──────────────────────────────
    let genesis = GenesisBuilder::new(
        agent("agent_alpha"),
        agent("authority_ops"),
        AuthorityType::Organization,
    )
    .sign(&authority_key)
    .expect("genesis signing should succeed");
    assert!(genesis.id.0.starts_with("agen_"));
    store.put(StoredRecord::Genesis(genesis)).unwrap();

    // ── Step 2: Attest capabilities with a cost constraint ──────────────
    let cost = Constraint::cost_limit(100.0, agent("authority_ops"), 0);
    let cost_id = cost.id.clone();
    store.put(StoredRecord::Constraint(cost)).unwrap();

    for capability in ["read:*", "execute:jobs:*"] {
        let attestation = AttestationBuilder::new(
            agent("agent_alpha"),
            agent("authority_ops"),
            capability,
            CapabilityType::Access,
        )
        .constraint(cost_id.clone())
        .sign(&authority_key)
        .expect("attestation signing should succeed");
        store.put(StoredRecord::Attestation(attestation)).unwrap();
    }

    // ── Step 3: Delegate alpha -> beta -> gamma, tightening ─────────────
    let engine = DelegationEngine::new(shared.clone());

    let alpha_beta = engine
        .delegate(
            &DelegateRequest::new(agent("agent_alpha"), agent("agent_beta"))
                .capability("read:data")
                .capability("execute:jobs:nightly")
                .constraint(Constraint::cost_limit(50.0, agent("agent_alpha"), 0))
                .constraint(Constraint::time_window(
                    TimeWindow::hours(0, 0),
                    agent("agent_alpha"),
                    0,
                )),
            &authority_key,
        )
        .expect("delegation should not error");
    assert!(alpha_beta.is_granted(), "alpha -> beta should be granted");

    // Loosening the cost limit on the next hop must be rejected.
    let loosened = engine
        .delegate(
            &DelegateRequest::new(agent("agent_beta"), agent("agent_gamma"))
                .capability("read:data")
                .constraint(Constraint::cost_limit(80.0, agent("agent_beta"), 0)),
            &authority_key,
        )
        .expect("delegation should not error");
    assert!(!loosened.is_granted());

    let beta_gamma = engine
        .delegate(
            &DelegateRequest::new(agent("agent_beta"), agent("agent_gamma"))
                .capability("read:data")
                .constraint(Constraint::cost_limit(25.0, agent("agent_beta"), 0)),
            &authority_key,
        )
        .expect("delegation should not error");
    assert!(beta_gamma.is_granted(), "beta -> gamma should be granted");

    // ── Step 4: Verify actions down the chain ───────────────────────────
    let verifier = TrustVerifier::new(shared.clone());

    let result = verifier
        .verify(&VerifyRequest::new(
            agent("agent_gamma"),
            "read:data",
            VerificationLevel::Standard,
        ))
        .expect("verification should not error");
    assert!(result.valid, "gamma should be allowed to read:data");
    assert_eq!(result.capability_used.as_deref(), Some("read:data"));

    // gamma never received execute rights.
    let result = verifier
        .verify(&VerifyRequest::new(
            agent("agent_gamma"),
            "execute:jobs:nightly",
            VerificationLevel::Standard,
        ))
        .expect("verification should not error");
    assert!(!result.valid);
    assert!(matches!(
        result.reason,
        Some(DenialReason::CapabilityNotGranted { .. })
    ));

    // The envelope tightened to 25 at gamma's depth.
    let chain = assemble(store.as_ref(), &agent("agent_gamma")).unwrap();
    let effective = chain
        .constraint_envelope
        .get(agentic_trust::ConstraintType::CostLimit)
        .expect("cost limit should bind gamma");
    assert_eq!(effective.value, agentic_trust::ConstraintValue::Limit(25.0));

    // Anchor the allowed decision, then check the audit chain.
    let ledger = AuditLedger::new(shared.clone());
    ledger
        .append(
            &agent("agent_gamma"),
            "read:data",
            None,
            AnchorResult::Success,
            &result.chain_hash,
            None,
            &authority_key,
        )
        .expect("anchor append should succeed");
    assert_eq!(
        ledger
            .verify_anchor_chain(&agent("agent_gamma"), &Ed25519Verifier)
            .expect("anchor chain should verify"),
        1
    );

    // ── Step 5: Preview the cascade from alpha ──────────────────────────
    let revocations = RevocationEngine::new(shared.clone());
    let preview = revocations
        .compute_impact(&agent("agent_alpha"), &CancellationToken::new())
        .expect("impact preview should succeed");

    let mut descendants: Vec<(String, u32)> = preview
        .descendants
        .iter()
        .map(|d| (d.agent_id.0.clone(), d.depth))
        .collect();
    descendants.sort();
    assert_eq!(
        descendants,
        vec![("agent_beta".to_string(), 1), ("agent_gamma".to_string(), 2)]
    );

    // ── Step 6: Commit and verify the subtree is dead ───────────────────
    let result = revocations
        .revoke(
            &agent("agent_alpha"),
            RevocationReason::Compromised,
            &agent("authority_ops"),
            &preview.confirmation_token,
            &authority_key,
        )
        .expect("revocation should succeed");
    assert_eq!(result.newly_affected(), 3);
    assert!(result.is_complete());

    for name in ["agent_alpha", "agent_beta", "agent_gamma"] {
        let denied = verifier
            .verify(&VerifyRequest::new(
                agent(name),
                "read:data",
                VerificationLevel::Full,
            ))
            .expect("verification should not error");
        assert!(!denied.valid, "{name} must be denied after the cascade");
        assert!(
            matches!(denied.reason, Some(DenialReason::Revoked { .. })),
            "{name} must be denied with a revocation reason"
        );
    }

    // Idempotence: a second commit is a no-op.
    let second = revocations
        .revoke(
            &agent("agent_alpha"),
            RevocationReason::Compromised,
            &agent("authority_ops"),
            &preview.confirmation_token,
            &authority_key,
        )
        .expect("second revocation should succeed");
    assert_eq!(second.newly_affected(), 0);
    assert_eq!(second.already_revoked.len(), 3);
}

#[test]
fn workflow_sibling_subtree_survives_revocation() {
    let store = Arc::new(MemoryStore::new());
    let key = Ed25519Signer::generate();
    let shared: Arc<dyn AttestationStore> = store.clone();

    let genesis = GenesisBuilder::new(
        agent("agent_root"),
        agent("authority_ops"),
        AuthorityType::Service,
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

    let engine = DelegationEngine::new(shared.clone());
    for delegatee in ["agent_left", "agent_right"] {
        let outcome = engine
            .delegate(
                &DelegateRequest::new(agent("agent_root"), agent(delegatee))
                    .capability("read:data"),
                &key,
            )
            .unwrap();
        assert!(outcome.is_granted());
    }

    let revocations = RevocationEngine::new(shared.clone());
    let preview = revocations
        .compute_impact(&agent("agent_left"), &CancellationToken::new())
        .unwrap();
    revocations
        .revoke(
            &agent("agent_left"),
            RevocationReason::PolicyViolation,
            &agent("authority_ops"),
            &preview.confirmation_token,
            &key,
        )
        .unwrap();

    let verifier = TrustVerifier::new(shared);
    let left = verifier
        .verify(&VerifyRequest::new(
            agent("agent_left"),
            "read:data",
            VerificationLevel::Standard,
        ))
        .unwrap();
    assert!(!left.valid);

    // Cascade completeness cuts exactly the reachable set, nothing more.
    for name in ["agent_right", "agent_root"] {
        let result = verifier
            .verify(&VerifyRequest::new(
                agent(name),
                "read:data",
                VerificationLevel::Standard,
            ))
            .unwrap();
        assert!(result.valid, "{name} must survive the sibling revocation");
    }
}

#[test]
fn workflow_file_store_round_trip() {
    // The same workflow drives the file-backed store.
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(agentic_trust::FileStore::new(dir.path().join("records")).unwrap());
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

    let engine = DelegationEngine::new(shared.clone());
    let outcome = engine
        .delegate(
            &DelegateRequest::new(agent("agent_root"), agent("agent_b")).capability("read:data"),
            &key,
        )
        .unwrap();
    assert!(outcome.is_granted());

    let verifier = TrustVerifier::new(shared);
    let result = verifier
        .verify(&VerifyRequest::new(
            agent("agent_b"),
            "read:data",
            VerificationLevel::Full,
        ))
        .unwrap();
    assert!(result.valid);
}
