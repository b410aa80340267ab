//! Stress test: delegate down a chain of depth 50 and verify the leaf.

use std::sync::Arc;

use agentic_trust::{
    assemble, AgentId, AttestationBuilder, AttestationStore, AuthorityType, CapabilityType,
    Constraint, ConstraintType, ConstraintValue, DelegateRequest, DelegationEngine,
    Ed25519Signer, GenesisBuilder, MemoryStore, StoredRecord, TrustVerifier, VerificationLevel,
    VerifyRequest,
};

fn agent(i: usize) -> AgentId {
    AgentId::new(format!("agent_node_{i}"))
}

#[test]
fn stress_delegation_chain_depth_50() {
    let chain_depth = 50;
    let store = Arc::new(MemoryStore::new());
    let key = Ed25519Signer::generate();
    let shared: Arc<dyn AttestationStore> = store.clone();

    let genesis = GenesisBuilder::new(
        agent(0),
        AgentId::new("authority_ops"),
        AuthorityType::Organization,
    )
    .sign(&key)
    .expect("genesis signing should succeed");
    store.put(StoredRecord::Genesis(genesis)).unwrap();

    let attestation = AttestationBuilder::new(
        agent(0),
        AgentId::new("authority_ops"),
        "read:*",
        CapabilityType::Access,
    )
    .sign(&key)
    .unwrap();
    store.put(StoredRecord::Attestation(attestation)).unwrap();

    // Each hop tightens the cost limit by one unit, starting at 1000.
    let engine = DelegationEngine::new(shared.clone());
    for i in 0..chain_depth {
        let outcome = engine
            .delegate(
                &DelegateRequest::new(agent(i), agent(i + 1))
                    .capability("read:data")
                    .constraint(Constraint::cost_limit(
                        (1000 - i) as f64,
                        agent(i),
                        0,
                    )),
                &key,
            )
            .unwrap_or_else(|e| panic!("delegation {i} errored: {e}"));
        assert!(outcome.is_granted(), "delegation {i} should be granted");
    }

    // The leaf chain walks all the way back to the genesis.
    let chain = assemble(store.as_ref(), &agent(chain_depth)).unwrap();
    assert_eq!(chain.delegations.len(), chain_depth);
    assert_eq!(chain.genesis.agent_id, agent(0));

    // Monotonicity: the effective limit at the leaf is the tightest
    // imposed anywhere on the path.
    let effective = chain
        .constraint_envelope
        .get(ConstraintType::CostLimit)
        .expect("cost limit should bind the leaf");
    assert_eq!(
        effective.value,
        ConstraintValue::Limit((1000 - (chain_depth - 1)) as f64)
    );

    // The leaf verifies at every level.
    let verifier = TrustVerifier::new(shared);
    for level in [
        VerificationLevel::Quick,
        VerificationLevel::Standard,
        VerificationLevel::Full,
    ] {
        let result = verifier
            .verify(&VerifyRequest::new(agent(chain_depth), "read:data", level))
            .unwrap();
        assert!(result.valid, "leaf should verify at {level:?}");
    }
}

#[test]
fn stress_envelope_monotone_at_every_depth() {
    let chain_depth = 20;
    let store = Arc::new(MemoryStore::new());
    let key = Ed25519Signer::generate();
    let shared: Arc<dyn AttestationStore> = store.clone();

    let genesis = GenesisBuilder::new(
        agent(0),
        AgentId::new("authority_ops"),
        AuthorityType::Organization,
    )
    .sign(&key)
    .unwrap();
    store.put(StoredRecord::Genesis(genesis)).unwrap();

    let attestation = AttestationBuilder::new(
        agent(0),
        AgentId::new("authority_ops"),
        "read:*",
        CapabilityType::Access,
    )
    .sign(&key)
    .unwrap();
    store.put(StoredRecord::Attestation(attestation)).unwrap();

    let engine = DelegationEngine::new(shared);
    for i in 0..chain_depth {
        // Tighten on even hops, carry nothing new on odd hops.
        let mut request =
            DelegateRequest::new(agent(i), agent(i + 1)).capability("read:data");
        if i % 2 == 0 {
            request = request.constraint(Constraint::cost_limit(
                (500 - 10 * i) as f64,
                agent(i),
                0,
            ));
        }
        assert!(engine.delegate(&request, &key).unwrap().is_granted());
    }

    // At every depth, the effective limit never loosens.
    let mut previous = f64::INFINITY;
    for i in 1..=chain_depth {
        let chain = assemble(store.as_ref(), &agent(i)).unwrap();
        if let Some(constraint) = chain.constraint_envelope.get(ConstraintType::CostLimit) {
            let ConstraintValue::Limit(limit) = constraint.value else {
                panic!("cost limit must be numeric");
            };
            assert!(
                limit <= previous,
                "envelope loosened at depth {i}: {limit} > {previous}"
            );
            previous = limit;
        }
    }
}
