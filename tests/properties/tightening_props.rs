//! Property tests for the tightening, subset, and cascade laws.

use std::sync::Arc;

use proptest::prelude::*;

use agentic_trust::{
    assemble, AgentId, AttestationBuilder, AttestationStore, AuthorityType, CancellationToken,
    CapabilityType, Constraint, ConstraintType, ConstraintValue, DelegateRequest,
    DelegationEngine, Ed25519Signer, GenesisBuilder, MemoryStore, RevocationEngine,
    RevocationReason, StoredRecord, TimeWindow, TrustVerifier, VerificationLevel, VerifyRequest,
};

fn agent(name: &str) -> AgentId {
    AgentId::new(name)
}

/// Seed a genesis-rooted agent holding `read:*` and `write:*`.
fn seed_root(store: &Arc<MemoryStore>, key: &Ed25519Signer) {
    let genesis = GenesisBuilder::new(
        agent("agent_p0"),
        agent("authority_ops"),
        AuthorityType::Organization,
    )
    .sign(key)
    .unwrap();
    store.put(StoredRecord::Genesis(genesis)).unwrap();

    for capability in ["read:*", "write:*"] {
        let attestation = AttestationBuilder::new(
            agent("agent_p0"),
            agent("authority_ops"),
            capability,
            CapabilityType::Access,
        )
        .sign(key)
        .unwrap();
        store.put(StoredRecord::Attestation(attestation)).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Numeric tightening accepts exactly child <= parent.
    #[test]
    fn prop_numeric_tightening(parent in 0.0..1e6f64, child in 0.0..1e6f64) {
        let result = agentic_trust::constraint::value_tightens(
            ConstraintType::CostLimit,
            &ConstraintValue::Limit(parent),
            &ConstraintValue::Limit(child),
        );
        prop_assert_eq!(result.is_ok(), child <= parent);
    }

    /// Window containment implies every contained minute stays inside
    /// the parent, wrap-around included.
    #[test]
    fn prop_window_containment_pointwise(
        parent_start in 0u32..24,
        parent_end in 0u32..24,
        child_start in 0u32..24,
        child_end in 0u32..24,
        minute in 0u32..1440,
    ) {
        let parent = TimeWindow::hours(parent_start, parent_end);
        let child = TimeWindow::hours(child_start, child_end);
        if parent.contains_window(&child) && child.contains_minute(minute) {
            prop_assert!(
                parent.contains_minute(minute),
                "minute {} in child {} but not parent {}",
                minute, child, parent
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Down a randomly generated delegation chain, the engine accepts a
    /// hop exactly when it tightens, and the leaf envelope equals the
    /// running minimum of accepted limits (monotonicity at depth n vs
    /// n-1).
    #[test]
    fn prop_envelope_monotone_over_random_chains(
        limits in proptest::collection::vec(1.0..1000.0f64, 1..6),
    ) {
        let store = Arc::new(MemoryStore::new());
        let key = Ed25519Signer::generate();
        seed_root(&store, &key);
        let engine = DelegationEngine::new(store.clone() as Arc<dyn AttestationStore>);

        let mut effective = f64::INFINITY;
        let mut depth = 0usize;
        for limit in limits {
            let delegator = AgentId::new(format!("agent_p{depth}"));
            let delegatee = AgentId::new(format!("agent_p{}", depth + 1));
            let outcome = engine
                .delegate(
                    &DelegateRequest::new(delegator.clone(), delegatee)
                        .capability("read:data")
                        .constraint(Constraint::cost_limit(limit, delegator, 0)),
                    &key,
                )
                .unwrap();

            let should_accept = limit <= effective;
            prop_assert_eq!(
                outcome.is_granted(),
                should_accept,
                "limit {} against effective {}",
                limit,
                effective
            );
            if should_accept {
                effective = effective.min(limit);
                depth += 1;
            }
        }

        if depth > 0 {
            let chain = assemble(store.as_ref(), &AgentId::new(format!("agent_p{depth}"))).unwrap();
            let bound = chain
                .constraint_envelope
                .get(ConstraintType::CostLimit)
                .expect("limit must bind delegated agents");
            prop_assert_eq!(&bound.value, &ConstraintValue::Limit(effective));
        }
    }

    /// Subset law: a delegation is granted exactly when every requested
    /// capability is covered by the delegator's effective set, and the
    /// stored record then only carries covered capabilities.
    #[test]
    fn prop_capability_subset_law(
        requested in proptest::collection::vec(
            prop_oneof![
                Just("read:data".to_string()),
                Just("read:logs".to_string()),
                Just("write:data".to_string()),
                Just("delete:data".to_string()),
                Just("execute:jobs".to_string()),
            ],
            1..4,
        ),
    ) {
        let store = Arc::new(MemoryStore::new());
        let key = Ed25519Signer::generate();
        seed_root(&store, &key);
        let engine = DelegationEngine::new(store.clone() as Arc<dyn AttestationStore>);

        // agent_p0 holds read:* and write:* only.
        let covered = |uri: &str| uri.starts_with("read:") || uri.starts_with("write:");
        let all_covered = requested.iter().all(|uri| covered(uri));

        let mut request = DelegateRequest::new(agent("agent_p0"), agent("agent_q"));
        for uri in &requested {
            request = request.capability(uri.clone());
        }
        let outcome = engine.delegate(&request, &key).unwrap();

        prop_assert_eq!(outcome.is_granted(), all_covered);
        if let Some(record) = outcome.record() {
            for uri in &record.capabilities_delegated {
                prop_assert!(covered(uri));
            }
        }
    }

    /// Level consistency: whenever STANDARD verification passes, QUICK
    /// must also pass against the same state.
    #[test]
    fn prop_quick_never_stricter_than_standard(
        limit in 1.0..100.0f64,
        cost in 1.0..200.0f64,
    ) {
        let store = Arc::new(MemoryStore::new());
        let key = Ed25519Signer::generate();
        seed_root(&store, &key);
        let engine = DelegationEngine::new(store.clone() as Arc<dyn AttestationStore>);
        let delegated = engine
            .delegate(
                &DelegateRequest::new(agent("agent_p0"), agent("agent_q"))
                    .capability("read:data")
                    .constraint(Constraint::cost_limit(limit, agent("agent_p0"), 0)),
                &key,
            )
            .unwrap();
        prop_assert!(delegated.is_granted());

        let verifier = TrustVerifier::new(store.clone() as Arc<dyn AttestationStore>);
        let context = agentic_trust::ActionContext { cost: Some(cost), ..Default::default() };

        let standard = verifier
            .verify(
                &VerifyRequest::new(agent("agent_q"), "read:data", VerificationLevel::Standard)
                    .context(context.clone()),
            )
            .unwrap();
        let quick = verifier
            .verify(
                &VerifyRequest::new(agent("agent_q"), "read:data", VerificationLevel::Quick)
                    .context(context),
            )
            .unwrap();

        if standard.valid {
            prop_assert!(quick.valid);
        }
    }

    /// Cascade completeness: revoking a random node of a random tree
    /// denies exactly its reachable subtree; a second revocation is a
    /// reported no-op.
    #[test]
    fn prop_cascade_exactness_over_random_trees(
        parents in (2usize..9).prop_flat_map(|n| {
            proptest::collection::vec(any::<prop::sample::Index>(), n - 1)
                .prop_map(move |idx| {
                    // parent of node i (1-based) is a random earlier node.
                    idx.iter()
                        .enumerate()
                        .map(|(i, index)| index.index(i + 1))
                        .collect::<Vec<usize>>()
                })
        }),
        target_index in any::<prop::sample::Index>(),
    ) {
        let n = parents.len() + 1;
        let store = Arc::new(MemoryStore::new());
        let key = Ed25519Signer::generate();
        seed_root(&store, &key);
        let engine = DelegationEngine::new(store.clone() as Arc<dyn AttestationStore>);

        // Node 0 is the seeded root; node i descends from parents[i-1].
        for (i, parent) in parents.iter().enumerate() {
            let outcome = engine
                .delegate(
                    &DelegateRequest::new(
                        AgentId::new(format!("agent_p{parent}")),
                        AgentId::new(format!("agent_p{}", i + 1)),
                    )
                    .capability("read:data"),
                    &key,
                )
                .unwrap();
            prop_assert!(outcome.is_granted());
        }

        // Expected blast radius, computed independently of the engine.
        let target = target_index.index(n);
        let mut affected = vec![false; n];
        affected[target] = true;
        loop {
            let mut changed = false;
            for (i, parent) in parents.iter().enumerate() {
                if affected[*parent] && !affected[i + 1] {
                    affected[i + 1] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let revoker = RevocationEngine::new(store.clone() as Arc<dyn AttestationStore>);
        let target_agent = AgentId::new(format!("agent_p{target}"));
        let preview = revoker
            .compute_impact(&target_agent, &CancellationToken::new())
            .unwrap();
        let first = revoker
            .revoke(
                &target_agent,
                RevocationReason::Compromised,
                &agent("authority_ops"),
                &preview.confirmation_token,
                &key,
            )
            .unwrap();
        prop_assert!(first.is_complete());

        let verifier = TrustVerifier::new(store.clone() as Arc<dyn AttestationStore>);
        for (i, expect_dead) in affected.iter().enumerate() {
            let result = verifier
                .verify(&VerifyRequest::new(
                    AgentId::new(format!("agent_p{i}")),
                    "read:data",
                    VerificationLevel::Standard,
                ))
                .unwrap();
            prop_assert_eq!(
                result.valid,
                !expect_dead,
                "agent_p{} validity mismatch",
                i
            );
        }

        // Idempotence: the second call reports zero newly affected.
        let second = revoker
            .revoke(
                &target_agent,
                RevocationReason::Compromised,
                &agent("authority_ops"),
                &preview.confirmation_token,
                &key,
            )
            .unwrap();
        prop_assert_eq!(second.newly_affected(), 0);
    }
}
