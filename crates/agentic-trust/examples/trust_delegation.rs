//! Example: delegation chain with tightening constraints and cascade
//! revocation.
//!
//! Run with: `cargo run --example trust_delegation -p agentic-trust`

use std::sync::Arc;

use agentic_trust::{
    AgentId, AttestationBuilder, AttestationStore, AuthorityType, CancellationToken,
    CapabilityType, Constraint, DelegateRequest, DelegationEngine, Ed25519Signer, GenesisBuilder,
    MemoryStore, RevocationEngine, RevocationReason, StoredRecord, TimeWindow, TrustVerifier,
    VerificationLevel, VerifyRequest,
};

fn main() -> agentic_trust::Result<()> {
    let store: Arc<dyn AttestationStore> = Arc::new(MemoryStore::new());
    let authority_key = Ed25519Signer::generate();

    let orchestrator = AgentId::new("agent_orchestrator");
    let researcher = AgentId::new("agent_researcher");
    let scraper = AgentId::new("agent_scraper");

    // An authority roots trust for the orchestrator.
    let genesis = GenesisBuilder::new(
        orchestrator.clone(),
        AgentId::new("authority_ops"),
        AuthorityType::Organization,
    )
    .sign(&authority_key)?;
    store.put(StoredRecord::Genesis(genesis))?;

    let attestation = AttestationBuilder::new(
        orchestrator.clone(),
        AgentId::new("authority_ops"),
        "read:*",
        CapabilityType::Access,
    )
    .sign(&authority_key)?;
    store.put(StoredRecord::Attestation(attestation))?;

    // Orchestrator delegates a narrowed slice to the researcher:
    // reads only, cost-capped, business hours.
    let engine = DelegationEngine::new(store.clone());
    let outcome = engine.delegate(
        &DelegateRequest::new(orchestrator.clone(), researcher.clone())
            .capability("read:web")
            .capability("read:papers")
            .constraint(Constraint::cost_limit(100.0, orchestrator.clone(), 0))
            .constraint(Constraint::time_window(
                TimeWindow::hours(9, 17),
                orchestrator.clone(),
                0,
            )),
        &authority_key,
    )?;
    println!("orchestrator -> researcher: granted={}", outcome.is_granted());

    // Researcher sub-delegates to a scraper, tightening the cost cap.
    let outcome = engine.delegate(
        &DelegateRequest::new(researcher.clone(), scraper.clone())
            .capability("read:web")
            .constraint(Constraint::cost_limit(20.0, researcher.clone(), 0)),
        &authority_key,
    )?;
    println!("researcher -> scraper: granted={}", outcome.is_granted());

    // Trying to LOOSEN the cap is rejected with the values named.
    let outcome = engine.delegate(
        &DelegateRequest::new(researcher.clone(), AgentId::new("agent_rogue"))
            .capability("read:web")
            .constraint(Constraint::cost_limit(500.0, researcher.clone(), 0)),
        &authority_key,
    )?;
    for violation in outcome.violations() {
        println!("rejected: {violation}");
    }

    // Verify the scraper's authority.
    let verifier = TrustVerifier::new(store.clone());
    let result = verifier.verify(&VerifyRequest::new(
        scraper.clone(),
        "read:web",
        VerificationLevel::Standard,
    ))?;
    println!("scraper read:web -> valid={}", result.valid);

    // Revoke the researcher; the scraper falls with it.
    let revocations = RevocationEngine::new(store.clone());
    let preview = revocations.compute_impact(&researcher, &CancellationToken::new())?;
    println!(
        "revoking researcher invalidates {} descendant(s)",
        preview.descendants.len()
    );
    revocations.revoke(
        &researcher,
        RevocationReason::PolicyViolation,
        &AgentId::new("authority_ops"),
        &preview.confirmation_token,
        &authority_key,
    )?;

    let result = verifier.verify(&VerifyRequest::new(
        scraper,
        "read:web",
        VerificationLevel::Full,
    ))?;
    println!(
        "scraper read:web after cascade -> valid={}, reason={:?}",
        result.valid, result.reason
    );

    Ok(())
}
