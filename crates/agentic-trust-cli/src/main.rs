//! AgenticTrust CLI — `atr` command.
//!
//! Drives the trust delegation core from the command line: establishing
//! genesis records, attesting capabilities, delegating, verifying
//! actions, previewing and committing cascade revocations, and
//! inspecting audit chains. Records persist through the file-backed
//! attestation store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use agentic_trust::{
    assemble, ActionContext, AgentId, AttestationBuilder, AttestationStore, AuditLedger,
    AuthorityType, CancellationToken, CapabilityType, ConfirmationToken, Constraint,
    DelegateRequest, DelegationEngine, Ed25519Signer, Ed25519Verifier, FileStore, GenesisBuilder,
    RecordSigner, RevocationEngine, RevocationReason, StoredRecord, TimeWindow, TrustVerifier,
    VerificationLevel, VerifyRequest,
};

// ── Directory helpers ─────────────────────────────────────────────────────────

fn trust_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("ATRUST_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").expect("HOME not set");
    PathBuf::from(home).join(".agentic").join("trust")
}

fn keys_dir() -> PathBuf {
    trust_dir().join("keys")
}

fn key_path(name: &str) -> PathBuf {
    keys_dir().join(format!("{name}.key"))
}

fn open_store() -> Result<Arc<FileStore>> {
    Ok(Arc::new(
        FileStore::new(trust_dir().join("records")).context("opening attestation store")?,
    ))
}

// ── Key helpers ───────────────────────────────────────────────────────────────

fn load_signer(name: &str) -> Result<Ed25519Signer> {
    let path = key_path(name);
    let hex_str = std::fs::read_to_string(&path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    let bytes = hex::decode(hex_str.trim()).context("decoding key hex")?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow!("key file must contain 32 hex-encoded bytes"))?;
    Ok(Ed25519Signer::from_signing_key_bytes(&bytes))
}

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "atr", about = "AgenticTrust — trust delegation for AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LevelArg {
    Quick,
    Standard,
    Full,
}

impl From<LevelArg> for VerificationLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Quick => VerificationLevel::Quick,
            LevelArg::Standard => VerificationLevel::Standard,
            LevelArg::Full => VerificationLevel::Full,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Generate a signing key for an authority or agent.
    KeyNew {
        /// Key name.
        name: String,
    },
    /// Establish a genesis record for an agent.
    Genesis {
        /// Agent to root trust for.
        agent: String,
        /// Authority establishing trust.
        #[arg(long)]
        authority: String,
        /// Authority type: human, organization, or service.
        #[arg(long, default_value = "organization")]
        authority_type: String,
        /// Signing key name.
        #[arg(long)]
        key: String,
        /// Expiry in days.
        #[arg(long)]
        expires_days: Option<i64>,
    },
    /// Attest a capability for an agent.
    Attest {
        /// Agent being attested.
        agent: String,
        /// Capability URI (e.g. "read:data", "read:*").
        capability: String,
        /// Attesting authority/agent.
        #[arg(long)]
        attester: String,
        /// Signing key name.
        #[arg(long)]
        key: String,
    },
    /// Delegate capabilities to another agent.
    Delegate {
        /// Delegating agent.
        delegator: String,
        /// Receiving agent.
        delegatee: String,
        /// Capability URIs to delegate.
        #[arg(long, required = true)]
        capability: Vec<String>,
        /// Impose a cost limit.
        #[arg(long)]
        cost_limit: Option<f64>,
        /// Impose a daily time window as start,end hours (e.g. "9,17").
        #[arg(long)]
        window: Option<String>,
        /// Bind the delegation to a task.
        #[arg(long)]
        task: Option<String>,
        /// Signing key name (the delegator's key).
        #[arg(long)]
        key: String,
    },
    /// Verify whether an agent may perform an action.
    Verify {
        /// Agent requesting the action.
        agent: String,
        /// Action URI.
        action: String,
        /// Resource acted on.
        #[arg(long)]
        resource: Option<String>,
        /// Verification level.
        #[arg(long, value_enum, default_value = "standard")]
        level: LevelArg,
        /// Cost of the action, for constraint evaluation.
        #[arg(long)]
        cost: Option<f64>,
    },
    /// Preview the blast radius of revoking an agent.
    Impact {
        /// Agent to preview revocation for.
        agent: String,
    },
    /// Commit a cascade revocation (requires the token from `impact`).
    Revoke {
        /// Agent to revoke.
        agent: String,
        /// Confirmation token printed by `impact`.
        #[arg(long)]
        token: String,
        /// Reason: compromised, policy-violation, or manual.
        #[arg(long, default_value = "manual")]
        reason: String,
        /// Acting identity (for the audit trail).
        #[arg(long)]
        actor: String,
        /// Signing key name.
        #[arg(long)]
        key: String,
    },
    /// Show an agent's assembled trust chain.
    Chain {
        /// Agent to inspect.
        agent: String,
    },
    /// Show and verify an agent's audit anchor chain.
    Audit {
        /// Agent to inspect.
        agent: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::KeyNew { name } => key_new(&name),
        Command::Genesis {
            agent,
            authority,
            authority_type,
            key,
            expires_days,
        } => genesis(&agent, &authority, &authority_type, &key, expires_days),
        Command::Attest {
            agent,
            capability,
            attester,
            key,
        } => attest(&agent, &capability, &attester, &key),
        Command::Delegate {
            delegator,
            delegatee,
            capability,
            cost_limit,
            window,
            task,
            key,
        } => delegate(&delegator, &delegatee, capability, cost_limit, window, task, &key),
        Command::Verify {
            agent,
            action,
            resource,
            level,
            cost,
        } => verify(&agent, &action, resource, level.into(), cost),
        Command::Impact { agent } => impact(&agent),
        Command::Revoke {
            agent,
            token,
            reason,
            actor,
            key,
        } => revoke(&agent, &token, &reason, &actor, &key),
        Command::Chain { agent } => chain(&agent),
        Command::Audit { agent } => audit(&agent),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

fn key_new(name: &str) -> Result<()> {
    std::fs::create_dir_all(keys_dir())?;
    let path = key_path(name);
    if path.exists() {
        return Err(anyhow!("key {name} already exists at {}", path.display()));
    }
    let signer = Ed25519Signer::generate();
    std::fs::write(&path, hex::encode(signer.signing_key_bytes()))?;
    println!("created key {name}");
    println!("public key: {}", signer.public_key_base64());
    Ok(())
}

fn parse_authority_type(s: &str) -> AuthorityType {
    match s {
        "human" => AuthorityType::Human,
        "organization" => AuthorityType::Organization,
        "service" => AuthorityType::Service,
        other => AuthorityType::Custom(other.to_string()),
    }
}

fn genesis(
    agent: &str,
    authority: &str,
    authority_type: &str,
    key: &str,
    expires_days: Option<i64>,
) -> Result<()> {
    let store = open_store()?;
    let signer = load_signer(key)?;

    let mut builder = GenesisBuilder::new(
        AgentId::new(agent),
        AgentId::new(authority),
        parse_authority_type(authority_type),
    );
    if let Some(days) = expires_days {
        builder = builder.expires_at(chrono::Utc::now() + chrono::Duration::days(days));
    }
    let record = builder.sign(&signer)?;
    let id = store.put(StoredRecord::Genesis(record))?;
    println!("genesis {id} established for {agent}");
    Ok(())
}

fn attest(agent: &str, capability: &str, attester: &str, key: &str) -> Result<()> {
    let store = open_store()?;
    let signer = load_signer(key)?;

    let record = AttestationBuilder::new(
        AgentId::new(agent),
        AgentId::new(attester),
        capability,
        CapabilityType::Access,
    )
    .sign(&signer)?;
    let id = store.put(StoredRecord::Attestation(record))?;
    println!("attestation {id}: {agent} may {capability}");
    Ok(())
}

fn parse_window(spec: &str) -> Result<TimeWindow> {
    let (start, end) = spec
        .split_once(',')
        .ok_or_else(|| anyhow!("window must be start,end hours (e.g. \"9,17\")"))?;
    Ok(TimeWindow::hours(
        start.trim().parse().context("window start hour")?,
        end.trim().parse().context("window end hour")?,
    ))
}

fn delegate(
    delegator: &str,
    delegatee: &str,
    capabilities: Vec<String>,
    cost_limit: Option<f64>,
    window: Option<String>,
    task: Option<String>,
    key: &str,
) -> Result<()> {
    let store = open_store()?;
    let signer = load_signer(key)?;
    let engine = DelegationEngine::new(store as Arc<dyn AttestationStore>);

    let mut request = DelegateRequest::new(AgentId::new(delegator), AgentId::new(delegatee));
    for capability in capabilities {
        request = request.capability(capability);
    }
    if let Some(limit) = cost_limit {
        request = request.constraint(Constraint::cost_limit(limit, AgentId::new(delegator), 0));
    }
    if let Some(spec) = window {
        request = request.constraint(Constraint::time_window(
            parse_window(&spec)?,
            AgentId::new(delegator),
            0,
        ));
    }
    if let Some(task) = task {
        request = request.task(task);
    }

    match engine.delegate(&request, &signer)? {
        agentic_trust::DelegationOutcome::Granted(record) => {
            println!("delegation {} stored", record.id);
            println!("  {} -> {}", record.delegator_id, record.delegatee_id);
            println!("  capabilities: {}", record.capabilities_delegated.join(", "));
        }
        agentic_trust::DelegationOutcome::Rejected(violations) => {
            println!("delegation REJECTED:");
            for violation in violations {
                println!("  - {violation}");
            }
        }
    }
    Ok(())
}

fn verify(
    agent: &str,
    action: &str,
    resource: Option<String>,
    level: VerificationLevel,
    cost: Option<f64>,
) -> Result<()> {
    let store = open_store()?;
    let verifier = TrustVerifier::new(store as Arc<dyn AttestationStore>);

    let mut request = VerifyRequest::new(AgentId::new(agent), action, level).context(ActionContext {
        cost,
        ..Default::default()
    });
    if let Some(resource) = resource {
        request = request.resource(resource);
    }

    let result = verifier.verify(&request)?;
    if result.valid {
        println!(
            "ALLOWED via {} ({} ms)",
            result.capability_used.as_deref().unwrap_or("?"),
            result.latency_ms
        );
    } else {
        match &result.reason {
            Some(reason) => println!("DENIED: {reason}"),
            None => println!("DENIED"),
        }
        for violation in &result.violations {
            println!("  - {}", violation.message);
        }
    }
    Ok(())
}

fn impact(agent: &str) -> Result<()> {
    let store = open_store()?;
    let engine = RevocationEngine::new(store as Arc<dyn AttestationStore>);

    let preview = engine.compute_impact(&AgentId::new(agent), &CancellationToken::new())?;
    println!(
        "revoking {} would invalidate {} descendant(s):",
        preview.target,
        preview.descendants.len()
    );
    for d in &preview.descendants {
        println!(
            "  depth {} — {} ({:?}, {} active tasks)",
            d.depth, d.agent_id, d.status, d.active_tasks
        );
    }
    for warning in &preview.warnings {
        println!("warning: {warning}");
    }
    println!("confirmation token: {}", preview.confirmation_token.0);
    Ok(())
}

fn parse_reason(s: &str) -> RevocationReason {
    match s {
        "compromised" => RevocationReason::Compromised,
        "policy-violation" => RevocationReason::PolicyViolation,
        "manual" => RevocationReason::ManualRevocation,
        other => RevocationReason::Custom(other.to_string()),
    }
}

fn revoke(agent: &str, token: &str, reason: &str, actor: &str, key: &str) -> Result<()> {
    let store = open_store()?;
    let signer = load_signer(key)?;
    let engine = RevocationEngine::new(store as Arc<dyn AttestationStore>);

    let result = engine.revoke(
        &AgentId::new(agent),
        parse_reason(reason),
        &AgentId::new(actor),
        &ConfirmationToken(token.to_string()),
        &signer,
    )?;

    println!(
        "revoked {}: {} newly affected, {} already terminal",
        result.target,
        result.newly_affected(),
        result.already_revoked.len()
    );
    if !result.pending.is_empty() {
        println!("PENDING (retry required):");
        for p in &result.pending {
            println!("  - {}: {}", p.agent_id, p.error);
        }
    }
    Ok(())
}

fn chain(agent: &str) -> Result<()> {
    let store = open_store()?;
    let chain = assemble(store.as_ref(), &AgentId::new(agent))?;

    println!("chain for {agent}");
    println!("  genesis: {} (authority {})", chain.genesis.id, chain.genesis.authority_id);
    for delegation in &chain.delegations {
        println!(
            "  delegation {}: {} -> {}",
            delegation.id, delegation.delegator_id, delegation.delegatee_id
        );
    }
    println!("  effective capabilities:");
    for capability in chain.effective_capabilities(chrono::Utc::now()) {
        println!("    {capability}");
    }
    println!("  effective constraints:");
    for constraint in chain.constraint_envelope.iter() {
        println!(
            "    {} = {}",
            constraint.constraint_type,
            constraint.value.describe()
        );
    }
    println!("  chain hash: {}", chain.chain_hash);
    Ok(())
}

fn audit(agent: &str) -> Result<()> {
    let store = open_store()?;
    let ledger = AuditLedger::new(store as Arc<dyn AttestationStore>);
    let agent_id = AgentId::new(agent);

    let anchors = ledger.anchors_for(&agent_id)?;
    for anchor in &anchors {
        println!(
            "{} {} {} {}",
            anchor.timestamp.to_rfc3339(),
            anchor.result.as_str(),
            anchor.action,
            anchor.resource.as_deref().unwrap_or("-"),
        );
    }
    let verified = ledger.verify_anchor_chain(&agent_id, &Ed25519Verifier)?;
    println!("{verified} anchor(s), chain intact");
    Ok(())
}
