//! Channel Custody Demo
//!
//! Walks one player through a full custody session against an in-memory
//! host ledger: deposit, settlement, oracle registration, a coin flip and a
//! final withdrawal.

use ed25519_dalek::SigningKey;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use channel_custody::{
    proof::merkle::MerkleMap,
    protocol::{CallOperation, SignedCall},
    AccountId, CallContext, ChannelProof, DecryptionKey, HostLedger, InMemoryHost, ProtocolConfig,
    ProtocolController, RandomnessOracle, VERSION,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Channel Custody v{}", VERSION);

    let config = ProtocolConfig::from_env();
    info!(
        "Flip threshold: {}, magnitude: {}, fold mode: {:?}",
        config.flip_threshold, config.flip_magnitude, config.fold_mode
    );

    demo_session(config)
}

/// Demo function to exercise every operation once.
fn demo_session(config: ProtocolConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let mut rng = StdRng::seed_from_u64(12345);

    let operator_key = SigningKey::from_bytes(&[0xA0; 32]);
    let operator = AccountId::from(&operator_key);
    let player_key = SigningKey::from_bytes(&[0x01; 32]);
    let player = AccountId::from(&player_key);
    let oracle = RandomnessOracle::new(SigningKey::from_bytes(&[0xB0; 32]));
    let decryption_key = DecryptionKey::generate(&mut rng);

    let mut host = InMemoryHost::new();
    host.credit(player, 100)?;
    host.credit(operator, 50)?;

    let supply = host.total_supply();
    let mut protocol = ProtocolController::new(operator, host, config);
    let operator_ctx = CallContext::authenticated(operator);
    let player_ctx = CallContext::authenticated(player);

    // Client-side mirror of the ledger map
    let mut map = MerkleMap::new();

    info!("Operator: {}", operator.short());
    info!("Player:   {}", player.short());
    info!("Oracle:   {}", oracle.account().short());

    // Register oracle with a signed admin call
    let rotate = SignedCall::sign(
        &operator_key,
        operator,
        CallOperation::RotateOracleKey { new_key: oracle.account() },
        protocol.state().call_nonce,
    );
    protocol.rotate_oracle_key(&CallContext::from_signed_call(&rotate)?, oracle.account())?;

    // Deposit
    let key = player.ledger_key();
    let collateral = protocol.deposit(&player_ctx, player, 40, map.get(&key), map.witness(&key))?;
    info!("Deposited 40, collateral queued at {}", collateral);

    let report = protocol.settle()?;
    map.set(key, collateral);
    info!(
        "Settled {} action(s), root {}",
        report.applied,
        hex::encode(report.root)
    );
    if map.root() != protocol.root() {
        anyhow::bail!("client map diverged from committed root");
    }

    // Flip against the current channel state
    let channel = ChannelProof::sign(&operator_key, player, -2, 1);
    let randomness = oracle.issue(&decryption_key.public_key(), 7, &mut rng)?;
    let outcome = protocol.flip(
        &operator_ctx,
        player,
        map.get(&key),
        &map.witness(&key),
        &channel,
        &randomness,
        &decryption_key,
    )?;
    info!("Flip: random value {} -> delta {}", outcome.random_value, outcome.delta);

    // Operator co-signs the post-flip channel state
    let final_delta = channel.delta_balance + outcome.delta;
    let channel = ChannelProof::sign(&operator_key, player, final_delta, 2);

    // Withdraw
    let witness = map.witness(&key);
    info!("Withdrawal witness has {} populated siblings", witness.populated_siblings());
    let paid = protocol.withdraw(&player_ctx, player, map.get(&key), witness, &channel)?;
    info!("Withdrew {} (channel delta {})", paid, final_delta);

    let report = protocol.settle()?;
    map.set(key, 0);
    info!("Settled {} action(s), root {}", report.applied, hex::encode(report.root));

    // Final results
    info!("=== Session Results ===");
    info!("Player balance:  {}", protocol.host().balance(&player));
    info!("Custody balance: {}", protocol.host().balance(&operator));
    info!("Events emitted:  {}", protocol.events().len());
    if protocol.host().total_supply() != supply {
        anyhow::bail!("host supply changed during the session");
    }
    info!("Actions cursor:  {}", protocol.actions_cursor().short());
    info!("State: {}", protocol.state().to_json()?);

    if map.root() == protocol.root() {
        info!("LEDGER VERIFIED: client map matches committed root");
    } else {
        info!("LEDGER MISMATCH: client map differs from committed root");
    }

    Ok(())
}
