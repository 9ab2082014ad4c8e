//! Protocol Controller
//!
//! Implements the operation surface on top of the proof primitives:
//! deposit, withdraw, settle, flip and the two admin operations.
//!
//! The only persistent state is [`ProtocolState`]. Player operations prove
//! their claims against the committed root and append to the action queue;
//! only [`ProtocolController::settle`] advances the root. Every operation
//! runs all checks before its first mutation, so a failed call leaves state,
//! queue, events and host balances untouched.
//!
//! A context built from a signed call must match the operation invoked and
//! its arguments, and carry the current call nonce. Accepted mutating calls
//! advance the nonce.

use tracing::{debug, info, instrument, warn};

use crate::config::ProtocolConfig;
use crate::core::account::AccountId;
use crate::core::hash::Hash256;
use crate::error::{ProtocolError, ProtocolResult, SignatureFailure};
use crate::proof::channel::{apply_delta, ChannelProof};
use crate::proof::encryption::DecryptionKey;
use crate::proof::ledger::prove_membership;
use crate::proof::merkle::{empty_root, MerkleWitness};
use crate::proof::oracle::{
    decrypt_randomness, derive_outcome, verify_signature, FlipOutcome, OracleError, SignedRandomness,
};
use crate::protocol::context::{CallContext, CallOperation};
use crate::protocol::events::CollateralUpdateEvent;
use crate::protocol::host::HostLedger;
use crate::protocol::state::ProtocolState;
use crate::settlement::queue::{ActionQueue, ActionsCursor, PendingAction};
use crate::settlement::reducer::{fold_from, SkippedAction};

/// What a settlement did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettlementReport {
    /// Root before the fold.
    pub previous_root: Hash256,
    /// Root committed by the fold.
    pub root: Hash256,
    /// Cursor committed by the fold.
    pub cursor: ActionsCursor,
    /// Actions written into the root.
    pub applied: usize,
    /// Actions consumed without effect (re-prove mode only).
    pub skipped: Vec<SkippedAction>,
}

/// Custody and flip protocol over a host ledger.
pub struct ProtocolController<H: HostLedger> {
    config: ProtocolConfig,
    /// Custody account, channel counterparty and admin.
    operator: AccountId,
    state: ProtocolState,
    queue: ActionQueue,
    events: Vec<CollateralUpdateEvent>,
    host: H,
}

impl<H: HostLedger> ProtocolController<H> {
    /// Create a protocol instance in its genesis state.
    pub fn new(operator: AccountId, host: H, config: ProtocolConfig) -> Self {
        Self::restore(operator, host, config, ProtocolState::genesis(), ActionQueue::new())
    }

    /// Resume from persisted state and action log.
    pub fn restore(
        operator: AccountId,
        host: H,
        config: ProtocolConfig,
        state: ProtocolState,
        queue: ActionQueue,
    ) -> Self {
        info!(
            "Protocol operator {} at root {} cursor {}",
            operator.short(),
            hex::encode(&state.root[..4]),
            state.actions_cursor.short()
        );
        Self {
            config,
            operator,
            state,
            queue,
            events: Vec::new(),
            host,
        }
    }

    // =========================================================================
    // ADMIN
    // =========================================================================

    /// Replace the trusted randomness oracle.
    pub fn rotate_oracle_key(&mut self, ctx: &CallContext, new_key: AccountId) -> ProtocolResult<()> {
        self.require_admin(ctx)?;
        let signed = self.authorize(ctx, &CallOperation::RotateOracleKey { new_key })?;
        new_key
            .verifying_key()
            .map_err(|_| SignatureFailure::Oracle(OracleError::MalformedKey))?;

        info!("Oracle key rotated to {}", new_key.short());
        self.state.oracle_key = Some(new_key);
        self.consume_nonce(signed);
        Ok(())
    }

    /// Reset the committed root to the empty map.
    ///
    /// The action queue and cursor are left alone: actions enqueued before
    /// the reset are still folded by the next settlement.
    pub fn reset_ledger(&mut self, ctx: &CallContext) -> ProtocolResult<()> {
        self.require_admin(ctx)?;
        let signed = self.authorize(ctx, &CallOperation::ResetLedger)?;

        let pending = self.queue.actions_after(&self.state.actions_cursor)?.len();
        if pending > 0 {
            warn!("Ledger reset with {} unsettled actions still queued", pending);
        }

        self.state.root = empty_root();
        self.consume_nonce(signed);
        info!("Ledger root reset");
        Ok(())
    }

    // =========================================================================
    // PLAYER OPERATIONS
    // =========================================================================

    /// Add `amount` to the player's collateral.
    ///
    /// Returns the collateral value queued for settlement.
    #[instrument(skip_all, fields(player = %player.short(), amount = amount))]
    pub fn deposit(
        &mut self,
        ctx: &CallContext,
        player: AccountId,
        amount: u64,
        previous_value: u64,
        witness: MerkleWitness,
    ) -> ProtocolResult<u64> {
        Self::require_caller(ctx, &player)?;
        let signed = self.authorize(
            ctx,
            &CallOperation::Deposit {
                player,
                amount,
                previous_value,
            },
        )?;
        self.require_no_pending(&player)?;
        self.prove_state(&player, previous_value, &witness)?;

        let new_value = previous_value
            .checked_add(amount)
            .ok_or(ProtocolError::ArithmeticOverflow)?;

        self.host.transfer(&player, &self.operator, amount)?;
        self.dispatch(PendingAction::new(player, previous_value, new_value, witness));
        self.consume_nonce(signed);

        info!("Deposit queued: {} -> {}", previous_value, new_value);
        Ok(new_value)
    }

    /// Withdraw the player's entire collateral adjusted by the channel delta.
    ///
    /// Returns the amount released to the player. The collateral queued for
    /// settlement is 0.
    #[instrument(skip_all, fields(player = %player.short(), collateral = collateral))]
    pub fn withdraw(
        &mut self,
        ctx: &CallContext,
        player: AccountId,
        collateral: u64,
        witness: MerkleWitness,
        channel_proof: &ChannelProof,
    ) -> ProtocolResult<u64> {
        Self::require_caller(ctx, &player)?;
        let signed = self.authorize(
            ctx,
            &CallOperation::Withdraw {
                player,
                collateral,
                delta_balance: channel_proof.delta_balance,
                channel_nonce: channel_proof.nonce,
            },
        )?;
        self.require_no_pending(&player)?;
        self.prove_state(&player, collateral, &witness)?;
        channel_proof.verify(&player, &self.operator)?;

        let delta = channel_proof.delta_balance;
        let amount = apply_delta(collateral, delta).ok_or(if delta < 0 {
            ProtocolError::DeltaExceedsCollateral { collateral, delta }
        } else {
            ProtocolError::ArithmeticOverflow
        })?;

        let available = self.host.balance(&self.operator);
        if available < amount {
            return Err(ProtocolError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        self.host.transfer(&self.operator, &player, amount)?;
        self.dispatch(PendingAction::new(player, collateral, 0, witness));
        self.consume_nonce(signed);

        info!("Withdrawal of {} (delta {}, nonce {})", amount, delta, channel_proof.nonce);
        Ok(amount)
    }

    /// Fold every queued action since the committed cursor into the root.
    ///
    /// With nothing new queued the root and cursor stay as they are.
    pub fn settle(&mut self) -> ProtocolResult<SettlementReport> {
        let previous_root = self.state.root;
        let outcome = fold_from(
            &self.queue,
            self.state.actions_cursor,
            previous_root,
            self.config.fold_mode,
        )?;

        self.state.root = outcome.root;
        self.state.actions_cursor = outcome.cursor;

        if outcome.is_noop() {
            debug!("Settlement found no new actions");
        } else {
            info!(
                "Settled {} actions ({} skipped): root {} -> {}",
                outcome.applied,
                outcome.skipped.len(),
                hex::encode(&previous_root[..4]),
                hex::encode(&outcome.root[..4])
            );
        }

        Ok(SettlementReport {
            previous_root,
            root: outcome.root,
            cursor: outcome.cursor,
            applied: outcome.applied,
            skipped: outcome.skipped,
        })
    }

    /// Flip a coin for `player`.
    ///
    /// Run by the operator, who supplies its decryption key. Requires the
    /// player's ledger balance plus channel delta to be above the flip
    /// threshold. Does not touch the ledger: the outcome is meant to be
    /// folded into the next channel proof.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(player = %player.short(), balance = balance))]
    pub fn flip(
        &self,
        ctx: &CallContext,
        player: AccountId,
        balance: u64,
        witness: &MerkleWitness,
        channel_proof: &ChannelProof,
        randomness: &SignedRandomness,
        decryption_key: &DecryptionKey,
    ) -> ProtocolResult<FlipOutcome> {
        Self::require_caller(ctx, &self.operator)?;
        // Read-only: a signed flip is checked against the nonce but does not consume it.
        self.authorize(ctx, &CallOperation::Flip { player, balance })?;
        self.prove_state(&player, balance, witness)?;
        channel_proof.verify(&player, &self.operator)?;

        let true_balance = balance as i128 + channel_proof.delta_balance as i128;
        if true_balance <= self.config.flip_threshold as i128 {
            return Err(ProtocolError::BelowThreshold {
                balance: true_balance,
                threshold: self.config.flip_threshold,
            });
        }

        let oracle_key = self.state.oracle_key.ok_or(ProtocolError::OracleKeyUnset)?;
        verify_signature(&randomness.ciphertext, &oracle_key, &randomness.signature)?;

        let random_value = decrypt_randomness(&randomness.ciphertext, decryption_key)?;
        let delta = derive_outcome(random_value, self.config.flip_magnitude);

        info!("Flip outcome {} from randomness parity {}", delta, random_value % 2);
        Ok(FlipOutcome { delta, random_value })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Persisted state.
    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    /// Committed ledger root.
    pub fn root(&self) -> Hash256 {
        self.state.root
    }

    /// Trusted oracle key, if set.
    pub fn oracle_key(&self) -> Option<AccountId> {
        self.state.oracle_key
    }

    /// Folded position in the action log.
    pub fn actions_cursor(&self) -> ActionsCursor {
        self.state.actions_cursor
    }

    /// The action log.
    pub fn queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// Emitted collateral events, oldest first.
    pub fn events(&self) -> &[CollateralUpdateEvent] {
        &self.events
    }

    /// The host ledger.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable host ledger (funding accounts outside the protocol).
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Active configuration.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Custody account, channel counterparty and admin.
    pub fn operator(&self) -> AccountId {
        self.operator
    }

    // =========================================================================
    // CHECKS
    // =========================================================================

    fn require_admin(&self, ctx: &CallContext) -> ProtocolResult<()> {
        if *ctx.caller() != self.operator {
            warn!("Rejected admin call from {}", ctx.caller().short());
            return Err(ProtocolError::UnauthorizedAdmin(*ctx.caller()));
        }
        Ok(())
    }

    fn require_caller(ctx: &CallContext, expected: &AccountId) -> ProtocolResult<()> {
        if ctx.caller() != expected {
            return Err(ProtocolError::UnauthorizedCaller {
                caller: *ctx.caller(),
                expected: *expected,
            });
        }
        Ok(())
    }

    /// Check a signed context against the invoked operation.
    fn authorize(&self, ctx: &CallContext, operation: &CallOperation) -> ProtocolResult<bool> {
        let signed = ctx.authorize(&self.operator, operation, self.state.call_nonce)?;
        if signed {
            debug!("Signed {} call at nonce {}", operation.name(), self.state.call_nonce);
        }
        Ok(signed)
    }

    fn consume_nonce(&mut self, signed: bool) {
        if signed {
            self.state.call_nonce += 1;
        }
    }

    /// With exclusive pending actions, one unsettled action per account.
    fn require_no_pending(&self, player: &AccountId) -> ProtocolResult<()> {
        if !self.config.exclusive_pending {
            return Ok(());
        }

        let pending = self.queue.actions_after(&self.state.actions_cursor)?;
        if pending.iter().any(|entry| entry.action.owner == *player) {
            return Err(ProtocolError::PendingAction(*player));
        }
        Ok(())
    }

    /// Prove `player` holds `value` under the committed root.
    fn prove_state(&self, player: &AccountId, value: u64, witness: &MerkleWitness) -> ProtocolResult<()> {
        prove_membership(&player.ledger_key(), value, witness, &self.state.root)?;
        Ok(())
    }

    fn dispatch(&mut self, action: PendingAction) {
        self.events.push(CollateralUpdateEvent::from_action(&action));
        let cursor = self.queue.enqueue(action);
        debug!("Action queued at {}", cursor.short());
    }
}
