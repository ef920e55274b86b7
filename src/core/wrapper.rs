//! Wrapper engine.
//!
//! Custodies a collateral token and issues a 1:1 synthetic against it, minus
//! a fee that is escrowed in the synth itself. Escrowed fees are later
//! converted into the stable synth at the oracle rate and paid to the fee
//! pool.
//!
//! # Atomicity
//!
//! Every mutating entry point runs through [`WrapperEngine::guarded`]: the
//! engine lock is taken, the pause gate is consulted and the settings are
//! snapshotted once. All preconditions and ledger arithmetic are validated
//! before the first external mutation, so a rejected call changes nothing.
//! A collaborator that fails after tokens have moved triggers a rollback:
//! completed steps are undone newest first and the ledger is left as it was.
//!
//! # Clipping
//!
//! Over-large requests are not errors. A mint larger than the remaining
//! capacity is reduced to that capacity; a burn whose principal exceeds the
//! reserves is reduced to the reserves. Receipts report both the requested
//! and the processed amount.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::core::config::{WrapperConfig, WrapperParams};
use crate::core::debt::DebtLedger;
use crate::core::fees::{burn_fee, burn_principal, mint_fee, FeeQuote};
use crate::core::registry::{Dependencies, Dependency};
use crate::core::reserve::ReserveSnapshot;
use crate::error::{Error, Result};
use crate::oracle::CurrencyKey;
use crate::protocol::events::{
    BurnedEvent, EventLog, FeesClaimedEvent, MintedEvent, SettingsChangedEvent, WrapperEvent,
};
use crate::utils::address::{Address, Hash};
use crate::utils::constants::{COLLATERAL_KEY, COLLATERAL_SYNTH_KEY, STABLE_SYNTH_KEY};
use crate::utils::math::{format_units, safe_add};

// ═══════════════════════════════════════════════════════════════════════════════
// CURRENCY KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Keys the engine uses with the oracle and `total_issued`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyKeys {
    /// Custodied collateral
    pub collateral: CurrencyKey,
    /// Synthetic collateral
    pub collateral_synth: CurrencyKey,
    /// Synthetic stable asset
    pub stable: CurrencyKey,
}

impl Default for CurrencyKeys {
    fn default() -> Self {
        Self {
            collateral: CurrencyKey::new(COLLATERAL_KEY),
            collateral_synth: CurrencyKey::new(COLLATERAL_SYNTH_KEY),
            stable: CurrencyKey::new(STABLE_SYNTH_KEY),
        }
    }
}

impl From<&WrapperConfig> for CurrencyKeys {
    fn from(config: &WrapperConfig) -> Self {
        Self {
            collateral: config.collateral_key.clone(),
            collateral_synth: config.collateral_synth_key.clone(),
            stable: config.stable_key.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECEIPTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of a mint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    /// Amount the caller asked to deposit
    pub requested: u128,
    /// Collateral actually pulled (after clipping to capacity)
    pub amount_in: u128,
    /// Synth issued to the beneficiary
    pub principal: u128,
    /// Synth issued to escrow
    pub fee: u128,
}

impl MintReceipt {
    /// True when the deposit was reduced to the remaining capacity
    pub fn was_clipped(&self) -> bool {
        self.amount_in < self.requested
    }
}

/// Outcome of a burn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnReceipt {
    /// Fee-inclusive amount the caller asked to redeem
    pub requested: u128,
    /// Synth taken from the caller (`principal + fee`)
    pub amount_in: u128,
    /// Synth burnt and collateral released
    pub principal: u128,
    /// Synth moved into escrow
    pub fee: u128,
    /// True when the principal was reduced to the reserves
    pub clipped: bool,
}

/// Outcome of a fee claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    /// Collateral synth burnt from escrow
    pub amount: u128,
    /// Stable synth issued to the pool
    pub amount_stable: u128,
    /// Pool address
    pub fee_pool: Address,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct EngineState {
    /// Resolved collaborators; `None` until the cache is built
    deps: Option<Arc<Dependencies>>,
    ledger: DebtLedger,
    events: EventLog,
    last_params: Option<WrapperParams>,
}

impl EngineState {
    fn resolved(&self) -> Result<Arc<Dependencies>> {
        self.deps.clone().ok_or_else(|| {
            Error::MissingDependency(Dependency::CollateralToken.name().to_string())
        })
    }

    /// Setting changes since the previous successful call
    fn settings_changes(&self, params: &WrapperParams) -> Vec<(&'static str, String, String)> {
        let Some(prev) = self.last_params else {
            return Vec::new();
        };
        let mut changes = Vec::new();
        if prev.max_collateral != params.max_collateral {
            changes.push((
                "max_collateral",
                format_units(prev.max_collateral),
                format_units(params.max_collateral),
            ));
        }
        if prev.mint_fee_rate != params.mint_fee_rate {
            changes.push((
                "mint_fee_rate",
                prev.mint_fee_rate.to_string(),
                params.mint_fee_rate.to_string(),
            ));
        }
        if prev.burn_fee_rate != params.burn_fee_rate {
            changes.push((
                "burn_fee_rate",
                prev.burn_fee_rate.to_string(),
                params.burn_fee_rate.to_string(),
            ));
        }
        if prev.escrow_policy != params.escrow_policy {
            changes.push((
                "escrow_policy",
                format!("{:?}", prev.escrow_policy),
                format!("{:?}", params.escrow_policy),
            ));
        }
        changes
    }
}

/// Per-call context handed to each operation by the guard
struct CallContext<'a> {
    ledger: &'a mut DebtLedger,
    deps: &'a Dependencies,
    params: WrapperParams,
    sequence: u64,
    timestamp: i64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROLLBACK
// ═══════════════════════════════════════════════════════════════════════════════

type Undo<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

/// External changes made by one call, undone newest first when a later
/// step fails
struct Rollback<'a> {
    operation: &'static str,
    done: Vec<(&'static str, Undo<'a>)>,
}

impl<'a> Rollback<'a> {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            done: Vec::new(),
        }
    }

    /// Run `apply`. On success `undo` is kept; on failure every kept undo
    /// runs and the original error is returned.
    fn step<T>(
        &mut self,
        name: &'static str,
        apply: impl FnOnce() -> Result<T>,
        undo: impl FnOnce() -> Result<()> + 'a,
    ) -> Result<T> {
        match apply() {
            Ok(value) => {
                self.done.push((name, Box::new(undo)));
                Ok(value)
            }
            Err(e) => {
                self.unwind(name, &e);
                Err(e)
            }
        }
    }

    fn unwind(&mut self, failed: &'static str, cause: &Error) {
        warn!(
            "{} failed at {}: {}, undoing {} step(s)",
            self.operation,
            failed,
            cause,
            self.done.len()
        );
        for (name, undo) in std::mem::take(&mut self.done).into_iter().rev() {
            if let Err(e) = undo() {
                error!("{}: could not undo {}: {}", self.operation, name, e);
            }
        }
    }

    /// Keep every change made so far
    fn commit(mut self) {
        self.done.clear();
    }
}

/// The collateral wrapper
#[derive(Debug)]
pub struct WrapperEngine {
    address: Address,
    keys: CurrencyKeys,
    state: Mutex<EngineState>,
}

impl WrapperEngine {
    /// Create an engine at `address` with resolved collaborators
    pub fn new(address: Address, deps: Dependencies) -> Self {
        let engine = Self::unresolved(address);
        if let Ok(mut state) = engine.state.lock() {
            state.last_params = Some(deps.settings.snapshot());
            state.deps = Some(Arc::new(deps));
        }
        engine
    }

    /// Create an engine whose collaborators are supplied later through
    /// [`rebuild_cache`](Self::rebuild_cache)
    pub fn unresolved(address: Address) -> Self {
        Self {
            address,
            keys: CurrencyKeys::default(),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Use the currency keys of `config`
    pub fn with_keys(mut self, keys: CurrencyKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Restore a previously persisted ledger
    pub fn with_ledger(self, ledger: DebtLedger) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.ledger = ledger;
        }
        self
    }

    /// Engine's own account
    pub fn address(&self) -> Address {
        self.address
    }

    /// Currency keys
    pub fn keys(&self) -> &CurrencyKeys {
        &self.keys
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState>> {
        self.state.lock().map_err(|_| Error::Lock)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REGISTRY
    // ═══════════════════════════════════════════════════════════════════════════

    /// Replace the cached collaborators
    pub fn rebuild_cache(&self, deps: Dependencies) -> Result<()> {
        let mut state = self.lock()?;
        debug!("Rebuilding dependency cache: {:?}", deps);
        if state.last_params.is_none() {
            state.last_params = Some(deps.settings.snapshot());
        }
        state.deps = Some(Arc::new(deps));
        Ok(())
    }

    /// Whether a resolved collaborator set is held
    pub fn is_resolver_cached(&self) -> bool {
        self.lock().map(|s| s.deps.is_some()).unwrap_or(false)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // GUARD
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serialize a mutating call behind the engine lock and the pause gate.
    ///
    /// `op` receives the pinned settings and a scratch sequence number. On
    /// success its event is appended after any settings-change events, and
    /// the operation counter advances.
    fn guarded<T>(
        &self,
        name: &'static str,
        op: impl FnOnce(CallContext<'_>) -> Result<(T, WrapperEvent)>,
    ) -> Result<T> {
        let mut state = self.lock()?;
        let deps = state.resolved()?;

        if deps.gate.is_paused() {
            warn!("{} rejected: wrapper is paused", name);
            return Err(Error::Paused);
        }

        let params = deps.settings.snapshot();
        params.validate().map_err(|e| {
            warn!("{} rejected: settings out of range: {}", name, e);
            e
        })?;
        let sequence = state.ledger.operations + 1;
        let timestamp = chrono::Utc::now().timestamp();

        let (value, event) = op(CallContext {
            ledger: &mut state.ledger,
            deps: &deps,
            params,
            sequence,
            timestamp,
        })
        .map_err(|e| {
            warn!("{} rejected: {}", name, e);
            e
        })?;

        for (parameter, old_value, new_value) in state.settings_changes(&params) {
            state.events.push(WrapperEvent::SettingsChanged(SettingsChangedEvent {
                parameter: parameter.to_string(),
                old_value,
                new_value,
                sequence,
                timestamp,
            }));
        }
        state.last_params = Some(params);
        state.ledger.next_sequence();
        state.events.push(event);
        Ok(value)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MINT
    // ═══════════════════════════════════════════════════════════════════════════

    /// Deposit `amount_in` collateral from `caller` and issue synth to them
    pub fn mint(&self, caller: &Address, amount_in: u128) -> Result<MintReceipt> {
        self.mint_with_tracking(caller, amount_in, caller)
    }

    /// Deposit `amount_in` collateral from `caller` and issue synth to
    /// `beneficiary`, who is also enrolled for rewards
    pub fn mint_with_tracking(
        &self,
        caller: &Address,
        amount_in: u128,
        beneficiary: &Address,
    ) -> Result<MintReceipt> {
        self.guarded("mint", |ctx| {
            self.execute_mint(ctx, caller, amount_in, beneficiary)
        })
    }

    fn execute_mint(
        &self,
        ctx: CallContext<'_>,
        caller: &Address,
        requested: u128,
        beneficiary: &Address,
    ) -> Result<(MintReceipt, WrapperEvent)> {
        let deps = ctx.deps;
        if requested == 0 {
            return Err(Error::ZeroAmount);
        }

        let allowance = deps.collateral.allowance(caller, &self.address);
        if allowance < requested {
            return Err(Error::InsufficientAllowance {
                required: requested,
                available: allowance,
            });
        }
        let balance = deps.collateral.balance_of(caller);
        if balance < requested {
            return Err(Error::InsufficientBalance {
                required: requested,
                available: balance,
            });
        }

        let reserve = ReserveSnapshot::observe(
            deps.collateral.as_ref(),
            &self.address,
            ctx.params.max_collateral,
        );
        if reserve.capacity() == 0 {
            return Err(Error::NoCapacity);
        }

        let amount_in = reserve.clip(requested);
        if amount_in < requested {
            debug!(
                "Mint clipped to capacity: requested {} got {}",
                format_units(requested),
                format_units(amount_in)
            );
        }

        let quote = FeeQuote::for_mint(amount_in, &ctx.params)?;
        let mut next = *ctx.ledger;
        next.record_mint(quote.principal, quote.fee)?;

        let engine = &self.address;
        let collateral = &deps.collateral;
        let synth = &deps.collateral_synth;
        let mut rollback = Rollback::new("mint");
        rollback.step(
            "pull collateral",
            || collateral.transfer_from(engine, caller, engine, amount_in),
            move || {
                collateral.transfer(engine, caller, amount_in)?;
                collateral.approve(caller, engine, allowance)
            },
        )?;
        rollback.step(
            "issue principal",
            || synth.issue(beneficiary, quote.principal),
            move || synth.burn(beneficiary, quote.principal),
        )?;
        rollback.step(
            "issue fee",
            || synth.issue(engine, quote.fee),
            move || synth.burn(engine, quote.fee),
        )?;
        if let Some(rewards) = &deps.rewards {
            rollback.step(
                "enrol rewards",
                || rewards.enrol(beneficiary, amount_in),
                || Ok(()),
            )?;
        }
        rollback.commit();
        *ctx.ledger = next;

        info!(
            account = %beneficiary.short(),
            principal = %format_units(quote.principal),
            fee = %format_units(quote.fee),
            "Minted {} {}",
            format_units(amount_in),
            self.keys.collateral_synth
        );

        let receipt = MintReceipt {
            requested,
            amount_in,
            principal: quote.principal,
            fee: quote.fee,
        };
        let event = WrapperEvent::Minted(MintedEvent {
            account: *beneficiary,
            principal: quote.principal,
            fee: quote.fee,
            amount_in,
            sequence: ctx.sequence,
            timestamp: ctx.timestamp,
        });
        Ok((receipt, event))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // BURN
    // ═══════════════════════════════════════════════════════════════════════════

    /// Redeem `amount_in` synth (fee inclusive) for collateral
    pub fn burn(&self, caller: &Address, amount_in: u128) -> Result<BurnReceipt> {
        self.guarded("burn", |ctx| self.execute_burn(ctx, caller, amount_in))
    }

    fn execute_burn(
        &self,
        ctx: CallContext<'_>,
        caller: &Address,
        requested: u128,
    ) -> Result<(BurnReceipt, WrapperEvent)> {
        let deps = ctx.deps;
        if requested == 0 {
            return Err(Error::ZeroAmount);
        }

        let reserve = ReserveSnapshot::observe(
            deps.collateral.as_ref(),
            &self.address,
            ctx.params.max_collateral,
        );
        if reserve.is_empty() {
            return Err(Error::NoReserves);
        }

        let wanted = burn_principal(requested, ctx.params.burn_fee_rate)?;
        let principal = wanted.min(reserve.reserves);
        let clipped = principal < wanted;
        if clipped {
            debug!(
                "Burn clipped to reserves: principal {} got {}",
                format_units(wanted),
                format_units(principal)
            );
        }

        let fee = burn_fee(principal, ctx.params.burn_fee_rate)?;
        let amount_in = safe_add(principal, fee)?;

        let allowance = deps.collateral_synth.allowance(caller, &self.address);
        if allowance < amount_in {
            return Err(Error::InsufficientAllowance {
                required: amount_in,
                available: allowance,
            });
        }
        let balance = deps.collateral_synth.balance_of(caller);
        if balance < amount_in {
            return Err(Error::InsufficientBalance {
                required: amount_in,
                available: balance,
            });
        }

        let mut dry_run = *ctx.ledger;
        dry_run.record_burn(principal)?;
        dry_run.record_burn_fee(fee)?;

        let engine = &self.address;
        let collateral = &deps.collateral;
        let synth = &deps.collateral_synth;
        let before = *ctx.ledger;
        let ledger = &mut *ctx.ledger;
        let mut rollback = Rollback::new("burn");
        let settled = (|| -> Result<()> {
            rollback.step(
                "burn principal",
                || synth.burn(caller, principal),
                move || synth.issue(caller, principal),
            )?;
            rollback.step("record burn", || ledger.record_burn(principal), || Ok(()))?;
            rollback.step(
                "pull fee",
                || synth.transfer_from(engine, caller, engine, fee),
                move || {
                    synth.transfer(engine, caller, fee)?;
                    synth.approve(caller, engine, allowance)
                },
            )?;
            rollback.step("record fee", || ledger.record_burn_fee(fee), || Ok(()))?;
            rollback.step(
                "release collateral",
                || collateral.transfer(engine, caller, principal),
                || Ok(()),
            )
        })();
        if let Err(e) = settled {
            *ctx.ledger = before;
            return Err(e);
        }
        rollback.commit();

        info!(
            account = %caller.short(),
            principal = %format_units(principal),
            fee = %format_units(fee),
            "Burned {} {}",
            format_units(amount_in),
            self.keys.collateral_synth
        );

        let receipt = BurnReceipt {
            requested,
            amount_in,
            principal,
            fee,
            clipped,
        };
        let event = WrapperEvent::Burned(BurnedEvent {
            account: *caller,
            principal,
            fee,
            amount_in,
            sequence: ctx.sequence,
            timestamp: ctx.timestamp,
        });
        Ok((receipt, event))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FEE CLAIM
    // ═══════════════════════════════════════════════════════════════════════════

    /// Convert `amount` escrowed synth into stable synth for the fee pool
    pub fn claim_fees(&self, amount: u128) -> Result<ClaimReceipt> {
        self.guarded("claim_fees", |ctx| self.execute_claim(ctx, amount))
    }

    /// Claim everything that is both escrowed and actually held.
    ///
    /// Returns `None` when there is nothing to claim.
    pub fn claim_all_fees(&self) -> Result<Option<ClaimReceipt>> {
        let claimable = {
            let state = self.lock()?;
            let deps = state.resolved()?;
            let held = deps.collateral_synth.balance_of(&self.address);
            state.ledger.escrowed_fees.min(held)
        };
        if claimable == 0 {
            debug!("No escrowed fees to claim");
            return Ok(None);
        }
        self.claim_fees(claimable).map(Some)
    }

    fn execute_claim(
        &self,
        ctx: CallContext<'_>,
        amount: u128,
    ) -> Result<(ClaimReceipt, WrapperEvent)> {
        let deps = ctx.deps;
        if deps.rates.rate_is_invalid(&self.keys.collateral) {
            return Err(Error::StaleRate(self.keys.collateral.to_string()));
        }
        if amount == 0 {
            return Err(Error::ZeroAmount);
        }
        ctx.ledger.ensure_claimable(amount)?;

        let amount_stable =
            deps.rates
                .effective_value(&self.keys.collateral, amount, &self.keys.stable)?;

        // Under a retaining escrow policy the counter can run ahead of what
        // the engine still holds.
        let held = deps.collateral_synth.balance_of(&self.address);
        if held < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: held,
            });
        }

        let mut next = *ctx.ledger;
        next.record_claim(amount, amount_stable, ctx.params.escrow_policy)?;

        let fee_pool = deps.fee_pool.fee_address();
        let engine = &self.address;
        let synth = &deps.collateral_synth;
        let stable = &deps.stable_synth;
        let mut rollback = Rollback::new("claim_fees");
        rollback.step(
            "burn escrow",
            || synth.burn(engine, amount),
            move || synth.issue(engine, amount),
        )?;
        rollback.step(
            "issue stable",
            || stable.issue(&fee_pool, amount_stable),
            move || stable.burn(&fee_pool, amount_stable),
        )?;
        rollback.step(
            "record fee paid",
            || deps.fee_pool.record_fee_paid(amount_stable),
            || Ok(()),
        )?;
        rollback.commit();
        *ctx.ledger = next;

        info!(
            fee_pool = %fee_pool.short(),
            policy = ?ctx.params.escrow_policy,
            "Claimed {} {} as {} {}",
            format_units(amount),
            self.keys.collateral_synth,
            format_units(amount_stable),
            self.keys.stable
        );

        let receipt = ClaimReceipt {
            amount,
            amount_stable,
            fee_pool,
        };
        let event = WrapperEvent::FeesClaimed(FeesClaimedEvent {
            amount,
            amount_stable,
            fee_pool,
            sequence: ctx.sequence,
            timestamp: ctx.timestamp,
        });
        Ok((receipt, event))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // FALLBACK
    // ═══════════════════════════════════════════════════════════════════════════

    /// Native asset sent without calling `mint` is always refused
    pub fn receive(&self, from: &Address, amount: u128) -> Result<()> {
        warn!(
            "Rejected direct deposit of {} from {}",
            format_units(amount),
            from.short()
        );
        Err(Error::DirectDepositRejected)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // VIEWS
    // ═══════════════════════════════════════════════════════════════════════════

    fn deps(&self) -> Result<Arc<Dependencies>> {
        self.lock()?.resolved()
    }

    /// Collateral currently custodied
    pub fn reserve_balance(&self) -> Result<u128> {
        let deps = self.deps()?;
        Ok(deps.collateral.balance_of(&self.address))
    }

    /// Headroom under the collateral cap
    pub fn capacity(&self) -> Result<u128> {
        let deps = self.deps()?;
        let snapshot = ReserveSnapshot::observe(
            deps.collateral.as_ref(),
            &self.address,
            deps.settings.max_collateral(),
        );
        Ok(snapshot.capacity())
    }

    /// Share of the cap held as reserves, in basis points
    pub fn utilization_bps(&self) -> Result<u64> {
        let deps = self.deps()?;
        let snapshot = ReserveSnapshot::observe(
            deps.collateral.as_ref(),
            &self.address,
            deps.settings.max_collateral(),
        );
        Ok(snapshot.utilization_bps())
    }

    /// Collateral cap
    pub fn max_collateral(&self) -> Result<u128> {
        Ok(self.deps()?.settings.max_collateral())
    }

    /// Current mint fee rate
    pub fn mint_fee_rate(&self) -> Result<u128> {
        Ok(self.deps()?.settings.mint_fee_rate().raw())
    }

    /// Current burn fee rate
    pub fn burn_fee_rate(&self) -> Result<u128> {
        Ok(self.deps()?.settings.burn_fee_rate().raw())
    }

    /// Fee a mint of `amount` would pay at the current rate
    pub fn calculate_mint_fee(&self, amount: u128) -> Result<u128> {
        mint_fee(amount, self.deps()?.settings.mint_fee_rate())
    }

    /// Fee a burn of `amount` principal would pay at the current rate
    pub fn calculate_burn_fee(&self, amount: u128) -> Result<u128> {
        burn_fee(amount, self.deps()?.settings.burn_fee_rate())
    }

    /// Preview a mint of `amount`, including clipping to capacity
    pub fn preview_mint(&self, amount: u128) -> Result<FeeQuote> {
        let deps = self.deps()?;
        let params = deps.settings.snapshot();
        let reserve =
            ReserveSnapshot::observe(deps.collateral.as_ref(), &self.address, params.max_collateral);
        let quote = FeeQuote::for_mint(reserve.clip(amount), &params)?;
        debug!("Mint preview for {}: {:?}", format_units(amount), quote);
        Ok(quote)
    }

    /// Preview a burn of `amount`, including clipping to reserves
    pub fn preview_burn(&self, amount: u128) -> Result<FeeQuote> {
        let deps = self.deps()?;
        let params = deps.settings.snapshot();
        let reserves = deps.collateral.balance_of(&self.address);
        let principal = burn_principal(amount, params.burn_fee_rate)?.min(reserves);
        let quote = FeeQuote {
            gross: amount,
            principal,
            fee: burn_fee(principal, params.burn_fee_rate)?,
        };
        debug!("Burn preview for {}: {:?}", format_units(amount), quote);
        Ok(quote)
    }

    /// Outstanding issuance for `key`
    pub fn total_issued(&self, key: &CurrencyKey) -> Result<u128> {
        let ledger = self.ledger()?;
        if *key == self.keys.collateral_synth {
            Ok(ledger.net_issued_collateral_synth())
        } else if *key == self.keys.stable {
            Ok(ledger.issued_stable_synth)
        } else {
            Err(Error::UnknownCurrency(key.to_string()))
        }
    }

    /// Snapshot of the debt ledger
    pub fn ledger(&self) -> Result<DebtLedger> {
        Ok(self.lock()?.ledger)
    }

    /// Retained events, oldest first
    pub fn events(&self) -> Result<Vec<WrapperEvent>> {
        Ok(self.lock()?.events.events())
    }

    /// Hash chain over retained events
    pub fn event_digest(&self) -> Result<Hash> {
        Ok(self.lock()?.events.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{EscrowPolicy, SharedSettings};
    use crate::core::distribution::{FeePool, FeePoolLedger, RewardsRegistry};
    use crate::core::gate::PauseSwitch;
    use crate::core::token::{InMemoryToken, SynthLedger, TokenLedger};
    use crate::oracle::StaticRates;
    use crate::utils::math::{parse_units, units, FixedPoint};

    struct Fixture {
        engine: WrapperEngine,
        weth: Arc<InMemoryToken>,
        seth: Arc<InMemoryToken>,
        susd: Arc<InMemoryToken>,
        rates: Arc<StaticRates>,
        pool: Arc<FeePoolLedger>,
        rewards: Arc<RewardsRegistry>,
        settings: Arc<SharedSettings>,
        gate: Arc<PauseSwitch>,
    }

    fn fixture(params: WrapperParams) -> Fixture {
        let weth = Arc::new(InMemoryToken::new("WETH"));
        let seth = Arc::new(InMemoryToken::new("sETH"));
        let susd = Arc::new(InMemoryToken::new("sUSD"));
        let rates = Arc::new(StaticRates::default().with_pegged(CurrencyKey::new("sUSD")));
        let pool = Arc::new(FeePoolLedger::new(Address::from_label("fee-pool")));
        let rewards = Arc::new(RewardsRegistry::new());
        let settings = Arc::new(SharedSettings::new(params).unwrap());
        let gate = Arc::new(PauseSwitch::new());

        let deps = Dependencies::builder()
            .collateral(weth.clone())
            .collateral_synth(seth.clone())
            .stable_synth(susd.clone())
            .rates(rates.clone())
            .fee_pool(pool.clone())
            .settings(settings.clone())
            .gate(gate.clone())
            .rewards(rewards.clone())
            .build()
            .unwrap();

        Fixture {
            engine: WrapperEngine::new(Address::from_label("wrapper"), deps),
            weth,
            seth,
            susd,
            rates,
            pool,
            rewards,
            settings,
            gate,
        }
    }

    fn params(cap: u64, mint_pct: u64, burn_pct: u64) -> WrapperParams {
        WrapperParams {
            max_collateral: units(cap),
            mint_fee_rate: FixedPoint::from_percentage(mint_pct),
            burn_fee_rate: FixedPoint::from_percentage(burn_pct),
            escrow_policy: EscrowPolicy::Retain,
        }
    }

    fn alice() -> Address {
        Address::from_label("alice")
    }

    impl Fixture {
        fn fund(&self, who: &Address, amount: u128) {
            self.weth.issue(who, amount).unwrap();
            self.weth.approve(who, &self.engine.address(), amount).unwrap();
        }

        fn approve_synth(&self, who: &Address, amount: u128) {
            self.seth.approve(who, &self.engine.address(), amount).unwrap();
        }
    }

    #[test]
    fn test_mint_basic() {
        let f = fixture(params(100, 1, 0));
        f.fund(&alice(), units(50));

        let receipt = f.engine.mint(&alice(), units(50)).unwrap();
        assert_eq!(receipt.principal, parse_units("49.5").unwrap());
        assert_eq!(receipt.fee, parse_units("0.5").unwrap());
        assert!(!receipt.was_clipped());

        assert_eq!(f.seth.balance_of(&alice()), parse_units("49.5").unwrap());
        assert_eq!(f.seth.balance_of(&f.engine.address()), parse_units("0.5").unwrap());
        assert_eq!(f.engine.reserve_balance().unwrap(), units(50));
        assert_eq!(f.engine.capacity().unwrap(), units(50));

        let ledger = f.engine.ledger().unwrap();
        assert_eq!(ledger.issued_collateral_synth, units(50));
        assert_eq!(ledger.escrowed_fees, parse_units("0.5").unwrap());
        assert_eq!(f.rewards.enrolled(&alice()), units(50));
    }

    #[test]
    fn test_mint_clips_to_capacity() {
        let f = fixture(params(10, 0, 0));
        f.fund(&alice(), units(25));

        let receipt = f.engine.mint(&alice(), units(25)).unwrap();
        assert!(receipt.was_clipped());
        assert_eq!(receipt.amount_in, units(10));
        assert_eq!(f.weth.balance_of(&alice()), units(15));
        assert_eq!(f.engine.capacity().unwrap(), 0);
    }

    #[test]
    fn test_mint_rejections_leave_no_trace() {
        let f = fixture(params(10, 1, 0));
        let bob = Address::from_label("bob");

        // no allowance
        f.weth.issue(&bob, units(5)).unwrap();
        assert!(matches!(
            f.engine.mint(&bob, units(5)),
            Err(Error::InsufficientAllowance { .. })
        ));

        // allowance but not enough balance
        f.weth.approve(&bob, &f.engine.address(), units(6)).unwrap();
        assert!(matches!(
            f.engine.mint(&bob, units(6)),
            Err(Error::InsufficientBalance { .. })
        ));

        assert_eq!(f.engine.mint(&bob, 0), Err(Error::ZeroAmount));
        assert_eq!(f.engine.ledger().unwrap(), DebtLedger::default());
        assert!(f.engine.events().unwrap().is_empty());
    }

    #[test]
    fn test_mint_no_capacity() {
        let f = fixture(params(10, 0, 0));
        f.fund(&alice(), units(20));
        f.engine.mint(&alice(), units(10)).unwrap();
        assert_eq!(f.engine.mint(&alice(), units(1)), Err(Error::NoCapacity));
    }

    #[test]
    fn test_mint_with_tracking_credits_beneficiary() {
        let f = fixture(params(100, 0, 0));
        let bob = Address::from_label("bob");
        f.fund(&alice(), units(3));

        f.engine.mint_with_tracking(&alice(), units(3), &bob).unwrap();
        assert_eq!(f.seth.balance_of(&bob), units(3));
        assert_eq!(f.seth.balance_of(&alice()), 0);
        assert_eq!(f.rewards.enrolled(&bob), units(3));
    }

    #[test]
    fn test_burn_clips_to_reserves() {
        let f = fixture(params(100, 0, 1));
        f.fund(&alice(), units(10));
        f.engine.mint(&alice(), units(10)).unwrap();

        // extra synth from elsewhere so the caller can cover 20.2
        f.seth.issue(&alice(), units(15)).unwrap();
        f.approve_synth(&alice(), units(25));

        let receipt = f.engine.burn(&alice(), parse_units("20.2").unwrap()).unwrap();
        assert!(receipt.clipped);
        assert_eq!(receipt.principal, units(10));
        assert_eq!(receipt.fee, parse_units("0.1").unwrap());
        assert_eq!(receipt.amount_in, parse_units("10.1").unwrap());
        assert_eq!(f.engine.reserve_balance().unwrap(), 0);
        assert_eq!(f.weth.balance_of(&alice()), units(10));
    }

    #[test]
    fn test_burn_no_reserves() {
        let f = fixture(params(100, 0, 0));
        assert_eq!(f.engine.burn(&alice(), units(1)), Err(Error::NoReserves));
    }

    #[test]
    fn test_burn_requires_synth_allowance() {
        let f = fixture(params(100, 0, 0));
        f.fund(&alice(), units(5));
        f.engine.mint(&alice(), units(5)).unwrap();

        let before = f.engine.ledger().unwrap();
        assert!(matches!(
            f.engine.burn(&alice(), units(5)),
            Err(Error::InsufficientAllowance { .. })
        ));
        assert_eq!(f.engine.ledger().unwrap(), before);
        assert_eq!(f.seth.balance_of(&alice()), units(5));
    }

    #[test]
    fn test_claim_fees() {
        let f = fixture(params(100, 1, 0));
        f.rates.set_rate(CurrencyKey::new("ETH"), units(2_000)).unwrap();
        f.fund(&alice(), units(50));
        f.engine.mint(&alice(), units(50)).unwrap();

        let half = parse_units("0.5").unwrap();
        let receipt = f.engine.claim_fees(half).unwrap();
        assert_eq!(receipt.amount_stable, units(1_000));
        assert_eq!(f.susd.balance_of(&f.pool.fee_address()), units(1_000));
        assert_eq!(f.pool.total_recorded(), units(1_000));
        assert_eq!(f.seth.balance_of(&f.engine.address()), 0);

        let ledger = f.engine.ledger().unwrap();
        assert_eq!(ledger.burnt_collateral_synth, half);
        assert_eq!(ledger.issued_stable_synth, units(1_000));
        // retained
        assert_eq!(ledger.escrowed_fees, half);
        assert_eq!(
            f.engine.total_issued(&CurrencyKey::new("sUSD")).unwrap(),
            units(1_000)
        );
    }

    #[test]
    fn test_claim_stale_rate() {
        let f = fixture(params(100, 1, 0));
        f.fund(&alice(), units(50));
        f.engine.mint(&alice(), units(50)).unwrap();
        assert_eq!(
            f.engine.claim_fees(1),
            Err(Error::StaleRate("ETH".into()))
        );
    }

    #[test]
    fn test_claim_exceeds_escrow() {
        let f = fixture(params(100, 1, 0));
        f.rates.set_rate(CurrencyKey::new("ETH"), units(2_000)).unwrap();
        assert!(matches!(
            f.engine.claim_fees(1),
            Err(Error::ClaimExceedsEscrow { .. })
        ));
    }

    #[test]
    fn test_paused_rejects_mutations() {
        let f = fixture(params(100, 0, 0));
        f.fund(&alice(), units(5));
        f.gate.pause();

        assert_eq!(f.engine.mint(&alice(), units(5)), Err(Error::Paused));
        assert_eq!(f.engine.burn(&alice(), units(5)), Err(Error::Paused));
        assert_eq!(f.engine.claim_fees(1), Err(Error::Paused));
        // views still work
        assert_eq!(f.engine.capacity().unwrap(), units(100));

        f.gate.resume();
        assert!(f.engine.mint(&alice(), units(5)).is_ok());
    }

    #[test]
    fn test_receive_rejected() {
        let f = fixture(params(100, 0, 0));
        assert_eq!(
            f.engine.receive(&alice(), units(1)),
            Err(Error::DirectDepositRejected)
        );
        assert_eq!(f.engine.reserve_balance().unwrap(), 0);
    }

    #[test]
    fn test_total_issued_unknown_key() {
        let f = fixture(params(100, 0, 0));
        assert_eq!(f.engine.total_issued(&CurrencyKey::new("sETH")).unwrap(), 0);
        assert_eq!(
            f.engine.total_issued(&CurrencyKey::new("sBTC")),
            Err(Error::UnknownCurrency("sBTC".into()))
        );
    }

    #[test]
    fn test_settings_change_event() {
        let f = fixture(params(100, 0, 0));
        f.fund(&alice(), units(10));
        f.engine.mint(&alice(), units(5)).unwrap();

        f.settings
            .set_mint_fee_rate(FixedPoint::from_percentage(2))
            .unwrap();
        f.engine.mint(&alice(), units(5)).unwrap();

        let events = f.engine.events().unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["Minted", "SettingsChanged", "Minted"]);
        assert_eq!(events[1].sequence(), 2);
    }

    #[test]
    fn test_unresolved_engine() {
        let engine = WrapperEngine::unresolved(Address::from_label("wrapper"));
        assert!(!engine.is_resolver_cached());
        assert!(matches!(
            engine.mint(&alice(), 1),
            Err(Error::MissingDependency(_))
        ));

        let f = fixture(params(100, 0, 0));
        let deps = Dependencies::builder()
            .collateral(f.weth.clone())
            .collateral_synth(f.seth.clone())
            .stable_synth(f.susd.clone())
            .rates(f.rates.clone())
            .fee_pool(f.pool.clone())
            .settings(f.settings.clone())
            .gate(f.gate.clone())
            .build()
            .unwrap();
        engine.rebuild_cache(deps).unwrap();
        assert!(engine.is_resolver_cached());
        assert_eq!(engine.capacity().unwrap(), units(100));
    }

    #[test]
    fn test_previews_do_not_mutate() {
        let f = fixture(params(10, 1, 1));
        let quote = f.engine.preview_mint(units(20)).unwrap();
        assert_eq!(quote.gross, units(10));
        assert_eq!(quote.fee, parse_units("0.1").unwrap());

        let burn = f.engine.preview_burn(units(1)).unwrap();
        assert_eq!(burn.principal, 0);
        assert!(f.engine.events().unwrap().is_empty());
    }

    #[test]
    fn test_utilization_tracks_reserves() {
        let f = fixture(params(100, 0, 0));
        assert_eq!(f.engine.utilization_bps().unwrap(), 0);

        f.fund(&alice(), units(25));
        f.engine.mint(&alice(), units(25)).unwrap();
        assert_eq!(f.engine.utilization_bps().unwrap(), 2_500);
    }

    #[test]
    fn test_rollback_undoes_newest_first() {
        let log = std::cell::RefCell::new(Vec::new());
        let mut rollback = Rollback::new("test");
        rollback
            .step("a", || Ok(()), || {
                log.borrow_mut().push("undo a");
                Ok(())
            })
            .unwrap();
        rollback
            .step("b", || Ok(()), || {
                log.borrow_mut().push("undo b");
                Ok(())
            })
            .unwrap();

        let failed = rollback.step("c", || -> Result<()> { Err(Error::Lock) }, || Ok(()));
        assert_eq!(failed, Err(Error::Lock));
        assert_eq!(*log.borrow(), vec!["undo b", "undo a"]);
    }

    #[test]
    fn test_rollback_commit_keeps_changes() {
        let undone = std::cell::Cell::new(false);
        let mut rollback = Rollback::new("test");
        rollback
            .step("a", || Ok(()), || {
                undone.set(true);
                Ok(())
            })
            .unwrap();
        rollback.commit();
        assert!(!undone.get());
    }
}
