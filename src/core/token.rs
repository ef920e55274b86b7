//! Token ledgers consumed by the wrapper.
//!
//! - [`TokenLedger`]: balance/allowance/transfer semantics (the custodied
//!   collateral token)
//! - [`SynthLedger`]: a token ledger that the wrapper may issue and burn
//!   (the synthetic collateral and stable assets)
//! - [`InMemoryToken`]: an in-process implementation of both

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::utils::address::{Address, Hash};
use crate::utils::constants::MAX_EVENTS;
use crate::utils::math::{safe_add, safe_sub};

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER INTERFACES
// ═══════════════════════════════════════════════════════════════════════════════

/// Standard balance and transfer semantics
pub trait TokenLedger: Send + Sync {
    /// Token symbol, for logs
    fn symbol(&self) -> &str;

    /// Balance held by `owner`
    fn balance_of(&self, owner: &Address) -> u128;

    /// Amount `owner` has authorized `spender` to pull
    fn allowance(&self, owner: &Address, spender: &Address) -> u128;

    /// Set the allowance `owner` grants `spender`
    fn approve(&self, owner: &Address, spender: &Address, amount: u128) -> Result<()>;

    /// Move `amount` from `from` to `to`
    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<()>;

    /// `spender` moves `amount` from `owner` to `to`, consuming allowance
    fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()>;
}

/// A token the wrapper is authorized to issue and burn
pub trait SynthLedger: TokenLedger {
    /// Create `amount` for `to`
    fn issue(&self, to: &Address, amount: u128) -> Result<()>;

    /// Destroy `amount` held by `from`
    fn burn(&self, from: &Address, amount: u128) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Type of token operation for event logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenOperation {
    /// New tokens created
    Issue,
    /// Tokens destroyed
    Burn,
    /// Transfer between accounts
    Transfer,
    /// Allowance set
    Approve,
}

/// Record of a token operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEvent {
    /// Type of operation
    pub operation: TokenOperation,
    /// Sender (None for issue)
    pub from: Option<Address>,
    /// Recipient (None for burn)
    pub to: Option<Address>,
    /// Amount in base units
    pub amount: u128,
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY TOKEN
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct TokenState {
    total_supply: u128,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
    events: Vec<TokenEvent>,
}

impl TokenState {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn set_balance(&mut self, owner: Address, amount: u128) {
        if amount == 0 {
            self.balances.remove(&owner);
        } else {
            self.balances.insert(owner, amount);
        }
    }

    fn debit(&mut self, owner: &Address, amount: u128) -> Result<()> {
        let available = self.balance_of(owner);
        if available < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available,
            });
        }
        self.set_balance(*owner, available - amount);
        Ok(())
    }

    fn credit(&mut self, owner: &Address, amount: u128) -> Result<()> {
        let next = safe_add(self.balance_of(owner), amount)?;
        self.set_balance(*owner, next);
        Ok(())
    }

    fn add_event(&mut self, event: TokenEvent) {
        self.events.push(event);
        if self.events.len() > MAX_EVENTS {
            self.events.drain(0..self.events.len() - MAX_EVENTS);
        }
    }
}

/// In-process token with balances, allowances and total supply
#[derive(Debug)]
pub struct InMemoryToken {
    symbol: String,
    state: RwLock<TokenState>,
}

impl InMemoryToken {
    /// Create an empty token
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: RwLock::new(TokenState::default()),
        }
    }

    /// Total supply
    pub fn total_supply(&self) -> u128 {
        self.state.read().map(|s| s.total_supply).unwrap_or(0)
    }

    /// Number of accounts with a non-zero balance
    pub fn holder_count(&self) -> usize {
        self.state.read().map(|s| s.balances.len()).unwrap_or(0)
    }

    /// Verify supply invariant (total_supply == sum of all balances)
    pub fn verify_supply_invariant(&self) -> bool {
        match self.state.read() {
            Ok(s) => s.balances.values().sum::<u128>() == s.total_supply,
            Err(_) => false,
        }
    }

    /// Recent operations
    pub fn recent_events(&self) -> Vec<TokenEvent> {
        self.state.read().map(|s| s.events.clone()).unwrap_or_default()
    }

    /// Compute state hash over supply and sorted balances
    pub fn state_hash(&self) -> Result<Hash> {
        let state = self.state.read().map_err(|_| Error::Lock)?;
        let mut data = Vec::new();
        data.extend_from_slice(&state.total_supply.to_be_bytes());

        let mut sorted: Vec<_> = state.balances.iter().collect();
        sorted.sort_by_key(|(k, _)| **k);

        for (owner, balance) in sorted {
            data.extend_from_slice(owner.as_bytes());
            data.extend_from_slice(&balance.to_be_bytes());
        }

        Ok(Hash::sha256(&data))
    }
}

impl TokenLedger for InMemoryToken {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn balance_of(&self, owner: &Address) -> u128 {
        self.state.read().map(|s| s.balance_of(owner)).unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.state
            .read()
            .map(|s| s.allowances.get(&(*owner, *spender)).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn approve(&self, owner: &Address, spender: &Address, amount: u128) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        state.allowances.insert((*owner, *spender), amount);
        state.add_event(TokenEvent {
            operation: TokenOperation::Approve,
            from: Some(*owner),
            to: Some(*spender),
            amount,
        });
        Ok(())
    }

    fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        if from != to {
            state.debit(from, amount)?;
            state.credit(to, amount)?;
        }
        state.add_event(TokenEvent {
            operation: TokenOperation::Transfer,
            from: Some(*from),
            to: Some(*to),
            amount,
        });
        Ok(())
    }

    fn transfer_from(
        &self,
        spender: &Address,
        owner: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;

        let allowed = state.allowances.get(&(*owner, *spender)).copied().unwrap_or(0);
        if allowed < amount {
            return Err(Error::InsufficientAllowance {
                required: amount,
                available: allowed,
            });
        }
        let balance = state.balance_of(owner);
        if balance < amount {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: balance,
            });
        }

        state.allowances.insert((*owner, *spender), allowed - amount);
        if owner != to {
            state.debit(owner, amount)?;
            state.credit(to, amount)?;
        }
        state.add_event(TokenEvent {
            operation: TokenOperation::Transfer,
            from: Some(*owner),
            to: Some(*to),
            amount,
        });
        Ok(())
    }
}

impl SynthLedger for InMemoryToken {
    fn issue(&self, to: &Address, amount: u128) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        let supply = safe_add(state.total_supply, amount)?;
        state.credit(to, amount)?;
        state.total_supply = supply;
        state.add_event(TokenEvent {
            operation: TokenOperation::Issue,
            from: None,
            to: Some(*to),
            amount,
        });
        Ok(())
    }

    fn burn(&self, from: &Address, amount: u128) -> Result<()> {
        let mut state = self.state.write().map_err(|_| Error::Lock)?;
        state.debit(from, amount)?;
        state.total_supply = safe_sub(state.total_supply, amount)?;
        state.add_event(TokenEvent {
            operation: TokenOperation::Burn,
            from: Some(*from),
            to: None,
            amount,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::math::units;

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn bob() -> Address {
        Address::from_label("bob")
    }

    #[test]
    fn test_issue_and_burn() {
        let token = InMemoryToken::new("sETH");
        token.issue(&alice(), units(10)).unwrap();
        assert_eq!(token.balance_of(&alice()), units(10));
        assert_eq!(token.total_supply(), units(10));

        token.burn(&alice(), units(4)).unwrap();
        assert_eq!(token.balance_of(&alice()), units(6));
        assert_eq!(token.total_supply(), units(6));
        assert!(token.verify_supply_invariant());
    }

    #[test]
    fn test_burn_insufficient() {
        let token = InMemoryToken::new("sETH");
        token.issue(&alice(), units(1)).unwrap();
        assert!(matches!(
            token.burn(&alice(), units(2)),
            Err(Error::InsufficientBalance { .. })
        ));
        assert_eq!(token.total_supply(), units(1));
    }

    #[test]
    fn test_transfer() {
        let token = InMemoryToken::new("WETH");
        token.issue(&alice(), units(5)).unwrap();
        token.transfer(&alice(), &bob(), units(2)).unwrap();

        assert_eq!(token.balance_of(&alice()), units(3));
        assert_eq!(token.balance_of(&bob()), units(2));
        assert_eq!(token.holder_count(), 2);
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let token = InMemoryToken::new("WETH");
        let spender = Address::from_label("wrapper");
        token.issue(&alice(), units(5)).unwrap();
        token.approve(&alice(), &spender, units(3)).unwrap();

        token.transfer_from(&spender, &alice(), &spender, units(2)).unwrap();
        assert_eq!(token.allowance(&alice(), &spender), units(1));
        assert_eq!(token.balance_of(&spender), units(2));

        let err = token.transfer_from(&spender, &alice(), &spender, units(2));
        assert_eq!(
            err,
            Err(Error::InsufficientAllowance {
                required: units(2),
                available: units(1),
            })
        );
    }

    #[test]
    fn test_state_hash_deterministic() {
        let a = InMemoryToken::new("sETH");
        let b = InMemoryToken::new("sETH");
        a.issue(&alice(), 1).unwrap();
        a.issue(&bob(), 2).unwrap();
        b.issue(&bob(), 2).unwrap();
        b.issue(&alice(), 1).unwrap();
        assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
    }
}
