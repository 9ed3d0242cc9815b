//! Derivation of the single screen the client shows for a given set of inputs.
//!
//! Nothing here is cached: the controller calls [`resolve`] on every redraw with
//! the latest value of each adapter's cache.

use alloy::primitives::{
    Address,
    U256,
};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Point-in-time read of the contract's numeric state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContractSnapshot {
    pub owner: Address,
    pub balance: U256,
    pub remaining_count: U256,
}

impl ContractSnapshot {
    pub fn has_owner(&self) -> bool {
        self.owner != Address::ZERO
    }

    pub fn is_drained(&self) -> bool {
        self.remaining_count.is_zero() && self.balance.is_zero()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Owner,
    Participant,
}

impl Role {
    pub fn of(account: Address, owner: Address) -> Self {
        if account == owner {
            Role::Owner
        } else {
            Role::Participant
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ViewState {
    Loading,
    Disconnected,
    RoleLoading,
    Exhausted,
    Uninitialized,
    OwnerPanel,
    ParticipantPanel,
}

/// First matching rule wins. Owners are routed to their panel even when the pool
/// is drained so they can still reset it; participants see `Exhausted` instead.
pub fn resolve(
    mounted: bool,
    connection: ConnectionState,
    snapshot: Option<&ContractSnapshot>,
    account: Option<Address>,
) -> ViewState {
    if !mounted {
        return ViewState::Loading;
    }
    if connection != ConnectionState::Connected {
        return ViewState::Disconnected;
    }
    let Some(snapshot) = snapshot else {
        return ViewState::Loading;
    };
    let Some(account) = account else {
        return ViewState::RoleLoading;
    };
    let role = Role::of(account, snapshot.owner);
    if snapshot.is_drained() && snapshot.has_owner() && role == Role::Participant {
        return ViewState::Exhausted;
    }
    if !snapshot.has_owner() {
        return ViewState::Uninitialized;
    }
    match role {
        Role::Owner => ViewState::OwnerPanel,
        Role::Participant => ViewState::ParticipantPanel,
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::address;
    use proptest::prelude::*;

    const A: Address = address!("00000000000000000000000000000000000000aa");
    const B: Address = address!("00000000000000000000000000000000000000bb");

    fn snapshot(owner: Address, balance: u64, remaining: u64) -> ContractSnapshot {
        ContractSnapshot {
            owner,
            balance: U256::from(balance),
            remaining_count: U256::from(remaining),
        }
    }

    fn connected(snap: &ContractSnapshot, account: Address) -> ViewState {
        resolve(true, ConnectionState::Connected, Some(snap), Some(account))
    }

    #[test]
    fn resolve__is_loading_before_mount() {
        let snap = snapshot(A, 1, 1);
        let view = resolve(false, ConnectionState::Connected, Some(&snap), Some(A));
        assert_eq!(view, ViewState::Loading);
    }

    #[test]
    fn resolve__is_disconnected_until_connection_completes() {
        let snap = snapshot(A, 1, 1);
        for connection in [ConnectionState::Disconnected, ConnectionState::Connecting] {
            assert_eq!(
                resolve(true, connection, Some(&snap), Some(A)),
                ViewState::Disconnected
            );
        }
    }

    #[test]
    fn resolve__is_loading_without_snapshot() {
        let view = resolve(true, ConnectionState::Connected, None, Some(A));
        assert_eq!(view, ViewState::Loading);
    }

    #[test]
    fn resolve__waits_for_account_before_routing_roles() {
        let snap = snapshot(A, 0, 0);
        let view = resolve(true, ConnectionState::Connected, Some(&snap), None);
        assert_eq!(view, ViewState::RoleLoading);
    }

    #[test]
    fn resolve__owner_with_drained_pool_sees_owner_panel() {
        assert_eq!(connected(&snapshot(A, 0, 0), A), ViewState::OwnerPanel);
    }

    #[test]
    fn resolve__participant_with_drained_pool_sees_exhausted() {
        assert_eq!(connected(&snapshot(A, 0, 0), B), ViewState::Exhausted);
    }

    #[test]
    fn resolve__zero_owner_is_uninitialized_regardless_of_counts() {
        for (balance, remaining) in [(0, 0), (5, 0), (0, 5), (5, 5)] {
            let snap = snapshot(Address::ZERO, balance, remaining);
            assert_eq!(connected(&snap, B), ViewState::Uninitialized);
        }
    }

    #[test]
    fn resolve__participant_with_funds_sees_participant_panel() {
        assert_eq!(connected(&snapshot(A, 10, 2), B), ViewState::ParticipantPanel);
        // one of the two counters still non-zero is not exhaustion
        assert_eq!(connected(&snapshot(A, 0, 2), B), ViewState::ParticipantPanel);
        assert_eq!(connected(&snapshot(A, 10, 0), B), ViewState::ParticipantPanel);
    }

    fn any_address() -> impl Strategy<Value = Address> {
        prop_oneof![Just(Address::ZERO), Just(A), Just(B)]
    }

    fn any_connection() -> impl Strategy<Value = ConnectionState> {
        prop_oneof![
            Just(ConnectionState::Disconnected),
            Just(ConnectionState::Connecting),
            Just(ConnectionState::Connected),
        ]
    }

    proptest! {
        #[test]
        fn resolve__owner_never_sees_exhausted(
            owner in any_address(),
            balance in 0u64..3,
            remaining in 0u64..3,
        ) {
            let snap = snapshot(owner, balance, remaining);
            let view = connected(&snap, owner);
            prop_assert_ne!(view, ViewState::Exhausted);
        }

        #[test]
        fn resolve__follows_the_decision_table(
            mounted in any::<bool>(),
            connection in any_connection(),
            loaded in any::<bool>(),
            owner in any_address(),
            account in proptest::option::of(any_address()),
            balance in 0u64..3,
            remaining in 0u64..3,
        ) {
            let snap = snapshot(owner, balance, remaining);
            let view = resolve(mounted, connection, loaded.then_some(&snap), account);

            let expected = if !mounted {
                ViewState::Loading
            } else if connection != ConnectionState::Connected {
                ViewState::Disconnected
            } else if !loaded {
                ViewState::Loading
            } else if account.is_none() {
                ViewState::RoleLoading
            } else if balance == 0 && remaining == 0 && owner != Address::ZERO
                && account != Some(owner)
            {
                ViewState::Exhausted
            } else if owner == Address::ZERO {
                ViewState::Uninitialized
            } else if account == Some(owner) {
                ViewState::OwnerPanel
            } else {
                ViewState::ParticipantPanel
            };
            prop_assert_eq!(view, expected);
        }
    }
}
