use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DeliveryId, PickupId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("cannot regenerate {needed} requests: only {available} pickup points are inactive")]
    NotEnoughInactive { needed: usize, available: usize },

    #[error(
        "cannot assign {needed} distinct delivery targets: only {available} delivery points exist"
    )]
    NotEnoughDeliveryPoints { needed: usize, available: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupState {
    #[default]
    Inactive,
    Waiting {
        target: DeliveryId,
        /// Always greater than zero while waiting.
        remaining_ticks: u32,
    },
}

impl PickupState {
    pub fn is_waiting(&self) -> bool {
        matches!(self, PickupState::Waiting { .. })
    }
}

/// A successful claim, captured before the pickup point was freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub pickup: PickupId,
    pub target: DeliveryId,
    pub remaining_ticks: u32,
}

/// A request as seen from outside: a waiting pickup point and where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitingRequest {
    pub pickup: PickupId,
    pub target: DeliveryId,
    pub remaining_ticks: u32,
}

/// State of every pickup point. Whatever a tick frees by expiry or claim must
/// be handed back to [`RequestLedger::regenerate`] in the same tick, so exactly
/// `num_requests` points stay waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLedger {
    states: Vec<PickupState>,
    num_requests: usize,
    num_delivery_points: usize,
    wait_ticks: u32,
}

impl RequestLedger {
    /// Creates a ledger with every pickup point inactive.
    pub fn new(
        num_pickup_points: usize,
        num_delivery_points: usize,
        num_requests: usize,
        wait_ticks: u32,
    ) -> Self {
        RequestLedger {
            states: vec![PickupState::Inactive; num_pickup_points],
            num_requests,
            num_delivery_points,
            wait_ticks,
        }
    }

    pub fn num_pickup_points(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, pickup: PickupId) -> Option<PickupState> {
        self.states.get(pickup).copied()
    }

    pub fn states(&self) -> &[PickupState] {
        &self.states
    }

    /// Waiting requests in ascending pickup id order.
    pub fn waiting(&self) -> impl Iterator<Item = WaitingRequest> + '_ {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(pickup, state)| match *state {
                PickupState::Waiting {
                    target,
                    remaining_ticks,
                } => Some(WaitingRequest {
                    pickup,
                    target,
                    remaining_ticks,
                }),
                PickupState::Inactive => None,
            })
    }

    pub fn waiting_count(&self) -> usize {
        self.states.iter().filter(|s| s.is_waiting()).count()
    }

    /// Sets every point inactive, then draws the initial `num_requests` requests.
    pub fn seed_initial<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Vec<PickupId>, LedgerError> {
        self.states.fill(PickupState::Inactive);
        self.regenerate(self.num_requests, rng)
    }

    /// Counts one tick off every waiting request.
    pub fn decrement_timers(&mut self) {
        for state in &mut self.states {
            if let PickupState::Waiting {
                remaining_ticks, ..
            } = state
            {
                *remaining_ticks = remaining_ticks.saturating_sub(1);
            }
        }
    }

    /// Frees every waiting point whose timer ran out. Returns the expired ids.
    pub fn expire(&mut self) -> Vec<PickupId> {
        let mut expired = Vec::new();
        for (pickup, state) in self.states.iter_mut().enumerate() {
            if let PickupState::Waiting {
                remaining_ticks: 0, ..
            } = state
            {
                *state = PickupState::Inactive;
                expired.push(pickup);
            }
        }
        if !expired.is_empty() {
            debug!(?expired, "requests expired");
        }
        expired
    }

    /// Hands the request at `pickup` to a carrier.
    ///
    /// No-op returning `None` unless the point is waiting and the carrier is empty.
    pub fn claim(&mut self, pickup: PickupId, carrier: &mut Option<DeliveryId>) -> Option<Claim> {
        if carrier.is_some() {
            return None;
        }
        let state = self.states.get_mut(pickup)?;
        let PickupState::Waiting {
            target,
            remaining_ticks,
        } = *state
        else {
            return None;
        };

        *carrier = Some(target);
        *state = PickupState::Inactive;
        Some(Claim {
            pickup,
            target,
            remaining_ticks,
        })
    }

    /// Turns `k` distinct inactive points into fresh requests.
    ///
    /// Candidates are the inactive points listed in ascending id order, so the
    /// draw only depends on the rng state. The returned ids are in sample order,
    /// not sorted. Delivery targets are distinct within one call.
    pub fn regenerate<R: Rng + ?Sized>(
        &mut self,
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<PickupId>, LedgerError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let inactive: Vec<PickupId> = self
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_waiting())
            .map(|(pickup, _)| pickup)
            .collect();
        if inactive.len() < k {
            return Err(LedgerError::NotEnoughInactive {
                needed: k,
                available: inactive.len(),
            });
        }
        if self.num_delivery_points < k {
            return Err(LedgerError::NotEnoughDeliveryPoints {
                needed: k,
                available: self.num_delivery_points,
            });
        }

        let chosen: Vec<PickupId> = index::sample(rng, inactive.len(), k)
            .into_iter()
            .map(|i| inactive[i])
            .collect();
        let targets = index::sample(rng, self.num_delivery_points, k);

        for (&pickup, target) in chosen.iter().zip(targets) {
            self.states[pickup] = PickupState::Waiting {
                target,
                remaining_ticks: self.wait_ticks,
            };
        }
        debug!(?chosen, "requests regenerated");
        Ok(chosen)
    }
}
