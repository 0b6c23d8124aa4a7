use crate::error::{EmbeddingError, Result};
use codeintel_code_chunker::Domain;
use std::sync::{Arc, Mutex, PoisonError};

/// Estimated resident memory of loaded models against a fixed ceiling
///
/// Loads reserve their estimate before starting, so two domains loading at the same time
/// can never overshoot the threshold together. The reservation becomes resident on commit
/// and is returned to the budget if the load is abandoned.
#[derive(Debug)]
pub struct RamBudget {
    threshold_mb: u64,
    state: Mutex<BudgetState>,
}

#[derive(Debug, Default)]
struct BudgetState {
    committed_mb: u64,
    reserved_mb: u64,
}

impl RamBudget {
    pub fn new(threshold_mb: u64) -> Self {
        Self {
            threshold_mb,
            state: Mutex::new(BudgetState::default()),
        }
    }

    pub const fn threshold_mb(&self) -> u64 {
        self.threshold_mb
    }

    /// Memory held by committed loads
    pub fn resident_mb(&self) -> u64 {
        self.lock().committed_mb
    }

    /// Memory held by loads still in flight
    pub fn reserved_mb(&self) -> u64 {
        self.lock().reserved_mb
    }

    /// Reserve `mb` for a load of `domain`
    pub fn reserve(self: &Arc<Self>, domain: Domain, mb: u64) -> Result<Reservation> {
        let mut state = self.lock();
        let projected = state.committed_mb + state.reserved_mb + mb;
        if projected > self.threshold_mb {
            return Err(EmbeddingError::RamBudgetExceeded {
                domain,
                requested_mb: mb,
                committed_mb: state.committed_mb + state.reserved_mb,
                threshold_mb: self.threshold_mb,
            });
        }
        state.reserved_mb += mb;
        Ok(Reservation {
            budget: Arc::clone(self),
            mb,
            committed: false,
        })
    }

    /// Give back the memory of an unloaded model
    pub(crate) fn release_resident(&self, mb: u64) {
        let mut state = self.lock();
        state.committed_mb = state.committed_mb.saturating_sub(mb);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pending claim on the budget; released on drop unless committed
#[derive(Debug)]
pub struct Reservation {
    budget: Arc<RamBudget>,
    mb: u64,
    committed: bool,
}

impl Reservation {
    pub const fn mb(&self) -> u64 {
        self.mb
    }

    /// Turn the reservation into resident memory
    pub fn commit(mut self) {
        let mut state = self.budget.lock();
        state.reserved_mb = state.reserved_mb.saturating_sub(self.mb);
        state.committed_mb += self.mb;
        self.committed = true;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut state = self.budget.lock();
        state.reserved_mb = state.reserved_mb.saturating_sub(self.mb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn both_default_models_fit_a_gigabyte() {
        let budget = Arc::new(RamBudget::new(1024));
        budget.reserve(Domain::Text, 260).unwrap().commit();
        budget.reserve(Domain::Code, 400).unwrap().commit();
        assert_eq!(budget.resident_mb(), 660);
        assert_eq!(budget.reserved_mb(), 0);
    }

    #[test]
    fn second_model_over_threshold_is_rejected() {
        let budget = Arc::new(RamBudget::new(500));
        budget.reserve(Domain::Text, 260).unwrap().commit();
        let err = budget.reserve(Domain::Code, 400).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::RamBudgetExceeded {
                domain: Domain::Code,
                requested_mb: 400,
                committed_mb: 260,
                threshold_mb: 500
            }
        ));
        assert_eq!(budget.resident_mb(), 260);
    }

    #[test]
    fn dropped_reservation_is_released() {
        let budget = Arc::new(RamBudget::new(500));
        {
            let reservation = budget.reserve(Domain::Code, 400).unwrap();
            assert_eq!(reservation.mb(), 400);
            assert_eq!(budget.reserved_mb(), 400);
            assert!(budget.reserve(Domain::Text, 260).is_err());
        }
        assert_eq!(budget.reserved_mb(), 0);
        assert_eq!(budget.resident_mb(), 0);
        budget.reserve(Domain::Text, 260).unwrap().commit();
    }

    #[test]
    fn exact_fit_is_allowed() {
        let budget = Arc::new(RamBudget::new(660));
        budget.reserve(Domain::Text, 260).unwrap().commit();
        budget.reserve(Domain::Code, 400).unwrap().commit();
        assert_eq!(budget.resident_mb(), budget.threshold_mb());
    }
}
