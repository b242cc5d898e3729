// Rust guideline compliant 2026-10-13

//! Single-owner holder for the active subscription.

use domain::Subscription;

/// Holds at most one live [`Subscription`].
///
/// Installing a new subscription releases the previous one first, so two
/// subscriptions never coexist inside a slot.
#[derive(Debug, Default)]
pub struct SubscriptionSlot {
    active: Option<Subscription>,
    installed: u64,
}

impl SubscriptionSlot {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subscription`, releasing whatever was there before.
    pub fn install(&mut self, subscription: Subscription) {
        self.release();
        self.active = Some(subscription);
        self.installed += 1;
    }

    /// Release the held subscription. Returns `false` if the slot was empty.
    pub fn release(&mut self) -> bool {
        match self.active.take() {
            Some(subscription) => {
                subscription.release();
                true
            }
            None => false,
        }
    }

    /// Whether a subscription is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Number of subscriptions installed over the slot's lifetime.
    #[must_use]
    pub fn installed(&self) -> u64 {
        self.installed
    }

    pub(crate) fn active_mut(&mut self) -> Option<&mut Subscription> {
        self.active.as_mut()
    }
}
