//! Booking ↔ ambulance assignment table
//!
//! Both directions are kept in step: after any operation, `ambulance_for(b)
//! == Some(a)` holds exactly when `booking_for(a) == Some(b)`.

use std::collections::HashMap;

/// What an `assign` displaced
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reassignment {
    /// Ambulance previously serving the booking
    pub previous_ambulance: Option<String>,
    /// Booking the ambulance was previously serving
    pub previous_booking: Option<String>,
}

impl Reassignment {
    pub fn is_conflict(&self) -> bool {
        self.previous_ambulance.is_some() || self.previous_booking.is_some()
    }
}

#[derive(Debug, Default)]
pub struct AssignmentTable {
    ambulance_by_booking: HashMap<String, String>,
    booking_by_ambulance: HashMap<String, String>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `booking_id` with `ambulance_id`, last write wins
    ///
    /// Precondition: the caller has already decided the pairing is legitimate
    /// (the persistent store gates driver acceptance). Any pairing either side
    /// held before is dissolved and reported.
    pub fn assign(&mut self, booking_id: &str, ambulance_id: &str) -> Reassignment {
        let mut outcome = Reassignment::default();

        if let Some(old_ambulance) = self.ambulance_by_booking.remove(booking_id)
            && old_ambulance != ambulance_id
        {
            self.booking_by_ambulance.remove(&old_ambulance);
            outcome.previous_ambulance = Some(old_ambulance);
        }

        if let Some(old_booking) = self.booking_by_ambulance.remove(ambulance_id)
            && old_booking != booking_id
        {
            self.ambulance_by_booking.remove(&old_booking);
            outcome.previous_booking = Some(old_booking);
        }

        self.ambulance_by_booking
            .insert(booking_id.to_string(), ambulance_id.to_string());
        self.booking_by_ambulance
            .insert(ambulance_id.to_string(), booking_id.to_string());

        outcome
    }

    pub fn ambulance_for(&self, booking_id: &str) -> Option<&str> {
        self.ambulance_by_booking.get(booking_id).map(String::as_str)
    }

    pub fn booking_for(&self, ambulance_id: &str) -> Option<&str> {
        self.booking_by_ambulance.get(ambulance_id).map(String::as_str)
    }

    /// Whether `(booking_id, ambulance_id)` is the current pairing
    pub fn is_assigned(&self, booking_id: &str, ambulance_id: &str) -> bool {
        self.ambulance_for(booking_id) == Some(ambulance_id)
    }

    /// Remove the pairing only if it is still current
    ///
    /// A stale release for an ambulance since reassigned elsewhere is a no-op.
    pub fn release(&mut self, booking_id: &str, ambulance_id: &str) -> bool {
        if !self.is_assigned(booking_id, ambulance_id) {
            return false;
        }
        self.ambulance_by_booking.remove(booking_id);
        self.booking_by_ambulance.remove(ambulance_id);
        true
    }

    pub fn len(&self) -> usize {
        self.ambulance_by_booking.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ambulance_by_booking.is_empty()
    }
}
