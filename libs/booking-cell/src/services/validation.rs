// libs/booking-cell/src/services/validation.rs
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BookingError, ReservationRequest};
use crate::slots::SlotKey;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("identifier pattern"));

// Dates like "2024-06-01" or "1_6_2024", times like "10:00" or "10:30 AM".
static SLOT_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9:_./ -]{0,30}[A-Za-z0-9.])?$").expect("slot pattern"));

pub fn validate_identifier(field: &str, value: &str) -> Result<(), BookingError> {
    if value.is_empty() {
        return Err(BookingError::Validation(format!("Missing required fields: {}", field)));
    }
    if !IDENTIFIER.is_match(value) {
        return Err(BookingError::Validation(format!("Invalid {} format", field)));
    }
    Ok(())
}

pub fn validate_reservation(request: &ReservationRequest) -> Result<SlotKey, BookingError> {
    let missing: Vec<&str> = [
        ("userId", request.user_id.as_str()),
        ("docId", request.doc_id.as_str()),
        ("slotDate", request.slot_date.as_str()),
        ("slotTime", request.slot_time.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| field)
    .collect();

    if !missing.is_empty() {
        return Err(BookingError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    validate_identifier("userId", &request.user_id)?;
    validate_identifier("docId", &request.doc_id)?;

    for (field, value) in [("slotDate", &request.slot_date), ("slotTime", &request.slot_time)] {
        if !SLOT_PART.is_match(value) {
            return Err(BookingError::Validation(format!("Invalid {} format", field)));
        }
    }

    Ok(SlotKey::new(request.slot_date.clone(), request.slot_time.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(doc_id: &str, slot_date: &str, slot_time: &str) -> ReservationRequest {
        ReservationRequest {
            user_id: "user1".to_string(),
            doc_id: doc_id.to_string(),
            slot_date: slot_date.to_string(),
            slot_time: slot_time.to_string(),
        }
    }

    #[test]
    fn accepts_common_slot_formats() {
        let slot = validate_reservation(&request("665f1c2e9b", "1_6_2024", "10:30 AM")).unwrap();
        assert_eq!(slot, SlotKey::new("1_6_2024", "10:30 AM"));

        assert!(validate_reservation(&request("doc-1", "2024-06-01", "10:00")).is_ok());
    }

    #[test]
    fn lists_every_missing_field() {
        let err = validate_reservation(&request("", "2024-06-01", " ")).unwrap_err();
        assert_eq!(
            err,
            BookingError::Validation("Missing required fields: docId, slotTime".to_string())
        );
    }

    #[test]
    fn rejects_malformed_values() {
        assert_matches!(
            validate_reservation(&request("../admin", "2024-06-01", "10:00")),
            Err(BookingError::Validation(msg)) if msg == "Invalid docId format"
        );
        assert_matches!(
            validate_reservation(&request("d1", "2024-06-01 ", "10:00")),
            Err(BookingError::Validation(msg)) if msg == "Invalid slotDate format"
        );
        assert_matches!(
            validate_reservation(&request("d1", "2024-06-01", "10:00\n")),
            Err(BookingError::Validation(_))
        );
    }
}
