// libs/booking-cell/src/slots.rs
use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

/// A single bookable slot of a doctor: the date string and the time string
/// exactly as clients send them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotKey {
    pub slot_date: String,
    pub slot_time: String,
}

impl SlotKey {
    pub fn new(slot_date: impl Into<String>, slot_time: impl Into<String>) -> Self {
        Self {
            slot_date: slot_date.into(),
            slot_time: slot_time.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.slot_date, self.slot_time)
    }
}

/// Booked slots of one doctor, keyed by date.
///
/// A `(date, time)` pair is held at most once and dates without times are
/// removed, so an empty map means the doctor has nothing booked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SlotsBooked(BTreeMap<String, Vec<String>>);

impl SlotsBooked {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, slot: &SlotKey) -> bool {
        self.0
            .get(&slot.slot_date)
            .is_some_and(|times| times.iter().any(|t| t == &slot.slot_time))
    }

    /// Adds the hold. Returns `false` when it was already present.
    pub fn insert(&mut self, slot: &SlotKey) -> bool {
        let times = self.0.entry(slot.slot_date.clone()).or_default();
        if times.iter().any(|t| t == &slot.slot_time) {
            return false;
        }
        times.push(slot.slot_time.clone());
        true
    }

    /// Removes the hold. Returns `false` when there was nothing to remove.
    pub fn remove(&mut self, slot: &SlotKey) -> bool {
        let Some(times) = self.0.get_mut(&slot.slot_date) else {
            return false;
        };
        let before = times.len();
        times.retain(|t| t != &slot.slot_time);
        let removed = times.len() != before;
        if times.is_empty() {
            self.0.remove(&slot.slot_date);
        }
        removed
    }

    pub fn times(&self, slot_date: &str) -> &[String] {
        self.0.get(slot_date).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of held slots across all dates.
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.0.iter().flat_map(|(date, times)| {
            times.iter().map(move |time| SlotKey::new(date.clone(), time.clone()))
        })
    }
}

impl FromIterator<SlotKey> for SlotsBooked {
    fn from_iter<I: IntoIterator<Item = SlotKey>>(iter: I) -> Self {
        let mut slots = SlotsBooked::new();
        for slot in iter {
            slots.insert(&slot);
        }
        slots
    }
}

// Older doctor documents store `false` or `null` instead of an empty object.
impl<'de> Deserialize<'de> for SlotsBooked {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SlotsVisitor;

        impl<'de> Visitor<'de> for SlotsVisitor {
            type Value = SlotsBooked;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of date to booked times, false or null")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
                if value {
                    Err(E::invalid_value(de::Unexpected::Bool(true), &self))
                } else {
                    Ok(SlotsBooked::new())
                }
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(SlotsBooked::new())
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(SlotsBooked::new())
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut slots = SlotsBooked::new();
                while let Some((date, times)) = access.next_entry::<String, Vec<String>>()? {
                    for time in times {
                        slots.insert(&SlotKey::new(date.clone(), time));
                    }
                }
                Ok(slots)
            }
        }

        deserializer.deserialize_any(SlotsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn slot(date: &str, time: &str) -> SlotKey {
        SlotKey::new(date, time)
    }

    #[test]
    fn insert_rejects_duplicate_hold() {
        let mut slots = SlotsBooked::new();
        assert!(slots.insert(&slot("2024-06-01", "10:00")));
        assert!(!slots.insert(&slot("2024-06-01", "10:00")));
        assert!(slots.insert(&slot("2024-06-01", "11:00")));

        assert_eq!(slots.len(), 2);
        assert_eq!(slots.times("2024-06-01"), ["10:00", "11:00"]);
    }

    #[test]
    fn remove_drops_emptied_date() {
        let mut slots = SlotsBooked::new();
        slots.insert(&slot("2024-06-01", "10:00"));
        slots.insert(&slot("2024-06-02", "09:30"));

        assert!(slots.remove(&slot("2024-06-01", "10:00")));
        assert!(!slots.remove(&slot("2024-06-01", "10:00")));

        assert_eq!(serde_json::to_value(&slots).unwrap(), json!({ "2024-06-02": ["09:30"] }));
        assert!(slots.remove(&slot("2024-06-02", "09:30")));
        assert!(slots.is_empty());
        assert_eq!(serde_json::to_value(&slots).unwrap(), json!({}));
    }

    #[test]
    fn legacy_false_and_null_read_as_empty() {
        let from_false: SlotsBooked = serde_json::from_value(json!(false)).unwrap();
        let from_null: SlotsBooked = serde_json::from_value(json!(null)).unwrap();

        assert!(from_false.is_empty());
        assert!(from_null.is_empty());
        assert!(serde_json::from_value::<SlotsBooked>(json!(true)).is_err());
    }

    #[test]
    fn deserializing_collapses_duplicates_and_empty_dates() {
        let slots: SlotsBooked = serde_json::from_value(json!({
            "2024-06-01": ["10:00", "10:00"],
            "2024-06-02": []
        }))
        .unwrap();

        assert_eq!(slots.len(), 1);
        assert!(slots.contains(&slot("2024-06-01", "10:00")));
        assert_eq!(slots.iter().collect::<Vec<_>>(), vec![slot("2024-06-01", "10:00")]);
    }
}
