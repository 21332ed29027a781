//! Non-destructive merge of inferred fields into a wine

use super::parser::EnrichmentPayload;
use crate::catalog::{FieldUpdates, Wine};

/// Compute the updates to apply to `wine`.
///
/// A field is included only when the wine's current value is empty and the
/// payload carries a non-empty value. Populated fields are never touched.
pub fn merge_fields(wine: &Wine, payload: &EnrichmentPayload) -> FieldUpdates {
    let mut updates = FieldUpdates::default();

    if wine.description_missing() {
        updates.description = inferred_description(payload);
    }
    if wine.region_missing() {
        updates.region = non_blank(payload.region.as_deref());
    }
    if wine.denomination_missing() {
        updates.denomination = non_blank(payload.denomination.as_deref());
    }
    if wine.grapes_missing() {
        updates.grape_varieties = payload
            .grape_varieties
            .as_ref()
            .map(|grapes| {
                grapes
                    .iter()
                    .map(|g| g.trim())
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|grapes| !grapes.is_empty());
    }

    updates
}

/// Tasting notes, with the food pairing appended as a second paragraph.
fn inferred_description(payload: &EnrichmentPayload) -> Option<String> {
    let notes = non_blank(payload.tasting_notes.as_deref());
    let pairing = non_blank(payload.food_pairing.as_deref());

    match (notes, pairing) {
        (Some(notes), Some(pairing)) => Some(format!("{}\n\nFood pairing: {}", notes, pairing)),
        (Some(notes), None) => Some(notes),
        (None, Some(pairing)) => Some(format!("Food pairing: {}", pairing)),
        (None, None) => None,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WineCategory;

    fn payload() -> EnrichmentPayload {
        EnrichmentPayload {
            region: Some("Toscana".to_string()),
            denomination: Some("Bolgheri DOC".to_string()),
            grape_varieties: Some(vec!["Cabernet Sauvignon".to_string(), "Merlot".to_string()]),
            tasting_notes: Some("Blackcurrant and cedar.".to_string()),
            food_pairing: Some("Grilled lamb".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn fills_every_missing_field() {
        let wine = Wine::new("Bolgheri Rosso", WineCategory::Red, 35.0);
        let updates = merge_fields(&wine, &payload());

        assert_eq!(updates.region.as_deref(), Some("Toscana"));
        assert_eq!(updates.denomination.as_deref(), Some("Bolgheri DOC"));
        assert_eq!(updates.grape_varieties.as_ref().map(Vec::len), Some(2));
        assert_eq!(
            updates.description.as_deref(),
            Some("Blackcurrant and cedar.\n\nFood pairing: Grilled lamb")
        );
    }

    #[test]
    fn never_overwrites_populated_fields() {
        let wine = Wine::new("Bolgheri Rosso", WineCategory::Red, 35.0)
            .with_region("Maremma")
            .with_description("House favourite.")
            .with_grapes(["Cabernet Franc"]);
        let updates = merge_fields(&wine, &payload());

        assert!(updates.region.is_none());
        assert!(updates.description.is_none());
        assert!(updates.grape_varieties.is_none());
        assert_eq!(updates.field_names(), vec!["denomination"]);
    }

    #[test]
    fn blank_current_values_count_as_missing() {
        let wine = Wine::new("Bolgheri Rosso", WineCategory::Red, 35.0)
            .with_region("   ")
            .with_grapes(Vec::<String>::new());
        let updates = merge_fields(&wine, &payload());
        assert_eq!(updates.region.as_deref(), Some("Toscana"));
        assert!(updates.grape_varieties.is_some());
    }

    #[test]
    fn empty_inferred_values_are_ignored() {
        let wine = Wine::new("Bolgheri Rosso", WineCategory::Red, 35.0);
        let payload = EnrichmentPayload {
            region: Some("  ".to_string()),
            grape_varieties: Some(vec![" ".to_string()]),
            ..Default::default()
        };
        assert!(merge_fields(&wine, &payload).is_empty());
    }

    #[test]
    fn food_pairing_alone_still_describes() {
        let wine = Wine::new("Moscato d'Asti", WineCategory::Dessert, 20.0);
        let payload = EnrichmentPayload {
            food_pairing: Some("Panettone".to_string()),
            ..Default::default()
        };
        assert_eq!(
            merge_fields(&wine, &payload).description.as_deref(),
            Some("Food pairing: Panettone")
        );
    }
}
