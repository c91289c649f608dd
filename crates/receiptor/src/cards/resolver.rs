use crate::db::{card_repo, Database, DatabaseError};
use crate::model::{normalize_alias, ExtractedFields};

/// Outcome of mapping a card hint to a known card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardResolution {
    Resolved(i64),
    /// No card text was found in the receipt.
    NoHint,
    /// A hint was found but no card carries it.
    NoMatch,
    /// The hint belongs to more than one card.
    Ambiguous(Vec<i64>),
}

impl CardResolution {
    pub fn card_id(&self) -> Option<i64> {
        match self {
            CardResolution::Resolved(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardResolution::Resolved(_) => "resolved",
            CardResolution::NoHint => "no_hint",
            CardResolution::NoMatch => "no_match",
            CardResolution::Ambiguous(_) => "ambiguous",
        }
    }
}

/// Resolves card hints against aliases and each card's own last-4 and
/// issuer. Exact matches only.
#[derive(Clone)]
pub struct CardResolver {
    db: Database,
}

impl CardResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// The last-4 fragment when present, otherwise the issuer string.
    pub fn hint(fields: &ExtractedFields) -> Option<&str> {
        fields
            .card_last4_seen
            .as_deref()
            .or(fields.card_issuer_seen.as_deref())
            .filter(|h| !h.trim().is_empty())
    }

    pub fn resolve(&self, fields: &ExtractedFields) -> Result<CardResolution, DatabaseError> {
        let Some(hint) = Self::hint(fields) else {
            return Ok(CardResolution::NoHint);
        };
        self.resolve_hint(hint)
    }

    pub fn resolve_hint(&self, hint: &str) -> Result<CardResolution, DatabaseError> {
        let card_ids = card_repo::card_ids_for_alias(&self.db, &normalize_alias(hint))?;
        let resolution = match card_ids.as_slice() {
            [] => CardResolution::NoMatch,
            [id] => CardResolution::Resolved(*id),
            _ => CardResolution::Ambiguous(card_ids),
        };
        log::debug!("Card hint resolved as {}", resolution.as_str());
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewCard;
    use chrono::Utc;

    fn card(db: &Database, name: &str) -> i64 {
        card_repo::insert_card(
            db,
            &NewCard {
                display_name: name.to_string(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
        .id
    }

    fn fields(last4: Option<&str>, issuer: Option<&str>) -> ExtractedFields {
        ExtractedFields {
            card_last4_seen: last4.map(str::to_string),
            card_issuer_seen: issuer.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_four_outcomes_are_distinct() {
        let db = Database::open_in_memory().unwrap();
        let sapphire = card(&db, "Sapphire");
        let freedom = card(&db, "Freedom");
        card_repo::insert_alias(&db, sapphire, "4242", Utc::now()).unwrap();
        card_repo::insert_alias(&db, sapphire, "visa", Utc::now()).unwrap();
        card_repo::insert_alias(&db, freedom, "visa", Utc::now()).unwrap();
        let resolver = CardResolver::new(db);

        assert_eq!(
            resolver.resolve(&fields(Some("4242"), None)).unwrap(),
            CardResolution::Resolved(sapphire)
        );
        assert_eq!(
            resolver.resolve(&fields(None, None)).unwrap(),
            CardResolution::NoHint
        );
        assert_eq!(
            resolver.resolve(&fields(Some("1111"), None)).unwrap(),
            CardResolution::NoMatch
        );
        assert_eq!(
            resolver.resolve(&fields(None, Some("Visa"))).unwrap(),
            CardResolution::Ambiguous(vec![sapphire, freedom])
        );
    }

    #[test]
    fn test_last4_takes_precedence_over_issuer() {
        let db = Database::open_in_memory().unwrap();
        let sapphire = card(&db, "Sapphire");
        card_repo::insert_alias(&db, sapphire, "visa", Utc::now()).unwrap();
        let resolver = CardResolver::new(db);

        // The issuer would match, but the last-4 hint wins and has no alias.
        assert_eq!(
            resolver.resolve(&fields(Some("9999"), Some("Visa"))).unwrap(),
            CardResolution::NoMatch
        );
    }

    #[test]
    fn test_card_last4_resolves_without_alias() {
        let db = Database::open_in_memory().unwrap();
        let sapphire = card_repo::insert_card(
            &db,
            &NewCard {
                display_name: "Sapphire".to_string(),
                last4: Some("4242".to_string()),
                issuer: Some("Visa".to_string()),
            },
            Utc::now(),
        )
        .unwrap()
        .id;
        let freedom = card(&db, "Freedom");
        card_repo::insert_alias(&db, freedom, "visa", Utc::now()).unwrap();
        let resolver = CardResolver::new(db);

        assert_eq!(
            resolver.resolve(&fields(Some("4242"), None)).unwrap(),
            CardResolution::Resolved(sapphire)
        );
        // The issuer is shared between the card itself and another card's alias.
        assert_eq!(
            resolver.resolve(&fields(None, Some("VISA"))).unwrap(),
            CardResolution::Ambiguous(vec![sapphire, freedom])
        );
        assert_eq!(
            resolver.resolve(&fields(Some("0000"), None)).unwrap(),
            CardResolution::NoMatch
        );
    }

    #[test]
    fn test_hint() {
        assert_eq!(CardResolver::hint(&fields(Some("4242"), Some("Visa"))), Some("4242"));
        assert_eq!(CardResolver::hint(&fields(None, Some("Visa"))), Some("Visa"));
        assert_eq!(CardResolver::hint(&fields(Some("  "), None)), None);
        assert_eq!(CardResolution::Ambiguous(vec![1, 2]).card_id(), None);
    }
}
