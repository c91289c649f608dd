//! Card repository: operator-managed cards and their aliases.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::{normalize_alias, Card, CardAlias, NewCard};

/// A raw card row from the database.
struct CardRow {
    id: i64,
    display_name: String,
    last4: Option<String>,
    issuer: Option<String>,
    created_at: String,
}

impl CardRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            display_name: row.get("display_name")?,
            last4: row.get("last4")?,
            issuer: row.get("issuer")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_card(self) -> Result<Card, DatabaseError> {
        Ok(Card {
            id: self.id,
            display_name: self.display_name,
            last4: self.last4,
            issuer: self.issuer,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

/// A raw alias row from the database.
struct AliasRow {
    id: i64,
    card_id: i64,
    alias: String,
    created_at: String,
}

impl AliasRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            card_id: row.get("card_id")?,
            alias: row.get("alias")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_alias(self) -> Result<CardAlias, DatabaseError> {
        Ok(CardAlias {
            id: self.id,
            card_id: self.card_id,
            alias: self.alias,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

/// Result of [`insert_alias`].
#[derive(Debug, Clone, PartialEq)]
pub enum AliasInsert {
    Created(CardAlias),
    /// The card already carried this alias.
    Existing(CardAlias),
}

impl AliasInsert {
    pub fn alias(&self) -> &CardAlias {
        match self {
            AliasInsert::Created(a) | AliasInsert::Existing(a) => a,
        }
    }
}

/// Inserts a new card.
pub fn insert_card(
    db: &Database,
    card: &NewCard,
    now: DateTime<Utc>,
) -> Result<Card, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO cards (display_name, last4, issuer, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                card.display_name.trim(),
                card.last4,
                card.issuer,
                format_timestamp(&now)
            ],
        )?;
        Ok(Card {
            id: conn.last_insert_rowid(),
            display_name: card.display_name.trim().to_string(),
            last4: card.last4.clone(),
            issuer: card.issuer.clone(),
            created_at: now,
        })
    })
}

/// Finds a card by its ID.
pub fn find_card(db: &Database, id: i64) -> Result<Option<Card>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row("SELECT * FROM cards WHERE id = ?1", params![id], CardRow::from_row)
            .optional()?
            .map(CardRow::into_card)
            .transpose()
    })
}

/// Lists all cards ordered by display name.
pub fn list_cards(db: &Database) -> Result<Vec<Card>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM cards ORDER BY display_name")?;
        let rows = stmt
            .query_map([], CardRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(CardRow::into_card).collect()
    })
}

/// Deletes a card. Its aliases go with it; receipts lose their binding.
pub fn delete_card(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM cards WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    })
}

/// Adds an alias to a card. The text is normalized first.
///
/// The same alias text may belong to several cards; resolution then
/// reports it as ambiguous.
pub fn insert_alias(
    db: &Database,
    card_id: i64,
    text: &str,
    now: DateTime<Utc>,
) -> Result<AliasInsert, DatabaseError> {
    let alias = normalize_alias(text);
    db.with_conn(|conn| {
        let existing = conn
            .query_row(
                "SELECT * FROM card_aliases WHERE card_id = ?1 AND alias = ?2",
                params![card_id, alias],
                AliasRow::from_row,
            )
            .optional()?;
        if let Some(found) = existing {
            return Ok(AliasInsert::Existing(found.into_alias()?));
        }

        conn.execute(
            "INSERT INTO card_aliases (card_id, alias, created_at) VALUES (?1, ?2, ?3)",
            params![card_id, alias, format_timestamp(&now)],
        )?;
        Ok(AliasInsert::Created(CardAlias {
            id: conn.last_insert_rowid(),
            card_id,
            alias,
            created_at: now,
        }))
    })
}

/// Removes an alias by ID.
pub fn delete_alias(db: &Database, id: i64) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let deleted = conn.execute("DELETE FROM card_aliases WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    })
}

/// Lists aliases, optionally for one card.
pub fn list_aliases(db: &Database, card_id: Option<i64>) -> Result<Vec<CardAlias>, DatabaseError> {
    db.with_conn(|conn| {
        let rows = match card_id {
            Some(id) => {
                let mut stmt =
                    conn.prepare("SELECT * FROM card_aliases WHERE card_id = ?1 ORDER BY id")?;
                let rows = stmt
                    .query_map(params![id], AliasRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare("SELECT * FROM card_aliases ORDER BY id")?;
                let rows = stmt
                    .query_map([], AliasRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        rows.into_iter().map(AliasRow::into_alias).collect()
    })
}

/// Distinct card IDs owning exactly this (already normalized) alias text.
///
/// A card's own `last4` and `issuer` count as aliases of that card.
pub fn card_ids_for_alias(db: &Database, alias: &str) -> Result<Vec<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT DISTINCT card_id FROM card_aliases WHERE alias = ?1")?;
        let mut ids = stmt
            .query_map(params![alias], |r| r.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, last4, issuer FROM cards WHERE last4 IS NOT NULL OR issuer IS NOT NULL",
        )?;
        let cards = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, Option<String>>(1)?,
                    r.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (id, last4, issuer) in cards {
            if [last4, issuer]
                .iter()
                .flatten()
                .any(|own| normalize_alias(own) == alias)
            {
                ids.push(id);
            }
        }

        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    })
}
