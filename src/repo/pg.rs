use std::sync::{Arc, OnceLock};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use diesel::pg::upsert::excluded;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{CardRepository, ReadingRepository, new_share_slug};
use crate::db::DbPool;
use crate::deck::compute_etag;
use crate::models::{Card, DrawnCard, GroupOrder, Interpretation, Reading, Sections};
use crate::schema::{cards, interpretation_details, interpretations, reading_cards, readings, share_links};

const SLUG_ATTEMPTS: usize = 5;

fn meanings_to_json(meanings: Option<&[String]>) -> Option<Value> {
    meanings.map(|m| Value::from(m.to_vec()))
}

fn json_to_meanings(value: Option<Value>) -> Option<Vec<String>> {
    value.and_then(|v| serde_json::from_value(v).ok())
}

/// Decodes a stored group order, failing on corrupt rows
fn parse_group_order(reading_id: Uuid, value: Value) -> Result<Vec<GroupOrder>> {
    serde_json::from_value(value).map_err(|e| anyhow!("Corrupt group_order for reading {}: {}", reading_id, e))
}

/// Parses a reading id, treating malformed ids as unknown
fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = cards)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct CardRow {
    id: i32,
    name: String,
    arcana: String,
    suit: Option<String>,
    image_url: Option<String>,
    upright_meaning: Option<Value>,
    reversed_meaning: Option<Value>,
}

impl From<&Card> for CardRow {
    fn from(card: &Card) -> Self {
        Self {
            id: card.get_id(),
            name: card.get_name().to_string(),
            arcana: card.get_arcana().to_string(),
            suit: card.get_suit().map(str::to_string),
            image_url: card.get_image_url().map(str::to_string),
            upright_meaning: meanings_to_json(card.get_upright_meaning()),
            reversed_meaning: meanings_to_json(card.get_reversed_meaning()),
        }
    }
}

impl From<CardRow> for Card {
    fn from(row: CardRow) -> Self {
        Card::new_with_fields(
            row.id,
            row.name,
            row.arcana,
            row.suit,
            row.image_url,
            json_to_meanings(row.upright_meaning),
            json_to_meanings(row.reversed_meaning),
        )
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = readings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ReadingRow {
    id: Uuid,
    question: String,
    group_order: Value,
    created_at: DateTime<Utc>,
}

/// A drawn card with a snapshot of the card as it was when drawn
#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = reading_cards)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct ReadingCardRow {
    reading_id: Uuid,
    position: i32,
    card_id: i32,
    is_reversed: bool,
    name: String,
    arcana: String,
    suit: Option<String>,
    image_url: Option<String>,
    upright_meaning: Option<Value>,
    reversed_meaning: Option<Value>,
}

impl ReadingCardRow {
    fn new(reading_id: Uuid, item: &DrawnCard) -> Self {
        let card = CardRow::from(&item.card);
        Self {
            reading_id,
            position: item.position,
            card_id: card.id,
            is_reversed: item.is_reversed,
            name: card.name,
            arcana: card.arcana,
            suit: card.suit,
            image_url: card.image_url,
            upright_meaning: card.upright_meaning,
            reversed_meaning: card.reversed_meaning,
        }
    }

    fn into_drawn(self) -> DrawnCard {
        let card = Card::from(CardRow {
            id: self.card_id,
            name: self.name,
            arcana: self.arcana,
            suit: self.suit,
            image_url: self.image_url,
            upright_meaning: self.upright_meaning,
            reversed_meaning: self.reversed_meaning,
        });
        DrawnCard {
            position: self.position,
            is_reversed: self.is_reversed,
            card,
        }
    }
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = interpretations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct InterpretationRow {
    reading_id: Uuid,
    lang: String,
    style: String,
    use_llm: bool,
    summary: String,
    positions: Value,
    advices: Value,
    llm_used: bool,
    sections: Option<Value>,
    created_at: DateTime<Utc>,
}

/// Card catalogue stored in the `cards` table
pub struct PgCardRepository {
    pool: Arc<DbPool>,
    // Computed on first use; the catalogue is only written by `seed` at startup
    etag: OnceLock<String>,
}

impl PgCardRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool, etag: OnceLock::new() }
    }

    /// Upserts the dataset cards so ids match the file backend
    #[instrument(skip(self, cards), fields(count = cards.len()))]
    pub fn seed(&self, cards: &[Card]) -> Result<usize> {
        let conn = &mut self.pool.get()?;
        let rows: Vec<CardRow> = cards.iter().map(CardRow::from).collect();

        let written = diesel::insert_into(cards::table)
            .values(&rows)
            .on_conflict(cards::id)
            .do_update()
            .set((
                cards::name.eq(excluded(cards::name)),
                cards::arcana.eq(excluded(cards::arcana)),
                cards::suit.eq(excluded(cards::suit)),
                cards::image_url.eq(excluded(cards::image_url)),
                cards::upright_meaning.eq(excluded(cards::upright_meaning)),
                cards::reversed_meaning.eq(excluded(cards::reversed_meaning)),
            ))
            .execute(conn)?;

        info!("Seeded {} cards into the database", written);
        Ok(written)
    }
}

impl CardRepository for PgCardRepository {
    #[instrument(skip(self))]
    fn list_cards(&self) -> Result<Vec<Card>> {
        let conn = &mut self.pool.get()?;
        let rows = cards::table
            .order(cards::id.asc())
            .select(CardRow::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(Card::from).collect())
    }

    #[instrument(skip(self))]
    fn get_card(&self, id: i32) -> Result<Option<Card>> {
        let conn = &mut self.pool.get()?;
        let row = cards::table
            .find(id)
            .select(CardRow::as_select())
            .first(conn)
            .optional()?;
        Ok(row.map(Card::from))
    }

    fn catalogue_etag(&self) -> Result<String> {
        if let Some(etag) = self.etag.get() {
            return Ok(etag.clone());
        }
        let etag = compute_etag(&self.list_cards()?);
        Ok(self.etag.get_or_init(|| etag).clone())
    }
}

/// Readings and their caches stored in Postgres
pub struct PgReadingRepository {
    pool: Arc<DbPool>,
}

impl PgReadingRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    fn existing_slug(conn: &mut PgConnection, reading_id: Uuid) -> QueryResult<Option<String>> {
        share_links::table
            .filter(share_links::reading_id.eq(reading_id))
            .select(share_links::slug)
            .first::<String>(conn)
            .optional()
    }
}

impl ReadingRepository for PgReadingRepository {
    #[instrument(skip(self, reading), fields(question_len = reading.question.len()))]
    fn create(&self, mut reading: Reading) -> Result<Reading> {
        let conn = &mut self.pool.get()?;
        let id = Uuid::new_v4();

        let row = ReadingRow {
            id,
            question: reading.question.clone(),
            group_order: serde_json::to_value(&reading.order)?,
            created_at: Utc::now(),
        };
        let card_rows: Vec<ReadingCardRow> = reading
            .items
            .iter()
            .map(|item| ReadingCardRow::new(id, item))
            .collect();

        conn.transaction::<_, DieselError, _>(|conn| {
            diesel::insert_into(readings::table).values(&row).execute(conn)?;
            diesel::insert_into(reading_cards::table)
                .values(&card_rows)
                .execute(conn)?;
            Ok(())
        })?;

        debug!("Stored reading {}", id);
        reading.id = Some(id.to_string());
        Ok(reading)
    }

    #[instrument(skip(self))]
    fn get(&self, id: &str) -> Result<Option<Reading>> {
        let Some(uuid) = parse_id(id) else {
            return Ok(None);
        };
        let conn = &mut self.pool.get()?;

        let Some(row) = readings::table
            .find(uuid)
            .select(ReadingRow::as_select())
            .first(conn)
            .optional()?
        else {
            return Ok(None);
        };

        let items: Vec<DrawnCard> = reading_cards::table
            .filter(reading_cards::reading_id.eq(uuid))
            .order(reading_cards::position.asc())
            .select(ReadingCardRow::as_select())
            .load(conn)?
            .into_iter()
            .map(ReadingCardRow::into_drawn)
            .collect();

        let order = parse_group_order(row.id, row.group_order)?;
        let mut reading = Reading::new(row.question, order, items);
        reading.id = Some(row.id.to_string());
        Ok(Some(reading))
    }

    fn get_interpretation(&self, id: &str, lang: &str, style: &str, use_llm: bool) -> Result<Option<Interpretation>> {
        let Some(uuid) = parse_id(id) else {
            return Ok(None);
        };
        let conn = &mut self.pool.get()?;

        let row = interpretations::table
            .find((uuid, lang, style, use_llm))
            .select(InterpretationRow::as_select())
            .first(conn)
            .optional()?;

        Ok(row.map(|row| Interpretation {
            id: row.reading_id.to_string(),
            lang: row.lang,
            summary: row.summary,
            positions: serde_json::from_value(row.positions).unwrap_or_default(),
            advices: serde_json::from_value(row.advices).unwrap_or_default(),
            llm_used: row.llm_used,
            sections: row
                .sections
                .and_then(|s| serde_json::from_value::<Sections>(s).ok()),
        }))
    }

    #[instrument(skip(self, interpretation), fields(reading_id = %interpretation.id))]
    fn save_interpretation(&self, interpretation: &Interpretation, lang: &str, style: &str, use_llm: bool) -> Result<()> {
        let uuid = parse_id(&interpretation.id)
            .ok_or_else(|| anyhow!("invalid reading id '{}'", interpretation.id))?;
        let conn = &mut self.pool.get()?;

        let row = InterpretationRow {
            reading_id: uuid,
            lang: lang.to_string(),
            style: style.to_string(),
            use_llm,
            summary: interpretation.summary.clone(),
            positions: serde_json::to_value(&interpretation.positions)?,
            advices: serde_json::to_value(&interpretation.advices)?,
            llm_used: interpretation.llm_used,
            sections: interpretation
                .sections
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
            created_at: Utc::now(),
        };

        diesel::insert_into(interpretations::table)
            .values(&row)
            .on_conflict((
                interpretations::reading_id,
                interpretations::lang,
                interpretations::style,
                interpretations::use_llm,
            ))
            .do_update()
            .set((
                interpretations::summary.eq(excluded(interpretations::summary)),
                interpretations::positions.eq(excluded(interpretations::positions)),
                interpretations::advices.eq(excluded(interpretations::advices)),
                interpretations::llm_used.eq(excluded(interpretations::llm_used)),
                interpretations::sections.eq(excluded(interpretations::sections)),
            ))
            .execute(conn)?;
        Ok(())
    }

    fn get_details(&self, id: &str, lang: &str, use_llm: bool) -> Result<Option<Vec<String>>> {
        let Some(uuid) = parse_id(id) else {
            return Ok(None);
        };
        let conn = &mut self.pool.get()?;

        let details = interpretation_details::table
            .find((uuid, lang, use_llm))
            .select(interpretation_details::details)
            .first::<Value>(conn)
            .optional()?;

        Ok(details.and_then(|d| serde_json::from_value(d).ok()))
    }

    fn save_details(&self, id: &str, lang: &str, use_llm: bool, details: &[String]) -> Result<()> {
        let uuid = parse_id(id).ok_or_else(|| anyhow!("invalid reading id '{}'", id))?;
        let conn = &mut self.pool.get()?;

        diesel::insert_into(interpretation_details::table)
            .values((
                interpretation_details::reading_id.eq(uuid),
                interpretation_details::lang.eq(lang),
                interpretation_details::use_llm.eq(use_llm),
                interpretation_details::details.eq(Value::from(details.to_vec())),
                interpretation_details::created_at.eq(Utc::now()),
            ))
            .on_conflict((
                interpretation_details::reading_id,
                interpretation_details::lang,
                interpretation_details::use_llm,
            ))
            .do_update()
            .set(interpretation_details::details.eq(excluded(interpretation_details::details)))
            .execute(conn)?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn create_share_slug(&self, id: &str) -> Result<String> {
        let uuid = parse_id(id).ok_or_else(|| anyhow!("invalid reading id '{}'", id))?;
        let conn = &mut self.pool.get()?;

        if let Some(slug) = Self::existing_slug(conn, uuid)? {
            return Ok(slug);
        }

        for _ in 0..SLUG_ATTEMPTS {
            let slug = new_share_slug();
            let inserted = diesel::insert_into(share_links::table)
                .values((
                    share_links::slug.eq(&slug),
                    share_links::reading_id.eq(uuid),
                    share_links::created_at.eq(Utc::now()),
                ))
                .execute(conn);

            match inserted {
                Ok(_) => return Ok(slug),
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    // Either the slug collided or another request shared the reading first
                    if let Some(existing) = Self::existing_slug(conn, uuid)? {
                        return Ok(existing);
                    }
                    warn!("Share slug collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(anyhow!("could not allocate a share slug for reading {}", id))
    }

    fn resolve_share_slug(&self, slug: &str) -> Result<Option<String>> {
        let conn = &mut self.pool.get()?;
        let id = share_links::table
            .find(slug)
            .select(share_links::reading_id)
            .first::<Uuid>(conn)
            .optional()?;
        Ok(id.map(|id| id.to_string()))
    }
}

#[cfg(test)]
mod tests;
