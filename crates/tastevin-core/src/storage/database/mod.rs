mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{get_applied_versions, run_migrations, Migration};
pub use schema::{init_schema, SCHEMA_VERSION};

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::{AppConfig, DuplicateConfig, EventsConfig};
use crate::duplicates::{DetectionReport, DuplicateDetector, DuplicateRegistry};
use crate::error::{Result, TastevinError};
use crate::models::{
    AvailabilityResponse, DuplicateStatus, Event, Invitee, NewEvent, NewWine, Rating,
    RecapEntry, TimeOption, WineChanges, WineContribution, MAX_SCORE,
};
use crate::tokens::{TokenGenerator, UlidTokenGenerator};

use super::queries::EventRecapQuery;
use super::repositories::{
    EventRepository, InviteeRepository, RatingRepository, Repository,
    SqliteDuplicateFlagRepository, SqliteEventRepository, SqliteInviteeRepository,
    SqliteRatingRepository, SqliteWineRepository, WineRepository,
};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// Entry point for every event, invitee, wine and rating operation.
///
/// Wine writes run duplicate detection inside the same call while the
/// connection lock is held.
pub struct Database {
    pool: ConnectionPool,
    events: EventsConfig,
    detector: DuplicateDetector,
    tokens: Box<dyn TokenGenerator + Send + Sync>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_pool(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_pool(open_in_memory()?))
    }

    /// Open `<data_path>/tastevin.db` with the participant bounds and
    /// duplicate thresholds from `config`.
    pub fn with_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let db = Self::open(&config.database_path())?
            .with_events_config(config.events)
            .with_duplicate_config(config.duplicates);
        Ok(db)
    }

    fn from_pool(pool: ConnectionPool) -> Self {
        Self {
            pool,
            events: EventsConfig::default(),
            detector: DuplicateDetector::default(),
            tokens: Box::new(UlidTokenGenerator),
        }
    }

    pub fn with_events_config(mut self, events: EventsConfig) -> Self {
        self.events = events;
        self
    }

    pub fn with_duplicate_config(mut self, thresholds: DuplicateConfig) -> Self {
        self.detector = DuplicateDetector::with_thresholds(thresholds);
        self
    }

    pub fn with_token_generator(mut self, tokens: impl TokenGenerator + Send + Sync + 'static) -> Self {
        self.tokens = Box::new(tokens);
        self
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // ─── Events ────────────────────────────────────────────

    pub fn create_event(&self, new: NewEvent) -> Result<Event> {
        let title = required_text(&new.title, "event title")?;
        let created_by = required_text(&new.created_by, "event creator")?;

        let count = new.invitees.len();
        if count < self.events.min_participants || count > self.events.max_participants {
            return Err(TastevinError::ValidationError(format!(
                "an event needs between {} and {} invitees, got {count}",
                self.events.min_participants, self.events.max_participants
            )));
        }
        for option in &new.time_options {
            if option.end_time <= option.start_time {
                return Err(TastevinError::ValidationError(format!(
                    "time option starting {} must end after it starts",
                    option.start_time.to_rfc3339()
                )));
            }
        }
        let mut invitees = Vec::with_capacity(count);
        for guest in &new.invitees {
            let name = required_text(&guest.name, "invitee name")?;
            invitees.push((name, optional_text(guest.email.as_deref())));
        }

        let event = Event::new(title, created_by)
            .with_description_opt(optional_text(new.description.as_deref()));

        let conn = self.pool.get_connection();
        let tx = conn.unchecked_transaction()?;
        {
            let events = SqliteEventRepository::new(&tx);
            let guests = SqliteInviteeRepository::new(&tx);
            events.save(&event)?;
            for option in &new.time_options {
                events.save_time_option(&TimeOption {
                    id: Uuid::now_v7(),
                    event_id: event.id,
                    start_time: option.start_time,
                    end_time: option.end_time,
                })?;
            }
            for (name, email) in invitees {
                let invitee =
                    Invitee::new(event.id, name, self.tokens.generate()).with_email_opt(email);
                guests.save(&invitee)?;
            }
        }
        tx.commit()?;

        tracing::info!(
            event = %event.id,
            invitees = count,
            time_options = new.time_options.len(),
            "event created"
        );
        Ok(event)
    }

    pub fn get_event(&self, event_id: &Uuid) -> Result<Event> {
        let conn = self.pool.get_connection();
        require_event(&conn, event_id)
    }

    /// Newest first, optionally only those created by `created_by`.
    pub fn list_events(&self, created_by: Option<&str>) -> Result<Vec<Event>> {
        let conn = self.pool.get_connection();
        SqliteEventRepository::new(&conn).list(created_by)
    }

    pub fn list_time_options(&self, event_id: &Uuid) -> Result<Vec<TimeOption>> {
        let conn = self.pool.get_connection();
        require_event(&conn, event_id)?;
        SqliteEventRepository::new(&conn).list_time_options(event_id)
    }

    pub fn list_invitees(&self, event_id: &Uuid) -> Result<Vec<Invitee>> {
        let conn = self.pool.get_connection();
        require_event(&conn, event_id)?;
        SqliteInviteeRepository::new(&conn).list_by_event(event_id)
    }

    /// Lock in `time_option_id` as the event's date.
    pub fn finalize_event(&self, event_id: &Uuid, time_option_id: &Uuid) -> Result<Event> {
        let conn = self.pool.get_connection();
        let event = require_event(&conn, event_id)?;
        if event.finalized {
            return Err(TastevinError::EventFinalized(event_id.to_string()));
        }

        let events = SqliteEventRepository::new(&conn);
        let option = events
            .find_time_option(time_option_id)?
            .ok_or_else(|| TastevinError::TimeOptionNotFound(time_option_id.to_string()))?;
        if option.event_id != event.id {
            return Err(TastevinError::ValidationError(format!(
                "time option {time_option_id} belongs to another event"
            )));
        }

        events.finalize(event_id, time_option_id, Utc::now())?;
        tracing::info!(event = %event_id, time_option = %time_option_id, "event finalized");
        require_event(&conn, event_id)
    }

    /// Removes the event with its invitees, wines, flags and ratings.
    pub fn delete_event(&self, event_id: &Uuid) -> Result<()> {
        let conn = self.pool.get_connection();
        if !SqliteEventRepository::new(&conn).delete(event_id)? {
            return Err(TastevinError::EventNotFound(event_id.to_string()));
        }
        tracing::info!(event = %event_id, "event deleted");
        Ok(())
    }

    // ─── Invitees ──────────────────────────────────────────

    pub fn add_invitee(&self, event_id: &Uuid, name: &str, email: Option<&str>) -> Result<Invitee> {
        let name = required_text(name, "invitee name")?;

        let conn = self.pool.get_connection();
        let event = require_event(&conn, event_id)?;
        if event.finalized {
            return Err(TastevinError::EventFinalized(event_id.to_string()));
        }

        let guests = SqliteInviteeRepository::new(&conn);
        if guests.count_by_event(event_id)? >= self.events.max_participants {
            return Err(TastevinError::ValidationError(format!(
                "maximum of {} participants reached",
                self.events.max_participants
            )));
        }

        let invitee =
            Invitee::new(event.id, name, self.tokens.generate()).with_email_opt(optional_text(email));
        guests.save(&invitee)?;
        tracing::info!(event = %event_id, invitee = %invitee.id, "invitee added");
        Ok(invitee)
    }

    pub fn get_invitee(&self, invitee_id: &Uuid) -> Result<Invitee> {
        let conn = self.pool.get_connection();
        require_invitee(&conn, invitee_id)
    }

    pub fn invitee_by_token(&self, token: &str) -> Result<Invitee> {
        let conn = self.pool.get_connection();
        SqliteInviteeRepository::new(&conn)
            .find_by_token(token.trim())?
            .ok_or_else(|| TastevinError::InviteeNotFound(format!("token {}", token.trim())))
    }

    /// Replace the invitee's earlier answers with `responses`.
    pub fn submit_availability(
        &self,
        invitee_id: &Uuid,
        responses: &[AvailabilityResponse],
    ) -> Result<Invitee> {
        let conn = self.pool.get_connection();
        let guests = SqliteInviteeRepository::new(&conn);
        let invitee = require_invitee(&conn, invitee_id)?;
        let event = require_event(&conn, &invitee.event_id)?;
        if event.finalized {
            return Err(TastevinError::EventFinalized(event.id.to_string()));
        }

        let events = SqliteEventRepository::new(&conn);
        let mut seen = HashSet::new();
        for response in responses {
            if !seen.insert(response.time_option_id) {
                return Err(TastevinError::ValidationError(format!(
                    "time option {} answered twice",
                    response.time_option_id
                )));
            }
            let option = events.find_time_option(&response.time_option_id)?.ok_or_else(|| {
                TastevinError::TimeOptionNotFound(response.time_option_id.to_string())
            })?;
            if option.event_id != event.id {
                return Err(TastevinError::ValidationError(format!(
                    "time option {} belongs to another event",
                    option.id
                )));
            }
        }

        guests.replace_availability(invitee_id, responses, Utc::now())?;
        tracing::info!(invitee = %invitee_id, responses = responses.len(), "availability recorded");
        require_invitee(&conn, invitee_id)
    }

    pub fn list_availability(&self, invitee_id: &Uuid) -> Result<Vec<AvailabilityResponse>> {
        let conn = self.pool.get_connection();
        require_invitee(&conn, invitee_id)?;
        SqliteInviteeRepository::new(&conn).list_availability(invitee_id)
    }

    // ─── Wines ─────────────────────────────────────────────

    /// Validate and store a contribution, then flag any likely duplicates
    /// among the other wines of its event.
    pub fn create_wine(&self, new: NewWine) -> Result<WineContribution> {
        let conn = self.pool.get_connection();
        let event = require_event(&conn, &new.event_id)?;
        if event.finalized {
            return Err(TastevinError::EventFinalized(event.id.to_string()));
        }
        let invitee = require_invitee(&conn, &new.invitee_id)?;
        if invitee.event_id != event.id {
            return Err(TastevinError::ValidationError(format!(
                "invitee {} is not part of event {}",
                invitee.id, event.id
            )));
        }

        let wine = new.into_contribution()?;
        SqliteWineRepository::new(&conn).create(&wine)?;
        tracing::info!(event = %wine.event_id, wine = %wine.id, label = %wine.label(), "wine added");

        self.detect_after_write(&conn, &wine.id);
        Ok(wine)
    }

    /// Apply `changes`, then re-evaluate the wine from scratch: its old
    /// flags are dropped before the write and detection runs on the new
    /// attributes.
    pub fn update_wine(&self, wine_id: &Uuid, changes: WineChanges) -> Result<WineContribution> {
        let conn = self.pool.get_connection();
        let wines = SqliteWineRepository::new(&conn);
        let mut wine = wines
            .find_by_id(wine_id)?
            .ok_or_else(|| TastevinError::WineNotFound(wine_id.to_string()))?;
        if changes.is_empty() {
            return Ok(wine);
        }
        if require_event(&conn, &wine.event_id)?.finalized {
            return Err(TastevinError::EventFinalized(wine.event_id.to_string()));
        }
        wine.apply(changes)?;

        let flags = SqliteDuplicateFlagRepository::new(&conn);
        let cleared = match DuplicateRegistry::new(&flags).clear_flags_for_wine(wine_id) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(wine = %wine_id, error = %e, "could not clear duplicate flags; skipping detection");
                false
            }
        };

        wines.update(&wine)?;
        tracing::info!(wine = %wine.id, label = %wine.label(), "wine updated");

        if cleared {
            self.detect_after_write(&conn, &wine.id);
        }
        Ok(wine)
    }

    /// Removes the wine together with its flags and ratings.
    pub fn delete_wine(&self, wine_id: &Uuid) -> Result<()> {
        let conn = self.pool.get_connection();
        if !SqliteWineRepository::new(&conn).delete(wine_id)? {
            return Err(TastevinError::WineNotFound(wine_id.to_string()));
        }
        tracing::info!(wine = %wine_id, "wine deleted");
        Ok(())
    }

    pub fn get_wine(&self, wine_id: &Uuid) -> Result<WineContribution> {
        let conn = self.pool.get_connection();
        SqliteWineRepository::new(&conn)
            .find_by_id(wine_id)?
            .ok_or_else(|| TastevinError::WineNotFound(wine_id.to_string()))
    }

    pub fn list_wines(&self, event_id: &Uuid) -> Result<Vec<WineContribution>> {
        let conn = self.pool.get_connection();
        require_event(&conn, event_id)?;
        SqliteWineRepository::new(&conn).find_all_by_event(event_id, None)
    }

    pub fn duplicate_status(&self, wine_id: &Uuid) -> Result<DuplicateStatus> {
        let conn = self.pool.get_connection();
        if SqliteWineRepository::new(&conn).find_by_id(wine_id)?.is_none() {
            return Err(TastevinError::WineNotFound(wine_id.to_string()));
        }
        let flags = SqliteDuplicateFlagRepository::new(&conn);
        DuplicateRegistry::new(&flags).status(wine_id)
    }

    /// Re-run detection for one wine on request. Existing flags are kept and
    /// refreshed; errors are returned to the caller.
    pub fn detect_duplicates(&self, wine_id: &Uuid) -> Result<DetectionReport> {
        let conn = self.pool.get_connection();
        let wines = SqliteWineRepository::new(&conn);
        if wines.find_by_id(wine_id)?.is_none() {
            return Err(TastevinError::WineNotFound(wine_id.to_string()));
        }
        let flags = SqliteDuplicateFlagRepository::new(&conn);
        self.detector.detect(&wines, &flags, wine_id)
    }

    fn detect_after_write(&self, conn: &Connection, wine_id: &Uuid) {
        let wines = SqliteWineRepository::new(conn);
        let flags = SqliteDuplicateFlagRepository::new(conn);
        match self.detector.detect(&wines, &flags, wine_id) {
            Ok(report) if !report.flags.is_empty() => {
                tracing::info!(
                    wine = %wine_id,
                    compared = report.compared,
                    flagged = report.flags.len(),
                    "possible duplicate wines flagged"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(wine = %wine_id, error = %e, "duplicate detection failed");
            }
        }
    }

    // ─── Ratings ───────────────────────────────────────────

    /// Record or replace `invitee_id`'s score for `wine_id`.
    pub fn submit_rating(
        &self,
        wine_id: &Uuid,
        invitee_id: &Uuid,
        score: u8,
        notes: Option<&str>,
    ) -> Result<Rating> {
        if score > MAX_SCORE {
            return Err(TastevinError::ValidationError(format!(
                "score must be between 0 and {MAX_SCORE}, got {score}"
            )));
        }

        let conn = self.pool.get_connection();
        let wine = SqliteWineRepository::new(&conn)
            .find_by_id(wine_id)?
            .ok_or_else(|| TastevinError::WineNotFound(wine_id.to_string()))?;
        let invitee = require_invitee(&conn, invitee_id)?;
        if invitee.event_id != wine.event_id {
            return Err(TastevinError::ValidationError(format!(
                "invitee {invitee_id} did not attend the event of wine {wine_id}"
            )));
        }

        let notes = optional_text(notes);
        let rating = SqliteRatingRepository::new(&conn).upsert_by_pair(
            wine_id,
            invitee_id,
            score,
            notes.as_deref(),
        )?;
        tracing::info!(wine = %wine_id, invitee = %invitee_id, score, "rating recorded");
        Ok(rating)
    }

    pub fn list_ratings(&self, wine_id: &Uuid) -> Result<Vec<Rating>> {
        let conn = self.pool.get_connection();
        SqliteRatingRepository::new(&conn).list_by_wine(wine_id)
    }

    pub fn event_recap(&self, event_id: &Uuid) -> Result<Vec<RecapEntry>> {
        let conn = self.pool.get_connection();
        require_event(&conn, event_id)?;
        EventRecapQuery::new(&conn).ranked(event_id)
    }
}

fn require_event(conn: &Connection, event_id: &Uuid) -> Result<Event> {
    SqliteEventRepository::new(conn)
        .find_by_id(event_id)?
        .ok_or_else(|| TastevinError::EventNotFound(event_id.to_string()))
}

fn require_invitee(conn: &Connection, invitee_id: &Uuid) -> Result<Invitee> {
    SqliteInviteeRepository::new(conn)
        .find_by_id(invitee_id)?
        .ok_or_else(|| TastevinError::InviteeNotFound(invitee_id.to_string()))
}

fn required_text(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TastevinError::ValidationError(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, FlaggedBy, NewInvitee, NewTimeOption, WineType};
    use chrono::Duration;
    use tempfile::TempDir;

    fn new_event(guests: &[&str]) -> NewEvent {
        let start = Utc::now() + Duration::days(7);
        NewEvent {
            title: "Bordeaux night".to_string(),
            description: None,
            created_by: "host@example.com".to_string(),
            time_options: vec![
                NewTimeOption {
                    start_time: start,
                    end_time: start + Duration::hours(3),
                },
                NewTimeOption {
                    start_time: start + Duration::days(1),
                    end_time: start + Duration::days(1) + Duration::hours(3),
                },
            ],
            invitees: guests.iter().map(|name| NewInvitee::new(*name)).collect(),
        }
    }

    fn seeded(db: &Database) -> (Event, Vec<Invitee>) {
        let event = db.create_event(new_event(&["Ana", "Bo", "Cy"])).unwrap();
        let invitees = db.list_invitees(&event.id).unwrap();
        (event, invitees)
    }

    fn margaux(event: &Event, invitee: &Invitee) -> NewWine {
        let mut wine = NewWine::new(event.id, invitee.id, WineType::Red);
        wine.producer = Some("Château Margaux".to_string());
        wine.varietal = Some("Cabernet Sauvignon".to_string());
        wine.vintage = Some(2015);
        wine.region = Some("Bordeaux".to_string());
        wine
    }

    fn flag_count(db: &Database) -> i64 {
        db.pool()
            .get_connection()
            .query_row("SELECT COUNT(*) FROM duplicate_flags", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_create_event_issues_distinct_tokens() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);

        assert_eq!(event.title, "Bordeaux night");
        assert_eq!(invitees.len(), 3);
        assert_eq!(db.list_time_options(&event.id).unwrap().len(), 2);

        let tokens: HashSet<_> = invitees.iter().map(|i| i.token.clone()).collect();
        assert_eq!(tokens.len(), 3);

        let found = db.invitee_by_token(&invitees[1].token).unwrap();
        assert_eq!(found.id, invitees[1].id);
        assert!(db.invitee_by_token("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_custom_token_generator() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Sequential(AtomicUsize);
        impl TokenGenerator for Sequential {
            fn generate(&self) -> String {
                format!("guest-{}", self.0.fetch_add(1, Ordering::SeqCst))
            }
        }

        let db = Database::open_in_memory()
            .unwrap()
            .with_token_generator(Sequential(AtomicUsize::new(1)));
        let (event, _) = seeded(&db);
        let added = db.add_invitee(&event.id, "Dee", None).unwrap();

        assert_eq!(added.token, "guest-4");
        assert_eq!(db.invitee_by_token(" guest-2 ").unwrap().name, "Bo");
    }

    #[test]
    fn test_create_event_enforces_participant_bounds() {
        let db = Database::open_in_memory().unwrap();

        let too_few = db.create_event(new_event(&["Ana"]));
        assert!(matches!(too_few, Err(TastevinError::ValidationError(_))));

        let crowd = ["a", "b", "c", "d", "e", "f", "g", "h", "i"];
        let too_many = db.create_event(new_event(&crowd));
        assert!(matches!(too_many, Err(TastevinError::ValidationError(_))));

        assert!(db.create_event(new_event(&crowd[..8])).is_ok());
        assert_eq!(db.list_events(None).unwrap().len(), 1);
    }

    #[test]
    fn test_create_event_rejects_bad_input() {
        let db = Database::open_in_memory().unwrap();

        let mut blank = new_event(&["Ana", "Bo"]);
        blank.title = "   ".to_string();
        assert!(matches!(db.create_event(blank), Err(TastevinError::ValidationError(_))));

        let mut backwards = new_event(&["Ana", "Bo"]);
        backwards.time_options[0].end_time = backwards.time_options[0].start_time;
        assert!(matches!(db.create_event(backwards), Err(TastevinError::ValidationError(_))));

        assert!(db.list_events(None).unwrap().is_empty());
    }

    #[test]
    fn test_add_invitee_respects_cap_and_finalization() {
        let db = Database::open_in_memory()
            .unwrap()
            .with_events_config(EventsConfig {
                min_participants: 2,
                max_participants: 4,
            });
        let (event, _) = seeded(&db);

        db.add_invitee(&event.id, "Dee", Some("dee@example.com")).unwrap();
        let full = db.add_invitee(&event.id, "Eve", None);
        assert!(matches!(full, Err(TastevinError::ValidationError(_))));

        let other = db.create_event(new_event(&["X", "Y"])).unwrap();
        db.finalize_event(&other.id, &db.list_time_options(&other.id).unwrap()[0].id)
            .unwrap();
        let late = db.add_invitee(&other.id, "Zed", None);
        assert!(matches!(late, Err(TastevinError::EventFinalized(_))));

        assert!(db.add_invitee(&Uuid::now_v7(), "Ghost", None).unwrap_err().is_not_found());
        assert_eq!(db.list_invitees(&event.id).unwrap().len(), 4);
    }

    #[test]
    fn test_finalize_event_checks_time_option_ownership() {
        let db = Database::open_in_memory().unwrap();
        let (event, _) = seeded(&db);
        let (other, _) = seeded(&db);
        let foreign = db.list_time_options(&other.id).unwrap().remove(0);

        let wrong = db.finalize_event(&event.id, &foreign.id);
        assert!(matches!(wrong, Err(TastevinError::ValidationError(_))));

        let option = db.list_time_options(&event.id).unwrap().remove(1);
        let finalized = db.finalize_event(&event.id, &option.id).unwrap();
        assert!(finalized.finalized);
        assert!(finalized.finalized_at.is_some());
        assert_eq!(finalized.selected_time_option_id, Some(option.id));

        let again = db.finalize_event(&event.id, &option.id);
        assert!(matches!(again, Err(TastevinError::EventFinalized(_))));
    }

    #[test]
    fn test_submit_availability_replaces_previous_answers() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);
        let options = db.list_time_options(&event.id).unwrap();
        let guest = &invitees[0];
        assert!(guest.responded_at.is_none());

        let first = [
            AvailabilityResponse { time_option_id: options[0].id, available: true },
            AvailabilityResponse { time_option_id: options[1].id, available: false },
        ];
        let updated = db.submit_availability(&guest.id, &first).unwrap();
        assert!(updated.responded_at.is_some());

        let second = [AvailabilityResponse { time_option_id: options[1].id, available: true }];
        db.submit_availability(&guest.id, &second).unwrap();
        assert_eq!(db.list_availability(&guest.id).unwrap(), second.to_vec());

        let (other, _) = seeded(&db);
        let foreign = db.list_time_options(&other.id).unwrap()[0].id;
        let stray = [AvailabilityResponse { time_option_id: foreign, available: true }];
        assert!(matches!(
            db.submit_availability(&guest.id, &stray),
            Err(TastevinError::ValidationError(_))
        ));
        assert_eq!(db.list_availability(&guest.id).unwrap(), second.to_vec());
    }

    #[test]
    fn test_identical_wines_flag_later_one_as_original() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);

        let a = db.create_wine(margaux(&event, &invitees[0])).unwrap();
        assert_eq!(flag_count(&db), 0);
        let b = db.create_wine(margaux(&event, &invitees[1])).unwrap();

        let status_b = db.duplicate_status(&b.id).unwrap();
        assert_eq!(status_b.duplicate_flags.len(), 1);
        let flag = &status_b.duplicate_flags[0];
        assert_eq!(flag.original_wine_id, b.id);
        assert_eq!(flag.duplicate_wine_id, a.id);
        assert_eq!(flag.confidence, Confidence::High);
        assert_eq!(flag.flagged_by, FlaggedBy::System);

        let status_a = db.duplicate_status(&a.id).unwrap();
        assert!(status_a.duplicate_flags.is_empty());
        assert_eq!(status_a.flagged_as.len(), 1);
        assert!(status_a.is_possible_duplicate());
    }

    #[test]
    fn test_producer_mismatch_lands_in_low_band() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);

        let a = db.create_wine(margaux(&event, &invitees[0])).unwrap();
        let mut penfolds = margaux(&event, &invitees[2]);
        penfolds.producer = Some("Penfolds".to_string());
        let c = db.create_wine(penfolds).unwrap();

        let status = db.duplicate_status(&c.id).unwrap();
        assert_eq!(status.duplicate_flags.len(), 1);
        assert_eq!(status.duplicate_flags[0].duplicate_wine_id, a.id);
        assert_eq!(status.highest_confidence(), Some(Confidence::Low));
    }

    #[test]
    fn test_edit_that_breaks_match_leaves_no_stale_flags() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);

        let a = db.create_wine(margaux(&event, &invitees[0])).unwrap();
        let b = db.create_wine(margaux(&event, &invitees[1])).unwrap();
        assert_eq!(flag_count(&db), 1);

        let changes = WineChanges {
            producer: Some(Some("Penfolds".to_string())),
            varietal: Some(Some("Shiraz".to_string())),
            ..Default::default()
        };
        let edited = db.update_wine(&b.id, changes).unwrap();
        assert_eq!(edited.producer.as_deref(), Some("Penfolds"));

        assert_eq!(flag_count(&db), 0);
        assert!(!db.duplicate_status(&a.id).unwrap().is_possible_duplicate());
        assert!(!db.duplicate_status(&b.id).unwrap().is_possible_duplicate());
    }

    #[test]
    fn test_edit_into_match_creates_flag() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);

        let a = db.create_wine(margaux(&event, &invitees[0])).unwrap();
        let bubbles = NewWine::new(event.id, invitees[1].id, WineType::Sparkling);
        let b = db.create_wine(bubbles).unwrap();
        assert_eq!(flag_count(&db), 0);

        let changes = WineChanges {
            wine_type: Some(WineType::Red),
            producer: Some(Some("CHÂTEAU MARGAUX".to_string())),
            ..Default::default()
        };
        db.update_wine(&b.id, changes).unwrap();

        let status = db.duplicate_status(&b.id).unwrap();
        assert_eq!(status.duplicate_flags.len(), 1);
        assert_eq!(status.duplicate_flags[0].duplicate_wine_id, a.id);
    }

    #[test]
    fn test_update_after_finalize_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);
        let a = db.create_wine(margaux(&event, &invitees[0])).unwrap();
        let option = db.list_time_options(&event.id).unwrap()[0].id;
        db.finalize_event(&event.id, &option).unwrap();

        let changes = WineChanges {
            producer: Some(Some("Penfolds".to_string())),
            ..Default::default()
        };
        let result = db.update_wine(&a.id, changes);

        assert!(matches!(result, Err(TastevinError::EventFinalized(_))));
        assert_eq!(db.get_wine(&a.id).unwrap().producer.as_deref(), Some("Château Margaux"));
    }

    #[test]
    fn test_detection_failure_does_not_fail_wine_writes() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);
        db.pool()
            .get_connection()
            .execute_batch(
                "CREATE TRIGGER reject_flags BEFORE INSERT ON duplicate_flags
                 BEGIN SELECT RAISE(ABORT, 'flag store unavailable'); END;",
            )
            .unwrap();

        let a = db.create_wine(margaux(&event, &invitees[0])).unwrap();
        let b = db.create_wine(margaux(&event, &invitees[1])).unwrap();
        assert_eq!(flag_count(&db), 0);

        let changes = WineChanges {
            vintage: Some(Some(2016)),
            ..Default::default()
        };
        let edited = db.update_wine(&a.id, changes).unwrap();

        assert_eq!(edited.vintage, Some(2016));
        assert_eq!(db.get_wine(&a.id).unwrap().vintage, Some(2016));
        assert_eq!(db.list_wines(&event.id).unwrap().len(), 2);
        assert_eq!(flag_count(&db), 0);
        assert!(db.detect_duplicates(&b.id).is_err());
    }

    #[test]
    fn test_invalid_update_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);
        db.create_wine(margaux(&event, &invitees[0])).unwrap();
        let b = db.create_wine(margaux(&event, &invitees[1])).unwrap();

        let changes = WineChanges {
            vintage: Some(Some(1700)),
            ..Default::default()
        };
        let result = db.update_wine(&b.id, changes);
        assert!(matches!(result, Err(TastevinError::ValidationError(_))));
        assert_eq!(db.get_wine(&b.id).unwrap().vintage, Some(2015));
        assert_eq!(flag_count(&db), 1);
    }

    #[test]
    fn test_wines_in_other_events_are_never_compared() {
        let db = Database::open_in_memory().unwrap();
        let (first, first_guests) = seeded(&db);
        let (second, second_guests) = seeded(&db);

        db.create_wine(margaux(&first, &first_guests[0])).unwrap();
        let lone = db.create_wine(margaux(&second, &second_guests[0])).unwrap();

        assert_eq!(flag_count(&db), 0);
        let report = db.detect_duplicates(&lone.id).unwrap();
        assert_eq!(report.compared, 0);
    }

    #[test]
    fn test_create_wine_validates_event_and_invitee() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);
        let (_, strangers) = seeded(&db);

        let outsider = db.create_wine(margaux(&event, &strangers[0]));
        assert!(matches!(outsider, Err(TastevinError::ValidationError(_))));

        let mut ancient = margaux(&event, &invitees[0]);
        ancient.vintage = Some(1700);
        assert!(matches!(db.create_wine(ancient), Err(TastevinError::ValidationError(_))));

        let mut free = margaux(&event, &invitees[0]);
        free.price = Some(-1.0);
        assert!(matches!(db.create_wine(free), Err(TastevinError::ValidationError(_))));

        assert!(db.list_wines(&event.id).unwrap().is_empty());

        let option = db.list_time_options(&event.id).unwrap()[0].id;
        db.finalize_event(&event.id, &option).unwrap();
        let late = db.create_wine(margaux(&event, &invitees[0]));
        assert!(matches!(late, Err(TastevinError::EventFinalized(_))));
    }

    #[test]
    fn test_blank_text_is_stored_as_absent() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);

        let mut wine = NewWine::new(event.id, invitees[0].id, WineType::White);
        wine.producer = Some("   ".to_string());
        wine.region = Some("  Mosel ".to_string());
        let stored = db.create_wine(wine).unwrap();

        let fetched = db.get_wine(&stored.id).unwrap();
        assert_eq!(fetched.producer, None);
        assert_eq!(fetched.region.as_deref(), Some("Mosel"));
    }

    #[test]
    fn test_delete_wine_drops_flags_and_ratings() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);
        let a = db.create_wine(margaux(&event, &invitees[0])).unwrap();
        let b = db.create_wine(margaux(&event, &invitees[1])).unwrap();
        db.submit_rating(&b.id, &invitees[2].id, 88, None).unwrap();
        assert_eq!(flag_count(&db), 1);

        db.delete_wine(&b.id).unwrap();

        assert_eq!(flag_count(&db), 0);
        assert!(db.list_ratings(&b.id).unwrap().is_empty());
        assert!(!db.duplicate_status(&a.id).unwrap().is_possible_duplicate());
        assert!(db.get_wine(&b.id).unwrap_err().is_not_found());
        assert!(db.delete_wine(&b.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_manual_detection_requires_existing_wine() {
        let db = Database::open_in_memory().unwrap();
        let err = db.detect_duplicates(&Uuid::now_v7()).unwrap_err();
        assert!(matches!(err, TastevinError::WineNotFound(_)));
    }

    #[test]
    fn test_submit_rating_upserts_and_validates() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);
        let (_, strangers) = seeded(&db);
        let wine = db.create_wine(margaux(&event, &invitees[0])).unwrap();

        let too_high = db.submit_rating(&wine.id, &invitees[1].id, 101, None);
        assert!(matches!(too_high, Err(TastevinError::ValidationError(_))));

        let outsider = db.submit_rating(&wine.id, &strangers[0].id, 50, None);
        assert!(matches!(outsider, Err(TastevinError::ValidationError(_))));

        let first = db.submit_rating(&wine.id, &invitees[1].id, 60, Some("tight")).unwrap();
        let second = db.submit_rating(&wine.id, &invitees[1].id, 95, Some("  opened up ")).unwrap();
        assert_eq!(first.id, second.id);

        let ratings = db.list_ratings(&wine.id).unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].score, 95);
        assert_eq!(ratings[0].notes.as_deref(), Some("opened up"));
    }

    #[test]
    fn test_event_recap_ranks_by_average() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);

        let mut riesling = NewWine::new(event.id, invitees[0].id, WineType::White);
        riesling.producer = Some("Egon Müller".to_string());
        let riesling = db.create_wine(riesling).unwrap();
        let mut port = NewWine::new(event.id, invitees[1].id, WineType::Dessert);
        port.producer = Some("Taylor's".to_string());
        let port = db.create_wine(port).unwrap();
        let mut cava = NewWine::new(event.id, invitees[2].id, WineType::Sparkling);
        cava.producer = Some("Raventós".to_string());
        let cava = db.create_wine(cava).unwrap();

        db.submit_rating(&riesling.id, &invitees[1].id, 70, None).unwrap();
        db.submit_rating(&riesling.id, &invitees[2].id, 80, None).unwrap();
        db.submit_rating(&port.id, &invitees[0].id, 92, None).unwrap();

        let recap = db.event_recap(&event.id).unwrap();
        assert_eq!(recap.len(), 3);

        assert_eq!(recap[0].rank, 1);
        assert_eq!(recap[0].wine.id, port.id);
        assert_eq!(recap[0].contributor, "Bo");
        assert_eq!(recap[0].average_score, Some(92.0));

        assert_eq!(recap[1].wine.id, riesling.id);
        assert_eq!(recap[1].average_score, Some(75.0));
        assert_eq!(recap[1].rating_count, 2);

        assert_eq!(recap[2].rank, 3);
        assert_eq!(recap[2].wine.id, cava.id);
        assert_eq!(recap[2].average_score, None);
        assert_eq!(recap[2].rating_count, 0);
    }

    #[test]
    fn test_delete_event_cascades() {
        let db = Database::open_in_memory().unwrap();
        let (event, invitees) = seeded(&db);
        let a = db.create_wine(margaux(&event, &invitees[0])).unwrap();
        db.create_wine(margaux(&event, &invitees[1])).unwrap();

        db.delete_event(&event.id).unwrap();

        assert!(db.get_event(&event.id).unwrap_err().is_not_found());
        assert!(db.get_wine(&a.id).unwrap_err().is_not_found());
        assert_eq!(flag_count(&db), 0);
        assert!(db.invitee_by_token(&invitees[0].token).is_err());
    }

    #[test]
    fn test_with_config_applies_thresholds() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.set_data_path(dir.path().join("data"));
        config.duplicates.duplicate_threshold = 80.0;

        let db = Database::with_config(&config).unwrap();
        assert!(config.database_path().exists());

        let (event, invitees) = seeded(&db);
        db.create_wine(margaux(&event, &invitees[0])).unwrap();
        let mut penfolds = margaux(&event, &invitees[1]);
        penfolds.producer = Some("Penfolds".to_string());
        db.create_wine(penfolds).unwrap();

        assert_eq!(flag_count(&db), 0);
    }

    #[test]
    fn test_with_config_rejects_invalid_thresholds() {
        let mut config = AppConfig::default();
        config.duplicates.medium_confidence = 95.0;
        assert!(matches!(
            Database::with_config(&config),
            Err(TastevinError::ConfigError(_))
        ));
    }
}
