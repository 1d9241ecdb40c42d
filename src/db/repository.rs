//! Repository over the stored collections.
//!
//! Every mutation reads the collections it needs, applies the change in memory
//! and writes them back inside one transaction.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::store::{bump_revision, keys, read_collection, read_key, write_key};
use crate::errors::AppError;
use crate::models::{
    find_station, stations_from_catalog, Bicycle, CreateBicycleRequest, CreateUserRequest,
    DashboardStats, Datastore, Rental, RentalQuery, RentalStatus, ReturnReceipt,
    ReturnRentalRequest, RevisionInfo, Slot, SlotStatus, StartRentalRequest, Station,
    UpdateUserRequest, User,
};
use crate::rentals::{self, Ledger};
use crate::slots::{self, SLOTS_PER_STATION};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Get the full datastore snapshot.
    pub async fn get_datastore(&self) -> Result<Datastore, AppError> {
        let mut conn = self.pool.acquire().await?;
        let meta =
            sqlx::query("SELECT schema_version, revision_id, generated_at FROM meta WHERE id = 1")
                .fetch_one(&mut *conn)
                .await?;

        let ledger = Ledger::new(read_collection(&mut *conn, keys::RENTALS).await?);
        let users: Vec<User> = read_collection(&mut *conn, keys::USERS).await?;
        let bicycles: Vec<Bicycle> = read_collection(&mut *conn, keys::BICYCLES).await?;

        Ok(Datastore {
            schema_version: meta.get("schema_version"),
            revision_id: meta.get("revision_id"),
            generated_at: meta.get("generated_at"),
            users: users.into_iter().map(|u| ledger.with_credits(u)).collect(),
            stations: stations_from_catalog(&bicycles),
            rentals: ledger.into_rentals(),
        })
    }

    // ==================== USER OPERATIONS ====================

    /// List all users with their derived credits.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let ledger = Ledger::new(read_collection(&mut *conn, keys::RENTALS).await?);
        let users: Vec<User> = read_collection(&mut *conn, keys::USERS).await?;
        Ok(users.into_iter().map(|u| ledger.with_credits(u)).collect())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let ledger = Ledger::new(read_collection(&mut *conn, keys::RENTALS).await?);
        let users: Vec<User> = read_collection(&mut *conn, keys::USERS).await?;
        Ok(users
            .into_iter()
            .find(|u| u.id == id)
            .map(|u| ledger.with_credits(u)))
    }

    /// Create a new user. Email addresses are unique.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut users: Vec<User> = read_collection(&mut *tx, keys::USERS).await?;

        if users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&request.email))
        {
            return Err(AppError::Validation(format!(
                "Email {} is already registered",
                request.email
            )));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            mobile: request.mobile.clone(),
            role: request.role,
            initial_credits: request.initial_credits,
            credits: request.initial_credits,
        };
        users.push(user.clone());

        write_key(&mut *tx, keys::USERS, &users).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        Ok(user)
    }

    /// Update profile fields or the starting balance of a user.
    pub async fn update_user(&self, id: &str, request: &UpdateUserRequest) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut users: Vec<User> = read_collection(&mut *tx, keys::USERS).await?;
        let ledger = Ledger::new(read_collection(&mut *tx, keys::RENTALS).await?);

        if let Some(email) = &request.email {
            if users
                .iter()
                .any(|u| u.id != id && u.email.eq_ignore_ascii_case(email))
            {
                return Err(AppError::Validation(format!(
                    "Email {} is already registered",
                    email
                )));
            }
        }

        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        if let Some(name) = &request.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = &request.email {
            user.email = email.trim().to_string();
        }
        if request.mobile.is_some() {
            user.mobile = request.mobile.clone();
        }
        if let Some(role) = request.role {
            user.role = role;
        }
        if let Some(initial_credits) = request.initial_credits {
            user.initial_credits = initial_credits;
        }
        let user = ledger.with_credits(user.clone());

        write_key(&mut *tx, keys::USERS, &users).await?;
        refresh_session(&mut *tx, &user).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        Ok(user)
    }

    // ==================== SESSION OPERATIONS ====================

    /// The signed-in user snapshot, with credits recomputed.
    pub async fn get_session(&self) -> Result<Option<User>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let Some(snapshot) = read_key::<User>(&mut *conn, keys::CURRENT_USER).await? else {
            return Ok(None);
        };
        let ledger = Ledger::new(read_collection(&mut *conn, keys::RENTALS).await?);
        Ok(Some(ledger.with_credits(snapshot)))
    }

    /// Make `user_id` the signed-in user.
    pub async fn set_session(&self, user_id: &str) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;
        let users: Vec<User> = read_collection(&mut *tx, keys::USERS).await?;
        let ledger = Ledger::new(read_collection(&mut *tx, keys::RENTALS).await?);

        let user = users
            .into_iter()
            .find(|u| u.id == user_id)
            .map(|u| ledger.with_credits(u))
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        write_key(&mut *tx, keys::CURRENT_USER, &user).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        Ok(user)
    }

    // ==================== CATALOG OPERATIONS ====================

    pub async fn list_bicycles(&self) -> Result<Vec<Bicycle>, AppError> {
        let mut conn = self.pool.acquire().await?;
        read_collection(&mut *conn, keys::BICYCLES).await
    }

    /// Add a bicycle record; a new name/location pair creates a station.
    pub async fn create_bicycle(&self, request: &CreateBicycleRequest) -> Result<Bicycle, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut bicycles: Vec<Bicycle> = read_collection(&mut *tx, keys::BICYCLES).await?;

        let bicycle = Bicycle {
            id: uuid::Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            location: request.location.trim().to_string(),
            hourly_rate: request.hourly_rate,
            daily_rate: request.daily_rate,
            status: request.status,
        };
        bicycles.push(bicycle.clone());

        write_key(&mut *tx, keys::BICYCLES, &bicycles).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        Ok(bicycle)
    }

    /// Remove a bicycle record. The station's slot registry is kept.
    pub async fn delete_bicycle(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let mut bicycles: Vec<Bicycle> = read_collection(&mut *tx, keys::BICYCLES).await?;

        let before = bicycles.len();
        bicycles.retain(|b| b.id != id);
        if bicycles.len() == before {
            return Err(AppError::NotFound(format!("Bicycle {} not found", id)));
        }

        write_key(&mut *tx, keys::BICYCLES, &bicycles).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_stations(&self) -> Result<Vec<Station>, AppError> {
        Ok(stations_from_catalog(&self.list_bicycles().await?))
    }

    pub async fn get_station(&self, key: &str) -> Result<Option<Station>, AppError> {
        Ok(find_station(&self.list_bicycles().await?, key))
    }

    // ==================== SLOT OPERATIONS ====================

    /// The station's slots, creating or completing the registry as needed.
    pub async fn get_or_create_slots(&self, station_key: &str) -> Result<Vec<Slot>, AppError> {
        let mut tx = self.pool.begin().await?;
        let (slots, changed) = load_slots(&mut *tx, station_key, Utc::now()).await?;

        if changed {
            write_key(&mut *tx, &keys::slots(station_key), &slots).await?;
            bump_revision(&mut *tx).await?;
            tracing::info!(station = station_key, "Initialized slot registry");
        }
        tx.commit().await?;

        Ok(slots)
    }

    /// Set one slot's status and notes by hand.
    pub async fn set_slot_status(
        &self,
        station_key: &str,
        slot_id: &str,
        status: SlotStatus,
        notes: &str,
    ) -> Result<Vec<Slot>, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let (mut slots, _) = load_slots(&mut *tx, station_key, now).await?;

        slots::set_slot_status(&mut slots, slot_id, status, notes, now)?;

        write_key(&mut *tx, &keys::slots(station_key), &slots).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        Ok(slots)
    }

    /// Discard the station's slot state and regenerate the default layout.
    pub async fn reset_slots(&self, station_key: &str, count: Option<u32>) -> Result<Vec<Slot>, AppError> {
        let slots = slots::reset_to_fixed_count(count.unwrap_or(SLOTS_PER_STATION), Utc::now())?;

        let mut tx = self.pool.begin().await?;
        write_key(&mut *tx, &keys::slots(station_key), &slots).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(station = station_key, "Slot registry reset");
        Ok(slots)
    }

    // ==================== RENTAL OPERATIONS ====================

    pub async fn list_rentals(&self, query: &RentalQuery) -> Result<Vec<Rental>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let rentals: Vec<Rental> = read_collection(&mut *conn, keys::RENTALS).await?;
        Ok(rentals
            .into_iter()
            .filter(|r| query.user_id.as_deref().map_or(true, |id| r.user_id == id))
            .filter(|r| query.status.map_or(true, |status| r.status == status))
            .collect())
    }

    pub async fn get_rental(&self, id: &str) -> Result<Option<Rental>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let ledger = Ledger::new(read_collection(&mut *conn, keys::RENTALS).await?);
        Ok(ledger.find(id).cloned())
    }

    /// Start a rental at `now`.
    pub async fn start_rental(
        &self,
        request: &StartRentalRequest,
        now: DateTime<Utc>,
    ) -> Result<Rental, AppError> {
        let mut tx = self.pool.begin().await?;

        let users: Vec<User> = read_collection(&mut *tx, keys::USERS).await?;
        let user = users
            .into_iter()
            .find(|u| u.id == request.user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", request.user_id)))?;

        let bicycles: Vec<Bicycle> = read_collection(&mut *tx, keys::BICYCLES).await?;
        let station = find_station(&bicycles, &request.station)
            .ok_or_else(|| AppError::NotFound(format!("Station {} not found", request.station)))?;

        let mut ledger = Ledger::new(read_collection(&mut *tx, keys::RENTALS).await?);
        let (mut slots, _) = load_slots(&mut *tx, &station.key, now).await?;

        let rental =
            rentals::start_rental(&mut ledger, &mut slots, &user, &station, request, now)?;

        write_key(&mut *tx, &keys::slots(&station.key), &slots).await?;
        write_key(&mut *tx, keys::RENTALS, ledger.rentals()).await?;
        refresh_session(&mut *tx, &ledger.with_credits(user)).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(
            rental = %rental.id,
            user = %rental.user_id,
            station = %rental.station,
            slot = rental.slot_number,
            price = rental.price,
            "Rental started"
        );
        Ok(rental)
    }

    /// Return a rental at `now`.
    ///
    /// `fallback_hourly_rate` prices usage when the station has left the catalog.
    pub async fn return_rental(
        &self,
        rental_id: &str,
        request: &ReturnRentalRequest,
        fallback_hourly_rate: f64,
        now: DateTime<Utc>,
    ) -> Result<ReturnReceipt, AppError> {
        let mut tx = self.pool.begin().await?;

        let users: Vec<User> = read_collection(&mut *tx, keys::USERS).await?;
        let user = users
            .into_iter()
            .find(|u| u.id == request.user_id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", request.user_id)))?;

        let mut ledger = Ledger::new(read_collection(&mut *tx, keys::RENTALS).await?);
        let station_key = ledger
            .find(rental_id)
            .map(|r| r.station.clone())
            .ok_or_else(|| AppError::NotFound(format!("Rental {} not found", rental_id)))?;

        let bicycles: Vec<Bicycle> = read_collection(&mut *tx, keys::BICYCLES).await?;
        let hourly_rate = match find_station(&bicycles, &station_key) {
            Some(station) => station.hourly_rate,
            None => {
                tracing::warn!(
                    station = %station_key,
                    "Station no longer in catalog, charging fallback rate"
                );
                fallback_hourly_rate
            }
        };

        let (mut slots, _) = load_slots(&mut *tx, &station_key, now).await?;
        let receipt = rentals::return_rental(
            &mut ledger,
            &mut slots,
            &user,
            rental_id,
            request.slot_number,
            hourly_rate,
            now,
        )?;

        write_key(&mut *tx, &keys::slots(&station_key), &slots).await?;
        write_key(&mut *tx, keys::RENTALS, ledger.rentals()).await?;
        refresh_session(&mut *tx, &ledger.with_credits(user)).await?;
        bump_revision(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(
            rental = %rental_id,
            slot = request.slot_number,
            charge = receipt.charge,
            "Rental returned"
        );
        Ok(receipt)
    }

    // ==================== DASHBOARD ====================

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, AppError> {
        let mut conn = self.pool.acquire().await?;
        let users: Vec<User> = read_collection(&mut *conn, keys::USERS).await?;
        let bicycles: Vec<Bicycle> = read_collection(&mut *conn, keys::BICYCLES).await?;
        let rentals: Vec<Rental> = read_collection(&mut *conn, keys::RENTALS).await?;

        let completed = rentals
            .iter()
            .filter(|r| r.status == RentalStatus::Completed);

        Ok(DashboardStats {
            total_users: users.len(),
            total_stations: stations_from_catalog(&bicycles).len(),
            total_bicycles: bicycles.len(),
            active_rentals: rentals.iter().filter(|r| r.is_active()).count(),
            completed_rentals: completed.clone().count(),
            total_revenue: completed.map(|r| r.price).sum(),
        })
    }
}

// Helpers shared by the transactional operations

async fn load_slots(
    conn: &mut SqliteConnection,
    station_key: &str,
    now: DateTime<Utc>,
) -> Result<(Vec<Slot>, bool), AppError> {
    match read_key::<Vec<Slot>>(conn, &keys::slots(station_key)).await? {
        Some(stored) => Ok(slots::ensure_initialized(stored, now)),
        None => Ok((slots::default_slots(now), true)),
    }
}

/// Rewrite the session snapshot if it belongs to `user`.
async fn refresh_session(conn: &mut SqliteConnection, user: &User) -> Result<(), AppError> {
    let current = read_key::<User>(conn, keys::CURRENT_USER).await?;
    if current.is_some_and(|c| c.id == user.id) {
        write_key(conn, keys::CURRENT_USER, user).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::{BicycleStatus, DurationPlan, Role, SlotTag, NOTE_RESERVED_FOR_RETURNS};
    use chrono::Duration;
    use tempfile::TempDir;

    const STATION: &str = "Station 1_Kathmandu";

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    async fn seed(repo: &Repository, initial_credits: f64) -> User {
        repo.create_bicycle(&CreateBicycleRequest {
            name: "Station 1".to_string(),
            location: "Kathmandu".to_string(),
            hourly_rate: 25.0,
            daily_rate: 150.0,
            status: BicycleStatus::Available,
        })
        .await
        .unwrap();

        repo.create_user(&CreateUserRequest {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            mobile: None,
            role: Role::User,
            initial_credits,
        })
        .await
        .unwrap()
    }

    fn start(user_id: &str, slot_number: u32, duration: DurationPlan) -> StartRentalRequest {
        StartRentalRequest {
            user_id: user_id.to_string(),
            station: STATION.to_string(),
            slot_number,
            duration,
            hours: None,
        }
    }

    #[tokio::test]
    async fn test_slots_created_on_first_read() {
        let (repo, _dir) = repo().await;
        let before = repo.get_revision_id().await.unwrap();

        let slots = repo.get_or_create_slots(STATION).await.unwrap();

        assert_eq!(slots.len(), 10);
        assert!(slots[..8].iter().all(|s| s.status == SlotStatus::Active));
        for slot in &slots[8..] {
            assert_eq!(slot.status, SlotStatus::Reserved);
            assert_eq!(slot.notes, NOTE_RESERVED_FOR_RETURNS);
        }
        assert_eq!(repo.get_revision_id().await.unwrap(), before + 1);

        // A second read finds a complete registry and writes nothing.
        repo.get_or_create_slots(STATION).await.unwrap();
        assert_eq!(repo.get_revision_id().await.unwrap(), before + 1);
    }

    #[tokio::test]
    async fn test_slot_status_survives_reads() {
        let (repo, _dir) = repo().await;
        repo.get_or_create_slots(STATION).await.unwrap();

        repo.set_slot_status(STATION, "slot-3", SlotStatus::InMaintenance, "Bent dock")
            .await
            .unwrap();
        let slots = repo.get_or_create_slots(STATION).await.unwrap();

        assert_eq!(slots[2].status, SlotStatus::InMaintenance);
        assert_eq!(
            slots[2].tag,
            SlotTag::Maintenance {
                reason: "Bent dock".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reset_twice_yields_same_layout() {
        let (repo, _dir) = repo().await;
        repo.set_slot_status(STATION, "slot-1", SlotStatus::Occupied, "")
            .await
            .unwrap();

        let first = repo.reset_slots(STATION, None).await.unwrap();
        let second = repo.reset_slots(STATION, None).await.unwrap();

        let strip = |slots: Vec<Slot>| -> Vec<(u32, SlotStatus, String, SlotTag)> {
            slots
                .into_iter()
                .map(|s| (s.slot_number, s.status, s.notes, s.tag))
                .collect()
        };
        assert_eq!(strip(first), strip(second));
        assert!(matches!(
            repo.reset_slots(STATION, Some(8)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_pay_as_you_go_round_trip() {
        let (repo, _dir) = repo().await;
        let user = seed(&repo, 100.0).await;
        repo.set_session(&user.id).await.unwrap();
        let started_at: DateTime<Utc> = "2024-05-01T08:00:00Z".parse().unwrap();

        let rental = repo
            .start_rental(&start(&user.id, 4, DurationPlan::PayAsYouGo), started_at)
            .await
            .unwrap();
        assert_eq!(rental.price, 0.0);

        let receipt = repo
            .return_rental(
                &rental.id,
                &ReturnRentalRequest {
                    user_id: user.id.clone(),
                    slot_number: 4,
                },
                30.0,
                started_at + Duration::minutes(144),
            )
            .await
            .unwrap();

        assert_eq!(receipt.charge, 75.0);
        assert_eq!(receipt.credits, 25.0);

        let stored = repo.get_rental(&rental.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RentalStatus::Completed);
        assert_eq!(stored.price, 75.0);
        assert_eq!(repo.get_user(&user.id).await.unwrap().unwrap().credits, 25.0);
        assert_eq!(repo.get_session().await.unwrap().unwrap().credits, 25.0);

        let stats = repo.dashboard_stats().await.unwrap();
        assert_eq!(stats.completed_rentals, 1);
        assert_eq!(stats.total_revenue, 75.0);
    }

    #[tokio::test]
    async fn test_failed_rent_persists_nothing() {
        let (repo, _dir) = repo().await;
        let user = seed(&repo, 500.0).await;
        for n in 1..=8 {
            repo.set_slot_status(STATION, &format!("slot-{}", n), SlotStatus::Occupied, "")
                .await
                .unwrap();
        }
        let before = repo.get_revision_id().await.unwrap();

        let err = repo
            .start_rental(&start(&user.id, 9, DurationPlan::Daily), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NoAvailableSlots(_)));
        assert_eq!(repo.get_revision_id().await.unwrap(), before);
        assert!(repo
            .list_rentals(&RentalQuery::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(repo.get_user(&user.id).await.unwrap().unwrap().credits, 500.0);
    }

    #[tokio::test]
    async fn test_return_uses_fallback_rate_for_removed_station() {
        let (repo, _dir) = repo().await;
        let user = seed(&repo, 100.0).await;
        let started_at = Utc::now();

        let rental = repo
            .start_rental(&start(&user.id, 1, DurationPlan::PayAsYouGo), started_at)
            .await
            .unwrap();
        for bike in repo.list_bicycles().await.unwrap() {
            repo.delete_bicycle(&bike.id).await.unwrap();
        }

        let receipt = repo
            .return_rental(
                &rental.id,
                &ReturnRentalRequest {
                    user_id: user.id.clone(),
                    slot_number: 1,
                },
                30.0,
                started_at + Duration::minutes(30),
            )
            .await
            .unwrap();

        assert_eq!(receipt.charge, 30.0);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (repo, _dir) = repo().await;
        seed(&repo, 10.0).await;

        let err = repo
            .create_user(&CreateUserRequest {
                name: "Other".to_string(),
                email: "ASHA@example.com".to_string(),
                mobile: None,
                role: Role::User,
                initial_credits: 0.0,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }
}
