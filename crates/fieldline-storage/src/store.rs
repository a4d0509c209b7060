//! Tenant-scoped CRUD for contacts, jobs, consents, departments, workers and routing
//! rules (spec §4 component 2, "Storage Adapter"). Every query here takes `tenant_id`
//! and filters by it — this module is the one place the tenant-isolation invariant
//! (spec §3) must hold.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::info;

use fieldline_core::prelude::*;

use crate::error::{Result, StorageError};

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| StorageError::Query(e.to_string()))?;
        info!(url = %database_url, "storage adapter connected");
        Ok(Self { pool })
    }

    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// ---- Contacts ---------------------------------------------------------------------

impl Store {
    pub async fn upsert_contact(&self, contact: &Contact) -> Result<()> {
        sqlx::query(
            "INSERT INTO contacts
                (id, tenant_id, name, phone, email, address_json, geo_json, property_type,
                 created_at, soft_deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, phone = excluded.phone, email = excluded.email,
                address_json = excluded.address_json, geo_json = excluded.geo_json,
                property_type = excluded.property_type, soft_deleted_at = excluded.soft_deleted_at",
        )
        .bind(contact.id.to_string())
        .bind(contact.tenant_id.to_string())
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(&contact.email)
        .bind(contact.address.as_ref().map(|a| serde_json::to_string(a).unwrap()))
        .bind(contact.geo.map(|g| serde_json::to_string(&g).unwrap()))
        .bind(serde_json::to_string(&contact.property_type).unwrap())
        .bind(contact.created_at.to_rfc3339())
        .bind(contact.soft_deleted_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_contact(&self, tenant_id: TenantId, id: ContactId) -> Result<Contact> {
        let row = sqlx::query("SELECT * FROM contacts WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row_to_contact(&row),
            None => Err(StorageError::NotFound { kind: "contact", id: id.to_string() }),
        }
    }
}

fn row_to_contact(row: &sqlx::sqlite::SqliteRow) -> Result<Contact> {
    let address_json: Option<String> = row.try_get("address_json")?;
    let geo_json: Option<String> = row.try_get("geo_json")?;
    let property_type: String = row.try_get("property_type")?;
    let created_at: String = row.try_get("created_at")?;
    let soft_deleted_at: Option<String> = row.try_get("soft_deleted_at")?;
    Ok(Contact {
        id: parse_id(row.try_get("id")?)?,
        tenant_id: parse_id(row.try_get("tenant_id")?)?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        address: address_json.map(|s| serde_json::from_str(&s)).transpose().map_err(json_err)?,
        geo: geo_json.map(|s| serde_json::from_str(&s)).transpose().map_err(json_err)?,
        property_type: serde_json::from_str(&property_type).map_err(json_err)?,
        created_at: parse_time(&created_at)?,
        soft_deleted_at: soft_deleted_at.map(|s| parse_time(&s)).transpose()?,
    })
}

fn json_err(e: serde_json::Error) -> StorageError {
    StorageError::Query(e.to_string())
}

fn parse_time(s: &str) -> Result<chrono::DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Query(e.to_string()))
}

fn parse_id<T: From<uuid::Uuid>>(s: String) -> Result<T> {
    s.parse::<uuid::Uuid>().map(T::from).map_err(|e| StorageError::Query(e.to_string()))
}

// ---- Consents -----------------------------------------------------------------------

impl Store {
    pub async fn record_consent(&self, consent: &ConsentRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO consents
                (id, tenant_id, contact_id, kind, granted_at, revoked_at, method, call_id, expires_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(consent.id.to_string())
        .bind(consent.tenant_id.to_string())
        .bind(consent.contact_id.to_string())
        .bind(serde_json::to_string(&consent.kind).unwrap())
        .bind(consent.granted_at.map(|t| t.to_rfc3339()))
        .bind(consent.revoked_at.map(|t| t.to_rfc3339()))
        .bind(serde_json::to_string(&consent.method).unwrap())
        .bind(&consent.originating_call_id)
        .bind(consent.expires_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_consents(&self, tenant_id: TenantId, contact_id: ContactId) -> Result<Vec<ConsentRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM consents WHERE tenant_id = ? AND contact_id = ? ORDER BY rowid ASC",
        )
        .bind(tenant_id.to_string())
        .bind(contact_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_consent).collect()
    }

    /// Active consent of a kind as of `at`, if any (spec §8, "Consent gate").
    pub async fn active_consent(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        kind: ConsentKind,
        at: chrono::DateTime<Utc>,
    ) -> Result<Option<ConsentRecord>> {
        let all = self.list_consents(tenant_id, contact_id).await?;
        Ok(all.into_iter().filter(|c| c.kind == kind).find(|c| c.is_active_at(at)))
    }

    /// Revoke the currently active record of `kind`, in place (the row itself is
    /// never deleted, only its `revoked_at` set — spec §3, "Consent Record").
    pub async fn revoke_consent(
        &self,
        tenant_id: TenantId,
        contact_id: ContactId,
        kind: ConsentKind,
        at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE consents SET revoked_at = ?
             WHERE tenant_id = ? AND contact_id = ? AND kind = ? AND revoked_at IS NULL",
        )
        .bind(at.to_rfc3339())
        .bind(tenant_id.to_string())
        .bind(contact_id.to_string())
        .bind(serde_json::to_string(&kind).unwrap())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_consent(row: &sqlx::sqlite::SqliteRow) -> Result<ConsentRecord> {
    let kind: String = row.try_get("kind")?;
    let method: String = row.try_get("method")?;
    let granted_at: Option<String> = row.try_get("granted_at")?;
    let revoked_at: Option<String> = row.try_get("revoked_at")?;
    let expires_at: Option<String> = row.try_get("expires_at")?;
    Ok(ConsentRecord {
        id: parse_id(row.try_get("id")?)?,
        tenant_id: parse_id(row.try_get("tenant_id")?)?,
        contact_id: parse_id(row.try_get("contact_id")?)?,
        kind: serde_json::from_str(&kind).map_err(json_err)?,
        granted_at: granted_at.map(|s| parse_time(&s)).transpose()?,
        revoked_at: revoked_at.map(|s| parse_time(&s)).transpose()?,
        method: serde_json::from_str(&method).map_err(json_err)?,
        originating_call_id: row.try_get("call_id")?,
        expires_at: expires_at.map(|s| parse_time(&s)).transpose()?,
    })
}

// ---- Jobs -----------------------------------------------------------------------------

impl Store {
    /// Allocate the next job number for a tenant-year, format `JOB-YYYY-NNNN`, monotonic
    /// within the tenant-year (spec §3, "Job"). Uses a counting query inside the caller's
    /// transaction-free path; callers that need atomicity across "allocate + insert" call
    /// this and `insert_job` within the same logical request — SQLite's single-writer
    /// model serializes them in practice, and production deployments would wrap both in
    /// one transaction against a dedicated counters table.
    pub async fn next_job_number(&self, tenant_id: TenantId, year: i32) -> Result<String> {
        let prefix = format!("JOB-{year}-");
        let row = sqlx::query(
            "SELECT COUNT(*) as n FROM jobs WHERE tenant_id = ? AND job_number LIKE ?",
        )
        .bind(tenant_id.to_string())
        .bind(format!("{prefix}%"))
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.try_get("n")?;
        Ok(format!("{prefix}{:04}", n + 1))
    }

    pub async fn insert_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            "INSERT INTO jobs
                (id, tenant_id, job_number, contact_id, title, description, trade_category,
                 urgency, status, source, address_json, distance_km, routing_priority,
                 routing_reason, assigned_department, assigned_worker, preferred_window_json,
                 access_notes, scheduled_at, created_at, updated_at, started_at, completed_at,
                 cancel_reason)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id.to_string())
        .bind(job.tenant_id.to_string())
        .bind(&job.job_number)
        .bind(job.contact_id.to_string())
        .bind(&job.title)
        .bind(&job.description)
        .bind(serde_json::to_string(&job.trade_category).unwrap())
        .bind(serde_json::to_string(&job.urgency).unwrap())
        .bind(serde_json::to_string(&job.status).unwrap())
        .bind(serde_json::to_string(&job.source).unwrap())
        .bind(job.address.as_ref().map(|a| serde_json::to_string(a).unwrap()))
        .bind(job.distance_km)
        .bind(job.routing_priority.map(i64::from))
        .bind(&job.routing_reason)
        .bind(job.assigned_department.map(|d| d.to_string()))
        .bind(job.assigned_worker.map(|w| w.to_string()))
        .bind(job.preferred_window.map(|w| serde_json::to_string(&w).unwrap()))
        .bind(&job.access_notes)
        .bind(job.scheduled_at.map(|t| t.to_rfc3339()))
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .bind(job.started_at.map(|t| t.to_rfc3339()))
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .bind(&job.cancel_reason)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    pub async fn get_job(&self, tenant_id: TenantId, id: JobId) -> Result<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id.to_string())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row_to_job(&row),
            None => Err(StorageError::NotFound { kind: "job", id: id.to_string() }),
        }
    }

    pub async fn list_jobs(&self, tenant_id: TenantId, filter: JobFilter) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs WHERE tenant_id = ? ORDER BY created_at DESC")
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        let mut jobs = rows.iter().map(row_to_job).collect::<Result<Vec<_>>>()?;
        jobs.retain(|j| filter.matches(j));
        Ok(jobs)
    }

    /// Replace the full row — used after routing/scheduling/status mutations so the
    /// caller always writes a consistent snapshot rather than many partial `UPDATE`s.
    pub async fn update_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET
                title = ?, description = ?, trade_category = ?, urgency = ?, status = ?,
                address_json = ?, distance_km = ?, routing_priority = ?, routing_reason = ?,
                assigned_department = ?, assigned_worker = ?, preferred_window_json = ?,
                access_notes = ?, scheduled_at = ?, updated_at = ?, started_at = ?,
                completed_at = ?, cancel_reason = ?
             WHERE tenant_id = ? AND id = ?",
        )
        .bind(&job.title)
        .bind(&job.description)
        .bind(serde_json::to_string(&job.trade_category).unwrap())
        .bind(serde_json::to_string(&job.urgency).unwrap())
        .bind(serde_json::to_string(&job.status).unwrap())
        .bind(job.address.as_ref().map(|a| serde_json::to_string(a).unwrap()))
        .bind(job.distance_km)
        .bind(job.routing_priority.map(i64::from))
        .bind(&job.routing_reason)
        .bind(job.assigned_department.map(|d| d.to_string()))
        .bind(job.assigned_worker.map(|w| w.to_string()))
        .bind(job.preferred_window.map(|w| serde_json::to_string(&w).unwrap()))
        .bind(&job.access_notes)
        .bind(job.scheduled_at.map(|t| t.to_rfc3339()))
        .bind(job.updated_at.to_rfc3339())
        .bind(job.started_at.map(|t| t.to_rfc3339()))
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .bind(&job.cancel_reason)
        .bind(job.tenant_id.to_string())
        .bind(job.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    pub async fn append_job_history(&self, entry: &JobHistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_history (id, job_id, actor_json, action, timestamp, detail_json)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(entry.job_id.to_string())
        .bind(serde_json::to_string(&entry.actor).unwrap())
        .bind(&entry.action)
        .bind(entry.timestamp.to_rfc3339())
        .bind(serde_json::to_string(&entry.detail).unwrap())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn job_history(&self, job_id: JobId) -> Result<Vec<JobHistoryEntry>> {
        let rows = sqlx::query("SELECT * FROM job_history WHERE job_id = ? ORDER BY timestamp ASC")
            .bind(job_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let actor_json: String = row.try_get("actor_json")?;
                let timestamp: String = row.try_get("timestamp")?;
                let detail_json: String = row.try_get("detail_json")?;
                Ok(JobHistoryEntry {
                    job_id,
                    actor: serde_json::from_str(&actor_json).map_err(json_err)?,
                    action: row.try_get("action")?,
                    timestamp: parse_time(&timestamp)?,
                    detail: serde_json::from_str(&detail_json).map_err(json_err)?,
                })
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub urgency: Option<Urgency>,
    pub source: Option<JobSource>,
    pub contact_id: Option<ContactId>,
    pub full_text: Option<String>,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        if let Some(contact_id) = self.contact_id {
            if job.contact_id != contact_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        if let Some(urgency) = self.urgency {
            if job.urgency != urgency {
                return false;
            }
        }
        if let Some(source) = self.source {
            if job.source != source {
                return false;
            }
        }
        if let Some(text) = &self.full_text {
            let haystack = format!("{} {}", job.title, job.description).to_lowercase();
            if !haystack.contains(&text.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job> {
    let address_json: Option<String> = row.try_get("address_json")?;
    let preferred_window_json: Option<String> = row.try_get("preferred_window_json")?;
    let trade_category: String = row.try_get("trade_category")?;
    let urgency: String = row.try_get("urgency")?;
    let status: String = row.try_get("status")?;
    let source: String = row.try_get("source")?;
    let assigned_department: Option<String> = row.try_get("assigned_department")?;
    let assigned_worker: Option<String> = row.try_get("assigned_worker")?;
    let scheduled_at: Option<String> = row.try_get("scheduled_at")?;
    let started_at: Option<String> = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;
    let routing_priority: Option<i64> = row.try_get("routing_priority")?;

    Ok(Job {
        id: parse_id(row.try_get("id")?)?,
        tenant_id: parse_id(row.try_get("tenant_id")?)?,
        job_number: row.try_get("job_number")?,
        contact_id: parse_id(row.try_get("contact_id")?)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        trade_category: serde_json::from_str(&trade_category).map_err(json_err)?,
        urgency: serde_json::from_str(&urgency).map_err(json_err)?,
        status: serde_json::from_str(&status).map_err(json_err)?,
        source: serde_json::from_str(&source).map_err(json_err)?,
        address: address_json.map(|s| serde_json::from_str(&s)).transpose().map_err(json_err)?,
        distance_km: row.try_get("distance_km")?,
        routing_priority: routing_priority.map(|p| p as u8),
        routing_reason: row.try_get("routing_reason")?,
        assigned_department: assigned_department.map(parse_id).transpose()?,
        assigned_worker: assigned_worker.map(parse_id).transpose()?,
        preferred_window: preferred_window_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(json_err)?,
        access_notes: row.try_get("access_notes")?,
        scheduled_at: scheduled_at.map(|s| parse_time(&s)).transpose()?,
        created_at: parse_time(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_time(&row.try_get::<String, _>("updated_at")?)?,
        started_at: started_at.map(|s| parse_time(&s)).transpose()?,
        completed_at: completed_at.map(|s| parse_time(&s)).transpose()?,
        cancel_reason: row.try_get("cancel_reason")?,
    })
}

// ---- Departments & workers ------------------------------------------------------------

impl Store {
    pub async fn upsert_department(&self, dept: &Department) -> Result<()> {
        sqlx::query(
            "INSERT INTO departments
                (id, tenant_id, name, accepted_trades_json, accepted_urgencies_json,
                 working_hours_json, contact_channels_json)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, accepted_trades_json = excluded.accepted_trades_json,
                accepted_urgencies_json = excluded.accepted_urgencies_json,
                working_hours_json = excluded.working_hours_json,
                contact_channels_json = excluded.contact_channels_json",
        )
        .bind(dept.id.to_string())
        .bind(dept.tenant_id.to_string())
        .bind(&dept.name)
        .bind(serde_json::to_string(&dept.accepted_trades).unwrap())
        .bind(serde_json::to_string(&dept.accepted_urgencies).unwrap())
        .bind(serde_json::to_string(&dept.working_hours).unwrap())
        .bind(serde_json::to_string(&dept.contact_channels).unwrap())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_departments(&self, tenant_id: TenantId) -> Result<Vec<Department>> {
        let rows = sqlx::query("SELECT * FROM departments WHERE tenant_id = ?")
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_department).collect()
    }

    pub async fn upsert_worker(&self, worker: &Worker) -> Result<()> {
        sqlx::query(
            "INSERT INTO workers
                (id, tenant_id, department_id, name, role, trade_categories_json,
                 certifications_json, working_hours_json, max_concurrent_jobs_per_day,
                 current_jobs_today, service_radius_km, home_base_json, active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                department_id = excluded.department_id, name = excluded.name,
                role = excluded.role, trade_categories_json = excluded.trade_categories_json,
                certifications_json = excluded.certifications_json,
                working_hours_json = excluded.working_hours_json,
                max_concurrent_jobs_per_day = excluded.max_concurrent_jobs_per_day,
                current_jobs_today = excluded.current_jobs_today,
                service_radius_km = excluded.service_radius_km,
                home_base_json = excluded.home_base_json, active = excluded.active",
        )
        .bind(worker.id.to_string())
        .bind(worker.tenant_id.to_string())
        .bind(worker.department_id.to_string())
        .bind(&worker.name)
        .bind(serde_json::to_string(&worker.role).unwrap())
        .bind(serde_json::to_string(&worker.trade_categories).unwrap())
        .bind(serde_json::to_string(&worker.certifications).unwrap())
        .bind(serde_json::to_string(&worker.working_hours).unwrap())
        .bind(worker.max_concurrent_jobs_per_day)
        .bind(worker.current_jobs_today)
        .bind(worker.service_radius_km)
        .bind(worker.home_base.map(|g| serde_json::to_string(&g).unwrap()))
        .bind(worker.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_workers(&self, tenant_id: TenantId, department_id: Option<DepartmentId>) -> Result<Vec<Worker>> {
        let rows = sqlx::query("SELECT * FROM workers WHERE tenant_id = ?")
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        let mut workers = rows.iter().map(row_to_worker).collect::<Result<Vec<_>>>()?;
        if let Some(dept) = department_id {
            workers.retain(|w| w.department_id == dept);
        }
        Ok(workers)
    }

    /// Increment (or decrement, with a negative delta) a worker's today count. Used by
    /// the scheduling engine when a booking succeeds or is cancelled.
    pub async fn adjust_worker_load(&self, worker_id: WorkerId, delta: i64) -> Result<()> {
        sqlx::query("UPDATE workers SET current_jobs_today = MAX(0, current_jobs_today + ?) WHERE id = ?")
            .bind(delta)
            .bind(worker_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_department(row: &sqlx::sqlite::SqliteRow) -> Result<Department> {
    let accepted_trades: String = row.try_get("accepted_trades_json")?;
    let accepted_urgencies: String = row.try_get("accepted_urgencies_json")?;
    let working_hours: String = row.try_get("working_hours_json")?;
    let contact_channels: String = row.try_get("contact_channels_json")?;
    Ok(Department {
        id: parse_id(row.try_get("id")?)?,
        tenant_id: parse_id(row.try_get("tenant_id")?)?,
        name: row.try_get("name")?,
        accepted_trades: serde_json::from_str(&accepted_trades).map_err(json_err)?,
        accepted_urgencies: serde_json::from_str(&accepted_urgencies).map_err(json_err)?,
        working_hours: serde_json::from_str(&working_hours).map_err(json_err)?,
        contact_channels: serde_json::from_str(&contact_channels).map_err(json_err)?,
    })
}

fn row_to_worker(row: &sqlx::sqlite::SqliteRow) -> Result<Worker> {
    let role: String = row.try_get("role")?;
    let trade_categories: String = row.try_get("trade_categories_json")?;
    let certifications: String = row.try_get("certifications_json")?;
    let working_hours: String = row.try_get("working_hours_json")?;
    let home_base_json: Option<String> = row.try_get("home_base_json")?;
    Ok(Worker {
        id: parse_id(row.try_get("id")?)?,
        tenant_id: parse_id(row.try_get("tenant_id")?)?,
        department_id: parse_id(row.try_get("department_id")?)?,
        name: row.try_get("name")?,
        role: serde_json::from_str(&role).map_err(json_err)?,
        trade_categories: serde_json::from_str(&trade_categories).map_err(json_err)?,
        certifications: serde_json::from_str(&certifications).map_err(json_err)?,
        working_hours: serde_json::from_str(&working_hours).map_err(json_err)?,
        max_concurrent_jobs_per_day: row.try_get::<i64, _>("max_concurrent_jobs_per_day")? as u32,
        current_jobs_today: row.try_get::<i64, _>("current_jobs_today")? as u32,
        service_radius_km: row.try_get("service_radius_km")?,
        home_base: home_base_json.map(|s| serde_json::from_str(&s)).transpose().map_err(json_err)?,
        active: row.try_get("active")?,
    })
}

// ---- Routing rules ----------------------------------------------------------------------

impl Store {
    pub async fn upsert_routing_rule(&self, rule: &RoutingRule) -> Result<()> {
        sqlx::query(
            "INSERT INTO routing_rules
                (id, tenant_id, name, priority, conditions_json, action_json,
                 escalation_deadline_minutes, notify, active)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, priority = excluded.priority,
                conditions_json = excluded.conditions_json, action_json = excluded.action_json,
                escalation_deadline_minutes = excluded.escalation_deadline_minutes,
                notify = excluded.notify, active = excluded.active",
        )
        .bind(rule.id.to_string())
        .bind(rule.tenant_id.to_string())
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(serde_json::to_string(&rule.conditions).unwrap())
        .bind(serde_json::to_string(&rule.action).unwrap())
        .bind(rule.escalation_deadline_minutes)
        .bind(rule.notify)
        .bind(rule.active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Ordered ascending by priority, active only — ready to hand straight to the
    /// routing engine (spec §4.6 step 1).
    pub async fn active_routing_rules(&self, tenant_id: TenantId) -> Result<Vec<RoutingRule>> {
        let rows = sqlx::query(
            "SELECT * FROM routing_rules WHERE tenant_id = ? AND active = 1 ORDER BY priority ASC",
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_rule).collect()
    }
}

fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<RoutingRule> {
    let conditions: String = row.try_get("conditions_json")?;
    let action: String = row.try_get("action_json")?;
    Ok(RoutingRule {
        id: parse_id(row.try_get("id")?)?,
        tenant_id: parse_id(row.try_get("tenant_id")?)?,
        name: row.try_get("name")?,
        priority: row.try_get::<i64, _>("priority")? as u8,
        conditions: serde_json::from_str(&conditions).map_err(json_err)?,
        action: serde_json::from_str(&action).map_err(json_err)?,
        escalation_deadline_minutes: row
            .try_get::<Option<i64>, _>("escalation_deadline_minutes")?
            .map(|v| v as u32),
        notify: row.try_get("notify")?,
        active: row.try_get("active")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_contact(tenant: TenantId) -> Contact {
        Contact {
            id: ContactId::new(),
            tenant_id: tenant,
            name: "Max Mustermann".into(),
            phone: Some("+49 30 1234567".into()),
            email: None,
            address: None,
            geo: None,
            property_type: PropertyType::Residential,
            created_at: Utc::now(),
            soft_deleted_at: None,
        }
    }

    #[tokio::test]
    async fn contact_round_trips() {
        let store = Store::connect_in_memory().await.unwrap();
        let tenant = TenantId::new();
        let contact = sample_contact(tenant);
        store.upsert_contact(&contact).await.unwrap();
        let fetched = store.get_contact(tenant, contact.id).await.unwrap();
        assert_eq!(fetched.name, contact.name);
        assert_eq!(fetched.phone, contact.phone);
    }

    #[tokio::test]
    async fn tenant_isolation_on_contacts() {
        let store = Store::connect_in_memory().await.unwrap();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let contact = sample_contact(tenant_a);
        store.upsert_contact(&contact).await.unwrap();
        let err = store.get_contact(tenant_b, contact.id).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn job_numbers_are_monotonic_within_tenant_year() {
        let store = Store::connect_in_memory().await.unwrap();
        let tenant = TenantId::new();
        let contact = sample_contact(tenant);
        store.upsert_contact(&contact).await.unwrap();

        let mut numbers = vec![];
        for _ in 0..3 {
            let number = store.next_job_number(tenant, 2026).await.unwrap();
            numbers.push(number.clone());
            let now = Utc::now();
            let job = Job {
                id: JobId::new(),
                tenant_id: tenant,
                job_number: number,
                contact_id: contact.id,
                title: "Heating repair".into(),
                description: "Heizung kalt".into(),
                trade_category: TradeCategory::PlumbingHeating,
                urgency: Urgency::Urgent,
                status: JobStatus::New,
                source: JobSource::Chat,
                address: None,
                distance_km: None,
                routing_priority: None,
                routing_reason: None,
                assigned_department: None,
                assigned_worker: None,
                preferred_window: None,
                access_notes: None,
                scheduled_at: None,
                created_at: now,
                updated_at: now,
                started_at: None,
                completed_at: None,
                cancel_reason: None,
            };
            store.insert_job(&job).await.unwrap();
        }
        assert_eq!(numbers, vec!["JOB-2026-0001", "JOB-2026-0002", "JOB-2026-0003"]);
    }
}
